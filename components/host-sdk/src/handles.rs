// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Opaque handle references passed across the foreign boundary.
//!
//! Every `create` hands out a reference string owned by the caller, which
//! must be matched by exactly one `release`. References carry the arena
//! generation, so a reference used after release (or after its slot was
//! reused) is detected as stale instead of reaching the wrong object.

use std::fmt;
use std::str::FromStr;

extern crate generational_arena;

use generational_arena::{Arena, Index};

use crate::error::BoundaryError;

/// Category of an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Top-level client.
    Client,
    /// Per-request context (e.g. the user a call is evaluated for).
    RequestContext,
    /// Configuration options.
    Options,
}

impl HandleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Client => "client",
            HandleKind::RequestContext => "context",
            HandleKind::Options => "options",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(HandleKind::Client),
            "context" => Ok(HandleKind::RequestContext),
            "options" => Ok(HandleKind::Options),
            _ => Err(format!("Unknown handle kind: {}", s)),
        }
    }
}

/// Owns the objects behind one kind of handle.
pub struct HandleRegistry<T> {
    kind: HandleKind,
    arena: Arena<T>,
}

impl<T> HandleRegistry<T> {
    pub fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            arena: Arena::new(),
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Store `value` and return its reference string.
    pub fn create(&mut self, value: T) -> String {
        let index = self.arena.insert(value);
        let (slot, generation) = index.into_raw_parts();
        format!("{}:{}:{}", self.kind, slot, generation)
    }

    pub fn get(&self, reference: &str) -> Result<&T, BoundaryError> {
        let index = self.parse(reference)?;
        self.arena.get(index).ok_or_else(|| stale(reference))
    }

    pub fn get_mut(&mut self, reference: &str) -> Result<&mut T, BoundaryError> {
        let index = self.parse(reference)?;
        self.arena.get_mut(index).ok_or_else(|| stale(reference))
    }

    /// Invalidate `reference`, returning the owned value.
    pub fn release(&mut self, reference: &str) -> Result<T, BoundaryError> {
        let index = self.parse(reference)?;
        self.arena.remove(index).ok_or_else(|| stale(reference))
    }

    fn parse(&self, reference: &str) -> Result<Index, BoundaryError> {
        let malformed = || BoundaryError::MalformedHandle {
            reference: reference.to_string(),
        };

        let mut parts = reference.splitn(3, ':');
        let kind = parts
            .next()
            .and_then(|k| HandleKind::from_str(k).ok())
            .ok_or_else(malformed)?;
        let slot = parts
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(malformed)?;
        let generation = parts
            .next()
            .and_then(|g| g.parse::<u64>().ok())
            .ok_or_else(malformed)?;

        if kind != self.kind {
            return Err(BoundaryError::WrongHandleKind {
                reference: reference.to_string(),
                expected: self.kind,
            });
        }

        Ok(Index::from_raw_parts(slot, generation))
    }
}

fn stale(reference: &str) -> BoundaryError {
    BoundaryError::StaleHandle {
        reference: reference.to_string(),
    }
}
