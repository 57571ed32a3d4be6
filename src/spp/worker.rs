// Copyright 2026 Daniel Pelikan
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

//! Worker identity and completion reports.

use std::fmt;

use crate::transport::Link;

/// Identity of one worker instance.
///
/// Ids are never reused, so a report carrying an id that is no longer the
/// active one comes from a superseded worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// What a worker does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Listen,
    Connect,
    Transfer,
}

/// Terminal report a worker sends to the manager, exactly once.
pub enum WorkerOutcome<E> {
    /// A listen or connect worker obtained an endpoint.
    Accepted(Link<E>),
    /// The worker hit a transport fault.
    Failed(String),
    /// The worker was cancelled by the manager.
    Cancelled,
}

impl<E> fmt::Debug for WorkerOutcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Accepted(link) => f.debug_tuple("Accepted").field(&link.peer).finish(),
            WorkerOutcome::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            WorkerOutcome::Cancelled => f.write_str("Cancelled"),
        }
    }
}
