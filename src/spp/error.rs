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

//! Errors returned synchronously to callers of the link manager.

use thiserror::Error;

use super::state::ConnectionState;

/// Error returned by [`SppManager`](super::SppManager) operations.
///
/// Connection-lost and connection-failed are never returned here; they are
/// delivered as listener notifications.
#[derive(Debug, Error)]
pub enum SppError {
    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidOperation {
        operation: &'static str,
        state: ConnectionState,
    },

    /// Writing to the connected peer failed. The link has been torn down.
    #[error("write to remote peer failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SppError {
    pub(crate) fn invalid(operation: &'static str, state: ConnectionState) -> Self {
        SppError::InvalidOperation { operation, state }
    }

    /// Whether this error was caused by calling an operation in the wrong state.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, SppError::InvalidOperation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SppError>;
