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

//! Serial Port Profile link management.
//!
//! Keeps one logical byte-stream link to one remote peer, either accepted
//! while listening or established by connecting out.

mod connect;
mod error;
mod listen;
mod listener;
mod manager;
mod state;
mod transfer;
mod worker;

pub use error::{Result, SppError};
pub use listener::{ChannelListener, SppEvent, SppListener};
pub use manager::SppManager;
pub use state::ConnectionState;
pub use worker::{WorkerId, WorkerOutcome, WorkerRole};
