// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Asynchronous rolling file log writer.
//!
//! A [`LogQueueProcessor`] accepts formatted lines from any thread, queues
//! them in a bounded FIFO and writes them from one dedicated thread to
//! `logs.txt` or to time-windowed `logs-<period>.txt` files. A
//! [`FileLogLayer`] plugs it into `tracing`.

pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod layer;
pub mod period;
pub mod processor;
pub mod queue;
pub mod writer;

pub use clock::{Clock, LocalClock, ManualClock};
pub use config::{FileLogConfig, QueueFullPolicy, RollingInterval};
pub use error::{FileLogError, Result};
pub use format::{JsonFormatter, LineFormatter, LogRecord, TextFormatter};
pub use layer::FileLogLayer;
pub use processor::LogQueueProcessor;
