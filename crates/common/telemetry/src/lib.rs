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

//! # Telemetry
//!
//! - **[`logging`]**: global `tracing` subscriber with a reloadable level
//!   filter, a non-blocking stdout layer and asynchronous rolling file logs
//! - **[`panic_hook`]**: panics logged with backtraces and flushed to the
//!   log files before the process goes on, optional deadlock detection
//!
//! ```rust,no_run
//! use logroll_common_filelog::{FileLogConfig, RollingInterval};
//! use logroll_common_telemetry::{
//!     logging::{LogFormat, LoggingOptions, init_global_logging},
//!     panic_hook::set_panic_hook,
//! };
//!
//! let opts = LoggingOptions {
//!     level:      Some("info,hyper=warn".to_string()),
//!     log_format: LogFormat::Json,
//!     file:       Some(FileLogConfig {
//!         directory: "/var/log/myapp".into(),
//!         rolling_interval: Some(RollingInterval::Day),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! let _guard = init_global_logging("my-app", &opts);
//! set_panic_hook();
//!
//! tracing::info!("Application started");
//! ```

pub mod logging;
pub mod panic_hook;

pub use logging::{LogFormat, LoggingGuard, LoggingOptions, flush_file_logging, init_global_logging};
