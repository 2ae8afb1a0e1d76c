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

use std::{io, path::PathBuf};

use snafu::{Location, Snafu};

/// File log operation errors.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum FileLogError {
    /// The log directory could not be created.
    #[snafu(display("Failed to create log directory {}", path.display()))]
    CreateDirectory {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    /// The active log file could not be opened.
    #[snafu(display("Failed to open log file {}", path.display()))]
    OpenFile {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    /// Writing or flushing the active log file failed.
    #[snafu(display("Failed to write log file {}", path.display()))]
    Write {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    /// A configuration value was rejected.
    #[snafu(display("Invalid argument `{name}`: {reason}"))]
    InvalidArgument {
        name:   &'static str,
        reason: String,
        #[snafu(implicit)]
        loc:    Location,
    },

    /// The background writer thread could not be started.
    #[snafu(display("Failed to spawn log writer thread"))]
    SpawnWorker {
        source: io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    /// The processor has been disposed and accepts no more messages.
    #[snafu(display("Log queue processor has been disposed"))]
    Disposed {
        #[snafu(implicit)]
        loc: Location,
    },
}

impl FileLogError {
    /// Returns `true` for errors raised by the filesystem.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::CreateDirectory { .. } | Self::OpenFile { .. } | Self::Write { .. }
        )
    }
}

/// Result type for file log operations.
pub type Result<T> = std::result::Result<T, FileLogError>;
