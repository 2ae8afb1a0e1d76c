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

//! Background log writer fed by a bounded queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌──────────────┐  dequeue   ┌──────────────┐  write   ┌─────────────┐
//! │  producers   │ ─────────► │ MessageQueue │ ─────────► │ writer thread│ ───────► │ logs-*.txt  │
//! │ (any thread) │            │ (queue lock) │            │  (dedicated) │          │(writer lock)│
//! └──────────────┘            └──────────────┘            └──────────────┘          └─────────────┘
//!        │                        rejected (completed)                                     ▲
//!        └──────────────────────── synchronous write ──────────────────────────────────────┘
//! ```
//!
//! The queue lock and the writer lock are never held together, so producers
//! only ever wait on disk I/O when they fall back to writing themselves.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, error, info};

use crate::{
    FileLogConfig, QueueFullPolicy, Result, RollingInterval,
    clock::{Clock, LocalClock},
    config::{validate_directory, validate_max_queue_length},
    error::{DisposedSnafu, SpawnWorkerSnafu},
    queue::{Enqueued, MessageQueue},
    writer::RollingFileWriter,
};

const WORKER_THREAD_NAME: &str = "logroll-filelog";
const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State shared between the processor handle and its writer thread.
#[derive(Debug)]
struct Shared {
    queue:  MessageQueue,
    /// `None` once the processor is disposed.
    writer: Mutex<Option<RollingFileWriter>>,
}

impl Shared {
    /// Writes one line under the writer lock. Any I/O failure completes the
    /// queue: the processor stops consuming and producers fall back to
    /// synchronous writes. Fails with `Disposed` once `dispose` has closed
    /// the writer.
    fn write_message(&self, line: &str) -> Result<()> {
        let result = {
            let mut writer = self.writer.lock();
            writer.as_mut().context(DisposedSnafu)?.write(line)
        };
        if let Err(ref e) = result {
            self.queue.complete();
            error!(error = %e, "Log write failed, processor no longer accepts queued messages");
        }
        result
    }

    fn process_queue(&self) {
        debug!("Log writer thread started");
        while let Some(line) = self.queue.dequeue() {
            if self.write_message(&line).is_err() {
                break;
            }
        }
        debug!("Log writer thread stopped");
    }
}

/// Asynchronous rolling file log writer.
///
/// Lines handed to [`enqueue_message`](Self::enqueue_message) are queued and
/// written in order by one dedicated thread. When the queue is full the
/// configured [`QueueFullPolicy`] either blocks the producer or drops the
/// line; dropped lines are reported by a single
/// `Dropped {N} messages due to queue overflow.` line once space is
/// available.
///
/// ```no_run
/// use logroll_common_filelog::{LogQueueProcessor, QueueFullPolicy, RollingInterval};
///
/// let processor =
///     LogQueueProcessor::new(QueueFullPolicy::Wait, 1024, "logs", Some(RollingInterval::Day))?;
/// processor.enqueue_message("service started\n")?;
/// processor.dispose()?;
/// # Ok::<(), logroll_common_filelog::FileLogError>(())
/// ```
#[derive(Debug)]
pub struct LogQueueProcessor {
    shared:   Arc<Shared>,
    worker:   Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl LogQueueProcessor {
    /// Creates `directory` if needed, opens the active file and starts the
    /// writer thread.
    pub fn new(
        policy: QueueFullPolicy,
        max_queue_length: usize,
        directory: impl Into<PathBuf>,
        rolling_interval: Option<RollingInterval>,
    ) -> Result<Self> {
        Self::with_clock(
            policy,
            max_queue_length,
            directory,
            rolling_interval,
            Arc::new(LocalClock),
        )
    }

    /// Same as [`new`](Self::new) with an explicit time source for rolling.
    pub fn with_clock(
        policy: QueueFullPolicy,
        max_queue_length: usize,
        directory: impl Into<PathBuf>,
        rolling_interval: Option<RollingInterval>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let directory = directory.into();
        validate_max_queue_length(max_queue_length)?;
        validate_directory(&directory)?;

        let writer = RollingFileWriter::open(&directory, rolling_interval, clock)?;
        let shared = Arc::new(Shared {
            queue:  MessageQueue::new(policy, max_queue_length),
            writer: Mutex::new(Some(writer)),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || shared.process_queue())
                .context(SpawnWorkerSnafu)?
        };

        info!(
            directory = ?directory,
            rolling_interval = ?rolling_interval,
            %policy,
            max_queue_length,
            "Log queue processor started"
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            disposed: AtomicBool::new(false),
        })
    }

    /// Builds a processor from a validated [`FileLogConfig`].
    pub fn from_config(config: &FileLogConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.queue_full_policy,
            config.max_queue_length,
            &config.directory,
            config.rolling_interval,
        )
    }

    /// Hands one formatted line to the processor.
    ///
    /// Blocks only under [`QueueFullPolicy::Wait`] while the queue is full.
    /// Once the processor has stopped queueing (a write failed or
    /// [`dispose`](Self::dispose) is in progress) the line is written
    /// synchronously on the calling thread and any failure is returned. After
    /// `dispose` has closed the active file nothing is written and
    /// [`FileLogError::Disposed`](crate::FileLogError::Disposed) is returned.
    pub fn enqueue_message(&self, line: impl Into<String>) -> Result<()> {
        match self.shared.queue.enqueue(line.into()) {
            Enqueued::Accepted => Ok(()),
            Enqueued::Rejected(line) => self.shared.write_message(&line),
        }
    }

    /// Waits until every queued line has been written, for at most
    /// `timeout`. Returns `true` if the queue drained in time.
    ///
    /// Returns `false` without waiting when called from the writer thread or
    /// once the processor has stopped consuming.
    pub fn flush(&self, timeout: Duration) -> bool {
        if thread::current().name() == Some(WORKER_THREAD_NAME) {
            return false;
        }
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.queue.is_drained() {
                return true;
            }
            if self.shared.queue.is_completed() || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(FLUSH_POLL_INTERVAL);
        }
    }

    /// Replaces the queue policy and capacity. Blocked producers and the
    /// writer thread re-evaluate against the new values immediately.
    pub fn update_queue_settings(&self, policy: QueueFullPolicy, max_queue_length: usize) -> Result<()> {
        validate_max_queue_length(max_queue_length)?;
        self.shared.queue.update_settings(policy, max_queue_length);
        info!(%policy, max_queue_length, "Log queue settings updated");
        Ok(())
    }

    /// Closes the active file and continues in `directory` with the given
    /// rolling interval.
    pub fn update_file_writer_settings(
        &self,
        directory: impl Into<PathBuf>,
        rolling_interval: Option<RollingInterval>,
    ) -> Result<()> {
        let directory = directory.into();
        validate_directory(&directory)?;
        let mut writer = self.shared.writer.lock();
        writer
            .as_mut()
            .context(DisposedSnafu)?
            .reconfigure(directory, rolling_interval)
    }

    /// Stops the processor: pending lines are written, the writer thread is
    /// joined and the active file is flushed and closed.
    ///
    /// Only the first call does anything.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shared.queue.complete();

        if let Some(worker) = self.worker.lock().take()
            && worker.join().is_err()
        {
            error!("Log writer thread panicked");
        }

        let writer = self.shared.writer.lock().take();
        let result = match writer {
            Some(mut writer) => writer.close(),
            None => Ok(()),
        };
        info!("Log queue processor disposed");
        result
    }

    /// Number of lines waiting to be written.
    pub fn queue_len(&self) -> usize { self.shared.queue.len() }

    /// Lines dropped since the last dropped notice was queued.
    pub fn dropped_count(&self) -> u64 { self.shared.queue.dropped_count() }

    /// Current queue policy and capacity.
    pub fn queue_settings(&self) -> (QueueFullPolicy, usize) { self.shared.queue.settings() }

    /// `true` once the processor no longer queues lines, either because it
    /// was disposed or because a write failed.
    pub fn is_completed(&self) -> bool { self.shared.queue.is_completed() }

    pub fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }

    /// Current output directory and rolling interval; `None` once disposed.
    pub fn file_settings(&self) -> Option<(PathBuf, Option<RollingInterval>)> {
        self.shared
            .writer
            .lock()
            .as_ref()
            .map(|writer| (writer.directory().to_path_buf(), writer.interval()))
    }

    /// Path of the file currently being written.
    pub fn current_file(&self) -> Option<PathBuf> {
        self.shared
            .writer
            .lock()
            .as_ref()
            .and_then(|writer| writer.current_path().map(PathBuf::from))
    }
}

impl Drop for LogQueueProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            error!(error = %e, "Failed to dispose log queue processor");
        }
    }
}
