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

//! Panic reporting for processes that log through the file log processor.
//!
//! A panic is recorded as one `error` event carrying the thread name, the
//! source location and a backtrace. The hook then waits for the file log
//! queue to drain so the event reaches disk even if the process aborts right
//! after. With the `deadlock_detection` feature a background thread runs the
//! `parking_lot` detector, which also covers the processor's own locks.

use std::{
    any::Any,
    panic::{self, Location},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use backtrace::Backtrace;
use logroll_common_filelog::LogQueueProcessor;
use tracing::error;

use crate::logging::FILE_LOG_PROCESSOR;

/// Upper bound on how long a panicking thread waits for queued log lines.
const PANIC_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

/// Number of panics observed since [`set_panic_hook`] was installed.
pub fn panic_count() -> u64 { PANIC_COUNT.load(Ordering::Relaxed) }

/// Installs the panic hook, keeping the previous one as the last step.
pub fn set_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        PANIC_COUNT.fetch_add(1, Ordering::Relaxed);
        report_panic(
            payload_message(info.payload()),
            info.location(),
            FILE_LOG_PROCESSOR.get().map(Arc::as_ref),
        );
        previous(info);
    }));

    #[cfg(feature = "deadlock_detection")]
    spawn_deadlock_detector();
}

fn payload_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Box<dyn Any>")
}

/// Logs the panic and waits for `processor` to write it. Returns `true` if
/// the file log queue drained in time.
fn report_panic(
    message: &str,
    location: Option<&Location<'_>>,
    processor: Option<&LogQueueProcessor>,
) -> bool {
    let current = thread::current();
    let thread_name = current.name().unwrap_or("<unnamed>");
    let backtrace = format!("{:?}", Backtrace::new());
    match location {
        Some(location) => error!(
            thread = thread_name,
            panic.file = location.file(),
            panic.line = location.line(),
            panic.column = location.column(),
            backtrace = %backtrace,
            "Thread panicked: {message}"
        ),
        None => error!(thread = thread_name, backtrace = %backtrace, "Thread panicked: {message}"),
    }
    processor.is_none_or(|processor| processor.flush(PANIC_FLUSH_TIMEOUT))
}

#[cfg(feature = "deadlock_detection")]
fn spawn_deadlock_detector() {
    const CHECK_INTERVAL: Duration = Duration::from_secs(5);

    let spawned = thread::Builder::new()
        .name("logroll-deadlock".to_string())
        .spawn(|| {
            loop {
                thread::sleep(CHECK_INTERVAL);
                let deadlocks = parking_lot::deadlock::check_deadlock();
                if deadlocks.is_empty() {
                    continue;
                }

                error!(count = deadlocks.len(), "Deadlocks detected");
                for (cycle, threads) in deadlocks.iter().enumerate() {
                    for t in threads {
                        error!(
                            cycle,
                            thread_id = ?t.thread_id(),
                            backtrace = ?t.backtrace(),
                            "Deadlocked thread"
                        );
                    }
                }
                crate::logging::flush_file_logging(PANIC_FLUSH_TIMEOUT);
            }
        });
    if let Err(e) = spawned {
        error!(error = %e, "Failed to start deadlock detector");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use logroll_common_filelog::{FileLogLayer, QueueFullPolicy};
    use tempfile::TempDir;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn test_panic_is_counted() {
        set_panic_hook();
        let before = panic_count();
        let result = std::panic::catch_unwind(|| panic!("boom"));
        assert!(result.is_err());
        assert!(panic_count() > before);
    }

    #[test]
    fn test_panic_report_reaches_file_before_returning() {
        let dir = TempDir::new().unwrap();
        let processor =
            Arc::new(LogQueueProcessor::new(QueueFullPolicy::Wait, 64, dir.path(), None).unwrap());
        let subscriber =
            tracing_subscriber::registry().with(FileLogLayer::new(Arc::clone(&processor)));

        let location = Location::caller();
        let drained = tracing::subscriber::with_default(subscriber, || {
            report_panic("worker exploded", Some(location), Some(&processor))
        });
        assert!(drained);

        let contents = fs::read_to_string(dir.path().join("logs.txt")).unwrap();
        assert!(contents.contains("Thread panicked: worker exploded"));
        assert!(contents.contains("panic.line="));
        processor.dispose().unwrap();
    }

    #[test]
    fn test_payload_message() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(payload_message(owned.as_ref()), "owned");
        assert_eq!(payload_message(borrowed.as_ref()), "borrowed");
        assert_eq!(payload_message(other.as_ref()), "Box<dyn Any>");
    }
}
