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

//! `tracing` front-end for the [`LogQueueProcessor`].
//!
//! Level filtering happens upstream (per-layer or global filters); this layer
//! formats every event it sees and enqueues the line.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::Local;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::Context, registry::LookupSpan};

use crate::{
    FileLogError, LogQueueProcessor,
    format::{LineFormatter, LogRecord, TextFormatter},
};

/// Events from this crate never reach the file layer: the writer thread
/// would otherwise enqueue into its own queue and could block on it.
const SELF_TARGET: &str = env!("CARGO_CRATE_NAME");

/// A [`Layer`](tracing_subscriber::Layer) writing events through a
/// [`LogQueueProcessor`].
pub struct FileLogLayer<F = TextFormatter> {
    processor:       Arc<LogQueueProcessor>,
    formatter:       F,
    failure_printed: AtomicBool,
}

impl FileLogLayer<TextFormatter> {
    pub fn new(processor: Arc<LogQueueProcessor>) -> Self {
        Self::with_formatter(processor, TextFormatter)
    }
}

impl<F: LineFormatter> FileLogLayer<F> {
    pub fn with_formatter(processor: Arc<LogQueueProcessor>, formatter: F) -> Self {
        Self {
            processor,
            formatter,
            failure_printed: AtomicBool::new(false),
        }
    }

    pub fn processor(&self) -> &Arc<LogQueueProcessor> { &self.processor }

    #[allow(clippy::print_stderr)]
    fn report_failure(&self, error: &FileLogError) {
        if matches!(error, FileLogError::Disposed { .. }) {
            return;
        }
        if !self.failure_printed.swap(true, Ordering::Relaxed) {
            eprintln!("file logging failed, further failures are not reported: {error}");
        }
    }
}

impl<S, F> tracing_subscriber::Layer<S> for FileLogLayer<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    F: LineFormatter,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(SELF_TARGET) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let spans = ctx
            .event_scope(event)
            .map(|scope| scope.from_root().map(|span| span.name()).collect())
            .unwrap_or_default();

        let record = LogRecord {
            timestamp: Local::now(),
            level: *metadata.level(),
            target: metadata.target(),
            message: visitor.message,
            fields: visitor.fields,
            spans,
        };

        if let Err(e) = self.processor.enqueue_message(self.formatter.format(&record)) {
            self.report_failure(&e);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields:  Vec<(&'static str, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}
