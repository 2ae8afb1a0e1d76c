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

//! Turning log events into lines of text.

use std::fmt::Write as _;

use chrono::{DateTime, Local, SecondsFormat};
use serde_json::{Map, Value, json};
use tracing::Level;

/// A structured log event ready to be formatted.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: DateTime<Local>,
    pub level:     Level,
    pub target:    &'a str,
    pub message:   String,
    /// Structured fields other than `message`, in recording order.
    pub fields:    Vec<(&'static str, String)>,
    /// Names of the enclosing spans, outermost first.
    pub spans:     Vec<&'static str>,
}

/// Formats one record into one line, including the trailing newline.
pub trait LineFormatter: Send + Sync + 'static {
    fn format(&self, record: &LogRecord<'_>) -> String;
}

/// Human-readable lines:
///
/// ```text
/// 2026-10-18T13:47:30.123+02:00  INFO request:db: app::store: query finished rows=3
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFormatter;

impl LineFormatter for TextFormatter {
    fn format(&self, record: &LogRecord<'_>) -> String {
        let mut line = format!(
            "{} {:>5} ",
            record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            record.level.as_str()
        );
        for span in &record.spans {
            line.push_str(span);
            line.push(':');
        }
        if !record.spans.is_empty() {
            line.push(' ');
        }
        let _ = write!(line, "{}: {}", record.target, record.message);
        for (name, value) in &record.fields {
            let _ = write!(line, " {name}={value}");
        }
        line.push('\n');
        line
    }
}

/// One JSON object per line:
///
/// ```json
/// {"timestamp":"2026-10-18T13:47:30.123+02:00","level":"INFO","target":"app","message":"started","fields":{},"spans":[]}
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl LineFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord<'_>) -> String {
        let fields: Map<String, Value> = record
            .fields
            .iter()
            .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
            .collect();
        let value = json!({
            "timestamp": record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            "level": record.level.as_str(),
            "target": record.target,
            "message": record.message,
            "fields": fields,
            "spans": record.spans,
        });
        let mut line = value.to_string();
        line.push('\n');
        line
    }
}
