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

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use logroll_common_filelog::{FileLogConfig, QueueFullPolicy, RollingInterval};
use logroll_common_telemetry::{
    logging::{LogFormat, LoggingOptions, init_global_logging, reload_file_logging, reload_level},
    panic_hook::set_panic_hook,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use snafu::{ResultExt, Whatever, whatever};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(
name = "logroll",
about= "logroll-cmd",
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Emit(EmitArgs),
    Config(ConfigArgs),
}

/// Options shared by every subcommand that builds a logging configuration.
#[derive(Debug, Clone, Args)]
struct LoggingArgs {
    /// JSON file holding `LoggingOptions`.
    #[arg(long)]
    config:   Option<PathBuf>,
    /// Log directory, overrides the config file.
    #[arg(long)]
    dir:      Option<PathBuf>,
    /// Rolling interval: year, month, day, hour or minute.
    #[arg(long)]
    rolling:  Option<RollingInterval>,
    /// Queue full policy: wait or drop_write.
    #[arg(long)]
    policy:   Option<QueueFullPolicy>,
    /// Maximum queue length.
    #[arg(long)]
    capacity: Option<usize>,
    /// Level filter, e.g. `info,app=debug`.
    #[arg(long)]
    level:    Option<String>,
    /// Write JSON lines instead of text.
    #[arg(long)]
    json:     bool,
    /// Do not echo events to stdout.
    #[arg(long)]
    quiet:    bool,
}

impl LoggingArgs {
    /// Loads the config file (if any) and applies the command-line overrides.
    /// File logging is always enabled.
    fn options(&self) -> Result<LoggingOptions, Whatever> {
        let mut opts = match &self.config {
            Some(path) => read_options(path)?,
            None => LoggingOptions::default(),
        };

        let file = opts.file.get_or_insert_with(FileLogConfig::default);
        if let Some(dir) = &self.dir {
            file.directory.clone_from(dir);
        }
        if self.rolling.is_some() {
            file.rolling_interval = self.rolling;
        }
        if let Some(policy) = self.policy {
            file.queue_full_policy = policy;
        }
        if let Some(capacity) = self.capacity {
            file.max_queue_length = capacity;
        }
        file.validate()
            .whatever_context("Invalid file logging configuration")?;

        if self.level.is_some() {
            opts.level.clone_from(&self.level);
        }
        if self.json {
            opts.log_format = LogFormat::Json;
        }
        if self.quiet {
            opts.append_stdout = false;
        }
        Ok(opts)
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Emit synthetic log events through the file logger.
Examples:

logroll emit --dir logs --rolling minute --threads 4 --count 10000
logroll emit --config logging.json --watch

")]
struct EmitArgs {
    #[command(flatten)]
    logging:  LoggingArgs,
    /// Number of producer threads.
    #[arg(long, default_value_t = 1)]
    threads:  usize,
    /// Events per producer thread.
    #[arg(long, default_value_t = 1000)]
    count:    u64,
    /// Pause between events of one producer, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Reload the config file on change and keep running until Ctrl-C.
    #[arg(long, requires = "config")]
    watch:    bool,
}

impl EmitArgs {
    fn run(&self) -> Result<(), Whatever> {
        let opts = self.logging.options()?;
        let guard = init_global_logging("logroll", &opts);
        set_panic_hook();

        let stop = Arc::new(AtomicBool::new(false));
        {
            let stop = Arc::clone(&stop);
            ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
                .whatever_context("Failed to install Ctrl-C handler")?;
        }

        let _watcher = match (&self.logging.config, self.watch) {
            (Some(path), true) => Some(watch_config(path)?),
            _ => None,
        };

        let emitted = Arc::new(AtomicU64::new(0));
        let delay = Duration::from_millis(self.delay_ms);
        let producers = (0..self.threads)
            .map(|producer| {
                let stop = Arc::clone(&stop);
                let emitted = Arc::clone(&emitted);
                let count = self.count;
                thread::Builder::new()
                    .name(format!("emit-{producer}"))
                    .spawn(move || {
                        for seq in 0..count {
                            if stop.load(Ordering::Relaxed) {
                                break;
                            }
                            info!(target: "logroll::emit", producer, seq, "synthetic event");
                            emitted.fetch_add(1, Ordering::Relaxed);
                            if !delay.is_zero() {
                                thread::sleep(delay);
                            }
                        }
                    })
                    .whatever_context("Failed to spawn producer thread")
            })
            .collect::<Result<Vec<_>, Whatever>>()?;

        for producer in producers {
            if producer.join().is_err() {
                whatever!("Producer thread panicked");
            }
        }

        if self.watch {
            info!("Waiting for config changes, press Ctrl-C to exit");
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
        }

        let processor = guard.processor();
        info!(
            emitted = emitted.load(Ordering::Relaxed),
            dropped_pending = processor.map(|p| p.dropped_count()),
            file = ?processor.and_then(|p| p.current_file()),
            "Emit finished"
        );
        drop(guard);
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print the effective logging configuration as JSON.
Examples:

logroll config
logroll config --config logging.json --rolling hour

")]
struct ConfigArgs {
    #[command(flatten)]
    logging: LoggingArgs,
}

impl ConfigArgs {
    #[allow(clippy::print_stdout)]
    fn run(&self) -> Result<(), Whatever> {
        let opts = self.logging.options()?;
        let json =
            serde_json::to_string_pretty(&opts).whatever_context("Failed to serialize config")?;
        println!("{json}");
        Ok(())
    }
}

fn read_options(path: &Path) -> Result<LoggingOptions, Whatever> {
    let contents = fs::read_to_string(path)
        .with_whatever_context(|_| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_whatever_context(|_| format!("Failed to parse config {}", path.display()))
}

/// Applies the level and file settings of the config at `path` to the
/// running logger.
fn reload_from(path: &Path) {
    let opts = match read_options(path) {
        Ok(opts) => opts,
        Err(e) => {
            warn!(error = %e, "Ignoring config change");
            return;
        }
    };
    if let Some(level) = &opts.level
        && let Err(e) = reload_level(level)
    {
        warn!(error = %e, "Failed to reload log level");
    }
    if let Some(file) = &opts.file
        && let Err(e) = reload_file_logging(file)
    {
        warn!(error = %e, "Failed to reload file logging");
    }
    info!(path = %path.display(), "Logging configuration reloaded");
}

fn watch_config(path: &Path) -> Result<RecommendedWatcher, Whatever> {
    let watched = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                reload_from(&watched);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Config watch error"),
        }
    })
    .whatever_context("Failed to create config watcher")?;
    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .with_whatever_context(|_| format!("Failed to watch {}", path.display()))?;
    info!(path = %path.display(), "Watching logging configuration");
    Ok(watcher)
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Emit(ea) => ea.run(),
        Commands::Config(ca) => ca.run(),
    }
}
