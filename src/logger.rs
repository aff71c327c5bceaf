//! Process-wide logging to stderr or a log file.

use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<CredfsLogger> = OnceCell::new();

/// Installs the process-wide logger. The level comes from
/// `CREDFS_LOG_LEVEL` (default info); records go to `log_file` when given,
/// stderr otherwise. The log file must be opened before the daemon forks so
/// background mode keeps the same sink.
pub fn init(log_file: Option<PathBuf>) -> Result<()> {
    let level = std::env::var("CREDFS_LOG_LEVEL")
        .ok()
        .and_then(|value| LevelFilter::from_str(&value).ok())
        .unwrap_or(LevelFilter::Info);

    let sink = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {:?}", path))?;
            Sink::File(Mutex::new(LineWriter::new(file)))
        }
        None => Sink::Stderr,
    };

    let logger = LOGGER.get_or_init(|| CredfsLogger { level, sink });
    log::set_logger(logger)
        .map(|()| log::set_max_level(level))
        .context("logger already installed")?;
    Ok(())
}

enum Sink {
    Stderr,
    File(Mutex<LineWriter<File>>),
}

struct CredfsLogger {
    level: LevelFilter,
    sink: Sink,
}

impl Log for CredfsLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "[credfs] {} {} {}",
            chrono::Local::now().to_rfc3339(),
            record.level(),
            record.args()
        );
        match &self.sink {
            Sink::Stderr => {
                let _ = writeln!(io::stderr(), "{}", line);
            }
            Sink::File(writer) => {
                let _ = writeln!(writer.lock().unwrap(), "{}", line);
            }
        }
    }

    fn flush(&self) {
        match &self.sink {
            Sink::Stderr => {
                let _ = io::stderr().flush();
            }
            Sink::File(writer) => {
                let _ = writer.lock().unwrap().flush();
            }
        }
    }
}
