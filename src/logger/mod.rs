//! A leveled, optionally asynchronous, file+console logging sink.
//!
//! This is deliberately independent of the `log` crate used elsewhere in
//! this crate for its own internal diagnostics (selector registration,
//! worker lifecycle, pool exhaustion) -- that's instrumentation *of* the
//! runtime; `Logger` is a sink *for* the application embedding it, with its
//! own rollover and hex-dump conveniences the `log` facade doesn't provide.

mod hexdump;
mod sink;

pub use hexdump::MAX_LOG_INFO_SIZE;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::thread::Thread;

use sink::FileSink;

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default and maximum per-file size limit, in MiB.
pub const DEFAULT_FILESIZE_LIMIT_MIB: u32 = 10;
pub const MAX_FILESIZE_LIMIT_MIB: u32 = 2048;

/// Logger configuration. `Default` matches the documented defaults.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Names rolled-over files: `<dir>/<module><yyyymmddhhmmss>.log`.
    pub module: String,
    pub dir: PathBuf,
    pub to_file: bool,
    pub to_console: bool,
    /// When `true`, entries are queued and written by a background thread
    /// that swaps buffers every 100 ms; when `false`, writes happen inline
    /// under a mutex.
    pub asynchronous: bool,
    pub filesize_limit_mib: u32,
    /// Entries below this level are dropped at the call site.
    pub min_level: Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            module: "completio".to_string(),
            dir: PathBuf::from("."),
            to_file: false,
            to_console: true,
            asynchronous: false,
            filesize_limit_mib: DEFAULT_FILESIZE_LIMIT_MIB,
            min_level: Level::Trace,
        }
    }
}

struct AsyncState {
    /// Entries not yet picked up by the background writer.
    input: Mutex<Vec<String>>,
    /// Signaled whenever `input` transitions to empty, for `Flush`.
    input_drained: Condvar,
    drained_lock: Mutex<bool>,
    writer: Mutex<Thread>,
}

/// A leveled logger with a file and/or console sink.
pub struct Logger {
    config: LoggerConfig,
    sink: Arc<Mutex<FileSink>>,
    to_console: bool,
    min_level: Level,
    async_state: Option<Arc<AsyncState>>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        let filesize_limit_mib = config.filesize_limit_mib.clamp(1, MAX_FILESIZE_LIMIT_MIB);
        let sink = FileSink::new(
            config.dir.clone(),
            config.module.clone(),
            filesize_limit_mib,
            config.to_file,
        );

        let mut logger = Logger {
            to_console: config.to_console,
            min_level: config.min_level,
            sink: Arc::new(Mutex::new(sink)),
            async_state: None,
            config,
        };

        if logger.config.asynchronous {
            logger.spawn_async_writer();
        }
        logger
    }

    fn spawn_async_writer(&mut self) {
        let state = Arc::new(AsyncState {
            input: Mutex::new(Vec::new()),
            input_drained: Condvar::new(),
            drained_lock: Mutex::new(true),
            writer: Mutex::new(Thread::new(format!("{}-log-writer", self.config.module))),
        });

        let sink = Arc::clone(&self.sink);
        let to_console = self.to_console;
        let loop_state = Arc::clone(&state);
        state
            .writer
            .lock()
            .unwrap()
            .start(move |ctx| {
                loop {
                    let stop_now = ctx.wait_unless_signalled(Duration::from_millis(100));
                    let batch = std::mem::take(&mut *loop_state.input.lock().unwrap());
                    if !batch.is_empty() {
                        let mut sink = sink.lock().unwrap();
                        for line in &batch {
                            sink.write_line(line, to_console);
                        }
                    }
                    *loop_state.drained_lock.lock().unwrap() = true;
                    loop_state.input_drained.notify_all();
                    if stop_now {
                        return;
                    }
                }
            })
            .expect("spawning the logger's async writer thread should not fail");

        self.async_state = Some(state);
    }

    /// Literal-string entry point for `level`. Dropped below `min_level`.
    pub fn log(&self, level: Level, message: &str) {
        if level < self.min_level {
            return;
        }
        let line = format!("[{}] {}", level, message);
        self.emit(line);
    }

    /// Formatted entry point for `level`, e.g. via the per-level macros.
    pub fn log_args(&self, level: Level, args: fmt::Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        self.log(level, &args.to_string());
    }

    fn emit(&self, line: String) {
        match &self.async_state {
            None => {
                let mut sink = self.sink.lock().unwrap();
                sink.write_line(&line, self.to_console);
            }
            Some(state) => {
                *state.drained_lock.lock().unwrap() = false;
                state.input.lock().unwrap().push(line);
            }
        }
    }

    /// Writes up to [`MAX_LOG_INFO_SIZE`] bytes of `data` as a hex dump at
    /// `level`, `bytes_per_line` bytes per line, with a space between byte
    /// pairs when `spaced` is set.
    pub fn hex_dump(&self, level: Level, data: &[u8], bytes_per_line: usize, spaced: bool) {
        for line in hexdump::format(data, bytes_per_line, spaced) {
            self.log(level, &line);
        }
    }

    /// Blocks until every entry submitted before this call has been
    /// written out. A no-op in synchronous mode, where entries are already
    /// written inline by the time the call that submitted them returns.
    pub fn flush(&self) {
        let Some(state) = &self.async_state else {
            return;
        };
        let mut drained = state.drained_lock.lock().unwrap();
        while !*drained || !state.input.lock().unwrap().is_empty() {
            drained = state.input_drained.wait(drained).unwrap();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Some(state) = self.async_state.take() {
            state.writer.lock().unwrap().stop(Duration::from_secs(2));
        }
    }
}

macro_rules! level_macro {
    ($name:ident, $level:expr) => {
        /// Logs a formatted entry at this level through `$logger`.
        #[macro_export]
        macro_rules! $name {
            ($logger:expr, $($arg:tt)+) => {
                $logger.log_args($level, format_args!($($arg)+))
            };
        }
    };
}

level_macro!(completio_trace, $crate::logger::Level::Trace);
level_macro!(completio_debug, $crate::logger::Level::Debug);
level_macro!(completio_info, $crate::logger::Level::Info);
level_macro!(completio_warn, $crate::logger::Level::Warn);
level_macro!(completio_error, $crate::logger::Level::Error);
level_macro!(completio_fatal, $crate::logger::Level::Fatal);

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("completio-logger-test-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sync_write_lands_in_file() {
        let dir = tmp_dir("sync");
        let logger = Logger::new(LoggerConfig {
            module: "sync".into(),
            dir: dir.clone(),
            to_file: true,
            to_console: false,
            asynchronous: false,
            ..Default::default()
        });
        logger.log(Level::Info, "hello");
        let files: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("hello"));
    }

    #[test]
    fn async_flush_waits_for_drain() {
        let dir = tmp_dir("async");
        let logger = Logger::new(LoggerConfig {
            module: "async".into(),
            dir: dir.clone(),
            to_file: true,
            to_console: false,
            asynchronous: true,
            ..Default::default()
        });
        for i in 0..50 {
            logger.log(Level::Info, &format!("line {i}"));
        }
        logger.flush();
        let files: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("line 49"));
    }

    #[test]
    fn rollover_splits_into_files_at_the_size_limit() {
        let dir = tmp_dir("rollover");
        let logger = Logger::new(LoggerConfig {
            module: "rollover".into(),
            dir: dir.clone(),
            to_file: true,
            to_console: false,
            asynchronous: false,
            filesize_limit_mib: 1,
            ..Default::default()
        });

        // `[INFO] 00000000 xxxxxxxxxx\n` is the exact wire shape `write_line`
        // appends; size the run so two 1 MiB files, not more, are produced.
        let payload = "x".repeat(10);
        let bytes_per_line = format!("[{}] {:08} {}", Level::Info, 0, payload).len() + 1;
        let limit_bytes = 1024 * 1024u64;
        let line_count = (2 * limit_bytes as usize) / bytes_per_line;
        for i in 0..line_count {
            logger.log(Level::Info, &format!("{i:08} {payload}"));
        }

        let mut files: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 2, "expected exactly two rolled-over files");

        let mut seen = 0usize;
        for path in &files {
            let size = fs::metadata(path).unwrap().len();
            assert!(
                size <= limit_bytes + 64,
                "file {path:?} exceeded the size limit by more than one line: {size} bytes"
            );
            let content = fs::read_to_string(path).unwrap();
            for entry in content.lines() {
                let index: usize = entry
                    .split_whitespace()
                    .nth(1)
                    .expect("line should carry its sequence number")
                    .parse()
                    .expect("sequence number should parse");
                assert_eq!(index, seen, "lines must appear in submission order");
                seen += 1;
            }
        }
        assert_eq!(seen, line_count);
    }

    #[test]
    fn min_level_drops_below_threshold() {
        let dir = tmp_dir("minlevel");
        let logger = Logger::new(LoggerConfig {
            module: "minlevel".into(),
            dir: dir.clone(),
            to_file: true,
            to_console: false,
            asynchronous: false,
            min_level: Level::Warn,
            ..Default::default()
        });
        logger.log(Level::Debug, "should not appear");
        logger.log(Level::Error, "should appear");
        let files: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(!content.contains("should not appear"));
        assert!(content.contains("should appear"));
    }
}
