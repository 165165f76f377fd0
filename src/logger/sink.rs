use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::timefmt::now_yyyymmddhhmmss;

/// Owns the currently-open log file (if any) and rolls over to a new one,
/// named `<dir>/<module><yyyymmddhhmmss>.log`, once it exceeds the
/// configured size limit.
pub(super) struct FileSink {
    dir: PathBuf,
    module: String,
    limit_bytes: u64,
    enabled: bool,
    file: Option<File>,
    bytes_written: u64,
    /// The `yyyymmddhhmmss` stamp of the currently-open file, and how many
    /// rollovers have landed on that same second so far. Rollover under
    /// sustained write volume can happen more than once per second; without
    /// a disambiguator a second rollover would reopen (and append to) the
    /// same path instead of starting a fresh file.
    last_stamp: Option<(String, u32)>,
}

impl FileSink {
    pub(super) fn new(dir: PathBuf, module: String, limit_mib: u32, enabled: bool) -> Self {
        FileSink {
            dir,
            module,
            limit_bytes: u64::from(limit_mib) * 1024 * 1024,
            enabled,
            file: None,
            bytes_written: 0,
            last_stamp: None,
        }
    }

    pub(super) fn write_line(&mut self, line: &str, to_console: bool) {
        if to_console {
            println!("{line}");
        }
        if !self.enabled {
            return;
        }
        if self.file.is_none() || self.bytes_written >= self.limit_bytes {
            self.roll_over();
        }
        if let Some(file) = &mut self.file {
            let mut bytes = line.as_bytes().to_vec();
            bytes.push(b'\n');
            if file.write_all(&bytes).is_ok() {
                self.bytes_written += bytes.len() as u64;
            }
        }
    }

    fn roll_over(&mut self) {
        let _ = std::fs::create_dir_all(&self.dir);
        let stamp = now_yyyymmddhhmmss();
        let suffix = match &mut self.last_stamp {
            Some((prev, count)) if *prev == stamp => {
                *count += 1;
                *count
            }
            _ => {
                self.last_stamp = Some((stamp.clone(), 0));
                0
            }
        };
        let name = if suffix == 0 {
            format!("{}{}.log", self.module, stamp)
        } else {
            format!("{}{}-{}.log", self.module, stamp, suffix)
        };
        let path = self.dir.join(name);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                self.file = Some(file);
                self.bytes_written = 0;
            }
            Err(err) => {
                log::error!("completio logger: failed to open {}: {err}", path.display());
            }
        }
    }
}
