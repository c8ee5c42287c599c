//! Size- and time-bounded rolling file sink.
//!
//! # Roll Condition
//! ```text
//! before each write:
//!     now >= next roll time (creation time + interval)
//!  OR size > 0 && size + record > max size
//!     → rename active file to <stem>.<timestamp><ext>
//!       (name taken: Increment → <stem>.<timestamp>.<n><ext>, Overwrite → replace)
//!     → purge oldest archives beyond max_archived_files
//!     → open a fresh active file
//! ```

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{DateTime, Local, Months, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::formatter::Formatter;
use crate::sinks::error::SinkError;
use crate::sinks::file::{frame_record, open_append};
use crate::sinks::LogSink;

/// Default chrono pattern for archive names.
pub const DEFAULT_TIMESTAMP_PATTERN: &str = "%Y-%m-%d-%H-%M";

/// What to do when an archive name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollFileExists {
    /// Append a numeric suffix until the name is free.
    #[default]
    Increment,
    /// Replace the existing archive.
    Overwrite,
}

/// Time-based roll schedule, measured from the active file's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollInterval {
    #[default]
    None,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    /// Next local midnight after creation.
    Midnight,
}

impl RollInterval {
    /// When a file created at `created` becomes due for rolling.
    pub fn next_roll(&self, created: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            RollInterval::None => None,
            RollInterval::Minute => created.checked_add_signed(TimeDelta::minutes(1)),
            RollInterval::Hour => created.checked_add_signed(TimeDelta::hours(1)),
            RollInterval::Day => created.checked_add_signed(TimeDelta::days(1)),
            RollInterval::Week => created.checked_add_signed(TimeDelta::weeks(1)),
            RollInterval::Month => created.checked_add_months(Months::new(1)),
            RollInterval::Year => created.checked_add_months(Months::new(12)),
            RollInterval::Midnight => created
                .date_naive()
                .succ_opt()?
                .and_hms_opt(0, 0, 0)?
                .and_local_timezone(Local)
                .earliest(),
        }
    }
}

/// Roll and retention settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollPolicy {
    /// Roll when the next record would push the file past this size. 0 disables.
    pub max_size_bytes: u64,
    pub interval: RollInterval,
    /// chrono format used in archive names.
    pub timestamp_pattern: String,
    pub file_exists: RollFileExists,
    /// Archives kept after a roll. 0 keeps everything.
    pub max_archived_files: usize,
}

impl Default for RollPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 20 * 1024,
            interval: RollInterval::None,
            timestamp_pattern: DEFAULT_TIMESTAMP_PATTERN.to_string(),
            file_exists: RollFileExists::Increment,
            max_archived_files: 15,
        }
    }
}

#[derive(Debug)]
struct ActiveFile {
    file: File,
    size: u64,
    next_roll: Option<DateTime<Local>>,
}

/// Flat file sink that rotates its file by size and/or time.
#[derive(Debug)]
pub struct RollingFileSink {
    name: String,
    path: PathBuf,
    header: String,
    footer: String,
    formatter: Box<dyn Formatter>,
    min_severity: Option<Severity>,
    policy: RollPolicy,
    active: Mutex<Option<ActiveFile>>,
}

impl RollingFileSink {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        header: impl Into<String>,
        footer: impl Into<String>,
        formatter: Box<dyn Formatter>,
        policy: RollPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            header: header.into(),
            footer: footer.into(),
            formatter,
            min_severity: None,
            policy,
            active: Mutex::new(None),
        }
    }

    pub fn with_min_severity(mut self, min: Option<Severity>) -> Self {
        self.min_severity = min;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RollPolicy {
        &self.policy
    }

    /// Write a framed record as if the current time were `now`.
    pub(crate) fn write_at(&self, now: DateTime<Local>, record: &[u8]) -> io::Result<()> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if active.is_none() {
            *active = Some(self.open_active(now)?);
        }
        let Some(current) = active.as_mut() else {
            return Err(io::Error::other("active file unavailable"));
        };

        let record_len = record.len() as u64;
        let size_due = self.policy.max_size_bytes > 0
            && current.size > 0
            && current.size.saturating_add(record_len) > self.policy.max_size_bytes;
        let time_due = current.next_roll.is_some_and(|due| now >= due);

        if size_due || (time_due && current.size > 0) {
            *active = None;
            self.roll(now)?;
            *active = Some(self.open_active(now)?);
        } else if time_due {
            current.next_roll = self.policy.interval.next_roll(now);
        }

        let Some(current) = active.as_mut() else {
            return Err(io::Error::other("active file unavailable"));
        };
        let result = io::Write::write_all(&mut current.file, record)
            .and_then(|()| io::Write::flush(&mut current.file));
        match result {
            Ok(()) => {
                current.size = current.size.saturating_add(record_len);
                Ok(())
            }
            Err(e) => {
                *active = None;
                Err(e)
            }
        }
    }

    fn open_active(&self, now: DateTime<Local>) -> io::Result<ActiveFile> {
        let file = open_append(&self.path)?;
        let metadata = file.metadata()?;
        let size = metadata.len();

        let created = if size == 0 {
            now
        } else {
            metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Local>::from)
                .unwrap_or(now)
        };

        Ok(ActiveFile {
            file,
            size,
            next_roll: self.policy.interval.next_roll(created),
        })
    }

    fn roll(&self, now: DateTime<Local>) -> io::Result<()> {
        let archive = self.archive_path(now)?;
        if archive.exists() {
            // Overwrite policy; Increment never returns a taken name.
            fs::remove_file(&archive)?;
        }
        fs::rename(&self.path, &archive)?;
        tracing::debug!(
            sink = %self.name,
            archive = %archive.display(),
            "rolled log file"
        );

        if self.policy.max_archived_files > 0 {
            self.purge_archives()?;
        }
        Ok(())
    }

    fn archive_path(&self, now: DateTime<Local>) -> io::Result<PathBuf> {
        let (dir, stem, ext) = self.split_path();
        let mut stamp = String::new();
        write!(stamp, "{}", now.format(&self.policy.timestamp_pattern)).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid timestamp pattern `{}`", self.policy.timestamp_pattern),
            )
        })?;
        if stamp.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("timestamp `{stamp}` contains a path separator"),
            ));
        }

        let base = dir.join(format!("{stem}.{stamp}{ext}"));
        if !base.exists() || self.policy.file_exists == RollFileExists::Overwrite {
            return Ok(base);
        }

        for n in 1..=u32::MAX {
            let candidate = dir.join(format!("{stem}.{stamp}.{n}{ext}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free archive name",
        ))
    }

    /// Archives of this sink, oldest first.
    pub fn archives(&self) -> io::Result<Vec<PathBuf>> {
        let (dir, stem, ext) = self.split_path();
        let prefix = format!("{stem}.");
        let active_name = self.path.file_name();

        let mut found: Vec<(SystemTime, u32, PathBuf)> = Vec::new();
        for dir_entry in fs::read_dir(&dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.file_name() == active_name || !dir_entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(middle) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(ext.as_str()))
            else {
                continue;
            };
            let Some(sequence) = self.archive_sequence(middle) else {
                continue;
            };
            let modified = dir_entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, sequence, path));
        }

        found.sort();
        Ok(found.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Sequence number of an archive name's middle part (`<timestamp>` is 0,
    /// `<timestamp>.<n>` is n), or `None` if it is not one of ours.
    fn archive_sequence(&self, middle: &str) -> Option<u32> {
        if self.matches_pattern(middle) {
            return Some(0);
        }
        let (stamp, n) = middle.rsplit_once('.')?;
        let n = n.parse::<u32>().ok()?;
        self.matches_pattern(stamp).then_some(n)
    }

    fn matches_pattern(&self, stamp: &str) -> bool {
        if stamp.is_empty() {
            return false;
        }
        let mut parsed = Parsed::new();
        format::parse(
            &mut parsed,
            stamp,
            StrftimeItems::new(&self.policy.timestamp_pattern),
        )
        .is_ok()
    }

    fn purge_archives(&self) -> io::Result<()> {
        let archives = self.archives()?;
        let excess = archives
            .len()
            .saturating_sub(self.policy.max_archived_files);
        for old in archives.into_iter().take(excess) {
            fs::remove_file(&old)?;
            tracing::debug!(sink = %self.name, archive = %old.display(), "purged log archive");
        }
        Ok(())
    }

    fn split_path(&self) -> (PathBuf, String, String) {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (dir, stem, ext)
    }
}

impl LogSink for RollingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_severity(&self) -> Option<Severity> {
        self.min_severity
    }

    fn format(&self, entry: &LogEntry) -> String {
        self.formatter.format(entry)
    }

    fn emit(&self, formatted: &str, _entry: &LogEntry) -> Result<(), SinkError> {
        let record = frame_record(&self.header, formatted, &self.footer);
        self.write_at(Local::now(), record.as_bytes())
            .map_err(|e| SinkError::io(&self.name, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::formatter::TextFormatter;
    use chrono::TimeZone;

    fn sink(dir: &Path, policy: RollPolicy) -> RollingFileSink {
        RollingFileSink::new(
            "rolling",
            dir.join("RollingFlatFile.log"),
            "",
            "",
            Box::new(TextFormatter::new("{message}")),
            policy,
        )
    }

    fn at(minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_next_roll_times() {
        let created = at(15);
        assert_eq!(RollInterval::None.next_roll(created), None);
        assert_eq!(RollInterval::Minute.next_roll(created), Some(at(16)));
        assert_eq!(
            RollInterval::Midnight.next_roll(created),
            Local.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).earliest()
        );
        assert_eq!(
            RollInterval::Month.next_roll(created),
            Local.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).earliest()
        );
    }

    #[test]
    fn test_size_roll_moves_exceeding_record_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 10,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        sink.write_at(at(0), b"aaaa\n").unwrap();
        sink.write_at(at(0), b"bbbb\n").unwrap();
        sink.write_at(at(0), b"cccc\n").unwrap();

        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(fs::read_to_string(&archives[0]).unwrap(), "aaaa\nbbbb\n");
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "cccc\n");
        assert!(archives[0]
            .to_string_lossy()
            .ends_with("RollingFlatFile.2024-05-01-10-00.log"));
    }

    #[test]
    fn test_oversized_record_into_empty_file_does_not_roll() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 4,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        sink.write_at(at(0), b"much too long\n").unwrap();
        assert!(sink.archives().unwrap().is_empty());
    }

    #[test]
    fn test_increment_on_name_collision() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        for record in [b"1\n", b"2\n", b"3\n"] {
            sink.write_at(at(0), record).unwrap();
        }

        assert!(dir.path().join("RollingFlatFile.2024-05-01-10-00.log").exists());
        assert!(dir.path().join("RollingFlatFile.2024-05-01-10-00.1.log").exists());
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "3\n");
    }

    #[test]
    fn test_overwrite_on_name_collision() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            file_exists: RollFileExists::Overwrite,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        for record in [b"1\n", b"2\n", b"3\n"] {
            sink.write_at(at(0), record).unwrap();
        }

        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(fs::read_to_string(&archives[0]).unwrap(), "2\n");
    }

    #[test]
    fn test_neighbouring_files_are_not_archives() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            max_archived_files: 1,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);
        let audit = dir.path().join("RollingFlatFile.audit.log");
        let dated = dir.path().join("RollingFlatFile.2024-05-01.log");
        fs::write(&audit, "keep\n").unwrap();
        fs::write(&dated, "keep\n").unwrap();

        for record in [b"1\n", b"2\n", b"3\n"] {
            sink.write_at(at(0), record).unwrap();
        }

        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert!(archives[0]
            .to_string_lossy()
            .ends_with("RollingFlatFile.2024-05-01-10-00.1.log"));
        assert!(audit.exists());
        assert!(dated.exists());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            timestamp_pattern: "%Q".to_string(),
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        sink.write_at(at(0), b"1\n").unwrap();
        let err = sink.write_at(at(0), b"2\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "1\n");
    }

    #[test]
    fn test_separator_in_timestamp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            timestamp_pattern: "%Y/%m".to_string(),
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        sink.write_at(at(0), b"1\n").unwrap();
        assert!(sink.write_at(at(0), b"2\n").is_err());
    }

    #[test]
    fn test_time_roll() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 0,
            interval: RollInterval::Minute,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        sink.write_at(at(0), b"early\n").unwrap();
        sink.write_at(at(0), b"still early\n").unwrap();
        sink.write_at(at(1), b"late\n").unwrap();

        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(
            fs::read_to_string(&archives[0]).unwrap(),
            "early\nstill early\n"
        );
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "late\n");
    }

    #[test]
    fn test_retention_removes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RollPolicy {
            max_size_bytes: 1,
            max_archived_files: 2,
            ..RollPolicy::default()
        };
        let sink = sink(dir.path(), policy);

        for minute in 0..5 {
            sink.write_at(at(minute), format!("{minute}\n").as_bytes())
                .unwrap();
        }

        let archives = sink.archives().unwrap();
        assert_eq!(archives.len(), 2);
        assert!(!dir.path().join("RollingFlatFile.2024-05-01-10-01.log").exists());
        assert!(!dir.path().join("RollingFlatFile.2024-05-01-10-02.log").exists());
        assert_eq!(fs::read_to_string(&archives[1]).unwrap(), "3\n");
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "4\n");
    }
}
