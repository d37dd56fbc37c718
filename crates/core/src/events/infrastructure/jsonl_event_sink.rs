use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::domain::event_sink::EventSink;
use crate::events::domain::events::{AttendanceEvent, AttendanceOutcome, ParticipationEvent};
use crate::recognition::domain::encoding::PersonId;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("failed to open event log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to append to event log {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One line of the log.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LogRecord {
    Attendance(AttendanceEvent),
    Participation(ParticipationEvent),
}

/// Append-only JSON-lines event log.
///
/// Attendance idempotency survives restarts: the set of (person, date)
/// pairs already recorded is rebuilt from the file when it is opened.
/// A record torn by a crash or a failed write is left in place as a
/// malformed line; the next record always starts on a fresh line.
pub struct JsonlEventSink {
    path: PathBuf,
    file: File,
    attended: HashSet<(PersonId, NaiveDate)>,
    /// The file does not end with a newline.
    mid_line: bool,
}

impl JsonlEventSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EventLogError> {
        let path = path.into();
        let open_err = |path: &Path, e: std::io::Error| EventLogError::Open {
            path: path.to_path_buf(),
            source: e,
        };

        let (attended, mid_line) = if path.exists() {
            let mut file = File::open(&path).map_err(|e| open_err(&path, e))?;
            let mid_line = ends_mid_line(&mut file).map_err(|e| open_err(&path, e))?;
            file.rewind().map_err(|e| open_err(&path, e))?;
            (scan_attendance(&path, BufReader::new(file)), mid_line)
        } else {
            (HashSet::new(), false)
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| open_err(&path, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| open_err(&path, e))?;

        log::info!(
            "Event log {} opened ({} attendance records)",
            path.display(),
            attended.len()
        );
        Ok(Self {
            path,
            file,
            attended,
            mid_line,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, record: &LogRecord) -> Result<(), EventLogError> {
        let mut line = String::new();
        if self.mid_line {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(record)?);
        line.push('\n');

        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush());
        // A failed write may have left part of the line behind.
        self.mid_line = written.is_err();
        written.map_err(|e| EventLogError::Append {
            path: self.path.clone(),
            source: e,
        })
    }
}

fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn scan_attendance(path: &Path, reader: impl BufRead) -> HashSet<(PersonId, NaiveDate)> {
    let mut attended = HashSet::new();
    for (n, line) in reader.lines().enumerate() {
        let Ok(line) = line else {
            log::warn!("Stopped reading {} at line {}", path.display(), n + 1);
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(&line) {
            Ok(LogRecord::Attendance(event)) => {
                attended.insert((event.person_id, event.date));
            }
            Ok(LogRecord::Participation(_)) => {}
            Err(e) => log::warn!("Skipping malformed line {} in {}: {e}", n + 1, path.display()),
        }
    }
    attended
}

impl EventSink for JsonlEventSink {
    fn attendance(
        &mut self,
        event: &AttendanceEvent,
    ) -> Result<AttendanceOutcome, Box<dyn std::error::Error>> {
        let key = (event.person_id, event.date);
        if self.attended.contains(&key) {
            return Ok(AttendanceOutcome::Duplicate);
        }
        self.append(&LogRecord::Attendance(event.clone()))?;
        self.attended.insert(key);
        Ok(AttendanceOutcome::Accepted)
    }

    fn participation(
        &mut self,
        event: &ParticipationEvent,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.append(&LogRecord::Participation(event.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::domain::events::ParticipationKind;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn day(d: u32, h: u32) -> crate::shared::clock::Timestamp {
        Local.with_ymd_and_hms(2024, 10, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_attendance_is_idempotent_per_date() {
        let tmp = TempDir::new().unwrap();
        let mut sink = JsonlEventSink::open(tmp.path().join("events.jsonl")).unwrap();

        let first = sink.attendance(&AttendanceEvent::new(4, day(1, 9), 0.8)).unwrap();
        let again = sink.attendance(&AttendanceEvent::new(4, day(1, 11), 0.8)).unwrap();
        let next = sink.attendance(&AttendanceEvent::new(4, day(2, 9), 0.8)).unwrap();

        assert_eq!(first, AttendanceOutcome::Accepted);
        assert_eq!(again, AttendanceOutcome::Duplicate);
        assert_eq!(next, AttendanceOutcome::Accepted);
    }

    #[test]
    fn test_index_is_rebuilt_on_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        {
            let mut sink = JsonlEventSink::open(&path).unwrap();
            sink.attendance(&AttendanceEvent::new(4, day(1, 9), 0.8)).unwrap();
            sink.participation(&ParticipationEvent::new(
                4,
                day(1, 9),
                0.6,
                ParticipationKind::HandRaised,
            ))
            .unwrap();
        }

        let mut reopened = JsonlEventSink::open(&path).unwrap();
        assert_eq!(
            reopened.attendance(&AttendanceEvent::new(4, day(1, 15), 0.9)).unwrap(),
            AttendanceOutcome::Duplicate
        );

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"attendance\""));
        assert!(lines[1].contains("\"kind\":\"hand_raised\""));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        fs::write(&path, "not json\n\n").unwrap();

        let mut sink = JsonlEventSink::open(&path).unwrap();
        assert_eq!(
            sink.attendance(&AttendanceEvent::new(1, day(3, 9), 0.7)).unwrap(),
            AttendanceOutcome::Accepted
        );
    }

    #[test]
    fn test_torn_last_line_does_not_swallow_next_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        let complete =
            serde_json::to_string(&LogRecord::Attendance(AttendanceEvent::new(1, day(1, 8), 0.9)))
                .unwrap();
        fs::write(&path, format!("{complete}\n{{\"type\":\"attendance\",\"per")).unwrap();

        {
            let mut sink = JsonlEventSink::open(&path).unwrap();
            sink.attendance(&AttendanceEvent::new(4, day(1, 9), 0.8)).unwrap();
            sink.attendance(&AttendanceEvent::new(5, day(1, 9), 0.8)).unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "{\"type\":\"attendance\",\"per");
        assert!(serde_json::from_str::<LogRecord>(lines[2]).is_ok());

        let mut reopened = JsonlEventSink::open(&path).unwrap();
        for person in [1, 4, 5] {
            assert_eq!(
                reopened.attendance(&AttendanceEvent::new(person, day(1, 15), 0.9)).unwrap(),
                AttendanceOutcome::Duplicate,
                "person {person}"
            );
        }
    }

    #[test]
    fn test_clean_file_gets_no_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        {
            let mut sink = JsonlEventSink::open(&path).unwrap();
            sink.attendance(&AttendanceEvent::new(4, day(1, 9), 0.8)).unwrap();
        }
        {
            let mut sink = JsonlEventSink::open(&path).unwrap();
            sink.attendance(&AttendanceEvent::new(5, day(1, 9), 0.8)).unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().all(|l| !l.is_empty()));
    }

    #[test]
    fn test_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("events.jsonl");
        let sink = JsonlEventSink::open(&path).unwrap();
        assert!(sink.path().exists());
    }
}
