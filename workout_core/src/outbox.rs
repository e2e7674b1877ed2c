//! Upload outbox for finished workouts.
//!
//! The outbox is an append-only event log in JSON Lines. A `queued` record
//! carries a finished workout's payload and an `uploaded` record
//! acknowledges one by id; folding the log gives each workout's upload
//! state. Every write holds an exclusive lock so the app and an uploader
//! can share the file.
//!
//! Uploaded workouts are archived once they are rolled up: the log is
//! rewritten without them and the previous log is kept as `.processed`.

use crate::{Error, Result, WorkoutCompletion};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
enum OutboxRecord {
    Queued {
        queued_at: DateTime<Utc>,
        workout: WorkoutCompletion,
    },
    Uploaded {
        workout_id: Uuid,
        uploaded_at: DateTime<Utc>,
    },
}

impl OutboxRecord {
    fn workout_id(&self) -> Uuid {
        match self {
            OutboxRecord::Queued { workout, .. } => workout.id,
            OutboxRecord::Uploaded { workout_id, .. } => *workout_id,
        }
    }
}

/// A queued workout and its upload state
#[derive(Clone, Debug, PartialEq)]
pub struct OutboxEntry {
    pub workout: WorkoutCompletion,
    pub queued_at: DateTime<Utc>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn is_uploaded(&self) -> bool {
        self.uploaded_at.is_some()
    }
}

pub struct Outbox {
    path: PathBuf,
}

impl Outbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a finished workout for upload
    pub fn queue(&self, workout: &WorkoutCompletion) -> Result<()> {
        let file = self.open_for_append()?;
        file.lock_exclusive()?;
        let result = append_record(
            &file,
            &OutboxRecord::Queued {
                queued_at: Utc::now(),
                workout: workout.clone(),
            },
        );
        file.unlock()?;
        result?;

        tracing::info!("Queued workout {} for upload", workout.id);
        Ok(())
    }

    /// Acknowledge an upload
    ///
    /// Returns `false` (and writes nothing) when the workout is unknown or
    /// was already acknowledged.
    pub fn mark_uploaded(&self, workout_id: Uuid) -> Result<bool> {
        let file = self.open_for_append()?;
        file.lock_exclusive()?;
        let result = acknowledge(&file, workout_id);
        file.unlock()?;

        if matches!(result, Ok(true)) {
            tracing::info!("Workout {} marked uploaded", workout_id);
        }
        result
    }

    /// Every queued workout in queue order
    pub fn entries(&self) -> Result<Vec<OutboxEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let records = read_records(&file);
        file.unlock()?;

        let entries = fold(records?);
        tracing::debug!("Read {} workouts from outbox", entries.len());
        Ok(entries)
    }

    /// Workouts still waiting for upload
    pub fn pending(&self) -> Result<Vec<WorkoutCompletion>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| !e.is_uploaded())
            .map(|e| e.workout)
            .collect())
    }

    /// Drop `workout_ids` from the log
    ///
    /// The log as it was is renamed to `.processed`. Records of other
    /// workouts are written to a fresh log, which is omitted when nothing
    /// remains. Returns the number of workouts archived.
    pub fn archive(&self, workout_ids: &[Uuid]) -> Result<usize> {
        if workout_ids.is_empty() || !self.path.exists() {
            return Ok(0);
        }
        let archived: HashSet<Uuid> = workout_ids.iter().copied().collect();

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.lock_exclusive()?;
        let result = self.rewrite_without(&file, &archived);
        file.unlock()?;
        result
    }

    fn rewrite_without(&self, file: &File, archived: &HashSet<Uuid>) -> Result<usize> {
        let records = read_records(file)?;
        let count = fold(records.clone())
            .iter()
            .filter(|e| archived.contains(&e.workout.id))
            .count();
        if count == 0 {
            return Ok(0);
        }

        let kept: Vec<&OutboxRecord> = records
            .iter()
            .filter(|r| !archived.contains(&r.workout_id()))
            .collect();

        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Other("outbox path missing parent".into()))?;
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for record in &kept {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        let processed = self.path.with_extension("jsonl.processed");
        std::fs::rename(&self.path, &processed)?;
        if kept.is_empty() {
            tracing::debug!("Outbox emptied, no new log written");
        } else {
            temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        }

        tracing::info!(
            "Archived {} workouts from outbox to {:?} ({} records kept)",
            count,
            processed,
            kept.len()
        );
        Ok(count)
    }

    fn open_for_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?)
    }
}

fn acknowledge(file: &File, workout_id: Uuid) -> Result<bool> {
    let entries = fold(read_records(file)?);
    match entries.iter().find(|e| e.workout.id == workout_id) {
        Some(entry) if entry.is_uploaded() => {
            tracing::warn!("Workout {} already marked uploaded", workout_id);
            Ok(false)
        }
        Some(_) => {
            append_record(
                file,
                &OutboxRecord::Uploaded {
                    workout_id,
                    uploaded_at: Utc::now(),
                },
            )?;
            Ok(true)
        }
        None => {
            tracing::warn!("Workout {} is not in the outbox", workout_id);
            Ok(false)
        }
    }
}

/// Append one record, first terminating a torn trailing line
fn append_record(mut file: &File, record: &OutboxRecord) -> Result<()> {
    let len = file.metadata()?.len();
    let mut line = String::new();
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            line.push('\n');
        }
    }
    line.push_str(&serde_json::to_string(record)?);
    line.push('\n');

    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Parse every record, skipping lines that don't parse
fn read_records(mut file: &File) -> Result<Vec<OutboxRecord>> {
    file.seek(SeekFrom::Start(0))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutboxRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping outbox line {}: {}", line_num + 1, e);
            }
        }
    }
    Ok(records)
}

fn fold(records: Vec<OutboxRecord>) -> Vec<OutboxEntry> {
    let mut entries: Vec<OutboxEntry> = Vec::new();
    for record in records {
        match record {
            OutboxRecord::Queued { queued_at, workout } => {
                if entries.iter().any(|e| e.workout.id == workout.id) {
                    tracing::warn!("Workout {} queued twice, keeping first", workout.id);
                    continue;
                }
                entries.push(OutboxEntry {
                    workout,
                    queued_at,
                    uploaded_at: None,
                });
            }
            OutboxRecord::Uploaded {
                workout_id,
                uploaded_at,
            } => match entries.iter_mut().find(|e| e.workout.id == workout_id) {
                Some(entry) => {
                    entry.uploaded_at.get_or_insert(uploaded_at);
                }
                None => tracing::warn!("Upload of unknown workout {} ignored", workout_id),
            },
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::active;
    use crate::Superset;

    fn workout() -> WorkoutCompletion {
        let mut superset = Superset::new(active("squat"));
        superset.complete_current_set();
        WorkoutCompletion::from_supersets(&[superset], Utc::now())
    }

    fn outbox_in(dir: &tempfile::TempDir) -> Outbox {
        Outbox::new(dir.path().join("outbox").join("completions.jsonl"))
    }

    #[test]
    fn test_queued_workouts_are_pending() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        let (first, second) = (workout(), workout());

        outbox.queue(&first).unwrap();
        outbox.queue(&second).unwrap();

        assert_eq!(outbox.pending().unwrap(), vec![first, second]);
        let contents = std::fs::read_to_string(outbox.path()).unwrap();
        assert!(contents.lines().all(|l| l.contains(r#""event":"queued""#)));
    }

    #[test]
    fn test_mark_uploaded_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        let (first, second) = (workout(), workout());
        outbox.queue(&first).unwrap();
        outbox.queue(&second).unwrap();

        assert!(outbox.mark_uploaded(first.id).unwrap());
        assert!(!outbox.mark_uploaded(first.id).unwrap());
        assert!(!outbox.mark_uploaded(Uuid::new_v4()).unwrap());

        let entries = outbox.entries().unwrap();
        assert!(entries[0].is_uploaded());
        assert!(!entries[1].is_uploaded());
        assert_eq!(outbox.pending().unwrap(), vec![second]);
        assert_eq!(
            std::fs::read_to_string(outbox.path()).unwrap().lines().count(),
            3
        );
    }

    #[test]
    fn test_torn_line_is_skipped_and_terminated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        outbox.queue(&workout()).unwrap();

        let mut file = OpenOptions::new().append(true).open(outbox.path()).unwrap();
        write!(file, r#"{{"event":"queued","workout":{{"id""#).unwrap();
        drop(file);

        let next = workout();
        outbox.queue(&next).unwrap();
        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1], next);
    }

    #[test]
    fn test_archive_keeps_other_workouts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        let (done, waiting) = (workout(), workout());
        outbox.queue(&done).unwrap();
        outbox.queue(&waiting).unwrap();
        outbox.mark_uploaded(done.id).unwrap();

        assert_eq!(outbox.archive(&[done.id]).unwrap(), 1);
        assert!(outbox.path().with_extension("jsonl.processed").exists());

        let entries = outbox.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].workout, waiting);
        assert_eq!(outbox.archive(&[done.id]).unwrap(), 0);
    }

    #[test]
    fn test_archive_everything_removes_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        let only = workout();
        outbox.queue(&only).unwrap();

        assert_eq!(outbox.archive(&[only.id]).unwrap(), 1);
        assert!(!outbox.path().exists());
        assert!(outbox.entries().unwrap().is_empty());
    }

    #[test]
    fn test_missing_outbox_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let outbox = outbox_in(&temp_dir);
        assert!(outbox.entries().unwrap().is_empty());
        assert_eq!(outbox.archive(&[Uuid::new_v4()]).unwrap(), 0);
    }
}
