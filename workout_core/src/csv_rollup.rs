//! CSV rollup of uploaded workouts into a per-set training history.
//!
//! Each workout the outbox has seen acknowledged is flattened into one row
//! per set (reps, time or weight entry) and appended to a CSV file, after
//! which it is archived out of the outbox. Workouts still waiting for
//! upload stay queued.

use crate::outbox::Outbox;
use crate::{Result, SetPayload, WorkoutCompletion};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    workout_id: String,
    finished_at: String,
    superset_id: String,
    exercise_id: &'a str,
    title: &'a str,
    sequence: &'static str,
    set_index: usize,
    value: f64,
    done: bool,
    rest_time: u32,
}

fn rows(completion: &WorkoutCompletion) -> Vec<CsvRow<'_>> {
    let mut rows = Vec::new();
    for superset in &completion.supersets {
        for exercise in &superset.exercises {
            let sequences: [(&'static str, &[SetPayload]); 3] = [
                ("reps", &exercise.reps),
                ("times", &exercise.times),
                ("weight", &exercise.weight),
            ];
            for (sequence, sets) in sequences {
                for (set_index, set) in sets.iter().enumerate() {
                    rows.push(CsvRow {
                        workout_id: completion.id.to_string(),
                        finished_at: completion.finished_at.to_rfc3339(),
                        superset_id: superset.id.to_string(),
                        exercise_id: &exercise.id,
                        title: &exercise.title,
                        sequence,
                        set_index,
                        value: set.value,
                        done: set.is_done,
                        rest_time: set.rest_time,
                    });
                }
            }
        }
    }
    rows
}

/// Roll up uploaded workouts into CSV and archive them from the outbox
///
/// This function:
/// 1. Reads the uploaded workouts from the outbox
/// 2. Appends one row per set to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Archives those workouts, leaving pending ones queued
/// 5. Returns the number of workouts processed
pub fn outbox_to_csv_and_archive(outbox_path: &Path, csv_path: &Path) -> Result<usize> {
    let outbox = Outbox::new(outbox_path);
    let uploaded: Vec<WorkoutCompletion> = outbox
        .entries()?
        .into_iter()
        .filter(|e| e.is_uploaded())
        .map(|e| e.workout)
        .collect();

    if uploaded.is_empty() {
        tracing::info!("No uploaded workouts in outbox to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a fresh file gets the header row
    let needs_headers = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    let mut row_count = 0;
    for completion in &uploaded {
        for row in rows(completion) {
            writer.serialize(row)?;
            row_count += 1;
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!(
        "Wrote {} set rows from {} workouts to CSV",
        row_count,
        uploaded.len()
    );

    let ids: Vec<_> = uploaded.iter().map(|w| w.id).collect();
    outbox.archive(&ids)
}

/// Remove archived `.processed` outbox files from `dir`
pub fn cleanup_processed_outboxes(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed outbox: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed outbox files", count);
    }
    Ok(count)
}
