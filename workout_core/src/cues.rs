//! Rest-timer and completion cues.
//!
//! The controller owns a `Cues` handle passed in by the embedder (sound,
//! vibration, local notification). Nothing here is global.

use uuid::Uuid;

pub trait Cues: Send + Sync {
    /// A set was completed and a rest period of `seconds` begins
    fn rest_started(&self, exercise_id: Uuid, seconds: u32);

    /// Every exercise of the superset is done
    fn superset_completed(&self, superset_id: Uuid);
}

/// Cues that do nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentCues;

impl Cues for SilentCues {
    fn rest_started(&self, _exercise_id: Uuid, _seconds: u32) {}

    fn superset_completed(&self, _superset_id: Uuid) {}
}

/// Cues reported through tracing, used by the CLI
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCues;

impl Cues for LogCues {
    fn rest_started(&self, exercise_id: Uuid, seconds: u32) {
        tracing::info!("Rest {}s after set of exercise {}", seconds, exercise_id);
    }

    fn superset_completed(&self, superset_id: Uuid) {
        tracing::info!("Superset {} finished", superset_id);
    }
}
