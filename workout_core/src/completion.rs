//! Outbound workout-completion payload.
//!
//! Field names and nesting are a wire contract with the remote service,
//! hence the camelCase renames.

use crate::{ActiveExercise, Measurement, Set, Superset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetPayload {
    pub id: Uuid,
    pub is_done: bool,
    pub value: f64,
    pub rest_time: u32,
}

impl From<&Set> for SetPayload {
    fn from(set: &Set) -> Self {
        Self {
            id: set.id,
            is_done: set.done,
            value: set.value,
            rest_time: set.rest_time_seconds,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExercisePayload {
    /// Catalog exercise id
    pub id: String,
    pub title: String,
    pub description: String,
    pub muscle_group: String,
    pub equipment: Vec<String>,
    pub measurement: Measurement,
    pub sets: usize,
    pub sets_done: usize,
    pub is_done: bool,
    pub reps: Vec<SetPayload>,
    pub times: Vec<SetPayload>,
    pub weight: Vec<SetPayload>,
}

impl From<&ActiveExercise> for ExercisePayload {
    fn from(active: &ActiveExercise) -> Self {
        let exercise = &active.exercise;
        Self {
            id: exercise.id.clone(),
            title: exercise.title.clone(),
            description: exercise.description.clone(),
            muscle_group: exercise.muscle_group.clone(),
            equipment: exercise.equipment.clone(),
            measurement: exercise.measurement,
            sets: active.set_count(),
            sets_done: active.sets_done(),
            is_done: active.done,
            reps: active.reps.iter().map(SetPayload::from).collect(),
            times: active.times.iter().map(SetPayload::from).collect(),
            weight: active.weight.iter().map(SetPayload::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupersetPayload {
    pub id: Uuid,
    pub is_done: bool,
    pub exercises: Vec<ExercisePayload>,
}

impl From<&Superset> for SupersetPayload {
    fn from(superset: &Superset) -> Self {
        Self {
            id: superset.id(),
            is_done: superset.is_done(),
            exercises: superset
                .exercises()
                .iter()
                .map(ExercisePayload::from)
                .collect(),
        }
    }
}

/// Everything performed in one workout, produced when the session ends
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutCompletion {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub supersets: Vec<SupersetPayload>,
}

impl WorkoutCompletion {
    /// Build the payload; the workout starts at the oldest superset
    pub fn from_supersets(supersets: &[Superset], finished_at: DateTime<Utc>) -> Self {
        let started_at = supersets
            .iter()
            .map(|s| s.created_at())
            .min()
            .unwrap_or(finished_at);

        Self {
            id: Uuid::new_v4(),
            started_at,
            finished_at,
            supersets: supersets.iter().map(SupersetPayload::from).collect(),
        }
    }

    pub fn sets_done(&self) -> usize {
        self.supersets
            .iter()
            .flat_map(|s| &s.exercises)
            .map(|e| e.sets_done)
            .sum()
    }
}
