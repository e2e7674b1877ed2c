//! Core domain types for the Repset workout session engine.
//!
//! This module defines the value entities the session engine works on:
//! - Catalog exercises and how they are measured
//! - Sets (one unit of work with a completion flag)
//! - Active exercises (an in-progress catalog exercise with its sets)
//!
//! `Superset` lives in `superset.rs` together with its state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Catalog Types
// ============================================================================

/// How progress on an exercise is counted
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// Repetition count per set
    Reps,
    /// Duration in seconds per set
    Time,
}

/// A catalog exercise definition (e.g., "Barbell Back Squat")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub description: String,
    pub muscle_group: String,
    pub equipment: Vec<String>,
    pub measurement: Measurement,
    /// Whether sets carry a load (adds an index-aligned weight sequence)
    pub weighted: bool,
}

/// The catalog of exercises available for building a workout
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub exercises: HashMap<String, Exercise>,
}

// ============================================================================
// Set and Active Exercise Types
// ============================================================================

/// One performable unit of an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Set {
    pub id: Uuid,
    /// Reps, seconds or load, depending on which sequence holds the set
    pub value: f64,
    pub done: bool,
    pub rest_time_seconds: u32,
}

impl Set {
    pub fn new(value: f64, rest_time_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            done: false,
            rest_time_seconds,
        }
    }
}

/// Parameters used when instantiating an exercise from the catalog
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetPlan {
    pub set_count: usize,
    /// Target reps or seconds per set
    pub target: f64,
    pub rest_time_seconds: u32,
    /// Starting load for weighted exercises
    pub load: f64,
}

/// An in-progress instance of a catalog exercise
///
/// `reps` and `times` are parallel sequences; only the one matching
/// `exercise.measurement` is active. `weight` is either empty or
/// index-aligned with the active sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActiveExercise {
    pub id: Uuid,
    pub exercise: Exercise,
    pub reps: Vec<Set>,
    pub times: Vec<Set>,
    pub weight: Vec<Set>,
    pub done: bool,
}

impl ActiveExercise {
    /// Instantiate a catalog exercise with `plan.set_count` identical sets
    pub fn new(exercise: &Exercise, plan: SetPlan) -> Self {
        let count = plan.set_count.max(1);
        let planned: Vec<Set> = (0..count)
            .map(|_| Set::new(plan.target, plan.rest_time_seconds))
            .collect();

        let (reps, times) = match exercise.measurement {
            Measurement::Reps => (planned, Vec::new()),
            Measurement::Time => (Vec::new(), planned),
        };

        let weight = if exercise.weighted {
            (0..count)
                .map(|_| Set::new(plan.load, plan.rest_time_seconds))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            id: Uuid::new_v4(),
            exercise: exercise.clone(),
            reps,
            times,
            weight,
            done: false,
        }
    }

    /// The reps or times sequence, whichever the measurement selects
    pub fn active_sets(&self) -> &[Set] {
        match self.exercise.measurement {
            Measurement::Reps => &self.reps,
            Measurement::Time => &self.times,
        }
    }

    fn active_sets_mut(&mut self) -> &mut Vec<Set> {
        match self.exercise.measurement {
            Measurement::Reps => &mut self.reps,
            Measurement::Time => &mut self.times,
        }
    }

    pub fn set_count(&self) -> usize {
        self.active_sets().len()
    }

    pub fn sets_done(&self) -> usize {
        self.active_sets().iter().filter(|s| s.done).count()
    }

    /// Aggregate rest time across the active sequence
    pub fn rest_time_seconds(&self) -> u32 {
        self.active_sets().iter().map(|s| s.rest_time_seconds).sum()
    }

    /// Complete the first not-done set (and its load entry)
    ///
    /// Marks the exercise done once the last set completes. Returns the
    /// completed set, or `None` if every set was already done.
    pub fn complete_next_set(&mut self) -> Option<Set> {
        let index = self.active_sets().iter().position(|s| !s.done)?;
        self.active_sets_mut()[index].done = true;
        if let Some(load) = self.weight.get_mut(index) {
            load.done = true;
        }

        self.done = self.active_sets().iter().all(|s| s.done);
        Some(self.active_sets()[index].clone())
    }

    /// Edit a not-yet-completed set's target value and/or rest time
    ///
    /// The set may live in the active sequence or the weight sequence.
    /// Returns `false` when the set is unknown or already completed.
    pub fn edit_set(&mut self, set_id: Uuid, value: Option<f64>, rest: Option<u32>) -> bool {
        let measurement = self.exercise.measurement;
        let set = match measurement {
            Measurement::Reps => self.reps.iter_mut(),
            Measurement::Time => self.times.iter_mut(),
        }
        .chain(self.weight.iter_mut())
        .find(|s| s.id == set_id);

        let Some(set) = set else {
            tracing::warn!("Set {} not found on exercise {}", set_id, self.id);
            return false;
        };

        if set.done {
            tracing::warn!("Set {} already completed, edit ignored", set_id);
            return false;
        }

        if let Some(value) = value {
            set.value = value;
        }
        if let Some(rest) = rest {
            set.rest_time_seconds = rest;
        }
        true
    }

    /// Append a set copying the last set's target, rest and load
    pub fn add_set(&mut self) {
        let (value, rest) = self
            .active_sets()
            .last()
            .map(|s| (s.value, s.rest_time_seconds))
            .unwrap_or((0.0, 0));
        self.active_sets_mut().push(Set::new(value, rest));

        if let Some(load) = self.weight.last().map(|w| w.value) {
            self.weight.push(Set::new(load, rest));
        }
        self.done = false;
    }

    /// Drop the trailing set; an exercise always keeps at least one set
    pub fn remove_last_set(&mut self) -> bool {
        if self.active_sets().len() <= 1 {
            return false;
        }
        self.active_sets_mut().pop();
        if !self.weight.is_empty() {
            self.weight.pop();
        }
        self.done = self.active_sets().iter().all(|s| s.done);
        true
    }
}
