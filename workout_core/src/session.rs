//! The ordered collection of supersets making up the current workout.
//!
//! `Session` owns every `Superset` and keeps an explicit index from
//! exercise id to the superset holding it. Exercises are only ever moved
//! (taken out of one superset, then inserted into another), so an exercise
//! id maps to exactly one superset at any time.
//!
//! Every mutation returns a `Touched` summary listing the supersets that
//! need to be written through the persistence gateway.

use crate::{ActiveExercise, SetOutcome, Superset};
use std::collections::HashMap;
use uuid::Uuid;

/// Supersets affected by a session mutation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Touched {
    pub inserted: Vec<Superset>,
    pub updated: Vec<Superset>,
    pub deleted: Vec<Uuid>,
}

impl Touched {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    supersets: Vec<Superset>,
    owners: HashMap<Uuid, Uuid>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from stored supersets
    ///
    /// Supersets are ordered by creation time and their derived fields are
    /// re-derived. An exercise id seen twice keeps its first owner, and a
    /// superset left empty is dropped. The returned `Touched` lists what has
    /// to be written back so storage matches the session.
    pub fn from_supersets(mut supersets: Vec<Superset>) -> (Self, Touched) {
        supersets.sort_by_key(|s| s.created_at());

        let mut session = Self::new();
        let mut touched = Touched::default();
        for mut superset in supersets {
            let duplicates: Vec<Uuid> = superset
                .exercises()
                .iter()
                .map(|e| e.id)
                .filter(|id| session.owners.contains_key(id))
                .collect();
            let deduped = !duplicates.is_empty();
            for id in duplicates {
                tracing::warn!(
                    "Exercise {} stored in more than one superset, keeping first",
                    id
                );
                superset.remove_exercise(id);
            }

            if superset.is_empty() {
                tracing::warn!("Dropping empty stored superset {}", superset.id());
                touched.deleted.push(superset.id());
                continue;
            }
            if superset.repair() || deduped {
                touched.updated.push(superset.clone());
            }
            session.index(&superset);
            session.supersets.push(superset);
        }
        (session, touched)
    }

    pub fn supersets(&self) -> &[Superset] {
        &self.supersets
    }

    pub fn superset(&self, id: Uuid) -> Option<&Superset> {
        self.supersets.iter().find(|s| s.id() == id)
    }

    pub fn owner_of(&self, exercise_id: Uuid) -> Option<Uuid> {
        self.owners.get(&exercise_id).copied()
    }

    pub fn exercise(&self, exercise_id: Uuid) -> Option<&ActiveExercise> {
        let owner = self.owner_of(exercise_id)?;
        self.superset(owner)?.exercise(exercise_id)
    }

    pub fn exercise_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supersets.is_empty()
    }

    fn position(&self, superset_id: Uuid) -> Option<usize> {
        self.supersets.iter().position(|s| s.id() == superset_id)
    }

    fn index(&mut self, superset: &Superset) {
        for exercise in superset.exercises() {
            self.owners.insert(exercise.id, superset.id());
        }
    }

    /// Record `index` as touched, destroying it if it became empty
    fn settle(&mut self, index: usize, touched: &mut Touched) {
        if self.supersets[index].is_empty() {
            let removed = self.supersets.remove(index);
            tracing::info!("Superset {} emptied and destroyed", removed.id());
            touched.deleted.push(removed.id());
        } else {
            touched.updated.push(self.supersets[index].clone());
        }
    }

    /// Append a new superset to the end of the session
    pub fn add_superset(&mut self, superset: Superset) -> Touched {
        self.index(&superset);
        let touched = Touched {
            inserted: vec![superset.clone()],
            ..Touched::default()
        };
        self.supersets.push(superset);
        touched
    }

    /// Move an exercise into another superset (appended at the end)
    pub fn move_exercise(&mut self, exercise_id: Uuid, from: Uuid, to: Uuid) -> Option<Touched> {
        if from == to || self.owner_of(exercise_id) != Some(from) {
            return None;
        }
        let to_index = self.position(to)?;
        let from_index = self.position(from)?;

        let exercise = self.supersets[from_index].take_exercise(exercise_id)?;
        self.supersets[to_index].add_exercise(exercise, None);
        self.owners.insert(exercise_id, to);

        let mut touched = Touched::default();
        touched.updated.push(self.supersets[to_index].clone());
        self.settle(from_index, &mut touched);
        Some(touched)
    }

    /// Move an exercise to `index` inside the superset that owns it
    pub fn reorder_exercise(
        &mut self,
        exercise_id: Uuid,
        superset_id: Uuid,
        index: usize,
    ) -> Option<Touched> {
        let position = self.position(superset_id)?;
        if !self.supersets[position].reorder_exercise(exercise_id, index) {
            return None;
        }
        Some(Touched {
            updated: vec![self.supersets[position].clone()],
            ..Touched::default()
        })
    }

    /// Take an exercise out of its superset into a new single-exercise one
    ///
    /// Returns the id of the created superset.
    pub fn promote_exercise(&mut self, exercise_id: Uuid, from: Uuid) -> Option<(Uuid, Touched)> {
        let from_index = self.position(from)?;
        let exercise = self.supersets[from_index].take_exercise(exercise_id)?;

        let mut touched = Touched::default();
        self.settle(from_index, &mut touched);

        let superset = Superset::new(exercise);
        let created = superset.id();
        let inserted = self.add_superset(superset);
        touched.inserted = inserted.inserted;
        Some((created, touched))
    }

    /// Remove an exercise from the session entirely
    pub fn remove_exercise(&mut self, exercise_id: Uuid, from: Uuid) -> Option<Touched> {
        let from_index = self.position(from)?;
        self.supersets[from_index].take_exercise(exercise_id)?;
        self.owners.remove(&exercise_id);

        let mut touched = Touched::default();
        self.settle(from_index, &mut touched);
        Some(touched)
    }

    pub fn set_current_exercise(&mut self, superset_id: Uuid, exercise_id: Uuid) -> Option<Touched> {
        let position = self.position(superset_id)?;
        if !self.supersets[position].set_current_exercise(exercise_id) {
            return None;
        }
        Some(Touched {
            updated: vec![self.supersets[position].clone()],
            ..Touched::default()
        })
    }

    /// Complete a set, or the superset itself when nothing is left to perform
    pub fn complete_current_set(&mut self, superset_id: Uuid) -> Option<(SetOutcome, Touched)> {
        let position = self.position(superset_id)?;
        let outcome = self.supersets[position].complete_current_set()?;
        let touched = Touched {
            updated: vec![self.supersets[position].clone()],
            ..Touched::default()
        };
        Some((outcome, touched))
    }

    pub fn edit_set(
        &mut self,
        exercise_id: Uuid,
        set_id: Uuid,
        value: Option<f64>,
        rest: Option<u32>,
    ) -> Option<Touched> {
        self.update_owner(exercise_id, |s| s.edit_set(exercise_id, set_id, value, rest))
    }

    pub fn add_set(&mut self, exercise_id: Uuid) -> Option<Touched> {
        self.update_owner(exercise_id, |s| s.add_set(exercise_id))
    }

    pub fn remove_last_set(&mut self, exercise_id: Uuid) -> Option<Touched> {
        self.update_owner(exercise_id, |s| s.remove_last_set(exercise_id))
    }

    /// Apply `mutate` to the superset owning `exercise_id`
    fn update_owner(
        &mut self,
        exercise_id: Uuid,
        mutate: impl FnOnce(&mut Superset) -> bool,
    ) -> Option<Touched> {
        let position = self.position(self.owner_of(exercise_id)?)?;
        if !mutate(&mut self.supersets[position]) {
            return None;
        }
        Some(Touched {
            updated: vec![self.supersets[position].clone()],
            ..Touched::default()
        })
    }

    /// Drop every superset, returning them for deletion and payload building
    pub fn clear(&mut self) -> Vec<Superset> {
        self.owners.clear();
        std::mem::take(&mut self.supersets)
    }
}
