//! Superset model and its progression state machine.
//!
//! A superset is a round-robin group of exercises. Each superset is either
//! active or complete; the `Active -> Complete` transition only happens in
//! `advance_to_next_exercise`, and only adding a not-done exercise brings a
//! complete superset back.

use crate::{ActiveExercise, Set};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered group of exercises performed as a round-robin unit
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Superset {
    id: Uuid,
    exercises: Vec<ActiveExercise>,
    current_exercise_index: usize,
    is_single_exercise: bool,
    done: bool,
    /// Bumped on every mutation; stores use it to refuse stale writes
    revision: u64,
    created_at: DateTime<Utc>,
}

/// Result of completing the current set of a superset
#[derive(Clone, Debug, PartialEq)]
pub struct SetProgress {
    pub exercise_id: Uuid,
    pub completed: Set,
    /// Exercise the pointer moved to, `None` once the superset is complete
    pub next_exercise_id: Option<Uuid>,
    /// `true` only on the call that moved the superset to complete
    pub superset_completed: bool,
}

/// What a call to `Superset::complete_current_set` changed
#[derive(Clone, Debug, PartialEq)]
pub enum SetOutcome {
    /// A set of the current exercise was completed
    Performed(SetProgress),
    /// Nothing was left to perform, and this call completed the superset
    Completed,
}

impl SetOutcome {
    pub fn progress(&self) -> Option<&SetProgress> {
        match self {
            SetOutcome::Performed(progress) => Some(progress),
            SetOutcome::Completed => None,
        }
    }

    /// `true` when this call moved the superset to complete
    pub fn superset_completed(&self) -> bool {
        match self {
            SetOutcome::Performed(progress) => progress.superset_completed,
            SetOutcome::Completed => true,
        }
    }
}

impl Superset {
    /// Create a single-exercise superset
    pub fn new(exercise: ActiveExercise) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercises: vec![exercise],
            current_exercise_index: 0,
            is_single_exercise: true,
            done: false,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exercises(&self) -> &[ActiveExercise] {
        &self.exercises
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn current_exercise_index(&self) -> usize {
        self.current_exercise_index
    }

    pub fn is_single_exercise(&self) -> bool {
        self.is_single_exercise
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn position_of(&self, exercise_id: Uuid) -> Option<usize> {
        self.exercises.iter().position(|e| e.id == exercise_id)
    }

    pub fn contains(&self, exercise_id: Uuid) -> bool {
        self.position_of(exercise_id).is_some()
    }

    pub fn exercise(&self, exercise_id: Uuid) -> Option<&ActiveExercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }

    /// Insert an exercise at `index` (clamped), or at the end for `None`
    pub fn add_exercise(&mut self, exercise: ActiveExercise, index: Option<usize>) {
        let index = index.unwrap_or(self.exercises.len()).min(self.exercises.len());
        let reopens = !exercise.done;

        if !self.exercises.is_empty() && index <= self.current_exercise_index {
            self.current_exercise_index += 1;
        }
        self.exercises.insert(index, exercise);

        if self.done && reopens {
            tracing::debug!("Superset {} reopened by a new exercise", self.id);
            self.done = false;
        }
        self.refresh();
    }

    /// Remove an exercise by id
    ///
    /// Returns `true` when the superset is now empty and should be
    /// destroyed. An unknown id is a no-op.
    pub fn remove_exercise(&mut self, exercise_id: Uuid) -> bool {
        self.take_exercise(exercise_id);
        self.exercises.is_empty()
    }

    /// Remove an exercise and hand it back (used for moves)
    pub fn take_exercise(&mut self, exercise_id: Uuid) -> Option<ActiveExercise> {
        let index = self.position_of(exercise_id)?;
        let removed = self.exercises.remove(index);

        if index < self.current_exercise_index {
            self.current_exercise_index -= 1;
        }
        self.refresh();
        Some(removed)
    }

    /// Move an exercise to `index` within this superset
    ///
    /// The pointer keeps referencing the same exercise it did before.
    pub fn reorder_exercise(&mut self, exercise_id: Uuid, index: usize) -> bool {
        let Some(from) = self.position_of(exercise_id) else {
            return false;
        };
        let current_id = self.current_exercise().map(|e| e.id);

        let to = index.min(self.exercises.len() - 1);
        let exercise = self.exercises.remove(from);
        self.exercises.insert(to, exercise);

        if let Some(current) = current_id.and_then(|id| self.position_of(id)) {
            self.current_exercise_index = current;
        }
        self.refresh();
        true
    }

    /// Point at `exercise_id`; fails without mutating if it is absent
    pub fn set_current_exercise(&mut self, exercise_id: Uuid) -> bool {
        match self.position_of(exercise_id) {
            Some(index) => {
                self.current_exercise_index = index;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn current_exercise(&self) -> Option<&ActiveExercise> {
        self.exercises.get(self.current_exercise_index)
    }

    pub fn is_on_first_exercise(&self) -> bool {
        self.is_single_exercise || self.current_exercise_index == 0
    }

    pub fn is_on_last_exercise(&self) -> bool {
        self.is_single_exercise || self.current_exercise_index + 1 == self.exercises.len()
    }

    /// Advance the pointer round-robin to the next not-done exercise
    ///
    /// Scans at most `len` steps forward from the pointer, wrapping at the
    /// end, so the current exercise is only picked again after every other
    /// one. Returns `None` and marks the superset done when every exercise
    /// is done.
    pub fn advance_to_next_exercise(&mut self) -> Option<&ActiveExercise> {
        if self.exercises.is_empty() {
            self.done = true;
            return None;
        }

        if self.is_single_exercise {
            if self.exercises[0].done {
                self.mark_done();
                return None;
            }
            return self.exercises.first();
        }

        let count = self.exercises.len();
        let mut index = self.current_exercise_index;
        for _ in 0..count {
            index = (index + 1) % count;
            if !self.exercises[index].done {
                self.current_exercise_index = index;
                self.revision += 1;
                return self.exercises.get(index);
            }
        }

        self.mark_done();
        None
    }

    /// Complete one set of the current exercise and advance
    ///
    /// When every remaining exercise is already done (for example after the
    /// last pending one was removed) no set is performed, but the superset
    /// still completes and `SetOutcome::Completed` reports it. Returns
    /// `None` once the superset is done.
    pub fn complete_current_set(&mut self) -> Option<SetOutcome> {
        if self.done {
            return None;
        }
        if self.current_exercise().map_or(true, |e| e.done)
            && self.advance_to_next_exercise().is_none()
        {
            return Some(SetOutcome::Completed);
        }

        let index = self.current_exercise_index;
        let exercise = self.exercises.get_mut(index)?;
        let exercise_id = exercise.id;
        let completed = exercise.complete_next_set()?;
        self.revision += 1;

        let next_exercise_id = self.advance_to_next_exercise().map(|e| e.id);
        Some(SetOutcome::Performed(SetProgress {
            exercise_id,
            completed,
            next_exercise_id,
            superset_completed: next_exercise_id.is_none(),
        }))
    }

    /// Edit a pending set on one of this superset's exercises
    pub fn edit_set(
        &mut self,
        exercise_id: Uuid,
        set_id: Uuid,
        value: Option<f64>,
        rest: Option<u32>,
    ) -> bool {
        let Some(exercise) = self.exercises.iter_mut().find(|e| e.id == exercise_id) else {
            return false;
        };
        let edited = exercise.edit_set(set_id, value, rest);
        if edited {
            self.revision += 1;
        }
        edited
    }

    /// Append a set to one of this superset's exercises
    ///
    /// A done exercise, and with it a done superset, is reopened.
    pub fn add_set(&mut self, exercise_id: Uuid) -> bool {
        let Some(exercise) = self.exercises.iter_mut().find(|e| e.id == exercise_id) else {
            return false;
        };
        exercise.add_set();
        if self.done {
            tracing::debug!("Superset {} reopened by a new set", self.id);
            self.done = false;
        }
        self.refresh();
        true
    }

    /// Drop the trailing set of one of this superset's exercises
    pub fn remove_last_set(&mut self, exercise_id: Uuid) -> bool {
        let Some(exercise) = self.exercises.iter_mut().find(|e| e.id == exercise_id) else {
            return false;
        };
        if !exercise.remove_last_set() {
            return false;
        }
        self.refresh();
        true
    }

    /// Re-derive the stored single flag, pointer and done flag after a load
    ///
    /// Returns `true` when the stored copy was inconsistent and changed.
    pub fn repair(&mut self) -> bool {
        let before = (self.is_single_exercise, self.current_exercise_index, self.done);
        let revision = self.revision;

        if self.done && self.exercises.iter().any(|e| !e.done) {
            self.done = false;
        }
        self.refresh();

        let changed = before != (self.is_single_exercise, self.current_exercise_index, self.done);
        if changed {
            tracing::warn!("Stored superset {} was inconsistent, repaired", self.id);
        } else {
            self.revision = revision;
        }
        changed
    }

    fn mark_done(&mut self) {
        if !self.done {
            tracing::info!("Superset {} complete", self.id);
            self.done = true;
            self.revision += 1;
        }
    }

    /// Recompute derived fields after a membership change
    fn refresh(&mut self) {
        self.is_single_exercise = self.exercises.len() == 1;
        self.revision += 1;

        if self.exercises.is_empty() {
            self.current_exercise_index = 0;
            return;
        }
        if self.current_exercise_index >= self.exercises.len() {
            self.current_exercise_index = 0;
        }

        if self.done || !self.exercises[self.current_exercise_index].done {
            return;
        }
        let count = self.exercises.len();
        if let Some(next) = (1..count)
            .map(|step| (self.current_exercise_index + step) % count)
            .find(|&i| !self.exercises[i].done)
        {
            self.current_exercise_index = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{active, finished};

    fn superset_of(exercises: Vec<ActiveExercise>) -> Superset {
        let mut iter = exercises.into_iter();
        let mut superset = Superset::new(iter.next().unwrap());
        for e in iter {
            superset.add_exercise(e, None);
        }
        superset
    }

    fn ids(superset: &Superset) -> Vec<Uuid> {
        superset.exercises().iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_single_flag_tracks_membership() {
        let mut superset = Superset::new(active("squat"));
        assert!(superset.is_single_exercise());

        let press = active("press");
        let press_id = press.id;
        superset.add_exercise(press, None);
        assert!(!superset.is_single_exercise());

        assert!(!superset.remove_exercise(press_id));
        assert!(superset.is_single_exercise());
    }

    #[test]
    fn test_remove_last_signals_empty() {
        let squat = active("squat");
        let id = squat.id;
        let mut superset = Superset::new(squat);
        assert!(superset.remove_exercise(id));
        assert!(superset.is_empty());
        assert!(!superset.is_single_exercise());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut superset = superset_of(vec![active("a"), active("b")]);
        let before = ids(&superset);
        assert!(!superset.remove_exercise(Uuid::new_v4()));
        assert_eq!(ids(&superset), before);
    }

    #[test]
    fn test_set_current_exercise_fails_without_mutation() {
        let mut superset = superset_of(vec![active("a"), active("b"), active("c")]);
        let c = superset.exercises()[2].id;
        assert!(superset.set_current_exercise(c));
        assert_eq!(superset.current_exercise_index(), 2);

        assert!(!superset.set_current_exercise(Uuid::new_v4()));
        assert_eq!(superset.current_exercise_index(), 2);
    }

    #[test]
    fn test_first_and_last_are_true_for_single() {
        let superset = Superset::new(active("a"));
        assert!(superset.is_on_first_exercise());
        assert!(superset.is_on_last_exercise());

        let mut pair = superset_of(vec![active("a"), active("b")]);
        assert!(pair.is_on_first_exercise());
        assert!(!pair.is_on_last_exercise());
        pair.advance_to_next_exercise();
        assert!(!pair.is_on_first_exercise());
        assert!(pair.is_on_last_exercise());
    }

    #[test]
    fn test_advance_single_exercise() {
        let mut superset = Superset::new(active("a"));
        let id = superset.exercises()[0].id;
        assert_eq!(superset.advance_to_next_exercise().map(|e| e.id), Some(id));

        let mut done = Superset::new(finished("a"));
        assert!(done.advance_to_next_exercise().is_none());
        assert!(done.is_done());
    }

    #[test]
    fn test_advance_round_robin_skips_done() {
        let mut superset =
            superset_of(vec![active("a"), finished("b"), active("c"), active("d")]);
        let order: Vec<Uuid> = (0..3)
            .map(|_| superset.advance_to_next_exercise().unwrap().id)
            .collect();
        let all = ids(&superset);
        assert_eq!(order, vec![all[2], all[3], all[0]]);
    }

    #[test]
    fn test_advance_visits_every_pending_before_repeating() {
        let mut superset = superset_of(vec![active("a"), active("b"), active("c")]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            let next = superset.advance_to_next_exercise().unwrap();
            assert!(!next.done);
            assert!(seen.insert(next.id), "exercise repeated before the cycle ended");
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_advance_returns_current_when_it_is_the_only_pending() {
        let mut superset = superset_of(vec![active("a"), finished("b")]);
        let a = superset.exercises()[0].id;
        assert_eq!(superset.advance_to_next_exercise().map(|e| e.id), Some(a));
    }

    #[test]
    fn test_completion_detected_once() {
        let mut superset = superset_of(vec![finished("a"), finished("b")]);
        assert!(!superset.is_done());
        let revision = superset.revision();

        assert!(superset.advance_to_next_exercise().is_none());
        assert!(superset.is_done());
        let after_transition = superset.revision();
        assert!(after_transition > revision);

        assert!(superset.advance_to_next_exercise().is_none());
        assert_eq!(superset.revision(), after_transition);
    }

    #[test]
    fn test_adding_pending_exercise_reopens() {
        let mut superset = Superset::new(finished("a"));
        superset.advance_to_next_exercise();
        assert!(superset.is_done());

        let b = active("b");
        let b_id = b.id;
        superset.add_exercise(b, None);
        assert!(!superset.is_done());
        assert!(!superset.is_single_exercise());
        assert_eq!(superset.current_exercise().map(|e| e.id), Some(b_id));
    }

    #[test]
    fn test_remove_keeps_pointer_on_same_exercise() {
        let mut superset = superset_of(vec![active("a"), active("b"), active("c")]);
        let [a, _, c] = ids(&superset)[..] else { panic!() };
        superset.set_current_exercise(c);

        superset.remove_exercise(a);
        assert_eq!(superset.current_exercise().map(|e| e.id), Some(c));
    }

    #[test]
    fn test_remove_current_moves_to_pending() {
        let mut superset = superset_of(vec![active("a"), finished("b"), active("c")]);
        let [a, _, c] = ids(&superset)[..] else { panic!() };

        superset.remove_exercise(a);
        assert_eq!(superset.current_exercise().map(|e| e.id), Some(c));
        assert!(!superset.current_exercise().unwrap().done);
    }

    #[test]
    fn test_reorder_keeps_pointer() {
        let mut superset = superset_of(vec![active("a"), active("b"), active("c")]);
        let [a, b, c] = ids(&superset)[..] else { panic!() };
        superset.set_current_exercise(b);

        assert!(superset.reorder_exercise(a, 2));
        assert_eq!(ids(&superset), vec![b, c, a]);
        assert_eq!(superset.current_exercise().map(|e| e.id), Some(b));

        assert!(!superset.reorder_exercise(Uuid::new_v4(), 0));
    }

    #[test]
    fn test_complete_current_set_alternates() {
        let mut superset = superset_of(vec![active("a"), active("b")]);
        let [a, b] = ids(&superset)[..] else { panic!() };

        let Some(SetOutcome::Performed(first)) = superset.complete_current_set() else {
            panic!("expected a performed set");
        };
        assert_eq!(first.exercise_id, a);
        assert_eq!(first.next_exercise_id, Some(b));

        let Some(SetOutcome::Performed(second)) = superset.complete_current_set() else {
            panic!("expected a performed set");
        };
        assert_eq!(second.exercise_id, b);
        assert_eq!(second.next_exercise_id, Some(a));
    }

    #[test]
    fn test_complete_all_sets_finishes_superset_once() {
        let mut superset = superset_of(vec![active("a"), active("b")]);
        let mut completions = 0;
        let mut transitions = 0;
        while let Some(outcome) = superset.complete_current_set() {
            assert!(outcome.progress().is_some());
            completions += 1;
            if outcome.superset_completed() {
                transitions += 1;
            }
        }
        assert_eq!(completions, 6);
        assert_eq!(transitions, 1);
        assert!(superset.is_done());
        assert!(superset.exercises().iter().all(|e| e.done));
    }

    #[test]
    fn test_complete_without_pending_set_still_completes() {
        let mut superset = superset_of(vec![active("a"), finished("b")]);
        let a = superset.exercises()[0].id;
        superset.remove_exercise(a);
        assert!(!superset.is_done());
        let revision = superset.revision();

        assert_eq!(superset.complete_current_set(), Some(SetOutcome::Completed));
        assert!(superset.is_done());
        assert!(superset.revision() > revision);

        assert_eq!(superset.complete_current_set(), None);
    }

    #[test]
    fn test_repair_rederives_stored_fields() {
        let superset = superset_of(vec![finished("a"), active("b")]);
        let mut value = serde_json::to_value(&superset).unwrap();
        value["is_single_exercise"] = true.into();
        value["current_exercise_index"] = 7.into();
        let mut stored: Superset = serde_json::from_value(value).unwrap();

        assert!(stored.repair());
        assert!(!stored.is_single_exercise());
        assert_eq!(stored.current_exercise_index(), 1);
        assert!(stored.revision() > superset.revision());

        let mut clean = superset.clone();
        assert!(!clean.repair());
        assert_eq!(clean, superset);
    }

    #[test]
    fn test_add_set_reopens_done_superset() {
        let mut superset = superset_of(vec![active("a"), active("b")]);
        while superset.complete_current_set().is_some() {}
        assert!(superset.is_done());
        let b = superset.exercises()[1].id;

        assert!(superset.add_set(b));
        assert!(!superset.is_done());
        assert_eq!(superset.current_exercise().map(|e| e.id), Some(b));
        assert!(!superset.add_set(Uuid::new_v4()));
    }

    #[test]
    fn test_removing_last_pending_set_leaves_completion_to_next_call() {
        let mut superset = superset_of(vec![active("a"), finished("b")]);
        let a = superset.exercises()[0].id;
        superset.complete_current_set();
        superset.complete_current_set();
        assert!(superset.remove_last_set(a));
        assert!(superset.exercises()[0].done);
        assert!(!superset.is_done());

        assert_eq!(superset.complete_current_set(), Some(SetOutcome::Completed));
        assert!(superset.is_done());
    }
}
