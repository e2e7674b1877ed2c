//! Session controller: the single owner of live workout state.
//!
//! The controller consumes drag gestures as `DragEvent`s, resolves them with
//! the reorder engine, applies the resulting mutation to the `Session`, and
//! then:
//! 1. queues a gateway write for every touched superset (not awaited)
//! 2. publishes the new superset list to `subscribe_supersets` listeners
//!
//! It must be created and driven from within a Tokio runtime; the swap-target
//! debounce timer and the persistence writer both run as Tokio tasks.

use crate::config::{Config, DragConfig, SetDefaults};
use crate::cues::Cues;
use crate::debounce::Debouncer;
use crate::gateway::{PersistenceFailure, PersistenceGateway};
use crate::geometry::{Offset, Rect};
use crate::reorder::{
    resolve_drop, resolve_swap_target, resolve_swipe, DragDirection, DragOrigin, DropDecision,
    LayoutSnapshot, SwipeOutcome,
};
use crate::session::{Session, Touched};
use crate::{ActiveExercise, Exercise, Result, SetOutcome, Superset, WorkoutCompletion};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Gesture transitions delivered by the UI
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragEvent {
    Start { exercise_id: Uuid, superset_id: Uuid },
    /// Cumulative offset since `Start`
    Move { offset: Offset },
    End { offset: Offset },
    Cancel,
}

/// What the controller did with a `DragEvent`
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragOutcome {
    /// Event ignored: no drag in flight, a drag already in flight, or unknown ids
    Rejected,
    Started,
    Tracking { direction: DragDirection },
    Dropped { decision: DropDecision },
    Swiped { outcome: SwipeOutcome },
    Cancelled,
}

#[derive(Clone, Copy, Debug)]
struct ActiveDrag {
    origin: DragOrigin,
    direction: Option<DragDirection>,
}

pub struct SessionController {
    session: Session,
    drag_config: DragConfig,
    set_defaults: SetDefaults,
    gateway: PersistenceGateway,
    cues: Arc<dyn Cues>,
    layout: LayoutSnapshot,
    drag: Option<ActiveDrag>,
    swap_target: Debouncer<Option<Uuid>>,
    published: watch::Sender<Vec<Superset>>,
}

impl SessionController {
    /// Controller over an empty session
    pub fn new(gateway: PersistenceGateway, config: &Config, cues: Arc<dyn Cues>) -> Self {
        Self::with_session(Session::new(), gateway, config, cues)
    }

    /// Controller over whatever the gateway's store currently holds
    pub async fn restore(
        gateway: PersistenceGateway,
        config: &Config,
        cues: Arc<dyn Cues>,
    ) -> Result<Self> {
        let stored = gateway.get_all().await?;
        let (session, repairs) = Session::from_supersets(stored);
        tracing::info!(
            "Restored {} supersets ({} exercises)",
            session.supersets().len(),
            session.exercise_count()
        );
        let mut controller = Self::with_session(session, gateway, config, cues);
        if !repairs.is_empty() {
            controller.commit(repairs);
        }
        Ok(controller)
    }

    fn with_session(
        session: Session,
        gateway: PersistenceGateway,
        config: &Config,
        cues: Arc<dyn Cues>,
    ) -> Self {
        let (published, _) = watch::channel(session.supersets().to_vec());
        Self {
            session,
            drag_config: config.drag.clone(),
            set_defaults: config.sets.clone(),
            gateway,
            cues,
            layout: LayoutSnapshot::new(),
            drag: None,
            swap_target: Debouncer::new(None, config.drag.swap_target_debounce()),
            published,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn supersets(&self) -> &[Superset] {
        self.session.supersets()
    }

    pub fn subscribe_supersets(&self) -> watch::Receiver<Vec<Superset>> {
        self.published.subscribe()
    }

    pub fn subscribe_swap_target(&self) -> watch::Receiver<Option<Uuid>> {
        self.swap_target.subscribe()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.gateway.subscribe_failures()
    }

    /// Wait for every queued persistence write to land
    pub async fn flush(&self) -> Result<()> {
        self.gateway.flush().await
    }

    // ========================================================================
    // Layout observations
    // ========================================================================

    pub fn observe_exercise_box(&mut self, exercise_id: Uuid, rect: Rect) {
        self.layout.set_exercise_box(exercise_id, rect);
    }

    pub fn observe_superset_box(&mut self, superset_id: Uuid, rect: Rect) {
        self.layout.set_superset_box(superset_id, rect);
    }

    // ========================================================================
    // Drag handling
    // ========================================================================

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_direction(&self) -> Option<DragDirection> {
        self.drag.and_then(|d| d.direction)
    }

    pub fn handle_drag(&mut self, event: DragEvent) -> DragOutcome {
        match event {
            DragEvent::Start {
                exercise_id,
                superset_id,
            } => {
                if self.start_drag(exercise_id, superset_id) {
                    DragOutcome::Started
                } else {
                    DragOutcome::Rejected
                }
            }
            DragEvent::Move { offset } => self.drag_moved(offset),
            DragEvent::End { offset } => self.drag_ended(offset),
            DragEvent::Cancel => {
                let was_dragging = self.is_dragging();
                self.stop_drag();
                if was_dragging {
                    DragOutcome::Cancelled
                } else {
                    DragOutcome::Rejected
                }
            }
        }
    }

    /// Begin dragging `exercise_id` out of `superset_id`
    ///
    /// Rejected while another drag is in flight, when the exercise is not in
    /// that superset, or when its box has not been observed yet.
    pub fn start_drag(&mut self, exercise_id: Uuid, superset_id: Uuid) -> bool {
        if let Some(active) = &self.drag {
            tracing::warn!(
                "Drag of {} rejected, {} is already being dragged",
                exercise_id,
                active.origin.exercise_id
            );
            return false;
        }
        if self.session.owner_of(exercise_id) != Some(superset_id) {
            tracing::warn!(
                "Drag rejected, exercise {} is not in superset {}",
                exercise_id,
                superset_id
            );
            return false;
        }
        let Some(rect) = self.layout.exercise_box(exercise_id) else {
            tracing::warn!("Drag rejected, no layout observed for {}", exercise_id);
            return false;
        };

        tracing::debug!("Drag started for {}", exercise_id);
        self.drag = Some(ActiveDrag {
            origin: DragOrigin {
                exercise_id,
                superset_id,
                rect,
            },
            direction: None,
        });
        true
    }

    /// Clear drag and highlight state; safe to call at any time
    pub fn stop_drag(&mut self) {
        if let Some(active) = self.drag.take() {
            tracing::debug!("Drag of {} finished", active.origin.exercise_id);
        }
        self.swap_target.publish_now(None);
    }

    /// Debounced swap-target publication (last write wins)
    pub fn set_swap_target(&mut self, target: Option<Uuid>) {
        self.swap_target.schedule(target);
    }

    fn drag_moved(&mut self, offset: Offset) -> DragOutcome {
        let Some(active) = self.drag.as_mut() else {
            tracing::debug!("Drag move with no drag in flight");
            return DragOutcome::Rejected;
        };
        let direction = *active
            .direction
            .get_or_insert_with(|| DragDirection::classify(offset));
        let origin = active.origin;

        if direction == DragDirection::Vertical {
            let target = resolve_swap_target(
                &origin,
                offset,
                &self.session,
                &self.layout,
                self.drag_config.overlap_margin,
            );
            self.set_swap_target(target);
        }
        DragOutcome::Tracking { direction }
    }

    fn drag_ended(&mut self, offset: Offset) -> DragOutcome {
        let Some(active) = self.drag else {
            tracing::debug!("Drag end with no drag in flight");
            return DragOutcome::Rejected;
        };
        let origin = active.origin;
        let direction = active
            .direction
            .unwrap_or_else(|| DragDirection::classify(offset));

        let outcome = match direction {
            DragDirection::Vertical => {
                let decision = resolve_drop(
                    &origin,
                    offset,
                    &self.session,
                    &self.layout,
                    self.drag_config.overlap_margin,
                );
                let changed = self.apply_drop(&origin, decision);
                if changed {
                    self.layout.clear();
                }
                DragOutcome::Dropped { decision }
            }
            DragDirection::Horizontal => {
                let outcome = resolve_swipe(offset, self.drag_config.swipe_threshold);
                if outcome == SwipeOutcome::Remove
                    && self.remove_exercise_from_superset(origin.exercise_id, origin.superset_id)
                {
                    self.layout.clear();
                }
                DragOutcome::Swiped { outcome }
            }
        };

        self.stop_drag();
        outcome
    }

    fn apply_drop(&mut self, origin: &DragOrigin, decision: DropDecision) -> bool {
        match decision {
            DropDecision::MoveTo { superset_id } => {
                self.move_exercise(origin.exercise_id, origin.superset_id, superset_id)
            }
            DropDecision::Reorder { index } => {
                let unchanged = self
                    .session
                    .superset(origin.superset_id)
                    .and_then(|s| s.position_of(origin.exercise_id))
                    == Some(index);
                if unchanged {
                    tracing::debug!("Drop left {} in place", origin.exercise_id);
                    return false;
                }
                self.reorder_exercise(origin.exercise_id, origin.superset_id, index)
            }
            DropDecision::Promote => self
                .create_new_superset(origin.exercise_id, origin.superset_id)
                .is_some(),
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Queue writes for `touched`, then publish the new list
    fn commit(&mut self, touched: Touched) {
        for superset in touched.inserted {
            self.gateway.insert(superset);
        }
        for superset in touched.updated {
            self.gateway.update(superset);
        }
        for superset_id in touched.deleted {
            self.gateway.delete(superset_id);
        }
        self.published.send_replace(self.session.supersets().to_vec());
    }

    /// Start a new single-exercise superset from a catalog exercise
    pub fn add_exercise_from_catalog(&mut self, exercise: &Exercise) -> Uuid {
        let plan = self.set_defaults.plan_for(exercise.measurement);
        self.add_active_exercise(ActiveExercise::new(exercise, plan))
    }

    pub fn add_active_exercise(&mut self, exercise: ActiveExercise) -> Uuid {
        let superset = Superset::new(exercise);
        let superset_id = superset.id();
        tracing::info!("Added superset {}", superset_id);
        let touched = self.session.add_superset(superset);
        self.commit(touched);
        superset_id
    }

    /// Move an exercise to the end of another superset
    pub fn move_exercise(&mut self, exercise_id: Uuid, from: Uuid, to: Uuid) -> bool {
        match self.session.move_exercise(exercise_id, from, to) {
            Some(touched) => {
                tracing::info!("Moved exercise {} from {} to {}", exercise_id, from, to);
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!(
                    "Move of exercise {} from {} to {} ignored",
                    exercise_id,
                    from,
                    to
                );
                false
            }
        }
    }

    pub fn reorder_exercise(&mut self, exercise_id: Uuid, superset_id: Uuid, index: usize) -> bool {
        match self.session.reorder_exercise(exercise_id, superset_id, index) {
            Some(touched) => {
                tracing::info!("Reordered exercise {} to index {}", exercise_id, index);
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!(
                    "Reorder of exercise {} in {} ignored",
                    exercise_id,
                    superset_id
                );
                false
            }
        }
    }

    /// Split an exercise out into a new single-exercise superset
    pub fn create_new_superset(&mut self, exercise_id: Uuid, from: Uuid) -> Option<Uuid> {
        match self.session.promote_exercise(exercise_id, from) {
            Some((created, touched)) => {
                tracing::info!("Exercise {} promoted to superset {}", exercise_id, created);
                self.commit(touched);
                Some(created)
            }
            None => {
                tracing::warn!("Promotion of exercise {} from {} ignored", exercise_id, from);
                None
            }
        }
    }

    pub fn remove_exercise_from_superset(&mut self, exercise_id: Uuid, superset_id: Uuid) -> bool {
        match self.session.remove_exercise(exercise_id, superset_id) {
            Some(touched) => {
                tracing::info!("Removed exercise {} from {}", exercise_id, superset_id);
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!(
                    "Exercise {} not found in superset {}, nothing removed",
                    exercise_id,
                    superset_id
                );
                false
            }
        }
    }

    pub fn set_current_exercise(&mut self, superset_id: Uuid, exercise_id: Uuid) -> bool {
        match self.session.set_current_exercise(superset_id, exercise_id) {
            Some(touched) => {
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!(
                    "Cannot point superset {} at exercise {}",
                    superset_id,
                    exercise_id
                );
                false
            }
        }
    }

    /// Complete a set of the superset's current exercise and advance
    pub fn complete_current_set(&mut self, superset_id: Uuid) -> Option<SetOutcome> {
        let Some((outcome, touched)) = self.session.complete_current_set(superset_id) else {
            tracing::warn!("No pending set in superset {}", superset_id);
            return None;
        };

        if let Some(progress) = outcome.progress() {
            self.cues
                .rest_started(progress.exercise_id, progress.completed.rest_time_seconds);
        }
        if outcome.superset_completed() {
            self.cues.superset_completed(superset_id);
        }
        self.commit(touched);
        Some(outcome)
    }

    pub fn edit_set(
        &mut self,
        exercise_id: Uuid,
        set_id: Uuid,
        value: Option<f64>,
        rest: Option<u32>,
    ) -> bool {
        match self.session.edit_set(exercise_id, set_id, value, rest) {
            Some(touched) => {
                self.commit(touched);
                true
            }
            None => false,
        }
    }

    /// Append a set to an exercise, reopening it if it was done
    pub fn add_set(&mut self, exercise_id: Uuid) -> bool {
        match self.session.add_set(exercise_id) {
            Some(touched) => {
                tracing::info!("Added a set to exercise {}", exercise_id);
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!("Exercise {} not found, no set added", exercise_id);
                false
            }
        }
    }

    /// Drop an exercise's trailing set; the only set is never removed
    pub fn remove_last_set(&mut self, exercise_id: Uuid) -> bool {
        match self.session.remove_last_set(exercise_id) {
            Some(touched) => {
                self.commit(touched);
                true
            }
            None => {
                tracing::warn!("No set removed from exercise {}", exercise_id);
                false
            }
        }
    }

    /// End the workout: build the payload and clear the session
    pub fn finish_workout(&mut self) -> WorkoutCompletion {
        self.stop_drag();
        let supersets = self.session.clear();
        let completion = WorkoutCompletion::from_supersets(&supersets, Utc::now());
        tracing::info!(
            "Workout {} finished with {} sets done",
            completion.id,
            completion.sets_done()
        );

        self.layout.clear();
        self.commit(Touched {
            deleted: supersets.iter().map(|s| s.id()).collect(),
            ..Touched::default()
        });
        completion
    }
}
