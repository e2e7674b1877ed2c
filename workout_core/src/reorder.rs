//! Spatial resolution of drag gestures over the exercise list.
//!
//! Everything here is a pure function of the session order, a snapshot of
//! on-screen bounding boxes and the cumulative drag offset:
//! - `resolve_swap_target` picks the exercise to highlight while dragging
//! - `resolve_drop` decides between move, reorder and promotion on release
//! - `resolve_swipe` decides whether a horizontal swipe removes the exercise

use crate::geometry::{overlaps, Offset, Rect};
use crate::Session;
use std::collections::HashMap;
use uuid::Uuid;

/// Last observed bounding boxes, keyed by exercise and superset id
#[derive(Clone, Debug, Default)]
pub struct LayoutSnapshot {
    exercises: HashMap<Uuid, Rect>,
    supersets: HashMap<Uuid, Rect>,
}

impl LayoutSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exercise_box(&mut self, exercise_id: Uuid, rect: Rect) {
        self.exercises.insert(exercise_id, rect);
    }

    pub fn set_superset_box(&mut self, superset_id: Uuid, rect: Rect) {
        self.supersets.insert(superset_id, rect);
    }

    pub fn exercise_box(&self, exercise_id: Uuid) -> Option<Rect> {
        self.exercises.get(&exercise_id).copied()
    }

    pub fn superset_box(&self, superset_id: Uuid) -> Option<Rect> {
        self.supersets.get(&superset_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty() && self.supersets.is_empty()
    }

    pub fn clear(&mut self) {
        self.exercises.clear();
        self.supersets.clear();
    }
}

/// Axis a drag is locked to, decided on its first move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragDirection {
    /// Reserved for the remove swipe
    Horizontal,
    /// Reorder / move / promote
    Vertical,
}

impl DragDirection {
    /// Larger magnitude wins; ties count as vertical
    pub fn classify(offset: Offset) -> Self {
        if offset.dx.abs() > offset.dy.abs() {
            DragDirection::Horizontal
        } else {
            DragDirection::Vertical
        }
    }
}

/// Placement chosen when a vertical drag is released
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropDecision {
    /// Append the exercise to another superset
    MoveTo { superset_id: Uuid },
    /// Move the exercise to `index` within its own superset
    Reorder { index: usize },
    /// Split the exercise out into a new single-exercise superset
    Promote,
}

/// Outcome of a released horizontal swipe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwipeOutcome {
    Remove,
    SnapBack,
}

/// The dragged exercise as it stood when the gesture began
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragOrigin {
    pub exercise_id: Uuid,
    pub superset_id: Uuid,
    /// Bounding box before any translation
    pub rect: Rect,
}

impl DragOrigin {
    pub fn translated(&self, offset: Offset) -> Rect {
        self.rect.translate(offset)
    }
}

/// First other exercise, in session order, under the dragged box
pub fn resolve_swap_target(
    origin: &DragOrigin,
    offset: Offset,
    session: &Session,
    layout: &LayoutSnapshot,
    margin: f32,
) -> Option<Uuid> {
    let dragged = origin.translated(offset);

    session
        .supersets()
        .iter()
        .flat_map(|s| s.exercises())
        .filter(|e| e.id != origin.exercise_id)
        .find(|e| {
            layout
                .exercise_box(e.id)
                .is_some_and(|rect| overlaps(&dragged, &rect, margin))
        })
        .map(|e| e.id)
}

/// Decide where a released vertical drag lands
///
/// Checks other superset containers first, then the origin container, and
/// falls back to promotion, so a decision is always produced.
pub fn resolve_drop(
    origin: &DragOrigin,
    offset: Offset,
    session: &Session,
    layout: &LayoutSnapshot,
    margin: f32,
) -> DropDecision {
    let dragged = origin.translated(offset);

    let target = session
        .supersets()
        .iter()
        .filter(|s| s.id() != origin.superset_id)
        .find(|s| {
            layout
                .superset_box(s.id())
                .is_some_and(|rect| overlaps(&dragged, &rect, margin))
        });
    if let Some(target) = target {
        tracing::debug!("Drop over superset {}", target.id());
        return DropDecision::MoveTo {
            superset_id: target.id(),
        };
    }

    let over_origin = layout
        .superset_box(origin.superset_id)
        .is_some_and(|rect| overlaps(&dragged, &rect, margin));
    if over_origin {
        if let Some(superset) = session.superset(origin.superset_id) {
            let current = superset.position_of(origin.exercise_id).unwrap_or(0);
            let index = nearest_exercise_index(origin, &dragged, superset.exercises(), layout)
                .unwrap_or(current);
            tracing::debug!("Drop inside origin superset at index {}", index);
            return DropDecision::Reorder { index };
        }
    }

    tracing::debug!("Drop outside every superset, promoting");
    DropDecision::Promote
}

/// Index of the other exercise whose box centre is nearest the dragged centre
fn nearest_exercise_index(
    origin: &DragOrigin,
    dragged: &Rect,
    exercises: &[crate::ActiveExercise],
    layout: &LayoutSnapshot,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, exercise) in exercises.iter().enumerate() {
        if exercise.id == origin.exercise_id {
            continue;
        }
        let Some(rect) = layout.exercise_box(exercise.id) else {
            continue;
        };
        let distance = dragged.center_distance_squared(&rect);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// A swipe removes the exercise once it travels past `threshold`
pub fn resolve_swipe(offset: Offset, threshold: f32) -> SwipeOutcome {
    if offset.dx.abs() > threshold {
        SwipeOutcome::Remove
    } else {
        SwipeOutcome::SnapBack
    }
}
