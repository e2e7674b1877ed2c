//! Default exercise catalog.
//!
//! Stands in for the remote catalog fetch: a read-only set of exercises the
//! user can add to a workout.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn entry(
    id: &str,
    title: &str,
    description: &str,
    muscle_group: &str,
    equipment: &[&str],
    measurement: Measurement,
    weighted: bool,
) -> (String, Exercise) {
    (
        id.to_string(),
        Exercise {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            muscle_group: muscle_group.into(),
            equipment: equipment.iter().map(|e| e.to_string()).collect(),
            measurement,
            weighted,
        },
    )
}

/// Builds the default catalog with the built-in exercises
pub fn build_default_catalog() -> Catalog {
    let exercises: HashMap<String, Exercise> = [
        entry(
            "back_squat",
            "Barbell Back Squat",
            "Bar on upper back, squat below parallel and stand.",
            "legs",
            &["barbell", "rack"],
            Measurement::Reps,
            true,
        ),
        entry(
            "bench_press",
            "Bench Press",
            "Lower the bar to mid-chest and press to lockout.",
            "chest",
            &["barbell", "bench"],
            Measurement::Reps,
            true,
        ),
        entry(
            "deadlift",
            "Deadlift",
            "Hinge and pull the bar from the floor to hip lockout.",
            "posterior_chain",
            &["barbell"],
            Measurement::Reps,
            true,
        ),
        entry(
            "pullup",
            "Pull-up",
            "Hang from the bar and pull until the chin clears it.",
            "back",
            &["pullup_bar"],
            Measurement::Reps,
            false,
        ),
        entry(
            "pushup",
            "Push-up",
            "Plank position, lower the chest to the floor and push back up.",
            "chest",
            &[],
            Measurement::Reps,
            false,
        ),
        entry(
            "kb_swing",
            "Kettlebell Swing",
            "Hip hinge driving the bell to chest height.",
            "posterior_chain",
            &["kettlebell"],
            Measurement::Reps,
            true,
        ),
        entry(
            "plank",
            "Plank",
            "Hold a straight line from shoulders to heels on the forearms.",
            "core",
            &[],
            Measurement::Time,
            false,
        ),
        entry(
            "wall_sit",
            "Wall Sit",
            "Back against the wall, thighs parallel to the floor.",
            "legs",
            &[],
            Measurement::Time,
            false,
        ),
    ]
    .into_iter()
    .collect();

    Catalog { exercises }
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.exercises.get(id)
    }

    /// Exercises sorted by id for stable listings
    pub fn sorted(&self) -> Vec<&Exercise> {
        let mut exercises: Vec<_> = self.exercises.values().collect();
        exercises.sort_by(|a, b| a.id.cmp(&b.id));
        exercises
    }

    /// Validate catalog integrity
    ///
    /// Returns a list of validation errors (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.exercises.is_empty() {
            errors.push("Catalog has no exercises".to_string());
        }

        for (key, exercise) in &self.exercises {
            if key != &exercise.id {
                errors.push(format!(
                    "Exercise key '{}' does not match id '{}'",
                    key, exercise.id
                ));
            }
            if exercise.title.trim().is_empty() {
                errors.push(format!("Exercise '{}' has an empty title", exercise.id));
            }
        }

        errors
    }
}
