#![forbid(unsafe_code)]

//! Core domain model and session engine for the Repset workout tracker.
//!
//! This crate provides:
//! - Domain types (catalog exercises, sets, active exercises, supersets)
//! - The in-memory session and its superset state machine
//! - Drag-and-drop reorder resolution over observed layout boxes
//! - The session controller with debounced swap-target highlighting
//! - Persistence (superset store, async write gateway, upload outbox, CSV)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod superset;
pub mod session;
pub mod geometry;
pub mod reorder;
pub mod store;
pub mod gateway;
pub mod debounce;
pub mod cues;
pub mod controller;
pub mod completion;
pub mod outbox;
pub mod csv_rollup;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use superset::{SetOutcome, SetProgress, Superset};
pub use session::{Session, Touched};
pub use geometry::{Offset, Rect};
pub use reorder::{DragDirection, DropDecision, LayoutSnapshot, SwipeOutcome};
pub use store::{JsonFileStore, MemoryStore, SupersetStore};
pub use gateway::{PersistenceFailure, PersistenceGateway, WriteOp};
pub use cues::{Cues, LogCues, SilentCues};
pub use controller::{DragEvent, DragOutcome, SessionController};
pub use completion::{ExercisePayload, SetPayload, SupersetPayload, WorkoutCompletion};
pub use outbox::{Outbox, OutboxEntry};
