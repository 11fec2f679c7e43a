//! Multi-timeline session orchestration.
//!
//! The [`Session`] owns every [`Timeline`] through a [`TimelineRegistry`] and
//! routes move requests to one of three strategies: ordinary moves on a single
//! board, moves between two present boards, and moves into the past that open
//! a new timeline. The latter two run inside a [`Transaction`] so a failure
//! part-way through leaves no trace.

pub mod probe;
pub mod registry;
pub mod render;
pub mod request;
pub mod session;
pub mod timeline;
pub mod transaction;

pub use probe::{FailAt, MutationProbe, MutationStep};
pub use registry::TimelineRegistry;
pub use render::{dispatch, BusObserver, NullObserver, RecordingObserver, RenderObserver};
pub use request::{AppliedMove, BoardPoint, MoveClass, MoveOutcome, MoveRequest};
pub use session::Session;
pub use timeline::Timeline;
pub use transaction::{CapturedTimeline, RollbackReport, Transaction, TransactionPhase};
