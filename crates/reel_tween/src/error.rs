//! Tween error types

use crate::scheduler::TimelineId;
use crate::timeline::TimelineState;
use thiserror::Error;

/// Contract violations raised by timeline and scheduler operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TweenError {
    /// The handle refers to a timeline that has been recycled since it was issued
    #[error("Timeline handle {0:?} is stale (recycled or never issued)")]
    StaleHandle(TimelineId),

    /// Operation on a timeline that is back in the pool
    #[error("Timeline {op}: the timeline is recycled")]
    Recycled { op: &'static str },

    /// Operation on a timeline that is finishing a stop
    #[error("Timeline {op}: the timeline is stopping")]
    Stopping { op: &'static str },

    /// Operation only valid on timelines created non-recyclable
    #[error("Timeline {op}: the timeline is recyclable, create it non-recyclable or call set_recyclable(false)")]
    RequiresNonRecyclable { op: &'static str },

    /// Operation only valid while the timeline is being composed
    #[error("Timeline {op}: the state [{state:?}] must be [Setup]")]
    NotInSetup {
        op: &'static str,
        state: TimelineState,
    },

    /// Actions can no longer be attached once the run order has been built
    #[error("Timeline {op}: actions cannot be attached after the timeline has run")]
    AlreadyScheduled { op: &'static str },

    /// Playback requested on a timeline without actions
    #[error("Timeline {op}: there are no actions to run")]
    EmptyTimeline { op: &'static str },

    /// Recycle requested while actions are still running
    #[error("Timeline recycle: {count} actions are still running")]
    ActiveActions { count: usize },

    /// A state machine branch that should not be reachable
    #[error("Timeline {op}: unexpected state [{state:?}]")]
    UnexpectedState {
        op: &'static str,
        state: TimelineState,
    },

    /// Rejected scheduler configuration
    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    /// Teardown was already performed
    #[error("Scheduler native data was already disposed")]
    AlreadyDisposed,
}

/// Result type for tween operations
pub type Result<T> = std::result::Result<T, TweenError>;
