//! Reel Tween Engine
//!
//! Reversible timelines of eased property actions, driven by a pooled scheduler.
//!
//! # Features
//!
//! - **Timelines**: Queue actions back to back or run them concurrently at any offset
//! - **Reversible**: Flip direction mid-run without losing the playhead
//! - **Snapping**: Jump to either end of a run, or restart it
//! - **Pooled**: Timelines and actions return to free lists when recycled
//! - **Batched Easing**: All active channels are eased in one pass, split across
//!   worker threads for large batches
//!
//! # Example
//!
//! ```
//! use reel_tween::{Ease, Scheduler};
//! use std::sync::{Arc, Mutex};
//!
//! let x = Arc::new(Mutex::new(0.0_f32));
//! let (get, set) = (Arc::clone(&x), Arc::clone(&x));
//!
//! let mut scheduler = Scheduler::new();
//! let action = scheduler
//!     .actions()
//!     .float(move || *get.lock().unwrap(), move |v| *set.lock().unwrap() = v, 100.0, 1.0)
//!     .set_ease(Ease::Linear);
//!
//! let id = scheduler.create(true);
//! scheduler.timeline_mut(id)?.append(action)?;
//! scheduler.play(id)?;
//!
//! scheduler.tick(0.25);
//! assert_eq!(*x.lock().unwrap(), 25.0);
//! # Ok::<(), reel_tween::TweenError>(())
//! ```

pub mod action;
pub mod batch;
pub mod config;
pub mod easing;
pub mod error;
pub mod scheduler;
pub mod timeline;

pub use action::{ActionPool, ActionValue, TweenAction};
pub use batch::{evaluate, EaseCurve, Lane, LaneTimes};
pub use config::SchedulerConfig;
pub use easing::{Ease, ShakeAxis};
pub use error::{Result, TweenError};
pub use scheduler::{Scheduler, TimelineId};
pub use timeline::{Operation, Timeline, TimelineCallback, TimelineState};
