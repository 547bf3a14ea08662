//! Reversible timelines
//!
//! A timeline owns a flat list of actions placed at `(start, end)` offsets and
//! a playhead that runs over `[0, duration]` in either direction. Two sorted
//! views of the actions (by start and by end) are built lazily the first time
//! each direction runs and stay fixed until the timeline is recycled.
//!
//! While playing, `wait_index` points into the start-sorted view at the next
//! action to activate; while rewinding it points into the end-sorted view and
//! counts down. `-1` and `len` mean every action has been activated.
//!
//! ```text
//! Setup ──play──▶ Playing ◀──reverse──▶ Rewinding ◀──rewind── Setup
//!
//! Playing | Rewinding ──pause(true)──▶ Paused ──pause(false)──▶ previous
//! Playing | Rewinding | Paused ──stop──▶ Stopping ──tick──▶ Stopped
//! Playing | Rewinding ──tick past the last boundary──▶ Completed
//! Stopped | Completed ──play / rewind / restart──▶ Playing | Rewinding
//! ```

use crate::action::{ActionPool, TweenAction};
use crate::batch::BatchEvaluator;
use crate::easing::Ease;
use crate::error::{Result, TweenError};
use crate::scheduler::TimelineId;

/// Fixed-point scale for the sort keys of the start and end views
const SORT_SCALE: f32 = 10_000.0;

/// Timeline lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimelineState {
    /// Being composed, actions may still be attached
    Setup,
    Playing,
    Rewinding,
    Paused,
    /// Stop requested, finishes on the next tick
    Stopping,
    Stopped,
    Completed,
    /// Back in the pool
    Recycled,
}

/// Transient tag naming the control call or callback currently running
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Operation {
    #[default]
    None,
    Restart,
    GotoStart,
    GotoEnd,
    CallOnComplete,
    CallOnStop,
}

/// Result of ticking a timeline once
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Keep the timeline in the active set
    Running,
    /// The run ended (completed or stopped) this tick
    Finished,
}

/// Timeline callback, invoked with the timeline that fired it
pub type TimelineCallback = Box<dyn FnMut(&mut Timeline) + Send>;

#[derive(Clone, Copy)]
enum Hook {
    Start,
    Complete,
    Stop,
    Recycle,
}

/// A scheduling entity owning a set of actions and a playhead
pub struct Timeline {
    id: TimelineId,
    duration: f32,
    is_recyclable: bool,

    actions: Vec<TweenAction>,
    start_sorted: Option<Box<[usize]>>,
    end_sorted: Option<Box<[usize]>>,
    update_list: Vec<usize>,

    on_start: Vec<TimelineCallback>,
    on_complete: Vec<TimelineCallback>,
    on_stop: Vec<TimelineCallback>,
    on_recycle: Vec<TimelineCallback>,

    queue_time: f32,
    concurrent_time: f32,
    cur_timeline: f32,
    cur_time: f32,
    wait_index: isize,

    state: TimelineState,
    pre_run_state: TimelineState,
    operation: Operation,

    default_ease: Ease,
    default_relative: bool,

    // Scheduler bookkeeping
    pub(crate) wants_update: bool,
    pub(crate) registered: bool,
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("duration", &self.duration)
            .field("cur_time", &self.cur_time)
            .field("wait_index", &self.wait_index)
            .field("actions", &self.actions.len())
            .field("active", &self.update_list.len())
            .finish_non_exhaustive()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            id: TimelineId::default(),
            duration: 0.0,
            is_recyclable: true,
            actions: Vec::new(),
            start_sorted: None,
            end_sorted: None,
            update_list: Vec::new(),
            on_start: Vec::new(),
            on_complete: Vec::new(),
            on_stop: Vec::new(),
            on_recycle: Vec::new(),
            queue_time: 0.0,
            concurrent_time: 0.0,
            cur_timeline: 0.0,
            cur_time: 0.0,
            wait_index: -1,
            state: TimelineState::Setup,
            pre_run_state: TimelineState::Setup,
            operation: Operation::None,
            default_ease: Ease::Smooth,
            default_relative: false,
            wants_update: false,
            registered: false,
        }
    }
}

impl Timeline {
    pub(crate) fn new(id: TimelineId, is_recyclable: bool) -> Self {
        let mut timeline = Self::default();
        timeline.acquire(id, is_recyclable);
        timeline
    }

    /// Prepare a fresh or pooled instance for a new owner
    pub(crate) fn acquire(&mut self, id: TimelineId, is_recyclable: bool) {
        self.id = id;
        self.is_recyclable = is_recyclable;
        self.state = TimelineState::Setup;
        self.operation = Operation::None;
        self.wait_index = -1;
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Latest end offset over all attached actions
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_recyclable(&self) -> bool {
        self.is_recyclable
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Playhead position
    pub fn cur_time(&self) -> f32 {
        self.cur_time
    }

    /// Next boundary at which an action activates
    pub fn cur_timeline(&self) -> f32 {
        self.cur_timeline
    }

    pub fn wait_index(&self) -> isize {
        self.wait_index
    }

    pub fn actions(&self) -> &[TweenAction] {
        &self.actions
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Indices into `actions()` of the currently running actions
    pub fn active_actions(&self) -> &[usize] {
        &self.update_list
    }

    /// Indices into `actions()` ordered by start offset, once built
    pub fn start_order(&self) -> Option<&[usize]> {
        self.start_sorted.as_deref()
    }

    /// Indices into `actions()` ordered by end offset, once built
    pub fn end_order(&self) -> Option<&[usize]> {
        self.end_sorted.as_deref()
    }

    pub fn is_setup(&self) -> bool {
        self.state == TimelineState::Setup
    }

    pub fn is_playing(&self) -> bool {
        self.state == TimelineState::Playing
    }

    pub fn is_rewinding(&self) -> bool {
        self.state == TimelineState::Rewinding
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            TimelineState::Playing | TimelineState::Rewinding
        )
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimelineState::Paused
    }

    pub fn is_stopping(&self) -> bool {
        self.state == TimelineState::Stopping
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TimelineState::Stopped
    }

    pub fn is_stopped_by_play(&self) -> bool {
        self.is_stopped() && self.pre_run_state == TimelineState::Playing
    }

    pub fn is_stopped_by_rewind(&self) -> bool {
        self.is_stopped() && self.pre_run_state == TimelineState::Rewinding
    }

    pub fn is_completed(&self) -> bool {
        self.state == TimelineState::Completed
    }

    pub fn is_completed_by_play(&self) -> bool {
        self.is_completed() && self.pre_run_state == TimelineState::Playing
    }

    pub fn is_completed_by_rewind(&self) -> bool {
        self.is_completed() && self.pre_run_state == TimelineState::Rewinding
    }

    pub fn is_recycled(&self) -> bool {
        self.state == TimelineState::Recycled
    }

    pub fn is_op_restart(&self) -> bool {
        self.operation == Operation::Restart
    }

    pub fn is_op_goto_start(&self) -> bool {
        self.operation == Operation::GotoStart
    }

    pub fn is_op_goto_end(&self) -> bool {
        self.operation == Operation::GotoEnd
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Queue `action` after everything queued so far
    pub fn append(&mut self, action: TweenAction) -> Result<&mut Self> {
        self.add_queued("append", action)
    }

    pub fn append_interval(&mut self, interval: f32) -> Result<&mut Self> {
        self.add_queued("append_interval", TweenAction::interval(interval))
    }

    pub fn append_callback<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_queued("append_callback", TweenAction::callback(callback))
    }

    /// Queue an interval that fires `callback` when it ends
    pub fn append_interval_callback<F>(&mut self, interval: f32, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_queued(
            "append_interval_callback",
            TweenAction::delay_callback(interval, callback),
        )
    }

    /// Run `action` from the start of the timeline
    pub fn add(&mut self, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add", 0.0, action)
    }

    pub fn add_delay(&mut self, delay: f32, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add_delay", delay, action)
    }

    /// Run `action` once everything queued so far has finished
    pub fn add_after_append(&mut self, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add_after_append", self.queue_time, action)
    }

    /// Run `action` once the last concurrently added action has finished
    pub fn add_after_add(&mut self, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add_after_add", self.concurrent_time, action)
    }

    pub fn add_delay_after_append(&mut self, delay: f32, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add_delay_after_append", self.queue_time + delay, action)
    }

    pub fn add_delay_after_add(&mut self, delay: f32, action: TweenAction) -> Result<&mut Self> {
        self.add_concurrent("add_delay_after_add", self.concurrent_time + delay, action)
    }

    pub fn add_callback<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent("add_callback", 0.0, TweenAction::callback(callback))
    }

    pub fn add_callback_after_append<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent(
            "add_callback_after_append",
            self.queue_time,
            TweenAction::callback(callback),
        )
    }

    pub fn add_callback_after_add<F>(&mut self, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent(
            "add_callback_after_add",
            self.concurrent_time,
            TweenAction::callback(callback),
        )
    }

    pub fn add_delay_callback<F>(&mut self, delay: f32, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent("add_delay_callback", delay, TweenAction::callback(callback))
    }

    pub fn add_delay_callback_after_append<F>(&mut self, delay: f32, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent(
            "add_delay_callback_after_append",
            self.queue_time + delay,
            TweenAction::callback(callback),
        )
    }

    pub fn add_delay_callback_after_add<F>(&mut self, delay: f32, callback: F) -> Result<&mut Self>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_concurrent(
            "add_delay_callback_after_add",
            self.concurrent_time + delay,
            TweenAction::callback(callback),
        )
    }

    /// Default ease for actions attached from now on that kept `Ease::Smooth`
    pub fn set_ease(&mut self, ease: Ease) -> Result<&mut Self> {
        self.ensure_setup("set_ease")?;
        self.default_ease = ease;
        Ok(self)
    }

    /// Make actions attached from now on relative
    pub fn set_relative(&mut self, is_relative: bool) -> Result<&mut Self> {
        self.ensure_setup("set_relative")?;
        self.default_relative = is_relative;
        Ok(self)
    }

    pub fn on_start<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Timeline) + Send + 'static,
    {
        self.on_start.push(Box::new(callback));
        self
    }

    pub fn on_complete<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Timeline) + Send + 'static,
    {
        self.on_complete.push(Box::new(callback));
        self
    }

    pub fn on_stop<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Timeline) + Send + 'static,
    {
        self.on_stop.push(Box::new(callback));
        self
    }

    pub fn on_recycle<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut Timeline) + Send + 'static,
    {
        self.on_recycle.push(Box::new(callback));
        self
    }

    fn add_queued(&mut self, op: &'static str, action: TweenAction) -> Result<&mut Self> {
        self.ensure_attachable(op)?;
        self.queue_time = self.attach(action, self.queue_time);
        Ok(self)
    }

    fn add_concurrent(
        &mut self,
        op: &'static str,
        timeline_start: f32,
        action: TweenAction,
    ) -> Result<&mut Self> {
        self.ensure_attachable(op)?;
        self.concurrent_time = self.attach(action, timeline_start);
        Ok(self)
    }

    /// Place `action` at `timeline_start` and return its end offset
    fn attach(&mut self, mut action: TweenAction, timeline_start: f32) -> f32 {
        let timeline_end = timeline_start + action.duration();

        if self.duration < timeline_end {
            self.duration = timeline_end;
        }

        if self.default_ease != Ease::Smooth {
            action.set_default_ease(self.default_ease);
        }

        if self.default_relative {
            action.set_default_relative();
        }

        action.attach_to(timeline_start, timeline_end);
        self.actions.push(action);
        timeline_end
    }

    // =========================================================================
    // Playback control
    // =========================================================================

    pub fn play(&mut self) -> Result<()> {
        self.ensure_can_run("play")?;

        match self.state {
            TimelineState::Setup => {
                self.ensure_has_actions("play")?;
                self.start_play();
                Ok(())
            }
            TimelineState::Playing => {
                tracing::warn!("Timeline play: the state is already [Playing]");
                Ok(())
            }
            TimelineState::Rewinding => self.reverse(),
            TimelineState::Paused => {
                self.pause(false);
                Ok(())
            }
            TimelineState::Stopped => {
                self.start_play();
                Ok(())
            }
            TimelineState::Completed => {
                if self.wait_index == -1 {
                    // rewind reached the start
                    self.start_play();
                    Ok(())
                } else if self.wait_index == self.len() {
                    // play reached the end
                    self.restart()
                } else {
                    Err(self.unexpected("play"))
                }
            }
            TimelineState::Stopping | TimelineState::Recycled => Err(self.unexpected("play")),
        }
    }

    /// Run the timeline backwards from its end. Non-recyclable timelines only.
    pub fn rewind(&mut self) -> Result<()> {
        self.ensure_non_recyclable("rewind")?;
        self.ensure_can_run("rewind")?;

        match self.state {
            TimelineState::Playing => self.reverse(),
            TimelineState::Rewinding => {
                tracing::warn!("Timeline rewind: the state is already [Rewinding]");
                Ok(())
            }
            TimelineState::Paused => {
                self.pause(false);
                Ok(())
            }
            TimelineState::Setup | TimelineState::Stopped | TimelineState::Completed => {
                self.ensure_has_actions("rewind")?;

                if self.wait_index == self.len()
                    || matches!(self.state, TimelineState::Setup | TimelineState::Stopped)
                {
                    self.start_rewind();
                    Ok(())
                } else if self.wait_index == -1 {
                    // rewind already reached the start
                    self.restart()
                } else {
                    Err(self.unexpected("rewind"))
                }
            }
            TimelineState::Stopping | TimelineState::Recycled => Err(self.unexpected("rewind")),
        }
    }

    /// Re-run the current direction from its beginning. Non-recyclable timelines only.
    pub fn restart(&mut self) -> Result<()> {
        self.ensure_non_recyclable("restart")?;
        self.ensure_can_run("restart")?;

        self.operation = Operation::Restart;
        let result = self.restart_run();
        self.operation = Operation::None;
        result
    }

    fn restart_run(&mut self) -> Result<()> {
        match self.state {
            TimelineState::Setup => self.play(),
            TimelineState::Playing => {
                self.reverse_played();
                self.init_play();
                Ok(())
            }
            TimelineState::Rewinding => {
                self.reverse_rewound();
                self.init_rewind();
                Ok(())
            }
            TimelineState::Paused => self.restart_pre_run(),
            TimelineState::Stopped | TimelineState::Completed => {
                self.wants_update = true;
                self.restart_pre_run()
            }
            TimelineState::Stopping | TimelineState::Recycled => Err(self.unexpected("restart")),
        }
    }

    fn restart_pre_run(&mut self) -> Result<()> {
        match self.pre_run_state {
            TimelineState::Playing => {
                self.state = TimelineState::Playing;
                self.reverse_played();
                self.init_play();
                Ok(())
            }
            TimelineState::Rewinding => {
                self.state = TimelineState::Rewinding;
                self.reverse_rewound();
                self.init_rewind();
                Ok(())
            }
            _ => Err(self.unexpected("restart")),
        }
    }

    /// Snap to the beginning of the current run and stop. Non-recyclable timelines only.
    pub fn goto_start(&mut self) -> Result<()> {
        self.ensure_non_recyclable("goto_start")?;
        self.ensure_can_run("goto_start")?;

        self.operation = Operation::GotoStart;
        let result = self.enter_goto("goto_start");

        if result.is_ok() {
            match self.pre_run_state {
                TimelineState::Playing => {
                    self.reverse_played();
                    // ready to play again
                    self.wait_index = -1;
                }
                TimelineState::Rewinding => {
                    self.reverse_rewound();
                    // ready to rewind again
                    self.wait_index = self.len();
                }
                _ => {}
            }
        }

        self.operation = Operation::None;
        result
    }

    /// Snap to the end of the current run and stop. Non-recyclable timelines only.
    pub fn goto_end(&mut self) -> Result<()> {
        self.ensure_non_recyclable("goto_end")?;
        self.ensure_can_run("goto_end")?;

        self.operation = Operation::GotoEnd;
        let result = self.enter_goto("goto_end");

        if result.is_ok() {
            let len = self.len();

            match self.pre_run_state {
                TimelineState::Playing => {
                    for &index in self.update_list.iter().rev() {
                        self.actions[index].complete_play();
                    }

                    if let Some(order) = self.start_sorted.as_deref() {
                        let pending = self.wait_index.clamp(0, len) as usize;
                        for &index in &order[pending..] {
                            self.actions[index].complete_play();
                        }
                    }

                    self.wait_index = len;
                }
                TimelineState::Rewinding => {
                    for &index in self.update_list.iter().rev() {
                        self.actions[index].complete_rewind();
                    }

                    if let Some(order) = self.end_sorted.as_deref() {
                        let pending = (self.wait_index.clamp(-1, len - 1) + 1) as usize;
                        for &index in order[..pending].iter().rev() {
                            self.actions[index].complete_rewind();
                        }
                    }

                    self.wait_index = -1;
                }
                _ => {}
            }

            self.update_list.clear();
        }

        self.operation = Operation::None;
        result
    }

    fn enter_goto(&mut self, op: &'static str) -> Result<()> {
        match self.state {
            TimelineState::Playing | TimelineState::Rewinding => {
                self.pre_run_state = self.state;
                self.state = TimelineState::Stopping;
                Ok(())
            }
            TimelineState::Paused => {
                self.state = TimelineState::Stopping;
                Ok(())
            }
            // already out of the active set, or inside on_complete / on_stop
            TimelineState::Stopped | TimelineState::Completed => Ok(()),
            TimelineState::Setup | TimelineState::Stopping | TimelineState::Recycled => {
                Err(self.unexpected(op))
            }
        }
    }

    /// Flip the run direction, keeping the playhead where it is
    ///
    /// From `Stopped`/`Completed` this starts a run opposite to the last one.
    /// While paused it flips the direction the timeline resumes in.
    pub fn reverse(&mut self) -> Result<()> {
        self.ensure_can_run("reverse")?;

        match self.state {
            TimelineState::Playing => {
                self.ensure_non_recyclable("reverse")?;
                self.reverse_playing();
                Ok(())
            }
            TimelineState::Rewinding => {
                self.reverse_rewinding();
                Ok(())
            }
            TimelineState::Paused => {
                match self.pre_run_state {
                    TimelineState::Playing => {
                        self.ensure_non_recyclable("reverse")?;
                        self.reverse_playing();
                    }
                    TimelineState::Rewinding => self.reverse_rewinding(),
                    _ => return Err(self.unexpected("reverse")),
                }
                self.pre_run_state = self.state;
                self.state = TimelineState::Paused;
                Ok(())
            }
            TimelineState::Stopped | TimelineState::Completed => match self.pre_run_state {
                TimelineState::Playing => self.rewind(),
                TimelineState::Rewinding => self.play(),
                _ => Err(self.unexpected("reverse")),
            },
            TimelineState::Setup | TimelineState::Stopping | TimelineState::Recycled => {
                Err(self.unexpected("reverse"))
            }
        }
    }

    /// Playing -> Rewinding
    fn reverse_playing(&mut self) {
        self.ensure_end_sorted();
        let len = self.len();

        let parked = self.end_sorted.as_deref().and_then(|o| o.last()).copied();
        if self.wait_index == len && self.is_only_active(parked) {
            if let Some(last) = parked {
                let timeline_end = self.actions[last].timeline_end();
                if self.cur_time >= timeline_end {
                    // still parked at the end from the previous reverse
                    self.update_list.clear();
                    self.cur_timeline = timeline_end;
                    self.wait_index = len - 1;
                    self.pre_run_state = TimelineState::Playing;
                    self.state = TimelineState::Rewinding;
                    return;
                }
            }
        }

        if self.wait_index == 0 && self.update_list.is_empty() {
            // Nothing has started yet. Hand the first action to the rewind
            // drive so the run still completes.
            if let Some(&first) = self.start_sorted.as_deref().and_then(|o| o.first()) {
                self.actions[first].init_values();
                self.update_list.push(first);
            }
            self.wait_index = -1;
        } else {
            let mut scan = match self.start_sorted.as_deref() {
                Some(order) if (0..len).contains(&self.wait_index) => {
                    let waiting = order[self.wait_index as usize];
                    self.end_position(waiting) - 1
                }
                _ => len - 1,
            };

            self.wait_index = -1;

            // first action below the waiting one that already finished playing
            while scan > -1 {
                let index = self.end_sorted()[scan as usize];
                let timeline_end = self.actions[index].timeline_end();

                if timeline_end <= self.cur_time && !self.update_list.contains(&index) {
                    self.cur_timeline = timeline_end;
                    self.wait_index = scan;
                    break;
                }

                scan -= 1;
            }
        }

        self.pre_run_state = TimelineState::Playing;
        self.state = TimelineState::Rewinding;
    }

    /// Rewinding -> Playing
    fn reverse_rewinding(&mut self) {
        self.ensure_start_sorted();
        let len = self.len();

        let parked = self.start_sorted.as_deref().and_then(|o| o.first()).copied();
        if self.wait_index == -1 && self.is_only_active(parked) {
            if let Some(first) = parked {
                let timeline_start = self.actions[first].timeline_start();
                if self.cur_time <= timeline_start {
                    // still parked at the start from the previous reverse
                    self.update_list.clear();
                    self.cur_timeline = timeline_start;
                    self.wait_index = 0;
                    self.pre_run_state = TimelineState::Rewinding;
                    self.state = TimelineState::Playing;
                    return;
                }
            }
        }

        if self.wait_index == len - 1 && self.update_list.is_empty() {
            // Nothing has started rewinding yet. Hand the last action to the
            // play drive so the run still completes.
            if let Some(&last) = self.end_sorted.as_deref().and_then(|o| o.last()) {
                self.actions[last].init_values();
                self.update_list.push(last);
            }
            self.wait_index = len;
        } else {
            let mut scan = match self.end_sorted.as_deref() {
                Some(order) if (0..len).contains(&self.wait_index) => {
                    let waiting = order[self.wait_index as usize];
                    self.start_position(waiting) + 1
                }
                _ => 0,
            };

            self.wait_index = len;

            // first action above the waiting one that already finished rewinding
            while scan < len {
                let index = self.start_sorted()[scan as usize];
                let timeline_start = self.actions[index].timeline_start();

                if timeline_start >= self.cur_time && !self.update_list.contains(&index) {
                    self.cur_timeline = timeline_start;
                    self.wait_index = scan;
                    break;
                }

                scan += 1;
            }
        }

        self.pre_run_state = TimelineState::Rewinding;
        self.state = TimelineState::Playing;
    }

    /// Drop running actions without completing them; `on_stop` fires on the next tick
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_can_run("stop")?;

        match self.state {
            TimelineState::Playing | TimelineState::Rewinding => {
                self.pre_run_state = self.state;
                self.state = TimelineState::Stopping;
                self.update_list.clear();
                Ok(())
            }
            TimelineState::Paused => {
                // keep the direction from before the pause
                self.state = TimelineState::Stopping;
                self.update_list.clear();
                Ok(())
            }
            TimelineState::Setup | TimelineState::Stopped | TimelineState::Completed => {
                tracing::warn!("Timeline stop: the state [{:?}] is not running", self.state);
                Ok(())
            }
            TimelineState::Stopping | TimelineState::Recycled => Err(self.unexpected("stop")),
        }
    }

    /// Pause (`true`) or resume (`false`) a running timeline
    pub fn pause(&mut self, paused: bool) {
        if paused {
            match self.state {
                TimelineState::Playing | TimelineState::Rewinding => {
                    self.pre_run_state = self.state;
                    self.state = TimelineState::Paused;
                }
                TimelineState::Paused => {
                    tracing::warn!("Timeline pause: the state is already [Paused]");
                }
                state => {
                    tracing::warn!(
                        "Timeline pause: the state [{:?}] is not [Playing] or [Rewinding]",
                        state
                    );
                }
            }
        } else if self.state == TimelineState::Paused {
            self.state = self.pre_run_state;
        } else {
            tracing::warn!("Timeline pause: the state is already not [Paused]");
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance the playhead by `dt` and drive the running actions
    pub(crate) fn update(&mut self, dt: f32, batch: &mut BatchEvaluator) -> TickOutcome {
        match self.state {
            TimelineState::Playing => {
                self.cur_time = (self.cur_time + dt).min(self.duration);
                self.activate_played();

                if self.drive_play(batch) {
                    return self.complete();
                }

                TickOutcome::Running
            }
            TimelineState::Rewinding => {
                self.cur_time = (self.cur_time - dt).max(0.0);
                self.activate_rewound();

                if self.drive_rewind(batch) {
                    return self.complete();
                }

                TickOutcome::Running
            }
            TimelineState::Paused => TickOutcome::Running,
            TimelineState::Stopping => {
                // keep pre_run_state from before the stop
                self.state = TimelineState::Stopped;
                self.operation = Operation::CallOnStop;
                self.fire(Hook::Stop);
                self.operation = Operation::None;
                TickOutcome::Finished
            }
            TimelineState::Setup
            | TimelineState::Stopped
            | TimelineState::Completed
            | TimelineState::Recycled => {
                self.unexpected("update");
                TickOutcome::Finished
            }
        }
    }

    fn activate_played(&mut self) {
        let len = self.len();
        if self.wait_index >= len || self.cur_timeline > self.cur_time {
            return;
        }

        let cur_time = self.cur_time;

        let mut j = self.update_list.len();
        while j > 0 {
            j -= 1;
            let index = self.update_list[j];
            if self.actions[index].check_play_completed(cur_time) {
                self.update_list.swap_remove(j);
            }
        }

        let Some(order) = self.start_sorted.as_deref() else {
            return;
        };

        loop {
            let index = order[self.wait_index as usize];
            self.actions[index].init_play();
            self.update_list.push(index);

            self.wait_index += 1;
            if self.wait_index == len {
                break;
            }

            let next_start = self.actions[order[self.wait_index as usize]].timeline_start();
            if next_start > cur_time {
                self.cur_timeline = next_start;
                break;
            }
        }
    }

    fn activate_rewound(&mut self) {
        if self.wait_index < 0 || self.cur_timeline < self.cur_time {
            return;
        }

        let cur_time = self.cur_time;

        let mut j = self.update_list.len();
        while j > 0 {
            j -= 1;
            let index = self.update_list[j];
            if self.actions[index].check_rewind_completed(cur_time) {
                self.update_list.swap_remove(j);
            }
        }

        let Some(order) = self.end_sorted.as_deref() else {
            return;
        };

        loop {
            let index = order[self.wait_index as usize];
            self.actions[index].init_rewind();
            self.update_list.push(index);

            self.wait_index -= 1;
            if self.wait_index < 0 {
                break;
            }

            let next_end = self.actions[order[self.wait_index as usize]].timeline_end();
            if next_end < cur_time {
                self.cur_timeline = next_end;
                break;
            }
        }
    }

    /// Drive running actions forward; `true` once the whole run is done
    fn drive_play(&mut self, batch: &mut BatchEvaluator) -> bool {
        let cur_time = self.cur_time;

        let mut j = self.update_list.len();
        while j > 0 {
            j -= 1;
            let index = self.update_list[j];
            if !self.actions[index].play(cur_time, self.id, index, batch) {
                self.update_list.swap_remove(j);
            }
        }

        self.update_list.is_empty() && self.wait_index >= self.len() && cur_time >= self.duration
    }

    /// Drive running actions backward; `true` once the whole run is done
    fn drive_rewind(&mut self, batch: &mut BatchEvaluator) -> bool {
        let cur_time = self.cur_time;

        let mut j = self.update_list.len();
        while j > 0 {
            j -= 1;
            let index = self.update_list[j];
            if !self.actions[index].rewind(cur_time, self.id, index, batch) {
                self.update_list.swap_remove(j);
            }
        }

        self.update_list.is_empty() && self.wait_index < 0 && cur_time <= 0.0
    }

    fn complete(&mut self) -> TickOutcome {
        self.pre_run_state = self.state;
        self.state = TimelineState::Completed;
        self.operation = Operation::CallOnComplete;
        self.fire(Hook::Complete);
        self.operation = Operation::None;
        TickOutcome::Finished
    }

    pub(crate) fn apply_outputs(&mut self, action: usize, outputs: &[f32]) {
        if let Some(action) = self.actions.get_mut(action) {
            action.apply_outputs(outputs);
        }
    }

    // =========================================================================
    // Pool lifecycle
    // =========================================================================

    pub(crate) fn set_recyclable(&mut self, is_recyclable: bool) {
        self.is_recyclable = is_recyclable;
    }

    /// Not in the active set and not inside a completion callback
    pub(crate) fn is_idle(&self) -> bool {
        !self.registered
            && matches!(
                self.state,
                TimelineState::Setup | TimelineState::Stopped | TimelineState::Completed
            )
    }

    /// Drop the running set without completing anything; teardown only
    pub(crate) fn abandon_actions(&mut self) {
        self.update_list.clear();
    }

    /// Fire `on_recycle`, release every action to `pool`, and reset to construction defaults
    pub(crate) fn recycle(&mut self, pool: &mut ActionPool) -> Result<()> {
        if self.state == TimelineState::Recycled {
            return Err(TweenError::Recycled { op: "recycle" });
        }

        if !self.update_list.is_empty() {
            return Err(TweenError::ActiveActions {
                count: self.update_list.len(),
            });
        }

        self.fire(Hook::Recycle);

        for action in self.actions.drain(..) {
            pool.release(action);
        }

        self.start_sorted = None;
        self.end_sorted = None;
        self.duration = 0.0;
        self.queue_time = 0.0;
        self.concurrent_time = 0.0;
        self.cur_timeline = 0.0;
        self.cur_time = 0.0;
        self.wait_index = -1;
        self.on_start.clear();
        self.on_complete.clear();
        self.on_stop.clear();
        self.on_recycle.clear();
        self.default_ease = Ease::Smooth;
        self.default_relative = false;
        self.pre_run_state = TimelineState::Setup;
        self.operation = Operation::None;
        self.wants_update = false;
        self.registered = false;
        self.state = TimelineState::Recycled;

        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn len(&self) -> isize {
        self.actions.len() as isize
    }

    fn start_sorted(&self) -> &[usize] {
        self.start_sorted.as_deref().unwrap_or(&[])
    }

    fn end_sorted(&self) -> &[usize] {
        self.end_sorted.as_deref().unwrap_or(&[])
    }

    fn ensure_start_sorted(&mut self) {
        if self.start_sorted.is_none() {
            self.start_sorted = Some(sorted_order(&self.actions, TweenAction::timeline_start));
        }
    }

    fn ensure_end_sorted(&mut self) {
        if self.end_sorted.is_none() {
            self.end_sorted = Some(sorted_order(&self.actions, TweenAction::timeline_end));
        }
    }

    fn is_only_active(&self, action: Option<usize>) -> bool {
        action.is_some() && self.update_list.len() == 1 && self.update_list.first().copied() == action
    }

    fn end_position(&self, action: usize) -> isize {
        self.end_sorted()
            .iter()
            .position(|&i| i == action)
            .map_or(self.len(), |p| p as isize)
    }

    fn start_position(&self, action: usize) -> isize {
        self.start_sorted()
            .iter()
            .position(|&i| i == action)
            .map_or(-1, |p| p as isize)
    }

    fn start_play(&mut self) {
        self.ensure_start_sorted();
        self.state = TimelineState::Playing;
        self.init_play();
        self.wants_update = true;
    }

    fn start_rewind(&mut self) {
        self.ensure_end_sorted();
        self.state = TimelineState::Rewinding;
        self.init_rewind();
        self.wants_update = true;
    }

    fn init_play(&mut self) {
        if let Some(&first) = self.start_sorted().first() {
            self.cur_timeline = self.actions[first].timeline_start();
        }
        self.wait_index = 0;
        self.cur_time = 0.0;
        self.fire(Hook::Start);
    }

    fn init_rewind(&mut self) {
        if let Some(&last) = self.end_sorted().last() {
            self.cur_timeline = self.actions[last].timeline_end();
        }
        self.wait_index = self.len() - 1;
        self.cur_time = self.duration;
        self.fire(Hook::Start);
    }

    /// Complete every action played so far backwards, ready to play again
    fn reverse_played(&mut self) {
        let played = self.wait_index.clamp(0, self.len()) as usize;

        if let Some(order) = self.start_sorted.as_deref() {
            for &index in order[..played].iter().rev() {
                self.actions[index].complete_rewind();
            }
        }

        self.update_list.clear();
    }

    /// Complete every action rewound so far forwards, ready to rewind again
    fn reverse_rewound(&mut self) {
        let rewound = (self.wait_index + 1).clamp(0, self.len()) as usize;

        if let Some(order) = self.end_sorted.as_deref() {
            for &index in &order[rewound..] {
                self.actions[index].complete_play();
            }
        }

        self.update_list.clear();
    }

    fn callbacks_mut(&mut self, hook: Hook) -> &mut Vec<TimelineCallback> {
        match hook {
            Hook::Start => &mut self.on_start,
            Hook::Complete => &mut self.on_complete,
            Hook::Stop => &mut self.on_stop,
            Hook::Recycle => &mut self.on_recycle,
        }
    }

    /// Invoke callbacks in registration order; ones added meanwhile run next time
    fn fire(&mut self, hook: Hook) {
        let mut callbacks = std::mem::take(self.callbacks_mut(hook));
        if callbacks.is_empty() {
            return;
        }

        for callback in callbacks.iter_mut() {
            callback(self);
        }

        let added = std::mem::replace(self.callbacks_mut(hook), callbacks);
        self.callbacks_mut(hook).extend(added);
    }

    fn ensure_can_run(&self, op: &'static str) -> Result<()> {
        match self.state {
            TimelineState::Recycled => Err(TweenError::Recycled { op }),
            TimelineState::Stopping => Err(TweenError::Stopping { op }),
            _ => Ok(()),
        }
    }

    fn ensure_non_recyclable(&self, op: &'static str) -> Result<()> {
        if self.is_recyclable {
            Err(TweenError::RequiresNonRecyclable { op })
        } else {
            Ok(())
        }
    }

    fn ensure_setup(&self, op: &'static str) -> Result<()> {
        if self.state == TimelineState::Setup {
            Ok(())
        } else {
            Err(TweenError::NotInSetup {
                op,
                state: self.state,
            })
        }
    }

    fn ensure_attachable(&self, op: &'static str) -> Result<()> {
        if self.state == TimelineState::Setup {
            Ok(())
        } else {
            Err(TweenError::AlreadyScheduled { op })
        }
    }

    fn ensure_has_actions(&self, op: &'static str) -> Result<()> {
        if self.actions.is_empty() {
            Err(TweenError::EmptyTimeline { op })
        } else {
            Ok(())
        }
    }

    fn unexpected(&self, op: &'static str) -> TweenError {
        tracing::error!("Timeline {}: unexpected state [{:?}]", op, self.state);
        TweenError::UnexpectedState {
            op,
            state: self.state,
        }
    }
}

fn sort_key(time: f32) -> i64 {
    (time * SORT_SCALE) as i64
}

/// Indices of `actions` ordered by `key`, equal keys in reverse insertion order
fn sorted_order(actions: &[TweenAction], key: fn(&TweenAction) -> f32) -> Box<[usize]> {
    let mut order: Vec<usize> = (0..actions.len()).rev().collect();
    order.sort_by_key(|&index| sort_key(key(&actions[index])));
    order.into_boxed_slice()
}
