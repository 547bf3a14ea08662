//! Tween actions
//!
//! An action is one time-scoped interpolation over a handful of scalar
//! channels. It reads its target through a getter, writes it back through a
//! setter, and is owned by exactly one timeline while attached. The timeline
//! drives it through the `init_*` / `play` / `rewind` / `complete_*` contract;
//! the eased values themselves are computed by the batch evaluator.

use crate::batch::{BatchEvaluator, EaseCurve, LaneTimes};
use crate::easing::Ease;
use crate::scheduler::TimelineId;
use smallvec::SmallVec;

/// Reads the target's current channel values into the slice
pub type TargetGetter = Box<dyn FnMut(&mut [f32]) + Send>;

/// Writes channel values to the target
pub type TargetSetter = Box<dyn FnMut(&[f32]) + Send>;

/// Zero-argument action hook
pub type ActionHook = Box<dyn FnMut() + Send>;

/// One interpolated channel of an action
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionValue {
    /// Value the channel ends at (or the offset, when relative)
    pub final_value: f32,
    /// Captured target value at first init
    pub from: f32,
    /// Resolved end value
    pub to: f32,
    pub ease: Ease,
    pub is_relative: bool,
}

impl ActionValue {
    fn new(final_value: f32) -> Self {
        Self {
            final_value,
            from: 0.0,
            to: 0.0,
            ease: Ease::Smooth,
            is_relative: false,
        }
    }
}

/// A time-scoped interpolation unit attached to a timeline
pub struct TweenAction {
    duration: f32,
    timeline_start: f32,
    timeline_end: f32,
    is_init: bool,
    values: SmallVec<[ActionValue; 4]>,
    targets: SmallVec<[f32; 4]>,
    extra_params: SmallVec<[f32; 6]>,
    getter: Option<TargetGetter>,
    setter: Option<TargetSetter>,
    on_start: Vec<ActionHook>,
    on_complete: Vec<ActionHook>,
}

impl std::fmt::Debug for TweenAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweenAction")
            .field("duration", &self.duration)
            .field("timeline_start", &self.timeline_start)
            .field("timeline_end", &self.timeline_end)
            .field("values", &self.values)
            .field("extra_params", &self.extra_params)
            .finish_non_exhaustive()
    }
}

impl Default for TweenAction {
    fn default() -> Self {
        Self {
            duration: 0.0,
            timeline_start: 0.0,
            timeline_end: 0.0,
            is_init: false,
            values: SmallVec::new(),
            targets: SmallVec::new(),
            extra_params: SmallVec::new(),
            getter: None,
            setter: None,
            on_start: Vec::new(),
            on_complete: Vec::new(),
        }
    }
}

impl TweenAction {
    /// Interpolate `N` channels from whatever `get` reports on first init to `finals`
    pub fn values<const N: usize, G, S>(get: G, set: S, finals: [f32; N], duration: f32) -> Self
    where
        G: FnMut() -> [f32; N] + Send + 'static,
        S: FnMut([f32; N]) + Send + 'static,
    {
        Self::default().into_values(get, set, finals, duration)
    }

    pub fn float<G, S>(mut get: G, mut set: S, final_value: f32, duration: f32) -> Self
    where
        G: FnMut() -> f32 + Send + 'static,
        S: FnMut(f32) + Send + 'static,
    {
        Self::values(move || [get()], move |[v]| set(v), [final_value], duration)
    }

    pub fn vec2<G, S>(get: G, set: S, finals: [f32; 2], duration: f32) -> Self
    where
        G: FnMut() -> [f32; 2] + Send + 'static,
        S: FnMut([f32; 2]) + Send + 'static,
    {
        Self::values(get, set, finals, duration)
    }

    pub fn vec3<G, S>(get: G, set: S, finals: [f32; 3], duration: f32) -> Self
    where
        G: FnMut() -> [f32; 3] + Send + 'static,
        S: FnMut([f32; 3]) + Send + 'static,
    {
        Self::values(get, set, finals, duration)
    }

    pub fn vec4<G, S>(get: G, set: S, finals: [f32; 4], duration: f32) -> Self
    where
        G: FnMut() -> [f32; 4] + Send + 'static,
        S: FnMut([f32; 4]) + Send + 'static,
    {
        Self::values(get, set, finals, duration)
    }

    /// An action with no channels that only occupies time
    pub fn interval(duration: f32) -> Self {
        Self::default().into_timing(duration)
    }

    /// A zero-length action that fires `callback` when completed
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::delay_callback(0.0, callback)
    }

    /// An action that fires `callback` after `delay` seconds of its own
    pub fn delay_callback<F>(delay: f32, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::default().into_timing(delay).on_complete(callback)
    }

    fn into_timing(mut self, duration: f32) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    fn into_values<const N: usize, G, S>(
        mut self,
        mut get: G,
        mut set: S,
        finals: [f32; N],
        duration: f32,
    ) -> Self
    where
        G: FnMut() -> [f32; N] + Send + 'static,
        S: FnMut([f32; N]) + Send + 'static,
    {
        self.getter = Some(Box::new(move |out: &mut [f32]| {
            for (slot, value) in out.iter_mut().zip(get()) {
                *slot = value;
            }
        }));
        self.setter = Some(Box::new(move |values: &[f32]| {
            let mut channels = [0.0; N];
            for (slot, value) in channels.iter_mut().zip(values) {
                *slot = *value;
            }
            set(channels);
        }));

        self.values.extend(finals.into_iter().map(ActionValue::new));
        self.targets.resize(N, 0.0);
        self.into_timing(duration)
    }

    // Builder-style settings, only reachable before the action is attached

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_start.push(Box::new(hook));
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_complete.push(Box::new(hook));
        self
    }

    pub fn set_ease(mut self, ease: Ease) -> Self {
        for value in self.values.iter_mut() {
            value.ease = ease;
        }
        self
    }

    /// Set the ease of one channel; out-of-range channels are ignored
    pub fn set_ease_at(mut self, channel: usize, ease: Ease) -> Self {
        match self.values.get_mut(channel) {
            Some(value) => value.ease = ease,
            None => tracing::warn!(
                "TweenAction set_ease_at: channel {} out of {} channels",
                channel,
                self.values.len()
            ),
        }
        self
    }

    pub fn set_relative(mut self, is_relative: bool) -> Self {
        for value in self.values.iter_mut() {
            value.is_relative = is_relative;
        }
        self
    }

    pub fn set_relative_at(mut self, channel: usize, is_relative: bool) -> Self {
        match self.values.get_mut(channel) {
            Some(value) => value.is_relative = is_relative,
            None => tracing::warn!(
                "TweenAction set_relative_at: channel {} out of {} channels",
                channel,
                self.values.len()
            ),
        }
        self
    }

    /// Append extra parameters for shake and bezier eases (see `EaseCurve::resolve`)
    pub fn set_extra_params(mut self, params: &[f32]) -> Self {
        self.extra_params.extend_from_slice(params);
        self
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn timeline_start(&self) -> f32 {
        self.timeline_start
    }

    pub fn timeline_end(&self) -> f32 {
        self.timeline_end
    }

    pub fn channels(&self) -> &[ActionValue] {
        &self.values
    }

    pub fn extra_params(&self) -> &[f32] {
        &self.extra_params
    }

    // Timeline contract

    pub(crate) fn attach_to(&mut self, timeline_start: f32, timeline_end: f32) {
        self.timeline_start = timeline_start;
        self.timeline_end = timeline_end;
    }

    /// Replace the ease of channels still on the default curve
    pub(crate) fn set_default_ease(&mut self, ease: Ease) {
        for value in self.values.iter_mut().filter(|v| v.ease == Ease::Smooth) {
            value.ease = ease;
        }
    }

    /// Mark every absolute channel relative
    pub(crate) fn set_default_relative(&mut self) {
        for value in self.values.iter_mut().filter(|v| !v.is_relative) {
            value.is_relative = true;
        }
    }

    /// Capture `from`/`to` once per attached lifetime
    pub(crate) fn init_values(&mut self) {
        if self.is_init || self.values.is_empty() {
            return;
        }

        if let Some(getter) = self.getter.as_mut() {
            getter(&mut self.targets);
        }

        for (value, target) in self.values.iter_mut().zip(self.targets.iter()) {
            value.from = *target;
            value.to = if value.is_relative {
                value.from + value.final_value
            } else {
                value.final_value
            };
        }

        self.is_init = true;
    }

    pub(crate) fn init_play(&mut self) {
        self.init_values();
        fire(&mut self.on_start);
    }

    pub(crate) fn init_rewind(&mut self) {
        self.init_values();
        fire(&mut self.on_start);
    }

    /// Advance towards the end; `false` once the action has completed
    pub(crate) fn play(
        &mut self,
        timeline_time: f32,
        timeline: TimelineId,
        index: usize,
        batch: &mut BatchEvaluator,
    ) -> bool {
        let local = timeline_time - self.timeline_start;

        if local < self.duration {
            self.queue_lanes(local, timeline, index, batch);
            true
        } else {
            self.complete_play();
            false
        }
    }

    /// Advance towards the start; `false` once the action has completed
    pub(crate) fn rewind(
        &mut self,
        timeline_time: f32,
        timeline: TimelineId,
        index: usize,
        batch: &mut BatchEvaluator,
    ) -> bool {
        let local = timeline_time - self.timeline_start;

        if local > 0.0 {
            self.queue_lanes(local, timeline, index, batch);
            true
        } else {
            self.complete_rewind();
            false
        }
    }

    pub(crate) fn check_play_completed(&mut self, timeline_time: f32) -> bool {
        if timeline_time - self.timeline_start >= self.duration {
            self.complete_play();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_rewind_completed(&mut self, timeline_time: f32) -> bool {
        if timeline_time - self.timeline_start <= 0.0 {
            self.complete_rewind();
            true
        } else {
            false
        }
    }

    /// Snap every channel to its end value and fire `on_complete`
    pub(crate) fn complete_play(&mut self) {
        if !self.values.is_empty() {
            self.init_values();
            for (target, value) in self.targets.iter_mut().zip(self.values.iter()) {
                *target = value.to;
            }
            self.write_targets();
        }

        fire(&mut self.on_complete);
    }

    /// Snap every channel to its start value and fire `on_complete`
    pub(crate) fn complete_rewind(&mut self) {
        if !self.values.is_empty() {
            self.init_values();
            for (target, value) in self.targets.iter_mut().zip(self.values.iter()) {
                *target = value.from;
            }
            self.write_targets();
        }

        fire(&mut self.on_complete);
    }

    /// Write the batch outputs for this action back to its target
    pub(crate) fn apply_outputs(&mut self, outputs: &[f32]) {
        for (target, output) in self.targets.iter_mut().zip(outputs) {
            *target = *output;
        }
        self.write_targets();
    }

    /// Reset to the freshly-constructed state, keeping buffer capacity
    pub(crate) fn recycle(&mut self) {
        self.duration = 0.0;
        self.timeline_start = 0.0;
        self.timeline_end = 0.0;
        self.is_init = false;
        self.values.clear();
        self.targets.clear();
        self.extra_params.clear();
        self.getter = None;
        self.setter = None;
        self.on_start.clear();
        self.on_complete.clear();
    }

    fn queue_lanes(
        &self,
        local: f32,
        timeline: TimelineId,
        index: usize,
        batch: &mut BatchEvaluator,
    ) {
        if self.values.is_empty() {
            return;
        }

        let extra = &self.extra_params;
        batch.push_action(
            timeline,
            index,
            LaneTimes {
                current: local,
                duration: self.duration,
            },
            self.values
                .iter()
                .enumerate()
                .map(|(channel, v)| (v.from, v.to, EaseCurve::resolve(v.ease, extra, channel))),
        );
    }

    fn write_targets(&mut self) {
        if let Some(setter) = self.setter.as_mut() {
            setter(&self.targets);
        }
    }
}

fn fire(hooks: &mut [ActionHook]) {
    for hook in hooks.iter_mut() {
        hook();
    }
}

/// Free list of recycled actions
///
/// Factories mirror the `TweenAction` constructors but reuse a cached
/// instance when one is available.
#[derive(Default)]
pub struct ActionPool {
    cached: Vec<TweenAction>,
}

impl ActionPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cached: Vec::with_capacity(capacity),
        }
    }

    fn acquire(&mut self) -> TweenAction {
        self.cached.pop().unwrap_or_default()
    }

    pub(crate) fn release(&mut self, mut action: TweenAction) {
        action.recycle();
        self.cached.push(action);
    }

    pub fn values<const N: usize, G, S>(
        &mut self,
        get: G,
        set: S,
        finals: [f32; N],
        duration: f32,
    ) -> TweenAction
    where
        G: FnMut() -> [f32; N] + Send + 'static,
        S: FnMut([f32; N]) + Send + 'static,
    {
        self.acquire().into_values(get, set, finals, duration)
    }

    pub fn float<G, S>(&mut self, mut get: G, mut set: S, final_value: f32, duration: f32) -> TweenAction
    where
        G: FnMut() -> f32 + Send + 'static,
        S: FnMut(f32) + Send + 'static,
    {
        self.values(move || [get()], move |[v]| set(v), [final_value], duration)
    }

    pub fn vec2<G, S>(&mut self, get: G, set: S, finals: [f32; 2], duration: f32) -> TweenAction
    where
        G: FnMut() -> [f32; 2] + Send + 'static,
        S: FnMut([f32; 2]) + Send + 'static,
    {
        self.values(get, set, finals, duration)
    }

    pub fn vec3<G, S>(&mut self, get: G, set: S, finals: [f32; 3], duration: f32) -> TweenAction
    where
        G: FnMut() -> [f32; 3] + Send + 'static,
        S: FnMut([f32; 3]) + Send + 'static,
    {
        self.values(get, set, finals, duration)
    }

    pub fn vec4<G, S>(&mut self, get: G, set: S, finals: [f32; 4], duration: f32) -> TweenAction
    where
        G: FnMut() -> [f32; 4] + Send + 'static,
        S: FnMut([f32; 4]) + Send + 'static,
    {
        self.values(get, set, finals, duration)
    }

    pub fn interval(&mut self, duration: f32) -> TweenAction {
        self.acquire().into_timing(duration)
    }

    pub fn callback<F>(&mut self, callback: F) -> TweenAction
    where
        F: FnMut() + Send + 'static,
    {
        self.delay_callback(0.0, callback)
    }

    pub fn delay_callback<F>(&mut self, delay: f32, callback: F) -> TweenAction
    where
        F: FnMut() + Send + 'static,
    {
        self.acquire().into_timing(delay).on_complete(callback)
    }

    /// Number of cached actions ready for reuse
    pub fn len(&self) -> usize {
        self.cached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.cached.clear();
        self.cached.shrink_to_fit();
    }
}
