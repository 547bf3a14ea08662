//! Timeline scheduler
//!
//! Owns every live timeline, drives the active ones once per tick, and runs
//! the batched easing pass across all of them before writing results back.

use crate::action::ActionPool;
use crate::batch::BatchEvaluator;
use crate::config::SchedulerConfig;
use crate::error::{Result, TweenError};
use crate::timeline::{TickOutcome, Timeline};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generation-checked handle to a timeline; stale once the timeline is recycled
    pub struct TimelineId;
}

/// Drives timelines against an external clock
pub struct Scheduler {
    config: SchedulerConfig,
    timelines: SlotMap<TimelineId, Timeline>,
    /// Recycled timelines ready for reuse
    cached: Vec<Timeline>,
    /// Non-recyclable timelines, force-recycled on teardown
    unrecycled: Vec<TimelineId>,
    active: Vec<TimelineId>,
    /// Handed out through `timeline_mut` since the last admission pass
    touched: Vec<TimelineId>,
    actions: ActionPool,
    batch: BatchEvaluator,
    disposed: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SchedulerConfig) -> Self {
        let workers = config.resolved_workers();
        tracing::debug!(
            "Scheduler created: {} batch workers, parallel above {} lanes",
            workers,
            config.parallel_threshold
        );

        Self {
            timelines: SlotMap::with_key(),
            cached: Vec::with_capacity(config.timeline_pool_capacity),
            unrecycled: Vec::new(),
            active: Vec::new(),
            touched: Vec::new(),
            actions: ActionPool::with_capacity(config.action_pool_capacity),
            batch: BatchEvaluator::new(config.parallel_threshold, workers),
            disposed: false,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn time_scale(&self) -> f32 {
        self.config.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) -> Result<()> {
        let config = SchedulerConfig {
            time_scale,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Action factory backed by the shared free list
    pub fn actions(&mut self) -> &mut ActionPool {
        &mut self.actions
    }

    // =========================================================================
    // Timeline lifecycle
    // =========================================================================

    /// Create a timeline in `Setup`, reusing a cached instance when possible
    pub fn create(&mut self, is_recyclable: bool) -> TimelineId {
        if self.disposed {
            tracing::warn!("Scheduler create: native data already disposed, it will not tick");
        }

        let cached = self.cached.pop();
        let reused = cached.is_some();

        let id = self.timelines.insert_with_key(|key| match cached {
            Some(mut timeline) => {
                timeline.acquire(key, is_recyclable);
                timeline
            }
            None => Timeline::new(key, is_recyclable),
        });

        if !is_recyclable {
            self.unrecycled.push(id);
        }

        tracing::debug!(
            "Timeline {:?} acquired (reused: {}, recyclable: {})",
            id,
            reused,
            is_recyclable
        );
        id
    }

    /// Create a recyclable timeline that fires `callback` after `delay` seconds, and play it
    pub fn play_delay_callback<F>(&mut self, delay: f32, callback: F) -> Result<TimelineId>
    where
        F: FnMut() + Send + 'static,
    {
        if self.disposed {
            return Err(TweenError::AlreadyDisposed);
        }

        let id = self.create(true);
        let timeline = self.timeline_mut(id)?;
        timeline.add_delay_callback(delay, callback)?;
        timeline.play()?;
        self.admit(id);
        Ok(id)
    }

    pub fn timeline(&self, id: TimelineId) -> Result<&Timeline> {
        self.timelines.get(id).ok_or(TweenError::StaleHandle(id))
    }

    /// Mutable access for composition and control
    ///
    /// A run started through this reference joins the active set at the next
    /// tick (or the next scheduler control call).
    pub fn timeline_mut(&mut self, id: TimelineId) -> Result<&mut Timeline> {
        let timeline = self
            .timelines
            .get_mut(id)
            .ok_or(TweenError::StaleHandle(id))?;

        if !timeline.registered {
            self.touched.push(id);
        }

        Ok(timeline)
    }

    pub fn contains(&self, id: TimelineId) -> bool {
        self.timelines.contains_key(id)
    }

    /// Change recyclability; an idle timeline made recyclable is recycled immediately
    pub fn set_recyclable(&mut self, id: TimelineId, is_recyclable: bool) -> Result<()> {
        let timeline = self
            .timelines
            .get_mut(id)
            .ok_or(TweenError::StaleHandle(id))?;

        if timeline.is_recyclable() == is_recyclable {
            return Ok(());
        }

        timeline.set_recyclable(is_recyclable);

        if is_recyclable {
            let idle = timeline.is_idle();
            self.forget_unrecycled(id);

            if idle {
                self.recycle_timeline(id)?;
            }
        } else {
            self.unrecycled.push(id);
        }

        Ok(())
    }

    fn recycle_timeline(&mut self, id: TimelineId) -> Result<()> {
        let timeline = self
            .timelines
            .get_mut(id)
            .ok_or(TweenError::StaleHandle(id))?;

        timeline.recycle(&mut self.actions)?;

        if let Some(timeline) = self.timelines.remove(id) {
            self.cached.push(timeline);
        }

        self.forget_unrecycled(id);
        if let Some(pos) = self.active.iter().position(|&a| a == id) {
            self.active.swap_remove(pos);
        }

        tracing::debug!("Timeline {:?} recycled", id);
        Ok(())
    }

    fn forget_unrecycled(&mut self, id: TimelineId) {
        if let Some(pos) = self.unrecycled.iter().position(|&u| u == id) {
            self.unrecycled.swap_remove(pos);
        }
    }

    // =========================================================================
    // Control
    // =========================================================================

    pub fn play(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::play)
    }

    pub fn rewind(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::rewind)
    }

    pub fn restart(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::restart)
    }

    pub fn reverse(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::reverse)
    }

    pub fn stop(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::stop)
    }

    pub fn goto_start(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::goto_start)
    }

    pub fn goto_end(&mut self, id: TimelineId) -> Result<()> {
        self.control(id, Timeline::goto_end)
    }

    pub fn pause(&mut self, id: TimelineId, paused: bool) -> Result<()> {
        self.control(id, |timeline| {
            timeline.pause(paused);
            Ok(())
        })
    }

    fn control<F>(&mut self, id: TimelineId, op: F) -> Result<()>
    where
        F: FnOnce(&mut Timeline) -> Result<()>,
    {
        let timeline = self
            .timelines
            .get_mut(id)
            .ok_or(TweenError::StaleHandle(id))?;

        let result = op(timeline);
        self.admit(id);
        result
    }

    /// Move a timeline that asked for updates into the active set
    fn admit(&mut self, id: TimelineId) {
        let Some(timeline) = self.timelines.get_mut(id) else {
            return;
        };

        if !std::mem::take(&mut timeline.wants_update) || timeline.registered {
            return;
        }

        timeline.registered = true;
        self.active.push(id);
    }

    fn admit_pending(&mut self) {
        while let Some(id) = self.touched.pop() {
            self.admit(id);
        }
    }

    // =========================================================================
    // Bulk control
    // =========================================================================

    /// Stop every active timeline; returns how many accepted the call
    pub fn stop_all(&mut self) -> usize {
        self.apply_all("stop_all", true, Timeline::stop)
    }

    pub fn pause_all(&mut self, paused: bool) -> usize {
        self.apply_all("pause_all", true, |timeline| {
            timeline.pause(paused);
            Ok(())
        })
    }

    /// Reverse every timeline that has run at least once
    pub fn reverse_all(&mut self) -> usize {
        self.apply_all("reverse_all", false, Timeline::reverse)
    }

    pub fn restart_all(&mut self) -> usize {
        self.apply_all("restart_all", false, Timeline::restart)
    }

    pub fn rewind_all(&mut self) -> usize {
        self.apply_all("rewind_all", false, Timeline::rewind)
    }

    fn apply_all<F>(&mut self, op: &'static str, only_active: bool, mut f: F) -> usize
    where
        F: FnMut(&mut Timeline) -> Result<()>,
    {
        self.admit_pending();
        let mut count = 0;

        for (id, timeline) in self.timelines.iter_mut() {
            if (only_active && !timeline.registered) || timeline.is_setup() {
                continue;
            }

            match f(timeline) {
                Ok(()) => {
                    count += 1;
                    if timeline.wants_update {
                        self.touched.push(id);
                    }
                }
                Err(err) => tracing::debug!("Scheduler {}: skipped {:?}: {}", op, id, err),
            }
        }

        self.admit_pending();
        count
    }

    /// Set recyclability on every live timeline; returns how many were recycled on the spot
    pub fn set_recyclable_all(&mut self, is_recyclable: bool) -> usize {
        let ids: Vec<TimelineId> = self.timelines.keys().collect();
        let live = ids.len();

        for id in ids {
            if let Err(err) = self.set_recyclable(id, is_recyclable) {
                tracing::warn!("Scheduler set_recyclable_all: {:?}: {}", id, err);
            }
        }

        live - self.timelines.len()
    }

    /// Make every timeline recyclable and recycle the idle ones
    ///
    /// Running timelines recycle themselves when their run ends.
    pub fn recycle_all(&mut self) -> usize {
        let recycled = self.set_recyclable_all(true);
        self.unrecycled.clear();
        recycled
    }

    /// Release pooled buffers and force-recycle every timeline
    ///
    /// Call once at shutdown. Ticking afterwards is a logged no-op.
    pub fn dispose_all_native_data(&mut self) -> Result<()> {
        if self.disposed {
            return Err(TweenError::AlreadyDisposed);
        }

        let ids: Vec<TimelineId> = self.timelines.keys().collect();
        let forced = ids.len();

        for id in ids {
            if let Some(timeline) = self.timelines.get_mut(id) {
                timeline.abandon_actions();
                timeline.registered = false;
            }

            if let Err(err) = self.recycle_timeline(id) {
                tracing::error!("Scheduler dispose: {:?} could not be recycled: {}", id, err);
            }
        }

        self.active.clear();
        self.touched.clear();
        self.unrecycled.clear();
        self.cached.clear();
        self.cached.shrink_to_fit();
        self.actions.clear();
        self.batch.release_buffers();
        self.disposed = true;

        tracing::debug!("Scheduler disposed: {} timelines force-recycled", forced);
        Ok(())
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Drive every active timeline by `delta_seconds` (scaled by `time_scale`)
    ///
    /// All timelines advance first; the eased values are computed in one batch
    /// and written to their targets after the batch has joined. A negative or
    /// non-finite delta is ignored.
    pub fn tick(&mut self, delta_seconds: f32) {
        if self.disposed {
            tracing::warn!("Scheduler tick: native data already disposed");
            return;
        }

        let dt = delta_seconds * self.config.time_scale;
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(
                "Scheduler tick: ignoring delta {} (time_scale {})",
                delta_seconds,
                self.config.time_scale
            );
            return;
        }

        self.admit_pending();
        self.batch.begin();

        let mut i = self.active.len();
        while i > 0 {
            i -= 1;
            let id = self.active[i];

            let Some(timeline) = self.timelines.get_mut(id) else {
                self.active.swap_remove(i);
                continue;
            };

            if timeline.update(dt, &mut self.batch) == TickOutcome::Running {
                continue;
            }

            // restarted from its own on_complete / on_stop
            if std::mem::take(&mut timeline.wants_update) {
                continue;
            }

            timeline.registered = false;
            self.active.swap_remove(i);

            if timeline.is_recyclable() && timeline.is_idle() {
                if let Err(err) = self.recycle_timeline(id) {
                    tracing::error!("Scheduler tick: {:?} could not be recycled: {}", id, err);
                }
            }
        }

        tracing::trace!(
            "Scheduler tick: {} active timelines, {} lanes",
            self.active.len(),
            self.batch.lane_count()
        );
        self.batch.dispatch();

        for entry in self.batch.entries() {
            let Some(timeline) = self.timelines.get_mut(entry.timeline) else {
                continue;
            };

            // stopped or completed since its lanes were queued
            if timeline.is_running() {
                timeline.apply_outputs(entry.action, self.batch.outputs(entry.lanes.clone()));
            }
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Timelines currently handed out
    pub fn live_count(&self) -> usize {
        self.timelines.len()
    }

    /// Timelines driven by `tick`
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: TimelineId) -> bool {
        self.timelines.get(id).is_some_and(|t| t.registered)
    }

    pub fn cached_count(&self) -> usize {
        self.cached.len()
    }

    pub fn pooled_action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn unrecycled_count(&self) -> usize {
        self.unrecycled.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn timelines(&self) -> impl Iterator<Item = (TimelineId, &Timeline)> {
        self.timelines.iter()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TweenAction;
    use crate::easing::Ease;
    use std::sync::{Arc, Mutex};

    fn linear_float(value: &Arc<Mutex<f32>>, to: f32, duration: f32) -> TweenAction {
        let get = Arc::clone(value);
        let set = Arc::clone(value);
        TweenAction::float(
            move || *get.lock().unwrap(),
            move |v| *set.lock().unwrap() = v,
            to,
            duration,
        )
        .set_ease(Ease::Linear)
    }

    #[test]
    fn test_tick_writes_eased_values_after_join() {
        let value = Arc::new(Mutex::new(0.0));
        let mut scheduler = Scheduler::new();
        let id = scheduler.create(true);
        scheduler
            .timeline_mut(id)
            .unwrap()
            .append(linear_float(&value, 10.0, 2.0))
            .unwrap();
        scheduler.play(id).unwrap();
        assert!(scheduler.is_active(id));

        scheduler.tick(1.0);
        assert_eq!(*value.lock().unwrap(), 5.0);

        scheduler.tick(1.0);
        assert_eq!(*value.lock().unwrap(), 10.0);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_recycled_handle_goes_stale() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.create(true);
        scheduler.timeline_mut(id).unwrap().append_interval(1.0).unwrap();
        scheduler.play(id).unwrap();
        scheduler.tick(1.0);

        assert!(!scheduler.contains(id));
        assert_eq!(scheduler.cached_count(), 1);
        assert_eq!(scheduler.pooled_action_count(), 1);
        assert_eq!(
            scheduler.play(id).err(),
            Some(TweenError::StaleHandle(id))
        );

        let reused = scheduler.create(true);
        assert_ne!(reused, id);
        assert_eq!(scheduler.cached_count(), 0);
        assert!(scheduler.timeline(reused).unwrap().is_setup());
    }

    #[test]
    fn test_non_recyclable_survives_completion() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.create(false);
        assert_eq!(scheduler.unrecycled_count(), 1);

        scheduler.timeline_mut(id).unwrap().append_interval(1.0).unwrap();
        scheduler.play(id).unwrap();
        scheduler.tick(1.0);

        let timeline = scheduler.timeline(id).unwrap();
        assert!(timeline.is_completed_by_play());
        assert!(!scheduler.is_active(id));
    }

    #[test]
    fn test_play_through_timeline_mut_joins_next_tick() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.create(true);
        {
            let timeline = scheduler.timeline_mut(id).unwrap();
            timeline.append_interval(2.0).unwrap();
            timeline.play().unwrap();
        }
        assert_eq!(scheduler.active_count(), 0);

        scheduler.tick(0.5);
        assert_eq!(scheduler.active_count(), 1);
        assert_eq!(scheduler.timeline(id).unwrap().cur_time(), 0.5);
    }

    #[test]
    fn test_time_scale_multiplies_delta() {
        let mut scheduler = Scheduler::with_config(SchedulerConfig {
            time_scale: 0.5,
            ..Default::default()
        })
        .unwrap();
        let id = scheduler.create(false);
        scheduler.timeline_mut(id).unwrap().append_interval(4.0).unwrap();
        scheduler.play(id).unwrap();

        scheduler.tick(2.0);
        assert_eq!(scheduler.timeline(id).unwrap().cur_time(), 1.0);

        assert!(scheduler.set_time_scale(-2.0).is_err());
        assert_eq!(scheduler.time_scale(), 0.5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SchedulerConfig {
            parallel_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            Scheduler::with_config(config),
            Err(TweenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_play_delay_callback_fires_once() {
        let fired = Arc::new(Mutex::new(0));
        let fired_in = Arc::clone(&fired);

        let mut scheduler = Scheduler::new();
        let id = scheduler
            .play_delay_callback(1.0, move || *fired_in.lock().unwrap() += 1)
            .unwrap();

        scheduler.tick(0.5);
        assert_eq!(*fired.lock().unwrap(), 0);
        scheduler.tick(0.5);
        assert_eq!(*fired.lock().unwrap(), 1);
        assert!(!scheduler.contains(id));
    }

    #[test]
    fn test_set_recyclable_recycles_idle_timeline() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.create(false);
        scheduler.timeline_mut(id).unwrap().append_interval(1.0).unwrap();
        scheduler.play(id).unwrap();
        scheduler.tick(1.0);
        assert!(scheduler.contains(id));

        scheduler.set_recyclable(id, true).unwrap();
        assert!(!scheduler.contains(id));
        assert_eq!(scheduler.unrecycled_count(), 0);
    }

    #[test]
    fn test_restart_from_on_complete_keeps_timeline_active() {
        let runs = Arc::new(Mutex::new(0));
        let runs_in = Arc::clone(&runs);

        let mut scheduler = Scheduler::new();
        let id = scheduler.create(false);
        {
            let timeline = scheduler.timeline_mut(id).unwrap();
            timeline.append_interval(1.0).unwrap();
            timeline.on_complete(move |timeline| {
                let mut runs = runs_in.lock().unwrap();
                *runs += 1;
                if *runs < 3 {
                    timeline.restart().unwrap();
                }
            });
        }
        scheduler.play(id).unwrap();

        for _ in 0..5 {
            scheduler.tick(1.0);
        }

        assert_eq!(*runs.lock().unwrap(), 3);
        assert!(!scheduler.is_active(id));
    }

    #[test]
    fn test_bulk_control_counts() {
        let mut scheduler = Scheduler::new();
        let running: Vec<TimelineId> = (0..3)
            .map(|_| {
                let id = scheduler.create(false);
                scheduler.timeline_mut(id).unwrap().append_interval(5.0).unwrap();
                scheduler.play(id).unwrap();
                id
            })
            .collect();
        let idle = scheduler.create(false);
        scheduler.timeline_mut(idle).unwrap().append_interval(1.0).unwrap();

        scheduler.tick(1.0);
        assert_eq!(scheduler.pause_all(true), 3);
        assert!(scheduler.timeline(running[0]).unwrap().is_paused());

        assert_eq!(scheduler.pause_all(false), 3);
        assert_eq!(scheduler.reverse_all(), 3);
        assert!(scheduler.timeline(running[1]).unwrap().is_rewinding());

        assert_eq!(scheduler.stop_all(), 3);
        scheduler.tick(0.1);
        assert_eq!(scheduler.active_count(), 0);
        assert!(scheduler.timeline(running[2]).unwrap().is_stopped_by_rewind());

        assert_eq!(scheduler.restart_all(), 3);
        assert_eq!(scheduler.active_count(), 3);
    }

    #[test]
    fn test_recycle_all_keeps_running_until_done() {
        let mut scheduler = Scheduler::new();
        let idle = scheduler.create(false);
        let running = scheduler.create(false);
        scheduler.timeline_mut(running).unwrap().append_interval(1.0).unwrap();
        scheduler.play(running).unwrap();

        assert_eq!(scheduler.recycle_all(), 1);
        assert!(!scheduler.contains(idle));
        assert!(scheduler.contains(running));
        assert_eq!(scheduler.unrecycled_count(), 0);

        scheduler.tick(1.0);
        assert!(!scheduler.contains(running));
    }

    #[test]
    fn test_dispose_force_recycles_and_runs_once() {
        let recycled = Arc::new(Mutex::new(0));

        let mut scheduler = Scheduler::new();
        for recyclable in [true, false] {
            let id = scheduler.create(recyclable);
            let recycled = Arc::clone(&recycled);
            let timeline = scheduler.timeline_mut(id).unwrap();
            timeline.append_interval(3.0).unwrap();
            timeline.on_recycle(move |_| *recycled.lock().unwrap() += 1);
            scheduler.play(id).unwrap();
        }
        scheduler.tick(1.0);

        scheduler.dispose_all_native_data().unwrap();
        assert_eq!(*recycled.lock().unwrap(), 2);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.cached_count(), 0);
        assert_eq!(scheduler.pooled_action_count(), 0);

        assert_eq!(
            scheduler.dispose_all_native_data(),
            Err(TweenError::AlreadyDisposed)
        );
        scheduler.tick(1.0);

        assert_eq!(
            scheduler.play_delay_callback(0.5, || {}).err(),
            Some(TweenError::AlreadyDisposed)
        );
        assert_eq!(scheduler.live_count(), 0);
    }

    #[test]
    fn test_invalid_delta_is_ignored() {
        let mut scheduler = Scheduler::new();
        let playing = scheduler.create(false);
        scheduler.timeline_mut(playing).unwrap().append_interval(4.0).unwrap();
        scheduler.play(playing).unwrap();

        let rewinding = scheduler.create(false);
        scheduler.timeline_mut(rewinding).unwrap().append_interval(4.0).unwrap();
        scheduler.rewind(rewinding).unwrap();

        scheduler.tick(1.0);

        for delta in [-1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            scheduler.tick(delta);
        }

        let timeline = scheduler.timeline(playing).unwrap();
        assert!(timeline.is_playing());
        assert_eq!(timeline.cur_time(), 1.0);

        let timeline = scheduler.timeline(rewinding).unwrap();
        assert!(timeline.is_rewinding());
        assert_eq!(timeline.cur_time(), 3.0);

        assert_eq!(scheduler.active_count(), 2);
    }

    #[test]
    fn test_rewind_all_skips_recyclable_and_setup() {
        let mut scheduler = Scheduler::new();
        let finished: Vec<TimelineId> = (0..2)
            .map(|_| {
                let id = scheduler.create(false);
                scheduler.timeline_mut(id).unwrap().append_interval(1.0).unwrap();
                scheduler.play(id).unwrap();
                id
            })
            .collect();
        let recyclable = scheduler.create(true);
        scheduler.timeline_mut(recyclable).unwrap().append_interval(5.0).unwrap();
        scheduler.play(recyclable).unwrap();
        let setup = scheduler.create(false);
        scheduler.timeline_mut(setup).unwrap().append_interval(1.0).unwrap();

        scheduler.tick(1.0);
        assert_eq!(scheduler.active_count(), 1);

        assert_eq!(scheduler.rewind_all(), 2);
        assert_eq!(scheduler.active_count(), 3);
        assert!(scheduler.timeline(finished[0]).unwrap().is_rewinding());
        assert!(scheduler.timeline(recyclable).unwrap().is_playing());
        assert!(scheduler.timeline(setup).unwrap().is_setup());

        scheduler.tick(1.0);
        assert!(finished
            .iter()
            .all(|&id| scheduler.timeline(id).unwrap().is_completed_by_rewind()));
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn test_set_recyclable_all_false_keeps_finished_timelines() {
        let mut scheduler = Scheduler::new();
        let running = scheduler.create(true);
        scheduler.timeline_mut(running).unwrap().append_interval(1.0).unwrap();
        scheduler.play(running).unwrap();
        let idle = scheduler.create(true);
        assert_eq!(scheduler.unrecycled_count(), 0);

        assert_eq!(scheduler.set_recyclable_all(false), 0);
        assert_eq!(scheduler.unrecycled_count(), 2);
        assert!(!scheduler.timeline(idle).unwrap().is_recyclable());

        scheduler.tick(1.0);
        assert!(scheduler.contains(running));
        assert!(scheduler.timeline(running).unwrap().is_completed_by_play());

        scheduler.rewind(running).unwrap();
        assert!(scheduler.timeline(running).unwrap().is_rewinding());
    }

    #[test]
    fn test_parallel_batch_writes_every_target() {
        let mut scheduler = Scheduler::with_config(SchedulerConfig {
            parallel_threshold: 8,
            max_workers: 4,
            ..Default::default()
        })
        .unwrap();

        let values: Vec<Arc<Mutex<f32>>> = (0..32).map(|_| Arc::new(Mutex::new(0.0))).collect();
        for value in &values {
            let id = scheduler.create(true);
            scheduler
                .timeline_mut(id)
                .unwrap()
                .append(linear_float(value, 4.0, 4.0))
                .unwrap();
            scheduler.play(id).unwrap();
        }

        scheduler.tick(1.0);
        assert!(values.iter().all(|v| *v.lock().unwrap() == 1.0));
    }
}
