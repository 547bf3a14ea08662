//! Batch evaluation of eased channel values
//!
//! Every running action contributes one lane per scalar channel. Lanes are
//! gathered during the tick, evaluated in one pass (split across worker
//! threads when the batch is large), and scattered back to their actions
//! after the join. The evaluation step only reads lanes and writes outputs,
//! so the workers share nothing mutable.

use crate::easing::{self, Ease, ShakeAxis};
use crate::scheduler::TimelineId;
use std::ops::Range;

/// An ease kind with its extra parameters resolved for one channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EaseCurve {
    /// Closed-form curve over normalised time
    Simple(Ease),
    /// Noise shake, shared by every channel of the action
    Shake {
        axis: ShakeAxis,
        amplitude: f32,
        speed: f32,
    },
    /// Quadratic bezier path with this channel's control point
    BezierQuadratic { pos: f32 },
    /// Cubic bezier path with this channel's two control points
    BezierCubic { pos1: f32, pos2: f32 },
}

impl EaseCurve {
    /// Resolve the curve for `channel` from an action's flat extra-parameter list
    ///
    /// Layout of `extra`:
    /// - shake: `[amplitude, speed]`, identical for every channel
    /// - quadratic bezier: `[pos_0, pos_1, pos_2]`, channel `i` reads `extra[i]`
    /// - cubic bezier: `[pos1_0, pos2_0, pos1_1, pos2_1, ...]`, channel `i` reads
    ///   `extra[2i]` and `extra[2i + 1]`
    pub fn resolve(ease: Ease, extra: &[f32], channel: usize) -> Self {
        if ease.is_shake() {
            let axis = match ease {
                Ease::ShakeX => ShakeAxis::X,
                Ease::ShakeY => ShakeAxis::Y,
                _ => ShakeAxis::Both,
            };
            EaseCurve::Shake {
                axis,
                amplitude: extra_param(ease, extra, 0),
                speed: extra_param(ease, extra, 1),
            }
        } else if ease.is_bezier_quadratic() {
            EaseCurve::BezierQuadratic {
                pos: extra_param(ease, extra, channel),
            }
        } else if ease.is_bezier_cubic() {
            EaseCurve::BezierCubic {
                pos1: extra_param(ease, extra, channel * 2),
                pos2: extra_param(ease, extra, channel * 2 + 1),
            }
        } else {
            EaseCurve::Simple(ease)
        }
    }

    /// Eased value between `from` and `to` at normalised time `t`
    #[inline]
    pub fn step(&self, from: f32, to: f32, t: f32) -> f32 {
        match *self {
            EaseCurve::Simple(ease) => from + (to - from) * ease.apply(t),
            EaseCurve::Shake {
                axis,
                amplitude,
                speed,
            } => easing::shake(from, to, t, amplitude, speed, axis),
            EaseCurve::BezierQuadratic { pos } => easing::bezier_quadratic(from, to, t, pos),
            EaseCurve::BezierCubic { pos1, pos2 } => {
                easing::bezier_cubic(from, to, t, pos1, pos2)
            }
        }
    }
}

fn extra_param(ease: Ease, extra: &[f32], index: usize) -> f32 {
    match extra.get(index) {
        Some(value) => *value,
        None => {
            tracing::warn!(
                "Ease {:?} expects extra param #{} but only {} were set, using 0.0",
                ease,
                index,
                extra.len()
            );
            0.0
        }
    }
}

/// Playhead position of one action, shared by all of its lanes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneTimes {
    /// Time since the action's start
    pub current: f32,
    /// The action's duration
    pub duration: f32,
}

/// One scalar channel to evaluate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lane {
    pub from: f32,
    pub to: f32,
    pub curve: EaseCurve,
    /// Index into the batch's times
    pub slot: u32,
}

/// Evaluate `lanes` into `out`. Pure: no lane reads another lane's output.
pub fn evaluate(lanes: &[Lane], times: &[LaneTimes], out: &mut [f32]) {
    for (lane, out) in lanes.iter().zip(out.iter_mut()) {
        let times = times[lane.slot as usize];
        let t = times.current / times.duration;
        *out = lane.curve.step(lane.from, lane.to, t);
    }
}

/// Where a group of lanes goes back to after the join
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BatchEntry {
    pub timeline: TimelineId,
    pub action: usize,
    pub lanes: Range<usize>,
}

/// Gathers lanes across all running timelines and evaluates them in one pass
pub(crate) struct BatchEvaluator {
    lanes: Vec<Lane>,
    times: Vec<LaneTimes>,
    outputs: Vec<f32>,
    entries: Vec<BatchEntry>,
    parallel_threshold: usize,
    workers: usize,
}

impl BatchEvaluator {
    pub fn new(parallel_threshold: usize, workers: usize) -> Self {
        Self {
            lanes: Vec::new(),
            times: Vec::new(),
            outputs: Vec::new(),
            entries: Vec::new(),
            parallel_threshold: parallel_threshold.max(1),
            workers: workers.max(1),
        }
    }

    /// Clear the previous tick's batch, keeping buffer capacity
    pub(crate) fn begin(&mut self) {
        self.lanes.clear();
        self.times.clear();
        self.outputs.clear();
        self.entries.clear();
    }

    /// Queue one action's channels at the given local time
    pub(crate) fn push_action<I>(
        &mut self,
        timeline: TimelineId,
        action: usize,
        times: LaneTimes,
        channels: I,
    ) where
        I: IntoIterator<Item = (f32, f32, EaseCurve)>,
    {
        let slot = self.times.len() as u32;
        self.times.push(times);

        let start = self.lanes.len();
        self.lanes
            .extend(channels.into_iter().map(|(from, to, curve)| Lane {
                from,
                to,
                curve,
                slot,
            }));

        self.entries.push(BatchEntry {
            timeline,
            action,
            lanes: start..self.lanes.len(),
        });
    }

    /// Evaluate every queued lane and wait for all workers to finish
    pub fn dispatch(&mut self) {
        let count = self.lanes.len();
        self.outputs.clear();
        self.outputs.resize(count, 0.0);

        if count == 0 {
            return;
        }

        if self.workers > 1 && count >= self.parallel_threshold {
            tracing::trace!("Batch dispatch: {} lanes on {} workers", count, self.workers);
            evaluate_parallel(&self.lanes, &self.times, &mut self.outputs, self.workers);
        } else {
            tracing::trace!("Batch dispatch: {} lanes inline", count);
            evaluate(&self.lanes, &self.times, &mut self.outputs);
        }
    }

    pub(crate) fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub(crate) fn outputs(&self, lanes: Range<usize>) -> &[f32] {
        &self.outputs[lanes]
    }

    /// Number of lanes queued this tick
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Drop the evaluation buffers entirely
    pub(crate) fn release_buffers(&mut self) {
        self.begin();
        self.lanes.shrink_to_fit();
        self.times.shrink_to_fit();
        self.outputs.shrink_to_fit();
        self.entries.shrink_to_fit();
    }
}

/// Split the lanes into one contiguous chunk per worker and join them all.
fn evaluate_parallel(lanes: &[Lane], times: &[LaneTimes], out: &mut [f32], workers: usize) {
    let chunk = lanes.len().div_ceil(workers);

    let joined = crossbeam::thread::scope(|scope| {
        for (lane_chunk, out_chunk) in lanes.chunks(chunk).zip(out.chunks_mut(chunk)) {
            scope.spawn(move |_| evaluate(lane_chunk, times, out_chunk));
        }
    });

    if let Err(panic) = joined {
        std::panic::resume_unwind(panic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn timeline_key() -> TimelineId {
        TimelineId::from(KeyData::from_ffi(1))
    }

    fn linear(from: f32, to: f32) -> (f32, f32, EaseCurve) {
        (from, to, EaseCurve::Simple(Ease::Linear))
    }

    #[test]
    fn test_resolve_shake_shares_params() {
        let extra = [2.5, 9.0];
        for channel in 0..3 {
            assert_eq!(
                EaseCurve::resolve(Ease::ShakeY, &extra, channel),
                EaseCurve::Shake {
                    axis: ShakeAxis::Y,
                    amplitude: 2.5,
                    speed: 9.0
                }
            );
        }
    }

    #[test]
    fn test_resolve_quadratic_picks_channel_slot() {
        let extra = [10.0, 20.0, 30.0];
        assert_eq!(
            EaseCurve::resolve(Ease::BezierQuadraticX, &extra, 0),
            EaseCurve::BezierQuadratic { pos: 10.0 }
        );
        assert_eq!(
            EaseCurve::resolve(Ease::BezierQuadraticY, &extra, 1),
            EaseCurve::BezierQuadratic { pos: 20.0 }
        );
        assert_eq!(
            EaseCurve::resolve(Ease::BezierQuadraticZ, &extra, 2),
            EaseCurve::BezierQuadratic { pos: 30.0 }
        );
    }

    #[test]
    fn test_resolve_cubic_picks_channel_pair() {
        let extra = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(
            EaseCurve::resolve(Ease::BezierCubicX, &extra, 0),
            EaseCurve::BezierCubic {
                pos1: 1.0,
                pos2: 2.0
            }
        );
        assert_eq!(
            EaseCurve::resolve(Ease::BezierCubicY, &extra, 1),
            EaseCurve::BezierCubic {
                pos1: 3.0,
                pos2: 4.0
            }
        );
        assert_eq!(
            EaseCurve::resolve(Ease::BezierCubicZ, &extra, 2),
            EaseCurve::BezierCubic {
                pos1: 5.0,
                pos2: 6.0
            }
        );
    }

    #[test]
    fn test_resolve_missing_params_default_to_zero() {
        assert_eq!(
            EaseCurve::resolve(Ease::BezierCubicY, &[1.0], 1),
            EaseCurve::BezierCubic {
                pos1: 0.0,
                pos2: 0.0
            }
        );
        assert_eq!(
            EaseCurve::resolve(Ease::OutQuad, &[], 4),
            EaseCurve::Simple(Ease::OutQuad)
        );
    }

    #[test]
    fn test_lanes_use_their_own_action_times() {
        let mut batch = BatchEvaluator::new(1024, 1);
        batch.begin();
        let key = timeline_key();
        batch.push_action(
            key,
            0,
            LaneTimes {
                current: 1.0,
                duration: 4.0,
            },
            [linear(0.0, 100.0), linear(10.0, 20.0)],
        );
        batch.push_action(
            key,
            1,
            LaneTimes {
                current: 3.0,
                duration: 4.0,
            },
            [linear(0.0, 100.0)],
        );
        batch.dispatch();

        let entries = batch.entries().to_vec();
        assert_eq!(entries.len(), 2);
        assert_eq!(batch.outputs(entries[0].lanes.clone()), &[25.0, 12.5]);
        assert_eq!(batch.outputs(entries[1].lanes.clone()), &[75.0]);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let key = timeline_key();
        let fill = |batch: &mut BatchEvaluator| {
            batch.begin();
            for i in 0..300 {
                let ease = if i % 2 == 0 { Ease::OutBounce } else { Ease::InOutSine };
                batch.push_action(
                    key,
                    i,
                    LaneTimes {
                        current: (i % 17) as f32 * 0.1,
                        duration: 2.0,
                    },
                    (0..3).map(|c| (c as f32, 10.0 + i as f32, EaseCurve::Simple(ease))),
                );
            }
            batch.dispatch();
        };

        let mut serial = BatchEvaluator::new(usize::MAX, 1);
        let mut parallel = BatchEvaluator::new(16, 4);
        fill(&mut serial);
        fill(&mut parallel);

        assert_eq!(serial.lane_count(), 900);
        assert_eq!(serial.outputs(0..900), parallel.outputs(0..900));
    }

    #[test]
    fn test_begin_clears_previous_tick() {
        let mut batch = BatchEvaluator::new(1024, 1);
        batch.begin();
        batch.push_action(
            timeline_key(),
            0,
            LaneTimes {
                current: 0.0,
                duration: 1.0,
            },
            [linear(0.0, 1.0)],
        );
        batch.dispatch();
        assert_eq!(batch.lane_count(), 1);

        batch.begin();
        batch.dispatch();
        assert_eq!(batch.lane_count(), 0);
        assert!(batch.entries().is_empty());
    }
}
