//! Headless scenario runner
//!
//! Builds the scenario's timelines on a [`Scheduler`], applies its steps at
//! their frames and ticks with a fixed delta, sampling every channel after
//! each tick.

use crate::scenario::{ActionSpec, Op, Placement, Scenario, Step, TimelineSpec};
use anyhow::{anyhow, Context, Result};
use reel_tween::{Scheduler, SchedulerConfig, TimelineId, TweenAction};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Channel = Arc<Mutex<Vec<f32>>>;

fn lock(channel: &Channel) -> MutexGuard<'_, Vec<f32>> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Channel values after one tick
#[derive(Debug, Serialize)]
pub struct Sample {
    pub frame: u32,
    pub time: f32,
    pub channels: BTreeMap<String, Vec<f32>>,
}

/// How samples are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

pub struct Runner {
    scheduler: Scheduler,
    channels: BTreeMap<String, Channel>,
    timelines: HashMap<String, TimelineId>,
    steps: Vec<Step>,
}

impl Runner {
    pub fn new(config: SchedulerConfig, scenario: Scenario) -> Result<Self> {
        let scheduler = Scheduler::with_config(config).context("Invalid scheduler config")?;

        let channels = scenario
            .channels
            .into_iter()
            .map(|(name, values)| (name, Arc::new(Mutex::new(values))))
            .collect();

        let mut runner = Self {
            scheduler,
            channels,
            timelines: HashMap::new(),
            steps: scenario.steps,
        };

        for spec in &scenario.timelines {
            let id = runner
                .build_timeline(spec)
                .with_context(|| format!("Failed to build timeline '{}'", spec.name))?;
            runner.timelines.insert(spec.name.clone(), id);
        }

        // stable: steps on the same frame keep file order
        runner.steps.sort_by_key(|step| step.frame);

        Ok(runner)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current components of `name`
    pub fn channel(&self, name: &str) -> Option<Vec<f32>> {
        self.channels.get(name).map(|channel| lock(channel).clone())
    }

    fn build_timeline(&mut self, spec: &TimelineSpec) -> Result<TimelineId> {
        let actions = spec
            .actions
            .iter()
            .map(|action| self.build_action(action))
            .collect::<Result<Vec<_>>>()?;

        let id = self.scheduler.create(spec.recyclable);
        let timeline = self.scheduler.timeline_mut(id)?;

        if let Some(ease) = spec.ease {
            timeline.set_ease(ease)?;
        }
        if spec.relative {
            timeline.set_relative(true)?;
        }

        for (action, action_spec) in actions.into_iter().zip(&spec.actions) {
            let delay = action_spec.delay;
            match action_spec.place {
                Placement::Append => {
                    if delay > 0.0 {
                        timeline.append_interval(delay)?;
                    }
                    timeline.append(action)?;
                }
                Placement::Add => {
                    timeline.add_delay(delay, action)?;
                }
                Placement::AddAfterAppend => {
                    timeline.add_delay_after_append(delay, action)?;
                }
                Placement::AddAfterAdd => {
                    timeline.add_delay_after_add(delay, action)?;
                }
            }
        }

        let name = spec.name.clone();
        timeline.on_complete(move |timeline| {
            tracing::info!(
                "Timeline '{}' completed at {:.3}s ({:?})",
                name,
                timeline.cur_time(),
                timeline.state()
            );
        });

        let name = spec.name.clone();
        timeline.on_stop(move |timeline| {
            tracing::info!("Timeline '{}' stopped at {:.3}s", name, timeline.cur_time());
        });

        tracing::debug!(
            "Timeline '{}' built: {} actions, {:.3}s",
            spec.name,
            timeline.action_count(),
            timeline.duration()
        );

        Ok(id)
    }

    fn build_action(&mut self, spec: &ActionSpec) -> Result<TweenAction> {
        let mut action = match &spec.channel {
            None => self.scheduler.actions().interval(spec.duration),
            Some(name) => {
                let channel = self
                    .channels
                    .get(name)
                    .map(Arc::clone)
                    .ok_or_else(|| anyhow!("unknown channel '{}'", name))?;
                self.bind(&channel, &spec.to, spec.duration)?
            }
        };

        if let Some(ease) = spec.ease {
            action = action.set_ease(ease);
        }
        if spec.relative {
            action = action.set_relative(true);
        }
        if !spec.params.is_empty() {
            action = action.set_extra_params(&spec.params);
        }

        if let Some(label) = &spec.label {
            let (started, completed) = (label.clone(), label.clone());
            action = action
                .on_start(move || tracing::info!("Action '{}' started", started))
                .on_complete(move || tracing::info!("Action '{}' completed", completed));
        }

        Ok(action)
    }

    fn bind(&mut self, channel: &Channel, to: &[f32], duration: f32) -> Result<TweenAction> {
        let actions = self.scheduler.actions();
        let (get, set) = (Arc::clone(channel), Arc::clone(channel));

        let action = match to.len() {
            1 => actions.float(
                move || lock(&get).first().copied().unwrap_or_default(),
                move |value| {
                    if let Some(slot) = lock(&set).first_mut() {
                        *slot = value;
                    }
                },
                to[0],
                duration,
            ),
            2 => actions.vec2(read_channel(get), write_channel(set), finals(to)?, duration),
            3 => actions.vec3(read_channel(get), write_channel(set), finals(to)?, duration),
            4 => actions.vec4(read_channel(get), write_channel(set), finals(to)?, duration),
            n => return Err(anyhow!("{} components, expected 1 to 4", n)),
        };

        Ok(action)
    }

    /// Apply every step scheduled for `frame`
    fn apply_steps(&mut self, frame: u32) -> Result<()> {
        let due: Vec<usize> = (0..self.steps.len())
            .filter(|&i| self.steps[i].frame == frame)
            .collect();

        for i in due {
            let (op, timeline, value) = {
                let step = &self.steps[i];
                (step.op, step.timeline.clone(), step.value)
            };

            self.apply(op, timeline.as_deref(), value)
                .with_context(|| format!("frame {}: {:?} failed", frame, op))?;
        }

        Ok(())
    }

    fn apply(&mut self, op: Op, timeline: Option<&str>, value: Option<f32>) -> Result<()> {
        let id = match timeline {
            Some(name) => Some(
                *self
                    .timelines
                    .get(name)
                    .ok_or_else(|| anyhow!("unknown timeline '{}'", name))?,
            ),
            None => None,
        };
        let target = || id.ok_or_else(|| anyhow!("{:?} needs a timeline", op));

        tracing::debug!("Applying {:?} to {:?}", op, timeline);

        match op {
            Op::Play => self.scheduler.play(target()?)?,
            Op::Rewind => self.scheduler.rewind(target()?)?,
            Op::Restart => self.scheduler.restart(target()?)?,
            Op::Reverse => self.scheduler.reverse(target()?)?,
            Op::Stop => self.scheduler.stop(target()?)?,
            Op::GotoStart => self.scheduler.goto_start(target()?)?,
            Op::GotoEnd => self.scheduler.goto_end(target()?)?,
            Op::Pause => self.scheduler.pause(target()?, true)?,
            Op::Resume => self.scheduler.pause(target()?, false)?,
            Op::StopAll => log_bulk(op, self.scheduler.stop_all()),
            Op::PauseAll => log_bulk(op, self.scheduler.pause_all(true)),
            Op::ResumeAll => log_bulk(op, self.scheduler.pause_all(false)),
            Op::ReverseAll => log_bulk(op, self.scheduler.reverse_all()),
            Op::RestartAll => log_bulk(op, self.scheduler.restart_all()),
            Op::RewindAll => log_bulk(op, self.scheduler.rewind_all()),
            Op::RecycleAll => log_bulk(op, self.scheduler.recycle_all()),
            Op::TimeScale => {
                let scale = value.ok_or_else(|| anyhow!("time_scale needs a value"))?;
                self.scheduler.set_time_scale(scale)?;
            }
        }

        Ok(())
    }

    fn sample(&self, frame: u32, time: f32) -> Sample {
        Sample {
            frame,
            time,
            channels: self
                .channels
                .iter()
                .map(|(name, channel)| (name.clone(), lock(channel).clone()))
                .collect(),
        }
    }

    /// Run `frames` ticks of `dt` seconds, writing every `every`th sample to `out`
    pub fn run<W: Write>(
        &mut self,
        frames: u32,
        dt: f32,
        every: u32,
        output: Output,
        out: &mut W,
    ) -> Result<()> {
        let every = every.max(1);
        let mut time = 0.0;

        for frame in 0..frames {
            self.apply_steps(frame)?;
            self.scheduler.tick(dt);
            time += dt;

            if frame % every != 0 && frame + 1 != frames {
                continue;
            }

            let sample = self.sample(frame, time);
            match output {
                Output::Json => {
                    serde_json::to_writer(&mut *out, &sample)?;
                    writeln!(out)?;
                }
                Output::Text => {
                    write!(out, "{:>5} {:>8.3}", sample.frame, sample.time)?;
                    for (name, values) in &sample.channels {
                        write!(out, "  {}={:?}", name, values)?;
                    }
                    writeln!(out)?;
                }
            }
        }

        tracing::info!(
            "Ran {} frames: {} live timelines, {} active, {} cached",
            frames,
            self.scheduler.live_count(),
            self.scheduler.active_count(),
            self.scheduler.cached_count()
        );

        Ok(())
    }

    /// Tear the scheduler down
    pub fn finish(mut self) -> Result<()> {
        self.scheduler
            .dispose_all_native_data()
            .context("Failed to dispose scheduler")
    }
}

fn log_bulk(op: Op, count: usize) {
    tracing::debug!("{:?} applied to {} timelines", op, count);
}

fn finals<const N: usize>(to: &[f32]) -> Result<[f32; N]> {
    to.try_into()
        .map_err(|_| anyhow!("expected {} components, got {}", N, to.len()))
}

fn read_channel<const N: usize>(channel: Channel) -> impl FnMut() -> [f32; N] + Send + 'static {
    move || {
        let values = lock(&channel);
        std::array::from_fn(|i| values.get(i).copied().unwrap_or_default())
    }
}

fn write_channel<const N: usize>(channel: Channel) -> impl FnMut([f32; N]) + Send + 'static {
    move |values| {
        for (slot, value) in lock(&channel).iter_mut().zip(values) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(source: &str) -> Runner {
        let scenario = Scenario::from_toml(source).unwrap();
        scenario.validate().unwrap();
        Runner::new(SchedulerConfig::default(), scenario).unwrap()
    }

    #[test]
    fn test_linear_channel_reaches_target() {
        let mut runner = runner(
            r#"
[channels]
x = [0.0]

[[timelines]]
name = "t"
ease = "Linear"

[[timelines.actions]]
channel = "x"
to = [4.0]
duration = 1.0

[[steps]]
frame = 0
timeline = "t"
op = "play"
"#,
        );

        let mut out = Vec::new();
        runner.run(2, 0.25, 1, Output::Text, &mut out).unwrap();
        assert_eq!(runner.channel("x"), Some(vec![2.0]));

        runner.run(2, 0.25, 1, Output::Text, &mut out).unwrap();
        assert_eq!(runner.channel("x"), Some(vec![4.0]));

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("x=[1.0]"));
    }

    #[test]
    fn test_goto_end_step_snaps_vector_channel() {
        let mut runner = runner(
            r#"
[channels]
pos = [0.0, 0.0, 0.0]

[[timelines]]
name = "t"

[[timelines.actions]]
channel = "pos"
to = [1.0, 2.0, 3.0]
duration = 10.0

[[steps]]
frame = 0
timeline = "t"
op = "play"

[[steps]]
frame = 1
timeline = "t"
op = "goto_end"
"#,
        );

        let mut out = Vec::new();
        runner.run(3, 0.1, 1, Output::Json, &mut out).unwrap();
        assert_eq!(runner.channel("pos"), Some(vec![1.0, 2.0, 3.0]));

        let last = String::from_utf8(out).unwrap();
        let sample: serde_json::Value =
            serde_json::from_str(last.lines().last().unwrap()).unwrap();
        assert_eq!(sample["frame"], 2);
        assert_eq!(sample["channels"]["pos"][2], 3.0);
    }

    #[test]
    fn test_delayed_append_inserts_interval() {
        let runner = runner(
            r#"
[channels]
x = [0.0]

[[timelines]]
name = "t"

[[timelines.actions]]
delay = 0.5
channel = "x"
to = [1.0]
duration = 1.0
"#,
        );

        let id = runner.timelines["t"];
        let timeline = runner.scheduler().timeline(id).unwrap();
        assert_eq!(timeline.action_count(), 2);
        assert_eq!(timeline.duration(), 1.5);
    }

    #[test]
    fn test_failed_step_reports_frame() {
        let mut runner = runner(
            r#"
[[timelines]]
name = "t"

[[steps]]
frame = 0
timeline = "t"
op = "play"
"#,
        );

        let err = runner
            .run(1, 0.1, 1, Output::Text, &mut Vec::new())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("frame 0"));
    }
}
