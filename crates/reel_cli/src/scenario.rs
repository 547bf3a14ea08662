//! Scenario file handling
//!
//! A scenario declares named scalar channels, timelines built from actions
//! that tween those channels, and control steps applied at given frames.
//! Files ending in `.json` are read as JSON, everything else as TOML.

use anyhow::{bail, Context, Result};
use reel_tween::Ease;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Top-level scenario
#[derive(Debug, Deserialize, Serialize)]
pub struct Scenario {
    /// Frames to simulate
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Seconds per frame
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Channel name to initial components (1 to 4)
    #[serde(default)]
    pub channels: BTreeMap<String, Vec<f32>>,
    #[serde(default)]
    pub timelines: Vec<TimelineSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_frames() -> u32 {
    60
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TimelineSpec {
    pub name: String,
    #[serde(default)]
    pub recyclable: bool,
    /// Default ease for actions left on `Smooth`
    #[serde(default)]
    pub ease: Option<Ease>,
    /// Make every channel relative
    #[serde(default)]
    pub relative: bool,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

/// Where an action lands on its timeline
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// After everything queued so far
    #[default]
    Append,
    /// At `delay` from the timeline start
    Add,
    /// `delay` after the queued actions end
    AddAfterAppend,
    /// `delay` after the last concurrent action ends
    AddAfterAdd,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActionSpec {
    #[serde(default)]
    pub place: Placement,
    #[serde(default)]
    pub delay: f32,
    /// Channel to tween; a pure interval when absent
    #[serde(default)]
    pub channel: Option<String>,
    /// Final components, one per channel component
    #[serde(default)]
    pub to: Vec<f32>,
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub ease: Option<Ease>,
    #[serde(default)]
    pub relative: bool,
    /// Shake and bezier parameters
    #[serde(default)]
    pub params: Vec<f32>,
    /// Logged when the action starts and completes
    #[serde(default)]
    pub label: Option<String>,
}

/// A control call applied before the given frame is ticked
#[derive(Debug, Deserialize, Serialize)]
pub struct Step {
    pub frame: u32,
    #[serde(default)]
    pub timeline: Option<String>,
    pub op: Op,
    /// Argument for `time_scale`
    #[serde(default)]
    pub value: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Play,
    Rewind,
    Restart,
    Reverse,
    Stop,
    GotoStart,
    GotoEnd,
    Pause,
    Resume,
    StopAll,
    PauseAll,
    ResumeAll,
    ReverseAll,
    RestartAll,
    RewindAll,
    RecycleAll,
    TimeScale,
}

impl Op {
    /// Whether the op addresses a single timeline
    pub fn needs_timeline(self) -> bool {
        matches!(
            self,
            Op::Play
                | Op::Rewind
                | Op::Restart
                | Op::Reverse
                | Op::Stop
                | Op::GotoStart
                | Op::GotoEnd
                | Op::Pause
                | Op::Resume
        )
    }
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let scenario = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .with_context(|| format!("Failed to parse {}", path.display()))?;

        scenario
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;

        Ok(scenario)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            bail!("dt must be a positive number of seconds, got {}", self.dt);
        }

        for (name, components) in &self.channels {
            if !(1..=4).contains(&components.len()) {
                bail!(
                    "channel '{}' has {} components, expected 1 to 4",
                    name,
                    components.len()
                );
            }
        }

        let mut names = HashSet::new();
        for timeline in &self.timelines {
            if !names.insert(timeline.name.as_str()) {
                bail!("timeline '{}' is declared twice", timeline.name);
            }

            for (i, action) in timeline.actions.iter().enumerate() {
                action
                    .validate(&self.channels)
                    .with_context(|| format!("timeline '{}' action {}", timeline.name, i))?;
            }
        }

        for step in &self.steps {
            match (&step.timeline, step.op.needs_timeline()) {
                (None, true) => bail!("frame {}: {:?} needs a timeline", step.frame, step.op),
                (Some(name), _) if !names.contains(name.as_str()) => {
                    bail!("frame {}: unknown timeline '{}'", step.frame, name)
                }
                _ => {}
            }

            if step.op == Op::TimeScale && step.value.is_none() {
                bail!("frame {}: time_scale needs a value", step.frame);
            }
        }

        Ok(())
    }
}

impl ActionSpec {
    fn validate(&self, channels: &BTreeMap<String, Vec<f32>>) -> Result<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            bail!("duration must be non-negative, got {}", self.duration);
        }

        if self.delay < 0.0 {
            bail!("delay must be non-negative, got {}", self.delay);
        }

        let Some(channel) = &self.channel else {
            if !self.to.is_empty() {
                bail!("`to` given without a channel");
            }
            return Ok(());
        };

        let Some(components) = channels.get(channel) else {
            bail!("unknown channel '{}'", channel);
        };

        if components.len() != self.to.len() {
            bail!(
                "channel '{}' has {} components but `to` has {}",
                channel,
                components.len(),
                self.to.len()
            );
        }

        Ok(())
    }
}
