use dt_core::{TestVariant, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Baseline latency every adaptive window is seeded with.
pub const ADAPTIVE_BASELINE_MS: u64 = 1078;
pub const ADAPTIVE_WINDOW: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stimulus count limit must be at least 1")]
    ZeroStimulusCount,
    #[error("session duration must be positive")]
    ZeroDuration,
    #[error("stimulus interval must be positive")]
    ZeroInterval,
    #[error("adaptive window needs at least one sample")]
    EmptyWindow,
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Sequence(#[from] dt_core::SequenceError),
}

/// How long a stimulus stays live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DelaySpec {
    Fixed { interval_ms: u64 },
    Adaptive { baseline_ms: u64, window: usize },
    SelfPaced,
}

/// When a running session stops presenting stimuli.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Termination {
    /// Ends on the first stimulus boundary after `duration_ms` of session time.
    TimeBoxed { duration_ms: u64 },
    /// Ends after `stimuli` occurrences; the sequence wraps if it is shorter.
    CountBoxed { stimuli: usize },
    /// Count-boxed, then judged against failure thresholds.
    PassFail {
        stimuli: usize,
        max_incorrect: usize,
        max_missed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub variant: TestVariant,
    pub delay: DelaySpec,
    pub termination: Termination,
    pub start_pause_ms: u64,
    pub debounce_ms: u64,
    pub loading_pause_ms: u64,
    pub max_tick_hz: u32,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub panel: Option<String>,
    #[serde(default)]
    pub training_mode: bool,
}

impl SessionConfig {
    /// Defaults for a test form. `training_mode` shortens the run for
    /// demonstrations; it does not change the pace.
    pub fn for_variant(variant: TestVariant, sequence_len: usize, training_mode: bool) -> Self {
        let short = |n: usize| if training_mode { n.min(20) } else { n };
        let (delay, termination, start_pause_ms) = match variant {
            TestVariant::FormA => (
                DelaySpec::Adaptive {
                    baseline_ms: ADAPTIVE_BASELINE_MS,
                    window: ADAPTIVE_WINDOW,
                },
                Termination::TimeBoxed {
                    duration_ms: if training_mode { 12_000 } else { 240_000 },
                },
                ADAPTIVE_BASELINE_MS,
            ),
            TestVariant::FormB => (
                DelaySpec::Fixed { interval_ms: 1500 },
                Termination::CountBoxed {
                    stimuli: short(sequence_len),
                },
                1500,
            ),
            TestVariant::FormC => (
                DelaySpec::SelfPaced,
                Termination::CountBoxed {
                    stimuli: short(sequence_len),
                },
                2000,
            ),
            TestVariant::Training => (
                DelaySpec::Fixed { interval_ms: 2080 },
                Termination::PassFail {
                    stimuli: sequence_len,
                    max_incorrect: 4,
                    max_missed: 4,
                },
                2080,
            ),
        };

        Self {
            variant,
            delay,
            termination,
            start_pause_ms,
            debounce_ms: 200,
            loading_pause_ms: 2000,
            max_tick_hz: 2000,
            user: None,
            panel: None,
            training_mode,
        }
    }

    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub fn with_panel(mut self, panel: Option<String>) -> Self {
        self.panel = panel;
        self
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.delay {
            DelaySpec::Fixed { interval_ms: 0 } => return Err(ConfigError::ZeroInterval),
            DelaySpec::Adaptive { baseline_ms: 0, .. } => return Err(ConfigError::ZeroInterval),
            DelaySpec::Adaptive { window: 0, .. } => return Err(ConfigError::EmptyWindow),
            _ => {}
        }
        match self.termination {
            Termination::TimeBoxed { duration_ms: 0 } => Err(ConfigError::ZeroDuration),
            Termination::CountBoxed { stimuli: 0 } | Termination::PassFail { stimuli: 0, .. } => {
                Err(ConfigError::ZeroStimulusCount)
            }
            _ => Ok(()),
        }
    }

    /// Answers are persisted only for a known user outside training.
    pub fn records_answers(&self) -> bool {
        self.user.is_some() && self.variant != TestVariant::Training
    }

    pub fn start_pause(&self) -> Duration {
        Duration::from_millis(self.start_pause_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn loading_pause(&self) -> Duration {
        Duration::from_millis(self.loading_pause_ms)
    }

    /// Text lines for the instructions screen.
    pub fn instruction_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.variant != TestVariant::Training {
            let who = self
                .user
                .map(|u| format!("User #{u}"))
                .unwrap_or_else(|| "Guest".into());
            lines.push(format!("User:       {who}"));
            lines.push("Following test is being measured.".into());
        } else {
            lines.push("Following exercise is not being measured.".into());
        }
        lines.push("Only one stimulus is being presented at a time.".into());
        match self.delay {
            DelaySpec::Adaptive { .. } => {
                lines.push("React as fast as possible.".into());
                lines.push("Tempo of the task assignment is changing during the test.".into());
            }
            DelaySpec::Fixed { .. } => {
                lines.push("Try answering correctly.".into());
                lines.push("Tempo of the task assignment is fixed.".into());
            }
            DelaySpec::SelfPaced => {
                lines.push("Try answering correctly.".into());
                lines.push("Next stimulus appears after every answer.".into());
            }
        }
        lines.push(self.duration_line());
        lines
    }

    fn duration_line(&self) -> String {
        let count = match self.termination {
            Termination::TimeBoxed { duration_ms } => {
                return format!("Test duration:      {:.1} min", duration_ms as f64 / 60_000.0);
            }
            Termination::CountBoxed { stimuli } | Termination::PassFail { stimuli, .. } => stimuli,
        };
        match self.delay {
            DelaySpec::Fixed { interval_ms } => format!(
                "Test duration:      {:.1} min",
                (count as u64 * interval_ms) as f64 / 60_000.0
            ),
            _ => format!("Stimuli:      {count}"),
        }
    }
}
