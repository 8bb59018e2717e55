use anyhow::{Context, Result, bail};
use clap::Parser;
use dt_core::{StimulusSequence, TestVariant, UserId};
use dt_session::SessionConfig;
use std::path::{Path, PathBuf};

/// Determination test runner
#[derive(Parser, Debug)]
#[command(name = "dt", version, about)]
pub struct Cli {
    /// Test form to run: a, b, c or training
    #[arg(long, default_value = "a", conflicts_with = "config")]
    pub variant: TestVariant,

    /// Id of the tested user; answers are only recorded when set
    #[arg(long)]
    pub user: Option<u64>,

    /// GPIO value-file tree of the response panel
    #[arg(long)]
    pub panel: Option<String>,

    /// Shorten durations and counts for a demonstration run
    #[arg(long, conflicts_with = "config")]
    pub training_mode: bool,

    /// Run the guided walkthrough and a training session before the test
    #[arg(long)]
    pub instructions: bool,

    /// JSON session configuration; carries its own variant and training mode
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON list of stimulus labels replacing the built-in sequence
    #[arg(long)]
    pub sequence: Option<PathBuf>,

    /// Directory for results files
    #[arg(long, default_value = "dt-results")]
    pub output: PathBuf,

    /// Open a window instead of going fullscreen
    #[arg(long)]
    pub windowed: bool,

    /// TrueType/OpenType font for text screens
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Seed for stimulus placement
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Everything the app needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Plan {
    pub test: SessionConfig,
    pub sequence: StimulusSequence,
    pub training: Option<(SessionConfig, StimulusSequence)>,
    pub output: PathBuf,
    pub windowed: bool,
    pub font: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Cli {
    pub fn plan(self) -> Result<Plan> {
        let sequence = match &self.sequence {
            Some(path) => load_sequence(path)?,
            None => StimulusSequence::determination(),
        };

        let mut test = match &self.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("loading session config {}", path.display()))?,
            None => SessionConfig::for_variant(self.variant, sequence.len(), self.training_mode),
        };
        if let Some(user) = self.user {
            test = test.with_user(Some(UserId(user)));
        }
        if self.panel.is_some() {
            test = test.with_panel(self.panel.clone());
        }
        test.validate().context("invalid session config")?;

        let training = if self.instructions {
            let sequence = StimulusSequence::training();
            let config = SessionConfig::for_variant(TestVariant::Training, sequence.len(), self.training_mode)
                .with_panel(test.panel.clone());
            config.validate().context("invalid training config")?;
            Some((config, sequence))
        } else {
            None
        };

        Ok(Plan {
            test,
            sequence,
            training,
            output: self.output,
            windowed: self.windowed,
            font: self.font,
            seed: self.seed,
        })
    }
}

fn load_sequence(path: &Path) -> Result<StimulusSequence> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading sequence {}", path.display()))?;
    let labels: Vec<String> = serde_json::from_str(&text)
        .with_context(|| format!("parsing sequence {}", path.display()))?;
    if labels.is_empty() {
        bail!("sequence {} is empty", path.display());
    }
    StimulusSequence::from_labels(&labels).with_context(|| format!("sequence {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_session::{DelaySpec, Termination};
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_form_a_without_recording() {
        let plan = parse(&[]).plan().unwrap();
        assert_eq!(plan.test.variant, TestVariant::FormA);
        assert!(plan.test.user.is_none());
        assert!(!plan.test.records_answers());
        assert!(plan.training.is_none());
        assert_eq!(plan.sequence.len(), StimulusSequence::determination().len());
    }

    #[test]
    fn user_and_panel_reach_the_config() {
        let plan = parse(&["--variant", "b", "--user", "7", "--panel", "/tmp/gpio", "--instructions"])
            .plan()
            .unwrap();
        assert_eq!(plan.test.variant, TestVariant::FormB);
        assert_eq!(plan.test.user, Some(UserId(7)));
        assert!(matches!(plan.test.delay, DelaySpec::Fixed { interval_ms: 1500 }));

        let (training, sequence) = plan.training.unwrap();
        assert_eq!(training.variant, TestVariant::Training);
        assert_eq!(training.panel.as_deref(), Some("/tmp/gpio"));
        assert_eq!(sequence.len(), StimulusSequence::training().len());
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(Cli::try_parse_from(["dt", "--variant", "z"]).is_err());
    }

    #[test]
    fn config_file_owns_variant_and_training_mode() {
        assert!(Cli::try_parse_from(["dt", "--config", "s.json", "--variant", "b"]).is_err());
        assert!(Cli::try_parse_from(["dt", "--config", "s.json", "--training-mode"]).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = SessionConfig::for_variant(TestVariant::FormC, 12, true);
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();
        let path = file.path().to_str().unwrap();

        let plan = parse(&["--config", path, "--user", "4"]).plan().unwrap();
        assert_eq!(plan.test.variant, TestVariant::FormC);
        assert!(plan.test.training_mode);
        assert_eq!(plan.test.user, Some(UserId(4)));
    }

    #[test]
    fn sequence_file_sets_the_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["white", "left_pedal", "high_tone"]"#).unwrap();
        let path = file.path().to_str().unwrap();

        let plan = parse(&["--variant", "c", "--sequence", path]).plan().unwrap();
        assert_eq!(plan.sequence.len(), 3);
        assert!(matches!(plan.test.termination, Termination::CountBoxed { stimuli: 3 }));
    }

    #[test]
    fn bad_sequence_labels_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["white", "purple"]"#).unwrap();
        let path = file.path().to_str().unwrap();
        assert!(parse(&["--sequence", path]).plan().is_err());

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, "[]").unwrap();
        let path = empty.path().to_str().unwrap();
        assert!(parse(&["--sequence", path]).plan().is_err());
    }
}
