use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Prompt stored for answers given after the stimulus was already answered.
pub const REPEATED_PROMPT: &str = "Repeated Input";

/// Outcome of one stimulus occurrence, or of an extra key press on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Correct,
    Incorrect,
    Late,
    Missed,
    Repeated,
}

impl Classification {
    /// Classification written to the sink. Repeated presses are scored as
    /// incorrect answers.
    pub fn stored(&self) -> Classification {
        match self {
            Classification::Repeated => Classification::Incorrect,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Correct => "Correct",
            Classification::Incorrect => "Incorrect",
            Classification::Late => "Late",
            Classification::Missed => "Missed",
            Classification::Repeated => "Repeated",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test forms the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestVariant {
    FormA,
    FormB,
    FormC,
    Training,
}

impl TestVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestVariant::FormA => "A",
            TestVariant::FormB => "B",
            TestVariant::FormC => "C",
            TestVariant::Training => "Training",
        }
    }

    pub fn title(&self) -> String {
        match self {
            TestVariant::FormA => "DETERMINATION TEST - FORM A - ADAPTIVE".into(),
            TestVariant::Training => "DETERMINATION TEST - TRAINING".into(),
            other => format!("DETERMINATION TEST - {} FORM", other.as_str()),
        }
    }
}

impl FromStr for TestVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "form-a" => Ok(TestVariant::FormA),
            "b" | "form-b" => Ok(TestVariant::FormB),
            "c" | "form-c" => Ok(TestVariant::FormC),
            "training" | "t" => Ok(TestVariant::Training),
            other => Err(format!("unknown test variant: {other}")),
        }
    }
}

impl fmt::Display for TestVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recorded answer, one per stimulus outcome plus one per repeated press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub stimulus_prompt: String,
    pub observed_response: Option<Key>,
    pub classification: Classification,
    /// Seconds since the session clock started.
    pub absolute_time_s: f64,
    /// Milliseconds between the latency anchor and the press.
    pub latency_ms: f64,
    pub session_id: SessionId,
}

impl AnswerRecord {
    pub fn new(
        stimulus_prompt: impl Into<String>,
        observed_response: Option<Key>,
        classification: Classification,
        absolute_time: Duration,
        latency: Duration,
        session_id: SessionId,
    ) -> Self {
        Self {
            stimulus_prompt: stimulus_prompt.into(),
            observed_response,
            classification,
            absolute_time_s: absolute_time.as_secs_f64(),
            latency_ms: latency.as_secs_f64() * 1e3,
            session_id,
        }
    }

    pub fn is_reaction(&self) -> bool {
        self.classification != Classification::Missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_is_stored_as_incorrect() {
        assert_eq!(Classification::Repeated.stored(), Classification::Incorrect);
        assert_eq!(Classification::Late.stored(), Classification::Late);
    }

    #[test]
    fn record_converts_units() {
        let r = AnswerRecord::new(
            "red",
            Some(Key::Red),
            Classification::Correct,
            Duration::from_millis(2500),
            Duration::from_micros(412_500),
            SessionId(3),
        );
        assert!((r.absolute_time_s - 2.5).abs() < 1e-9);
        assert!((r.latency_ms - 412.5).abs() < 1e-9);
        assert!(r.is_reaction());
    }

    #[test]
    fn variants_parse_from_cli_names() {
        assert_eq!("A".parse::<TestVariant>().unwrap(), TestVariant::FormA);
        assert_eq!("training".parse::<TestVariant>().unwrap(), TestVariant::Training);
        assert!("d".parse::<TestVariant>().is_err());
    }
}
