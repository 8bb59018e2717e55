use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Defines stimuli and their render data
pub trait Stimulus: Clone + Send + Sync + std::fmt::Debug {
    fn cache_id(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircleColor {
    White,
    Yellow,
    Green,
    Blue,
    Red,
}

impl CircleColor {
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            CircleColor::White => [253, 253, 253, 255],
            CircleColor::Yellow => [255, 204, 0, 255],
            CircleColor::Green => [7, 169, 48, 255],
            CircleColor::Blue => [0, 0, 179, 255],
            CircleColor::Red => [159, 0, 27, 255],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pitch {
    High,
    Low,
}

/// A single cue: a colored circle, a pedal marker or a tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StimulusKind {
    Color(CircleColor),
    Pedal(Side),
    Tone(Pitch),
}

impl StimulusKind {
    /// The one response that answers this stimulus correctly.
    pub fn expected_key(&self) -> Key {
        match self {
            StimulusKind::Color(CircleColor::White) => Key::White,
            StimulusKind::Color(CircleColor::Yellow) => Key::Yellow,
            StimulusKind::Color(CircleColor::Green) => Key::Green,
            StimulusKind::Color(CircleColor::Blue) => Key::Blue,
            StimulusKind::Color(CircleColor::Red) => Key::Red,
            StimulusKind::Pedal(Side::Left) => Key::Left,
            StimulusKind::Pedal(Side::Right) => Key::Right,
            StimulusKind::Tone(Pitch::High) => Key::Up,
            StimulusKind::Tone(Pitch::Low) => Key::Down,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StimulusKind::Color(CircleColor::White) => "white",
            StimulusKind::Color(CircleColor::Yellow) => "yellow",
            StimulusKind::Color(CircleColor::Green) => "green",
            StimulusKind::Color(CircleColor::Blue) => "blue",
            StimulusKind::Color(CircleColor::Red) => "red",
            StimulusKind::Pedal(Side::Left) => "left_pedal",
            StimulusKind::Pedal(Side::Right) => "right_pedal",
            StimulusKind::Tone(Pitch::High) => "high_tone",
            StimulusKind::Tone(Pitch::Low) => "low_tone",
        }
    }
}

impl Stimulus for StimulusKind {
    fn cache_id(&self) -> usize {
        match self {
            StimulusKind::Color(CircleColor::White) => 0,
            StimulusKind::Color(CircleColor::Yellow) => 1,
            StimulusKind::Color(CircleColor::Green) => 2,
            StimulusKind::Color(CircleColor::Blue) => 3,
            StimulusKind::Color(CircleColor::Red) => 4,
            StimulusKind::Pedal(Side::Left) => 5,
            StimulusKind::Pedal(Side::Right) => 6,
            StimulusKind::Tone(Pitch::High) => 7,
            StimulusKind::Tone(Pitch::Low) => 8,
        }
    }
}

impl FromStr for StimulusKind {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "white" => StimulusKind::Color(CircleColor::White),
            "yellow" => StimulusKind::Color(CircleColor::Yellow),
            "green" => StimulusKind::Color(CircleColor::Green),
            "blue" => StimulusKind::Color(CircleColor::Blue),
            "red" => StimulusKind::Color(CircleColor::Red),
            "left_pedal" => StimulusKind::Pedal(Side::Left),
            "right_pedal" => StimulusKind::Pedal(Side::Right),
            "high_tone" => StimulusKind::Tone(Pitch::High),
            "low_tone" => StimulusKind::Tone(Pitch::Low),
            other => return Err(SequenceError::UnknownStimulus(other.to_string())),
        })
    }
}

impl TryFrom<String> for StimulusKind {
    type Error = SequenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StimulusKind> for String {
    fn from(kind: StimulusKind) -> Self {
        kind.label().to_string()
    }
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SequenceError {
    #[error("stimulus sequence is empty")]
    Empty,
    #[error("unknown stimulus label: {0}")]
    UnknownStimulus(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusSpec {
    pub index: usize,
    pub kind: StimulusKind,
    pub prompt: String,
    pub expected_response: Key,
}

/// Ordered, fixed catalogue of stimuli with its parallel answer key.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusSequence {
    specs: Vec<StimulusSpec>,
}

impl StimulusSequence {
    pub fn from_kinds<I>(kinds: I) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = StimulusKind>,
    {
        let specs: Vec<StimulusSpec> = kinds
            .into_iter()
            .enumerate()
            .map(|(index, kind)| StimulusSpec {
                index,
                kind,
                prompt: kind.label().to_string(),
                expected_response: kind.expected_key(),
            })
            .collect();
        if specs.is_empty() {
            return Err(SequenceError::Empty);
        }
        Ok(Self { specs })
    }

    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, SequenceError> {
        let kinds = labels
            .iter()
            .map(|l| l.as_ref().parse())
            .collect::<Result<Vec<StimulusKind>, _>>()?;
        Self::from_kinds(kinds)
    }

    /// Catalogue used by the measured test forms.
    pub fn determination() -> Self {
        Self::from_labels(&DETERMINATION_LABELS).expect("static catalogue is valid")
    }

    /// Shorter catalogue used by the training run.
    pub fn training() -> Self {
        Self::from_labels(&TRAINING_LABELS).expect("static catalogue is valid")
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, index: usize) -> &StimulusSpec {
        &self.specs[index % self.specs.len()]
    }

    pub fn expected(&self, index: usize) -> Key {
        self.get(index).expected_response
    }

    /// Index presented immediately before `index`; wraps at the start.
    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.specs.len() - 1) % self.specs.len()
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.specs.len()
    }

    pub fn answer_key(&self) -> Vec<Key> {
        self.specs.iter().map(|s| s.expected_response).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StimulusSpec> {
        self.specs.iter()
    }
}

const DETERMINATION_LABELS: [&str; 48] = [
    "red", "left_pedal", "green", "high_tone", "yellow", "right_pedal",
    "blue", "low_tone", "white", "red", "right_pedal", "high_tone",
    "green", "yellow", "left_pedal", "white", "low_tone", "blue",
    "red", "high_tone", "right_pedal", "green", "white", "low_tone",
    "left_pedal", "yellow", "blue", "red", "low_tone", "white",
    "right_pedal", "green", "high_tone", "yellow", "left_pedal", "blue",
    "white", "high_tone", "red", "right_pedal", "low_tone", "green",
    "yellow", "left_pedal", "blue", "high_tone", "white", "right_pedal",
];

const TRAINING_LABELS: [&str; 20] = [
    "green", "left_pedal", "red", "high_tone", "white", "right_pedal",
    "yellow", "low_tone", "blue", "left_pedal", "green", "high_tone",
    "red", "right_pedal", "white", "low_tone", "yellow", "left_pedal",
    "blue", "high_tone",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_is_rejected() {
        let err = StimulusSequence::from_kinds(Vec::new()).unwrap_err();
        assert_eq!(err, SequenceError::Empty);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = StimulusSequence::from_labels(&["red", "purple"]).unwrap_err();
        assert_eq!(err, SequenceError::UnknownStimulus("purple".into()));
    }

    #[test]
    fn previous_index_wraps_to_last() {
        let seq = StimulusSequence::from_labels(&["red", "green", "blue"]).unwrap();
        assert_eq!(seq.previous_index(0), 2);
        assert_eq!(seq.previous_index(2), 1);
        assert_eq!(seq.next_index(2), 0);
    }

    #[test]
    fn answer_key_parallels_catalogue() {
        let seq = StimulusSequence::from_labels(&["high_tone", "left_pedal", "yellow"]).unwrap();
        assert_eq!(seq.answer_key(), vec![Key::Up, Key::Left, Key::Yellow]);
        assert_eq!(seq.get(1).prompt, "left_pedal");
    }

    #[test]
    fn static_catalogues_load() {
        assert_eq!(StimulusSequence::determination().len(), 48);
        assert_eq!(StimulusSequence::training().len(), 20);
    }

    #[test]
    fn kinds_deserialize_from_labels() {
        let kinds: Vec<StimulusKind> =
            serde_json::from_str(r#"["red", "low_tone", "right_pedal"]"#).unwrap();
        assert_eq!(kinds[1], StimulusKind::Tone(Pitch::Low));
        assert_eq!(kinds[2], StimulusKind::Pedal(Side::Right));
        assert_eq!(kinds[2].cache_id(), 6);
    }
}
