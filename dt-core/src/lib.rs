pub mod answer;
pub mod key;
pub mod phase;
pub mod stimulus;
pub mod summary;

pub use answer::{
    AnswerRecord, Classification, RecordId, SessionId, TestVariant, UserId, REPEATED_PROMPT,
};
pub use key::Key;
pub use phase::{SessionOutcome, SessionPhase};
pub use stimulus::{
    CircleColor, Pitch, SequenceError, Side, Stimulus, StimulusKind, StimulusSequence,
    StimulusSpec,
};
pub use summary::SessionSummary;
