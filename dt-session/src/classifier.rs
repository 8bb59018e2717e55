//! Pure response classification.
//!
//! The controller feeds every running-phase key press through [`classify`]
//! and then applies the [`RecordAction`] it implies.

use dt_core::{Classification, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseContext {
    pub expected_current: Key,
    pub expected_previous: Key,
    /// Whether the current stimulus already has its answer.
    pub answered: bool,
}

pub fn classify(key: Key, ctx: &ResponseContext) -> Classification {
    if ctx.answered {
        return Classification::Repeated;
    }
    if key == ctx.expected_current {
        Classification::Correct
    } else if key == ctx.expected_previous {
        Classification::Late
    } else {
        Classification::Incorrect
    }
}

/// Self-paced sessions have no deadline to miss, so a press matching the
/// previous stimulus is neither late nor wrong; it is dropped.
pub fn classify_self_paced(key: Key, ctx: &ResponseContext) -> Option<Classification> {
    match classify(key, ctx) {
        Classification::Late => None,
        other => Some(other),
    }
}

/// What a classification does to the answer store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// New record for the current stimulus.
    InsertCurrent,
    /// New record under the repeated-input prompt.
    InsertRepeated,
    /// Turn the previous stimulus' Missed record into Late.
    UpgradePrevious,
    Nothing,
}

/// `previous` is the final classification of the previous occurrence, if
/// there was one.
pub fn record_action(classification: Classification, previous: Option<Classification>) -> RecordAction {
    match classification {
        Classification::Correct | Classification::Incorrect | Classification::Missed => {
            RecordAction::InsertCurrent
        }
        Classification::Repeated => RecordAction::InsertRepeated,
        Classification::Late if previous == Some(Classification::Missed) => {
            RecordAction::UpgradePrevious
        }
        Classification::Late => RecordAction::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(answered: bool) -> ResponseContext {
        ResponseContext {
            expected_current: Key::Red,
            expected_previous: Key::Left,
            answered,
        }
    }

    #[test]
    fn matches_against_current_then_previous() {
        assert_eq!(classify(Key::Red, &ctx(false)), Classification::Correct);
        assert_eq!(classify(Key::Left, &ctx(false)), Classification::Late);
        assert_eq!(classify(Key::Blue, &ctx(false)), Classification::Incorrect);
        assert_eq!(classify(Key::Other('q'), &ctx(false)), Classification::Incorrect);
    }

    #[test]
    fn any_press_after_an_answer_is_repeated() {
        assert_eq!(classify(Key::Red, &ctx(true)), Classification::Repeated);
        assert_eq!(classify(Key::Unmapped, &ctx(true)), Classification::Repeated);
    }

    #[test]
    fn current_match_wins_when_stimuli_repeat() {
        let same = ResponseContext {
            expected_current: Key::Up,
            expected_previous: Key::Up,
            answered: false,
        };
        assert_eq!(classify(Key::Up, &same), Classification::Correct);
    }

    #[test]
    fn self_paced_drops_previous_matches() {
        assert_eq!(classify_self_paced(Key::Left, &ctx(false)), None);
        assert_eq!(
            classify_self_paced(Key::Red, &ctx(false)),
            Some(Classification::Correct)
        );
    }

    #[test]
    fn late_only_upgrades_a_missed_predecessor() {
        assert_eq!(
            record_action(Classification::Late, Some(Classification::Missed)),
            RecordAction::UpgradePrevious
        );
        assert_eq!(
            record_action(Classification::Late, Some(Classification::Incorrect)),
            RecordAction::Nothing
        );
        assert_eq!(record_action(Classification::Late, None), RecordAction::Nothing);
        assert_eq!(
            record_action(Classification::Repeated, None),
            RecordAction::InsertRepeated
        );
    }
}
