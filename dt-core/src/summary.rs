use crate::answer::{AnswerRecord, Classification};
use serde::{Deserialize, Serialize};

/// Score figures derived from a session's answer records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub stimuli: usize,
    pub reactions: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub late: usize,
    pub missed: usize,
    pub median_reaction_ms: Option<f64>,
    pub mean_correct_ms: Option<f64>,
    /// Correct answers over all records, in percent.
    pub accuracy_pct: Option<f64>,
}

impl SessionSummary {
    pub fn from_records(records: &[AnswerRecord]) -> Self {
        let mut summary = SessionSummary {
            stimuli: records.len(),
            ..Default::default()
        };
        let mut reaction_ms = Vec::new();
        let mut correct_ms = Vec::new();

        for r in records {
            match r.classification {
                Classification::Correct => {
                    summary.correct += 1;
                    correct_ms.push(r.latency_ms);
                }
                Classification::Incorrect | Classification::Repeated => summary.incorrect += 1,
                Classification::Late => summary.late += 1,
                Classification::Missed => summary.missed += 1,
            }
            if r.is_reaction() {
                reaction_ms.push(r.latency_ms);
            }
        }

        summary.reactions = reaction_ms.len();
        summary.median_reaction_ms = median(&mut reaction_ms);
        if !correct_ms.is_empty() {
            summary.mean_correct_ms = Some(correct_ms.iter().sum::<f64>() / correct_ms.len() as f64);
        }
        if summary.stimuli > 0 {
            summary.accuracy_pct = Some(summary.correct as f64 / summary.stimuli as f64 * 100.0);
        }
        summary
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::SessionId;
    use crate::key::Key;
    use std::time::Duration;

    fn record(c: Classification, latency_ms: u64) -> AnswerRecord {
        AnswerRecord::new(
            "red",
            Some(Key::Red),
            c,
            Duration::ZERO,
            Duration::from_millis(latency_ms),
            SessionId(1),
        )
    }

    #[test]
    fn counts_and_median_skip_missed() {
        let records = vec![
            record(Classification::Correct, 300),
            record(Classification::Correct, 500),
            record(Classification::Incorrect, 700),
            record(Classification::Missed, 0),
        ];
        let s = SessionSummary::from_records(&records);
        assert_eq!(s.stimuli, 4);
        assert_eq!(s.reactions, 3);
        assert_eq!(s.missed, 1);
        assert_eq!(s.median_reaction_ms, Some(500.0));
        assert_eq!(s.mean_correct_ms, Some(400.0));
        assert_eq!(s.accuracy_pct, Some(50.0));
    }

    #[test]
    fn empty_session_has_no_statistics() {
        let s = SessionSummary::from_records(&[]);
        assert_eq!(s, SessionSummary::default());
    }
}
