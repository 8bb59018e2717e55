use anyhow::{Context, Result};
use dt_core::{
    AnswerRecord, SessionId, SessionOutcome, SessionPhase, SessionSummary, TestVariant, UserId,
};
use dt_session::MemorySink;
use dt_timing::CalibrationStats;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub mean_tick_ms: f64,
    pub jitter_ms: f64,
    pub effective_hz: f64,
}

impl From<&CalibrationStats> for TimingReport {
    fn from(stats: &CalibrationStats) -> Self {
        Self {
            mean_tick_ms: stats.average_frame_time_ns / 1e6,
            jitter_ms: stats.jitter_ns / 1e6,
            effective_hz: stats.effective_fps,
        }
    }
}

/// Contents of `session-<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: SessionId,
    pub variant: TestVariant,
    pub user: UserId,
    pub started_at: String,
    pub summary: SessionSummary,
    pub timing: TimingReport,
    pub answers: Vec<AnswerRecord>,
}

impl SessionReport {
    pub fn collect(sink: &MemorySink, session: SessionId, timing: &CalibrationStats) -> Result<Self> {
        let entry = sink
            .session(session)
            .with_context(|| format!("session {session} is not in the sink"))?;
        let answers = sink.records_for(session);
        Ok(Self {
            session,
            variant: entry.variant,
            user: entry.user,
            started_at: entry.started_at.clone(),
            summary: SessionSummary::from_records(&answers),
            timing: timing.into(),
            answers,
        })
    }
}

/// Whether a finished test's answers are written out. A test closed from
/// its exit screen keeps them; an abort before that has discarded them.
pub fn keeps_results(phase: SessionPhase, outcome: SessionOutcome) -> bool {
    match outcome {
        SessionOutcome::Success => true,
        SessionOutcome::Interrupted => phase.is_exit(),
        SessionOutcome::Failure => false,
    }
}

pub fn write_report(dir: &Path, report: &SessionReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("session-{}.json", report.session));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use dt_core::{Classification, Key};
    use dt_session::{
        AnswerSink, InputEvent, InputUnifier, RecordingPresenter, SessionConfig, SessionController,
    };
    use dt_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn session_with_answers() -> (MemorySink, SessionId) {
        let mut sink = MemorySink::new();
        let id = sink.begin_session(TestVariant::FormB, Local::now(), UserId(5)).unwrap();
        let answers = [
            ("red", Some(Key::Red), Classification::Correct, 400),
            ("blue", Some(Key::Green), Classification::Incorrect, 600),
            ("white", None, Classification::Missed, 0),
        ];
        for (i, (prompt, key, class, latency)) in answers.into_iter().enumerate() {
            let record = AnswerRecord::new(
                prompt,
                key,
                class,
                Duration::from_millis(1500 * i as u64 + latency),
                Duration::from_millis(latency),
                id,
            );
            sink.insert_answer(record).unwrap();
        }
        (sink, id)
    }

    #[test]
    fn report_is_written_and_reads_back() {
        let (sink, id) = session_with_answers();
        let stats = CalibrationStats {
            average_frame_time_ns: 500_000.0,
            jitter_ns: 20_000.0,
            min_frame_time_ns: 480_000.0,
            max_frame_time_ns: 560_000.0,
            effective_fps: 2000.0,
        };
        let report = SessionReport::collect(&sink, id, &stats).unwrap();
        assert_eq!(report.summary.stimuli, 3);
        assert_eq!(report.summary.correct, 1);
        assert_eq!(report.summary.missed, 1);
        assert_eq!(report.timing.mean_tick_ms, 0.5);

        let dir = tempfile::tempdir().unwrap();
        let path = write_report(&dir.path().join("out"), &report).unwrap();
        assert_eq!(path.file_name().unwrap(), format!("session-{id}.json").as_str());

        let back: SessionReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.answers.len(), 3);
        assert_eq!(back.answers[1].classification, Classification::Incorrect);
        assert_eq!(back.user, UserId(5));
        assert_eq!(back.variant, TestVariant::FormB);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let sink = MemorySink::new();
        assert!(SessionReport::collect(&sink, SessionId(9), &CalibrationStats::default()).is_err());
    }

    #[test]
    fn only_aborts_before_the_exit_screen_drop_results() {
        assert!(keeps_results(SessionPhase::Exit, SessionOutcome::Success));
        assert!(keeps_results(SessionPhase::Exit, SessionOutcome::Interrupted));
        assert!(!keeps_results(SessionPhase::Running, SessionOutcome::Interrupted));
        assert!(!keeps_results(SessionPhase::Instructions, SessionOutcome::Interrupted));
        assert!(!keeps_results(SessionPhase::ExitFailure, SessionOutcome::Failure));
    }

    #[test]
    fn escape_on_the_exit_screen_still_reports() {
        let sequence = dt_core::StimulusSequence::from_labels(&["red"]).unwrap();
        let config = SessionConfig::for_variant(TestVariant::FormB, sequence.len(), false)
            .with_user(Some(UserId(3)));
        let timer = ManualTimer::new();
        let mut test = SessionController::new(
            config,
            sequence,
            timer.clone(),
            StdRng::seed_from_u64(1),
            MemorySink::new(),
            RecordingPresenter::new(),
            InputUnifier::keyboard_only(),
        )
        .unwrap();

        test.tick().unwrap();
        test.push_event(InputEvent::Key(Key::Other(' ')));
        test.tick().unwrap();
        timer.advance(Duration::from_millis(300));
        test.push_event(InputEvent::Key(Key::Red));
        test.tick().unwrap();
        timer.advance(Duration::from_millis(1500));
        assert_eq!(test.tick().unwrap(), None);
        assert!(test.phase().is_exit());

        test.push_event(InputEvent::Abort);
        let outcome = test.tick().unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::Interrupted);
        assert!(keeps_results(test.phase(), outcome));

        let session = test.session_id().unwrap();
        let report = SessionReport::collect(test.sink(), session, &CalibrationStats::default()).unwrap();
        assert_eq!(report.answers.len(), 1);
        assert_eq!(report.summary.correct, 1);
    }
}
