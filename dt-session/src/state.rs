use crate::classifier::{self, RecordAction, ResponseContext};
use crate::config::{ConfigError, SessionConfig, Termination};
use crate::delay::DelayPolicy;
use crate::input::{EventQueue, InputEvent, InputUnifier};
use crate::present::{Presenter, Screen, TextScreen, Hint};
use crate::sink::{AnswerSink, SinkError};
use chrono::Local;
use dt_core::{
    AnswerRecord, Classification, Key, RecordId, REPEATED_PROMPT, SessionId, SessionOutcome,
    SessionPhase, StimulusKind, StimulusSequence, StimulusSpec,
};
use dt_timing::Timer;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Tone length cap when the pace has no deadline.
const SELF_PACED_TONE: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("answer sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionPhase,
        to: SessionPhase,
    },
}

/// Final state of one stimulus occurrence, kept so a late answer can find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub index: usize,
    pub classification: Classification,
    pub record: Option<RecordId>,
}

/// Running counts of classifications produced this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: usize,
    pub incorrect: usize,
    pub late: usize,
    pub missed: usize,
    pub repeated: usize,
}

impl Tally {
    fn count(&mut self, classification: Classification) {
        match classification {
            Classification::Correct => self.correct += 1,
            Classification::Incorrect => self.incorrect += 1,
            Classification::Late => self.late += 1,
            Classification::Missed => self.missed += 1,
            Classification::Repeated => self.repeated += 1,
        }
    }

    /// Incorrect answers including repeated presses.
    pub fn wrong(&self) -> usize {
        self.incorrect + self.repeated
    }
}

#[derive(Debug, Clone)]
struct LiveStimulus {
    index: usize,
    onset_ns: u64,
    /// Delay frozen at onset; `None` when self-paced.
    active_delay: Option<Duration>,
    placement: (f32, f32),
    answered: bool,
    /// Set once the stimulus has been drawn or its tone started.
    shown: bool,
    outcome: Option<Occurrence>,
}

/// Drives one test session from instructions to exit.
///
/// Single-threaded and frame-driven: the host pushes native events with
/// [`push_event`](Self::push_event) and calls [`tick`](Self::tick) once per
/// frame. Panel buttons are polled inside `tick`.
pub struct SessionController<T, R, S, P>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: AnswerSink,
    P: Presenter,
{
    config: SessionConfig,
    sequence: StimulusSequence,
    timer: T,
    rng: R,
    sink: S,
    presenter: P,
    input: InputUnifier,
    queue: EventQueue,
    phase: SessionPhase,
    delay: DelayPolicy,
    session: Option<SessionId>,
    started: bool,
    current: Option<LiveStimulus>,
    previous: Option<Occurrence>,
    epoch_ns: u64,
    anchor_ns: u64,
    presented: usize,
    tally: Tally,
    outcome: Option<SessionOutcome>,
}

impl<T, R, S, P> SessionController<T, R, S, P>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    S: AnswerSink,
    P: Presenter,
{
    pub fn new(
        config: SessionConfig,
        sequence: StimulusSequence,
        timer: T,
        rng: R,
        sink: S,
        presenter: P,
        input: InputUnifier,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let delay = DelayPolicy::from_spec(&config.delay);
        Ok(Self {
            config,
            sequence,
            timer,
            rng,
            sink,
            presenter,
            input,
            queue: EventQueue::new(),
            phase: SessionPhase::Instructions,
            delay,
            session: None,
            started: false,
            current: None,
            previous: None,
            epoch_ns: 0,
            anchor_ns: 0,
            presented: 0,
            tally: Tally::default(),
            outcome: None,
        })
    }

    /// Opens the session in the sink (when recording) and shows the
    /// instructions. Called by the first `tick` if not called explicitly.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        if self.config.records_answers() {
            if let Some(user) = self.config.user {
                let id = self
                    .sink
                    .begin_session(self.config.variant, Local::now(), user)?;
                info!(session = %id, variant = %self.config.variant, "session opened");
                self.session = Some(id);
            }
        }
        self.show_instructions();
        Ok(())
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    /// Polls the panel without running the session, for screens driven
    /// outside the controller such as the walkthrough.
    pub fn poll_panel(&mut self) -> Vec<InputEvent> {
        let mut polled = EventQueue::new();
        self.input.poll(&mut polled);
        polled.into()
    }

    /// One frame: poll the panel, drain queued input, then check the deadline.
    /// Returns the outcome once the session is over.
    pub fn tick(&mut self) -> Result<Option<SessionOutcome>, SessionError> {
        if let Some(outcome) = self.outcome {
            return Ok(Some(outcome));
        }
        self.start()?;
        self.input.poll(&mut self.queue);

        while let Some(event) = self.queue.pop_front() {
            if let Some(outcome) = self.handle_event(event)? {
                return Ok(Some(self.conclude(outcome)));
            }
        }

        if self.phase.is_running() {
            if let Some(outcome) = self.update_running()? {
                return Ok(Some(self.conclude(outcome)));
            }
        }
        Ok(None)
    }

    /// Back to the instructions after a failed training run. The next
    /// `tick` shows them again.
    pub fn rearm(&mut self) -> Result<(), SessionError> {
        if !self.phase.is_failure() {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: SessionPhase::Instructions,
            });
        }
        self.set_phase(SessionPhase::Instructions);
        self.delay = DelayPolicy::from_spec(&self.config.delay);
        self.current = None;
        self.previous = None;
        self.presented = 0;
        self.tally = Tally::default();
        self.outcome = None;
        self.started = false;
        self.queue.clear();
        Ok(())
    }

    fn conclude(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        self.outcome = Some(outcome);
        info!(?outcome, tally = ?self.tally, "session over");
        outcome
    }

    fn handle_event(&mut self, event: InputEvent) -> Result<Option<SessionOutcome>, SessionError> {
        let key = match event {
            InputEvent::Abort => return self.abort().map(Some),
            InputEvent::Key(key) => key,
        };

        match self.phase {
            SessionPhase::Instructions => {
                self.begin_running();
                Ok(None)
            }
            SessionPhase::Running => self.respond(key),
            SessionPhase::Exit => Ok(Some(SessionOutcome::Success)),
            SessionPhase::ExitFailure => Ok(match key {
                Key::Green => Some(SessionOutcome::Success),
                Key::Red => Some(SessionOutcome::Failure),
                _ => None,
            }),
        }
    }

    fn abort(&mut self) -> Result<SessionOutcome, SessionError> {
        self.presenter.silence();
        if !self.phase.is_exit() {
            if let Some(id) = self.session.take() {
                self.sink.discard_session(id)?;
                warn!(session = %id, "session aborted, answers discarded");
            }
        }
        Ok(SessionOutcome::Interrupted)
    }

    fn begin_running(&mut self) {
        self.set_phase(SessionPhase::Running);
        self.presenter.clear();
        self.presenter.flush();
        self.timer.sleep(self.config.start_pause());
        self.queue.clear();

        self.epoch_ns = self.timer.now();
        self.anchor_ns = self.epoch_ns;
        self.start_stimulus(0, self.epoch_ns);
    }

    fn start_stimulus(&mut self, index: usize, onset_ns: u64) {
        let placement = (
            self.rng.random_range(0.0..=1.0),
            self.rng.random_range(0.0..=1.0),
        );
        let active_delay = self.delay.current();
        self.presented += 1;
        debug!(
            index,
            prompt = %self.sequence.get(index).prompt,
            delay_ms = active_delay.map(|d| d.as_millis() as u64),
            "stimulus onset"
        );
        self.current = Some(LiveStimulus {
            index,
            onset_ns,
            active_delay,
            placement,
            answered: false,
            shown: false,
            outcome: None,
        });
    }

    fn update_running(&mut self) -> Result<Option<SessionOutcome>, SessionError> {
        let now = self.timer.now();
        let Some(live) = self.current.as_mut() else {
            return Ok(None);
        };

        if !live.answered && !live.shown {
            live.shown = true;
            let spec = self.sequence.get(live.index);
            match spec.kind {
                StimulusKind::Tone(pitch) => self
                    .presenter
                    .play_tone(pitch, live.active_delay.unwrap_or(SELF_PACED_TONE)),
                _ => self.presenter.show_stimulus(spec, live.placement),
            }
        }

        let Some(active) = live.active_delay else {
            return Ok(None);
        };
        if Duration::from_nanos(now.saturating_sub(live.onset_ns)) < active {
            return Ok(None);
        }
        if !live.answered {
            self.record_missed(now)?;
        }
        self.advance()
    }

    fn record_missed(&mut self, now: u64) -> Result<(), SessionError> {
        let Some(live) = self.current.as_ref() else {
            return Ok(());
        };
        let (index, active) = (live.index, live.active_delay);
        let record = self.insert(index, None, Classification::Missed, now, Duration::ZERO)?;
        self.delay.observe(Classification::Missed, Duration::ZERO, active);
        self.tally.count(Classification::Missed);
        debug!(index, "missed");

        if let Some(live) = self.current.as_mut() {
            live.outcome = Some(Occurrence {
                index,
                classification: Classification::Missed,
                record,
            });
        }
        Ok(())
    }

    fn respond(&mut self, key: Key) -> Result<Option<SessionOutcome>, SessionError> {
        let now = self.timer.now();
        let Some(live) = self.current.clone() else {
            return Ok(None);
        };
        self.presenter.clear();
        self.presenter.silence();

        let ctx = ResponseContext {
            expected_current: self.sequence.expected(live.index),
            expected_previous: self
                .sequence
                .expected(self.sequence.previous_index(live.index)),
            answered: live.answered,
        };
        let self_paced = live.active_delay.is_none();
        let classification = if self_paced {
            classifier::classify_self_paced(key, &ctx)
        } else {
            Some(classifier::classify(key, &ctx))
        };
        let latency = Duration::from_nanos(now.saturating_sub(self.anchor_ns));

        if let Some(classification) = classification {
            self.apply(&live, key, classification, now, latency)?;
            debug!(
                index = live.index,
                key = %key,
                %classification,
                latency_ms = latency.as_secs_f64() * 1e3,
                "response"
            );
        }

        self.presenter.flush();
        self.timer.sleep(self.config.debounce());
        if self_paced {
            // Every press moves a self-paced session on.
            if let Some(live) = self.current.as_mut() {
                live.answered = true;
            }
            return self.advance();
        }
        Ok(None)
    }

    fn apply(
        &mut self,
        live: &LiveStimulus,
        key: Key,
        classification: Classification,
        now: u64,
        latency: Duration,
    ) -> Result<(), SessionError> {
        let mut record = None;
        match classifier::record_action(classification, self.previous.map(|p| p.classification)) {
            RecordAction::InsertCurrent => {
                record = self.insert(live.index, Some(key), classification, now, latency)?;
            }
            RecordAction::InsertRepeated => {
                if let Some(session) = self.session {
                    let entry = AnswerRecord::new(
                        REPEATED_PROMPT,
                        Some(key),
                        classification.stored(),
                        self.since_epoch(now),
                        latency,
                        session,
                    );
                    self.sink.insert_answer(entry)?;
                }
                self.queue.clear();
            }
            RecordAction::UpgradePrevious => self.upgrade_previous(key, now, latency)?,
            RecordAction::Nothing => {}
        }

        self.tally.count(classification);
        self.delay.observe(classification, latency, live.active_delay);

        if classification != Classification::Repeated {
            if let Some(current) = self.current.as_mut() {
                current.answered = true;
                current.outcome = Some(Occurrence {
                    index: live.index,
                    classification,
                    record,
                });
            }
        }
        Ok(())
    }

    fn upgrade_previous(&mut self, key: Key, now: u64, latency: Duration) -> Result<(), SessionError> {
        let Some(previous) = self.previous.as_mut() else {
            return Ok(());
        };
        previous.classification = Classification::Late;
        let (Some(id), Some(session)) = (previous.record, self.session) else {
            return Ok(());
        };
        let entry = AnswerRecord::new(
            self.sequence.get(previous.index).prompt.clone(),
            Some(key),
            Classification::Late,
            Duration::from_nanos(now.saturating_sub(self.epoch_ns)),
            latency,
            session,
        );
        self.sink.update_answer(id, entry)?;
        Ok(())
    }

    fn insert(
        &mut self,
        index: usize,
        key: Option<Key>,
        classification: Classification,
        now: u64,
        latency: Duration,
    ) -> Result<Option<RecordId>, SessionError> {
        let Some(session) = self.session else {
            return Ok(None);
        };
        let entry = AnswerRecord::new(
            self.sequence.get(index).prompt.clone(),
            key,
            classification.stored(),
            self.since_epoch(now),
            latency,
            session,
        );
        Ok(Some(self.sink.insert_answer(entry)?))
    }

    fn advance(&mut self) -> Result<Option<SessionOutcome>, SessionError> {
        let Some(finished) = self.current.take() else {
            return Ok(None);
        };
        self.previous = finished.outcome;
        self.queue.clear();

        let now = self.timer.now();
        if finished.answered {
            self.anchor_ns = now;
        }
        if self.terminated(now) {
            return Ok(self.finish());
        }
        self.start_stimulus(self.sequence.next_index(finished.index), now);
        Ok(None)
    }

    fn terminated(&self, now: u64) -> bool {
        match self.config.termination {
            Termination::TimeBoxed { duration_ms } => {
                Duration::from_nanos(now.saturating_sub(self.epoch_ns))
                    >= Duration::from_millis(duration_ms)
            }
            Termination::CountBoxed { stimuli } | Termination::PassFail { stimuli, .. } => {
                self.presented >= stimuli
            }
        }
    }

    fn finish(&mut self) -> Option<SessionOutcome> {
        self.presenter.silence();
        self.presenter.show_screen(&Screen::Loading);
        self.presenter.flush();
        self.timer.sleep(self.config.loading_pause());
        self.queue.clear();

        if let Termination::PassFail {
            max_incorrect,
            max_missed,
            ..
        } = self.config.termination
        {
            if self.tally.wrong() >= max_incorrect || self.tally.missed >= max_missed {
                self.set_phase(SessionPhase::ExitFailure);
                self.presenter.show_screen(&Screen::training_failure());
                return None;
            }
            self.presenter.clear();
            return Some(SessionOutcome::Success);
        }

        self.set_phase(SessionPhase::Exit);
        self.presenter.show_screen(&Screen::exit(self.session));
        None
    }

    fn set_phase(&mut self, next: SessionPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase change {:?} -> {:?}",
            self.phase,
            next
        );
        info!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }

    fn show_instructions(&mut self) {
        let screen = Screen::Text(TextScreen {
            title: self.config.variant.title(),
            lines: self.config.instruction_lines(),
            hints: vec![Hint::plain("PRESS ANY BUTTON TO BEGIN")],
        });
        self.presenter.show_screen(&screen);
    }

    fn since_epoch(&self, now: u64) -> Duration {
        Duration::from_nanos(now.saturating_sub(self.epoch_ns))
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn delay(&self) -> &DelayPolicy {
        &self.delay
    }

    /// Current stimulus and its placement while running.
    pub fn current_stimulus(&self) -> Option<(&StimulusSpec, (f32, f32))> {
        self.current
            .as_ref()
            .map(|live| (self.sequence.get(live.index), live.placement))
    }

    pub fn current_delay(&self) -> Option<Duration> {
        self.current.as_ref().and_then(|live| live.active_delay)
    }

    pub fn previous_outcome(&self) -> Option<Occurrence> {
        self.previous
    }

    /// Stimulus occurrences started since the session began running.
    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn into_parts(self) -> (S, P) {
        (self.sink, self.presenter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::RecordingPresenter;
    use crate::sink::MemorySink;
    use dt_core::{TestVariant, UserId};
    use dt_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type Controller = SessionController<ManualTimer, StdRng, MemorySink, RecordingPresenter>;

    fn controller(variant: TestVariant, labels: &[&str]) -> (Controller, ManualTimer) {
        let sequence = StimulusSequence::from_labels(labels).unwrap();
        let config = SessionConfig::for_variant(variant, sequence.len(), false)
            .with_user(Some(UserId(1)));
        let timer = ManualTimer::new();
        let c = SessionController::new(
            config,
            sequence,
            timer.clone(),
            StdRng::seed_from_u64(7),
            MemorySink::new(),
            RecordingPresenter::new(),
            InputUnifier::keyboard_only(),
        )
        .unwrap();
        (c, timer)
    }

    fn press(c: &mut Controller, key: Key) -> Option<SessionOutcome> {
        c.push_event(InputEvent::Key(key));
        c.tick().unwrap()
    }

    #[test]
    fn first_key_starts_running_after_pause() {
        let (mut c, timer) = controller(TestVariant::FormB, &["red", "blue"]);
        c.tick().unwrap();
        assert!(c.phase().is_instructions());
        press(&mut c, Key::Other('x'));
        assert!(c.phase().is_running());
        assert_eq!(timer.now(), 1_500_000_000);
        assert_eq!(c.current_stimulus().unwrap().0.prompt, "red");
    }

    #[test]
    fn tally_counts_without_a_user() {
        let sequence = StimulusSequence::from_labels(&["red", "blue"]).unwrap();
        let config = SessionConfig::for_variant(TestVariant::FormB, 2, false);
        let mut c = SessionController::new(
            config,
            sequence,
            ManualTimer::new(),
            StdRng::seed_from_u64(1),
            MemorySink::new(),
            RecordingPresenter::new(),
            InputUnifier::keyboard_only(),
        )
        .unwrap();
        c.push_event(InputEvent::Key(Key::White));
        c.tick().unwrap();
        c.push_event(InputEvent::Key(Key::Red));
        c.tick().unwrap();
        assert_eq!(c.tally().correct, 1);
        assert_eq!(c.session_id(), None);
        assert_eq!(c.sink().record_count(), 0);
    }

    #[test]
    fn rearm_only_from_failure() {
        let (mut c, _) = controller(TestVariant::Training, &["red"]);
        assert!(matches!(
            c.rearm(),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn tone_is_played_once_per_occurrence() {
        let (mut c, timer) = controller(TestVariant::FormB, &["high_tone", "red"]);
        press(&mut c, Key::White);
        for _ in 0..5 {
            timer.advance(Duration::from_millis(10));
            c.tick().unwrap();
        }
        assert_eq!(c.presenter().tones_played(), 1);
        assert_eq!(c.presenter().stimuli_shown(), 0);
    }
}
