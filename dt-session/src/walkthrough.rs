//! Guided practice shown before the training run.

use crate::input::InputEvent;
use crate::present::{Hint, Presenter, Screen, TextScreen};
use dt_core::{CircleColor, Key, Pitch, Side, StimulusKind, StimulusSequence};
use dt_timing::Timer;
use std::time::Duration;
use tracing::debug;

const CHECKPOINT_PAUSE: Duration = Duration::from_millis(500);
const STEP_PAUSE: Duration = Duration::from_millis(250);
const PRACTICE_TONE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Colors,
    Pedals,
    Sounds,
}

impl Checkpoint {
    fn screen(&self) -> Screen {
        let (title, lines): (&str, &[&str]) = match self {
            Checkpoint::Colors => (
                "INSTRUCTIONS - COLORS",
                &[
                    "A colored circle appears somewhere on the screen.",
                    "Press the button of the same color.",
                ],
            ),
            Checkpoint::Pedals => (
                "INSTRUCTIONS - PEDALS",
                &[
                    "A marker appears on the left or right side.",
                    "Press the pedal on the same side.",
                ],
            ),
            Checkpoint::Sounds => (
                "INSTRUCTIONS - SOUNDS",
                &[
                    "A high or a low tone is played.",
                    "Press UP for the high tone and DOWN for the low tone.",
                ],
            ),
        };
        Screen::Text(TextScreen {
            title: title.into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            hints: vec![Hint::plain("PRESS ANY BUTTON TO CONTINUE")],
        })
    }

    fn practice(&self) -> Option<StimulusSequence> {
        let kinds: Vec<StimulusKind> = match self {
            Checkpoint::Colors => [
                CircleColor::White,
                CircleColor::Yellow,
                CircleColor::Blue,
                CircleColor::Green,
                CircleColor::Red,
            ]
            .into_iter()
            .map(StimulusKind::Color)
            .collect(),
            Checkpoint::Pedals => [Side::Left, Side::Right, Side::Left, Side::Right]
                .into_iter()
                .map(StimulusKind::Pedal)
                .collect(),
            Checkpoint::Sounds => return None,
        };
        StimulusSequence::from_kinds(kinds).ok()
    }

    fn next(&self) -> Option<Checkpoint> {
        match self {
            Checkpoint::Colors => Some(Checkpoint::Pedals),
            Checkpoint::Pedals => Some(Checkpoint::Sounds),
            Checkpoint::Sounds => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkthroughStage {
    Checkpoint(Checkpoint),
    Practice { checkpoint: Checkpoint, step: usize },
    SoundPractice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkthroughStep {
    Continue,
    StartTraining,
    Aborted,
}

/// Checkpoint screens and untimed practice: colors, then pedals, then sounds.
/// A practice stimulus only advances on its own key.
pub struct Walkthrough<T: Timer> {
    stage: WalkthroughStage,
    timer: T,
}

impl<T: Timer> Walkthrough<T> {
    pub fn new(timer: T) -> Self {
        Self {
            stage: WalkthroughStage::Checkpoint(Checkpoint::Colors),
            timer,
        }
    }

    pub fn stage(&self) -> WalkthroughStage {
        self.stage
    }

    pub fn start<P: Presenter>(&mut self, presenter: &mut P) {
        self.enter(WalkthroughStage::Checkpoint(Checkpoint::Colors), presenter);
    }

    /// Back to the first checkpoint, used after a failed training run.
    pub fn restart<P: Presenter>(&mut self, presenter: &mut P) {
        self.start(presenter);
    }

    pub fn handle<P: Presenter>(&mut self, event: InputEvent, presenter: &mut P) -> WalkthroughStep {
        let key = match event {
            InputEvent::Abort => {
                presenter.silence();
                return WalkthroughStep::Aborted;
            }
            InputEvent::Key(key) => key,
        };

        match self.stage {
            WalkthroughStage::Checkpoint(checkpoint) => {
                presenter.clear();
                presenter.flush();
                self.timer.sleep(CHECKPOINT_PAUSE);
                let next = match checkpoint {
                    Checkpoint::Sounds => WalkthroughStage::SoundPractice,
                    _ => WalkthroughStage::Practice { checkpoint, step: 0 },
                };
                self.enter(next, presenter);
            }
            WalkthroughStage::Practice { checkpoint, step } => {
                let Some(practice) = checkpoint.practice() else {
                    return WalkthroughStep::Continue;
                };
                if key != practice.expected(step) {
                    return WalkthroughStep::Continue;
                }
                presenter.clear();
                presenter.flush();
                self.timer.sleep(STEP_PAUSE);
                let next = if step + 1 < practice.len() {
                    WalkthroughStage::Practice {
                        checkpoint,
                        step: step + 1,
                    }
                } else {
                    checkpoint
                        .next()
                        .map(WalkthroughStage::Checkpoint)
                        .unwrap_or(WalkthroughStage::SoundPractice)
                };
                self.enter(next, presenter);
            }
            WalkthroughStage::SoundPractice => match key {
                Key::Up => presenter.play_tone(Pitch::High, PRACTICE_TONE),
                Key::Down => presenter.play_tone(Pitch::Low, PRACTICE_TONE),
                Key::White => {
                    presenter.silence();
                    presenter.clear();
                    return WalkthroughStep::StartTraining;
                }
                _ => {}
            },
        }
        WalkthroughStep::Continue
    }

    fn enter<P: Presenter>(&mut self, stage: WalkthroughStage, presenter: &mut P) {
        debug!(?stage, "walkthrough");
        self.stage = stage;
        match stage {
            WalkthroughStage::Checkpoint(checkpoint) => presenter.show_screen(&checkpoint.screen()),
            WalkthroughStage::Practice { checkpoint, step } => {
                if let Some(practice) = checkpoint.practice() {
                    presenter.show_stimulus(practice.get(step), (0.5, 0.5));
                }
            }
            WalkthroughStage::SoundPractice => presenter.show_screen(&Screen::Text(TextScreen {
                title: "INSTRUCTIONS - SOUNDS".into(),
                lines: vec!["Try both tones before the training starts.".into()],
                hints: vec![
                    Hint::keyed("UP: HIGH TONE", Key::Up),
                    Hint::keyed("DOWN: LOW TONE", Key::Down),
                    Hint::keyed("WHITE BUTTON: START TRAINING", Key::White),
                ],
            })),
        }
    }
}
