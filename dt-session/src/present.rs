use dt_core::{Key, Pitch, SessionId, StimulusSpec};
use std::time::Duration;

/// A line of call-to-action text, colored like the button it names.
#[derive(Debug, Clone, PartialEq)]
pub struct Hint {
    pub text: String,
    pub key: Option<Key>,
}

impl Hint {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            key: None,
        }
    }

    pub fn keyed(text: impl Into<String>, key: Key) -> Self {
        Self {
            text: text.into(),
            key: Some(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextScreen {
    pub title: String,
    pub lines: Vec<String>,
    pub hints: Vec<Hint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Blank,
    Loading,
    Text(TextScreen),
}

impl Screen {
    pub fn exit(session: Option<SessionId>) -> Self {
        let mut lines = vec!["The test is finished.".to_string()];
        if let Some(id) = session {
            lines.push(format!("Test ID: {id}"));
            lines.push("The results are stored under the user's profile.".into());
        }
        Screen::Text(TextScreen {
            title: "DETERMINATION TEST".into(),
            lines,
            hints: vec![Hint::plain("PRESS ANY BUTTON TO RETURN TO THE MENU")],
        })
    }

    pub fn training_failure() -> Self {
        Screen::Text(TextScreen {
            title: "DETERMINATION TEST - TRAINING".into(),
            lines: vec![
                "The training is finished.".into(),
                "Result: Failure".into(),
            ],
            hints: vec![
                Hint::keyed("GREEN BUTTON: TEST", Key::Green),
                Hint::keyed("RED BUTTON: INSTRUCTIONS", Key::Red),
            ],
        })
    }
}

/// Output side of the engine: screens, stimuli and tones.
pub trait Presenter {
    fn show_screen(&mut self, screen: &Screen);

    /// `placement` is normalized to the safe drawing area, both axes in `0..=1`.
    fn show_stimulus(&mut self, spec: &StimulusSpec, placement: (f32, f32));

    /// Plays a tone for at most `max`.
    fn play_tone(&mut self, pitch: Pitch, max: Duration);

    fn silence(&mut self);

    fn clear(&mut self) {
        self.show_screen(&Screen::Blank);
    }

    /// Makes pending output visible now. Called before blocking pauses.
    fn flush(&mut self) {}
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn show_screen(&mut self, screen: &Screen) {
        (**self).show_screen(screen)
    }

    fn show_stimulus(&mut self, spec: &StimulusSpec, placement: (f32, f32)) {
        (**self).show_stimulus(spec, placement)
    }

    fn play_tone(&mut self, pitch: Pitch, max: Duration) {
        (**self).play_tone(pitch, max)
    }

    fn silence(&mut self) {
        (**self).silence()
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

/// Everything a presenter was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentCall {
    Screen(Screen),
    Stimulus { prompt: String, placement: (f32, f32) },
    Tone(Pitch, Duration),
    Silence,
}

/// Presenter that only remembers its calls.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub calls: Vec<PresentCall>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stimuli_shown(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PresentCall::Stimulus { .. }))
            .count()
    }

    pub fn tones_played(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PresentCall::Tone(..)))
            .count()
    }

    pub fn last_screen(&self) -> Option<&Screen> {
        self.calls.iter().rev().find_map(|c| match c {
            PresentCall::Screen(s) => Some(s),
            _ => None,
        })
    }
}

impl Presenter for RecordingPresenter {
    fn show_screen(&mut self, screen: &Screen) {
        self.calls.push(PresentCall::Screen(screen.clone()));
    }

    fn show_stimulus(&mut self, spec: &StimulusSpec, placement: (f32, f32)) {
        self.calls.push(PresentCall::Stimulus {
            prompt: spec.prompt.clone(),
            placement,
        });
    }

    fn play_tone(&mut self, pitch: Pitch, max: Duration) {
        self.calls.push(PresentCall::Tone(pitch, max));
    }

    fn silence(&mut self) {
        self.calls.push(PresentCall::Silence);
    }
}
