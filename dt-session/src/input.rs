use dt_core::Key;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, warn};

/// What the engine consumes: a key press, or a request to abandon the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    Abort,
}

pub type EventQueue = VecDeque<InputEvent>;

/// A physical button that can only answer "is it held right now".
pub trait InputSource: Send {
    fn is_pressed(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel at {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },
    #[error("button {key} is unavailable: {reason}")]
    Button { key: Key, reason: String },
}

/// Opens the buttons of a remote panel.
pub trait PanelConnector {
    fn connect(&self, address: &str) -> Result<Vec<(Key, Box<dyn InputSource>)>, PanelError>;
}

struct PanelButton {
    key: Key,
    source: Box<dyn InputSource>,
    held: bool,
}

/// Merges polled panel buttons into the native event queue.
///
/// A held button produces a single event; it must be seen released before
/// it fires again.
#[derive(Default)]
pub struct InputUnifier {
    buttons: Vec<PanelButton>,
}

impl InputUnifier {
    pub fn keyboard_only() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: Vec<(Key, Box<dyn InputSource>)>) -> Self {
        Self {
            buttons: sources
                .into_iter()
                .map(|(key, source)| PanelButton {
                    key,
                    source,
                    held: false,
                })
                .collect(),
        }
    }

    /// Connects to `address` if given. An unreachable panel is not fatal:
    /// the session continues on native input alone.
    pub fn connect(address: Option<&str>, connector: &dyn PanelConnector) -> Self {
        let Some(address) = address else {
            return Self::keyboard_only();
        };
        match connector.connect(address) {
            Ok(sources) => {
                debug!(address, buttons = sources.len(), "panel connected");
                Self::from_sources(sources)
            }
            Err(err) => {
                warn!(%err, "falling back to keyboard input");
                Self::keyboard_only()
            }
        }
    }

    /// Appends one key event per newly pressed button. Returns how many
    /// events were added.
    pub fn poll(&mut self, queue: &mut EventQueue) -> usize {
        let mut fired = 0;
        for button in &mut self.buttons {
            let pressed = button.source.is_pressed();
            if pressed && !button.held {
                queue.push_back(InputEvent::Key(button.key));
                fired += 1;
            }
            button.held = pressed;
        }
        fired
    }

    pub fn source_count(&self) -> usize {
        self.buttons.len()
    }
}
