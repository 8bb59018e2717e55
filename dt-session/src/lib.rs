pub mod classifier;
pub mod config;
pub mod delay;
pub mod input;
pub mod present;
pub mod sink;
pub mod state;
pub mod walkthrough;

pub use classifier::{RecordAction, ResponseContext, classify, classify_self_paced, record_action};
pub use config::{ConfigError, DelaySpec, SessionConfig, Termination};
pub use delay::{AdaptiveWindow, DelayPolicy};
pub use input::{EventQueue, InputEvent, InputSource, InputUnifier, PanelConnector, PanelError};
pub use present::{Hint, PresentCall, Presenter, RecordingPresenter, Screen, TextScreen};
pub use sink::{AnswerSink, MemorySink, SessionEntry, SinkError};
pub use state::{Occurrence, SessionController, SessionError, Tally};
pub use walkthrough::{Checkpoint, Walkthrough, WalkthroughStage, WalkthroughStep};
