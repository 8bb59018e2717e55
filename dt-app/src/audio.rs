use dt_core::Pitch;
use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use tracing::{debug, warn};

const HIGH_HZ: f32 = 1000.0;
const LOW_HZ: f32 = 400.0;
const VOLUME: f32 = 0.4;

pub fn pitch_hz(pitch: Pitch) -> f32 {
    match pitch {
        Pitch::High => HIGH_HZ,
        Pitch::Low => LOW_HZ,
    }
}

/// A sine tone that ends on its own after `max`.
pub fn tone_source(pitch: Pitch, max: Duration) -> impl Source<Item = f32> + Send + 'static {
    SineWave::new(pitch_hz(pitch)).take_duration(max).amplify(VOLUME)
}

/// Speaker output for tone stimuli. The stream stays open for the whole run.
pub struct ToneOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    playing: Option<Sink>,
}

impl ToneOutput {
    /// `None` when the machine has no usable output device.
    pub fn open() -> Option<Self> {
        match OutputStream::try_default() {
            Ok((stream, handle)) => Some(Self {
                _stream: stream,
                handle,
                playing: None,
            }),
            Err(err) => {
                warn!(%err, "no audio output, tones are only logged");
                None
            }
        }
    }

    /// Replaces whatever tone is playing.
    pub fn play(&mut self, pitch: Pitch, max: Duration) {
        self.stop();
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.append(tone_source(pitch, max));
                self.playing = Some(sink);
            }
            Err(err) => warn!(%err, ?pitch, "tone not played"),
        }
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.playing.take() {
            sink.stop();
            debug!("tone output stopped");
        }
    }
}
