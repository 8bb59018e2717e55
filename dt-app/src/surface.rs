use crate::audio::ToneOutput;
use anyhow::Result;
use dt_core::{Pitch, StimulusSpec};
use dt_render::{FrameStats, SkiaPresenter};
use dt_session::{Presenter, Screen};
use dt_timing::HighPrecisionTimer;
use pixels::Pixels;
use std::time::Duration;
use tracing::{debug, warn};

/// The skia presenter plus the window surface it draws into, so that a
/// flush puts the frame on screen before a blocking pause. Tones go to the
/// speakers when an output device was found.
pub struct WindowPresenter {
    inner: SkiaPresenter,
    pixels: Pixels<'static>,
    audio: Option<ToneOutput>,
    timer: HighPrecisionTimer,
}

impl WindowPresenter {
    pub fn new(inner: SkiaPresenter, pixels: Pixels<'static>, audio: Option<ToneOutput>) -> Self {
        Self {
            inner,
            pixels,
            audio,
            timer: HighPrecisionTimer::new(),
        }
    }

    /// Redraws the damaged part of the scene and presents it. Returns `None`
    /// when nothing changed.
    pub fn present(&mut self) -> Result<Option<FrameStats>> {
        let Some(stats) = self
            .inner
            .renderer_mut()
            .render_frame(self.pixels.frame_mut(), &mut self.timer)
        else {
            return Ok(None);
        };
        self.pixels.render()?;
        debug!(
            clear_ms = stats.clear.as_secs_f64() * 1e3,
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            total_ms = stats.total.as_secs_f64() * 1e3,
            dirty = stats.dirty_count,
            "frame"
        );
        Ok(Some(stats))
    }

    /// Shows the last frame again, e.g. after the window was exposed.
    pub fn redraw(&mut self) -> Result<()> {
        self.pixels.render()?;
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.pixels.resize_surface(width, height)?;
        self.pixels.resize_buffer(width, height)?;
        self.inner.renderer_mut().resize(width, height)
    }
}

impl Presenter for WindowPresenter {
    fn show_screen(&mut self, screen: &Screen) {
        self.inner.show_screen(screen);
    }

    fn show_stimulus(&mut self, spec: &StimulusSpec, placement: (f32, f32)) {
        self.inner.show_stimulus(spec, placement);
    }

    fn play_tone(&mut self, pitch: Pitch, max: Duration) {
        self.inner.play_tone(pitch, max);
        if let Some(audio) = self.audio.as_mut() {
            audio.play(pitch, max);
        }
    }

    fn silence(&mut self) {
        self.inner.silence();
        if let Some(audio) = self.audio.as_mut() {
            audio.stop();
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.present() {
            warn!(%err, "frame not presented");
        }
    }
}
