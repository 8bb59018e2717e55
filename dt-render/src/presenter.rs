use crate::render::{Scene, SkiaRenderer};
use dt_core::{Pitch, StimulusSpec};
use dt_session::{Presenter, Screen};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A tone the session asked for. Sound output itself lives outside this
/// crate; the cue records what should be playing and until when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCue {
    pub pitch: Pitch,
    pub started: Instant,
    pub max: Duration,
}

impl ToneCue {
    pub fn is_active(&self) -> bool {
        self.started.elapsed() < self.max
    }
}

/// Presenter backed by the tiny-skia renderer.
pub struct SkiaPresenter {
    renderer: SkiaRenderer,
    tone: Option<ToneCue>,
}

impl SkiaPresenter {
    pub fn new(renderer: SkiaRenderer) -> Self {
        Self {
            renderer,
            tone: None,
        }
    }

    pub fn renderer(&self) -> &SkiaRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SkiaRenderer {
        &mut self.renderer
    }

    pub fn active_tone(&self) -> Option<ToneCue> {
        self.tone.filter(ToneCue::is_active)
    }
}

impl Presenter for SkiaPresenter {
    fn show_screen(&mut self, screen: &Screen) {
        let scene = match screen {
            Screen::Blank => Scene::Blank,
            Screen::Loading => Scene::Loading,
            Screen::Text(text) => Scene::Text(text.clone()),
        };
        self.renderer.set_scene(scene);
    }

    fn show_stimulus(&mut self, spec: &StimulusSpec, placement: (f32, f32)) {
        self.renderer.set_scene(Scene::Stimulus {
            kind: spec.kind,
            placement,
        });
    }

    fn play_tone(&mut self, pitch: Pitch, max: Duration) {
        info!(?pitch, max_ms = max.as_millis() as u64, "tone");
        self.tone = Some(ToneCue {
            pitch,
            started: Instant::now(),
            max,
        });
    }

    fn silence(&mut self) {
        if self.tone.take().is_some() {
            debug!("tone stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_core::StimulusSequence;

    fn presenter() -> SkiaPresenter {
        SkiaPresenter::new(SkiaRenderer::new(640, 480, None).unwrap())
    }

    #[test]
    fn stimuli_and_screens_become_scenes() {
        let mut p = presenter();
        let seq = StimulusSequence::from_labels(&["yellow"]).unwrap();
        p.show_stimulus(seq.get(0), (0.2, 0.8));
        assert_eq!(
            p.renderer().scene(),
            &Scene::Stimulus {
                kind: seq.get(0).kind,
                placement: (0.2, 0.8)
            }
        );
        p.clear();
        assert_eq!(p.renderer().scene(), &Scene::Blank);
        p.show_screen(&Screen::Loading);
        assert_eq!(p.renderer().scene(), &Scene::Loading);
    }

    #[test]
    fn silence_cuts_the_tone() {
        let mut p = presenter();
        p.play_tone(Pitch::High, Duration::from_secs(60));
        assert_eq!(p.active_tone().map(|t| t.pitch), Some(Pitch::High));
        p.silence();
        assert!(p.active_tone().is_none());
    }

    #[test]
    fn expired_tone_is_inactive() {
        let mut p = presenter();
        p.play_tone(Pitch::Low, Duration::ZERO);
        assert!(p.active_tone().is_none());
    }
}
