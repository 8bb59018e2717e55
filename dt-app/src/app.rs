use crate::audio::ToneOutput;
use crate::cli::Plan;
use crate::keymap::{self, Command};
use crate::panel::SysfsPanel;
use crate::results::{self, SessionReport};
use crate::surface::WindowPresenter;
use anyhow::{Context, Result};
use dt_core::{SessionOutcome, StimulusSequence};
use dt_render::{SkiaPresenter, SkiaRenderer};
use dt_session::{
    InputEvent, InputUnifier, MemorySink, SessionConfig, SessionController, Walkthrough,
    WalkthroughStep,
};
use dt_timing::{FrameLimiter, HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Fullscreen, Window, WindowId},
};

type Controller = SessionController<HighPrecisionTimer, StdRng, MemorySink, WindowPresenter>;

/// Walkthrough and training run on the training controller's presenter;
/// the test reuses its sink and presenter once training passes.
enum Stage {
    Idle,
    Walkthrough {
        walkthrough: Walkthrough<HighPrecisionTimer>,
        training: Controller,
    },
    Training {
        walkthrough: Walkthrough<HighPrecisionTimer>,
        training: Controller,
    },
    Test(Controller),
}

impl Stage {
    fn presenter_mut(&mut self) -> Option<&mut WindowPresenter> {
        match self {
            Stage::Idle => None,
            Stage::Walkthrough { training, .. }
            | Stage::Training { training, .. }
            | Stage::Test(training) => Some(training.presenter_mut()),
        }
    }
}

pub struct App {
    plan: Plan,
    window: Option<Arc<Window>>,
    stage: Stage,
    timer: HighPrecisionTimer,
    limiter: FrameLimiter,
    fullscreen: bool,
    should_exit: bool,
}

impl App {
    pub fn new(plan: Plan) -> Self {
        let limiter = FrameLimiter::new(plan.test.max_tick_hz);
        Self {
            fullscreen: !plan.windowed,
            plan,
            window: None,
            stage: Stage::Idle,
            timer: HighPrecisionTimer::new(),
            limiter,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            variant = %self.plan.test.variant,
            recording = self.plan.test.records_answers(),
            "determination test"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        let refresh_hz = monitor
            .as_ref()
            .and_then(|m| m.refresh_rate_millihertz())
            .map(|rate| rate as f64 / 1000.0);

        let mut attributes = Window::default_attributes()
            .with_title("Determination Test")
            .with_resizable(self.plan.windowed);
        if self.fullscreen {
            let monitor = monitor.context("no monitor available")?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            ?refresh_hz,
            "display"
        );

        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        let pixels = Pixels::new(size.width, size.height, surface)?;
        let font = match &self.plan.font {
            Some(path) => Some(SkiaRenderer::load_font(path)?),
            None => {
                warn!("no --font given, text screens are drawn without text");
                None
            }
        };
        let renderer = SkiaRenderer::new(size.width, size.height, font)?;
        let presenter = WindowPresenter::new(SkiaPresenter::new(renderer), pixels, ToneOutput::open());

        self.stage = self.first_stage(presenter)?;
        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn first_stage(&self, mut presenter: WindowPresenter) -> Result<Stage> {
        let sink = MemorySink::new();
        match &self.plan.training {
            Some((config, sequence)) => {
                let mut walkthrough = Walkthrough::new(self.timer.clone());
                walkthrough.start(&mut presenter);
                let training = self.controller(config.clone(), sequence.clone(), sink, presenter)?;
                Ok(Stage::Walkthrough {
                    walkthrough,
                    training,
                })
            }
            None => Ok(Stage::Test(self.test_controller(sink, presenter)?)),
        }
    }

    fn test_controller(&self, sink: MemorySink, presenter: WindowPresenter) -> Result<Controller> {
        self.controller(
            self.plan.test.clone(),
            self.plan.sequence.clone(),
            sink,
            presenter,
        )
    }

    fn controller(
        &self,
        config: SessionConfig,
        sequence: StimulusSequence,
        sink: MemorySink,
        presenter: WindowPresenter,
    ) -> Result<Controller> {
        let input = InputUnifier::connect(config.panel.as_deref(), &SysfsPanel);
        let rng = match self.plan.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let controller =
            SessionController::new(config, sequence, self.timer.clone(), rng, sink, presenter, input)?;
        Ok(controller)
    }

    /// One frame of the active stage, then the frame ceiling.
    fn step(&mut self) -> Result<()> {
        self.poll_walkthrough_panel();

        let stage = std::mem::replace(&mut self.stage, Stage::Idle);
        self.stage = match stage {
            Stage::Training {
                mut walkthrough,
                mut training,
            } => match training.tick()? {
                None => Stage::Training {
                    walkthrough,
                    training,
                },
                Some(SessionOutcome::Success) => {
                    info!(tally = ?training.tally(), "training passed");
                    let (sink, presenter) = training.into_parts();
                    Stage::Test(self.test_controller(sink, presenter)?)
                }
                Some(SessionOutcome::Failure) => {
                    info!("training repeated from the walkthrough");
                    training.rearm()?;
                    walkthrough.restart(training.presenter_mut());
                    Stage::Walkthrough {
                        walkthrough,
                        training,
                    }
                }
                Some(SessionOutcome::Interrupted) => {
                    self.finish(None, SessionOutcome::Interrupted)?;
                    Stage::Idle
                }
            },
            Stage::Test(mut test) => match test.tick()? {
                None => Stage::Test(test),
                Some(outcome) => {
                    self.finish(Some(&test), outcome)?;
                    Stage::Idle
                }
            },
            other => other,
        };

        if let Some(presenter) = self.stage.presenter_mut() {
            presenter.present()?;
        }
        self.limiter.pace(&mut self.timer);
        Ok(())
    }

    /// The walkthrough runs outside the controller, so panel buttons are
    /// polled here while it is up.
    fn poll_walkthrough_panel(&mut self) {
        let events = match &mut self.stage {
            Stage::Walkthrough { training, .. } => training.poll_panel(),
            _ => return,
        };
        for event in events {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: InputEvent) {
        let step = match &mut self.stage {
            Stage::Walkthrough {
                walkthrough,
                training,
            } => walkthrough.handle(event, training.presenter_mut()),
            Stage::Training { training, .. } | Stage::Test(training) => {
                training.push_event(event);
                return;
            }
            Stage::Idle => {
                if event == InputEvent::Abort {
                    self.should_exit = true;
                }
                return;
            }
        };

        match step {
            WalkthroughStep::Continue => {}
            WalkthroughStep::StartTraining => {
                if let Stage::Walkthrough {
                    walkthrough,
                    training,
                } = std::mem::replace(&mut self.stage, Stage::Idle)
                {
                    info!("walkthrough done, training starts");
                    self.stage = Stage::Training {
                        walkthrough,
                        training,
                    };
                }
            }
            WalkthroughStep::Aborted => {
                self.stage = Stage::Idle;
                if let Err(err) = self.finish(None, SessionOutcome::Interrupted) {
                    error!(%err, "shutdown failed");
                }
            }
        }
    }

    fn finish(&mut self, test: Option<&Controller>, outcome: SessionOutcome) -> Result<()> {
        let stats = self.timer.calibration_stats();
        info!(
            ?outcome,
            mean_tick_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            effective_hz = stats.effective_fps,
            "session timing"
        );

        if let Some(test) = test.filter(|t| results::keeps_results(t.phase(), outcome)) {
            if let Some(session) = test.session_id() {
                let report = SessionReport::collect(test.sink(), session, &stats)?;
                let path = results::write_report(&self.plan.output, &report)?;
                info!(
                    path = %path.display(),
                    answers = report.answers.len(),
                    accuracy_pct = ?report.summary.accuracy_pct,
                    "results saved"
                );
            }
        }

        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.repeat {
            return;
        }
        let code = match event.physical_key {
            PhysicalKey::Code(code) => Some(code),
            PhysicalKey::Unidentified(_) => None,
        };
        match keymap::command_for(code, event.text.as_deref()) {
            Command::Abort => self.dispatch(InputEvent::Abort),
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::Respond(key) => self.dispatch(InputEvent::Key(key)),
        }
    }

    fn toggle_fullscreen(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        self.fullscreen = !self.fullscreen;
        window.set_fullscreen(
            self.fullscreen
                .then(|| Fullscreen::Borderless(window.current_monitor())),
        );
        info!(fullscreen = self.fullscreen, "display mode");
    }

    fn handle_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(presenter) = self.stage.presenter_mut() {
            if let Err(err) = presenter.resize(width, height) {
                warn!(%err, "resize failed");
                return;
            }
        }
        info!(width, height, "display resized");
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_surface(event_loop) {
                error!(%err, "failed to create window and surface");
                event_loop.exit();
                return;
            }
            event_loop.set_control_flow(ControlFlow::Poll);
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.dispatch(InputEvent::Abort),
            WindowEvent::RedrawRequested => {
                if let Some(presenter) = self.stage.presenter_mut() {
                    if let Err(err) = presenter.redraw() {
                        warn!(%err, "redraw failed");
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(&event);
            }
            WindowEvent::Resized(size) => self.handle_resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size.width, size.height);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.should_exit {
            if let Err(err) = self.step() {
                error!(%err, "session stopped");
                self.should_exit = true;
            }
        }
        if self.should_exit {
            event_loop.exit();
        }
    }
}
