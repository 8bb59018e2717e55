pub mod presenter;
pub mod render;

pub use presenter::{SkiaPresenter, ToneCue};
pub use render::{
    BACKGROUND, CIRCLE_RADIUS, FOREGROUND, FrameStats, PEDAL_SIZE, Scene, SkiaRenderer,
    render_text_pixmap,
};
