use dt_core::Key;
use dt_session::{InputSource, PanelConnector, PanelError};
use std::path::{Path, PathBuf};

/// BCM pin of each panel button.
pub const PANEL_PINS: [(Key, u8); 9] = [
    (Key::White, 18),
    (Key::Yellow, 14),
    (Key::Green, 15),
    (Key::Blue, 22),
    (Key::Red, 27),
    (Key::Up, 23),
    (Key::Down, 17),
    (Key::Left, 24),
    (Key::Right, 25),
];

/// One exported GPIO line; pressed while its value file reads `1`.
pub struct GpioValue {
    path: PathBuf,
}

impl GpioValue {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl InputSource for GpioValue {
    fn is_pressed(&self) -> bool {
        std::fs::read(&self.path)
            .map(|bytes| bytes.first() == Some(&b'1'))
            .unwrap_or(false)
    }
}

/// Panel reached through a GPIO value-file tree such as `/sys/class/gpio`,
/// locally or over a mount.
pub struct SysfsPanel;

impl PanelConnector for SysfsPanel {
    fn connect(&self, address: &str) -> Result<Vec<(Key, Box<dyn InputSource>)>, PanelError> {
        let root = Path::new(address);
        if !root.is_dir() {
            return Err(PanelError::Unreachable {
                address: address.into(),
                reason: "not a directory".into(),
            });
        }

        let mut sources: Vec<(Key, Box<dyn InputSource>)> = Vec::with_capacity(PANEL_PINS.len());
        for (key, pin) in PANEL_PINS {
            let path = root.join(format!("gpio{pin}")).join("value");
            std::fs::metadata(&path).map_err(|err| PanelError::Button {
                key,
                reason: format!("{}: {err}", path.display()),
            })?;
            sources.push((key, Box::new(GpioValue::new(path))));
        }
        Ok(sources)
    }
}
