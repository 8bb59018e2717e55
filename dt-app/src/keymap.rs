use dt_core::Key;
use winit::keyboard::KeyCode;

/// What a keyboard press means to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Respond(Key),
    Abort,
    ToggleFullscreen,
}

/// Panel keys by physical position; anything else falls back to the typed
/// character so the engine can still classify it as a wrong answer.
pub fn command_for(code: Option<KeyCode>, text: Option<&str>) -> Command {
    let key = match code {
        Some(KeyCode::Escape) => return Command::Abort,
        Some(KeyCode::KeyF) => return Command::ToggleFullscreen,
        Some(KeyCode::KeyW) => Key::White,
        Some(KeyCode::KeyY) => Key::Yellow,
        Some(KeyCode::KeyG) => Key::Green,
        Some(KeyCode::KeyB) => Key::Blue,
        Some(KeyCode::KeyR) => Key::Red,
        Some(KeyCode::ArrowUp) => Key::Up,
        Some(KeyCode::ArrowDown) => Key::Down,
        Some(KeyCode::ArrowLeft) => Key::Left,
        Some(KeyCode::ArrowRight) => Key::Right,
        _ => match text.and_then(|t| t.chars().next()) {
            Some(c) if !c.is_control() => Key::Other(c.to_ascii_lowercase()),
            _ => Key::Unmapped,
        },
    };
    Command::Respond(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_layout() {
        assert_eq!(command_for(Some(KeyCode::KeyW), Some("w")), Command::Respond(Key::White));
        assert_eq!(command_for(Some(KeyCode::KeyR), Some("R")), Command::Respond(Key::Red));
        assert_eq!(command_for(Some(KeyCode::ArrowLeft), None), Command::Respond(Key::Left));
        assert_eq!(command_for(Some(KeyCode::ArrowUp), None), Command::Respond(Key::Up));
    }

    #[test]
    fn control_keys_never_reach_the_engine() {
        assert_eq!(command_for(Some(KeyCode::Escape), None), Command::Abort);
        assert_eq!(command_for(Some(KeyCode::KeyF), Some("f")), Command::ToggleFullscreen);
    }

    #[test]
    fn other_keys_carry_their_character() {
        assert_eq!(command_for(Some(KeyCode::Space), Some(" ")), Command::Respond(Key::Other(' ')));
        assert_eq!(command_for(Some(KeyCode::KeyQ), Some("Q")), Command::Respond(Key::Other('q')));
        assert_eq!(command_for(Some(KeyCode::ShiftLeft), None), Command::Respond(Key::Unmapped));
        assert_eq!(command_for(None, Some("\u{8}")), Command::Respond(Key::Unmapped));
    }
}
