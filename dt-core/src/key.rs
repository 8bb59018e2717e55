use serde::{Deserialize, Serialize};
use std::fmt;

/// Response symbols understood by the engine.
///
/// Panel buttons and keyboard keys both resolve to a `Key`; anything the
/// stimulus catalogue never expects is carried as `Other` so it can still be
/// scored as an incorrect answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    White,
    Yellow,
    Green,
    Blue,
    Red,
    Up,
    Down,
    Left,
    Right,
    Other(char),
    Unmapped,
}

impl Key {
    pub const PANEL: [Key; 9] = [
        Key::White,
        Key::Yellow,
        Key::Green,
        Key::Blue,
        Key::Red,
        Key::Up,
        Key::Down,
        Key::Left,
        Key::Right,
    ];

    /// Name stored with an answer record.
    pub fn name(&self) -> String {
        match self {
            Key::White => "w".into(),
            Key::Yellow => "y".into(),
            Key::Green => "g".into(),
            Key::Blue => "b".into(),
            Key::Red => "r".into(),
            Key::Up => "up".into(),
            Key::Down => "down".into(),
            Key::Left => "left".into(),
            Key::Right => "right".into(),
            Key::Other(c) => c.to_string(),
            Key::Unmapped => "unknown".into(),
        }
    }

    /// Maps a typed character onto the panel layout.
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_lowercase() {
            'w' => Key::White,
            'y' => Key::Yellow,
            'g' => Key::Green,
            'b' => Key::Blue,
            'r' => Key::Red,
            other => Key::Other(other),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_letters_map_to_panel_keys() {
        assert_eq!(Key::from_char('W'), Key::White);
        assert_eq!(Key::from_char('r'), Key::Red);
        assert_eq!(Key::from_char('x'), Key::Other('x'));
    }

    #[test]
    fn names_follow_keyboard_labels() {
        assert_eq!(Key::Left.name(), "left");
        assert_eq!(Key::Green.to_string(), "g");
        assert_eq!(Key::Other('q').name(), "q");
    }
}
