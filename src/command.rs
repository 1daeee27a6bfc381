//! # Commands
//!
//! Single-character command set and the application state it edits.
//!
//! | Key | Action |
//! |-----|--------|
//! | `0`–`9`, `_` | append to the numeric input (`_` is the minus sign) |
//! | `e` | commit input as the transposition key |
//! | `p` | commit input as the tempo |
//! | `u` / `d` | volume up / down |
//! | `m` | toggle mute |
//! | `+` / `-` | background load up / down |
//! | `t` | toggle deadline mode |
//! | `w` | profile the background load at its current size |
//! | `q` | profile the background load at its minimum size |
//! | `a` | profile the tone generator tick |
//! | `s` | print scheduler statistics |

use heapless::String;

use crate::config::{DEFAULT_TEMPO, INPUT_CAPACITY, MAX_KEY, MAX_TEMPO, MIN_KEY, MIN_TEMPO};
use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// A character for the numeric input buffer.
    Input(char),
    CommitKey,
    CommitTempo,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    LoadUp,
    LoadDown,
    ToggleDeadline,
    ProfileLoad,
    ProfileMinLoad,
    ProfileTone,
    Status,
    Unknown(char),
}

impl Command {
    /// Decode one received character.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0'..=b'9' => Command::Input(byte as char),
            b'_' => Command::Input('-'),
            b'e' => Command::CommitKey,
            b'p' => Command::CommitTempo,
            b'u' => Command::VolumeUp,
            b'd' => Command::VolumeDown,
            b'm' => Command::ToggleMute,
            b'+' => Command::LoadUp,
            b'-' => Command::LoadDown,
            b't' => Command::ToggleDeadline,
            b'w' => Command::ProfileLoad,
            b'q' => Command::ProfileMinLoad,
            b'a' => Command::ProfileTone,
            b's' => Command::Status,
            other => Command::Unknown(other as char),
        }
    }
}

/// Key, tempo and the pending numeric input.
#[derive(Debug, Clone)]
pub struct AppState {
    key: i32,
    tempo: u32,
    input: String<INPUT_CAPACITY>,
}

impl AppState {
    /// Key 0, default tempo, empty input.
    pub const fn new() -> Self {
        Self {
            key: 0,
            tempo: DEFAULT_TEMPO,
            input: String::new(),
        }
    }

    /// Append to the input buffer. Returns `false` when the buffer is full and
    /// the character was dropped.
    pub fn push_input(&mut self, c: char) -> bool {
        self.input.push(c).is_ok()
    }

    /// Parse and clear the input buffer. The buffer is cleared whether or not
    /// parsing succeeds. An empty buffer reads as 0.
    fn take_number(&mut self) -> Result<i32, InputError> {
        let parsed = if self.input.is_empty() {
            Ok(0)
        } else {
            self.input.parse::<i32>().map_err(|_| InputError::Malformed)
        };
        self.input.clear();
        parsed
    }

    /// Commit the input as the transposition key.
    pub fn commit_key(&mut self) -> Result<i32, InputError> {
        let key = self.take_number()?;
        if !(MIN_KEY..=MAX_KEY).contains(&key) {
            return Err(InputError::KeyOutOfRange(key));
        }
        self.key = key;
        Ok(key)
    }

    /// Commit the input as the tempo.
    pub fn commit_tempo(&mut self) -> Result<u32, InputError> {
        let tempo = self.take_number()?;
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
            return Err(InputError::TempoOutOfRange(tempo));
        }
        self.tempo = tempo as u32;
        Ok(self.tempo)
    }

    /// Current transposition in semitones.
    #[inline]
    pub fn key(&self) -> i32 {
        self.key
    }

    /// Current tempo in beats per minute.
    #[inline]
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(app: &mut AppState, s: &str) {
        for c in s.chars() {
            app.push_input(c);
        }
    }

    #[test]
    fn test_command_mapping() {
        assert_eq!(Command::from_byte(b'7'), Command::Input('7'));
        assert_eq!(Command::from_byte(b'_'), Command::Input('-'));
        assert_eq!(Command::from_byte(b'-'), Command::LoadDown);
        assert_eq!(Command::from_byte(b'+'), Command::LoadUp);
        assert_eq!(Command::from_byte(b'e'), Command::CommitKey);
        assert_eq!(Command::from_byte(b'p'), Command::CommitTempo);
        assert_eq!(Command::from_byte(b'x'), Command::Unknown('x'));
    }

    #[test]
    fn test_commit_key() {
        let mut app = AppState::new();
        type_str(&mut app, "3");
        assert_eq!(app.commit_key(), Ok(3));
        assert_eq!(app.key(), 3);
        assert_eq!(app.input(), "");

        type_str(&mut app, "-5");
        assert_eq!(app.commit_key(), Ok(-5));
    }

    #[test]
    fn test_invalid_key_resets_input_only() {
        let mut app = AppState::new();
        type_str(&mut app, "6");
        assert_eq!(app.commit_key(), Err(InputError::KeyOutOfRange(6)));
        assert_eq!(app.key(), 0);
        assert_eq!(app.input(), "");

        // Committing nothing selects key 0.
        type_str(&mut app, "2");
        app.commit_key().unwrap();
        assert_eq!(app.commit_key(), Ok(0));
        assert_eq!(app.key(), 0);

        type_str(&mut app, "1-");
        assert_eq!(app.commit_key(), Err(InputError::Malformed));
        assert_eq!(app.key(), 0);
    }

    #[test]
    fn test_commit_tempo() {
        let mut app = AppState::new();
        assert_eq!(app.tempo(), DEFAULT_TEMPO);

        type_str(&mut app, "250");
        assert_eq!(app.commit_tempo(), Ok(250));

        type_str(&mut app, "500");
        assert_eq!(app.commit_tempo(), Err(InputError::TempoOutOfRange(500)));
        type_str(&mut app, "0");
        assert_eq!(app.commit_tempo(), Err(InputError::TempoOutOfRange(0)));
        // An empty buffer reads as 0, which is no valid tempo either.
        assert_eq!(app.commit_tempo(), Err(InputError::TempoOutOfRange(0)));
        assert_eq!(app.tempo(), 250);
    }

    #[test]
    fn test_input_capacity() {
        let mut app = AppState::new();
        for _ in 0..INPUT_CAPACITY {
            assert!(app.push_input('1'));
        }
        assert!(!app.push_input('2'));
        assert_eq!(app.input().len(), INPUT_CAPACITY);
        assert!(!app.input().contains('2'));
        // Nineteen ones overflow an i32.
        assert_eq!(app.commit_tempo(), Err(InputError::Malformed));
    }
}
