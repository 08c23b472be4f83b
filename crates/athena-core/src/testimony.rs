//! Testimony recorder.
//!
//! ```text
//!            record                 stop
//!   Idle ─────────────▶ Recording ──────────▶ Idle
//!    │  play (≥1 statement)
//!    ▼
//!   Playback ──update──▶ Updating ──(next IC message)──▶ Playback
//!      │    └──insert──▶ Inserting ─(next IC message)──▶ Playback
//!      └── delete (index > 0)
//! ```
//!
//! Statement 0 is the testimony title and cannot be deleted. Statements are
//! stored as complete encoded IC packets so playback can resend them as-is.

use std::fmt;

use crate::error::TestimonyError;

/// Recorder mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// Not recording or playing.
    #[default]
    Idle,
    /// Every IC message in the area is appended.
    Recording,
    /// Statements are stepped through.
    Playback,
    /// The next IC message replaces the current statement.
    Updating,
    /// The next IC message is inserted after the current statement.
    Inserting,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Playback => "playback",
            Self::Updating => "updating",
            Self::Inserting => "inserting",
        })
    }
}

/// What the recorder did with an IC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Captured {
    /// Recorder not capturing; message passed through.
    Ignored,
    /// Appended while recording.
    Recorded,
    /// Replaced the current statement.
    Updated,
    /// Inserted after the previous current statement, which it replaces as
    /// current.
    Inserted,
}

/// Per-area testimony state and statement list.
#[derive(Debug, Clone, Default)]
pub struct Testimony {
    state: RecorderState,
    statements: Vec<String>,
    index: usize,
}

impl Testimony {
    /// Current mode.
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// All statements, title first.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Index of the current statement.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Statement at the current index.
    pub fn current(&self) -> Option<&str> {
        self.statements.get(self.index).map(String::as_str)
    }

    /// Start a fresh recording.
    ///
    /// # Errors
    ///
    /// `TestimonyError::Active` unless the recorder is idle.
    pub fn record(&mut self) -> Result<(), TestimonyError> {
        if self.state != RecorderState::Idle {
            return Err(TestimonyError::Active);
        }
        self.statements.clear();
        self.index = 0;
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Return to idle from any state and rewind to the title.
    pub fn stop(&mut self) {
        self.state = RecorderState::Idle;
        self.index = 0;
    }

    /// Enter playback and return the current statement.
    ///
    /// # Errors
    ///
    /// `TestimonyError::Empty` if nothing was recorded.
    pub fn play(&mut self) -> Result<&str, TestimonyError> {
        if self.statements.is_empty() {
            return Err(TestimonyError::Empty);
        }
        self.state = RecorderState::Playback;
        self.index = self.index.min(self.statements.len() - 1);
        Ok(&self.statements[self.index])
    }

    /// Replace the current statement with the next IC message.
    ///
    /// # Errors
    ///
    /// `TestimonyError::NotActive` outside playback.
    pub fn update(&mut self) -> Result<(), TestimonyError> {
        self.require_playback()?;
        self.state = RecorderState::Updating;
        Ok(())
    }

    /// Insert the next IC message after the current statement.
    ///
    /// # Errors
    ///
    /// `TestimonyError::NotActive` outside playback.
    pub fn insert(&mut self) -> Result<(), TestimonyError> {
        self.require_playback()?;
        self.state = RecorderState::Inserting;
        Ok(())
    }

    /// Delete the current statement and step back to the previous one.
    ///
    /// # Errors
    ///
    /// - `TestimonyError::NotActive` outside playback
    /// - `TestimonyError::TitleProtected` at index 0
    pub fn delete(&mut self) -> Result<String, TestimonyError> {
        self.require_playback()?;
        if self.index == 0 {
            return Err(TestimonyError::TitleProtected);
        }
        let removed = self.statements.remove(self.index);
        self.index -= 1;
        Ok(removed)
    }

    /// Step forward, wrapping past the last statement back to the first one
    /// after the title.
    pub fn advance(&mut self) -> Option<&str> {
        if self.state != RecorderState::Playback || self.statements.is_empty() {
            return None;
        }
        self.index = if self.index + 1 < self.statements.len() {
            self.index + 1
        } else {
            usize::from(self.statements.len() > 1)
        };
        self.current()
    }

    /// Step back, stopping at the title.
    pub fn rewind(&mut self) -> Option<&str> {
        if self.state != RecorderState::Playback || self.statements.is_empty() {
            return None;
        }
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    /// Offer an IC message to the recorder.
    pub fn capture(&mut self, statement: String) -> Captured {
        match self.state {
            RecorderState::Recording => {
                self.statements.push(statement);
                self.index = self.statements.len() - 1;
                Captured::Recorded
            },
            RecorderState::Updating => {
                if let Some(slot) = self.statements.get_mut(self.index) {
                    *slot = statement;
                }
                self.state = RecorderState::Playback;
                Captured::Updated
            },
            RecorderState::Inserting => {
                let at = (self.index + 1).min(self.statements.len());
                self.statements.insert(at, statement);
                self.index = at;
                self.state = RecorderState::Playback;
                Captured::Inserted
            },
            RecorderState::Idle | RecorderState::Playback => Captured::Ignored,
        }
    }

    fn require_playback(&self) -> Result<(), TestimonyError> {
        if self.state == RecorderState::Playback {
            Ok(())
        } else {
            Err(TestimonyError::NotActive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(lines: &[&str]) -> Testimony {
        let mut t = Testimony::default();
        t.record().unwrap();
        for line in lines {
            t.capture((*line).to_string());
        }
        t.stop();
        t
    }

    #[test]
    fn record_requires_idle() {
        let mut t = Testimony::default();
        t.record().unwrap();
        assert_eq!(t.record(), Err(TestimonyError::Active));
    }

    #[test]
    fn play_without_statements_fails() {
        let mut t = Testimony::default();
        assert_eq!(t.play(), Err(TestimonyError::Empty));
        assert_eq!(t.state(), RecorderState::Idle);
    }

    #[test]
    fn stop_rewinds_to_title() {
        let mut t = recorded(&["title", "one", "two"]);
        assert_eq!(t.index(), 0);
        assert_eq!(t.play(), Ok("title"));
    }

    #[test]
    fn advance_wraps_past_title() {
        let mut t = recorded(&["title", "one", "two"]);
        t.play().unwrap();
        assert_eq!(t.advance(), Some("one"));
        assert_eq!(t.advance(), Some("two"));
        assert_eq!(t.advance(), Some("one"));
        assert_eq!(t.rewind(), Some("title"));
        assert_eq!(t.rewind(), Some("title"));
    }

    #[test]
    fn update_replaces_current() {
        let mut t = recorded(&["title", "one"]);
        t.play().unwrap();
        t.advance();
        t.update().unwrap();
        assert_eq!(t.capture("uno".to_string()), Captured::Updated);
        assert_eq!(t.statements(), ["title", "uno"]);
        assert_eq!(t.state(), RecorderState::Playback);
    }

    #[test]
    fn insert_goes_after_current() {
        let mut t = recorded(&["title", "one", "three"]);
        t.play().unwrap();
        t.advance();
        t.insert().unwrap();
        assert_eq!(t.capture("two".to_string()), Captured::Inserted);
        assert_eq!(t.statements(), ["title", "one", "two", "three"]);
        assert_eq!(t.current(), Some("two"));
    }

    #[test]
    fn idle_ignores_messages() {
        let mut t = Testimony::default();
        assert_eq!(t.capture("hello".to_string()), Captured::Ignored);
        assert!(t.is_empty());
    }
}
