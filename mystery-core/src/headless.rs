//! Headless game interface for programmatic use.
//!
//! This module drives a mystery without any rendering. It's designed for:
//! - Automated testing against a real endpoint
//! - Coding agents playing the game
//! - The line-oriented terminal front-end
//!
//! # Example
//!
//! ```ignore
//! use mystery_core::headless::{HeadlessConfig, HeadlessGame};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HeadlessConfig::new("data/game.json");
//!     let mut game = HeadlessGame::new(config).await?;
//!
//!     game.talk_to("Leia")?;
//!     let reply = game.send("Where were you at midnight?").await?;
//!     println!("{reply}");
//!
//!     let outcome = game.present("09")?;
//!     println!("{:?}", outcome.reply);
//!
//!     game.save()?;
//!     Ok(())
//! }
//! ```

use crate::character::ActorId;
use crate::data::GameData;
use crate::dialogue::DialoguePhase;
use crate::regions::MapAction;
use crate::session::{
    DialogueOutcome, GameSession, InvestigateOutcome, Notice, PresentOutcome, SessionConfig,
    SessionError,
};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a headless game.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Game data file.
    pub data_path: PathBuf,
    /// Session settings.
    pub session: SessionConfig,
    /// Continue from the save file when one exists.
    pub resume: bool,
}

impl HeadlessConfig {
    /// Settings from the environment, resuming saved progress.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            session: SessionConfig::from_env(),
            resume: true,
        }
    }

    /// Replace the session settings.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Start over even if a save exists.
    pub fn fresh(mut self) -> Self {
        self.resume = false;
        self
    }
}

/// An entry in the game transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub actor: String,
    pub input: String,
    pub reply: String,
}

/// A one-line summary of the game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub actor: String,
    pub actions_left: u32,
    pub evidence: usize,
    pub end_game: bool,
    pub post_game: bool,
    pub background: Option<String>,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "talking to {} | {} actions left | {} evidence",
            self.actor, self.actions_left, self.evidence
        )?;
        if let Some(bg) = &self.background {
            write!(f, " | at {bg}")?;
        }
        if self.end_game {
            write!(f, " | accusation")?;
        }
        if self.post_game {
            write!(f, " | epilogue")?;
        }
        Ok(())
    }
}

/// A mystery that can be played programmatically.
///
/// This wraps `GameSession` with a simpler interface for automated use.
pub struct HeadlessGame {
    session: GameSession,
    transcript: Vec<TranscriptEntry>,
}

impl HeadlessGame {
    /// Load the game data and start or resume a session.
    pub async fn new(config: HeadlessConfig) -> Result<Self, SessionError> {
        let data = GameData::load(&config.data_path).await?;
        let session = if config.resume {
            GameSession::resume(data, config.session)?
        } else {
            let session = GameSession::new(data, config.session)?;
            session.save()?;
            session
        };
        Ok(Self::from_session(session))
    }

    /// Wrap an existing session.
    pub fn from_session(session: GameSession) -> Self {
        Self {
            session,
            transcript: Vec::new(),
        }
    }

    /// Send a line to the current actor and return what is displayed.
    ///
    /// Continues past a reply already on screen.
    pub async fn send(&mut self, input: &str) -> Result<String, SessionError> {
        if matches!(self.session.phase(), DialoguePhase::DisplayingResponse(_)) {
            self.session.request_continue().await?;
        }
        let outcome = self.session.send_message(input).await?;
        let reply = match outcome {
            DialogueOutcome::Replied { text, .. } => text,
            DialogueOutcome::Failed { message } => message,
            DialogueOutcome::Cancelled => String::new(),
        };
        self.transcript.push(TranscriptEntry {
            actor: self.current_name().to_string(),
            input: input.to_string(),
            reply: reply.clone(),
        });
        Ok(reply)
    }

    /// Present an item to the current actor.
    pub fn present(&mut self, evidence_id: &str) -> Result<PresentOutcome, SessionError> {
        self.session.present(evidence_id)
    }

    /// Investigate a map region by name, on any page.
    pub fn investigate(&mut self, region: &str) -> Result<InvestigateOutcome, SessionError> {
        let action = self
            .session
            .data()
            .map
            .pages
            .iter()
            .flat_map(|page| page.regions.regions())
            .find(|r| r.name.eq_ignore_ascii_case(region))
            .map(|r| r.action.clone());
        match action {
            Some(MapAction::Investigate {
                message,
                obtain,
                background,
            }) => self
                .session
                .investigate(&message, obtain.as_deref(), background.as_deref()),
            _ => Err(SessionError::UnknownRegion(region.to_string())),
        }
    }

    /// Switch to the named actor.
    pub fn talk_to(&mut self, name: &str) -> Result<ActorId, SessionError> {
        let id = self
            .session
            .actor_by_name(name)
            .map(|a| a.id)
            .ok_or_else(|| SessionError::UnknownActor(name.to_string()))?;
        self.session.select_actor(id)?;
        Ok(id)
    }

    /// Save progress to the configured store.
    pub fn save(&self) -> Result<(), SessionError> {
        self.session.save()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            actor: self.current_name().to_string(),
            actions_left: self.session.action_countdown(),
            evidence: self.session.evidence().list_obtained().len(),
            end_game: self.session.end_game(),
            post_game: self.session.post_game(),
            background: self.session.background().map(str::to_string),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.session.take_notices()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// The last line the current actor said.
    pub fn last_response(&self) -> Option<&str> {
        self.session.current_actor()?.latest_response()
    }

    fn current_name(&self) -> &str {
        self.session.current_actor().map_or("", |a| a.name.as_str())
    }

    /// Get the underlying session for advanced use.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Get mutable access to the underlying session.
    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockReply, TestHarness};

    fn game(replies: Vec<MockReply>) -> HeadlessGame {
        HeadlessGame::from_session(TestHarness::with_replies(replies).session)
    }

    #[tokio::test]
    async fn test_send_records_transcript() {
        let mut game = game(vec![MockReply::say("In the hall."), MockReply::say("Yes.")]);
        game.talk_to("Leia").unwrap();
        assert_eq!(game.send("Where were you?").await.unwrap(), "In the hall.");
        // a second line continues past the first reply
        assert_eq!(game.send("Alone?").await.unwrap(), "Yes.");
        assert_eq!(game.transcript().len(), 2);
        assert_eq!(game.transcript()[0].actor, "Leia");
        assert_eq!(game.last_response(), Some("Yes."));
    }

    #[test]
    fn test_investigate_by_region_name() {
        let mut game = game(Vec::new());
        let outcome = game.investigate("Kitchen").unwrap();
        assert_eq!(outcome.granted.as_deref(), Some("03"));
        assert_eq!(game.status().background.as_deref(), Some("bg/kitchen.png"));
        assert!(game.investigate("attic").is_err());
    }

    #[test]
    fn test_status_display() {
        let game = game(Vec::new());
        let status = game.status();
        assert_eq!(status.actor, "Hiro");
        assert_eq!(
            status.to_string(),
            "talking to Hiro | 658 actions left | 2 evidence | at bg/hall.png"
        );
    }

    #[test]
    fn test_talk_to_unknown() {
        let mut game = game(Vec::new());
        assert!(matches!(
            game.talk_to("Nobody"),
            Err(SessionError::UnknownActor(_))
        ));
    }
}
