//! Per-actor dialogue box state.
//!
//! ```text
//! AwaitingInput --submit--> AnimatingTransition(Submit) --> LoadingResponse
//!       ^                                                        |
//!       |                                             reply / error
//!       |                                                        v
//!       +-- AnimatingTransition(Continue) <--continue-- DisplayingResponse
//! ```
//!
//! Cancelling a load returns to `AwaitingInput`. Replies produced by a
//! non-chat trigger (evidence, map) jump straight to `DisplayingResponse`
//! and are shown instantly.

use crate::character::ActorId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// How a displayed response is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reveal {
    Typewriter,
    Instant,
}

/// Which fixed-duration transition is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Submit,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialoguePhase {
    AwaitingInput,
    AnimatingTransition(TransitionKind),
    LoadingResponse,
    DisplayingResponse(Reveal),
}

impl DialoguePhase {
    /// Whether a chat round-trip is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            DialoguePhase::AnimatingTransition(TransitionKind::Submit) | DialoguePhase::LoadingResponse
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} while {phase:?}")]
pub struct TransitionError {
    pub phase: DialoguePhase,
    pub action: &'static str,
}

/// Dialogue state of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueState {
    phase: DialoguePhase,
    /// The player asked to continue past the last reply.
    continue_requested: bool,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self {
            phase: DialoguePhase::AwaitingInput,
            continue_requested: false,
        }
    }
}

impl DialogueState {
    /// State of an actor on (re)entry: showing their last reply unless the
    /// player already moved past it.
    pub fn resting(has_response: bool, continue_requested: bool) -> Self {
        let phase = if has_response && !continue_requested {
            DialoguePhase::DisplayingResponse(Reveal::Instant)
        } else {
            DialoguePhase::AwaitingInput
        };
        Self {
            phase,
            continue_requested,
        }
    }

    pub fn phase(&self) -> DialoguePhase {
        self.phase
    }

    pub fn continue_requested(&self) -> bool {
        self.continue_requested
    }

    fn expect(&self, ok: bool, action: &'static str) -> Result<(), TransitionError> {
        if ok {
            Ok(())
        } else {
            Err(TransitionError {
                phase: self.phase,
                action,
            })
        }
    }

    pub fn begin_submit(&mut self) -> Result<(), TransitionError> {
        self.expect(self.phase == DialoguePhase::AwaitingInput, "submit")?;
        self.phase = DialoguePhase::AnimatingTransition(TransitionKind::Submit);
        Ok(())
    }

    pub fn begin_loading(&mut self) -> Result<(), TransitionError> {
        self.expect(
            self.phase == DialoguePhase::AnimatingTransition(TransitionKind::Submit),
            "start loading",
        )?;
        self.phase = DialoguePhase::LoadingResponse;
        Ok(())
    }

    /// A chat reply arrived.
    pub fn respond(&mut self, reveal: Reveal) -> Result<(), TransitionError> {
        self.expect(self.phase == DialoguePhase::LoadingResponse, "respond")?;
        self.phase = DialoguePhase::DisplayingResponse(reveal);
        self.continue_requested = false;
        Ok(())
    }

    /// The request failed; the inline error is shown as the reply.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.expect(self.phase == DialoguePhase::LoadingResponse, "fail")?;
        self.phase = DialoguePhase::DisplayingResponse(Reveal::Instant);
        self.continue_requested = false;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.expect(self.phase.is_busy(), "cancel")?;
        self.phase = DialoguePhase::AwaitingInput;
        Ok(())
    }

    /// Show a reply produced outside of chat, without animation.
    pub fn show_trigger_response(&mut self) -> Result<(), TransitionError> {
        self.expect(!self.phase.is_busy(), "show a triggered reply")?;
        self.phase = DialoguePhase::DisplayingResponse(Reveal::Instant);
        self.continue_requested = false;
        Ok(())
    }

    pub fn begin_continue(&mut self) -> Result<(), TransitionError> {
        self.expect(
            matches!(self.phase, DialoguePhase::DisplayingResponse(_)),
            "continue",
        )?;
        self.phase = DialoguePhase::AnimatingTransition(TransitionKind::Continue);
        self.continue_requested = true;
        Ok(())
    }

    pub fn finish_continue(&mut self) -> Result<(), TransitionError> {
        self.expect(
            self.phase == DialoguePhase::AnimatingTransition(TransitionKind::Continue),
            "finish continuing",
        )?;
        self.phase = DialoguePhase::AwaitingInput;
        Ok(())
    }
}

/// Dialogue state of every actor in a session.
#[derive(Debug, Clone, Default)]
pub struct Dialogues {
    states: HashMap<ActorId, DialogueState>,
    /// Replies that already finished a typewriter reveal.
    revealed: HashSet<String>,
}

impl Dialogues {
    pub fn get(&self, actor: ActorId) -> DialogueState {
        self.states.get(&actor).copied().unwrap_or_default()
    }

    pub fn state_mut(&mut self, actor: ActorId) -> &mut DialogueState {
        self.states.entry(actor).or_default()
    }

    pub fn set(&mut self, actor: ActorId, state: DialogueState) {
        self.states.insert(actor, state);
    }

    /// Choose the reveal for a chat reply. A text revealed once before is
    /// shown instantly from then on.
    pub fn reveal_for(&mut self, text: &str, typewriter: bool) -> Reveal {
        if !typewriter || !self.revealed.insert(text.to_string()) {
            Reveal::Instant
        } else {
            Reveal::Typewriter
        }
    }

    /// Actors whose continue flag is set.
    pub fn continued(&self) -> BTreeSet<ActorId> {
        self.states
            .iter()
            .filter(|(_, s)| s.continue_requested)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Forget every phase and every finished reveal.
    pub fn clear(&mut self) {
        self.states.clear();
        self.revealed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_round_trip() {
        let mut state = DialogueState::default();
        state.begin_submit().unwrap();
        assert!(state.phase().is_busy());
        state.begin_loading().unwrap();
        state.respond(Reveal::Typewriter).unwrap();
        assert_eq!(
            state.phase(),
            DialoguePhase::DisplayingResponse(Reveal::Typewriter)
        );
        state.begin_continue().unwrap();
        assert!(state.continue_requested());
        state.finish_continue().unwrap();
        assert_eq!(state.phase(), DialoguePhase::AwaitingInput);
        assert!(state.continue_requested());
    }

    #[test]
    fn test_cannot_submit_while_loading() {
        let mut state = DialogueState::default();
        state.begin_submit().unwrap();
        state.begin_loading().unwrap();
        let err = state.begin_submit().unwrap_err();
        assert_eq!(err.phase, DialoguePhase::LoadingResponse);
    }

    #[test]
    fn test_failure_shows_instantly() {
        let mut state = DialogueState::default();
        state.begin_submit().unwrap();
        state.begin_loading().unwrap();
        state.fail().unwrap();
        assert_eq!(
            state.phase(),
            DialoguePhase::DisplayingResponse(Reveal::Instant)
        );
    }

    #[test]
    fn test_cancel_returns_to_input() {
        let mut state = DialogueState::default();
        state.begin_submit().unwrap();
        state.begin_loading().unwrap();
        state.cancel().unwrap();
        assert_eq!(state.phase(), DialoguePhase::AwaitingInput);
        assert!(state.cancel().is_err());
    }

    #[test]
    fn test_trigger_response_clears_continue() {
        let mut state = DialogueState::resting(false, true);
        assert_eq!(state.phase(), DialoguePhase::AwaitingInput);
        state.show_trigger_response().unwrap();
        assert_eq!(
            state.phase(),
            DialoguePhase::DisplayingResponse(Reveal::Instant)
        );
        assert!(!state.continue_requested());
    }

    #[test]
    fn test_resting_state() {
        assert_eq!(
            DialogueState::resting(true, false).phase(),
            DialoguePhase::DisplayingResponse(Reveal::Instant)
        );
        assert_eq!(
            DialogueState::resting(true, true).phase(),
            DialoguePhase::AwaitingInput
        );
    }

    #[test]
    fn test_reveal_once() {
        let mut dialogues = Dialogues::default();
        assert_eq!(dialogues.reveal_for("Hello.", true), Reveal::Typewriter);
        assert_eq!(dialogues.reveal_for("Hello.", true), Reveal::Instant);
        assert_eq!(dialogues.reveal_for("Other.", false), Reveal::Instant);
    }

    #[test]
    fn test_clear_forgets_reveals() {
        let mut dialogues = Dialogues::default();
        dialogues.set(ActorId(2), DialogueState::resting(true, true));
        assert_eq!(dialogues.reveal_for("Hello.", true), Reveal::Typewriter);
        dialogues.clear();
        assert_eq!(dialogues.get(ActorId(2)), DialogueState::default());
        assert_eq!(dialogues.reveal_for("Hello.", true), Reveal::Typewriter);
    }

    #[test]
    fn test_continued_set() {
        let mut dialogues = Dialogues::default();
        dialogues.set(ActorId(2), DialogueState::resting(true, true));
        dialogues.set(ActorId(3), DialogueState::resting(true, false));
        assert_eq!(dialogues.continued(), BTreeSet::from([ActorId(2)]));
    }
}
