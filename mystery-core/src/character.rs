//! Actors: the characters the player can question.

use crate::narrative::Ledger;
use invoke::{ActorPayload, Message, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an actor within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static definition of an actor, as written in the game data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDef {
    pub id: u32,
    pub name: String,
    pub bio: String,
    pub personality: String,
    pub context1: String,
    pub context2: String,
    pub context3: String,
    pub context4: String,
    pub lastcontext: String,
    pub secret: String,
    pub violation: String,
    /// Portrait file name, e.g. `leia.png`.
    pub image: String,
    /// Caption shown while a reply is loading.
    pub thinking: Option<String>,
}

/// A character in play: static identity plus mutable ledger and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub bio: String,
    pub personality: String,
    pub image: String,
    pub secret: String,
    pub violation: String,
    #[serde(flatten)]
    pub ledger: Ledger,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Actor {
    /// Create a fresh actor from its definition. Fragments the starting
    /// testimony already contains count as merged.
    pub fn from_def(def: &CharacterDef) -> Self {
        let mut ledger = Ledger::new(
            def.context1.clone(),
            def.context2.clone(),
            def.context3.clone(),
            def.context4.clone(),
            def.lastcontext.clone(),
        );
        ledger.reconcile();
        Self {
            id: ActorId(def.id),
            name: def.name.clone(),
            bio: def.bio.clone(),
            personality: def.personality.clone(),
            image: def.image.clone(),
            secret: def.secret.clone(),
            violation: def.violation.clone(),
            ledger,
            messages: Vec::new(),
        }
    }

    /// The actor as sent to the inference endpoint.
    pub fn payload(&self) -> ActorPayload {
        ActorPayload {
            name: self.name.clone(),
            bio: self.bio.clone(),
            personality: self.personality.clone(),
            context1: self.ledger.context1.clone(),
            secret: self.secret.clone(),
            violation: self.violation.clone(),
            messages: self.messages.clone(),
            hurt: None,
        }
    }

    /// The most recent assistant line, if any.
    pub fn latest_response(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn has_response(&self) -> bool {
        self.latest_response().is_some()
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }
}
