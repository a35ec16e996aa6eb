//! Testing utilities for the mystery engine.
//!
//! This module provides tools for integration testing:
//! - `MockInference` for deterministic replies without an endpoint
//! - `sample_game_data` for a small but complete case
//! - `TestHarness` for scripted game scenarios
//! - Assertion helpers for verifying game state

use crate::backend::Inference;
use crate::character::ActorId;
use crate::data::GameData;
use crate::dialogue::DialoguePhase;
use crate::persist::MemoryStore;
use crate::session::{DialogueOutcome, GameSession, PresentOutcome, SessionConfig, SessionError};
use crate::stand::StandVariant;
use async_trait::async_trait;
use invoke::{InvocationRequest, InvocationResponse, Role};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A scripted reply from the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with this text.
    Say(String),
    /// Fail as an HTTP error would.
    Fail { status: u16, message: String },
    /// Never answer.
    Hang,
}

impl MockReply {
    pub fn say(text: impl Into<String>) -> Self {
        MockReply::Say(text.into())
    }
}

/// A backend that returns scripted replies in order and records requests.
///
/// Once the script runs out every call gets a generic line.
#[derive(Debug, Default)]
pub struct MockInference {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl MockInference {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another reply.
    pub fn push(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<InvocationRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<InvocationRequest> {
        lock(&self.requests).last().cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Inference for MockInference {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, invoke::Error> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(MockReply::Say(text)) => Ok(InvocationResponse::unrefined(text)),
            Some(MockReply::Fail { status, message }) => Err(invoke::Error::Api { status, message }),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(InvocationResponse::unrefined("I have nothing more to say.")),
        }
    }
}

/// A small case: a detective, three suspects, twelve items and two floors.
pub fn sample_game_data() -> GameData {
    let value = json!({
        "global_story": "A storm has cut the manor off from the mainland. The host lies dead in the library.",
        "file_key": "test",
        "detective": 1,
        "characters": [
            {
                "id": 1,
                "name": "Hiro",
                "bio": "A student detective.",
                "personality": "Calm",
                "context1": "I arrived at the manor last night.",
                "image": "hiro.png",
                "thinking": "Recalling"
            },
            {
                "id": 2,
                "name": "Leia",
                "bio": "An actress.",
                "personality": "Dramatic",
                "context1": "I was rehearsing in the hall all evening.",
                "context2": "I saw a light in the library at midnight.",
                "context3": "I bought sleeping medicine in town.",
                "context4": "The sword on the wall belonged to my family.",
                "lastcontext": "I moved the body to protect my sister.",
                "secret": "She moved the body.",
                "image": "leia.png",
                "thinking": "Acting"
            },
            {
                "id": 3,
                "name": "Anan",
                "bio": "A quiet writer.",
                "personality": "Shy",
                "context1": "I only write in my notebook.",
                "image": "anan.png"
            },
            {
                "id": 4,
                "name": "Margo",
                "bio": "The butler.",
                "personality": "Stern",
                "context1": "I served tea at nine.",
                "image": "margo.jpg"
            }
        ],
        "evidence": [
            {"id": "01", "name": "Sword", "description": "A ceremonial sword.", "image": "01.png", "obtained": true},
            {"id": "02", "name": "Candle", "description": "Burnt to the stub.", "image": "02.png"},
            {"id": "03", "name": "Teacup", "description": "Still warm.", "image": "03.png"},
            {"id": "04", "name": "Crest", "description": "A family crest.", "image": "04.png", "obtained": true},
            {"id": "05", "name": "Library key", "description": "Brass key.", "image": "05.png"},
            {"id": "06", "name": "Notebook", "description": "Anan's notebook.", "image": "06.png"},
            {"id": "07", "name": "Torn page", "description": "From a diary.", "image": "07.png"},
            {"id": "08", "name": "Bloody glove", "description": "Left hand.", "image": "08.png"},
            {"id": "09", "name": "Receipt", "description": "For sleeping medicine.", "image": "09.png"},
            {"id": "10", "name": "Photograph", "description": "Two sisters.", "image": "10.png"},
            {"id": "11", "name": "Letter", "description": "Unsigned.", "image": "11.png"},
            {"id": "12", "name": "Map", "description": "Of the manor.", "image": "12.png"}
        ],
        "presentations": {
            "Leia": {
                "01": "A sword? Every manor has one.",
                "02": "Fine. I saw a light in the library.",
                "04": "That crest... it is my family's.",
                "08": "...I moved him. I had to.",
                "09": "That receipt proves nothing! ...I bought medicine, yes."
            }
        },
        "unlocks": {
            "Leia": {
                "01": false,
                "02": "context2",
                "04": "context4",
                "08": "lastcontext",
                "09": "context3"
            }
        },
        "grants": {
            "Leia": {"02": "05"}
        },
        "keywords": {
            "Anan": {"keywords": ["Notebook"], "evidence_id": "06"}
        },
        "map": {
            "default_page": "1f",
            "pages": [
                {
                    "id": "2f",
                    "image": "map/2f.png",
                    "regions": [
                        {"name": "stairs", "rect": {"x1": 0, "y1": 0, "x2": 100, "y2": 100},
                         "action": {"type": "switch_page", "page": "1f"}},
                        {"name": "library", "rect": {"x1": 200, "y1": 200, "x2": 400, "y2": 400},
                         "action": {"type": "investigate", "message": "A page was torn from the diary.",
                                    "obtain": "07", "background": "bg/library.png"}}
                    ]
                },
                {
                    "id": "1f",
                    "image": "map/1f.png",
                    "regions": [
                        {"name": "stairs", "rect": {"x1": 0, "y1": 0, "x2": 100, "y2": 100},
                         "action": {"type": "switch_page", "page": "2f"}},
                        {"name": "close", "rect": {"x1": 1800, "y1": 0, "x2": 1919, "y2": 100},
                         "action": {"type": "close"}},
                        {"name": "kitchen", "rect": {"x1": 500, "y1": 500, "x2": 700, "y2": 700},
                         "action": {"type": "investigate", "message": "A teacup, still warm.",
                                    "obtain": "03", "background": "bg/kitchen.png"}},
                        {"name": "garden", "rect": {"x1": 800, "y1": 500, "x2": 1000, "y2": 700},
                         "action": {"type": "investigate", "message": "Only rain."}}
                    ]
                }
            ]
        },
        "backgrounds": {"initial": "bg/hall.png", "end": "bg/end.png"},
        "accusation": {
            "questions": [
                {"prompt": "Who moved the body?", "options": ["Leia", "Anan", "Margo"]},
                {"prompt": "Where was the host killed?", "options": ["Library", "Kitchen"]}
            ],
            "reveal": {"actor": 4, "preamble": "I know what happened."}
        }
    });
    serde_json::from_value(value).unwrap_or_else(|e| panic!("sample game data is invalid: {e}"))
}

/// A test harness for scripted scenarios.
///
/// Transitions take no time and progress goes to an in-memory store.
pub struct TestHarness {
    pub session: GameSession,
    pub backend: Arc<MockInference>,
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a harness over the sample game.
    pub fn new() -> Self {
        Self::with_data(sample_game_data(), Vec::new())
    }

    /// Create a harness with scripted replies.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self::with_data(sample_game_data(), replies)
    }

    pub fn with_data(data: GameData, replies: Vec<MockReply>) -> Self {
        let backend = Arc::new(MockInference::new(replies));
        let store = Arc::new(MemoryStore::new());
        let session = GameSession::with_backend(data, Self::config(), backend.clone())
            .with_store(Arc::clone(&store));
        Self {
            session,
            backend,
            store,
        }
    }

    pub fn config() -> SessionConfig {
        SessionConfig::new()
            .with_transition(Duration::ZERO)
            .with_timeout(Duration::from_secs(5))
    }

    /// A second session over the same store, as after a restart.
    pub fn reload(&self) -> GameSession {
        let mut session = GameSession::with_backend(
            self.session.data().clone(),
            Self::config(),
            self.backend.clone(),
        )
        .with_store(Arc::clone(&self.store));
        session.load_saved();
        session
    }

    /// Switch to the named actor.
    pub fn talk_to(&mut self, name: &str) -> ActorId {
        let id = self
            .session
            .actor_by_name(name)
            .map(|a| a.id)
            .unwrap_or_else(|| panic!("no actor named {name}"));
        self.session
            .select_actor(id)
            .unwrap_or_else(|e| panic!("cannot select {name}: {e}"));
        id
    }

    /// Send a line, continuing past the last reply first if needed.
    pub async fn say(&mut self, text: &str) -> Result<DialogueOutcome, SessionError> {
        if matches!(self.session.phase(), DialoguePhase::DisplayingResponse(_)) {
            self.session.request_continue().await?;
        }
        self.session.send_message(text).await
    }

    pub fn present(&mut self, evidence_id: &str) -> PresentOutcome {
        self.session
            .present(evidence_id)
            .unwrap_or_else(|e| panic!("presenting {evidence_id} failed: {e}"))
    }

    pub fn give(&mut self, ids: &[&str]) {
        for id in ids {
            self.session
                .obtain_evidence(id)
                .unwrap_or_else(|e| panic!("cannot obtain {id}: {e}"));
        }
    }

    pub fn actor_id(&self, name: &str) -> ActorId {
        self.session
            .actor_by_name(name)
            .map(|a| a.id)
            .unwrap_or_else(|| panic!("no actor named {name}"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert that an actor's `context1` contains `text` exactly once.
#[track_caller]
pub fn assert_context_contains_once(session: &GameSession, actor: ActorId, text: &str) {
    let context = &session
        .actor(actor)
        .unwrap_or_else(|| panic!("no actor {actor}"))
        .ledger
        .context1;
    let count = context.matches(text).count();
    assert_eq!(
        count, 1,
        "expected {text:?} exactly once in context1, found {count} times:\n{context}"
    );
}

/// Assert that an actor's `context1` does not contain `text`.
#[track_caller]
pub fn assert_context_lacks(session: &GameSession, actor: ActorId, text: &str) {
    let context = &session
        .actor(actor)
        .unwrap_or_else(|| panic!("no actor {actor}"))
        .ledger
        .context1;
    assert!(
        !context.contains(text),
        "expected {text:?} to be absent from context1:\n{context}"
    );
}

/// Assert that an item is obtained.
#[track_caller]
pub fn assert_obtained(session: &GameSession, id: &str) {
    assert!(
        session.evidence().is_obtained(id),
        "expected evidence {id} to be obtained, have {:?}",
        session.evidence().obtained_ids()
    );
}

/// Assert that an item is not obtained.
#[track_caller]
pub fn assert_not_obtained(session: &GameSession, id: &str) {
    assert!(
        !session.evidence().is_obtained(id),
        "expected evidence {id} not to be obtained"
    );
}

/// Assert the current stand variant.
#[track_caller]
pub fn assert_stand(session: &GameSession, expected: StandVariant) {
    assert_eq!(session.stand_variant(), expected, "unexpected stand variant");
}

/// Assert the role and text of an actor's last message.
#[track_caller]
pub fn assert_last_message(session: &GameSession, actor: ActorId, role: Role, content: &str) {
    let last = session
        .actor(actor)
        .and_then(|a| a.messages.last())
        .unwrap_or_else(|| panic!("actor {actor} has no messages"));
    assert_eq!(last.role, role, "unexpected role of last message");
    assert_eq!(last.content, content, "unexpected last message");
}
