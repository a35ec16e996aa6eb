//! Game session management.
//!
//! A [`GameSession`] owns every piece of mutable game state and is driven
//! from a single task. The only suspension points are the inference call
//! and the fixed-length dialogue transitions; every mutation ends with a
//! full snapshot written to the progress store.

use crate::accusation::{AccusationError, AccusationSheet};
use crate::backend::Inference;
use crate::character::{Actor, ActorId};
use crate::data::{DataError, GameData, MapPage};
use crate::dialogue::{DialoguePhase, DialogueState, Dialogues, Reveal, TransitionError};
use crate::evidence::{EvidenceItem, EvidenceRegistry, Obtain, Pager, TOTAL_SLOTS};
use crate::narrative::MergeOutcome;
use crate::notes::Notebook;
use crate::persist::{timestamp_now, FileStore, PersistError, ProgressSnapshot, ProgressStore, SAVE_VERSION};
use crate::regions::{MapAction, ScreenAction, Viewport};
use crate::stand::{self, StandVariant};
use invoke::{InvocationRequest, InvokeClient, Message};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "MYSTERY_TIMEOUT_SECS";
/// Environment variable naming the save file.
pub const SAVE_PATH_ENV: &str = "MYSTERY_SAVE_PATH";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_TRANSITION: Duration = Duration::from_millis(500);
const DEFAULT_THINKING: &str = "Thinking";

/// Errors that can occur during a game session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Inference error: {0}")]
    Invoke(#[from] invoke::Error),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Game data error: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Dialogue(#[from] TransitionError),

    #[error(transparent)]
    Accusation(#[from] AccusationError),

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("Unknown evidence: {0}")]
    UnknownEvidence(String),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Unknown map region: {0}")]
    UnknownRegion(String),

    #[error("No evidence selected")]
    NothingSelected,

    #[error("This game has no map")]
    NoMap,

    #[error("Not available during the accusation")]
    InEndGame,

    #[error("Only available during the accusation")]
    NotInEndGame,

    #[error("The countdown has ended")]
    CountdownEnded,

    #[error("The game is over")]
    GameOver,
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inference endpoint; falls back to `MYSTERY_API_URL` when unset.
    pub api_url: Option<String>,
    /// Timeout of one inference call.
    pub timeout: Duration,
    /// Length of the dialogue box transitions.
    pub transition: Duration,
    /// Save file; progress is not persisted when unset.
    pub save_path: Option<PathBuf>,
    /// Prefix of the player's chat lines; defaults to `"<detective>: "`.
    pub player_prefix: Option<String>,
    /// Reveal chat replies character by character.
    pub typewriter: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout: DEFAULT_TIMEOUT,
            transition: DEFAULT_TRANSITION,
            save_path: None,
            player_prefix: None,
            typewriter: true,
        }
    }
}

impl SessionConfig {
    /// Create a new session config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(url) = std::env::var(invoke::API_URL_ENV) {
            config.api_url = Some(url);
        }
        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            match secs.trim().parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid {TIMEOUT_ENV}"),
            }
        }
        if let Ok(path) = std::env::var(SAVE_PATH_ENV) {
            config.save_path = Some(PathBuf::from(path));
        }
        config
    }

    /// Set the inference endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the inference timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the dialogue transition length.
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    /// Set the save file.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Set the prefix of the player's chat lines.
    pub fn with_player_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.player_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable the typewriter reveal.
    pub fn with_typewriter(mut self, enabled: bool) -> Self {
        self.typewriter = enabled;
        self
    }
}

/// Transient announcements for the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EvidenceObtained { id: String, image: String },
    TestimonyUpdated { actor: ActorId },
}

/// Which overlay is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dialogue,
    Evidence,
    Map,
}

/// Result of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueOutcome {
    Replied { text: String, reveal: Reveal },
    /// The call failed; `message` was appended to the history.
    Failed { message: String },
    /// The call was abandoned; the player's line was withdrawn.
    Cancelled,
}

/// Result of presenting evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentOutcome {
    /// The scripted reply, if the actor reacts to this item.
    pub reply: Option<String>,
    pub merge: Option<MergeOutcome>,
    /// Stand override applied by the reaction.
    pub stand: Option<StandVariant>,
    /// Evidence obtained for the first time.
    pub granted: Option<String>,
}

/// Result of an investigation on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestigateOutcome {
    pub message: String,
    pub granted: Option<String>,
}

/// Result of a click on the evidence screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenClick {
    Selected(Option<String>),
    Presented(PresentOutcome),
    Closed,
    /// A region without an effect, such as a label.
    Inert,
    Missed,
}

/// Result of a click on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapClick {
    Closed,
    SwitchedPage(String),
    Investigated(InvestigateOutcome),
    Missed,
}

/// Cancels the inference call in flight, from any task.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<u64>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// A game session.
pub struct GameSession {
    data: Arc<GameData>,
    config: SessionConfig,
    backend: Arc<dyn Inference>,
    store: Option<Box<dyn ProgressStore>>,
    cancel: Arc<watch::Sender<u64>>,

    session_id: String,
    actors: BTreeMap<ActorId, Actor>,
    current_actor: ActorId,
    evidence: EvidenceRegistry,
    dialogues: Dialogues,
    stand_override: Option<StandVariant>,
    action_countdown: u32,
    countdown_ended: bool,
    end_game: bool,
    post_game: bool,
    background: Option<String>,
    screen: Screen,
    selected_evidence: Option<String>,
    pager: Pager,
    map_page: Option<String>,
    notes: Notebook,
    accusation: AccusationSheet,
    notices: Vec<Notice>,
}

impl GameSession {
    /// Start a fresh game against the configured endpoint.
    ///
    /// Progress is saved to `config.save_path` when set.
    pub fn new(data: impl Into<Arc<GameData>>, config: SessionConfig) -> Result<Self, SessionError> {
        let client = match &config.api_url {
            Some(url) => InvokeClient::new(url.as_str())?,
            None => InvokeClient::from_env()?,
        }
        .with_timeout(config.timeout);

        let store = config.save_path.clone().map(FileStore::new);
        let mut session = Self::with_backend(data, config, Arc::new(client));
        if let Some(store) = store {
            session = session.with_store(store);
        }
        Ok(session)
    }

    /// Like [`GameSession::new`], continuing from the save file if one exists.
    pub fn resume(data: impl Into<Arc<GameData>>, config: SessionConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(data, config)?;
        session.load_saved();
        Ok(session)
    }

    /// Start a fresh game with a custom reply backend and no store.
    pub fn with_backend(
        data: impl Into<Arc<GameData>>,
        config: SessionConfig,
        backend: Arc<dyn Inference>,
    ) -> Self {
        let data = data.into();
        let (cancel, _) = watch::channel(0);
        let mut session = Self {
            data: Arc::clone(&data),
            config,
            backend,
            store: None,
            cancel: Arc::new(cancel),
            session_id: String::new(),
            actors: BTreeMap::new(),
            current_actor: data.detective,
            evidence: EvidenceRegistry::default(),
            dialogues: Dialogues::default(),
            stand_override: None,
            action_countdown: 0,
            countdown_ended: false,
            end_game: false,
            post_game: false,
            background: None,
            screen: Screen::Dialogue,
            selected_evidence: None,
            pager: Pager::default(),
            map_page: None,
            notes: Notebook::default(),
            accusation: AccusationSheet::default(),
            notices: Vec::new(),
        };
        session.start_fresh();
        session
    }

    /// Persist progress to `store` after every mutation.
    pub fn with_store(mut self, store: impl ProgressStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    fn start_fresh(&mut self) {
        let data = Arc::clone(&self.data);
        self.session_id = uuid::Uuid::new_v4().to_string();
        self.actors = data
            .characters
            .iter()
            .map(|def| {
                let actor = Actor::from_def(def);
                (actor.id, actor)
            })
            .collect();
        self.current_actor = data.detective;
        self.evidence = data.registry();
        self.dialogues = Dialogues::default();
        self.stand_override = None;
        self.action_countdown = data.action_countdown;
        self.countdown_ended = false;
        self.end_game = false;
        self.post_game = false;
        self.background = data.backgrounds.initial.clone();
        self.screen = Screen::Dialogue;
        self.selected_evidence = None;
        self.pager.reset();
        self.map_page = None;
        self.notes = Notebook::default();
        self.accusation = AccusationSheet::default();
        self.notices.clear();
    }

    /// Replace the state with the stored snapshot, if there is a readable one.
    pub fn load_saved(&mut self) -> bool {
        let Some(snapshot) = self.store.as_ref().and_then(|s| s.load()) else {
            return false;
        };
        self.restore(snapshot);
        true
    }

    /// The complete progress of this session.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            version: SAVE_VERSION,
            saved_at: timestamp_now(),
            session_id: self.session_id.clone(),
            global_story: self.data.global_story.clone(),
            actors: self.actors.clone(),
            current_actor: self.current_actor,
            evidence: self.evidence.clone(),
            action_countdown: self.action_countdown,
            countdown_ended: self.countdown_ended,
            end_game: self.end_game,
            post_game: self.post_game,
            background: self.background.clone(),
            map_page: self.map_page.clone(),
            continued: self.dialogues.continued(),
            notes: self.notes.clone(),
            accusation: self.accusation.clone(),
        }
    }

    /// Adopt a snapshot. Actors and evidence missing from it start fresh;
    /// entries no longer in the game data are dropped.
    pub fn restore(&mut self, snapshot: ProgressSnapshot) {
        let data = Arc::clone(&self.data);
        self.start_fresh();

        if !snapshot.session_id.is_empty() {
            self.session_id = snapshot.session_id;
        }
        let mut saved = snapshot.actors;
        for (id, actor) in self.actors.iter_mut() {
            if let Some(mut restored) = saved.remove(id) {
                restored.ledger.reconcile();
                *actor = restored;
            }
        }
        if self.actors.contains_key(&snapshot.current_actor) {
            self.current_actor = snapshot.current_actor;
        }
        self.evidence.restore_obtained(&snapshot.evidence);
        for (&id, actor) in &self.actors {
            let continued = snapshot.continued.contains(&id);
            self.dialogues
                .set(id, DialogueState::resting(actor.has_response(), continued));
        }
        self.action_countdown = snapshot.action_countdown;
        self.countdown_ended = snapshot.countdown_ended;
        self.end_game = snapshot.end_game;
        self.post_game = snapshot.post_game;
        if snapshot.background.is_some() {
            self.background = snapshot.background;
        }
        self.map_page = snapshot
            .map_page
            .filter(|id| data.map.page(id).is_some());
        self.notes = snapshot.notes;
        self.notes.normalize();
        self.accusation = snapshot.accusation;

        tracing::info!(
            session = %self.session_id,
            evidence = self.evidence.list_obtained().len(),
            countdown = self.action_countdown,
            "restored saved progress"
        );
    }

    /// Write the snapshot to the store.
    pub fn save(&self) -> Result<(), SessionError> {
        if let Some(store) = &self.store {
            store.save(&self.snapshot())?;
        }
        Ok(())
    }

    /// Save, logging instead of failing. Play continues without persistence.
    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "failed to save progress");
        }
    }

    /// Discard all progress and start over.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.start_fresh();
        if let Some(store) = &self.store {
            store.clear()?;
        }
        tracing::info!(session = %self.session_id, "game reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dialogue
    // ------------------------------------------------------------------

    /// A handle that cancels the inference call in flight.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Send the player's line to the current actor.
    pub async fn send_message(&mut self, text: &str) -> Result<DialogueOutcome, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.end_game {
            return Err(SessionError::InEndGame);
        }
        let line = format!("{}{}", self.player_prefix(), text);
        self.chat(self.current_actor, line).await
    }

    /// One chat turn. The turn is staged on a copy of the dialogue state and
    /// only committed once the reply settles, so a caller that drops this
    /// future leaves the session as it was.
    async fn chat(&mut self, actor_id: ActorId, line: String) -> Result<DialogueOutcome, SessionError> {
        let mut cancelled = self.cancel.subscribe();

        let mut request = self.request_for(actor_id)?;
        let mut state = self.dialogues.get(actor_id);
        state.begin_submit()?;
        request.actor.messages.push(Message::user(line.clone()));

        tokio::time::sleep(self.config.transition).await;
        state.begin_loading()?;

        let backend = Arc::clone(&self.backend);
        let timeout = self.config.timeout;
        tracing::debug!(actor = %actor_id, "awaiting reply");

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, backend.invoke(&request)) => Some(result),
            _ = cancelled.changed() => None,
        };

        let Some(result) = result else {
            state.cancel()?;
            self.dialogues.set(actor_id, state);
            tracing::info!(actor = %actor_id, "reply cancelled");
            return Ok(DialogueOutcome::Cancelled);
        };
        self.push_message(actor_id, Message::user(line));

        let response = match result {
            Ok(response) => response,
            Err(_) => Err(invoke::Error::Timeout(timeout)),
        };

        match response {
            Ok(response) => {
                let text = response.final_response;
                self.push_message(actor_id, Message::assistant(text.clone()));
                let reveal = self.dialogues.reveal_for(&text, self.config.typewriter);
                state.respond(reveal)?;
                self.dialogues.set(actor_id, state);
                self.apply_keywords(actor_id, &text);
                self.spend_action();
                self.persist();
                Ok(DialogueOutcome::Replied { text, reveal })
            }
            Err(e) => {
                tracing::warn!(actor = %actor_id, error = %e, "inference failed");
                let message = format!("Error: {e}");
                self.push_message(actor_id, Message::assistant(message.clone()));
                state.fail()?;
                self.dialogues.set(actor_id, state);
                self.persist();
                Ok(DialogueOutcome::Failed { message })
            }
        }
    }

    fn request_for(&self, actor_id: ActorId) -> Result<InvocationRequest, SessionError> {
        let actor = self
            .actors
            .get(&actor_id)
            .ok_or_else(|| SessionError::UnknownActor(actor_id.to_string()))?;
        Ok(InvocationRequest {
            global_story: self.data.global_story.clone(),
            actor: actor.payload(),
            session_id: self.session_id.clone(),
            character_file_version: self.data.file_key.clone(),
        })
    }

    fn push_message(&mut self, actor_id: ActorId, message: Message) {
        if let Some(actor) = self.actors.get_mut(&actor_id) {
            actor.messages.push(message);
        }
    }

    fn player_prefix(&self) -> String {
        self.config
            .player_prefix
            .clone()
            .unwrap_or_else(|| format!("{}: ", self.data.player_name()))
    }

    fn apply_keywords(&mut self, actor_id: ActorId, text: &str) {
        let data = Arc::clone(&self.data);
        let Some(actor) = self.actors.get(&actor_id) else {
            return;
        };
        let Some(rule) = data.keyword_rule(&actor.name) else {
            return;
        };
        if rule.matches(text) {
            tracing::debug!(actor = %actor_id, evidence = %rule.evidence_id, "keyword matched");
            self.obtain(&rule.evidence_id);
        }
    }

    /// Move the current actor's dialogue box past their last reply.
    /// Committed only after the transition, like a chat turn.
    pub async fn request_continue(&mut self) -> Result<(), SessionError> {
        let id = self.current_actor;
        let mut state = self.dialogues.get(id);
        state.begin_continue()?;
        tokio::time::sleep(self.config.transition).await;
        state.finish_continue()?;
        self.dialogues.set(id, state);
        self.persist();
        Ok(())
    }

    /// Switch the dialogue to another actor.
    pub fn select_actor(&mut self, id: ActorId) -> Result<(), SessionError> {
        if !self.actors.contains_key(&id) {
            return Err(SessionError::UnknownActor(id.to_string()));
        }
        self.current_actor = id;
        self.stand_override = None;
        self.persist();
        Ok(())
    }

    /// Look an actor up by name.
    pub fn actor_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors
            .values()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    // ------------------------------------------------------------------
    // Evidence
    // ------------------------------------------------------------------

    fn obtain(&mut self, id: &str) -> Option<String> {
        if self.evidence.obtain(id) != Obtain::Newly {
            return None;
        }
        let image = self
            .evidence
            .get(id)
            .map(|item| item.image.clone())
            .unwrap_or_default();
        self.notify(Notice::EvidenceObtained {
            id: id.to_string(),
            image,
        });
        Some(id.to_string())
    }

    /// Give the player an item outside of any reaction. Returns whether it
    /// was new.
    pub fn obtain_evidence(&mut self, id: &str) -> Result<bool, SessionError> {
        if self.evidence.get(id).is_none() {
            return Err(SessionError::UnknownEvidence(id.to_string()));
        }
        let newly = self.obtain(id).is_some();
        if newly {
            self.persist();
        }
        Ok(newly)
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::EvidenceObtained { .. } => {
                self.notices
                    .retain(|n| !matches!(n, Notice::TestimonyUpdated { .. }));
            }
            Notice::TestimonyUpdated { .. } => {
                if self
                    .notices
                    .iter()
                    .any(|n| matches!(n, Notice::EvidenceObtained { .. }))
                {
                    return;
                }
            }
        }
        self.notices.push(notice);
    }

    /// Drain pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn open_evidence(&mut self) {
        self.screen = Screen::Evidence;
        self.selected_evidence = None;
        self.pager.reset();
    }

    pub fn close_evidence(&mut self) {
        if self.screen == Screen::Evidence {
            self.screen = Screen::Dialogue;
        }
        self.selected_evidence = None;
    }

    /// Items shown in each of the twelve slots.
    pub fn evidence_slots(&self) -> [Option<&EvidenceItem>; TOTAL_SLOTS] {
        let obtained = self.evidence.list_obtained();
        let layout = self.pager.layout(obtained.len());
        layout.map(|index| index.and_then(|i| obtained.get(i).copied()))
    }

    /// Select the item in `slot`; an empty slot clears the selection.
    pub fn select_slot(&mut self, slot: usize) -> Option<&EvidenceItem> {
        let id = self.evidence_slots().get(slot).copied().flatten().map(|item| item.id.clone());
        self.selected_evidence = id;
        self.selected_evidence()
    }

    pub fn evidence_page_left(&mut self) -> bool {
        let obtained = self.evidence.list_obtained().len();
        self.pager.page_left(obtained)
    }

    pub fn evidence_page_right(&mut self) -> bool {
        let obtained = self.evidence.list_obtained().len();
        self.pager.page_right(obtained)
    }

    /// Handle a click on the evidence screen.
    pub fn click_evidence_screen(
        &mut self,
        viewport: &Viewport,
        x: f64,
        y: f64,
    ) -> Result<ScreenClick, SessionError> {
        let Some(region) = self.data.evidence_screen.hit(viewport, x, y) else {
            return Ok(ScreenClick::Missed);
        };
        tracing::debug!(region = %region.name, "evidence screen click");
        let action = region.action;
        match action {
            ScreenAction::Slot(slot) => {
                let selected = self.select_slot(slot).map(|item| item.id.clone());
                Ok(ScreenClick::Selected(selected))
            }
            ScreenAction::Present => {
                if self.selected_evidence.is_none() {
                    return Ok(ScreenClick::Inert);
                }
                self.present_selected().map(ScreenClick::Presented)
            }
            ScreenAction::Close => {
                self.close_evidence();
                Ok(ScreenClick::Closed)
            }
            ScreenAction::Preview | ScreenAction::NameLabel | ScreenAction::DescriptionLabel => {
                Ok(ScreenClick::Inert)
            }
        }
    }

    /// Present the selected item to the current actor.
    pub fn present_selected(&mut self) -> Result<PresentOutcome, SessionError> {
        let id = self
            .selected_evidence
            .clone()
            .ok_or(SessionError::NothingSelected)?;
        self.present(&id)
    }

    /// Present an item to the current actor.
    ///
    /// A configured reaction appends the exchange to the history, may merge
    /// a narrative fragment, switch the stand and grant further evidence.
    /// Presenting always costs an action and closes the evidence screen.
    pub fn present(&mut self, evidence_id: &str) -> Result<PresentOutcome, SessionError> {
        if self.end_game {
            return Err(SessionError::InEndGame);
        }
        let item_name = self
            .evidence
            .get(evidence_id)
            .map(|item| item.name.clone())
            .ok_or_else(|| SessionError::UnknownEvidence(evidence_id.to_string()))?;
        let actor_id = self.current_actor;
        if self.dialogues.get(actor_id).phase().is_busy() {
            return Err(TransitionError {
                phase: self.dialogues.get(actor_id).phase(),
                action: "present evidence",
            }
            .into());
        }

        let data = Arc::clone(&self.data);
        let actor_name = self
            .actors
            .get(&actor_id)
            .map(|a| a.name.clone())
            .ok_or_else(|| SessionError::UnknownActor(actor_id.to_string()))?;

        let mut outcome = PresentOutcome {
            reply: None,
            merge: None,
            stand: None,
            granted: None,
        };

        if let Some(reply) = data.presentation(&actor_name, evidence_id) {
            tracing::info!(actor = %actor_name, evidence = evidence_id, "evidence presented");
            let unlock = data.unlock(&actor_name, evidence_id);

            if let Some(actor) = self.actors.get_mut(&actor_id) {
                actor.messages.push(Message::user(data.present_line(&item_name)));
                actor.messages.push(Message::assistant(reply));
                if let Some(fragment) = unlock.and_then(|u| u.fragment()) {
                    let merge = actor.ledger.merge(fragment);
                    outcome.merge = Some(merge);
                    if merge.appended() {
                        tracing::info!(actor = %actor_name, fragment = fragment.key(), "testimony updated");
                    }
                }
            }
            self.dialogues.state_mut(actor_id).show_trigger_response()?;

            let variant = StandVariant::from_unlock(unlock);
            self.stand_override = Some(variant);
            outcome.stand = Some(variant);
            outcome.reply = Some(reply.to_string());

            if outcome.merge.is_some_and(MergeOutcome::appended) {
                self.notify(Notice::TestimonyUpdated { actor: actor_id });
            }
            if let Some(granted) = data.grant(&actor_name, evidence_id) {
                outcome.granted = self.obtain(granted);
            }
        } else {
            tracing::debug!(actor = %actor_name, evidence = evidence_id, "no reaction to evidence");
        }

        self.close_evidence();
        self.spend_action();
        self.persist();
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Map
    // ------------------------------------------------------------------

    /// Open the map on the last viewed page, or the default one.
    pub fn open_map(&mut self) -> Result<&MapPage, SessionError> {
        let data = Arc::clone(&self.data);
        let page = self
            .map_page
            .as_deref()
            .and_then(|id| data.map.page(id))
            .or_else(|| data.map.first_page())
            .ok_or(SessionError::NoMap)?;
        self.map_page = Some(page.id.clone());
        self.screen = Screen::Map;
        self.current_map_page().ok_or(SessionError::NoMap)
    }

    pub fn close_map(&mut self) {
        if self.screen == Screen::Map {
            self.screen = Screen::Dialogue;
        }
    }

    pub fn map_page_left(&mut self) -> Option<&MapPage> {
        self.cycle_map_page(false)
    }

    pub fn map_page_right(&mut self) -> Option<&MapPage> {
        self.cycle_map_page(true)
    }

    fn cycle_map_page(&mut self, forward: bool) -> Option<&MapPage> {
        let pages = self.data.map.pages.len();
        if pages == 0 {
            return None;
        }
        let current = self
            .map_page
            .as_deref()
            .and_then(|id| self.data.map.position(id))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % pages
        } else {
            (current + pages - 1) % pages
        };
        self.map_page = Some(self.data.map.pages[next].id.clone());
        self.persist();
        self.current_map_page()
    }

    pub fn current_map_page(&self) -> Option<&MapPage> {
        self.map_page.as_deref().and_then(|id| self.data.map.page(id))
    }

    /// Handle a click on the open map.
    pub fn click_map(&mut self, viewport: &Viewport, x: f64, y: f64) -> Result<MapClick, SessionError> {
        let page = self.current_map_page().ok_or(SessionError::NoMap)?;
        let Some(region) = page.regions.hit(viewport, x, y) else {
            return Ok(MapClick::Missed);
        };
        tracing::debug!(page = %page.id, region = %region.name, "map click");
        match region.action.clone() {
            MapAction::Close => {
                self.close_map();
                Ok(MapClick::Closed)
            }
            MapAction::SwitchPage { page } => {
                self.map_page = Some(page.clone());
                self.persist();
                Ok(MapClick::SwitchedPage(page))
            }
            MapAction::Investigate {
                message,
                obtain,
                background,
            } => self
                .investigate(&message, obtain.as_deref(), background.as_deref())
                .map(MapClick::Investigated),
        }
    }

    /// Investigate a spot: the detective narrates `message`, optionally
    /// finding evidence and moving to a new background.
    pub fn investigate(
        &mut self,
        message: &str,
        obtain: Option<&str>,
        background: Option<&str>,
    ) -> Result<InvestigateOutcome, SessionError> {
        if self.end_game {
            return Err(SessionError::InEndGame);
        }
        let detective = self.data.detective;
        if !self.actors.contains_key(&detective) {
            return Err(SessionError::UnknownActor(detective.to_string()));
        }

        let granted = obtain.and_then(|id| self.obtain(id));
        self.close_map();
        if let Some(background) = background {
            self.background = Some(background.to_string());
        }

        self.current_actor = detective;
        self.stand_override = None;
        self.push_message(detective, Message::assistant(message));
        self.dialogues.state_mut(detective).show_trigger_response()?;

        tracing::info!(granted = ?granted, "investigated");
        self.spend_action();
        self.persist();
        Ok(InvestigateOutcome {
            message: message.to_string(),
            granted,
        })
    }

    // ------------------------------------------------------------------
    // Countdown and accusation
    // ------------------------------------------------------------------

    /// Spend one action. Running out forces the accusation.
    pub fn spend_action(&mut self) {
        if self.post_game {
            return;
        }
        self.action_countdown = self.action_countdown.saturating_sub(1);
        if self.action_countdown == 0 && !self.countdown_ended && !self.end_game {
            tracing::info!("out of actions");
            self.countdown_ended = true;
            if let Some(end) = &self.data.backgrounds.end {
                self.background = Some(end.clone());
            }
            self.current_actor = self.data.detective;
            self.stand_override = None;
            self.close_evidence();
            self.close_map();
            self.end_game = true;
        }
    }

    /// Begin the accusation voluntarily.
    pub fn enter_end_game(&mut self) -> Result<(), SessionError> {
        if self.post_game {
            return Err(SessionError::GameOver);
        }
        self.end_game = true;
        self.close_evidence();
        self.close_map();
        self.persist();
        Ok(())
    }

    /// Back out of the accusation, while actions remain.
    pub fn resume_game(&mut self) -> Result<(), SessionError> {
        if !self.end_game {
            return Err(SessionError::NotInEndGame);
        }
        if self.countdown_ended {
            return Err(SessionError::CountdownEnded);
        }
        self.end_game = false;
        self.persist();
        Ok(())
    }

    /// Answer the current accusation question.
    pub fn choose_answer(&mut self, option: usize) -> Result<(), SessionError> {
        if !self.end_game {
            return Err(SessionError::NotInEndGame);
        }
        self.accusation.choose(&self.data.accusation, option)?;
        self.persist();
        Ok(())
    }

    /// Submit the completed accusation.
    ///
    /// Every history is cleared and the game moves to its epilogue. With a
    /// reveal actor configured, the deduction is sent to them as a chat
    /// turn and its outcome returned.
    pub async fn submit_accusation(&mut self) -> Result<Option<DialogueOutcome>, SessionError> {
        if !self.end_game {
            return Err(SessionError::NotInEndGame);
        }
        let data = Arc::clone(&self.data);
        let deduction = self.accusation.compose_deduction(&data.accusation)?;

        for actor in self.actors.values_mut() {
            actor.clear_history();
        }
        self.dialogues.clear();
        self.stand_override = None;
        self.end_game = false;
        self.post_game = true;
        tracing::info!(answers = ?self.accusation.answers(), "accusation submitted");
        self.persist();

        let Some(reveal) = &data.accusation.reveal else {
            return Ok(None);
        };
        if !self.actors.contains_key(&reveal.actor) {
            return Err(SessionError::UnknownActor(reveal.actor.to_string()));
        }
        self.current_actor = reveal.actor;
        self.chat(reveal.actor, deduction).await.map(Some)
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn add_note(&mut self) -> u32 {
        let id = self.notes.add();
        self.persist();
        id
    }

    pub fn update_note(&mut self, id: u32, content: impl Into<String>) -> bool {
        let updated = self.notes.update(id, content);
        if updated {
            self.persist();
        }
        updated
    }

    pub fn delete_note(&mut self, id: u32) -> bool {
        let deleted = self.notes.delete(id);
        if deleted {
            self.persist();
        }
        deleted
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn current_actor_id(&self) -> ActorId {
        self.current_actor
    }

    pub fn current_actor(&self) -> Option<&Actor> {
        self.actors.get(&self.current_actor)
    }

    pub fn evidence(&self) -> &EvidenceRegistry {
        &self.evidence
    }

    pub fn selected_evidence(&self) -> Option<&EvidenceItem> {
        self.selected_evidence
            .as_deref()
            .and_then(|id| self.evidence.get(id))
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn dialogue(&self, id: ActorId) -> DialogueState {
        self.dialogues.get(id)
    }

    /// Phase of the current actor's dialogue box.
    pub fn phase(&self) -> DialoguePhase {
        self.dialogues.get(self.current_actor).phase()
    }

    /// Loading caption of the current actor.
    pub fn thinking_caption(&self) -> &str {
        self.data
            .character(self.current_actor)
            .and_then(|c| c.thinking.as_deref())
            .unwrap_or(DEFAULT_THINKING)
    }

    pub fn stand_variant(&self) -> StandVariant {
        self.current_actor()
            .map_or(StandVariant::Base, |a| stand::select(&a.ledger, self.stand_override))
    }

    /// Path of the current actor's stand illustration, if they have one.
    pub fn stand_image(&self) -> Option<String> {
        let actor = self.current_actor()?;
        if actor.image.is_empty() {
            return None;
        }
        Some(stand::stand_path(&actor.image, self.stand_variant()))
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn action_countdown(&self) -> u32 {
        self.action_countdown
    }

    pub fn countdown_ended(&self) -> bool {
        self.countdown_ended
    }

    pub fn end_game(&self) -> bool {
        self.end_game
    }

    pub fn post_game(&self) -> bool {
        self.post_game
    }

    pub fn notes(&self) -> &Notebook {
        &self.notes
    }

    pub fn accusation(&self) -> &AccusationSheet {
        &self.accusation
    }
}
