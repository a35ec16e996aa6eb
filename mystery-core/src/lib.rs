//! Narrative and evidence engine for an AI-driven detective game.
//!
//! The player questions a roster of characters whose replies come from a
//! remote inference endpoint, collects evidence and finally names the
//! culprit. This crate owns everything between the clicks and the endpoint:
//!
//! - `evidence` - the item catalog and the paged slot grid
//! - `narrative` - per-actor context ledgers that evidence unlocks
//! - `stand` - which illustration of an actor to show
//! - `regions` - mapping pointer clicks onto screen and map hotspots
//! - `dialogue` - the dialogue box state machine
//! - `session` - the game session tying it all together
//! - `persist` - saving and restoring progress
//!
//! # Quick Start
//!
//! ```ignore
//! use mystery_core::{GameData, GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data = GameData::load("data/game.json").await?;
//!     let config = SessionConfig::from_env().with_save_path("progress.json");
//!     let mut session = GameSession::resume(data, config)?;
//!
//!     session.present("09")?;
//!     let outcome = session.send_message("Why did you buy medicine?").await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod accusation;
pub mod backend;
pub mod character;
pub mod data;
pub mod dialogue;
pub mod evidence;
pub mod headless;
pub mod narrative;
pub mod notes;
pub mod persist;
pub mod regions;
pub mod session;
pub mod stand;
pub mod testing;
pub mod typewriter;

pub use backend::Inference;
pub use invoke::API_URL_ENV;
pub use character::{Actor, ActorId, CharacterDef};
pub use data::{DataError, GameData};
pub use dialogue::{DialoguePhase, Reveal};
pub use evidence::{EvidenceItem, EvidenceRegistry, Obtain};
pub use headless::{HeadlessConfig, HeadlessGame};
pub use narrative::{Fragment, Ledger, MergeOutcome, Unlock};
pub use persist::{FileStore, MemoryStore, PersistError, ProgressSnapshot, ProgressStore};
pub use regions::{Rect, Region, RegionSet, Viewport};
pub use session::{
    CancelHandle, DialogueOutcome, GameSession, Notice, PresentOutcome, SessionConfig, SessionError,
};
pub use stand::StandVariant;
pub use testing::{MockInference, MockReply, TestHarness};
