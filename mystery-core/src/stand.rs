//! Stand illustration variant selection.

use crate::narrative::{Fragment, Ledger, Unlock};
use serde::{Deserialize, Serialize};

const STAND_DIR: &str = "character_stand";
const STAND_EXT: &str = "webp";
const IMAGE_EXTS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// Which illustration of an actor to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandVariant {
    Base,
    Two,
    Three,
    Four,
    Last,
}

impl StandVariant {
    pub const ALL: [StandVariant; 5] = [
        StandVariant::Base,
        StandVariant::Two,
        StandVariant::Three,
        StandVariant::Four,
        StandVariant::Last,
    ];

    /// File name suffix of this variant.
    pub fn suffix(self) -> &'static str {
        match self {
            StandVariant::Base => "",
            StandVariant::Two => "_2",
            StandVariant::Three => "_3",
            StandVariant::Four => "_4",
            StandVariant::Last => "_l",
        }
    }

    pub fn from_fragment(fragment: Fragment) -> Self {
        match fragment {
            Fragment::Context2 => StandVariant::Two,
            Fragment::Context3 => StandVariant::Three,
            Fragment::Context4 => StandVariant::Four,
            Fragment::Last => StandVariant::Last,
        }
    }

    /// The variant an unlock entry points at; `false` maps to the base.
    pub fn from_unlock(unlock: Option<Unlock>) -> Self {
        unlock
            .and_then(Unlock::fragment)
            .map_or(StandVariant::Base, Self::from_fragment)
    }
}

/// Pick the variant for a ledger.
///
/// An explicit override wins. Otherwise a merged final fragment shows `_l`,
/// then the most recently merged of `_2/_3/_4`, then the base image.
pub fn select(ledger: &Ledger, forced: Option<StandVariant>) -> StandVariant {
    if let Some(variant) = forced {
        return variant;
    }
    if ledger.is_merged(Fragment::Last) {
        return StandVariant::Last;
    }
    ledger
        .merged()
        .iter()
        .rev()
        .find(|&&f| f != Fragment::Last)
        .map_or(StandVariant::Base, |&f| StandVariant::from_fragment(f))
}

/// Image name without its raster extension.
pub fn base_name(image: &str) -> &str {
    let lower = image.to_ascii_lowercase();
    IMAGE_EXTS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(image, |ext| &image[..image.len() - ext.len()])
}

/// Path of the stand illustration for `image` in `variant`.
pub fn stand_path(image: &str, variant: StandVariant) -> String {
    format!(
        "{STAND_DIR}/{}{}.{STAND_EXT}",
        base_name(image),
        variant.suffix()
    )
}

/// Every variant path for `image`, base first.
pub fn stand_paths(image: &str) -> Vec<String> {
    StandVariant::ALL
        .iter()
        .map(|&v| stand_path(image, v))
        .collect()
}
