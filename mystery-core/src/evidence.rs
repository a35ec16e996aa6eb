//! Evidence catalog and the paged slot grid of the evidence screen.

use serde::{Deserialize, Serialize};

/// A collectible item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub obtained: bool,
}

impl EvidenceItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: image.into(),
            obtained: false,
        }
    }
}

/// Result of [`EvidenceRegistry::obtain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obtain {
    /// The item was not held before.
    Newly,
    /// The item was already held; nothing changed.
    Already,
    /// No item has that id.
    Unknown,
}

/// The static catalog plus which items the player holds.
///
/// Items are only ever gained, never lost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRegistry {
    items: Vec<EvidenceItem>,
}

impl EvidenceRegistry {
    pub fn new(items: Vec<EvidenceItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn by_image(&self, image: &str) -> Option<&EvidenceItem> {
        self.items.iter().find(|item| item.image == image)
    }

    /// Mark an item obtained. Safe to call repeatedly.
    pub fn obtain(&mut self, id: &str) -> Obtain {
        match self.items.iter_mut().find(|item| item.id == id) {
            None => {
                tracing::warn!(evidence = id, "attempted to obtain unknown evidence");
                Obtain::Unknown
            }
            Some(item) if item.obtained => Obtain::Already,
            Some(item) => {
                item.obtained = true;
                tracing::info!(evidence = id, name = %item.name, "evidence obtained");
                Obtain::Newly
            }
        }
    }

    pub fn is_obtained(&self, id: &str) -> bool {
        self.get(id).is_some_and(|item| item.obtained)
    }

    /// Obtained items, sorted by id.
    pub fn list_obtained(&self) -> Vec<&EvidenceItem> {
        let mut obtained: Vec<_> = self.items.iter().filter(|i| i.obtained).collect();
        obtained.sort_by(|a, b| a.id.cmp(&b.id));
        obtained
    }

    pub fn obtained_ids(&self) -> Vec<String> {
        self.list_obtained()
            .into_iter()
            .map(|i| i.id.clone())
            .collect()
    }

    /// Adopt the obtained flags of a saved registry for items that still exist.
    pub fn restore_obtained(&mut self, saved: &EvidenceRegistry) {
        for item in &mut self.items {
            item.obtained = saved.is_obtained(&item.id);
        }
    }
}

/// Slots in the main row of the grid.
pub const PRIMARY_SLOTS: usize = 10;
/// Slots including the two overflow slots at either edge.
pub const TOTAL_SLOTS: usize = PRIMARY_SLOTS + 2;

/// Paging state of the evidence grid.
///
/// At offset 0, slots 1..=10 show the first ten items and the edge slots
/// stay empty. At offset `p > 0`, slot 0 pins the first item, slots 1..=10
/// show items `p..p+10` and slot 11 previews item `p+10`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    offset: usize,
}

impl Pager {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Index into the obtained list shown in `slot`, if any.
    pub fn slot_index(&self, slot: usize, obtained: usize) -> Option<usize> {
        let index = match slot {
            0 if self.offset > 0 => 0,
            0 => return None,
            s if s <= PRIMARY_SLOTS => self.offset + s - 1,
            s if s == TOTAL_SLOTS - 1 && self.offset > 0 => self.offset + PRIMARY_SLOTS,
            _ => return None,
        };
        (index < obtained).then_some(index)
    }

    /// Contents of every slot.
    pub fn layout(&self, obtained: usize) -> [Option<usize>; TOTAL_SLOTS] {
        std::array::from_fn(|slot| self.slot_index(slot, obtained))
    }

    pub fn can_page_left(&self, obtained: usize) -> bool {
        obtained > PRIMARY_SLOTS && self.offset > 0
    }

    pub fn can_page_right(&self, obtained: usize) -> bool {
        obtained > PRIMARY_SLOTS && self.offset + PRIMARY_SLOTS < obtained
    }

    /// Shift one item left. Returns whether the offset changed.
    pub fn page_left(&mut self, obtained: usize) -> bool {
        if !self.can_page_left(obtained) {
            return false;
        }
        self.offset -= 1;
        true
    }

    /// Shift one item right, clamped so the last page stays full.
    pub fn page_right(&mut self, obtained: usize) -> bool {
        if !self.can_page_right(obtained) {
            return false;
        }
        self.offset = (self.offset + 1).min(obtained - PRIMARY_SLOTS);
        true
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(count: usize) -> EvidenceRegistry {
        EvidenceRegistry::new(
            (1..=count)
                .map(|n| {
                    EvidenceItem::new(
                        format!("{n:02}"),
                        format!("Item {n}"),
                        "",
                        format!("{n:02}.png"),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_obtain_is_idempotent() {
        let mut registry = registry(3);
        assert_eq!(registry.obtain("02"), Obtain::Newly);
        let after_first = registry.clone();
        assert_eq!(registry.obtain("02"), Obtain::Already);
        assert_eq!(registry, after_first);
        assert!(registry.is_obtained("02"));
    }

    #[test]
    fn test_obtain_unknown() {
        let mut registry = registry(3);
        assert_eq!(registry.obtain("99"), Obtain::Unknown);
        assert!(registry.list_obtained().is_empty());
    }

    #[test]
    fn test_list_obtained_sorted_by_id() {
        let mut registry = EvidenceRegistry::new(vec![
            EvidenceItem::new("10", "Ten", "", ""),
            EvidenceItem::new("02", "Two", "", ""),
            EvidenceItem::new("05", "Five", "", ""),
        ]);
        registry.obtain("10");
        registry.obtain("02");
        registry.obtain("05");
        assert_eq!(registry.obtained_ids(), vec!["02", "05", "10"]);
    }

    #[test]
    fn test_by_image() {
        let registry = registry(3);
        assert_eq!(registry.by_image("03.png").map(|i| i.id.as_str()), Some("03"));
        assert!(registry.by_image("missing.png").is_none());
    }

    #[test]
    fn test_restore_obtained() {
        let mut saved = registry(3);
        saved.obtain("01");
        let mut fresh = registry(3);
        fresh.restore_obtained(&saved);
        assert_eq!(fresh.obtained_ids(), vec!["01"]);
    }

    #[test]
    fn test_first_page_layout() {
        let pager = Pager::default();
        let layout = pager.layout(12);
        assert_eq!(layout[0], None);
        assert_eq!(layout[1], Some(0));
        assert_eq!(layout[10], Some(9));
        assert_eq!(layout[11], None);
    }

    #[test]
    fn test_short_list_layout() {
        let layout = Pager::default().layout(3);
        assert_eq!(layout[1], Some(0));
        assert_eq!(layout[3], Some(2));
        assert_eq!(layout[4], None);
    }

    #[test]
    fn test_paged_layout() {
        let mut pager = Pager::default();
        assert!(pager.page_right(13));
        assert_eq!(pager.offset(), 1);
        let layout = pager.layout(13);
        assert_eq!(layout[0], Some(0));
        assert_eq!(layout[1], Some(1));
        assert_eq!(layout[10], Some(10));
        assert_eq!(layout[11], Some(11));
    }

    #[test]
    fn test_paging_requires_overflow() {
        let mut pager = Pager::default();
        assert!(!pager.page_right(10));
        assert!(!pager.page_left(10));
        assert_eq!(pager.offset(), 0);
    }

    #[test]
    fn test_page_right_clamps() {
        let mut pager = Pager::default();
        assert!(pager.page_right(12));
        assert!(pager.page_right(12));
        assert!(!pager.page_right(12));
        assert_eq!(pager.offset(), 2);
        assert!(pager.page_left(12));
        assert_eq!(pager.offset(), 1);
        pager.reset();
        assert!(!pager.page_left(12));
    }
}
