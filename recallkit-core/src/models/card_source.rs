use crate::{BlockId, CardId, CardSourceId, DeckId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_SOURCE_TYPE: &str = "builtin";

/// The grouping a batch of cards was generated from. Owns the association
/// to content blocks (the reverse-index keys) and to decks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardSource {
    pub id: CardSourceId,
    pub source_type: String,
    #[serde(default)]
    pub hash: Option<String>,
    pub deck_ids: BTreeSet<DeckId>,
    block_ids: Vec<BlockId>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    slots: BTreeMap<String, CardId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardSource {
    pub fn new(deck_id: DeckId) -> Self {
        let now = Utc::now();
        Self {
            id: CardSourceId::new(),
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            hash: None,
            deck_ids: BTreeSet::from([deck_id]),
            block_ids: Vec::new(),
            context: BTreeMap::new(),
            slots: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_blocks<I, B>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BlockId>,
    {
        self.set_block_ids(blocks.into_iter().map(Into::into));
        self
    }

    pub fn block_ids(&self) -> &[BlockId] {
        &self.block_ids
    }

    /// Replaces the block list, keeping first occurrences in order.
    pub fn set_block_ids(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        let mut seen = BTreeSet::new();
        self.block_ids = blocks
            .into_iter()
            .filter(|b| seen.insert(b.clone()))
            .collect();
        self.updated_at = Utc::now();
    }

    pub fn related_block_ids(&self) -> BTreeSet<BlockId> {
        self.block_ids.iter().cloned().collect()
    }

    pub fn slots(&self) -> &BTreeMap<String, CardId> {
        &self.slots
    }

    pub fn slot(&self, key: &str) -> Option<&CardId> {
        self.slots.get(key)
    }

    pub fn slot_of(&self, card_id: &CardId) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, id)| *id == card_id)
            .map(|(k, _)| k.as_str())
    }

    pub fn holds(&self, card_id: &CardId) -> bool {
        self.slots.values().any(|id| id == card_id)
    }

    /// Installs `key -> card_id`, dropping any other key already holding the card.
    pub fn add_or_replace_slot(&mut self, key: impl Into<String>, card_id: CardId) {
        let key = key.into();
        self.slots.retain(|k, id| *id != card_id || *k == key);
        self.slots.insert(key, card_id);
        self.updated_at = Utc::now();
    }

    /// Removes every slot pointing at `card_id`. Returns whether any was present.
    pub fn remove_card(&mut self, card_id: &CardId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|_, id| id != card_id);
        let removed = self.slots.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn card_ids(&self) -> Vec<CardId> {
        let mut ids: Vec<CardId> = self.slots.values().cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
