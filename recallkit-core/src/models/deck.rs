use crate::{CoreError, CoreResult, DeckId, BUILTIN_DECK_ID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest parent chain walked before a deck tree is considered malformed.
pub const MAX_DECK_DEPTH: usize = 64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub parent_deck_id: Option<DeckId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: DeckId::new(),
            name: name.into(),
            desc: String::new(),
            parent_deck_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn builtin() -> Self {
        let mut deck = Self::new("Default");
        deck.id = DeckId::from(BUILTIN_DECK_ID);
        deck
    }

    pub fn with_parent(mut self, parent: DeckId) -> Self {
        self.parent_deck_id = Some(parent);
        self
    }

    /// Walks the parent chain looking for `ancestor`. A chain that does not
    /// reach a root within [`MAX_DECK_DEPTH`] steps is reported as a cycle.
    pub fn is_descendant_of<'a, F>(&'a self, ancestor: &DeckId, lookup: F) -> CoreResult<bool>
    where
        F: Fn(&DeckId) -> Option<&'a Deck>,
    {
        let mut current = self.parent_deck_id.as_ref();
        for _ in 0..MAX_DECK_DEPTH {
            let Some(parent_id) = current else {
                return Ok(false);
            };
            if parent_id == ancestor {
                return Ok(true);
            }
            current = match lookup(parent_id) {
                Some(parent) => parent.parent_deck_id.as_ref(),
                None => return Ok(false),
            };
        }
        Err(CoreError::CycleDetected(self.id.clone()))
    }
}
