//! The index store: in-memory maps of decks, card sources and cards, a
//! block-id reverse index, and their mirror in a [`BlobStore`].
//!
//! All maps sit behind one mutex. Nothing under that mutex performs I/O;
//! write-through, `save` and `load` collect what they need under the lock and
//! talk to the blob store after releasing it.

use crate::blob::BlobStore;
use crate::scheduler::Scheduler;
use crate::{
    BlockId, Card, CardId, CardSource, CardSourceId, CoreError, CoreResult, Deck, DeckId,
    ReviewHistory, ReviewLog, StoreConfig, UpdateResult,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

mod persist;
mod review;
mod state;

use state::State;

pub(crate) struct Inner {
    state: Mutex<State>,
    /// Serializes reloads and full saves.
    load_lock: tokio::sync::Mutex<()>,
    /// Orders write-throughs so a newer snapshot never lands before an older one.
    persist_lock: tokio::sync::Mutex<()>,
    history_task: tokio::sync::Mutex<Option<JoinHandle<CoreResult<usize>>>>,
    audit_seq: AtomicU64,
    blobs: Arc<dyn BlobStore>,
    scheduler: Arc<dyn Scheduler>,
    config: StoreConfig,
}

/// Cheaply cloneable handle; clones share the same store.
#[derive(Clone)]
pub struct IndexStore {
    inner: Arc<Inner>,
}

impl IndexStore {
    /// Creates an empty store bound to `blobs`. Call [`IndexStore::load`] to
    /// pull in an existing snapshot.
    pub fn open(
        blobs: Arc<dyn BlobStore>,
        scheduler: Arc<dyn Scheduler>,
        config: StoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                load_lock: tokio::sync::Mutex::new(()),
                persist_lock: tokio::sync::Mutex::new(()),
                history_task: tokio::sync::Mutex::new(None),
                audit_seq: AtomicU64::new(0),
                blobs,
                scheduler,
                config,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    fn chunk(&self) -> usize {
        self.inner.config.integrity_chunk
    }

    /// Builds a fresh card for `source`, owned by the store's scheduler.
    pub fn new_card(&self, source: &CardSourceId, now: DateTime<Utc>) -> Card {
        Card::new(source.clone(), self.inner.scheduler.initial_state(now))
    }

    // ===== Decks =====

    /// Upserts a deck and writes the deck blob through. Last write wins.
    pub async fn add_deck(&self, deck: Deck) -> CoreResult<Deck> {
        let previous = self.inner.state.lock().insert_deck(deck.clone());
        debug!(deck = %deck.id, replaced = previous.is_some(), "deck added");
        if !self.inner.config.write_through {
            return Ok(deck);
        }
        if let Err(err) = self.persist_decks().await {
            let mut s = self.inner.state.lock();
            match previous {
                Some(prev) => {
                    s.insert_deck(prev);
                }
                None => {
                    s.decks.remove(&deck.id);
                }
            }
            return Err(err);
        }
        Ok(deck)
    }

    pub fn get_deck(&self, id: &DeckId) -> CoreResult<Deck> {
        self.inner
            .state
            .lock()
            .decks
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("deck", id))
    }

    pub fn list_decks(&self) -> Vec<Deck> {
        let mut v: Vec<Deck> = self.inner.state.lock().decks.values().cloned().collect();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        v
    }

    /// Re-parents a deck and writes the deck blob through. A parent that
    /// would make the deck its own ancestor is rejected with `CycleDetected`;
    /// a failed write restores the old parent.
    pub async fn set_deck_parent(&self, id: &DeckId, parent: Option<DeckId>) -> CoreResult<Deck> {
        let (previous, deck) = {
            let mut s = self.inner.state.lock();
            if !s.decks.contains_key(id) {
                return Err(CoreError::not_found("deck", id));
            }
            if let Some(parent_id) = &parent {
                let parent_deck = s
                    .decks
                    .get(parent_id)
                    .ok_or_else(|| CoreError::not_found("deck", parent_id))?;
                if parent_id == id || parent_deck.is_descendant_of(id, |d| s.decks.get(d))? {
                    return Err(CoreError::CycleDetected(id.clone()));
                }
            }
            let deck = s
                .decks
                .get_mut(id)
                .ok_or_else(|| CoreError::not_found("deck", id))?;
            let previous = deck.clone();
            deck.parent_deck_id = parent;
            deck.updated_at = Utc::now();
            (previous, deck.clone())
        };
        debug!(deck = %deck.id, parent = ?deck.parent_deck_id, "deck re-parented");
        if !self.inner.config.write_through {
            return Ok(deck);
        }
        if let Err(err) = self.persist_decks().await {
            let mut s = self.inner.state.lock();
            if s.decks.get(id) == Some(&deck) {
                s.insert_deck(previous);
            }
            return Err(err);
        }
        Ok(deck)
    }

    // ===== Card sources =====

    /// Inserts the sources whose decks all exist and returns that subset.
    pub fn add_card_sources(&self, sources: Vec<CardSource>) -> Vec<CardSource> {
        let offered = sources.len();
        let accepted = self.inner.state.lock().ingest_card_sources(sources, self.chunk());
        info!(offered, accepted = accepted.len(), "card sources ingested");
        accepted
    }

    pub fn get_card_source(&self, id: &CardSourceId) -> CoreResult<CardSource> {
        self.inner
            .state
            .lock()
            .card_sources
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("card source", id))
    }

    /// Replaces an existing source, re-indexing its blocks. Its decks must
    /// exist and its slots may only name cards it owns.
    pub fn set_card_source(&self, source: CardSource) -> CoreResult<CardSource> {
        let mut s = self.inner.state.lock();
        if !s.card_sources.contains_key(&source.id) {
            return Err(CoreError::not_found("card source", &source.id));
        }
        if let Some(missing) = source.deck_ids.iter().find(|d| !s.decks.contains_key(*d)) {
            return Err(CoreError::IntegrityViolation(format!(
                "card source {} references unknown deck {missing}",
                source.id
            )));
        }
        for (key, card_id) in source.slots() {
            let owned = s
                .cards
                .get(card_id)
                .is_some_and(|c| c.card_source_id == source.id);
            if !owned {
                return Err(CoreError::SlotConflict {
                    source_id: source.id.to_string(),
                    key: key.clone(),
                });
            }
        }
        // cards the new slot map forgets keep their slots
        s.put_card_source(source.clone());
        s.card_sources
            .get(&source.id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("card source", &source.id))
    }

    /// Puts `card_id` under `key` in its owning source. A card owned by a
    /// different source is a `SlotConflict`.
    pub fn assign_slot(
        &self,
        source_id: &CardSourceId,
        key: &str,
        card_id: &CardId,
    ) -> CoreResult<()> {
        let mut s = self.inner.state.lock();
        let owner = s
            .cards
            .get(card_id)
            .map(|c| c.card_source_id.clone())
            .ok_or_else(|| CoreError::not_found("card", card_id))?;
        let conflict = || CoreError::SlotConflict {
            source_id: source_id.to_string(),
            key: key.to_string(),
        };
        if owner != *source_id {
            return Err(conflict());
        }
        let source = s
            .card_sources
            .get_mut(source_id)
            .ok_or_else(|| CoreError::not_found("card source", source_id))?;
        // the key's previous occupant would be left without a slot
        if let Some(other) = source.slot(key) {
            if other != card_id {
                return Err(conflict());
            }
        }
        source.add_or_replace_slot(key, card_id.clone());
        Ok(())
    }

    // ===== Cards =====

    /// Inserts the cards whose source exists and returns that subset.
    pub fn add_cards(&self, cards: Vec<Card>) -> Vec<Card> {
        let offered = cards.len();
        let accepted = self
            .inner
            .state
            .lock()
            .ingest_cards(cards, self.chunk(), Some(Utc::now()));
        info!(offered, accepted = accepted.len(), "cards ingested");
        accepted
    }

    pub fn get_card(&self, id: &CardId) -> CoreResult<Card> {
        self.inner
            .state
            .lock()
            .cards
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("card", id))
    }

    /// Replaces an existing card and records an `Edited` history entry.
    pub fn set_card(&self, mut card: Card) -> CoreResult<Card> {
        let mut s = self.inner.state.lock();
        let current = s
            .cards
            .get(&card.id)
            .ok_or_else(|| CoreError::not_found("card", &card.id))?;
        if current.algo != card.algo || card.algorithm_state().algo() != card.algo {
            return Err(CoreError::AlgoMismatch {
                expected: current.algo,
                found: card.algorithm_state().algo(),
            });
        }
        if !s.card_sources.contains_key(&card.card_source_id) {
            return Err(CoreError::IntegrityViolation(format!(
                "card {} references unknown card source {}",
                card.id, card.card_source_id
            )));
        }
        let now = Utc::now();
        card.updated_at = now;
        s.history
            .push(ReviewHistory::snapshot(&card, UpdateResult::Edited, now));
        s.put_card(card.clone());
        Ok(card)
    }

    /// Removes a card. When it was its source's last card, the source goes too.
    pub fn remove_card(&self, id: &CardId) -> CoreResult<Card> {
        let card = self
            .inner
            .state
            .lock()
            .remove_card(id)
            .ok_or_else(|| CoreError::not_found("card", id))?;
        debug!(card = %id, "card removed");
        Ok(card)
    }

    pub fn count_cards(&self) -> usize {
        self.inner.state.lock().cards.len()
    }

    pub fn list_cards(&self) -> Vec<Card> {
        let mut v: Vec<Card> = self.inner.state.lock().cards.values().cloned().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    // ===== Queries =====

    /// Every card whose source is tagged with at least one of `blocks`.
    pub fn get_cards_by_block_ids(&self, blocks: &[BlockId]) -> Vec<Card> {
        let s = self.inner.state.lock();
        let sources = s.sources_for_blocks(blocks, self.chunk());
        s.cards_of_sources(&sources)
    }

    /// Non-suspended cards due at or before `now`, earliest first.
    pub fn due_cards(&self, now: DateTime<Utc>) -> Vec<Card> {
        let mut v: Vec<Card> = self
            .inner
            .state
            .lock()
            .cards
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        v.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.id.cmp(&b.id)));
        v
    }

    pub fn due_cards_by_block_ids(&self, blocks: &[BlockId], now: DateTime<Utc>) -> Vec<Card> {
        let mut v = self.get_cards_by_block_ids(blocks);
        v.retain(|c| c.is_due(now));
        v.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.id.cmp(&b.id)));
        v
    }

    /// Never-reviewed, non-suspended cards for `blocks`.
    pub fn new_cards(&self, blocks: &[BlockId]) -> Vec<Card> {
        let mut v = self.get_cards_by_block_ids(blocks);
        v.retain(|c| !c.suspend && c.is_new());
        v
    }

    /// All block ids referenced by any source, sorted.
    pub fn block_ids(&self) -> Vec<BlockId> {
        let s = self.inner.state.lock();
        let mut v: Vec<BlockId> = s.block_index.keys().cloned().collect();
        v.sort();
        v
    }

    /// Cards reachable from `deck` through its sources, optionally including
    /// every deck nested below it.
    pub fn cards_in_deck(&self, deck: &DeckId, include_descendants: bool) -> CoreResult<Vec<Card>> {
        let s = self.inner.state.lock();
        if !s.decks.contains_key(deck) {
            return Err(CoreError::not_found("deck", deck));
        }
        let mut decks = BTreeSet::from([deck.clone()]);
        if include_descendants {
            for candidate in s.decks.values() {
                if candidate.is_descendant_of(deck, |d| s.decks.get(d))? {
                    decks.insert(candidate.id.clone());
                }
            }
        }
        let sources: BTreeSet<CardSourceId> = s
            .card_sources
            .values()
            .filter(|cs| cs.deck_ids.iter().any(|d| decks.contains(d)))
            .map(|cs| cs.id.clone())
            .collect();
        Ok(s.cards_of_sources(&sources))
    }

    // ===== Audit trail =====

    pub fn history_for_card(&self, card_id: &CardId) -> Vec<ReviewHistory> {
        self.inner
            .state
            .lock()
            .history
            .iter()
            .filter(|h| &h.card_id == card_id)
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<ReviewHistory> {
        self.inner.state.lock().history.clone()
    }

    pub fn review_logs(&self) -> Vec<ReviewLog> {
        self.inner.state.lock().logs.clone()
    }

    /// `(history entries, review logs)` currently in memory.
    pub fn audit_len(&self) -> (usize, usize) {
        let s = self.inner.state.lock();
        (s.history.len(), s.logs.len())
    }
}
