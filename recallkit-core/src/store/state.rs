use crate::{
    BlockId, Card, CardId, CardSource, CardSourceId, Deck, DeckId, ReviewHistory, ReviewLog,
    UpdateResult,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// Everything guarded by the store's primary lock.
///
/// `history` and `logs` are append-ordered; entries at or past the
/// `flushed_*` watermarks have not reached the blob store yet.
#[derive(Default)]
pub(crate) struct State {
    pub decks: HashMap<DeckId, Deck>,
    pub card_sources: HashMap<CardSourceId, CardSource>,
    pub cards: HashMap<CardId, Card>,
    pub block_index: HashMap<BlockId, BTreeSet<CardSourceId>>,

    pub history: Vec<ReviewHistory>,
    pub logs: Vec<ReviewLog>,
    pub flushed_history: usize,
    pub flushed_logs: usize,

    /// Bumped every time a reload swaps the whole state out.
    pub generation: u64,
}

/// Ids from `wanted` that are keys of `map`, looked up `chunk` at a time.
fn existing<K, V>(map: &HashMap<K, V>, wanted: &[K], chunk: usize) -> HashSet<K>
where
    K: Eq + Hash + Clone,
{
    let mut found = HashSet::with_capacity(wanted.len());
    for part in wanted.chunks(chunk.max(1)) {
        found.extend(part.iter().filter(|id| map.contains_key(*id)).cloned());
    }
    found
}

fn dedup<K: Ord + Clone>(ids: impl IntoIterator<Item = K>) -> Vec<K> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

impl State {
    pub fn insert_deck(&mut self, deck: Deck) -> Option<Deck> {
        self.decks.insert(deck.id.clone(), deck)
    }

    fn index_source(&mut self, source: &CardSource) {
        for block in source.block_ids() {
            self.block_index
                .entry(block.clone())
                .or_default()
                .insert(source.id.clone());
        }
    }

    fn unindex_source(&mut self, source: &CardSource) {
        for block in source.block_ids() {
            if let Some(ids) = self.block_index.get_mut(block) {
                ids.remove(&source.id);
                if ids.is_empty() {
                    self.block_index.remove(block);
                }
            }
        }
    }

    /// Inserts or replaces a source, keeping the block index in step. Cards
    /// the store still holds for the old source keep their slots.
    pub fn put_card_source(&mut self, mut source: CardSource) {
        if let Some(old) = self.card_sources.remove(&source.id) {
            self.unindex_source(&old);
            for (key, card_id) in old.slots() {
                let owned = self
                    .cards
                    .get(card_id)
                    .is_some_and(|c| c.card_source_id == source.id);
                if !owned || source.holds(card_id) {
                    continue;
                }
                if source.slot(key).is_some() {
                    source.add_or_replace_slot(card_id.to_string(), card_id.clone());
                } else {
                    source.add_or_replace_slot(key.clone(), card_id.clone());
                }
            }
        }
        self.index_source(&source);
        self.card_sources.insert(source.id.clone(), source);
    }

    pub fn remove_card_source(&mut self, id: &CardSourceId) -> Option<CardSource> {
        let source = self.card_sources.remove(id)?;
        self.unindex_source(&source);
        Some(source)
    }

    /// Accepts the sources whose decks all exist; the rest are dropped.
    pub fn ingest_card_sources(&mut self, sources: Vec<CardSource>, chunk: usize) -> Vec<CardSource> {
        let wanted = dedup(sources.iter().flat_map(|s| s.deck_ids.iter().cloned()));
        let known = existing(&self.decks, &wanted, chunk);

        let mut accepted = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(missing) = source.deck_ids.iter().find(|d| !known.contains(*d)) {
                debug!(source = %source.id, deck = %missing, "dropping card source with unknown deck");
                continue;
            }
            accepted.push(source.clone());
            self.put_card_source(source);
        }
        accepted
    }

    /// Accepts the cards whose source exists, slotting each into its source.
    /// With `record` set, every accepted card gets a `Created` history entry.
    pub fn ingest_cards(
        &mut self,
        cards: Vec<Card>,
        chunk: usize,
        record: Option<DateTime<Utc>>,
    ) -> Vec<Card> {
        let wanted = dedup(cards.iter().map(|c| c.card_source_id.clone()));
        let known = existing(&self.card_sources, &wanted, chunk);

        let mut accepted = Vec::with_capacity(cards.len());
        for card in cards {
            if !known.contains(&card.card_source_id) {
                debug!(card = %card.id, source = %card.card_source_id, "dropping card with unknown source");
                continue;
            }
            if let Some(at) = record {
                self.history
                    .push(ReviewHistory::snapshot(&card, UpdateResult::Created, at));
            }
            accepted.push(card.clone());
            self.put_card(card);
        }
        accepted
    }

    /// Stores `card` and makes its source's slots agree with it. The source must exist.
    pub fn put_card(&mut self, card: Card) {
        if let Some(old) = self.cards.get(&card.id) {
            if old.card_source_id != card.card_source_id {
                let (old_source, id) = (old.card_source_id.clone(), card.id.clone());
                self.detach_from_source(&old_source, &id);
            }
        }
        if let Some(source) = self.card_sources.get_mut(&card.card_source_id) {
            if !source.holds(&card.id) {
                source.add_or_replace_slot(card.id.to_string(), card.id.clone());
            }
        }
        self.cards.insert(card.id.clone(), card);
    }

    /// Clears the card's slot; drops the source once it holds nothing.
    /// Returns true when the source was removed.
    fn detach_from_source(&mut self, source_id: &CardSourceId, card_id: &CardId) -> bool {
        let emptied = match self.card_sources.get_mut(source_id) {
            Some(source) => {
                source.remove_card(card_id);
                source.is_empty()
            }
            None => false,
        };
        if emptied {
            self.remove_card_source(source_id);
            debug!(source = %source_id, "removed emptied card source");
        }
        emptied
    }

    pub fn remove_card(&mut self, id: &CardId) -> Option<Card> {
        let card = self.cards.remove(id)?;
        self.detach_from_source(&card.card_source_id, id);
        Some(card)
    }

    /// Source ids whose block list intersects `blocks`, resolved `chunk` blocks at a time.
    pub fn sources_for_blocks(&self, blocks: &[BlockId], chunk: usize) -> BTreeSet<CardSourceId> {
        let blocks = dedup(blocks.iter().cloned());
        let mut out = BTreeSet::new();
        for part in blocks.chunks(chunk.max(1)) {
            for block in part {
                if let Some(ids) = self.block_index.get(block) {
                    out.extend(ids.iter().cloned());
                }
            }
        }
        out
    }

    /// Live cards owned by any of `sources`, by each card's own source id.
    pub fn cards_of_sources(&self, sources: &BTreeSet<CardSourceId>) -> Vec<Card> {
        let mut out: Vec<Card> = self
            .cards
            .values()
            .filter(|c| sources.contains(&c.card_source_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Drops slots that point at cards which are missing or owned elsewhere.
    pub fn prune_dangling_slots(&mut self) -> usize {
        let mut pruned = 0;
        for source in self.card_sources.values_mut() {
            let dangling: Vec<CardId> = source
                .slots()
                .values()
                .filter(|id| {
                    self.cards
                        .get(*id)
                        .map_or(true, |c| c.card_source_id != source.id)
                })
                .cloned()
                .collect();
            for id in dangling {
                source.remove_card(&id);
                pruned += 1;
            }
        }
        pruned
    }

    pub fn pending_audit(&self) -> (Vec<ReviewHistory>, Vec<ReviewLog>) {
        (
            self.history[self.flushed_history..].to_vec(),
            self.logs[self.flushed_logs..].to_vec(),
        )
    }

    pub fn mark_flushed(&mut self, history: usize, logs: usize) {
        self.flushed_history = (self.flushed_history + history).min(self.history.len());
        self.flushed_logs = (self.flushed_logs + logs).min(self.logs.len());
    }

    /// Puts previously persisted audit entries in front of anything recorded since.
    pub fn prepend_audit(&mut self, history: Vec<ReviewHistory>, logs: Vec<ReviewLog>) {
        self.flushed_history += history.len();
        self.flushed_logs += logs.len();
        self.history.splice(0..0, history);
        self.logs.splice(0..0, logs);
    }
}
