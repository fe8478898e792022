use super::{IndexStore, State};
use crate::blob::{CARD_EXT, CARD_SOURCE_EXT, DECK_EXT, HISTORY_EXT, REVIEW_LOG_EXT};
use crate::{Card, CardSource, CoreError, CoreResult, Deck, ReviewHistory, ReviewLog};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};
use uuid::Uuid;

fn encode<T: Serialize>(items: &[&T]) -> CoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(items)?)
}

fn sorted<'a, T, K: Ord>(items: impl Iterator<Item = &'a T>, key: impl Fn(&T) -> &K) -> Vec<&'a T>
where
    T: 'a,
{
    let mut v: Vec<&T> = items.collect();
    v.sort_by(|a, b| key(a).cmp(key(b)));
    v
}

impl IndexStore {
    fn snapshot_blob(&self, ext: &str) -> String {
        format!("{}{}", self.inner.config.snapshot_name, ext)
    }

    /// Audit blobs are never rewritten, so every flush gets a fresh name.
    /// The random tail keeps names apart across processes sharing a root.
    fn audit_stamp(&self) -> String {
        let seq = self.inner.audit_seq.fetch_add(1, Ordering::Relaxed);
        let tail = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{seq:06}-{}",
            Utc::now().format("%Y-%m-%d-%H_%M_%S_%3f"),
            &tail[..12]
        )
    }

    /// Writes the deck blob. Takes the persist lock.
    pub(super) async fn persist_decks(&self) -> CoreResult<()> {
        let _persist = self.inner.persist_lock.lock().await;
        let bytes = {
            let s = self.inner.state.lock();
            encode(&sorted(s.decks.values(), |d: &Deck| &d.id))?
        };
        self.inner
            .blobs
            .write_blob(&self.snapshot_blob(DECK_EXT), bytes)
            .await
    }

    /// Flushes pending audit entries into a new history/log blob pair,
    /// history first. Caller holds the persist lock.
    pub(super) async fn flush_audit_locked(&self) -> CoreResult<(usize, usize)> {
        let (generation, history, logs) = {
            let s = self.inner.state.lock();
            let (history, logs) = s.pending_audit();
            (s.generation, history, logs)
        };
        if history.is_empty() && logs.is_empty() {
            return Ok((0, 0));
        }
        let stamp = self.audit_stamp();
        if !history.is_empty() {
            let bytes = serde_json::to_vec(&history)?;
            self.inner
                .blobs
                .write_blob(&format!("{stamp}{HISTORY_EXT}"), bytes)
                .await?;
            let mut s = self.inner.state.lock();
            if s.generation == generation {
                s.mark_flushed(history.len(), 0);
            }
        }
        if !logs.is_empty() {
            let bytes = serde_json::to_vec(&logs)?;
            self.inner
                .blobs
                .write_blob(&format!("{stamp}{REVIEW_LOG_EXT}"), bytes)
                .await?;
            let mut s = self.inner.state.lock();
            if s.generation == generation {
                s.mark_flushed(0, logs.len());
            }
        }
        debug!(history = history.len(), logs = logs.len(), "audit flushed");
        Ok((history.len(), logs.len()))
    }

    /// Writes the card source blob. Caller holds the persist lock.
    pub(super) async fn write_card_sources_locked(&self) -> CoreResult<()> {
        let bytes = {
            let s = self.inner.state.lock();
            encode(&sorted(s.card_sources.values(), |cs: &CardSource| &cs.id))?
        };
        self.inner
            .blobs
            .write_blob(&self.snapshot_blob(CARD_SOURCE_EXT), bytes)
            .await
    }

    /// Writes the card blob. Caller holds the persist lock.
    pub(super) async fn write_cards_locked(&self) -> CoreResult<()> {
        let bytes = {
            let s = self.inner.state.lock();
            encode(&sorted(s.cards.values(), |c: &Card| &c.id))?
        };
        self.inner
            .blobs
            .write_blob(&self.snapshot_blob(CARD_EXT), bytes)
            .await
    }

    /// Writes a full snapshot: pending audit first, then decks, card sources and cards.
    pub async fn save(&self) -> CoreResult<()> {
        let _load = self.inner.load_lock.lock().await;
        let _persist = self.inner.persist_lock.lock().await;

        let (history, logs) = self.flush_audit_locked().await?;
        let (decks, sources, cards, counts) = {
            let s = self.inner.state.lock();
            (
                encode(&sorted(s.decks.values(), |d: &Deck| &d.id))?,
                encode(&sorted(s.card_sources.values(), |cs: &CardSource| &cs.id))?,
                encode(&sorted(s.cards.values(), |c: &Card| &c.id))?,
                (s.decks.len(), s.card_sources.len(), s.cards.len()),
            )
        };
        let blobs = &self.inner.blobs;
        blobs.write_blob(&self.snapshot_blob(DECK_EXT), decks).await?;
        blobs
            .write_blob(&self.snapshot_blob(CARD_SOURCE_EXT), sources)
            .await?;
        blobs.write_blob(&self.snapshot_blob(CARD_EXT), cards).await?;
        info!(
            decks = counts.0,
            card_sources = counts.1,
            cards = counts.2,
            history,
            logs,
            "snapshot saved"
        );
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, ext: &str) -> CoreResult<Vec<T>> {
        let mut out = Vec::new();
        for name in self.inner.blobs.list_blobs(ext).await? {
            let bytes = match self.inner.blobs.read_blob(&name).await {
                Ok(bytes) => bytes,
                Err(CoreError::NotFound { .. }) => {
                    warn!(blob = %name, "blob vanished while loading");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let items: Vec<T> = serde_json::from_slice(&bytes)?;
            out.extend(items);
        }
        Ok(out)
    }

    /// Replaces the in-memory store with the persisted snapshot. Decks, card
    /// sources and cards are ingested in that order, through the same
    /// integrity checks as the batch APIs, into a fresh state that is swapped
    /// in as a whole. History and review logs follow in a background task;
    /// see [`IndexStore::wait_for_load`].
    ///
    /// An absent snapshot loads as an empty store.
    pub async fn load(&self) -> CoreResult<()> {
        let _load = self.inner.load_lock.lock().await;
        self.join_history_task().await?;

        let decks: Vec<Deck> = self.read_all(DECK_EXT).await?;
        let sources: Vec<CardSource> = self.read_all(CARD_SOURCE_EXT).await?;
        let cards: Vec<Card> = self.read_all(CARD_EXT).await?;
        let offered = (decks.len(), sources.len(), cards.len());

        let chunk = self.chunk();
        let mut fresh = State::default();
        for deck in decks {
            fresh.insert_deck(deck);
        }
        fresh.ingest_card_sources(sources, chunk);
        fresh.ingest_cards(cards, chunk, None);
        let pruned = fresh.prune_dangling_slots();

        let generation = {
            let mut s = self.inner.state.lock();
            fresh.generation = s.generation + 1;
            *s = fresh;
            s.generation
        };
        {
            let s = self.inner.state.lock();
            info!(
                decks = s.decks.len(),
                card_sources = s.card_sources.len(),
                cards = s.cards.len(),
                dropped_sources = offered.1 - s.card_sources.len().min(offered.1),
                dropped_cards = offered.2 - s.cards.len().min(offered.2),
                pruned_slots = pruned,
                "snapshot loaded"
            );
        }

        let store = self.clone();
        let handle = tokio::spawn(async move { store.load_audit(generation).await });
        *self.inner.history_task.lock().await = Some(handle);
        Ok(())
    }

    async fn load_audit(&self, generation: u64) -> CoreResult<usize> {
        let mut history: Vec<ReviewHistory> = self.read_all(HISTORY_EXT).await?;
        let mut logs: Vec<ReviewLog> = self.read_all(REVIEW_LOG_EXT).await?;

        let mut seen = HashSet::new();
        history.retain(|h| seen.insert(h.id.clone()));
        let mut seen = HashSet::new();
        logs.retain(|l| seen.insert(l.history_id.clone()));

        let loaded = history.len();
        let mut s = self.inner.state.lock();
        if s.generation != generation {
            return Ok(0);
        }
        debug!(history = loaded, logs = logs.len(), "audit trail loaded");
        s.prepend_audit(history, logs);
        Ok(loaded)
    }

    /// Blocks until an in-flight [`IndexStore::load`], including its
    /// background history load, has finished. Surfaces the history load's
    /// error if it failed. Returns at once when nothing is loading.
    pub async fn wait_for_load(&self) -> CoreResult<()> {
        let _load = self.inner.load_lock.lock().await;
        self.join_history_task().await
    }

    async fn join_history_task(&self) -> CoreResult<()> {
        let mut task = self.inner.history_task.lock().await;
        if let Some(handle) = task.take() {
            let loaded = handle.await??;
            debug!(loaded, "history load joined");
        }
        Ok(())
    }
}
