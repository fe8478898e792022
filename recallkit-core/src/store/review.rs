use super::IndexStore;
use crate::{
    Card, CardId, CoreError, CoreResult, HistoryId, Rating, ReviewHistory, ReviewLog,
    UpdateResult,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What a committed review needs in order to be undone.
struct Committed {
    previous: Card,
    updated: Card,
    history_id: HistoryId,
    generation: u64,
}

impl IndexStore {
    pub async fn review(&self, card_id: &CardId, rating: Rating) -> CoreResult<ReviewLog> {
        self.review_at(card_id, rating, Utc::now()).await
    }

    /// Reviews a card as of `now`.
    ///
    /// Scheduling, the card update and the audit entries happen in one
    /// critical section. With write-through on, the audit pair is flushed
    /// first, then the card source and card blobs; if any write fails the
    /// card is restored and the error returned.
    pub async fn review_at(
        &self,
        card_id: &CardId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> CoreResult<ReviewLog> {
        let (log, committed) = self.commit_review(card_id, rating, now)?;
        debug!(card = %card_id, %rating, due = %committed.updated.due, "card reviewed");

        if !self.inner.config.write_through {
            return Ok(log);
        }
        if let Err(err) = self.write_through_review().await {
            warn!(card = %card_id, error = %err, "review write-through failed, rolling back");
            self.rollback_review(committed);
            return Err(err);
        }
        Ok(log)
    }

    fn commit_review(
        &self,
        card_id: &CardId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> CoreResult<(ReviewLog, Committed)> {
        let scheduler = &self.inner.scheduler;
        let mut s = self.inner.state.lock();
        let card = s
            .cards
            .get(card_id)
            .ok_or_else(|| CoreError::not_found("card", card_id))?;
        if card.algo != scheduler.algo() {
            return Err(CoreError::AlgoMismatch {
                expected: scheduler.algo(),
                found: card.algo,
            });
        }

        let retention = self.inner.config.retention.retention_for(card.priority());
        let history = ReviewHistory::snapshot(card, UpdateResult::Reviewed, now);
        let info = scheduler
            .repeat(card.algorithm_state(), now, retention)?
            .remove(&rating)
            .ok_or_else(|| {
                CoreError::IntegrityViolation(format!("scheduler returned no outcome for {rating}"))
            })?;

        let previous = card.clone();
        let mut updated = card.clone();
        updated.set_algorithm_state(info.state)?;
        updated.set_due(info.due);
        updated.increment_reps();
        if rating == Rating::Again {
            updated.increment_lapses();
        }
        updated.updated_at = now;

        let log = ReviewLog {
            history_id: history.id.clone(),
            rating,
            reviewed_at: now,
            phase: info.log.phase,
            scheduled_days: info.log.scheduled_days,
            elapsed_days: info.log.elapsed_days,
        };
        let history_id = history.id.clone();
        s.history.push(history);
        s.logs.push(log.clone());
        s.cards.insert(card_id.clone(), updated.clone());

        let committed = Committed {
            previous,
            updated,
            history_id,
            generation: s.generation,
        };
        Ok((log, committed))
    }

    async fn write_through_review(&self) -> CoreResult<()> {
        let _persist = self.inner.persist_lock.lock().await;
        self.flush_audit_locked().await?;
        // a card is never persisted ahead of the source it points at
        self.write_card_sources_locked().await?;
        self.write_cards_locked().await
    }

    /// Undoes a review whose write-through failed, unless the card changed
    /// again since. Audit entries that already reached the blob store stay.
    fn rollback_review(&self, committed: Committed) {
        let mut s = self.inner.state.lock();
        if s.generation != committed.generation {
            return;
        }
        let card_id = committed.previous.id.clone();
        if s.cards.get(&card_id) == Some(&committed.updated) {
            s.cards.insert(card_id, committed.previous);
        }
        let flushed = s.flushed_history;
        if let Some(pos) = s.history.iter().rposition(|h| h.id == committed.history_id) {
            if pos >= flushed {
                s.history.remove(pos);
            }
        }
        let flushed = s.flushed_logs;
        if let Some(pos) = s.logs.iter().rposition(|l| l.history_id == committed.history_id) {
            if pos >= flushed {
                s.logs.remove(pos);
            }
        }
    }

    /// Next due time for every rating, without committing anything.
    pub fn preview(
        &self,
        card_id: &CardId,
        now: DateTime<Utc>,
    ) -> CoreResult<BTreeMap<Rating, DateTime<Utc>>> {
        let s = self.inner.state.lock();
        let card = s
            .cards
            .get(card_id)
            .ok_or_else(|| CoreError::not_found("card", card_id))?;
        let retention = self.inner.config.retention.retention_for(card.priority());
        let outcomes = self
            .inner
            .scheduler
            .repeat(card.algorithm_state(), now, retention)?;
        Ok(outcomes.into_iter().map(|(r, info)| (r, info.due)).collect())
    }
}
