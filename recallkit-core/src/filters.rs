use crate::{Card, DueStatus};
use chrono::{DateTime, Utc};

pub fn filter_by_tag(cards: &[Card], tag: &str) -> Vec<Card> {
    let q = tag.trim().to_lowercase();
    cards
        .iter()
        .filter(|c| c.tag.to_lowercase() == q)
        .cloned()
        .collect()
}

pub fn filter_by_flag(cards: &[Card], flag: &str) -> Vec<Card> {
    let q = flag.trim().to_lowercase();
    cards
        .iter()
        .filter(|c| c.flag.to_lowercase() == q)
        .cloned()
        .collect()
}

pub fn filter_by_due(cards: &[Card], now: DateTime<Utc>, want: DueStatus) -> Vec<Card> {
    cards
        .iter()
        .filter(|c| c.due_status(now) == want)
        .cloned()
        .collect()
}

pub fn filter_not_suspended(cards: &[Card]) -> Vec<Card> {
    cards.iter().filter(|c| !c.suspend).cloned().collect()
}
