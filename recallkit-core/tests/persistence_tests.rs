use chrono::Utc;
use recallkit_core::blob::{CARD_EXT, CARD_SOURCE_EXT, HISTORY_EXT, REVIEW_LOG_EXT};
use recallkit_core::{
    AlgorithmState, BlobStore, BlockId, Card, CardSource, Deck, FsrsScheduler, FsrsState,
    IndexStore, MemoryBlobStore, Rating, StoreConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn open(blobs: Arc<MemoryBlobStore>) -> IndexStore {
    IndexStore::open(
        blobs,
        Arc::new(FsrsScheduler::default()),
        StoreConfig::default(),
    )
}

async fn reloaded(blobs: Arc<MemoryBlobStore>) -> IndexStore {
    let store = open(blobs);
    store.load().await.unwrap();
    store.wait_for_load().await.unwrap();
    store
}

/// Two nested decks, two sources, three cards, one review. Returns the reviewed card.
async fn populate(store: &IndexStore) -> Card {
    let root = store.add_deck(Deck::new("Spanish")).await.unwrap();
    let verbs = store
        .add_deck(Deck::new("Verbs").with_parent(root.id.clone()))
        .await
        .unwrap();

    let mut first = CardSource::new(root.id.clone()).with_blocks(["b1", "b2"]);
    first.hash = Some("abc123".into());
    first.context.insert("title".into(), "Greetings".into());
    let second = CardSource::new(verbs.id.clone()).with_blocks(["b3"]);
    store.add_card_sources(vec![first.clone(), second.clone()]);

    let now = Utc::now();
    let mut tagged = store.new_card(&first.id, now);
    tagged.tag = "greeting".into();
    tagged.set_priority(0.25);
    let mut paused = store.new_card(&first.id, now);
    paused.suspend = true;
    let plain = store.new_card(&second.id, now);
    store.add_cards(vec![tagged.clone(), paused, plain]);

    store.review(&tagged.id, Rating::Good).await.unwrap();
    store.get_card(&tagged.id).unwrap()
}

fn by_id<T: Clone, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[tokio::test]
async fn snapshot_round_trips_through_a_fresh_store() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let original = open(blobs.clone());
    let reviewed = populate(&original).await;
    original.save().await.unwrap();

    let copy = reloaded(blobs).await;

    assert_eq!(copy.list_decks(), original.list_decks());
    assert_eq!(copy.block_ids(), original.block_ids());
    for block in original.block_ids() {
        let want: Vec<_> = original
            .get_cards_by_block_ids(&[block.clone()])
            .into_iter()
            .map(|c| c.id)
            .collect();
        let got: Vec<_> = copy
            .get_cards_by_block_ids(&[block.clone()])
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(got, want);

        for card in original.get_cards_by_block_ids(&[block]) {
            let id = card.card_source_id;
            assert_eq!(copy.get_card_source(&id).unwrap(), original.get_card_source(&id).unwrap());
        }
    }

    let want = by_id(original.get_cards_by_block_ids(&original.block_ids()), |c| c.id.clone());
    let got = by_id(copy.get_cards_by_block_ids(&copy.block_ids()), |c| c.id.clone());
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(&want) {
        assert_eq!(g.id, w.id);
        assert_eq!(g.card_source_id, w.card_source_id);
        assert_eq!(g.due(), w.due());
        assert_eq!(g.priority(), w.priority());
        assert_eq!((g.reps, g.lapses, g.suspend), (w.reps, w.lapses, w.suspend));
        assert_eq!(g.tag, w.tag);
    }

    let loaded = copy.get_card(&reviewed.id).unwrap();
    assert_eq!(loaded.reps, 1);
    assert_eq!(loaded.priority(), 0.25);
    assert_eq!(loaded.algorithm_state().phase(), reviewed.algorithm_state().phase());

    let ids = |s: &IndexStore| s.history().into_iter().map(|h| h.id).collect::<Vec<_>>();
    assert_eq!(ids(&copy), ids(&original));
    assert_eq!(copy.review_logs().len(), 1);
}

#[tokio::test]
async fn loading_an_absent_snapshot_yields_an_empty_store() {
    let store = reloaded(Arc::new(MemoryBlobStore::new())).await;
    assert_eq!(store.count_cards(), 0);
    assert!(store.list_decks().is_empty());
    assert_eq!(store.audit_len(), (0, 0));
}

#[tokio::test]
async fn wait_for_load_without_a_load_returns() {
    let store = open(Arc::new(MemoryBlobStore::new()));
    store.wait_for_load().await.unwrap();
}

#[tokio::test]
async fn load_then_wait_sees_the_whole_audit_trail() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    let reviewed = populate(&store).await;
    for rating in [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy].repeat(5) {
        store.review(&reviewed.id, rating).await.unwrap();
    }
    assert!(blobs.list_blobs(HISTORY_EXT).await.unwrap().len() > 20);

    let copy = open(blobs);
    copy.load().await.unwrap();
    copy.wait_for_load().await.unwrap();

    assert_eq!(copy.audit_len(), store.audit_len());
    assert_eq!(copy.history_for_card(&reviewed.id).len(), 22);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_half_swapped_state() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    populate(&store).await;
    store.save().await.unwrap();
    let saved = store.count_cards();
    let blocks: Vec<BlockId> = ["b1", "b2", "b3", "scratch"].map(BlockId::from).to_vec();
    let scratch = store.add_deck(Deck::new("Scratch")).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let (store, done, blocks) = (store.clone(), done.clone(), blocks.clone());
        readers.push(tokio::spawn(async move {
            let mut seen = 0;
            while !done.load(Ordering::SeqCst) {
                let count = store.count_cards();
                assert!(count == saved || count == saved + 1, "count {count}");
                let found = store.get_cards_by_block_ids(&blocks).len();
                assert!(found == saved || found == saved + 1, "found {found}");
                seen += 1;
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for _ in 0..25 {
        let source = CardSource::new(scratch.id.clone()).with_blocks(["scratch"]);
        store.add_card_sources(vec![source.clone()]);
        store.add_cards(vec![store.new_card(&source.id, Utc::now())]);
        store.load().await.unwrap();
        store.wait_for_load().await.unwrap();
        assert_eq!(store.count_cards(), saved);
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
}

#[tokio::test]
async fn reviewed_card_from_an_unsaved_source_survives_reload() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    let deck = store.add_deck(Deck::new("Lang")).await.unwrap();
    let source = CardSource::new(deck.id.clone()).with_blocks(["b1"]);
    store.add_card_sources(vec![source.clone()]);
    let card = store.new_card(&source.id, Utc::now());
    store.add_cards(vec![card.clone()]);

    store.review(&card.id, Rating::Good).await.unwrap();
    assert_eq!(
        blobs.list_blobs(CARD_SOURCE_EXT).await.unwrap(),
        vec!["recallkit.cardSources"]
    );

    let copy = reloaded(blobs).await;
    assert_eq!(copy.get_card(&card.id).unwrap().reps, 1);
    assert!(copy.get_card_source(&source.id).unwrap().holds(&card.id));
    assert_eq!(copy.get_cards_by_block_ids(&["b1".into()]).len(), 1);
}

#[tokio::test]
async fn orphans_in_a_snapshot_are_dropped_on_load() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let stray_source = CardSource::new(Deck::new("gone").id);
    let stray_card = Card::new(stray_source.id.clone(), AlgorithmState::Fsrs(FsrsState::new(Utc::now())));
    blobs
        .write_blob("recallkit.cardSources", serde_json::to_vec(&[&stray_source]).unwrap())
        .await
        .unwrap();
    blobs
        .write_blob("recallkit.cards", serde_json::to_vec(&[&stray_card]).unwrap())
        .await
        .unwrap();

    let store = reloaded(blobs).await;

    assert!(store.get_card_source(&stray_source.id).is_err());
    assert!(store.get_card(&stray_card.id).is_err());
    assert!(store.block_ids().is_empty());
}

#[tokio::test]
async fn reload_discards_unsaved_changes() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    populate(&store).await;
    store.save().await.unwrap();
    let saved = store.count_cards();

    let deck = store.add_deck(Deck::new("Scratch")).await.unwrap();
    let source = CardSource::new(deck.id.clone());
    store.add_card_sources(vec![source.clone()]);
    store.add_cards(vec![store.new_card(&source.id, Utc::now())]);
    assert_eq!(store.count_cards(), saved + 1);

    store.load().await.unwrap();
    store.wait_for_load().await.unwrap();
    assert_eq!(store.count_cards(), saved);
}

#[tokio::test]
async fn every_flush_writes_a_new_audit_pair() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    let reviewed = populate(&store).await;

    store.review(&reviewed.id, Rating::Hard).await.unwrap();
    assert_eq!(blobs.list_blobs(HISTORY_EXT).await.unwrap().len(), 2);
    assert_eq!(blobs.list_blobs(REVIEW_LOG_EXT).await.unwrap().len(), 2);

    // nothing pending, nothing written
    store.save().await.unwrap();
    assert_eq!(blobs.list_blobs(HISTORY_EXT).await.unwrap().len(), 2);
    assert_eq!(blobs.list_blobs(CARD_EXT).await.unwrap(), vec!["recallkit.cards"]);
}

#[tokio::test]
async fn stores_sharing_blobs_never_reuse_audit_names() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let (first, second) = (open(blobs.clone()), open(blobs.clone()));
    populate(&first).await;
    populate(&second).await;

    let names = blobs.list_blobs(HISTORY_EXT).await.unwrap();
    assert_eq!(names.len(), 2);
    for name in names {
        let stem = name.trim_end_matches(HISTORY_EXT);
        let tail = stem.rsplit('-').next().unwrap();
        assert_eq!(tail.len(), 12);
        assert!(tail.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[tokio::test]
async fn duplicated_audit_blobs_load_once() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = open(blobs.clone());
    populate(&store).await;
    store.save().await.unwrap();

    for ext in [HISTORY_EXT, REVIEW_LOG_EXT] {
        let name = blobs.list_blobs(ext).await.unwrap().remove(0);
        let bytes = blobs.read_blob(&name).await.unwrap();
        blobs.write_blob(&format!("copy{ext}"), bytes).await.unwrap();
    }

    let copy = reloaded(blobs).await;
    assert_eq!(copy.audit_len(), store.audit_len());
}

#[tokio::test]
async fn snapshot_name_comes_from_config() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = IndexStore::open(
        blobs.clone(),
        Arc::new(FsrsScheduler::default()),
        StoreConfig {
            snapshot_name: "notes".into(),
            ..StoreConfig::default()
        },
    );
    populate(&store).await;
    store.save().await.unwrap();

    assert_eq!(blobs.list_blobs(CARD_EXT).await.unwrap(), vec!["notes.cards"]);
    assert!(blobs.read_blob("notes.decks").await.is_ok());
}
