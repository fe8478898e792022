use crate::cli::opts::*;
use crate::config::AppConfig;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use recallkit_core::{
    daily_streak, filter_by_due, filter_by_tag, summarize, BlockId, Card, CardSource, Deck, DeckId,
    FsrsScheduler, IndexStore, Rating, BUILTIN_DECK_ID,
};
use recallkit_fs::paths::default_config_file;
use recallkit_fs::FsBlobStore;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run_cli(args: Cli) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_file().filter(|p| p.exists()));
    let cfg = AppConfig::load(config_path.as_deref())?;
    let store = open_store(args.data_dir.clone(), &cfg).await?;

    match args.cmd {
        Command::Deck(cmd) => deck_cmd(&store, cmd).await,
        Command::Source(cmd) => source_cmd(&store, cmd).await,
        Command::Card(cmd) => card_cmd(&store, cmd).await,
        Command::Due(cmd) => due_cmd(&store, cmd),
        Command::New { blocks } => {
            for c in store.new_cards(&block_ids(blocks)) {
                print_card(&c, Utc::now());
            }
            Ok(())
        }
        Command::Review { card_id, rating } => {
            let log = store.review(&card_id.as_str().into(), rating).await?;
            let card = store.get_card(&card_id.as_str().into())?;
            println!(
                "{} rated {} -> due {} ({} day(s))",
                card.id,
                log.rating,
                card.due().format("%Y-%m-%d %H:%M"),
                log.scheduled_days
            );
            store.save().await?;
            Ok(())
        }
        Command::Study(cmd) => study_cmd(&store, cmd).await,
        Command::Preview { card_id } => {
            for (rating, due) in store.preview(&card_id.as_str().into(), Utc::now())? {
                println!("{rating}\t{}", due.format("%Y-%m-%d %H:%M"));
            }
            Ok(())
        }
        Command::Stats => {
            stats_cmd(&store);
            Ok(())
        }
        Command::Count => {
            println!("{}", store.count_cards());
            Ok(())
        }
        Command::Blocks => {
            for b in store.block_ids() {
                println!("{b}");
            }
            Ok(())
        }
    }
}

/// Opens the store over `data_dir` (or the platform default) and loads it,
/// history included.
pub async fn open_store(data_dir: Option<PathBuf>, cfg: &AppConfig) -> Result<IndexStore> {
    let blobs = match data_dir {
        Some(dir) => FsBlobStore::new(dir),
        None => FsBlobStore::open_default(),
    };
    info!(dir = %blobs.root().display(), "opening store");
    let store = IndexStore::open(
        Arc::new(blobs),
        Arc::new(FsrsScheduler::new(cfg.fsrs_params())),
        cfg.store.clone(),
    );
    store.load().await.context("loading snapshot")?;
    store.wait_for_load().await.context("loading review history")?;
    Ok(store)
}

async fn deck_cmd(store: &IndexStore, cmd: DeckCmd) -> Result<()> {
    match cmd {
        DeckCmd::Add { name, desc, parent } => {
            let mut deck = Deck::new(name);
            deck.desc = desc.unwrap_or_default();
            if let Some(sel) = parent {
                deck = deck.with_parent(resolve_deck(store, &sel)?.id);
            }
            let d = store.add_deck(deck).await?;
            store.save().await?;
            println!("{}", d.id);
        }
        DeckCmd::List => {
            for d in store.list_decks() {
                let parent = d.parent_deck_id.as_ref().map_or("-".to_string(), |p| p.to_string());
                println!("{}\t{}\tparent={}", d.id, d.name, parent);
            }
        }
        DeckCmd::Parent { deck, to } => {
            let d = resolve_deck(store, &deck)?;
            let parent = match to {
                Some(sel) => Some(resolve_deck(store, &sel)?.id),
                None => None,
            };
            store.set_deck_parent(&d.id, parent).await?;
            store.save().await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn source_cmd(store: &IndexStore, cmd: SourceCmd) -> Result<()> {
    match cmd {
        SourceCmd::Add(a) => {
            let deck = match a.deck {
                Some(sel) => resolve_deck(store, &sel)?,
                None => ensure_builtin_deck(store).await?,
            };
            let mut source = CardSource::new(deck.id).with_blocks(a.blocks);
            if let Some(t) = a.source_type {
                source.source_type = t;
            }
            if store.add_card_sources(vec![source.clone()]).is_empty() {
                bail!("card source rejected: unknown deck");
            }
            let now = Utc::now();
            let cards: Vec<Card> = (0..a.cards).map(|_| store.new_card(&source.id, now)).collect();
            let accepted = store.add_cards(cards);
            store.save().await?;
            println!("{}", source.id);
            for c in accepted {
                println!("  {}", c.id);
            }
        }
        SourceCmd::Show { source_id } => {
            let source = store.get_card_source(&source_id.as_str().into())?;
            println!("{}", serde_json::to_string_pretty(&source)?);
        }
    }
    Ok(())
}

async fn card_cmd(store: &IndexStore, cmd: CardCmd) -> Result<()> {
    let now = Utc::now();
    match cmd {
        CardCmd::List(l) => {
            let mut cards = if !l.blocks.is_empty() {
                store.get_cards_by_block_ids(&block_ids(l.blocks))
            } else if let Some(sel) = l.deck {
                store.cards_in_deck(&resolve_deck(store, &sel)?.id, true)?
            } else {
                store.list_cards()
            };
            if let Some(status) = l.status {
                cards = filter_by_due(&cards, now, status.into());
            }
            if let Some(tag) = l.tag {
                cards = filter_by_tag(&cards, &tag);
            }
            for c in cards {
                print_card(&c, now);
            }
        }
        CardCmd::Show { card_id } => {
            let card = store.get_card(&card_id.as_str().into())?;
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        CardCmd::Rm { card_id } => {
            store.remove_card(&card_id.as_str().into())?;
            store.save().await?;
            println!("ok");
        }
        CardCmd::Suspend { card_id } => edit_card(store, &card_id, |c| c.suspend = true).await?,
        CardCmd::Unsuspend { card_id } => edit_card(store, &card_id, |c| c.suspend = false).await?,
        CardCmd::Priority { card_id, priority } => {
            edit_card(store, &card_id, |c| c.set_priority(priority)).await?
        }
        CardCmd::Tag { card_id, tag } => edit_card(store, &card_id, |c| c.tag = tag).await?,
        CardCmd::History { card_id } => {
            for h in store.history_for_card(&card_id.as_str().into()) {
                println!(
                    "{}\t{:?}\tdue={}\treps={}\tlapses={}",
                    h.recorded_at.format("%Y-%m-%d %H:%M"),
                    h.update_result,
                    h.due.format("%Y-%m-%d %H:%M"),
                    h.reps,
                    h.lapses
                );
            }
        }
    }
    Ok(())
}

fn due_cmd(store: &IndexStore, cmd: DueCmd) -> Result<()> {
    let now = Utc::now();
    let cards = if cmd.blocks.is_empty() {
        store.due_cards(now)
    } else {
        store.due_cards_by_block_ids(&block_ids(cmd.blocks), now)
    };
    if cards.is_empty() {
        println!("no cards due");
    }
    for c in cards.into_iter().take(cmd.max) {
        print_card(&c, now);
    }
    Ok(())
}

async fn study_cmd(store: &IndexStore, cmd: StudyCmd) -> Result<()> {
    let now = Utc::now();
    let blocks = block_ids(cmd.blocks);
    let mut pool = if blocks.is_empty() {
        store.due_cards(now)
    } else {
        store.due_cards_by_block_ids(&blocks, now)
    };
    if cmd.include_new && !blocks.is_empty() {
        let fresh = store.new_cards(&blocks);
        pool.extend(fresh.into_iter().filter(|c| !c.is_due(now)));
    }
    if pool.is_empty() {
        println!("no cards due");
        return Ok(());
    }

    let total = pool.len().min(cmd.max);
    let mut count = 0usize;
    for card in pool.into_iter().take(cmd.max) {
        count += 1;
        println!("\n[{count}/{total}] {}", card.id);
        if let Ok(source) = store.get_card_source(&card.card_source_id) {
            for (k, v) in &source.context {
                println!("  {k}: {v}");
            }
        }
        for (rating, due) in store.preview(&card.id, Utc::now())? {
            println!("  {rating:<5} -> {}", due.format("%Y-%m-%d %H:%M"));
        }
        println!("[1=Again, 2=Hard, 3=Good, 4=Easy, s=skip, q=quit]");
        let rating = loop {
            let line = read_line("rating> ")?;
            match line.trim().to_lowercase().as_str() {
                "s" | "skip" => break None,
                "q" | "quit" => {
                    store.save().await?;
                    return Ok(());
                }
                other => match other.parse::<Rating>() {
                    Ok(r) => break Some(r),
                    Err(_) => println!("enter 1-4, s, or q"),
                },
            }
        };

        if let Some(rating) = rating {
            let log = store.review(&card.id, rating).await?;
            println!("-> next due in {} day(s)", log.scheduled_days);
        }
    }

    store.save().await?;
    println!("\nreviewed {count}");
    Ok(())
}

fn stats_cmd(store: &IndexStore) {
    let logs = store.review_logs();
    let s = summarize(&logs);
    let today = Utc::now().date_naive();
    println!(
        "reviews={} again={} hard={} good={} easy={} accuracy={:.1}%",
        s.totals.total,
        s.totals.again,
        s.totals.hard,
        s.totals.good,
        s.totals.easy,
        s.totals.accuracy() * 100.0
    );
    println!("streak={} day(s)", daily_streak(&logs, today));
    for (day, t) in s.per_day.iter().rev().take(7) {
        println!("{day}\t{}\t{:.1}%", t.total, t.accuracy() * 100.0);
    }
}

// ===== Helpers =====
fn block_ids(raw: Vec<String>) -> Vec<BlockId> { raw.into_iter().map(BlockId::from).collect() }

fn print_card(c: &Card, now: DateTime<Utc>) {
    let tag = if c.tag.is_empty() { "-" } else { c.tag.as_str() };
    println!(
        "{}\tsource={}\tdue={}\t{:?}\treps={}\tlapses={}\tpriority={:.2}\ttag={}\tsuspended={}",
        c.id,
        c.card_source_id,
        c.due().format("%Y-%m-%d %H:%M"),
        c.due_status(now),
        c.reps,
        c.lapses,
        c.priority(),
        tag,
        c.suspend
    );
}

async fn edit_card(store: &IndexStore, card_id: &str, edit: impl FnOnce(&mut Card)) -> Result<()> {
    let mut card = store.get_card(&card_id.into())?;
    edit(&mut card);
    store.set_card(card)?;
    store.save().await?;
    println!("ok");
    Ok(())
}

fn resolve_deck(store: &IndexStore, sel: &str) -> Result<Deck> {
    if let Ok(d) = store.get_deck(&DeckId::from(sel)) { return Ok(d); }
    if let Some(d) = store.list_decks().into_iter().find(|d| d.name.eq_ignore_ascii_case(sel)) { return Ok(d); }
    bail!("deck not found: {}", sel)
}

async fn ensure_builtin_deck(store: &IndexStore) -> Result<Deck> {
    if let Ok(d) = store.get_deck(&BUILTIN_DECK_ID.into()) { return Ok(d); }
    Ok(store.add_deck(Deck::builtin()).await?)
}

fn read_line(prompt: &str) -> Result<String> { print!("{prompt}"); stdout().flush().ok(); let mut s = String::new(); stdin().read_line(&mut s)?; Ok(s) }
