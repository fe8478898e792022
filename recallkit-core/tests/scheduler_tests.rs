use chrono::{Duration, Utc};
use recallkit_core::{
    AlgorithmState, CardPhase, FsrsParams, FsrsScheduler, Rating, Scheduler, SchedulingOutcomes,
};

fn fsrs_state(outcomes: &SchedulingOutcomes, rating: Rating) -> AlgorithmState {
    outcomes[&rating].state.clone()
}

#[test]
fn new_card_branches() {
    let scheduler = FsrsScheduler::default();
    let now = Utc::now();
    let state = scheduler.initial_state(now);

    let out = scheduler.repeat(&state, now, 0.9).unwrap();

    assert_eq!(out.len(), 4);
    assert_eq!(out[&Rating::Again].due, now + Duration::minutes(1));
    assert_eq!(out[&Rating::Hard].due, now + Duration::minutes(5));
    assert_eq!(out[&Rating::Good].due, now + Duration::minutes(10));
    assert_eq!(out[&Rating::Good].state.phase(), CardPhase::Learning);

    let easy = &out[&Rating::Easy];
    assert_eq!(easy.state.phase(), CardPhase::Review);
    assert!(easy.due >= now + Duration::days(1));
    assert!(easy.log.scheduled_days >= 1);
    assert_eq!(easy.log.phase, CardPhase::New);
    for info in out.values() {
        assert_eq!(info.state.reps(), 1);
        assert_eq!(info.state.last_review(), Some(now));
    }
}

#[test]
fn review_card_orders_intervals() {
    let scheduler = FsrsScheduler::default();
    let start = Utc::now();
    let first = scheduler
        .repeat(&scheduler.initial_state(start), start, 0.9)
        .unwrap();
    let graduated = fsrs_state(&first, Rating::Easy);
    let now = graduated.due();

    let out = scheduler.repeat(&graduated, now, 0.9).unwrap();

    let again = &out[&Rating::Again];
    assert_eq!(again.state.phase(), CardPhase::Relearning);
    assert_eq!(again.due, now + Duration::minutes(5));
    let AlgorithmState::Fsrs(lapsed) = &again.state;
    assert_eq!(lapsed.lapses, 1);

    let hard = out[&Rating::Hard].log.scheduled_days;
    let good = out[&Rating::Good].log.scheduled_days;
    let easy = out[&Rating::Easy].log.scheduled_days;
    assert!(hard >= 1);
    assert!(hard <= good);
    assert!(good < easy);
    assert!(out[&Rating::Good].log.elapsed_days >= 1);
}

#[test]
fn learning_card_graduates_on_good() {
    let scheduler = FsrsScheduler::default();
    let now = Utc::now();
    let first = scheduler
        .repeat(&scheduler.initial_state(now), now, 0.9)
        .unwrap();
    let learning = fsrs_state(&first, Rating::Good);
    let later = learning.due();

    let out = scheduler.repeat(&learning, later, 0.9).unwrap();

    assert_eq!(out[&Rating::Again].state.phase(), CardPhase::Learning);
    assert_eq!(out[&Rating::Again].due, later + Duration::minutes(5));
    assert_eq!(out[&Rating::Good].state.phase(), CardPhase::Review);
    assert!(out[&Rating::Good].due < out[&Rating::Easy].due);
}

#[test]
fn higher_retention_shortens_intervals() {
    let scheduler = FsrsScheduler::default();
    let now = Utc::now();
    let state = scheduler.initial_state(now);

    let strict = scheduler.repeat(&state, now, 0.95).unwrap();
    let loose = scheduler.repeat(&state, now, 0.7).unwrap();

    assert!(strict[&Rating::Easy].due < loose[&Rating::Easy].due);
}

#[test]
fn maximum_interval_caps_scheduling() {
    let scheduler = FsrsScheduler::new(FsrsParams {
        maximum_interval: 2.0,
        ..FsrsParams::default()
    });
    let now = Utc::now();

    let out = scheduler
        .repeat(&scheduler.initial_state(now), now, 0.5)
        .unwrap();

    assert_eq!(out[&Rating::Easy].log.scheduled_days, 2);
}
