use libiotc::State;
use libiotc::backoff::{Backoff, BackoffClass, DEFAULT_BACKOFF_TABLE, DEFAULT_DECAY_TABLE};
use libiotc::event::{Dispatcher, Event};
use libiotc::rng::Rng as RandomSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Seeded(StdRng);

impl RandomSource for Seeded {
    fn random(&mut self) -> u32 {
        self.0.r#gen()
    }
}

fn default_backoff() -> Backoff {
    Backoff::new(&DEFAULT_BACKOFF_TABLE, &DEFAULT_DECAY_TABLE).unwrap()
}

/// Fires every due decay event up to `now`.
fn run_decay(backoff: &mut Backoff, dispatcher: &mut Dispatcher<Event>, now: u64) {
    dispatcher.step(now).unwrap();
    while let Some(event) = dispatcher.next_ready() {
        assert_eq!(event, Event::BackoffDecay);
        backoff.decay(dispatcher).unwrap();
    }
}

#[test]
fn test_index_is_monotonic_and_bounded() {
    let mut rng = StdRng::seed_from_u64(31);
    let failures = [State::Timeout, State::SocketConnection, State::MqttBadUsernameOrPassword, State::TlsConnect];
    let mut backoff = default_backoff();
    let mut dispatcher = Dispatcher::new();
    let mut last = backoff.index();
    for _ in 0..100 {
        let state = failures[rng.gen_range(0..failures.len())];
        let class = backoff.update(state, &mut dispatcher).unwrap();
        assert_ne!(class, BackoffClass::None);
        assert!(backoff.index() >= last);
        assert!(backoff.index() < DEFAULT_BACKOFF_TABLE.len());
        last = backoff.index();
    }
    assert_eq!(backoff.index(), DEFAULT_BACKOFF_TABLE.len() - 1);
}

#[test]
fn test_single_entry_table_stays_at_zero() {
    let mut backoff = Backoff::new(&[5], &[10]).unwrap();
    let mut dispatcher = Dispatcher::new();
    for _ in 0..10 {
        backoff.update(State::Timeout, &mut dispatcher).unwrap();
        assert_eq!(backoff.index(), 0);
    }
}

#[test]
fn test_penalty_within_jitter_bounds() {
    let mut random = Seeded(StdRng::seed_from_u64(32));
    let mut dispatcher = Dispatcher::new();
    for failures in 0..DEFAULT_BACKOFF_TABLE.len() {
        let mut backoff = default_backoff();
        for _ in 0..failures {
            backoff.update(State::Timeout, &mut dispatcher).unwrap();
        }
        let index = backoff.index();
        let base = i64::from(DEFAULT_BACKOFF_TABLE[index]);
        let half_range = (i64::from(DEFAULT_BACKOFF_TABLE[index.saturating_sub(1)]) / 2).max(1);
        for _ in 0..1000 {
            let penalty = backoff.penalty(&mut random) as i64;
            assert!(penalty >= (base - half_range).max(0), "penalty {} at index {}", penalty, index);
            assert!(penalty <= base + half_range, "penalty {} at index {}", penalty, index);
        }
    }
}

#[test]
fn test_success_decays_one_step_per_tick() {
    let mut backoff = default_backoff();
    let mut dispatcher = Dispatcher::new();
    for _ in 0..3 {
        backoff.update(State::Timeout, &mut dispatcher).unwrap();
    }
    assert_eq!(backoff.index(), 3);

    assert_eq!(backoff.update(State::Ok, &mut dispatcher).unwrap(), BackoffClass::None);
    assert_eq!(backoff.index(), 3);

    // decay table: 16s at index 3, 8s at 2, 4s at 1
    let mut observed = vec![backoff.index()];
    for now in 1..=40 {
        run_decay(&mut backoff, &mut dispatcher, now);
        if observed.last() != Some(&backoff.index()) {
            observed.push(backoff.index());
        }
        match now {
            15 => assert_eq!(backoff.index(), 3),
            16 => assert_eq!(backoff.index(), 2),
            24 => assert_eq!(backoff.index(), 1),
            28 => assert_eq!(backoff.index(), 0),
            _ => {}
        }
    }
    assert_eq!(observed, vec![3, 2, 1, 0]);
    assert!(!dispatcher.is_scheduled(backoff.decay_event()));
}

#[test]
fn test_failure_restarts_pending_decay() {
    let mut backoff = default_backoff();
    let mut dispatcher = Dispatcher::new();
    backoff.update(State::Timeout, &mut dispatcher).unwrap();
    run_decay(&mut backoff, &mut dispatcher, 3);
    backoff.update(State::Timeout, &mut dispatcher).unwrap();
    assert_eq!(dispatcher.scheduled(), 1);
    assert_eq!(dispatcher.remaining(backoff.decay_event()), Some(8));
}

#[test]
fn test_cancel_resets() {
    let mut backoff = default_backoff();
    let mut dispatcher = Dispatcher::new();
    backoff.update(State::MqttNotAuthorized, &mut dispatcher).unwrap();
    assert_eq!(backoff.class(), BackoffClass::Terminal);
    backoff.cancel(&mut dispatcher).unwrap();
    assert_eq!(backoff.index(), 0);
    assert_eq!(backoff.class(), BackoffClass::None);
    assert_eq!(dispatcher.scheduled(), 0);
}
