use libiotc::State;
use libiotc::event::{Dispatcher, TimeEventHandle, TimeEventHeap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn drain(heap: &mut TimeEventHeap<u32>) -> Vec<(u64, u32)> {
    let mut out = Vec::new();
    while let Some(entry) = heap.pop() {
        out.push(entry);
    }
    out
}

#[test]
fn test_pop_order_is_sorted() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..50 {
        let mut heap = TimeEventHeap::new();
        let count = rng.gen_range(1..200);
        for id in 0..count {
            heap.add(rng.gen_range(0..64), id).unwrap();
        }
        let popped = drain(&mut heap);
        assert_eq!(popped.len(), count as usize);
        assert!(popped.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }
}

#[test]
fn test_equal_times_pop_in_insertion_order() {
    let mut heap = TimeEventHeap::new();
    for id in 0..20 {
        heap.add(5, id).unwrap();
    }
    let ids: Vec<u32> = drain(&mut heap).into_iter().map(|(_, id)| id).collect();
    assert_eq!(ids, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_random_cancel_and_restart_keep_heap_consistent() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut heap = TimeEventHeap::new();
    let mut live: Vec<(TimeEventHandle, u64, u32)> = Vec::new();

    for id in 0..500u32 {
        match rng.gen_range(0..4) {
            0 | 1 => {
                let time = rng.gen_range(0..1000);
                live.push((heap.add(time, id).unwrap(), time, id));
            }
            2 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let (mut handle, _, _) = live.swap_remove(index);
                heap.cancel(&mut handle).unwrap();
                assert!(handle.is_null());
                assert!(!heap.contains(&handle));
            }
            3 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let time = rng.gen_range(0..1000);
                heap.restart(&live[index].0, time).unwrap();
                live[index].1 = time;
            }
            _ => {}
        }
        assert_eq!(heap.len(), live.len());
        for (handle, time, _) in &live {
            assert_eq!(heap.time_of(handle), Some(*time));
        }
    }

    let popped = drain(&mut heap);
    assert!(popped.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    let mut expected: Vec<(u64, u32)> = live.iter().map(|(_, time, id)| (*time, *id)).collect();
    let mut actual = popped.clone();
    expected.sort_unstable();
    actual.sort_unstable();
    assert_eq!(actual, expected);
}

#[test]
fn test_stale_handles() {
    let mut heap = TimeEventHeap::new();
    let mut fired = heap.add(1, 1u32).unwrap();
    let pending = heap.add(2, 2u32).unwrap();
    assert_eq!(heap.pop(), Some((1, 1)));

    // The freed slot is reused; the old handle must not reach the new event.
    let reused = heap.add(3, 3u32).unwrap();
    assert!(!heap.contains(&fired));
    assert_eq!(heap.restart(&fired, 10), Err(State::ElementNotFound));
    assert_eq!(heap.cancel(&mut fired), Ok(()));
    assert!(fired.is_null());
    assert!(heap.contains(&pending));
    assert!(heap.contains(&reused));
    assert_eq!(heap.len(), 2);
}

#[test]
fn test_restart_null_handle() {
    let mut heap: TimeEventHeap<u32> = TimeEventHeap::new();
    assert_eq!(heap.restart(&TimeEventHandle::null(), 1), Err(State::ElementNotFound));
}

#[test]
fn test_dispatcher_runs_due_events_in_time_order() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.execute_in(3, "late").unwrap();
    dispatcher.execute_in(1, "early").unwrap();
    dispatcher.execute("now").unwrap();
    assert_eq!(dispatcher.timeout(), Some(0));
    assert_eq!(dispatcher.next_ready(), Some("now"));
    assert_eq!(dispatcher.timeout(), Some(1));

    dispatcher.step(5).unwrap();
    assert_eq!(dispatcher.next_ready(), Some("early"));
    assert_eq!(dispatcher.next_ready(), Some("late"));
    assert_eq!(dispatcher.next_ready(), None);
    assert!(dispatcher.is_idle());
    assert_eq!(dispatcher.timeout(), None);
}

#[test]
fn test_dispatcher_repeating_event() {
    let mut dispatcher = Dispatcher::new();
    let mut handle = dispatcher.execute_every(2, 7u8).unwrap();
    let mut fired = 0;
    for now in 1..=10 {
        dispatcher.step(now).unwrap();
        while dispatcher.next_ready().is_some() {
            fired += 1;
        }
    }
    assert_eq!(fired, 5);
    assert!(dispatcher.is_scheduled(&handle));
    dispatcher.cancel(&mut handle).unwrap();
    assert_eq!(dispatcher.scheduled(), 0);
}

#[test]
fn test_dispatcher_restart_is_relative_to_current_step() {
    let mut dispatcher = Dispatcher::new();
    let handle = dispatcher.execute_in(10, ()).unwrap();
    dispatcher.step(4).unwrap();
    dispatcher.restart(&handle, 10).unwrap();
    assert_eq!(dispatcher.remaining(&handle), Some(10));
    dispatcher.step(13).unwrap();
    assert!(!dispatcher.has_ready());
    dispatcher.step(14).unwrap();
    assert!(dispatcher.has_ready());
}
