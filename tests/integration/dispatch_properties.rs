//! Queue-level properties observed through real threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use handler_demo::dispatch::{DispatchQueue, Task};
use handler_demo::workload::insert_letter;
use handler_demo::Error;

use crate::fixtures::OwnedSurface;

const PRODUCERS: usize = 8;
const TASKS_PER_PRODUCER: usize = 125;

#[test]
fn test_no_lost_submissions_from_many_producers() {
    let (queue, owner) = DispatchQueue::spawn_owner("many-producers").unwrap();
    let owner_id = owner.thread().id();
    let runs = Arc::new(Mutex::new(HashMap::<(usize, usize), u32>::new()));
    let wrong_thread = Arc::new(AtomicU64::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            let runs = runs.clone();
            let wrong_thread = wrong_thread.clone();
            thread::spawn(move || {
                for i in 0..TASKS_PER_PRODUCER {
                    let runs = runs.clone();
                    let wrong_thread = wrong_thread.clone();
                    queue
                        .submit(move || {
                            if thread::current().id() != owner_id {
                                wrong_thread.fetch_add(1, Ordering::SeqCst);
                            }
                            *runs.lock().unwrap().entry((p, i)).or_insert(0) += 1;
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    queue.stop();
    let report = owner.join().unwrap().unwrap();

    let total = PRODUCERS * TASKS_PER_PRODUCER;
    assert_eq!(report.executed, total as u64);
    assert_eq!(wrong_thread.load(Ordering::SeqCst), 0);
    let runs = runs.lock().unwrap();
    assert_eq!(runs.len(), total);
    assert!(runs.values().all(|n| *n == 1), "a task ran more than once");
}

#[test]
fn test_fifo_per_producer_under_contention() {
    let (queue, owner) = DispatchQueue::spawn_owner("fifo-contention").unwrap();
    let seen = Arc::new(Mutex::new(Vec::<(usize, usize)>::new()));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let seen = seen.clone();
                    queue.submit(move || seen.lock().unwrap().push((p, i))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    queue.stop();
    owner.join().unwrap().unwrap();

    let seen = seen.lock().unwrap();
    for p in 0..4 {
        let order: Vec<usize> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_eq!(order, (0..200).collect::<Vec<_>>(), "producer {} reordered", p);
    }
}

#[test]
fn test_single_writer_thread_for_all_mutations() {
    let owned = OwnedSurface::start("single-writer");
    let writers = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let surface = owned.surface.clone();
            let writers = writers.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let s = surface.clone();
                    let writers = writers.clone();
                    surface
                        .queue()
                        .submit_task(Task::fallible(move || {
                            writers.lock().unwrap().push(thread::current().id());
                            insert_letter(&s, 'a', 1.0)
                        }))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let owner_id = owned.owner.thread().id();
    let text = owned.on_owner(|s| s.get_text()).unwrap();
    let report = owned.finish();

    assert_eq!(text, "a".repeat(100));
    assert_eq!(report.failed, 0);
    let writers = writers.lock().unwrap();
    assert_eq!(writers.len(), 100);
    assert!(writers.iter().all(|id| *id == owner_id));
}

#[test]
fn test_end_to_end_order_and_failure_isolation() {
    let owned = OwnedSurface::start("end-to-end");

    for letter in ['X', 'Y'] {
        let s = owned.surface.clone();
        owned
            .queue
            .submit_task(Task::fallible(move || insert_letter(&s, letter, 0.0)))
            .unwrap();
    }
    assert_eq!(owned.on_owner(|s| s.get_text()).unwrap(), "YX");

    owned
        .queue
        .submit(|| panic!("task raised on purpose"))
        .unwrap();
    let s = owned.surface.clone();
    owned
        .queue
        .submit_task(Task::fallible(move || s.set_text("Z")))
        .unwrap();

    assert_eq!(owned.on_owner(|s| s.get_text()).unwrap(), "Z");
    assert!(!owned.owner.is_finished(), "owner loop died");

    let report = owned.finish();
    assert_eq!(report.failed, 1);
}

#[test]
fn test_off_thread_mutation_fails_immediately() {
    let owned = OwnedSurface::start("violation");
    let surface = owned.surface.clone();

    let result = thread::spawn(move || surface.set_text("from a worker"))
        .join()
        .unwrap();
    assert!(matches!(result, Err(Error::OwnerThreadViolation { .. })));
    assert_eq!(owned.on_owner(|s| s.get_text()).unwrap(), "");
    assert_eq!(owned.surface.off_thread_writes(), 0);
    owned.finish();
}

#[test]
fn test_stop_rejects_late_submissions_without_blocking() {
    let owned = OwnedSurface::start("late-submit");
    let ran = Arc::new(AtomicU64::new(0));
    for _ in 0..10 {
        let ran = ran.clone();
        owned
            .queue
            .submit(move || {
                thread::sleep(Duration::from_millis(1));
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    let queue = owned.queue.clone();
    let report = owned.finish();

    // Everything accepted before stop still ran.
    assert_eq!(report.executed, 10);
    assert_eq!(ran.load(Ordering::SeqCst), 10);

    let late = thread::spawn(move || queue.submit(|| {})).join().unwrap();
    assert!(matches!(late, Err(Error::SubmitAfterStop)));
}
