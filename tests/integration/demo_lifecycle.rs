//! Full demo start and shutdown.

use std::time::Duration;

use handler_demo::app::{Demo, UiEvent, COLORER_NAME, INSERTER_NAME};
use handler_demo::config::{DelayPolicy, SubmitMode};
use handler_demo::render::StatePublisher;
use handler_demo::surface::{Argb, WidgetId, BUTTON_COUNT};
use handler_demo::workload::LETTERS;

use crate::fixtures::{fast_config, wait_until};

#[test]
fn test_queue_mode_has_no_racy_writes() {
    let (publisher, states) = StatePublisher::channel();
    let demo = Demo::start(
        &fast_config(SubmitMode::ViaQueue, SubmitMode::ViaQueue),
        crossbeam_channel::never(),
        Some(publisher),
    )
    .unwrap();

    wait_until("50 tasks", || demo.queue().stats().executed >= 50);
    let report = demo.shutdown().unwrap();

    assert_eq!(report.off_thread_writes, 0);
    assert_eq!(report.queue.failed, 0);
    assert_eq!(report.queue.pending(), 0);
    assert!(report.text.bytes().all(|b| LETTERS.contains(&b)));

    let by_name = |name: &str| {
        report
            .workers
            .iter()
            .find(|w| w.name == name)
            .cloned()
            .unwrap()
    };
    let inserter = by_name(INSERTER_NAME);
    let colorer = by_name(COLORER_NAME);
    assert_eq!(inserter.direct_runs + colorer.direct_runs, 0);
    assert_eq!(report.text.chars().count() as u64, inserter.submitted);
    assert_eq!(
        report.queue.executed,
        inserter.submitted + colorer.submitted
    );

    let last = states.try_iter().last().unwrap();
    assert!(last.surface.colors.iter().any(|c| *c != Argb::DEFAULT));
}

#[test]
fn test_direct_insertion_is_counted_and_flagged() {
    let config = fast_config(SubmitMode::Direct, SubmitMode::ViaQueue);
    let demo = Demo::start(&config, crossbeam_channel::never(), None).unwrap();

    wait_until("racy writes", || demo.surface().off_thread_writes() >= 20);
    let report = demo.shutdown().unwrap();

    let inserter = report
        .workers
        .iter()
        .find(|w| w.name == INSERTER_NAME)
        .unwrap();
    assert_eq!(inserter.submitted, 0);
    assert!(inserter.direct_runs > 0);
    // Colour changes still went through the queue.
    assert!(report.queue.submitted > 0);
    assert!(report.off_thread_writes >= 20);
}

#[test]
fn test_clicks_survive_concurrent_recolouring() {
    let mut config = fast_config(SubmitMode::ViaQueue, SubmitMode::ViaQueue);
    config.inserter.delay = DelayPolicy::Fixed { ms: 60_000 };
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let (publisher, states) = StatePublisher::channel();
    let demo = Demo::start(&config, event_rx, Some(publisher)).unwrap();

    for index in 0..BUTTON_COUNT {
        event_tx
            .send(UiEvent::Click(WidgetId::new(index).unwrap()))
            .unwrap();
    }
    // The colorer keeps the owner publishing, so a complete snapshot shows up.
    wait_until("all clicks rendered", || {
        states
            .try_iter()
            .last()
            .is_some_and(|s| s.surface.clicked.iter().all(|c| *c))
    });
    let report = demo.shutdown().unwrap();

    assert_eq!(report.clicked, BUTTON_COUNT);
    assert_eq!(report.owner.events, BUTTON_COUNT as u64);
    assert_eq!(report.off_thread_writes, 0);
}

#[test]
fn test_shutdown_is_prompt_with_long_delays() {
    let mut config = fast_config(SubmitMode::ViaQueue, SubmitMode::ViaQueue);
    config.inserter.delay = DelayPolicy::Fixed { ms: 60_000 };
    config.colorer.delay = DelayPolicy::Fixed { ms: 60_000 };
    let demo = Demo::start(&config, crossbeam_channel::never(), None).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let started = std::time::Instant::now();
    let report = demo.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(report.workers.iter().all(|w| w.cycles == 0));
    assert_eq!(report.text, "");
}

#[test]
fn test_panicking_click_callback_does_not_stop_owner() {
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let demo = Demo::start(
        &fast_config(SubmitMode::ViaQueue, SubmitMode::ViaQueue),
        event_rx,
        None,
    )
    .unwrap();
    let (hit_tx, hit_rx) = crossbeam_channel::bounded(1);
    demo.surface().on_click(move |_, widget| {
        let _ = hit_tx.try_send(widget);
        panic!("click callback bug");
    });

    let target = WidgetId::new(0).unwrap();
    event_tx.send(UiEvent::Click(target)).unwrap();
    assert_eq!(hit_rx.recv_timeout(Duration::from_secs(5)), Ok(target));
    let before = demo.queue().stats().executed;
    wait_until("tasks after the bad click", || {
        demo.queue().stats().executed >= before + 10
    });

    let report = demo.shutdown().unwrap();
    assert_eq!(report.owner.callback_panics, 1);
    assert_eq!(report.owner.events, 1);
    assert_eq!(report.queue.pending(), 0);
    assert_eq!(report.clicked, 0);
}
