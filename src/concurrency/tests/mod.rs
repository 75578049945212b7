use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::concurrency::{Error, Executor, Options};

fn options(low: usize, high: usize, queue: usize, idle_ms: u64) -> Options {
    Options {
        name: "test-pool".to_string(),
        low_watermark: low,
        high_watermark: high,
        max_queue_size: queue,
        idle_time: Duration::from_millis(idle_ms),
    }
}

/// Polls `probe` until it returns true or the deadline passes.
fn eventually(what: &str, probe: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if probe() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

/// Latch that holds submitted tasks inside the pool until released, and
/// counts how many of them have started.
struct Gate {
    started: AtomicUsize,
    open: Mutex<bool>,
    released: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            open: Mutex::new(false),
            released: Condvar::new(),
        })
    }

    fn hold(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().expect("gate poisoned");
        while !*open {
            open = self.released.wait(open).expect("gate poisoned");
        }
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn release(&self) {
        *self.open.lock().expect("gate poisoned") = true;
        self.released.notify_all();
    }
}

#[test]
fn start_validates_options() {
    assert_eq!(Executor::start(options(4, 2, 8, 100)).err(), Some(Error::WatermarksInverted));
    assert_eq!(Executor::start(options(0, 0, 8, 100)).err(), Some(Error::NoThreads));
    assert_eq!(Executor::start(options(1, 2, 0, 100)).err(), Some(Error::NoQueue));
}

#[test]
fn starts_at_the_low_watermark() {
    let pool = Executor::start(options(3, 8, 8, 60_000)).expect("valid options");
    assert_eq!(pool.live_threads(), 3);
    assert!(pool.is_running());
    pool.stop(true);
    assert_eq!(pool.live_threads(), 0);
}

#[test]
fn runs_every_accepted_task_exactly_once() {
    let pool = Executor::start(options(2, 4, 64, 60_000)).expect("valid options");
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..32 {
        let counter = Arc::clone(&counter);
        assert!(pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    eventually("all tasks to run", || counter.load(Ordering::SeqCst) == 32);
    pool.stop(true);
    assert_eq!(counter.load(Ordering::SeqCst), 32);
}

#[test]
fn grows_to_the_high_watermark_then_queues_then_refuses() {
    let pool = Executor::start(options(2, 4, 2, 60_000)).expect("valid options");
    let gate = Gate::new();

    // each blocking task is seen started before the next is submitted,
    // so a fresh worker is spawned once no thread is idle
    for expected in 1..=4 {
        let task_gate = Arc::clone(&gate);
        assert!(pool.execute(move || task_gate.hold()));
        eventually("task to start", || gate.started() == expected);
    }
    assert_eq!(pool.live_threads(), 4);

    // all four workers are busy: the queue takes two more
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let done = Arc::clone(&done);
        assert!(pool.execute(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }));
    }

    // queue full: the seventh task is refused
    assert!(!pool.execute(|| {}));

    gate.release();
    eventually("queued tasks to run", || done.load(Ordering::SeqCst) == 2);
    pool.stop(true);
}

#[test]
fn idle_workers_shrink_back_to_the_low_watermark() {
    let pool = Executor::start(options(2, 4, 4, 50)).expect("valid options");
    let gate = Gate::new();
    for expected in 1..=4 {
        let task_gate = Arc::clone(&gate);
        assert!(pool.execute(move || task_gate.hold()));
        eventually("task to start", || gate.started() == expected);
    }
    assert_eq!(pool.live_threads(), 4);
    gate.release();

    eventually("pool to shrink", || pool.live_threads() == 2);
    // the pool never goes below the low watermark
    thread::sleep(Duration::from_millis(200));
    assert_eq!(pool.live_threads(), 2);
    pool.stop(true);
}

#[test]
fn queued_tasks_are_drained_even_without_awaiting_stop() {
    let pool = Executor::start(options(1, 1, 8, 60_000)).expect("valid options");
    let gate = Gate::new();
    {
        let gate = Arc::clone(&gate);
        assert!(pool.execute(move || gate.hold()));
    }
    eventually("blocking task to start", || gate.started() == 1);

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let done = Arc::clone(&done);
        assert!(pool.execute(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }));
    }

    // returns immediately; the queue is still owed five runs
    pool.stop(false);
    assert_eq!(done.load(Ordering::SeqCst), 0);
    gate.release();
    eventually("queue to drain after stop", || done.load(Ordering::SeqCst) == 5);
    eventually("workers to exit", || pool.live_threads() == 0);
}

#[test]
fn stop_await_blocks_until_workers_are_gone() {
    let pool = Executor::start(options(2, 4, 16, 60_000)).expect("valid options");
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        assert!(pool.execute(move || {
            thread::sleep(Duration::from_millis(20));
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.stop(true);
    assert_eq!(counter.load(Ordering::SeqCst), 8);
    assert_eq!(pool.live_threads(), 0);
    assert!(!pool.is_running());
}

#[test]
fn execute_after_stop_is_refused() {
    let pool = Executor::start(options(1, 2, 8, 60_000)).expect("valid options");
    pool.stop(true);
    assert!(!pool.execute(|| {}));
    let returned = pool.try_execute(Box::new(|| {}));
    assert!(returned.is_err());
}

#[test]
fn rejected_tasks_are_handed_back_runnable() {
    let pool = Executor::start(options(1, 1, 1, 60_000)).expect("valid options");
    let gate = Gate::new();
    {
        let gate = Arc::clone(&gate);
        assert!(pool.execute(move || gate.hold()));
    }
    eventually("blocking task to start", || gate.started() == 1);
    // fill the single queue slot
    assert!(pool.execute(|| {}));

    let ran = Arc::new(AtomicUsize::new(0));
    let task = {
        let ran = Arc::clone(&ran);
        Box::new(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
    };
    let task = pool.try_execute(task).expect_err("queue is full");
    task();
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    gate.release();
    pool.stop(true);
}
