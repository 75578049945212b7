//! Elastic thread pool for offloading command execution.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::debug;

/// A unit of work accepted by the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pool sizing parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// Prefix of worker thread names.
    pub name: String,
    /// Workers kept alive even when idle.
    pub low_watermark: usize,
    /// Hard cap on live workers.
    pub high_watermark: usize,
    /// Tasks that may wait in the queue before `execute` refuses.
    pub max_queue_size: usize,
    /// How long an extra worker waits for work before exiting.
    pub idle_time: Duration,
}

/// Errors validating [`Options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `low_watermark` exceeds `high_watermark`.
    WatermarksInverted,
    /// `high_watermark` is zero.
    NoThreads,
    /// `max_queue_size` is zero.
    NoQueue,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Stopping,
    Stopped,
}

struct Inner {
    state: State,
    tasks: VecDeque<Task>,
    live_threads: usize,
    idle_threads: usize,
    next_worker_id: usize,
}

struct Shared {
    inner: Mutex<Inner>,
    task_arrived: Condvar,
    all_stopped: Condvar,
    options: Options,
}

/// Work-queue thread pool with low/high watermarks and idle shrinking.
///
/// While running, the live worker count stays between the watermarks:
/// a task arriving with no idle worker spawns one up to the high
/// watermark, and a worker idle past `idle_time` exits while the count
/// exceeds the low watermark. Clones share the same pool.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Validates `options`, spawns `low_watermark` workers and starts
    /// accepting tasks.
    pub fn start(options: Options) -> Result<Self> {
        if options.high_watermark == 0 {
            return Err(Error::NoThreads);
        }
        if options.low_watermark > options.high_watermark {
            return Err(Error::WatermarksInverted);
        }
        if options.max_queue_size == 0 {
            return Err(Error::NoQueue);
        }
        let executor = Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: State::Running,
                    tasks: VecDeque::new(),
                    live_threads: 0,
                    idle_threads: 0,
                    next_worker_id: 0,
                }),
                task_arrived: Condvar::new(),
                all_stopped: Condvar::new(),
                options,
            }),
        };
        {
            let mut inner = executor.lock();
            for _ in 0..executor.shared.options.low_watermark {
                spawn_worker(&executor.shared, &mut inner);
            }
        }
        Ok(executor)
    }

    /// Schedules `task`; false when the pool is not running or the queue
    /// is at capacity. An accepted task runs exactly once.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.try_execute(Box::new(task)).is_ok()
    }

    /// Boxed variant that hands the task back on rejection so the caller
    /// can run it elsewhere.
    pub fn try_execute(&self, task: Task) -> std::result::Result<(), Task> {
        let mut inner = self.lock();
        if inner.state != State::Running
            || inner.tasks.len() >= self.shared.options.max_queue_size
        {
            return Err(task);
        }
        inner.tasks.push_back(task);
        if inner.idle_threads == 0 && inner.live_threads < self.shared.options.high_watermark {
            spawn_worker(&self.shared, &mut inner);
        }
        self.shared.task_arrived.notify_one();
        Ok(())
    }

    /// Stops accepting tasks. Work already queued is still drained by
    /// the workers; with `wait` the call blocks until the last one
    /// exits.
    pub fn stop(&self, wait: bool) {
        let mut inner = self.lock();
        if inner.state == State::Running {
            inner.state = State::Stopping;
            self.shared.task_arrived.notify_all();
        }
        if inner.live_threads == 0 {
            inner.state = State::Stopped;
            return;
        }
        if wait {
            while inner.live_threads > 0 {
                inner = self.shared.all_stopped.wait(inner).expect("executor mutex poisoned");
            }
        }
    }

    /// Number of live worker threads.
    pub fn live_threads(&self) -> usize {
        self.lock().live_threads
    }

    /// Whether `execute` may still accept work.
    pub fn is_running(&self) -> bool {
        self.lock().state == State::Running
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().expect("executor mutex poisoned")
    }
}

fn spawn_worker(shared: &Arc<Shared>, inner: &mut Inner) {
    let id = inner.next_worker_id;
    inner.next_worker_id += 1;
    let name = format!("{}-{}", shared.options.name, id);
    let cloned = Arc::clone(shared);
    match thread::Builder::new().name(name).spawn(move || worker_loop(cloned)) {
        Ok(_) => inner.live_threads += 1,
        Err(err) => debug!(error = %err, "could not spawn pool worker"),
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let mut inner = shared.inner.lock().expect("executor mutex poisoned");
    loop {
        if let Some(task) = inner.tasks.pop_front() {
            drop(inner);
            task();
            inner = shared.inner.lock().expect("executor mutex poisoned");
            continue;
        }
        match inner.state {
            State::Running => {
                inner.idle_threads += 1;
                let (guard, timeout) = shared
                    .task_arrived
                    .wait_timeout(inner, shared.options.idle_time)
                    .expect("executor mutex poisoned");
                inner = guard;
                inner.idle_threads -= 1;
                if timeout.timed_out()
                    && inner.tasks.is_empty()
                    && inner.state == State::Running
                    && inner.live_threads > shared.options.low_watermark
                {
                    break;
                }
            }
            // stopping: the queue is empty at this point, nothing left
            // to drain
            State::Stopping | State::Stopped => break,
        }
    }
    inner.live_threads -= 1;
    if inner.live_threads == 0 && inner.state != State::Running {
        inner.state = State::Stopped;
        shared.all_stopped.notify_all();
    }
}
