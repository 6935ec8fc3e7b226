// src/pool/worker.rs
//! A bounded, fixed-size worker pool.
//!
//! A ring-buffer task queue (`tasks`/`capacity`, `VecDeque`-backed) guarded
//! by one mutex and two condition variables (`not_empty`, `not_full`), and a
//! fixed number of executor threads that each loop
//! wait-while-empty/dequeue/run/repeat. `submit` blocks while the queue is
//! full, giving the pool natural backpressure instead of an unbounded task
//! backlog.
//!
//! Two properties worth calling out:
//!
//! - Executors isolate a panicking task with [`std::panic::catch_unwind`]
//!   (see the crate's `Cargo.toml`, which deliberately does not set
//!   `panic = "abort"` so this can unwind) so one bad task cannot silently
//!   stop an executor thread and shrink the pool's effective capacity.
//! - Shutdown calls [`std::thread::JoinHandle::join`] on each executor
//!   directly: a native join blocks exactly until the thread exits, with no
//!   need for a polling loop.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use super::task::{Task, TaskId};
use crate::log;

struct QueueState {
    tasks: VecDeque<Task>,
    capacity: usize,
    shutdown: bool,
}

struct SharedQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl SharedQueue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::with_capacity(capacity),
                capacity,
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Blocks while the queue is full, then enqueues `task` at the rear and
    /// wakes one waiting executor. If shutdown has already been requested,
    /// silently drops `task` without enqueuing and returns `false`.
    fn push(&self, task: Task) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.tasks.len() >= state.capacity && !state.shutdown {
            state = self.not_full.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        if state.shutdown {
            return false;
        }
        state.tasks.push_back(task);
        drop(state);
        self.not_empty.notify_one();
        true
    }

    /// Blocks while the queue is empty and not shut down. Returns `None` once
    /// shutdown has been requested and the queue has drained.
    fn pop(&self) -> Option<Task> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(task) = state.tasks.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(task);
            }
            if state.shutdown {
                return None;
            }
            state = self.not_empty.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn begin_shutdown(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.shutdown = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).tasks.len()
    }
}

/// A fixed-size pool of executor threads draining a bounded task queue.
pub struct WorkerPool {
    queue: Arc<SharedQueue>,
    executors: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl WorkerPool {
    /// Spawns `executor_count` executor threads draining a queue bounded at
    /// `queue_capacity` tasks.
    pub fn create(executor_count: usize, queue_capacity: usize) -> Arc<Self> {
        let queue = Arc::new(SharedQueue::new(queue_capacity.max(1)));
        let pool = Arc::new(Self {
            queue,
            executors: Mutex::new(Vec::with_capacity(executor_count)),
            next_id: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        });

        let mut handles = Vec::with_capacity(executor_count);
        for index in 0..executor_count.max(1) {
            let queue = Arc::clone(&pool.queue);
            let handle = std::thread::Builder::new()
                .name(format!("thread-pool-{index}"))
                .spawn(move || executor_routine(queue))
                .expect("failed to spawn worker pool executor thread");
            handles.push(handle);
        }
        *pool
            .executors
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = handles;
        pool
    }

    /// Submits a job, blocking if the queue is momentarily full. Assigns and
    /// returns the task's id in submission order, or `None` if shutdown has
    /// already been requested — the job is silently dropped, not an error.
    pub fn submit<F>(&self, job: F) -> Option<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task::new(id, Box::new(job));
        if self.queue.push(task) {
            Some(id)
        } else {
            None
        }
    }

    /// Number of tasks currently queued (not including one possibly in
    /// flight inside an executor).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Signals shutdown, letting queued tasks drain, then joins every
    /// executor thread. Idempotent; safe to call more than once.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.begin_shutdown();
        let handles = std::mem::take(
            &mut *self.executors.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Blocks every signal on the calling thread: executors never handle a
/// signal, so delivery falls through to the accept thread instead of an
/// arbitrary pool thread racing to handle it.
///
/// A no-op on non-Unix targets, where there is no per-thread signal mask to
/// set; the accept thread is still the de facto dedicated receiver there
/// regardless.
#[cfg(unix)]
fn block_all_signals() {
    unsafe {
        let mut mask: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut mask);
        libc::pthread_sigmask(libc::SIG_BLOCK, &mask, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn block_all_signals() {}

fn executor_routine(queue: Arc<SharedQueue>) {
    block_all_signals();
    while let Some(task) = queue.pop() {
        crate::log!("Start executing task {}", task.id);
        let job = task.job;
        let result = panic::catch_unwind(AssertUnwindSafe(job));
        if result.is_err() {
            log::log(format_args!("Task {} panicked", task.id));
        }
        crate::log!("Finish executing task {}", task.id);
    }
}
