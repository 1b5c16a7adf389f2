use crate::Result;
use crossbeam::{queue::SegQueue, utils::Backoff};
use slog::{error, o, Discard, Logger};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle, ThreadId},
};

/// A task waiting in the shared queue.
///
/// Whichever thread removes a task calls it exactly once; the pool never
/// inspects or modifies it.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// Lives until the last holder lets go of it: the pool itself, every worker
// spawned from it, and any `QueueHandle` still draining tasks after the
// pool is gone.
struct SharedState {
    tasks: SegQueue<Task>,
    shutdown: AtomicBool,
}

impl SharedState {
    fn fresh() -> Arc<SharedState> {
        Arc::new(SharedState {
            tasks: SegQueue::new(),
            shutdown: AtomicBool::new(false),
        })
    }
}

/// A cloneable handle to a pool's shared task queue.
///
/// The handle keeps the queue alive independently of the [`WorkerPool`], so
/// tasks left behind after the pool is dropped can still be submitted and
/// drained through it.
///
/// # Examples
///
/// ```rust
/// use taskpool::WorkerPool;
///
/// let pool = WorkerPool::new(0).unwrap();
/// pool.submit_one(|| println!("picked up later"));
///
/// let queue = pool.queue();
/// drop(pool);
///
/// // the handle kept the queue alive
/// let task = queue.try_take().expect("task is still queued");
/// task();
/// ```
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<SharedState>,
}

impl QueueHandle {
    /// Add a single task to the queue.
    pub fn submit_one<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.tasks.push(Box::new(task));
    }

    /// Add a collection of tasks to the queue.
    ///
    /// The batch is not enqueued atomically: concurrent consumers may
    /// observe part of it, and no submission order is preserved.
    pub fn submit_many<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            self.shared.tasks.push(task);
        }
    }

    /// Remove and return a task if the queue is nonempty. Never blocks.
    ///
    /// `None` means the queue was empty, or momentarily contended, at the
    /// time of the call; retry or back off as appropriate.
    pub fn try_take(&self) -> Option<Task> {
        self.shared.tasks.pop()
    }
}

/// A task-based worker pool.
///
/// A fixed set of worker threads is spawned at construction. Each worker
/// pulls tasks from the shared queue and runs them until the pool is
/// dropped; dropping the pool blocks until every worker has exited. Any
/// thread may add tasks, and any thread may take one for itself with
/// [`try_take`](WorkerPool::try_take), typically the thread that created
/// the pool, looping until the work it cares about is done.
///
/// All methods are safe to call from any number of threads at once, but no
/// sequence of calls is atomic as a unit.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use taskpool::WorkerPool;
///
/// let pool = WorkerPool::new(2).unwrap();
/// let remaining = Arc::new(AtomicUsize::new(8));
///
/// for _ in 0..8 {
///     let remaining = Arc::clone(&remaining);
///     pool.submit_one(move || {
///         remaining.fetch_sub(1, Ordering::Relaxed);
///     });
/// }
///
/// // the creating thread helps out instead of just waiting
/// while remaining.load(Ordering::Relaxed) > 0 {
///     if let Some(task) = pool.try_take() {
///         task();
///     }
/// }
/// ```
pub struct WorkerPool {
    shared: Arc<SharedState>,
    workers: Vec<JoinHandle<()>>,
    worker_ids: Vec<ThreadId>,
}

impl WorkerPool {
    /// Create a pool with exactly `workers` worker threads.
    ///
    /// A count of zero is a valid degenerate pool: tasks can then only be
    /// executed through [`try_take`](WorkerPool::try_take). Task panics are
    /// discarded silently; use [`with_logger`](WorkerPool::with_logger) to
    /// have them reported.
    pub fn new(workers: usize) -> Result<WorkerPool> {
        WorkerPool::with_logger(workers, Logger::root(Discard, o!()))
    }

    /// Create a pool whose workers report task panics through `logger`.
    ///
    /// If spawning any worker fails, the workers spawned so far are shut
    /// down and joined before the error is returned.
    pub fn with_logger(workers: usize, logger: Logger) -> Result<WorkerPool> {
        let shared = SharedState::fresh();

        let mut handles = Vec::with_capacity(workers);
        let mut ids = Vec::with_capacity(workers);
        for _ in 0..workers {
            let worker_shared = Arc::clone(&shared);
            let worker_logger = logger.clone();
            let spawned = thread::Builder::new()
                .spawn(move || run_tasks(worker_shared, worker_logger));
            match spawned {
                Ok(handle) => {
                    ids.push(handle.thread().id());
                    handles.push(handle);
                }
                Err(e) => {
                    shared.shutdown.store(true, Ordering::Relaxed);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(WorkerPool {
            shared,
            workers: handles,
            worker_ids: ids,
        })
    }

    /// Create a pool sized to the host: one worker per logical CPU, less
    /// one reserved for the thread constructing the pool.
    ///
    /// The creating thread precedes the pool and cannot be captured by it,
    /// so `num_cpus - 1` workers is the largest set able to truly run
    /// concurrently alongside it; the creator is expected to participate
    /// through [`try_take`](WorkerPool::try_take). On a single-CPU host
    /// this yields a zero-worker pool.
    pub fn with_host_parallelism() -> Result<WorkerPool> {
        WorkerPool::new(num_cpus::get().saturating_sub(1))
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Identities of the pool's worker threads, in spawn order.
    ///
    /// The identities remain usable as map keys or accumulator indices
    /// even after the pool is dropped and the threads are joined.
    pub fn worker_ids(&self) -> &[ThreadId] {
        &self.worker_ids
    }

    /// Clone off a [`QueueHandle`] to the shared task queue.
    ///
    /// The handle can outlive the pool; tasks a worker never got to remain
    /// drainable through it.
    pub fn queue(&self) -> QueueHandle {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Add a single task to the shared queue.
    ///
    /// Callable from any thread, including a worker: a task may submit
    /// further tasks through a captured [`QueueHandle`].
    pub fn submit_one<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.tasks.push(Box::new(task));
    }

    /// Add a collection of tasks to the shared queue.
    ///
    /// The batch is not enqueued atomically: concurrent consumers may
    /// observe part of it, and no submission order is preserved.
    pub fn submit_many<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            self.shared.tasks.push(task);
        }
    }

    /// Remove and return a task if the queue is nonempty. Never blocks.
    ///
    /// This is how threads outside the pool, typically its creator, help
    /// perform its tasks. `None` means the queue was empty, or momentarily
    /// contended, at the time of the call.
    pub fn try_take(&self) -> Option<Task> {
        self.shared.tasks.pop()
    }
}

impl Default for WorkerPool {
    /// An empty pool: no workers, a fresh queue, a no-op drop.
    ///
    /// This is the replacement value for transferring a live pool with
    /// [`std::mem::take`] or [`std::mem::replace`].
    fn default() -> WorkerPool {
        WorkerPool {
            shared: SharedState::fresh(),
            workers: Vec::new(),
            worker_ids: Vec::new(),
        }
    }
}

impl Drop for WorkerPool {
    /// Tell the workers to exit, then block until every one of them has.
    ///
    /// A worker finishes the task it is running and keeps pulling from the
    /// queue until it observes the queue empty, so the wait is bounded by
    /// the tasks still in flight. Dropping a pool with no workers is a
    /// no-op; the queue itself is released only once the last holder of a
    /// [`QueueHandle`] is gone.
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.shutdown.store(true, Ordering::Relaxed);

        for handle in self.workers.drain(..) {
            // task panics are caught inside run_tasks
            let _ = handle.join();
        }
    }
}

// The worker loop: pull a task, run it, repeat. An empty queue is no reason
// to exit until shutdown is requested; until then, back off briefly and try
// again.
fn run_tasks(shared: Arc<SharedState>, logger: Logger) {
    let backoff = Backoff::new();

    loop {
        if let Some(task) = shared.tasks.pop() {
            backoff.reset();
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!(logger, "a task panicked; worker takes the next one");
            }
        } else if shared.shutdown.load(Ordering::Relaxed) {
            break;
        } else {
            backoff.snooze();
        }
    }
}
