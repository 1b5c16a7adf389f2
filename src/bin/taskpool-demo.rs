use clap::{command, Arg};
use slog::{error, info, o, Drain, Logger};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
    time::Instant,
};
use taskpool::{Task, WorkerPool};

// a short burst of busy work standing in for a real task
fn simulated_work() {
    for _ in 0..10_000 {
        std::hint::spin_loop();
    }
}

fn main() -> taskpool::Result<()> {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    let logger = slog::Logger::root(drain, o!());

    let matches = command!()
        .about("Time a batch of short tasks run sequentially or on a worker pool")
        .args(&[
            Arg::new("threads")
                .long("threads")
                .value_name("THREADS")
                .help(
                    "Total number of participating threads, the calling thread \
                    included; 0 runs the sequential baseline",
                )
                .required(false),
            Arg::new("tasks")
                .long("tasks")
                .value_name("TASKS")
                .help("Number of tasks to run")
                .required(false),
        ])
        .get_matches();
    let threads = parse_or_exit(&matches, "threads", num_cpus::get(), &logger);
    let tasks = parse_or_exit(&matches, "tasks", 600_000, &logger);

    if threads == 0 {
        sequential(tasks, &logger);
        Ok(())
    } else {
        // one of the `threads` participants is the thread running `main`,
        // which pulls tasks for itself instead of blocking on the pool
        concurrent(threads - 1, tasks, &logger)
    }
}

fn parse_or_exit(
    matches: &clap::ArgMatches,
    name: &str,
    default: usize,
    logger: &Logger,
) -> usize {
    match matches.get_one::<String>(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            error!(logger, "{name} must be a non-negative integer, got `{raw}`");
            std::process::exit(1)
        }),
        None => default,
    }
}

// single thread performing the work `tasks` times
fn sequential(tasks: usize, logger: &Logger) {
    info!(logger, "sequential work begins...");

    let start = Instant::now();
    for _ in 0..tasks {
        simulated_work();
    }
    let elapsed = start.elapsed();

    info!(logger, "sequential work ends.");
    info!(logger, "total tasks: {tasks}");
    info!(logger, "nanoseconds taken: {}", elapsed.as_nanos());
}

// pool of `workers` threads plus the calling thread, performing the work
// `tasks` times between them
fn concurrent(workers: usize, tasks: usize, logger: &Logger) -> taskpool::Result<()> {
    let pool = WorkerPool::with_logger(workers, logger.clone())?;

    // one slot per participating thread, created up front, so that tasks
    // only ever touch an entry that already exists
    let mut slots = HashMap::new();
    slots.insert(thread::current().id(), AtomicUsize::new(0));
    for id in pool.worker_ids() {
        slots.insert(*id, AtomicUsize::new(0));
    }
    let work_log: Arc<HashMap<ThreadId, AtomicUsize>> = Arc::new(slots);

    let remaining = Arc::new(AtomicUsize::new(tasks));

    info!(logger, "init begins...");
    let start = Instant::now();

    pool.submit_many((0..tasks).map(|_| {
        let work_log = Arc::clone(&work_log);
        let remaining = Arc::clone(&remaining);
        Box::new(move || {
            if let Some(count) = work_log.get(&thread::current().id()) {
                count.fetch_add(1, Ordering::Relaxed);
            }
            simulated_work();
            remaining.fetch_sub(1, Ordering::Release);
        }) as Task
    }));

    info!(logger, "init ends.");
    info!(logger, "work begins...");

    while remaining.load(Ordering::Acquire) > 0 {
        if let Some(task) = pool.try_take() {
            task();
        }
    }
    let elapsed = start.elapsed();

    info!(logger, "work ends.");

    let mut total = 0;
    for (id, count) in work_log.iter() {
        let count = count.load(Ordering::Relaxed);
        info!(logger, "{id:?} ran {count} tasks");
        total += count;
    }

    info!(logger, "total tasks: {total}");
    info!(logger, "workers in pool: {}", pool.worker_count());
    info!(logger, "nanoseconds taken: {}", elapsed.as_nanos());

    Ok(())
}
