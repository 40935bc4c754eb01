//! Work-stealing job system (C1).
//!
//! A fixed-size worker pool dispatches task closures against a [`JobContext`] that counts
//! outstanding work. `wait` blocks the calling thread until the context's counter drains;
//! the calling thread may assist by running queued tasks itself when the context allows it.
//! Task bodies own their own errors — the scheduler never propagates a panic/error across the
//! worker boundary, it only records that the pool observed one (see `JobSystem::had_panic`).

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::JobError;

/// Tracks outstanding work submitted under it. Dropping a context with outstanding work is a
/// logic error in debug builds (the context should always be `wait`ed before going out of scope).
pub struct JobContext {
    pending: AtomicUsize,
    cancel: AtomicBool,
    /// When true, `wait` may execute queued tasks on the calling thread instead of only blocking.
    pub allow_work_on_main_thread: bool,
}

impl JobContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
            allow_work_on_main_thread: true,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.pending.load(Ordering::Acquire) != 0
    }

    /// Cooperative cancellation flag read by long-running task bodies (e.g. terrain generation).
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn begin(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    fn finish_one(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self {
            pending: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
            allow_work_on_main_thread: true,
        }
    }
}

/// Owns a fixed-size rayon worker pool. Construction never fails: if a custom thread count
/// can't be honored, the pool falls back to the default rayon global configuration.
pub struct JobSystem {
    pool: rayon::ThreadPool,
    panicked: Arc<AtomicBool>,
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl JobSystem {
    /// `worker_count = None` uses hardware concurrency minus one (the main thread keeps a core).
    pub fn new(worker_count: Option<usize>) -> Self {
        let threads = worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ferrox-job-{i}"))
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build {threads}-thread job pool ({err}), falling back to 1 thread");
                rayon::ThreadPoolBuilder::new()
                    .num_threads(1)
                    .build()
                    .expect("single-threaded rayon pool must build")
            });
        debug!("job system started with {} workers", pool.current_num_threads());
        Self {
            pool,
            panicked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// True if any task submitted through this job system has unwound since startup.
    pub fn had_panic(&self) -> bool {
        self.panicked.load(Ordering::Acquire)
    }

    /// Submit a single task under `ctx`. Returns immediately; does not block.
    pub fn execute(&self, ctx: &Arc<JobContext>, f: impl FnOnce() + Send + 'static) {
        ctx.begin(1);
        let ctx = ctx.clone();
        let panicked = self.panic_flag();
        self.pool.spawn(move || {
            run_catching(f, &panicked);
            ctx.finish_one();
        });
    }

    /// Partition `[0, n)` into groups of `group_size`; each group runs sequentially inside one
    /// task, invoking `f(job_index, group_id, group_index)` for every index in the group.
    pub fn dispatch(
        &self,
        ctx: &Arc<JobContext>,
        n: usize,
        group_size: usize,
        f: impl Fn(usize, usize, usize) + Send + Sync + 'static,
    ) -> Result<(), JobError> {
        if group_size == 0 {
            return Err(JobError::ZeroGroupSize);
        }
        if n == 0 {
            return Ok(());
        }
        let group_count = n.div_ceil(group_size);
        ctx.begin(group_count);
        let f = Arc::new(f);
        let panicked = self.panic_flag();
        for group_id in 0..group_count {
            let ctx = ctx.clone();
            let f = f.clone();
            let panicked = panicked.clone();
            let start = group_id * group_size;
            let end = (start + group_size).min(n);
            self.pool.spawn(move || {
                run_catching(
                    move || {
                        for (group_index, job_index) in (start..end).enumerate() {
                            f(job_index, group_id, group_index);
                        }
                    },
                    &panicked,
                );
                ctx.finish_one();
            });
        }
        Ok(())
    }

    /// Block until `ctx`'s outstanding count reaches zero. If the context allows it, the
    /// calling thread assists by driving the pool's queue instead of only parking.
    pub fn wait(&self, ctx: &Arc<JobContext>) {
        if ctx.allow_work_on_main_thread {
            self.pool.install(|| {
                while ctx.is_busy() {
                    std::thread::yield_now();
                }
            });
        } else {
            while ctx.is_busy() {
                std::thread::yield_now();
            }
        }
    }

    fn panic_flag(&self) -> Arc<AtomicBool> {
        self.panicked.clone()
    }

    /// Runs `f` on this job system's pool and blocks until it returns. Lets callers use
    /// rayon's data-parallel iterators (e.g. `par_iter_mut`) directly against the same worker
    /// pool that backs `execute`/`dispatch`, instead of spawning a second thread pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }
}

fn run_catching(f: impl FnOnce(), panicked: &AtomicBool) {
    if std::panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        panicked.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn execute_runs_and_wait_drains() {
        let js = JobSystem::new(Some(2));
        let ctx = JobContext::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            js.execute(&ctx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        js.wait(&ctx);
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert!(!ctx.is_busy());
    }

    #[test]
    fn dispatch_covers_every_index_exactly_once() {
        let js = JobSystem::new(Some(4));
        let ctx = JobContext::new();
        let seen = Arc::new(std::sync::Mutex::new(vec![0u32; 97]));
        {
            let seen = seen.clone();
            js.dispatch(&ctx, 97, 10, move |job_index, _group_id, _group_index| {
                seen.lock().unwrap()[job_index] += 1;
            })
            .unwrap();
        }
        js.wait(&ctx);
        assert!(seen.lock().unwrap().iter().all(|&c| c == 1));
    }

    #[test]
    fn dispatch_rejects_zero_group_size() {
        let js = JobSystem::new(Some(1));
        let ctx = JobContext::new();
        let err = js.dispatch(&ctx, 10, 0, |_, _, _| {});
        assert!(matches!(err, Err(JobError::ZeroGroupSize)));
    }

    #[test]
    fn cancel_flag_is_cooperative() {
        let ctx = JobContext::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn panicking_task_is_recorded_not_propagated() {
        let js = JobSystem::new(Some(1));
        let ctx = JobContext::new();
        js.execute(&ctx, || panic!("boom"));
        js.wait(&ctx);
        assert!(js.had_panic());
        // The job system itself is still usable afterwards.
        let total = Arc::new(AtomicU64::new(0));
        let total2 = total.clone();
        js.execute(&ctx, move || {
            total2.fetch_add(1, Ordering::SeqCst);
        });
        js.wait(&ctx);
        assert_eq!(total.load(Ordering::SeqCst), 1);
    }
}
