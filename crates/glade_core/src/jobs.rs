use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// Background pool for work that must never run on the render loop
/// (file I/O, image decoding, mesh flattening).
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(
        num_threads: Option<usize>,
        thread_prefix: &'static str,
    ) -> Result<Self, ThreadPoolBuildError> {
        let worker_threads = num_threads.unwrap_or_else(default_worker_threads).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(move |index| format!("{thread_prefix}-{index}"))
            .build()?;
        debug!("started {worker_threads} {thread_prefix} worker threads");
        Ok(Self { pool })
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4)
        .saturating_sub(1)
        .clamp(1, 4)
}
