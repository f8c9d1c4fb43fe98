//! Stage worker pools

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{RelxError, Result};

/// Build a fixed-size pool for one pipeline stage
///
/// Work submitted through `ThreadPool::install` is joined before `install`
/// returns, so a stage never overlaps the next one.
pub fn worker_pool(parallelism: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(parallelism.max(1))
        .thread_name(|i| format!("relx-worker-{i}"))
        .build()
        .map_err(|e| RelxError::ConfigError(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        let pool = worker_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);

        let pool = worker_pool(0).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
