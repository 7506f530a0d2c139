//! Batched checks on a blocking worker pool.

use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use parking_lot::Mutex;
use reldir_types::{CheckRequest, CheckResponse};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::{
    directory::Directory,
    error::{DirectoryError, Result},
    metrics,
    model::TxnReader,
};

impl Directory {
    /// Number of check workers: the configured count, or the available
    /// parallelism when unset.
    pub fn check_workers(&self) -> usize {
        match self.config().check_workers {
            0 => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        }
    }

    /// Evaluates many checks concurrently, returning responses in request
    /// order.
    ///
    /// Each worker holds one read transaction for all the requests it takes,
    /// so every response reflects a consistent snapshot. A request that
    /// fails to evaluate gets a response with `error` set.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotLoaded` without a manifest, or `Worker` if a worker
    /// could not start its transaction or panicked.
    #[instrument(skip_all, fields(count = requests.len()))]
    pub async fn checks(&self, requests: Vec<CheckRequest>) -> Result<Vec<CheckResponse>> {
        let started = Instant::now();
        let model = self.loaded_model()?;
        let total = requests.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let workers = self.check_workers().min(total);
        let jobs = Arc::new(Mutex::new(requests.into_iter().enumerate()));
        let (tx, mut rx) = mpsc::channel::<(usize, CheckResponse)>(total);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let jobs = Arc::clone(&jobs);
            let tx = tx.clone();
            let store = self.store().clone();
            let model = Arc::clone(&model);
            handles.push(tokio::task::spawn_blocking(move || -> Result<()> {
                let txn = store.read()?;
                let reader = TxnReader::new(&txn);
                loop {
                    let next = jobs.lock().next();
                    let Some((index, request)) = next else {
                        break;
                    };
                    let response = model.cache.check(&reader, &request).unwrap_or_else(|e| {
                        CheckResponse { check: false, trace: Vec::new(), error: Some(e.to_string()) }
                    });
                    if tx.blocking_send((index, response)).is_err() {
                        break;
                    }
                }
                Ok(())
            }));
        }
        drop(tx);

        let mut responses = vec![CheckResponse::default(); total];
        while let Some((index, response)) = rx.recv().await {
            responses[index] = response;
        }
        for handle in handles {
            handle
                .await
                .map_err(|e| DirectoryError::Worker { message: e.to_string() })?
                .map_err(|e| DirectoryError::Worker { message: e.to_string() })?;
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_checks(total, elapsed);
        debug!(workers, elapsed, "Evaluated checks");
        Ok(responses)
    }
}
