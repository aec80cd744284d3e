//! Fixed-size pool of named worker threads fed through crossbeam channels.

use crate::error::IngestResult;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Cooperative cancellation flag shared between the orchestrator and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a [`WorkerPool::join`] ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Jobs whose result was delivered.
    pub completed: usize,
    /// Jobs whose handler panicked.
    pub panicked: usize,
    /// Jobs with no result when the pool gave up on them.
    pub abandoned: usize,
    pub timed_out: bool,
}

type JobResult<R> = Result<R, String>;

/// Runs `handler` over submitted jobs on `size` threads.
pub struct WorkerPool<T, R> {
    name: String,
    jobs: Option<Sender<T>>,
    results: Receiver<JobResult<R>>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancelToken,
    submitted: usize,
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Start `size` workers (at least one) named `<name>-<n>`.
    ///
    /// Queued jobs are dropped unstarted once `cancel` fires.
    pub fn spawn<F>(size: usize, name: &str, cancel: CancelToken, handler: F) -> IngestResult<Self>
    where
        F: Fn(T, &CancelToken) -> R + Send + Sync + 'static,
    {
        let size = size.max(1);
        let (job_tx, job_rx) = unbounded::<T>();
        let (result_tx, result_rx) = unbounded::<JobResult<R>>();
        let handler = Arc::new(handler);

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let handler = Arc::clone(&handler);
            let cancel = cancel.clone();

            let worker = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    for job in jobs.iter() {
                        if cancel.is_cancelled() {
                            continue;
                        }
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(job, &cancel)))
                            .map_err(panic_message);
                        if results.send(outcome).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(worker);
        }
        debug!("Started {} '{}' workers", size, name);

        Ok(Self {
            name: name.to_string(),
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            cancel,
            submitted: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&mut self, job: T) {
        if let Some(jobs) = &self.jobs {
            if jobs.send(job).is_ok() {
                self.submitted += 1;
            }
        }
    }

    /// Wait for every submitted job, handing each result to `on_result` as it arrives.
    ///
    /// After `timeout` the pool cancels, keeps collecting for up to `grace`,
    /// then joins the workers that have exited. Workers still busy after that
    /// are left detached and their jobs reported as abandoned.
    pub fn join<F>(mut self, timeout: Duration, grace: Duration, mut on_result: F) -> PoolReport
    where
        F: FnMut(R),
    {
        // Closing the queue lets idle workers exit once it drains.
        drop(self.jobs.take());

        let mut report = PoolReport::default();
        let mut deliver = |result: JobResult<R>, report: &mut PoolReport| match result {
            Ok(value) => {
                report.completed += 1;
                on_result(value);
            }
            Err(message) => {
                error!("'{}' worker panicked: {}", self.name, message);
                report.panicked += 1;
            }
        };

        // A timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut received = 0;
        while received < self.submitted {
            match recv_until(&self.results, deadline) {
                Ok(result) => {
                    received += 1;
                    deliver(result, &mut report);
                }
                Err(RecvTimeoutError::Timeout) => {
                    report.timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if report.timed_out {
            warn!(
                "'{}' pool timed out after {:?} with {} of {} jobs done, cancelling",
                self.name, timeout, received, self.submitted
            );
            self.cancel.cancel();

            let grace_deadline = Instant::now().checked_add(grace);
            while received < self.submitted {
                match recv_until(&self.results, grace_deadline) {
                    Ok(result) => {
                        received += 1;
                        deliver(result, &mut report);
                    }
                    Err(_) => break,
                }
            }
        }

        for worker in self.workers.drain(..) {
            if !report.timed_out || worker.is_finished() {
                if worker.join().is_err() {
                    warn!("'{}' worker exited abnormally", self.name);
                }
            } else {
                let name = worker.thread().name().unwrap_or("worker").to_string();
                warn!("{} still running after the grace period, abandoning it", name);
            }
        }

        report.abandoned = self.submitted - received;
        report
    }
}

/// Receive with an optional deadline; `None` waits until a result or disconnect.
fn recv_until<T>(results: &Receiver<T>, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
    match deadline {
        Some(deadline) => results.recv_deadline(deadline),
        None => results.recv().map_err(|_| RecvTimeoutError::Disconnected),
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_all_jobs_complete() {
        let mut pool = WorkerPool::spawn(4, "square", CancelToken::new(), |n: u64, _| n * n).unwrap();
        for n in 1..=20 {
            pool.submit(n);
        }

        let mut results = Vec::new();
        let report = pool.join(Duration::from_secs(10), Duration::from_secs(1), |r| {
            results.push(r)
        });

        results.sort();
        assert_eq!(results, (1..=20u64).map(|n| n * n).collect::<Vec<_>>());
        assert_eq!(report.completed, 20);
        assert_eq!(report.abandoned, 0);
        assert!(!report.timed_out);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);
        let mut pool = WorkerPool::spawn(2, "ingest", CancelToken::new(), move |_: (), _| {
            let name = thread::current().name().unwrap_or_default().to_string();
            seen.lock().unwrap().push(name);
        })
        .unwrap();
        assert_eq!(pool.size(), 2);
        pool.submit(());
        pool.join(Duration::from_secs(10), Duration::from_secs(1), |_| {});

        let names = names.lock().unwrap();
        assert!(names[0].starts_with("ingest-"));
    }

    #[test]
    fn test_panicking_job_is_counted() {
        let mut pool = WorkerPool::spawn(2, "panicky", CancelToken::new(), |n: u32, _| {
            if n == 3 {
                panic!("bad input {}", n);
            }
            n
        })
        .unwrap();
        for n in 0..6 {
            pool.submit(n);
        }

        let mut count = 0;
        let report = pool.join(Duration::from_secs(10), Duration::from_secs(1), |_| count += 1);

        assert_eq!(count, 5);
        assert_eq!(report.completed, 5);
        assert_eq!(report.panicked, 1);
        assert_eq!(report.abandoned, 0);
    }

    #[test]
    fn test_timeout_cancels_and_reports() {
        let cancel = CancelToken::new();
        let mut pool = WorkerPool::spawn(1, "slow", cancel.clone(), |ms: u64, cancel: &CancelToken| {
            let start = Instant::now();
            while start.elapsed() < Duration::from_millis(ms) {
                if cancel.is_cancelled() {
                    return false;
                }
                thread::sleep(Duration::from_millis(5));
            }
            true
        })
        .unwrap();
        pool.submit(10);
        pool.submit(60_000);
        pool.submit(10);

        let mut results = Vec::new();
        let report = pool.join(Duration::from_millis(500), Duration::from_secs(5), |r| {
            results.push(r)
        });

        assert!(report.timed_out);
        assert!(cancel.is_cancelled());
        // The first job finished, the long one noticed cancellation, the last never started.
        assert_eq!(results, vec![true, false]);
        assert_eq!(report.completed, 2);
        assert_eq!(report.abandoned, 1);
    }

    #[test]
    fn test_unrepresentable_timeout_waits_for_everything() {
        let mut pool = WorkerPool::spawn(2, "patient", CancelToken::new(), |n: u32, _| {
            thread::sleep(Duration::from_millis(20));
            n
        })
        .unwrap();
        for n in 0..4 {
            pool.submit(n);
        }

        let mut count = 0;
        let report = pool.join(Duration::MAX, Duration::MAX, |_| count += 1);

        assert_eq!(count, 4);
        assert_eq!(report.completed, 4);
        assert!(!report.timed_out);
    }
}
