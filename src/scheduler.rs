//! Bounded worker pool that runs sub-batches to completion behind a barrier.
//!
//! Every job gets a [`TaskId`] and replies on a channel created for that call. Responses
//! are matched to their slot by id, so the order in which workers finish does not matter.
//! No result is handed back until every job of the call has reported successfully.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::SchedulerConfig;
use crate::error::{Result, SimError};

pub type TaskId = u64;

/// A unit of work: runs once on some worker and produces a value or an error.
pub type Job<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// What a worker sends back once its job finished (or panicked).
struct TaskResponse<T> {
    id: TaskId,
    outcome: std::thread::Result<Result<T>>,
}

#[derive(Debug)]
pub struct Scheduler {
    /// `None` when running single-threaded, or after shutdown.
    pool: Option<ThreadPool>,
    workers: usize,
    batch_size: Option<usize>,
    task_timeout: Option<Duration>,
    next_task: TaskId,
    shut_down: bool,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        let workers = config
            .workers
            .filter(|&w| w > 0)
            .unwrap_or_else(rayon::current_num_threads);

        let pool = if workers > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|index| format!("basins-worker-{index}"))
                .build()?;
            log::debug!("Started worker pool with {workers} threads");
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            pool,
            workers,
            batch_size: config.batch_size,
            task_timeout: config.task_timeout()?,
            next_task: 0,
            shut_down: false,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Splits `len` small bodies into contiguous ranges, one per worker unless an explicit
    /// batch size is configured. Always yields at least one (possibly empty) range.
    pub fn partition(&self, len: usize) -> Vec<Range<usize>> {
        if len == 0 {
            return vec![0..0];
        }
        if let Some(size) = self.batch_size {
            let chunk = size.max(1);
            return (0..len)
                .step_by(chunk)
                .map(|start| start..(start + chunk).min(len))
                .collect();
        }

        // min(workers, len) chunks; the first `len % chunks` take one extra body.
        let chunks = self.workers.clamp(1, len);
        let (base, extra) = (len / chunks, len % chunks);
        let mut start = 0;
        (0..chunks)
            .map(|k| {
                let end = start + base + usize::from(k < extra);
                let range = start..end;
                start = end;
                range
            })
            .collect()
    }

    /// Runs every job and returns their results in submission order.
    ///
    /// Fails as a whole if any job errors, panics, disappears or misses the deadline.
    pub fn run<T: Send + 'static>(&mut self, jobs: Vec<Job<T>>) -> Result<Vec<T>> {
        if self.shut_down {
            return Err(SimError::ShutDown);
        }
        let first = self.next_task;
        self.next_task += jobs.len() as TaskId;

        let Some(pool) = &self.pool else {
            return jobs
                .into_iter()
                .enumerate()
                .map(|(k, job)| settle(first + k as TaskId, panic::catch_unwind(AssertUnwindSafe(job))))
                .collect();
        };

        let count = jobs.len();
        let (tx, rx) = mpsc::channel::<TaskResponse<T>>();
        for (k, job) in jobs.into_iter().enumerate() {
            let id = first + k as TaskId;
            let tx = tx.clone();
            pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                // The receiver is gone if the caller already abandoned this call.
                let _ = tx.send(TaskResponse { id, outcome });
            });
        }
        drop(tx);
        log::trace!("Dispatched tasks {first}..{} to the pool", first + count as TaskId);

        let deadline = self.task_timeout.map(|timeout| (timeout, Instant::now() + timeout));
        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        for _ in 0..count {
            let response = match deadline {
                Some((timeout, at)) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(response) => response,
                    Err(RecvTimeoutError::Timeout) => return Err(SimError::WorkerTimeout(timeout)),
                    Err(RecvTimeoutError::Disconnected) => return Err(lost_worker(first)),
                },
                None => rx.recv().map_err(|_| lost_worker(first))?,
            };

            let slot = response
                .id
                .checked_sub(first)
                .map(|offset| offset as usize)
                .filter(|&offset| offset < count)
                .ok_or_else(|| SimError::WorkerFailure {
                    task: response.id,
                    message: "response does not belong to this call".to_string(),
                })?;
            if slots[slot].is_some() {
                return Err(SimError::WorkerFailure {
                    task: response.id,
                    message: "duplicate response".to_string(),
                });
            }
            slots[slot] = Some(settle(response.id, response.outcome)?);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(k, slot)| slot.ok_or_else(|| lost_worker(first + k as TaskId)))
            .collect()
    }

    /// Releases the worker threads. Further calls to [`Scheduler::run`] fail.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.pool = None;
        self.shut_down = true;
        log::debug!("Worker pool shut down");
    }
}

fn lost_worker(task: TaskId) -> SimError {
    SimError::WorkerFailure {
        task,
        message: "worker exited without reporting".to_string(),
    }
}

fn settle<T>(id: TaskId, outcome: std::thread::Result<Result<T>>) -> Result<T> {
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(SimError::WorkerFailure {
            task: id,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn job<T: Send + 'static>(f: impl FnOnce() -> Result<T> + Send + 'static) -> Job<T> {
        Box::new(f)
    }

    fn scheduler(workers: usize, batch_size: Option<usize>) -> Scheduler {
        Scheduler::new(&SchedulerConfig {
            workers: Some(workers),
            batch_size,
            task_timeout_secs: Some(30.0),
        })
        .unwrap()
    }

    #[test]
    fn partition_is_contiguous_and_complete() {
        let sched = scheduler(3, None);
        assert_eq!(sched.partition(10), vec![0..4, 4..7, 7..10]);
        assert_eq!(sched.partition(2), vec![0..1, 1..2]);
        assert_eq!(sched.partition(0), vec![0..0]);
    }

    #[test]
    fn partition_uses_every_worker_when_bodies_allow() {
        let sched = scheduler(4, None);
        assert_eq!(sched.partition(5), vec![0..2, 2..3, 3..4, 4..5]);
        assert_eq!(sched.partition(9).len(), 4);
        assert_eq!(sched.partition(3), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn batch_size_overrides_worker_count() {
        let sched = scheduler(2, Some(3));
        assert_eq!(sched.partition(7), vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn single_worker_does_not_split() {
        let sched = scheduler(1, None);
        assert_eq!(sched.partition(100), vec![0..100]);
    }

    #[test]
    fn results_keep_submission_order_despite_completion_order() {
        let mut sched = scheduler(4, None);
        let jobs: Vec<Job<usize>> = (0..8usize)
            .map(|k| {
                job(move || {
                    thread::sleep(Duration::from_millis((8 - k as u64) * 5));
                    Ok(k)
                })
            })
            .collect();
        assert_eq!(sched.run(jobs).unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_fails_the_whole_call() {
        let mut sched = scheduler(2, None);
        let jobs = vec![job(|| Ok(1u32)), job(|| panic!("integration blew up"))];
        match sched.run(jobs) {
            Err(SimError::WorkerFailure { message, .. }) => {
                assert!(message.contains("integration blew up"))
            }
            other => panic!("expected worker failure, got {other:?}"),
        }
    }

    #[test]
    fn inline_panic_is_reported_too() {
        let mut sched = scheduler(1, None);
        let jobs: Vec<Job<u32>> = vec![job(|| panic!("inline"))];
        assert!(matches!(sched.run(jobs), Err(SimError::WorkerFailure { .. })));
    }

    #[test]
    fn job_errors_propagate_unchanged() {
        let mut sched = scheduler(2, None);
        let jobs = vec![
            job(|| Ok(1u32)),
            job(|| Err(SimError::NumericDegeneracy { law: "gravity", x: 0.0, y: 0.0 })),
        ];
        assert!(matches!(sched.run(jobs), Err(SimError::NumericDegeneracy { .. })));
    }

    #[test]
    fn slow_job_times_out() {
        let mut sched = Scheduler::new(&SchedulerConfig {
            workers: Some(2),
            batch_size: None,
            task_timeout_secs: Some(0.02),
        })
        .unwrap();
        let jobs = vec![job(|| {
            thread::sleep(Duration::from_millis(500));
            Ok(1u32)
        })];
        assert!(matches!(sched.run(jobs), Err(SimError::WorkerTimeout(_))));
    }

    #[test]
    fn shutdown_rejects_further_work() {
        let mut sched = scheduler(2, None);
        sched.shutdown();
        assert!(sched.is_shut_down());
        let jobs = vec![job(|| Ok(1u32))];
        assert!(matches!(sched.run(jobs), Err(SimError::ShutDown)));
    }
}
