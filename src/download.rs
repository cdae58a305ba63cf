//! Bulk measurement download with a worker pool.
//!
//! Jobs are fed through a shared queue; failed jobs are re-queued so a
//! transient API error does not lose a year of data. The queue's join
//! barrier only releases once every job has completed, including jobs
//! that were re-queued after their first attempt.

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::constants::API_TOKEN_ENV_VAR;
use crate::error::{AggregatorError, Result};
use crate::models::ClimateVariable;

/// Shared work queue with re-queue retry and a join barrier.
///
/// `pending` counts jobs that are queued or in flight; `join` returns
/// once it reaches zero. Workers must pair every `pop` with exactly one
/// `task_done` or `push_retry`.
pub struct WorkQueue<T> {
    jobs: Mutex<VecDeque<T>>,
    pending: AtomicUsize,
    notify: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new(jobs: Vec<T>) -> Self {
        let pending = jobs.len();
        Self {
            jobs: Mutex::new(VecDeque::from(jobs)),
            pending: AtomicUsize::new(pending),
            notify: Notify::new(),
        }
    }

    /// Take the next job, or `None` when the queue is momentarily empty
    pub async fn pop(&self) -> Option<T> {
        self.jobs.lock().await.pop_front()
    }

    /// Put a failed job back; its pending count is still held
    pub async fn push_retry(&self, job: T) {
        self.jobs.lock().await.push_back(job);
        self.notify.notify_waiters();
    }

    /// Mark one popped job as finished for good
    pub fn task_done(&self) {
        let before = self.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(before > 0);
        self.notify.notify_waiters();
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every job, including re-queued ones, has completed.
    ///
    /// Polls on a timeout as well as the notifier so a notify emitted
    /// between the check and the wait cannot stall the barrier.
    pub async fn join(&self) {
        while self.pending() > 0 {
            let _ = tokio::time::timeout(Duration::from_millis(50), self.notify.notified()).await;
        }
    }
}

/// One download request: a region's data for one variable family and year
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub region: String,
    pub dataset: String,
    pub variable: ClimateVariable,
    pub variables: Vec<String>,
    pub year: i32,
    pub bbox: [f64; 4],
    pub attempts: usize,
}

impl DownloadJob {
    /// Output filename, carrying the suffix the aggregate command
    /// discovers files by
    fn output_filename(&self) -> String {
        format!("{}_{}{}", self.region, self.year, self.variable.file_suffix())
    }
}

/// Split requested API variable names into temperature and precipitation
/// families, one downloaded file per family
pub fn partition_variables(variables: &[String]) -> (Vec<String>, Vec<String>) {
    variables
        .iter()
        .cloned()
        .partition(|name| !name.contains("precip"))
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    dataset: &'a str,
    variables: &'a [String],
    year: i32,
    bbox: [f64; 4],
    region: &'a str,
}

/// Download all jobs into `output_dir` with `workers` concurrent workers.
///
/// Returns the number of successfully downloaded files. Fatal only when
/// the API token is missing or the output directory cannot be created.
pub async fn run_downloads(
    api_url: &str,
    jobs: Vec<DownloadJob>,
    output_dir: &Path,
    workers: usize,
) -> Result<usize> {
    let token = std::env::var(API_TOKEN_ENV_VAR).map_err(|_| AggregatorError::Download {
        message: format!("Environment variable {} is not set", API_TOKEN_ENV_VAR),
    })?;
    std::fs::create_dir_all(output_dir)?;

    let total = jobs.len();
    let queue = Arc::new(WorkQueue::new(jobs));
    let completed = Arc::new(AtomicUsize::new(0));
    let progress = Arc::new(build_progress_bar(total as u64));

    let client = reqwest::Client::new();
    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let completed = Arc::clone(&completed);
        let progress = Arc::clone(&progress);
        let client = client.clone();
        let token = token.clone();
        let api_url = api_url.to_string();
        let output_dir = output_dir.to_path_buf();

        handles.push(tokio::spawn(async move {
            loop {
                let Some(mut job) = queue.pop().await else {
                    if queue.pending() == 0 {
                        break;
                    }
                    // Jobs are still in flight and may be re-queued
                    let _ =
                        tokio::time::timeout(Duration::from_millis(50), queue.notify.notified())
                            .await;
                    continue;
                };

                match download_job(&client, &api_url, &token, &job, &output_dir).await {
                    Ok(path) => {
                        debug!("Worker {} saved {}", worker_id, path.display());
                        completed.fetch_add(1, Ordering::SeqCst);
                        progress.inc(1);
                        queue.task_done();
                    }
                    Err(e) => {
                        job.attempts += 1;
                        warn!(
                            "Download of {} {} failed (attempt {}): {}, re-queueing",
                            job.region, job.year, job.attempts, e
                        );
                        queue.push_retry(job).await;
                    }
                }
            }
        }));
    }

    queue.join().await;
    for handle in handles {
        let _ = handle.await;
    }
    progress.finish_with_message("done");

    let downloaded = completed.load(Ordering::SeqCst);
    info!("Downloaded {} of {} files", downloaded, total);
    Ok(downloaded)
}

/// Fetch one job and stage it through a temp file in the target
/// directory, so a crashed download never leaves a partial output
async fn download_job(
    client: &reqwest::Client,
    api_url: &str,
    token: &str,
    job: &DownloadJob,
    output_dir: &Path,
) -> Result<PathBuf> {
    let body = ApiRequest {
        dataset: &job.dataset,
        variables: &job.variables,
        year: job.year,
        bbox: job.bbox,
        region: &job.region,
    };

    let response = client
        .post(api_url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AggregatorError::Download {
            message: format!(
                "API returned {} for {} {}",
                response.status(),
                job.region,
                job.year
            ),
        });
    }

    let staging = NamedTempFile::new_in(output_dir)?;
    let mut file: &File = staging.as_file();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
    }

    let output_path = output_dir.join(job.output_filename());
    staging
        .persist(&output_path)
        .map_err(|e| AggregatorError::Download {
            message: format!("Could not persist {}: {}", output_path.display(), e),
        })?;
    Ok(output_path)
}

fn build_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}
