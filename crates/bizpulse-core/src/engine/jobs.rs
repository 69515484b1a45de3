//! Job table with retention after completion
//!
//! Jobs live in a moka cache. Pending and running jobs never expire;
//! a finished job expires `retention` after its last update.

use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

use crate::models::{GenerationJob, OrgId};

/// Upper bound on tracked jobs
///
/// Running jobs never expire and count against this bound. Once it is
/// reached, moka's admission policy may drop newly created jobs, which then
/// report `JobNotFound` when polled. Finished jobs free their slot after the
/// retention window, so only this many simultaneously running generations
/// can hit the limit.
const MAX_JOBS: u64 = 10_000;

struct JobExpiry {
    retention: Duration,
}

impl JobExpiry {
    fn ttl(&self, job: &GenerationJob) -> Option<Duration> {
        job.status.is_terminal().then_some(self.retention)
    }
}

impl Expiry<String, GenerationJob> for JobExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        job: &GenerationJob,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.ttl(job)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        job: &GenerationJob,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.ttl(job)
    }
}

/// Generation jobs keyed by id, bounded by `MAX_JOBS`
#[derive(Clone)]
pub struct JobTable {
    jobs: Cache<String, GenerationJob>,
}

impl JobTable {
    pub fn new(retention: Duration) -> Self {
        let jobs = Cache::builder()
            .max_capacity(MAX_JOBS)
            .expire_after(JobExpiry { retention })
            .build();
        Self { jobs }
    }

    /// Register a new pending job
    pub async fn create(&self, org: &OrgId) -> GenerationJob {
        let job = GenerationJob::new(org.clone());
        self.jobs.insert(job.id.clone(), job.clone()).await;
        job
    }

    pub async fn get(&self, job_id: &str) -> Option<GenerationJob> {
        self.jobs.get(job_id).await
    }

    /// Apply `f` to a job; only the job's own generation task writes to it
    pub async fn update<F>(&self, job_id: &str, f: F) -> Option<GenerationJob>
    where
        F: FnOnce(&mut GenerationJob),
    {
        let mut job = self.jobs.get(job_id).await?;
        f(&mut job);
        self.jobs.insert(job_id.to_string(), job.clone()).await;
        Some(job)
    }

    /// Drive pending expirations
    pub async fn run_pending_tasks(&self) {
        self.jobs.run_pending_tasks().await;
    }

    pub fn len(&self) -> u64 {
        self.jobs.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[tokio::test]
    async fn test_create_update_get() {
        let table = JobTable::new(Duration::from_secs(300));
        let job = table.create(&OrgId::from("acme")).await;

        table.update(&job.id, GenerationJob::start).await;
        table.update(&job.id, |j| j.advance(50)).await;

        let stored = table.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.progress, 50);
        assert!(table.update("missing", |j| j.advance(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_finished_jobs_expire_running_jobs_stay() {
        let table = JobTable::new(Duration::from_millis(50));
        let running = table.create(&OrgId::from("acme")).await;
        table.update(&running.id, GenerationJob::start).await;

        let finished = table.create(&OrgId::from("acme")).await;
        table.update(&finished.id, |j| j.fail("boom")).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        table.run_pending_tasks().await;

        assert!(table.get(&finished.id).await.is_none());
        assert!(table.get(&running.id).await.is_some());
    }
}
