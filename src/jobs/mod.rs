//! Long-running server-side work.
//!
//! Operations the API performs asynchronously answer `202 Accepted` with a
//! `Location` header pointing at a job resource. The client turns that into a
//! [`JobHandle`]; [`JobsService::poll`] reads the job once. Waiting for a
//! terminal state is left to the caller.

use crate::client::RequestExecutor;
use crate::errors::{CloudFoundryResult, DecodingError};
use crate::observability::TracingHooks;
use crate::request::OperationDescriptor;
use crate::transport::HttpMethod;
use crate::types::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Identifies a job the API accepted for asynchronous processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    job_id: String,
    status_link: String,
}

impl JobHandle {
    /// Creates a handle.
    pub fn new(job_id: impl Into<String>, status_link: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status_link: status_link.into(),
        }
    }

    /// Builds a handle from a `Location` header value.
    ///
    /// The job id is the last path segment; the header is kept verbatim as
    /// the status link.
    pub fn from_location(location: &str) -> Result<Self, DecodingError> {
        let location = location.trim();
        let path = match Url::parse(location) {
            Ok(url) => url.path().to_string(),
            Err(_) => location
                .split(&['?', '#'][..])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let job_id = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| DecodingError::InvalidLocation(location.to_string()))?;

        Ok(Self::new(job_id, location))
    }

    /// Gets the job id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Gets the status link.
    pub fn status_link(&self) -> &str {
        &self.status_link
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id)
    }
}

/// Job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// The job is running.
    Processing,
    /// The job is waiting on another asynchronous operation.
    Polling,
    /// The job finished successfully.
    Complete,
    /// The job failed.
    Failed,
}

impl JobState {
    /// Returns true if the job will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Processing => "PROCESSING",
            JobState::Polling => "POLLING",
            JobState::Complete => "COMPLETE",
            JobState::Failed => "FAILED",
        }
    }
}

/// An error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Numeric error code.
    pub code: Option<i64>,
    /// Error title.
    pub title: Option<String>,
    /// Human readable detail.
    pub detail: Option<String>,
}

/// A warning recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobWarning {
    /// Warning text.
    pub detail: String,
}

/// The job resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// Operation the job performs, e.g. `app.delete`.
    pub operation: Option<String>,
    /// Current state.
    pub state: JobState,
    /// Errors, populated when the job failed.
    #[serde(default)]
    pub errors: Vec<JobError>,
    /// Warnings.
    #[serde(default)]
    pub warnings: Vec<JobWarning>,
}

/// A point-in-time snapshot of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    handle: JobHandle,
    job: Job,
}

impl JobStatus {
    /// Gets the handle to poll this job again.
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Gets the job state.
    pub fn state(&self) -> JobState {
        self.job.state
    }

    /// Returns true for `COMPLETE` and `FAILED`.
    pub fn is_terminal(&self) -> bool {
        self.job.state.is_terminal()
    }

    /// Gets the errors reported by a failed job.
    pub fn errors(&self) -> &[JobError] {
        &self.job.errors
    }

    /// Gets the job resource.
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Consumes the snapshot, returning the job resource.
    pub fn into_job(self) -> Job {
        self.job
    }

    fn from_job(job: Job, fallback: &JobHandle) -> Self {
        let link = job
            .resource
            .links
            .get("self")
            .map(|l| l.href.clone())
            .unwrap_or_else(|| fallback.status_link.clone());

        Self {
            handle: JobHandle::new(job.resource.guid.clone(), link),
            job,
        }
    }
}

/// Outcome of an operation that may complete inline or as a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The operation completed with the response.
    Completed,
    /// The operation was accepted and continues as a job.
    Accepted(JobHandle),
}

impl Completion {
    /// Returns the job handle, if the work continues asynchronously.
    pub fn job(&self) -> Option<&JobHandle> {
        match self {
            Completion::Accepted(handle) => Some(handle),
            Completion::Completed => None,
        }
    }
}

/// Job operations.
pub struct JobsService {
    executor: Arc<RequestExecutor>,
}

impl JobsService {
    /// Creates a new jobs service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Gets a job by id.
    pub async fn get(&self, job_id: &str) -> CloudFoundryResult<JobStatus> {
        crate::types::require_id("job id", job_id)?;

        let operation = OperationDescriptor::builder(HttpMethod::Get, "/v3/jobs/{job_id}")
            .path_param("job_id", job_id)
            .build()?;
        let request = operation.render(self.executor.api_url())?;
        let link = request.url.to_string();

        let job: Job = self.executor.execute(request).await?;
        Ok(self.snapshot(job, &JobHandle::new(job_id, link)))
    }

    /// Reads the job behind `handle` once.
    pub async fn poll(&self, handle: &JobHandle) -> CloudFoundryResult<JobStatus> {
        let job: Job = self.executor.get_url(handle.status_link()).await?;
        Ok(self.snapshot(job, handle))
    }

    fn snapshot(&self, job: Job, handle: &JobHandle) -> JobStatus {
        let status = JobStatus::from_job(job, handle);
        TracingHooks::on_job_status(status.handle().job_id(), status.state().as_str());
        status
    }
}
