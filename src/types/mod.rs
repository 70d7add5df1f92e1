//! Core data types for the Cloud Foundry v3 API.

use crate::errors::{CloudFoundryError, CloudFoundryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A link to a related resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute URL.
    pub href: String,
    /// HTTP method to use, when not GET.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Link {
    /// Creates a GET link.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            method: None,
        }
    }
}

/// Fields every v3 resource carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource guid.
    pub guid: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Links keyed by relation.
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

/// User-supplied labels and annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A reference to another resource by guid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Guid of the related resource.
    pub guid: String,
}

/// A to-one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToOneRelationship {
    /// The related resource, if any.
    pub data: Option<Relationship>,
}

impl ToOneRelationship {
    /// Creates a relationship to `guid`.
    pub fn to(guid: impl Into<String>) -> Self {
        Self {
            data: Some(Relationship { guid: guid.into() }),
        }
    }

    /// Gets the related guid.
    pub fn guid(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.guid.as_str())
    }
}

/// Lifecycle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleType {
    /// Buildpack lifecycle.
    Buildpack,
    /// Cloud native buildpack lifecycle.
    Cnb,
    /// Docker image lifecycle.
    Docker,
}

/// Lifecycle data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleData {
    /// Buildpacks, by name or URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<String>,
    /// Stack name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// How an application is staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Lifecycle type.
    #[serde(rename = "type")]
    pub lifecycle_type: LifecycleType,
    /// Lifecycle data.
    #[serde(default)]
    pub data: LifecycleData,
}

/// Desired application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    /// Started.
    Started,
    /// Stopped.
    Stopped,
}

/// Application relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRelationships {
    /// The space the application lives in.
    pub space: ToOneRelationship,
}

/// An application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// Application name.
    pub name: String,
    /// Desired state.
    pub state: ApplicationState,
    /// Lifecycle.
    pub lifecycle: Option<Lifecycle>,
    /// Relationships.
    pub relationships: Option<ApplicationRelationships>,
    /// Labels and annotations.
    #[serde(default)]
    pub metadata: Labels,
}

impl Application {
    /// Gets the guid.
    pub fn guid(&self) -> &str {
        &self.resource.guid
    }

    /// Gets the space guid.
    pub fn space_guid(&self) -> Option<&str> {
        self.relationships.as_ref().and_then(|r| r.space.guid())
    }
}

/// Process health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Check type (`port`, `process`, `http`).
    #[serde(rename = "type")]
    pub check_type: String,
    /// Check settings.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// A process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// Process type, e.g. `web`.
    #[serde(rename = "type")]
    pub process_type: String,
    /// Start command.
    pub command: Option<String>,
    /// Instance count.
    pub instances: u32,
    /// Memory per instance.
    pub memory_in_mb: u64,
    /// Disk per instance.
    pub disk_in_mb: u64,
    /// Health check.
    pub health_check: Option<HealthCheck>,
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting to run.
    Pending,
    /// Running.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Being cancelled.
    Canceling,
    /// Failed.
    Failed,
}

impl TaskState {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Canceling => "CANCELING",
            TaskState::Failed => "FAILED",
        }
    }
}

/// Task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Why the task failed.
    pub failure_reason: Option<String>,
}

/// A one-off task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// Task name.
    pub name: String,
    /// Command. Hidden from users without access.
    pub command: Option<String>,
    /// Per-application sequence number.
    pub sequence_id: u64,
    /// State.
    pub state: TaskState,
    /// Memory limit.
    pub memory_in_mb: u64,
    /// Disk limit.
    pub disk_in_mb: u64,
    /// Result.
    pub result: Option<TaskResult>,
    /// Droplet the task runs on.
    pub droplet_guid: Option<String>,
}

/// User-provided environment variables of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariables {
    /// Variables by name.
    #[serde(default)]
    pub var: BTreeMap<String, String>,
    /// Links.
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

/// Environment an application runs and stages with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEnvironment {
    /// Staging environment variable group.
    #[serde(default)]
    pub staging_env_json: serde_json::Map<String, serde_json::Value>,
    /// Running environment variable group.
    #[serde(default)]
    pub running_env_json: serde_json::Map<String, serde_json::Value>,
    /// User-provided variables.
    #[serde(default)]
    pub environment_variables: serde_json::Map<String, serde_json::Value>,
    /// System variables, e.g. `VCAP_SERVICES`.
    #[serde(default)]
    pub system_env_json: serde_json::Map<String, serde_json::Value>,
    /// Application variables, e.g. `VCAP_APPLICATION`.
    #[serde(default)]
    pub application_env_json: serde_json::Map<String, serde_json::Value>,
}

/// State of one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessInstanceState {
    /// Starting.
    Starting,
    /// Running.
    Running,
    /// Crashed.
    Crashed,
    /// Down.
    Down,
}

/// Resource usage of a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessUsage {
    /// Sample time.
    pub time: Option<String>,
    /// CPU share.
    pub cpu: Option<f64>,
    /// Memory in bytes.
    #[serde(alias = "memory")]
    pub mem: Option<u64>,
    /// Disk in bytes.
    pub disk: Option<u64>,
}

/// A port mapping of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port reachable from outside the container.
    pub external: u32,
    /// Port the process listens on.
    pub internal: u32,
}

/// Statistics of one process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatistics {
    /// Process type.
    #[serde(rename = "type")]
    pub process_type: String,
    /// Instance index.
    pub index: u32,
    /// Instance state.
    pub state: ProcessInstanceState,
    /// Resource usage.
    pub usage: Option<ProcessUsage>,
    /// Cell host.
    pub host: Option<String>,
    /// Port mappings.
    #[serde(default)]
    pub instance_ports: Vec<PortMapping>,
    /// Seconds since the instance started.
    pub uptime: Option<u64>,
    /// Memory quota in bytes.
    pub mem_quota: Option<u64>,
    /// Disk quota in bytes.
    pub disk_quota: Option<u64>,
    /// File descriptor quota.
    pub fds_quota: Option<u64>,
}

/// Droplet state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropletState {
    /// Waiting for bits.
    AwaitingUpload,
    /// Bits are being processed.
    ProcessingUpload,
    /// Staged and runnable.
    Staged,
    /// Being copied.
    Copying,
    /// Staging failed.
    Failed,
    /// Bits were removed.
    Expired,
}

impl DropletState {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropletState::AwaitingUpload => "AWAITING_UPLOAD",
            DropletState::ProcessingUpload => "PROCESSING_UPLOAD",
            DropletState::Staged => "STAGED",
            DropletState::Copying => "COPYING",
            DropletState::Failed => "FAILED",
            DropletState::Expired => "EXPIRED",
        }
    }
}

/// Checksum of a droplet or package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// Algorithm, e.g. `sha256`.
    #[serde(rename = "type")]
    pub checksum_type: String,
    /// Digest, absent until computed.
    pub value: Option<String>,
}

/// A buildpack that staged a droplet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropletBuildpack {
    /// Buildpack name or URL.
    pub name: String,
    /// Output of the detect step.
    pub detect_output: Option<String>,
    /// Name reported by the buildpack.
    pub buildpack_name: Option<String>,
    /// Version reported by the buildpack.
    pub version: Option<String>,
}

/// A staged, runnable artifact of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// State.
    pub state: DropletState,
    /// Staging error.
    pub error: Option<String>,
    /// Lifecycle the droplet was staged with.
    pub lifecycle: Option<Lifecycle>,
    /// Start commands by process type.
    #[serde(default)]
    pub process_types: BTreeMap<String, String>,
    /// Execution metadata.
    pub execution_metadata: Option<String>,
    /// Checksum; absent for docker droplets.
    pub checksum: Option<Checksum>,
    /// Buildpacks; absent for docker droplets.
    pub buildpacks: Option<Vec<DropletBuildpack>>,
    /// Stack.
    pub stack: Option<String>,
    /// Docker image.
    pub image: Option<String>,
}

/// Package type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Uploaded application bits.
    Bits,
    /// Docker image reference.
    Docker,
}

impl PackageType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Bits => "bits",
            PackageType::Docker => "docker",
        }
    }
}

/// Package state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageState {
    /// Waiting for bits.
    AwaitingUpload,
    /// Bits are being processed.
    ProcessingUpload,
    /// Ready to stage.
    Ready,
    /// Upload failed.
    Failed,
    /// Being copied.
    Copying,
    /// Bits were removed.
    Expired,
}

impl PackageState {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageState::AwaitingUpload => "AWAITING_UPLOAD",
            PackageState::ProcessingUpload => "PROCESSING_UPLOAD",
            PackageState::Ready => "READY",
            PackageState::Failed => "FAILED",
            PackageState::Copying => "COPYING",
            PackageState::Expired => "EXPIRED",
        }
    }
}

/// Source bits of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Common resource fields.
    #[serde(flatten)]
    pub resource: Resource,
    /// Package type.
    #[serde(rename = "type")]
    pub package_type: PackageType,
    /// Type-specific data: checksum for bits, image for docker.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// State.
    pub state: PackageState,
}

/// The current droplet of an application, as a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentDropletRelationship {
    /// The droplet, if one is set.
    pub data: Option<Relationship>,
    /// Links.
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

impl CurrentDropletRelationship {
    /// Gets the droplet guid.
    pub fn guid(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.guid.as_str())
    }
}

/// Fails unless `value` names something.
pub fn require_id(field: &str, value: &str) -> CloudFoundryResult<()> {
    if value.trim().is_empty() {
        return Err(CloudFoundryError::validation(format!(
            "{} must be specified",
            field
        )));
    }
    Ok(())
}
