//! Application operations.

use crate::client::RequestExecutor;
use crate::errors::{CloudFoundryError, CloudFoundryResult};
use crate::jobs::Completion;
use crate::pagination::{PageEnvelope, Paginator};
use crate::request::{
    filters_from_table, FilterField, FilterParameters, FilterValue, OperationBuilder,
    OperationDescriptor,
};
use crate::transport::{HttpMethod, HttpRequest};
use crate::types::{
    require_id, Application, ApplicationEnvironment, ApplicationRelationships,
    CurrentDropletRelationship, Droplet, DropletState, EnvironmentVariables, Labels, Lifecycle,
    Package, PackageState, PackageType, Process, ProcessStatistics, Task, TaskState,
    ToOneRelationship,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u32 = 5000;

/// Service for application operations.
pub struct ApplicationsService {
    executor: Arc<RequestExecutor>,
}

impl ApplicationsService {
    /// Creates a new applications service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Creates an application.
    pub async fn create(&self, request: &CreateApplicationRequest) -> CloudFoundryResult<Application> {
        request.validate()?;
        let request = self.render(
            OperationDescriptor::builder(HttpMethod::Post, "/v3/apps").json_body(request),
        )?;
        self.executor.execute(request).await
    }

    /// Gets an application.
    pub async fn get(&self, id: &str) -> CloudFoundryResult<Application> {
        let request = self.render(app_operation(HttpMethod::Get, "/v3/apps/{id}", id)?)?;
        self.executor.execute(request).await
    }

    /// Lists applications lazily, following pages as the stream is consumed.
    pub fn list(
        &self,
        request: &ListApplicationsRequest,
    ) -> CloudFoundryResult<Paginator<Application>> {
        let first = self.list_request(request)?;
        Ok(self.executor.paginate(first))
    }

    /// Fetches one page of applications, with its pagination metadata.
    pub async fn list_page(
        &self,
        request: &ListApplicationsRequest,
    ) -> CloudFoundryResult<PageEnvelope<Application>> {
        let first = self.list_request(request)?;
        self.executor.fetch_page(first).await
    }

    /// Updates an application.
    pub async fn update(
        &self,
        id: &str,
        request: &UpdateApplicationRequest,
    ) -> CloudFoundryResult<Application> {
        request.validate()?;
        let request = self.render(
            app_operation(HttpMethod::Patch, "/v3/apps/{id}", id)?.json_body(request),
        )?;
        self.executor.execute(request).await
    }

    /// Deletes an application. Deletion continues as a job.
    pub async fn delete(&self, id: &str) -> CloudFoundryResult<Completion> {
        let request = self.render(app_operation(HttpMethod::Delete, "/v3/apps/{id}", id)?)?;
        self.executor.execute_completion(request).await
    }

    /// Starts an application.
    pub async fn start(&self, id: &str) -> CloudFoundryResult<Application> {
        let request = self.render(app_operation(
            HttpMethod::Post,
            "/v3/apps/{id}/actions/start",
            id,
        )?)?;
        self.executor.execute(request).await
    }

    /// Stops an application.
    pub async fn stop(&self, id: &str) -> CloudFoundryResult<Application> {
        let request = self.render(app_operation(
            HttpMethod::Post,
            "/v3/apps/{id}/actions/stop",
            id,
        )?)?;
        self.executor.execute(request).await
    }

    /// Gets the user-provided environment variables of an application.
    pub async fn get_environment_variables(
        &self,
        id: &str,
    ) -> CloudFoundryResult<EnvironmentVariables> {
        let request = self.render(app_operation(
            HttpMethod::Get,
            "/v3/apps/{id}/environment_variables",
            id,
        )?)?;
        self.executor.execute(request).await
    }

    /// Sets or unsets environment variables. Variables not named are kept.
    pub async fn update_environment_variables(
        &self,
        id: &str,
        request: &UpdateEnvironmentVariablesRequest,
    ) -> CloudFoundryResult<EnvironmentVariables> {
        let request = self.render(
            app_operation(HttpMethod::Patch, "/v3/apps/{id}/environment_variables", id)?
                .json_body(request),
        )?;
        self.executor.execute(request).await
    }

    /// Gets the full environment of an application, including system and
    /// staging variables.
    pub async fn get_environment(&self, id: &str) -> CloudFoundryResult<ApplicationEnvironment> {
        let request = self.render(app_operation(HttpMethod::Get, "/v3/apps/{id}/env", id)?)?;
        self.executor.execute(request).await
    }

    /// Gets the droplet an application currently runs.
    pub async fn get_current_droplet(&self, id: &str) -> CloudFoundryResult<Droplet> {
        let request = self.render(app_operation(
            HttpMethod::Get,
            "/v3/apps/{id}/droplets/current",
            id,
        )?)?;
        self.executor.execute(request).await
    }

    /// Gets the current droplet relationship of an application.
    pub async fn get_current_droplet_relationship(
        &self,
        id: &str,
    ) -> CloudFoundryResult<CurrentDropletRelationship> {
        let request = self.render(app_operation(
            HttpMethod::Get,
            "/v3/apps/{id}/relationships/current_droplet",
            id,
        )?)?;
        self.executor.execute(request).await
    }

    /// Makes `droplet_guid` the droplet the application runs on its next
    /// start.
    pub async fn set_current_droplet(
        &self,
        id: &str,
        droplet_guid: &str,
    ) -> CloudFoundryResult<CurrentDropletRelationship> {
        require_id("droplet guid", droplet_guid)?;
        let request = self.render(
            app_operation(
                HttpMethod::Patch,
                "/v3/apps/{id}/relationships/current_droplet",
                id,
            )?
            .json_body(&ToOneRelationship::to(droplet_guid)),
        )?;
        self.executor.execute(request).await
    }

    /// Lists the droplets of an application.
    pub fn list_droplets(
        &self,
        id: &str,
        request: &ListDropletsRequest,
    ) -> CloudFoundryResult<Paginator<Droplet>> {
        validate_paging(None, request.per_page)?;
        let first = self.render(
            app_operation(HttpMethod::Get, "/v3/apps/{id}/droplets", id)?
                .filters(request.query_filters()),
        )?;
        Ok(self.executor.paginate(first))
    }

    /// Lists the packages of an application.
    pub fn list_packages(
        &self,
        id: &str,
        request: &ListPackagesRequest,
    ) -> CloudFoundryResult<Paginator<Package>> {
        validate_paging(None, request.per_page)?;
        let first = self.render(
            app_operation(HttpMethod::Get, "/v3/apps/{id}/packages", id)?
                .filters(request.query_filters()),
        )?;
        Ok(self.executor.paginate(first))
    }

    /// Lists the processes of an application.
    pub fn list_processes(&self, id: &str) -> CloudFoundryResult<Paginator<Process>> {
        let first = self.render(app_operation(HttpMethod::Get, "/v3/apps/{id}/processes", id)?)?;
        Ok(self.executor.paginate(first))
    }

    /// Gets one process type of an application.
    pub async fn get_process(&self, id: &str, process_type: &str) -> CloudFoundryResult<Process> {
        require_id("process type", process_type)?;
        let request = self.render(
            app_operation(HttpMethod::Get, "/v3/apps/{id}/processes/{type}", id)?
                .path_param("type", process_type),
        )?;
        self.executor.execute(request).await
    }

    /// Gets per-instance statistics of one process type.
    pub async fn get_process_statistics(
        &self,
        id: &str,
        process_type: &str,
    ) -> CloudFoundryResult<Vec<ProcessStatistics>> {
        require_id("process type", process_type)?;
        let request = self.render(
            app_operation(HttpMethod::Get, "/v3/apps/{id}/processes/{type}/stats", id)?
                .path_param("type", process_type),
        )?;
        let stats: StatisticsEnvelope = self.executor.execute(request).await?;
        Ok(stats.resources)
    }

    /// Scales one process type of an application.
    pub async fn scale(
        &self,
        id: &str,
        process_type: &str,
        request: &ScaleProcessRequest,
    ) -> CloudFoundryResult<Process> {
        require_id("process type", process_type)?;
        request.validate()?;

        let request = self.render(
            app_operation(
                HttpMethod::Put,
                "/v3/apps/{id}/processes/{type}/actions/scale",
                id,
            )?
            .path_param("type", process_type)
            .json_body(request),
        )?;
        self.executor.execute(request).await
    }

    /// Terminates one instance of a process. The platform restarts it.
    pub async fn terminate_instance(
        &self,
        id: &str,
        process_type: &str,
        index: u32,
    ) -> CloudFoundryResult<Completion> {
        require_id("process type", process_type)?;

        let request = self.render(
            app_operation(
                HttpMethod::Delete,
                "/v3/apps/{id}/processes/{type}/instances/{index}",
                id,
            )?
            .path_param("type", process_type)
            .path_param("index", index.to_string()),
        )?;
        self.executor.execute_completion(request).await
    }

    /// Lists the tasks of an application.
    pub fn list_tasks(
        &self,
        id: &str,
        request: &ListTasksRequest,
    ) -> CloudFoundryResult<Paginator<Task>> {
        request.validate()?;
        let first = self.render(
            app_operation(HttpMethod::Get, "/v3/apps/{id}/tasks", id)?
                .filters(request.query_filters()),
        )?;
        Ok(self.executor.paginate(first))
    }

    fn list_request(&self, request: &ListApplicationsRequest) -> CloudFoundryResult<HttpRequest> {
        request.validate()?;
        self.render(
            OperationDescriptor::builder(HttpMethod::Get, "/v3/apps")
                .filters(request.query_filters()),
        )
    }

    fn render(&self, operation: OperationBuilder) -> CloudFoundryResult<HttpRequest> {
        operation.build()?.render(self.executor.api_url())
    }
}

fn app_operation(method: HttpMethod, template: &str, id: &str) -> CloudFoundryResult<OperationBuilder> {
    require_id("application id", id)?;
    Ok(OperationDescriptor::builder(method, template).path_param("id", id))
}

fn validate_paging(page: Option<u32>, per_page: Option<u32>) -> CloudFoundryResult<()> {
    if page == Some(0) {
        return Err(CloudFoundryError::validation("page must be at least 1"));
    }
    if let Some(per_page) = per_page {
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(CloudFoundryError::validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
    }
    Ok(())
}

// Request types

/// Request to create an application.
#[derive(Debug, Clone, Serialize)]
pub struct CreateApplicationRequest {
    /// Application name.
    pub name: String,
    /// Space the application is created in.
    pub relationships: ApplicationRelationships,
    /// Lifecycle; the platform default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
    /// Initial environment variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
    /// Labels and annotations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Labels>,
}

impl CreateApplicationRequest {
    /// Creates a request for an application named `name` in `space_guid`.
    pub fn new(name: impl Into<String>, space_guid: impl Into<String>) -> CloudFoundryResult<Self> {
        let request = Self {
            name: name.into(),
            relationships: ApplicationRelationships {
                space: ToOneRelationship::to(space_guid),
            },
            lifecycle: None,
            environment_variables: BTreeMap::new(),
            metadata: None,
        };
        request.validate()?;
        Ok(request)
    }

    /// Sets the lifecycle.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Adds an environment variable.
    pub fn environment_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(name.into(), value.into());
        self
    }

    /// Sets labels and annotations.
    pub fn metadata(mut self, metadata: Labels) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn validate(&self) -> CloudFoundryResult<()> {
        require_id("name", &self.name)?;
        require_id(
            "space guid",
            self.relationships.space.guid().unwrap_or_default(),
        )
    }
}

/// Request to update an application.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateApplicationRequest {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New lifecycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
    /// Labels and annotations to merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Labels>,
}

impl UpdateApplicationRequest {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the application.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the lifecycle.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Sets labels and annotations.
    pub fn metadata(mut self, metadata: Labels) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn validate(&self) -> CloudFoundryResult<()> {
        match self.name {
            Some(ref name) => require_id("name", name),
            None => Ok(()),
        }
    }
}

/// Filters for listing applications.
#[derive(Debug, Clone, Default)]
pub struct ListApplicationsRequest {
    /// Application names.
    pub names: Vec<String>,
    /// Application guids.
    pub guids: Vec<String>,
    /// Space guids.
    pub space_guids: Vec<String>,
    /// Organization guids.
    pub organization_guids: Vec<String>,
    /// Stack names.
    pub stacks: Vec<String>,
    /// Page to start from.
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
    /// Sort field, prefixed with `-` for descending.
    pub order_by: Option<String>,
}

const APPLICATION_FILTERS: &[FilterField<ListApplicationsRequest>] = &[
    FilterField {
        name: "names",
        read: |r| Some(FilterValue::from(r.names.as_slice())),
    },
    FilterField {
        name: "guids",
        read: |r| Some(FilterValue::from(r.guids.as_slice())),
    },
    FilterField {
        name: "space_guids",
        read: |r| Some(FilterValue::from(r.space_guids.as_slice())),
    },
    FilterField {
        name: "organization_guids",
        read: |r| Some(FilterValue::from(r.organization_guids.as_slice())),
    },
    FilterField {
        name: "stacks",
        read: |r| Some(FilterValue::from(r.stacks.as_slice())),
    },
    FilterField {
        name: "page",
        read: |r| r.page.map(FilterValue::from),
    },
    FilterField {
        name: "per_page",
        read: |r| r.per_page.map(FilterValue::from),
    },
    FilterField {
        name: "order_by",
        read: |r| r.order_by.clone().map(FilterValue::from),
    },
];

impl ListApplicationsRequest {
    /// Creates an unfiltered request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Filters by space.
    pub fn space_guid(mut self, guid: impl Into<String>) -> Self {
        self.space_guids.push(guid.into());
        self
    }

    /// Filters by organization.
    pub fn organization_guid(mut self, guid: impl Into<String>) -> Self {
        self.organization_guids.push(guid.into());
        self
    }

    /// Sets the page size.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Sets the sort order.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    fn validate(&self) -> CloudFoundryResult<()> {
        validate_paging(self.page, self.per_page)
    }
}

impl FilterParameters for ListApplicationsRequest {
    fn query_filters(&self) -> Vec<crate::request::QueryFilter> {
        filters_from_table(self, APPLICATION_FILTERS)
    }
}

/// Filters for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct ListTasksRequest {
    /// Task names.
    pub names: Vec<String>,
    /// Task states.
    pub states: Vec<TaskState>,
    /// Page size.
    pub per_page: Option<u32>,
    /// Sort field.
    pub order_by: Option<String>,
}

const TASK_FILTERS: &[FilterField<ListTasksRequest>] = &[
    FilterField {
        name: "names",
        read: |r| Some(FilterValue::from(r.names.as_slice())),
    },
    FilterField {
        name: "states",
        read: |r| {
            Some(FilterValue::Many(
                r.states.iter().map(|s| s.as_str().to_string()).collect(),
            ))
        },
    },
    FilterField {
        name: "per_page",
        read: |r| r.per_page.map(FilterValue::from),
    },
    FilterField {
        name: "order_by",
        read: |r| r.order_by.clone().map(FilterValue::from),
    },
];

impl ListTasksRequest {
    /// Creates an unfiltered request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by state.
    pub fn state(mut self, state: TaskState) -> Self {
        self.states.push(state);
        self
    }

    fn validate(&self) -> CloudFoundryResult<()> {
        validate_paging(None, self.per_page)
    }
}

impl FilterParameters for ListTasksRequest {
    fn query_filters(&self) -> Vec<crate::request::QueryFilter> {
        filters_from_table(self, TASK_FILTERS)
    }
}

/// Filters for listing the droplets of an application.
#[derive(Debug, Clone, Default)]
pub struct ListDropletsRequest {
    /// Droplet states.
    pub states: Vec<DropletState>,
    /// Only the current droplet.
    pub current: Option<bool>,
    /// Page size.
    pub per_page: Option<u32>,
}

const DROPLET_FILTERS: &[FilterField<ListDropletsRequest>] = &[
    FilterField {
        name: "states",
        read: |r| {
            Some(FilterValue::Many(
                r.states.iter().map(|s| s.as_str().to_string()).collect(),
            ))
        },
    },
    FilterField {
        name: "current",
        read: |r| r.current.map(|c| FilterValue::Single(c.to_string())),
    },
    FilterField {
        name: "per_page",
        read: |r| r.per_page.map(FilterValue::from),
    },
];

impl ListDropletsRequest {
    /// Creates an unfiltered request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by state.
    pub fn state(mut self, state: DropletState) -> Self {
        self.states.push(state);
        self
    }

    /// Lists only the current droplet.
    pub fn current(mut self) -> Self {
        self.current = Some(true);
        self
    }
}

impl FilterParameters for ListDropletsRequest {
    fn query_filters(&self) -> Vec<crate::request::QueryFilter> {
        filters_from_table(self, DROPLET_FILTERS)
    }
}

/// Filters for listing the packages of an application.
#[derive(Debug, Clone, Default)]
pub struct ListPackagesRequest {
    /// Package states.
    pub states: Vec<PackageState>,
    /// Package types.
    pub types: Vec<PackageType>,
    /// Page size.
    pub per_page: Option<u32>,
}

const PACKAGE_FILTERS: &[FilterField<ListPackagesRequest>] = &[
    FilterField {
        name: "states",
        read: |r| {
            Some(FilterValue::Many(
                r.states.iter().map(|s| s.as_str().to_string()).collect(),
            ))
        },
    },
    FilterField {
        name: "types",
        read: |r| {
            Some(FilterValue::Many(
                r.types.iter().map(|t| t.as_str().to_string()).collect(),
            ))
        },
    },
    FilterField {
        name: "per_page",
        read: |r| r.per_page.map(FilterValue::from),
    },
];

impl ListPackagesRequest {
    /// Creates an unfiltered request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by state.
    pub fn state(mut self, state: PackageState) -> Self {
        self.states.push(state);
        self
    }

    /// Filters by type.
    pub fn package_type(mut self, package_type: PackageType) -> Self {
        self.types.push(package_type);
        self
    }
}

impl FilterParameters for ListPackagesRequest {
    fn query_filters(&self) -> Vec<crate::request::QueryFilter> {
        filters_from_table(self, PACKAGE_FILTERS)
    }
}

#[derive(Deserialize)]
struct StatisticsEnvelope {
    resources: Vec<ProcessStatistics>,
}

/// Request to scale a process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScaleProcessRequest {
    /// Instance count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    /// Memory per instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_in_mb: Option<u64>,
    /// Disk per instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_in_mb: Option<u64>,
}

impl ScaleProcessRequest {
    /// Creates an empty scale request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance count.
    pub fn instances(mut self, instances: u32) -> Self {
        self.instances = Some(instances);
        self
    }

    /// Sets memory per instance.
    pub fn memory_in_mb(mut self, memory: u64) -> Self {
        self.memory_in_mb = Some(memory);
        self
    }

    /// Sets disk per instance.
    pub fn disk_in_mb(mut self, disk: u64) -> Self {
        self.disk_in_mb = Some(disk);
        self
    }

    fn validate(&self) -> CloudFoundryResult<()> {
        if self.instances.is_none() && self.memory_in_mb.is_none() && self.disk_in_mb.is_none() {
            return Err(CloudFoundryError::validation(
                "at least one of instances, memory_in_mb, disk_in_mb must be set",
            ));
        }
        if self.memory_in_mb == Some(0) || self.disk_in_mb == Some(0) {
            return Err(CloudFoundryError::validation(
                "memory_in_mb and disk_in_mb must be positive",
            ));
        }
        Ok(())
    }
}

/// Request to set or unset environment variables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateEnvironmentVariablesRequest {
    var: BTreeMap<String, Option<String>>,
}

impl UpdateEnvironmentVariablesRequest {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.var.insert(name.into(), Some(value.into()));
        self
    }

    /// Removes a variable.
    pub fn unset(mut self, name: impl Into<String>) -> Self {
        self.var.insert(name.into(), None);
        self
    }
}
