//! Classification and decoding of API responses.

use crate::errors::{
    ApiError, ApiErrorDetail, CloudFoundryError, CloudFoundryResult, DecodingError,
    RequestContext,
};
use crate::jobs::{Completion, JobHandle};
use crate::transport::{HttpRequest, HttpResponse};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

/// A classified success response.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedResponse<T> {
    /// A decoded resource.
    Resource(T),
    /// A success without a body.
    Empty,
    /// Work accepted as a job.
    Accepted(JobHandle),
}

impl<T> MappedResponse<T> {
    /// Returns the resource, failing if the response did not carry one.
    pub fn into_resource(self, request: &RequestContext) -> CloudFoundryResult<T> {
        match self {
            MappedResponse::Resource(resource) => Ok(resource),
            MappedResponse::Empty => Err(DecodingError::MissingBody(request.to_string()).into()),
            MappedResponse::Accepted(handle) => Err(DecodingError::UnexpectedResponse(format!(
                "{} returned job {} instead of a resource",
                request, handle
            ))
            .into()),
        }
    }

    /// Returns the job handle, failing if the response was not a job.
    pub fn into_job(self, request: &RequestContext) -> CloudFoundryResult<JobHandle> {
        match self {
            MappedResponse::Accepted(handle) => Ok(handle),
            _ => Err(DecodingError::InvalidLocation(format!(
                "{} did not return a job",
                request
            ))
            .into()),
        }
    }

    /// Returns whether the work completed inline or continues as a job.
    pub fn into_completion(self) -> Completion {
        match self {
            MappedResponse::Accepted(handle) => Completion::Accepted(handle),
            _ => Completion::Completed,
        }
    }
}

/// Describes the request a response belongs to.
pub fn request_context(request: &HttpRequest) -> RequestContext {
    RequestContext {
        method: request.method.to_string(),
        url: request.url.to_string(),
    }
}

/// Maps a response into a success outcome or an [`ApiError`].
pub fn map_response<T: DeserializeOwned>(
    response: HttpResponse,
    request: &RequestContext,
) -> CloudFoundryResult<MappedResponse<T>> {
    if !response.is_success() {
        return Err(api_error(&response, request).into());
    }

    if response.status == StatusCode::ACCEPTED {
        if let Some(location) = response.header(LOCATION.as_str()) {
            return Ok(MappedResponse::Accepted(JobHandle::from_location(location)?));
        }
    }

    if !response.has_body() {
        return Ok(MappedResponse::Empty);
    }

    serde_json::from_slice(&response.body)
        .map(MappedResponse::Resource)
        .map_err(|e| {
            CloudFoundryError::Decoding(DecodingError::InvalidBody(format!(
                "{} (HTTP {}): {}",
                request,
                response.status.as_u16(),
                e
            )))
        })
}

/// Maps a response whose body, if any, is not needed.
pub fn map_completion(
    response: HttpResponse,
    request: &RequestContext,
) -> CloudFoundryResult<Completion> {
    Ok(map_response::<IgnoredAny>(response, request)?.into_completion())
}

#[derive(Deserialize)]
struct V3ErrorEntry {
    code: Option<i64>,
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorEnvelope {
    V3 {
        errors: Vec<V3ErrorEntry>,
    },
    Uaa {
        error: String,
        error_description: Option<String>,
    },
    V2 {
        code: Option<i64>,
        description: Option<String>,
        error_code: Option<String>,
    },
}

/// Builds an [`ApiError`] from a non-success response.
///
/// Never fails: a body that is not a recognised error envelope becomes the
/// description.
pub fn api_error(response: &HttpResponse, request: &RequestContext) -> ApiError {
    let status = response.status.as_u16();
    let raw = String::from_utf8_lossy(&response.body).trim().to_string();
    let fallback = || {
        if raw.is_empty() {
            response
                .status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            raw.clone()
        }
    };

    let mut error = ApiError {
        status,
        code: None,
        title: None,
        description: String::new(),
        additional: Vec::new(),
        request: request.clone(),
    };

    match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
        Ok(ErrorEnvelope::V3 { errors }) => {
            let mut details = errors.into_iter().map(|e| ApiErrorDetail {
                code: e.code,
                title: e.title,
                detail: e.detail.unwrap_or_default(),
            });
            match details.next() {
                Some(first) => {
                    error.code = first.code;
                    error.title = first.title;
                    error.description = if first.detail.is_empty() {
                        fallback()
                    } else {
                        first.detail
                    };
                    error.additional = details.collect();
                }
                None => error.description = fallback(),
            }
        }
        Ok(ErrorEnvelope::Uaa {
            error: kind,
            error_description,
        }) => {
            error.description = error_description.unwrap_or_else(|| kind.clone());
            error.title = Some(kind);
        }
        Ok(ErrorEnvelope::V2 {
            code,
            description,
            error_code,
        }) => {
            error.code = code;
            error.title = error_code;
            error.description = description.unwrap_or_else(fallback);
        }
        Err(_) => error.description = fallback(),
    }

    error
}
