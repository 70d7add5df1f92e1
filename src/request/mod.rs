//! Operation descriptors and their rendering into HTTP requests.
//!
//! An [`OperationDescriptor`] is a fully resolved description of one API call:
//! method, path template, path parameters, ordered query filters and an
//! optional JSON body. Rendering is a pure transformation with no network or
//! authentication concerns.
//!
//! ```
//! use integrations_cloudfoundry::request::OperationDescriptor;
//! use integrations_cloudfoundry::transport::HttpMethod;
//!
//! let op = OperationDescriptor::builder(HttpMethod::Get, "/v3/apps/{id}")
//!     .path_param("id", "abc")
//!     .build()
//!     .unwrap();
//! assert_eq!(op.render_path().unwrap(), "/v3/apps/abc");
//! ```

use crate::errors::{CloudFoundryResult, RequestError, TemplateError};
use crate::transport::{HttpMethod, HttpRequest};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const JSON: &str = "application/json";

/// The value of a query filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// A single value.
    Single(String),
    /// Several values, sent as one comma-joined value.
    Many(Vec<String>),
}

impl FilterValue {
    /// Renders the wire value, or `None` if there is nothing to send.
    fn render(&self) -> Option<String> {
        match self {
            FilterValue::Single(value) => Some(value.clone()),
            FilterValue::Many(values) if values.is_empty() => None,
            FilterValue::Many(values) => Some(values.join(",")),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Single(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::Many(values)
    }
}

impl From<&[String]> for FilterValue {
    fn from(values: &[String]) -> Self {
        FilterValue::Many(values.to_vec())
    }
}

/// One named query filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    /// Wire name of the filter.
    pub name: String,
    /// Filter value.
    pub value: FilterValue,
}

impl QueryFilter {
    /// Creates a filter.
    pub fn new(name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One row of a request type's filter table: the wire name and how to read
/// the value from the request.
pub struct FilterField<T> {
    /// Wire name of the filter.
    pub name: &'static str,
    /// Reads the filter value, `None` when unset.
    pub read: fn(&T) -> Option<FilterValue>,
}

/// Request types that contribute query filters.
pub trait FilterParameters {
    /// Returns the filters in wire order.
    fn query_filters(&self) -> Vec<QueryFilter>;
}

/// Evaluates a filter table against a request, keeping table order.
pub fn filters_from_table<T>(request: &T, table: &[FilterField<T>]) -> Vec<QueryFilter> {
    table
        .iter()
        .filter_map(|field| {
            (field.read)(request).map(|value| QueryFilter {
                name: field.name.to_string(),
                value,
            })
        })
        .collect()
}

/// A fully resolved API operation, ready to be rendered.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    method: HttpMethod,
    path_template: String,
    path_parameters: BTreeMap<String, String>,
    query_filters: Vec<QueryFilter>,
    body: Option<Bytes>,
}

impl OperationDescriptor {
    /// Starts building a descriptor.
    pub fn builder(method: HttpMethod, path_template: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            method,
            path_template: path_template.into(),
            path_parameters: BTreeMap::new(),
            query_filters: Vec::new(),
            body: None,
            body_error: None,
        }
    }

    /// Gets the HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Gets the path template.
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// Gets the query filters.
    pub fn query_filters(&self) -> &[QueryFilter] {
        &self.query_filters
    }

    /// Gets the serialized body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Substitutes every `{name}` placeholder in the path template.
    pub fn render_path(&self) -> Result<String, TemplateError> {
        let template = self.path_template.as_str();
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| TemplateError::Malformed {
                template: template.to_string(),
                reason: "unterminated placeholder".to_string(),
            })?;

            let name = &after[..close];
            if name.is_empty() || name.contains('{') {
                return Err(TemplateError::Malformed {
                    template: template.to_string(),
                    reason: format!("invalid placeholder '{{{}}}'", name),
                });
            }

            let value = self.path_parameters.get(name).ok_or_else(|| {
                TemplateError::MissingParameter {
                    name: name.to_string(),
                    template: template.to_string(),
                }
            })?;
            rendered.extend(utf8_percent_encode(value, PATH_SEGMENT));

            rest = &after[close + 1..];
        }

        if rest.contains('}') {
            return Err(TemplateError::Malformed {
                template: template.to_string(),
                reason: "unmatched '}'".to_string(),
            });
        }
        rendered.push_str(rest);

        Ok(rendered)
    }

    /// Renders the query string, or `None` when there are no filters to send.
    pub fn render_query(&self) -> Option<String> {
        let pairs: Vec<(&str, String)> = self
            .query_filters
            .iter()
            .filter_map(|f| f.value.render().map(|v| (f.name.as_str(), v)))
            .collect();

        if pairs.is_empty() {
            return None;
        }

        // Encoding a list of string pairs cannot fail.
        serde_urlencoded::to_string(&pairs).ok()
    }

    /// Renders this operation against an API root URL.
    pub fn render(&self, api_url: &Url) -> CloudFoundryResult<HttpRequest> {
        let path = self.render_path()?;
        let raw = below_root(api_url, &path);

        let mut url = Url::parse(&raw).map_err(|_| TemplateError::InvalidUrl(raw.clone()))?;
        url.set_query(self.render_query().as_deref());

        let mut request = HttpRequest::new(self.method, url);
        request.set_header(ACCEPT, HeaderValue::from_static(JSON));

        if let Some(ref body) = self.body {
            request.set_header(CONTENT_TYPE, HeaderValue::from_static(JSON));
            request.body = Some(body.clone());
        }

        Ok(request)
    }
}

/// Resolves a link handed out by the API, such as a job status link.
///
/// Absolute links are used verbatim. Anything else is a path below the API
/// root, keeping any path prefix the root carries.
pub fn resolve_link(api_url: &Url, link: &str) -> Result<Url, TemplateError> {
    if let Ok(url) = Url::parse(link) {
        return Ok(url);
    }

    let raw = below_root(api_url, link);
    Url::parse(&raw).map_err(|_| TemplateError::InvalidUrl(raw.clone()))
}

fn below_root(api_url: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        api_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Builder for [`OperationDescriptor`].
#[derive(Debug)]
pub struct OperationBuilder {
    method: HttpMethod,
    path_template: String,
    path_parameters: BTreeMap<String, String>,
    query_filters: Vec<QueryFilter>,
    body: Option<Bytes>,
    body_error: Option<String>,
}

impl OperationBuilder {
    /// Supplies the value for a `{name}` placeholder.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name.into(), value.into());
        self
    }

    /// Appends a query filter.
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.query_filters.push(QueryFilter::new(name, value));
        self
    }

    /// Appends query filters, keeping their order.
    pub fn filters(mut self, filters: impl IntoIterator<Item = QueryFilter>) -> Self {
        self.query_filters.extend(filters);
        self
    }

    /// Attaches a JSON body.
    pub fn json_body<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => self.body_error = Some(e.to_string()),
        }
        self
    }

    /// Builds the descriptor.
    pub fn build(self) -> CloudFoundryResult<OperationDescriptor> {
        if let Some(error) = self.body_error {
            return Err(RequestError::Serialization(error).into());
        }

        Ok(OperationDescriptor {
            method: self.method,
            path_template: self.path_template,
            path_parameters: self.path_parameters,
            query_filters: self.query_filters,
            body: self.body,
        })
    }
}
