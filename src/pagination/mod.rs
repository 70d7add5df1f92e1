//! Pagination handling for Cloud Foundry list endpoints.
//!
//! A list response carries one page of resources and a `pagination` block.
//! [`Paginator`] turns the first-page request plus a page fetcher into one
//! lazy stream of resources, following `pagination.next.href` until it is
//! absent.

use crate::errors::{CloudFoundryError, CloudFoundryResult, DecodingError};
use crate::transport::HttpRequest;
use crate::types::Link;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The `pagination` block of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Total number of resources across all pages.
    pub total_results: u64,
    /// Total number of pages.
    pub total_pages: u32,
    /// First page.
    pub first: Option<Link>,
    /// Last page.
    pub last: Option<Link>,
    /// Next page; absent on the last page.
    pub next: Option<Link>,
    /// Previous page.
    pub previous: Option<Link>,
}

impl Pagination {
    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<R> {
    /// Pagination metadata.
    pub pagination: Pagination,
    /// Resources on this page, in server order.
    pub resources: Vec<R>,
}

impl<R> PageEnvelope<R> {
    /// Returns the URL of the next page.
    pub fn next_link(&self) -> Option<&str> {
        self.pagination.next.as_ref().map(|l| l.href.as_str())
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.pagination.has_next()
    }

    /// Returns the number of resources on this page.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if this page has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Consumes the page and returns the resources.
    pub fn into_resources(self) -> Vec<R> {
        self.resources
    }
}

impl<R> IntoIterator for PageEnvelope<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

struct PaginatorState<R, F> {
    fetch: F,
    buffer: VecDeque<R>,
    next: Option<HttpRequest>,
    failure: Option<CloudFoundryError>,
}

/// A lazy, forward-only stream of resources across pages.
///
/// Nothing is requested until the stream is first polled, and a page is
/// requested only once every resource of the previous page was yielded. A
/// failed fetch is yielded as the last item. Dropping the stream drops any
/// fetch in progress.
pub struct Paginator<R> {
    inner: BoxStream<'static, CloudFoundryResult<R>>,
}

impl<R: Send + 'static> Paginator<R> {
    /// Creates a paginator that starts with `first` and obtains every page
    /// through `fetch`.
    pub fn new<F, Fut>(first: HttpRequest, fetch: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + 'static,
        Fut: Future<Output = CloudFoundryResult<PageEnvelope<R>>> + Send + 'static,
    {
        let state = PaginatorState {
            fetch,
            buffer: VecDeque::new(),
            next: Some(first),
            failure: None,
        };

        let inner = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(resource) = state.buffer.pop_front() {
                    return Some((Ok(resource), state));
                }
                if let Some(error) = state.failure.take() {
                    return Some((Err(error), state));
                }

                let request = state.next.take()?;
                let pending = (state.fetch)(request.clone());
                let page = match pending.await {
                    Ok(page) => page,
                    Err(e) => return Some((Err(e), state)),
                };

                if let Some(href) = page.next_link() {
                    match request.url.join(href) {
                        Ok(url) => state.next = Some(request.with_url(url)),
                        Err(e) => {
                            state.failure = Some(
                                DecodingError::InvalidBody(format!(
                                    "invalid next page link '{}': {}",
                                    href, e
                                ))
                                .into(),
                            )
                        }
                    }
                }

                state.buffer.extend(page.resources);
            }
        })
        .boxed();

        Self { inner }
    }

    /// Drains every page into a vector, stopping at the first error.
    pub async fn collect_all(self) -> CloudFoundryResult<Vec<R>> {
        self.try_collect().await
    }
}

impl<R> Stream for Paginator<R> {
    type Item = CloudFoundryResult<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
