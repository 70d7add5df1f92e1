//! Process-wide bearer token cache with single-flight refresh.

use super::{BearerToken, CredentialSource};
use crate::config::DEFAULT_TOKEN_REFRESH_BUFFER;
use crate::errors::AuthenticationError;
use crate::observability::TracingHooks;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type TokenFlight = Shared<BoxFuture<'static, Result<BearerToken, AuthenticationError>>>;

#[derive(Default)]
struct CacheState {
    current: Option<BearerToken>,
    in_flight: Option<(u64, TokenFlight)>,
    next_flight: u64,
}

/// Holds at most one current token and at most one in-flight fetch.
///
/// Concurrent callers that need a new token join the in-flight fetch instead
/// of starting their own, and all of them observe the same outcome. A failed
/// fetch clears the in-flight slot so the next caller starts a fresh one.
/// Fetches run on the callers' tasks; if every waiter goes away, the fetch
/// pauses and the next caller resumes it.
pub struct TokenCache {
    source: Arc<dyn CredentialSource>,
    state: Arc<Mutex<CacheState>>,
    refresh_buffer: chrono::Duration,
    fetches: Arc<AtomicU64>,
    refreshes: AtomicU64,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self::with_refresh_buffer(source, DEFAULT_TOKEN_REFRESH_BUFFER)
    }

    /// Creates an empty cache that treats tokens as stale `buffer` before
    /// their expiry hint.
    pub fn with_refresh_buffer(source: Arc<dyn CredentialSource>, buffer: Duration) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(CacheState::default())),
            refresh_buffer: chrono::Duration::from_std(buffer)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            fetches: Arc::new(AtomicU64::new(0)),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Returns a usable token, fetching one if the cache is empty or the
    /// current token is stale.
    pub async fn acquire(&self) -> Result<BearerToken, AuthenticationError> {
        let flight = {
            let mut state = self.state.lock().await;
            match state.current {
                Some(ref token) if !token.needs_refresh(self.refresh_buffer) => {
                    return Ok(token.clone())
                }
                Some(_) => self.refreshes.fetch_add(1, Ordering::Relaxed),
                None => 0,
            };
            self.join_or_start(&mut state)
        };

        flight.await
    }

    /// Discards the current token and returns a freshly fetched one. Callers
    /// arriving while a fetch is in flight share it.
    pub async fn invalidate_and_refresh(&self) -> Result<BearerToken, AuthenticationError> {
        let flight = {
            let mut state = self.state.lock().await;
            state.current = None;
            if state.in_flight.is_none() {
                self.refreshes.fetch_add(1, Ordering::Relaxed);
            }
            self.join_or_start(&mut state)
        };

        flight.await
    }

    /// Replaces `stale` after the API rejected it.
    ///
    /// If another caller already replaced it, the replacement is returned
    /// without a new fetch, so a burst of rejections of the same token costs
    /// one refresh.
    pub async fn refresh_stale(
        &self,
        stale: &BearerToken,
    ) -> Result<BearerToken, AuthenticationError> {
        let flight = {
            let mut state = self.state.lock().await;
            match state.current {
                Some(ref current) if !current.same_value(stale) => return Ok(current.clone()),
                _ => {}
            }
            state.current = None;
            if state.in_flight.is_none() {
                self.refreshes.fetch_add(1, Ordering::Relaxed);
            }
            self.join_or_start(&mut state)
        };

        flight.await
    }

    /// Drops the current token. The next [`acquire`](Self::acquire) fetches.
    pub async fn invalidate(&self) {
        self.state.lock().await.current = None;
    }

    /// Returns how many fetches were started.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Returns how many times a held token was replaced or discarded.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn join_or_start(&self, state: &mut CacheState) -> TokenFlight {
        if let Some((_, ref flight)) = state.in_flight {
            return flight.clone();
        }

        let id = state.next_flight;
        state.next_flight += 1;
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let source = self.source.clone();
        let slot = self.state.clone();
        let flight = async move {
            let result = source.fetch_token().await;

            let mut state = slot.lock().await;
            if matches!(state.in_flight, Some((current, _)) if current == id) {
                state.in_flight = None;
            }
            match result {
                Ok(ref token) => {
                    state.current = Some(token.clone());
                    TracingHooks::on_auth_token_refresh();
                }
                Err(ref e) => TracingHooks::on_auth_token_error(&e.to_string()),
            }

            result
        }
        .boxed()
        .shared();

        state.in_flight = Some((id, flight.clone()));
        flight
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("fetches", &self.fetch_count())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}
