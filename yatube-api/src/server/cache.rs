//! Cache of rendered pages with a fixed time-to-live.
//!
//! [`cache_page`] wraps a handler cache-aside: a fresh entry for the request's
//! path and query is replayed byte for byte, anything else runs the handler and
//! stores a successful rendering. Nothing invalidates entries on writes; they
//! only expire, and expired entries are dropped when next looked up.

use axum::{
    body::{Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, error};

const MAX_CACHED_BODY: usize = 4 * 1024 * 1024;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CachedPage {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
    stored_at: Instant,
}

impl CachedPage {
    #[must_use]
    pub fn new(status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            stored_at: Instant::now(),
        }
    }

    fn to_response(&self) -> Response {
        let mut response = (self.status, self.body.clone()).into_response();
        match &self.content_type {
            Some(content_type) => {
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, content_type.clone());
            }
            None => {
                response.headers_mut().remove(CONTENT_TYPE);
            }
        }
        response
    }
}

#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Arc<CachedPage>>>,
}

impl PageCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<CachedPage>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, page: &CachedPage, now: Instant) -> bool {
        now.duration_since(page.stored_at) < self.ttl
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedPage>> {
        let now = Instant::now();
        let mut entries = self.entries();

        match entries.get(key) {
            Some(page) if self.is_fresh(page, now) => Some(page.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `page` unless a fresh page is already stored under `key`.
    /// Returns whichever page is stored afterwards.
    pub fn insert(&self, key: String, page: CachedPage) -> Arc<CachedPage> {
        let now = Instant::now();
        let mut entries = self.entries();

        if let Some(existing) = entries.get(&key).filter(|existing| self.is_fresh(existing, now)) {
            return existing.clone();
        }

        let page = Arc::new(page);
        entries.insert(key, page.clone());
        page
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

fn cache_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string)
}

/// Cache-aside middleware for GET pages, see the module docs.
pub async fn cache_page(
    State(cache): State<Arc<PageCache>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(request.uri());
    if let Some(page) = cache.get(&key) {
        debug!(%key, "Page cache hit");
        return page.to_response();
    }

    debug!(%key, "Page cache miss");
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, MAX_CACHED_BODY).await {
        Ok(body) => body,
        Err(err) => {
            error!(%key, %err, "Could not buffer page for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let page = CachedPage::new(parts.status, parts.headers.get(CONTENT_TYPE).cloned(), body);
    cache.insert(key, page).to_response()
}
