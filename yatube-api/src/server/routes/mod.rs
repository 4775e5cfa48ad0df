use crate::server::{ServerRouter, ServerState, cache};
use axum::{Router, extract::FromRequestParts, http::request::Parts, middleware};
use std::convert::Infallible;
use url::form_urlencoded;
use yatube_common::pagination::PageRequest;

mod accounts;
mod groups;
mod posts;
mod profiles;

pub fn routes(state: &ServerState) -> ServerRouter {
    let index = posts::index_routes().route_layer(middleware::from_fn_with_state(
        state.page_cache.clone(),
        cache::cache_page,
    ));

    Router::new()
        .merge(index)
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(accounts::routes())
}

/// `?page=` of every listing. Never rejects: garbage means page 1, and of
/// repeated keys the last one counts.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub fn from_query(query: &str) -> Self {
        let page = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .last();

        Self { page }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PageQuery {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(Self::from_query).unwrap_or_default())
    }
}
