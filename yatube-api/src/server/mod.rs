use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri, uri::PathAndQuery},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use cache::PageCache;
use extract::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use url::form_urlencoded;
use yatube_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError},
    form::FormErrors,
    group::GroupSlug,
    post::PostMarker,
    user::UserHandle,
};
use yatube_db::{DbError, store::Store};

mod auth;
pub mod cache;
mod extract;
mod routes;
#[cfg(test)]
mod test_support;

pub use auth::AuthSettings;

pub const LOGIN_PATH: &str = "/auth/login/";

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub page_cache: Arc<PageCache>,
    pub auth_settings: AuthSettings,
}

pub fn routes(state: ServerState) -> Router {
    routes::routes(&state).fallback(fallback).with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// A rejected form submission, echoed back together with what is wrong with it.
#[derive(Debug)]
pub struct InvalidForm {
    pub form: serde_json::Value,
    pub errors: FormErrors,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Login required to access {0}")]
    LoginRequired(Uri),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("{}", .0.errors)]
    InvalidForm(Box<InvalidForm>),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with handle {0} was not found.")]
    UserByHandleNotFound(UserHandle),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(GroupSlug),
    #[error("The handle {0} is already taken.")]
    HandleTaken(UserHandle),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::GroupBySlugNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::LoginRequired(_) => StatusCode::SEE_OTHER,
            ServerError::HandleTaken(_) | ServerError::Database(DbError::UniqueViolation(_)) => {
                StatusCode::CONFLICT
            }
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidForm(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_form(form: &impl Serialize, errors: FormErrors) -> Self {
        match serde_json::to_value(form) {
            Ok(form) => ServerError::InvalidForm(Box::new(InvalidForm { form, errors })),
            Err(err) => ServerError::JsonResponse(err),
        }
    }
}

/// `/auth/login/?next=<path and query>`, where the caller is sent to after
/// logging in.
pub fn login_url(next: &Uri) -> String {
    let next = next
        .path_and_query()
        .map_or_else(|| next.path(), PathAndQuery::as_str);
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();

    format!("{LOGIN_PATH}?{query}")
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    form: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FormErrors>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired(uri) = &self {
            info!(%uri, "Redirecting anonymous caller to login");
            return Redirect::to(&login_url(uri)).into_response();
        }

        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let (form, errors) = match self {
            ServerError::InvalidForm(invalid) => {
                let InvalidForm { form, errors } = *invalid;
                (Some(form), Some(errors))
            }
            _ => (None, None),
        };
        let error_response = ErrorResponse {
            status: status.as_u16(),
            form,
            errors,
        };
        (status, Json(error_response)).into_response()
    }
}
