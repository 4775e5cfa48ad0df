use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthSettings,
    extract::{Json, Query},
};
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{
    auth::AuthToken,
    form::{FormErrors, REQUIRED},
    user::{CreateUser, User, UserHandle},
};
use yatube_db::store::Store;

const INVALID_HANDLE: &str = "Enter a valid username. This value may contain only letters, \
    numbers, and @/./+/-/_ characters.";

pub fn routes() -> ServerRouter {
    Router::new().typed_post(signup).typed_get(login)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
struct SignupPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct SignupForm {
    handle: String,
}

impl SignupForm {
    const HANDLE: &'static str = "handle";

    fn validate(&self) -> Result<UserHandle> {
        let message = if self.handle.is_empty() {
            REQUIRED
        } else {
            match UserHandle::new(self.handle.clone()) {
                Ok(handle) => return Ok(handle),
                Err(_) => INVALID_HANDLE,
            }
        };

        let mut errors = FormErrors::new();
        errors.add(Self::HANDLE, message);
        Err(ServerError::invalid_form(self, errors))
    }
}

/// The only time a token is ever shown.
#[derive(Serialize)]
struct Signup {
    user: User,
    token: String,
}

async fn signup(
    SignupPath(): SignupPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<AuthSettings>,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse> {
    let handle = form.validate()?;

    if store.fetch_user_by_handle(&handle).await?.is_some() {
        return Err(ServerError::HandleTaken(handle));
    }

    let user = store.create_user(&CreateUser { handle }).await?;

    let token = AuthToken::generate_random(user.id);
    store
        .create_auth(&token.authentication(settings.token_lifetime)?)
        .await?;

    info!(user = %user.id, handle = %user.handle, "Signed up user");

    Ok((
        StatusCode::CREATED,
        Json(Signup {
            user,
            token: token.to_string(),
        }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Serialize)]
struct LoginInstructions {
    next: Option<String>,
    signup: &'static str,
    authorization: &'static str,
}

async fn login(
    LoginPath(): LoginPath,
    Query(LoginQuery { next }): Query<LoginQuery>,
) -> Json<LoginInstructions> {
    Json(LoginInstructions {
        next,
        signup: SignupPath::PATH,
        authorization: "Bearer <token>",
    })
}

#[cfg(test)]
mod tests {
    use super::LoginPath;
    use crate::server::{LOGIN_PATH, test_support::TestApp};
    use axum::http::StatusCode;
    use axum_extra::routing::TypedPath;
    use serde_json::json;

    #[tokio::test]
    async fn signup_issues_a_working_token() {
        let app = TestApp::new();

        let response = app
            .post_json("/auth/signup/", None, &json!({ "handle": "leo" }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = TestApp::read_json(response).await;
        assert_eq!(body["user"]["handle"], "leo");
        let token = body["token"].as_str().unwrap().to_owned();
        assert!(token.starts_with(&format!("{}:", body["user"]["id"])));

        let response = app.get("/follow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_handle_conflicts() {
        let app = TestApp::new();
        app.signup("leo").await;

        let response = app
            .post_json("/auth/signup/", None, &json!({ "handle": "leo" }))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn invalid_handles_are_form_errors() {
        let app = TestApp::new();

        for handle in ["", "with space", "slash/"] {
            let response = app
                .post_json("/auth/signup/", None, &json!({ "handle": handle }))
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{handle:?}");

            let body = TestApp::read_json(response).await;
            assert_eq!(body["form"]["handle"], handle);
            assert_eq!(body["errors"]["handle"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn bad_tokens_are_rejected() {
        let app = TestApp::new();
        let token = app.signup("leo").await;

        let response = app.get("/follow/", Some("garbage")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (user, _) = token.split_once(':').unwrap();
        let forged = format!("{user}:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA:AAAAAAAAAAAAAAAAAAAAAAAA");
        let response = app.get("/follow/", Some(&forged)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn login_redirects_land_on_login_route() {
        assert_eq!(LoginPath::PATH, LOGIN_PATH);
    }

    #[tokio::test]
    async fn login_page_echoes_next() {
        let app = TestApp::new();

        let body = app.get_json("/auth/login/?next=%2Fcreate%2F", None).await;
        assert_eq!(body["next"], "/create/");
        assert_eq!(body["signup"], "/auth/signup/");
    }
}
