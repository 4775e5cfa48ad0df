use crate::server::{ServerState, auth::AuthSettings, cache::PageCache, routes};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request,
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
    },
    response::Response,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use yatube_common::model::{
    Id,
    group::{CreateGroup, Group, GroupMarker, GroupSlug},
    post::{CreatePost, Post, PostContent},
    user::{UserHandle, UserMarker},
};
use yatube_db::{
    memory::MemoryStore,
    store::{GroupRepository, PostFilter, PostRepository, UserRepository},
};

/// The full router over an in-memory store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub page_cache: Arc<PageCache>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let page_cache = Arc::new(PageCache::new(Duration::from_secs(20)));
        let state = ServerState {
            store: store.clone(),
            page_cache: page_cache.clone(),
            auth_settings: AuthSettings::default(),
        };

        Self {
            store,
            page_cache,
            router: routes(state),
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: &Value) -> Response {
        let mut request = Request::post(uri).header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// GETs `uri`, expecting a successful JSON page.
    pub async fn get_json(&self, uri: &str, token: Option<&str>) -> Value {
        let response = self.get(uri, token).await;
        assert_eq!(response.status(), 200, "GET {uri}");
        Self::read_json(response).await
    }

    pub async fn read_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    pub fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    /// Signs up through the API, returning the bearer token.
    pub async fn signup(&self, handle: &str) -> String {
        let response = self
            .post_json("/auth/signup/", None, &serde_json::json!({ "handle": handle }))
            .await;
        assert_eq!(response.status(), 201, "signup of {handle}");

        Self::read_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    pub async fn user_id(&self, handle: &str) -> Id<UserMarker> {
        let handle = UserHandle::new(handle.to_owned()).unwrap();
        self.store
            .fetch_user_by_handle(&handle)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    pub async fn group(&self, slug: &str) -> Group {
        self.store
            .create_group(&CreateGroup {
                title: Some(slug.to_uppercase()),
                slug: GroupSlug::new(slug.to_owned()).unwrap(),
                description: format!("All about {slug}"),
            })
            .await
            .unwrap()
    }

    /// Stores a post directly, bypassing the form.
    pub async fn post(&self, handle: &str, text: &str, group: Option<Id<GroupMarker>>) -> Post {
        let author = self.user_id(handle).await;
        self.store
            .create_post(&CreatePost {
                author,
                content: PostContent {
                    text: text.to_owned(),
                    group,
                    image: None,
                },
            })
            .await
            .unwrap()
    }

    pub async fn post_count(&self) -> u64 {
        self.store.count_posts(PostFilter::All).await.unwrap()
    }
}
