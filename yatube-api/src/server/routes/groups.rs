use crate::server::{
    Result, ServerError, ServerRouter,
    extract::Json,
    routes::PageQuery,
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yatube_common::{
    model::{
        group::{Group, GroupSlug},
        post::Post,
    },
    pagination::{Page, Paginator},
};
use yatube_db::store::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    Router::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: GroupSlug,
}

#[derive(Serialize)]
struct GroupFeed {
    group: Group,
    page: Page<Post>,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    State(store): State<Arc<dyn Store>>,
    query: PageQuery,
) -> Result<Json<GroupFeed>> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;

    let page = store
        .fetch_posts(
            PostFilter::Group(group.id),
            Paginator::default(),
            query.request(),
        )
        .await?;

    Ok(Json(GroupFeed { group, page }))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn thirteen_group_posts_span_two_pages() {
        let app = TestApp::new();
        let cats = app.group("cats").await;
        app.group("dogs").await;
        app.signup("leo").await;
        for i in 0..13 {
            app.post("leo", &format!("cat {i}"), Some(cats.id)).await;
        }
        app.post("leo", "no group", None).await;

        let first = app.get_json("/group/cats/", None).await;
        assert_eq!(first["group"]["slug"], "cats");
        assert_eq!(first["page"]["count"], 13);
        assert_eq!(first["page"]["items"].as_array().unwrap().len(), 10);
        assert_eq!(first["page"]["has_next"], true);

        let second = app.get_json("/group/cats/?page=2", None).await;
        assert_eq!(second["page"]["items"].as_array().unwrap().len(), 3);
        assert_eq!(second["page"]["has_previous"], true);
        assert_eq!(second["page"]["items"][2]["text"], "cat 0");

        let dogs = app.get_json("/group/dogs/", None).await;
        assert_eq!(dogs["page"]["count"], 0);
        assert_eq!(dogs["page"]["num_pages"], 1);
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let app = TestApp::new();

        let response = app.get("/group/nope/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.get("/group/not%20a%20slug/", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
