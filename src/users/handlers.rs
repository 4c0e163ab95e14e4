use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{
        header::{ETAG, IF_NONE_MATCH, LOCATION},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{EmailQuery, UserPayload};
use super::repo_types::User;
use crate::{error::UserError, state::AppState};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/by-email", get(find_user_by_email))
        .route("/users/:id", get(get_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(str::trim).any(|t| t == "*" || t == etag))
        .unwrap_or(false)
}

// --- handlers ---

/// GET /users, answered with 304 when the caller's list is still current.
#[instrument(skip(state, headers))]
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, UserError> {
    let (users, etag) = state.users.list_with_etag().await?;
    if etag_matches(&headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }
    Ok(([(ETAG, etag)], Json(users)).into_response())
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, UserError> {
    Ok(Json(state.users.get(id).await?))
}

/// GET /users/by-email?email=...
#[instrument(skip(state, q))]
pub async fn find_user_by_email(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> Result<Json<User>, UserError> {
    state
        .users
        .find_by_email(&q.email)
        .await?
        .map(Json)
        .ok_or(UserError::EmailNotFound(q.email))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<impl IntoResponse, UserError> {
    let Json(payload) = payload?;
    let user = state.users.create(&payload).await?;
    let location = format!("/api/v1/users/{}", user.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Json<User>, UserError> {
    let Json(payload) = payload?;
    Ok(Json(state.users.update(id, &payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, UserError> {
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod handler_tests {
    use crate::{app::build_app, state::AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_app(AppState::fake())
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ada() -> Value {
        json!({"name": "Ada", "email": "ada@example.com", "age": 36, "password": "secret1"})
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = app().oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ada_scenario_over_http() {
        let app = app();

        let res = app
            .clone()
            .oneshot(json_req("POST", "/api/v1/users", ada()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        let created = body_json(res).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(location, format!("/api/v1/users/{id}"));
        assert_eq!(created["name"], "Ada");
        assert_eq!(created["age"], 36);
        assert_eq!(created["createdAt"], created["updatedAt"]);
        assert!(created.get("password").is_none());

        let res = app.clone().oneshot(get("/api/v1/users")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let list = body_json(res).await;
        assert_eq!(list, json!([created.clone()]));

        let res = app
            .clone()
            .oneshot(get("/api/v1/users/by-email?email=ada%40example.com"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, created);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/users/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = app.oneshot(get("/api/v1/users")).await.unwrap();
        assert_eq!(body_json(res).await, json!([]));
    }

    #[tokio::test]
    async fn create_with_bad_payload_lists_fields() {
        let res = app()
            .oneshot(json_req(
                "POST",
                "/api/v1/users",
                json!({"name": "a", "email": "not-an-email", "age": "", "password": "12345"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(res).await;
        assert_eq!(body["error"], "validation_failed");
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["name", "email", "age", "password"]);
    }

    #[tokio::test]
    async fn wrong_field_types_get_tagged_validation_body() {
        let res = app()
            .oneshot(json_req(
                "POST",
                "/api/v1/users",
                json!({"name": 5, "email": "ada@example.com", "age": 36, "password": "secret1"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(res).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["fields"], json!([{"field": "name", "message": "Name must be a string"}]));
    }

    #[tokio::test]
    async fn wrong_types_on_update_name_each_field() {
        let app = app();
        let res = app
            .clone()
            .oneshot(json_req("POST", "/api/v1/users", ada()))
            .await
            .unwrap();
        let id = body_json(res).await["id"].as_str().unwrap().to_string();

        let res = app
            .oneshot(json_req(
                "PUT",
                &format!("/api/v1/users/{id}"),
                json!({"name": "Ada", "email": [], "age": true, "password": "secret1"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(res).await;
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["email", "age"]);
    }

    #[tokio::test]
    async fn non_object_body_gets_tagged_error() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/users")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "invalid_body");
    }

    #[tokio::test]
    async fn age_may_arrive_as_text() {
        let mut body = ada();
        body["age"] = json!("36");
        let res = app()
            .oneshot(json_req("POST", "/api/v1/users", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(body_json(res).await["age"], 36);
    }

    #[tokio::test]
    async fn update_unknown_user_is_404() {
        let id = uuid::Uuid::new_v4();
        let res = app()
            .oneshot(json_req("PUT", &format!("/api/v1/users/{id}"), ada()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["error"], "not_found");
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let app = app();
        let res = app
            .clone()
            .oneshot(json_req("POST", "/api/v1/users", ada()))
            .await
            .unwrap();
        let created = body_json(res).await;
        let id = created["id"].as_str().unwrap();

        let res = app
            .clone()
            .oneshot(json_req(
                "PUT",
                &format!("/api/v1/users/{id}"),
                json!({"name": "Grace", "email": "grace@example.com", "age": 85, "password": "cobol60"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let updated = body_json(res).await;
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["name"], "Grace");
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert_ne!(updated["updatedAt"], created["updatedAt"]);

        let res = app
            .oneshot(get(&format!("/api/v1/users/{id}")))
            .await
            .unwrap();
        assert_eq!(body_json(res).await["email"], "grace@example.com");
    }

    #[tokio::test]
    async fn delete_unknown_user_is_no_content() {
        let id = uuid::Uuid::new_v4();
        let res = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/users/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_email_lookup_is_404() {
        let res = app()
            .oneshot(get("/api/v1/users/by-email?email=nobody%40example.com"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body_json(res).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "no user with email nobody@example.com");
    }

    #[tokio::test]
    async fn list_etag_short_circuits_until_mutation() {
        let app = app();
        let res = app.clone().oneshot(get("/api/v1/users")).await.unwrap();
        let etag = res.headers()[header::ETAG].to_str().unwrap().to_string();

        let cached = Request::builder()
            .uri("/api/v1/users")
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(cached).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);

        app.clone()
            .oneshot(json_req("POST", "/api/v1/users", ada()))
            .await
            .unwrap();

        let stale = Request::builder()
            .uri("/api/v1/users")
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(stale).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_ne!(res.headers()[header::ETAG].to_str().unwrap(), etag);
        assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replicas_on_one_store_never_serve_stale_304() {
        use crate::users::{memory::MemoryUserStore, repo::UserStore};
        use std::sync::Arc;

        let fake = AppState::fake();
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let a = build_app(AppState::from_parts(store.clone(), fake.config.clone()));
        let b = build_app(AppState::from_parts(store, fake.config));

        let res = b.clone().oneshot(get("/api/v1/users")).await.unwrap();
        let etag = res.headers()[header::ETAG].to_str().unwrap().to_string();

        a.oneshot(json_req("POST", "/api/v1/users", ada()))
            .await
            .unwrap();

        let revalidate = Request::builder()
            .uri("/api/v1/users")
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let res = b.oneshot(revalidate).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);
    }
}
