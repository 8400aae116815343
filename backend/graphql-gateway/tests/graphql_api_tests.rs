//! End-to-end behavior of the GraphQL API
//!
//! Schema-level tests run operations directly against the schema with an
//! explicit request context; HTTP tests go through the session middleware
//! with in-memory stores.

use actix_web::dev::Service;
use actix_web::{test, web, App};
use async_graphql::{Request, Response, Value};
use async_trait::async_trait;
use graphql_gateway::config::GraphQLConfig;
use graphql_gateway::routes;
use graphql_gateway::store::{
    CommentRecord, ContentStore, MemoryContentStore, NewComment, NewPost, PostRecord,
    StoreError, StoreResult,
};
use graphql_gateway::{build_schema, AppSchema, RequestContext};
use serde_json::{json, Value as Json};
use session_store::{
    MemorySessionStore, SessionConfig, SessionError, SessionManager, SessionRecord, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "gateway-test-secret";

fn schema_with_store() -> (AppSchema, Arc<MemoryContentStore>) {
    let store = Arc::new(MemoryContentStore::new());
    (build_schema(store.clone()), store)
}

async fn run(schema: &AppSchema, query: &str, context: RequestContext) -> Response {
    schema.execute(Request::new(query).data(context)).await
}

fn data(response: Response) -> Json {
    assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

fn error_code(response: &Response) -> Option<Value> {
    response.errors[0]
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code").cloned())
}

async fn create_post(schema: &AppSchema, user: &str, title: &str, content: &str) -> String {
    let query = format!(
        r#"mutation {{ createPost(title: "{}", content: "{}") {{ _id }} }}"#,
        title, content
    );
    let json = data(run(schema, &query, RequestContext::authenticated(user)).await);
    json["createPost"]["_id"].as_str().unwrap().to_string()
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_create_post_stamps_author_and_returns_stored_record() {
    let (schema, _) = schema_with_store();

    let json = data(
        run(
            &schema,
            r#"mutation { createPost(title: "A", content: "B") { _id authorId title content comments { _id } } }"#,
            RequestContext::authenticated("u1"),
        )
        .await,
    );

    let post = &json["createPost"];
    assert_eq!(post["authorId"], "u1");
    assert_eq!(post["title"], "A");
    assert_eq!(post["content"], "B");
    assert_eq!(post["comments"], json!([]));
    assert_eq!(post["_id"].as_str().unwrap().len(), 24);
}

#[tokio::test]
async fn test_created_post_refetches_field_for_field() {
    let (schema, _) = schema_with_store();

    let created = data(
        run(
            &schema,
            r#"mutation { createPost(title: "Hello", content: "World") { _id authorId title content } }"#,
            RequestContext::authenticated("u1"),
        )
        .await,
    );
    let id = created["createPost"]["_id"].as_str().unwrap();

    let fetched = data(
        run(
            &schema,
            &format!(r#"{{ post(_id: "{}") {{ _id authorId title content }} }}"#, id),
            RequestContext::anonymous(),
        )
        .await,
    );

    assert_eq!(fetched["post"], created["createPost"]);
}

#[tokio::test]
async fn test_create_post_without_identity_fails_and_writes_nothing() {
    let (schema, store) = schema_with_store();

    let response = run(
        &schema,
        r#"mutation { createPost(title: "A", content: "B") { _id } }"#,
        RequestContext::anonymous(),
    )
    .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "User not logged in.");
    assert_eq!(error_code(&response), Some(Value::from("UNAUTHENTICATED")));
    assert_eq!(store.post_count().await, 0);
}

#[tokio::test]
async fn test_create_comment_without_identity_fails_and_writes_nothing() {
    let (schema, store) = schema_with_store();
    let post_id = create_post(&schema, "u1", "A", "B").await;

    let response = run(
        &schema,
        &format!(
            r#"mutation {{ createComment(postId: "{}", content: "hi") {{ _id }} }}"#,
            post_id
        ),
        RequestContext::anonymous(),
    )
    .await;

    assert_eq!(response.errors[0].message, "User not logged in.");
    assert_eq!(store.comment_count().await, 0);
}

#[tokio::test]
async fn test_schema_without_request_context_is_anonymous() {
    let (schema, store) = schema_with_store();

    let response = schema
        .execute(r#"mutation { createPost(title: "A") { _id } }"#)
        .await;

    assert_eq!(response.errors[0].message, "User not logged in.");
    assert_eq!(store.post_count().await, 0);
}

#[tokio::test]
async fn test_comment_resolves_its_post() {
    let (schema, _) = schema_with_store();
    let post_id = create_post(&schema, "u1", "A", "B").await;

    let created = data(
        run(
            &schema,
            &format!(
                r#"mutation {{ createComment(postId: "{}", content: "hi") {{ _id postId authorId content }} }}"#,
                post_id
            ),
            RequestContext::authenticated("u2"),
        )
        .await,
    );
    let comment = &created["createComment"];
    assert_eq!(comment["postId"], post_id.as_str());
    assert_eq!(comment["authorId"], "u2");
    assert_eq!(comment["content"], "hi");

    let fetched = data(
        run(
            &schema,
            &format!(
                r#"{{ comment(_id: "{}") {{ post {{ _id title }} author {{ _id }} }} }}"#,
                comment["_id"].as_str().unwrap()
            ),
            RequestContext::anonymous(),
        )
        .await,
    );

    assert_eq!(fetched["comment"]["post"]["_id"], post_id.as_str());
    assert_eq!(fetched["comment"]["post"]["title"], "A");
    assert_eq!(fetched["comment"]["author"]["_id"], "u2");
}

#[tokio::test]
async fn test_comment_may_reference_missing_post() {
    let (schema, _) = schema_with_store();

    let json = data(
        run(
            &schema,
            r#"mutation { createComment(postId: "does-not-exist", content: "orphan") { postId post { _id } } }"#,
            RequestContext::authenticated("u2"),
        )
        .await,
    );

    assert_eq!(json["createComment"]["postId"], "does-not-exist");
    assert_eq!(json["createComment"]["post"], Json::Null);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_missing_ids_resolve_to_null() {
    let (schema, _) = schema_with_store();

    let response = run(
        &schema,
        r#"{ post(_id: "5f1d7f0e9b1e8a3d4c2b1a00") { _id } comment(_id: "not-an-object-id") { _id } }"#,
        RequestContext::anonymous(),
    )
    .await;

    let json = data(response);
    assert_eq!(json["post"], Json::Null);
    assert_eq!(json["comment"], Json::Null);
}

#[tokio::test]
async fn test_posts_lists_every_post_with_nested_comments() {
    let (schema, _) = schema_with_store();
    let first = create_post(&schema, "u1", "first", "1").await;
    create_post(&schema, "u2", "second", "2").await;

    run(
        &schema,
        &format!(
            r#"mutation {{ createComment(postId: "{}", content: "c") {{ _id }} }}"#,
            first
        ),
        RequestContext::authenticated("u3"),
    )
    .await;

    let json = data(
        run(
            &schema,
            "{ posts { title author { _id } comments { content authorId } } }",
            RequestContext::anonymous(),
        )
        .await,
    );

    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "first");
    assert_eq!(posts[0]["author"]["_id"], "u1");
    assert_eq!(posts[0]["comments"], json!([{ "content": "c", "authorId": "u3" }]));
    assert_eq!(posts[1]["comments"], json!([]));
}

#[tokio::test]
async fn test_empty_store_lists_no_posts() {
    let (schema, _) = schema_with_store();
    let json = data(run(&schema, "{ posts { _id } }", RequestContext::anonymous()).await);
    assert_eq!(json["posts"], json!([]));
}

#[tokio::test]
async fn test_me_reflects_request_identity() {
    let (schema, _) = schema_with_store();

    let anonymous = data(run(&schema, "{ me { _id } }", RequestContext::anonymous()).await);
    assert_eq!(anonymous["me"], Json::Null);

    let signed_in =
        data(run(&schema, "{ me { _id } }", RequestContext::authenticated("u1")).await);
    assert_eq!(signed_in["me"]["_id"], "u1");
}

// =============================================================================
// Upstream failures
// =============================================================================

struct FailingStore;

#[async_trait]
impl ContentStore for FailingStore {
    async fn insert_post(&self, _: NewPost) -> StoreResult<String> {
        Err(StoreError::Database("connection reset".to_string()))
    }

    async fn find_post(&self, _: &str) -> StoreResult<Option<PostRecord>> {
        Err(StoreError::Database("connection reset".to_string()))
    }

    async fn find_posts(&self) -> StoreResult<Vec<PostRecord>> {
        Err(StoreError::Database("connection reset".to_string()))
    }

    async fn insert_comment(&self, _: NewComment) -> StoreResult<String> {
        Err(StoreError::Database("connection reset".to_string()))
    }

    async fn find_comment(&self, _: &str) -> StoreResult<Option<CommentRecord>> {
        Err(StoreError::Database("connection reset".to_string()))
    }

    async fn find_comments_by_post(&self, _: &str) -> StoreResult<Vec<CommentRecord>> {
        Err(StoreError::Database("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_fails_the_field() {
    let schema = build_schema(Arc::new(FailingStore));

    let response = run(&schema, "{ posts { _id } me { _id } }", RequestContext::authenticated("u1")).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(error_code(&response), Some(Value::from("INTERNAL_SERVER_ERROR")));
    let json = response.data.into_json().unwrap();
    assert_eq!(json["posts"], Json::Null);
    assert_eq!(json["me"]["_id"], "u1");
}

// =============================================================================
// HTTP
// =============================================================================

fn sessions() -> SessionManager {
    SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        SessionConfig::new(SECRET),
    )
}

fn cookie_header(sessions: &SessionManager, sid: &str) -> (String, String) {
    (
        "Cookie".to_string(),
        format!(
            "{}={}",
            sessions.cookie_name(),
            urlencoding::encode(&sessions.signed_cookie_value(sid))
        ),
    )
}

macro_rules! gateway_app {
    ($schema:expr, $sessions:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($schema))
                .app_data(web::Data::new(GraphQLConfig { playground: true }))
                .configure(routes::configure($sessions)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_http_session_identity_reaches_resolvers() {
    let (schema, _) = schema_with_store();
    let sessions = sessions();
    let sid = sessions.establish(None, "u1").await.unwrap();
    let app = gateway_app!(schema, sessions.clone());

    let req = test::TestRequest::post()
        .uri("/api")
        .insert_header(cookie_header(&sessions, &sid))
        .set_json(json!({ "query": r#"mutation { createPost(title: "A", content: "B") { authorId } }"# }))
        .to_request();
    let body: Json = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["createPost"]["authorId"], "u1");
}

#[actix_web::test]
async fn test_http_without_cookie_is_anonymous() {
    let (schema, store) = schema_with_store();
    let app = gateway_app!(schema, sessions());

    let req = test::TestRequest::post()
        .uri("/api")
        .set_json(json!({ "query": "mutation { createPost(title: \"A\") { _id } } " }))
        .to_request();
    let body: Json = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["errors"][0]["message"], "User not logged in.");
    assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
    assert_eq!(store.post_count().await, 0);
}

#[actix_web::test]
async fn test_http_cookie_for_unknown_session_is_anonymous() {
    let (schema, _) = schema_with_store();
    let sessions = sessions();
    let app = gateway_app!(schema, sessions.clone());

    let req = test::TestRequest::post()
        .uri("/api")
        .insert_header(cookie_header(&sessions, "expired-session"))
        .set_json(json!({ "query": "{ me { _id } }" }))
        .to_request();
    let body: Json = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["me"], Json::Null);
}

#[actix_web::test]
async fn test_http_get_executes_query() {
    let (schema, _) = schema_with_store();
    let app = gateway_app!(schema, sessions());

    let req = test::TestRequest::get()
        .uri("/api?query=%7B%20posts%20%7B%20_id%20%7D%20%7D")
        .to_request();
    let body: Json = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["posts"], json!([]));
}

#[actix_web::test]
async fn test_http_get_rejects_mutation_even_with_session() {
    let (schema, store) = schema_with_store();
    let sessions = sessions();
    let sid = sessions.establish(None, "victim").await.unwrap();
    let app = gateway_app!(schema, sessions.clone());

    let query = urlencoding::encode(r#"mutation { createPost(title: "x", content: "y") { _id } }"#);
    let req = test::TestRequest::get()
        .uri(&format!("/api?query={}", query))
        .insert_header(cookie_header(&sessions, &sid))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 405);
    assert_eq!(resp.headers().get("Allow").unwrap(), "POST");
    assert_eq!(store.post_count().await, 0);
}

#[actix_web::test]
async fn test_http_get_uses_selected_operation() {
    let (schema, store) = schema_with_store();
    let sessions = sessions();
    let sid = sessions.establish(None, "u1").await.unwrap();
    let app = gateway_app!(schema, sessions.clone());
    let document = urlencoding::encode(
        r#"query List { posts { _id } } mutation Write { createPost(title: "x") { _id } }"#,
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api?query={}&operationName=Write", document))
        .insert_header(cookie_header(&sessions, &sid))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 405);

    let req = test::TestRequest::get()
        .uri(&format!("/api?query={}&operationName=List", document))
        .insert_header(cookie_header(&sessions, &sid))
        .to_request();
    let body: Json = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["posts"], json!([]));
    assert_eq!(store.post_count().await, 0);
}

#[actix_web::test]
async fn test_http_browser_get_serves_playground() {
    let (schema, _) = schema_with_store();
    let app = gateway_app!(schema, sessions());

    let req = test::TestRequest::get()
        .uri("/api")
        .insert_header(("Accept", "text/html,application/xhtml+xml"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body = test::read_body(resp).await;
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("cursorShape"));
}

struct UnavailableSessionStore;

#[async_trait]
impl SessionStore for UnavailableSessionStore {
    async fn load(&self, _: &str) -> session_store::Result<Option<SessionRecord>> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }

    async fn save(&self, _: &str, _: &SessionRecord, _: Duration) -> session_store::Result<()> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }

    async fn destroy(&self, _: &str) -> session_store::Result<()> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }
}

#[actix_web::test]
async fn test_http_session_store_outage_returns_503() {
    let (schema, _) = schema_with_store();
    let sessions = SessionManager::new(Arc::new(UnavailableSessionStore), SessionConfig::new(SECRET));
    let app = gateway_app!(schema, sessions.clone());

    let req = test::TestRequest::post()
        .uri("/api")
        .insert_header(cookie_header(&sessions, "sid"))
        .set_json(json!({ "query": "{ me { _id } }" }))
        .to_request();
    let err = match app.call(req).await {
        Ok(_) => panic!("request should fail while the session store is down"),
        Err(err) => err,
    };
    assert_eq!(err.as_response_error().status_code(), 503);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_http_schema_and_metrics_endpoints() {
    let (schema, _) = schema_with_store();
    let app = gateway_app!(schema, sessions());

    let req = test::TestRequest::get().uri("/schema").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert!(String::from_utf8_lossy(&body).contains("comments: [Comment]!"));

    let req = test::TestRequest::post()
        .uri("/api")
        .set_json(json!({ "query": "{ me { _id } }" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert!(String::from_utf8_lossy(&body).contains("graphql_requests_total"));
}
