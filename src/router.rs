use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit, require_datastore},
    routes::{chat, generate, health, user},
};

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let rate_limiter = Arc::new(RateLimiter::from_config(&config));

    let public_routes = Router::new()
        .route("/auth/register", post(user::handler::register))
        .route("/auth/login", post(user::handler::login))
        .layer(from_fn_with_state(state.clone(), require_datastore));

    // The auth layer is added last so it runs before the datastore check.
    let protected_routes = Router::new()
        .route("/chat/history", get(chat::handler::history))
        .route("/chat/save", post(chat::handler::save))
        .route("/chat/clear", post(chat::handler::clear))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), require_datastore))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut generation_routes = Router::new()
        .route("/generate-text", post(generate::handler::generate_text))
        .route("/generate-image", post(generate::handler::generate_image));
    if config.require_auth_for_generation {
        generation_routes =
            generation_routes.layer(from_fn_with_state(state.clone(), auth_middleware));
    }

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(generation_routes)
        .route("/health", get(health::health))
        .layer(from_fn_with_state(rate_limiter, rate_limit));

    let base = config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    let router = router.layer(from_fn(log_errors));

    let router = if cfg!(debug_assertions) || config.cors_permissive {
        tracing::debug!("Adding permissive CORS layer");
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::MemoryDatastore;
    use crate::gateway::{Gateway, tests::StubProvider};
    use crate::utils::generate_token;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        router: Router,
        store: Arc<MemoryDatastore>,
        provider: Arc<StubProvider>,
    }

    fn app_with(config: Config, provider: StubProvider) -> TestApp {
        let store = Arc::new(MemoryDatastore::new());
        let provider = Arc::new(provider);
        let state = AppState {
            config: config.clone(),
            store: store.clone(),
            gateway: Gateway::new(provider.clone(), config.persona_instruction.clone()),
        };
        TestApp {
            router: create_router(state),
            store,
            provider,
        }
    }

    fn app() -> TestApp {
        app_with(Config::for_tests(), StubProvider::default())
    }

    impl TestApp {
        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        async fn post(&self, path: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
            let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/json");
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            self.send(builder.body(Body::from(body.to_string())).unwrap()).await
        }

        async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut builder = Request::get(path);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn login_as(&self, username: &str) -> String {
            let creds = json!({ "username": username, "password": "secret123" });
            self.post("/api/auth/register", creds.clone(), None).await;
            let (status, body) = self.post("/api/auth/login", creds, None).await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn register_login_save_and_read_back() {
        let app = app();
        let creds = json!({ "username": "alice", "password": "secret123" });

        let (status, body) = app.post("/api/auth/register", creds.clone(), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].is_string());

        let (status, body) = app.post("/api/auth/login", creds, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        let token = body["token"].as_str().unwrap().to_string();

        let message = json!({ "message": { "sender": "user", "text": "hi", "isImage": false } });
        let (status, body) = app.post("/api/chat/save", message, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, body) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let history = body.as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["sender"], "user");
        assert_eq!(history[0]["text"], "hi");
        assert_eq!(history[0]["isImage"], false);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_bad_request() {
        let app = app();
        let creds = json!({ "username": "alice", "password": "secret123" });

        let (first, _) = app.post("/api/auth/register", creds.clone(), None).await;
        let (second, _) = app.post("/api/auth/register", creds, None).await;
        let (other, _) = app
            .post("/api/auth/register", json!({ "username": "bob", "password": "secret123" }), None)
            .await;

        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::BAD_REQUEST);
        assert_eq!(other, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn login_failures_look_identical() {
        let app = app();
        app.login_as("alice").await;

        let wrong_password = app
            .post("/api/auth/login", json!({ "username": "alice", "password": "wrongpass" }), None)
            .await;
        let unknown_user = app
            .post("/api/auth/login", json!({ "username": "nobody", "password": "secret123" }), None)
            .await;

        assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password, unknown_user);
    }

    #[tokio::test]
    async fn history_without_token_is_rejected_before_the_store() {
        let app = app();
        app.store.set_available(false);

        let (status, _) = app.get("/api/chat/history", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn foreign_token_is_forbidden_not_unauthenticated() {
        let app = app();
        let mut foreign = Config::for_tests();
        foreign.jwt_secret = "another-secret".into();
        let token = generate_token(&Uuid::new_v4(), "alice", &foreign).unwrap();

        let (status, _) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.get("/api/chat/history", Some("not-a-jwt")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn fresh_user_has_empty_history_and_clear_is_idempotent() {
        let app = app();
        let token = app.login_as("alice").await;

        let (status, body) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = app.post("/api/chat/clear", Value::Null, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let message = json!({ "message": { "sender": "assistant", "text": "yo", "isImage": false } });
        app.post("/api/chat/save", message, Some(&token)).await;
        app.post("/api/chat/clear", Value::Null, Some(&token)).await;

        let (_, body) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn saving_past_the_cap_drops_the_oldest() {
        let app = app();
        let token = app.login_as("alice").await;

        for i in 1..=101 {
            let message = json!({ "message": { "sender": "user", "text": format!("m{}", i), "isImage": false } });
            let (status, _) = app.post("/api/chat/save", message, Some(&token)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = app.get("/api/chat/history", Some(&token)).await;
        let texts: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        let expected: Vec<String> = (2..=101).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn datastore_outage_is_a_tagged_503() {
        let app = app();
        let token = app.login_as("alice").await;
        app.store.set_available(false);

        let (status, body) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "db_unavailable");

        let (status, body) = app
            .post("/api/auth/login", json!({ "username": "alice", "password": "secret123" }), None)
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "db_unavailable");

        let (status, body) = app.get("/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], false);
    }

    #[tokio::test]
    async fn empty_contents_fail_before_the_provider() {
        let app = app();

        let (status, _) = app.post("/api/generate-text", json!({ "contents": [] }), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.post("/api/generate-text", json!({}), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_generation_returns_a_candidate() {
        let app = app();
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] });

        let (status, body) = app.post("/api/generate-text", body, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], "echo: hello");
        assert_eq!(body["candidates"][0]["content"]["role"], "model");
    }

    #[tokio::test]
    async fn upstream_failure_is_a_500_with_the_message() {
        let provider = StubProvider {
            fail_with: Some("model overloaded".into()),
            ..Default::default()
        };
        let app = app_with(Config::for_tests(), provider);
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] });

        let (status, body) = app.post("/api/generate-text", body, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "model overloaded");
    }

    #[tokio::test]
    async fn image_generation_validates_and_reports_missing_payload() {
        let app = app();

        let (status, _) = app.post("/api/generate-image", json!({ "instances": [] }), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/api/generate-image", json!({ "instances": [{ "prompt": "a cat" }] }), None)
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn image_generation_returns_base64() {
        let provider = StubProvider {
            image: Some("iVBORw0K".into()),
            ..Default::default()
        };
        let app = app_with(Config::for_tests(), provider);

        let (status, body) = app
            .post("/api/generate-image", json!({ "instances": [{ "prompt": "a cat" }] }), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imageBase64"], "iVBORw0K");
    }

    #[tokio::test]
    async fn generation_can_require_authentication() {
        let mut config = Config::for_tests();
        config.require_auth_for_generation = true;
        let app = app_with(config, StubProvider::default());
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] });

        let (status, _) = app.post("/api/generate-text", body.clone(), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = app.login_as("alice").await;
        let (status, _) = app.post("/api/generate-text", body, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_bodies_are_invalid_input() {
        let app = app();
        let token = app.login_as("alice").await;

        let (status, body) = app.post("/api/chat/save", json!({}), Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], crate::utils::error_codes::VALIDATION_ERROR);
        assert!(body["message"].as_str().unwrap().contains("message"));

        let unknown_sender = json!({ "message": { "sender": "bot", "text": "hi", "isImage": false } });
        let (status, body) = app.post("/api/chat/save", unknown_sender, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], crate::utils::error_codes::VALIDATION_ERROR);

        let (status, _) = app
            .post("/api/auth/register", json!({ "username": 5, "password": "secret123" }), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.post("/api/generate-text", json!({ "contents": "hi" }), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], crate::utils::error_codes::VALIDATION_ERROR);
        assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);

        let (_, history) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(history, json!([]));
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_invalid_input() {
        let app = app();
        let req = Request::post("/api/auth/login")
            .body(Body::from(r#"{"username":"alice","password":"secret123"}"#))
            .unwrap();

        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], crate::utils::error_codes::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn generated_images_larger_than_two_megabytes_are_saved() {
        let app = app();
        let token = app.login_as("alice").await;
        let data_uri = format!("data:image/png;base64,{}", "A".repeat(3 * 1024 * 1024));
        let message = json!({ "message": { "sender": "assistant", "text": data_uri, "isImage": true } });

        let (status, _) = app.post("/api/chat/save", message, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.get("/api/chat/history", Some(&token)).await;
        assert_eq!(body[0]["isImage"], true);
        assert_eq!(body[0]["text"].as_str().unwrap().len(), data_uri.len());
    }

    #[tokio::test]
    async fn bodies_beyond_the_configured_cap_are_refused() {
        let mut config = Config::for_tests();
        config.max_body_bytes = 1024;
        let app = app_with(config, StubProvider::default());
        let token = app.login_as("alice").await;
        let message = json!({ "message": { "sender": "user", "text": "x".repeat(4096), "isImage": false } });

        let (status, body) = app.post("/api/chat/save", message, Some(&token)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], crate::utils::error_codes::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn requests_past_the_limit_are_throttled() {
        let mut config = Config::for_tests();
        config.rate_limit_requests = 2;
        let app = app_with(config, StubProvider::default());

        assert_eq!(app.get("/api/health", None).await.0, StatusCode::OK);
        assert_eq!(app.get("/api/health", None).await.0, StatusCode::OK);
        let (status, body) = app.get("/api/health", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["message"].is_string());
    }
}
