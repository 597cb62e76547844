use opensound_backend::{AppConfig, AppState, MemoryRepository, RepositoryState, create_router};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Serves the full router on an ephemeral port, backed by the in-memory repository.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let router = create_router(AppState::new(repo, AppConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["env"], "local");
}

#[tokio::test]
async fn test_register_login_toggle_scenario() {
    let app = spawn_app().await;

    // Register
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({ "email": "alice@x.com", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered: Value = response.json().await.unwrap();
    let token = registered["token"].as_str().unwrap().to_string();
    assert_eq!(registered["user"]["role"], "user");
    assert!(registered["user"].get("passwordHash").is_none());

    let playlists: Value = app
        .client
        .get(app.url("/playlists"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let playlists = playlists["playlists"].as_array().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0]["isLiked"], true);
    assert!(playlists[0]["songs"].as_array().unwrap().is_empty());

    // Wrong password
    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "alice@x.com", "password": "wrong1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "invalid credentials");

    // Toggle twice
    let song = json!({ "jamendoId": "t1", "name": "First", "artist_name": "Band" });
    let first: Value = app
        .client
        .post(app.url("/playlists/liked/toggle"))
        .bearer_auth(&token)
        .json(&song)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["liked"], true);

    let second: Value = app
        .client
        .post(app.url("/playlists/liked/toggle"))
        .bearer_auth(&token)
        .json(&song)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["liked"], false);

    let liked: Value = app
        .client
        .get(app.url("/playlists/liked/songs"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(liked["songs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/auth/me"))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_headers() {
    let app = spawn_app().await;

    let response = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/playlists"))
        .header("Origin", "http://localhost:8081")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization,content-type")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}
