use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use shor_api::app::{build_app, AppServices};
use shor_core::UserId;
use shor_infra::model::AuditContext;
use shor_infra::AppConfig;

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a seeded in-memory store, on an ephemeral port.
        let services = Arc::new(
            AppServices::in_memory(&AppConfig::default())
                .await
                .expect("failed to build services"),
        );
        let app = build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, email: &str, role: Option<&str>) -> reqwest::Response {
        let mut body = json!({
            "email": email,
            "password": "correct-horse",
            "name": "Meera Iyer",
            "phone": "9876543210",
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        self.client
            .post(self.url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Register and return `(token, user)`.
    async fn sign_up(&self, email: &str, role: Option<&str>) -> (String, Value) {
        let res = self.register(email, role).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (body["token"].as_str().unwrap().to_string(), body["user"].clone())
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/api/auth/me", "not-a-session").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn registration_returns_an_enriched_session() {
    let srv = TestServer::spawn().await;
    let (token, user) = srv.sign_up("student@example.com", None).await;
    assert_eq!(user["userType"], "basic");
    assert_eq!(user["roles"], json!(["student"]));

    let res = srv.get("/api/auth/me", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["email"], "student@example.com");
}

#[tokio::test]
async fn registration_rejects_bad_input() {
    let srv = TestServer::spawn().await;
    srv.sign_up("taken@example.com", None).await;

    let res = srv.register("TAKEN@example.com", None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.register("root@example.com", Some("admin")).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv
        .client
        .post(srv.url("/api/auth/register"))
        .json(&json!({ "email": "short@example.com", "password": "short", "name": "Short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn login_and_logout() {
    let srv = TestServer::spawn().await;
    srv.sign_up("dancer@example.com", None).await;

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "dancer@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "dancer@example.com", "password": "correct-horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let res = srv.post("/api/auth/logout", &token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = srv.get("/api/auth/me", &token).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Signing out without a session still succeeds.
    let res = srv.client.post(srv.url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn students_cannot_read_the_audit_log() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.sign_up("nosy@example.com", None).await;
    let res = srv.get("/api/audit-log", &token).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_grant_takes_effect_on_the_next_request() {
    let srv = TestServer::spawn().await;
    let (token, user) = srv.sign_up("ops@example.com", None).await;
    let user_id: UserId = user["id"].as_str().unwrap().parse().unwrap();

    srv.services
        .store
        .assign_role(user_id, "admin", None, &AuditContext::system())
        .await
        .unwrap();

    let res = srv.get("/api/audit-log", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let actions: Vec<&str> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"user_registered"));
    assert!(actions.contains(&"role_assigned"));

    let res = srv
        .get(&format!("/api/rbac/users/{user_id}/roles"), &token)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn artist_creates_a_class_and_a_student_books_it() {
    let srv = TestServer::spawn().await;
    let (_, owner) = srv.sign_up("owner@example.com", Some("studio_owner")).await;
    let (artist_token, artist) = srv.sign_up("artist@example.com", Some("artist")).await;
    let (student_token, _) = srv.sign_up("student@example.com", None).await;
    assert_eq!(artist["userType"], "artist");

    let class = json!({
        "title": "Kathak Basics",
        "type": "regular",
        "style": "kathak",
        "level": "beginner",
        "studioId": owner["studioId"],
        "date": "2030-01-15",
        "startTime": "18:00:00",
        "endTime": "19:30:00",
        "regularPrice": 500,
        "maxParticipants": 1,
        "description": "Footwork and tatkar",
    });

    // Students hold no create_class grant.
    let res = srv.post("/api/classes", &student_token, class.clone()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.post("/api/classes", &artist_token, class).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let class_id = body["class"]["id"].clone();
    assert_eq!(body["class"]["artistId"], artist["artistId"]);

    let res = srv
        .post(&format!("/api/classes/{class_id}/bookings"), &student_token, json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // The only seat is gone.
    let res = srv
        .post(&format!("/api/classes/{class_id}/bookings"), &artist_token, json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.get("/api/bookings/classes", &student_token).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.sign_up("visitor@example.com", None).await;

    let res = srv.get("/api/classes/999", &token).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.get("/api/classes/abc", &token).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
