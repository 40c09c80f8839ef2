use chrono::Duration;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

use plantcare::auth::{AuthService, RateLimitConfig, RateLimiter};
use plantcare::clock::ManualClock;
use plantcare::configuration::JwtSettings;
use plantcare::startup::run;
use plantcare::store::{InMemoryCredentialStore, InMemoryTokenStore};

const PASSWORD: &str = "Monstera42!";

pub struct TestApp {
    pub address: String,
    pub clock: Arc<ManualClock>,
    pub client: reqwest::Client,
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let clock = Arc::new(ManualClock::default());
    let jwt = JwtSettings {
        secret: "integration-secret-at-least-32-characters".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604_800,
        issuer: "plantcare-test".to_string(),
    };
    // Minimum bcrypt cost keeps the suite fast
    let service = AuthService::new(
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryTokenStore::new()),
        jwt,
        4,
        clock.clone(),
    );
    let limiter = RateLimiter::new(RateLimitConfig::default(), clock.clone());

    let server = run(listener, Arc::new(service), Arc::new(limiter)).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        clock,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn post_authorized(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn get_me(&self, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/auth/me", self.address));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, device_id: &str) -> reqwest::Response {
        self.post(
            "/auth/register",
            &json!({
                "email": email,
                "password": PASSWORD,
                "deviceId": device_id,
                "firstName": "Alice"
            }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str, device_id: &str) -> reqwest::Response {
        self.post(
            "/auth/login",
            &json!({ "email": email, "password": password, "deviceId": device_id }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/auth/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }
}

async fn body_json(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response")
}

fn refresh_token_of(body: &Value) -> String {
    body["tokens"]["refreshToken"].as_str().unwrap().to_string()
}

fn access_token_of(body: &Value) -> String {
    body["tokens"]["accessToken"].as_str().unwrap().to_string()
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_with_user_and_tokens() {
    let app = spawn_app();

    let response = app.register("Alice@Example.com", "d1").await;
    assert_eq!(201, response.status().as_u16());

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["firstName"], "Alice");
    assert_eq!(body["user"]["role"], "USER");
    assert_eq!(body["user"]["isVerified"], false);
    assert!(body["user"].get("passwordHash").is_none());
    assert_eq!(body["tokens"]["tokenType"], "Bearer");
    assert_eq!(body["tokens"]["expiresIn"], 900);
    assert_eq!(refresh_token_of(&body).len(), 64);
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email_regardless_of_password() {
    let app = spawn_app();
    assert_eq!(201, app.register("alice@example.com", "d1").await.status().as_u16());

    let response = app
        .post(
            "/auth/register",
            &json!({
                "email": "ALICE@example.com",
                "password": "Other-Pass9",
                "deviceId": "d2"
            }),
        )
        .await;

    assert_eq!(409, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "USER_ALREADY_EXISTS");
}

#[tokio::test]
async fn register_returns_400_listing_every_invalid_field() {
    let app = spawn_app();

    let response = app
        .post(
            "/auth/register",
            &json!({ "email": "not-an-email", "password": "weak" }),
        )
        .await;

    assert_eq!(400, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["deviceId", "email", "password"]);
}

#[tokio::test]
async fn register_returns_400_for_weak_passwords() {
    let app = spawn_app();
    let test_cases = vec![
        ("Short1!", "too short"),
        ("alllowercase1!", "no uppercase"),
        ("ALLUPPERCASE1!", "no lowercase"),
        ("NoDigitsHere!", "no digit"),
        ("NoSymbols123", "no symbol"),
    ];

    for (password, description) in test_cases {
        let response = app
            .post(
                "/auth/register",
                &json!({ "email": "a@example.com", "password": password, "deviceId": "d1" }),
            )
            .await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not reject a password with {}.",
            description
        );
    }
}

#[tokio::test]
async fn malformed_json_returns_validation_envelope() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/auth/login", app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_with_independent_pair_per_device() {
    let app = spawn_app();
    let registered = body_json(app.register("alice@example.com", "d1").await).await;

    let response = app.login("alice@example.com", PASSWORD, "d2").await;
    assert_eq!(200, response.status().as_u16());

    let logged_in = body_json(response).await;
    assert_ne!(refresh_token_of(&registered), refresh_token_of(&logged_in));
    assert!(!logged_in["user"]["lastLoginAt"].is_null());

    // Logging in on d2 leaves the d1 session alone
    assert_eq!(200, app.refresh(&refresh_token_of(&registered)).await.status().as_u16());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let app = spawn_app();
    app.register("alice@example.com", "d1").await;

    let wrong_password = app.login("alice@example.com", "Wrong-Pass1", "d1").await;
    let unknown_email = app.login("nobody@example.com", PASSWORD, "d1").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a["error"]["code"], "INVALID_CREDENTIALS");
    assert_eq!(a["error"], b["error"]);
}

// --- Rate Limiting Tests ---

#[tokio::test]
async fn sixth_failed_login_within_window_is_rate_limited() {
    let app = spawn_app();
    app.register("alice@example.com", "d1").await;

    for _ in 0..5 {
        let response = app.login("alice@example.com", "Wrong-Pass1", "d1").await;
        assert_eq!(401, response.status().as_u16());
    }

    // Even the right password is refused once the key is exhausted
    let response = app.login("alice@example.com", PASSWORD, "d1").await;
    assert_eq!(429, response.status().as_u16());
    assert!(response.headers().get("retry-after").is_some());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Other accounts are unaffected
    app.register("bob@example.com", "d1").await;
    assert_eq!(200, app.login("bob@example.com", PASSWORD, "d1").await.status().as_u16());

    app.clock.advance(Duration::minutes(15));
    assert_eq!(200, app.login("alice@example.com", PASSWORD, "d1").await.status().as_u16());
}

#[tokio::test]
async fn successful_logins_do_not_consume_attempts() {
    let app = spawn_app();
    app.register("alice@example.com", "d1").await;

    for _ in 0..10 {
        let response = app.login("alice@example.com", PASSWORD, "d1").await;
        assert_eq!(200, response.status().as_u16());
    }

    for _ in 0..4 {
        app.login("alice@example.com", "Wrong-Pass1", "d1").await;
    }
    assert_eq!(200, app.login("alice@example.com", PASSWORD, "d1").await.status().as_u16());
}

// --- Refresh / Logout Tests ---

#[tokio::test]
async fn refresh_rotates_and_old_token_stops_working() {
    let app = spawn_app();
    let registered = body_json(app.register("alice@example.com", "d1").await).await;
    let original = refresh_token_of(&registered);

    let response = app.refresh(&original).await;
    assert_eq!(200, response.status().as_u16());
    let rotated = body_json(response).await;
    assert_ne!(refresh_token_of(&rotated), original);

    let response = app.refresh(&original).await;
    assert_eq!(401, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_REFRESH_TOKEN");

    assert_eq!(200, app.refresh(&refresh_token_of(&rotated)).await.status().as_u16());
}

#[tokio::test]
async fn refresh_fails_after_expiry() {
    let app = spawn_app();
    let registered = body_json(app.register("alice@example.com", "d1").await).await;

    app.clock.advance(Duration::days(7));
    let response = app.refresh(&refresh_token_of(&registered)).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_always_succeeds_and_revokes() {
    let app = spawn_app();
    let registered = body_json(app.register("alice@example.com", "d1").await).await;
    let token = refresh_token_of(&registered);

    let test_cases = vec![
        json!({ "refreshToken": token }),
        json!({ "refreshToken": token }),
        json!({ "refreshToken": "never-issued" }),
        json!({}),
    ];
    for body in test_cases {
        let response = app.post("/auth/logout", &body).await;
        assert_eq!(200, response.status().as_u16(), "logout failed for {}", body);
    }

    assert_eq!(401, app.refresh(&token).await.status().as_u16());
}

// --- Protected Route Tests ---

#[tokio::test]
async fn me_requires_a_bearer_token() {
    let app = spawn_app();

    let response = app.get_me(None).await;
    assert_eq!(401, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = app.get_me(Some("invalid.token.here")).await;
    assert_eq!(401, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn me_returns_current_user() {
    let app = spawn_app();
    let registered = body_json(app.register("alice@example.com", "d1").await).await;

    let response = app.get_me(Some(&access_token_of(&registered))).await;
    assert_eq!(200, response.status().as_u16());

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["id"], registered["user"]["id"]);
}

#[tokio::test]
async fn change_password_revokes_all_sessions() {
    let app = spawn_app();
    let d1 = body_json(app.register("alice@example.com", "d1").await).await;
    let d2 = body_json(app.login("alice@example.com", PASSWORD, "d2").await).await;
    let access = access_token_of(&d1);

    let response = app
        .post_authorized(
            "/auth/change-password",
            &access,
            &json!({ "currentPassword": "Not-It-123", "newPassword": "Calathea7?" }),
        )
        .await;
    assert_eq!(400, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CURRENT_PASSWORD");

    let response = app
        .post_authorized(
            "/auth/change-password",
            &access,
            &json!({ "currentPassword": PASSWORD, "newPassword": "Calathea7?" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    assert_eq!(401, app.refresh(&refresh_token_of(&d1)).await.status().as_u16());
    assert_eq!(401, app.refresh(&refresh_token_of(&d2)).await.status().as_u16());
    assert_eq!(401, app.login("alice@example.com", PASSWORD, "d1").await.status().as_u16());
    assert_eq!(200, app.login("alice@example.com", "Calathea7?", "d1").await.status().as_u16());
}

#[tokio::test]
async fn change_password_requires_authentication() {
    let app = spawn_app();

    let response = app
        .post(
            "/auth/change-password",
            &json!({ "currentPassword": PASSWORD, "newPassword": "Calathea7?" }),
        )
        .await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn revoke_all_tokens_ends_every_device_session() {
    let app = spawn_app();

    let response = app.register("alice@example.com", "d1").await;
    assert_eq!(201, response.status().as_u16());
    let d1 = body_json(response).await;

    let response = app.login("alice@example.com", PASSWORD, "d2").await;
    assert_eq!(200, response.status().as_u16());
    let d2 = body_json(response).await;

    let response = app
        .post_authorized("/auth/revoke-all-tokens", &access_token_of(&d2), &json!({}))
        .await;
    assert_eq!(200, response.status().as_u16());
    let body = body_json(response).await;
    assert_eq!(body["revoked"], 2);

    assert_eq!(401, app.refresh(&refresh_token_of(&d1)).await.status().as_u16());
    assert_eq!(401, app.refresh(&refresh_token_of(&d2)).await.status().as_u16());
}
