//! Integration tests for user creation, login, refresh, and role membership.

use std::net::TcpListener;

use campus_api::configuration::{get_configuration, DatabaseSettings, JwtSettings};
use campus_api::email_client::EmailClient;
use campus_api::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub jwt_config: JwtSettings,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let email_client = EmailClient::new(&configuration.email, reqwest::Client::new())
        .expect("Invalid email configuration");

    let jwt_config = configuration.jwt.clone();
    let server = run(
        listener,
        connection_pool.clone(),
        jwt_config.clone(),
        email_client,
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        jwt_config,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn create_test_user(app: &TestApp, name: &str, email: &str, password: &str) -> Value {
    let response = reqwest::Client::new()
        .post(&format!("{}/users", &app.address))
        .json(&json!({ "name": name, "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}

// --- User creation ---

#[tokio::test]
async fn create_user_returns_201_for_valid_input() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let body = json!({
        "name": "John Doe",
        "email": "john@example.com",
        "password": "SecurePass123"
    });

    let response = client
        .post(&format!("{}/users", &app.address))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());

    let response_body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(response_body["email"], "john@example.com");
    assert_eq!(response_body["name"], "John Doe");
    assert!(response_body.get("password").is_none());

    let user = sqlx::query("SELECT email, name, password_hash FROM users WHERE email = 'john@example.com'")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");

    assert_eq!(user.get::<String, _>("email"), "john@example.com");
    // Stored as a bcrypt hash, never plaintext
    assert!(user.get::<String, _>("password_hash").starts_with("$2"));
}

#[tokio::test]
async fn create_user_returns_400_for_invalid_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let invalid_emails = vec!["notanemail", "user@", "@example.com", "user@@example.com"];

    for invalid_email in invalid_emails {
        let body = json!({
            "name": "Test User",
            "email": invalid_email,
            "password": "SecurePass123"
        });

        let response = client
            .post(&format!("{}/users", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject invalid email: {}",
            invalid_email
        );
    }
}

#[tokio::test]
async fn create_user_returns_400_for_weak_password() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let long_password = "a".repeat(129);
    let weak_passwords = vec![
        ("short", "password too short"),
        ("nouppercase123", "no uppercase"),
        ("NOLOWERCASE123", "no lowercase"),
        ("NoDigits", "no digits"),
        (long_password.as_str(), "password too long"),
    ];

    for (weak_password, reason) in weak_passwords {
        let body = json!({
            "name": "Test User",
            "email": "test@example.com",
            "password": weak_password
        });

        let response = client
            .post(&format!("{}/users", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject weak password: {}",
            reason
        );
    }
}

#[tokio::test]
async fn create_user_returns_400_for_duplicate_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    create_test_user(&app, "First", "dup@example.com", "SecurePass123").await;

    let response = client
        .post(&format!("{}/users", &app.address))
        .json(&json!({
            "name": "Second",
            "email": "dup@example.com",
            "password": "OtherPass456"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "Email already registered");
}

// --- User directory ---

#[tokio::test]
async fn get_user_returns_user_or_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = create_test_user(&app, "Alice", "alice@example.com", "SecurePass123").await;
    let user_id = created["id"].as_str().unwrap();

    let response = client
        .get(&format!("{}/users/{}", &app.address, user_id))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let response = client
        .get(&format!("{}/users/{}", &app.address, uuid::Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn update_user_changes_name_and_keeps_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = create_test_user(&app, "Bob", "bob@example.com", "SecurePass123").await;
    let user_id = created["id"].as_str().unwrap();

    let response = client
        .put(&format!("{}/users/{}", &app.address, user_id))
        .json(&json!({ "name": "Robert" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["name"], "Robert");
    assert_eq!(body["email"], "bob@example.com");
}

#[tokio::test]
async fn delete_user_returns_204_then_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = create_test_user(&app, "Carol", "carol@example.com", "SecurePass123").await;
    let user_id = created["id"].as_str().unwrap();

    let response = client
        .delete(&format!("{}/users/{}", &app.address, user_id))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let response = client
        .delete(&format!("{}/users/{}", &app.address, user_id))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());
}

// --- Login ---

#[tokio::test]
async fn login_returns_200_and_token_pair_for_valid_credentials() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    create_test_user(&app, "Dana", "dana@example.com", "SecurePass123").await;

    let response = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "dana@example.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("access_token").is_some());
    assert!(body.get("refresh_token").is_some());
    assert_eq!(body["user"]["email"], "dana@example.com");

    // The access token opens the protected profile route and identifies the user
    let access_token = body["access_token"].as_str().unwrap();
    let profile = client
        .get(&format!("{}/auth/profile", &app.address))
        .bearer_auth(access_token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, profile.status().as_u16());
    let profile_body: Value = profile.json().await.expect("Failed to parse response");
    assert_eq!(profile_body["email"], "dana@example.com");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    create_test_user(&app, "Eve", "eve@example.com", "SecurePass123").await;

    // Wrong password for a real account
    let wrong_password = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "eve@example.com", "password": "WrongPass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    // No such account at all
    let unknown_email = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "ghost@example.com", "password": "WrongPass123" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, wrong_password.status().as_u16());
    assert_eq!(400, unknown_email.status().as_u16());

    // Same message in both cases, so the response cannot confirm an account exists
    let body1: Value = wrong_password.json().await.unwrap();
    let body2: Value = unknown_email.json().await.unwrap();
    assert_eq!(body1["message"], body2["message"]);
    assert_eq!(body1["message"], "Email or password does not match");
}

#[tokio::test]
async fn profile_requires_access_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn reset_token_is_rejected_by_protected_routes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    create_test_user(&app, "Frank", "frank@example.com", "SecurePass123").await;

    let (reset_token, _) =
        campus_api::auth::issue_reset_token("frank@example.com", &app.jwt_config)
            .expect("Failed to issue reset token");

    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .bearer_auth(reset_token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rotates_the_refresh_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    create_test_user(&app, "Grace", "grace@example.com", "SecurePass123").await;

    let login: Value = client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "grace@example.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");

    let old_refresh = login["refresh_token"].as_str().unwrap().to_string();

    let refreshed = client
        .post(&format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": old_refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, refreshed.status().as_u16());

    let refreshed_body: Value = refreshed.json().await.expect("Failed to parse response");
    assert_ne!(refreshed_body["refresh_token"], json!(old_refresh.clone()));

    // Rotated-out token no longer works
    let reuse = client
        .post(&format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": old_refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, reuse.status().as_u16());
}

// --- Role membership ---

#[tokio::test]
async fn role_can_be_assigned_once_per_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = create_test_user(&app, "Helen", "helen@example.com", "SecurePass123").await;
    let user_id = created["id"].as_str().unwrap();

    let first = client
        .post(&format!("{}/professors", &app.address))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, first.status().as_u16());

    let second = client
        .post(&format!("{}/professors", &app.address))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, second.status().as_u16());
}

#[tokio::test]
async fn role_assignment_requires_existing_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/students", &app.address))
        .json(&json!({ "user_id": uuid::Uuid::new_v4() }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn role_membership_can_be_listed_and_removed() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = create_test_user(&app, "Ivan", "ivan@example.com", "SecurePass123").await;
    let user_id = created["id"].as_str().unwrap();

    let assigned: Value = client
        .post(&format!("{}/administrators", &app.address))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");

    let members: Value = client
        .get(&format!("{}/administrators", &app.address))
        .send()
        .await
        .expect("Failed to execute request.")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(members.as_array().unwrap().len(), 1);

    let membership_id = assigned["id"].as_str().unwrap();
    let removed = client
        .delete(&format!("{}/administrators/{}", &app.address, membership_id))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, removed.status().as_u16());

    let removed_again = client
        .delete(&format!("{}/administrators/{}", &app.address, membership_id))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, removed_again.status().as_u16());
}
