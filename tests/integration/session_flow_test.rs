//! Session lifecycle across process restarts
//!
//! Each `env.client()` call builds a fresh client over the same token file,
//! the way a new process start would.

mod common;

use common::{bearer, mint_token, TestEnv};
use libris_auth::{AuthError, GuardDecision, RegistrationForm, Role, RouteGuard, SessionPhase};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_restore_logout() {
    let env = TestEnv::start().await;
    let access = mint_token("alice", "user", 300);

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": access, "refresh": "R"})),
        )
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    assert_eq!(client.session().initialize().phase(), SessionPhase::Unauthenticated);

    client.session().login("alice", "secret").await.unwrap();
    assert_eq!(
        env.stored_tokens(),
        json!({"access_token": access, "refresh_token": "R"})
    );
    assert_eq!(client.session().user().unwrap().subject, "alice");

    // New process restores from the file
    let restarted = env.client();
    let state = restarted.session().initialize();
    assert_eq!(state.phase(), SessionPhase::Authenticated);
    assert_eq!(state.user.unwrap().subject, "alice");

    restarted.session().logout();
    restarted.session().logout();
    assert_eq!(env.stored_tokens(), json!({}));

    let after_logout = env.client();
    assert_eq!(
        after_logout.session().initialize().phase(),
        SessionPhase::Unauthenticated
    );
}

#[tokio::test]
async fn test_expired_token_on_startup_is_discarded() {
    let env = TestEnv::start().await;
    let expired = mint_token("alice", "user", -60);
    std::fs::write(
        env.token_file(),
        serde_json::to_vec(&json!({"access_token": expired, "refresh_token": "R"})).unwrap(),
    )
    .unwrap();

    let client = env.client();
    let state = client.session().initialize();

    assert!(!state.loading);
    assert!(!state.is_authenticated());
    assert_eq!(env.stored_tokens(), json!({}));
    assert_eq!(
        client.guard().evaluate(&state),
        GuardDecision::Redirect("/login".to_string())
    );
}

#[tokio::test]
async fn test_failed_login_keeps_previous_session() {
    let env = TestEnv::start().await;
    let access = mint_token("alice", "user", 300);
    std::fs::write(
        env.token_file(),
        serde_json::to_vec(&json!({"access_token": access, "refresh_token": "R"})).unwrap(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();

    let err = client.session().login("mallory", "guess").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::Rejected("No active account found with the given credentials".to_string())
    );
    assert_eq!(client.session().user().unwrap().subject, "alice");
    assert_eq!(
        env.stored_tokens(),
        json!({"access_token": access, "refresh_token": "R"})
    );
}

#[tokio::test]
async fn test_register_then_login() {
    let env = TestEnv::start().await;
    let access = mint_token("newbie", "user", 300);

    Mock::given(method("POST"))
        .and(path("/api/register/"))
        .and(body_json(json!({
            "username": "newbie",
            "email": "newbie@example.com",
            "password": "secret1",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": access, "refresh": "R"})),
        )
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();

    let form = RegistrationForm::new("newbie", "newbie@example.com", "secret1");
    client.session().register(&form).await.unwrap();
    assert!(!client.session().is_authenticated());
    assert_eq!(env.stored_tokens(), json!({}));

    client.session().login("newbie", "secret1").await.unwrap();
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn test_register_server_field_errors() {
    let env = TestEnv::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["A user with that username already exists."],
            "email": ["Enter a valid email address."]
        })))
        .mount(&env.server)
        .await;

    let client = env.client();
    let form = RegistrationForm::new("alice", "alice@example.com", "secret1");

    let err = client.session().register(&form).await.unwrap_err();
    let fields = err.field_errors().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(
        fields.get("username"),
        ["A user with that username already exists.".to_string()]
    );
    assert_eq!(err.payload().unwrap()["email"][0], "Enter a valid email address.");
}

#[tokio::test]
async fn test_role_guard_on_restored_session() {
    let env = TestEnv::start().await;
    let access = mint_token("lena", "librarian", 300);
    std::fs::write(
        env.token_file(),
        serde_json::to_vec(&json!({"access_token": access, "refresh_token": "R"})).unwrap(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/dashboard/"))
        .and(header("Authorization", bearer(&access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"loans": 3})))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    let state = client.session().initialize();
    assert_eq!(state.user.as_ref().unwrap().role, Role::Librarian);

    let staff_only = RouteGuard::new("/login").requiring(Role::Librarian);
    let admin_only = RouteGuard::new("/login").requiring(Role::Admin);
    assert_eq!(staff_only.evaluate(&state), GuardDecision::Allow);
    assert_eq!(admin_only.evaluate(&state), GuardDecision::Forbidden);

    let dashboard: Value = client.api().get_json("/dashboard/").await.unwrap();
    assert_eq!(dashboard, json!({"loans": 3}));
}
