//! Refresh-on-401 scenarios against a mocked backend

mod common;

use common::{bearer, mint_token, TestEnv};
use libris_api::ApiError;
use libris_auth::{GuardDecision, SessionPhase};
use serde_json::{json, Value};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn seed_tokens(env: &TestEnv, access: &str, refresh: &str) {
    tokio::fs::write(
        env.token_file(),
        serde_json::to_vec(&json!({"access_token": access, "refresh_token": refresh})).unwrap(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_expired_access_refreshes_and_retries_once() {
    let env = TestEnv::start().await;
    let stale = mint_token("alice", "user", 300);
    let fresh = mint_token("alice", "user", 300);
    seed_tokens(&env, &stale, "R").await;

    Mock::given(method("GET"))
        .and(path("/api/books/"))
        .and(header("Authorization", bearer(&stale).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type"
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "R"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": fresh})))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/books/"))
        .and(header("Authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "title": "Dune"}])))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();

    let books: Value = client.api().get_json("/books/").await.unwrap();
    assert_eq!(books[0]["title"], "Dune");
    assert_eq!(
        env.stored_tokens(),
        json!({"access_token": fresh, "refresh_token": "R"})
    );
    assert!(client.navigator().history().is_empty());
}

#[tokio::test]
async fn test_rejected_refresh_logs_out_and_redirects() {
    let env = TestEnv::start().await;
    let stale = mint_token("alice", "user", 300);
    seed_tokens(&env, &stale, "R-expired").await;

    Mock::given(method("GET"))
        .and(path("/api/loans/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token is invalid or expired",
            "code": "token_not_valid"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();
    let mut rx = client.session().subscribe();

    let err = client.api().get_json::<Value>("/loans/").await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired(_)));
    assert_eq!(env.stored_tokens(), json!({}));
    assert_eq!(client.navigator().current().as_deref(), Some("/login"));

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert_eq!(state.phase(), SessionPhase::Unauthenticated);
    assert_eq!(
        client.guard().evaluate(&state),
        GuardDecision::Redirect("/login".to_string())
    );
}

#[tokio::test]
async fn test_missing_refresh_token_redirects_without_calling_backend() {
    let env = TestEnv::start().await;

    Mock::given(method("GET"))
        .and(path("/api/profiles/me/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();

    let err = client.api().get_json::<Value>("/profiles/me/").await.unwrap_err();
    assert!(err.is_session_expired());
    assert_eq!(client.navigator().history(), vec!["/login"]);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_persisted() {
    let env = TestEnv::start().await;
    let stale = mint_token("alice", "user", 300);
    let fresh = mint_token("alice", "user", 300);
    seed_tokens(&env, &stale, "R1").await;

    Mock::given(method("GET"))
        .and(path("/api/reservations/"))
        .and(header("Authorization", bearer(&stale).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": fresh, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/reservations/"))
        .and(header("Authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();
    let _: Value = client.api().get_json("/reservations/").await.unwrap();

    assert_eq!(
        env.stored_tokens(),
        json!({"access_token": fresh, "refresh_token": "R2"})
    );
}

#[tokio::test]
async fn test_retry_still_unauthorized_propagates() {
    let env = TestEnv::start().await;
    let stale = mint_token("alice", "user", 300);
    let fresh = mint_token("alice", "user", 300);
    seed_tokens(&env, &stale, "R").await;

    Mock::given(method("GET"))
        .and(path("/api/reviews/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": fresh})))
        .expect(1)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();

    let err = client.api().get_json::<Value>("/reviews/").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    // Refresh itself succeeded, so the session survives
    assert!(client.session().is_authenticated());
    assert!(client.navigator().history().is_empty());
}

#[tokio::test]
async fn test_parallel_requests_share_one_refresh() {
    let env = TestEnv::start().await;
    let stale = mint_token("alice", "user", 300);
    let fresh = mint_token("alice", "user", 300);
    seed_tokens(&env, &stale, "R").await;

    Mock::given(method("GET"))
        .and(header("Authorization", bearer(&stale).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(4)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": fresh})))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(4)
        .mount(&env.server)
        .await;

    let client = env.client();
    client.session().initialize();
    let api = client.api();

    let results = tokio::join!(
        api.get_json::<Value>("/books/"),
        api.get_json::<Value>("/loans/"),
        api.get_json::<Value>("/reservations/"),
        api.get_json::<Value>("/reviews/"),
    );

    assert_ok!(results.0);
    assert_ok!(results.1);
    assert_ok!(results.2);
    assert_ok!(results.3);
}
