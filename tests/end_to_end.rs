// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Full message path through the public HTTP surface: two clients register
//! keys, open a chat, and exchange a message while the recipient is offline.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sealed_chat::{
    api::router,
    auth::{
        tokens::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL},
        AuthenticatedUser, Role, TokenService, TokenSettings,
    },
    client::{KeyManager, KeyManagerConfig, MemoryKeyStore, StaticKeyDirectory},
    crypto::{
        envelope::{open_e2e_text, seal_e2e},
        PublicKey, StorageKey,
    },
    relay::RelaySettings,
    state::AppState,
    storage::{ChatDatabase, DATABASE_FILE},
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery staple";

struct Harness {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(ChatDatabase::open(&dir.path().join(DATABASE_FILE)).unwrap());
    let tokens = Arc::new(TokenService::new(
        TokenSettings {
            access_secret: "integration-access".into(),
            refresh_secret: "integration-refresh".into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        },
        Arc::clone(&db),
    ));
    let state = AppState::new(
        db,
        tokens,
        Arc::new(StorageKey::random()),
        RelaySettings::default(),
    );
    Harness {
        app: router(state.clone()),
        state,
        _dir: dir,
    }
}

fn access_token(state: &AppState, user_id: &str) -> String {
    state
        .tokens
        .issue_tokens(&AuthenticatedUser::new(user_id, Role::User))
        .unwrap()
        .access_token
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn client() -> KeyManager<StaticKeyDirectory> {
    KeyManager::new(
        Arc::new(MemoryKeyStore::new()),
        StaticKeyDirectory::new(),
        KeyManagerConfig::default(),
    )
}

#[tokio::test]
async fn offline_recipient_reads_and_decrypts_history() {
    let h = harness();
    let alice_token = access_token(&h.state, "alice");
    let bob_token = access_token(&h.state, "bob");

    let alice = client();
    let bob = client();
    let (_, alice_public) = alice.generate_key_pair("alice", PASSWORD).await.unwrap();
    let (_, bob_public) = bob.generate_key_pair("bob", PASSWORD).await.unwrap();

    for (token, public) in [(&alice_token, alice_public), (&bob_token, bob_public)] {
        let (status, body) = call(
            &h.app,
            "POST",
            "/v1/keys",
            Some(token),
            Some(json!({ "publicKey": public.to_base64() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Public key saved successfully");
    }

    let (status, chat) = call(
        &h.app,
        "POST",
        "/v1/chats",
        Some(&alice_token),
        Some(json!({ "participantId": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let chat_id = chat["id"].as_str().unwrap().to_string();

    // Each side learns the other's key through the directory route.
    let recipient_uri = format!("/v1/keys/recipient/{chat_id}");
    let (status, body) = call(&h.app, "GET", &recipient_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let seen_by_alice = PublicKey::from_base64(body["publicKey"].as_str().unwrap()).unwrap();
    assert_eq!(seen_by_alice, bob_public);
    alice.directory().insert(chat_id.clone(), seen_by_alice);

    let (_, body) = call(&h.app, "GET", &recipient_uri, Some(&bob_token), None).await;
    let seen_by_bob = PublicKey::from_base64(body["publicKey"].as_str().unwrap()).unwrap();
    assert_eq!(seen_by_bob, alice_public);
    bob.directory().insert(chat_id.clone(), seen_by_bob);

    let plaintext = "meet at the usual place, 7pm";
    let alice_key = alice.get_shared_key(&chat_id, "alice").await.unwrap();
    let wire = seal_e2e(&alice_key, plaintext.as_bytes()).unwrap().encode();

    let messages_uri = format!("/v1/chats/{chat_id}/messages");
    let (status, sent) = call(
        &h.app,
        "POST",
        &messages_uri,
        Some(&alice_token),
        Some(json!({ "content": wire })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["recipientId"], "bob");
    assert_eq!(sent["delivered"], false);

    // At rest the server only holds the storage layer.
    let stored = h.state.db.list_messages(&chat_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].content, wire);
    assert!(!stored[0].content.contains(plaintext));

    let (status, history) = call(&h.app, "GET", &messages_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["senderId"], "alice");
    assert_eq!(history[0]["content"], wire.as_str());

    let bob_key = bob.get_shared_key(&chat_id, "bob").await.unwrap();
    let opened = open_e2e_text(&bob_key, history[0]["content"].as_str().unwrap()).unwrap();
    assert_eq!(opened, plaintext);
}

#[tokio::test]
async fn public_key_is_registered_once() {
    let h = harness();
    let token = access_token(&h.state, "carol");
    let key = json!({ "publicKey": sealed_chat::crypto::IdentityKeyPair::generate().public.to_base64() });

    let (status, _) = call(&h.app, "POST", "/v1/keys", Some(&token), Some(key.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&h.app, "POST", "/v1/keys", Some(&token), Some(key)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Public key already exists");
}

#[tokio::test]
async fn outsider_cannot_read_a_chat() {
    let h = harness();
    let alice_token = access_token(&h.state, "alice");
    let eve_token = access_token(&h.state, "eve");

    let (_, chat) = call(
        &h.app,
        "POST",
        "/v1/chats",
        Some(&alice_token),
        Some(json!({ "participantId": "bob" })),
    )
    .await;
    let chat_id = chat["id"].as_str().unwrap();

    let (status, body) = call(
        &h.app,
        "GET",
        &format!("/v1/chats/{chat_id}/messages"),
        Some(&eve_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
}

#[tokio::test]
async fn concurrent_refresh_has_a_single_winner() {
    let h = harness();
    let pair = h
        .state
        .tokens
        .issue_tokens(&AuthenticatedUser::new("dave", Role::User))
        .unwrap();
    let body = json!({ "refreshToken": pair.refresh_token });

    let (first, second) = tokio::join!(
        call(&h.app, "POST", "/v1/auth/refresh", None, Some(body.clone())),
        call(&h.app, "POST", "/v1/auth/refresh", None, Some(body.clone())),
    );
    let statuses = [first.0, second.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::UNAUTHORIZED).count(),
        1
    );

    // The consumed token stays dead.
    let (status, _) = call(&h.app, "POST", "/v1/auth/refresh", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
