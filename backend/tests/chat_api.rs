mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use chatrelay_backend::client::apply_data_part;
use chatrelay_backend::models::{Chat, UiMessage, Visibility};
use chatrelay_backend::store::ChatStore;
use chatrelay_backend::ui_stream::{parse_sse_line, SseEvent};
use common::*;

async fn seed_chat(app: &TestApp, owner: Uuid) -> Uuid {
    let chat = Chat {
        id: Uuid::new_v4(),
        user_id: owner,
        title: "seeded".into(),
        visibility: Visibility::Private,
        created_at: Utc::now(),
    };
    app.store.save_chat(&chat).await.unwrap();
    chat.id
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/chat: buffered replies
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn buffered_reply_streams_one_transient_append_and_persists() {
    let app = TestApp::new(MockReply::Json(reply("Hello from n8n"))).await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();

    let response = app.send(post_chat(user, chat_id, "Hi there")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["x-vercel-ai-ui-message-stream"], "v1");

    let text = body_text(response).await;
    let payloads = sse_payloads(&text);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["type"], "data-appendMessage");
    assert_eq!(payloads[0]["transient"], true);
    assert_eq!(payloads[1], "[DONE]");

    let appended = appended_messages(&text);
    assert_eq!(appended[0]["role"], "assistant");
    assert_eq!(appended[0]["parts"], json!([{ "type": "text", "text": "Hello from n8n" }]));

    let chat = app.store.get_chat(chat_id).await.unwrap().unwrap();
    assert_eq!(chat.user_id, user);
    assert_eq!(chat.title, "Hi there");
    assert_eq!(app.assistant_messages(chat_id).await, vec!["Hello from n8n"]);
    assert_eq!(app.store.stream_ids_by_chat(chat_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn all_reply_shapes_yield_same_text() {
    let shapes = [
        json!([{ "success": true, "response": "x" }]),
        json!({ "json": { "success": true, "response": "x" } }),
        json!({ "success": true, "response": "x" }),
    ];
    for shape in shapes {
        let app = TestApp::new(MockReply::Json(shape)).await;
        let user = app.user().await;
        let chat_id = Uuid::new_v4();
        let response = app.send(post_chat(user, chat_id, "q")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let appended = appended_messages(&body_text(response).await);
        assert_eq!(appended[0]["parts"][0]["text"], "x");
        assert_eq!(app.assistant_messages(chat_id).await, vec!["x"]);
    }
}

#[tokio::test]
async fn webhook_request_carries_ids_and_business_function() {
    let app = TestApp::new(MockReply::Json(reply("ok"))).await;
    let user = app.user().await;

    let default_chat = Uuid::new_v4();
    app.send(post_chat(user, default_chat, "first")).await;

    let sales_chat = Uuid::new_v4();
    let body = chat_body(sales_chat, "second", Some("Customer Service"));
    app.send(json_request("POST", "/api/chat", Some(user), &body)).await;

    let calls = app.n8n.calls();
    assert_eq!(calls.len(), 2);

    assert_eq!(calls[0].webhook_id, "test-hook");
    assert_eq!(calls[0].business_function, "AI Accelerate");
    assert_eq!(
        calls[0].body,
        json!({
            "message": "first",
            "sessionId": default_chat,
            "userId": user,
            "functions": null
        })
    );

    assert_eq!(calls[1].business_function, "Customer Service");
    assert_eq!(calls[1].body["functions"], json!(["Customer Service"]));
}

#[tokio::test]
async fn mismatched_ids_in_reply_do_not_abort() {
    let app = TestApp::new(MockReply::Json(json!({
        "success": true,
        "response": "fine",
        "sessionId": "someone-else",
        "userId": "also-wrong"
    })))
    .await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();
    let response = app.send(post_chat(user, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;
    assert_eq!(app.assistant_messages(chat_id).await, vec!["fine"]);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/chat: offline cases
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unsuccessful_reply_is_offline() {
    for payload in [json!({ "success": false }), json!({ "success": true })] {
        let app = TestApp::new(MockReply::Json(payload)).await;
        let user = app.user().await;
        let chat_id = Uuid::new_v4();
        let response = app.send(post_chat(user, chat_id, "q")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["code"], "offline:chat");
        assert!(app.assistant_messages(chat_id).await.is_empty());
    }
}

#[tokio::test]
async fn upstream_error_status_is_offline() {
    let app = TestApp::new(MockReply::Status(500)).await;
    let user = app.user().await;
    let response = app.send(post_chat(user, Uuid::new_v4(), "q")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "offline:chat");
}

#[tokio::test]
async fn webhook_timeout_is_offline_and_persists_no_reply() {
    let app = TestApp::with_config(
        MockReply::Slow(Duration::from_secs(3), reply("too late")),
        |c| c.webhook_timeout = Duration::from_millis(200),
    )
    .await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();

    let response = app.send(post_chat(user, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "offline:chat");

    assert!(app.assistant_messages(chat_id).await.is_empty());
    // The user turn was stored before the call.
    assert_eq!(app.store.messages_by_chat(chat_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_workflow_is_offline() {
    let app = TestApp::with_config(MockReply::Json(reply("x")), |c| {
        c.n8n_base_url = "http://127.0.0.1:9".to_string();
    })
    .await;
    let user = app.user().await;
    let response = app.send(post_chat(user, Uuid::new_v4(), "q")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/chat: validation & identity
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn malformed_body_is_bad_request_without_side_effects() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let user = app.user().await;

    let bad_bodies = [
        json!({ "id": "not-a-uuid" }),
        json!({
            "id": Uuid::new_v4(),
            "message": { "id": Uuid::new_v4(), "role": "user", "parts": [] },
            "selectedVisibilityType": "private"
        }),
        json!({
            "id": Uuid::new_v4(),
            "message": { "id": Uuid::new_v4(), "role": "user", "parts": [{ "type": "text", "text": "x".repeat(2001) }] },
            "selectedVisibilityType": "private"
        }),
    ];
    for body in bad_bodies {
        let response = app.send(json_request("POST", "/api/chat", Some(user), &body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "bad_request:api");
    }
    assert!(app.n8n.calls().is_empty());
}

#[tokio::test]
async fn missing_session_is_unauthorized() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let body = chat_body(Uuid::new_v4(), "q", None);
    let response = app.send(json_request("POST", "/api/chat", None, &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthorized:chat");
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn foreign_live_owner_is_forbidden_and_keeps_chat() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let owner = app.user().await;
    let intruder = app.user().await;
    let chat_id = seed_chat(&app, owner).await;

    let response = app.send(post_chat(intruder, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "forbidden:chat");

    assert_eq!(app.store.get_chat(chat_id).await.unwrap().unwrap().user_id, owner);
    assert!(app.store.messages_by_chat(chat_id).await.unwrap().is_empty());
    assert!(app.n8n.calls().is_empty());
}

#[tokio::test]
async fn orphaned_chat_is_adopted() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let gone = app.user().await;
    let me = app.user().await;
    let chat_id = seed_chat(&app, gone).await;
    assert!(app.store.remove_user(gone).await);

    let response = app.send(post_chat(me, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;
    assert_eq!(app.store.get_chat(chat_id).await.unwrap().unwrap().user_id, me);
}

#[tokio::test]
async fn stale_session_provisions_one_guest_and_reuses_it() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let ghost = Uuid::new_v4();
    let chat_id = Uuid::new_v4();

    let response = app.send(post_chat(ghost, chat_id, "first")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;
    assert_eq!(app.store.user_count().await, 1);

    let chat = app.store.get_chat(chat_id).await.unwrap().unwrap();
    assert_ne!(chat.user_id, ghost);
    let guest = app.store.get_user(chat.user_id).await.unwrap().unwrap();
    assert!(guest.is_guest());
    assert_eq!(app.n8n.calls()[0].body["userId"], json!(guest.id));

    // Same stale session again: the chat's guest owner is reused.
    let response = app.send(post_chat(ghost, chat_id, "second")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;
    assert_eq!(app.store.user_count().await, 1);
    assert_eq!(app.store.get_chat(chat_id).await.unwrap().unwrap().user_id, guest.id);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/chat: streaming replies
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn ndjson_reply_streams_updates_and_persists_final_text() {
    let lines = vec![
        r#"{"type":"begin"}"#.to_string(),
        r#"{"type":"item","content":"{\"resp"}"#.to_string(),
        r#"{"type":"item","content":"onse\":\"hi\"}"}"#.to_string(),
        r#"{"type":"end"}"#.to_string(),
    ];
    let app = TestApp::new(MockReply::Ndjson {
        lines,
        delay: Duration::from_millis(5),
    })
    .await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();

    let response = app.send(post_chat(user, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;

    // One live update, then the final text once more.
    let appended = appended_messages(&text);
    assert_eq!(appended.len(), 2);
    assert!(appended.iter().all(|m| m["parts"][0]["text"] == "hi"));
    assert_eq!(appended[0]["id"], appended[1]["id"]);
    assert_eq!(sse_payloads(&text).last().unwrap(), "[DONE]");

    assert_eq!(app.assistant_messages(chat_id).await, vec!["hi"]);

    // The client merge keeps a single bubble.
    let mut messages: Vec<UiMessage> = Vec::new();
    for line in text.lines() {
        if let Some(SseEvent::Chunk(chunk)) = parse_sse_line(line) {
            apply_data_part(&mut messages, &chunk).unwrap();
        }
    }
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, chatrelay_backend::models::Role::Assistant);
}

#[tokio::test]
async fn ndjson_reply_without_text_ends_with_error_chunk() {
    let app = TestApp::new(MockReply::Ndjson {
        lines: vec![r#"{"type":"begin"}"#.into(), r#"{"type":"end"}"#.into()],
        delay: Duration::from_millis(1),
    })
    .await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();

    let response = app.send(post_chat(user, chat_id, "q")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads[0]["type"], "error");
    assert_eq!(payloads.last().unwrap(), "[DONE]");
    assert!(app.assistant_messages(chat_id).await.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
//  DELETE /api/chat
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn delete_nonexistent_chat_is_not_found() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let user = app.user().await;
    let uri = format!("/api/chat?id={}", Uuid::new_v4());
    let response = app.send(request("DELETE", &uri, Some(user))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "not_found:chat");
}

#[tokio::test]
async fn delete_without_id_is_bad_request() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let user = app.user().await;
    let response = app.send(request("DELETE", "/api/chat", Some(user))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "bad_request:api");
}

#[tokio::test]
async fn delete_owned_chat_returns_it_and_cascades() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();
    body_bytes(app.send(post_chat(user, chat_id, "q")).await).await;

    let uri = format!("/api/chat?id={chat_id}");
    let response = app.send(request("DELETE", &uri, Some(user))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = body_json(response).await;
    assert_eq!(deleted["id"], json!(chat_id));
    assert_eq!(deleted["userId"], json!(user));

    assert!(app.store.get_chat(chat_id).await.unwrap().is_none());
    assert!(app.store.messages_by_chat(chat_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_foreign_chat_is_forbidden() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let owner = app.user().await;
    let other = app.user().await;
    let chat_id = seed_chat(&app, owner).await;

    let uri = format!("/api/chat?id={chat_id}");
    let response = app.send(request("DELETE", &uri, Some(other))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.store.get_chat(chat_id).await.unwrap().is_some());
}

// ═══════════════════════════════════════════════════════════════════════════
//  Messages, visibility, trailing delete
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn messages_listed_oldest_first() {
    let app = TestApp::new(MockReply::Json(reply("answer"))).await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();
    body_bytes(app.send(post_chat(user, chat_id, "question")).await).await;

    let uri = format!("/api/chat/{chat_id}/messages");
    let response = app.send(request("GET", &uri, Some(user))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let messages = body_json(response).await;
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["parts"][0]["text"], "answer");
}

#[tokio::test]
async fn public_chat_messages_readable_by_others_private_not() {
    let app = TestApp::new(MockReply::Json(reply("x"))).await;
    let owner = app.user().await;
    let other = app.user().await;
    let chat_id = seed_chat(&app, owner).await;
    let uri = format!("/api/chat/{chat_id}/messages");

    let response = app.send(request("GET", &uri, Some(other))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(json_request(
            "PATCH",
            &format!("/api/chat/{chat_id}/visibility"),
            Some(owner),
            &json!({ "visibility": "public" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["visibility"], "public");

    let response = app.send(request("GET", &uri, Some(other))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn trailing_delete_removes_message_and_everything_after() {
    let app = TestApp::new(MockReply::Json(reply("a"))).await;
    let user = app.user().await;
    let chat_id = Uuid::new_v4();
    body_bytes(app.send(post_chat(user, chat_id, "one")).await).await;
    body_bytes(app.send(post_chat(user, chat_id, "two")).await).await;

    let messages = app.store.messages_by_chat(chat_id).await.unwrap();
    assert_eq!(messages.len(), 4);
    let second_user_turn = messages[2].id;

    let uri = format!("/api/messages/{second_user_turn}/trailing");
    let response = app.send(request("DELETE", &uri, Some(user))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 2);
    assert_eq!(app.store.messages_by_chat(chat_id).await.unwrap().len(), 2);
}
