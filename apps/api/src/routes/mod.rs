pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::anti_cheat::handlers as anti_cheat;
use crate::interview::handlers as interview;
use crate::resume;
use crate::sessions::handlers as sessions;
use crate::state::AppState;

/// JSON body limit for snapshot uploads (base64 inflates the 2 MiB image cap).
const SNAPSHOT_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs (read-only)
        .route("/api/zuri/jobs/:code", get(sessions::handle_get_job))
        // Sessions
        .route("/api/zuri/sessions", post(sessions::handle_create_session))
        .route("/api/zuri/sessions/:id", get(sessions::handle_get_session))
        .route(
            "/api/zuri/sessions/:id/append-step",
            post(sessions::handle_append_step),
        )
        .route("/api/zuri/sessions/:id/answer", post(sessions::handle_answer))
        .route("/api/zuri/sessions/:id/finish", post(sessions::handle_finish))
        // Interview turns
        .route("/api/zuri/bedrock/turn", post(interview::handle_turn))
        .route("/api/zuri/bedrock/stream", post(interview::handle_stream))
        .route("/api/zuri/chat", post(interview::handle_chat))
        // Anti-cheat
        .route("/api/zuri/anti-cheat/log", post(anti_cheat::handle_log_events))
        .route(
            "/api/zuri/anti-cheat/snapshot",
            post(anti_cheat::handle_snapshot).layer(DefaultBodyLimit::max(SNAPSHOT_BODY_LIMIT)),
        )
        // Resume
        .route(
            "/api/zuri/resume/extract",
            post(resume::handle_extract).layer(DefaultBodyLimit::max(resume::MAX_RESUME_BYTES)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::errors::PLEASE_WAIT_MESSAGE;
    use crate::interview::coordinator::TurnCoordinator;
    use crate::interview::handlers::FOLLOWUPS_HEADER;
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::{LlmError, ProviderAdapter};
    use crate::models::job::{Job, Rubric, RubricCriterion, ScreenerCondition, ScreenerRule};
    use crate::sessions::invite::{sign_invite, InviteClaims};
    use crate::sessions::memory::MemoryInterviewStore;

    struct Harness {
        state: AppState,
        backend: Arc<ScriptedBackend>,
    }

    fn job(code: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            code: code.to_string(),
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Build reliable APIs.".to_string(),
            focus_areas: vec!["APIs".to_string()],
            rubric: Some(Rubric {
                criteria: vec![RubricCriterion {
                    name: "Ownership".to_string(),
                    description: Some("drives work end to end".to_string()),
                    weight: None,
                }],
            }),
            admin_guide: Some("Ask about on-call experience".to_string()),
            screener_rules: vec![ScreenerRule {
                question_id: "authorized".to_string(),
                question: "Are you authorized to work here?".to_string(),
                condition: ScreenerCondition::YesNo { expected: true },
            }],
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn test_s3() -> aws_sdk_s3::Client {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "test", "test", None, None, "test",
            ))
            .endpoint_url("http://127.0.0.1:9")
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }

    async fn harness(script: Vec<Result<String, LlmError>>) -> Harness {
        let store = MemoryInterviewStore::default();
        store.add_job(job("ENG123")).await;
        let mut inactive = job("OLD1");
        inactive.is_active = false;
        store.add_job(inactive).await;

        let backend = Arc::new(ScriptedBackend::new("bedrock", script));
        let mut config = Config::for_tests();
        config.turn_min_gap = Duration::ZERO;
        config.stream_min_gap = Duration::ZERO;
        config.chat_min_gap = Duration::ZERO;

        Harness {
            state: AppState {
                store: Arc::new(store),
                s3: test_s3(),
                llm: ProviderAdapter::new(backend.clone(), None),
                turns: TurnCoordinator::new(),
                config,
            },
            backend,
        }
    }

    async fn send_raw(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = send_raw(state, method, uri, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_session(state: &AppState) -> (String, String) {
        let (status, body) = send(
            state,
            Method::POST,
            "/api/zuri/sessions",
            Some(json!({
                "jobCode": "ENG123",
                "candidate": {"name": "A", "email": "a@x.com"},
                "screenerAnswers": [{"questionId": "authorized", "answer": "yes"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    fn reply(text: &str) -> Result<String, LlmError> {
        Ok(json!({"text": text, "followups": ["Can you quantify that?"]}).to_string())
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let h = harness(vec![]).await;
        let (id, token) = create_session(&h.state).await;
        assert!(!token.is_empty());

        let (status, body) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/append-step?t={token}"),
            Some(json!({"question": "Tell me about yourself"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["steps"].as_array().unwrap().len(), 1);
        assert!(body.get("token").is_none());

        let (status, body) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/answer?t={token}"),
            Some(json!({"stepIndex": 0, "transcript": "I build APIs", "durationSec": 42.5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"][0]["transcript"], "I build APIs");

        let (status, body) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/finish?t={token}"),
            Some(json!({"scorecard": {"overall": 4}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "finished");
        assert!(body["finishedAt"].is_string());
        assert_eq!(body["scorecard"]["overall"], 4);

        let (status, body) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/append-step?t={token}"),
            Some(json!({"question": "One more?"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/finish?t={token}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &h.state,
            Method::GET,
            &format!("/api/zuri/sessions/{id}?t={token}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"].as_array().unwrap().len(), 1);
        assert_eq!(body["screener"]["passed"], true);
    }

    #[tokio::test]
    async fn test_session_token_auth() {
        let h = harness(vec![]).await;
        let (id, _token) = create_session(&h.state).await;

        let (status, _) = send(&h.state, Method::GET, &format!("/api/zuri/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &h.state,
            Method::GET,
            &format!("/api/zuri/sessions/{id}?t=wrong"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &h.state,
            Method::GET,
            &format!("/api/zuri/sessions/{}?t=whatever", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_session_validation() {
        let h = harness(vec![]).await;
        let create = |code: &str, email: &str| {
            json!({"jobCode": code, "candidate": {"name": "A", "email": email}})
        };

        let (status, _) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("NOPE", "a@x.com"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("OLD1", "a@x.com"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("ENG123", "not-an-email"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // Job codes match case-insensitively; failed screeners are recorded, not rejected.
        let (status, body) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("eng123", "a@x.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "running");
        assert_eq!(body["screener"]["passed"], false);
    }

    #[tokio::test]
    async fn test_invite_checks() {
        let h = harness(vec![]).await;
        let secret = h.state.config.invite_secret.clone().unwrap();
        let invite = sign_invite(
            &secret,
            &InviteClaims {
                job_code: "ENG123".to_string(),
                email: "a@x.com".to_string(),
                exp: Utc::now().timestamp() + 3600,
            },
        );
        let create = |email: &str, invite: &str| {
            json!({"jobCode": "ENG123", "candidate": {"name": "A", "email": email}, "invite": invite})
        };

        let (status, _) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("A@X.com", &invite))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("b@x.com", &invite))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&h.state, Method::POST, "/api/zuri/sessions", Some(create("a@x.com", "forged.00"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_answer_for_missing_step_is_not_found() {
        let h = harness(vec![]).await;
        let (id, token) = create_session(&h.state).await;
        let (status, _) = send(
            &h.state,
            Method::POST,
            &format!("/api/zuri/sessions/{id}/answer?t={token}"),
            Some(json!({"stepIndex": 3, "transcript": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_turn_returns_next_question() {
        let h = harness(vec![reply("What was the hardest bug you fixed?")]).await;
        let (id, token) = create_session(&h.state).await;

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/turn",
            Some(json!({
                "sessionId": id,
                "token": token,
                "resumeSummary": "8 years of Rust",
                "history": [
                    {"role": "assistant", "text": "Q"},
                    {"role": "user", "text": "A"}
                ],
                "answer": "Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["ok"], true);
        assert_eq!(body["next"]["text"], "What was the hardest bug you fixed?");
        assert_eq!(body["next"]["followups"][0], "Can you quantify that?");

        let prompts = h.backend.calls.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("Role: Backend Engineer at Acme"));
        assert!(prompt.contains("Rubric hints:\n- Ownership: drives work end to end"));
        assert!(prompt.contains("Resume Summary:\n8 years of Rust"));
        assert!(prompt.contains("Customization (admin guide):\nAsk about on-call experience"));
        assert!(prompt.contains("Interviewer: Q\nCandidate: A\nCandidate: Z"));
    }

    #[tokio::test]
    async fn test_turn_rejects_bad_token_without_calling_provider() {
        let h = harness(vec![reply("unused")]).await;
        let (id, _token) = create_session(&h.state).await;

        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/turn",
            Some(json!({"sessionId": id, "token": "nope", "history": [], "answer": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_turn_on_finished_session_conflicts() {
        let h = harness(vec![reply("unused")]).await;
        let (id, token) = create_session(&h.state).await;
        send(&h.state, Method::POST, &format!("/api/zuri/sessions/{id}/finish?t={token}"), None).await;

        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/turn",
            Some(json!({"sessionId": id, "token": token, "answer": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_turn_throttle_is_user_facing() {
        let h = harness(vec![Err(LlmError::Bedrock(
            "ThrottlingException: Too many requests".to_string(),
        ))])
        .await;
        let (id, token) = create_session(&h.state).await;

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/turn",
            Some(json!({"sessionId": id, "token": token, "answer": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["message"], PLEASE_WAIT_MESSAGE);
    }

    #[tokio::test]
    async fn test_turn_plain_text_reply_is_accepted() {
        let h = harness(vec![Ok("Tell me about your last project.".to_string())]).await;
        let (id, token) = create_session(&h.state).await;

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/turn",
            Some(json!({"sessionId": id, "token": token, "answer": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["next"]["text"], "Tell me about your last project.");
        assert_eq!(body["next"]["followups"], json!([]));
    }

    #[tokio::test]
    async fn test_stream_route_streams_text() {
        let h = harness(vec![reply("Walk me through your design.")]).await;
        let (id, token) = create_session(&h.state).await;

        let response = send_raw(
            &h.state,
            Method::POST,
            "/api/zuri/bedrock/stream",
            Some(json!({"sessionId": id, "token": token, "answer": "hi"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[FOLLOWUPS_HEADER],
            r#"["Can you quantify that?"]"#
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Walk me through your design.");
    }

    #[tokio::test]
    async fn test_chat_route_emits_sse() {
        let h = harness(vec![reply("Hello there")]).await;
        let (id, token) = create_session(&h.state).await;

        let response = send_raw(
            &h.state,
            Method::POST,
            "/api/zuri/chat",
            Some(json!({"sessionId": id, "token": token, "answer": "hi"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        let events: Vec<Value> = body
            .lines()
            .filter_map(|l| l.strip_prefix("data:"))
            .map(|d| serde_json::from_str(d.trim_start()).unwrap())
            .collect();
        assert_eq!(events.first().unwrap()["event"], "start");
        let done = events.last().unwrap();
        assert_eq!(done["event"], "done");
        assert_eq!(done["next"]["text"], "Hello there");
        let deltas: String = events
            .iter()
            .filter(|e| e["event"] == "delta")
            .map(|e| e["delta"].as_str().unwrap())
            .collect();
        assert_eq!(deltas, "Hello there");
    }

    #[tokio::test]
    async fn test_anti_cheat_log() {
        let h = harness(vec![]).await;
        let (id, token) = create_session(&h.state).await;
        let events: Vec<Value> = (0..60).map(|_| json!({"kind": "tab_switch"})).collect();

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/zuri/anti-cheat/log",
            Some(json!({"sessionId": id, "token": token, "events": events})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], 50);
        assert_eq!(body["total"], 50);

        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/zuri/anti-cheat/log",
            Some(json!({"sessionId": id, "token": token, "events": [{"kind": "blur"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 51);

        send(&h.state, Method::POST, &format!("/api/zuri/sessions/{id}/finish?t={token}"), None).await;
        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/zuri/anti-cheat/log",
            Some(json!({"sessionId": id, "token": token, "events": [{"kind": "blur"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_public_job_hides_rubric() {
        let h = harness(vec![]).await;
        let (status, body) = send(&h.state, Method::GET, "/api/zuri/jobs/eng123", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "ENG123");
        assert_eq!(body["screener"][0]["kind"], "yes_no");
        assert!(body.get("rubric").is_none());
        assert!(body.get("adminGuide").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(vec![]).await;
        let (status, body) = send(&h.state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
