use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};

use outreach_agent::{
    BridgeError, Correlator, Delivery, FileCredentialSource, FileStateStore, InboundEvent,
    InboundMessage, SessionManager, SessionSeed,
};
use outreach_tool_runtime::provider::mock::ScriptedModel;
use outreach_tool_runtime::testing::EchoTool;
use outreach_tool_runtime::tools::{AskHumanTool, FetchCredentialsTool};
use outreach_tool_runtime::{
    AgentLoop, SentReceipt, SessionStatus, StateStore, ToolCategory, ToolDescriptor, ToolOutput,
    ToolRegistry, TurnContent,
};

const ASK_BUDGET: &str = r#"{"thought":"need budget","function_calls":{"name":"display_to_user_and_wait_for_input","inputs":{"message":"What's your budget?"}}}"#;
const SEND: &str = r#"{"thought":"sending","function_calls":{"name":"send_email_with_token","inputs":{"to":"host@podcast.fm"}}}"#;
const FETCH_CREDS: &str = r#"{"thought":"need creds","function_calls":{"name":"fetch_credentials","inputs":{}}}"#;

struct Fixture {
    _tmp: tempfile::TempDir,
    model: Arc<ScriptedModel>,
    store: Arc<FileStateStore>,
    manager: Arc<SessionManager>,
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AskHumanTool).unwrap();
    registry.register(FetchCredentialsTool).unwrap();
    registry
        .register(
            EchoTool::new(ToolDescriptor::new(
                "send_email_with_token",
                "Send an email",
                ToolCategory::Effectful,
            ))
            .returning(ToolOutput::Sent(SentReceipt {
                thread_id: "thread-42".into(),
                detail: json!({"status": "sent", "thread_id": "thread-42"}),
            })),
        )
        .unwrap();
    registry
}

fn fixture(responses: &[&str]) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStateStore::new(&tmp.path().join("agent-state")).unwrap());
    let model = Arc::new(ScriptedModel::with_responses(responses.iter().copied()));
    let creds_dir = tmp.path().join("creds");
    std::fs::create_dir_all(&creds_dir).unwrap();

    let agent = AgentLoop::new(model.clone(), Arc::new(registry()), store.clone())
        .with_credentials(Arc::new(FileCredentialSource::new(&creds_dir)))
        .with_call_timeout(Duration::from_secs(5));
    let manager = Arc::new(SessionManager::new(Arc::new(agent)));
    Fixture {
        _tmp: tmp,
        model,
        store,
        manager,
    }
}

#[tokio::test]
async fn test_suspend_resume_send_and_correlate() {
    let f = fixture(&[ASK_BUDGET, SEND]);
    let mut prefs = Map::new();
    prefs.insert("max_candidates".into(), json!(3));
    let id = f
        .manager
        .start_session(SessionSeed::default().with_id("s-1").with_preferences(prefs))
        .await
        .unwrap();
    assert_eq!(id, "s-1");

    let first = f.manager.send_message(&id, "Book three AI podcast hosts").await.unwrap();
    assert_eq!(first.delivery, Delivery::NewInput);
    assert!(first.outcome.awaiting_input());
    assert_eq!(
        first.outcome.pending_action.as_ref().map(|p| p.tool.as_str()),
        Some("display_to_user_and_wait_for_input")
    );

    let second = f.manager.send_message(&id, "$500").await.unwrap();
    assert_eq!(second.delivery, Delivery::Resumed);
    assert!(second.outcome.terminal());
    assert_eq!(second.outcome.dispatches, 1);
    assert_eq!(
        f.store.session_for_thread("thread-42").unwrap(),
        Some("s-1".to_string())
    );

    let state = f.manager.get_state(&id).await.unwrap();
    assert_eq!(state.raw_goal(), Some("Book three AI podcast hosts"));
    assert_eq!(state.user_preferences()["max_candidates"], 3);
    let turns_before = state.conversation_history().len();

    let correlator = Correlator::new(f.manager.clone());
    let event = InboundEvent {
        history_pointer: Some("4821".into()),
        messages: vec![
            InboundMessage {
                id: "m-1".into(),
                thread_id: "thread-42".into(),
                from: Some("host@podcast.fm".into()),
                subject: Some("Re: Collaboration Opportunity".into()),
                body: "Happy to chat next week.".into(),
            },
            InboundMessage {
                id: "m-2".into(),
                thread_id: "thread-unknown".into(),
                from: None,
                subject: None,
                body: "spam".into(),
            },
        ],
    };

    let report = correlator.handle(event.clone()).await.unwrap();
    assert_eq!(report.history_pointer.as_deref(), Some("4821"));
    assert_eq!(report.injected.len(), 1);
    assert_eq!(report.injected[0].session_id, "s-1");
    assert_eq!(report.unmatched, vec!["m-2".to_string()]);
    assert!(report.duplicates.is_empty());

    let state = f.manager.get_state(&id).await.unwrap();
    let history = state.conversation_history();
    assert_eq!(history.len(), turns_before + 2);
    assert_eq!(
        history[turns_before].content,
        TurnContent::Text(
            "Reply received on thread thread-42 from host@podcast.fm: Re: Collaboration Opportunity / Happy to chat next week."
                .into()
        )
    );

    let calls_before_replay = f.model.call_count();
    let replay = correlator.handle(event).await.unwrap();
    assert!(replay.injected.is_empty());
    assert_eq!(replay.duplicates, vec!["m-1".to_string()]);
    assert_eq!(f.model.call_count(), calls_before_replay);
    assert_eq!(
        f.manager.get_state(&id).await.unwrap().conversation_history().len(),
        turns_before + 2
    );
}

#[tokio::test]
async fn test_end_session_keeps_storage() {
    let f = fixture(&[]);
    let id = f.manager.start_session(SessionSeed::default()).await.unwrap();
    assert!(f.manager.is_active(&id).await);
    f.manager.send_message(&id, "hello").await.unwrap();

    let summary = f.manager.end_session(&id).await.unwrap();
    assert_eq!(summary.status, SessionStatus::Terminated);
    assert!(!f.manager.is_active(&id).await);

    let err = f.manager.send_message(&id, "again").await.unwrap_err();
    assert!(matches!(err, BridgeError::UnknownSession(ref s) if s == &id));
    assert_eq!(
        f.manager.get_state(&id).await.unwrap().status(),
        &SessionStatus::Terminated
    );

    let resumed = f.manager.resume_session(&id).await.unwrap();
    assert_eq!(resumed.session_id, id);
    assert!(f.manager.is_active(&id).await);
}

#[tokio::test]
async fn test_unknown_sessions_are_rejected() {
    let f = fixture(&[]);
    assert!(matches!(
        f.manager.send_message("ghost", "hi").await,
        Err(BridgeError::UnknownSession(_))
    ));
    assert!(matches!(
        f.manager.resume_session("ghost").await,
        Err(BridgeError::UnknownSession(_))
    ));
    assert!(matches!(
        f.manager.get_state("ghost").await,
        Err(BridgeError::UnknownSession(_))
    ));
    assert!(matches!(
        f.manager.end_session("ghost").await,
        Err(BridgeError::UnknownSession(_))
    ));
    assert_eq!(f.model.call_count(), 0);
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let f = fixture(&[]);
    f.manager
        .start_session(SessionSeed::default().with_id("dup"))
        .await
        .unwrap();
    assert!(matches!(
        f.manager.start_session(SessionSeed::default().with_id("dup")).await,
        Err(BridgeError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_list_sessions_and_summary() {
    let f = fixture(&[]);
    let a = f
        .manager
        .start_session(SessionSeed::default().with_budget(250.0))
        .await
        .unwrap();
    let b = f.manager.start_session(SessionSeed::default()).await.unwrap();
    f.manager.send_message(&b, "most recent").await.unwrap();

    let sessions = f.manager.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, b);

    let summary = f.manager.summary(&a).await.unwrap();
    assert_eq!(summary.budget_remaining, Some(250.0));
    assert_eq!(summary.turns, 0);
}

#[tokio::test]
async fn test_credentials_reach_tools() {
    let f = fixture(&[FETCH_CREDS]);
    let id = f
        .manager
        .start_session(SessionSeed::default().with_id("s-creds"))
        .await
        .unwrap();
    std::fs::write(
        f._tmp.path().join("creds").join("creds_s-creds.json"),
        json!({"credentials": {"token": "abc"}}).to_string(),
    )
    .unwrap();

    f.manager.send_message(&id, "send the emails").await.unwrap();
    let state = f.manager.get_state(&id).await.unwrap();
    let feedback = state
        .conversation_history()
        .iter()
        .find_map(|turn| match &turn.content {
            TurnContent::ToolFeedback(fb) => Some(fb.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(feedback.tool, "fetch_credentials");
    assert_eq!(feedback.result, json!({"token": "abc"}));
}

#[tokio::test]
async fn test_state_survives_manager_restart() {
    let f = fixture(&[ASK_BUDGET]);
    let id = f.manager.start_session(SessionSeed::default()).await.unwrap();
    f.manager.send_message(&id, "plan outreach").await.unwrap();

    let reopened = Arc::new(FileStateStore::new(f.store.dir()).unwrap());
    let agent = AgentLoop::new(
        Arc::new(ScriptedModel::new()),
        Arc::new(registry()),
        reopened,
    );
    let manager = SessionManager::new(Arc::new(agent));
    let summary = manager.resume_session(&id).await.unwrap();
    assert!(summary.status.is_awaiting());

    let sent = manager.send_message(&id, "$1000").await.unwrap();
    assert_eq!(sent.delivery, Delivery::Resumed);
    assert!(sent.outcome.terminal());
}

#[tokio::test]
async fn test_session_named_like_thread_index_does_not_break_sends() {
    let f = fixture(&[SEND]);
    f.manager
        .start_session(SessionSeed::default().with_id("outbound-index"))
        .await
        .unwrap();
    let id = f
        .manager
        .start_session(SessionSeed::default().with_id("sender"))
        .await
        .unwrap();

    let sent = f.manager.send_message(&id, "send it").await.unwrap();
    assert!(sent.outcome.terminal());
    assert_eq!(
        f.store.session_for_thread("thread-42").unwrap(),
        Some("sender".to_string())
    );
    assert_eq!(
        f.store.list().unwrap(),
        vec!["outbound-index".to_string(), "sender".to_string()]
    );
    assert!(f.manager.get_state("outbound-index").await.is_ok());
}
