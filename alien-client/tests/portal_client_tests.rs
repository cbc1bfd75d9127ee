//! End-to-end client behaviour against a mock portal server.

use std::sync::Arc;
use std::time::Duration;

use alien_client::confirm::spawn_auto_responder;
use alien_client::{
    ChatRole, ChatTarget, ChatTurn, ConfirmBroker, PortalClient, RestClient, ThemePreference,
};
use alien_client::types::Visibility;
use alien_core::{AccessPolicy, FilterState, NotificationLevel, SortSpec};
use alien_storage::{
    KeyValueStore, MemoryStore, RefreshOutcome, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use alien_test_utils::sample_projects;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn client_for(server: &ServerGuard, store: Arc<MemoryStore>) -> PortalClient {
    let rest = RestClient::with_base_url(&server.url(), Duration::from_secs(5)).unwrap();
    PortalClient::with_parts(rest, store, AccessPolicy::default())
}

fn login_body(email: &str, role: &str) -> String {
    json!({
        "success": true,
        "session": { "access_token": "tok-1", "refresh_token": "ref-1" },
        "user": { "profile": { "id": "u1", "email": email, "role": role } }
    })
    .to_string()
}

async fn mock_login(server: &mut ServerGuard, email: &str, role: &str) -> mockito::Mock {
    server
        .mock("POST", "/auth/login")
        .match_body(Matcher::PartialJson(json!({ "email": email })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(login_body(email, role))
        .create_async()
        .await
}

async fn mock_projects(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
    server
        .mock("GET", "/projects")
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_string(&sample_projects()).unwrap())
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn login_persists_tokens_and_authorizes_requests() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, "ops@flyrank.com", "internal").await;
    let projects = mock_projects(&mut server, 1).await;
    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server, store.clone());

    let user = client.session().login("ops@flyrank.com", "secret").await.unwrap();
    assert_eq!(user.email, "ops@flyrank.com");
    assert_eq!(store.read(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
    assert_eq!(store.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("ref-1"));

    let refreshed = client.projects().refresh(false).await.unwrap();
    assert_eq!(refreshed.outcome, RefreshOutcome::Fetched);
    assert_eq!(refreshed.envelope.len(), 4);

    // Inside the staleness window nothing is refetched.
    let again = client.projects().refresh(false).await.unwrap();
    assert_eq!(again.outcome, RefreshOutcome::Reused);

    login.assert_async().await;
    projects.assert_async().await;
}

#[tokio::test]
async fn rejected_login_surfaces_server_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Invalid credentials" }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));

    let err = client.session().login("who@flyrank.com", "nope").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(!client.session().is_logged_in());
}

#[tokio::test]
async fn unauthorized_read_ends_the_session() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    server
        .mock("GET", "/projects")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Token expired" }).to_string())
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server, store.clone());
    client.session().login("ops@flyrank.com", "secret").await.unwrap();

    let refreshed = client.projects().refresh(true).await.unwrap();
    assert!(matches!(refreshed.outcome, RefreshOutcome::Failed { .. }));
    assert!(!client.session().is_logged_in());
    assert!(!client.rest().has_bearer());
    assert!(store.read(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(store.read(REFRESH_TOKEN_KEY).unwrap().is_none());
}

#[tokio::test]
async fn restore_drops_a_token_the_server_rejects() {
    let mut server = Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Session expired" }).to_string())
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    store.write(ACCESS_TOKEN_KEY, "stale").unwrap();
    store.write(REFRESH_TOKEN_KEY, "stale-refresh").unwrap();
    let client = client_for(&server, store.clone());

    assert!(client.session().restore().await.unwrap().is_none());
    assert!(store.read(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(store.read(REFRESH_TOKEN_KEY).unwrap().is_none());
    me.assert_async().await;
}

#[tokio::test]
async fn restore_resumes_a_valid_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/auth/me")
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "user": { "id": "u9", "email": "rep@shopline.com", "role": "shopline" } })
                .to_string(),
        )
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    store.write(ACCESS_TOKEN_KEY, "tok-1").unwrap();
    let client = client_for(&server, store);

    let user = client.session().restore().await.unwrap().unwrap();
    assert_eq!(user.email, "rep@shopline.com");
    assert!(client.session().is_logged_in());
}

#[tokio::test]
async fn partner_view_hides_internal_only_projects() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "rep@shopline.com", "shopline").await;
    mock_projects(&mut server, 1).await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("rep@shopline.com", "secret").await.unwrap();
    client.projects().refresh(false).await.unwrap();

    let rows = client
        .projects()
        .view(&FilterState::default().with_sort(SortSpec::by_name()))
        .await;
    let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["p2", "p3", "p4"]);
    assert!(client.projects().find("p1").await.is_none());
}

#[tokio::test]
async fn update_posts_changes_and_patches_the_cache() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    mock_projects(&mut server, 1).await;
    let update = server
        .mock("POST", "/projects/p3/update-report")
        .match_header("authorization", "Bearer tok-1")
        .match_body(Matcher::Json(json!({
            "user_email": "ops@flyrank.com",
            "updates": { "category": "Ready" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": true }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();
    client.projects().refresh(false).await.unwrap();

    client.projects().update_field("p3", "category", "Ready").await.unwrap();

    let p3 = client.projects().find("p3").await.unwrap();
    assert_eq!(p3.get("category"), Some(&json!("Ready")));
    let toasts = client.notifications().drain();
    assert!(toasts.iter().any(|t| t.level == NotificationLevel::Success));
    update.assert_async().await;
}

#[tokio::test]
async fn failed_update_notifies_and_leaves_cache_alone() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    mock_projects(&mut server, 1).await;
    server
        .mock("POST", "/projects/p3/update-report")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Sheet is locked" }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();
    client.projects().refresh(false).await.unwrap();

    let err = client
        .projects()
        .update_field("p3", "category", "Ready")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Sheet is locked");
    assert!(client.session().is_logged_in());

    let p3 = client.projects().find("p3").await.unwrap();
    assert_eq!(p3.get("category"), Some(&json!("New / In Progress")));
    let toasts = client.notifications().drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, NotificationLevel::Error);
    assert_eq!(toasts[0].message, "Sheet is locked");
}

#[tokio::test]
async fn merchant_update_is_refused_before_any_request() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "owner@store.example", "merchant").await;
    let update = server
        .mock("POST", Matcher::Regex(r"^/projects/.*/update-report$".to_string()))
        .expect(0)
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("owner@store.example", "secret").await.unwrap();

    let err = client
        .projects()
        .update_field("p1", "category", "Ready")
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    assert!(client.session().is_logged_in());
    update.assert_async().await;
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "root@flyrank.com", "superadmin").await;
    let delete = server.mock("DELETE", "/projects/p1").expect(0).create_async().await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("root@flyrank.com", "secret").await.unwrap();

    let (broker, requests) = ConfirmBroker::channel(1);
    spawn_auto_responder(requests, false);
    assert!(!client.projects().delete_project("p1", &broker).await.unwrap());
    delete.assert_async().await;
}

#[tokio::test]
async fn confirmed_delete_refetches_the_list() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "root@flyrank.com", "superadmin").await;
    let projects = mock_projects(&mut server, 2).await;
    let delete = server
        .mock("DELETE", "/projects/p1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": true }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("root@flyrank.com", "secret").await.unwrap();
    client.projects().refresh(false).await.unwrap();

    let (broker, requests) = ConfirmBroker::channel(1);
    spawn_auto_responder(requests, true);
    assert!(client.projects().delete_project("p1", &broker).await.unwrap());
    delete.assert_async().await;
    projects.assert_async().await;
}

#[tokio::test]
async fn logout_clears_session_even_if_server_fails() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    mock_projects(&mut server, 1).await;
    server
        .mock("POST", "/auth/logout")
        .with_status(500)
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    let client = client_for(&server, store.clone());
    client.session().login("ops@flyrank.com", "secret").await.unwrap();
    client.projects().refresh(false).await.unwrap();

    client.session().logout().await.unwrap();

    assert!(!client.session().is_logged_in());
    assert!(store.read(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(client.projects().view(&FilterState::default()).await.is_empty());
}

#[tokio::test]
async fn project_chat_threads_turns_and_withdraws_failed_messages() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    server
        .mock("POST", "/projects/p1/ai/chat")
        .match_body(Matcher::Json(json!({ "message": "hello", "visibility": "internal" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "response": "Hi there", "thread_id": "th-1" }).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/projects/p1/ai/chat")
        .match_body(Matcher::PartialJson(json!({ "message": "again", "thread_id": "th-1" })))
        .with_status(503)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Assistant busy" }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();

    let mut chat = client.chat(ChatTarget::Project {
        id: "p1".to_string(),
        visibility: Visibility::Internal,
    });
    assert_eq!(chat.send("   ").await, ChatTurn::Ignored);
    assert!(matches!(chat.send("hello").await, ChatTurn::Replied(_)));
    assert_eq!(chat.thread_id(), Some("th-1"));

    let turn = chat.send("again").await;
    assert_eq!(
        turn,
        ChatTurn::Failed {
            message: "Assistant busy".to_string()
        }
    );
    let roles: Vec<_> = chat.transcript().iter().map(|e| e.role).collect();
    assert_eq!(roles, [ChatRole::User, ChatRole::Assistant]);
    let toasts = client.notifications().drain();
    assert_eq!(toasts.last().map(|t| t.message.as_str()), Some("Assistant busy"));
}

#[tokio::test]
async fn alien_gpt_failure_is_kept_in_the_transcript() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    server
        .mock("POST", "/alien-gpt/chat")
        .with_status(502)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "Model offline" }).to_string())
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();

    let mut chat = client.chat(ChatTarget::AlienGpt);
    chat.send("status of all launches?").await;

    let transcript = chat.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, ChatRole::User);
    assert_eq!(transcript[1].role, ChatRole::Error);
    assert_eq!(transcript[1].content, "Model offline");
    assert!(client.notifications().is_empty());
}

#[tokio::test]
async fn reports_are_listed_and_generated() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    server
        .mock("GET", "/reports/types")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{ "id": "weekly", "name": "Weekly summary" }]).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/reports/generate")
        .match_body(Matcher::Json(json!({ "report_type": "weekly" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "report_type": "weekly", "content": "# Week 12" }).to_string())
        .create_async()
        .await;
    let slack = server
        .mock("POST", "/reports/send-to-slack")
        .match_body(Matcher::Json(json!({ "content": "# Week 12", "report_type": "weekly" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();

    let types = client.reports().types().await.unwrap();
    assert_eq!(types[0].id, "weekly");
    let report = client.reports().generate("weekly").await.unwrap();
    assert_eq!(report.content, "# Week 12");
    client.reports().send_to_slack(&report).await.unwrap();
    slack.assert_async().await;
}

#[tokio::test]
async fn settings_require_superadmin() {
    let mut server = Server::new_async().await;
    mock_login(&mut server, "ops@flyrank.com", "internal").await;
    let settings = server.mock("GET", "/settings/").expect(0).create_async().await;
    let client = client_for(&server, Arc::new(MemoryStore::new()));
    client.session().login("ops@flyrank.com", "secret").await.unwrap();

    assert!(client.admin().settings().await.unwrap_err().is_forbidden());
    settings.assert_async().await;
}

#[test]
fn theme_preference_shares_the_client_store() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemePreference::new(store.clone());
    theme.toggle().unwrap();
    assert_eq!(store.read("alien_theme").unwrap().as_deref(), Some("dark"));
}
