use std::collections::HashMap;

use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use shared::{domain::Method, error::MalformedEnvelope, protocol::FilePart};
use tokio::net::TcpListener;

use super::*;

#[derive(Debug)]
struct SeenRequest {
    path: String,
    header_token: Option<String>,
    cookie_token: Option<String>,
    fields: Vec<(String, String)>,
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

fn csrf_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|header| {
            header
                .split(';')
                .map(str::trim)
                .find_map(|pair| pair.strip_prefix("CSRF-TOKEN=").map(str::to_string))
        })
}

async fn handle_signup(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Json<ResponseEnvelope> {
    let header_token = headers
        .get("x-csrf-token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let cookie_token = csrf_cookie_value(&headers);
    let paired = header_token.is_some() && header_token == cookie_token;

    state.seen.lock().await.push(SeenRequest {
        path: "/signup".to_string(),
        header_token,
        cookie_token,
        fields,
    });

    if paired {
        Json(ResponseEnvelope::ok("Welcome"))
    } else {
        Json(ResponseEnvelope::error("missing csrf pair"))
    }
}

async fn handle_signin() -> Json<ResponseEnvelope> {
    Json(ResponseEnvelope::error("Bad password"))
}

async fn handle_signout() -> Json<ResponseEnvelope> {
    Json(ResponseEnvelope::ok("/loginPage"))
}

async fn handle_upload(mut multipart: Multipart) -> Json<ResponseEnvelope> {
    let mut filenames = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if let Some(name) = field.file_name() {
            filenames.push(name.to_string());
        }
        let _ = field.bytes().await;
    }

    if filenames.is_empty() {
        Json(ResponseEnvelope::error("no file"))
    } else {
        Json(ResponseEnvelope::ok(format!("Stored {}", filenames.join(","))))
    }
}

async fn handle_clear() -> Json<ResponseEnvelope> {
    Json(ResponseEnvelope::ok("Cleared"))
}

async fn handle_date(Query(params): Query<HashMap<String, String>>) -> Json<ResponseEnvelope> {
    match params.get("tz") {
        Some(tz) => Json(ResponseEnvelope::ok(format!("time in {tz}"))),
        None => Json(ResponseEnvelope::error("missing tz")),
    }
}

async fn handle_weird() -> Json<ResponseEnvelope> {
    Json(ResponseEnvelope {
        kind: "WEIRD".to_string(),
        message: "x".to_string(),
    })
}

async fn handle_boom() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_front_end_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/signup", post(handle_signup))
        .route("/signin", post(handle_signin))
        .route("/signout", get(handle_signout))
        .route("/upload", post(handle_upload))
        .route("/clear", get(handle_clear))
        .route("/date", get(handle_date))
        .route("/weird", get(handle_weird))
        .route("/boom", get(handle_boom))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[derive(Default)]
struct RecordingNotifier {
    toasts: Mutex<Vec<(Severity, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, severity: Severity, text: &str) -> Result<()> {
        self.toasts.lock().await.push((severity, text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
    reloads: Mutex<usize>,
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn redirect(&self, target: &str) -> Result<()> {
        self.redirects.lock().await.push(target.to_string());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        *self.reloads.lock().await += 1;
        Ok(())
    }
}

type TestClient = (
    Arc<FormClient>,
    Arc<RecordingNotifier>,
    Arc<RecordingNavigator>,
);

fn client_for(base_url: &str, follow_up_delay_ms: u64) -> Result<TestClient> {
    let settings = ClientSettings {
        base_url: base_url.to_string(),
        follow_up_delay_ms,
        with_credentials: true,
    };
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let client = FormClient::new_with_http_transport(
        settings,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
    )?;
    Ok((client, notifier, navigator))
}

#[tokio::test]
async fn signup_round_trip_sends_matching_token_pair() {
    let (base_url, state) = spawn_front_end_server().await.expect("spawn server");
    let (client, notifier, _navigator) = client_for(&base_url, 50).expect("client");

    let form = FormData::new()
        .field("username", "alice")
        .field("password", "hunter2");
    let intent = client
        .run(&ActionDescriptor::signup(), form)
        .await
        .expect("run signup");

    assert_eq!(
        intent,
        DisplayIntent::Notify {
            severity: Severity::Success,
            text: "Welcome".into(),
        }
    );

    let seen = state.seen.lock().await;
    let request = seen
        .iter()
        .find(|r| r.path == "/signup")
        .expect("request recorded");
    let header_token = request.header_token.clone().expect("header token present");
    assert_eq!(Some(&header_token), request.cookie_token.as_ref());
    assert_eq!(header_token.len(), 36);
    assert!(request
        .fields
        .contains(&("username".to_string(), "alice".to_string())));

    let toasts = notifier.toasts.lock().await;
    assert_eq!(
        toasts.as_slice(),
        &[(Severity::Success, "Welcome".to_string())]
    );
}

#[tokio::test]
async fn error_envelope_shows_error_toast_and_never_navigates() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, notifier, navigator) = client_for(&base_url, 20).expect("client");

    let action = ActionDescriptor::signin().with_delay(Duration::from_millis(20));
    let intent = client
        .run(&action, FormData::new().field("login", "bob"))
        .await
        .expect("run signin");

    assert_eq!(intent.severity(), Severity::Error);
    assert_eq!(intent.text(), "Bad password");

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(navigator.redirects.lock().await.is_empty());
    assert_eq!(*navigator.reloads.lock().await, 0);

    let toasts = notifier.toasts.lock().await;
    assert_eq!(
        toasts.as_slice(),
        &[(Severity::Error, "Bad password".to_string())]
    );
}

#[tokio::test]
async fn signout_redirects_to_server_supplied_target_after_delay() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, notifier, navigator) = client_for(&base_url, 30).expect("client");

    let action = ActionDescriptor::signout().with_delay(Duration::from_millis(30));
    let intent = client.run(&action, FormData::new()).await.expect("run signout");

    match &intent {
        DisplayIntent::NotifyThenRedirect { text, target, .. } => {
            assert_eq!(text, "Signing out...");
            assert_eq!(target, "/loginPage");
        }
        other => panic!("unexpected intent {other:?}"),
    }

    assert!(navigator.redirects.lock().await.is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        navigator.redirects.lock().await.as_slice(),
        &["/loginPage".to_string()]
    );

    let toasts = notifier.toasts.lock().await;
    assert_eq!(
        toasts.as_slice(),
        &[(Severity::Success, "Signing out...".to_string())]
    );
}

#[tokio::test]
async fn upload_posts_multipart_and_reloads_after_delay() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, _notifier, navigator) = client_for(&base_url, 20).expect("client");

    let file = FilePart {
        field: "file".to_string(),
        filename: "notes.txt".to_string(),
        mime_type: Some("text/plain".to_string()),
        bytes: b"hello".to_vec(),
    };
    let action = ActionDescriptor::upload().with_delay(Duration::from_millis(20));
    let intent = client
        .run(&action, FormData::new().file(file))
        .await
        .expect("run upload");

    assert!(matches!(intent, DisplayIntent::NotifyThenReload { .. }));
    assert_eq!(intent.text(), "Stored notes.txt");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*navigator.reloads.lock().await, 1);
}

#[tokio::test]
async fn get_actions_carry_fields_as_query_string() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, _notifier, _navigator) = client_for(&base_url, 20).expect("client");

    let intent = client
        .run(&ActionDescriptor::date(), FormData::new().field("tz", "UTC"))
        .await
        .expect("run date");

    assert_eq!(
        intent,
        DisplayIntent::Notify {
            severity: Severity::Success,
            text: "time in UTC".into(),
        }
    );
}

#[tokio::test]
async fn transport_failure_renders_generic_error_toast() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, notifier, navigator) = client_for(&base_url, 20).expect("client");

    let boom = ActionDescriptor::new("boom", Method::Get, "/boom");
    let intent = client.run(&boom, FormData::new()).await.expect("run boom");

    assert_eq!(
        intent,
        DisplayIntent::Notify {
            severity: Severity::Error,
            text: dispatch::TRANSPORT_FAILURE_TEXT.into(),
        }
    );

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(navigator.redirects.lock().await.is_empty());
    assert_eq!(*navigator.reloads.lock().await, 0);
    assert_eq!(notifier.toasts.lock().await.len(), 1);
}

#[tokio::test]
async fn unrecognized_response_tag_propagates_as_malformed_envelope() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, notifier, _navigator) = client_for(&base_url, 20).expect("client");

    let weird = ActionDescriptor::new("weird", Method::Get, "/weird");
    let err = client
        .run(&weird, FormData::new())
        .await
        .expect_err("must fail");
    let malformed = err
        .downcast_ref::<MalformedEnvelope>()
        .expect("typed malformed-envelope error");
    assert_eq!(malformed.kind, "WEIRD");

    assert!(notifier.toasts.lock().await.is_empty());
}

#[tokio::test]
async fn cancel_pending_stops_scheduled_navigation() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, _notifier, navigator) = client_for(&base_url, 60).expect("client");

    let action = ActionDescriptor::clear().with_delay(Duration::from_millis(60));
    client.run(&action, FormData::new()).await.expect("run clear");

    assert_eq!(client.cancel_pending().await, 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*navigator.reloads.lock().await, 0);

    // nothing left to cancel
    assert_eq!(client.cancel_pending().await, 0);
}

#[tokio::test]
async fn events_reflect_intent_and_follow_up() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, _notifier, _navigator) = client_for(&base_url, 10).expect("client");

    let mut events = client.subscribe_events();
    let action = ActionDescriptor::clear().with_delay(Duration::from_millis(10));
    client.run(&action, FormData::new()).await.expect("run clear");

    let first = events.recv().await.expect("intent event");
    assert!(matches!(
        first,
        ClientEvent::IntentProduced { ref action, .. } if action == "clear"
    ));
    let second = events.recv().await.expect("follow-up event");
    assert!(matches!(
        second,
        ClientEvent::FollowUpScheduled { ref action, .. } if action == "clear"
    ));
}

#[tokio::test]
async fn firing_a_bound_trigger_runs_the_bound_action() {
    let (base_url, _state) = spawn_front_end_server().await.expect("spawn server");
    let (client, _notifier, _navigator) = client_for(&base_url, 10).expect("client");

    let bindings = client.standard_bindings();
    let intent = client
        .fire(
            &bindings,
            &Trigger::click(".btn-danger"),
            FormData::new().field("tz", "UTC"),
        )
        .await
        .expect("fire date");
    assert_eq!(intent.text(), "time in UTC");

    let missing = client
        .fire(&bindings, &Trigger::click(".btn-nope"), FormData::new())
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn missing_collaborators_error_instead_of_acting() {
    let client = FormClient::new(ClientSettings::default());
    let err = client
        .run(&ActionDescriptor::clear(), FormData::new())
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("notifier"));
}
