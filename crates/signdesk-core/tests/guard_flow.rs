//! End-to-end checks of the guard over an in-memory session store.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use signdesk_core::auth::token;
use signdesk_core::auth::{MemoryStorage, SessionStore, StorageBackend, USER_KEY};
use signdesk_core::guard::{
    Guard, GuardPolicy, GuardState, Rendered, RouteRequest, View, LOADING_PLACEHOLDER,
};
use signdesk_core::models::{Role, UserProfile};
use signdesk_core::routing::{Navigation, Router};
use signdesk_core::AuthorizedSession;

const NOW: i64 = 1_760_000_000;

fn make_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig", header, body)
}

fn user(role: &str) -> UserProfile {
    serde_json::from_value(json!({
        "_id": "u-1",
        "username": "dana",
        "email": "dana@example.com",
        "firstName": "Dana",
        "lastName": "Reyes",
        "role": role,
    }))
    .unwrap()
}

fn signed_in(role: &str) -> SessionStore {
    let store = SessionStore::in_memory();
    store.save_token(&make_token(&json!({"exp": NOW + 600}))).unwrap();
    store.save_user(&user(role)).unwrap();
    store
}

/// Records the user each render receives.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<UserProfile>>>,
}

#[async_trait]
impl View for Recorder {
    fn title(&self) -> &str {
        "Recorder"
    }

    async fn render(&self, session: &AuthorizedSession, _request: &RouteRequest) -> Result<String> {
        self.seen.lock().unwrap().push(session.user.clone());
        Ok(format!("hello {}", session.user.username))
    }
}

#[test]
fn test_malformed_tokens_are_expired() {
    let payload = URL_SAFE_NO_PAD.encode(json!({"exp": NOW + 600}).to_string());
    let cases = [
        "".to_string(),
        "only.two".to_string(),
        format!("head.{}", payload),
        "head.!!not-base64!!.sig".to_string(),
        format!("head.{}.sig", URL_SAFE_NO_PAD.encode("not json")),
        make_token(&json!({"sub": "no exp"})),
        make_token(&json!({"exp": "soon"})),
    ];
    for token in &cases {
        assert!(token::is_expired_at(Some(token), NOW), "{:?}", token);
    }
    assert!(token::is_expired_at(None, NOW));
}

#[test]
fn test_expiry_boundary() {
    assert!(!token::is_expired_at(Some(&make_token(&json!({"exp": NOW + 1}))), NOW));
    assert!(token::is_expired_at(Some(&make_token(&json!({"exp": NOW}))), NOW));
    assert!(token::is_expired_at(Some(&make_token(&json!({"exp": NOW - 1}))), NOW));
}

#[tokio::test]
async fn test_user_role_redirected_from_admin_view() {
    let recorder = Recorder::default();
    let guarded = Guard::protect(recorder.clone(), &[Role::Admin]);
    let store = signed_in("user");

    let mut mount = guarded.mount(RouteRequest::new("/dashboard/users"));
    mount.evaluate(&store, &GuardPolicy::default(), NOW);

    let rendered = mount.render().await;
    assert_eq!(rendered, Rendered::Redirect("/dashboard".to_string()));
    assert_eq!(rendered.body(), None);
    assert!(recorder.seen.lock().unwrap().is_empty());
    // A forbidden user stays signed in.
    assert!(store.load_user().is_some());
}

#[tokio::test]
async fn test_admin_renders_with_user() {
    let recorder = Recorder::default();
    let guarded = Guard::protect(recorder.clone(), &[Role::Admin, Role::User]);
    let store = signed_in("admin");

    let mut mount = guarded.mount(RouteRequest::new("/dashboard/tickets"));
    let pending = mount.render().await;
    assert_eq!(pending, Rendered::Loading);
    assert_eq!(pending.body(), Some(LOADING_PLACEHOLDER));
    assert!(recorder.seen.lock().unwrap().is_empty());

    mount.evaluate(&store, &GuardPolicy::default(), NOW);
    assert_eq!(mount.render().await, Rendered::Page("hello dana".to_string()));
    assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[user("admin")]);
}

#[tokio::test]
async fn test_missing_token_clears_partial_session() {
    let store = SessionStore::in_memory();
    store.save_user(&user("admin")).unwrap();

    let guarded = Guard::protect(Recorder::default(), &[]);
    let mut mount = guarded.mount(RouteRequest::new("/profile"));
    let state = mount.evaluate(&store, &GuardPolicy::default(), NOW).clone();

    assert_eq!(
        state,
        GuardState::Unauthenticated {
            redirect: "/auth/login?redirect=%2Fprofile".to_string()
        }
    );
    assert_eq!(store.load_user(), None);
}

#[tokio::test]
async fn test_session_expiring_between_navigations() {
    let store = SessionStore::in_memory();
    store.save_token(&make_token(&json!({"exp": NOW + 60}))).unwrap();
    store.save_user(&user("user")).unwrap();

    let clock = Arc::new(Mutex::new(NOW));
    let tick = clock.clone();
    let router = Router::new(store.clone(), GuardPolicy::default())
        .with_clock(move || *tick.lock().unwrap())
        .route("/dashboard", Guard::protect(Recorder::default(), &[]));

    assert!(matches!(router.navigate("/dashboard").await, Navigation::Page { .. }));

    *clock.lock().unwrap() = NOW + 60;
    assert_eq!(
        router.navigate("/dashboard").await,
        Navigation::LoginRequired {
            redirect: "/auth/login?redirect=%2Fdashboard".to_string()
        }
    );
    assert_eq!(store.load_token(), None);
}

#[test]
fn test_corrupt_user_record_is_erased() {
    let backend = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(backend.clone());
    backend.set(USER_KEY, "{not json").unwrap();

    assert_eq!(store.load_user(), None);
    assert_eq!(backend.get(USER_KEY).unwrap(), None);
    assert_eq!(store.load_user(), None);
}

#[test]
fn test_user_round_trip() {
    let store = SessionStore::in_memory();
    let original: UserProfile = serde_json::from_value(json!({
        "_id": "u-7",
        "username": "lee",
        "email": "lee@example.com",
        "role": "admin",
        "preferences": {"theme": "dark", "pinned": [1, 2, 3]},
        "verified": true,
    }))
    .unwrap();

    store.save_user(&original).unwrap();
    assert_eq!(store.load_user(), Some(original));
}
