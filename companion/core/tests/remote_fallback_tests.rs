//! Remote Fallback Tests
//!
//! The responder's path through the completion client, with a scripted
//! backend and paused time:
//! - Remote replies split into timed sentences
//! - Bounded retries, rate-limit backoff, terminal credential errors
//! - Notices for lost connection and rejected keys
//! - Bounded history under a long conversation
//! - Key entry, storage and the environment fallback

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use zoe_core::content::DEFAULT_REPLIES;
use zoe_core::responder::{BackendFactory, CONNECTION_LOST, KEY_REJECTED, OFFLINE_RECHECK};
use zoe_core::script::SENTENCE_PAUSE;
use zoe_core::{
    BackendError, CompletionBackend, CompletionRequest, CredentialStore, LineKind, MemoryStore,
    Responder, ResponderSettings, Role, Step, TuningConfig,
};

// =============================================================================
// Scripted Backend
// =============================================================================

/// Replays queued outcomes, then falls back to `default`
struct ScriptedBackend {
    outcomes: Mutex<VecDeque<Result<String, BackendError>>>,
    default: Option<Result<String, BackendError>>,
    calls: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedBackend {
    fn new(outcomes: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            default: None,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn always(outcome: Result<String, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            default: Some(outcome),
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let next = self.outcomes.lock().unwrap().pop_front();
        match next.or_else(|| self.default.clone()) {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }
}

fn status(code: u16) -> Result<String, BackendError> {
    Err(BackendError::Status {
        status: code,
        body: "{\"error\":\"nope\"}".to_string(),
    })
}

fn quiet_settings() -> ResponderSettings {
    ResponderSettings {
        tuning: TuningConfig {
            fragment_cap: 0.0,
            ..TuningConfig::default()
        },
        ..ResponderSettings::default()
    }
}

async fn chatting(backend: Arc<ScriptedBackend>, settings: ResponderSettings) -> Responder {
    let mut zoe = Responder::new(settings, Arc::new(MemoryStore::new()))
        .unwrap()
        .with_rng(StdRng::seed_from_u64(5))
        .with_backend(backend);
    zoe.handle("Sam").await;
    zoe
}

// =============================================================================
// Successful Replies
// =============================================================================

#[tokio::test(start_paused = true)]
async fn remote_reply_is_split_into_sentences() {
    let backend = ScriptedBackend::new(vec![Ok(
        "la mer est calme. tu y vas souvent? moi jamais.".to_string()
    )]);
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;

    let reply = zoe.handle("je pense a la mer").await;

    assert_eq!(
        reply.script.texts(),
        vec!["la mer est calme.", "tu y vas souvent?", "moi jamais."]
    );
    let pauses: Vec<Duration> = reply
        .script
        .steps()
        .iter()
        .filter(|s| matches!(s, Step::Typing { .. }))
        .map(Step::delay_before)
        .collect();
    assert_eq!(pauses, vec![SENTENCE_PAUSE, SENTENCE_PAUSE]);

    assert_eq!(backend.calls(), 1);
    let history: Vec<Role> = zoe.state().history().iter().map(|e| e.role).collect();
    assert_eq!(history, vec![Role::User, Role::Assistant]);

    let request = backend.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.messages.last().unwrap().content, "je pense a la mer");
}

#[tokio::test(start_paused = true)]
async fn rules_answer_before_the_api() {
    let backend = ScriptedBackend::always(Ok("jamais appele".to_string()));
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;

    zoe.handle("salut").await;
    zoe.handle("merci").await;
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn history_stays_bounded() {
    let max_history = 4;
    let backend = ScriptedBackend::always(Ok("hm.".to_string()));
    let settings = ResponderSettings {
        max_history,
        ..quiet_settings()
    };
    let mut zoe = chatting(backend.clone(), settings).await;

    for i in 0..max_history + 5 {
        zoe.handle(&format!("pensee numero {i}")).await;
        assert!(zoe.state().history().len() <= max_history);
    }
    assert_eq!(zoe.state().history().len(), max_history);
    assert_eq!(backend.calls() as usize, max_history + 5);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn exhausted_retries_show_connection_lost() {
    let backend = ScriptedBackend::always(status(503));
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;

    let start = tokio::time::Instant::now();
    let reply = zoe.handle("tu es la?").await;

    assert_eq!(backend.calls(), 3);
    // 1s + 2s of backoff between three attempts
    assert_eq!(start.elapsed(), Duration::from_secs(3));

    let lines: Vec<_> = reply.script.lines().collect();
    assert_eq!(lines[0].kind, LineKind::Notice);
    assert_eq!(lines[0].text, CONNECTION_LOST);
    assert!(DEFAULT_REPLIES.contains(&lines[1].text.as_str()));
}

#[tokio::test(start_paused = true)]
async fn silent_backend_is_bounded_by_timeouts() {
    let backend = ScriptedBackend::new(vec![]);
    let settings = quiet_settings();
    let worst_case = settings.retry.worst_case_duration();
    let mut zoe = chatting(backend.clone(), settings).await;

    let start = tokio::time::Instant::now();
    let reply = zoe.handle("il y a quelqu'un?").await;

    assert!(start.elapsed() <= worst_case);
    assert_eq!(backend.calls(), 3);
    assert_eq!(reply.script.lines().next().unwrap().text, CONNECTION_LOST);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_backs_off_longer() {
    let backend = ScriptedBackend::new(vec![status(429), Ok("me revoila.".to_string())]);
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;

    let start = tokio::time::Instant::now();
    let reply = zoe.handle("hmm").await;

    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(reply.script.texts(), vec!["me revoila."]);
}

#[tokio::test(start_paused = true)]
async fn rejected_key_stops_remote_calls() {
    let backend = ScriptedBackend::always(status(401));
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;
    assert!(zoe.has_credential());

    let reply = zoe.handle("raconte-moi un truc").await;
    assert_eq!(backend.calls(), 1);
    let first = reply.script.lines().next().unwrap();
    assert_eq!(first.kind, LineKind::Notice);
    assert_eq!(first.text, KEY_REJECTED);
    assert!(!zoe.has_credential());

    // Later turns go straight to the default lines
    let reply = zoe.handle("encore un truc").await;
    assert_eq!(backend.calls(), 1);
    assert_eq!(reply.script.lines().count(), 1);
    assert!(DEFAULT_REPLIES.contains(&reply.script.texts()[0]));
}

#[tokio::test(start_paused = true)]
async fn offline_skips_the_api() {
    let backend = ScriptedBackend::always(Ok("non".to_string()));
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;
    zoe.set_online(false);

    let reply = zoe.handle("hmm").await;
    assert_eq!(backend.calls(), 0);
    assert_eq!(reply.script.lines().count(), 1);
    assert!(reply.script.lines().all(|l| l.kind == LineKind::Zoe));
}

#[tokio::test(start_paused = true)]
async fn unreachable_service_goes_offline_until_recheck() {
    let refused = || Err(BackendError::Transport("connection refused".to_string()));
    let backend = ScriptedBackend::new(vec![
        refused(),
        refused(),
        refused(),
        refused(),
        refused(),
        refused(),
        Ok("me revoila.".to_string()),
    ]);
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;
    assert!(zoe.is_online());

    let reply = zoe.handle("tu es la?").await;
    assert_eq!(backend.calls(), 3);
    assert_eq!(reply.script.texts()[0], CONNECTION_LOST);
    assert!(!zoe.is_online());

    // Within the window: local lines only, no repeated notice
    let reply = zoe.handle("hmm").await;
    assert_eq!(backend.calls(), 3);
    assert!(reply.script.lines().all(|l| l.kind == LineKind::Zoe));

    // After the window a recheck runs; still refused, so the window restarts quietly
    tokio::time::advance(OFFLINE_RECHECK).await;
    let reply = zoe.handle("hmm").await;
    assert_eq!(backend.calls(), 6);
    assert!(reply.script.lines().all(|l| l.kind == LineKind::Zoe));
    assert!(!zoe.is_online());

    let reply = zoe.handle("hmm").await;
    assert_eq!(backend.calls(), 6);
    assert!(DEFAULT_REPLIES.contains(&reply.script.texts()[0]));

    tokio::time::advance(OFFLINE_RECHECK).await;
    let reply = zoe.handle("et maintenant?").await;
    assert_eq!(backend.calls(), 7);
    assert_eq!(reply.script.texts(), vec!["me revoila."]);
    assert!(zoe.is_online());
}

#[tokio::test(start_paused = true)]
async fn server_errors_keep_the_client_online() {
    let backend = ScriptedBackend::always(status(503));
    let mut zoe = chatting(backend.clone(), quiet_settings()).await;

    zoe.handle("tu es la?").await;
    assert!(zoe.is_online());
    zoe.handle("toujours la?").await;
    assert_eq!(backend.calls(), 6);
}

// =============================================================================
// Credentials
// =============================================================================

fn factory(backend: Arc<ScriptedBackend>, keys: Arc<Mutex<Vec<String>>>) -> BackendFactory {
    Box::new(move |key: &str| {
        keys.lock().unwrap().push(key.to_string());
        Ok(backend.clone() as Arc<dyn CompletionBackend>)
    })
}

#[tokio::test]
async fn entered_key_is_stored_and_reloaded() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::always(Ok("ok.".to_string()));
    let keys = Arc::new(Mutex::new(Vec::new()));

    let mut zoe = Responder::new(quiet_settings(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_credentials(CredentialStore::new(dir.path()))
        .with_backend_factory(factory(backend.clone(), keys.clone()));
    assert!(!zoe.has_credential());

    let reply = zoe.set_api_key("  sk-test-123  ").await;
    assert_eq!(reply.script.texts(), vec!["cle enregistree."]);
    assert!(zoe.has_credential());

    let mut restarted = Responder::new(quiet_settings(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_credentials(CredentialStore::new(dir.path()))
        .with_backend_factory(factory(backend, keys.clone()));
    assert!(restarted.load_credential(Some("sk-from-env")).await);

    // Stored key wins over the environment
    assert_eq!(*keys.lock().unwrap(), vec!["sk-test-123", "sk-test-123"]);
}

#[tokio::test]
async fn environment_key_is_a_fallback() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::always(Ok("ok.".to_string()));
    let keys = Arc::new(Mutex::new(Vec::new()));

    let mut zoe = Responder::new(quiet_settings(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_credentials(CredentialStore::new(dir.path()))
        .with_backend_factory(factory(backend.clone(), keys.clone()));

    assert!(!zoe.load_credential(Some("not-a-key")).await);
    assert!(!zoe.load_credential(None).await);
    assert!(zoe.load_credential(Some("sk-from-env")).await);
    assert_eq!(*keys.lock().unwrap(), vec!["sk-from-env"]);
}

#[tokio::test]
async fn key_without_storage_is_session_only() {
    let backend = ScriptedBackend::always(Ok("ok.".to_string()));
    let keys = Arc::new(Mutex::new(Vec::new()));
    let mut zoe = Responder::new(quiet_settings(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_backend_factory(factory(backend, keys));

    let reply = zoe.set_api_key("sk-abc").await;
    assert_eq!(
        reply.script.texts(),
        vec!["cle active pour cette session seulement."]
    );
    assert!(zoe.has_credential());
}

#[tokio::test]
async fn malformed_key_is_not_activated() {
    let backend = ScriptedBackend::always(Ok("ok.".to_string()));
    let keys = Arc::new(Mutex::new(Vec::new()));
    let dir = TempDir::new().unwrap();
    let credentials = CredentialStore::new(dir.path());
    let mut zoe = Responder::new(quiet_settings(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_credentials(CredentialStore::new(dir.path()))
        .with_backend_factory(factory(backend, keys.clone()));

    let reply = zoe.set_api_key("pk-wrong").await;
    assert_eq!(reply.script.lines().next().unwrap().kind, LineKind::Notice);
    assert!(!zoe.has_credential());
    assert!(keys.lock().unwrap().is_empty());
    assert!(credentials.load().await.is_none());
}
