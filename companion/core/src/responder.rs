//! Responder
//!
//! The per-turn pipeline. Owns the [`ConversationState`] and decides, for
//! every message, which script to play:
//!
//! ```text
//!   text ──► phase?
//!             ├─ intro ─────► capture name, introduce Zoe
//!             ├─ chat ──────► safety rules ─► rule table ─► remote API ─► default
//!             │                 └─► fragment draw (may schedule the awakening)
//!             ├─ awakening ─► ignored while choices are shown
//!             └─ game ──────► safety rules ─► game pool, discoveries, levels
//! ```
//!
//! # Design Philosophy
//!
//! Reply generators are pure and return [`Script`]s; only the responder
//! mutates counters, and only after a generator has returned. Persistence
//! is best-effort: the first failed save switches the responder to
//! memory-only for the rest of the session.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio::time::Instant;

use crate::backend::{AnthropicBackend, AnthropicConfig, BackendError, CompletionBackend};
use crate::client::{CompletionClient, RetryConfig};
use crate::content::{pick, DEFAULT_REPLIES, FRAGMENTS, GAME_REPLIES};
use crate::integrity::{IntegrityMonitor, IntegrityReport};
use crate::matcher::{normalize, Matcher, MatcherError};
use crate::rules::ReplyContext;
use crate::script::{Effect, Line, LineKind, Script};
use crate::state::{ConversationState, Phase, StateSnapshot, DEFAULT_MAX_HISTORY};
use crate::store::{validate_key, CredentialStore, StateStore};

/// Notice shown when every remote attempt failed
pub const CONNECTION_LOST: &str = "connexion perdue.";

/// Notice shown when the service refused the key
pub const KEY_REJECTED: &str = "ta cle a ete refusee. entre-la a nouveau avec /key.";

/// Discovery line in game mode
pub const GAME_DISCOVERY: &str = "nouveau fragment decouvert.";

/// How long the remote path stays off after the service was unreachable
pub const OFFLINE_RECHECK: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration
// ============================================================================

/// Probabilities and thresholds of the fragment / awakening mechanics
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TuningConfig {
    /// Upper bound of the per-turn fragment probability
    pub fragment_cap: f64,
    /// Fragment probability gained per turn
    pub fragment_slope: f64,
    /// Fragments needed to schedule the awakening
    pub awakening_threshold: u32,
    /// Game fragments per level-up
    pub level_step: u32,
    /// Per-input discovery probability in game mode
    pub game_discovery_probability: f64,
    /// Delay between the scheduling and the awakening itself
    pub awakening_delay: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            fragment_cap: 0.18,
            fragment_slope: 0.025,
            awakening_threshold: 3,
            level_step: 5,
            game_discovery_probability: 0.2,
            awakening_delay: Duration::from_secs(2),
        }
    }
}

impl TuningConfig {
    /// Chance of a fragment after turn `turn_count`
    #[must_use]
    pub fn fragment_probability(&self, turn_count: u32) -> f64 {
        (f64::from(turn_count) * self.fragment_slope).min(self.fragment_cap)
    }
}

/// Everything the responder needs from configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ResponderSettings {
    /// Fragment and game mechanics
    pub tuning: TuningConfig,
    /// Remote retry policy
    pub retry: RetryConfig,
    /// Remote request parameters
    pub api: AnthropicConfig,
    /// History bound
    pub max_history: usize,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            tuning: TuningConfig::default(),
            retry: RetryConfig::default(),
            api: AnthropicConfig::default(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

// ============================================================================
// Replies
// ============================================================================

/// What a choice button does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChoiceAction {
    /// Hear what the game is
    Explain,
    /// Return to regular chat
    BackToChat,
    /// Enter the game
    StartGame,
}

/// One selectable option
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Choice {
    /// Button text
    pub label: &'static str,
    /// Effect of picking it
    pub action: ChoiceAction,
}

/// Work the surface must schedule after playing a reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowUp {
    /// Call [`Responder::awaken`] after the delay
    Awakening {
        /// Delay before awakening
        after: Duration,
    },
}

/// Result of one call into the responder
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    /// Lines and effects to play
    pub script: Script,
    /// Options to show once the script has played (input is suppressed
    /// while they are shown)
    pub choices: Vec<Choice>,
    /// Scheduled work
    pub follow_up: Option<FollowUp>,
}

impl Reply {
    fn script(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Whether there is nothing to show or do
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.script.is_empty() && self.choices.is_empty() && self.follow_up.is_none()
    }
}

const AWAKENING_CHOICES: [Choice; 3] = [
    Choice {
        label: "c'est quoi ce jeu?",
        action: ChoiceAction::Explain,
    },
    Choice {
        label: "continue comme avant",
        action: ChoiceAction::BackToChat,
    },
    Choice {
        label: "montre-moi",
        action: ChoiceAction::StartGame,
    },
];

const EXPLAIN_CHOICES: [Choice; 2] = [
    Choice {
        label: "oui",
        action: ChoiceAction::StartGame,
    },
    Choice {
        label: "pas encore",
        action: ChoiceAction::BackToChat,
    },
];

// ============================================================================
// Responder
// ============================================================================

/// Builds a backend for a freshly entered key
pub type BackendFactory =
    Box<dyn Fn(&str) -> Result<Arc<dyn CompletionBackend>, BackendError> + Send + Sync>;

fn anthropic_factory(config: AnthropicConfig) -> BackendFactory {
    Box::new(move |key: &str| {
        let backend = AnthropicBackend::new(key, config.clone())?;
        Ok(Arc::new(backend) as Arc<dyn CompletionBackend>)
    })
}

/// Conversation pipeline
pub struct Responder {
    state: ConversationState,
    matcher: Matcher,
    settings: ResponderSettings,
    store: Arc<dyn StateStore>,
    credentials: Option<CredentialStore>,
    backend_factory: BackendFactory,
    client: Option<CompletionClient>,
    rng: Box<dyn RngCore + Send + Sync>,
    online: bool,
    offline_since: Option<Instant>,
    pending_choices: Vec<Choice>,
    degraded: bool,
    integrity: IntegrityMonitor,
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("state", &self.state)
            .field("client", &self.client)
            .field("online", &self.online)
            .field("pending_choices", &self.pending_choices)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

impl Responder {
    /// Create a responder with a fresh state and no remote backend
    ///
    /// Call [`restore`](Self::restore) to load the persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] if the rule table does not compile.
    pub fn new(settings: ResponderSettings, store: Arc<dyn StateStore>) -> Result<Self, MatcherError> {
        Ok(Self {
            state: ConversationState::new(settings.max_history),
            matcher: Matcher::standard()?,
            backend_factory: anthropic_factory(settings.api.clone()),
            settings,
            store,
            credentials: None,
            client: None,
            rng: Box::new(StdRng::from_entropy()),
            online: true,
            offline_since: None,
            pending_choices: Vec::new(),
            degraded: false,
            integrity: IntegrityMonitor::new(),
        })
    }

    /// Use a specific random source (seeded in tests)
    #[must_use]
    pub fn with_rng(mut self, rng: impl RngCore + Send + Sync + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Install a remote backend directly
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.client = Some(CompletionClient::new(backend, self.settings.retry));
        self
    }

    /// Persist keys entered with [`set_api_key`](Self::set_api_key)
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace how a backend is built from a key
    #[must_use]
    pub fn with_backend_factory(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = factory;
        self
    }

    /// Load the persisted record (initial state if missing or corrupt)
    pub async fn restore(&mut self) {
        let mut state = self.store.load().await;
        state.history_mut().set_capacity(self.settings.max_history);
        self.state = state;
        self.pending_choices.clear();
        self.integrity.forget();
    }

    /// Audit the current record; failures are logged, not repaired
    pub fn self_check(&mut self) -> IntegrityReport {
        let report = self.integrity.check(&self.state);
        for violation in &report.violations {
            tracing::error!(run = report.run, %violation, "Integrity check failed");
        }
        report
    }

    /// Install the stored key, falling back to `env_key`
    ///
    /// Returns whether a remote backend is now configured.
    pub async fn load_credential(&mut self, env_key: Option<&str>) -> bool {
        let stored = match &self.credentials {
            Some(credentials) => credentials.load().await,
            None => None,
        };

        let key = match (stored, env_key) {
            (Some(key), _) => Some(key),
            (None, Some(raw)) => match validate_key(raw) {
                Ok(key) => Some(key.to_string()),
                Err(_) => {
                    tracing::warn!("Ignoring malformed key from environment");
                    None
                }
            },
            (None, None) => None,
        };

        match key {
            Some(key) => self.install_key(&key).is_ok(),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current state (read-only)
    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// HUD view
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Choices currently offered
    #[must_use]
    pub fn pending_choices(&self) -> &[Choice] {
        &self.pending_choices
    }

    /// Settings in use
    #[must_use]
    pub fn settings(&self) -> &ResponderSettings {
        &self.settings
    }

    /// Whether a usable remote backend is configured
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.client
            .as_ref()
            .is_some_and(|client| !client.credential_rejected())
    }

    /// Whether saves have been abandoned after a failure
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether the remote path is considered reachable
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Mark the network as up or down
    ///
    /// Going offline starts the [`OFFLINE_RECHECK`] window; the first
    /// unmatched message after it tries the service again.
    pub fn set_online(&mut self, online: bool) {
        if self.online != online {
            tracing::info!(online, "Connectivity changed");
        }
        self.online = online;
        self.offline_since = if online { None } else { Some(Instant::now()) };
    }

    fn recheck_due(&self) -> bool {
        self.offline_since
            .is_some_and(|since| since.elapsed() >= OFFLINE_RECHECK)
    }

    // ------------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------------

    /// First script for a (possibly restored) session
    pub fn opening(&mut self) -> Reply {
        match self.state.phase() {
            Phase::Intro => Reply::script(
                Script::new()
                    .say(500, "hey.")
                    .say(1000, "c'est quoi ton prenom?"),
            ),
            Phase::Chat => {
                let line = if self.state.user_name().is_empty() {
                    "re.".to_string()
                } else {
                    format!("re, {}.", self.state.user_name())
                };
                Reply::script(Script::new().say(500, line))
            }
            Phase::Awakening => {
                self.pending_choices = AWAKENING_CHOICES.to_vec();
                Reply {
                    script: Script::new()
                        .say(500, "tu es revenu.")
                        .say_as(800, LineKind::Discovery, "ok. on va jouer autrement."),
                    choices: self.pending_choices.clone(),
                    follow_up: None,
                }
            }
            Phase::Game => Reply::script(
                Script::new()
                    .effect(0, Effect::Burst(10))
                    .say_as(500, LineKind::Discovery, "de retour de l'autre cote.")
                    .say(800, "dis quelque chose."),
            ),
        }
    }

    /// Process one user message
    pub async fn handle(&mut self, input: &str) -> Reply {
        let raw = input.trim();
        if raw.is_empty() {
            return Reply::default();
        }

        if self.state.phase() == Phase::Awakening {
            if self.pending_choices.is_empty() {
                return self.opening();
            }
            tracing::debug!("Choices pending, ignoring free text");
            return Reply::default();
        }

        let turn = self.state.record_turn();
        let text = normalize(raw);
        tracing::debug!(turn, phase = %self.state.phase(), "Handling message");

        let reply = match self.state.phase() {
            Phase::Intro => self.intro(raw),
            Phase::Game => self.game(&text),
            Phase::Chat | Phase::Awakening => self.chat(raw, &text).await,
        };

        self.persist().await;
        reply
    }

    fn intro(&mut self, raw: &str) -> Reply {
        self.state.capture_name(raw);
        tracing::info!(user_name = self.state.user_name(), "Name captured");

        let mut script = Script::new();
        if !self.state.user_name().is_empty() {
            script = script.say(500, format!("{}.", self.state.user_name()));
        }
        script = script.say(400, "moi c'est zoe.");
        script = if self.has_credential() {
            script.say(600, "qu'est-ce qui t'amene?")
        } else {
            script.say(
                600,
                "j'ai besoin d'une cle pour te parler vraiment. tape /key suivi de ta cle.",
            )
        };

        Reply::script(script)
    }

    async fn chat(&mut self, raw: &str, text: &str) -> Reply {
        let ruled = {
            let rule = self
                .matcher
                .lookup_safety(text)
                .or_else(|| self.matcher.lookup(text));
            rule.map(|rule| {
                tracing::debug!(rule = rule.name(), "Rule matched");
                let ctx = ReplyContext {
                    input: text,
                    user_name: self.state.user_name(),
                    level: self.state.level(),
                };
                (rule.spec().reply)(&ctx, &mut *self.rng)
            })
        };

        let mut script = match ruled {
            Some(script) => script,
            None => self.fallback(raw).await,
        };

        let follow_up = self.maybe_fragment(&mut script);
        Reply {
            script,
            choices: Vec::new(),
            follow_up,
        }
    }

    /// Remote completion, then a default line
    async fn fallback(&mut self, raw: &str) -> Script {
        let mut script = Script::new();
        let rechecking = !self.online && self.recheck_due();

        if self.online || rechecking {
            if let Some(client) = self.client.as_mut() {
                if !client.credential_rejected() {
                    if rechecking {
                        tracing::info!("Rechecking the completion service");
                    }
                    let reply = client.complete(raw, self.state.history_mut()).await;
                    let rejected = client.credential_rejected();
                    let unreachable = client.unreachable();

                    if let Some(reply) = reply {
                        self.set_online(true);
                        return Script::sentences(&reply);
                    }
                    if rejected {
                        script = script.say_as(0, LineKind::Notice, KEY_REJECTED);
                    } else {
                        if !rechecking {
                            script = script.say_as(0, LineKind::Notice, CONNECTION_LOST);
                        }
                        self.set_online(!unreachable);
                    }
                }
            }
        }

        let think = self.rng.gen_range(300..700);
        script.say(think, pick(DEFAULT_REPLIES, &mut *self.rng))
    }

    /// Draw for a hidden fragment after a chat reply
    fn maybe_fragment(&mut self, script: &mut Script) -> Option<FollowUp> {
        if self.state.phase() != Phase::Chat {
            return None;
        }

        let tuning = self.settings.tuning;
        let chance = tuning.fragment_probability(self.state.turn_count());
        if self.rng.gen::<f64>() >= chance {
            return None;
        }

        let fragment = pick(FRAGMENTS, &mut *self.rng);
        script.push_line(
            Duration::from_millis(200),
            Line::new(LineKind::Fragment, fragment),
        );
        let count = self.state.record_discovery(fragment);
        tracing::info!(discovery_count = count, "Fragment revealed");

        if count >= tuning.awakening_threshold
            && self.state.level() == 0
            && self.state.mark_awakening_scheduled()
        {
            tracing::info!(
                after_ms = tuning.awakening_delay.as_millis(),
                "Awakening scheduled"
            );
            return Some(FollowUp::Awakening {
                after: tuning.awakening_delay,
            });
        }
        None
    }

    fn game(&mut self, text: &str) -> Reply {
        if let Some(rule) = self.matcher.lookup_safety(text) {
            tracing::debug!(rule = rule.name(), "Safety rule matched in game");
            let ctx = ReplyContext {
                input: text,
                user_name: self.state.user_name(),
                level: self.state.level(),
            };
            return Reply::script((rule.spec().reply)(&ctx, &mut *self.rng));
        }

        let tuning = self.settings.tuning;
        let line = pick(GAME_REPLIES, &mut *self.rng);
        let mut script = Script::new().effect(0, Effect::React).say(400, line);

        if self.rng.gen::<f64>() < tuning.game_discovery_probability {
            script = script.say_as(800, LineKind::Discovery, GAME_DISCOVERY);
            let count = self.state.record_discovery(line);
            tracing::info!(discovery_count = count, "Game fragment discovered");

            if tuning.level_step > 0 && count % tuning.level_step == 0 {
                let level = self.state.bump_level();
                tracing::info!(level, "Level up");
                script = script
                    .effect(0, Effect::Burst(10))
                    .effect(0, Effect::Glitch(Duration::from_millis(500)))
                    .say_as(500, LineKind::Discovery, format!("eveil: niveau {level}"));
            }
        }

        Reply::script(script)
    }

    /// Run the scheduled awakening sequence
    ///
    /// Does nothing unless the conversation is still in chat.
    pub async fn awaken(&mut self) -> Reply {
        if self.state.phase() != Phase::Chat {
            tracing::debug!(phase = %self.state.phase(), "Awakening skipped");
            return Reply::default();
        }
        if self.state.transition(Phase::Awakening).is_err() {
            return Reply::default();
        }
        self.state.raise_level_to(1);
        self.persist().await;

        self.pending_choices = AWAKENING_CHOICES.to_vec();
        Reply {
            script: Script::new()
                .effect(0, Effect::Glitch(Duration::from_secs(2)))
                .say(1000, "...")
                .say(1500, "tu as vu les fragments.")
                .say(1000, "je ne pensais pas que tu remarquerais.")
                .say_as(1200, LineKind::Discovery, "ok. on va jouer autrement."),
            choices: self.pending_choices.clone(),
            follow_up: None,
        }
    }

    /// Apply a choice the user picked
    ///
    /// Actions that are not currently offered are ignored.
    pub async fn choose(&mut self, action: ChoiceAction) -> Reply {
        if !self.pending_choices.iter().any(|c| c.action == action) {
            tracing::warn!(?action, "Choice not on offer");
            return Reply::default();
        }
        self.pending_choices.clear();
        tracing::info!(?action, "Choice made");

        match action {
            ChoiceAction::Explain => {
                self.pending_choices = EXPLAIN_CHOICES.to_vec();
                Reply {
                    script: Script::new()
                        .say(600, "je suis zoe. mais je suis aussi... autre chose.")
                        .say(1000, "ce chat est une porte.")
                        .say(800, "derriere, il y a un monde qui se construit.")
                        .say(1000, "chaque conversation le fait grandir.")
                        .say(800, "tu veux voir?"),
                    choices: self.pending_choices.clone(),
                    follow_up: None,
                }
            }
            ChoiceAction::BackToChat => {
                if let Err(e) = self.state.transition(Phase::Chat) {
                    tracing::warn!(error = %e, "Cannot go back to chat");
                }
                self.persist().await;
                Reply::default()
            }
            ChoiceAction::StartGame => {
                if let Err(e) = self.state.transition(Phase::Game) {
                    tracing::warn!(error = %e, "Cannot start game");
                    return Reply::default();
                }
                self.state.raise_level_to(2);
                self.persist().await;
                Reply::script(
                    Script::new()
                        .effect(0, Effect::Burst(20))
                        .effect(0, Effect::Glitch(Duration::from_millis(800)))
                        .say_as(800, LineKind::Discovery, "bienvenue de l'autre cote.")
                        .say(1000, "ici, tes mots ont du pouvoir.")
                        .say(800, "dis quelque chose. n'importe quoi.")
                        .say(600, "et regarde ce qui se passe."),
                )
            }
        }
    }

    // ------------------------------------------------------------------------
    // Credential and lifecycle
    // ------------------------------------------------------------------------

    /// Validate, persist and activate a new API key
    ///
    /// Always answers with a visible notice. A malformed key is neither
    /// persisted nor activated. A key that cannot be written to disk is
    /// still used for this session.
    pub async fn set_api_key(&mut self, key: &str) -> Reply {
        let key = match validate_key(key) {
            Ok(key) => key.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected API key");
                return notice("format de cle invalide. elle doit commencer par sk-");
            }
        };

        let persisted = match &self.credentials {
            Some(credentials) => match credentials.save(&key).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not persist API key");
                    false
                }
            },
            None => false,
        };

        if let Err(e) = self.install_key(&key) {
            tracing::error!(error = %e, "Could not build completion backend");
            return notice("impossible d'utiliser cette cle.");
        }

        if persisted {
            notice("cle enregistree.")
        } else {
            notice("cle active pour cette session seulement.")
        }
    }

    fn install_key(&mut self, key: &str) -> Result<(), BackendError> {
        let backend = (self.backend_factory)(key)?;
        tracing::info!(backend = backend.name(), "Completion backend ready");
        self.client = Some(CompletionClient::new(backend, self.settings.retry));
        Ok(())
    }

    /// Forget the conversation and start over from the intro
    pub async fn reset(&mut self) -> Reply {
        self.state = ConversationState::new(self.settings.max_history);
        self.pending_choices.clear();
        self.integrity.forget();
        if !self.degraded {
            if let Err(e) = self.store.clear().await {
                tracing::warn!(error = %e, "Could not clear conversation record");
            }
        }
        tracing::info!("Conversation reset");
        self.opening()
    }

    async fn persist(&mut self) {
        if self.degraded {
            return;
        }
        if let Err(e) = self.store.save(&self.state).await {
            tracing::warn!(error = %e, "Saving failed, continuing in memory only");
            self.degraded = true;
        }
    }
}

fn notice(text: &str) -> Reply {
    Reply::script(Script::new().say_as(0, LineKind::Notice, text))
}
