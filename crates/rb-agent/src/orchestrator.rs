//! The agent's control loop.
//!
//! Refreshes fetch, parse, compile and install a policy. Navigation events are
//! matched against the installed redirect rules. Both arrive as [`Command`]s;
//! a scheduler inside [`Orchestrator::run`] issues periodic refreshes.
//!
//! Refreshes are serialized. Navigations run concurrently with each other and
//! with a refresh, reading whatever rule set was last installed.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinSet;

use rb_compiler::{compile_policy, parse_policy, CompileStats, CompiledPolicy};
use rb_core::gate::{self, UnlockSession};
use rb_core::matcher::RedirectMatcher;
use rb_core::reconcile::{reconcile, RuleDiff};
use rb_core::types::LockStatus;
use rb_core::url::preview;

use crate::config::AgentConfig;
use crate::engine::FilterEngine;
use crate::error::{AgentError, Result};
use crate::navigation::{NavigationEvent, NavigationSink};
use crate::probe::Probe;
use crate::resolver::TargetResolver;
use crate::source::PolicySource;
use crate::store::{FetchTelemetry, KeyValueStore, StateStore};

/// The host facilities the orchestrator drives.
pub struct Collaborators {
    pub source: Arc<dyn PolicySource>,
    pub probe: Arc<dyn Probe>,
    pub engine: Arc<dyn FilterEngine>,
    pub sink: Arc<dyn NavigationSink>,
    pub store: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No policy URL is configured; nothing was touched.
    NoSource,
    /// A policy was compiled and installed.
    Applied(CompileStats),
}

/// What the debug surface shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub policy_url: Option<String>,
    pub managed: bool,
    pub telemetry: FetchTelemetry,
    pub lock_status: LockStatus,
    pub block_rules: usize,
    pub redirect_rules: usize,
}

pub enum Command {
    Refresh,
    Navigate(NavigationEvent),
    VerifyPassword {
        password: String,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<Result<AgentStatus>>,
    },
    Shutdown,
}

pub struct Orchestrator {
    config: AgentConfig,
    source: Arc<dyn PolicySource>,
    engine: Arc<dyn FilterEngine>,
    sink: Arc<dyn NavigationSink>,
    state: StateStore,
    resolver: TargetResolver,
    refresh_lock: Mutex<()>,
    matcher: RwLock<Option<Arc<RedirectMatcher>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: AgentConfig, collaborators: Collaborators) -> Self {
        let resolver = TargetResolver::new(collaborators.probe, config.probe_timeout());
        Self {
            config,
            source: collaborators.source,
            engine: collaborators.engine,
            sink: collaborators.sink,
            state: StateStore::new(collaborators.store),
            resolver,
            refresh_lock: Mutex::new(()),
            matcher: RwLock::new(None),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Managed URL first, then the locally stored one.
    pub async fn policy_url(&self) -> Result<Option<String>> {
        if let Some(url) = self.config.managed_policy_url.as_ref().filter(|u| !u.is_empty()) {
            return Ok(Some(url.clone()));
        }
        Ok(self.state.policy_url().await?)
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Fetch, compile and install the policy.
    ///
    /// A fetch or parse failure clears every installed rule before the error
    /// is returned, so a broken source never leaves stale rules enforced.
    /// Telemetry writes are best effort and never stop a clear or install.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let Some(url) = self.policy_url().await? else {
            self.note_attempt().await;
            self.note_result("No URL configured.").await;
            log::info!("No policy URL configured");
            return Ok(RefreshOutcome::NoSource);
        };

        self.note_attempt().await;
        let text = match self.source.fetch_text(&url).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Fetch of {url} failed: {e}");
                self.fail_safe().await;
                self.note_result(&format!("Error: {e}")).await;
                return Err(e.into());
            }
        };
        if let Err(e) = self.state.record_success(Utc::now()).await {
            log::warn!("Cannot record fetch success: {e}");
        }

        let doc = match parse_policy(&text) {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("Policy from {url} is malformed: {e}");
                self.fail_safe().await;
                self.note_result(&format!("Error: Invalid policy format. {e}"))
                    .await;
                return Err(e.into());
            }
        };

        let (policy, stats) = compile_policy(&doc);
        if stats.skipped > 0 {
            log::warn!("Skipped {} malformed policy entries", stats.skipped);
        }
        self.install(&policy).await?;
        Ok(RefreshOutcome::Applied(stats))
    }

    async fn note_attempt(&self) {
        if let Err(e) = self.state.record_attempt(Utc::now()).await {
            log::warn!("Cannot record fetch attempt: {e}");
        }
    }

    async fn note_result(&self, result: &str) {
        if let Err(e) = self.state.record_result(result).await {
            log::warn!("Cannot record fetch result: {e}");
        }
    }

    /// Install a compiled policy.
    ///
    /// Nothing changes when the engine rejects the block rules. Once it has
    /// accepted them, the new redirect rules serve navigations even if
    /// persisting them fails; every store write is still attempted.
    async fn install(&self, policy: &CompiledPolicy) -> Result<()> {
        let installed = self.engine.active_rules().await?;
        let diff = reconcile(&installed, &policy.block_rules);
        self.engine.apply_diff(&diff).await?;
        log::info!(
            "Applied {} blocking rules ({} removed, {} added)",
            policy.block_rules.len(),
            diff.remove_ids.len(),
            diff.add_rules.len()
        );
        self.set_matcher(RedirectMatcher::new(&policy.redirect_rules))
            .await;

        let blocks = self.state.set_block_rules(&policy.block_rules).await;
        let redirects = self.state.set_redirect_rules(&policy.redirect_rules).await;
        let lock = self.state.set_access_lock(&policy.lock).await;
        blocks?;
        redirects?;
        lock?;
        log::info!("Stored {} redirection rules", policy.redirect_rules.len());
        Ok(())
    }

    /// Drop every rule. Each step runs even when an earlier one fails; the
    /// first failure is returned.
    async fn clear_rules(&self) -> Result<()> {
        self.set_matcher(RedirectMatcher::default()).await;
        let engine = self.clear_engine().await;
        let blocks = self.state.set_block_rules(&[]).await;
        let redirects = self.state.set_redirect_rules(&[]).await;
        log::info!("Cleared all redirection rules");
        engine?;
        blocks?;
        redirects?;
        Ok(())
    }

    async fn clear_engine(&self) -> Result<()> {
        let installed = self.engine.active_rules().await?;
        let diff = RuleDiff::clear(&installed);
        if !diff.is_empty() {
            self.engine.apply_diff(&diff).await?;
            log::info!("Cleared all blocking rules");
        }
        Ok(())
    }

    async fn fail_safe(&self) {
        if let Err(e) = self.clear_rules().await {
            log::error!("Clearing rules after a failed refresh was incomplete: {e}");
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    async fn set_matcher(&self, matcher: RedirectMatcher) {
        *self.matcher.write().await = Some(Arc::new(matcher));
    }

    async fn redirect_matcher(&self) -> Result<Arc<RedirectMatcher>> {
        if let Some(matcher) = self.matcher.read().await.as_ref() {
            return Ok(matcher.clone());
        }
        let mut slot = self.matcher.write().await;
        if let Some(matcher) = slot.as_ref() {
            return Ok(matcher.clone());
        }
        let rules = self.state.redirect_rules().await?;
        let matcher = Arc::new(RedirectMatcher::new(&rules));
        *slot = Some(matcher.clone());
        Ok(matcher)
    }

    /// Match a navigation and, on the first rule that resolves to a target,
    /// redirect the tab. Returns the target used.
    ///
    /// A matching rule whose fallback chain yields nothing does not stop the
    /// scan; later matching rules still get their turn.
    pub async fn handle_navigation(&self, event: &NavigationEvent) -> Result<Option<String>> {
        let Some(url) = event.target_url() else {
            return Ok(None);
        };

        let matcher = self.redirect_matcher().await?;
        for rule in matcher.matches(url) {
            log::debug!(
                "Checking redirect for tab {} ({url}) against {}",
                event.tab_id,
                rule.pattern
            );
            if let Some(target) = self.resolver.resolve(&rule.own, &rule.fallback).await {
                log::info!("Redirecting tab {} to {}...", event.tab_id, preview(&target, 100));
                self.sink.set_url(event.tab_id, &target).await?;
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Lock
    // =========================================================================

    pub async fn verify_password(&self, password: &str) -> Result<bool> {
        let lock = self.state.access_lock().await?;
        Ok(gate::verify(password, lock.digest_hex.as_deref()))
    }

    pub async fn unlock(&self, session: &mut UnlockSession, password: &str) -> Result<bool> {
        let lock = self.state.access_lock().await?;
        Ok(session.unlock(password, &lock))
    }

    async fn ensure_editable(&self, session: &UnlockSession) -> Result<()> {
        if self.config.managed_policy_url.as_ref().map_or(false, |u| !u.is_empty()) {
            return Err(AgentError::Managed);
        }
        let lock = self.state.access_lock().await?;
        if !session.may_edit(&lock) {
            return Err(AgentError::Locked);
        }
        Ok(())
    }

    /// Point the agent at a new policy. The caller triggers the refresh.
    pub async fn set_policy_url(&self, url: &str, session: &UnlockSession) -> Result<()> {
        self.ensure_editable(session).await?;
        self.state.set_policy_url(url).await?;
        log::info!("Policy URL set to {url}");
        Ok(())
    }

    /// Forget the local policy URL together with its lock.
    pub async fn remove_policy_url(&self, session: &UnlockSession) -> Result<()> {
        self.ensure_editable(session).await?;
        self.state.remove_policy_url().await?;
        self.state.remove_access_lock().await?;
        log::info!("Policy URL removed; options unlocked");
        Ok(())
    }

    pub async fn status(&self) -> Result<AgentStatus> {
        let managed = self
            .config
            .managed_policy_url
            .as_ref()
            .map_or(false, |u| !u.is_empty());
        Ok(AgentStatus {
            policy_url: self.policy_url().await?,
            managed,
            telemetry: self.state.telemetry().await?,
            lock_status: self.state.access_lock().await?.status,
            block_rules: self.state.block_rules().await?.len(),
            redirect_rules: self.state.redirect_rules().await?.len(),
        })
    }

    // =========================================================================
    // Command Loop
    // =========================================================================

    /// Serve commands until the channel closes or `Shutdown` arrives.
    ///
    /// When a policy URL is known, the first refresh completes before any
    /// command is read. On shutdown, in-flight refreshes and navigations are
    /// awaited so their overrides are not lost.
    pub async fn run(self: Arc<Self>, mut commands: mpsc::Receiver<Command>) {
        match self.policy_url().await {
            Ok(Some(_)) => report_refresh(self.refresh().await),
            Ok(None) => {}
            Err(e) => log::error!("Cannot read policy URL: {e}"),
        }

        let start = tokio::time::Instant::now() + self.config.refresh_delay();
        let mut ticker = tokio::time::interval_at(start, self.config.refresh_period());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.spawn_refresh(&mut tasks),
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        log::error!("Agent task failed: {e}");
                    }
                }
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(Command::Refresh) => self.spawn_refresh(&mut tasks),
                    Some(Command::Navigate(event)) => {
                        let this = self.clone();
                        tasks.spawn(async move {
                            if let Err(e) = this.handle_navigation(&event).await {
                                log::error!("Navigation handling failed for tab {}: {e}", event.tab_id);
                            }
                        });
                    }
                    Some(Command::VerifyPassword { password, reply }) => {
                        let valid = self.verify_password(&password).await.unwrap_or_else(|e| {
                            log::error!("Password check failed: {e}");
                            false
                        });
                        let _ = reply.send(valid);
                    }
                    Some(Command::Status { reply }) => {
                        let _ = reply.send(self.status().await);
                    }
                },
            }
        }

        if !tasks.is_empty() {
            log::info!("Waiting for {} pending tasks", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Agent task failed: {e}");
            }
        }
        log::info!("Agent stopped");
    }

    fn spawn_refresh(self: &Arc<Self>, tasks: &mut JoinSet<()>) {
        let this = self.clone();
        tasks.spawn(async move { report_refresh(this.refresh().await) });
    }
}

fn report_refresh(result: Result<RefreshOutcome>) {
    match result {
        Ok(RefreshOutcome::Applied(stats)) => log::info!(
            "Policy refreshed: {} block, {} redirect rules",
            stats.block_rules,
            stats.redirect_rules
        ),
        Ok(RefreshOutcome::NoSource) => {}
        Err(e) => log::error!("Policy refresh failed: {e}"),
    }
}
