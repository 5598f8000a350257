//! Core gate engine
//!
//! The GateEngine is responsible for:
//! - Receiving inbound chat updates via UpdateSource
//! - Routing each update to the right flow step (the [`Dispatcher`])
//! - Replying to the sender through the Notifier
//! - Flushing the account store on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ UpdateSource │─── Inbound ───┐
//! └──────────────┘               │
//!                                ▼
//!                       ┌──────────────┐
//!                       │  Dispatcher  │── session lookup ── SessionStore
//!                       └──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//! ┌──────────────┐      ┌──────────────────┐     ┌─────────────┐
//! │ AccountStore │      │AccessSynchronizer│     │   Events    │
//! │ (state)      │      │ (whitelist, fw)  │     │  (monitor)  │
//! └──────────────┘      └──────────────────┘     └─────────────┘
//! ```
//!
//! ## Scheduling
//!
//! Updates are handled one at a time, in arrival order. This keeps every
//! account's steps strictly sequential; no lock is held between steps.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::access::AccessSynchronizer;
use crate::command::Command;
use crate::config::GateConfig;
use crate::error::{Error, Field, Result};
use crate::flows::{self, Outcome, Services};
use crate::session::{Session, SessionStore};
use crate::traits::{
    AccountId, AccountStore, Console, Firewall, Inbound, Notifier, OutboundMessage, Payload,
    UpdateSource, Whitelist,
};

/// Why an account row was deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Rejected,
    Deleted,
    Unregistered,
}

/// Events emitted by the GateEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Engine started
    Started { admins: usize },

    /// Engine stopped
    Stopped { reason: String },

    /// A pending row was created
    RegistrationSubmitted { account_id: AccountId },

    /// An account was approved (access grant attempted)
    AccountApproved { account_id: AccountId },

    /// An account row was deleted
    AccountRemoved {
        account_id: AccountId,
        reason: RemovalReason,
    },

    /// A nickname or IP was changed
    AccountEdited { account_id: AccountId, field: Field },

    /// Whitelist/firewall no longer match the account table
    AccessDrift {
        account_id: Option<AccountId>,
        failures: usize,
    },

    /// A non-administrator attempted an administrator action
    PermissionDenied { actor: AccountId },
}

/// Routes inbound updates to flow steps
///
/// Usable without the engine loop, which is how the contract tests drive it.
#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
    session_timeout: Option<chrono::Duration>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<GateConfig>,
        store: Arc<dyn AccountStore>,
        access: AccessSynchronizer,
        notifier: Arc<dyn Notifier>,
        console: Arc<dyn Console>,
    ) -> Self {
        let session_timeout = session_timeout(config.engine.session_timeout_secs);
        Self {
            services: Services::new(config, store, access, notifier, console),
            session_timeout,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.services.sessions
    }

    /// Handle one update end to end: route it, reply to the sender
    ///
    /// # Returns
    ///
    /// The events produced by the step.
    pub async fn handle(&self, inbound: Inbound) -> Vec<GateEvent> {
        if let Some(timeout) = self.session_timeout {
            let expired = self.services.sessions.expire(timeout).await;
            if !expired.is_empty() {
                debug!(count = expired.len(), "Expired idle sessions");
            }
        }

        let actor = inbound.from;
        let (reply, events) = match self.process(inbound).await {
            Ok(outcome) => (outcome.reply, outcome.events),
            Err(e) => {
                let mut events = Vec::new();
                match &e {
                    Error::PermissionDenied(actor) => {
                        events.push(GateEvent::PermissionDenied { actor: *actor });
                    }
                    Error::Validation(_) | Error::Conflict(_) | Error::SessionExpired => {
                        debug!(actor, error = %e, "Step rejected");
                    }
                    Error::AccountNotFound(_) => {
                        info!(actor, error = %e, "Step rejected");
                    }
                    _ => {
                        error!(actor, error = %e, "Step failed");
                    }
                }
                (OutboundMessage::text(e.user_message()), events)
            }
        };

        self.services.notify(actor, &reply).await;
        events
    }

    /// Route an update to a flow step without replying
    pub async fn process(&self, inbound: Inbound) -> Result<Outcome> {
        let svc = &self.services;
        let actor = inbound.from;

        match inbound.payload {
            Payload::Text(text) => match svc.sessions.touch(actor).await {
                None => Ok(Outcome::text(
                    "I didn't understand that. Use /help to see what I can do.",
                )),
                Some(Session::Registration(step)) => {
                    flows::registration::submit_text(svc, actor, step, &text).await
                }
                Some(Session::EditNickname { target, by_admin }) => {
                    flows::edit::submit_nickname(svc, actor, target, by_admin, &text).await
                }
                Some(Session::EditIp { target, by_admin }) => {
                    flows::edit::submit_ip(svc, actor, target, by_admin, &text).await
                }
                Some(Session::Unregister) => Ok(Outcome::text(
                    "Please use the buttons above to confirm or cancel.",
                )),
                Some(Session::Broadcast) => flows::admin::broadcast_submit(svc, actor, &text).await,
                Some(Session::DirectMessage { target }) => {
                    flows::admin::message_submit(svc, actor, target, &text).await
                }
                Some(Session::ConsoleSay) => flows::console::say_submit(svc, actor, &text).await,
                Some(Session::ConsoleTell { target }) => {
                    flows::console::tell_submit(svc, actor, target, &text).await
                }
            },

            Payload::Command(command) => {
                self.dispatch(command, actor, inbound.display_name).await
            }
        }
    }

    async fn dispatch(
        &self,
        command: Command,
        actor: AccountId,
        display_name: Option<String>,
    ) -> Result<Outcome> {
        let svc = &self.services;
        debug!(actor, command = %command, "Dispatching command");

        // Administrator verbs; flows repeat the check for direct callers
        if command.is_admin_only() {
            svc.require_admin(actor)?;
        }

        match command {
            Command::Help => flows::admin::help(svc, actor).await,
            Command::Status => flows::admin::status(svc, actor).await,
            Command::Cancel => Ok(match svc.sessions.end(actor).await {
                Some(session) => {
                    debug!(actor, session = session.kind(), "Session cancelled");
                    Outcome::text("Cancelled.")
                }
                None => Outcome::text("Nothing to cancel."),
            }),

            Command::Register => flows::registration::start(svc, actor, display_name).await,
            Command::ConfirmRegistration => flows::registration::confirm(svc, actor).await,
            Command::DeclineRegistration => flows::registration::decline(svc, actor).await,

            Command::EditNickname { target } => flows::edit::start_nickname(svc, actor, target).await,
            Command::EditIp { target } => flows::edit::start_ip(svc, actor, target).await,

            Command::Unregister => flows::unregister::start(svc, actor).await,
            Command::ConfirmUnregister => flows::unregister::confirm(svc, actor).await,
            Command::CancelUnregister => flows::unregister::cancel(svc, actor).await,

            Command::Approve(target) => flows::approval::approve(svc, actor, target).await,
            Command::Reject(target) => flows::approval::reject(svc, actor, target).await,
            Command::Delete(target) => flows::approval::delete(svc, actor, target).await,

            Command::Inspect(target) => flows::admin::inspect(svc, actor, target).await,
            Command::Grant { target, resource } => {
                flows::admin::grant(svc, actor, target, resource).await
            }
            Command::Revoke { target, resource } => {
                flows::admin::revoke(svc, actor, target, resource).await
            }
            Command::ListPending { page } => flows::admin::list_pending(svc, actor, page).await,
            Command::ListApproved { page } => flows::admin::list_approved(svc, actor, page).await,
            Command::ReloadWhitelist => flows::admin::reload_whitelist(svc, actor).await,
            Command::Resync => flows::admin::resync(svc, actor).await,
            Command::Broadcast => flows::admin::broadcast_start(svc, actor).await,
            Command::Message(target) => flows::admin::message_start(svc, actor, target).await,

            Command::ServerMenu => flows::console::menu(svc, actor).await,
            Command::Say => flows::console::say_start(svc, actor).await,
            Command::Tell(target) => flows::console::tell_start(svc, actor, target).await,
            Command::SetWeather(weather) => flows::console::set_weather(svc, actor, weather).await,
            Command::Ban(target) => flows::console::ban(svc, actor, target).await,
            Command::Unban(target) => flows::console::unban(svc, actor, target).await,
        }
    }
}

/// Idle timeout as a chrono duration; `None` disables expiry
///
/// Validated configs stay far below the limit. A value chrono cannot
/// represent also disables expiry instead of wrapping or overflowing.
fn session_timeout(secs: u64) -> Option<chrono::Duration> {
    if secs == 0 {
        return None;
    }
    let timeout = i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds);
    if timeout.is_none() {
        warn!(secs, "Session timeout out of range, sessions will not expire");
    }
    timeout
}

/// Core gate engine
///
/// ## Lifecycle
///
/// 1. Create with [`GateEngine::new()`]
/// 2. Start with [`GateEngine::run()`]
/// 3. Engine runs until a shutdown signal or the update stream ends
/// 4. The account store is flushed before returning
///
/// ## Load Resistance
///
/// Engine events go through a bounded channel; when it is full, events are
/// dropped with a warning rather than stalling update handling.
pub struct GateEngine {
    /// Inbound updates
    source: Box<dyn UpdateSource>,

    /// Flow routing
    dispatcher: Dispatcher,

    /// Account store (flushed on shutdown)
    store: Arc<dyn AccountStore>,

    /// Administrator count, for the start event
    admins: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<GateEvent>,
}

impl GateEngine {
    /// Create a new gate engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn UpdateSource>,
        store: Arc<dyn AccountStore>,
        whitelist: Arc<dyn Whitelist>,
        firewall: Arc<dyn Firewall>,
        console: Arc<dyn Console>,
        notifier: Arc<dyn Notifier>,
        config: GateConfig,
    ) -> Result<(Self, mpsc::Receiver<GateEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let access = AccessSynchronizer::new(whitelist, firewall, &config.firewall);
        let admins = config.admins.len();
        let dispatcher = Dispatcher::new(Arc::new(config), store.clone(), access, notifier, console);

        let engine = Self {
            source,
            dispatcher,
            store,
            admins,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run the engine until SIGINT (ctrl-c) or the end of the update stream
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(GateEvent::Started {
            admins: self.admins,
        });
        info!(admins = self.admins, "Gate engine started");

        let mut updates = self.source.watch();

        let reason = if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    maybe = updates.next() => match maybe {
                        Some(inbound) => self.handle_update(inbound).await,
                        None => break "Update stream closed",
                    },

                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break "Shutdown signal";
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    maybe = updates.next() => match maybe {
                        Some(inbound) => self.handle_update(inbound).await,
                        None => break "Update stream closed",
                    },

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break "Shutdown signal";
                    }
                }
            }
        };

        self.emit_event(GateEvent::Stopped {
            reason: reason.to_string(),
        });

        self.store.flush().await?;
        info!(reason, "Account store flushed, engine stopped");

        Ok(())
    }

    async fn handle_update(&self, inbound: Inbound) {
        for event in self.dispatcher.handle(inbound).await {
            self.emit_event(event);
        }
    }

    fn emit_event(&self, event: GateEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// The daemon wires SIGTERM/SIGINT into the oneshot; tests trigger it
    /// directly. Passing `None` behaves like [`GateEngine::run`].
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}
