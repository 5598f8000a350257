//! Test doubles and common utilities for contract tests
//!
//! The doubles record what reached each external store and can be told to
//! fail, so tests can assert both the happy path and drift reporting.

#![allow(dead_code)]

use mcgate_core::error::{Error, Result};
use mcgate_core::store::MemoryAccountStore;
use mcgate_core::traits::{
    Account, AccountFilter, AccountId, AccountPatch, AccountStore, AllowRule, Console, Firewall,
    Inbound, Notifier, OutboundMessage, Protocol, UpdateSource, Whitelist,
};
use mcgate_core::{AccessSynchronizer, Command, Dispatcher, GateConfig, GateEvent};
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::Stream;

pub const ADMIN: AccountId = 1000;
pub const SECOND_ADMIN: AccountId = 1001;
pub const PLAYER: AccountId = 42;
pub const OTHER_PLAYER: AccountId = 43;

/// Whitelist double backed by a set, so repeated adds are idempotent
#[derive(Default)]
pub struct RecordingWhitelist {
    members: Mutex<BTreeSet<String>>,
    calls: AtomicUsize,
    reloads: AtomicUsize,
    down: AtomicBool,
}

impl RecordingWhitelist {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn members(&self) -> BTreeSet<String> {
        self.members.lock().unwrap().clone()
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.members.lock().unwrap().contains(nickname)
    }

    /// Number of add/remove calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Simulate the game process not running
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_live(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::control_channel("screen session not found"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Whitelist for RecordingWhitelist {
    async fn add(&self, nickname: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_live()?;
        self.members.lock().unwrap().insert(nickname.to_string());
        Ok(())
    }

    async fn remove(&self, nickname: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_live()?;
        self.members.lock().unwrap().remove(nickname);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.check_live()
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Firewall double backed by a rule set, with per-protocol failure injection
#[derive(Default)]
pub struct RecordingFirewall {
    rules: Mutex<BTreeSet<AllowRule>>,
    calls: AtomicUsize,
    failing: Mutex<Option<Protocol>>,
}

impl RecordingFirewall {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rules(&self) -> BTreeSet<AllowRule> {
        self.rules.lock().unwrap().clone()
    }

    /// Protocols with a rule for the given source address
    pub fn protocols_for(&self, source: &str) -> Vec<Protocol> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .filter(|rule| rule.source == source)
            .map(|rule| rule.protocol)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every call for this protocol fail
    pub fn fail_protocol(&self, protocol: Option<Protocol>) {
        *self.failing.lock().unwrap() = protocol;
    }

    fn check(&self, rule: &AllowRule) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() == Some(rule.protocol) {
            return Err(Error::firewall(format!("ufw exited with status 1 for {rule}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Firewall for RecordingFirewall {
    async fn allow(&self, rule: &AllowRule) -> Result<()> {
        self.check(rule)?;
        self.rules.lock().unwrap().insert(rule.clone());
        Ok(())
    }

    async fn delete(&self, rule: &AllowRule) -> Result<()> {
        self.check(rule)?;
        self.rules.lock().unwrap().remove(rule);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Console double that keeps every delivered line
#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
    down: AtomicBool,
}

impl RecordingConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Simulate the game process not running
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Console for RecordingConsole {
    async fn execute(&self, line: &str) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::control_channel("screen session not found"));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Account store that delegates to a memory store and can fail the next update
pub struct FaultyStore {
    inner: Arc<MemoryAccountStore>,
    next_update_error: Mutex<Option<Error>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryAccountStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            next_update_error: Mutex::new(None),
        })
    }

    /// Make the next `update` fail with this error, without writing
    pub fn fail_next_update(&self, error: Error) {
        *self.next_update_error.lock().unwrap() = Some(error);
    }
}

#[async_trait::async_trait]
impl AccountStore for FaultyStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<Account>> {
        self.inner.get(account_id).await
    }

    async fn create(
        &self,
        account_id: AccountId,
        display_name: Option<&str>,
        nickname: &str,
        ip_address: &str,
    ) -> Result<Account> {
        self.inner
            .create(account_id, display_name, nickname, ip_address)
            .await
    }

    async fn update(&self, account_id: AccountId, patch: &AccountPatch) -> Result<Account> {
        let injected = self.next_update_error.lock().unwrap().take();
        if let Some(error) = injected {
            return Err(error);
        }
        self.inner.update(account_id, patch).await
    }

    async fn delete(&self, account_id: AccountId) -> Result<bool> {
        self.inner.delete(account_id).await
    }

    async fn list(&self, filter: AccountFilter) -> Result<Vec<Account>> {
        self.inner.list(filter).await
    }

    async fn nickname_holder(&self, nickname: &str) -> Result<Option<AccountId>> {
        self.inner.nickname_holder(nickname).await
    }

    async fn ip_holder(&self, ip_address: &str) -> Result<Option<AccountId>> {
        self.inner.ip_holder(ip_address).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

/// Notifier double that keeps every delivered message
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(AccountId, OutboundMessage)>>,
    unreachable: Mutex<BTreeSet<AccountId>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Messages delivered to one account, oldest first
    pub fn sent_to(&self, to: AccountId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == to)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Last message delivered to one account
    pub fn last_to(&self, to: AccountId) -> Option<OutboundMessage> {
        self.sent_to(to).pop()
    }

    pub fn total(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Make deliveries to this account fail
    pub fn make_unreachable(&self, account: AccountId) {
        self.unreachable.lock().unwrap().insert(account);
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: AccountId, message: &OutboundMessage) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&to) {
            return Err(Error::transport("Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push((to, message.clone()));
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}

/// An UpdateSource whose updates are pushed by the test
pub struct ControlledUpdateSource {
    engine_rx: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
}

impl ControlledUpdateSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            engine_rx: Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

impl UpdateSource for ControlledUpdateSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Inbound> + Send + 'static>> {
        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// Helper to create a minimal GateConfig for testing
pub fn minimal_config() -> GateConfig {
    let mut config = GateConfig::new([ADMIN, SECOND_ADMIN]);
    config.engine.event_channel_capacity = 100;
    config
}

/// A dispatcher wired to recording doubles
///
/// The dispatcher writes through `faults`, which shares its rows with `store`.
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub store: Arc<MemoryAccountStore>,
    pub faults: Arc<FaultyStore>,
    pub whitelist: Arc<RecordingWhitelist>,
    pub firewall: Arc<RecordingFirewall>,
    pub console: Arc<RecordingConsole>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(minimal_config())
    }

    pub fn with_config(config: GateConfig) -> Self {
        let store = Arc::new(MemoryAccountStore::new());
        let faults = FaultyStore::new(store.clone());
        let whitelist = RecordingWhitelist::new();
        let firewall = RecordingFirewall::new();
        let console = RecordingConsole::new();
        let notifier = RecordingNotifier::new();

        let access = AccessSynchronizer::new(whitelist.clone(), firewall.clone(), &config.firewall);
        let dispatcher = Dispatcher::new(
            Arc::new(config),
            faults.clone(),
            access,
            notifier.clone(),
            console.clone(),
        );

        Self {
            dispatcher,
            store,
            faults,
            whitelist,
            firewall,
            console,
            notifier,
        }
    }

    pub async fn command(&self, from: AccountId, command: Command) -> Vec<GateEvent> {
        self.dispatcher.handle(Inbound::command(from, command)).await
    }

    pub async fn text(&self, from: AccountId, text: &str) -> Vec<GateEvent> {
        self.dispatcher.handle(Inbound::text(from, text)).await
    }

    /// Text of the last reply sent to an account
    pub fn last_reply(&self, to: AccountId) -> String {
        self.notifier
            .last_to(to)
            .map(|message| message.text)
            .unwrap_or_default()
    }

    /// Walk an account through registration up to a pending row
    pub async fn register(&self, from: AccountId, nickname: &str, ip: &str) {
        self.command(from, Command::Register).await;
        self.text(from, nickname).await;
        self.text(from, ip).await;
        self.command(from, Command::ConfirmRegistration).await;
    }

    /// Register and approve an account
    pub async fn register_approved(&self, from: AccountId, nickname: &str, ip: &str) {
        self.register(from, nickname, ip).await;
        self.command(ADMIN, Command::Approve(from)).await;
    }
}
