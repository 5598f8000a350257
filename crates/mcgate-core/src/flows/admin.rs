//! Status, help and administrator tooling
//!
//! Paged listings, account inspection, manual per-account access repair,
//! whitelist reload, full resync, broadcast and direct messages. Manual access actions show
//! the administrator the raw failure instead of a generic message, since
//! they are repair tools.

use tracing::{info, warn};

use super::{describe, Outcome, Services, MAX_MESSAGE_CHARS};
use crate::command::{Command, Resource};
use crate::engine::GateEvent;
use crate::error::Result;
use crate::session::Session;
use crate::traits::{AccountFilter, AccountId, OutboundMessage};

pub async fn help(svc: &Services, actor: AccountId) -> Result<Outcome> {
    let mut text = String::from(
        "Commands:\n\
         /reg - apply for access to the server\n\
         /status - show your registration\n\
         /nick - change your nickname\n\
         /ip - change your IP address\n\
         /unreg - remove your registration\n\
         /cancel - abort the current step",
    );
    if svc.config.is_admin(actor) {
        text.push_str(
            "\n\nAdministration:\n\
             /pending - applications awaiting review\n\
             /players - approved players\n\
             /user <id> - inspect an account\n\
             /approve <id>, /reject <id>, /delete <id>\n\
             /nick <id>, /ip <id> - edit someone's account\n\
             /reload - reload the game whitelist\n\
             /resync - re-grant access for every approved player\n\
             /broadcast - message every approved player\n\
             /msg <id> - message one account\n\
             /server - game server console\n\
             /say, /tell <id>, /weather clear|rain|thunder\n\
             /ban <id>, /unban <id>",
        );
    }

    Ok(Outcome::reply(
        OutboundMessage::text(text)
            .with_action("Register", Command::Register)
            .with_action("My status", Command::Status),
    ))
}

pub async fn status(svc: &Services, actor: AccountId) -> Result<Outcome> {
    let reply = match svc.store.get(actor).await? {
        None => OutboundMessage::text("You are not registered.")
            .with_action("Register", Command::Register),
        Some(account) if !account.approved => OutboundMessage::text(format!(
            "Your application is awaiting review.\nNickname: {}\nIP address: {}",
            account.nickname, account.ip_address
        ))
        .with_action("Change nickname", Command::EditNickname { target: None })
        .with_action("Change IP", Command::EditIp { target: None }),
        Some(account) => OutboundMessage::text(format!(
            "You are approved.\nNickname: {}\nIP address: {}",
            account.nickname, account.ip_address
        ))
        .with_action("Change nickname", Command::EditNickname { target: None })
        .with_action("Change IP", Command::EditIp { target: None })
        .with_action("Unregister", Command::Unregister),
    };
    Ok(Outcome::reply(reply))
}

/// Accounts shown per listing page
pub const LIST_PAGE_SIZE: usize = 20;

/// Slice of a listing shown on one page
struct Page {
    number: u32,
    count: u32,
    range: std::ops::Range<usize>,
}

impl Page {
    /// Clamp `requested` into the available pages
    fn of(total: usize, requested: u32) -> Self {
        let count = u32::try_from(total.div_ceil(LIST_PAGE_SIZE).max(1)).unwrap_or(u32::MAX);
        let number = requested.clamp(1, count);
        let start = (number as usize - 1) * LIST_PAGE_SIZE;
        Self {
            number,
            count,
            range: start..total.min(start + LIST_PAGE_SIZE),
        }
    }

    fn header(&self, title: &str, total: usize) -> String {
        if self.count > 1 {
            format!("{title} ({total}), page {} of {}:", self.number, self.count)
        } else {
            format!("{title} ({total}):")
        }
    }

    fn with_navigation(&self, mut reply: OutboundMessage, to_page: impl Fn(u32) -> Command) -> OutboundMessage {
        if self.number > 1 {
            reply = reply.with_action("◀ Previous", to_page(self.number - 1));
        }
        if self.number < self.count {
            reply = reply.with_action("Next ▶", to_page(self.number + 1));
        }
        reply
    }
}

pub async fn list_pending(svc: &Services, actor: AccountId, page: u32) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let pending = svc.store.list(AccountFilter::Pending).await?;
    if pending.is_empty() {
        return Ok(Outcome::text("No pending applications."));
    }

    let page = Page::of(pending.len(), page);
    let mut reply = OutboundMessage::text(page.header("Pending applications", pending.len()));
    for account in &pending[page.range.clone()] {
        reply.text.push_str("\n• ");
        reply.text.push_str(&describe(account));
        reply = reply
            .with_action(format!("✅ {}", account.nickname), Command::Approve(account.account_id))
            .with_action(format!("❌ {}", account.nickname), Command::Reject(account.account_id));
    }
    let reply = page.with_navigation(reply, |page| Command::ListPending { page });
    Ok(Outcome::reply(reply))
}

pub async fn list_approved(svc: &Services, actor: AccountId, page: u32) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let approved = svc.store.list(AccountFilter::Approved).await?;
    if approved.is_empty() {
        return Ok(Outcome::text("No approved players yet."));
    }

    let page = Page::of(approved.len(), page);
    let mut reply = OutboundMessage::text(page.header("Approved players", approved.len()));
    for account in &approved[page.range.clone()] {
        reply.text.push_str(&format!(
            "\n• {} - {} ({})",
            account.label(),
            account.nickname,
            account.ip_address
        ));
        reply = reply.with_action(account.nickname.clone(), Command::Inspect(account.account_id));
    }
    let reply = page.with_navigation(reply, |page| Command::ListApproved { page });
    Ok(Outcome::reply(reply))
}

pub async fn inspect(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;

    let mut reply = OutboundMessage::text(describe(&account));
    if !account.approved {
        reply = reply
            .with_action("Approve", Command::Approve(target))
            .with_action("Reject", Command::Reject(target));
    }
    reply = reply
        .with_action("Edit nickname", Command::EditNickname { target: Some(target) })
        .with_action("Edit IP", Command::EditIp { target: Some(target) })
        .with_action(
            "Whitelist add",
            Command::Grant { target, resource: Resource::Whitelist },
        )
        .with_action(
            "Whitelist remove",
            Command::Revoke { target, resource: Resource::Whitelist },
        )
        .with_action(
            "Firewall add",
            Command::Grant { target, resource: Resource::Firewall },
        )
        .with_action(
            "Firewall remove",
            Command::Revoke { target, resource: Resource::Firewall },
        )
        .with_action("Message", Command::Message(target))
        .with_action("In-game tell", Command::Tell(target))
        .with_action("Ban", Command::Ban(target))
        .with_action("Unban", Command::Unban(target))
        .with_action("Delete", Command::Delete(target));
    Ok(Outcome::reply(reply))
}

/// Manually add one resource for an account
pub async fn grant(svc: &Services, actor: AccountId, target: AccountId, resource: Resource) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;

    let (subject, result) = match resource {
        Resource::Whitelist => (&account.nickname, svc.access.whitelist_add(&account.nickname).await),
        Resource::Firewall => (&account.ip_address, svc.access.firewall_add(&account.ip_address).await),
    };

    Ok(match result {
        Ok(()) => {
            info!(admin = actor, account_id = target, resource = %resource, "Manual grant applied");
            Outcome::text(format!("Added {subject} to the {resource}."))
        }
        Err(e) => {
            warn!(admin = actor, account_id = target, resource = %resource, error = %e, "Manual grant failed");
            Outcome::text(format!("⚠️ Adding {subject} to the {resource} failed: {e}"))
                .with_event(GateEvent::AccessDrift { account_id: Some(target), failures: 1 })
        }
    })
}

/// Manually remove one resource for an account
pub async fn revoke(svc: &Services, actor: AccountId, target: AccountId, resource: Resource) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;

    let (subject, result) = match resource {
        Resource::Whitelist => (&account.nickname, svc.access.whitelist_remove(&account.nickname).await),
        Resource::Firewall => (&account.ip_address, svc.access.firewall_remove(&account.ip_address).await),
    };

    Ok(match result {
        Ok(()) => {
            info!(admin = actor, account_id = target, resource = %resource, "Manual revoke applied");
            Outcome::text(format!("Removed {subject} from the {resource}."))
        }
        Err(e) => {
            warn!(admin = actor, account_id = target, resource = %resource, error = %e, "Manual revoke failed");
            Outcome::text(format!("⚠️ Removing {subject} from the {resource} failed: {e}"))
                .with_event(GateEvent::AccessDrift { account_id: Some(target), failures: 1 })
        }
    })
}

pub async fn reload_whitelist(svc: &Services, actor: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    Ok(match svc.access.whitelist_reload().await {
        Ok(()) => Outcome::text("Whitelist reloaded."),
        Err(e) => {
            warn!(admin = actor, error = %e, "Whitelist reload failed");
            Outcome::text(format!("⚠️ Whitelist reload failed: {e}"))
                .with_event(GateEvent::AccessDrift { account_id: None, failures: 1 })
        }
    })
}

/// Re-grant every approved account and reload the whitelist
pub async fn resync(svc: &Services, actor: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let (count, report) = svc.access.resync(svc.store.as_ref()).await?;

    let mut text = format!("Resynced access for {count} approved player(s).");
    let mut outcome = Outcome::default();
    if let Some(warning) = report.warning() {
        text.push_str("\n\n");
        text.push_str(&warning);
        outcome = outcome.with_event(GateEvent::AccessDrift {
            account_id: None,
            failures: report.failures.len(),
        });
    }
    outcome.reply = OutboundMessage::text(text);
    Ok(outcome)
}

pub async fn broadcast_start(svc: &Services, actor: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    svc.sessions.begin(actor, Session::Broadcast).await;
    Ok(Outcome::reply(
        OutboundMessage::text("Enter the message to send to every approved player:")
            .with_action("Cancel", Command::Cancel),
    ))
}

pub async fn broadcast_submit(svc: &Services, actor: AccountId, text: &str) -> Result<Outcome> {
    // Membership may have changed since the session started
    if let Err(e) = svc.require_admin(actor) {
        svc.sessions.end(actor).await;
        return Err(e);
    }

    let text = text.trim();
    if let Some(reprompt) = too_long(text) {
        return Ok(reprompt);
    }
    svc.sessions.end(actor).await;
    if text.is_empty() {
        return Ok(Outcome::text("Broadcast cancelled: the message is empty."));
    }

    let recipients = svc.store.list(AccountFilter::Approved).await?;
    let message = OutboundMessage::text(format!("📢 {text}"));
    let mut delivered = 0;
    for account in &recipients {
        if svc.notify(account.account_id, &message).await {
            delivered += 1;
        }
    }

    info!(admin = actor, delivered, total = recipients.len(), "Broadcast sent");
    Ok(Outcome::text(format!(
        "Broadcast delivered to {delivered} of {} player(s).",
        recipients.len()
    )))
}

/// Start a bot message to one account
pub async fn message_start(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;
    svc.sessions.begin(actor, Session::DirectMessage { target }).await;

    Ok(Outcome::reply(
        OutboundMessage::text(format!(
            "Enter the message for {} ({}):",
            account.label(),
            account.nickname
        ))
        .with_action("Cancel", Command::Cancel),
    ))
}

pub async fn message_submit(svc: &Services, actor: AccountId, target: AccountId, text: &str) -> Result<Outcome> {
    if let Err(e) = svc.require_admin(actor) {
        svc.sessions.end(actor).await;
        return Err(e);
    }

    let text = text.trim();
    if let Some(reprompt) = too_long(text) {
        return Ok(reprompt);
    }
    svc.sessions.end(actor).await;
    if text.is_empty() {
        return Ok(Outcome::text("Message cancelled: the message is empty."));
    }

    let account = svc.load(target).await?;
    let message = OutboundMessage::text(format!("📨 Message from the administrators:\n{text}"));
    Ok(if svc.notify(target, &message).await {
        info!(admin = actor, account_id = target, "Direct message sent");
        Outcome::text(format!("Message delivered to {}.", account.label()))
    } else {
        Outcome::text(format!("⚠️ Could not deliver the message to {}.", account.label()))
    })
}

/// Re-prompt when a chat message would exceed [`MAX_MESSAGE_CHARS`]
fn too_long(text: &str) -> Option<Outcome> {
    let length = text.chars().count();
    (length > MAX_MESSAGE_CHARS).then(|| {
        Outcome::reply(
            OutboundMessage::text(format!(
                "The message is too long ({length} characters, at most {MAX_MESSAGE_CHARS}). Please shorten it:"
            ))
            .with_action("Cancel", Command::Cancel),
        )
    })
}
