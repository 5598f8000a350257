//! Registration flow
//!
//! `AwaitingNickname → AwaitingIp → AwaitingConfirmation → (row created)`
//!
//! Nothing is written before the final confirmation, so cancelling at any
//! step has no side effects to undo.

use tracing::{debug, info};

use super::{Outcome, Services};
use crate::command::Command;
use crate::engine::GateEvent;
use crate::error::{ConflictError, Error, Result};
use crate::session::{RegistrationStep, Session};
use crate::traits::{AccountId, OutboundMessage};
use crate::validate::{validate_ip, validate_nickname};

const NICKNAME_PROMPT: &str =
    "Enter your in-game nickname (3-16 characters: latin letters, digits, underscore):";
const IP_PROMPT: &str =
    "Enter the IP address you will connect from (IPv4, e.g. 203.0.113.5, or IPv6):";

fn with_cancel(text: impl Into<String>) -> OutboundMessage {
    OutboundMessage::text(text).with_action("Cancel", Command::Cancel)
}

/// Enter the flow
///
/// Any active session of the actor is superseded first; then an existing
/// row (pending or approved) fails with `AlreadyRegistered`.
pub async fn start(svc: &Services, actor: AccountId, display_name: Option<String>) -> Result<Outcome> {
    if let Some(previous) = svc.sessions.end(actor).await {
        debug!(actor, superseded = previous.kind(), "Session superseded by registration");
    }

    if let Some(account) = svc.store.get(actor).await? {
        return Err(ConflictError::AlreadyRegistered {
            approved: account.approved,
        }
        .into());
    }

    svc.sessions
        .begin(
            actor,
            Session::Registration(RegistrationStep::AwaitingNickname { display_name }),
        )
        .await;

    Ok(Outcome::reply(with_cancel(NICKNAME_PROMPT)))
}

/// Handle free text while registering
pub async fn submit_text(
    svc: &Services,
    actor: AccountId,
    step: RegistrationStep,
    text: &str,
) -> Result<Outcome> {
    match step {
        RegistrationStep::AwaitingNickname { display_name } => {
            let nickname = validate_nickname(svc.store.as_ref(), text).await?;
            let reply = with_cancel(format!("Nickname {nickname} accepted.\n{IP_PROMPT}"));
            svc.sessions
                .replace(
                    actor,
                    Session::Registration(RegistrationStep::AwaitingIp {
                        display_name,
                        nickname,
                    }),
                )
                .await;
            Ok(Outcome::reply(reply))
        }

        RegistrationStep::AwaitingIp {
            display_name,
            nickname,
        } => {
            let ip_address = validate_ip(svc.store.as_ref(), text).await?;
            let reply = OutboundMessage::text(format!(
                "Please check your details:\nNickname: {nickname}\nIP address: {ip_address}\n\nSubmit the application?"
            ))
            .with_action("Confirm", Command::ConfirmRegistration)
            .with_action("Cancel", Command::DeclineRegistration);
            svc.sessions
                .replace(
                    actor,
                    Session::Registration(RegistrationStep::AwaitingConfirmation {
                        display_name,
                        nickname,
                        ip_address,
                    }),
                )
                .await;
            Ok(Outcome::reply(reply))
        }

        // Text where a button press was expected interrupts the flow
        RegistrationStep::AwaitingConfirmation { .. } => {
            svc.sessions.end(actor).await;
            Ok(Outcome::text(
                "Registration cancelled. Use /reg to start again.",
            ))
        }
    }
}

/// Confirm the collected details and create the pending row
pub async fn confirm(svc: &Services, actor: AccountId) -> Result<Outcome> {
    let Some(Session::Registration(RegistrationStep::AwaitingConfirmation {
        display_name,
        nickname,
        ip_address,
    })) = svc.sessions.get(actor).await
    else {
        return Err(Error::SessionExpired);
    };

    // Entry check again: another path may have created the row meanwhile
    if let Some(account) = svc.store.get(actor).await? {
        svc.sessions.end(actor).await;
        return Err(ConflictError::AlreadyRegistered {
            approved: account.approved,
        }
        .into());
    }

    let created = svc
        .store
        .create(actor, display_name.as_deref(), &nickname, &ip_address)
        .await;

    let account = match created {
        Ok(account) => account,
        Err(Error::Conflict(conflict @ ConflictError::NicknameTaken(_))) => {
            // Lost a race for the nickname: ask for another one
            svc.sessions
                .replace(
                    actor,
                    Session::Registration(RegistrationStep::AwaitingNickname { display_name }),
                )
                .await;
            return Err(conflict.into());
        }
        Err(Error::Conflict(conflict @ ConflictError::IpTaken(_))) => {
            svc.sessions
                .replace(
                    actor,
                    Session::Registration(RegistrationStep::AwaitingIp {
                        display_name,
                        nickname,
                    }),
                )
                .await;
            return Err(conflict.into());
        }
        Err(e) => {
            svc.sessions.end(actor).await;
            return Err(e);
        }
    };

    svc.sessions.end(actor).await;
    info!(
        account_id = actor,
        nickname = %account.nickname,
        ip = %account.ip_address,
        "Registration submitted"
    );

    let notice = OutboundMessage::text(format!(
        "📝 New application\n{}",
        super::describe(&account)
    ))
    .with_action("Approve", Command::Approve(actor))
    .with_action("Reject", Command::Reject(actor));
    svc.notify_admins(&notice).await;

    Ok(Outcome::text(
        "Your application has been submitted. You will be notified once an administrator reviews it.",
    )
    .with_event(GateEvent::RegistrationSubmitted { account_id: actor }))
}

/// Decline at the confirmation step
pub async fn decline(svc: &Services, actor: AccountId) -> Result<Outcome> {
    match svc.sessions.get(actor).await {
        Some(Session::Registration(_)) => {
            svc.sessions.end(actor).await;
            Ok(Outcome::text(
                "Registration cancelled. Use /reg to start again.",
            ))
        }
        _ => Err(Error::SessionExpired),
    }
}
