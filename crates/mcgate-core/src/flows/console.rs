//! Game server console commands
//!
//! Global chat, in-game private messages, weather and bans. None of these
//! touch the account table; bans and tells address a registered account by
//! its stored nickname. Console failures are shown to the administrator
//! verbatim.

use tracing::{info, warn};

use super::{Outcome, Services};
use crate::command::{Command, Weather};
use crate::error::Result;
use crate::session::Session;
use crate::traits::{AccountId, OutboundMessage};

/// Longest free text accepted on one console line
pub const MAX_CONSOLE_TEXT_CHARS: usize = 256;

/// Console menu with the parameterless actions as buttons
pub async fn menu(svc: &Services, actor: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    Ok(Outcome::reply(
        OutboundMessage::text(
            "Server console:\n\
             /say - message the global chat\n\
             /tell <id> - private in-game message to a player\n\
             /ban <id>, /unban <id>",
        )
        .with_action("💬 Say", Command::Say)
        .with_action("☀️ Clear", Command::SetWeather(Weather::Clear))
        .with_action("🌧 Rain", Command::SetWeather(Weather::Rain))
        .with_action("⛈ Thunder", Command::SetWeather(Weather::Thunder)),
    ))
}

pub async fn say_start(svc: &Services, actor: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    svc.sessions.begin(actor, Session::ConsoleSay).await;
    Ok(Outcome::reply(
        OutboundMessage::text("Enter the message for the global chat:")
            .with_action("Cancel", Command::Cancel),
    ))
}

pub async fn say_submit(svc: &Services, actor: AccountId, text: &str) -> Result<Outcome> {
    let text = match console_text(svc, actor, text).await? {
        Ok(text) => text,
        Err(reprompt) => return Ok(reprompt),
    };
    svc.sessions.end(actor).await;

    let line = format!("say {text}");
    Ok(run(svc, actor, &line, "Message sent to the global chat.".to_string()).await)
}

pub async fn tell_start(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;
    svc.sessions.begin(actor, Session::ConsoleTell { target }).await;
    Ok(Outcome::reply(
        OutboundMessage::text(format!("Enter the in-game message for {}:", account.nickname))
            .with_action("Cancel", Command::Cancel),
    ))
}

pub async fn tell_submit(svc: &Services, actor: AccountId, target: AccountId, text: &str) -> Result<Outcome> {
    let text = match console_text(svc, actor, text).await? {
        Ok(text) => text,
        Err(reprompt) => return Ok(reprompt),
    };
    svc.sessions.end(actor).await;

    let account = svc.load(target).await?;
    let line = format!("tell {} {text}", account.nickname);
    Ok(run(svc, actor, &line, format!("Message sent to {}.", account.nickname)).await)
}

pub async fn set_weather(svc: &Services, actor: AccountId, weather: Weather) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let line = format!("weather {weather}");
    Ok(run(svc, actor, &line, format!("Weather set to {weather}.")).await)
}

pub async fn ban(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;
    let line = format!("ban {}", account.nickname);
    Ok(run(svc, actor, &line, format!("Banned {}.", account.nickname)).await)
}

pub async fn unban(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;
    let line = format!("pardon {}", account.nickname);
    Ok(run(svc, actor, &line, format!("Unbanned {}.", account.nickname)).await)
}

/// Check a submitted console text
///
/// The outer error ends the session (permission lost). The inner `Err` is
/// a re-prompt that keeps the session; an empty text ends it with a
/// cancellation reply.
async fn console_text<'a>(
    svc: &Services,
    actor: AccountId,
    text: &'a str,
) -> Result<std::result::Result<&'a str, Outcome>> {
    if let Err(e) = svc.require_admin(actor) {
        svc.sessions.end(actor).await;
        return Err(e);
    }

    let text = text.trim();
    if text.is_empty() {
        svc.sessions.end(actor).await;
        return Ok(Err(Outcome::text("Cancelled: the message is empty.")));
    }
    if text.chars().any(char::is_control) || text.chars().count() > MAX_CONSOLE_TEXT_CHARS {
        return Ok(Err(Outcome::reply(
            OutboundMessage::text(format!(
                "The message must be a single line of at most {MAX_CONSOLE_TEXT_CHARS} characters. Please try again:"
            ))
            .with_action("Cancel", Command::Cancel),
        )));
    }
    Ok(Ok(text))
}

/// Deliver one console line and describe the result
async fn run(svc: &Services, actor: AccountId, line: &str, done: String) -> Outcome {
    match svc.console.execute(line).await {
        Ok(()) => {
            info!(admin = actor, console = svc.console.backend_name(), line, "Console command sent");
            Outcome::text(done)
        }
        Err(e) => {
            warn!(admin = actor, console = svc.console.backend_name(), line, error = %e, "Console command failed");
            Outcome::text(format!("⚠️ Console command failed: {e}"))
        }
    }
}
