//! Bot API wire types and the pure update/keyboard mapping

use mcgate_core::traits::{Action, Inbound};
use mcgate_core::{Command, Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Buttons per keyboard row
const BUTTONS_PER_ROW: usize = 2;

/// Every Bot API response is wrapped in this
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> Envelope<T> {
    pub(crate) fn into_result(self, method: &str, status: u16) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::transport(format!(
                "{method} failed ({status}): {}",
                self.description.as_deref().unwrap_or("no description")
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub data: Option<String>,
}

/// Map a raw update to an [`Inbound`]
///
/// Only private chats are served. Slash commands are parsed with
/// [`Command::from_slash`]; an unknown one becomes `/help` so the user sees
/// what is available. Button presses must decode with [`Command::decode`],
/// otherwise they are dropped.
pub fn decode_update(update: &Update) -> Option<Inbound> {
    if let Some(callback) = &update.callback_query {
        let data = callback.data.as_deref()?;
        return match Command::decode(data) {
            Ok(command) => Some(with_handle(Inbound::command(callback.from.id, command), &callback.from)),
            Err(e) => {
                warn!(from = callback.from.id, error = %e, "Dropping undecodable button press");
                None
            }
        };
    }

    let message = update.message.as_ref()?;
    if message.chat.kind != "private" {
        debug!(chat = message.chat.id, kind = %message.chat.kind, "Ignoring non-private chat");
        return None;
    }
    let from = message.from.as_ref()?;
    let text = message.text.as_deref()?;

    let inbound = if text.trim_start().starts_with('/') {
        let command = Command::from_slash(text.trim()).unwrap_or_else(|e| {
            debug!(from = from.id, error = %e, "Unknown slash command");
            Command::Help
        });
        Inbound::command(from.id, command)
    } else {
        Inbound::text(from.id, text)
    };
    Some(with_handle(inbound, from))
}

fn with_handle(inbound: Inbound, user: &User) -> Inbound {
    match &user.username {
        Some(username) => inbound.with_display_name(username.clone()),
        None => inbound,
    }
}

/// `reply_markup` for a set of actions
pub fn inline_keyboard(actions: &[Action]) -> Value {
    let rows: Vec<Value> = actions
        .chunks(BUTTONS_PER_ROW)
        .map(|row| {
            Value::Array(
                row.iter()
                    .map(|action| {
                        json!({
                            "text": action.label,
                            "callback_data": action.command.encode(),
                        })
                    })
                    .collect(),
            )
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcgate_core::traits::{OutboundMessage, Payload};

    fn update(raw: &str) -> Update {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn private_text_and_commands() {
        let text = update(
            r#"{"update_id": 7, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
                "from": {"id": 42, "username": "steve"}, "text": "Steve_1"}}"#,
        );
        let inbound = decode_update(&text).unwrap();
        assert_eq!(inbound.from, 42);
        assert_eq!(inbound.display_name.as_deref(), Some("steve"));
        assert_eq!(inbound.payload, Payload::Text("Steve_1".into()));

        let command = update(
            r#"{"update_id": 8, "message": {"message_id": 2, "chat": {"id": 1000, "type": "private"},
                "from": {"id": 1000}, "text": "/approve@mcgate_bot 42"}}"#,
        );
        assert_eq!(
            decode_update(&command).unwrap().payload,
            Payload::Command(Command::Approve(42))
        );
    }

    #[test]
    fn unknown_slash_command_becomes_help() {
        let raw = update(
            r#"{"update_id": 9, "message": {"message_id": 3, "chat": {"id": 42, "type": "private"},
                "from": {"id": 42}, "text": "/frobnicate"}}"#,
        );
        assert_eq!(decode_update(&raw).unwrap().payload, Payload::Command(Command::Help));
    }

    #[test]
    fn group_chats_are_ignored() {
        let raw = update(
            r#"{"update_id": 10, "message": {"message_id": 4, "chat": {"id": -100, "type": "supergroup"},
                "from": {"id": 42}, "text": "/reg"}}"#,
        );
        assert!(decode_update(&raw).is_none());
    }

    #[test]
    fn button_presses_decode_or_drop() {
        let good = update(
            r#"{"update_id": 11, "callback_query": {"id": "cb1", "from": {"id": 1000}, "data": "reject:42"}}"#,
        );
        assert_eq!(
            decode_update(&good).unwrap().payload,
            Payload::Command(Command::Reject(42))
        );

        let bad = update(
            r#"{"update_id": 12, "callback_query": {"id": "cb2", "from": {"id": 1000}, "data": "approve_42"}}"#,
        );
        assert!(decode_update(&bad).is_none());
    }

    #[test]
    fn keyboard_uses_encoded_commands_two_per_row() {
        let message = OutboundMessage::text("review")
            .with_action("✅", Command::Approve(42))
            .with_action("❌", Command::Reject(42))
            .with_action("Cancel", Command::Cancel);

        let keyboard = inline_keyboard(&message.actions);
        let rows = keyboard["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "approve:42");
        assert_eq!(rows[0][1]["callback_data"], "reject:42");
        assert_eq!(rows[1][0]["text"], "Cancel");
    }

    #[test]
    fn failed_envelope_carries_description() {
        let envelope: Envelope<bool> =
            serde_json::from_str(r#"{"ok": false, "description": "Forbidden: bot was blocked by the user"}"#)
                .unwrap();
        let err = envelope.into_result("sendMessage", 403).unwrap_err();
        assert!(err.to_string().contains("bot was blocked"));
    }
}
