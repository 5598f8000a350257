//! Closed set of conversational commands
//!
//! Transports decode button payloads and slash commands into [`Command`] at
//! the boundary; the core matches on it exhaustively and never parses strings.
//!
//! ## Payload format
//!
//! Colon-separated, at most three fields, always under the 64-byte limit
//! most chat platforms put on button payloads:
//!
//! ```text
//! approve:42        reject:42        delete:42        inspect:42
//! edit_nick         edit_nick:42     edit_ip          edit_ip:42
//! grant:wl:42       grant:fw:42      revoke:wl:42     revoke:fw:42
//! pending           pending:2        players          players:3
//! tell:42           msg:42           ban:42           unban:42
//! weather:rain
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::traits::AccountId;

/// External access store targeted by a manual grant/revoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Whitelist,
    Firewall,
}

impl Resource {
    fn tag(&self) -> &'static str {
        match self {
            Resource::Whitelist => "wl",
            Resource::Firewall => "fw",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "wl" => Some(Resource::Whitelist),
            "fw" => Some(Resource::Firewall),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Whitelist => f.write_str("whitelist"),
            Resource::Firewall => f.write_str("firewall"),
        }
    }
}

/// Weather accepted by the console `weather` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weather {
    Clear,
    Rain,
    Thunder,
}

impl Weather {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Rain => "rain",
            Weather::Thunder => "thunder",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "clear" => Some(Weather::Clear),
            "rain" => Some(Weather::Rain),
            "thunder" => Some(Weather::Thunder),
            _ => None,
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action a user or administrator can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Help,
    Status,
    Cancel,

    // Registration
    Register,
    ConfirmRegistration,
    DeclineRegistration,

    // Edits; `target` is set when an administrator edits on someone's behalf
    EditNickname { target: Option<AccountId> },
    EditIp { target: Option<AccountId> },

    // Self-service unregistration
    Unregister,
    ConfirmUnregister,
    CancelUnregister,

    // Administration
    Approve(AccountId),
    Reject(AccountId),
    Delete(AccountId),
    Inspect(AccountId),
    Grant { target: AccountId, resource: Resource },
    Revoke { target: AccountId, resource: Resource },
    // Listings are paged, starting at 1
    ListPending { page: u32 },
    ListApproved { page: u32 },
    ReloadWhitelist,
    Resync,
    Broadcast,
    /// Chat message to one account through the bot
    Message(AccountId),

    // Game server console
    ServerMenu,
    Say,
    Tell(AccountId),
    SetWeather(Weather),
    Ban(AccountId),
    Unban(AccountId),
}

impl Command {
    /// Whether only administrators may issue this command
    ///
    /// An edit with a target is an administrator edit on someone else's row.
    pub fn is_admin_only(&self) -> bool {
        match self {
            Command::EditNickname { target } | Command::EditIp { target } => target.is_some(),
            Command::Approve(_)
            | Command::Reject(_)
            | Command::Delete(_)
            | Command::Inspect(_)
            | Command::Grant { .. }
            | Command::Revoke { .. }
            | Command::ListPending { .. }
            | Command::ListApproved { .. }
            | Command::ReloadWhitelist
            | Command::Resync
            | Command::Broadcast
            | Command::Message(_)
            | Command::ServerMenu
            | Command::Say
            | Command::Tell(_)
            | Command::SetWeather(_)
            | Command::Ban(_)
            | Command::Unban(_) => true,
            Command::Help
            | Command::Status
            | Command::Cancel
            | Command::Register
            | Command::ConfirmRegistration
            | Command::DeclineRegistration
            | Command::Unregister
            | Command::ConfirmUnregister
            | Command::CancelUnregister => false,
        }
    }

    /// Encode into a button payload
    pub fn encode(&self) -> String {
        match self {
            Command::Help => "help".into(),
            Command::Status => "status".into(),
            Command::Cancel => "cancel".into(),
            Command::Register => "register".into(),
            Command::ConfirmRegistration => "reg_confirm".into(),
            Command::DeclineRegistration => "reg_decline".into(),
            Command::EditNickname { target: None } => "edit_nick".into(),
            Command::EditNickname { target: Some(id) } => format!("edit_nick:{id}"),
            Command::EditIp { target: None } => "edit_ip".into(),
            Command::EditIp { target: Some(id) } => format!("edit_ip:{id}"),
            Command::Unregister => "unreg".into(),
            Command::ConfirmUnregister => "unreg_confirm".into(),
            Command::CancelUnregister => "unreg_cancel".into(),
            Command::Approve(id) => format!("approve:{id}"),
            Command::Reject(id) => format!("reject:{id}"),
            Command::Delete(id) => format!("delete:{id}"),
            Command::Inspect(id) => format!("inspect:{id}"),
            Command::Grant { target, resource } => format!("grant:{}:{target}", resource.tag()),
            Command::Revoke { target, resource } => format!("revoke:{}:{target}", resource.tag()),
            Command::ListPending { page: 1 } => "pending".into(),
            Command::ListPending { page } => format!("pending:{page}"),
            Command::ListApproved { page: 1 } => "players".into(),
            Command::ListApproved { page } => format!("players:{page}"),
            Command::ReloadWhitelist => "reload".into(),
            Command::Resync => "resync".into(),
            Command::Broadcast => "broadcast".into(),
            Command::Message(id) => format!("msg:{id}"),
            Command::ServerMenu => "server".into(),
            Command::Say => "say".into(),
            Command::Tell(id) => format!("tell:{id}"),
            Command::SetWeather(weather) => format!("weather:{weather}"),
            Command::Ban(id) => format!("ban:{id}"),
            Command::Unban(id) => format!("unban:{id}"),
        }
    }

    /// Decode a button payload
    ///
    /// Unknown verbs, missing or extra fields and non-numeric ids are all
    /// rejected with `Error::InvalidInput`.
    pub fn decode(payload: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("unknown command payload: {payload:?}"));
        let parse_id = |raw: &str| raw.parse::<AccountId>().map_err(|_| invalid());
        let page = |raw: &str| parse_page(raw).ok_or_else(invalid);

        let fields: Vec<&str> = payload.split(':').collect();
        let command = match fields.as_slice() {
            ["help"] => Command::Help,
            ["status"] => Command::Status,
            ["cancel"] => Command::Cancel,
            ["register"] => Command::Register,
            ["reg_confirm"] => Command::ConfirmRegistration,
            ["reg_decline"] => Command::DeclineRegistration,
            ["edit_nick"] => Command::EditNickname { target: None },
            ["edit_nick", id] => Command::EditNickname {
                target: Some(parse_id(id)?),
            },
            ["edit_ip"] => Command::EditIp { target: None },
            ["edit_ip", id] => Command::EditIp {
                target: Some(parse_id(id)?),
            },
            ["unreg"] => Command::Unregister,
            ["unreg_confirm"] => Command::ConfirmUnregister,
            ["unreg_cancel"] => Command::CancelUnregister,
            ["approve", id] => Command::Approve(parse_id(id)?),
            ["reject", id] => Command::Reject(parse_id(id)?),
            ["delete", id] => Command::Delete(parse_id(id)?),
            ["inspect", id] => Command::Inspect(parse_id(id)?),
            ["grant", tag, id] => Command::Grant {
                target: parse_id(id)?,
                resource: Resource::from_tag(tag).ok_or_else(invalid)?,
            },
            ["revoke", tag, id] => Command::Revoke {
                target: parse_id(id)?,
                resource: Resource::from_tag(tag).ok_or_else(invalid)?,
            },
            ["pending"] => Command::ListPending { page: 1 },
            ["pending", raw_page] => Command::ListPending {
                page: page(raw_page)?,
            },
            ["players"] => Command::ListApproved { page: 1 },
            ["players", raw_page] => Command::ListApproved {
                page: page(raw_page)?,
            },
            ["reload"] => Command::ReloadWhitelist,
            ["resync"] => Command::Resync,
            ["broadcast"] => Command::Broadcast,
            ["msg", id] => Command::Message(parse_id(id)?),
            ["server"] => Command::ServerMenu,
            ["say"] => Command::Say,
            ["tell", id] => Command::Tell(parse_id(id)?),
            ["weather", weather] => {
                Command::SetWeather(Weather::parse(weather).ok_or_else(invalid)?)
            }
            ["ban", id] => Command::Ban(parse_id(id)?),
            ["unban", id] => Command::Unban(parse_id(id)?),
            _ => return Err(invalid()),
        };

        Ok(command)
    }

    /// Decode a slash command typed into the chat
    ///
    /// Accepts an optional `@botname` suffix on the verb. Commands that take
    /// an account id expect it as the first argument (`/approve 42`);
    /// listings take an optional page (`/pending 2`).
    pub fn from_slash(text: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("unknown slash command: {text:?}"));

        let mut words = text.split_whitespace();
        let verb = words
            .next()
            .and_then(|word| word.strip_prefix('/'))
            .ok_or_else(invalid)?;
        let verb = verb.split('@').next().unwrap_or(verb);
        let arg = words.next();

        let id = || -> Result<AccountId> {
            arg.and_then(|raw| raw.parse().ok()).ok_or_else(invalid)
        };
        let page = || -> Result<u32> {
            match arg {
                None => Ok(1),
                Some(raw) => parse_page(raw).ok_or_else(invalid),
            }
        };

        let command = match verb {
            "start" | "help" | "menu" => Command::Help,
            "status" | "profile" => Command::Status,
            "cancel" => Command::Cancel,
            "reg" | "register" => Command::Register,
            "unreg" | "unregister" => Command::Unregister,
            "nick" => match arg {
                Some(_) => Command::EditNickname { target: Some(id()?) },
                None => Command::EditNickname { target: None },
            },
            "ip" => match arg {
                Some(_) => Command::EditIp { target: Some(id()?) },
                None => Command::EditIp { target: None },
            },
            "approve" => Command::Approve(id()?),
            "reject" => Command::Reject(id()?),
            "delete" => Command::Delete(id()?),
            "user" | "inspect" => Command::Inspect(id()?),
            "pending" => Command::ListPending { page: page()? },
            "players" | "users" => Command::ListApproved { page: page()? },
            "reload" => Command::ReloadWhitelist,
            "resync" => Command::Resync,
            "broadcast" => Command::Broadcast,
            "msg" | "message" => Command::Message(id()?),
            "server" => Command::ServerMenu,
            "say" => Command::Say,
            "tell" => Command::Tell(id()?),
            "weather" => Command::SetWeather(arg.and_then(Weather::parse).ok_or_else(invalid)?),
            "ban" => Command::Ban(id()?),
            "unban" | "pardon" => Command::Unban(id()?),
            _ => return Err(invalid()),
        };

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_page(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|page| *page >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterized_payloads_decode() {
        assert_eq!(Command::decode("approve:42").unwrap(), Command::Approve(42));
        assert_eq!(
            Command::decode("revoke:fw:7").unwrap(),
            Command::Revoke {
                target: 7,
                resource: Resource::Firewall
            }
        );
        assert_eq!(
            Command::decode("edit_ip").unwrap(),
            Command::EditIp { target: None }
        );
    }

    #[test]
    fn encoded_payloads_decode_to_the_same_command() {
        let commands = [
            Command::EditNickname { target: Some(42) },
            Command::Grant {
                target: 42,
                resource: Resource::Whitelist,
            },
            Command::ConfirmUnregister,
            Command::ListApproved { page: 1 },
            Command::ListPending { page: 3 },
            Command::SetWeather(Weather::Thunder),
            Command::Tell(42),
        ];
        for command in commands {
            assert_eq!(Command::decode(&command.encode()).unwrap(), command);
        }
    }

    #[test]
    fn unknown_payloads_are_rejected() {
        for payload in [
            "",
            "approve",
            "approve:abc",
            "approve:1:2",
            "grant:dns:1",
            "shutdown",
            "pending:0",
            "weather:snow",
        ] {
            assert!(Command::decode(payload).is_err(), "{payload:?} should not decode");
        }
    }

    #[test]
    fn slash_commands_accept_bot_suffix_and_arguments() {
        assert_eq!(Command::from_slash("/start").unwrap(), Command::Help);
        assert_eq!(Command::from_slash("/reg@mcgate_bot").unwrap(), Command::Register);
        assert_eq!(Command::from_slash("/approve 42").unwrap(), Command::Approve(42));
        assert_eq!(
            Command::from_slash("/nick 42").unwrap(),
            Command::EditNickname { target: Some(42) }
        );
        assert!(Command::from_slash("/approve").is_err());
        assert!(Command::from_slash("steve").is_err());
    }

    #[test]
    fn slash_console_commands_and_pages() {
        assert_eq!(
            Command::from_slash("/weather Rain").unwrap(),
            Command::SetWeather(Weather::Rain)
        );
        assert!(Command::from_slash("/weather snow").is_err());
        assert!(Command::from_slash("/weather").is_err());
        assert_eq!(Command::from_slash("/pardon 42").unwrap(), Command::Unban(42));
        assert_eq!(
            Command::from_slash("/pending").unwrap(),
            Command::ListPending { page: 1 }
        );
        assert_eq!(
            Command::from_slash("/players 2").unwrap(),
            Command::ListApproved { page: 2 }
        );
        assert!(Command::from_slash("/players 0").is_err());
        assert_eq!(Command::ListPending { page: 1 }.encode(), "pending");
    }

    #[test]
    fn admin_only_commands() {
        assert!(Command::Approve(1).is_admin_only());
        assert!(Command::EditIp { target: Some(1) }.is_admin_only());
        assert!(!Command::EditIp { target: None }.is_admin_only());
        assert!(!Command::Register.is_admin_only());
        assert!(Command::SetWeather(Weather::Clear).is_admin_only());
        assert!(Command::Message(42).is_admin_only());
    }
}
