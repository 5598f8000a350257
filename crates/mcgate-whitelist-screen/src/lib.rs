// # Screen Console Whitelist
//
// Whitelist and console backend for a game server whose console runs inside
// a detached GNU `screen` session. Commands are typed into that console:
//
// ```text
// screen -S <session> -p 0 -X stuff "whitelist add <nickname>\r"
// screen -S <session> -p 0 -X stuff "weather rain\r"
// ```
//
// - [`ScreenWhitelist`]: `Whitelist` on top of a [`ScreenConsole`]
// - [`ScreenConsole`]: `Console`, one line per call
//
// ## Trust Level: Untrusted (external process)
//
// **Allowed Capabilities**:
// - ✅ Run the configured `screen` executable
// - ✅ Inspect `screen -ls` output to check that the console is live
//
// **Forbidden Capabilities**:
// - ❌ Touch the account store
// - ❌ Retry (the caller reports drift instead)
// - ❌ Pass anything but validated text into the console
//
// ## Limits
//
// `stuff` returns as soon as the keystrokes are queued; the game's answer
// is not read back. A zero exit status therefore means "delivered to a live
// console", not "the game accepted it". Whitelist commands are idempotent on
// the game side, so repeating them is harmless.

use async_trait::async_trait;
use mcgate_core::config::WhitelistConfig;
use mcgate_core::traits::{Console, Whitelist};
use mcgate_core::{Error, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Whitelist backed by console injection into a `screen` session
#[derive(Debug, Clone)]
pub struct ScreenWhitelist {
    console: ScreenConsole,
}

impl ScreenWhitelist {
    pub fn new(console: ScreenConsole) -> Self {
        Self { console }
    }
}

#[async_trait]
impl Whitelist for ScreenWhitelist {
    async fn add(&self, nickname: &str) -> Result<()> {
        self.console.send(&whitelist_line("add", nickname)?).await
    }

    async fn remove(&self, nickname: &str) -> Result<()> {
        self.console.send(&whitelist_line("remove", nickname)?).await
    }

    async fn reload(&self) -> Result<()> {
        self.console.send("whitelist reload").await
    }

    fn backend_name(&self) -> &'static str {
        "screen"
    }
}

/// Handle on a game console running inside a named `screen` session
#[derive(Debug, Clone)]
pub struct ScreenConsole {
    binary: String,
    session: String,
}

impl ScreenConsole {
    pub fn new(binary: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            session: session.into(),
        }
    }

    pub fn from_config(config: &WhitelistConfig) -> Self {
        Self::new(&config.screen_binary, &config.screen_session)
    }

    /// Whether the session shows up in `screen -ls`
    pub async fn is_live(&self) -> Result<bool> {
        let output = Command::new(&self.binary)
            .arg("-ls")
            .output()
            .await
            .map_err(|e| Error::control_channel(format!("failed to run {}: {e}", self.binary)))?;

        // screen -ls exits non-zero when no sessions exist at all
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(session_listed(&stdout, &self.session))
    }

    /// Type one line into the console
    ///
    /// Fails with `ControlChannelUnavailable` when the session is not running.
    pub async fn send(&self, line: &str) -> Result<()> {
        check_console_text(line)?;

        if !self.is_live().await? {
            warn!(session = %self.session, "Screen session not running");
            return Err(Error::control_channel(format!(
                "screen session '{}' is not running",
                self.session
            )));
        }

        debug!(session = %self.session, line, "Sending console command");
        let output = Command::new(&self.binary)
            .args(stuff_args(&self.session, line))
            .output()
            .await
            .map_err(|e| Error::control_channel(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::console(format!(
                "screen exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Console for ScreenConsole {
    async fn execute(&self, line: &str) -> Result<()> {
        self.send(line).await
    }

    fn backend_name(&self) -> &'static str {
        "screen"
    }
}

/// Build `whitelist <verb> <nickname>`, refusing anything that is not a bare token
fn whitelist_line(verb: &str, nickname: &str) -> Result<String> {
    if nickname.is_empty() || nickname.chars().any(|c| c.is_whitespace()) {
        return Err(Error::invalid_input(format!(
            "refusing to send nickname {nickname:?} to the console"
        )));
    }
    Ok(format!("whitelist {verb} {nickname}"))
}

fn check_console_text(line: &str) -> Result<()> {
    if line.chars().any(char::is_control) {
        return Err(Error::invalid_input("console text contains control characters"));
    }
    Ok(())
}

fn stuff_args(session: &str, line: &str) -> Vec<String> {
    vec![
        "-S".to_string(),
        session.to_string(),
        "-p".to_string(),
        "0".to_string(),
        "-X".to_string(),
        "stuff".to_string(),
        format!("{line}\r"),
    ]
}

/// Match `<pid>.<name>` entries of `screen -ls` exactly
fn session_listed(ls_output: &str, session: &str) -> bool {
    ls_output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|entry| entry.split_once('.'))
        .any(|(pid, name)| name == session && pid.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS_OUTPUT: &str = "There are screens on:\n\
        \t48211.minecraft_server\t(Detached)\n\
        \t50112.minecraft_server_old\t(Detached)\n\
        2 Sockets in /run/screen/S-mc.\n";

    #[test]
    fn finds_exact_session() {
        assert!(session_listed(LS_OUTPUT, "minecraft_server"));
        assert!(session_listed(LS_OUTPUT, "minecraft_server_old"));
        assert!(!session_listed(LS_OUTPUT, "minecraft"));
        assert!(!session_listed("No Sockets found in /run/screen/S-mc.\n", "minecraft_server"));
    }

    #[test]
    fn stuff_appends_carriage_return() {
        let args = stuff_args("minecraft_server", "whitelist add steve_1");
        assert_eq!(args[..6], ["-S", "minecraft_server", "-p", "0", "-X", "stuff"]);
        assert_eq!(args[6], "whitelist add steve_1\r");
    }

    #[test]
    fn refuses_unsafe_console_text() {
        assert!(whitelist_line("add", "steve_1").is_ok());
        assert!(matches!(
            whitelist_line("add", "steve op"),
            Err(Error::InvalidInput(_))
        ));
        assert!(whitelist_line("add", "").is_err());
        assert!(check_console_text("whitelist add x\nstop").is_err());
        assert!(check_console_text("whitelist reload").is_ok());
    }

    #[tokio::test]
    async fn missing_binary_is_control_channel_error() {
        let console = ScreenConsole::new("/nonexistent/mcgate-screen", "minecraft_server");
        let err = console.send("whitelist reload").await.unwrap_err();
        assert!(matches!(err, Error::ControlChannelUnavailable(_)));
    }

    #[tokio::test]
    async fn console_refuses_multi_line_commands_before_spawning() {
        let console = ScreenConsole::new("/nonexistent/mcgate-screen", "minecraft_server");
        let err = console.execute("say hi\nstop").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(Console::backend_name(&console), "screen");
    }
}
