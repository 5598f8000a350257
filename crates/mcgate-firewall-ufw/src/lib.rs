// # ufw Firewall Backend
//
// Applies per-address allow-rules with `ufw`:
//
// ```text
// ufw allow from <ip> to any port <port> proto <tcp|udp>
// ufw delete allow from <ip> to any port <port> proto <tcp|udp>
// ```
//
// One call maps to one rule. The caller (AccessSynchronizer) issues the TCP
// and UDP calls and combines their failures.
//
// ## Trust Level: Untrusted (external process)
//
// **Allowed Capabilities**:
// - ✅ Run the configured `ufw` executable with argument vectors only
//
// **Forbidden Capabilities**:
// - ❌ Shell interpolation of addresses
// - ❌ Retry logic (drift is reported by the caller)
//
// ## Dry-Run Mode
//
// When `dry_run` is set, the intended command is logged and nothing runs.
//
// ## Idempotency
//
// `ufw allow` skips an existing rule and `ufw delete` of an absent rule
// prints "Could not delete non-existent rule" and exits 0 on current
// releases. Older releases exit non-zero for the latter; that message is
// treated as success too.

use async_trait::async_trait;
use mcgate_core::config::FirewallConfig;
use mcgate_core::traits::{AllowRule, Firewall};
use mcgate_core::{Error, Result};
use tokio::process::Command;
use tracing::{debug, info};

const NON_EXISTENT_RULE: &str = "non-existent rule";

/// Firewall backed by the `ufw` command line
#[derive(Debug, Clone)]
pub struct UfwFirewall {
    binary: String,
    dry_run: bool,
}

impl UfwFirewall {
    pub fn new(binary: impl Into<String>, dry_run: bool) -> Self {
        Self {
            binary: binary.into(),
            dry_run,
        }
    }

    pub fn from_config(config: &FirewallConfig) -> Self {
        Self::new(&config.ufw_binary, config.dry_run)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn run(&self, args: Vec<String>) -> Result<()> {
        if self.dry_run {
            info!(command = %format!("{} {}", self.binary, args.join(" ")), "[DRY-RUN] Would run");
            return Ok(());
        }

        debug!(args = ?args, "Running ufw");
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::firewall(format!("failed to run {}: {e}", self.binary)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() || is_absent_rule(&stdout, &stderr) {
            return Ok(());
        }

        Err(Error::firewall(format!(
            "ufw exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl Firewall for UfwFirewall {
    async fn allow(&self, rule: &AllowRule) -> Result<()> {
        self.run(rule_args(rule, false)).await
    }

    async fn delete(&self, rule: &AllowRule) -> Result<()> {
        self.run(rule_args(rule, true)).await
    }

    fn backend_name(&self) -> &'static str {
        "ufw"
    }
}

/// Argument vector for one allow-rule
pub fn rule_args(rule: &AllowRule, delete: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(10);
    if delete {
        args.push("delete".to_string());
    }
    args.extend([
        "allow".to_string(),
        "from".to_string(),
        rule.source.clone(),
        "to".to_string(),
        "any".to_string(),
        "port".to_string(),
        rule.port.to_string(),
        "proto".to_string(),
        rule.protocol.as_str().to_string(),
    ]);
    args
}

fn is_absent_rule(stdout: &str, stderr: &str) -> bool {
    stdout.contains(NON_EXISTENT_RULE) || stderr.contains(NON_EXISTENT_RULE)
}
