//! Configuration data types for stepkit.

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::blocks::LayoutVariant;
use crate::error::{ConfigError, Result};
use crate::wait::{DEFAULT_AJAX_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};

/// Condition wait budgets.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Budget, in seconds, for waits that do not name their own timeout.
    #[default(DEFAULT_TIMEOUT_SECS)]
    pub default_timeout_secs: u64,

    /// Budget, in seconds, for AJAX settling after UI actions.
    #[default(DEFAULT_AJAX_TIMEOUT_SECS)]
    pub ajax_timeout_secs: u64,
}

/// Identity escalation settings.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Roles acquired by [`Scenario::escalate`](crate::scenario::Scenario::escalate).
    #[default(_code = "vec![String::from(\"administrator\")]")]
    pub escalation_roles: Vec<String>,
}

/// Root harness configuration.
///
/// Loaded with layered precedence (lowest to highest): defaults,
/// configuration file, environment variables.
///
/// Configuration files are discovered in this order:
/// 1. An explicit path passed to [`load_config`](crate::config::load_config)
/// 2. Path specified via the `STEPKIT_CONFIG_PATH` environment variable
/// 3. `.stepkit.toml` in the current working directory
/// 4. `.stepkit.toml` in the home directory
/// 5. `~/.config/stepkit/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "STEPKIT",
    post_merge_hook,
    discovery(
        app_name = "stepkit",
        env_var = "STEPKIT_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".stepkit.toml",
    )
)]
pub struct HarnessConfig {
    /// The layout subsystem active in the environment under test.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub layout: LayoutVariant,

    /// Condition wait budgets.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub wait: WaitConfig,

    /// Identity escalation settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub identity: IdentityConfig,
}

impl HarnessConfig {
    /// Check values the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero timeout or an empty
    /// escalation role list.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("wait.default_timeout_secs", self.wait.default_timeout_secs),
            ("wait.ajax_timeout_secs", self.wait.ajax_timeout_secs),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, seconds)| *seconds == 0) {
            return Err(ConfigError::InvalidValue {
                field: String::from(*field),
                reason: String::from("must be a positive number of seconds"),
            }
            .into());
        }
        if self.identity.escalation_roles.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: String::from("identity.escalation_roles"),
                reason: String::from("at least one role is required"),
            }
            .into());
        }
        Ok(())
    }

    /// Trim escalation roles, dropping blanks and duplicates.
    ///
    /// Order is preserved so the first mention of a role wins.
    pub fn normalise_roles(&mut self) {
        let mut kept: Vec<String> = Vec::with_capacity(self.identity.escalation_roles.len());
        for role in self.identity.escalation_roles.drain(..) {
            let trimmed = role.trim();
            if !trimmed.is_empty() && !kept.iter().any(|existing| existing == trimmed) {
                kept.push(String::from(trimmed));
            }
        }
        self.identity.escalation_roles = kept;
    }
}

impl PostMergeHook for HarnessConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.normalise_roles();
        Ok(())
    }
}
