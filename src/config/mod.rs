//! Layered harness configuration.
//!
//! Configuration is merged with `ortho_config` in precedence order (lowest to
//! highest): defaults, configuration file, environment variables prefixed with
//! `STEPKIT_`.
//!
//! The configuration file is expected at `~/.config/stepkit/config.toml` by
//! default, or `.stepkit.toml` in the working or home directory.
//!
//! # Example Configuration
//!
//! ```toml
//! layout = "wizard"          # or "in_place"
//!
//! [wait]
//! default_timeout_secs = 10
//! ajax_timeout_secs = 5
//!
//! [identity]
//! escalation_roles = ["administrator"]
//! ```

mod loader;
mod types;


pub use loader::{CONFIG_PATH_ENV_VAR, env_var_names, load_config};
pub use types::{HarnessConfig, IdentityConfig, WaitConfig};
