//! Configuration loading with layered precedence.
//!
//! Configuration is composed with `MergeComposer` in precedence order (lowest
//! to highest): application defaults, configuration file, environment
//! variables. There is no CLI layer; stepkit is hosted by a test runner that
//! owns the command line.
//!
//! # Environment Variable Handling
//!
//! Environment variables are read through [`mockable::Env`] so tests can supply
//! them without touching the process environment. Typed values fail fast:
//! `STEPKIT_WAIT_DEFAULT_TIMEOUT_SECS=soon` is an error, not a silent fallback
//! to the default. `STEPKIT_IDENTITY_ESCALATION_ROLES` is a comma-separated
//! list.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{ConfigError, Result};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "STEPKIT_CONFIG_PATH";

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
    /// Comma-separated list of strings.
    List,
}

/// Mapping from one environment variable to a config path.
struct EnvVarSpec {
    /// The environment variable name.
    env_var: &'static str,
    /// The JSON path segments.
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "STEPKIT_LAYOUT",
        path: &["layout"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "STEPKIT_WAIT_DEFAULT_TIMEOUT_SECS",
        path: &["wait", "default_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "STEPKIT_WAIT_AJAX_TIMEOUT_SECS",
        path: &["wait", "ajax_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "STEPKIT_IDENTITY_ESCALATION_ROLES",
        path: &["identity", "escalation_roles"],
        var_type: EnvVarType::List,
    },
];

/// Returns the environment variable names recognised by the config loader,
/// including `STEPKIT_CONFIG_PATH`.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    std::iter::once(CONFIG_PATH_ENV_VAR)
        .chain(ENV_VAR_SPECS.iter().map(|spec| spec.env_var))
        .collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    debug!(path = path.as_str(), "loaded configuration file");
    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Resolve which configuration file, if any, to load.
///
/// An explicit path (argument or `STEPKIT_CONFIG_PATH`) must exist. Otherwise
/// the first discovered candidate that exists is used.
fn resolve_config_path<E: mockable::Env>(
    explicit_path: Option<&Utf8Path>,
    env: &E,
) -> Result<Option<Utf8PathBuf>> {
    let requested = explicit_path.map(Utf8Path::to_path_buf).or_else(|| {
        env.string(CONFIG_PATH_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(Utf8PathBuf::from)
    });

    if let Some(path) = requested {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.into_std_path_buf(),
            }
            .into());
        }
        return Ok(Some(path));
    }

    let discovery = ConfigDiscovery::builder("stepkit")
        .config_file_name("config.toml")
        .dotfile_name(".stepkit.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok()))
}

/// Load configuration with full layer precedence.
///
/// Layers, lowest to highest:
/// 1. Application defaults defined on the types
/// 2. Configuration file (`explicit_path`, `STEPKIT_CONFIG_PATH`, or discovery)
/// 3. Environment variables prefixed with `STEPKIT_`
///
/// The merged configuration is validated before it is returned.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - an explicitly requested file does not exist
/// - a configuration file is malformed
/// - a typed environment variable has an unparseable value
/// - the merged values fail validation
pub fn load_config<E: mockable::Env>(
    explicit_path: Option<&Utf8Path>,
    env: &E,
) -> Result<HarnessConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(HarnessConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = resolve_config_path(explicit_path, env)? {
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let config =
        HarnessConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;
    Ok(config)
}

/// Collect `STEPKIT_` environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable has an unparseable
/// value.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.trim().parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: String::from(spec.env_var),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
            EnvVarType::List => Value::Array(
                raw_value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(String::from(item)))
                    .collect(),
            ),
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(String::from(segment))
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(String::from(field), value);
}
