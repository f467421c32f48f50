use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use registry_http::RegistryConfig;
use source_kafka::{CertsConfig, KafkaConfig};
use tailcat_engine::{Mode, SessionOptions};

use super::error::TailcatError;

// ═══════════════════════════════════════════════════════════════
//  Config file (JSON, or TOML by extension)
// ═══════════════════════════════════════════════════════════════

fn default_log_level() -> String {
    "info".into()
}

fn default_idle_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub broker: String,
    #[serde(default)]
    pub schema_registry: RegistryConfig,
    #[serde(default)]
    pub certs: CertsConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Config {
    pub fn kafka(&self) -> KafkaConfig {
        KafkaConfig::new(&self.broker, self.certs.clone())
    }
}

/// Read, substitute `${VAR}` references, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config, TailcatError> {
    let shown = path.display();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| TailcatError::Config(format!("cannot read config {shown}: {e}")))?;
    let content = substitute_env(&raw, |name| std::env::var(name).ok());

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let mut config: Config = if is_toml {
        toml::from_str(&content).map_err(|e| TailcatError::Config(format!("bad config {shown}: {e}")))?
    } else {
        serde_json::from_str(&content).map_err(|e| TailcatError::Config(format!("bad config {shown}: {e}")))?
    };

    if config.broker.trim().is_empty() {
        return Err(TailcatError::Config(format!("bad config {shown}: broker is required")));
    }
    if config.log_level.is_empty() {
        config.log_level = default_log_level();
    }
    if config.idle_timeout_secs == 0 {
        return Err(TailcatError::Config(format!("bad config {shown}: idleTimeoutSecs must be at least 1")));
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    if let Some(dir) = absolute.parent() {
        config.certs.resolve_relative_to(dir);
    }
    Ok(config)
}

/// Replace every `${NAME}` with `lookup(NAME)`, or nothing when unset.
/// `${}` and an unterminated `${` are left as written.
pub fn substitute_env(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&lookup(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Expand a leading `~` to `home`.
pub fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => {
            let mut expanded = home.as_os_str().to_os_string();
            expanded.push(rest);
            PathBuf::from(expanded)
        }
        _ => PathBuf::from(path),
    }
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

/// Where the config comes from. Shared by every command.
#[derive(Args, Clone, Debug)]
pub struct ConnectArgs {
    /// Path to the config file (JSON, or TOML with a .toml extension)
    #[arg(short, long, global = true, env = "TAILCAT_CONFIG")]
    pub config: Option<String>,

    /// System alias: reads ~/.config/tailcat/<ALIAS>/config.json
    #[arg(short, long, alias = "systemAlias", global = true, env = "TAILCAT_SYSTEM")]
    pub system: Option<String>,
}

impl ConnectArgs {
    /// Resolved config path. A system alias wins over an explicit file.
    pub fn config_path(&self) -> Result<PathBuf, TailcatError> {
        let raw = match (&self.system, &self.config) {
            (Some(alias), _) if !alias.is_empty() => format!("~/.config/tailcat/{alias}/config.json"),
            (_, Some(file)) if !file.is_empty() => file.clone(),
            _ => {
                return Err(TailcatError::Config(
                    "you must specify a config file (--config) or system alias (--system)".into(),
                ));
            }
        };
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Ok(expand_tilde(&raw, home.as_deref()))
    }
}

#[derive(Args, Clone, Debug)]
pub struct StreamArgs {
    /// Topic to read (partition 0)
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Keep running and print new messages as they arrive
    #[arg(short, long)]
    pub follow: bool,

    /// Print only the last N messages (0 = all)
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub tail: usize,

    /// With --tail and --follow: stop after this many seconds without a message
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub idle_timeout: Option<u64>,
}

impl StreamArgs {
    pub fn topic(&self) -> Result<&str, TailcatError> {
        self.topic
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TailcatError::Config("you must specify a topic (--topic)".into()))
    }

    pub fn mode(&self) -> Mode {
        Mode::from_flags(self.follow, self.tail)
    }

    /// Command line over config file.
    pub fn session_options(&self, config: &Config) -> SessionOptions {
        SessionOptions {
            idle_timeout: Duration::from_secs(self.idle_timeout.unwrap_or(config.idle_timeout_secs)),
            ..SessionOptions::default()
        }
    }
}
