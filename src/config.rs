//! Connection and run configuration.
//!
//! [`VaultConfig`] is the explicit value handed to
//! [`VaultSession::login`](crate::api::VaultSession::login). It is usually
//! built from a `key = value` file ([`FileConfig`]) with secrets optionally
//! supplied through `VAULTFETCH_API_KEY` / `VAULTFETCH_API_SECRET`.
//!
//! ```text
//! # ~/.config/vaultfetch/config.toml
//! base_url = "https://vault.example.com"
//! customer_alias = "FLDCF"
//! database_alias = "SAMH"
//! api_key = "..."
//! api_secret = "..."
//! oauth_token_endpoint = "https://vault.example.com/oauth/token"
//! output_dir = "/srv/mirror"
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

/// Default API version segment (`/api/v1/...`).
pub const DEFAULT_API_VERSION: &str = "1";

/// Default OAuth scope requested for the session.
pub const DEFAULT_SCOPE: &str = "vault";

/// Remote folder under which provider folders live.
pub const DEFAULT_FOLDER_ROOT: &str = "/Provider Licensing/Providers";

/// Default search page size.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Environment variable overriding `api_key`.
pub const API_KEY_ENV: &str = "VAULTFETCH_API_KEY";

/// Environment variable overriding `api_secret`.
pub const API_SECRET_ENV: &str = "VAULTFETCH_API_SECRET";

/// Everything needed to open an authenticated session.
#[derive(Clone)]
pub struct VaultConfig {
    /// Vault host, e.g. `https://vault.example.com`.
    pub base_url: String,
    /// Customer (tenant) alias.
    pub customer_alias: String,
    /// Database alias within the customer.
    pub database_alias: String,
    /// OAuth client id.
    pub api_key: String,
    /// OAuth client secret.
    pub api_secret: String,
    /// API version segment.
    pub api_version: String,
    /// OAuth scope.
    pub scope: String,
    /// OAuth token endpoint URL.
    pub oauth_token_endpoint: String,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
    /// Number of documents requested per search page.
    pub page_size: u32,
}

impl VaultConfig {
    /// Builds a config with default version, scope, timeouts and page size.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        customer_alias: impl Into<String>,
        database_alias: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        oauth_token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            customer_alias: customer_alias.into(),
            database_alias: database_alias.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            oauth_token_endpoint: oauth_token_endpoint.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("base_url", &self.base_url)
            .field("customer_alias", &self.customer_alias)
            .field("database_alias", &self.database_alias)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("scope", &self.scope)
            .field("oauth_token_endpoint", &self.oauth_token_endpoint)
            .finish_non_exhaustive()
    }
}

/// File-backed configuration. Every field is optional; required connection
/// keys are checked by [`FileConfig::vault_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Vault server URL, e.g. `https://vault.example.com`.
    pub base_url: Option<String>,
    /// Customer alias (first path segment after the API version).
    pub customer_alias: Option<String>,
    /// Database alias (second path segment after the API version).
    pub database_alias: Option<String>,
    /// OAuth client id; overridden by `VAULTFETCH_API_KEY`.
    pub api_key: Option<String>,
    /// OAuth client secret; overridden by `VAULTFETCH_API_SECRET`.
    pub api_secret: Option<String>,
    /// API version number (default `1`).
    pub api_version: Option<String>,
    /// OAuth scope (default `vault`).
    pub scope: Option<String>,
    /// Token endpoint for the client-credentials exchange.
    pub oauth_token_endpoint: Option<String>,
    /// Local root that mirrors the remote folder tree.
    pub output_dir: Option<PathBuf>,
    /// Remote folder containing provider folders.
    pub folder_root: Option<String>,
    /// Path-length limit for the materializer.
    pub max_path_len: Option<usize>,
    /// Documents requested per search page.
    pub page_size: Option<u32>,
    /// Retries after the first attempt for transient API failures.
    pub max_retries: Option<u32>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds, including body streaming.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_path_len) = self.max_path_len
            && !(20..=4096).contains(&max_path_len)
        {
            bail!("Invalid config value for `max_path_len`: {max_path_len}. Expected range: 20..=4096");
        }
        if let Some(page_size) = self.page_size
            && !(1..=5000).contains(&page_size)
        {
            bail!("Invalid config value for `page_size`: {page_size}. Expected range: 1..=5000");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(folder_root) = &self.folder_root
            && !folder_root.starts_with('/')
        {
            bail!("Invalid config value for `folder_root`: '{folder_root}' must start with '/'");
        }
        Ok(())
    }

    /// Fills `api_key` / `api_secret` from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = env_var_non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(secret) = env_var_non_empty(API_SECRET_ENV) {
            self.api_secret = Some(secret);
        }
    }

    /// Builds the session configuration, failing on the first missing key.
    pub fn vault_config(&self) -> Result<VaultConfig> {
        let mut config = VaultConfig::new(
            required(self.base_url.as_ref(), "base_url")?,
            required(self.customer_alias.as_ref(), "customer_alias")?,
            required(self.database_alias.as_ref(), "database_alias")?,
            required(self.api_key.as_ref(), "api_key")?,
            required(self.api_secret.as_ref(), "api_secret")?,
            required(self.oauth_token_endpoint.as_ref(), "oauth_token_endpoint")?,
        );
        if let Some(api_version) = &self.api_version {
            config.api_version.clone_from(api_version);
        }
        if let Some(scope) = &self.scope {
            config.scope.clone_from(scope);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout_secs = secs;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        Ok(config)
    }
}

fn required(value: Option<&String>, key: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("Missing required config value `{key}`"))
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/vaultfetch/config.toml`
/// 2. `$HOME/.config/vaultfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("vaultfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("vaultfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loads config from `explicit` if given, else from the default path.
///
/// A missing default file yields an empty [`FileConfig`]; a missing explicit
/// file is an error. Environment overrides are applied in both cases.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let mut config = match explicit {
        Some(path) => load_file_config(path)?,
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => load_file_config(&path)?,
            _ => FileConfig::default(),
        },
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Reads and parses a config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses `key = value` lines. Strings are double-quoted, numbers bare,
/// `#` starts a comment outside quotes.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() || line.starts_with('[') {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let string_value = || {
            parse_string_literal(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };
        let integer_value = || {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };

        match key {
            "base_url" => cfg.base_url = Some(string_value()?),
            "customer_alias" => cfg.customer_alias = Some(string_value()?),
            "database_alias" => cfg.database_alias = Some(string_value()?),
            "api_key" => cfg.api_key = Some(string_value()?),
            "api_secret" => cfg.api_secret = Some(string_value()?),
            "api_version" => cfg.api_version = Some(string_value()?),
            "scope" => cfg.scope = Some(string_value()?),
            "oauth_token_endpoint" => cfg.oauth_token_endpoint = Some(string_value()?),
            "output_dir" => cfg.output_dir = Some(PathBuf::from(string_value()?)),
            "folder_root" => cfg.folder_root = Some(string_value()?),
            "max_path_len" => {
                let parsed = integer_value()?;
                cfg.max_path_len = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow!("max_path_len out of range on line {line_no}"))?,
                );
            }
            "page_size" => {
                let parsed = integer_value()?;
                cfg.page_size = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow!("page_size out of range on line {line_no}"))?,
                );
            }
            "max_retries" => {
                let parsed = integer_value()?;
                cfg.max_retries = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow!("max_retries out of range on line {line_no}"))?,
                );
            }
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(integer_value()?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(integer_value()?),
            _ => bail!("Unknown config key `{key}` on line {line_no}"),
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(value: &str) -> Result<String> {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        bail!("expected a double-quoted string");
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => bail!("unsupported escape sequence '\\{other}'"),
            None => bail!("dangling escape at end of string"),
        }
    }
    Ok(out)
}

fn parse_integer_u64(value: &str) -> Result<u64> {
    value
        .replace('_', "")
        .parse::<u64>()
        .map_err(|_| anyhow!("expected a non-negative integer, got '{value}'"))
}
