use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "cert-bootstrap.toml";

const DEFAULT_COMMON_NAME: &str = "localhost";
const DEFAULT_SCRATCH_DIR: &str = "certs";
const DEFAULT_OUTPUT_DIR: &str = ".";
const FALLBACK_CA_COMMON_NAME: &str = "local-dev";

/// Fully resolved bootstrapper configuration.
///
/// Resolution order: built-in defaults, then the optional `cert-bootstrap.toml`
/// overlay, then environment variables, then whatever the caller (the CLI)
/// applies on top. Unset artifact paths default to files under the scratch
/// directory.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub common_name: String,
    pub ca_common_name: String,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ca_key: PathBuf,
    pub ca_crt: PathBuf,
    pub server_key: PathBuf,
    pub server_csr: PathBuf,
    pub server_crt: PathBuf,
    pub client_key: PathBuf,
    pub client_csr: PathBuf,
    pub client_crt: PathBuf,
}

/// Partial configuration, every field optional.
///
/// Overlays stack: the TOML file fills in what it names, environment
/// variables override the file, CLI flags override both.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigOverlay {
    pub common_name: Option<String>,
    pub ca_common_name: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub ca_key: Option<PathBuf>,
    pub ca_crt: Option<PathBuf>,
    pub server_key: Option<PathBuf>,
    pub server_csr: Option<PathBuf>,
    pub server_crt: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub client_csr: Option<PathBuf>,
    pub client_crt: Option<PathBuf>,
}

impl ConfigOverlay {
    /// Parse an overlay from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&config_str).context("Failed to parse config file")
    }

    /// Load the overlay from `cert-bootstrap.toml` if it exists
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment-variable overrides on top of this overlay
    pub fn apply_env(&mut self) {
        if let Ok(cn) = env::var("COMMON_NAME") {
            self.common_name = Some(cn);
        }
        if let Ok(cn) = env::var("CA_COMMON_NAME") {
            self.ca_common_name = Some(cn);
        }
        apply_env_path(&mut self.scratch_dir, "CERTS_SCRATCH_DIR");
        apply_env_path(&mut self.output_dir, "CERTS_OUT_DIR");
        apply_env_path(&mut self.ca_key, "CA_KEY");
        apply_env_path(&mut self.ca_crt, "CA_CRT");
        apply_env_path(&mut self.server_key, "SERVER_KEY");
        apply_env_path(&mut self.server_csr, "SERVER_CSR");
        apply_env_path(&mut self.server_crt, "SERVER_CRT");
        apply_env_path(&mut self.client_key, "CLIENT_KEY");
        apply_env_path(&mut self.client_csr, "CLIENT_CSR");
        apply_env_path(&mut self.client_crt, "CLIENT_CRT");
    }

    /// Merge another overlay on top of this one; `other` wins where set
    pub fn merge(&mut self, other: ConfigOverlay) {
        merge_field(&mut self.common_name, other.common_name);
        merge_field(&mut self.ca_common_name, other.ca_common_name);
        merge_field(&mut self.scratch_dir, other.scratch_dir);
        merge_field(&mut self.output_dir, other.output_dir);
        merge_field(&mut self.ca_key, other.ca_key);
        merge_field(&mut self.ca_crt, other.ca_crt);
        merge_field(&mut self.server_key, other.server_key);
        merge_field(&mut self.server_csr, other.server_csr);
        merge_field(&mut self.server_crt, other.server_crt);
        merge_field(&mut self.client_key, other.client_key);
        merge_field(&mut self.client_csr, other.client_csr);
        merge_field(&mut self.client_crt, other.client_crt);
    }

    /// Resolve the overlay into a complete configuration
    pub fn into_config(self) -> BootstrapConfig {
        let scratch_dir = self
            .scratch_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR));
        let scratch = |name: &str| scratch_dir.join(name);

        BootstrapConfig {
            common_name: self
                .common_name
                .unwrap_or_else(|| DEFAULT_COMMON_NAME.to_string()),
            ca_common_name: self.ca_common_name.unwrap_or_else(invoking_user_name),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ca_key: self.ca_key.unwrap_or_else(|| scratch("ca.key")),
            ca_crt: self.ca_crt.unwrap_or_else(|| scratch("ca.crt")),
            server_key: self.server_key.unwrap_or_else(|| scratch("server.key")),
            server_csr: self.server_csr.unwrap_or_else(|| scratch("server.csr")),
            server_crt: self.server_crt.unwrap_or_else(|| scratch("server.crt")),
            client_key: self.client_key.unwrap_or_else(|| scratch("client.key")),
            client_csr: self.client_csr.unwrap_or_else(|| scratch("client.csr")),
            client_crt: self.client_crt.unwrap_or_else(|| scratch("client.crt")),
            scratch_dir,
        }
    }
}

impl BootstrapConfig {
    /// Resolve the configuration from file and environment
    pub fn resolve() -> Result<Self> {
        Self::resolve_with(ConfigOverlay::default())
    }

    /// Resolve the configuration, applying `overrides` last (CLI flags)
    pub fn resolve_with(overrides: ConfigOverlay) -> Result<Self> {
        let mut overlay = ConfigOverlay::load()?;
        overlay.apply_env();
        overlay.merge(overrides);
        Ok(overlay.into_config())
    }
}

fn apply_env_path(field: &mut Option<PathBuf>, var: &str) {
    if let Some(value) = env::var_os(var) {
        *field = Some(PathBuf::from(value));
    }
}

fn merge_field<T>(field: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *field = other;
    }
}

/// Name of the invoking user, used as the default CA common name.
fn invoking_user_name() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| FALLBACK_CA_COMMON_NAME.to_string())
}
