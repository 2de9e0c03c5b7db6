//! Server configuration from `CLOUDINV_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cloudinv_core::models::resource::ResourceKind;
use cloudinv_db::DbConfig;
use cloudinv_engine::{EngineConfig, OrphanConfig};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub engine: EngineConfig,
    pub sweep_interval: Duration,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub sandbox: Option<SandboxConfig>,
}

/// In-memory provider seeded from a JSON fixture.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub fixture: PathBuf,
    pub account_id: String,
    pub regions: Vec<String>,
    /// Slug of the tenant created on first start when none is active.
    pub tenant_slug: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    cloudinv_db_url: Option<String>,
    #[serde(default)]
    cloudinv_db_namespace: Option<String>,
    #[serde(default)]
    cloudinv_db_database: Option<String>,
    #[serde(default)]
    cloudinv_db_username: Option<String>,
    #[serde(default)]
    cloudinv_db_password: Option<String>,
    #[serde(default = "default_sweep_hours")]
    cloudinv_sweep_interval_hours: u64,
    #[serde(default = "default_true")]
    cloudinv_scan_after_discovery: bool,
    #[serde(default = "default_orphan_age_days")]
    cloudinv_orphan_age_days: i64,
    #[serde(default)]
    cloudinv_kinds: Option<String>,
    #[serde(default = "default_max_job_list")]
    cloudinv_max_job_list: u64,
    #[serde(default = "default_log_filter")]
    cloudinv_log: String,
    #[serde(default)]
    cloudinv_sandbox_fixture: Option<PathBuf>,
    #[serde(default = "default_sandbox_account")]
    cloudinv_sandbox_account: String,
    #[serde(default)]
    cloudinv_sandbox_regions: Option<String>,
    #[serde(default = "default_sandbox_tenant")]
    cloudinv_sandbox_tenant: String,
}

const fn default_sweep_hours() -> u64 {
    6
}

const fn default_true() -> bool {
    true
}

const fn default_orphan_age_days() -> i64 {
    7
}

const fn default_max_job_list() -> u64 {
    100
}

fn default_log_filter() -> String {
    "cloudinv=info".into()
}

fn default_sandbox_account() -> String {
    "000000000000".into()
}

fn default_sandbox_tenant() -> String {
    "sandbox".into()
}

fn csv(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse CLOUDINV_* environment variables")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let defaults = DbConfig::default();
        let db = DbConfig {
            url: raw.cloudinv_db_url.unwrap_or(defaults.url),
            namespace: raw.cloudinv_db_namespace.unwrap_or(defaults.namespace),
            database: raw.cloudinv_db_database.unwrap_or(defaults.database),
            username: raw.cloudinv_db_username.or(defaults.username),
            password: raw.cloudinv_db_password.or(defaults.password),
        };

        let kinds = csv(raw.cloudinv_kinds)
            .iter()
            .map(|k| k.parse::<ResourceKind>().map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()
            .context("invalid CLOUDINV_KINDS value")?;

        let hours = raw.cloudinv_sweep_interval_hours;
        if hours == 0 {
            bail!("CLOUDINV_SWEEP_INTERVAL_HOURS must be at least 1");
        }
        let Some(sweep_secs) = hours.checked_mul(3600) else {
            bail!("CLOUDINV_SWEEP_INTERVAL_HOURS is too large: {hours}");
        };

        let engine = EngineConfig {
            kinds: if kinds.is_empty() {
                ResourceKind::ALL.to_vec()
            } else {
                kinds
            },
            scan_after_discovery: raw.cloudinv_scan_after_discovery,
            max_job_list: raw.cloudinv_max_job_list.max(1),
            orphan: OrphanConfig {
                stopped_age_days: raw.cloudinv_orphan_age_days.max(0),
                ..Default::default()
            },
        };

        let sandbox = raw.cloudinv_sandbox_fixture.map(|fixture| SandboxConfig {
            fixture,
            account_id: raw.cloudinv_sandbox_account,
            regions: csv(raw.cloudinv_sandbox_regions),
            tenant_slug: raw.cloudinv_sandbox_tenant,
        });

        Ok(Self {
            db,
            engine,
            sweep_interval: Duration::from_secs(sweep_secs),
            log_filter: raw.cloudinv_log,
            sandbox,
        })
    }
}
