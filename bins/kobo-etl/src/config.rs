use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use kobo_source_http::{DEFAULT_PAGE_SIZE, DEFAULT_SERVER, KoboSettings};
use kobo_storage_postgres::{PgSettings, SslMode};

use crate::error::EtlError;

pub const DEFAULT_CONFIG_PATH: &str = "kobo-etl.toml";
pub const DEFAULT_NAMESPACE: &str = "dsa";
pub const DEFAULT_TABLE_PREFIX: &str = "kobo_";
/// Points at a dotenv file other than `./.env`.
pub const ENV_FILE_VAR: &str = "KOBO_ETL_ENV_FILE";

#[derive(Parser)]
#[command(name = "kobo-etl", about = "Load KoboToolbox survey submissions into PostgreSQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every submission and load it into PostgreSQL
    Load(LoadArgs),
    /// Show what a load would do, without touching PostgreSQL
    Inspect(InspectArgs),
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct SourceArgs {
    /// Path to the TOML config file
    #[arg(long, env = "KOBO_ETL_CONFIG")]
    pub config: Option<String>,

    /// KoboToolbox API token
    #[arg(long, env = "KOBOTOOLBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Survey asset uid
    #[arg(long, env = "ASSET_UID")]
    pub asset_uid: Option<String>,

    /// KoboToolbox server base URL
    #[arg(long, env = "KOBO_SERVER")]
    pub server: Option<String>,

    /// Submissions per API page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Destination schema
    #[arg(long)]
    pub namespace: Option<String>,

    /// Prefix put before the asset uid to name the table
    #[arg(long)]
    pub table_prefix: Option<String>,

    /// Explicit table name, wins over everything else
    #[arg(long)]
    pub table: Option<String>,

    /// Name the table after the survey's display name
    #[arg(long)]
    pub table_from_name: bool,

    /// Field used as primary key and conflict target
    #[arg(long)]
    pub natural_key: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct DbArgs {
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, env = "DB_DATABASE")]
    pub db_database: Option<String>,

    /// disable, require or verify-full
    #[arg(long, env = "DB_SSLMODE")]
    pub db_sslmode: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub db: DbArgs,

    /// How many record failures to print after the summary
    #[arg(long, default_value_t = 10)]
    pub show_failures: usize,
}

#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Also dump the first submission as JSON
    #[arg(long)]
    pub dump_first: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub kobo: KoboSection,
    #[serde(default)]
    pub postgres: PostgresSection,
    #[serde(default)]
    pub load: LoadSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KoboSection {
    pub server: Option<String>,
    pub token: Option<String>,
    pub asset_uid: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub sslmode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSection {
    pub namespace: Option<String>,
    pub table_prefix: Option<String>,
    pub table: Option<String>,
    pub table_from_name: Option<bool>,
    pub natural_key: Option<String>,
}

impl Config {
    pub fn parse(content: &str, path: &str) -> Result<Self, EtlError> {
        toml::from_str(content).map_err(|e| EtlError::config("parse", format!("'{path}': {e}")))
    }

    /// Read the config file. A missing file is fine only at the default path.
    pub fn load(explicit: Option<&str>) -> Result<Self, EtlError> {
        let path = explicit.unwrap_or(DEFAULT_CONFIG_PATH);
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::info!(config = %path, "loaded config");
                Self::parse(&content, path)
            }
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(EtlError::config("read", format!("'{path}': {e}"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dotenv
// ═══════════════════════════════════════════════════════════════

/// Load `KEY=value` lines into the process environment before the CLI is
/// parsed, so every `env = ...` fallback sees them. Variables already set
/// win. A missing file is not an error; the path actually loaded is returned.
pub fn load_dotenv(explicit: Option<&Path>) -> Result<Option<PathBuf>, EtlError> {
    let loaded = match explicit {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(EtlError::config("dotenv", e.to_string())),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// How the destination table gets its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableNaming {
    /// `<prefix><asset uid>`
    Prefixed(String),
    /// Cleaned survey display name, needs the asset metadata.
    SurveyName,
    Explicit(String),
}

/// Final settings after the merge: config file < env/CLI.
#[derive(Debug, Clone)]
pub struct Effective {
    pub kobo: KoboSettings,
    pub asset_uid: String,
    pub pg: PgSettings,
    pub namespace: String,
    pub table: TableNaming,
    pub natural_key: String,
}

impl Effective {
    pub fn new(source: &SourceArgs, db: &DbArgs) -> Result<Self, EtlError> {
        let cfg = Config::load(source.config.as_deref())?;
        Self::merge(source, db, cfg)
    }

    pub fn merge(source: &SourceArgs, db: &DbArgs, cfg: Config) -> Result<Self, EtlError> {
        let token = source
            .token
            .clone()
            .or(cfg.kobo.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                EtlError::config("kobo", "API token is required (--token, KOBOTOOLBOX_TOKEN or [kobo] token)")
            })?;
        let asset_uid = source
            .asset_uid
            .clone()
            .or(cfg.kobo.asset_uid)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                EtlError::config("kobo", "asset uid is required (--asset-uid, ASSET_UID or [kobo] asset_uid)")
            })?;
        let page_size = source.page_size.or(cfg.kobo.page_size).unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(EtlError::config("kobo", "page_size must be positive"));
        }

        let pg_default = PgSettings::default();
        let pg = PgSettings {
            host: db.db_host.clone().or(cfg.postgres.host).unwrap_or(pg_default.host),
            port: db.db_port.or(cfg.postgres.port).unwrap_or(pg_default.port),
            user: db.db_user.clone().or(cfg.postgres.user).unwrap_or(pg_default.user),
            password: db
                .db_password
                .clone()
                .or(cfg.postgres.password)
                .unwrap_or(pg_default.password),
            dbname: db
                .db_database
                .clone()
                .or(cfg.postgres.database)
                .unwrap_or(pg_default.dbname),
            ssl_mode: match db.db_sslmode.clone().or(cfg.postgres.sslmode) {
                Some(mode) => mode
                    .parse::<SslMode>()
                    .map_err(|e| EtlError::config("postgres", e.message().to_string()))?,
                None => pg_default.ssl_mode,
            },
        };

        let namespace = source
            .namespace
            .clone()
            .or(cfg.load.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let table = match source.table.clone().or(cfg.load.table) {
            Some(name) => TableNaming::Explicit(name),
            None if source.table_from_name || cfg.load.table_from_name.unwrap_or(false) => {
                TableNaming::SurveyName
            }
            None => TableNaming::Prefixed(
                source
                    .table_prefix
                    .clone()
                    .or(cfg.load.table_prefix)
                    .unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string()),
            ),
        };

        Ok(Self {
            kobo: KoboSettings {
                server: source
                    .server
                    .clone()
                    .or(cfg.kobo.server)
                    .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
                token,
                page_size,
            },
            asset_uid,
            pg,
            namespace,
            table,
            natural_key: source
                .natural_key
                .clone()
                .or(cfg.load.natural_key)
                .unwrap_or_else(|| kobo_engine::config::DEFAULT_NATURAL_KEY.to_string()),
        })
    }
}
