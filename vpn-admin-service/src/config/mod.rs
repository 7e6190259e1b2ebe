use crate::models::{Module, ModuleSet, ServerRole};
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::observability::LogFormat;
use std::env;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub role: ServerRole,
    pub modules: ModuleSet,
    pub pki: PkiConfig,
    pub passwords: Option<PasswordConfig>,
    pub ccd: Option<CcdConfig>,
    pub management_address: Option<String>,
    pub remote: RemoteConfig,
    pub roster_refresh_seconds: u64,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct PkiConfig {
    pub easyrsa_bin: PathBuf,
    pub pki_dir: PathBuf,
    /// The server's own certificate; never listed as an identity.
    pub server_common_name: String,
}

#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub openvpn_user_bin: PathBuf,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CcdConfig {
    pub dir: PathBuf,
    pub client_netmask: Ipv4Addr,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(
        common: core_config::Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get_env = |key: &str, default: Option<&str>| read_var(&lookup, key, default, is_prod);

        let role: ServerRole = get_env("SERVER_ROLE", Some("primary"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let modules = ModuleSet::parse_list(&get_env("ENABLED_MODULES", Some("core"))?)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let passwords = if modules.contains(Module::PasswordAuth) {
            Some(PasswordConfig {
                openvpn_user_bin: get_env("OPENVPN_USER_BIN", Some("openvpn-user"))?.into(),
                db_path: get_env("PASSWORD_DB_PATH", None)?.into(),
            })
        } else {
            None
        };

        let ccd = if modules.contains(Module::PerClientRouting) {
            Some(CcdConfig {
                dir: get_env("CCD_DIR", None)?.into(),
                client_netmask: parse_var(
                    "CLIENT_NETMASK",
                    &get_env("CLIENT_NETMASK", Some("255.255.255.0"))?,
                )?,
            })
        } else {
            None
        };

        let config = AdminConfig {
            common,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("vpn-admin-service"))?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            log_format: get_env("LOG_FORMAT", Some("json"))?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
            role,
            modules,
            pki: PkiConfig {
                easyrsa_bin: get_env("EASYRSA_BIN", Some("easyrsa"))?.into(),
                pki_dir: get_env("EASYRSA_PKI_DIR", Some("./easyrsa/pki"))?.into(),
                server_common_name: get_env("SERVER_COMMON_NAME", Some("server"))?,
            },
            passwords,
            ccd,
            management_address: lookup("MANAGEMENT_ADDRESS").filter(|v| !v.trim().is_empty()),
            remote: RemoteConfig {
                host: get_env("REMOTE_HOST", Some("127.0.0.1"))?,
                port: parse_var("REMOTE_PORT", &get_env("REMOTE_PORT", Some("1194"))?)?,
                protocol: get_env("REMOTE_PROTOCOL", Some("udp"))?,
            },
            roster_refresh_seconds: parse_var(
                "ROSTER_REFRESH_SECONDS",
                &get_env("ROSTER_REFRESH_SECONDS", Some("30"))?,
            )?,
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"))?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.roster_refresh_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ROSTER_REFRESH_SECONDS must be positive"
            )));
        }

        if !matches!(self.remote.protocol.as_str(), "udp" | "tcp" | "udp6" | "tcp6") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REMOTE_PROTOCOL must be one of udp, tcp, udp6, tcp6"
            )));
        }

        if self.server_common_name_is_blank() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SERVER_COMMON_NAME must not be empty"
            )));
        }

        if self.environment == Environment::Prod
            && self.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }

    fn server_common_name_is_blank(&self) -> bool {
        self.pki.server_common_name.trim().is_empty()
    }
}

fn read_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<String, AppError> {
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
