use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub erp: ErpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Connection details of the ERP. `base_url` and `database` have no defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_session_header")]
    pub session_header: String,
    /// Unset means the HTTP client's own default applies.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub admin: Option<AdminCredentials>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_cookie")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_cookie")]
    pub cookie_name: String,
    #[serde(default = "default_portal_max_age_days")]
    pub max_age_days: u32,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_denied_paths")]
    pub denied_paths: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mount_path: default_mount_path(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            database: String::new(),
            login_path: default_login_path(),
            session_header: default_session_header(),
            timeout_secs: None,
            admin: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie(),
            secure: false,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_portal_cookie(),
            max_age_days: default_portal_max_age_days(),
            secure: false,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            denied_paths: default_denied_paths(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_mount_path() -> String {
    "/api/odoo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_login_path() -> String {
    "/web/session/authenticate".to_string()
}

fn default_session_header() -> String {
    "X-Openerp-Session-Id".to_string()
}

fn default_session_cookie() -> String {
    "session_id".to_string()
}

fn default_portal_cookie() -> String {
    "customk9_session".to_string()
}

fn default_portal_max_age_days() -> u32 {
    30
}

pub fn default_denied_paths() -> Vec<String> {
    [
        "/web/database",
        "/web/session/change_password",
        "/xmlrpc/db",
        "/xmlrpc/2/db",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
