mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;

pub async fn load() -> Result<Config> {
    let (config_path, required) = match env::var("CONFIG_PATH") {
        Ok(path) => (path, true),
        Err(_) => ("config.yaml".to_string(), false),
    };

    load_from(Path::new(&config_path), required, |key| env::var(key).ok()).await
}

/// Reads `path` (skipped when absent and not `required`), applies overrides
/// from `lookup` and validates the result.
pub async fn load_from<F>(path: &Path, required: bool, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if required || path.exists() {
        debug!("Loading configuration from: {}", path.display());
        let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        parse(&config_str)?
    } else {
        debug!("No configuration file found, using environment only");
        Config::default()
    };

    config.apply_overrides(lookup)?;
    config.validate()?;

    Ok(config)
}

pub fn parse(config_str: &str) -> Result<Config> {
    // An empty file deserializes to `null`.
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(config_str)?)
}

impl Config {
    /// Applies `ERP_*` overrides; `lookup` abstracts the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("ERP_BASE_URL") {
            self.erp.base_url = base_url;
        }
        if let Some(database) = lookup("ERP_DATABASE") {
            self.erp.database = database;
        }
        if let Some(timeout) = lookup("ERP_TIMEOUT_SECS") {
            let secs = timeout.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("ERP_TIMEOUT_SECS must be a whole number, got '{}'", timeout))
            })?;
            self.erp.timeout_secs = Some(secs);
        }

        let username = lookup("ERP_ADMIN_USERNAME");
        let password = lookup("ERP_ADMIN_PASSWORD");
        if username.is_some() || password.is_some() {
            let admin = self.erp.admin.get_or_insert_with(|| AdminCredentials {
                username: String::new(),
                password: String::new(),
            });
            if let Some(username) = username {
                admin.username = username;
            }
            if let Some(password) = password {
                admin.password = password;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.erp.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::config(
                "erp.base_url is required (set it in the config file or ERP_BASE_URL)",
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "erp.base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }
        if self.erp.database.trim().is_empty() {
            return Err(Error::config(
                "erp.database is required (set it in the config file or ERP_DATABASE)",
            ));
        }
        if !self.erp.login_path.starts_with('/') {
            return Err(Error::config("erp.login_path must start with '/'"));
        }
        if self.erp.session_header.trim().is_empty() {
            return Err(Error::config("erp.session_header must not be empty"));
        }
        if self.erp.timeout_secs == Some(0) {
            return Err(Error::config("erp.timeout_secs must be greater than zero"));
        }
        if let Some(admin) = &self.erp.admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(Error::config(
                    "erp.admin requires both username and password",
                ));
            }
        }

        let mount = &self.server.mount_path;
        if !mount.starts_with('/') || mount.trim_end_matches('/').is_empty() {
            return Err(Error::config(format!(
                "server.mount_path must start with '/' and not be the root, got '{}'",
                mount
            )));
        }

        validate_cookie_name("session.cookie_name", &self.session.cookie_name)?;
        validate_cookie_name("portal.cookie_name", &self.portal.cookie_name)?;
        if self.portal.max_age_days == 0 {
            return Err(Error::config("portal.max_age_days must be greater than zero"));
        }

        if self.proxy.denied_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::config("proxy.denied_paths must not contain empty entries"));
        }

        Ok(())
    }
}

fn validate_cookie_name(field: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("{} is not a valid cookie name: '{}'", field, name)))
    }
}
