use std::{env, path::PathBuf, time::Duration};

use log::warn;

pub const DEFAULT_TOMTOM_BASE_URL: &str = "https://api.tomtom.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct NavigationConfig {
    pub tomtom_api_key: String,
    pub tomtom_base_url: String,
    /// Read incidents over HTTP from this service instead of in-process.
    pub incident_service_url: Option<String>,
    pub timeout: Duration,
    pub avoidance_table_path: Option<PathBuf>,
}

impl NavigationConfig {
    /// `None` if no routing engine key is configured.
    pub fn from_env() -> Option<Self> {
        let tomtom_api_key = env::var("TOMTOM_API_KEY").ok()?;
        let tomtom_base_url = env::var("TOMTOM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_TOMTOM_BASE_URL.to_owned());
        let incident_service_url = env::var("INCIDENT_SERVICE_URL").ok();
        let timeout = match env::var("NAVIGATION_TIMEOUT_SECS") {
            Ok(value) => match value.parse() {
                Ok(secs) => Duration::from_secs(secs),
                Err(why) => {
                    warn!("ignoring NAVIGATION_TIMEOUT_SECS='{}': {}", value, why);
                    DEFAULT_TIMEOUT
                }
            },
            Err(_) => DEFAULT_TIMEOUT,
        };
        let avoidance_table_path = env::var("AVOIDANCE_TABLE_PATH").ok().map(PathBuf::from);
        Some(Self {
            tomtom_api_key,
            tomtom_base_url,
            incident_service_url,
            timeout,
            avoidance_table_path,
        })
    }
}
