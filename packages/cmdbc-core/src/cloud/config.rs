use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default CMDB server URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Default value of the client-identifying request header
pub const DEFAULT_CLIENT_ID: &str = "cmdbc";

/// Default wait for response headers, in seconds
pub const DEFAULT_HEADER_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for talking to the CMDB server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL without trailing slash (e.g. "https://cmdb.example.com")
    pub server: String,
    /// Basic-auth username for the authentication endpoint
    pub username: String,
    /// Basic-auth password for the authentication endpoint
    pub password: String,
    /// Value sent in the `X-Custom-Header` request header
    pub client_id: String,
    /// Name this machine reports as the device host
    pub host_name: String,
    /// Bound on the wait for response headers; the body read is unbounded
    pub header_timeout: Duration,
    pub endpoints: Endpoints,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER_URL.to_string(),
            username: String::new(),
            password: String::new(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            host_name: String::new(),
            header_timeout: Duration::from_secs(DEFAULT_HEADER_TIMEOUT_SECS),
            endpoints: Endpoints::default(),
        }
    }
}

impl ApiConfig {
    /// Join the server URL, an endpoint prefix and path segments.
    ///
    /// Each segment is percent-encoded, so a `/`, `?` or `#` inside a host
    /// name or serial number stays within its segment.
    pub fn url(&self, endpoint: &str, segments: &[&str]) -> Result<String> {
        let mut url = Url::parse(&self.server)
            .map_err(|e| Error::Config(format!("invalid server URL {:?}: {e}", self.server)))?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("server URL {:?} cannot have a path", self.server)))?
            .pop_if_empty()
            .extend(endpoint.split('/').filter(|s| !s.is_empty()))
            .extend(segments);
        Ok(url.into())
    }
}

/// Endpoint path prefixes, relative to the server URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub auth: String,
    pub new_sn: String,
    pub checkin: String,
    pub checkout: String,
    pub audit: String,
    pub vendor: String,
    pub product: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth: "v1/cmdb/authenticate".to_string(),
            new_sn: "v1/usbci/newsn".to_string(),
            checkin: "v1/usbci/checkin".to_string(),
            checkout: "v1/usbci/checkout".to_string(),
            audit: "v1/usbci/audit".to_string(),
            vendor: "v1/usbmeta/vendor".to_string(),
            product: "v1/usbmeta/product".to_string(),
        }
    }
}
