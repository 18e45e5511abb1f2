//! Session context shared by every request to the CMDB server.
//!
//! Holds the HTTP client (whose cookie store keeps the token issued by the
//! authentication endpoint) and the flag recording whether authentication has
//! already succeeded. Devices are processed one after another, so the flag
//! needs no lock.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

pub(crate) const JSON_MEDIA_TYPE: &str = "application/json; charset=UTF8";
pub(crate) const CLIENT_HEADER: &str = "x-custom-header";

#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    authenticated: AtomicBool,
}

impl Session {
    pub fn new(client_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert(
            CLIENT_HEADER,
            HeaderValue::from_str(client_id)
                .map_err(|_| Error::Config(format!("invalid client id {client_id:?}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            authenticated: AtomicBool::new(false),
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
    }

    /// Forget the authentication so the next protected call logs in again.
    pub fn clear(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }
}
