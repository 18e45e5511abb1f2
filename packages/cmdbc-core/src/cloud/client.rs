use std::sync::Arc;

use crate::cloud::config::ApiConfig;
use crate::cloud::session::{Session, JSON_MEDIA_TYPE};
use crate::cloud::status::HttpStatus;
use crate::device::DeviceSnapshot;
use crate::error::{Error, Result};

/// Result of a single HTTP exchange with the CMDB server.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: HttpStatus,
    pub body: Vec<u8>,
}

impl Exchange {
    pub fn is_accepted(&self) -> bool {
        self.status.is_accepted()
    }

    /// Response body as text; JSON string bodies are unquoted.
    pub fn body_text(&self) -> String {
        serde_json::from_slice::<String>(&self.body)
            .unwrap_or_else(|_| String::from_utf8_lossy(&self.body).into_owned())
    }

    /// Turn a rejected exchange into [`Error::Protocol`].
    pub fn accepted(self, operation: &'static str) -> Result<Self> {
        if self.is_accepted() {
            tracing::info!("{} accepted - {}", operation, self.status);
            Ok(self)
        } else {
            Err(Error::Protocol {
                operation,
                message: self.body_text(),
                status: self.status,
            })
        }
    }
}

/// HTTP client for the CMDB server. One exchange per call, never retried.
#[derive(Debug, Clone)]
pub struct SyncClient {
    config: ApiConfig,
    session: Arc<Session>,
}

impl SyncClient {
    pub fn new(config: ApiConfig, session: Arc<Session>) -> Self {
        Self { config, session }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Host segment for device URLs. A snapshot without a host name is
    /// addressed by the configured one.
    pub fn host_for<'a>(&'a self, host: &'a str) -> &'a str {
        if host.is_empty() {
            &self.config.host_name
        } else {
            host
        }
    }

    pub async fn get(&self, operation: &'static str, url: &str) -> Result<Exchange> {
        let request = self.session.http().get(url);
        self.exchange(operation, "GET", url, request).await
    }

    pub async fn post(&self, operation: &'static str, url: &str, body: Vec<u8>) -> Result<Exchange> {
        let request = self
            .session
            .http()
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, JSON_MEDIA_TYPE)
            .body(body);
        self.exchange(operation, "POST", url, request).await
    }

    /// Send the request, waiting at most `header_timeout` for the response
    /// headers, then read the whole body.
    async fn exchange(
        &self,
        operation: &'static str,
        method: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Exchange> {
        tracing::debug!("API call {} {}", method, url);

        let after = self.config.header_timeout;
        let resp = match tokio::time::timeout(after, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(source)) => return Err(Error::Transport { operation, source }),
            Err(_) => return Err(Error::Timeout { operation, after }),
        };

        let status = HttpStatus::from(resp.status());
        let body = resp
            .bytes()
            .await
            .map_err(|source| Error::Transport { operation, source })?
            .to_vec();

        Ok(Exchange { status, body })
    }

    /// Log in with basic auth unless this session already has.
    ///
    /// The server answers with a session cookie that the client's cookie
    /// store attaches to every later request.
    pub async fn authenticate(&self) -> Result<()> {
        if self.session.is_authenticated() {
            return Ok(());
        }

        let url = self
            .config
            .url(&self.config.endpoints.auth, &[self.config.host_name.as_str()])?;

        let request = self
            .session
            .http()
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password));

        let exchange = self.exchange("authentication", "GET", &url, request).await?;
        if !exchange.is_accepted() {
            return Err(Error::Protocol {
                operation: "authentication",
                message: exchange.body_text(),
                status: exchange.status,
            });
        }

        tracing::info!("authentication success - {}", exchange.status);
        self.session.mark_authenticated();
        Ok(())
    }

    /// Ask the server to issue a serial number for an unserialized device.
    pub async fn acquire_serial_number(&self, snapshot: &DeviceSnapshot) -> Result<String> {
        self.authenticate().await?;

        let url = self.config.url(
            &self.config.endpoints.new_sn,
            &[
                self.host_for(snapshot.host()),
                snapshot.vendor_id(),
                snapshot.product_id(),
            ],
        )?;
        let exchange = self
            .post("serial number request", &url, snapshot.serialize()?)
            .await?
            .accepted("serial number request")?;

        let serial: String = serde_json::from_slice(&exchange.body)?;
        if serial.is_empty() {
            return Err(Error::EmptySerialNumber);
        }

        tracing::info!("serial number {:?} generated - {}", serial, exchange.status);
        Ok(serial)
    }

    /// Report the changes attached to `snapshot` by an audit.
    pub async fn submit_audit(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        self.authenticate().await?;

        let url = self.config.url(
            &self.config.endpoints.audit,
            &[
                self.host_for(snapshot.host()),
                snapshot.vendor_id(),
                snapshot.product_id(),
                snapshot.serial_num(),
            ],
        )?;
        let body = serde_json::to_vec(snapshot.changes())?;
        self.post("audit", &url, body).await?.accepted("audit")?;
        Ok(())
    }

    /// Look up the registered vendor name for a vendor ID.
    pub async fn vendor_name(&self, vendor_id: &str) -> Result<String> {
        let url = self.config.url(&self.config.endpoints.vendor, &[vendor_id])?;
        self.lookup(&url).await
    }

    /// Look up the registered product name for a vendor/product ID pair.
    pub async fn product_name(&self, vendor_id: &str, product_id: &str) -> Result<String> {
        let url = self
            .config
            .url(&self.config.endpoints.product, &[vendor_id, product_id])?;
        self.lookup(&url).await
    }

    async fn lookup(&self, url: &str) -> Result<String> {
        let exchange = self.get("lookup", url).await?.accepted("lookup")?;
        Ok(serde_json::from_slice(&exchange.body)?)
    }
}
