use crate::cloud::{HttpStatus, SyncClient};
use crate::device::{DeviceIdentity, DeviceSnapshot};
use crate::error::{Error, Result};
use crate::store::StateStore;

/// Baselines kept by the CMDB server, reached through check-out/check-in.
#[derive(Debug, Clone, Copy)]
pub struct RemoteStore<'a> {
    client: &'a SyncClient,
}

impl<'a> RemoteStore<'a> {
    pub fn new(client: &'a SyncClient) -> Self {
        Self { client }
    }

    /// Fetch the last checked-in state of a device.
    ///
    /// A device without a serial number has no server-side address, so this
    /// returns `Ok(None)` without issuing a request.
    pub async fn checkout(&self, host: &str, identity: &DeviceIdentity) -> Result<Option<Vec<u8>>> {
        if !identity.is_addressable() {
            tracing::info!(
                "device {}-{} skipping fetch, no serial number",
                identity.vendor_id,
                identity.product_id
            );
            return Ok(None);
        }

        self.client.authenticate().await?;

        let config = self.client.config();
        let url = config.url(
            &config.endpoints.checkout,
            &[
                self.client.host_for(host),
                identity.vendor_id.as_str(),
                identity.product_id.as_str(),
                identity.serial_num.as_str(),
            ],
        )?;

        let exchange = self.client.get("checkout", &url).await?;
        if exchange.status == HttpStatus(404) {
            return Err(Error::NotFound {
                identity: identity.to_string(),
            });
        }

        let exchange = exchange.accepted("checkout")?;
        let body = exchange.body.trim_ascii();
        if body.is_empty() || body == b"null" {
            return Err(Error::NotFound {
                identity: identity.to_string(),
            });
        }

        Ok(Some(body.to_vec()))
    }

    /// Send the snapshot's current state to the server.
    ///
    /// A snapshot without a host name is filed under the configured host.
    pub async fn checkin(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        self.client.authenticate().await?;

        let config = self.client.config();
        let url = config.url(
            &config.endpoints.checkin,
            &[
                self.client.host_for(snapshot.host()),
                snapshot.vendor_id(),
                snapshot.product_id(),
            ],
        )?;

        self.client
            .post("checkin", &url, snapshot.serialize()?)
            .await?
            .accepted("checkin")?;
        Ok(())
    }
}

impl StateStore for RemoteStore<'_> {
    fn name(&self) -> &'static str {
        "server"
    }

    async fn load(&self, host: &str, identity: &DeviceIdentity) -> Result<Vec<u8>> {
        match self.checkout(host, identity).await? {
            Some(bytes) => Ok(bytes),
            None => Err(Error::Identity {
                vendor_id: identity.vendor_id.clone(),
                product_id: identity.product_id.clone(),
            }),
        }
    }

    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<()> {
        self.checkin(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::magtek_reader;
    use crate::testing::MockServer;

    const HOST: &str = "John-SurfacePro";
    const CHECKOUT: &str = "/v1/usbci/checkout/John-SurfacePro/0801/0001/24F0014";
    const CHECKIN: &str = "/v1/usbci/checkin/John-SurfacePro/0801/0001";

    #[tokio::test]
    async fn test_checkout_returns_stored_bytes() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        let stored = magtek_reader().serialize().unwrap();
        server.route("GET", CHECKOUT, 200, stored.clone());
        let client = server.client(HOST);

        let bytes = RemoteStore::new(&client)
            .checkout(HOST, &magtek_reader().identity())
            .await
            .unwrap();
        assert_eq!(bytes, Some(stored));
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_checkout_without_serial_is_a_no_op() {
        let server = MockServer::start().await;
        let client = server.client(HOST);

        let identity = DeviceIdentity::new("0acd", "2030", "");
        let result = RemoteStore::new(&client).checkout(HOST, &identity).await.unwrap();
        assert_eq!(result, None);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_unknown_device_is_not_found() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("GET", CHECKOUT, 404, r#""object not found""#);
        let client = server.client(HOST);

        let err = RemoteStore::new(&client)
            .checkout(HOST, &magtek_reader().identity())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_checkout_empty_body_is_not_found() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("GET", CHECKOUT, 200, "null");
        let client = server.client(HOST);

        let err = RemoteStore::new(&client)
            .checkout(HOST, &magtek_reader().identity())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_checkout_server_error_is_protocol_error() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("GET", CHECKOUT, 500, "");
        let client = server.client(HOST);

        let err = RemoteStore::new(&client)
            .checkout(HOST, &magtek_reader().identity())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol {
                operation: "checkout",
                status: HttpStatus(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_checkin_posts_canonical_bytes() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("POST", CHECKIN, 201, "");
        let client = server.client(HOST);
        let snapshot = magtek_reader();

        RemoteStore::new(&client).checkin(&snapshot).await.unwrap();

        let request = server.last("POST", CHECKIN).unwrap();
        assert_eq!(request.body, snapshot.serialize().unwrap());
    }

    #[tokio::test]
    async fn test_checkin_rejected() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("POST", CHECKIN, 422, r#""unable to decode request""#);
        let client = server.client(HOST);

        let err = RemoteStore::new(&client)
            .checkin(&magtek_reader())
            .await
            .unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_missing_host_falls_back_to_configured_host() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("POST", CHECKIN, 201, "");
        server.route("GET", CHECKOUT, 200, magtek_reader().serialize().unwrap());
        let client = server.client(HOST);
        let store = RemoteStore::new(&client);

        let hostless = DeviceSnapshot::builder("", "0801", "0001")
            .serial_num("24F0014")
            .build();
        store.checkin(&hostless).await.unwrap();
        let bytes = store.checkout("", &hostless.identity()).await.unwrap();

        assert!(bytes.is_some());
        assert_eq!(server.hits("POST", CHECKIN), 1);
        assert_eq!(server.hits("GET", CHECKOUT), 1);
    }

    #[tokio::test]
    async fn test_protected_calls_share_one_login() {
        let server = MockServer::start().await;
        server.allow_auth(HOST);
        server.route("POST", CHECKIN, 201, "");
        server.route("GET", CHECKOUT, 200, magtek_reader().serialize().unwrap());
        let client = server.client(HOST);
        let store = RemoteStore::new(&client);

        store.checkin(&magtek_reader()).await.unwrap();
        store.checkout(HOST, &magtek_reader().identity()).await.unwrap();
        store.checkin(&magtek_reader()).await.unwrap();

        assert_eq!(
            server.hits("GET", &format!("/v1/cmdb/authenticate/{HOST}")),
            1
        );
    }
}
