//! Typed service clients for the OpenStack-style control plane the scenario
//! suite drives: compute, flavors, images, volumes, and the isolated
//! credentials endpoint. One `ClientManager` bundles everything a suite
//! needs, bound to one set of credentials.

mod compute;
mod config;
mod flavors;
mod http;
mod identity;
mod images;
mod volumes;
mod wait;

use std::sync::Arc;

pub use compute::ComputeClient;
pub use config::Config;
pub use flavors::FlavorsClient;
pub use identity::IdentityClient;
pub use images::ImagesClient;
pub use volumes::VolumesClient;

use http::HttpClient;
use ostack_common::{Credentials, Result};

/// All service clients for one credentialed session, sharing a single
/// connection pool.
#[derive(Debug, Clone)]
pub struct ClientManager {
    pub compute: ComputeClient,
    pub flavors: FlavorsClient,
    pub images: ImagesClient,
    pub volumes: VolumesClient,
}

impl ClientManager {
    pub fn new(config: Arc<Config>, creds: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let token = format!("{}:{}", creds.tenant, creds.username);
        let base = HttpClient::new(http, config.auth_url.clone(), Some(token));
        Ok(Self {
            compute: ComputeClient::new(base.clone(), config.clone()),
            flavors: FlavorsClient::new(base.clone()),
            images: ImagesClient::new(base.clone(), config.clone()),
            volumes: VolumesClient::new(base, config),
        })
    }
}

/// Identity client is built unauthenticated; it is what hands out the
/// credentials everything else uses.
pub fn identity_client(config: &Config) -> Result<IdentityClient> {
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    Ok(IdentityClient::new(http, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostack_common::{OstackError, ServerStatus, VolumeStatus};
    use serde_json::json;
    use std::time::Duration;

    fn test_config(url: &str) -> Arc<Config> {
        let mut config = Config::for_endpoint(url);
        config.poll_interval = Duration::from_millis(10);
        config.wait_timeout = Duration::from_millis(500);
        Arc::new(config)
    }

    fn manager(url: &str) -> ClientManager {
        let creds = Credentials {
            username: "admin-x".to_string(),
            tenant: "tenant-x".to_string(),
            password: "secret".to_string(),
        };
        ClientManager::new(test_config(url), &creds).unwrap()
    }

    #[tokio::test]
    async fn test_create_image_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/images")
            .match_header("x-auth-token", "tenant-x:admin-x")
            .match_body(mockito::Matcher::PartialJson(json!({
                "name": "scenario-img",
                "container_format": "bare",
                "disk_format": "iso",
                "location": "http://repo/boot.iso",
                "is_public": true,
            })))
            .with_status(201)
            .with_body(
                json!({
                    "id": "img-1",
                    "name": "scenario-img",
                    "container_format": "bare",
                    "disk_format": "iso",
                    "status": "queued",
                    "is_public": true,
                })
                .to_string(),
            )
            .create_async()
            .await;

        let clients = manager(&server.url());
        let image = clients
            .images
            .create_image("scenario-img", "bare", "iso", "http://repo/boot.iso", true)
            .await
            .unwrap();
        assert_eq!(image.id, "img-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_mapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v2/volumes")
            .with_status(500)
            .with_body(json!({"message": "cinder exploded"}).to_string())
            .create_async()
            .await;

        let clients = manager(&server.url());
        let err = clients
            .volumes
            .create_volume(1, "vol", None)
            .await
            .unwrap_err();
        match err {
            OstackError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "cinder exploded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/servers/nope")
            .with_status(404)
            .with_body(json!({"message": "no such server"}).to_string())
            .create_async()
            .await;

        let clients = manager(&server.url());
        let err = clients.compute.get_server("nope").await.unwrap_err();
        assert!(matches!(err, OstackError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_wait_reaches_target_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/servers/srv-1")
            .with_body(
                json!({
                    "id": "srv-1",
                    "name": "inst",
                    "status": "ACTIVE",
                    "flavor_id": "1",
                    "image_id": "img-1",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let clients = manager(&server.url());
        clients
            .compute
            .wait_for_server_status("srv-1", ServerStatus::Active)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_fails_fast_on_error_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/servers/srv-2")
            .with_body(
                json!({
                    "id": "srv-2",
                    "name": "inst",
                    "status": "ERROR",
                    "flavor_id": "1",
                    "image_id": null,
                })
                .to_string(),
            )
            .create_async()
            .await;

        let clients = manager(&server.url());
        let err = clients
            .compute
            .wait_for_server_status("srv-2", ServerStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, OstackError::UnexpectedStatus { .. }));
    }

    #[tokio::test]
    async fn test_wait_times_out_on_stuck_resource() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/volumes/vol-1")
            .with_body(
                json!({
                    "id": "vol-1",
                    "display_name": "vol",
                    "size": 1,
                    "status": "creating",
                    "image_ref": null,
                })
                .to_string(),
            )
            .expect_at_least(1)
            .create_async()
            .await;

        let clients = manager(&server.url());
        let err = clients
            .volumes
            .wait_for_volume_status("vol-1", VolumeStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, OstackError::WaitTimeout { .. }));
    }

    #[tokio::test]
    async fn test_deletion_wait_finishes_on_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/volumes/vol-gone")
            .with_status(404)
            .with_body(json!({"message": "gone"}).to_string())
            .create_async()
            .await;

        let clients = manager(&server.url());
        clients
            .volumes
            .wait_for_resource_deletion("vol-gone")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_identity_issue_and_clear() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v2/identity/credentials")
            .with_status(201)
            .with_body(
                json!({
                    "username": "iso-user",
                    "tenant": "iso-tenant",
                    "password": "pw",
                })
                .to_string(),
            )
            .create_async()
            .await;
        let release = server
            .mock("DELETE", "/v2/identity/credentials/iso-user")
            .with_status(204)
            .create_async()
            .await;

        let config = test_config(&server.url());
        let identity = identity_client(&config).unwrap();
        let creds = identity.get_admin_creds("suite").await.unwrap();
        assert_eq!(creds.tenant, "iso-tenant");
        identity.clear_isolated_creds().await.unwrap();
        release.assert_async().await;
    }
}
