use std::collections::HashMap;
use std::sync::Arc;

use ostack_common::{
    AttachVolumeRequest, BlockDeviceMapping, CreateServerRequest, ImageRef, OstackError, Result,
    Server, ServerStatus, SnapshotServerRequest,
};
use tracing::{debug, instrument};

use crate::http::HttpClient;
use crate::wait;
use crate::Config;

/// Server operations, including the low-level boot path that takes a
/// block-device mapping instead of an image.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    http: HttpClient,
    config: Arc<Config>,
}

impl ComputeClient {
    pub(crate) fn new(http: HttpClient, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    #[instrument(skip(self))]
    pub async fn create_server(
        &self,
        name: &str,
        flavor_ref: &str,
        image_ref: Option<&str>,
    ) -> Result<Server> {
        let req = CreateServerRequest {
            name: name.to_string(),
            flavor_ref: flavor_ref.to_string(),
            image_ref: image_ref.map(str::to_string),
            block_device_mapping: None,
        };
        self.http.post_json("/v2/servers", &req).await
    }

    /// Boot directly from a volume or volume snapshot, bypassing the image
    /// pipeline.
    #[instrument(skip(self, mapping), fields(device = %mapping.device_name))]
    pub async fn create_server_from_block_device(
        &self,
        name: &str,
        mapping: &BlockDeviceMapping,
    ) -> Result<Server> {
        let (device, spec) = mapping.encode();
        let mut bd_map = HashMap::new();
        bd_map.insert(device, spec);
        let req = CreateServerRequest {
            name: name.to_string(),
            flavor_ref: self.config.flavor_ref.clone(),
            image_ref: None,
            block_device_mapping: Some(bd_map),
        };
        self.http.post_json("/v2/servers", &req).await
    }

    pub async fn get_server(&self, id: &str) -> Result<Server> {
        self.http.get_json(&format!("/v2/servers/{id}")).await
    }

    pub async fn delete_server(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/v2/servers/{id}")).await
    }

    /// Snapshot a running server into an image; returns the new image id.
    /// The image may still terminate in `deleted` when the instance has no
    /// root disk.
    #[instrument(skip(self))]
    pub async fn create_image_from_server(&self, id: &str, name: &str) -> Result<String> {
        let image: ImageRef = self
            .http
            .post_json(
                &format!("/v2/servers/{id}/snapshot"),
                &SnapshotServerRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(image.image_id)
    }

    pub async fn attach_volume(&self, server_id: &str, volume_id: &str, device: &str) -> Result<()> {
        self.http
            .post_empty(
                &format!("/v2/servers/{server_id}/volume-attachments"),
                &AttachVolumeRequest {
                    volume_id: volume_id.to_string(),
                    device: device.to_string(),
                },
            )
            .await
    }

    pub async fn detach_volume(&self, server_id: &str, volume_id: &str) -> Result<()> {
        self.http
            .delete(&format!("/v2/servers/{server_id}/volume-attachments/{volume_id}"))
            .await
    }

    /// Poll until the server reaches `target`. A server that lands in ERROR
    /// on the way fails fast rather than waiting out the clock.
    pub async fn wait_for_server_status(&self, id: &str, target: ServerStatus) -> Result<()> {
        let resource = format!("server {id}");
        let resource = resource.as_str();
        wait::poll_until(
            self.config.poll_interval,
            self.config.wait_timeout,
            resource,
            &target.to_string(),
            || async move {
                match self.get_server(id).await {
                    Ok(server) if server.status == target => Ok(Some(())),
                    Ok(server)
                        if server.status == ServerStatus::Error
                            && target != ServerStatus::Error =>
                    {
                        Err(OstackError::UnexpectedStatus {
                            resource: resource.to_string(),
                            actual: server.status.to_string(),
                            target: target.to_string(),
                        })
                    }
                    Ok(server) => {
                        debug!(status = %server.status, "still waiting on server");
                        Ok(None)
                    }
                    Err(OstackError::NotFound(_)) if target == ServerStatus::Deleted => {
                        Ok(Some(()))
                    }
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }
}
