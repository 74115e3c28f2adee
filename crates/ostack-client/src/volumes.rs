use std::sync::Arc;

use ostack_common::{
    CreateVolumeRequest, CreateVolumeSnapshotRequest, ImageRef, OstackError, Result,
    UploadVolumeRequest, Volume, VolumeSnapshot, VolumeStatus,
};
use tracing::{debug, instrument};

use crate::http::HttpClient;
use crate::wait;
use crate::Config;

#[derive(Debug, Clone)]
pub struct VolumesClient {
    http: HttpClient,
    config: Arc<Config>,
}

impl VolumesClient {
    pub(crate) fn new(http: HttpClient, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    #[instrument(skip(self))]
    pub async fn create_volume(
        &self,
        size: u32,
        display_name: &str,
        image_ref: Option<&str>,
    ) -> Result<Volume> {
        let req = CreateVolumeRequest {
            size,
            display_name: display_name.to_string(),
            image_ref: image_ref.map(str::to_string),
        };
        self.http.post_json("/v2/volumes", &req).await
    }

    pub async fn get_volume(&self, id: &str) -> Result<Volume> {
        self.http.get_json(&format!("/v2/volumes/{id}")).await
    }

    pub async fn delete_volume(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/v2/volumes/{id}")).await
    }

    /// Copy a volume out to a new image; returns the image id. The volume
    /// passes through `uploading` and settles back to `available`.
    #[instrument(skip(self))]
    pub async fn upload_volume(
        &self,
        id: &str,
        image_name: &str,
        disk_format: &str,
    ) -> Result<String> {
        let image: ImageRef = self
            .http
            .post_json(
                &format!("/v2/volumes/{id}/upload"),
                &UploadVolumeRequest {
                    image_name: image_name.to_string(),
                    disk_format: disk_format.to_string(),
                },
            )
            .await?;
        Ok(image.image_id)
    }

    #[instrument(skip(self))]
    pub async fn create_snapshot(&self, volume_id: &str, display_name: &str) -> Result<VolumeSnapshot> {
        let req = CreateVolumeSnapshotRequest {
            volume_id: volume_id.to_string(),
            display_name: display_name.to_string(),
        };
        self.http.post_json("/v2/volume-snapshots", &req).await
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<VolumeSnapshot> {
        self.http.get_json(&format!("/v2/volume-snapshots/{id}")).await
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/v2/volume-snapshots/{id}")).await
    }

    pub async fn wait_for_volume_status(&self, id: &str, target: VolumeStatus) -> Result<()> {
        let resource = format!("volume {id}");
        let resource = resource.as_str();
        wait::poll_until(
            self.config.poll_interval,
            self.config.wait_timeout,
            resource,
            &target.to_string(),
            || async move {
                match self.get_volume(id).await {
                    Ok(volume) if volume.status == target => Ok(Some(())),
                    Ok(volume)
                        if volume.status == VolumeStatus::Error
                            && target != VolumeStatus::Error =>
                    {
                        Err(OstackError::UnexpectedStatus {
                            resource: resource.to_string(),
                            actual: volume.status.to_string(),
                            target: target.to_string(),
                        })
                    }
                    Ok(volume) => {
                        debug!(status = %volume.status, "still waiting on volume");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }

    pub async fn wait_for_snapshot_status(&self, id: &str, target: VolumeStatus) -> Result<()> {
        let resource = format!("volume snapshot {id}");
        let resource = resource.as_str();
        wait::poll_until(
            self.config.poll_interval,
            self.config.wait_timeout,
            resource,
            &target.to_string(),
            || async move {
                match self.get_snapshot(id).await {
                    Ok(snap) if snap.status == target => Ok(Some(())),
                    Ok(snap) if snap.status == VolumeStatus::Error => {
                        Err(OstackError::UnexpectedStatus {
                            resource: resource.to_string(),
                            actual: snap.status.to_string(),
                            target: target.to_string(),
                        })
                    }
                    Ok(snap) => {
                        debug!(status = %snap.status, "still waiting on snapshot");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }

    /// Poll until the volume is gone entirely.
    pub async fn wait_for_resource_deletion(&self, id: &str) -> Result<()> {
        let resource = format!("volume {id}");
        let resource = resource.as_str();
        wait::poll_until(
            self.config.poll_interval,
            self.config.wait_timeout,
            resource,
            "deleted",
            || async move {
                match self.get_volume(id).await {
                    Ok(volume) => {
                        debug!(status = %volume.status, "volume still present");
                        Ok(None)
                    }
                    Err(OstackError::NotFound(_)) => Ok(Some(())),
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }
}
