use std::sync::Arc;

use ostack_common::{CreateImageRequest, Image, ImageStatus, OstackError, Result};
use tracing::{debug, instrument};

use crate::http::HttpClient;
use crate::wait;
use crate::Config;

#[derive(Debug, Clone)]
pub struct ImagesClient {
    http: HttpClient,
    config: Arc<Config>,
}

impl ImagesClient {
    pub(crate) fn new(http: HttpClient, config: Arc<Config>) -> Self {
        Self { http, config }
    }

    /// Register an image the backend fetches from `location`.
    #[instrument(skip(self))]
    pub async fn create_image(
        &self,
        name: &str,
        container_format: &str,
        disk_format: &str,
        location: &str,
        is_public: bool,
    ) -> Result<Image> {
        let req = CreateImageRequest {
            name: name.to_string(),
            container_format: container_format.to_string(),
            disk_format: disk_format.to_string(),
            location: location.to_string(),
            is_public,
        };
        self.http.post_json("/v2/images", &req).await
    }

    pub async fn get_image(&self, id: &str) -> Result<Image> {
        self.http.get_json(&format!("/v2/images/{id}")).await
    }

    pub async fn delete_image(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/v2/images/{id}")).await
    }

    pub async fn wait_for_image_status(&self, id: &str, target: ImageStatus) -> Result<()> {
        let resource = format!("image {id}");
        let resource = resource.as_str();
        wait::poll_until(
            self.config.poll_interval,
            self.config.wait_timeout,
            resource,
            &target.to_string(),
            || async move {
                match self.get_image(id).await {
                    Ok(image) if image.status == target => Ok(Some(())),
                    Ok(image)
                        if image.status == ImageStatus::Killed && target != ImageStatus::Killed =>
                    {
                        Err(OstackError::UnexpectedStatus {
                            resource: resource.to_string(),
                            actual: image.status.to_string(),
                            target: target.to_string(),
                        })
                    }
                    Ok(image)
                        if image.status == ImageStatus::Deleted
                            && target == ImageStatus::Active =>
                    {
                        Err(OstackError::UnexpectedStatus {
                            resource: resource.to_string(),
                            actual: image.status.to_string(),
                            target: target.to_string(),
                        })
                    }
                    Ok(image) => {
                        debug!(status = %image.status, "still waiting on image");
                        Ok(None)
                    }
                    Err(OstackError::NotFound(_)) if target == ImageStatus::Deleted => {
                        Ok(Some(()))
                    }
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }
}
