use std::time::Duration;

use ostack_common::{OstackError, Result};

/// Externally supplied settings for a suite run. Values come from the
/// environment (prefix `OSTACK_`), with `.env` files honored via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the control plane all service clients talk to.
    pub auth_url: String,
    /// Flavor used for block-device-mapping boots.
    pub flavor_ref: String,
    /// Stock image reference, when the deployment provides one.
    pub image_ref: Option<String>,
    /// Device name (without `/dev/`) used when attaching volumes.
    pub volume_device_name: String,
    /// Disk format for images derived from volumes.
    pub disk_format: String,
    /// URL of a bootable ISO. ISO scenarios skip when unset.
    pub iso_image_url: Option<String>,
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let auth_url = std::env::var("OSTACK_AUTH_URL")
            .map_err(|_| OstackError::Config("OSTACK_AUTH_URL is not set".to_string()))?;

        let mut config = Self::for_endpoint(&auth_url);
        if let Ok(v) = std::env::var("OSTACK_FLAVOR_REF") {
            config.flavor_ref = v;
        }
        config.image_ref = std::env::var("OSTACK_IMAGE_REF").ok();
        if let Ok(v) = std::env::var("OSTACK_VOLUME_DEVICE_NAME") {
            config.volume_device_name = v;
        }
        if let Ok(v) = std::env::var("OSTACK_DISK_FORMAT") {
            config.disk_format = v;
        }
        config.iso_image_url = std::env::var("OSTACK_ISO_IMAGE_URL").ok().filter(|v| !v.is_empty());
        if let Ok(v) = std::env::var("OSTACK_WAIT_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .map_err(|_| OstackError::Config(format!("bad OSTACK_WAIT_TIMEOUT_SECS: {v}")))?;
            config.wait_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Defaults for a given endpoint; scenario tests tighten the poll and
    /// wait bounds when running against the in-memory plane.
    pub fn for_endpoint(auth_url: &str) -> Self {
        Self {
            auth_url: auth_url.trim_end_matches('/').to_string(),
            flavor_ref: "1".to_string(),
            image_ref: None,
            volume_device_name: "vdb".to_string(),
            disk_format: "vmdk".to_string(),
            iso_image_url: None,
            poll_interval: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
        }
    }
}
