// Types and error taxonomy shared between the service clients, the mock
// control plane, and the scenario fixture.

use std::fmt::Display;

pub use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use uuid;

#[derive(Error, Debug)]
pub enum OstackError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for {resource} to reach {target}")]
    WaitTimeout { resource: String, target: String },

    #[error("{resource} entered {actual} while waiting for {target}")]
    UnexpectedStatus {
        resource: String,
        actual: String,
        target: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Define the primary Result type for client operations
pub type Result<T> = std::result::Result<T, OstackError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerStatus {
    Build,
    Active,
    Error,
    Deleted,
}

impl Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Build => "BUILD",
            ServerStatus::Active => "ACTIVE",
            ServerStatus::Error => "ERROR",
            ServerStatus::Deleted => "DELETED",
        };
        write!(f, "{s}")
    }
}

/// Volume lifecycle states as they appear on the wire. Snapshots of volumes
/// share the `creating`/`available` subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeStatus {
    Creating,
    Available,
    InUse,
    Uploading,
    Deleting,
    Error,
}

impl Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VolumeStatus::Creating => "creating",
            VolumeStatus::Available => "available",
            VolumeStatus::InUse => "in-use",
            VolumeStatus::Uploading => "uploading",
            VolumeStatus::Deleting => "deleting",
            VolumeStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Queued,
    Saving,
    Active,
    Deleted,
    Killed,
}

impl Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImageStatus::Queued => "queued",
            ImageStatus::Saving => "saving",
            ImageStatus::Active => "active",
            ImageStatus::Deleted => "deleted",
            ImageStatus::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub ram: u32,
    pub vcpus: u32,
    pub disk: u32,
    pub swap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: ServerStatus,
    pub flavor_id: String,
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub container_format: String,
    pub disk_format: String,
    pub status: ImageStatus,
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub display_name: String,
    pub size: u32,
    pub status: VolumeStatus,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSnapshot {
    pub id: String,
    pub volume_id: String,
    pub status: VolumeStatus,
}

/// Throwaway admin credentials issued per suite run by the isolated
/// credentials endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub tenant: String,
    pub password: String,
}

// --- Request/response payloads shared by clients and the mock plane ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Legacy v2 mapping of device name to an encoded boot source, e.g.
    /// `{"vda": "<id>:snap::0"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_device_mapping: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFlavorRequest {
    pub name: String,
    pub ram: u32,
    pub vcpus: u32,
    pub disk: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateImageRequest {
    pub name: String,
    pub container_format: String,
    pub disk_format: String,
    /// Source URL the backend pulls the image bits from.
    pub location: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub size: u32,
    pub display_name: String,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotServerRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachVolumeRequest {
    pub volume_id: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeSnapshotRequest {
    pub volume_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadVolumeRequest {
    pub image_name: String,
    pub disk_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCredentialsRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Boot source for a block-device-mapping boot, bypassing the image
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDeviceSource {
    Volume,
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub source_id: String,
    pub source_type: BlockDeviceSource,
    pub delete_on_termination: bool,
}

impl BlockDeviceMapping {
    pub fn volume(device_name: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            source_id: volume_id.into(),
            source_type: BlockDeviceSource::Volume,
            delete_on_termination: false,
        }
    }

    pub fn snapshot(device_name: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            source_id: snapshot_id.into(),
            source_type: BlockDeviceSource::Snapshot,
            delete_on_termination: false,
        }
    }

    /// Encode to the legacy `<id>:<type>:<size>:<delete_on_termination>`
    /// wire form, keyed by device name. The type tag is empty for volumes
    /// and `snap` for volume snapshots; size is left blank.
    pub fn encode(&self) -> (String, String) {
        let tag = match self.source_type {
            BlockDeviceSource::Volume => "",
            BlockDeviceSource::Snapshot => "snap",
        };
        let flag = if self.delete_on_termination { 1 } else { 0 };
        (
            self.device_name.clone(),
            format!("{}:{}::{}", self.source_id, tag, flag),
        )
    }

    /// Parse the wire form back; used by the control plane.
    pub fn decode(device_name: &str, spec: &str) -> Option<Self> {
        let mut parts = spec.split(':');
        let source_id = parts.next().filter(|s| !s.is_empty())?;
        let source_type = match parts.next().unwrap_or_default() {
            "" => BlockDeviceSource::Volume,
            "snap" => BlockDeviceSource::Snapshot,
            _ => return None,
        };
        let _size = parts.next();
        let delete_on_termination = parts.next() == Some("1");
        Some(Self {
            device_name: device_name.to_string(),
            source_id: source_id.to_string(),
            source_type,
            delete_on_termination,
        })
    }
}

/// Random resource name with a short unique suffix, mirroring the naming
/// used for every transient resource in the suite.
pub fn rand_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}
