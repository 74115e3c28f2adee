use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ostack_common::{
    AttachVolumeRequest, BlockDeviceMapping, BlockDeviceSource, CreateFlavorRequest,
    CreateImageRequest, CreateServerRequest, CreateVolumeRequest, CreateVolumeSnapshotRequest,
    Credentials, ErrorBody, Flavor, Image, ImageRef, ImageStatus, IssueCredentialsRequest, Server,
    ServerStatus, SnapshotServerRequest, UploadVolumeRequest, Volume, VolumeSnapshot, VolumeStatus,
};
use tracing::info;
use uuid::Uuid;

use crate::state::{CloudState, ServerRecord};

pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: what.into(),
        }
    }

    fn conflict(what: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: what.into(),
        }
    }

    fn bad_request(what: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: what.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// --- identity ---

pub(crate) async fn issue_credentials(
    State(state): State<CloudState>,
    Json(req): Json<IssueCredentialsRequest>,
) -> (StatusCode, Json<Credentials>) {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    let creds = Credentials {
        username: format!("{}-user-{suffix}", req.name),
        tenant: format!("{}-tenant-{suffix}", req.name),
        password: Uuid::new_v4().to_string(),
    };
    info!(username = %creds.username, "issuing isolated credentials");
    state.credentials.insert(creds.username.clone(), creds.clone());
    (StatusCode::CREATED, Json(creds))
}

pub(crate) async fn release_credentials(
    State(state): State<CloudState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .credentials
        .remove(&username)
        .ok_or_else(|| ApiError::not_found(format!("no credentials for {username}")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- flavors ---

pub(crate) async fn create_flavor(
    State(state): State<CloudState>,
    Json(req): Json<CreateFlavorRequest>,
) -> (StatusCode, Json<Flavor>) {
    let flavor = Flavor {
        id: new_id(),
        name: req.name,
        ram: req.ram,
        vcpus: req.vcpus,
        disk: req.disk,
        swap: req.swap.unwrap_or(0),
    };
    state.flavors.insert(flavor.id.clone(), flavor.clone());
    (StatusCode::CREATED, Json(flavor))
}

pub(crate) async fn delete_flavor(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .flavors
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("no flavor {id}")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- images ---

pub(crate) async fn create_image(
    State(state): State<CloudState>,
    Json(req): Json<CreateImageRequest>,
) -> (StatusCode, Json<Image>) {
    let image = Image {
        id: new_id(),
        name: req.name,
        container_format: req.container_format,
        disk_format: req.disk_format,
        status: ImageStatus::Queued,
        is_public: req.is_public,
    };
    state.images.insert(image.id.clone(), image.clone());
    // Simulated fetch from `location`: queued -> saving -> active.
    let id = image.id.clone();
    state.after_settle(move |state| {
        if let Some(mut img) = state.images.get_mut(&id) {
            img.status = ImageStatus::Saving;
        }
        let id = id.clone();
        state.after_settle(move |state| {
            if let Some(mut img) = state.images.get_mut(&id) {
                img.status = ImageStatus::Active;
            }
        });
    });
    (StatusCode::CREATED, Json(image))
}

pub(crate) async fn get_image(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<Json<Image>, ApiError> {
    state
        .images
        .get(&id)
        .map(|img| Json(img.clone()))
        .ok_or_else(|| ApiError::not_found(format!("no image {id}")))
}

pub(crate) async fn delete_image(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .images
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("no image {id}")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- servers ---

pub(crate) async fn create_server(
    State(state): State<CloudState>,
    Json(req): Json<CreateServerRequest>,
) -> Result<(StatusCode, Json<Server>), ApiError> {
    let mapping = match &req.block_device_mapping {
        Some(map) => {
            let (device, spec) = map
                .iter()
                .next()
                .ok_or_else(|| ApiError::bad_request("empty block device mapping"))?;
            let mapping = BlockDeviceMapping::decode(device, spec).ok_or_else(|| {
                ApiError::bad_request(format!("malformed block device spec {spec}"))
            })?;
            match mapping.source_type {
                BlockDeviceSource::Volume => {
                    let volume = state
                        .volumes
                        .get(&mapping.source_id)
                        .ok_or_else(|| ApiError::not_found("boot volume not found"))?;
                    if volume.status != VolumeStatus::Available {
                        return Err(ApiError::conflict(format!(
                            "boot volume is {}",
                            volume.status
                        )));
                    }
                }
                BlockDeviceSource::Snapshot => {
                    state
                        .snapshots
                        .get(&mapping.source_id)
                        .ok_or_else(|| ApiError::not_found("boot snapshot not found"))?;
                }
            }
            Some(mapping)
        }
        None => None,
    };
    if mapping.is_none() && req.image_ref.is_none() {
        return Err(ApiError::bad_request(
            "either imageRef or block_device_mapping is required",
        ));
    }

    // Boot sources from a block device always carry a root device; image
    // boots inherit it from the flavor.
    let root_disk = match &mapping {
        Some(_) => true,
        None => state
            .flavors
            .get(&req.flavor_ref)
            .map(|f| f.disk > 0)
            .unwrap_or(true),
    };

    let server = Server {
        id: new_id(),
        name: req.name,
        status: ServerStatus::Build,
        flavor_id: req.flavor_ref,
        image_id: req.image_ref.clone(),
    };
    info!(id = %server.id, name = %server.name, "booting server");
    state.servers.insert(
        server.id.clone(),
        ServerRecord {
            server: server.clone(),
            root_disk,
        },
    );

    let id = server.id.clone();
    let image_ref = req.image_ref;
    let booted_from_mapping = mapping.is_some();
    state.after_settle(move |state| {
        let image_ok = booted_from_mapping
            || image_ref
                .as_deref()
                .and_then(|img| state.images.get(img))
                .map(|img| {
                    img.status != ImageStatus::Deleted && img.status != ImageStatus::Killed
                })
                .unwrap_or(false);
        if let Some(mut record) = state.servers.get_mut(&id) {
            record.server.status = if image_ok {
                ServerStatus::Active
            } else {
                ServerStatus::Error
            };
        }
    });
    Ok((StatusCode::ACCEPTED, Json(server)))
}

pub(crate) async fn get_server(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<Json<Server>, ApiError> {
    state
        .servers
        .get(&id)
        .map(|record| Json(record.server.clone()))
        .ok_or_else(|| ApiError::not_found(format!("no server {id}")))
}

pub(crate) async fn delete_server(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .servers
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("no server {id}")))?;
    // Orphaned attachments fall back to available.
    state.attachments.retain(|volume_id, server_id| {
        if *server_id == id {
            if let Some(mut volume) = state.volumes.get_mut(volume_id) {
                volume.status = VolumeStatus::Available;
            }
            false
        } else {
            true
        }
    });
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn snapshot_server(
    State(state): State<CloudState>,
    Path(id): Path<String>,
    Json(req): Json<SnapshotServerRequest>,
) -> Result<(StatusCode, Json<ImageRef>), ApiError> {
    let record = state
        .servers
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("no server {id}")))?;
    if record.server.status != ServerStatus::Active {
        return Err(ApiError::conflict(format!(
            "server is {}",
            record.server.status
        )));
    }
    let root_disk = record.root_disk;
    drop(record);

    let image = Image {
        id: new_id(),
        name: req.name,
        container_format: "bare".to_string(),
        disk_format: "vmdk".to_string(),
        status: ImageStatus::Queued,
        is_public: false,
    };
    state.images.insert(image.id.clone(), image.clone());

    let image_id = image.id.clone();
    state.after_settle(move |state| {
        if let Some(mut img) = state.images.get_mut(&image_id) {
            img.status = ImageStatus::Saving;
        }
        let image_id = image_id.clone();
        state.after_settle(move |state| {
            if let Some(mut img) = state.images.get_mut(&image_id) {
                // Without a root disk there is nothing to capture; the
                // snapshot attempt fails and the image ends up deleted.
                img.status = if root_disk {
                    ImageStatus::Active
                } else {
                    ImageStatus::Deleted
                };
            }
        });
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(ImageRef { image_id: image.id }),
    ))
}

pub(crate) async fn attach_volume(
    State(state): State<CloudState>,
    Path(server_id): Path<String>,
    Json(req): Json<AttachVolumeRequest>,
) -> Result<StatusCode, ApiError> {
    let record = state
        .servers
        .get(&server_id)
        .ok_or_else(|| ApiError::not_found(format!("no server {server_id}")))?;
    if record.server.status != ServerStatus::Active {
        return Err(ApiError::conflict(format!(
            "server is {}",
            record.server.status
        )));
    }
    drop(record);

    let volume = state
        .volumes
        .get(&req.volume_id)
        .ok_or_else(|| ApiError::not_found(format!("no volume {}", req.volume_id)))?;
    if volume.status != VolumeStatus::Available {
        return Err(ApiError::conflict(format!("volume is {}", volume.status)));
    }
    drop(volume);

    info!(server = %server_id, volume = %req.volume_id, device = %req.device, "attaching volume");
    state.attachments.insert(req.volume_id.clone(), server_id);
    let volume_id = req.volume_id;
    state.after_settle(move |state| {
        if let Some(mut volume) = state.volumes.get_mut(&volume_id) {
            volume.status = VolumeStatus::InUse;
        }
    });
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn detach_volume(
    State(state): State<CloudState>,
    Path((server_id, volume_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let attached_to = state
        .attachments
        .get(&volume_id)
        .map(|entry| entry.value().clone());
    match attached_to {
        Some(owner) if owner == server_id => {}
        _ => {
            return Err(ApiError::not_found(format!(
                "volume {volume_id} is not attached to server {server_id}"
            )))
        }
    }
    state.attachments.remove(&volume_id);
    state.after_settle(move |state| {
        if let Some(mut volume) = state.volumes.get_mut(&volume_id) {
            volume.status = VolumeStatus::Available;
        }
    });
    Ok(StatusCode::ACCEPTED)
}

// --- volumes ---

pub(crate) async fn create_volume(
    State(state): State<CloudState>,
    Json(req): Json<CreateVolumeRequest>,
) -> Result<(StatusCode, Json<Volume>), ApiError> {
    if let Some(image_ref) = &req.image_ref {
        state
            .images
            .get(image_ref)
            .ok_or_else(|| ApiError::not_found(format!("no source image {image_ref}")))?;
    }
    let volume = Volume {
        id: new_id(),
        display_name: req.display_name,
        size: req.size,
        status: VolumeStatus::Creating,
        image_ref: req.image_ref,
    };
    state.volumes.insert(volume.id.clone(), volume.clone());

    let id = volume.id.clone();
    let source = volume.image_ref.clone();
    state.after_settle(move |state| {
        let source_ok = match &source {
            Some(image_ref) => state
                .images
                .get(image_ref)
                .map(|img| img.status != ImageStatus::Deleted)
                .unwrap_or(false),
            None => true,
        };
        if let Some(mut volume) = state.volumes.get_mut(&id) {
            volume.status = if source_ok {
                VolumeStatus::Available
            } else {
                VolumeStatus::Error
            };
        }
    });
    Ok((StatusCode::ACCEPTED, Json(volume)))
}

pub(crate) async fn get_volume(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<Json<Volume>, ApiError> {
    state
        .volumes
        .get(&id)
        .map(|volume| Json(volume.clone()))
        .ok_or_else(|| ApiError::not_found(format!("no volume {id}")))
}

pub(crate) async fn delete_volume(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut volume = state
        .volumes
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("no volume {id}")))?;
    if volume.status == VolumeStatus::InUse {
        return Err(ApiError::conflict("volume is in-use"));
    }
    volume.status = VolumeStatus::Deleting;
    drop(volume);

    state.after_settle(move |state| {
        state.volumes.remove(&id);
    });
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn upload_volume(
    State(state): State<CloudState>,
    Path(id): Path<String>,
    Json(req): Json<UploadVolumeRequest>,
) -> Result<(StatusCode, Json<ImageRef>), ApiError> {
    let mut volume = state
        .volumes
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("no volume {id}")))?;
    if volume.status != VolumeStatus::Available {
        return Err(ApiError::conflict(format!("volume is {}", volume.status)));
    }
    volume.status = VolumeStatus::Uploading;
    drop(volume);

    let image = Image {
        id: new_id(),
        name: req.image_name,
        container_format: "bare".to_string(),
        disk_format: req.disk_format,
        status: ImageStatus::Queued,
        is_public: false,
    };
    state.images.insert(image.id.clone(), image.clone());

    let image_id = image.id.clone();
    let volume_id = id;
    state.after_settle(move |state| {
        if let Some(mut img) = state.images.get_mut(&image_id) {
            img.status = ImageStatus::Active;
        }
        if let Some(mut volume) = state.volumes.get_mut(&volume_id) {
            volume.status = VolumeStatus::Available;
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(ImageRef { image_id: image.id }),
    ))
}

// --- volume snapshots ---

pub(crate) async fn create_volume_snapshot(
    State(state): State<CloudState>,
    Json(req): Json<CreateVolumeSnapshotRequest>,
) -> Result<(StatusCode, Json<VolumeSnapshot>), ApiError> {
    let volume = state
        .volumes
        .get(&req.volume_id)
        .ok_or_else(|| ApiError::not_found(format!("no volume {}", req.volume_id)))?;
    if volume.status != VolumeStatus::Available {
        return Err(ApiError::conflict(format!("volume is {}", volume.status)));
    }
    drop(volume);

    let snapshot = VolumeSnapshot {
        id: new_id(),
        volume_id: req.volume_id,
        status: VolumeStatus::Creating,
    };
    state.snapshots.insert(snapshot.id.clone(), snapshot.clone());

    let id = snapshot.id.clone();
    state.after_settle(move |state| {
        if let Some(mut snap) = state.snapshots.get_mut(&id) {
            snap.status = VolumeStatus::Available;
        }
    });
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

pub(crate) async fn get_volume_snapshot(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<Json<VolumeSnapshot>, ApiError> {
    state
        .snapshots
        .get(&id)
        .map(|snap| Json(snap.clone()))
        .ok_or_else(|| ApiError::not_found(format!("no volume snapshot {id}")))
}

pub(crate) async fn delete_volume_snapshot(
    State(state): State<CloudState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .snapshots
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("no volume snapshot {id}")))?;
    Ok(StatusCode::NO_CONTENT)
}
