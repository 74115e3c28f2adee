//! Scenario fixture for the boot/snapshot/volume workflows. A
//! `ScenarioContext` owns isolated credentials, the service clients, the two
//! suite flavors (with and without a root disk), and the cleanup registry
//! every created resource is recorded in.

use std::sync::{Arc, Mutex};

use ostack_client::{ClientManager, Config, IdentityClient};
use ostack_common::{
    rand_name, BlockDeviceMapping, Flavor, Image, ImageStatus, OstackError, Server, ServerStatus,
    Volume, VolumeStatus,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum ScenarioError {
    /// The scenario cannot run in this configuration; callers report it as
    /// skipped, never as failed.
    #[error("skipped: {0}")]
    Skipped(String),

    #[error(transparent)]
    Client(#[from] OstackError),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Per-suite bookkeeping of everything created remotely. Ids are recorded
/// immediately after each successful create so teardown can always attempt
/// deletion.
#[derive(Debug, Default)]
struct Registry {
    images: Mutex<Vec<String>>,
    servers: Mutex<Vec<String>>,
    volumes: Mutex<Vec<String>>,
    snapshots: Mutex<Vec<String>>,
}

impl Registry {
    fn track(list: &Mutex<Vec<String>>, id: &str) {
        list.lock()
            .expect("cleanup registry lock poisoned")
            .push(id.to_string());
    }

    fn drain(list: &Mutex<Vec<String>>) -> Vec<String> {
        list.lock()
            .expect("cleanup registry lock poisoned")
            .drain(..)
            .collect()
    }
}

pub struct ScenarioContext {
    pub config: Arc<Config>,
    pub clients: ClientManager,
    identity: IdentityClient,
    flavor: Flavor,
    flavor_no_rd: Flavor,
    registry: Registry,
}

impl ScenarioContext {
    /// Suite setup: isolated admin credentials, clients bound to them, and
    /// the two flavors the boot scenarios choose between. Any failure here
    /// aborts the suite.
    #[instrument(skip(config))]
    pub async fn setup(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let identity = ostack_client::identity_client(&config).map_err(ScenarioError::Client)?;
        let creds = identity.get_admin_creds("iso-scenarios").await?;
        let clients = ClientManager::new(config.clone(), &creds).map_err(ScenarioError::Client)?;

        let flavor = Self::create_flavor(&clients, 1).await?;
        let flavor_no_rd = Self::create_flavor(&clients, 0).await?;
        info!(flavor = %flavor.id, flavor_no_rd = %flavor_no_rd.id, "suite flavors created");

        Ok(Self {
            config,
            clients,
            identity,
            flavor,
            flavor_no_rd,
            registry: Registry::default(),
        })
    }

    async fn create_flavor(clients: &ClientManager, disk: u32) -> Result<Flavor> {
        let name = rand_name("iso-scenarios-flavor");
        let flavor = clients
            .flavors
            .create_flavor(&name, 512, 1, disk, None)
            .await?;
        Ok(flavor)
    }

    /// Register an ISO image from the configured URL, or signal a skip when
    /// no URL is configured.
    #[instrument(skip(self))]
    pub async fn upload_iso_image(&self) -> Result<Image> {
        let iso_url = self.config.iso_image_url.as_deref().ok_or_else(|| {
            ScenarioError::Skipped("iso image url is not configured".to_string())
        })?;
        let name = rand_name("iso-scenarios-image");
        let image = self
            .clients
            .images
            .create_image(&name, "bare", "iso", iso_url, true)
            .await?;
        Registry::track(&self.registry.images, &image.id);
        Ok(image)
    }

    /// Upload an ISO and boot a server from it, with or without a root
    /// disk. Returns the server once it is ACTIVE.
    #[instrument(skip(self))]
    pub async fn boot_server(&self, root_disk: bool) -> Result<Server> {
        let image = self.upload_iso_image().await?;
        let flavor = if root_disk {
            &self.flavor
        } else {
            &self.flavor_no_rd
        };
        let name = rand_name("iso-scenarios-instance");
        let server = self
            .clients
            .compute
            .create_server(&name, &flavor.id, Some(&image.id))
            .await?;
        Registry::track(&self.registry.servers, &server.id);
        self.clients
            .compute
            .wait_for_server_status(&server.id, ServerStatus::Active)
            .await?;
        let server = self.clients.compute.get_server(&server.id).await?;
        Ok(server)
    }

    /// Boot and snapshot an instance. With a root disk the snapshot image
    /// terminates `active`; without one the operation fails on the backend
    /// and the image terminates `deleted`.
    #[instrument(skip(self))]
    pub async fn snapshot_server(&self, root_disk: bool) -> Result<String> {
        let server = self.boot_server(root_disk).await?;
        let target = if root_disk {
            ImageStatus::Active
        } else {
            ImageStatus::Deleted
        };
        let name = rand_name("iso-scenarios-snapshot");
        let image_id = self
            .clients
            .compute
            .create_image_from_server(&server.id, &name)
            .await?;
        Registry::track(&self.registry.images, &image_id);
        self.clients
            .images
            .wait_for_image_status(&image_id, target)
            .await?;
        Ok(image_id)
    }

    /// Boot a fresh server from an instance snapshot.
    #[instrument(skip(self))]
    pub async fn boot_from_snapshot(&self) -> Result<Server> {
        let image_id = self.snapshot_server(true).await?;
        let name = rand_name("iso-scenarios-instance");
        let server = self
            .clients
            .compute
            .create_server(&name, &self.flavor.id, Some(&image_id))
            .await?;
        Registry::track(&self.registry.servers, &server.id);
        self.clients
            .compute
            .wait_for_server_status(&server.id, ServerStatus::Active)
            .await?;
        let server = self.clients.compute.get_server(&server.id).await?;
        Ok(server)
    }

    /// Boot, snapshot, and copy the snapshot into a new volume; returns the
    /// volume once `available`.
    #[instrument(skip(self))]
    pub async fn create_volume_from_snapshot(&self) -> Result<Volume> {
        let image_id = self.snapshot_server(true).await?;
        let name = rand_name("iso-scenarios-volume");
        let volume = self
            .clients
            .volumes
            .create_volume(1, &name, Some(&image_id))
            .await?;
        Registry::track(&self.registry.volumes, &volume.id);
        self.clients
            .volumes
            .wait_for_volume_status(&volume.id, VolumeStatus::Available)
            .await?;
        let volume = self.clients.volumes.get_volume(&volume.id).await?;
        Ok(volume)
    }

    #[instrument(skip(self))]
    pub async fn boot_from_volume(&self) -> Result<Server> {
        let volume = self.create_volume_from_snapshot().await?;
        self.boot_from_block_device(BlockDeviceMapping::volume("vda", &volume.id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn boot_from_volume_snapshot(&self) -> Result<Server> {
        let volume = self.create_volume_from_snapshot().await?;
        let name = rand_name("iso-scenarios-snap");
        let snapshot = self
            .clients
            .volumes
            .create_snapshot(&volume.id, &name)
            .await?;
        Registry::track(&self.registry.snapshots, &snapshot.id);
        self.clients
            .volumes
            .wait_for_snapshot_status(&snapshot.id, VolumeStatus::Available)
            .await?;
        self.boot_from_block_device(BlockDeviceMapping::snapshot("vda", &snapshot.id))
            .await
    }

    /// Copy a volume out to a new image and boot from that image.
    #[instrument(skip(self))]
    pub async fn boot_from_image_copied_from_volume(&self) -> Result<Server> {
        let volume = self.create_volume_from_snapshot().await?;
        let image_name = rand_name("iso-scenarios-image");
        let image_id = self
            .clients
            .volumes
            .upload_volume(&volume.id, &image_name, &self.config.disk_format)
            .await?;
        Registry::track(&self.registry.images, &image_id);
        self.clients
            .images
            .wait_for_image_status(&image_id, ImageStatus::Active)
            .await?;
        self.clients
            .volumes
            .wait_for_volume_status(&volume.id, VolumeStatus::Available)
            .await?;

        let name = rand_name("iso-scenarios-instance");
        let server = self
            .clients
            .compute
            .create_server(&name, &self.flavor.id, Some(&image_id))
            .await?;
        Registry::track(&self.registry.servers, &server.id);
        self.clients
            .compute
            .wait_for_server_status(&server.id, ServerStatus::Active)
            .await?;
        let server = self.clients.compute.get_server(&server.id).await?;
        Ok(server)
    }

    /// Boot a server, attach a blank volume until `in-use`, then detach and
    /// delete it.
    #[instrument(skip(self))]
    pub async fn attach_volume(&self) -> Result<()> {
        let server = self.boot_server(true).await?;

        let name = rand_name("iso-scenarios-vol");
        let volume = self.clients.volumes.create_volume(1, &name, None).await?;
        Registry::track(&self.registry.volumes, &volume.id);
        self.clients
            .volumes
            .wait_for_volume_status(&volume.id, VolumeStatus::Available)
            .await?;

        let device = format!("/dev/{}", self.config.volume_device_name);
        self.clients
            .compute
            .attach_volume(&server.id, &volume.id, &device)
            .await?;
        self.clients
            .volumes
            .wait_for_volume_status(&volume.id, VolumeStatus::InUse)
            .await?;

        self.clients
            .compute
            .detach_volume(&server.id, &volume.id)
            .await?;
        self.clients
            .volumes
            .wait_for_volume_status(&volume.id, VolumeStatus::Available)
            .await?;

        self.clients.volumes.delete_volume(&volume.id).await?;
        self.clients
            .volumes
            .wait_for_resource_deletion(&volume.id)
            .await?;
        Ok(())
    }

    async fn boot_from_block_device(&self, mapping: BlockDeviceMapping) -> Result<Server> {
        let name = rand_name("iso-scenarios-instance");
        let server = self
            .clients
            .compute
            .create_server_from_block_device(&name, &mapping)
            .await?;
        Registry::track(&self.registry.servers, &server.id);
        self.clients
            .compute
            .wait_for_server_status(&server.id, ServerStatus::Active)
            .await?;
        let server = self.clients.compute.get_server(&server.id).await?;
        Ok(server)
    }

    /// Suite teardown. Deletes every tracked resource, the suite flavors,
    /// and the isolated credentials. Each step is best effort; failures are
    /// logged and swallowed so cleanup noise never masks a test outcome.
    pub async fn teardown(self) {
        for id in Registry::drain(&self.registry.servers) {
            if let Err(e) = self.clients.compute.delete_server(&id).await {
                warn!(server = %id, error = %e, "failed to delete server");
            }
        }
        for id in Registry::drain(&self.registry.snapshots) {
            if let Err(e) = self.clients.volumes.delete_snapshot(&id).await {
                warn!(snapshot = %id, error = %e, "failed to delete volume snapshot");
            }
        }
        for id in Registry::drain(&self.registry.volumes) {
            if let Err(e) = self.clients.volumes.delete_volume(&id).await {
                warn!(volume = %id, error = %e, "failed to delete volume");
            }
        }
        for id in Registry::drain(&self.registry.images) {
            if let Err(e) = self.clients.images.delete_image(&id).await {
                warn!(image = %id, error = %e, "failed to delete image");
            }
        }
        for flavor in [&self.flavor, &self.flavor_no_rd] {
            if let Err(e) = self.clients.flavors.delete_flavor(&flavor.id).await {
                warn!(flavor = %flavor.id, error = %e, "failed to delete flavor");
            }
        }
        if let Err(e) = self.identity.clear_isolated_creds().await {
            warn!(error = %e, "failed to release isolated credentials");
        }
    }
}
