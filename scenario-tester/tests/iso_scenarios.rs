//! End-to-end boot/snapshot/volume scenarios, driven against the in-memory
//! control plane.

use std::time::Duration;

use anyhow::Result;
use ostack_client::{ClientManager, Config};
use ostack_common::{Credentials, OstackError, ServerStatus};
use ostack_mock::{create_router, CloudState};
use scenario_tester::{ScenarioContext, ScenarioError};
use tokio::net::TcpListener;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// Serve the mock plane on an ephemeral port.
async fn spawn_mock() -> (String, tokio::task::JoinHandle<()>) {
    let state = CloudState::new(Duration::from_millis(20));
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), handle)
}

fn mock_config(endpoint: &str) -> Config {
    let mut config = Config::for_endpoint(endpoint);
    config.poll_interval = Duration::from_millis(10);
    config.wait_timeout = Duration::from_secs(10);
    config.iso_image_url = Some("http://repo.local/images/boot.iso".to_string());
    config
}

async fn setup() -> Result<(ScenarioContext, tokio::task::JoinHandle<()>)> {
    init_tracing();
    let (endpoint, handle) = spawn_mock().await;
    let ctx = ScenarioContext::setup(mock_config(&endpoint)).await?;
    Ok((ctx, handle))
}

macro_rules! run_or_skip {
    ($ctx:expr, $fut:expr) => {
        match $fut.await {
            Ok(value) => value,
            Err(ScenarioError::Skipped(reason)) => {
                warn!(%reason, "scenario skipped");
                $ctx.teardown().await;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    };
}

#[tokio::test]
async fn test_boot() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_server(true));
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_boot_no_root_disk() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_server(false));
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_snapshot_instance() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let image_id = run_or_skip!(ctx, ctx.snapshot_server(true));
    let image = ctx.clients.images.get_image(&image_id).await?;
    assert_eq!(image.status, ostack_common::ImageStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_snapshot_instance_no_root_disk() -> Result<()> {
    let (ctx, handle) = setup().await?;
    // Snapshotting a rootless instance fails on the backend; the scenario
    // succeeds when the snapshot image terminates deleted.
    let image_id = run_or_skip!(ctx, ctx.snapshot_server(false));
    let image = ctx.clients.images.get_image(&image_id).await?;
    assert_eq!(image.status, ostack_common::ImageStatus::Deleted);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_boot_from_snapshot() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_from_snapshot());
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_volume_from_snapshot_is_available_before_use() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let volume = run_or_skip!(ctx, ctx.create_volume_from_snapshot());
    assert_eq!(volume.status, ostack_common::VolumeStatus::Available);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_boot_from_volume() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_from_volume());
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_boot_from_volume_snapshot() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_from_volume_snapshot());
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_boot_from_image_copied_from_volume() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let server = run_or_skip!(ctx, ctx.boot_from_image_copied_from_volume());
    assert_eq!(server.status, ServerStatus::Active);
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_attach_volume() -> Result<()> {
    let (ctx, handle) = setup().await?;
    run_or_skip!(ctx, ctx.attach_volume());
    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_iso_scenarios_skip_without_iso_url() -> Result<()> {
    init_tracing();
    let (endpoint, handle) = spawn_mock().await;
    let mut config = mock_config(&endpoint);
    config.iso_image_url = None;
    let ctx = ScenarioContext::setup(config).await?;

    let err = ctx.boot_server(true).await.unwrap_err();
    assert!(matches!(err, ScenarioError::Skipped(_)));
    // The whole ISO-dependent chain short-circuits the same way.
    let err = ctx.snapshot_server(true).await.unwrap_err();
    assert!(matches!(err, ScenarioError::Skipped(_)));
    let err = ctx.boot_from_volume().await.unwrap_err();
    assert!(matches!(err, ScenarioError::Skipped(_)));

    ctx.teardown().await;
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_teardown_deletes_tracked_resources() -> Result<()> {
    let (ctx, handle) = setup().await?;
    let config = ctx.config.clone();
    let server = run_or_skip!(ctx, ctx.boot_server(true));
    ctx.teardown().await;

    // A fresh session must no longer see the booted server.
    let creds = Credentials {
        username: "observer".to_string(),
        tenant: "observer-tenant".to_string(),
        password: "pw".to_string(),
    };
    let clients = ClientManager::new(config, &creds)?;
    let err = clients.compute.get_server(&server.id).await.unwrap_err();
    assert!(matches!(err, OstackError::NotFound(_)));
    handle.abort();
    Ok(())
}
