//! In-memory simulation of the OpenStack-style control plane the scenario
//! suite exercises: identity, compute, image, and volume endpoints with
//! asynchronous status transitions. Exists so the boot/snapshot/volume
//! scenarios can run end to end without real infrastructure.

mod handlers;
mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::CloudState;

pub fn create_router(state: CloudState) -> Router {
    Router::new()
        .route("/v2/identity/credentials", post(handlers::issue_credentials))
        .route(
            "/v2/identity/credentials/:username",
            delete(handlers::release_credentials),
        )
        .route("/v2/flavors", post(handlers::create_flavor))
        .route("/v2/flavors/:id", delete(handlers::delete_flavor))
        .route("/v2/images", post(handlers::create_image))
        .route(
            "/v2/images/:id",
            get(handlers::get_image).delete(handlers::delete_image),
        )
        .route("/v2/servers", post(handlers::create_server))
        .route(
            "/v2/servers/:id",
            get(handlers::get_server).delete(handlers::delete_server),
        )
        .route("/v2/servers/:id/snapshot", post(handlers::snapshot_server))
        .route(
            "/v2/servers/:id/volume-attachments",
            post(handlers::attach_volume),
        )
        .route(
            "/v2/servers/:id/volume-attachments/:volume_id",
            delete(handlers::detach_volume),
        )
        .route("/v2/volumes", post(handlers::create_volume))
        .route(
            "/v2/volumes/:id",
            get(handlers::get_volume).delete(handlers::delete_volume),
        )
        .route("/v2/volumes/:id/upload", post(handlers::upload_volume))
        .route(
            "/v2/volume-snapshots",
            post(handlers::create_volume_snapshot),
        )
        .route(
            "/v2/volume-snapshots/:id",
            get(handlers::get_volume_snapshot).delete(handlers::delete_volume_snapshot),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
