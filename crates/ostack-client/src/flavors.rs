use ostack_common::{CreateFlavorRequest, Flavor, Result};
use tracing::instrument;

use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct FlavorsClient {
    http: HttpClient,
}

impl FlavorsClient {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    #[instrument(skip(self))]
    pub async fn create_flavor(
        &self,
        name: &str,
        ram: u32,
        vcpus: u32,
        disk: u32,
        swap: Option<u32>,
    ) -> Result<Flavor> {
        let req = CreateFlavorRequest {
            name: name.to_string(),
            ram,
            vcpus,
            disk,
            swap,
        };
        self.http.post_json("/v2/flavors", &req).await
    }

    pub async fn delete_flavor(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/v2/flavors/{id}")).await
    }
}
