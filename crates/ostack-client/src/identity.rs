use std::sync::Mutex;

use ostack_common::{Credentials, IssueCredentialsRequest, Result};
use tracing::{info, instrument};

use crate::http::HttpClient;
use crate::Config;

/// Issues throwaway admin credentials and remembers them so a suite can
/// release everything it was granted at teardown.
#[derive(Debug)]
pub struct IdentityClient {
    http: HttpClient,
    issued: Mutex<Vec<String>>,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http: HttpClient::new(http, config.auth_url.clone(), None),
            issued: Mutex::new(Vec::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_admin_creds(&self, name: &str) -> Result<Credentials> {
        let creds: Credentials = self
            .http
            .post_json(
                "/v2/identity/credentials",
                &IssueCredentialsRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        info!(username = %creds.username, tenant = %creds.tenant, "Issued isolated credentials");
        self.issued
            .lock()
            .expect("credentials bookkeeping lock poisoned")
            .push(creds.username.clone());
        Ok(creds)
    }

    /// Release every credential issued through this client.
    pub async fn clear_isolated_creds(&self) -> Result<()> {
        let usernames: Vec<String> = self
            .issued
            .lock()
            .expect("credentials bookkeeping lock poisoned")
            .drain(..)
            .collect();
        for username in usernames {
            self.http
                .delete(&format!("/v2/identity/credentials/{username}"))
                .await?;
        }
        Ok(())
    }
}
