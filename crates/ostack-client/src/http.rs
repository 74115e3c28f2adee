use ostack_common::{ErrorBody, OstackError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Thin wrapper over a shared `reqwest::Client` bound to one endpoint and
/// one auth token. All service clients go through this.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_token(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("X-Auth-Token", token),
            None => req,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.apply_token(self.http.get(self.url(path))).send().await?;
        let resp = Self::check(path, resp).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .apply_token(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        let resp = Self::check(path, resp).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self
            .apply_token(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        Self::check(path, resp).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .apply_token(self.http.delete(self.url(path)))
            .send()
            .await?;
        Self::check(path, resp).await?;
        Ok(())
    }

    async fn check(path: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(OstackError::NotFound(format!("{path}: {message}")));
        }
        Err(OstackError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
