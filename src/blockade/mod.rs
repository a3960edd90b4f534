pub mod types;

use anyhow::{bail, Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use types::{
    CreateImagineResponse, CreateSkyboxResponse, Generator, GeneratorField, GetImagineResponse,
    ImaginePoll, SkyboxStyle, SkyboxStyleField,
};

pub const DEFAULT_BASE_URL: &str = "https://backend.blockadelabs.com";

/// Fixed per-request timeout the API contract expects.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const JSON_UTF8: &str = "application/json; charset=UTF-8";

/// Client for the Blockade Labs generation API. Stateless beyond the
/// credentials: job status lives server-side and callers hold only the id.
pub struct BlockadeClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl BlockadeClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            http: Client::new(),
        }
    }

    /// GET /api/v1/skybox — styles keyed by numeric-string indices.
    pub async fn get_skybox_styles(&self) -> Result<Vec<SkyboxStyle>> {
        let url = format!("{}/api/v1/skybox", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("skybox styles request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("skybox styles API error {status}: {body}");
        }

        let body = resp
            .text()
            .await
            .context("failed to read skybox styles response")?;
        types::parse_skybox_styles(&body)
    }

    /// GET /api/v1/generators — flat array of generator backends.
    pub async fn get_generators(&self) -> Result<Vec<Generator>> {
        let url = format!("{}/api/v1/generators", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("generators request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("generators API error {status}: {body}");
        }

        resp.json::<Vec<Generator>>()
            .await
            .context("failed to parse generators response")
    }

    /// POST /api/v1/skybox/submit/{styleId} — returns the async job id.
    pub async fn create_skybox(
        &self,
        fields: &[SkyboxStyleField],
        style_id: i32,
    ) -> Result<i32> {
        let url = format!("{}/api/v1/skybox/submit/{}", self.base_url, style_id);
        let body = types::skybox_prompt_body(fields);
        let resp = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body.to_string())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("skybox submit request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("skybox submit API error {status}: {body}");
        }

        let parsed = resp
            .json::<CreateSkyboxResponse>()
            .await
            .context("failed to parse skybox submit response")?;
        parsed.job_id()
    }

    /// POST /api/v1/imagine/requests — returns the async job id.
    pub async fn create_imagine(
        &self,
        fields: &[GeneratorField],
        generator: &str,
    ) -> Result<i32> {
        let url = format!("{}/api/v1/imagine/requests", self.base_url);
        let body = types::imagine_request_body(generator, fields);
        let resp = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body.to_string())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("imagine submit request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("imagine submit API error {status}: {body}");
        }

        let parsed = resp
            .json::<CreateImagineResponse>()
            .await
            .context("failed to parse imagine submit response")?;
        parsed.job_id()
    }

    /// GET /api/v1/imagine/requests/{jobId} — single status check, no loop.
    pub async fn get_imagine(&self, job_id: i32) -> Result<ImaginePoll> {
        let url = format!("{}/api/v1/imagine/requests/{}", self.base_url, job_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("imagine status request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("imagine status API error {status}: {body}");
        }

        let parsed = resp
            .json::<GetImagineResponse>()
            .await
            .context("failed to parse imagine status response")?;
        parsed.into_poll()
    }

    /// GET an arbitrary result URL from a completed poll — raw image bytes.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("image download request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("image download error {status} from {url}");
        }

        let bytes = resp
            .bytes()
            .await
            .context("failed to read image download body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
/// Network-facing tests. Those that need credentials are ignored by default.
mod network_tests {
    use super::*;

    fn client() -> BlockadeClient {
        let api_key = std::env::var("BLOCKADE_API_KEY").unwrap_or_default();
        BlockadeClient::new(DEFAULT_BASE_URL.to_string(), api_key)
    }

    #[tokio::test]
    #[ignore] // Requires BLOCKADE_API_KEY and network access.
    async fn fetches_skybox_styles() {
        let styles = client().get_skybox_styles().await.unwrap();
        assert!(!styles.is_empty());
        assert!(styles.iter().all(|s| s.id > 0));
    }

    #[tokio::test]
    #[ignore] // Requires BLOCKADE_API_KEY and network access.
    async fn fetches_generators() {
        let generators = client().get_generators().await.unwrap();
        assert!(generators.iter().all(|g| !g.generator.is_empty()));
    }

    #[tokio::test]
    async fn unresolvable_host_surfaces_an_error_not_a_panic() {
        // .invalid never resolves, so every operation fails at the transport.
        let client =
            BlockadeClient::new("http://skyforge.invalid".to_string(), "test-key".to_string());
        assert!(client.get_skybox_styles().await.is_err());
        assert!(client.get_generators().await.is_err());
        assert!(client.create_skybox(&[], 1).await.is_err());
        assert!(client.create_imagine(&[], "stable-diffusion").await.is_err());
        assert!(client.get_imagine(1).await.is_err());
        assert!(client.download_image("http://skyforge.invalid/x.png").await.is_err());
    }
}
