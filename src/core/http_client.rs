use anyhow::anyhow;
use async_trait::async_trait;

/// Plain browser user agent; several embed hosts refuse obvious bot clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| anyhow!("failed to build http client: {}", e))
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> anyhow::Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> anyhow::Result<String> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("page fetch failed: HTTP {}", resp.status()));
        }
        Ok(resp.text().await?)
    }
}

/// Declared size of a remote resource via a HEAD request. Best effort: any
/// failure, redirect loop or missing header is reported as unknown.
pub async fn head_size(client: &reqwest::Client, url: &str) -> Option<u64> {
    let resp = client
        .head(url)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .ok()?;
    resp.headers()
        .get(reqwest::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_the_default_configuration() {
        assert!(build_client().is_ok());
    }
}
