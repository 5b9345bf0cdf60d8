use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::core::{http_client, ytdlp};
use crate::models::candidate::Candidate;

/// Upper bound for one probe, covering the yt-dlp process and its network
/// time. A hung probe reports an error instead of stalling the join.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_PARALLEL_PROBES: usize = 4;

#[async_trait]
pub trait StreamProber: Send + Sync {
    /// Fill in height/size for a candidate, or mark it with a probe error.
    /// This never fails outright; a structured outcome always comes back.
    async fn probe(&self, candidate: Candidate) -> Candidate;
}

/// Probe every candidate with bounded parallelism. All results are joined
/// before returning, in the input order, so ranking never observes a
/// partial set.
pub async fn probe_all(prober: &dyn StreamProber, candidates: Vec<Candidate>) -> Vec<Candidate> {
    stream::iter(candidates)
        .map(|candidate| prober.probe(candidate))
        .buffered(MAX_PARALLEL_PROBES)
        .collect()
        .await
}

pub struct YtdlpProber {
    ytdlp: PathBuf,
    client: reqwest::Client,
}

impl YtdlpProber {
    pub fn new(ytdlp: PathBuf, client: reqwest::Client) -> Self {
        Self { ytdlp, client }
    }

    async fn inspect_with_retry(&self, url: &str) -> anyhow::Result<serde_json::Value> {
        let primary = tokio::time::timeout(
            PROBE_TIMEOUT,
            ytdlp::inspect_url(&self.ytdlp, url, true),
        )
        .await
        .unwrap_or_else(|_| Err(anyhow!("probe timed out")));

        match primary {
            Ok(info) => Ok(info),
            Err(first) => {
                // Retry once without the impersonation hint; a handful of
                // hosts reject the impersonated TLS fingerprint.
                tracing::debug!("primary probe of {} failed: {}", url, first);
                tokio::time::timeout(
                    PROBE_TIMEOUT,
                    ytdlp::inspect_url(&self.ytdlp, url, false),
                )
                .await
                .unwrap_or_else(|_| Err(anyhow!("probe timed out")))
            }
        }
    }
}

#[async_trait]
impl StreamProber for YtdlpProber {
    async fn probe(&self, mut candidate: Candidate) -> Candidate {
        match self.inspect_with_retry(&candidate.url).await {
            Ok(info) => {
                candidate.height = ytdlp::best_height(&info);
                candidate.size_bytes = match ytdlp::declared_size(&info) {
                    Some(size) => Some(size),
                    None => http_client::head_size(&self.client, &candidate.url).await,
                };
                candidate.probe_error = None;
            }
            Err(e) => {
                candidate.height = 0;
                candidate.size_bytes = None;
                candidate.probe_error = Some(e.to_string());
            }
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::CandidateOrigin;

    struct ScriptedProber;

    #[async_trait]
    impl StreamProber for ScriptedProber {
        async fn probe(&self, mut candidate: Candidate) -> Candidate {
            // Height derived from the URL so ordering is observable.
            candidate.height = candidate.url.len() as u32;
            candidate
        }
    }

    #[tokio::test]
    async fn probe_all_preserves_input_order() {
        let candidates = vec![
            Candidate::new("https://a/111", CandidateOrigin::Extracted),
            Candidate::new("https://b/2", CandidateOrigin::Extracted),
            Candidate::new("https://c/33333", CandidateOrigin::Sniffed),
        ];
        let probed = probe_all(&ScriptedProber, candidates.clone()).await;
        let urls: Vec<_> = probed.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/111", "https://b/2", "https://c/33333"]);
        assert!(probed.iter().all(|c| c.height > 0));
    }

    #[tokio::test]
    async fn probe_all_handles_empty_input() {
        let probed = probe_all(&ScriptedProber, Vec::new()).await;
        assert!(probed.is_empty());
    }
}
