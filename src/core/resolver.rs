use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;

use crate::core::browser::{BrowserEngine, EngineGate};
use crate::core::extractor;
use crate::core::http_client::PageFetcher;
use crate::core::prober::{self, StreamProber};
use crate::core::ranker;
use crate::core::sniffer;
use crate::models::candidate::{Candidate, CandidateOrigin, Resolution};
use crate::ui::{format_size, Presenter};

/// Orchestrates one resolution attempt per input URL.
///
/// Direct stream URLs are probed as-is. Page URLs go through extraction and
/// probing; when nothing qualifies at the configured minimum and the
/// automation engine is still available, one sniffing pass merges freshly
/// discovered URLs into the pool before the final ranking. The effective
/// minimum starts at the configured value on every call and is only ever
/// relaxed by the ranker.
pub struct Resolver<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub prober: &'a dyn StreamProber,
    pub browser: &'a dyn BrowserEngine,
    pub gate: &'a EngineGate,
    pub ui: &'a dyn Presenter,
    pub min_height: u32,
    pub sniff_window: Duration,
    pub sniff_poll: Duration,
}

impl<'a> Resolver<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        prober: &'a dyn StreamProber,
        browser: &'a dyn BrowserEngine,
        gate: &'a EngineGate,
        ui: &'a dyn Presenter,
        min_height: u32,
    ) -> Self {
        Self {
            fetcher,
            prober,
            browser,
            gate,
            ui,
            min_height,
            sniff_window: sniffer::SNIFF_WINDOW,
            sniff_poll: sniffer::POLL_INTERVAL,
        }
    }

    pub async fn resolve(&self, url: &str) -> anyhow::Result<Resolution> {
        if extractor::looks_like_stream(url) {
            let probed = self
                .prober
                .probe(Candidate::new(url, CandidateOrigin::Direct))
                .await;
            if let Some(err) = probed.probe_error.clone() {
                return Err(anyhow::anyhow!("no usable stream: {} ({})", url, err));
            }
            return self.present(vec![probed]);
        }

        let html = match self.fetcher.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("page fetch of {} failed: {}", url, e);
                self.ui.log(&format!("Could not fetch {}: {}", url, e));
                String::new()
            }
        };

        let extracted: Vec<Candidate> = extractor::extract_embed_urls(&html)
            .into_iter()
            .map(|u| Candidate::new(u, CandidateOrigin::Extracted))
            .collect();
        let mut pool = prober::probe_all(self.prober, extracted).await;

        if ranker::qualifying(&pool, self.min_height).is_empty() && self.gate.available() {
            self.ui.log("Sniffing stream URLs via browser automation");
            match sniffer::sniff_with_window(
                self.browser,
                self.gate,
                url,
                self.ui,
                self.sniff_window,
                self.sniff_poll,
            )
            .await
            {
                Ok(discovered) => {
                    let known: HashSet<String> = pool.iter().map(|c| c.url.clone()).collect();
                    let fresh: Vec<Candidate> = discovered
                        .into_iter()
                        .filter(|u| !known.contains(u))
                        .map(|u| Candidate::new(u, CandidateOrigin::Sniffed))
                        .collect();
                    let fresh = prober::probe_all(self.prober, fresh).await;
                    pool.extend(fresh);
                }
                Err(e) => {
                    self.ui.log(&format!("Sniff failed: {:#}", e));
                }
            }
        }

        self.present(pool)
    }

    fn present(&self, pool: Vec<Candidate>) -> anyhow::Result<Resolution> {
        let ranked =
            ranker::rank(pool, self.min_height).context("resolution found no usable stream")?;

        self.ui.log("Discovered streams:");
        for (i, c) in ranked.ordered.iter().enumerate() {
            let height = if c.height > 0 {
                format!("{}p", c.height)
            } else {
                "?".to_string()
            };
            let note = c
                .probe_error
                .as_deref()
                .map(|e| format!("  [probe failed: {}]", e))
                .unwrap_or_default();
            self.ui.log(&format!(
                "{:>3}  {:>6}  {:>9}  {}{}",
                i + 1,
                height,
                format_size(c.size_bytes),
                c.url,
                note
            ));
        }

        let answer = self.ui.prompt("Which URL to use? [1]: ");
        let selected = answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|i| *i < ranked.ordered.len())
            .unwrap_or(0);

        let mut queue = Vec::with_capacity(ranked.ordered.len());
        queue.push(ranked.ordered[selected].clone());
        queue.extend(
            ranked
                .ordered
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != selected)
                .map(|(_, c)| c.clone()),
        );

        Ok(Resolution {
            queue,
            effective_min: ranked.effective_min,
        })
    }
}
