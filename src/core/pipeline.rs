use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::core::browser::{BrowserEngine, EngineGate};
use crate::core::prober::{self, StreamProber};
use crate::core::ranker;
use crate::core::sniffer;
use crate::core::traits::{DownloadEngine, MediaInspector};
use crate::models::candidate::{Candidate, CandidateOrigin, Resolution};
use crate::ui::Presenter;

/// Works through a ranked candidate queue until one download survives the
/// post-hoc quality check.
///
/// Fallback exploration is iterative: a failed transfer may trigger one
/// re-sniff of the failing candidate's own page, and the qualifying fresh
/// discoveries are prepended to the queue ahead of the stale lower ranks.
pub struct Pipeline<'a> {
    pub engine: &'a dyn DownloadEngine,
    pub inspector: &'a dyn MediaInspector,
    pub browser: &'a dyn BrowserEngine,
    pub gate: &'a EngineGate,
    pub prober: &'a dyn StreamProber,
    pub ui: &'a dyn Presenter,
    pub sniff_window: Duration,
    pub sniff_poll: Duration,
}

impl<'a> Pipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: &'a dyn DownloadEngine,
        inspector: &'a dyn MediaInspector,
        browser: &'a dyn BrowserEngine,
        gate: &'a EngineGate,
        prober: &'a dyn StreamProber,
        ui: &'a dyn Presenter,
    ) -> Self {
        Self {
            engine,
            inspector,
            browser,
            gate,
            prober,
            ui,
            sniff_window: sniffer::SNIFF_WINDOW,
            sniff_poll: sniffer::POLL_INTERVAL,
        }
    }

    pub async fn run(&self, resolution: Resolution) -> anyhow::Result<PathBuf> {
        let effective_min = resolution.effective_min;
        let mut queue: VecDeque<Candidate> = resolution.queue.into();
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(candidate) = queue.pop_front() {
            if !seen.insert(candidate.url.clone()) {
                continue;
            }
            if candidate.height < effective_min {
                self.ui.log(&format!(
                    "Skipping {} ({}p below the {}p floor)",
                    candidate.url, candidate.height, effective_min
                ));
                continue;
            }

            self.ui.log(&format!("Trying {}", candidate.url));
            let (tx, mut rx) = mpsc::channel::<crate::core::ytdlp::ProgressUpdate>(32);
            let forward = async {
                while let Some(update) = rx.recv().await {
                    self.ui
                        .update_progress(&update.name, update.percent, &update.speed, &update.eta);
                }
            };
            let (result, ()) =
                tokio::join!(self.engine.fetch(&candidate.url, effective_min, tx), forward);

            let path = match result {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("transfer of {} failed: {}", candidate.url, e);
                    self.ui.log(&format!(
                        "Engine could not process {}: {}; trying next URL",
                        candidate.url, e
                    ));
                    self.resniff_into_queue(&candidate, effective_min, &seen, &mut queue)
                        .await;
                    continue;
                }
            };

            match self.inspector.video_height(&path).await {
                Ok(height) if height < effective_min => {
                    self.ui.log(&format!(
                        "Delivered {}p is below the {}p floor, discarding {}",
                        height,
                        effective_min,
                        path.display()
                    ));
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        tracing::warn!("could not remove {}: {}", path.display(), e);
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    // Verification is a safety net; a missing ffprobe must
                    // not throw away a finished download.
                    self.ui.log(&format!(
                        "Could not verify {}: {}; keeping it",
                        path.display(),
                        e
                    ));
                }
            }

            self.ui.log(&format!("Finished {}", path.display()));
            return Ok(path);
        }

        Err(anyhow!("all candidates exhausted, nothing downloaded"))
    }

    /// Mine the failing candidate's page for alternatives and push the
    /// qualifying ones to the front of the queue, best first.
    async fn resniff_into_queue(
        &self,
        failed: &Candidate,
        effective_min: u32,
        seen: &HashSet<String>,
        queue: &mut VecDeque<Candidate>,
    ) {
        if !self.gate.available() {
            return;
        }
        let discovered = match sniffer::sniff_with_window(
            self.browser,
            self.gate,
            &failed.url,
            self.ui,
            self.sniff_window,
            self.sniff_poll,
        )
        .await
        {
            Ok(discovered) => discovered,
            Err(e) => {
                self.ui.log(&format!("Sniff failed: {:#}", e));
                return;
            }
        };

        let fresh: Vec<Candidate> = discovered
            .into_iter()
            .filter(|u| !seen.contains(u) && !queue.iter().any(|c| c.url == *u))
            .map(|u| Candidate::new(u, CandidateOrigin::Sniffed))
            .collect();
        if fresh.is_empty() {
            return;
        }

        let probed = prober::probe_all(self.prober, fresh).await;
        let qualified = ranker::sort_by_quality(ranker::qualifying(&probed, effective_min));
        for candidate in qualified.into_iter().rev() {
            queue.push_front(candidate);
        }
    }
}
