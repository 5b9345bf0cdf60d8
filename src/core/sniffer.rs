use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use tokio::time::Instant;

use crate::core::browser::{BrowserEngine, EngineGate, FrameRef, Interaction};
use crate::core::extractor;
use crate::ui::Presenter;

pub const SNIFF_WINDOW: Duration = Duration::from_secs(30);
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Interaction attempts per frame, most specific first. The first selector
/// that actually triggers wins; the rest are skipped for that frame.
const PLAY_SELECTORS: &[&str] = &[
    "button[aria-label*='play' i]",
    "button",
    "div[role=button]",
    "div[id*=play]",
    "div[class*=play]",
    "span[class*=play]",
    "video",
];

/// Discover stream URLs by driving a browser session on `url` for a bounded
/// window, poking play controls in every frame and recording network
/// responses that end in a streaming extension. Callers pass `SNIFF_WINDOW`
/// and `POLL_INTERVAL` in production; tests shrink both.
///
/// Only an engine that cannot be opened at all is an error; it also trips
/// `gate` so the rest of the run skips sniffing. Everything that goes wrong
/// inside the session is logged and swallowed.
pub async fn sniff_with_window(
    engine: &dyn BrowserEngine,
    gate: &EngineGate,
    url: &str,
    ui: &dyn Presenter,
    window: Duration,
    poll: Duration,
) -> anyhow::Result<Vec<String>> {
    let (session, mut responses) = match engine.open(url).await {
        Ok(pair) => pair,
        Err(e) => {
            gate.disable();
            return Err(e).with_context(|| format!("browser automation unavailable for {}", url));
        }
    };

    let mut triggered: HashSet<FrameRef> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut found: Vec<String> = Vec::new();
    let deadline = Instant::now() + window;

    while Instant::now() < deadline {
        for frame in session.frames().await {
            if !triggered.insert(frame) {
                continue;
            }
            for selector in PLAY_SELECTORS {
                match session.try_click(frame, selector).await {
                    Interaction::Triggered => break,
                    Interaction::NoTarget => continue,
                    Interaction::EngineError(e) => {
                        tracing::trace!("click {:?} in {:?} failed: {}", selector, frame, e);
                        continue;
                    }
                }
            }
            // Autoplay-blocked players often need a direct nudge on top of
            // the click.
            if let Interaction::EngineError(e) = session.force_play(frame).await {
                tracing::trace!("force play in {:?} failed: {}", frame, e);
            }
        }

        let pass_end = deadline.min(Instant::now() + poll);
        loop {
            match tokio::time::timeout_at(pass_end, responses.recv()).await {
                Ok(Some(response_url)) => {
                    record_stream_url(&response_url, &mut seen, &mut found, ui);
                }
                Ok(None) => {
                    tokio::time::sleep_until(pass_end).await;
                    break;
                }
                Err(_) => break,
            }
        }
    }

    while let Ok(response_url) = responses.try_recv() {
        record_stream_url(&response_url, &mut seen, &mut found, ui);
    }

    session.close().await;
    Ok(found)
}

fn record_stream_url(
    response_url: &str,
    seen: &mut HashSet<String>,
    found: &mut Vec<String>,
    ui: &dyn Presenter,
) {
    if !extractor::looks_like_stream(response_url) {
        return;
    }
    if seen.insert(response_url.to_string()) {
        tracing::info!("sniffed stream {}", response_url);
        ui.log(&format!("Found {}", response_url));
        found.push(response_url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::BrowserSession;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    struct Quiet;

    impl Presenter for Quiet {
        fn log(&self, _msg: &str) {}
        fn update_progress(&self, _name: &str, _percent: f64, _speed: &str, _eta: &str) {}
        fn prompt(&self, _message: &str) -> String {
            String::new()
        }
    }

    #[derive(Clone)]
    struct FakeSession {
        frames: Vec<FrameRef>,
        clicks: Arc<Mutex<Vec<(usize, String)>>>,
        /// Selector that reports a successful interaction.
        clickable: Option<&'static str>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn frames(&self) -> Vec<FrameRef> {
            self.frames.clone()
        }

        async fn try_click(&self, frame: FrameRef, selector: &str) -> Interaction {
            self.clicks
                .lock()
                .unwrap()
                .push((frame.0, selector.to_string()));
            if Some(selector) == self.clickable {
                Interaction::Triggered
            } else {
                Interaction::NoTarget
            }
        }

        async fn force_play(&self, _frame: FrameRef) -> Interaction {
            Interaction::NoTarget
        }

        async fn close(&self) {}
    }

    struct FakeEngine {
        responses: Vec<String>,
        session: FakeSession,
        fail_open: bool,
    }

    impl FakeEngine {
        fn with_responses(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                session: FakeSession {
                    frames: vec![FrameRef(0)],
                    clicks: Arc::new(Mutex::new(Vec::new())),
                    clickable: None,
                },
                fail_open: false,
            }
        }
    }

    #[async_trait]
    impl BrowserEngine for FakeEngine {
        async fn open(
            &self,
            _url: &str,
        ) -> anyhow::Result<(Box<dyn BrowserSession>, mpsc::UnboundedReceiver<String>)> {
            if self.fail_open {
                return Err(anyhow::anyhow!("chromium binary not found"));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            for r in &self.responses {
                let _ = tx.send(r.clone());
            }
            Ok((Box::new(self.session.clone()), rx))
        }
    }

    async fn quick_sniff(engine: &FakeEngine, gate: &EngineGate) -> anyhow::Result<Vec<String>> {
        sniff_with_window(
            engine,
            gate,
            "https://example.com/page",
            &Quiet,
            Duration::from_millis(120),
            Duration::from_millis(30),
        )
        .await
    }

    #[tokio::test]
    async fn records_stream_urls_filtered_and_deduplicated() {
        let engine = FakeEngine::with_responses(&[
            "https://cdn.example/master.m3u8?token=1",
            "https://cdn.example/master.m3u8?token=1",
            "https://cdn.example/ad-frame.html",
            "https://cdn.example/clip.mp4",
            "https://cdn.example/stream.mpd?sig=abc",
        ]);
        let gate = EngineGate::new();
        let found = quick_sniff(&engine, &gate).await.unwrap();
        assert_eq!(
            found,
            vec![
                "https://cdn.example/master.m3u8?token=1".to_string(),
                "https://cdn.example/clip.mp4".to_string(),
                "https://cdn.example/stream.mpd?sig=abc".to_string(),
            ]
        );
        assert!(gate.available());
    }

    #[tokio::test]
    async fn first_successful_selector_wins_and_frames_trigger_once() {
        let mut engine = FakeEngine::with_responses(&[]);
        engine.session.clickable = Some("button");
        let clicks = engine.session.clicks.clone();

        let gate = EngineGate::new();
        quick_sniff(&engine, &gate).await.unwrap();

        let clicks = clicks.lock().unwrap();
        // Selector list stops after the first hit, and the frame is never
        // interacted with again on later polls.
        assert_eq!(
            *clicks,
            vec![
                (0, "button[aria-label*='play' i]".to_string()),
                (0, "button".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn open_failure_trips_the_gate() {
        let mut engine = FakeEngine::with_responses(&[]);
        engine.fail_open = true;
        let gate = EngineGate::new();

        let result = quick_sniff(&engine, &gate).await;
        assert!(result.is_err());
        assert!(!gate.available());
    }
}
