use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Ad hosts whose requests are aborted while sniffing.
pub const AD_HINTS: &[&str] = &[
    "doubleclick",
    "googlesyndication",
    "adservice",
    "popads",
    "ads.",
];

const CLICK_TIMEOUT: Duration = Duration::from_secs(1);

/// Index into the list of script-reachable documents of a page (top document
/// first, then same-origin frames in DOM order). Cross-origin frames cannot
/// be scripted and never appear in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef(pub usize);

/// Outcome of a best-effort UI interaction. Heuristics never raise: they
/// either did something, found nothing to do, or report that the engine
/// itself misbehaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Triggered,
    NoTarget,
    EngineError(String),
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Script-reachable frames at this moment. Errors degrade to empty.
    async fn frames(&self) -> Vec<FrameRef>;
    /// Click the first element matching `selector` inside `frame`.
    async fn try_click(&self, frame: FrameRef, selector: &str) -> Interaction;
    /// Force `play()` on every video element inside `frame`.
    async fn force_play(&self, frame: FrameRef) -> Interaction;
    async fn close(&self);
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open an isolated session on `url` with ad blocking installed and
    /// navigation already attempted (a failed navigation is tolerated).
    /// The receiver yields the URL of every observed network response.
    async fn open(
        &self,
        url: &str,
    ) -> anyhow::Result<(Box<dyn BrowserSession>, mpsc::UnboundedReceiver<String>)>;
}

/// Process-wide switch for the automation engine. Written once, on the first
/// fatal engine failure, and read before every sniff attempt so a missing
/// browser runtime costs one failed launch instead of one per URL.
#[derive(Debug, Default)]
pub struct EngineGate {
    disabled: AtomicBool,
}

impl EngineGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Relaxed);
    }
}

pub struct ChromiumEngine {
    nav_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_ad_request(url: &str) -> bool {
    AD_HINTS.iter().any(|hint| url.contains(hint))
}

/// Page targets other than the one under automation are popups spawned by
/// the site; workers and other target kinds are left alone.
fn is_popup_target(kind: &str, target: &str, main_target: &str) -> bool {
    kind == "page" && target != main_target
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open(
        &self,
        url: &str,
    ) -> anyhow::Result<(Box<dyn BrowserSession>, mpsc::UnboundedReceiver<String>)> {
        use chromiumoxide::browser::{Browser, BrowserConfig};
        use chromiumoxide::cdp::browser_protocol::fetch::{
            ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
            FailRequestParams,
        };
        use chromiumoxide::cdp::browser_protocol::network::{
            EnableParams, ErrorReason, EventResponseReceived,
        };
        use chromiumoxide::cdp::browser_protocol::target::{
            CloseTargetParams, EventTargetCreated, SetDiscoverTargetsParams,
        };
        use futures::StreamExt;

        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| anyhow!("failed to configure browser: {}", e))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("failed to launch browser: {}", e))?;
        tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;

        page.execute(FetchEnableParams::default()).await?;
        let mut paused = page.event_listener::<EventRequestPaused>().await?;
        let interceptor_page = page.clone();
        tokio::spawn(async move {
            while let Some(ev) = paused.next().await {
                let request_url = ev.request.url.clone();
                let result = if is_ad_request(&request_url) {
                    tracing::debug!("blocked {}", request_url);
                    interceptor_page
                        .execute(FailRequestParams::new(
                            ev.request_id.clone(),
                            ErrorReason::Aborted,
                        ))
                        .await
                        .map(|_| ())
                } else {
                    interceptor_page
                        .execute(ContinueRequestParams::new(ev.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = result {
                    tracing::trace!("request interception lapsed: {}", e);
                }
            }
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        tokio::spawn(async move {
            while let Some(ev) = responses.next().await {
                if tx.send(ev.response.url.clone()).is_err() {
                    break;
                }
            }
        });

        // Popup pages spawned by clicks carry neither the ad interceptor nor
        // the response listener, both installed on the main page only; they
        // get closed as soon as they appear.
        browser.execute(SetDiscoverTargetsParams::new(true)).await?;
        let mut created = browser.event_listener::<EventTargetCreated>().await?;
        let main_target = page.target_id().clone();
        let browser = Arc::new(Mutex::new(browser));
        let popup_closer = Arc::clone(&browser);
        tokio::spawn(async move {
            while let Some(ev) = created.next().await {
                let info = &ev.target_info;
                if !is_popup_target(&info.r#type, info.target_id.as_ref(), main_target.as_ref()) {
                    continue;
                }
                tracing::debug!("closing popup {}", info.url);
                let browser = popup_closer.lock().await;
                if let Err(e) = browser
                    .execute(CloseTargetParams::new(info.target_id.clone()))
                    .await
                {
                    tracing::trace!("popup close failed: {}", e);
                }
            }
        });

        // Heavy pages routinely exceed any navigation budget; responses keep
        // flowing either way, so a timed-out or failed goto is not fatal.
        match tokio::time::timeout(self.nav_timeout, page.goto(url.to_string())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("navigation to {} failed: {}", url, e),
            Err(_) => tracing::debug!("navigation to {} timed out", url),
        }

        let session = ChromiumSession { browser, page };
        Ok((Box::new(session), rx))
    }
}

struct ChromiumSession {
    browser: Arc<Mutex<chromiumoxide::Browser>>,
    page: chromiumoxide::Page,
}

const DOC_WALKER: &str = r#"
    const docs = [];
    const walk = (doc) => {
        docs.push(doc);
        for (const f of doc.querySelectorAll('iframe,frame')) {
            try { if (f.contentDocument) walk(f.contentDocument); } catch (_) {}
        }
    };
    walk(document);
"#;

impl ChromiumSession {
    async fn evaluate_interaction(&self, js: String) -> Interaction {
        let outcome = tokio::time::timeout(CLICK_TIMEOUT, self.page.evaluate(js)).await;
        match outcome {
            Ok(Ok(result)) => match result.into_value::<String>() {
                Ok(v) if v == "triggered" => Interaction::Triggered,
                Ok(_) => Interaction::NoTarget,
                Err(e) => Interaction::EngineError(e.to_string()),
            },
            Ok(Err(e)) => Interaction::EngineError(e.to_string()),
            Err(_) => Interaction::EngineError("evaluate timed out".to_string()),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn frames(&self) -> Vec<FrameRef> {
        let js = format!("(() => {{ {DOC_WALKER} return docs.length; }})()");
        let count = match self.page.evaluate(js).await {
            Ok(result) => result.into_value::<usize>().unwrap_or(0),
            Err(e) => {
                tracing::trace!("frame enumeration failed: {}", e);
                0
            }
        };
        (0..count).map(FrameRef).collect()
    }

    async fn try_click(&self, frame: FrameRef, selector: &str) -> Interaction {
        let sel = match serde_json::to_string(selector) {
            Ok(s) => s,
            Err(e) => return Interaction::EngineError(e.to_string()),
        };
        let js = format!(
            "(() => {{ {DOC_WALKER}
                const doc = docs[{idx}];
                if (!doc) return 'gone';
                const el = doc.querySelector({sel});
                if (!el) return 'miss';
                el.click();
                return 'triggered';
            }})()",
            idx = frame.0,
        );
        self.evaluate_interaction(js).await
    }

    async fn force_play(&self, frame: FrameRef) -> Interaction {
        let js = format!(
            "(() => {{ {DOC_WALKER}
                const doc = docs[{idx}];
                if (!doc) return 'gone';
                const vids = doc.querySelectorAll('video');
                if (!vids.length) return 'miss';
                vids.forEach(v => {{
                    v.muted = true;
                    const p = v.play();
                    if (p && p.catch) p.catch(() => {{}});
                }});
                return 'triggered';
            }})()",
            idx = frame.0,
        );
        self.evaluate_interaction(js).await
    }

    async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {}", e);
        }
        let _ = browser.wait().await;
    }
}
