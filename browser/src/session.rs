//! A scoped browser session (spec §4.3): one page, launched with a
//! specified viewport/DPR, software WebGL, and a relaxed autoplay policy,
//! torn down on every exit path.

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;

use crate::error::BrowserError;
use crate::viewport::Viewport;

/// Backoff sequence for readiness polling (spec §4.3): 100ms, 150, 225,
/// 337, 500, then 500ms steady-state, capped overall at ~3s idle.
const READINESS_BACKOFF_MS: [u64; 5] = [100, 150, 225, 337, 500];
const READINESS_BUDGET: Duration = Duration::from_secs(3);

const AUTO_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);
const EXPLICIT_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct BrowserSession {
    browser: Browser,
    // Kept alive for the session's lifetime; dropping it stops the CDP
    // event pump, so it must outlive every `page` use.
    _handler_task: tokio::task::JoinHandle<()>,
    page: Page,
    viewport: Viewport,
}

impl BrowserSession {
    /// Launches headless Chromium with software-rendered WebGL and a
    /// relaxed autoplay policy (spec §4.3 — many web games are blocked from
    /// starting audio/video without this), at the given viewport/DPR.
    pub async fn launch(viewport: Viewport) -> Result<Self, BrowserError> {
        let config = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .arg("--use-gl=swiftshader")
            .arg("--enable-webgl")
            .arg("--ignore-gpu-blocklist")
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Self {
            browser,
            _handler_task: handler_task,
            page,
            viewport,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Navigates to `url`, then polls for readiness with the spec's backoff
    /// schedule, capped at ~3s idle (spec §4.3).
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> Result<(), BrowserError> {
        let deadline = Instant::now() + READINESS_BUDGET;
        let mut attempt = 0usize;
        loop {
            let ready = self.poll_ready().await?;
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                // Readiness is best-effort: a game that never settles
                // `document.readyState` doesn't block exploration forever,
                // it just proceeds with whatever rendered so far.
                return Ok(());
            }
            let backoff = READINESS_BACKOFF_MS[attempt.min(READINESS_BACKOFF_MS.len() - 1)];
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            attempt += 1;
        }
    }

    async fn poll_ready(&self) -> Result<bool, BrowserError> {
        let script = "document.readyState === 'complete' && \
                      (document.querySelector('canvas') !== null || document.body.childElementCount > 0)";
        let value: bool = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?
            .into_value()
            .unwrap_or(false);
        Ok(value)
    }

    /// Full-viewport screenshot, WebP quality ~25 (spec §4.3). `explicit`
    /// selects the 15s timeout for a direct `screenshot` tool call vs the
    /// 10s auto-screenshot timeout attached to state-changing tools.
    pub async fn screenshot(&self, explicit: bool) -> Option<Vec<u8>> {
        let timeout = if explicit { EXPLICIT_SCREENSHOT_TIMEOUT } else { AUTO_SCREENSHOT_TIMEOUT };
        match tokio::time::timeout(timeout, self.capture_screenshot()).await {
            Ok(Ok(bytes)) => Some(bytes),
            // On timeout or capture failure the caller returns an
            // image-less result and the agent proceeds (spec §4.3).
            _ => None,
        }
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        use chromiumoxide::page::ScreenshotParams;
        use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Webp)
            .quality(25)
            .full_page(false)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::Screenshot(e.to_string()))
    }

    /// Dispatches the full pointer+mouse event sequence at
    /// `document.elementFromPoint(x, y)` rather than a CDP-level click, so
    /// canvas-rendered game engines (which listen for DOM pointer events
    /// rather than CDP input) actually receive it (spec §4.3 click
    /// robustness).
    pub async fn click(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        let script = format!(
            r#"(() => {{
                const el = document.elementFromPoint({x}, {y});
                if (!el) return false;
                const opts = {{ bubbles: true, cancelable: true, clientX: {x}, clientY: {y} }};
                el.dispatchEvent(new PointerEvent('pointerdown', opts));
                el.dispatchEvent(new MouseEvent('mousedown', opts));
                el.dispatchEvent(new PointerEvent('pointerup', opts));
                el.dispatchEvent(new MouseEvent('mouseup', opts));
                el.dispatchEvent(new MouseEvent('click', opts));
                return true;
            }})()"#
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(())
    }

    pub async fn type_text(&self, text: &str) -> Result<(), BrowserError> {
        self.page
            .type_str(text)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(())
    }

    pub async fn scroll(&self, dx: f64, dy: f64) -> Result<(), BrowserError> {
        let script = format!("window.scrollBy({dx}, {dy})");
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(())
    }

    pub async fn wait(&self, millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Truncated to keep results small (the tool surface returns a
    /// JSON-serializable result, truncated — spec §4.3 `evaluate_js`).
    pub async fn evaluate_js(&self, source: &str) -> Result<serde_json::Value, BrowserError> {
        const MAX_RESULT_BYTES: usize = 8 * 1024;
        let result = self
            .page
            .evaluate(source)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        let value: serde_json::Value = result.into_value().unwrap_or(serde_json::Value::Null);
        let serialized = serde_json::to_string(&value).unwrap_or_default();
        if serialized.len() > MAX_RESULT_BYTES {
            Ok(serde_json::json!({
                "truncated": true,
                "preview": serialized.chars().take(MAX_RESULT_BYTES).collect::<String>(),
            }))
        } else {
            Ok(value)
        }
    }

    pub async fn page_info(&self) -> Result<serde_json::Value, BrowserError> {
        let url = self.page.url().await.map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        let title = self.page.get_title().await.map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(serde_json::json!({
            "url": url,
            "title": title,
            "viewport": {
                "width": self.viewport.width,
                "height": self.viewport.height,
                "devicePixelRatio": self.viewport.device_pixel_ratio,
            },
        }))
    }

    /// Closes the page and the browser. Called on every scope-exit path
    /// (spec §4.3: "Release on all exit paths closes the page and the
    /// browser").
    pub async fn close(mut self) {
        let _ = self.page.close().await;
        let _ = self.browser.close().await;
    }
}
