use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use gasline_core::config::RenderSettings;
use gasline_core::error::AppError;
use gasline_core::models::RenderedDocument;
use gasline_core::traits::Renderer;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::navigation::navigation_error;
use crate::quiescence::NetworkIdle;

/// Headless-Chromium renderer driven over the DevTools protocol.
///
/// Every [`Renderer::render`] call launches its own browser, navigates,
/// waits for the network to go quiet, captures the DOM, and tears the
/// browser down again. Nothing is shared between runs.
///
/// If the calling future is dropped (run deadline, cancellation) the
/// session guard aborts the CDP handler and `chromiumoxide`
/// kills the child process.
///
/// ```rust,no_run
/// use gasline_client::ChromiumRenderer;
/// use gasline_core::config::RenderSettings;
/// use gasline_core::traits::Renderer;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = ChromiumRenderer::new(RenderSettings::default());
/// let doc = renderer.render("https://gasprices.aaa.com/?state=IN").await?;
/// println!("{} bytes", doc.html().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    settings: RenderSettings,
}

impl ChromiumRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn timeout_error(&self) -> AppError {
        AppError::RenderTimeout(self.settings.timeout.as_millis() as u64)
    }

    fn browser_config(&self) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        // Snap-packaged Chromium ships a wrapper that drops headless flags;
        // prefer the real binary when one can be found.
        if let Some(bin) = find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))
    }

    /// Opens a tab, renders `url`, and closes the tab again.
    async fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedDocument, AppError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open tab: {e}")))?;

        let outcome = self.navigate_and_settle(&page, url).await;
        if let Err(e) = page.close().await {
            tracing::debug!("Tab close failed: {e}");
        }
        outcome
    }

    async fn navigate_and_settle(
        &self,
        page: &Page,
        url: &str,
    ) -> Result<RenderedDocument, AppError> {
        let listen_err = |e: CdpError| {
            AppError::BrowserError(format!("Failed to subscribe to network events: {e}"))
        };
        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen_err)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen_err)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen_err)?;

        page.goto(url).await.map_err(|e| navigation_error(url, e))?;

        let mut idle = NetworkIdle::new(
            self.settings.max_inflight,
            self.settings.idle_window,
            Instant::now(),
        );

        loop {
            let wake = idle
                .idle_at()
                .unwrap_or_else(|| Instant::now() + self.settings.idle_window);

            // Drain queued starts before completions so a request's finish is
            // rarely seen ahead of its start.
            tokio::select! {
                biased;
                Some(event) = started.next() => {
                    idle.request_started(event.request_id.inner(), Instant::now());
                }
                Some(event) = finished.next() => {
                    idle.request_finished(event.request_id.inner(), Instant::now());
                }
                Some(event) = failed.next() => {
                    idle.request_finished(event.request_id.inner(), Instant::now());
                }
                () = tokio::time::sleep_until(wake) => {
                    if idle.is_idle(Instant::now()) {
                        break;
                    }
                }
            }
        }

        tracing::debug!(inflight = idle.inflight(), "Network settled");

        let html = page
            .content()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(RenderedDocument::new(html, final_url))
    }
}

impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<RenderedDocument, AppError> {
        let session = BrowserSession::launch(self.browser_config()?).await?;

        let result =
            tokio::time::timeout(self.settings.timeout, self.capture(&session.browser, url)).await;

        session.close().await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(self.timeout_error()),
        }
    }
}

/// One launched browser plus the task that drives its CDP connection.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> Result<Self, AppError> {
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser CDP handler error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn close(mut self) {
        let grace = Duration::from_secs(5);
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed: {e}");
        }
        if tokio::time::timeout(grace, self.browser.wait()).await.is_err() {
            tracing::warn!("Browser did not exit within {}s", grace.as_secs());
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process if it is still running.
        self.handler.abort();
    }
}

/// Locates a Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when it points at an existing file. Otherwise the real
/// binary inside a snap install is preferred over the `/snap/bin` wrapper,
/// then well-known system paths. `None` lets `chromiumoxide` search itself.
pub fn find_chrome_binary() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}
