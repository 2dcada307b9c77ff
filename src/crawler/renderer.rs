//! Rendered-page fetching
//!
//! Detail pages (and some series pages) only carry their content after script
//! execution. `PageRenderer` hides how the final markup is obtained; callers
//! pass a readiness selector and a timeout and get the markup back.

use crate::config::{Config, RendererKind};
use crate::crawler::fetcher::Fetcher;
use crate::{FetchError, HarvestError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

/// Fetches a page's markup once a readiness condition holds
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// True if the backend runs page scripts before returning markup
    fn executes_scripts(&self) -> bool {
        false
    }

    /// Returns the page markup once `ready_selector` matches
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The rendered markup
    /// * `Err(FetchError::RenderTimeout)` - The selector never matched in time
    /// * `Err(FetchError)` - The page could not be loaded at all
    async fn render(
        &self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

/// Renderer backed by a plain GET
///
/// Static markup cannot change after it arrives, so readiness is checked once
/// on the fetched document. The fetch keeps its own retry and timeout policy.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    fetcher: Fetcher,
}

impl StaticRenderer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn render(
        &self,
        url: &str,
        ready_selector: &str,
        _timeout: Duration,
    ) -> Result<String, FetchError> {
        let html = self.fetcher.fetch_text(url).await?;

        if selector_matches(&html, ready_selector) {
            Ok(html)
        } else {
            Err(FetchError::RenderTimeout {
                url: url.to_string(),
            })
        }
    }
}

/// Returns true if `selector` matches anything in `html`
///
/// An unparsable selector never matches.
pub fn selector_matches(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    found
}

/// Builds the renderer named by the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn PageRenderer>)` - Ready-to-use renderer
/// * `Err(HarvestError::Renderer)` - The backend could not be started
pub async fn build_renderer(
    config: &Config,
    fetcher: &Fetcher,
) -> Result<Arc<dyn PageRenderer>, HarvestError> {
    match config.scraper.renderer {
        RendererKind::Static => Ok(Arc::new(StaticRenderer::new(fetcher.clone()))),
        #[cfg(feature = "browser")]
        RendererKind::Chrome => {
            let renderer = chrome::ChromeRenderer::launch(&config.http.user_agent).await?;
            Ok(Arc::new(renderer))
        }
        #[cfg(not(feature = "browser"))]
        RendererKind::Chrome => Err(HarvestError::Renderer(
            "renderer = \"chrome\" requires building with the `browser` feature".to_string(),
        )),
    }
}

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "browser")]
mod chrome {
    use super::PageRenderer;
    use crate::{FetchError, HarvestError};
    use async_trait::async_trait;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Renderer backed by a headless Chrome instance
    pub struct ChromeRenderer {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl ChromeRenderer {
        /// Launches a headless browser shared by every render call
        pub async fn launch(user_agent: &str) -> Result<Self, HarvestError> {
            let config = BrowserConfig::builder()
                .no_sandbox()
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg(format!("--user-agent={}", user_agent))
                .build()
                .map_err(HarvestError::Renderer)?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| HarvestError::Renderer(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            tracing::info!("Launched headless Chrome renderer");
            Ok(Self { browser, handler })
        }
    }

    impl Drop for ChromeRenderer {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    #[async_trait]
    impl PageRenderer for ChromeRenderer {
        fn name(&self) -> &'static str {
            "chrome"
        }

        fn executes_scripts(&self) -> bool {
            true
        }

        async fn render(
            &self,
            url: &str,
            ready_selector: &str,
            timeout: Duration,
        ) -> Result<String, FetchError> {
            let render_error = |e: chromiumoxide::error::CdpError| FetchError::Render {
                url: url.to_string(),
                message: e.to_string(),
            };

            let page = self.browser.new_page(url).await.map_err(render_error)?;

            let ready = tokio::time::timeout(timeout, async {
                while page.find_element(ready_selector).await.is_err() {
                    tokio::time::sleep(READY_POLL_INTERVAL).await;
                }
            })
            .await;

            let result = match ready {
                Ok(()) => page.content().await.map_err(render_error),
                Err(_) => Err(FetchError::RenderTimeout {
                    url: url.to_string(),
                }),
            };

            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page for {}: {}", url, e);
            }

            result
        }
    }
}
