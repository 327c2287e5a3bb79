pub mod dom;
pub mod firecrawl;
pub mod navigation;
pub mod quiescence;

#[cfg(feature = "browser")]
pub mod renderer;

pub use dom::ScraperDomExtractor;
pub use firecrawl::FirecrawlExtractor;
pub use quiescence::NetworkIdle;

#[cfg(feature = "browser")]
pub use renderer::ChromiumRenderer;
