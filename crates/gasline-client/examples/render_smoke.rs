/// Smoke-test for `ChromiumRenderer` plus the DOM extractor.
///
/// Renders the AAA Indiana page (or the URL given as the first argument),
/// waits for the network to settle, and prints the `#ui-id-7` `data-cost`.
///
/// Run with:
///   cargo run -p gasline-client --example render_smoke --features browser
use gasline_client::{ChromiumRenderer, ScraperDomExtractor};
use gasline_core::config::RenderSettings;
use gasline_core::traits::{DomExtractor, Renderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://gasprices.aaa.com/?state=IN".to_string());

    println!("Rendering {url} ...");
    let doc = ChromiumRenderer::new(RenderSettings::default())
        .render(&url)
        .await?;
    println!(
        "Got {} bytes from {} (sha256 {})",
        doc.html().len(),
        doc.final_url(),
        doc.fingerprint()
    );

    let value = ScraperDomExtractor::new().extract(doc.html(), "#ui-id-7", "data-cost")?;
    println!("#ui-id-7 data-cost = {value:?}");
    Ok(())
}
