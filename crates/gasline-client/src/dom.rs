use gasline_core::error::AppError;
use gasline_core::traits::DomExtractor;
use scraper::{Html, Selector};

/// DOM extractor backed by the `scraper` crate (html5ever + CSS selectors).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperDomExtractor;

impl ScraperDomExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DomExtractor for ScraperDomExtractor {
    fn extract(
        &self,
        html: &str,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, AppError> {
        extract_attribute(html, selector, attribute)
    }
}

/// Reads `attribute` off the first element (document order) matching
/// `selector`.
///
/// The value is returned verbatim; normalization decides whether it is a
/// price. `Ok(None)` when nothing matches or the first match lacks the
/// attribute.
pub fn extract_attribute(
    html: &str,
    selector: &str,
    attribute: &str,
) -> Result<Option<String>, AppError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| AppError::SelectorError(format!("'{selector}': {e}")))?;

    let document = Html::parse_document(html);
    Ok(document
        .select(&parsed)
        .next()
        .and_then(|el| el.value().attr(attribute))
        .map(str::to_string))
}
