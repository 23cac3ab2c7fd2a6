use scraper::{Html, Selector};
use tender_common::{CrawlError, CrawlResult};
use url::Url;

use crate::normalize::clean_text;

/// One result row scraped from a search or listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub title: String,
    pub url: String,
    pub summary: String,
}

fn selector(raw: &str) -> CrawlResult<Selector> {
    Selector::parse(raw).map_err(|e| CrawlError::malformed(format!("selector {raw}"), format!("{e:?}")))
}

/// Extract listing rows: every `item_selector` match that contains a
/// `link_selector` anchor becomes one item. Relative links are resolved
/// against `base_url`; the title is the anchor text.
pub fn extract_listing(
    html: &str,
    base_url: &str,
    item_selector: &str,
    link_selector: &str,
) -> CrawlResult<Vec<ListingItem>> {
    let base = Url::parse(base_url).map_err(|_| CrawlError::InvalidUrl {
        url: base_url.to_string(),
    })?;
    let item_selector = selector(item_selector)?;
    let link_selector = selector(link_selector)?;
    let document = Html::parse_document(html);

    let items = document
        .select(&item_selector)
        .filter_map(|item| {
            let link = item.select(&link_selector).next()?;
            let href = link.value().attr("href")?;
            let url = base.join(href).ok()?;
            let title = clean_text(&link.text().collect::<String>());
            if title.is_empty() {
                return None;
            }
            Some(ListingItem {
                title,
                url: url.to_string(),
                summary: clean_text(&item.text().collect::<Vec<_>>().join(" ")),
            })
        })
        .collect();

    Ok(items)
}
