use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

static ANCHOR_SELECTOR: OnceLock<Selector> = OnceLock::new();

fn anchor_selector() -> &'static Selector {
    ANCHOR_SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("static selector"))
}

/// Absolute http(s) links found in `html`, in first-seen order without duplicates.
///
/// Path-absolute hrefs (`/terms`) are prefixed with the scheme and host of
/// `base_url`. Everything else that is not already an http(s) URL is dropped,
/// which covers relative paths, `mailto:`, `tel:`, `javascript:` and fragments.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let origin = site_origin(base_url);
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(anchor_selector()) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        let candidate = if href.starts_with('/') {
            match &origin {
                Some(origin) => format!("{origin}{href}"),
                None => continue,
            }
        } else if href.starts_with("http") {
            href.to_string()
        } else {
            continue;
        };

        if !(candidate.starts_with("http://") || candidate.starts_with("https://")) {
            continue;
        }
        if seen.insert(candidate.clone()) {
            links.push(candidate);
        }
    }

    links
}

/// `scheme://host[:port]` of a URL, or `None` if it cannot be parsed.
fn site_origin(base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let host = base.host_str()?;
    Some(match base.port() {
        Some(port) => format!("{}://{}:{}", base.scheme(), host, port),
        None => format!("{}://{}", base.scheme(), host),
    })
}
