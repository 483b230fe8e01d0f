use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use scraper::{Html, Selector};
use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

use crate::data_models::ExtractedPage;
use crate::fetcher::PageFetcher;

/// Pages whose cleaned text is shorter than this are treated as empty.
pub const MIN_CONTENT_CHARS: usize = 50;

const REMOVED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript",
];

const BOILERPLATE_ID_WORDS: &[&str] = &[
    "nav", "menu", "sidebar", "footer", "header", "cookie", "banner",
];

/// Class names are matched more aggressively than ids.
const BOILERPLATE_CLASS_WORDS: &[&str] = &[
    "nav", "menu", "sidebar", "footer", "header", "cookie", "banner", "ad", "social",
];

/// Checked in order, first hit on the URL or title wins.
const PAGE_TYPES: &[(&str, &[&str])] = &[
    ("Privacy Policy", &["privacy", "privacy-policy"]),
    (
        "Terms of Service",
        &["terms", "tos", "terms-of-service", "terms-and-conditions"],
    ),
    ("Cookie Policy", &["cookie", "cookies"]),
    ("About Us", &["about", "about-us"]),
    ("Contact", &["contact", "contact-us"]),
    ("FAQ", &["faq", "frequently-asked"]),
    ("Data Protection", &["data-protection", "gdpr", "data-privacy"]),
    ("Acceptable Use", &["acceptable-use", "aup"]),
    ("Legal", &["legal", "compliance"]),
];

pub const GENERAL_PAGE_TYPE: &str = "General";

static TITLE_SELECTOR: OnceLock<Selector> = OnceLock::new();
static DESCRIPTION_SELECTOR: OnceLock<Selector> = OnceLock::new();

fn title_selector() -> &'static Selector {
    TITLE_SELECTOR.get_or_init(|| Selector::parse("title").expect("static selector"))
}

fn description_selector() -> &'static Selector {
    DESCRIPTION_SELECTOR
        .get_or_init(|| Selector::parse(r#"meta[name="description"]"#).expect("static selector"))
}

/// Fetches policy pages and reduces them to their readable text.
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// `None` when the page could not be fetched or has too little text.
    pub async fn extract(&self, url: &str) -> Option<ExtractedPage> {
        log::info!("extracting {}", url);
        let page = self.fetcher.fetch(url).await;
        if !page.success {
            log::warn!("failed to fetch page {}", url);
            return None;
        }

        let extracted = extract_page(url, &page.html);
        match &extracted {
            Some(p) => log::info!("extracted {} ({} words)", p.page_type, p.word_count),
            None => log::warn!("content too short or empty at {}", url),
        }
        extracted
    }
}

pub fn extract_page(url: &str, html: &str) -> Option<ExtractedPage> {
    let (title, description) = extract_metadata(html);
    let content = extract_main_content(html)?;
    if content.chars().count() < MIN_CONTENT_CHARS {
        return None;
    }

    let page_type = detect_page_type(url, &title).to_string();
    let word_count = content.split_whitespace().count();
    Some(ExtractedPage {
        url: url.to_string(),
        title,
        description,
        page_type,
        content,
        word_count,
    })
}

/// `(title, meta description)`, both trimmed and empty when missing.
pub fn extract_metadata(html: &str) -> (String, String) {
    let document = Html::parse_document(html);
    let title = document
        .select(title_selector())
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();
    let description = document
        .select(description_selector())
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    (title, description)
}

pub fn detect_page_type(url: &str, title: &str) -> &'static str {
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    PAGE_TYPES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| url.contains(k) || title.contains(k))
        })
        .map(|(page_type, _)| *page_type)
        .unwrap_or(GENERAL_PAGE_TYPE)
}

/// Text of the main content area, one trimmed line per text block.
pub fn extract_main_content(html: &str) -> Option<String> {
    let dom = parse_dom(html)?;
    let container = find_element(&dom.document, |name, _| name == "main")
        .or_else(|| find_element(&dom.document, |name, _| name == "article"))
        .or_else(|| {
            find_element(&dom.document, |name, attrs| {
                name == "div"
                    && (attr_contains(attrs, "class", "content")
                        || attr_contains(attrs, "id", "content"))
            })
        })
        .or_else(|| find_element(&dom.document, |name, _| name == "body"))?;

    let mut lines = Vec::new();
    collect_lines(&container, &mut lines);
    Some(lines.join("\n"))
}

fn parse_dom(html: &str) -> Option<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut std::io::Cursor::new(html))
        .map_err(|e| log::warn!("could not parse html: {}", e))
        .ok()
}

fn attr_value<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| &*a.value)
}

fn attr_contains(attrs: &RefCell<Vec<Attribute>>, name: &str, needle: &str) -> bool {
    attr_value(&attrs.borrow(), name)
        .map(|v| v.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Subtrees that never contribute text: chrome tags and boilerplate-looking classes or ids.
fn is_removed(tag: &str, attrs: &RefCell<Vec<Attribute>>) -> bool {
    if REMOVED_TAGS.contains(&tag) {
        return true;
    }
    let attrs = attrs.borrow();
    let matches = |name: &str, words: &[&str]| {
        attr_value(&attrs, name)
            .map(|v| {
                let v = v.to_lowercase();
                words.iter().any(|w| v.contains(w))
            })
            .unwrap_or(false)
    };
    matches("class", BOILERPLATE_CLASS_WORDS) || matches("id", BOILERPLATE_ID_WORDS)
}

/// First element in document order, outside removed subtrees, accepted by `pred`.
fn find_element<F>(handle: &Handle, pred: F) -> Option<Handle>
where
    F: Fn(&str, &RefCell<Vec<Attribute>>) -> bool + Copy,
{
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        let tag = &*name.local;
        if is_removed(tag, attrs) {
            return None;
        }
        if pred(tag, attrs) {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, pred))
}

fn collect_lines(handle: &Handle, out: &mut Vec<String>) {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = contents.borrow();
            out.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
        }
        NodeData::Element { name, attrs, .. } if is_removed(&name.local, attrs) => {}
        NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => {}
        _ => {
            for child in handle.children.borrow().iter() {
                collect_lines(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY_BODY: &str = "We collect the personal information you give us when you create an account.";

    #[test]
    fn test_prefers_main_and_drops_chrome() {
        let html = format!(
            r#"<html><head><title> Privacy Notice </title>
            <meta name="description" content=" How we use data "></head>
            <body>
              <nav>Home | Shop</nav>
              <div class="cookie-banner">We use cookies</div>
              <main>
                <h1>Privacy</h1>
                <p>{POLICY_BODY}</p>
                <script>var tracking = true;</script>
                <div id="sidebar">Related links</div>
              </main>
              <footer>Copyright</footer>
            </body></html>"#
        );
        let page = extract_page("https://a.com/legal/notice", &html).unwrap();
        assert_eq!(page.title, "Privacy Notice");
        assert_eq!(page.description, "How we use data");
        assert_eq!(page.content, format!("Privacy\n{POLICY_BODY}"));
        assert_eq!(page.page_type, "Privacy Policy");
        assert_eq!(page.word_count, 14);
    }

    #[test]
    fn test_container_fallback_order() {
        let html = format!(
            r#"<body><p>outside</p><div class="page-content"><p>{POLICY_BODY}</p></div></body>"#
        );
        assert_eq!(extract_main_content(&html).unwrap(), POLICY_BODY);

        let html = format!("<body><p>intro</p><p>{POLICY_BODY}</p></body>");
        assert_eq!(
            extract_main_content(&html).unwrap(),
            format!("intro\n{POLICY_BODY}")
        );

        let html = format!(
            r#"<body><div id="content">div</div><article><p>{POLICY_BODY}</p></article></body>"#
        );
        assert_eq!(extract_main_content(&html).unwrap(), POLICY_BODY);
    }

    #[test]
    fn test_removed_container_is_skipped() {
        let html = format!(
            r#"<body><main class="navigation">menu text</main><article>{POLICY_BODY}</article></body>"#
        );
        assert_eq!(extract_main_content(&html).unwrap(), POLICY_BODY);
    }

    #[test]
    fn test_short_content_is_rejected() {
        let html = "<html><body><main><p>Too short.</p></main></body></html>";
        assert!(extract_page("https://a.com/terms", html).is_none());
    }

    #[test]
    fn test_detect_page_type_order() {
        assert_eq!(detect_page_type("https://a.com/privacy", ""), "Privacy Policy");
        // privacy is checked before cookie
        assert_eq!(
            detect_page_type("https://a.com/cookie-privacy", ""),
            "Privacy Policy"
        );
        assert_eq!(detect_page_type("https://a.com/x", "Terms of use"), "Terms of Service");
        assert_eq!(detect_page_type("https://a.com/GDPR", ""), "Data Protection");
        assert_eq!(detect_page_type("https://a.com/shop", "Shoes"), GENERAL_PAGE_TYPE);
    }
}
