use url::Url;

/// Second-level labels that sit under a country code (`co.uk`, `com.au`).
const COMPOUND_SUFFIX_LABELS: &[&str] = &["co", "com", "org", "gov", "ac"];

/// Short site name used for output folders: `https://www.example.co.uk/x` -> `example`.
pub fn get_domain_name(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() > 1 {
        let second = parts[parts.len() - 2];
        if COMPOUND_SUFFIX_LABELS.contains(&second) {
            return if parts.len() > 2 {
                parts[parts.len() - 3].to_string()
            } else {
                parts[0].to_string()
            };
        }
        return second.to_string();
    }
    parts[0].to_string()
}

/// Has both a scheme and a host.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}
