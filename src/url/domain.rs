use url::Url;

/// Extracts the hostname from a URL, lowercased and without a `www.` prefix
///
/// # Arguments
///
/// * `url` - The URL to extract the hostname from
///
/// # Returns
///
/// * `Some(String)` - The normalized hostname
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use registry_repos::url::extract_hostname;
///
/// let url = Url::parse("https://WWW.GitHub.com/a/b").unwrap();
/// assert_eq!(extract_hostname(&url), Some("github.com".to_string()));
/// ```
pub fn extract_hostname(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_lowercase();
        match host.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => host,
        }
    })
}

/// Parses `raw` and extracts its hostname, or `None` if it is not a URL
pub fn hostname_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(extract_hostname)
}
