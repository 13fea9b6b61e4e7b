use crate::config::{CrawlerConfig, EndpointConfig};
use crate::UrlError;
use url::Url;

/// Which column a link came from; decides the endpoint bare fragments join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Property details page
    Details,
    /// Map / image viewer (serves a PDF)
    Image,
    /// MLS listing link
    Mls,
}

/// Resolves raw cell links against the site's fixed endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolver {
    /// `scheme://host[:port]`, no trailing slash
    origin: String,
    /// Directory of the entry page, with trailing slash
    site_root: String,
    details: String,
    image: String,
    entry: String,
}

impl LinkResolver {
    /// Builds a resolver
    ///
    /// # Arguments
    ///
    /// * `origin` - Scheme and host, e.g. `https://apps.infrastructureontario.ca`
    /// * `entry` - The grid page; its directory anchors page-relative links
    /// * `details` - Endpoint for bare `Details` fragments
    /// * `image` - Endpoint for bare `Image` fragments
    pub fn new(origin: &str, entry: &str, details: &str, image: &str) -> Result<Self, UrlError> {
        let origin_url = parse_http(origin)?;
        let entry_url = parse_http(entry)?;

        let origin = origin_url.origin().ascii_serialization();
        let site_root = entry_url
            .join("./")
            .map_err(|e| UrlError::Parse(format!("{}: {}", entry, e)))?
            .to_string();

        Ok(Self {
            origin,
            site_root,
            details: details.trim_end_matches(['?', '&']).to_string(),
            image: image.trim_end_matches(['?', '&']).to_string(),
            entry: entry_url.to_string(),
        })
    }

    pub fn from_config(crawler: &CrawlerConfig, endpoints: &EndpointConfig) -> Result<Self, UrlError> {
        Self::new(
            &endpoints.origin,
            &crawler.entry_url,
            &endpoints.details,
            &endpoints.image,
        )
    }

    /// Absolutizes a raw link
    ///
    /// # Resolution Rules
    ///
    /// | Raw link | Result |
    /// |----------|--------|
    /// | missing or blank | `None` |
    /// | has a scheme (`https://...`) | unchanged |
    /// | `//host/path` | origin's scheme prefixed |
    /// | `/path?q` | origin prefixed |
    /// | `page.aspx?id=7` | entry page's directory prefixed |
    /// | `id=7` or `?id=7` | appended as the query of the column's endpoint |
    ///
    /// # Example
    ///
    /// ```
    /// use propgrid::url::{LinkKind, LinkResolver};
    ///
    /// let resolver = LinkResolver::new(
    ///     "https://apps.infrastructureontario.ca",
    ///     "https://apps.infrastructureontario.ca/propertiesforsale/Home.aspx",
    ///     "https://apps.infrastructureontario.ca/propertiesforsale/pspropertydetails.aspx",
    ///     "https://apps.infrastructureontario.ca/propertiesforsale/imageview.aspx",
    /// ).unwrap();
    ///
    /// assert_eq!(
    ///     resolver.resolve(Some("id=7"), LinkKind::Details).as_deref(),
    ///     Some("https://apps.infrastructureontario.ca/propertiesforsale/pspropertydetails.aspx?id=7"),
    /// );
    /// ```
    pub fn resolve(&self, raw: Option<&str>, kind: LinkKind) -> Option<String> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

        if has_scheme(raw) {
            return Some(raw.to_string());
        }

        if let Some(rest) = raw.strip_prefix("//") {
            let scheme = self.origin.split("://").next().unwrap_or("https");
            return Some(format!("{}://{}", scheme, rest));
        }

        if raw.starts_with('/') {
            return Some(format!("{}{}", self.origin, raw));
        }

        if let Some(query) = raw.strip_prefix('?') {
            return Some(format!("{}?{}", self.endpoint(kind), query));
        }

        if raw.contains('?') {
            return Some(format!("{}{}", self.site_root, raw));
        }

        Some(format!("{}?{}", self.endpoint(kind), raw))
    }

    fn endpoint(&self, kind: LinkKind) -> &str {
        match kind {
            LinkKind::Details => &self.details,
            LinkKind::Image => &self.image,
            LinkKind::Mls => &self.entry,
        }
    }
}

/// True if the string starts with a URL scheme (`https:`, `mailto:`, ...)
pub fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_http(value: &str) -> Result<Url, UrlError> {
    let url = Url::parse(value).map_err(|e| UrlError::Parse(format!("{}: {}", value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(value.to_string()));
    }
    Ok(url)
}
