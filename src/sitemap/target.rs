use crate::SitemapError;
use url::Url;

/// The site a job runs against, as typed by the user
///
/// The scheme is kept only if the user spelled it out; otherwise both `https` and
/// `http` are candidates, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTarget {
    scheme: Option<String>,
    authority: String,
}

impl SiteTarget {
    /// Parses user input such as `example.com`, `https://Example.com/blog/` or
    /// `http://127.0.0.1:8080`
    ///
    /// # Examples
    ///
    /// ```
    /// use sitemap_indexer::sitemap::SiteTarget;
    ///
    /// let target = SiteTarget::parse("https://Example.com/some/page").unwrap();
    /// assert_eq!(target.domain(), "example.com");
    ///
    /// let target = SiteTarget::parse("blog.example.com").unwrap();
    /// assert_eq!(
    ///     target.root_candidates(&["sitemap.xml".to_string()]),
    ///     vec![
    ///         "https://blog.example.com/sitemap.xml".to_string(),
    ///         "http://blog.example.com/sitemap.xml".to_string(),
    ///     ]
    /// );
    /// ```
    pub fn parse(input: &str) -> Result<Self, SitemapError> {
        let trimmed = input.trim();
        let invalid = || SitemapError::InvalidDomain(trimmed.to_string());

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let lower = trimmed.to_ascii_lowercase();
        let explicit_scheme = lower.starts_with("https://") || lower.starts_with("http://");
        let url = if explicit_scheme {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("https://{}", trimmed))
        }
        .map_err(|_| invalid())?;

        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host.to_lowercase(), port),
            None => host.to_lowercase(),
        };

        Ok(Self {
            scheme: explicit_scheme.then(|| url.scheme().to_string()),
            authority,
        })
    }

    /// Host (and port, if any) without scheme or path
    pub fn domain(&self) -> &str {
        &self.authority
    }

    /// Schemes to try, in order
    pub fn schemes(&self) -> Vec<&str> {
        match &self.scheme {
            Some(scheme) => vec![scheme.as_str()],
            None => vec!["https", "http"],
        }
    }

    /// Candidate root sitemap URLs: every configured path over every scheme,
    /// preferring `https`
    pub fn root_candidates(&self, paths: &[String]) -> Vec<String> {
        self.schemes()
            .into_iter()
            .flat_map(|scheme| {
                paths.iter().map(move |path| {
                    format!(
                        "{}://{}/{}",
                        scheme,
                        self.authority,
                        path.trim_start_matches('/')
                    )
                })
            })
            .collect()
    }
}

/// Strips scheme and path from user input, the way the domain box is normalised
///
/// Returns `None` if nothing host-like remains.
pub fn normalize_domain(input: &str) -> Option<String> {
    SiteTarget::parse(input).ok().map(|t| t.domain().to_string())
}
