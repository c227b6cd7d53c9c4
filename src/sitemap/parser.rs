//! Sitemap XML parsing
//!
//! Only the two standard document shapes are understood:
//!
//! - **urlset**: `<urlset><url><loc>…</loc></url>…</urlset>` (page URLs)
//! - **sitemapindex**: `<sitemapindex><sitemap><loc>…</loc></sitemap>…</sitemapindex>`
//!
//! Namespace prefixes are ignored; everything except `<loc>` is skipped.

use quick_xml::events::Event;
use quick_xml::Reader;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// Page URLs, in document order
    UrlSet(Vec<String>),
    /// Child sitemap URLs, in document order
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Number of `<loc>` entries in the document
    pub fn len(&self) -> usize {
        match self {
            Self::UrlSet(locs) | Self::Index(locs) => locs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    UrlSet,
    Index,
}

impl RootKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "urlset" => Some(Self::UrlSet),
            "sitemapindex" => Some(Self::Index),
            _ => None,
        }
    }

    /// Element that wraps each `<loc>` in this kind of document
    fn entry_element(self) -> &'static str {
        match self {
            Self::UrlSet => "url",
            Self::Index => "sitemap",
        }
    }
}

/// Parses a sitemap document
///
/// # Returns
///
/// * `Ok(SitemapDocument)` - The `<loc>` values, trimmed, empty ones dropped
/// * `Err(String)` - Malformed XML, or a root element other than `urlset`/`sitemapindex`
pub fn parse_document(xml: &str) -> Result<SitemapDocument, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<RootKind> = None;
    let mut stack: Vec<String> = Vec::new();
    let mut locs = Vec::new();
    let mut current_loc: Option<String> = None;
    let mut finished = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(e) => {
                if finished {
                    return Err("content after the root element".to_string());
                }
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

                match root {
                    None => {
                        root = Some(RootKind::from_name(&name).ok_or_else(|| {
                            format!("unexpected root element <{}>", name)
                        })?);
                    }
                    Some(kind) => {
                        if name == "loc"
                            && stack.len() == 2
                            && stack[1] == kind.entry_element()
                        {
                            current_loc = Some(String::new());
                        }
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if root.is_none() {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    root = Some(RootKind::from_name(&name).ok_or_else(|| {
                        format!("unexpected root element <{}>", name)
                    })?);
                    finished = true;
                }
            }
            Event::Text(e) => {
                if let Some(loc) = current_loc.as_mut() {
                    let text = e.unescape().map_err(|e| format!("bad text: {}", e))?;
                    loc.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(loc) = current_loc.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let name = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                if name == "loc" {
                    if let Some(loc) = current_loc.take() {
                        let loc = loc.trim();
                        if !loc.is_empty() {
                            locs.push(loc.to_string());
                        }
                    }
                }
                if stack.is_empty() {
                    finished = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unexpected end of document inside <{}>", stack.join("><")));
    }

    match root {
        Some(RootKind::UrlSet) => Ok(SitemapDocument::UrlSet(locs)),
        Some(RootKind::Index) => Ok(SitemapDocument::Index(locs)),
        None => Err("document has no root element".to_string()),
    }
}
