use url::Url;

/// How a link found during traversal should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Table-of-contents/navigation page - enqueue for further traversal
    Browse,
    /// Section/document page - record as a discovered extraction target
    Leaf,
    /// Off-portal or unrelated link - ignore
    Other,
}

impl LinkKind {
    /// Returns true if the link should be followed by the discovery traversal
    pub fn is_browse(&self) -> bool {
        matches!(self, Self::Browse)
    }

    /// Returns true if the link is an extraction target
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf)
    }
}

/// Classifies a link against the portal's fixed URL shapes
///
/// The portal serves section content under `/calregs/document/...` paths and
/// navigation under `/calregs/browse/...` paths (or `guid=`-addressed browse
/// views). Anything on a different host, or on this host but outside those
/// shapes, is ignored.
///
/// # Arguments
///
/// * `url` - The link to classify (already resolved to an absolute URL)
/// * `base` - The portal base URL; only links on its host are considered
pub fn classify_link(url: &Url, base: &Url) -> LinkKind {
    if url.host_str() != base.host_str() {
        return LinkKind::Other;
    }

    if is_leaf_url(url) {
        LinkKind::Leaf
    } else if is_browse_url(url) {
        LinkKind::Browse
    } else {
        LinkKind::Other
    }
}

/// Checks if a URL points to section content (a leaf document page)
fn is_leaf_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();

    if path.contains("/calregs/document/") {
        return true;
    }

    // Some section links use other path shapes; anything under the portal that
    // mentions a document or section without being a browse view counts
    path.contains("/calregs/")
        && (path.contains("document") || path.contains("section"))
        && !path.contains("browse")
}

/// Checks if a URL points to a table-of-contents / browse page
fn is_browse_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();

    if path.contains("/calregs/document/") {
        return false;
    }

    if path.contains("/calregs/browse/") {
        return true;
    }

    // guid-addressed navigation views
    path.contains("/calregs")
        && url
            .query()
            .map(|q| q.to_lowercase().contains("guid="))
            .unwrap_or(false)
}
