//! Marker-based classification of result pages
//!
//! Markers are matched as case-insensitive substrings.

/// Known page markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Placeholder text shown while a result is not out yet
    pub not_published: Vec<String>,
    /// Overload / maintenance page text; treated as a transient failure
    pub site_down: Vec<String>,
    /// When non-empty, a published page must contain one of these
    pub result: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            not_published: vec![
                "Invalid Registration Number".to_string(),
                "not available".to_string(),
                "No Record Found".to_string(),
            ],
            site_down: vec![
                "HTTP Error 503".to_string(),
                "Service Unavailable".to_string(),
            ],
            result: Vec::new(),
        }
    }
}

/// Page classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    NotPublished,
    SiteDown,
    Published,
}

/// Classifies result page bodies
#[derive(Debug, Clone)]
pub struct Classifier {
    not_published: Vec<String>,
    site_down: Vec<String>,
    result: Vec<String>,
}

impl Classifier {
    pub fn new(markers: &Markers) -> Self {
        let lower = |list: &[String]| list.iter().map(|m| m.to_lowercase()).collect::<Vec<_>>();
        Self {
            not_published: lower(&markers.not_published),
            site_down: lower(&markers.site_down),
            result: lower(&markers.result),
        }
    }

    pub fn classify(&self, body: &str) -> PageKind {
        if body.trim().is_empty() {
            return PageKind::NotPublished;
        }

        let haystack = body.to_lowercase();
        let contains_any = |markers: &[String]| markers.iter().any(|m| haystack.contains(m.as_str()));

        if contains_any(&self.site_down) {
            return PageKind::SiteDown;
        }
        if contains_any(&self.not_published) {
            return PageKind::NotPublished;
        }
        if !self.result.is_empty() && !contains_any(&self.result) {
            return PageKind::NotPublished;
        }
        PageKind::Published
    }

    /// First site-down marker found in `body`, for error messages
    pub fn site_down_marker<'a>(&'a self, body: &str) -> Option<&'a str> {
        let haystack = body.to_lowercase();
        self.site_down
            .iter()
            .find(|m| haystack.contains(m.as_str()))
            .map(String::as_str)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&Markers::default())
    }
}

/// Extract the text of the first `<title>` element
pub fn extract_title(body: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid for `body`
    let lower = body.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;
    let title = body.get(content_start..content_end)?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}
