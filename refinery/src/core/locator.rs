//! Retrieval locators of the form `<url>//<subdir>?ref=<ref>`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Repository location, with or without a scheme.
    pub url: String,
    /// Directory inside the repository that holds the filter.
    pub subdir: String,
    /// Tag, branch or commit to check out.
    pub reference: String,
}

impl Locator {
    pub fn new(
        url: impl Into<String>,
        subdir: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            subdir: subdir.into(),
            reference: reference.into(),
        }
    }

    /// URL handed to `git`; bare `host/owner/repo` locations use https.
    pub fn clone_url(&self) -> String {
        remote_url(&self.url)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}?ref={}", self.url, self.subdir, self.reference)
    }
}

pub fn remote_url(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
