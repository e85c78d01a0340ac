use anyhow::{Context, Result};

/// Builds reference page locators from region and map names.
///
/// Spaces become underscores and everything outside the URL-unreserved set is
/// percent-encoded, so `"Tamil Nadu"` resolves to `<base>Tamil_Nadu`. Names are
/// taken verbatim; region names are already trimmed when their source is loaded.
#[derive(Debug, Clone)]
pub struct DetailLookup {
    base_url: String,
}

impl DetailLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn resolve(&self, name: &str) -> String {
        let slug = name.replace(' ', "_");
        format!("{}{}", self.base_url, urlencoding::encode(&slug))
    }

    /// Inverse of [`resolve`](Self::resolve), surrounding whitespace included.
    /// Names that contained underscores come back with spaces in their place.
    pub fn name_from_locator(&self, locator: &str) -> Option<String> {
        let slug = locator.strip_prefix(&self.base_url)?;
        let decoded = urlencoding::decode(slug).ok()?;
        Some(decoded.replace('_', " "))
    }
}

/// The external viewer a reference locator is handed to.
pub trait ReferenceOpener {
    fn open(&self, locator: &str) -> Result<()>;
}

/// Opens locators in the system web browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserOpener;

impl ReferenceOpener for BrowserOpener {
    fn open(&self, locator: &str) -> Result<()> {
        webbrowser::open(locator).with_context(|| format!("Failed to open browser for {}", locator))
    }
}

/// Hands a locator to the opener. A failing viewer is logged and otherwise ignored.
pub fn open_reference(opener: &dyn ReferenceOpener, locator: &str) {
    tracing::info!("Opening reference page {}", locator);
    if let Err(e) = opener.open(locator) {
        tracing::warn!("Reference viewer failed: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn wiki() -> DetailLookup {
        DetailLookup::new("https://en.wikipedia.org/wiki/")
    }

    #[test]
    fn replaces_spaces_with_underscores() {
        assert_eq!(
            wiki().resolve("Tamil Nadu"),
            "https://en.wikipedia.org/wiki/Tamil_Nadu"
        );
        assert_eq!(wiki().resolve("China"), "https://en.wikipedia.org/wiki/China");
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(
            wiki().resolve("Jammu & Kashmir"),
            "https://en.wikipedia.org/wiki/Jammu_%26_Kashmir"
        );
        assert_eq!(
            wiki().resolve("Île-de-France"),
            "https://en.wikipedia.org/wiki/%C3%8Ele-de-France"
        );
    }

    #[test]
    fn name_round_trips() {
        let lookup = wiki();
        for name in [
            "Andhra Pradesh",
            "Inner Mongolia",
            "Jammu & Kashmir",
            "Île-de-France",
            "Hawaii",
            "Goa ",
            " Delhi",
        ] {
            let locator = lookup.resolve(name);
            assert_eq!(lookup.name_from_locator(&locator).as_deref(), Some(name));
        }
    }

    #[test]
    fn foreign_locator_has_no_name() {
        assert_eq!(wiki().name_from_locator("https://example.com/wiki/China"), None);
    }

    struct Failing(RefCell<Vec<String>>);

    impl ReferenceOpener for Failing {
        fn open(&self, locator: &str) -> Result<()> {
            self.0.borrow_mut().push(locator.to_string());
            anyhow::bail!("no display")
        }
    }

    #[test]
    fn viewer_failure_is_swallowed() {
        let opener = Failing(RefCell::new(Vec::new()));
        open_reference(&opener, "https://en.wikipedia.org/wiki/Goa");
        assert_eq!(*opener.0.borrow(), ["https://en.wikipedia.org/wiki/Goa"]);
    }
}
