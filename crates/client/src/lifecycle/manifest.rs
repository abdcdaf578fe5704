//! The ordered list of resources pre-populated on install.

use url::Url;

use havn_core::{AppConfig, Error};

use crate::fetch::parse_request_uri;

/// Ordered, de-duplicated, non-empty list of resource URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` if the list is empty or contains a blank entry.
    pub fn new<I, S>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into().trim().to_string();
            if entry.is_empty() {
                return Err(Error::InvalidInput("manifest entries must not be blank".into()));
            }
            if !out.contains(&entry) {
                out.push(entry);
            }
        }

        if out.is_empty() {
            return Err(Error::InvalidInput("manifest must list at least one resource".into()));
        }

        Ok(Self { entries: out })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(config.manifest.iter().cloned())
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against `origin`, preserving order.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, Error> {
        self.entries
            .iter()
            .map(|entry| parse_request_uri(entry, origin).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}"))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_preserves_order_and_dedupes() {
        let manifest = Manifest::new(["/", "/app.js", "/", " /app.css "]).unwrap();
        assert_eq!(manifest.entries(), ["/", "/app.js", "/app.css"]);
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_manifest_rejects_empty() {
        assert!(matches!(Manifest::new(Vec::<String>::new()), Err(Error::InvalidInput(_))));
        assert!(matches!(Manifest::new(["/", "  "]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_manifest_from_config() {
        let manifest = Manifest::from_config(&AppConfig::default()).unwrap();
        assert_eq!(manifest.entries(), ["/", "/index.html", "/manifest.json"]);
    }

    #[test]
    fn test_manifest_resolve() {
        let manifest = Manifest::new(["/", "https://cdn.example.com/lib.js"]).unwrap();
        let origin = Url::parse("http://localhost:3000").unwrap();
        let urls = manifest.resolve(&origin).unwrap();
        assert_eq!(urls[0].as_str(), "http://localhost:3000/");
        assert_eq!(urls[1].as_str(), "https://cdn.example.com/lib.js");
    }
}
