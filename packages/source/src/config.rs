//! Loader for the source-configuration document (`config/sources.toml`).
//!
//! Read once at process start; see §9 Open Question decision in
//! `DESIGN.md` for why hot-reload is out of scope.

use nightwatch_source_models::SourceDefinition;
use serde::Deserialize;

use crate::SourceError;

#[derive(Debug, Deserialize)]
struct SourcesDocument {
    #[serde(default, rename = "source")]
    sources: Vec<SourceDefinition>,
}

/// Parses a `config/sources.toml` document's contents into its enabled
/// [`SourceDefinition`] entries. Disabled entries (`enabled = false`)
/// are dropped here rather than left for the caller to filter.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if `contents` is not valid TOML or
/// does not match the `[[source]]` schema.
pub fn parse_sources(contents: &str) -> Result<Vec<SourceDefinition>, SourceError> {
    let doc: SourcesDocument = toml::from_str(contents)?;
    Ok(doc.sources.into_iter().filter(|s| s.enabled).collect())
}

/// Reads and parses `path` into its enabled [`SourceDefinition`] entries.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if `path` cannot be read, or
/// [`SourceError::Config`] if its contents are not valid.
pub fn load_sources(path: &std::path::Path) -> Result<Vec<SourceDefinition>, SourceError> {
    let contents = std::fs::read_to_string(path)?;
    parse_sources(&contents)
}

#[cfg(test)]
mod tests {
    use super::parse_sources;

    const DOC: &str = r#"
[[source]]
name = "Local Scanner Feed"
sourceType = "audio"
url = "https://example.test/scanner"
region = "mchenry_county"
category = "crime"
enabled = true

[[source]]
name = "City Press Releases"
sourceType = "html"
url = "https://example.test/press-releases"
region = "mchenry_county"
category = "news"
municipality = "Woodstock"
enabled = false
"#;

    #[test]
    fn disabled_entries_are_filtered_out() {
        let sources = parse_sources(DOC).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Local Scanner Feed");
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_sources("not valid toml [[[").is_err());
    }
}
