use serde::Deserialize;

/// Compile and render options.
///
/// A [`TemplateSet`](crate::TemplateSet) copies its options into every
/// template it compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Collapse whitespace in literal text, keeping quoted text verbatim.
    pub trim_whitespace: bool,
    /// Remove the first newline after a `%}`.
    pub trim_blocks: bool,
    /// Remove spaces and tabs before a `{%`.
    pub lstrip_blocks: bool,
    /// HTML-escape values that are not marked safe.
    pub autoescape: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trim_whitespace: false,
            trim_blocks: false,
            lstrip_blocks: false,
            autoescape: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_partial_config() {
        let options: Options = serde_json::from_str(r#"{"trim_blocks": true}"#).unwrap();
        assert!(options.trim_blocks);
        assert!(options.autoescape);
        assert!(!options.lstrip_blocks);
    }
}
