//! `[base]` section configuration.
//!
//! Site-wide values bound into the root context of every document.

use super::defaults;
use chrono::FixedOffset;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in marksite.toml.
///
/// # Example
/// ```toml
/// [base]
/// title = "My site"
/// author = "Alice"
/// lang = "en-US"
/// timezone = "+09:00"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Bound as `siteTitle`.
    #[serde(default)]
    pub title: String,

    /// Bound as `author`; documents may override it in their header.
    #[serde(default = "defaults::base::author")]
    #[educe(Default = defaults::base::author())]
    pub author: String,

    /// BCP 47 language code, bound as `lang`. Also picks the decimal separator.
    #[serde(default = "defaults::base::lang")]
    #[educe(Default = defaults::base::lang())]
    pub lang: String,

    /// `±HH:MM` offset used for `generated` and `timezone`.
    #[serde(default = "defaults::base::timezone")]
    #[educe(Default = defaults::base::timezone())]
    pub timezone: String,
}

impl BaseConfig {
    /// Parse `timezone` as a `±HH:MM` offset.
    pub fn offset(&self) -> Option<FixedOffset> {
        parse_offset(&self.timezone)
    }
}

/// `±HH:MM` only; chrono alone would also take `+0900`.
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if !text.contains(':') {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_base_config_full() {
        let config = r#"
            [base]
            title = "Notes"
            author = "Alice"
            lang = "de-DE"
            timezone = "+09:30"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.base.title, "Notes");
        assert_eq!(config.base.author, "Alice");
        assert_eq!(config.base.lang, "de-DE");
        assert_eq!(
            config.base.offset(),
            FixedOffset::east_opt(9 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn test_base_config_defaults() {
        let config: SiteConfig = toml::from_str("[base]\ntitle = \"Site\"").unwrap();

        assert_eq!(config.base.author, "<YOUR_NAME>");
        assert_eq!(config.base.lang, "en-US");
        assert_eq!(config.base.timezone, "+00:00");
        assert_eq!(config.base.offset(), FixedOffset::east_opt(0));
    }

    #[test]
    fn test_base_config_unknown_field() {
        assert!(toml::from_str::<SiteConfig>("[base]\nurl = \"x\"").is_err());
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("-05:00"), FixedOffset::west_opt(5 * 3600));
        assert_eq!(parse_offset("+0900"), None);
        assert_eq!(parse_offset("09:00"), None);
        assert_eq!(parse_offset("+24:00"), None);
        assert_eq!(parse_offset(""), None);
    }
}
