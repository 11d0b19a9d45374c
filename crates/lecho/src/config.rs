//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_LATENCY_THRESHOLD_MS;
use crate::{Error, Result};

/// Visual treatment applied to characters that are predicted but not yet
/// confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StyleConfig {
    Bold,
    Dim,
    Italic,
    Underlined,
    Inverted,
    /// An explicit foreground color, configured as `#rrggbb`.
    Color(u8, u8, u8),
}

impl StyleConfig {
    /// Parse a configured style string: one of the attribute names or a
    /// `#rrggbb` hex color.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "bold" => Ok(StyleConfig::Bold),
            "dim" => Ok(StyleConfig::Dim),
            "italic" => Ok(StyleConfig::Italic),
            "underlined" => Ok(StyleConfig::Underlined),
            "inverted" => Ok(StyleConfig::Inverted),
            _ => {
                let hex = s
                    .strip_prefix('#')
                    .filter(|h| h.len() == 6)
                    .ok_or_else(|| Error::config(format!("unknown typeahead style: {s:?}")))?;
                let parse = |r: std::ops::Range<usize>| {
                    u8::from_str_radix(&hex[r], 16)
                        .map_err(|_| Error::config(format!("invalid hex color: {s:?}")))
                };
                Ok(StyleConfig::Color(parse(0..2)?, parse(2..4)?, parse(4..6)?))
            }
        }
    }
}

impl TryFrom<String> for StyleConfig {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        StyleConfig::parse(&s)
    }
}

impl From<StyleConfig> for String {
    fn from(style: StyleConfig) -> String {
        match style {
            StyleConfig::Bold => "bold".into(),
            StyleConfig::Dim => "dim".into(),
            StyleConfig::Italic => "italic".into(),
            StyleConfig::Underlined => "underlined".into(),
            StyleConfig::Inverted => "inverted".into(),
            StyleConfig::Color(r, g, b) => format!("#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig::Dim
    }
}

/// Typeahead engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeAheadConfig {
    /// Latency threshold in milliseconds. Negative disables predictions,
    /// zero forces them on, positive enables the adaptive policy.
    pub latency_threshold_ms: i64,

    /// Programs (matched against the terminal title, case-insensitively,
    /// on word boundaries) for which predictions are never shown.
    pub exclude_programs: Vec<String>,

    /// Style applied to unconfirmed predictions.
    pub style: StyleConfig,
}

impl Default for TypeAheadConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
            exclude_programs: ["vim", "vi", "nano", "tmux"]
                .into_iter()
                .map(String::from)
                .collect(),
            style: StyleConfig::default(),
        }
    }
}

impl TypeAheadConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latency threshold in milliseconds.
    pub fn with_latency_threshold_ms(mut self, threshold: i64) -> Self {
        self.latency_threshold_ms = threshold;
        self
    }

    /// Replace the excluded-programs list.
    pub fn with_exclude_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the unconfirmed-prediction style.
    pub fn with_style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }
}
