//! Formatting configuration
//!
//! Two independent scopes are pushed to the plugin on every request:
//!
//! - [`GlobalConfiguration`]: knobs shared by every dprint plugin
//! - [`PluginConfig`]: knobs specific to the TypeScript plugin
//!
//! Callers describe what they want changed with the `*Override` records. An
//! override only names the fields it sets; everything else falls back to the
//! documented defaults, so the plugin always receives a complete record.

mod applier;

pub use applier::{ConfigScope, ConfigurationApplier};

use serde::{Deserialize, Serialize};

/// Newline style written by the plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewLineKind {
    /// Keep whatever the input predominantly uses
    #[default]
    Auto,
    Lf,
    Crlf,
    /// Platform default
    System,
}

/// Statement terminator policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SemiColons {
    /// Always terminate statements with `;`
    Prefer,
    /// Rely on automatic semicolon insertion
    #[default]
    Asi,
}

/// String literal quoting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteStyle {
    #[default]
    PreferSingle,
    AlwaysDouble,
}

/// Global formatting configuration, as the plugin receives it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfiguration {
    pub line_width: u32,
    pub indent_width: u32,
    pub use_tabs: bool,
    pub new_line_kind: NewLineKind,
}

impl Default for GlobalConfiguration {
    fn default() -> Self {
        Self {
            line_width: 80,
            indent_width: 2,
            use_tabs: false,
            new_line_kind: NewLineKind::Auto,
        }
    }
}

impl GlobalConfiguration {
    /// Defaults with `overrides` applied field by field
    pub fn merged(overrides: &GlobalConfigOverride) -> Self {
        overrides.apply_to(Self::default())
    }

    /// Reject values the plugin cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.line_width == 0 {
            return Err("lineWidth must be a positive integer".to_string());
        }
        if self.indent_width == 0 {
            return Err("indentWidth must be a positive integer".to_string());
        }
        Ok(())
    }
}

/// Plugin-specific configuration, as the plugin receives it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub semi_colons: SemiColons,
    pub quote_style: QuoteStyle,
}

impl PluginConfig {
    /// Defaults with `overrides` applied field by field
    pub fn merged(overrides: &PluginConfigOverride) -> Self {
        overrides.apply_to(Self::default())
    }
}

/// Partial [`GlobalConfiguration`]; unset fields keep the lower layer's value
///
/// Also accepts snake_case and lowercased keys, as produced by environment
/// variable sources.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfigOverride {
    #[serde(skip_serializing_if = "Option::is_none", alias = "line_width", alias = "linewidth")]
    pub line_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "indent_width", alias = "indentwidth")]
    pub indent_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "use_tabs", alias = "usetabs")]
    pub use_tabs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "new_line_kind", alias = "newlinekind")]
    pub new_line_kind: Option<NewLineKind>,
}

impl GlobalConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_width(mut self, width: u32) -> Self {
        self.line_width = Some(width);
        self
    }

    pub fn with_indent_width(mut self, width: u32) -> Self {
        self.indent_width = Some(width);
        self
    }

    pub fn with_use_tabs(mut self, use_tabs: bool) -> Self {
        self.use_tabs = Some(use_tabs);
        self
    }

    pub fn with_new_line_kind(mut self, kind: NewLineKind) -> Self {
        self.new_line_kind = Some(kind);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields set here win; everything else comes from `lower`.
    pub fn layered_over(&self, lower: &Self) -> Self {
        Self {
            line_width: self.line_width.or(lower.line_width),
            indent_width: self.indent_width.or(lower.indent_width),
            use_tabs: self.use_tabs.or(lower.use_tabs),
            new_line_kind: self.new_line_kind.or(lower.new_line_kind),
        }
    }

    pub fn apply_to(&self, base: GlobalConfiguration) -> GlobalConfiguration {
        GlobalConfiguration {
            line_width: self.line_width.unwrap_or(base.line_width),
            indent_width: self.indent_width.unwrap_or(base.indent_width),
            use_tabs: self.use_tabs.unwrap_or(base.use_tabs),
            new_line_kind: self.new_line_kind.unwrap_or(base.new_line_kind),
        }
    }
}

/// Partial [`PluginConfig`]; unset fields keep the lower layer's value
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfigOverride {
    #[serde(skip_serializing_if = "Option::is_none", alias = "semi_colons", alias = "semicolons")]
    pub semi_colons: Option<SemiColons>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "quote_style", alias = "quotestyle")]
    pub quote_style: Option<QuoteStyle>,
}

impl PluginConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_semi_colons(mut self, policy: SemiColons) -> Self {
        self.semi_colons = Some(policy);
        self
    }

    pub fn with_quote_style(mut self, style: QuoteStyle) -> Self {
        self.quote_style = Some(style);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn layered_over(&self, lower: &Self) -> Self {
        Self {
            semi_colons: self.semi_colons.or(lower.semi_colons),
            quote_style: self.quote_style.or(lower.quote_style),
        }
    }

    pub fn apply_to(&self, base: PluginConfig) -> PluginConfig {
        PluginConfig {
            semi_colons: self.semi_colons.unwrap_or(base.semi_colons),
            quote_style: self.quote_style.unwrap_or(base.quote_style),
        }
    }
}

/// Overrides for both scopes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub global: GlobalConfigOverride,
    pub plugin: PluginConfigOverride,
}

impl ConfigOverrides {
    pub fn new(global: GlobalConfigOverride, plugin: PluginConfigOverride) -> Self {
        Self { global, plugin }
    }

    /// Per-scope [`GlobalConfigOverride::layered_over`]
    pub fn layered_over(&self, lower: &Self) -> Self {
        Self {
            global: self.global.layered_over(&lower.global),
            plugin: self.plugin.layered_over(&lower.plugin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let global = GlobalConfiguration::default();
        assert_eq!(global.line_width, 80);
        assert_eq!(global.indent_width, 2);
        assert!(!global.use_tabs);
        assert_eq!(global.new_line_kind, NewLineKind::Auto);

        let plugin = PluginConfig::default();
        assert_eq!(plugin.semi_colons, SemiColons::Asi);
        assert_eq!(plugin.quote_style, QuoteStyle::PreferSingle);
    }

    #[test]
    fn test_empty_override_yields_defaults() {
        assert_eq!(
            GlobalConfiguration::merged(&GlobalConfigOverride::new()),
            GlobalConfiguration::default()
        );
        assert_eq!(
            PluginConfig::merged(&PluginConfigOverride::new()),
            PluginConfig::default()
        );
    }

    #[test]
    fn test_merge_is_field_local() {
        let merged = GlobalConfiguration::merged(&GlobalConfigOverride::new().with_indent_width(4));
        assert_eq!(merged.indent_width, 4);
        assert_eq!(merged.line_width, 80);
        assert!(!merged.use_tabs);
        assert_eq!(merged.new_line_kind, NewLineKind::Auto);

        let merged = GlobalConfiguration::merged(&GlobalConfigOverride::new().with_use_tabs(true));
        assert!(merged.use_tabs);
        assert_eq!(merged.indent_width, 2);

        let merged = PluginConfig::merged(
            &PluginConfigOverride::new().with_quote_style(QuoteStyle::AlwaysDouble),
        );
        assert_eq!(merged.quote_style, QuoteStyle::AlwaysDouble);
        assert_eq!(merged.semi_colons, SemiColons::Asi);
    }

    #[test]
    fn test_override_can_restore_a_default_value() {
        // `false` is an explicit value, not "unset"
        let lower = GlobalConfigOverride::new().with_use_tabs(true);
        let upper = GlobalConfigOverride::new().with_use_tabs(false);
        let merged = GlobalConfiguration::merged(&upper.layered_over(&lower));
        assert!(!merged.use_tabs);
    }

    #[test]
    fn test_layering_prefers_upper() {
        let lower = ConfigOverrides::new(
            GlobalConfigOverride::new().with_line_width(120).with_indent_width(4),
            PluginConfigOverride::new().with_semi_colons(SemiColons::Prefer),
        );
        let upper = ConfigOverrides::new(
            GlobalConfigOverride::new().with_indent_width(8),
            PluginConfigOverride::new(),
        );
        let layered = upper.layered_over(&lower);

        assert_eq!(layered.global.line_width, Some(120));
        assert_eq!(layered.global.indent_width, Some(8));
        assert_eq!(layered.global.use_tabs, None);
        assert_eq!(layered.plugin.semi_colons, Some(SemiColons::Prefer));
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(GlobalConfiguration::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "lineWidth": 80,
                "indentWidth": 2,
                "useTabs": false,
                "newLineKind": "auto"
            })
        );

        let json = serde_json::to_value(PluginConfig {
            semi_colons: SemiColons::Prefer,
            quote_style: QuoteStyle::AlwaysDouble,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "semiColons": "prefer", "quoteStyle": "alwaysDouble" })
        );
    }

    #[test]
    fn test_override_deserializes_partial_records() {
        let parsed: GlobalConfigOverride =
            serde_json::from_str(r#"{ "indentWidth": 4, "newLineKind": "crlf" }"#).unwrap();
        assert_eq!(parsed.indent_width, Some(4));
        assert_eq!(parsed.new_line_kind, Some(NewLineKind::Crlf));
        assert_eq!(parsed.line_width, None);

        let parsed: PluginConfigOverride = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_widths() {
        let bad = GlobalConfiguration::merged(&GlobalConfigOverride::new().with_indent_width(0));
        assert!(bad.validate().is_err());
        let bad = GlobalConfiguration::merged(&GlobalConfigOverride::new().with_line_width(0));
        assert!(bad.validate().is_err());
        assert!(GlobalConfiguration::default().validate().is_ok());
    }
}
