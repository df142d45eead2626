//! Pushing configuration into the plugin

use std::fmt;

use serde::Serialize;
use tracing::{debug, error};

use super::{ConfigOverrides, GlobalConfiguration, PluginConfig};
use crate::guest::{Export, GuestExports};
use crate::transport::Transport;
use crate::types::{BridgeError, BridgeResult};

/// One of the two configuration domains the plugin keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Plugin,
}

impl ConfigScope {
    /// Export that commits the just-sent bytes as this scope's configuration
    pub fn commit_export(&self) -> Export {
        match self {
            ConfigScope::Global => Export::SetGlobalConfig,
            ConfigScope::Plugin => Export::SetPluginConfig,
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Global => write!(f, "global"),
            ConfigScope::Plugin => write!(f, "plugin"),
        }
    }
}

/// Fully merged configuration for one request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationApplier {
    global: GlobalConfiguration,
    plugin: PluginConfig,
}

impl ConfigurationApplier {
    /// Merge `overrides` onto the documented defaults.
    pub fn new(overrides: &ConfigOverrides) -> Self {
        Self {
            global: GlobalConfiguration::merged(&overrides.global),
            plugin: PluginConfig::merged(&overrides.plugin),
        }
    }

    pub fn global(&self) -> &GlobalConfiguration {
        &self.global
    }

    pub fn plugin(&self) -> &PluginConfig {
        &self.plugin
    }

    /// Send and commit the global scope, then the plugin scope.
    ///
    /// A scope that fails to encode aborts the request before anything of
    /// that scope is sent. A scope already committed stays committed until
    /// the next `reset_config`.
    pub fn apply<G: GuestExports>(&self, transport: &mut Transport<G>) -> BridgeResult<()> {
        if let Err(message) = self.global.validate() {
            error!(scope = %ConfigScope::Global, error = %message, "invalid configuration");
            return Err(BridgeError::Serialization {
                scope: ConfigScope::Global.to_string(),
                message,
            });
        }
        let global = encode(ConfigScope::Global, &self.global)?;
        push(transport, ConfigScope::Global, &global)?;

        let plugin = encode(ConfigScope::Plugin, &self.plugin)?;
        push(transport, ConfigScope::Plugin, &plugin)?;

        Ok(())
    }
}

fn encode<T: Serialize>(scope: ConfigScope, record: &T) -> BridgeResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        error!(%scope, error = %e, "failed to serialize configuration");
        BridgeError::Serialization {
            scope: scope.to_string(),
            message: e.to_string(),
        }
    })
}

fn push<G: GuestExports>(
    transport: &mut Transport<G>,
    scope: ConfigScope,
    encoded: &[u8],
) -> BridgeResult<()> {
    debug!(%scope, config = %String::from_utf8_lossy(encoded), "applying configuration");
    transport.send_bytes(encoded)?;
    transport.guest_mut().call_void(scope.commit_export(), &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        GlobalConfigOverride, NewLineKind, PluginConfigOverride, QuoteStyle, SemiColons,
    };
    use crate::guest::mock::ScriptedGuest;

    fn applied(overrides: &ConfigOverrides) -> ScriptedGuest {
        let mut guest = ScriptedGuest::new(vec![7]);
        ConfigurationApplier::new(overrides)
            .apply(&mut Transport::new(&mut guest))
            .unwrap();
        guest
    }

    fn parsed(raw: &Option<String>) -> serde_json::Value {
        serde_json::from_str(raw.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_are_sent_as_complete_records() {
        let guest = applied(&ConfigOverrides::default());

        assert_eq!(
            parsed(&guest.global_config),
            serde_json::json!({
                "lineWidth": 80,
                "indentWidth": 2,
                "useTabs": false,
                "newLineKind": "auto"
            })
        );
        assert_eq!(
            parsed(&guest.plugin_config),
            serde_json::json!({ "semiColons": "asi", "quoteStyle": "preferSingle" })
        );
    }

    #[test]
    fn test_overrides_reach_the_guest() {
        let overrides = ConfigOverrides::new(
            GlobalConfigOverride::new()
                .with_indent_width(4)
                .with_new_line_kind(NewLineKind::Lf),
            PluginConfigOverride::new()
                .with_semi_colons(SemiColons::Prefer)
                .with_quote_style(QuoteStyle::AlwaysDouble),
        );
        let guest = applied(&overrides);

        let global = parsed(&guest.global_config);
        assert_eq!(global["indentWidth"], 4);
        assert_eq!(global["lineWidth"], 80);
        assert_eq!(global["newLineKind"], "lf");

        let plugin = parsed(&guest.plugin_config);
        assert_eq!(plugin["semiColons"], "prefer");
        assert_eq!(plugin["quoteStyle"], "alwaysDouble");
    }

    #[test]
    fn test_merged_records_fill_unset_fields() {
        let applier = ConfigurationApplier::new(&ConfigOverrides::new(
            GlobalConfigOverride::new().with_use_tabs(true),
            PluginConfigOverride::new().with_semi_colons(SemiColons::Prefer),
        ));

        assert_eq!(
            applier.global(),
            &GlobalConfiguration {
                use_tabs: true,
                ..GlobalConfiguration::default()
            }
        );
        assert_eq!(applier.plugin().semi_colons, SemiColons::Prefer);
        assert_eq!(applier.plugin().quote_style, QuoteStyle::PreferSingle);
    }

    #[test]
    fn test_global_scope_is_committed_before_plugin_scope() {
        let guest = applied(&ConfigOverrides::default());
        let commits: Vec<_> = guest
            .calls
            .iter()
            .filter(|c| matches!(c, Export::SetGlobalConfig | Export::SetPluginConfig))
            .copied()
            .collect();

        assert_eq!(commits, vec![Export::SetGlobalConfig, Export::SetPluginConfig]);
        assert_eq!(guest.count(Export::ClearSharedBytes), 2);
    }

    #[test]
    fn test_invalid_global_scope_aborts_before_sending() {
        let overrides = ConfigOverrides::new(
            GlobalConfigOverride::new().with_line_width(0),
            PluginConfigOverride::new(),
        );
        let mut guest = ScriptedGuest::new(vec![7]);
        let err = ConfigurationApplier::new(&overrides)
            .apply(&mut Transport::new(&mut guest))
            .unwrap_err();

        assert!(matches!(err, BridgeError::Serialization { ref scope, .. } if scope == "global"));
        assert!(guest.calls.is_empty());
        assert!(guest.global_config.is_none());
        assert!(guest.plugin_config.is_none());
    }
}
