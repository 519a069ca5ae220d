//! Notification channels per severity: `{WARNING: [..], CRITICAL: [..]}` on
//! the wire, a `{warning, critical}` block of id sets in state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::severity::Severity;
use crate::schema::{Attribute, Block, NestedBlock};

/// State attribute holding the channels.
pub const ALERT_CHANNELS: &str = "alert_channels";

/// Channel ids per severity, in state form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertChannelsState {
    /// Channels notified on warnings.
    #[serde(default)]
    pub warning: Option<Vec<String>>,
    /// Channels notified on critical alerts.
    #[serde(default)]
    pub critical: Option<Vec<String>>,
}

/// Convert state channels into the severity map. Empty lists are left out.
pub fn to_wire(channels: Option<&AlertChannelsState>) -> BTreeMap<Severity, Vec<String>> {
    let mut map = BTreeMap::new();
    if let Some(channels) = channels {
        for (severity, ids) in [
            (Severity::Warning, &channels.warning),
            (Severity::Critical, &channels.critical),
        ] {
            if let Some(ids) = ids.as_ref().filter(|ids| !ids.is_empty()) {
                map.insert(severity, ids.clone());
            }
        }
    }
    map
}

/// Convert the severity map into state channels; `None` when no severity
/// has a channel.
pub fn to_state(map: &BTreeMap<Severity, Vec<String>>) -> Option<AlertChannelsState> {
    let ids = |severity: Severity| map.get(&severity).filter(|ids| !ids.is_empty()).cloned();
    let channels = AlertChannelsState {
        warning: ids(Severity::Warning),
        critical: ids(Severity::Critical),
    };
    (channels != AlertChannelsState::default()).then_some(channels)
}

/// Schema block of the channels.
pub fn schema_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("Alerting channel ids notified per severity")
            .with_attribute("warning", Attribute::optional_string_set())
            .with_attribute("critical", Attribute::optional_string_set()),
    )
}
