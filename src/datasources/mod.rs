//! Read-only data sources.

pub mod alerting_channel;
pub mod automation_action;
pub mod builtin_event;
pub mod custom_event_specification;
pub mod host_agents;
pub mod synthetic_location;
pub mod user;
pub mod users;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datasource::{DataSource, LookupDataSource};

pub use alerting_channel::AlertingChannelDataSource;
pub use automation_action::AutomationActionDataSource;
pub use builtin_event::BuiltinEventDataSource;
pub use custom_event_specification::CustomEventSpecificationDataSource;
pub use host_agents::HostAgentsDataSource;
pub use synthetic_location::SyntheticLocationDataSource;
pub use user::UserDataSource;
pub use users::UsersDataSource;

/// Every data source, keyed by data source name.
pub fn registry() -> BTreeMap<&'static str, Arc<dyn DataSource>> {
    let data_sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(LookupDataSource::new(AlertingChannelDataSource::new())),
        Arc::new(LookupDataSource::new(AutomationActionDataSource::new())),
        Arc::new(LookupDataSource::new(BuiltinEventDataSource::new())),
        Arc::new(LookupDataSource::new(CustomEventSpecificationDataSource::new())),
        Arc::new(HostAgentsDataSource::new()),
        Arc::new(LookupDataSource::new(SyntheticLocationDataSource::new())),
        Arc::new(LookupDataSource::new(UserDataSource::new())),
        Arc::new(UsersDataSource::new()),
    ];
    data_sources
        .into_iter()
        .map(|data_source| (data_source.metadata().name, data_source))
        .collect()
}
