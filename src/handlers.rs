use crate::config::Config;
use crate::db::{InstallationStore, RuleStore};
use crate::ones::OpenApi;
use std::sync::Arc;

pub mod issue_watcher;
pub mod outcome;

/// Everything a request handler may need. Built once at startup.
pub struct Context {
    pub rules: Arc<dyn RuleStore>,
    pub installations: Arc<dyn InstallationStore>,
    pub ones: Arc<dyn OpenApi>,
    pub config: Arc<Config>,
}
