use std::sync::Arc;

use courier_db::Database;
use courier_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub config: RuntimeConfig,
}

/// Knobs the core refuses to hard-code: the typing TTL and the online
/// staleness threshold are deployment configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub jwt_secret: String,
    pub typing_ttl_secs: i64,
    pub online_stale_secs: i64,
}
