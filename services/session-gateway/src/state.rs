use session_relay::{EngineConfig, Registry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<EngineConfig>,
}
