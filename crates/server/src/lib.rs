use std::sync::Arc;

use config::Config;
use db::DBService;

pub mod error;
pub mod extract;
pub mod http;
pub mod middleware;
pub mod routes;

/// Shared handler state. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
