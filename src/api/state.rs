use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::LimitsConfig;
use crate::tester::LoadTester;

#[derive(Clone)]
pub struct AppState {
    pub tester: Arc<RwLock<LoadTester>>,
    pub limits: LimitsConfig,
}

impl AppState {
    pub fn new(tester: LoadTester, limits: LimitsConfig) -> Self {
        Self {
            tester: Arc::new(RwLock::new(tester)),
            limits,
        }
    }
}
