use crate::EntanglementMetrics;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<EntanglementMetrics>,
}

impl AppState {
    pub fn new(metrics: Arc<EntanglementMetrics>) -> Self {
        Self { metrics }
    }
}
