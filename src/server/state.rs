use crate::app::mediator::Mediator;
use crate::auth::TokenVerifier;
use std::sync::Arc;

/// Shared by every route
#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<Mediator>,
    pub auth: Arc<TokenVerifier>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(mediator: Mediator, auth: TokenVerifier) -> Self {
        Self {
            mediator: Arc::new(mediator),
            auth: Arc::new(auth),
            metrics_enabled: false,
        }
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
