use crate::backend::Backend;
use crate::payment::PaymentProcessor;
use crate::routes::RouteTable;
use crate::session::SessionStore;
use crate::upgrade::flow::DEFAULT_POST_UPGRADE_PATH;
use crate::upgrade::CheckoutSlot;
use std::sync::Arc;

/// Everything the handlers share, registered once as `web::Data`
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub routes: Arc<RouteTable>,
    pub backend: Arc<dyn Backend>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub checkout: CheckoutSlot,
    pub post_upgrade_path: String,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: SessionStore,
        backend: Arc<dyn Backend>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            store,
            routes: Arc::new(RouteTable::news_client()),
            backend,
            processor,
            checkout: CheckoutSlot::new(),
            post_upgrade_path: DEFAULT_POST_UPGRADE_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = Arc::new(routes);
        self
    }

    #[must_use]
    pub fn with_post_upgrade_path(mut self, path: &str) -> Self {
        self.post_upgrade_path = path.to_string();
        self
    }
}
