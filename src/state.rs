use std::sync::Arc;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use crate::{
    middleware::auth::AuthConfig,
    services::shipping::{FlatRateShipping, ShippingPolicy},
};

#[derive(Clone)]
pub struct AppState {
    pub orm: Arc<DatabaseConnection>,
    pub auth: AuthConfig,
    pub shipping: Arc<dyn ShippingPolicy>,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, auth: AuthConfig) -> Self {
        Self {
            orm: Arc::new(orm),
            auth,
            shipping: Arc::new(FlatRateShipping::default()),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.orm
    }

    pub fn with_shipping(mut self, shipping: impl ShippingPolicy + 'static) -> Self {
        self.shipping = Arc::new(shipping);
        self
    }
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
