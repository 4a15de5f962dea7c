use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Order, OrderLineItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}
