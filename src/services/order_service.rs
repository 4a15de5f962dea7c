use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::{
    dto::orders::OrderWithItems,
    entity::{
        order_line_items::{
            ActiveModel as LineItemActive, Column as LineItemCol, Entity as OrderLineItems,
            Model as LineItemModel,
        },
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Order, OrderLineItem, Profile},
    response::{ApiResponse, Meta},
    services::user_service,
    state::AppState,
};

/// An order header before the store has assigned its id.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i32,
    pub date: DateTime<Utc>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub shipping_amount: Decimal,
}

impl NewOrder {
    /// Ships to the profile's address, dated now.
    pub fn ship_to(profile: &Profile, shipping_amount: Decimal) -> Self {
        Self {
            user_id: profile.user_id,
            date: Utc::now(),
            address: profile.address.clone(),
            city: profile.city.clone(),
            state: profile.state.clone(),
            zip: profile.zip.clone(),
            shipping_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLineItem {
    pub order_id: i32,
    pub product_id: i32,
    pub sales_price: Decimal,
    pub quantity: i32,
    pub discount: Decimal,
}

impl NewOrderLineItem {
    /// Snapshots the price the cart was read with.
    pub fn from_cart_item(order_id: i32, item: &CartItem) -> Self {
        Self {
            order_id,
            product_id: item.product.product_id,
            sales_price: item.product.price,
            quantity: item.quantity,
            discount: item.discount_percent,
        }
    }
}

pub async fn create<C: ConnectionTrait>(conn: &C, order: NewOrder) -> AppResult<Order> {
    let model = OrderActive {
        order_id: NotSet,
        user_id: Set(order.user_id),
        date: Set(order.date.into()),
        address: Set(order.address),
        city: Set(order.city),
        state: Set(order.state),
        zip: Set(order.zip),
        shipping_amount: Set(order.shipping_amount),
    }
    .insert(conn)
    .await
    .map_err(|err| match err {
        DbErr::RecordNotInserted => {
            AppError::Internal(anyhow::anyhow!("order insert returned no generated id"))
        }
        other => AppError::Internal(anyhow::Error::new(other).context("failed to create order")),
    })?;

    if model.order_id <= 0 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "order insert returned invalid id {}",
            model.order_id
        )));
    }

    Ok(order_from_entity(model))
}

pub async fn get_by_id<C: ConnectionTrait>(conn: &C, order_id: i32) -> AppResult<Order> {
    Orders::find_by_id(order_id)
        .one(conn)
        .await?
        .map(order_from_entity)
        .ok_or_else(|| AppError::not_found("Order not found"))
}

pub async fn create_line_item<C: ConnectionTrait>(
    conn: &C,
    item: NewOrderLineItem,
) -> AppResult<OrderLineItem> {
    let model = LineItemActive {
        order_line_item_id: NotSet,
        order_id: Set(item.order_id),
        product_id: Set(item.product_id),
        sales_price: Set(item.sales_price),
        quantity: Set(item.quantity),
        discount: Set(item.discount),
    }
    .insert(conn)
    .await
    .map_err(|err| {
        AppError::Internal(anyhow::Error::new(err).context(format!(
            "failed to create line item for order {} product {}",
            item.order_id, item.product_id
        )))
    })?;

    Ok(line_item_from_entity(model))
}

pub async fn list_line_items<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> AppResult<Vec<OrderLineItem>> {
    let items = OrderLineItems::find()
        .filter(LineItemCol::OrderId.eq(order_id))
        .order_by_asc(LineItemCol::OrderLineItemId)
        .all(conn)
        .await?
        .into_iter()
        .map(line_item_from_entity)
        .collect();
    Ok(items)
}

/// Orders of other users read as missing.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    order_id: i32,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    let order = get_by_id(state.db(), order_id).await?;
    if order.user_id != owner.id {
        return Err(AppError::not_found("Order not found"));
    }

    let items = list_line_items(state.db(), order.order_id).await?;
    let meta = Meta::count(items.len());

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(meta),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        order_id: model.order_id,
        user_id: model.user_id,
        date: model.date.with_timezone(&Utc),
        address: model.address,
        city: model.city,
        state: model.state,
        zip: model.zip,
        shipping_amount: model.shipping_amount,
    }
}

fn line_item_from_entity(model: LineItemModel) -> OrderLineItem {
    OrderLineItem {
        order_line_item_id: model.order_line_item_id,
        order_id: model.order_id,
        product_id: model.product_id,
        sales_price: model.sales_price,
        quantity: model.quantity,
        discount: model.discount,
    }
}
