use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub product_id: i32,
    pub name: String,
    pub price: Decimal,
    pub category_id: i32,
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub stock: i32,
    pub featured: bool,
    pub image_url: Option<String>,
}

/// A cart entry joined with the product as it is in the catalog right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product: Product,
    pub quantity: i32,
    pub discount_percent: Decimal,
    pub line_total: Decimal,
}

impl CartItem {
    pub fn new(product: Product, quantity: i32, discount_percent: Decimal) -> Self {
        let line_total = line_total(product.price, quantity, discount_percent);
        Self {
            product,
            quantity,
            discount_percent,
            line_total,
        }
    }
}

/// `price * quantity` reduced by `discount_percent` (0-100), rounded to cents.
pub fn line_total(price: Decimal, quantity: i32, discount_percent: Decimal) -> Decimal {
    let gross = price * Decimal::from(quantity);
    let factor = (Decimal::ONE_HUNDRED - discount_percent) / Decimal::ONE_HUNDRED;
    (gross * factor).round_dp(2)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub items: BTreeMap<i32, CartItem>,
    pub total: Decimal,
}

impl Cart {
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let items: BTreeMap<i32, CartItem> = items
            .into_iter()
            .map(|item| (item.product.product_id, item))
            .collect();
        let total = items.values().map(|item| item.line_total).sum();
        Self { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub order_id: i32,
    pub user_id: i32,
    pub date: DateTime<Utc>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub shipping_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineItem {
    pub order_line_item_id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub sales_price: Decimal,
    pub quantity: i32,
    pub discount: Decimal,
}
