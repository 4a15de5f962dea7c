use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, RelationTrait, Select, Set,
    sea_query::{Expr, LockType, OnConflict},
};

use crate::{
    audit,
    entity::{
        products::{Column as ProdCol, Entity as Products},
        shopping_cart::{
            ActiveModel as CartActive, Column as CartCol, Entity as ShoppingCart,
            Relation as CartRelation,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, Product},
    response::{ApiResponse, Meta},
    services::user_service,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: i32,
    quantity: i32,
    discount_percent: Decimal,
    name: String,
    price: Decimal,
    category_id: i32,
    description: Option<String>,
    subcategory: Option<String>,
    stock: i32,
    featured: bool,
    image_url: Option<String>,
}

/// Cart entries joined with the current catalog row of each product.
fn cart_rows(user_id: i32) -> Select<ShoppingCart> {
    ShoppingCart::find()
        .select_only()
        .columns([CartCol::ProductId, CartCol::Quantity, CartCol::DiscountPercent])
        .columns([
            ProdCol::Name,
            ProdCol::Price,
            ProdCol::CategoryId,
            ProdCol::Description,
            ProdCol::Subcategory,
            ProdCol::Stock,
            ProdCol::Featured,
            ProdCol::ImageUrl,
        ])
        .join(JoinType::InnerJoin, CartRelation::Products.def())
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::ProductId)
}

fn entry(user_id: i32, product_id: i32) -> Condition {
    Condition::all()
        .add(CartCol::UserId.eq(user_id))
        .add(CartCol::ProductId.eq(product_id))
}

/// Never fails for an untouched user: no rows is an empty cart.
pub async fn get_by_user<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Cart> {
    let rows = cart_rows(user_id)
        .into_model::<CartProductRow>()
        .all(conn)
        .await?;
    Ok(cart_from_rows(rows))
}

/// Same as [`get_by_user`] but locks the user's cart rows until the
/// surrounding transaction ends. Only `shopping_cart` is locked: the joined
/// product rows stay free for other carts and catalog updates.
pub async fn get_by_user_for_update<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Cart> {
    let mut select = cart_rows(user_id);
    QueryTrait::query(&mut select).lock_with_tables(LockType::NoKeyUpdate, [ShoppingCart]);
    let rows = select
        .into_model::<CartProductRow>()
        .all(conn)
        .await?;
    Ok(cart_from_rows(rows))
}

/// Inserts the product with quantity 1 or bumps the existing quantity by 1,
/// in one statement.
pub async fn add_product<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_id: i32,
) -> AppResult<()> {
    let product = Products::find_by_id(product_id).one(conn).await?;
    if product.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    let item = CartActive {
        user_id: Set(user_id),
        product_id: Set(product_id),
        quantity: Set(1),
        discount_percent: Set(Decimal::ZERO),
    };

    ShoppingCart::insert(item)
        .on_conflict(
            OnConflict::columns([CartCol::UserId, CartCol::ProductId])
                .value(
                    CartCol::Quantity,
                    Expr::col((ShoppingCart, CartCol::Quantity)).add(1),
                )
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

/// Overwrites the quantity of an entry. Zero removes the entry, negative
/// quantities are rejected.
pub async fn update_quantity<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_id: i32,
    quantity: i32,
) -> AppResult<()> {
    if quantity < 0 {
        return Err(AppError::bad_request("quantity must not be negative"));
    }

    let rows_affected = if quantity == 0 {
        ShoppingCart::delete_many()
            .filter(entry(user_id, product_id))
            .exec(conn)
            .await?
            .rows_affected
    } else {
        ShoppingCart::update_many()
            .col_expr(CartCol::Quantity, Expr::value(quantity))
            .filter(entry(user_id, product_id))
            .exec(conn)
            .await?
            .rows_affected
    };

    if rows_affected == 0 {
        return Err(AppError::not_found("Product is not in the cart"));
    }
    Ok(())
}

pub async fn remove_product<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_id: i32,
) -> AppResult<u64> {
    let result = ShoppingCart::delete_many()
        .filter(entry(user_id, product_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Removes every entry of the user. Clearing an empty cart is a no-op.
pub async fn clear<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<u64> {
    let result = ShoppingCart::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Removes only the listed entries of the user, leaving anything added
/// since the cart was read.
pub async fn clear_products<C, I>(conn: &C, user_id: i32, product_ids: I) -> AppResult<u64>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i32>,
{
    let product_ids: Vec<i32> = product_ids.into_iter().collect();
    if product_ids.is_empty() {
        return Ok(0);
    }

    let result = ShoppingCart::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .filter(CartCol::ProductId.is_in(product_ids))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    cart_response(state, owner.id, "OK").await
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
) -> AppResult<ApiResponse<Cart>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    add_product(state.db(), owner.id, product_id).await?;

    audit::record(
        state.db(),
        owner.id,
        "cart_add",
        "shopping_cart",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    cart_response(state, owner.id, "Added to cart").await
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
    quantity: i32,
) -> AppResult<ApiResponse<Cart>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    update_quantity(state.db(), owner.id, product_id, quantity).await?;

    audit::record(
        state.db(),
        owner.id,
        "cart_update",
        "shopping_cart",
        serde_json::json!({ "product_id": product_id, "quantity": quantity }),
    )
    .await;

    cart_response(state, owner.id, "Cart updated").await
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
) -> AppResult<ApiResponse<Cart>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    let removed = remove_product(state.db(), owner.id, product_id).await?;

    if removed > 0 {
        audit::record(
            state.db(),
            owner.id,
            "cart_remove",
            "shopping_cart",
            serde_json::json!({ "product_id": product_id }),
        )
        .await;
    }

    cart_response(state, owner.id, "Removed from cart").await
}

pub async fn empty_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let owner = user_service::get_by_username(state.db(), &user.username).await?;
    let removed = clear(state.db(), owner.id).await?;
    tracing::debug!(user_id = owner.id, removed, "cart cleared");

    Ok(ApiResponse::success(
        "Cart cleared",
        Cart::default(),
        Some(Meta::count(0)),
    ))
}

async fn cart_response(
    state: &AppState,
    user_id: i32,
    message: &str,
) -> AppResult<ApiResponse<Cart>> {
    let cart = get_by_user(state.db(), user_id).await?;
    let meta = Meta::count(cart.len());
    Ok(ApiResponse::success(message, cart, Some(meta)))
}

fn cart_from_rows(rows: Vec<CartProductRow>) -> Cart {
    Cart::from_items(rows.into_iter().map(|row| {
        CartItem::new(
            Product {
                product_id: row.product_id,
                name: row.name,
                price: row.price,
                category_id: row.category_id,
                description: row.description,
                subcategory: row.subcategory,
                stock: row.stock,
                featured: row.featured,
                image_url: row.image_url,
            },
            row.quantity,
            row.discount_percent,
        )
    }))
}
