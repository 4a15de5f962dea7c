use std::time::Duration;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use storefront_checkout::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::profile::UpdateProfileRequest,
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::{AuthConfig, AuthUser},
    services::{cart_service, checkout_service, order_service, profile_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow against a real Postgres: cart mutations -> checkout.
// Every test works on its own user and products, so tests can share a database.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let config = AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "JWT_SECRET" => Some("integration-secret".to_string()),
        _ => None,
    })?;
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    Ok(Some(AppState::new(
        create_orm_conn(pool),
        AuthConfig::new(&config.jwt_secret),
    )))
}

async fn create_user(state: &AppState) -> anyhow::Result<(i32, AuthUser)> {
    let username = format!("user-{}", &Uuid::new_v4().simple().to_string()[..12]);
    let user = UserActive {
        user_id: NotSet,
        username: Set(username.clone()),
        created_at: Set(chrono::Utc::now().into()),
    }
    .insert(state.db())
    .await?;

    Ok((user.user_id, AuthUser { username }))
}

async fn create_product(state: &AppState, price: Decimal) -> anyhow::Result<i32> {
    let category_id = ensure_category(state).await?;
    let product = ProductActive {
        product_id: NotSet,
        name: Set(format!("Widget {}", &Uuid::new_v4().simple().to_string()[..12])),
        price: Set(price),
        category_id: Set(category_id),
        description: Set(Some("A product for testing".into())),
        subcategory: Set(Some("Blue".into())),
        stock: Set(10),
        featured: Set(false),
        image_url: Set(None),
    }
    .insert(state.db())
    .await?;

    Ok(product.product_id)
}

async fn ensure_category(state: &AppState) -> anyhow::Result<i32> {
    let pool = state.db().get_postgres_connection_pool();
    let (category_id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO categories (name, description)
        VALUES ('Test Category', 'Created by integration tests')
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING category_id
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(category_id)
}

async fn save_profile(state: &AppState, user_id: i32) -> anyhow::Result<()> {
    profile_service::update(
        state.db(),
        user_id,
        UpdateProfileRequest {
            first_name: None,
            last_name: None,
            phone: None,
            email: None,
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62704".into(),
        },
    )
    .await?;
    Ok(())
}

async fn order_count(state: &AppState, user_id: i32) -> anyhow::Result<u64> {
    Ok(Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .count(state.db())
        .await?)
}

#[tokio::test]
async fn checkout_turns_cart_into_order_and_empties_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, principal) = create_user(&state).await?;
    save_profile(&state, user_id).await?;
    let product_id = create_product(&state, Decimal::new(2999, 2)).await?;

    cart_service::add_product(state.db(), user_id, product_id).await?;
    cart_service::add_product(state.db(), user_id, product_id).await?;

    let order = checkout_service::checkout(&state, &principal).await?;
    assert_eq!(order.user_id, user_id);
    assert_eq!(order.address, "1 Main St");
    assert_eq!(order.city, "Springfield");
    assert_eq!(order.state, "IL");
    assert_eq!(order.zip, "62704");
    assert_eq!(order.shipping_amount, Decimal::ZERO);

    let items = order_service::list_line_items(state.db(), order.order_id).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, product_id);
    assert_eq!(items[0].sales_price, Decimal::new(2999, 2));
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].discount, Decimal::ZERO);

    let cart = cart_service::get_by_user(state.db(), user_id).await?;
    assert!(cart.is_empty());

    let stored = order_service::get_by_id(state.db(), order.order_id).await?;
    assert_eq!(stored.order_id, order.order_id);

    Ok(())
}

#[tokio::test]
async fn line_items_keep_price_charged_at_checkout() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, principal) = create_user(&state).await?;
    save_profile(&state, user_id).await?;
    let first = create_product(&state, Decimal::new(1000, 2)).await?;
    let second = create_product(&state, Decimal::new(2550, 2)).await?;

    cart_service::add_product(state.db(), user_id, first).await?;
    cart_service::add_product(state.db(), user_id, second).await?;

    let order = checkout_service::checkout(&state, &principal).await?;

    sqlx::query("UPDATE products SET price = price * 2 WHERE product_id = ANY($1)")
        .bind(vec![first, second])
        .execute(state.db().get_postgres_connection_pool())
        .await?;

    let items = order_service::list_line_items(state.db(), order.order_id).await?;
    assert_eq!(items.len(), 2);
    let price_of = |product_id: i32| {
        items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.sales_price)
    };
    assert_eq!(price_of(first), Some(Decimal::new(1000, 2)));
    assert_eq!(price_of(second), Some(Decimal::new(2550, 2)));

    Ok(())
}

#[tokio::test]
async fn checkout_without_profile_creates_no_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, principal) = create_user(&state).await?;
    let product_id = create_product(&state, Decimal::new(2999, 2)).await?;
    cart_service::add_product(state.db(), user_id, product_id).await?;

    let err = checkout_service::checkout(&state, &principal)
        .await
        .expect_err("checkout without profile must fail");
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(order_count(&state, user_id).await?, 0);

    let cart = cart_service::get_by_user(state.db(), user_id).await?;
    assert_eq!(cart.len(), 1, "cart is untouched by a rejected checkout");

    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_creates_no_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, principal) = create_user(&state).await?;
    save_profile(&state, user_id).await?;

    let err = checkout_service::checkout(&state, &principal)
        .await
        .expect_err("checkout of empty cart must fail");
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(order_count(&state, user_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn concurrent_adds_never_lose_an_increment() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, _) = create_user(&state).await?;
    let product_id = create_product(&state, Decimal::new(500, 2)).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            cart_service::add_product(state.db(), user_id, product_id).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let cart = cart_service::get_by_user(state.db(), user_id).await?;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.items[&product_id].quantity, 8);

    Ok(())
}

#[tokio::test]
async fn update_quantity_round_trips_and_zero_removes() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, _) = create_user(&state).await?;
    let product_id = create_product(&state, Decimal::new(500, 2)).await?;
    cart_service::add_product(state.db(), user_id, product_id).await?;

    cart_service::update_quantity(state.db(), user_id, product_id, 5).await?;
    let cart = cart_service::get_by_user(state.db(), user_id).await?;
    assert_eq!(cart.items[&product_id].quantity, 5);
    assert_eq!(cart.total, Decimal::new(2500, 2));

    cart_service::update_quantity(state.db(), user_id, product_id, 0).await?;
    assert!(cart_service::get_by_user(state.db(), user_id).await?.is_empty());

    assert_eq!(cart_service::clear(state.db(), user_id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn checkout_does_not_wait_on_another_users_cart_lock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (first_id, _) = create_user(&state).await?;
    let (second_id, second) = create_user(&state).await?;
    save_profile(&state, second_id).await?;
    let shared = create_product(&state, Decimal::new(1500, 2)).await?;
    cart_service::add_product(state.db(), first_id, shared).await?;
    cart_service::add_product(state.db(), second_id, shared).await?;

    let txn = state.db().begin().await?;
    let held = cart_service::get_by_user_for_update(&txn, first_id).await?;
    assert_eq!(held.len(), 1);

    let order = tokio::time::timeout(
        Duration::from_secs(5),
        checkout_service::checkout(&state, &second),
    )
    .await
    .map_err(|_| anyhow::anyhow!("checkout blocked by another user's cart lock"))??;
    assert_eq!(order.user_id, second_id);

    tokio::time::timeout(
        Duration::from_secs(5),
        sqlx::query("UPDATE products SET stock = stock - 1 WHERE product_id = $1")
            .bind(shared)
            .execute(state.db().get_postgres_connection_pool()),
    )
    .await
    .map_err(|_| anyhow::anyhow!("catalog update blocked by a cart lock"))??;

    txn.rollback().await?;
    Ok(())
}

#[tokio::test]
async fn product_added_during_checkout_stays_in_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, _) = create_user(&state).await?;
    let ordered = create_product(&state, Decimal::new(1000, 2)).await?;
    let late = create_product(&state, Decimal::new(2000, 2)).await?;
    cart_service::add_product(state.db(), user_id, ordered).await?;

    let txn = state.db().begin().await?;
    let snapshot = cart_service::get_by_user_for_update(&txn, user_id).await?;
    assert_eq!(snapshot.len(), 1);

    cart_service::add_product(state.db(), user_id, late).await?;

    let removed =
        cart_service::clear_products(&txn, user_id, snapshot.items.keys().copied()).await?;
    assert_eq!(removed, 1);
    txn.commit().await?;

    let cart = cart_service::get_by_user(state.db(), user_id).await?;
    assert_eq!(cart.len(), 1);
    assert!(cart.items.contains_key(&late));

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_create_one_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (user_id, principal) = create_user(&state).await?;
    save_profile(&state, user_id).await?;
    let product_id = create_product(&state, Decimal::new(999, 2)).await?;
    cart_service::add_product(state.db(), user_id, product_id).await?;
    cart_service::add_product(state.db(), user_id, product_id).await?;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let state = state.clone();
        let principal = principal.clone();
        handles.push(tokio::spawn(async move {
            checkout_service::checkout(&state, &principal).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await? {
            Ok(order) => {
                assert_eq!(order.user_id, user_id);
                placed += 1;
            }
            Err(AppError::BadRequest(message)) => assert_eq!(message, "Shopping cart is empty"),
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(order_count(&state, user_id).await?, 1);
    assert!(cart_service::get_by_user(state.db(), user_id).await?.is_empty());

    Ok(())
}
