//! Turns a user's cart into an order.
//!
//! Everything from the profile read to the cart clear runs in one database
//! transaction, so a failed line-item insert leaves no order behind. The cart
//! clear runs in a savepoint of its own: if it fails the order is still
//! committed and the leftover cart can be cleared later. Only the products
//! that were ordered are removed from the cart.

use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    audit,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, Order},
    services::{
        cart_service,
        order_service::{self, NewOrder, NewOrderLineItem},
        profile_service, user_service,
    },
    state::AppState,
};

#[tracing::instrument(skip(state, principal), fields(username = %principal.username))]
pub async fn checkout(state: &AppState, principal: &AuthUser) -> AppResult<Order> {
    let user = user_service::get_by_username(state.db(), &principal.username).await?;

    let txn = state.db().begin().await?;

    let profile = profile_service::get_by_user_id(&txn, user.id)
        .await?
        .ok_or_else(|| {
            AppError::not_found("Profile not found. Please update your profile before checking out.")
        })?;

    let cart = cart_service::get_by_user_for_update(&txn, user.id).await?;
    if cart.is_empty() {
        return Err(AppError::bad_request("Shopping cart is empty"));
    }

    let shipping_amount = state.shipping.shipping_amount(&profile, &cart);
    let order = order_service::create(&txn, NewOrder::ship_to(&profile, shipping_amount)).await?;

    for item in cart.items.values() {
        order_service::create_line_item(&txn, NewOrderLineItem::from_cart_item(order.order_id, item))
            .await?;
    }

    clear_cart(&txn, user.id, &cart).await;

    txn.commit().await?;

    audit::record(
        state.db(),
        user.id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.order_id, "line_items": cart.len() }),
    )
    .await;

    tracing::info!(
        order_id = order.order_id,
        line_items = cart.len(),
        total = %cart.total,
        "checkout completed"
    );

    Ok(order)
}

/// Deletes the entries that became line items. Products added while the
/// checkout was running stay in the cart.
async fn clear_cart(txn: &DatabaseTransaction, user_id: i32, cart: &Cart) {
    let savepoint = match txn.begin().await {
        Ok(savepoint) => savepoint,
        Err(err) => {
            tracing::warn!(error = %err, user_id, "could not open savepoint, cart left as is");
            return;
        }
    };

    match cart_service::clear_products(&savepoint, user_id, cart.items.keys().copied()).await {
        Ok(removed) => {
            if let Err(err) = savepoint.commit().await {
                tracing::warn!(error = %err, user_id, "cart clear not released");
            } else {
                tracing::debug!(user_id, removed, "cart cleared after checkout");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, user_id, "cart clear failed after checkout");
            if let Err(err) = savepoint.rollback().await {
                tracing::warn!(error = %err, user_id, "savepoint rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Value};

    use super::*;
    use crate::{
        entity::{
            order_line_items::Model as LineItemModel, orders::Model as OrderModel,
            profiles::Model as ProfileModel, users::Model as UserModel,
        },
        middleware::auth::AuthConfig,
        services::cart_service::tests::cart_row,
    };

    const LINE_ITEM_INSERT: &str = r#"INSERT INTO \"order_line_items\""#;

    fn principal() -> AuthUser {
        AuthUser {
            username: "homer".into(),
        }
    }

    fn user() -> UserModel {
        UserModel {
            user_id: 1,
            username: "homer".into(),
            created_at: Utc::now().into(),
        }
    }

    fn profile() -> ProfileModel {
        ProfileModel {
            user_id: 1,
            first_name: None,
            last_name: None,
            phone: None,
            email: None,
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62704".into(),
        }
    }

    fn order() -> OrderModel {
        OrderModel {
            order_id: 15,
            user_id: 1,
            date: Utc::now().into(),
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62704".into(),
            shipping_amount: Decimal::ZERO,
        }
    }

    fn line_item(id: i32, product_id: i32, sales_price: Decimal, quantity: i32) -> LineItemModel {
        LineItemModel {
            order_line_item_id: id,
            order_id: 15,
            product_id,
            sales_price,
            quantity,
            discount: Decimal::ZERO,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn state(db: MockDatabase) -> AppState {
        AppState::new(db.into_connection(), AuthConfig::new("test-secret"))
    }

    fn transaction_log(state: AppState) -> String {
        let AppState { orm, .. } = state;
        let orm = Arc::into_inner(orm).expect("connection still shared");
        format!("{:?}", orm.into_transaction_log())
    }

    #[tokio::test]
    async fn creates_order_with_one_line_item_per_cart_entry() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user()]])
            .append_query_results([vec![profile()]])
            .append_query_results([vec![
                cart_row(3, Decimal::new(500, 2), 1),
                cart_row(7, Decimal::new(2999, 2), 2),
            ]])
            .append_query_results([vec![order()]])
            .append_query_results([vec![line_item(1, 3, Decimal::new(500, 2), 1)]])
            .append_query_results([vec![line_item(2, 7, Decimal::new(2999, 2), 2)]])
            .append_exec_results([exec(2), exec(1)]);
        let state = state(db);

        let order = checkout(&state, &principal()).await.unwrap();
        assert_eq!(order.order_id, 15);
        assert_eq!(order.user_id, 1);
        assert_eq!(order.address, "1 Main St");
        assert_eq!(order.city, "Springfield");
        assert_eq!(order.state, "IL");
        assert_eq!(order.zip, "62704");
        assert_eq!(order.shipping_amount, Decimal::ZERO);

        let log = transaction_log(state);
        assert_eq!(log.matches(LINE_ITEM_INSERT).count(), 2);
        assert!(log.contains("29.99"));
        assert!(log.contains(r#"DELETE FROM \"shopping_cart\""#));
        assert!(log.contains(r#"\"product_id\" IN ("#));
        assert!(log.contains("RELEASE SAVEPOINT"));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_any_order_is_written() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user()]])
            .append_query_results([vec![profile()]])
            .append_query_results([Vec::<BTreeMap<&str, Value>>::new()]);
        let state = state(db);

        let err = checkout(&state, &principal()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(!transaction_log(state).contains("INSERT INTO"));
    }

    #[tokio::test]
    async fn missing_profile_is_not_found_and_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user()]])
            .append_query_results([Vec::<ProfileModel>::new()]);
        let state = state(db);

        let err = checkout(&state, &principal()).await.unwrap_err();
        match err {
            AppError::NotFound(message) => assert!(message.contains("update your profile")),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!transaction_log(state).contains("INSERT INTO"));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<UserModel>::new()]);
        let state = state(db);

        let err = checkout(&state, &principal()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn line_item_failure_aborts_checkout() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user()]])
            .append_query_results([vec![profile()]])
            .append_query_results([vec![
                cart_row(3, Decimal::new(500, 2), 1),
                cart_row(7, Decimal::new(2999, 2), 2),
            ]])
            .append_query_results([vec![order()]])
            .append_query_results([vec![line_item(1, 3, Decimal::new(500, 2), 1)]])
            .append_query_errors([DbErr::Custom("connection reset".into())]);
        let state = state(db);

        let err = checkout(&state, &principal()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!transaction_log(state).contains("DELETE FROM"));
    }

    #[tokio::test]
    async fn cart_clear_failure_still_returns_the_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user()]])
            .append_query_results([vec![profile()]])
            .append_query_results([vec![cart_row(7, Decimal::new(2999, 2), 2)]])
            .append_query_results([vec![order()]])
            .append_query_results([vec![line_item(1, 7, Decimal::new(2999, 2), 2)]])
            .append_exec_errors([DbErr::Custom("lock timeout".into())])
            .append_exec_results([exec(1)]);
        let state = state(db);

        let order = checkout(&state, &principal()).await.unwrap();
        assert_eq!(order.order_id, 15);

        let log = transaction_log(state);
        let rolled_back = log.find("ROLLBACK TO SAVEPOINT").expect("savepoint rolled back");
        let committed = log.rfind("COMMIT").expect("outer transaction committed");
        assert!(rolled_back < committed);
        assert!(!log.contains("RELEASE SAVEPOINT"));
    }
}
