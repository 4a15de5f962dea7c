use chrono::Duration;
use rust_decimal::Decimal;
use storefront_checkout::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::AuthConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    seed_catalog(&pool).await?;
    let user_id = ensure_user(&pool, "user").await?;
    ensure_profile(&pool, user_id).await?;

    let token = AuthConfig::new(&config.jwt_secret).issue_token("user", Duration::hours(24))?;
    println!("Seed completed. User ID: {user_id}");
    println!("Authorization: Bearer {token}");
    Ok(())
}

async fn ensure_user(pool: &sqlx::PgPool, username: &str) -> anyhow::Result<i32> {
    let (user_id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO users (username)
        VALUES ($1)
        ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
        RETURNING user_id
        "#,
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {username}");
    Ok(user_id)
}

async fn ensure_profile(pool: &sqlx::PgPool, user_id: i32) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, first_name, last_name, address, city, state, zip)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind("Joe")
    .bind("Joesephus")
    .bind("1 Main St")
    .bind("Springfield")
    .bind("IL")
    .bind("62704")
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = [
        ("Electronics", "Gadgets and devices"),
        ("Fashion", "Clothing and accessories"),
        ("Home & Kitchen", "Everything for the house"),
    ];
    for (name, description) in categories {
        sqlx::query(
            "INSERT INTO categories (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    }

    let products = [
        ("Smartphone", Decimal::new(49999, 2), "Electronics", "Black", 50),
        ("Headphones", Decimal::new(9999, 2), "Electronics", "Silver", 75),
        ("Men's T-Shirt", Decimal::new(2999, 2), "Fashion", "Blue", 120),
        ("Women's Blouse", Decimal::new(4999, 2), "Fashion", "White", 80),
        ("Coffee Maker", Decimal::new(7999, 2), "Home & Kitchen", "Red", 30),
    ];
    for (name, price, category, subcategory, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (name, price, category_id, subcategory, stock)
            SELECT $1, $2, category_id, $4, $5 FROM categories WHERE name = $3
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(price)
        .bind(category)
        .bind(subcategory)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}
