use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::{
    app::create_app,
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    middleware::auth::AuthConfig,
    services::shipping::FlatRateShipping,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_checkout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    let state = AppState::new(create_orm_conn(pool), AuthConfig::new(&config.jwt_secret))
        .with_shipping(FlatRateShipping::new(config.shipping_flat_rate));
    tracing::info!(shipping_flat_rate = %config.shipping_flat_rate, "shipping policy configured");

    let app = create_app(state);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
