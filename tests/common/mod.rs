#![allow(dead_code)]

use storefront::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::AuthUser,
    state::AppState,
};
use uuid::Uuid;

/// `None` (after saying so) when no database is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    run_migrations(&pool).await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "flow-test-secret".into(),
        upload_dir: std::env::temp_dir().join("storefront-flow-tests"),
        admin_emails: vec![],
        cors_origins: vec![],
        max_connections: 5,
    };
    Ok(Some(AppState::new(pool, config)))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    let email = format!("{}@flow.test", unique(role));
    sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, 'x', $4)")
        .bind(id)
        .bind("Flow Tester")
        .bind(&email)
        .bind(role)
        .execute(&state.pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        email,
        role: role.into(),
    })
}

pub async fn create_product(state: &AppState, price: i64, inventory: i32) -> anyhow::Result<i64> {
    let slug = unique("flow-product");
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO products (name, slug, price, inventory) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(format!("Product {slug}"))
    .bind(&slug)
    .bind(price)
    .bind(inventory)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn inventory_of(state: &AppState, product_id: i64) -> anyhow::Result<i32> {
    let (inventory,): (i32,) = sqlx::query_as("SELECT inventory FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(inventory)
}
