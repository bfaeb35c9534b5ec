use storefront::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    models::StoreSettings,
    services::auth_service::hash_password,
    uploads::encode_images,
};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    category: &'static str,
    price: i64,
    sale_price: Option<i64>,
    inventory: i32,
    featured: bool,
}

const CATEGORIES: [(&str, &str, &str); 3] = [
    ("Apparel", "apparel", "Shirts, hoodies and everyday wear"),
    ("Accessories", "accessories", "Bags, caps and small goods"),
    ("Home", "home", "Mugs, prints and things for the desk"),
];

const PRODUCTS: [SeedProduct; 6] = [
    SeedProduct { name: "Classic Tee", slug: "classic-tee", category: "apparel", price: 2500, sale_price: None, inventory: 40, featured: true },
    SeedProduct { name: "Zip Hoodie", slug: "zip-hoodie", category: "apparel", price: 5900, sale_price: Some(4900), inventory: 15, featured: true },
    SeedProduct { name: "Canvas Tote", slug: "canvas-tote", category: "accessories", price: 1800, sale_price: None, inventory: 25, featured: false },
    SeedProduct { name: "Dad Cap", slug: "dad-cap", category: "accessories", price: 2200, sale_price: None, inventory: 3, featured: false },
    SeedProduct { name: "Enamel Mug", slug: "enamel-mug", category: "home", price: 1600, sale_price: Some(1200), inventory: 60, featured: true },
    SeedProduct { name: "Risograph Print", slug: "risograph-print", category: "home", price: 3500, sale_price: None, inventory: 0, featured: false },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "Store Admin", "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_user(&pool, "Sample Shopper", "user@example.com", "user12345", "user").await?;
    seed_categories(&pool).await?;
    seed_products(&pool).await?;
    seed_settings(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_categories(pool: &DbPool) -> anyhow::Result<()> {
    for (name, slug, description) in CATEGORIES {
        sqlx::query(
            r#"
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .execute(pool)
        .await?;
    }
    println!("Seeded {} categories", CATEGORIES.len());
    Ok(())
}

async fn seed_products(pool: &DbPool) -> anyhow::Result<()> {
    for product in &PRODUCTS {
        let images = encode_images(&[format!("/uploads/products/{}.jpg", product.slug)]);
        sqlx::query(
            r#"
            INSERT INTO products (name, slug, description, price, sale_price, inventory,
                                  category_id, images, is_featured, is_published)
            VALUES ($1, $2, $3, $4, $5, $6,
                    (SELECT id FROM categories WHERE slug = $7), $8, $9, TRUE)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(product.name)
        .bind(product.slug)
        .bind(format!("Sample {}", product.name.to_lowercase()))
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.inventory)
        .bind(product.category)
        .bind(images)
        .bind(product.featured)
        .execute(pool)
        .await?;
    }
    println!("Seeded {} products", PRODUCTS.len());
    Ok(())
}

async fn seed_settings(pool: &DbPool) -> anyhow::Result<()> {
    let data = serde_json::to_value(StoreSettings::default())?;
    sqlx::query("INSERT INTO settings (id, data) VALUES (1, $1) ON CONFLICT (id) DO NOTHING")
        .bind(data)
        .execute(pool)
        .await?;
    println!("Seeded default settings");
    Ok(())
}
