use chrono::{Duration, Utc};
use model_shop_api::{config::AppConfig, db::create_pool, services::auth_service};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_account(&pool, "admin@example.com", "admin123", "Shop Admin", "admin").await?;
    let user_id = ensure_account(&pool, "user@example.com", "user123", "Demo Builder", "user").await?;
    seed_catalog(&pool).await?;
    seed_promotions(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_account(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    full_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = auth_service::hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(full_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured account {email} (role={role})");
    Ok(user_id)
}

async fn ensure_named(pool: &sqlx::PgPool, table: &str, name: &str, description: &str) -> anyhow::Result<Uuid> {
    // table is one of two fixed identifiers, never user input
    let sql = format!(
        r#"
        INSERT INTO {table} (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
        RETURNING id
        "#
    );
    let (id,): (Uuid,) = sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let mecha = ensure_named(pool, "categories", "Mecha Kits", "Poseable plastic mecha model kits").await?;
    let tools = ensure_named(pool, "categories", "Tools & Supplies", "Nippers, panel liners, top coats").await?;
    let hexaframe = ensure_named(pool, "brands", "Hexaframe", "Original mecha frame designs").await?;
    let miniforge = ensure_named(pool, "brands", "Miniforge", "Small-batch hobby tooling").await?;

    let products: Vec<(&str, &str, Uuid, Uuid, i64, i32, i32, Vec<String>)> = vec![
        (
            "HF-01 Vanguard 1/100",
            "Flagship 1/100 scale kit with a full inner frame",
            mecha,
            hexaframe,
            8_500,
            0,
            40,
            vec!["new".into(), "hot".into()],
        ),
        (
            "HF-02 Skirmisher 1/144",
            "Entry-level 1/144 scale kit, snap-fit, no glue needed",
            mecha,
            hexaframe,
            2_400,
            0,
            120,
            vec!["new".into()],
        ),
        (
            "Precision Nipper Mk.3",
            "Single-blade nipper for clean gate cuts",
            tools,
            miniforge,
            3_200,
            15,
            75,
            vec!["sale".into()],
        ),
        (
            "Matte Top Coat 170ml",
            "Dead-flat finishing spray",
            tools,
            miniforge,
            900,
            0,
            200,
            vec![],
        ),
    ];

    for (name, desc, category_id, brand_id, price_cents, discount, stock, status) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, category_id, brand_id, price_cents, discount_percent, stock_quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(category_id)
        .bind(brand_id)
        .bind(price_cents)
        .bind(discount)
        .bind(stock)
        .bind(status)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}

async fn seed_promotions(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO promotions (id, code, description, discount_percent, start_date, end_date, max_usage)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("WELCOME10")
    .bind("10% off your first order")
    .bind(10)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(90))
    .bind(500)
    .execute(pool)
    .await?;

    println!("Seeded promotions");
    Ok(())
}
