use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use duka_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id =
        ensure_user(&pool, "admin@duka.co.ke", "254700000001", "admin123", "admin").await?;
    let user_id =
        ensure_user(&pool, "customer@duka.co.ke", "254700000002", "user123", "user").await?;
    seed_catalog(&pool).await?;
    seed_delivery(&pool).await?;
    seed_coupon(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    phone: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, phone_number, password_hash, role, is_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(phone)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let category_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO categories (id, name, slug)
        VALUES ($1, 'Phones & Tablets', 'phones-tablets')
        ON CONFLICT (slug) DO NOTHING
        "#,
    )
    .bind(category_id)
    .execute(pool)
    .await?;

    let brand_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO brands (id, name, slug)
        VALUES ($1, 'Tecno', 'tecno')
        ON CONFLICT (slug) DO NOTHING
        "#,
    )
    .bind(brand_id)
    .execute(pool)
    .await?;

    // Prices in KES cents.
    let products: Vec<(&str, &str, &str, i64, Option<i64>, i32)> = vec![
        (
            "Tecno Spark 20",
            "tecno-spark-20",
            "TEC-SPK20",
            1_499_900,
            Some(1_799_900),
            40,
        ),
        (
            "Tecno Camon 30",
            "tecno-camon-30",
            "TEC-CAM30",
            2_899_900,
            None,
            25,
        ),
        (
            "32GB MicroSD Card",
            "32gb-microsd-card",
            "ACC-SD32",
            89_900,
            None,
            200,
        ),
    ];

    for (name, slug, sku, price, compare, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, category_id, brand_id, name, slug, sku, description, price, compare_price, stock)
            SELECT $1, c.id, b.id, $2, $3, $4, $5, $6, $7, $8
            FROM categories c, brands b
            WHERE c.slug = 'phones-tablets' AND b.slug = 'tecno'
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(sku)
        .bind(format!("{name}, official warranty"))
        .bind(price)
        .bind(compare)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}

async fn seed_delivery(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let zones: Vec<(&str, &str, i64, i32)> = vec![
        ("Nairobi", "Nairobi", 20_000, 1),
        ("Mombasa", "Mombasa", 35_000, 3),
        ("Kisumu", "Kisumu", 30_000, 3),
    ];

    for (region, city, fee, days) in zones {
        sqlx::query(
            r#"
            INSERT INTO delivery_zones (id, region, city, delivery_fee, estimated_days)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (region, city) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(region)
        .bind(city)
        .bind(fee)
        .bind(days)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO pickup_stations
            (id, name, code, region, city, address, phone_number, operating_hours, delivery_fee, capacity)
        VALUES ($1, 'Duka Pickup CBD', 'NRB-001', 'Nairobi', 'Nairobi',
                'Moi Avenue, Bazaar Plaza', '254700000100', 'Mon-Sat 8am-6pm', 10000, 150)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    println!("Seeded delivery zones and pickup station");
    Ok(())
}

async fn seed_coupon(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO coupons
            (id, code, discount_type, discount_value, minimum_purchase, maximum_discount,
             usage_limit, user_limit, valid_from, valid_to)
        VALUES ($1, 'KARIBU10', 'percentage', 10, 100000, 50000, 500, 1, $2, $3)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(now)
    .bind(now + Duration::days(90))
    .execute(pool)
    .await?;

    println!("Seeded coupon KARIBU10");
    Ok(())
}
