use order_preview_api::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
};
use rust_decimal::Decimal;

const DEMO_COMPANY_ID: i64 = 1;
const DEMO_CUSTOMER_ID: i64 = 501;

enum DemoReward {
    Percent(&'static str),
    Fixed(&'static str),
    Bonus { product_id: i64, qty: i32 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let widget = ensure_product(&pool, "Widget", "10.00").await?;
    let gadget = ensure_product(&pool, "Gadget", "4.50").await?;
    let sample = ensure_product(&pool, "Sample Pack", "2.00").await?;

    let bulk = ensure_offer(&pool, "Bulk widgets 10% off", "public").await?;
    ensure_rule(&pool, bulk, widget, 100, DemoReward::Percent("10")).await?;

    let bonus = ensure_offer(&pool, "Gadgets: 10 samples per 100", "public").await?;
    ensure_rule(
        &pool,
        bonus,
        gadget,
        100,
        DemoReward::Bonus {
            product_id: sample,
            qty: 10,
        },
    )
    .await?;

    let loyal = ensure_offer(&pool, "Loyal customer widget deal", "private").await?;
    ensure_rule(&pool, loyal, widget, 50, DemoReward::Fixed("40.00")).await?;
    sqlx::query(
        r#"
        INSERT INTO offer_targets (offer_id, target_type, target_id)
        VALUES ($1, 'customer', $2)
        ON CONFLICT (offer_id, target_type, target_id) DO NOTHING
        "#,
    )
    .bind(loyal)
    .bind(DEMO_CUSTOMER_ID)
    .execute(&pool)
    .await?;

    println!(
        "Seed completed. Products: {widget}, {gadget}, {sample}. Offers: {bulk}, {bonus}, {loyal} (targets customer {DEMO_CUSTOMER_ID})"
    );
    Ok(())
}

async fn ensure_product(pool: &DbPool, name: &str, price: &str) -> anyhow::Result<i64> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM products WHERE company_id = $1 AND name = $2")
            .bind(DEMO_COMPANY_ID)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let price: Decimal = price.parse()?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO products (company_id, name, base_price)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(DEMO_COMPANY_ID)
    .bind(name)
    .bind(price)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_offer(pool: &DbPool, title: &str, scope: &str) -> anyhow::Result<i64> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM offers WHERE company_id = $1 AND title = $2")
            .bind(DEMO_COMPANY_ID)
            .bind(title)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO offers (company_id, title, scope, status)
        VALUES ($1, $2, $3, 'active')
        RETURNING id
        "#,
    )
    .bind(DEMO_COMPANY_ID)
    .bind(title)
    .bind(scope)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_rule(
    pool: &DbPool,
    offer_id: i64,
    product_id: i64,
    min_qty: i32,
    reward: DemoReward,
) -> anyhow::Result<()> {
    let (reward_type, percent, fixed, bonus_product_id, bonus_qty) = match reward {
        DemoReward::Percent(p) => ("discount_percent", Some(p.parse::<Decimal>()?), None, None, None),
        DemoReward::Fixed(f) => ("discount_fixed", None, Some(f.parse::<Decimal>()?), None, None),
        DemoReward::Bonus { product_id, qty } => ("bonus_qty", None, None, Some(product_id), Some(qty)),
    };

    sqlx::query(
        r#"
        INSERT INTO offer_rules
            (offer_id, product_id, min_qty, reward_type, discount_percent, discount_fixed, bonus_product_id, bonus_qty)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (offer_id, product_id) DO NOTHING
        "#,
    )
    .bind(offer_id)
    .bind(product_id)
    .bind(min_qty)
    .bind(reward_type)
    .bind(percent)
    .bind(fixed)
    .bind(bonus_product_id)
    .bind(bonus_qty)
    .execute(pool)
    .await?;
    Ok(())
}
