//! Demo catalog seeding.
//!
//! Creates a handful of products across all categories with small sample
//! pools, enough to click through every flow locally.

use rust_decimal::Decimal;

use keyhaven_core::{ProductCategory, parse_account_lines, parse_code_lines};
use keyhaven_storefront::db::{ProductRepository, products::ProductInput};

use super::CliError;

struct SeedProduct {
    input: ProductInput,
    codes: Option<&'static str>,
    accounts: Option<&'static str>,
}

fn price(s: &str) -> Decimal {
    s.parse().unwrap_or(Decimal::ZERO)
}

fn catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            input: ProductInput {
                name: "Steam Gift Card $25".to_string(),
                description: "Redeemable for $25 of Steam wallet funds.".to_string(),
                price: price("23.99"),
                image_url: "/images/steam-25.png".to_string(),
                category: ProductCategory::Giftcard,
                stock: 5,
            },
            codes: Some("STEAM-AAAA-1111\nSTEAM-BBBB-2222\nSTEAM-CCCC-3333\nSTEAM-DDDD-4444\nSTEAM-EEEE-5555"),
            accounts: None,
        },
        SeedProduct {
            input: ProductInput {
                name: "Streaming Account (1 month)".to_string(),
                description: "Pre-provisioned account, one month of access.".to_string(),
                price: price("7.49"),
                image_url: "/images/stream-1m.png".to_string(),
                category: ProductCategory::Account,
                stock: 3,
            },
            codes: None,
            accounts: Some("demo1@mail.test:s3cret-one\ndemo2@mail.test:s3cret-two\ndemo3@mail.test:s3cret-three"),
        },
        SeedProduct {
            input: ProductInput {
                name: "Game Coins x1000".to_string(),
                description: "Delivered to your in-game account within 24h.".to_string(),
                price: price("4.99"),
                image_url: "/images/coins-1000.png".to_string(),
                category: ProductCategory::Currency,
                stock: 100,
            },
            codes: None,
            accounts: None,
        },
        SeedProduct {
            input: ProductInput {
                name: "Mystery Bundle".to_string(),
                description: "A grab bag of digital goodies.".to_string(),
                price: price("1.99"),
                image_url: "/images/mystery.png".to_string(),
                category: ProductCategory::Other,
                stock: 25,
            },
            codes: None,
            accounts: None,
        },
    ]
}

/// Seed the demo catalog.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;
    let repo = ProductRepository::new(&pool);

    for seed in catalog() {
        let id = repo.create(&seed.input).await?;

        if let Some(raw) = seed.codes {
            repo.replace_gift_codes(id, &parse_code_lines(raw)).await?;
        }
        if let Some(raw) = seed.accounts {
            let entries = parse_account_lines(raw)?;
            repo.replace_account_credentials(id, &entries).await?;
        }

        tracing::info!(product_id = %id, name = %seed.input.name, "Seeded product");
    }

    tracing::info!("Demo catalog seeded");
    Ok(())
}
