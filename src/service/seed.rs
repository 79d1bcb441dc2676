//! Initial catalog of commemorative coins.

use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::value_objects::{Money, ProductId};
use crate::store::{StoreError, StorefrontStore};

const IMAGE_BASE: &str = "https://images.squarespace-cdn.com/content/v1/67d6ef5142cdf803b50d47be";

struct Coin {
    id: &'static str,
    name: &'static str,
    status: ProductStatus,
    in_stock: bool,
    category: &'static str,
    featured: bool,
    image: &'static str,
    description: &'static str,
}

const COINS: [Coin; 6] = [
    Coin {
        id: "1", name: "Emp. Jean Jacques Dessalines", status: ProductStatus::Limited, in_stock: true,
        category: "revolutionary-leaders", featured: true, image: "jj-dessalines.png",
        description: "Leader of the Haitian Revolution and first ruler of an independent Haiti.",
    },
    Coin {
        id: "2", name: "Catherine Flon", status: ProductStatus::ComingSoon, in_stock: false,
        category: "revolutionary-heroes", featured: true, image: "catherine-flon.png",
        description: "The seamstress who sewed the first Haitian flag at the Congress of Arcahaie in 1803.",
    },
    Coin {
        id: "3", name: "Sanité Bélair", status: ProductStatus::InStock, in_stock: true,
        category: "revolutionary-heroes", featured: true, image: "sanite-belair.png",
        description: "Lieutenant in Haiti's War of Independence and one of the few women to lead troops into battle.",
    },
    Coin {
        id: "4", name: "Alexandre Pétion", status: ProductStatus::ComingSoon, in_stock: false,
        category: "revolutionary-leaders", featured: true, image: "alexandre-petion.png",
        description: "Founding father of Haiti and first president of the Republic of Haiti.",
    },
    Coin {
        id: "5", name: "La Citadelle Laferrière", status: ProductStatus::PreOrder, in_stock: false,
        category: "landmarks", featured: false, image: "citadelle-laferriere.png",
        description: "The mountaintop fortress built after independence, the largest in the Americas.",
    },
    Coin {
        id: "6", name: "Roi Henri Christophe 1re", status: ProductStatus::PreOrder, in_stock: false,
        category: "revolutionary-leaders", featured: false, image: "henri-christophe.png",
        description: "Revolutionary general and the only monarch of the Kingdom of Haiti.",
    },
];

pub fn commemorative_coins() -> Vec<Product> {
    COINS
        .iter()
        .filter_map(|coin| {
            let id = ProductId::new(coin.id).ok()?;
            Some(
                Product::create(id, coin.name, Money::from_cents(2500))
                    .with_subtitle("Commemorative Coin")
                    .with_image(format!("{IMAGE_BASE}/{}", coin.image))
                    .with_description(coin.description)
                    .with_category(coin.category)
                    .featured(coin.featured)
                    .with_availability(coin.status, coin.in_stock),
            )
        })
        .collect()
}

/// Inserts the coin catalog when the store has no products. Returns how many were inserted.
pub async fn seed_catalog(store: &dyn StorefrontStore) -> Result<usize, StoreError> {
    if !store.list_products().await?.is_empty() {
        return Ok(0);
    }
    let coins = commemorative_coins();
    for coin in &coins {
        store.upsert_product(coin).await?;
    }
    tracing::info!(count = coins.len(), "seeded product catalog");
    Ok(coins.len())
}
