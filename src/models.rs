use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Represents a beverage type in the catalog
///
/// The catalog is maintained outside this service; purchases only read the
/// strength and price, and snapshot both onto the purchase record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Beverage {
    pub id: Uuid,
    #[schema(example = "Kingfisher Premium")]
    pub name: String,
    #[schema(example = "Beer")]
    pub category: String,
    /// Alcohol by volume, 0 to 100
    #[schema(example = "5")]
    pub strength_percent: Decimal,
    #[schema(example = "0.35")]
    pub price_per_ml: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Beverage {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        strength_percent: Decimal,
        price_per_ml: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            strength_percent,
            price_per_ml,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
