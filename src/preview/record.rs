use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{models::RewardType, pricing::LinePricing};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BonusEntry {
    pub bonus_product_id: i64,
    pub bonus_qty: i32,
    pub offer_id: i64,
    pub offer_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PreviewLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub selected_offer_id: Option<i64>,
    pub offer_title: Option<String>,
    pub reward_type: Option<RewardType>,
    pub bonuses: Vec<BonusEntry>,
}

/// Cache-resident snapshot of a priced order; never written to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PreviewRecord {
    pub preview_token: String,
    pub customer_id: i64,
    pub company_id: i64,
    pub notes: Option<String>,
    pub items: Vec<PreviewLine>,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub final_total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order-level sums. The final total is the sum of the already rounded line
/// totals, not `subtotal - total_discount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub final_total: Decimal,
}

impl OrderTotals {
    pub fn add(&mut self, line: &LinePricing) {
        self.subtotal += line.line_subtotal;
        self.total_discount += line.discount_amount;
        self.final_total += line.final_total;
    }
}

impl<'a> FromIterator<&'a LinePricing> for OrderTotals {
    fn from_iter<I: IntoIterator<Item = &'a LinePricing>>(iter: I) -> Self {
        let mut totals = OrderTotals::default();
        for line in iter {
            totals.add(line);
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Expired,
    BecameInactive,
    NotStarted,
    TargetingChanged,
    NewBetterOffer,
}

/// One detected difference between a preview and the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewChange {
    PriceChanged {
        product_id: i64,
        product_name: String,
        preview_price: Decimal,
        current_price: Decimal,
    },
    BestOfferChanged {
        product_id: i64,
        previous_offer_id: Option<i64>,
        previous_offer_title: Option<String>,
        previous_reward_type: Option<RewardType>,
        current_offer_id: Option<i64>,
        current_offer_title: Option<String>,
        current_reward_type: Option<RewardType>,
        change_reason: ChangeReason,
    },
    ProductUnavailable {
        product_id: i64,
        product_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_serialize_as_tagged_entries() {
        let change = PreviewChange::BestOfferChanged {
            product_id: 4,
            previous_offer_id: Some(1),
            previous_offer_title: Some("Old".into()),
            previous_reward_type: Some(RewardType::DiscountPercent),
            current_offer_id: None,
            current_offer_title: None,
            current_reward_type: None,
            change_reason: ChangeReason::Expired,
        };

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "best_offer_changed");
        assert_eq!(json["change_reason"], "expired");
        assert_eq!(json["previous_reward_type"], "discount_percent");
        assert!(json["current_offer_id"].is_null());
    }
}
