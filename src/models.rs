use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// The authenticated buyer, as resolved by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: i64,
    pub segment_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub base_price: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OfferScope {
    Public,
    Private,
}

impl OfferScope {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => OfferScope::Public,
            _ => OfferScope::Private,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferScope::Public => "public",
            OfferScope::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Inactive,
}

impl OfferStatus {
    /// Anything but `active` counts as inactive.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => OfferStatus::Active,
            _ => OfferStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Offer {
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub scope: OfferScope,
    pub status: OfferStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Offer {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|start| start <= now)
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|end| now > end)
    }

    /// Active status and `now` inside the (open-ended) window. Targeting is
    /// checked separately since it depends on the customer.
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Active && self.has_started(now) && !self.has_expired(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    DiscountPercent,
    DiscountFixed,
    BonusQty,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::DiscountPercent => "discount_percent",
            RewardType::DiscountFixed => "discount_fixed",
            RewardType::BonusQty => "bonus_qty",
        }
    }

    pub fn is_discount(&self) -> bool {
        !matches!(self, RewardType::BonusQty)
    }
}

/// The populated reward group of an offer rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reward {
    DiscountPercent(Decimal),
    DiscountFixed(Decimal),
    BonusQty { product_id: i64, qty: i32 },
}

impl Reward {
    pub fn reward_type(&self) -> RewardType {
        match self {
            Reward::DiscountPercent(_) => RewardType::DiscountPercent,
            Reward::DiscountFixed(_) => RewardType::DiscountFixed,
            Reward::BonusQty { .. } => RewardType::BonusQty,
        }
    }

    /// Builds the reward from the raw column group, rejecting rows whose
    /// populated fields do not match `reward_type`.
    pub fn from_columns(
        reward_type: &str,
        discount_percent: Option<Decimal>,
        discount_fixed: Option<Decimal>,
        bonus_product_id: Option<i64>,
        bonus_qty: Option<i32>,
    ) -> Result<Self, AppError> {
        match (reward_type, discount_percent, discount_fixed, bonus_product_id, bonus_qty) {
            ("discount_percent", Some(percent), _, _, _)
                if percent >= Decimal::ZERO && percent <= Decimal::ONE_HUNDRED =>
            {
                Ok(Reward::DiscountPercent(percent))
            }
            ("discount_fixed", _, Some(amount), _, _) if amount >= Decimal::ZERO => {
                Ok(Reward::DiscountFixed(amount))
            }
            ("bonus_qty", _, _, Some(product_id), Some(qty)) if qty >= 0 => {
                Ok(Reward::BonusQty { product_id, qty })
            }
            (other, ..) => Err(AppError::Invariant(format!(
                "offer rule reward columns do not match reward type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferRule {
    pub offer_id: i64,
    pub product_id: i64,
    pub min_qty: i32,
    pub reward: Reward,
}

impl OfferRule {
    /// Number of whole reward blocks `quantity` qualifies for.
    pub fn multiplier(&self, quantity: i32) -> i32 {
        if self.min_qty <= 0 || quantity <= 0 {
            return 0;
        }
        quantity / self.min_qty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Customer,
    Segment,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Customer => "customer",
            TargetType::Segment => "segment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferTarget {
    pub offer_id: i64,
    pub target_type: TargetType,
    pub target_id: i64,
}

impl OfferTarget {
    pub fn matches(&self, customer: &Customer) -> bool {
        match self.target_type {
            TargetType::Customer => self.target_id == customer.id,
            TargetType::Segment => customer.segment_id == Some(self.target_id),
        }
    }
}

pub const STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemBonus {
    pub id: i64,
    pub bonus_product_id: i64,
    pub bonus_qty: i32,
    pub offer_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub qty: i32,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub selected_offer_id: Option<i64>,
    pub bonuses: Vec<OrderItemBonus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub company_id: i64,
    pub customer_id: i64,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub final_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusLog {
    pub id: i64,
    pub order_id: i64,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: i64,
    pub created_at: DateTime<Utc>,
}
