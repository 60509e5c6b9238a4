use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::CatalogReader,
    error::{AppError, AppResult},
    models::{Offer, OfferRule, Product, Reward, RewardType},
    money::round_money,
    pricing::{fixed_discount, percent_discount},
    preview::BonusEntry,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOffer {
    pub offer_id: i64,
    pub title: String,
    pub reward_type: RewardType,
}

/// Priced line. `final_total` is always `round(line_subtotal - discount_amount)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePricing {
    pub unit_price: Decimal,
    pub line_subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub offer: Option<AppliedOffer>,
    pub bonuses: Vec<BonusEntry>,
}

pub fn price_line(
    product: &Product,
    quantity: i32,
    applied: Option<(&Offer, &OfferRule)>,
) -> AppResult<LinePricing> {
    let unit_price = round_money(product.base_price);
    let line_subtotal = round_money(Decimal::from(quantity) * unit_price);

    let (discount_amount, offer, bonuses) = match applied {
        None => (Decimal::ZERO, None, Vec::new()),
        Some((offer, rule)) => {
            let multiplier = rule.multiplier(quantity);
            let applied = AppliedOffer {
                offer_id: offer.id,
                title: offer.title.clone(),
                reward_type: rule.reward.reward_type(),
            };
            match &rule.reward {
                Reward::DiscountPercent(percent) => (
                    percent_discount(unit_price, rule.min_qty, *percent, multiplier),
                    Some(applied),
                    Vec::new(),
                ),
                Reward::DiscountFixed(amount) => {
                    (fixed_discount(*amount, multiplier), Some(applied), Vec::new())
                }
                Reward::BonusQty { product_id, qty } => {
                    let bonus_qty = qty.checked_mul(multiplier).ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "bonus quantity for product {} is out of range",
                            product.id
                        ))
                    })?;
                    let bonuses = if bonus_qty > 0 {
                        vec![BonusEntry {
                            bonus_product_id: *product_id,
                            bonus_qty,
                            offer_id: offer.id,
                            offer_title: offer.title.clone(),
                        }]
                    } else {
                        Vec::new()
                    };
                    (Decimal::ZERO, Some(applied), bonuses)
                }
            }
        }
    };

    Ok(LinePricing {
        unit_price,
        line_subtotal,
        discount_amount,
        final_total: round_money(line_subtotal - discount_amount),
        offer,
        bonuses,
    })
}

/// Prices a line with the offer chosen for it. The offer must carry a rule
/// for this product; a missing rule means selection and catalog disagree.
pub async fn calculate<C>(
    catalog: &C,
    product: &Product,
    quantity: i32,
    offer: Option<&Offer>,
) -> AppResult<LinePricing>
where
    C: CatalogReader + ?Sized,
{
    let Some(offer) = offer else {
        return price_line(product, quantity, None);
    };
    let rule = catalog
        .offer_rule(offer.id, product.id)
        .await?
        .ok_or_else(|| {
            AppError::Invariant(format!(
                "offer {} was selected for product {} but has no rule for it",
                offer.id, product.id
            ))
        })?;
    price_line(product, quantity, Some((offer, &rule)))
}
