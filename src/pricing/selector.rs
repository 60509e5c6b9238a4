use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    catalog::{CatalogReader, OfferCandidate},
    error::AppResult,
    models::{Customer, Offer, OfferRule, Product, Reward},
    money::round_money,
    pricing::{fixed_discount, percent_discount},
};

/// A qualifying candidate with its ranking value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredOffer {
    pub offer: Offer,
    pub rule: OfferRule,
    pub multiplier: i32,
    pub effective_value: Decimal,
}

impl ScoredOffer {
    fn is_discount(&self) -> bool {
        self.rule.reward.reward_type().is_discount()
    }
}

/// Comparable monetary value of a rule. Bonus goods are valued at the bonus
/// product's unit price; that value ranks offers and is never charged.
pub fn effective_value(
    rule: &OfferRule,
    multiplier: i32,
    unit_price: Decimal,
    bonus_unit_price: Decimal,
) -> Decimal {
    match &rule.reward {
        Reward::DiscountPercent(percent) => {
            percent_discount(unit_price, rule.min_qty, *percent, multiplier)
        }
        Reward::DiscountFixed(amount) => fixed_discount(*amount, multiplier),
        Reward::BonusQty { qty, .. } => {
            round_money(Decimal::from(*qty) * bonus_unit_price * Decimal::from(multiplier))
        }
    }
}

/// Higher value wins; on equal value discounts beat bonuses, then the lower
/// offer id wins.
pub fn compare_offers(a: &ScoredOffer, b: &ScoredOffer) -> Ordering {
    a.effective_value
        .cmp(&b.effective_value)
        .then_with(|| a.is_discount().cmp(&b.is_discount()))
        .then_with(|| b.offer.id.cmp(&a.offer.id))
}

pub fn pick_best<I>(scored: I) -> Option<ScoredOffer>
where
    I: IntoIterator<Item = ScoredOffer>,
{
    scored
        .into_iter()
        .filter(|s| s.multiplier > 0 && s.effective_value > Decimal::ZERO)
        .max_by(compare_offers)
}

/// Picks the single best offer for a product line, or `None` when nothing
/// qualifies at this quantity.
#[tracing::instrument(
    name = "pricing.select_best",
    skip(catalog, product, customer),
    fields(product_id = product.id, customer_id = customer.id)
)]
pub async fn select_best<C>(
    catalog: &C,
    product: &Product,
    quantity: i32,
    customer: &Customer,
    now: DateTime<Utc>,
) -> AppResult<Option<Offer>>
where
    C: CatalogReader + ?Sized,
{
    let scored = score_candidates(catalog, product, quantity, customer, now).await?;
    let best = pick_best(scored);
    if let Some(best) = &best {
        tracing::debug!(
            offer_id = best.offer.id,
            effective_value = %best.effective_value,
            "selected offer"
        );
    }
    Ok(best.map(|s| s.offer))
}

/// Scores every eligible candidate that clears its quantity threshold.
pub async fn score_candidates<C>(
    catalog: &C,
    product: &Product,
    quantity: i32,
    customer: &Customer,
    now: DateTime<Utc>,
) -> AppResult<Vec<ScoredOffer>>
where
    C: CatalogReader + ?Sized,
{
    let unit_price = round_money(product.base_price);
    let candidates = catalog.eligible_offers(product.id, customer, now).await?;

    let mut scored = Vec::with_capacity(candidates.len());
    for OfferCandidate { offer, rule } in candidates {
        let multiplier = rule.multiplier(quantity);
        if multiplier == 0 {
            continue;
        }
        let bonus_unit_price = match &rule.reward {
            Reward::BonusQty { product_id, .. } if *product_id == product.id => unit_price,
            Reward::BonusQty { product_id, .. } => catalog
                .product(*product_id)
                .await?
                .map(|bonus| round_money(bonus.base_price))
                .unwrap_or(Decimal::ZERO),
            _ => Decimal::ZERO,
        };
        let effective_value = effective_value(&rule, multiplier, unit_price, bonus_unit_price);
        scored.push(ScoredOffer {
            offer,
            rule,
            multiplier,
            effective_value,
        });
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::test_support::{
        TestCatalog, bonus_rule, customer, fixed_rule, money, now, percent_rule, product,
        public_offer,
    };

    #[tokio::test]
    async fn picks_highest_effective_value() {
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(1), percent_rule(1, 1, 100, "10"))
            .with_offer(public_offer(2), fixed_rule(2, 1, 100, "150.00"));

        let best = select_best(&catalog, &catalog.get_product(1), 200, &customer(), now())
            .await
            .unwrap();

        // percent: 200.00, fixed: 300.00
        assert_eq!(best.map(|o| o.id), Some(2));
    }

    #[tokio::test]
    async fn below_threshold_never_selected() {
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(1), percent_rule(1, 1, 100, "50"));

        let best = select_best(&catalog, &catalog.get_product(1), 99, &customer(), now())
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn discount_beats_bonus_on_tie() {
        // bonus: 10 units * 10.00 * 1 block = 100.00; fixed: 100.00
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(1), bonus_rule(1, 1, 100, 1, 10))
            .with_offer(public_offer(2), fixed_rule(2, 1, 100, "100.00"));

        let best = select_best(&catalog, &catalog.get_product(1), 100, &customer(), now())
            .await
            .unwrap();
        assert_eq!(best.map(|o| o.id), Some(2));
    }

    #[tokio::test]
    async fn lowest_id_wins_between_tied_discounts() {
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(9), fixed_rule(9, 1, 10, "10.00"))
            .with_offer(public_offer(4), percent_rule(4, 1, 10, "10"));

        let best = select_best(&catalog, &catalog.get_product(1), 10, &customer(), now())
            .await
            .unwrap();
        assert_eq!(best.map(|o| o.id), Some(4));
    }

    #[tokio::test]
    async fn bonus_valued_at_bonus_product_price() {
        // bonus of a 30.00 product: 2 * 30.00 = 60.00 beats 5% of 1000.00 = 50.00
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_product(product(2, "30.00"))
            .with_offer(public_offer(1), percent_rule(1, 1, 100, "5"))
            .with_offer(public_offer(2), bonus_rule(2, 1, 100, 2, 2));

        let best = select_best(&catalog, &catalog.get_product(1), 100, &customer(), now())
            .await
            .unwrap();
        assert_eq!(best.map(|o| o.id), Some(2));
    }

    #[tokio::test]
    async fn zero_value_offer_loses_to_no_offer() {
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(1), fixed_rule(1, 1, 1, "0.00"));

        let best = select_best(&catalog, &catalog.get_product(1), 5, &customer(), now())
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn private_offer_requires_target() {
        let mut private = public_offer(1);
        private.scope = crate::models::OfferScope::Private;
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(private, fixed_rule(1, 1, 1, "1.00"));

        let product = catalog.get_product(1);
        let untargeted = select_best(&catalog, &product, 5, &customer(), now())
            .await
            .unwrap();
        assert!(untargeted.is_none());

        let catalog = catalog.with_customer_target(1, customer().id);
        let targeted = select_best(&catalog, &product, 5, &customer(), now())
            .await
            .unwrap();
        assert_eq!(targeted.map(|o| o.id), Some(1));
    }

    #[test]
    fn ranking_is_strict_on_value() {
        let low = ScoredOffer {
            offer: public_offer(1),
            rule: fixed_rule(1, 1, 1, "1.00"),
            multiplier: 1,
            effective_value: money("1.00"),
        };
        let high = ScoredOffer {
            offer: public_offer(2),
            rule: bonus_rule(2, 1, 1, 1, 1),
            multiplier: 1,
            effective_value: money("1.01"),
        };
        let best = pick_best(vec![low, high]).unwrap();
        assert_eq!(best.offer.id, 2);
    }
}
