use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::{
    catalog::{CatalogReader, OfferCandidate},
    error::AppResult,
    models::{
        Customer, Offer, OfferRule, OfferScope, OfferStatus, OfferTarget, Product, Reward,
        TargetType,
    },
    dto::orders::PreviewItemRequest,
    preview::PreviewRecord,
    services::preview_service::build_preview,
};

pub(crate) const COMPANY_ID: i64 = 1;

pub(crate) fn money(value: &str) -> Decimal {
    value.parse().unwrap()
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 20, 10, 0, 0).unwrap()
}

pub(crate) fn customer() -> Customer {
    Customer {
        id: 501,
        segment_id: Some(9),
    }
}

pub(crate) fn product(id: i64, price: &str) -> Product {
    Product {
        id,
        company_id: COMPANY_ID,
        name: format!("Product {id}"),
        base_price: money(price),
        is_active: true,
    }
}

pub(crate) fn public_offer(id: i64) -> Offer {
    Offer {
        id,
        company_id: COMPANY_ID,
        title: format!("Offer {id}"),
        scope: OfferScope::Public,
        status: OfferStatus::Active,
        starts_at: None,
        ends_at: None,
    }
}

pub(crate) fn percent_rule(offer_id: i64, product_id: i64, min_qty: i32, percent: &str) -> OfferRule {
    OfferRule {
        offer_id,
        product_id,
        min_qty,
        reward: Reward::DiscountPercent(money(percent)),
    }
}

pub(crate) fn fixed_rule(offer_id: i64, product_id: i64, min_qty: i32, amount: &str) -> OfferRule {
    OfferRule {
        offer_id,
        product_id,
        min_qty,
        reward: Reward::DiscountFixed(money(amount)),
    }
}

pub(crate) fn bonus_rule(
    offer_id: i64,
    product_id: i64,
    min_qty: i32,
    bonus_product_id: i64,
    qty: i32,
) -> OfferRule {
    OfferRule {
        offer_id,
        product_id,
        min_qty,
        reward: Reward::BonusQty {
            product_id: bonus_product_id,
            qty,
        },
    }
}

/// In-memory catalog applying the same eligibility rules as the database one.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestCatalog {
    products: BTreeMap<i64, Product>,
    offers: BTreeMap<i64, Offer>,
    rules: Vec<OfferRule>,
    targets: Vec<OfferTarget>,
}

impl TestCatalog {
    pub(crate) fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id, product);
        self
    }

    pub(crate) fn with_offer(mut self, offer: Offer, rule: OfferRule) -> Self {
        self.offers.insert(offer.id, offer);
        self.rules.push(rule);
        self
    }

    pub(crate) fn with_customer_target(mut self, offer_id: i64, customer_id: i64) -> Self {
        self.targets.push(OfferTarget {
            offer_id,
            target_type: TargetType::Customer,
            target_id: customer_id,
        });
        self
    }

    pub(crate) fn without_targets(mut self, offer_id: i64) -> Self {
        self.targets.retain(|t| t.offer_id != offer_id);
        self
    }

    pub(crate) fn with_price(self, product_id: i64, price: &str) -> Self {
        self.edit_product(product_id, |p| p.base_price = money(price))
    }

    pub(crate) fn edit_product(mut self, id: i64, edit: impl FnOnce(&mut Product)) -> Self {
        if let Some(product) = self.products.get_mut(&id) {
            edit(product);
        }
        self
    }

    pub(crate) fn edit_offer(mut self, id: i64, edit: impl FnOnce(&mut Offer)) -> Self {
        if let Some(offer) = self.offers.get_mut(&id) {
            edit(offer);
        }
        self
    }

    pub(crate) fn get_product(&self, id: i64) -> Product {
        self.products[&id].clone()
    }

    fn targeted(&self, offer_id: i64, customer: &Customer) -> bool {
        self.targets
            .iter()
            .any(|t| t.offer_id == offer_id && t.matches(customer))
    }
}

#[async_trait]
impl CatalogReader for TestCatalog {
    async fn product(&self, id: i64) -> AppResult<Option<Product>> {
        Ok(self.products.get(&id).cloned())
    }

    async fn offer(&self, id: i64) -> AppResult<Option<Offer>> {
        Ok(self.offers.get(&id).cloned())
    }

    async fn offer_rule(&self, offer_id: i64, product_id: i64) -> AppResult<Option<OfferRule>> {
        Ok(self
            .rules
            .iter()
            .find(|r| r.offer_id == offer_id && r.product_id == product_id)
            .cloned())
    }

    async fn is_targeted(&self, offer_id: i64, customer: &Customer) -> AppResult<bool> {
        Ok(self.targeted(offer_id, customer))
    }

    async fn eligible_offers(
        &self,
        product_id: i64,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<OfferCandidate>> {
        Ok(self
            .rules
            .iter()
            .filter(|rule| rule.product_id == product_id)
            .filter_map(|rule| {
                let offer = self.offers.get(&rule.offer_id)?;
                let visible = offer.scope == OfferScope::Public || self.targeted(offer.id, customer);
                (offer.is_running_at(now) && visible).then(|| OfferCandidate {
                    offer: offer.clone(),
                    rule: rule.clone(),
                })
            })
            .collect())
    }
}

/// Builds a preview for `customer()` at `now()` from `(product_id, qty)` lines.
pub(crate) async fn preview_for(catalog: &TestCatalog, lines: &[(i64, i32)]) -> PreviewRecord {
    let lines: Vec<PreviewItemRequest> = lines
        .iter()
        .map(|&(product_id, quantity)| PreviewItemRequest {
            product_id,
            quantity,
        })
        .collect();
    build_preview(
        catalog,
        &customer(),
        COMPANY_ID,
        None,
        &lines,
        "PV-20260420-TEST".to_string(),
        now(),
    )
    .await
    .unwrap()
}
