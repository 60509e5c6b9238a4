//! Read access to products and offers.
//!
//! The pricing core only sees [`CatalogReader`]; [`SeaCatalog`] serves it
//! from PostgreSQL through either a pooled connection or an open transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};

use crate::{
    entity::{
        offer_rules::{Column as RuleCol, Entity as OfferRules, Model as RuleModel},
        offer_targets::{Column as TargetCol, Entity as OfferTargets},
        offers::{Column as OfferCol, Entity as Offers, Model as OfferModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{Customer, Offer, OfferRule, OfferScope, OfferStatus, Product, Reward, TargetType},
};

/// An offer together with its rule for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferCandidate {
    pub offer: Offer,
    pub rule: OfferRule,
}

#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn product(&self, id: i64) -> AppResult<Option<Product>>;

    async fn offer(&self, id: i64) -> AppResult<Option<Offer>>;

    async fn offer_rule(&self, offer_id: i64, product_id: i64) -> AppResult<Option<OfferRule>>;

    /// Whether a target row ties `offer_id` to the customer or their segment.
    async fn is_targeted(&self, offer_id: i64, customer: &Customer) -> AppResult<bool>;

    /// Offers with a rule for `product_id` that are active, inside their
    /// window at `now`, and public or targeted at `customer`.
    async fn eligible_offers(
        &self,
        product_id: i64,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<OfferCandidate>>;
}

pub struct SeaCatalog<'a, C> {
    conn: &'a C,
    share_lock: bool,
}

impl<'a, C> SeaCatalog<'a, C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: &'a C) -> Self {
        Self {
            conn,
            share_lock: false,
        }
    }

    /// Reads products and offers `FOR SHARE`; only meaningful inside a
    /// transaction, where concurrent updates then wait for it to finish.
    pub fn with_share_locks(mut self) -> Self {
        self.share_lock = true;
        self
    }
}

#[async_trait]
impl<C> CatalogReader for SeaCatalog<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn product(&self, id: i64) -> AppResult<Option<Product>> {
        let mut query = Products::find_by_id(id);
        if self.share_lock {
            query = query.lock_shared();
        }
        Ok(query.one(self.conn).await?.map(product_from_entity))
    }

    async fn offer(&self, id: i64) -> AppResult<Option<Offer>> {
        let mut query = Offers::find_by_id(id);
        if self.share_lock {
            query = query.lock_shared();
        }
        Ok(query.one(self.conn).await?.map(offer_from_entity))
    }

    async fn offer_rule(&self, offer_id: i64, product_id: i64) -> AppResult<Option<OfferRule>> {
        let rule = OfferRules::find()
            .filter(
                Condition::all()
                    .add(RuleCol::OfferId.eq(offer_id))
                    .add(RuleCol::ProductId.eq(product_id)),
            )
            .one(self.conn)
            .await?;
        rule.map(rule_from_entity).transpose()
    }

    async fn is_targeted(&self, offer_id: i64, customer: &Customer) -> AppResult<bool> {
        let mut audience = Condition::any().add(
            Condition::all()
                .add(TargetCol::TargetType.eq(TargetType::Customer.as_str()))
                .add(TargetCol::TargetId.eq(customer.id)),
        );
        if let Some(segment_id) = customer.segment_id {
            audience = audience.add(
                Condition::all()
                    .add(TargetCol::TargetType.eq(TargetType::Segment.as_str()))
                    .add(TargetCol::TargetId.eq(segment_id)),
            );
        }

        let matches = OfferTargets::find()
            .filter(TargetCol::OfferId.eq(offer_id))
            .filter(audience)
            .count(self.conn)
            .await?;
        Ok(matches > 0)
    }

    async fn eligible_offers(
        &self,
        product_id: i64,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<OfferCandidate>> {
        // Inner join: row locks cannot target the nullable side of an outer join.
        let mut query = OfferRules::find()
            .inner_join(Offers)
            .select_also(Offers)
            .filter(RuleCol::ProductId.eq(product_id))
            .filter(OfferCol::Status.eq("active"));
        if self.share_lock {
            query = query.lock_shared();
        }
        let rows = query.all(self.conn).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for (rule, offer) in rows {
            let Some(offer) = offer.map(offer_from_entity) else {
                continue;
            };
            if !offer.is_running_at(now) {
                continue;
            }
            if offer.scope == OfferScope::Private && !self.is_targeted(offer.id, customer).await? {
                continue;
            }
            candidates.push(OfferCandidate {
                offer,
                rule: rule_from_entity(rule)?,
            });
        }
        Ok(candidates)
    }
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        company_id: model.company_id,
        name: model.name,
        base_price: model.base_price,
        is_active: model.is_active,
    }
}

fn offer_from_entity(model: OfferModel) -> Offer {
    Offer {
        id: model.id,
        company_id: model.company_id,
        title: model.title,
        scope: OfferScope::parse(&model.scope),
        status: OfferStatus::parse(&model.status),
        starts_at: model.starts_at.map(|dt| dt.with_timezone(&Utc)),
        ends_at: model.ends_at.map(|dt| dt.with_timezone(&Utc)),
    }
}

fn rule_from_entity(model: RuleModel) -> Result<OfferRule, AppError> {
    if model.min_qty <= 0 {
        return Err(AppError::Invariant(format!(
            "offer rule {} has non-positive min_qty",
            model.id
        )));
    }
    let reward = Reward::from_columns(
        &model.reward_type,
        model.discount_percent,
        model.discount_fixed,
        model.bonus_product_id,
        model.bonus_qty,
    )?;
    Ok(OfferRule {
        offer_id: model.offer_id,
        product_id: model.product_id,
        min_qty: model.min_qty,
        reward,
    })
}
