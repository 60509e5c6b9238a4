use chrono::{DateTime, Utc};

use crate::{
    catalog::CatalogReader,
    error::AppResult,
    models::{Customer, Offer, OfferScope, OfferStatus, Product},
    money::{price_drifted, round_money},
    pricing::{LinePricing, calculate, select_best},
    preview::{ChangeReason, OrderTotals, PreviewChange, PreviewLine, PreviewRecord},
};

/// A preview line priced again against live data.
#[derive(Debug, Clone)]
pub struct RepricedLine {
    pub product: Product,
    pub quantity: i32,
    pub pricing: LinePricing,
}

#[derive(Debug, Clone, Default)]
pub struct Revalidation {
    pub changes: Vec<PreviewChange>,
    pub lines: Vec<RepricedLine>,
}

impl Revalidation {
    pub fn is_valid(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn totals(&self) -> OrderTotals {
        self.lines.iter().map(|line| &line.pricing).collect()
    }
}

/// Re-runs selection and pricing for every preview line and reports what
/// moved. Read-only; all reads go through `catalog`, so a transactional
/// catalog makes the whole check see one snapshot.
#[tracing::instrument(
    name = "pricing.revalidate",
    skip(catalog, preview, customer, now),
    fields(preview_token = %preview.preview_token, lines = preview.items.len())
)]
pub async fn revalidate<C>(
    catalog: &C,
    preview: &PreviewRecord,
    customer: &Customer,
    now: DateTime<Utc>,
) -> AppResult<Revalidation>
where
    C: CatalogReader + ?Sized,
{
    let mut result = Revalidation::default();

    for line in &preview.items {
        let product = match catalog.product(line.product_id).await? {
            Some(product) if product.is_active => product,
            _ => {
                result.changes.push(PreviewChange::ProductUnavailable {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                });
                continue;
            }
        };

        let current_price = round_money(product.base_price);
        if price_drifted(line.unit_price, current_price) {
            result.changes.push(PreviewChange::PriceChanged {
                product_id: product.id,
                product_name: product.name.clone(),
                preview_price: line.unit_price,
                current_price,
            });
        }

        let current = select_best(catalog, &product, line.quantity, customer, now).await?;
        let pricing = calculate(catalog, &product, line.quantity, current.as_ref()).await?;

        if let Some(change) = offer_change(catalog, line, &pricing, customer, now).await? {
            result.changes.push(change);
        }

        result.lines.push(RepricedLine {
            product,
            quantity: line.quantity,
            pricing,
        });
    }

    if !result.is_valid() {
        tracing::info!(changes = result.changes.len(), "preview is stale");
    }
    Ok(result)
}

async fn offer_change<C>(
    catalog: &C,
    line: &PreviewLine,
    current: &LinePricing,
    customer: &Customer,
    now: DateTime<Utc>,
) -> AppResult<Option<PreviewChange>>
where
    C: CatalogReader + ?Sized,
{
    let current_id = current.offer.as_ref().map(|o| o.offer_id);
    if line.selected_offer_id == current_id {
        return Ok(None);
    }

    let lapsed = match line.selected_offer_id {
        Some(previous_id) => {
            let previous = catalog.offer(previous_id).await?;
            lapse_reason(catalog, previous.as_ref(), customer, now).await?
        }
        None => None,
    };

    let change = match lapsed {
        Some(reason) => best_offer_changed(line, None, reason),
        // Still eligible on its own terms yet no longer winning.
        None if current.offer.is_some() => {
            best_offer_changed(line, Some(current), ChangeReason::NewBetterOffer)
        }
        // Offer itself is live but nothing applies to the line any more
        // (rule removed, reward worth nothing): no offer is in effect.
        None => best_offer_changed(line, None, ChangeReason::BecameInactive),
    };
    Ok(Some(change))
}

/// Why a previously selected offer can no longer apply, if it cannot.
async fn lapse_reason<C>(
    catalog: &C,
    offer: Option<&Offer>,
    customer: &Customer,
    now: DateTime<Utc>,
) -> AppResult<Option<ChangeReason>>
where
    C: CatalogReader + ?Sized,
{
    let Some(offer) = offer else {
        return Ok(Some(ChangeReason::BecameInactive));
    };
    if offer.has_expired(now) {
        return Ok(Some(ChangeReason::Expired));
    }
    if offer.status != OfferStatus::Active {
        return Ok(Some(ChangeReason::BecameInactive));
    }
    if !offer.has_started(now) {
        return Ok(Some(ChangeReason::NotStarted));
    }
    if offer.scope == OfferScope::Private && !catalog.is_targeted(offer.id, customer).await? {
        return Ok(Some(ChangeReason::TargetingChanged));
    }
    Ok(None)
}

fn best_offer_changed(
    line: &PreviewLine,
    current: Option<&LinePricing>,
    change_reason: ChangeReason,
) -> PreviewChange {
    let current = current.and_then(|pricing| pricing.offer.as_ref());
    PreviewChange::BestOfferChanged {
        product_id: line.product_id,
        previous_offer_id: line.selected_offer_id,
        previous_offer_title: line.offer_title.clone(),
        previous_reward_type: line.reward_type,
        current_offer_id: current.map(|o| o.offer_id),
        current_offer_title: current.map(|o| o.title.clone()),
        current_reward_type: current.map(|o| o.reward_type),
        change_reason,
    }
}
