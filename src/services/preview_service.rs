use chrono::{DateTime, Utc};

use crate::{
    audit::try_log_audit,
    catalog::{CatalogReader, SeaCatalog},
    dto::orders::{PreviewItemRequest, PreviewRequest},
    error::{AppError, AppResult},
    models::Customer,
    pricing::{LinePricing, calculate, select_best},
    preview::{OrderTotals, PreviewLine, PreviewRecord, preview_token},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 1_000_000;

#[tracing::instrument(
    name = "orders.preview",
    skip(state, customer, payload),
    fields(customer_id = customer.id, company_id = payload.company_id, lines = payload.items.len()),
    err
)]
pub async fn create_preview(
    state: &AppState,
    customer: &Customer,
    payload: PreviewRequest,
) -> AppResult<ApiResponse<PreviewRecord>> {
    let now = state.clock.now();
    let token = preview_token(now, &state.ids.suffix());

    let catalog = SeaCatalog::new(&state.orm);
    let record = build_preview(
        &catalog,
        customer,
        payload.company_id,
        payload.notes,
        &payload.items,
        token,
        now,
    )
    .await?;

    let record = state.previews.publish(record, state.ids.as_ref()).await?;

    tracing::info!(
        preview_token = %record.preview_token,
        final_total = %record.final_total,
        "preview created"
    );

    try_log_audit(
        &state.pool,
        Some(customer.id),
        "order_preview",
        Some("previews"),
        Some(serde_json::json!({
            "preview_token": record.preview_token,
            "final_total": record.final_total,
        })),
    )
    .await;

    Ok(ApiResponse::success("Preview created", record, Some(Meta::empty())))
}

/// Selects and prices an offer for each requested line and aggregates the
/// order totals into a preview record.
pub async fn build_preview<C>(
    catalog: &C,
    customer: &Customer,
    company_id: i64,
    notes: Option<String>,
    items: &[PreviewItemRequest],
    token: String,
    now: DateTime<Utc>,
) -> AppResult<PreviewRecord>
where
    C: CatalogReader + ?Sized,
{
    if items.is_empty() {
        return Err(AppError::BadRequest("at least one item is required".into()));
    }

    let mut lines = Vec::with_capacity(items.len());
    let mut totals = OrderTotals::default();

    for item in items {
        if item.quantity <= 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(AppError::BadRequest(format!(
                "quantity for product {} must be between 1 and {MAX_LINE_QUANTITY}",
                item.product_id
            )));
        }
        let product = catalog
            .product(item.product_id)
            .await?
            .filter(|p| p.is_active && p.company_id == company_id)
            .ok_or_else(|| {
                AppError::BadRequest(format!("product {} is not available", item.product_id))
            })?;

        let offer = select_best(catalog, &product, item.quantity, customer, now).await?;
        let pricing = calculate(catalog, &product, item.quantity, offer.as_ref()).await?;
        totals.add(&pricing);
        lines.push(preview_line(product.id, product.name, item.quantity, pricing));
    }

    Ok(PreviewRecord {
        preview_token: token,
        customer_id: customer.id,
        company_id,
        notes: notes.filter(|n| !n.trim().is_empty()),
        items: lines,
        subtotal: totals.subtotal,
        total_discount: totals.total_discount,
        final_total: totals.final_total,
        created_at: now,
    })
}

fn preview_line(product_id: i64, product_name: String, quantity: i32, pricing: LinePricing) -> PreviewLine {
    let (selected_offer_id, offer_title, reward_type) = match pricing.offer {
        Some(offer) => (Some(offer.offer_id), Some(offer.title), Some(offer.reward_type)),
        None => (None, None, None),
    };
    PreviewLine {
        product_id,
        product_name,
        quantity,
        unit_price: pricing.unit_price,
        line_subtotal: pricing.line_subtotal,
        discount_amount: pricing.discount_amount,
        final_total: pricing.final_total,
        selected_offer_id,
        offer_title,
        reward_type,
        bonuses: pricing.bonuses,
    }
}
