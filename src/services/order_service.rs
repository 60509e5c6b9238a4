use sea_orm::{AccessMode, DatabaseTransaction, IsolationLevel, TransactionTrait};

use crate::{
    audit::try_log_audit,
    catalog::SeaCatalog,
    dto::orders::{OrderDetail, OrderList},
    error::{AppError, AppResult},
    models::{Customer, OrderStatusLog},
    pricing::{Revalidation, revalidate},
    preview::{PreviewCache, PreviewRecord},
    repository::{self, NewOrder},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

/// Turns a preview into a persisted order, provided nothing it relied on
/// has moved.
///
/// Token lookup and the ownership check happen first. Revalidation and all
/// inserts then share one `REPEATABLE READ` transaction with catalog rows
/// read `FOR SHARE`. The token is claimed with a delete-if-present right
/// before commit: whoever loses that race rolls back and sees `NotFound`.
/// A stale preview keeps its token so the client can preview again.
#[tracing::instrument(
    name = "orders.confirm",
    skip(state, customer),
    fields(customer_id = customer.id),
    err
)]
pub async fn confirm_order(
    state: &AppState,
    customer: &Customer,
    token: &str,
) -> AppResult<OrderDetail> {
    let previews = &state.previews;
    let preview = previews.get(token).await?.ok_or(AppError::NotFound)?;

    if preview.customer_id != customer.id {
        previews.delete(token).await?;
        tracing::warn!(
            preview_token = %token,
            owner_id = preview.customer_id,
            "preview confirmed by a different customer, token purged"
        );
        return Err(AppError::Forbidden);
    }

    let now = state.clock.now();
    let txn = state
        .orm
        .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadWrite))
        .await?;

    let catalog = SeaCatalog::new(&txn).with_share_locks();
    let revalidation = revalidate(&catalog, &preview, customer, now).await?;
    if !revalidation.is_valid() {
        txn.rollback().await?;
        tracing::warn!(
            preview_token = %token,
            changes = revalidation.changes.len(),
            "preview is stale, token kept"
        );
        return Err(AppError::Conflict(revalidation.changes));
    }

    let order_no = match repository::next_order_number(&txn, state.ids.as_ref(), now).await {
        Ok(order_no) => order_no,
        Err(err) => return Err(abandon(txn, previews, token, err.to_string()).await),
    };
    let new_order = NewOrder {
        order_no,
        company_id: preview.company_id,
        customer_id: customer.id,
        notes: preview.notes.clone(),
        submitted_at: now,
        lines: &revalidation.lines,
        totals: revalidation.totals(),
    };

    let (order, status_log) = match repository::insert_order(&txn, new_order).await {
        Ok(persisted) => persisted,
        Err(err) => return Err(abandon(txn, previews, token, err.to_string()).await),
    };

    commit_claimed(txn, previews, token).await?;

    log_confirmed(state, customer, &preview, &revalidation, &order, &status_log).await;
    Ok(order)
}

/// Claims the token, then commits. The token stays purged whether or not
/// the commit succeeds.
async fn commit_claimed(
    txn: DatabaseTransaction,
    previews: &PreviewCache,
    token: &str,
) -> AppResult<()> {
    let claimed = match previews.delete(token).await {
        Ok(claimed) => claimed,
        Err(err) => {
            txn.rollback().await?;
            return Err(err);
        }
    };
    if !claimed {
        txn.rollback().await?;
        tracing::warn!(preview_token = %token, "token consumed concurrently, rolled back");
        return Err(AppError::NotFound);
    }

    txn.commit().await.map_err(|err| {
        tracing::warn!(preview_token = %token, error = %err, "commit failed after claiming token");
        AppError::Integrity(err.to_string())
    })
}

/// Rolls back a failed write and purges the token; a request that reached
/// persistence is not retried with the same token.
async fn abandon(
    txn: DatabaseTransaction,
    previews: &PreviewCache,
    token: &str,
    detail: String,
) -> AppError {
    if let Err(err) = txn.rollback().await {
        tracing::warn!(error = %err, "rollback after failed insert also failed");
    }
    if let Err(err) = previews.delete(token).await {
        tracing::warn!(error = %err, preview_token = %token, "could not purge preview token");
    }
    tracing::warn!(preview_token = %token, detail = %detail, "order insert failed, token purged");
    AppError::Integrity(detail)
}

async fn log_confirmed(
    state: &AppState,
    customer: &Customer,
    preview: &PreviewRecord,
    revalidation: &Revalidation,
    order: &OrderDetail,
    status_log: &OrderStatusLog,
) {
    tracing::info!(
        order_id = order.id,
        order_no = %order.order_no,
        lines = revalidation.lines.len(),
        final_total = %order.final_total,
        status = %status_log.to_status,
        "order confirmed"
    );

    try_log_audit(
        &state.pool,
        Some(customer.id),
        "order_confirm",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_no": order.order_no,
            "preview_token": preview.preview_token,
        })),
    )
    .await;
}

pub async fn confirm(
    state: &AppState,
    customer: &Customer,
    token: &str,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = confirm_order(state, customer, token).await?;
    Ok(ApiResponse::success(
        "Order created",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    customer: &Customer,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (orders, meta) = repository::list_orders(&state.orm, customer.id, &query).await?;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    customer: &Customer,
    id: i64,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = repository::find_order(&state.orm, id, customer.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use sea_orm::DatabaseConnection;
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{
        clock::fakes::{FixedClock, ScriptedIds},
        preview::InMemoryPreviewStore,
        pricing::test_support::{
            TestCatalog, customer, now, percent_rule, preview_for, product, public_offer,
        },
    };

    // The database is never reached on these paths.
    fn offline_state() -> AppState {
        let clock = Arc::new(FixedClock::at(now()));
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://offline@localhost/offline")
            .unwrap();
        AppState::new(
            pool,
            DatabaseConnection::Disconnected,
            Arc::new(InMemoryPreviewStore::new(clock.clone())),
            Duration::minutes(15),
            clock,
            Arc::new(ScriptedIds::new(&["TEST"])),
        )
    }

    async fn stored_preview(state: &AppState) -> PreviewRecord {
        let catalog = TestCatalog::default()
            .with_product(product(1, "10.00"))
            .with_offer(public_offer(1), percent_rule(1, 1, 100, "10"));
        let preview = preview_for(&catalog, &[(1, 200)]).await;
        state.previews.publish(preview, state.ids.as_ref()).await.unwrap()
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let state = offline_state();
        let result = confirm_order(&state, &customer(), "PV-20260420-NONE").await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn expired_token_is_not_found() {
        let clock = Arc::new(FixedClock::at(now()));
        let mut state = offline_state();
        state.previews = PreviewCache::new(
            Arc::new(InMemoryPreviewStore::new(clock.clone())),
            Duration::minutes(15),
        );
        let preview = stored_preview(&state).await;

        clock.advance(Duration::minutes(16));
        let result = confirm_order(&state, &customer(), &preview.preview_token).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn foreign_customer_is_forbidden_and_token_purged() {
        let state = offline_state();
        let preview = stored_preview(&state).await;
        let intruder = Customer {
            id: customer().id + 1,
            segment_id: None,
        };

        let result = confirm_order(&state, &intruder, &preview.preview_token).await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        // the rightful owner cannot use it either
        assert!(state.previews.get(&preview.preview_token).await.unwrap().is_none());
        let owner = confirm_order(&state, &customer(), &preview.preview_token).await;
        assert!(matches!(owner, Err(AppError::NotFound)));
    }
}
