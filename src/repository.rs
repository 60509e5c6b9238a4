//! Durable order storage.
//!
//! Every write helper takes a connection so the caller decides the
//! transaction; confirmation runs all of them inside one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::{
    clock::IdGenerator,
    dto::orders::OrderDetail,
    entity::{
        order_item_bonuses::{
            ActiveModel as BonusActive, Column as BonusCol, Entity as OrderItemBonuses,
            Model as BonusModel,
        },
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        order_status_logs::{ActiveModel as StatusLogActive, Model as StatusLogModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderItemBonus, OrderStatusLog, STATUS_PENDING},
    preview::OrderTotals,
    pricing::RepricedLine,
    response::Meta,
    routes::params::{OrderListQuery, SortOrder},
};

const MAX_ORDER_NO_ATTEMPTS: usize = 10;

pub struct NewOrder<'a> {
    pub order_no: String,
    pub company_id: i64,
    pub customer_id: i64,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub lines: &'a [RepricedLine],
    pub totals: OrderTotals,
}

/// `ORD-` + 14-digit timestamp + `-` + 4-character suffix.
pub fn order_number(now: DateTime<Utc>, suffix: &str) -> String {
    format!("ORD-{}-{}", now.format("%Y%m%d%H%M%S"), suffix)
}

pub async fn order_no_exists<C>(conn: &C, order_no: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let count = Orders::find()
        .filter(OrderCol::OrderNo.eq(order_no))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Draws order numbers until one is unused.
pub async fn next_order_number<C>(
    conn: &C,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> AppResult<String>
where
    C: ConnectionTrait,
{
    for _ in 0..MAX_ORDER_NO_ATTEMPTS {
        let candidate = order_number(now, &ids.suffix());
        if !order_no_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(order_no = %candidate, "order number collision, retrying");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a unique order number"
    )))
}

/// Inserts the header, one item per line with its price snapshot, the bonus
/// rows and the initial status log entry.
pub async fn insert_order<C>(
    conn: &C,
    new: NewOrder<'_>,
) -> Result<(OrderDetail, OrderStatusLog), DbErr>
where
    C: ConnectionTrait,
{
    let order = OrderActive {
        id: NotSet,
        order_no: Set(new.order_no),
        company_id: Set(new.company_id),
        customer_id: Set(new.customer_id),
        status: Set(STATUS_PENDING.to_string()),
        notes: Set(new.notes),
        subtotal: Set(new.totals.subtotal),
        total_discount: Set(new.totals.total_discount),
        final_total: Set(new.totals.final_total),
        submitted_at: Set(new.submitted_at.into()),
        approved_at: Set(None),
        delivered_at: Set(None),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(new.lines.len());
    for line in new.lines {
        let pricing = &line.pricing;
        let item = OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            quantity: Set(line.quantity),
            unit_price: Set(pricing.unit_price),
            discount_amount: Set(pricing.discount_amount),
            final_total: Set(pricing.final_total),
            selected_offer_id: Set(pricing.offer.as_ref().map(|o| o.offer_id)),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;

        let mut bonuses = Vec::with_capacity(pricing.bonuses.len());
        for bonus in &pricing.bonuses {
            let row = BonusActive {
                id: NotSet,
                order_item_id: Set(item.id),
                bonus_product_id: Set(bonus.bonus_product_id),
                bonus_qty: Set(bonus.bonus_qty),
                offer_id: Set(bonus.offer_id),
                created_at: NotSet,
            }
            .insert(conn)
            .await?;
            bonuses.push(bonus_from_entity(row));
        }

        items.push(order_item_from_entity(item, line.product.name.clone(), bonuses));
    }

    let status_log = StatusLogActive {
        id: NotSet,
        order_id: Set(order.id),
        from_status: Set(None),
        to_status: Set(STATUS_PENDING.to_string()),
        actor_id: Set(new.customer_id),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok((
        OrderDetail::new(order_from_entity(order), items),
        status_log_from_entity(status_log),
    ))
}

pub async fn find_order<C>(conn: &C, id: i64, customer_id: i64) -> AppResult<Option<OrderDetail>>
where
    C: ConnectionTrait,
{
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::CustomerId.eq(customer_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(conn)
        .await?;
    let Some(order) = order else {
        return Ok(None);
    };

    let rows = OrderItems::find()
        .find_also_related(Products)
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?;

    let item_ids: Vec<i64> = rows.iter().map(|(item, _)| item.id).collect();
    let mut bonuses_by_item: HashMap<i64, Vec<OrderItemBonus>> = HashMap::new();
    if !item_ids.is_empty() {
        let bonuses = OrderItemBonuses::find()
            .filter(BonusCol::OrderItemId.is_in(item_ids))
            .order_by_asc(BonusCol::Id)
            .all(conn)
            .await?;
        for bonus in bonuses {
            bonuses_by_item
                .entry(bonus.order_item_id)
                .or_default()
                .push(bonus_from_entity(bonus));
        }
    }

    let items = rows
        .into_iter()
        .map(|(item, product)| {
            let bonuses = bonuses_by_item.remove(&item.id).unwrap_or_default();
            let name = product.map(|p| p.name).unwrap_or_default();
            order_item_from_entity(item, name, bonuses)
        })
        .collect();

    Ok(Some(OrderDetail::new(order_from_entity(order), items)))
}

pub async fn list_orders<C>(
    conn: &C,
    customer_id: i64,
    query: &OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)>
where
    C: ConnectionTrait,
{
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::CustomerId.eq(customer_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::SubmittedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::SubmittedAt),
    };

    let total = finder.clone().count(conn).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok((orders, Meta::new(page, limit, total)))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_no: model.order_no,
        company_id: model.company_id,
        customer_id: model.customer_id,
        status: model.status,
        submitted_at: model.submitted_at.with_timezone(&Utc),
        approved_at: model.approved_at.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        notes: model.notes,
        subtotal: model.subtotal,
        total_discount: model.total_discount,
        final_total: model.final_total,
    }
}

fn order_item_from_entity(
    model: OrderItemModel,
    product_name: String,
    bonuses: Vec<OrderItemBonus>,
) -> OrderItem {
    OrderItem {
        id: model.id,
        product_id: model.product_id,
        product_name,
        qty: model.quantity,
        unit_price: model.unit_price,
        discount_amount: model.discount_amount,
        final_total: model.final_total,
        selected_offer_id: model.selected_offer_id,
        bonuses,
    }
}

fn bonus_from_entity(model: BonusModel) -> OrderItemBonus {
    OrderItemBonus {
        id: model.id,
        bonus_product_id: model.bonus_product_id,
        bonus_qty: model.bonus_qty,
        offer_id: model.offer_id,
    }
}

fn status_log_from_entity(model: StatusLogModel) -> OrderStatusLog {
    OrderStatusLog {
        id: model.id,
        order_id: model.order_id,
        from_status: model.from_status,
        to_status: model.to_status,
        actor_id: model.actor_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
