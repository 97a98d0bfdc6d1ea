use crate::commands::branches::{branch_exists, table_belongs_to_branch};
use crate::commands::pricing::{price_order, OrderLine};
use crate::error::{ApiError, Result};
use crate::i18n::resolve_language;
use crate::models::{CreateOrder, OrderStatus, OrderType, PlacedOrder};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument, warn};

pub const INITIAL_STATUS: &str = "placed";
pub const PREPARATION_MINUTES: i64 = 30;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ORDER_UID_PREFIX: &str = "ORD";
const MAX_UID_ATTEMPTS: usize = 5;

static UID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `ORD` + uppercase hex of the microsecond clock and a per-process sequence
/// + a random 4-digit suffix.
pub fn generate_order_uid() -> String {
    let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
    let sequence = UID_SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFF;
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("{}{:X}{:03X}{}", ORDER_UID_PREFIX, micros, sequence, suffix)
}

fn order_uid_taken(conn: &Connection, uid: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM orders WHERE order_uid = ?1", [uid], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn unique_order_uid(conn: &Connection) -> Result<String> {
    for _ in 0..MAX_UID_ATTEMPTS {
        let uid = generate_order_uid();
        if !order_uid_taken(conn, &uid)? {
            return Ok(uid);
        }
        warn!(uid = %uid, "Order uid collision, retrying");
    }
    Err(ApiError::Internal("could not allocate a unique order id".to_string()))
}

pub fn estimated_completion_time() -> String {
    (chrono::Local::now() + chrono::Duration::minutes(PREPARATION_MINUTES))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Required fields of a checkout request, checked before touching the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub branch_id: i64,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
}

pub fn validate_order(order: &CreateOrder) -> Result<ValidatedOrder> {
    let branch_id = order.branch_id.ok_or_else(|| ApiError::missing_field("branch_id"))?;
    let raw_type = order.order_type.as_deref().ok_or_else(|| ApiError::missing_field("order_type"))?;
    let items = order.items.as_ref().ok_or_else(|| ApiError::missing_field("items"))?;

    let order_type: OrderType = raw_type
        .parse()
        .map_err(|_| ApiError::Validation("Invalid order type".to_string()))?;

    if items.is_empty() {
        return Err(ApiError::Validation("Order must contain at least one item".to_string()));
    }

    let lines = items
        .iter()
        .map(|item| match (item.branch_menu_item_id, item.quantity) {
            (Some(branch_menu_item_id), Some(quantity)) if quantity > 0 => Ok(OrderLine {
                branch_menu_item_id,
                quantity,
                customizations: item.customizations.clone(),
            }),
            _ => Err(ApiError::Validation("Invalid item data".to_string())),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ValidatedOrder {
        branch_id,
        order_type,
        lines,
    })
}

/// Price and persist an order.
///
/// Prices are read inside the write transaction, so the stored unit prices are
/// the ones the totals were computed from. Any failure rolls back the header
/// and every line.
#[instrument(skip(conn, order), fields(branch_id = ?order.branch_id))]
pub fn place_order(conn: &mut Connection, order: CreateOrder) -> Result<PlacedOrder> {
    let valid = validate_order(&order)?;

    if !branch_exists(conn, valid.branch_id)? {
        return Err(ApiError::NotFound("Branch not found".to_string()));
    }

    if let Some(table_id) = order.table_id {
        if !table_belongs_to_branch(conn, table_id, valid.branch_id)? {
            return Err(ApiError::NotFound("Invalid table for this branch".to_string()));
        }
    }

    let language = resolve_language(conn, Some(valid.branch_id), order.language.as_deref())?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let priced = price_order(&tx, valid.branch_id, &valid.lines, order.promo_code.as_deref())?;
    let order_uid = unique_order_uid(&tx)?;
    let estimated = estimated_completion_time();
    let totals = priced.breakdown;

    tx.execute(
        "INSERT INTO orders (
             order_uid, branch_id, table_id, order_type, status,
             customer_name, customer_phone, customer_address, language_id,
             subtotal, vat_amount, discount_amount, total_amount,
             promo_code_id, estimated_completion_time
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        rusqlite::params![
            order_uid,
            valid.branch_id,
            order.table_id,
            valid.order_type.as_str(),
            INITIAL_STATUS,
            order.customer_name,
            order.customer_phone,
            order.customer_address,
            language.id,
            totals.subtotal,
            totals.vat_amount,
            totals.discount_amount,
            totals.total_amount,
            priced.promo_code_id,
            estimated,
        ],
    )?;

    let order_id = tx.last_insert_rowid();

    for line in &priced.lines {
        let snapshot = serde_json::to_string(&line.customizations)?;
        tx.execute(
            "INSERT INTO order_items (order_id, branch_menu_item_id, quantity, unit_price, customizations)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![order_id, line.branch_menu_item_id, line.quantity, line.unit_price, snapshot],
        )?;
    }

    tx.commit()?;

    info!(
        order_uid = %order_uid,
        order_type = %valid.order_type,
        items = priced.lines.len(),
        total = totals.total_amount,
        "Order placed"
    );

    Ok(PlacedOrder {
        order_id: order_uid,
        status: INITIAL_STATUS.to_string(),
        estimated_completion_time: estimated,
        language: language.code,
    })
}

#[instrument(skip(conn))]
pub fn get_order_status(conn: &Connection, order_uid: &str) -> Result<OrderStatus> {
    conn.query_row(
        "SELECT o.order_uid, o.status, o.order_type, o.estimated_completion_time, l.code
         FROM orders o
         JOIN languages l ON o.language_id = l.id
         WHERE o.order_uid = ?1",
        [order_uid],
        |row| {
            Ok(OrderStatus {
                order_id: row.get(0)?,
                status: row.get(1)?,
                order_type: row.get(2)?,
                estimated_completion_time: row.get(3)?,
                language: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))
}

/// Internal row id for a public uid. Never exposed to clients.
pub fn order_row_id(conn: &Connection, order_uid: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM orders WHERE order_uid = ?1", [order_uid], |row| row.get(0))
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateOrderItem;
    use std::collections::HashSet;

    fn item(id: i64, quantity: i64) -> CreateOrderItem {
        CreateOrderItem {
            branch_menu_item_id: Some(id),
            quantity: Some(quantity),
            customizations: Vec::new(),
        }
    }

    #[test]
    fn ten_thousand_uids_are_distinct() {
        let uids: HashSet<String> = (0..10_000).map(|_| generate_order_uid()).collect();
        assert_eq!(uids.len(), 10_000);
        assert!(uids.iter().all(|uid| uid.starts_with("ORD")));
    }

    #[test]
    fn uid_is_uppercase_and_ends_in_four_digits() {
        let uid = generate_order_uid();
        assert_eq!(uid, uid.to_uppercase());
        let suffix = &uid[uid.len() - 4..];
        let n: u32 = suffix.parse().unwrap();
        assert!((1000..=9999).contains(&n));
    }

    #[test]
    fn validation_names_missing_field() {
        let err = validate_order(&CreateOrder::default()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: branch_id");

        let order = CreateOrder {
            branch_id: Some(1),
            order_type: Some("dine-in".to_string()),
            ..Default::default()
        };
        let err = validate_order(&order).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: items");
    }

    #[test]
    fn validation_rejects_unknown_order_type_and_bad_lines() {
        let order = CreateOrder {
            branch_id: Some(1),
            order_type: Some("drive-thru".to_string()),
            items: Some(vec![item(1, 1)]),
            ..Default::default()
        };
        assert_eq!(validate_order(&order).unwrap_err().to_string(), "Invalid order type");

        let order = CreateOrder {
            branch_id: Some(1),
            order_type: Some("takeaway".to_string()),
            items: Some(vec![item(1, 0)]),
            ..Default::default()
        };
        assert_eq!(validate_order(&order).unwrap_err().to_string(), "Invalid item data");
    }

    #[test]
    fn validation_rejects_empty_cart() {
        let order = CreateOrder {
            branch_id: Some(1),
            order_type: Some("delivery".to_string()),
            items: Some(Vec::new()),
            ..Default::default()
        };
        assert!(matches!(validate_order(&order), Err(ApiError::Validation(_))));
    }
}
