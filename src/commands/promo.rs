use crate::error::{ApiError, Result};
use crate::models::{PromoCode, PromoList, PromoListing, PromoType, PromoValidation, DEFAULT_CURRENCY_SYMBOL};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, instrument, warn};

const PROMO_EXPIRES_AT: &str = "2025-12-31";

fn promo_from_row(row: &Row<'_>) -> rusqlite::Result<PromoCode> {
    let raw_type: String = row.get(2)?;
    let promo_type = raw_type.parse::<PromoType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(PromoCode {
        id: row.get(0)?,
        code: row.get(1)?,
        promo_type,
        value: row.get(3)?,
        min_order_amount: row.get(4)?,
    })
}

/// Exact, case-sensitive match on an active code.
pub fn find_active_promo(conn: &Connection, code: &str) -> Result<Option<PromoCode>> {
    let promo = conn
        .query_row(
            "SELECT id, code, type, value, min_order_amount
             FROM promo_codes
             WHERE code = ?1 AND is_active = 1",
            [code],
            promo_from_row,
        )
        .optional()?;
    Ok(promo)
}

#[instrument(skip(conn))]
pub fn list_promos(conn: &Connection) -> Result<PromoList> {
    let mut stmt = conn.prepare(
        "SELECT id, code, type, value, min_order_amount
         FROM promo_codes
         WHERE is_active = 1
         ORDER BY value DESC",
    )?;

    let promocodes = stmt
        .query_map([], promo_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(|promo| PromoListing {
            id: promo.id,
            title: promo_title(&promo.code).to_string(),
            discount: promo_discount_label(&promo),
            description: promo_description(&promo),
            code: promo.code.clone(),
            min_order_amount: promo.min_order_amount,
            expires_at: PROMO_EXPIRES_AT.to_string(),
            promo_type: promo.promo_type,
            value: promo.value,
        })
        .collect();

    Ok(PromoList {
        success: true,
        promocodes,
    })
}

/// Standalone check used by the storefront before checkout. Unlike order
/// placement this reports an unknown or inactive code as an error.
#[instrument(skip(conn))]
pub fn validate_promo(conn: &Connection, code: Option<&str>) -> Result<PromoValidation> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Promo code is required".to_string()))?;

    let Some(promo) = find_active_promo(conn, code)? else {
        warn!(code, "Promo code rejected");
        return Err(ApiError::NotFound("Invalid or expired promo code".to_string()));
    };

    info!(code, "Promo code validated");
    Ok(PromoValidation {
        success: true,
        code: promo.code,
        promo_type: promo.promo_type,
        discount: promo.value,
        min_order_amount: promo.min_order_amount,
    })
}

pub fn promo_title(code: &str) -> &'static str {
    match code {
        "WELCOME10" => "Welcome Offer",
        "SUMMER20" => "Summer Special",
        "FLAT5" => "Flat Discount",
        "LOYALTY" => "Loyalty Reward",
        _ => "Special Offer",
    }
}

/// `10.0` renders as `10`, `12.5` stays `12.5`.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn promo_discount_label(promo: &PromoCode) -> String {
    match promo.promo_type {
        PromoType::Percentage => format!("{}% OFF", format_amount(promo.value)),
        PromoType::Fixed => format!("{}{} OFF", DEFAULT_CURRENCY_SYMBOL, format_amount(promo.value)),
    }
}

pub fn promo_description(promo: &PromoCode) -> String {
    let min_order = format_amount(promo.min_order_amount);
    match promo.promo_type {
        PromoType::Percentage => format!(
            "Get {} on orders above {}{}. Use code {}.",
            promo_discount_label(promo),
            DEFAULT_CURRENCY_SYMBOL,
            min_order,
            promo.code
        ),
        PromoType::Fixed => format!(
            "Save {}{} on orders above {}{}. Use code {}.",
            DEFAULT_CURRENCY_SYMBOL,
            format_amount(promo.value),
            DEFAULT_CURRENCY_SYMBOL,
            min_order,
            promo.code
        ),
    }
}
