//! Order pricing.
//!
//! `subtotal = Σ price × quantity` over the branch prices read from the
//! database, VAT from the branch settings (15% when unset), and an optional
//! promo discount clamped to the subtotal. Customization surcharges are carried
//! in the order item snapshot but do not enter the totals.

use crate::commands::branches::load_settings;
use crate::commands::promo::find_active_promo;
use crate::error::{ApiError, Result};
use crate::models::{PromoCode, PromoType, SelectedCustomization};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, instrument};

/// A validated cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub branch_menu_item_id: i64,
    pub quantity: i64,
    pub customizations: Vec<SelectedCustomization>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub branch_menu_item_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub customizations: Vec<SelectedCustomization>,
}

impl PricedLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: f64,
    pub vat_amount: f64,
    pub discount_amount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub breakdown: PriceBreakdown,
    /// Set only when the promo was actually applied.
    pub promo_code_id: Option<i64>,
}

/// Discount a promo grants on `subtotal`; zero below the minimum order amount.
pub fn promo_discount(promo: &PromoCode, subtotal: f64) -> f64 {
    discount_for(promo.promo_type, promo.value, promo.min_order_amount, subtotal)
}

pub fn discount_for(promo_type: PromoType, value: f64, min_order_amount: f64, subtotal: f64) -> f64 {
    if subtotal < min_order_amount {
        return 0.0;
    }

    let raw = match promo_type {
        PromoType::Percentage => subtotal * value / 100.0,
        PromoType::Fixed => value,
    };

    raw.min(subtotal).max(0.0)
}

pub fn calculate(lines: &[PricedLine], vat_percentage: f64, promo: Option<&PromoCode>) -> PriceBreakdown {
    let subtotal: f64 = lines.iter().map(PricedLine::line_total).sum();
    let vat_amount = subtotal * vat_percentage / 100.0;
    let discount_amount = promo.map(|p| promo_discount(p, subtotal)).unwrap_or(0.0);

    PriceBreakdown {
        subtotal,
        vat_amount,
        discount_amount,
        total_amount: subtotal + vat_amount - discount_amount,
    }
}

/// Current price of a sellable item in the given branch.
pub fn branch_item_price(conn: &Connection, branch_id: i64, branch_menu_item_id: i64) -> Result<Option<f64>> {
    let price = conn
        .query_row(
            "SELECT price FROM branch_menu_items WHERE id = ?1 AND branch_id = ?2",
            [branch_menu_item_id, branch_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(price)
}

/// Price a cart against the database. Fails as a whole if any line does not
/// reference a sellable item of the branch. An unknown, inactive or
/// sub-minimum promo code is dropped silently.
#[instrument(skip(conn, lines), fields(lines = lines.len()))]
pub fn price_order(
    conn: &Connection,
    branch_id: i64,
    lines: &[OrderLine],
    promo_code: Option<&str>,
) -> Result<PricedOrder> {
    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        let unit_price = branch_item_price(conn, branch_id, line.branch_menu_item_id)?.ok_or_else(|| {
            ApiError::Validation(format!("Invalid menu item: {}", line.branch_menu_item_id))
        })?;

        priced.push(PricedLine {
            branch_menu_item_id: line.branch_menu_item_id,
            quantity: line.quantity,
            unit_price,
            customizations: line.customizations.clone(),
        });
    }

    let settings = load_settings(conn, branch_id)?;

    let promo = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => find_active_promo(conn, code)?,
        None => None,
    };

    let breakdown = calculate(&priced, settings.vat_percentage(), promo.as_ref());

    let promo_code_id = promo
        .as_ref()
        .filter(|p| breakdown.subtotal >= p.min_order_amount)
        .map(|p| p.id);
    if promo_code.is_some() && promo_code_id.is_none() {
        debug!(?promo_code, subtotal = breakdown.subtotal, "Promo code not applied");
    }

    Ok(PricedOrder {
        lines: priced,
        breakdown,
        promo_code_id,
    })
}
