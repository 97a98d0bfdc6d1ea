//! Client-side cart.
//!
//! Totals here are an estimate for display. Unlike the server, the estimate
//! counts customization surcharges; the server total on the placed order is
//! authoritative.

use crate::commands::pricing::discount_for;
use crate::models::{
    BranchSettings, CreateOrderItem, OrderType, PromoType, PromoValidation, RestaurantTable,
    SelectedCustomization,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub id: String,
    pub branch_menu_item_id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub customizations: Vec<SelectedCustomization>,
}

impl CartLine {
    pub fn customization_total(&self) -> f64 {
        self.customizations.iter().map(SelectedCustomization::additional_price).sum()
    }

    pub fn line_total(&self) -> f64 {
        (self.price + self.customization_total()) * self.quantity as f64
    }
}

/// What the item modal hands to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub branch_menu_item_id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub customizations: Vec<SelectedCustomization>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartBranch {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub settings: BranchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedPromo {
    pub code: String,
    #[serde(rename = "type")]
    pub promo_type: PromoType,
    pub value: f64,
    pub min_order_amount: f64,
}

impl From<PromoValidation> for AppliedPromo {
    fn from(promo: PromoValidation) -> Self {
        AppliedPromo {
            code: promo.code,
            promo_type: promo.promo_type,
            value: promo.discount,
            min_order_amount: promo.min_order_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub branch: Option<CartBranch>,
    pub order_type: OrderType,
    pub selected_table: Option<RestaurantTable>,
    pub promo: Option<AppliedPromo>,
    next_line: u64,
}

impl Default for Cart {
    fn default() -> Self {
        Cart {
            items: Vec::new(),
            branch: None,
            order_type: OrderType::DineIn,
            selected_table: None,
            promo: None,
            next_line: 1,
        }
    }
}

impl Cart {
    /// Switching to another branch empties the cart, since its lines are only
    /// sellable in the branch they came from.
    pub fn set_branch(&mut self, branch: CartBranch) {
        if self.branch.as_ref().map(|b| b.id) != Some(branch.id) {
            self.items.clear();
            self.promo = None;
            self.selected_table = None;
        }
        self.branch = Some(branch);
    }

    pub fn branch_id(&self) -> Option<i64> {
        self.branch.as_ref().map(|b| b.id)
    }

    /// Adds an item, merging into an existing line with the same item and the
    /// same customizations. Returns the id of the affected line, or `None` for
    /// a non-positive quantity.
    pub fn add_item(&mut self, item: NewCartItem) -> Option<String> {
        if item.quantity <= 0 {
            return None;
        }

        if let Some(line) = self.items.iter_mut().find(|line| {
            line.branch_menu_item_id == item.branch_menu_item_id && line.customizations == item.customizations
        }) {
            line.quantity += item.quantity;
            return Some(line.id.clone());
        }

        let id = format!("cart-{}", self.next_line);
        self.next_line += 1;
        self.items.push(CartLine {
            id: id.clone(),
            branch_menu_item_id: item.branch_menu_item_id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
            customizations: item.customizations,
        });
        Some(id)
    }

    pub fn remove_item(&mut self, line_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.id != line_id);
        self.items.len() != before
    }

    /// A quantity of zero or less removes the line.
    pub fn update_quantity(&mut self, line_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_item(line_id);
        }
        match self.items.iter_mut().find(|line| line.id == line_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Units of a menu item across all its lines.
    pub fn item_quantity(&self, branch_menu_item_id: i64) -> i64 {
        self.items
            .iter()
            .filter(|line| line.branch_menu_item_id == branch_menu_item_id)
            .map(|line| line.quantity)
            .sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empties lines, promo and table. Branch and order type stay.
    pub fn clear(&mut self) {
        self.items.clear();
        self.promo = None;
        self.selected_table = None;
    }

    pub fn vat_percentage(&self) -> f64 {
        self.branch
            .as_ref()
            .map(|b| b.settings.vat_percentage())
            .unwrap_or(crate::models::DEFAULT_VAT_PERCENTAGE)
    }

    pub fn currency_symbol(&self) -> &str {
        self.branch
            .as_ref()
            .map(|b| b.settings.currency_symbol())
            .unwrap_or(crate::models::DEFAULT_CURRENCY_SYMBOL)
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(CartLine::line_total).sum()
    }

    pub fn vat_amount(&self) -> f64 {
        self.subtotal() * self.vat_percentage() / 100.0
    }

    pub fn discount_amount(&self) -> f64 {
        match &self.promo {
            Some(p) => discount_for(p.promo_type, p.value, p.min_order_amount, self.subtotal()),
            None => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.subtotal() + self.vat_amount() - self.discount_amount()
    }

    pub fn order_items(&self) -> Vec<CreateOrderItem> {
        self.items
            .iter()
            .map(|line| CreateOrderItem {
                branch_menu_item_id: Some(line.branch_menu_item_id),
                quantity: Some(line.quantity),
                customizations: line.customizations.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burger(quantity: i64, extras: &[(&str, f64)]) -> NewCartItem {
        NewCartItem {
            branch_menu_item_id: 1,
            name: "Burger".to_string(),
            price: 200.0,
            quantity,
            customizations: extras
                .iter()
                .enumerate()
                .map(|(i, (name, price))| SelectedCustomization::new(2, "Extras", i as i64 + 1, name, *price))
                .collect(),
        }
    }

    #[test]
    fn identical_selections_merge_into_one_line() {
        let mut cart = Cart::default();
        let first = cart.add_item(burger(1, &[("Cheese", 30.0)])).unwrap();
        let second = cart.add_item(burger(2, &[("Cheese", 30.0)])).unwrap();
        let third = cart.add_item(burger(1, &[])).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item_quantity(1), 4);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn non_positive_quantity_removes_line() {
        let mut cart = Cart::default();
        let id = cart.add_item(burger(2, &[])).unwrap();

        assert!(cart.update_quantity(&id, 5));
        assert_eq!(cart.items[0].quantity, 5);

        assert!(cart.update_quantity(&id, 0));
        assert!(cart.is_empty());
        assert!(!cart.update_quantity(&id, 3));
        assert!(cart.add_item(burger(0, &[])).is_none());
    }

    #[test]
    fn estimate_includes_customizations_and_default_vat() {
        let mut cart = Cart::default();
        cart.add_item(burger(2, &[("Cheese", 30.0)]));

        assert_eq!(cart.subtotal(), 460.0);
        assert_eq!(cart.vat_percentage(), 15.0);
        assert_eq!(cart.vat_amount(), 69.0);
        assert_eq!(cart.currency_symbol(), "৳");
        assert_eq!(cart.total(), 529.0);
    }

    #[test]
    fn promo_discount_tracks_current_subtotal() {
        let mut cart = Cart::default();
        cart.add_item(burger(1, &[]));
        cart.promo = Some(AppliedPromo {
            code: "WELCOME10".to_string(),
            promo_type: PromoType::Percentage,
            value: 10.0,
            min_order_amount: 300.0,
        });

        assert_eq!(cart.discount_amount(), 0.0);

        cart.add_item(burger(1, &[]));
        assert_eq!(cart.discount_amount(), 40.0);
        assert_eq!(cart.total(), 420.0);
    }

    #[test]
    fn changing_branch_empties_cart() {
        let mut cart = Cart::default();
        let branch = |id| CartBranch {
            id,
            name: format!("Branch {}", id),
            settings: BranchSettings::default(),
        };

        cart.set_branch(branch(1));
        cart.add_item(burger(1, &[]));
        cart.set_branch(branch(1));
        assert_eq!(cart.items.len(), 1);

        cart.set_branch(branch(2));
        assert!(cart.is_empty());
        assert_eq!(cart.branch_id(), Some(2));
    }

    #[test]
    fn stored_cart_survives_serialization() {
        let mut cart = Cart::default();
        cart.order_type = OrderType::Delivery;
        cart.add_item(burger(3, &[("Cheese", 30.0)]));

        let raw = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, cart);

        let legacy: Cart = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert_eq!(legacy.order_type, OrderType::DineIn);
    }

    #[test]
    fn loosely_typed_customizations_still_price() {
        let extras: Vec<SelectedCustomization> = serde_json::from_str(
            r#"[
                {"group_id": "2", "option_id": 4, "name": "Garlic Mayo", "price": 30},
                {"group_id": 1, "option_id": "2", "additional_price": "50.5"},
                {"group_id": 3, "option_name": "No onion"}
            ]"#,
        )
        .unwrap();
        assert_eq!(extras[0].group_id(), Some(2));
        assert_eq!(extras[1].option_id(), Some(2));

        let mut cart = Cart::default();
        cart.add_item(NewCartItem { customizations: extras, ..burger(1, &[]) });
        assert_eq!(cart.items[0].customization_total(), 80.5);
        assert_eq!(cart.subtotal(), 280.5);
    }
}
