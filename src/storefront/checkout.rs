use super::cart::Cart;
use super::{Result, StorefrontError};
use crate::models::{CreateOrder, OrderType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutStep {
    /// Order type and table.
    OrderDetails,
    CustomerInfo,
    Payment,
}

impl CheckoutStep {
    pub fn number(self) -> u8 {
        match self {
            CheckoutStep::OrderDetails => 1,
            CheckoutStep::CustomerInfo => 2,
            CheckoutStep::Payment => 3,
        }
    }

    fn next(self) -> Self {
        match self {
            CheckoutStep::OrderDetails => CheckoutStep::CustomerInfo,
            CheckoutStep::CustomerInfo | CheckoutStep::Payment => CheckoutStep::Payment,
        }
    }

    fn previous(self) -> Self {
        match self {
            CheckoutStep::OrderDetails | CheckoutStep::CustomerInfo => CheckoutStep::OrderDetails,
            CheckoutStep::Payment => CheckoutStep::CustomerInfo,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Bkash,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// The three-step checkout form. Steps only advance after local validation;
/// nothing here touches the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    step: CheckoutStep,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
}

impl Default for Checkout {
    fn default() -> Self {
        Checkout {
            step: CheckoutStep::OrderDetails,
            customer: CustomerInfo::default(),
            payment_method: PaymentMethod::default(),
        }
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl Checkout {
    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn validate_step(&self, order_type: OrderType) -> Result<()> {
        match self.step {
            CheckoutStep::OrderDetails | CheckoutStep::Payment => Ok(()),
            CheckoutStep::CustomerInfo => self.validate_customer(order_type),
        }
    }

    fn validate_customer(&self, order_type: OrderType) -> Result<()> {
        if blank(&self.customer.name) {
            return Err(StorefrontError::Validation("Please enter your name".to_string()));
        }
        if blank(&self.customer.phone) {
            return Err(StorefrontError::Validation("Please enter your phone number".to_string()));
        }
        if order_type == OrderType::Delivery && self.customer.address.as_deref().map_or(true, blank) {
            return Err(StorefrontError::Validation(
                "Please enter your delivery address".to_string(),
            ));
        }
        Ok(())
    }

    pub fn next(&mut self, order_type: OrderType) -> Result<CheckoutStep> {
        self.validate_step(order_type)?;
        self.step = self.step.next();
        Ok(self.step)
    }

    pub fn back(&mut self) -> CheckoutStep {
        self.step = self.step.previous();
        self.step
    }

    pub fn reset(&mut self) {
        self.step = CheckoutStep::OrderDetails;
    }

    /// Order body for the current cart. Customer info is re-checked because a
    /// restored session may skip the form.
    pub fn build_order(&self, cart: &Cart, language: &str) -> Result<CreateOrder> {
        let branch_id = cart
            .branch_id()
            .ok_or_else(|| StorefrontError::Validation("Please select a branch".to_string()))?;
        if cart.is_empty() {
            return Err(StorefrontError::Validation("Your cart is empty".to_string()));
        }
        self.validate_customer(cart.order_type)?;

        let address = match cart.order_type {
            OrderType::Delivery => self.customer.address.as_ref().map(|a| a.trim().to_string()),
            _ => None,
        };

        Ok(CreateOrder {
            branch_id: Some(branch_id),
            order_type: Some(cart.order_type.as_str().to_string()),
            items: Some(cart.order_items()),
            table_id: cart.selected_table.as_ref().map(|t| t.id),
            customer_name: Some(self.customer.name.trim().to_string()),
            customer_phone: Some(self.customer.phone.trim().to_string()),
            customer_address: address,
            language: Some(language.to_string()),
            promo_code: cart.promo.as_ref().map(|p| p.code.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::cart::{CartBranch, NewCartItem};

    fn filled_cart(order_type: OrderType) -> Cart {
        let mut cart = Cart::default();
        cart.set_branch(CartBranch {
            id: 1,
            name: "Gulshan".to_string(),
            settings: Default::default(),
        });
        cart.order_type = order_type;
        cart.add_item(NewCartItem {
            branch_menu_item_id: 3,
            name: "Tea".to_string(),
            price: 50.0,
            quantity: 2,
            customizations: Vec::new(),
        });
        cart
    }

    #[test]
    fn step_one_always_advances() {
        let mut checkout = Checkout::default();
        assert_eq!(checkout.next(OrderType::Takeaway).unwrap(), CheckoutStep::CustomerInfo);
        assert_eq!(checkout.step().number(), 2);
    }

    #[test]
    fn customer_step_requires_name_and_phone() {
        let mut checkout = Checkout::default();
        checkout.next(OrderType::Takeaway).unwrap();

        let err = checkout.next(OrderType::Takeaway).unwrap_err();
        assert_eq!(err.to_string(), "Please enter your name");

        checkout.customer.name = "Rahim".to_string();
        checkout.customer.phone = "   ".to_string();
        let err = checkout.next(OrderType::Takeaway).unwrap_err();
        assert_eq!(err.to_string(), "Please enter your phone number");
        assert_eq!(checkout.step(), CheckoutStep::CustomerInfo);

        checkout.customer.phone = "01700000000".to_string();
        assert_eq!(checkout.next(OrderType::Takeaway).unwrap(), CheckoutStep::Payment);
    }

    #[test]
    fn delivery_requires_address() {
        let mut checkout = Checkout::default();
        checkout.next(OrderType::Delivery).unwrap();
        checkout.customer.name = "Rahim".to_string();
        checkout.customer.phone = "01700000000".to_string();

        let err = checkout.next(OrderType::Delivery).unwrap_err();
        assert_eq!(err.to_string(), "Please enter your delivery address");

        checkout.customer.address = Some("House 1, Road 2".to_string());
        assert!(checkout.next(OrderType::Delivery).is_ok());
    }

    #[test]
    fn back_stops_at_first_step() {
        let mut checkout = Checkout::default();
        assert_eq!(checkout.back(), CheckoutStep::OrderDetails);
    }

    #[test]
    fn order_body_drops_address_unless_delivery() {
        let mut checkout = Checkout::default();
        checkout.customer = CustomerInfo {
            name: " Rahim ".to_string(),
            phone: "01700000000".to_string(),
            address: Some("House 1".to_string()),
        };

        let order = checkout.build_order(&filled_cart(OrderType::Takeaway), "bn").unwrap();
        assert_eq!(order.branch_id, Some(1));
        assert_eq!(order.order_type.as_deref(), Some("takeaway"));
        assert_eq!(order.customer_name.as_deref(), Some("Rahim"));
        assert_eq!(order.customer_address, None);
        assert_eq!(order.language.as_deref(), Some("bn"));
        assert_eq!(order.items.as_ref().map(Vec::len), Some(1));

        let order = checkout.build_order(&filled_cart(OrderType::Delivery), "en").unwrap();
        assert_eq!(order.customer_address.as_deref(), Some("House 1"));
    }

    #[test]
    fn empty_cart_cannot_be_ordered() {
        let mut cart = filled_cart(OrderType::DineIn);
        cart.clear();
        let checkout = Checkout::default();
        assert!(matches!(
            checkout.build_order(&cart, "en"),
            Err(StorefrontError::Validation(_))
        ));
    }
}
