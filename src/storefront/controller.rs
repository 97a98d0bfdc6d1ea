//! Storefront state machine.
//!
//! `Browsing → Customizing → CartReview → Checkout(1..3) → OrderPlaced`. Only
//! placing the order talks to the server; every other transition is checked
//! locally. Cart, favorites, order history, language and a pending promo code
//! live in [`Storage`] as whole JSON documents.

use super::cart::{AppliedPromo, Cart, CartBranch, NewCartItem};
use super::checkout::{Checkout, CheckoutStep, CustomerInfo, PaymentMethod};
use super::client::StorefrontApi;
use super::history::{FavoriteItem, Favorites, HistoryEntry, OrderHistory};
use super::storage::{
    Storage, CART_KEY, FAVORITES_KEY, LANGUAGE_KEY, ORDER_HISTORY_KEY, PENDING_PROMO_KEY,
};
use super::{Result, StorefrontError};
use crate::i18n::FALLBACK_LANGUAGE_CODE;
use crate::models::{
    Ack, BranchSettings, BranchSummary, CreateServiceRequest, Menu, MenuCategory, MenuItem,
    OrderStatus, OrderType, PlacedOrder, Ratings, RestaurantTable, SelectedCustomization,
    SelectionType, ServiceRequestAck, ServiceRequestType, SubmitFeedback,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Browsing,
    /// Item modal open for a branch menu item.
    Customizing(i64),
    CartReview,
    Checkout(CheckoutStep),
    /// Public uid of the order just placed.
    OrderPlaced(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient message for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Identifies one menu request. Only the most recently issued ticket may
/// replace the displayed menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTicket {
    pub sequence: u64,
    pub branch_id: i64,
    pub language: String,
}

pub struct Storefront<A, S> {
    api: A,
    storage: S,
    language: String,
    menu: Vec<MenuCategory>,
    menu_sequence: u64,
    cart: Cart,
    checkout: Checkout,
    view: View,
    notifications: Vec<Notification>,
}

impl<A: StorefrontApi, S: Storage> Storefront<A, S> {
    /// Restores the cart and language from storage.
    pub fn new(api: A, storage: S) -> Result<Self> {
        let cart: Cart = storage.load_or_default(CART_KEY)?;
        let language = storage
            .load_or_default::<Option<String>>(LANGUAGE_KEY)?
            .unwrap_or_else(|| FALLBACK_LANGUAGE_CODE.to_string());

        debug!(lines = cart.items.len(), %language, "Storefront restored");

        Ok(Storefront {
            api,
            storage,
            language,
            menu: Vec::new(),
            menu_sequence: 0,
            cart,
            checkout: Checkout::default(),
            view: View::Browsing,
            notifications: Vec::new(),
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn menu(&self) -> &[MenuCategory] {
        &self.menu
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }

    fn save_cart(&self) -> Result<()> {
        self.storage.save(CART_KEY, &self.cart)
    }

    // ===== Catalog =====

    /// Branch list for the landing page. A failure shows a notification and
    /// yields an empty list.
    pub async fn load_branches(&mut self) -> Vec<BranchSummary> {
        match self.api.branches().await {
            Ok(branches) => branches,
            Err(e) => {
                warn!(error = %e, "Failed to load branches");
                self.notify(NotificationLevel::Error, "Failed to load branches");
                Vec::new()
            }
        }
    }

    /// Makes `branch` current and loads its menu. Missing settings fall back
    /// to the defaults.
    pub async fn select_branch(&mut self, branch: &BranchSummary) -> Result<()> {
        let settings = self.branch_settings(branch.id).await;

        self.cart.set_branch(CartBranch {
            id: branch.id,
            name: branch.name.clone(),
            settings,
        });
        self.save_cart()?;
        self.view = View::Browsing;

        self.load_menu().await;
        Ok(())
    }

    async fn branch_settings(&self, branch_id: i64) -> BranchSettings {
        match self.api.settings(branch_id).await {
            Ok(response) => response.settings,
            Err(e) => {
                warn!(branch_id, error = %e, "Using default branch settings");
                BranchSettings::default()
            }
        }
    }

    pub async fn tables(&mut self) -> Vec<RestaurantTable> {
        let Some(branch_id) = self.cart.branch_id() else {
            return Vec::new();
        };
        match self.api.tables(branch_id).await {
            Ok(tables) => tables,
            Err(e) => {
                warn!(branch_id, error = %e, "Failed to load tables");
                self.notify(NotificationLevel::Error, "Failed to load tables");
                Vec::new()
            }
        }
    }

    /// Issues a ticket for a menu request, superseding any earlier one.
    pub fn begin_menu_load(&mut self) -> Option<MenuTicket> {
        let branch_id = self.cart.branch_id()?;
        self.menu_sequence += 1;
        Some(MenuTicket {
            sequence: self.menu_sequence,
            branch_id,
            language: self.language.clone(),
        })
    }

    /// Applies a menu response. Returns `false` when the ticket is stale and
    /// the response was dropped.
    pub fn finish_menu_load(&mut self, ticket: &MenuTicket, result: Result<Menu>) -> bool {
        if ticket.sequence != self.menu_sequence {
            debug!(
                ticket = ticket.sequence,
                latest = self.menu_sequence,
                "Dropping stale menu response"
            );
            return false;
        }

        match result {
            Ok(menu) => self.menu = menu.categories,
            Err(e) => {
                warn!(branch_id = ticket.branch_id, error = %e, "Failed to load menu");
                self.menu.clear();
                self.notify(NotificationLevel::Error, "Failed to load menu");
            }
        }
        true
    }

    pub async fn load_menu(&mut self) {
        let Some(ticket) = self.begin_menu_load() else {
            return;
        };
        let result = self.api.menu(ticket.branch_id, &ticket.language).await;
        self.finish_menu_load(&ticket, result);
    }

    /// Persists the language and reloads the current menu in it.
    pub async fn change_language(&mut self, code: &str) -> Result<()> {
        self.language = code.to_string();
        self.storage.save(LANGUAGE_KEY, &self.language)?;
        self.notify(
            NotificationLevel::Success,
            format!("Language changed to {}", code.to_uppercase()),
        );
        self.load_menu().await;
        Ok(())
    }

    pub fn find_item(&self, branch_menu_item_id: i64) -> Option<&MenuItem> {
        self.menu
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|item| item.branch_menu_item_id == branch_menu_item_id)
    }

    // ===== Cart =====

    pub fn open_item(&mut self, branch_menu_item_id: i64) -> Result<()> {
        if self.find_item(branch_menu_item_id).is_none() {
            return Err(StorefrontError::Validation("Item not found".to_string()));
        }
        self.view = View::Customizing(branch_menu_item_id);
        Ok(())
    }

    pub fn close_item(&mut self) {
        if matches!(self.view, View::Customizing(_)) {
            self.view = View::Browsing;
        }
    }

    /// Adds a menu item with the chosen options. A single-choice group
    /// accepts at most one option.
    pub fn add_to_cart(
        &mut self,
        branch_menu_item_id: i64,
        quantity: i64,
        customizations: Vec<SelectedCustomization>,
    ) -> Result<String> {
        let item = self
            .find_item(branch_menu_item_id)
            .ok_or_else(|| StorefrontError::Validation("Item not found".to_string()))?;

        if !item.is_available {
            return Err(StorefrontError::Validation(format!("{} is not available", item.name)));
        }

        for group in item.customizations.iter().filter(|g| g.selection_type == SelectionType::Single) {
            let chosen = customizations
                .iter()
                .filter(|c| c.group_id() == Some(group.id))
                .count();
            if chosen > 1 {
                return Err(StorefrontError::Validation(format!(
                    "Choose only one option for {}",
                    group.name
                )));
            }
        }

        let new_item = NewCartItem {
            branch_menu_item_id,
            name: item.name.clone(),
            price: item.price,
            quantity,
            customizations,
        };
        let name = new_item.name.clone();

        let line_id = self
            .cart
            .add_item(new_item)
            .ok_or_else(|| StorefrontError::Validation("Quantity must be at least 1".to_string()))?;
        self.save_cart()?;

        self.view = View::Browsing;
        self.notify(NotificationLevel::Success, format!("{} added to cart", name));
        Ok(line_id)
    }

    pub fn update_quantity(&mut self, line_id: &str, quantity: i64) -> Result<bool> {
        let changed = self.cart.update_quantity(line_id, quantity);
        if changed {
            self.save_cart()?;
        }
        Ok(changed)
    }

    pub fn remove_line(&mut self, line_id: &str) -> Result<bool> {
        let removed = self.cart.remove_item(line_id);
        if removed {
            self.save_cart()?;
        }
        Ok(removed)
    }

    pub fn review_cart(&mut self) {
        self.view = View::CartReview;
    }

    /// Remembers a code from the offers page until checkout.
    pub fn save_pending_promo(&mut self, code: &str) -> Result<()> {
        self.storage.save(PENDING_PROMO_KEY, &code)?;
        self.notify(
            NotificationLevel::Success,
            "Promo code saved! It will be applied at checkout.",
        );
        Ok(())
    }

    /// Validates `code` with the server and applies it when the cart meets
    /// the minimum order amount. Returns the discount.
    pub async fn apply_promo(&mut self, code: &str) -> Result<f64> {
        let code = code.trim();
        if code.is_empty() {
            return Err(StorefrontError::Validation("Please enter a promo code".to_string()));
        }

        let promo = AppliedPromo::from(self.api.validate_promo(code).await?);
        let subtotal = self.cart.subtotal();
        if subtotal < promo.min_order_amount {
            return Err(StorefrontError::Validation(format!(
                "Minimum order amount is {}{}",
                self.cart.currency_symbol(),
                promo.min_order_amount
            )));
        }

        self.cart.promo = Some(promo);
        self.save_cart()?;
        let discount = self.cart.discount_amount();
        self.notify(
            NotificationLevel::Success,
            format!("Promo code applied! You saved {}{:.2}", self.cart.currency_symbol(), discount),
        );
        Ok(discount)
    }

    // ===== Checkout =====

    /// Opens step 1.
    pub fn begin_checkout(&mut self) -> Result<()> {
        if self.cart.is_empty() {
            return Err(StorefrontError::Validation("Your cart is empty".to_string()));
        }

        self.checkout.reset();
        self.view = View::Checkout(self.checkout.step());
        Ok(())
    }

    /// A promo code saved from the landing page is tried once, when the
    /// order is sent, and then forgotten. An already applied promo wins.
    async fn apply_pending_promo(&mut self) -> Result<()> {
        let Some(code) = self.storage.load_or_default::<Option<String>>(PENDING_PROMO_KEY)? else {
            return Ok(());
        };
        self.storage.remove(PENDING_PROMO_KEY)?;
        if self.cart.promo.is_some() {
            return Ok(());
        }
        if let Err(e) = self.apply_promo(&code).await {
            debug!(%code, error = %e, "Pending promo not applied");
            self.notify(NotificationLevel::Warning, e.to_string());
        }
        Ok(())
    }

    pub fn set_order_type(&mut self, order_type: OrderType) -> Result<()> {
        self.cart.order_type = order_type;
        if order_type != OrderType::DineIn {
            self.cart.selected_table = None;
        }
        self.save_cart()
    }

    pub fn select_table(&mut self, table: RestaurantTable) -> Result<()> {
        self.notify(
            NotificationLevel::Success,
            format!("Table {} selected", table.table_identifier),
        );
        self.cart.selected_table = Some(table);
        self.save_cart()
    }

    pub fn set_customer(&mut self, customer: CustomerInfo) {
        self.checkout.customer = customer;
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.checkout.payment_method = method;
    }

    pub fn next_step(&mut self) -> Result<CheckoutStep> {
        match self.checkout.next(self.cart.order_type) {
            Ok(step) => {
                self.view = View::Checkout(step);
                Ok(step)
            }
            Err(e) => {
                self.notify(NotificationLevel::Warning, e.to_string());
                Err(e)
            }
        }
    }

    pub fn previous_step(&mut self) -> CheckoutStep {
        let step = self.checkout.back();
        self.view = View::Checkout(step);
        step
    }

    /// Sends the order from the payment step. On success the cart is cleared
    /// and the order is prepended to the stored history.
    ///
    /// Once the server has accepted the order nothing here fails: local
    /// storage errors are logged, so the order is never resubmitted.
    pub async fn place_order(&mut self) -> Result<PlacedOrder> {
        if self.view != View::Checkout(CheckoutStep::Payment) {
            return Err(StorefrontError::Validation(
                "Complete the checkout steps first".to_string(),
            ));
        }

        self.apply_pending_promo().await?;

        let order = self.checkout.build_order(&self.cart, &self.language)?;
        let placed = match self.api.place_order(&order).await {
            Ok(placed) => placed,
            Err(e) => {
                warn!(error = %e, "Order placement failed");
                let message = match &e {
                    StorefrontError::Server { message, .. } => message.clone(),
                    _ => "Failed to place order. Please try again.".to_string(),
                };
                self.notify(NotificationLevel::Error, message);
                return Err(e);
            }
        };

        let (branch_id, branch_name) = self
            .cart
            .branch
            .as_ref()
            .map(|b| (b.id, b.name.clone()))
            .unwrap_or_default();

        let entry = HistoryEntry {
            order_id: placed.order_id.clone(),
            status: placed.status.clone(),
            estimated_completion_time: placed.estimated_completion_time.clone(),
            language: placed.language.clone(),
            branch_id,
            branch_name,
            order_type: self.cart.order_type,
            items: self.cart.items.clone(),
            customer: self.checkout.customer.clone(),
            total: self.cart.total(),
            placed_at: chrono::Utc::now().to_rfc3339(),
        };

        self.cart.clear();
        if let Err(e) = self.save_cart() {
            warn!(order_id = %placed.order_id, error = %e, "Failed to save cleared cart");
        }
        if let Err(e) = self.record_history(entry) {
            warn!(order_id = %placed.order_id, error = %e, "Failed to record order history");
        }
        self.checkout = Checkout::default();
        self.view = View::OrderPlaced(placed.order_id.clone());

        info!(order_id = %placed.order_id, "Order placed");
        self.notify(NotificationLevel::Success, "Order placed successfully!");
        Ok(placed)
    }

    pub fn continue_browsing(&mut self) {
        self.view = View::Browsing;
    }

    // ===== History and favorites =====

    fn record_history(&self, entry: HistoryEntry) -> Result<()> {
        let mut history: OrderHistory = self.storage.load_or_default(ORDER_HISTORY_KEY)?;
        history.add(entry);
        self.storage.save(ORDER_HISTORY_KEY, &history)
    }

    pub fn order_history(&self) -> Result<OrderHistory> {
        self.storage.load_or_default(ORDER_HISTORY_KEY)
    }

    /// Refills the cart with the lines of a past order, in its branch and with
    /// its order type. Prices are re-read by the server when the order is
    /// placed. Returns the number of lines added.
    pub async fn reorder(&mut self, order_uid: &str) -> Result<usize> {
        let history = self.order_history()?;
        let Some(entry) = history.find(order_uid) else {
            self.notify(NotificationLevel::Error, "Order not found");
            return Err(StorefrontError::Validation("Order not found".to_string()));
        };

        self.cart.clear();

        let switching = self.cart.branch_id() != Some(entry.branch_id);
        if switching {
            let settings = self.branch_settings(entry.branch_id).await;
            self.cart.set_branch(CartBranch {
                id: entry.branch_id,
                name: entry.branch_name.clone(),
                settings,
            });
        }
        self.cart.order_type = entry.order_type;

        for line in &entry.items {
            self.cart.add_item(NewCartItem {
                branch_menu_item_id: line.branch_menu_item_id,
                name: line.name.clone(),
                price: line.price,
                quantity: line.quantity,
                customizations: line.customizations.clone(),
            });
        }
        self.save_cart()?;

        if switching {
            self.load_menu().await;
        }
        self.checkout = Checkout::default();
        self.view = View::CartReview;

        let added = entry.items.len();
        info!(order_id = %order_uid, lines = added, "Reordered");
        self.notify(NotificationLevel::Success, format!("{} items added to cart", added));
        Ok(added)
    }

    pub async fn track_order(&self, order_uid: &str) -> Result<OrderStatus> {
        self.api.order_status(order_uid).await
    }

    pub fn favorites(&self) -> Result<Favorites> {
        self.storage.load_or_default(FAVORITES_KEY)
    }

    /// Returns whether the item is a favorite afterwards.
    pub fn toggle_favorite(&mut self, branch_menu_item_id: i64) -> Result<bool> {
        let mut favorites: Favorites = self.storage.load_or_default(FAVORITES_KEY)?;

        let item = match self.find_item(branch_menu_item_id).cloned() {
            Some(item) => item,
            None if favorites.contains(branch_menu_item_id) => {
                // Not in the loaded menu, but removal only needs the id
                favorites.toggle(FavoriteItem {
                    branch_menu_item_id,
                    name: String::new(),
                    price: 0.0,
                    image_url: None,
                    description: None,
                    branch_id: None,
                    branch_name: None,
                    added_at: String::new(),
                });
                self.storage.save(FAVORITES_KEY, &favorites)?;
                self.notify(NotificationLevel::Info, "Removed from favorites");
                return Ok(false);
            }
            None => return Err(StorefrontError::Validation("Item not found".to_string())),
        };

        let favorite = FavoriteItem {
            branch_menu_item_id,
            name: item.name,
            price: item.price,
            image_url: item.image_url,
            description: item.description,
            branch_id: self.cart.branch_id(),
            branch_name: self.cart.branch.as_ref().map(|b| b.name.clone()),
            added_at: chrono::Utc::now().to_rfc3339(),
        };

        let now_favorite = favorites.toggle(favorite);
        self.storage.save(FAVORITES_KEY, &favorites)?;

        if now_favorite {
            self.notify(NotificationLevel::Success, "Added to favorites");
        } else {
            self.notify(NotificationLevel::Info, "Removed from favorites");
        }
        Ok(now_favorite)
    }

    // ===== Table service and feedback =====

    pub async fn request_service(&mut self, request_type: ServiceRequestType) -> Result<ServiceRequestAck> {
        let branch_id = self
            .cart
            .branch_id()
            .ok_or_else(|| StorefrontError::Validation("Please select a branch".to_string()))?;
        let table_id = self
            .cart
            .selected_table
            .as_ref()
            .map(|t| t.id)
            .ok_or_else(|| StorefrontError::Validation("Please select a table".to_string()))?;

        let ack = self
            .api
            .service_request(&CreateServiceRequest {
                branch_id: Some(branch_id),
                table_id: Some(table_id),
                request_type: Some(request_type.as_str().to_string()),
                language: Some(self.language.clone()),
            })
            .await?;

        self.notify(NotificationLevel::Info, ack.display_text.clone());
        Ok(ack)
    }

    pub async fn submit_feedback(&mut self, order_uid: &str, ratings: Ratings, comment: Option<String>) -> Result<Ack> {
        let ack = self
            .api
            .submit_feedback(&SubmitFeedback {
                order_id: Some(order_uid.to_string()),
                ratings: Some(ratings),
                item_feedback: None,
                comment,
            })
            .await?;
        self.notify(NotificationLevel::Success, "Thank you for your feedback!");
        Ok(ack)
    }
}
