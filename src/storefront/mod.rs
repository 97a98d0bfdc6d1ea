//! Customer-facing ordering flow.
//!
//! The browser app keeps its cart, favorites and order history in durable
//! key/value storage and talks to the HTTP API for everything else. This
//! module is that controller as a library: explicit state owned by a
//! [`Storefront`], with the API client and the storage injected.

pub mod cart;
pub mod checkout;
pub mod client;
pub mod controller;
pub mod history;
pub mod storage;

pub use cart::{AppliedPromo, Cart, CartBranch, CartLine, NewCartItem};
pub use checkout::{Checkout, CheckoutStep, CustomerInfo, PaymentMethod};
pub use client::{HttpStorefrontApi, StorefrontApi};
pub use controller::{MenuTicket, Notification, NotificationLevel, Storefront, View};
pub use history::{Favorites, FavoriteItem, HistoryEntry, OrderHistory};
pub use storage::{FileStorage, MemoryStorage, Storage};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an `{"error": ...}` body.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// A local check failed before anything was sent.
    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
