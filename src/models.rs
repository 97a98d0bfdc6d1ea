use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ===== Reference data =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Language {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BranchSummary {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub status: String,
    pub phone: Option<String>,
    pub default_language: String,
    pub language_name: String,
}

/// Parsed `branches.settings` blob. Unknown keys are kept so the settings
/// endpoint can echo them back unchanged.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BranchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub const DEFAULT_VAT_PERCENTAGE: f64 = 15.0;
pub const DEFAULT_CURRENCY_SYMBOL: &str = "৳";

impl BranchSettings {
    /// Lenient parse: a missing or malformed blob yields the defaults.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
    }

    pub fn vat_percentage(&self) -> f64 {
        self.vat_percentage.unwrap_or(DEFAULT_VAT_PERCENTAGE)
    }

    pub fn currency_symbol(&self) -> &str {
        self.currency_symbol.as_deref().unwrap_or(DEFAULT_CURRENCY_SYMBOL)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BranchSettingsResponse {
    #[serde(flatten)]
    pub settings: BranchSettings,
    pub branch_id: i64,
    pub default_language: String,
    pub language_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RestaurantTable {
    pub id: i64,
    pub table_identifier: String,
    pub capacity: i64,
}

// ===== Menu =====

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    Single,
    Multiple,
}

impl FromStr for SelectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(SelectionType::Single),
            "multiple" => Ok(SelectionType::Multiple),
            other => Err(format!("unknown selection type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomizationOption {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomizationGroup {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub selection_type: SelectionType,
    pub options: Vec<CustomizationOption>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MenuItem {
    pub branch_menu_item_id: i64,
    pub price: f64,
    pub is_available: bool,
    pub master_item_id: i64,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub customizations: Vec<CustomizationGroup>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MenuCategory {
    pub id: i64,
    pub name: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Menu {
    pub categories: Vec<MenuCategory>,
    pub language: String,
}

// ===== Orders =====

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    #[serde(rename = "dine-in")]
    DineIn,
    #[serde(rename = "takeaway")]
    Takeaway,
    #[serde(rename = "delivery")]
    Delivery,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::DineIn => "dine-in",
            OrderType::Takeaway => "takeaway",
            OrderType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dine-in" => Ok(OrderType::DineIn),
            "takeaway" => Ok(OrderType::Takeaway),
            "delivery" => Ok(OrderType::Delivery),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

/// One selected customization exactly as the client sent it.
///
/// The object is kept whole and stored verbatim as the order item snapshot;
/// it is never re-validated against current options. Ids and prices are read
/// leniently since clients send them as numbers or numeric strings.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct SelectedCustomization(pub serde_json::Map<String, serde_json::Value>);

impl SelectedCustomization {
    pub fn new(group_id: i64, group_name: &str, option_id: i64, option_name: &str, additional_price: f64) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("group_id".into(), group_id.into());
        fields.insert("group_name".into(), group_name.into());
        fields.insert("option_id".into(), option_id.into());
        fields.insert("option_name".into(), option_name.into());
        fields.insert("additional_price".into(), additional_price.into());
        SelectedCustomization(fields)
    }

    pub fn group_id(&self) -> Option<i64> {
        self.0.get("group_id").and_then(loose_i64)
    }

    pub fn option_id(&self) -> Option<i64> {
        self.0.get("option_id").and_then(loose_i64)
    }

    pub fn option_name(&self) -> Option<&str> {
        self.0.get("option_name").and_then(|v| v.as_str())
    }

    /// Surcharge for this option, from `additional_price` or `price`; 0 when
    /// neither is a number.
    pub fn additional_price(&self) -> f64 {
        ["additional_price", "price"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(loose_f64))
            .unwrap_or(0.0)
    }
}

fn loose_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreateOrderItem {
    pub branch_menu_item_id: Option<i64>,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub customizations: Vec<SelectedCustomization>,
}

/// Body of `POST ?orders=1`. Required fields are optional here so that a
/// missing one is reported by name instead of as a parse failure.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CreateOrder {
    pub branch_id: Option<i64>,
    pub order_type: Option<String>,
    pub items: Option<Vec<CreateOrderItem>>,
    pub table_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub language: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: String,
    pub status: String,
    pub estimated_completion_time: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderStatus {
    pub order_id: String,
    pub status: String,
    pub order_type: String,
    pub estimated_completion_time: Option<String>,
    pub language: String,
}

// ===== Promo codes =====

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromoType {
    Percentage,
    Fixed,
}

impl FromStr for PromoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(PromoType::Percentage),
            "fixed" => Ok(PromoType::Fixed),
            other => Err(format!("unknown promo type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    #[serde(rename = "type")]
    pub promo_type: PromoType,
    pub value: f64,
    pub min_order_amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromoListing {
    pub id: i64,
    pub title: String,
    pub discount: String,
    pub description: String,
    pub code: String,
    pub min_order_amount: f64,
    pub expires_at: String,
    #[serde(rename = "type")]
    pub promo_type: PromoType,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromoList {
    pub success: bool,
    pub promocodes: Vec<PromoListing>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ValidatePromo {
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromoValidation {
    pub success: bool,
    pub code: String,
    #[serde(rename = "type")]
    pub promo_type: PromoType,
    pub discount: f64,
    pub min_order_amount: f64,
}

// ===== Feedback and service requests =====

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Ratings {
    pub overall: Option<i64>,
    pub food: Option<i64>,
    pub service: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SubmitFeedback {
    /// Public order uid.
    pub order_id: Option<String>,
    pub ratings: Option<Ratings>,
    pub item_feedback: Option<serde_json::Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRequestType {
    Assistance,
    Water,
    Bill,
}

impl ServiceRequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceRequestType::Assistance => "assistance",
            ServiceRequestType::Water => "water",
            ServiceRequestType::Bill => "bill",
        }
    }
}

impl FromStr for ServiceRequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assistance" => Ok(ServiceRequestType::Assistance),
            "water" => Ok(ServiceRequestType::Water),
            "bill" => Ok(ServiceRequestType::Bill),
            other => Err(format!("unknown request type: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CreateServiceRequest {
    pub branch_id: Option<i64>,
    pub table_id: Option<i64>,
    pub request_type: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceRequestAck {
    pub success: bool,
    pub request_type: String,
    pub display_text: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ack {
    pub success: bool,
}
