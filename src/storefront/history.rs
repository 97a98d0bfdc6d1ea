use super::cart::CartLine;
use super::checkout::CustomerInfo;
use crate::models::OrderType;
use serde::{Deserialize, Serialize};

pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub order_id: String,
    pub status: String,
    pub estimated_completion_time: String,
    pub language: String,
    pub branch_id: i64,
    pub branch_name: String,
    pub order_type: OrderType,
    pub items: Vec<CartLine>,
    pub customer: CustomerInfo,
    pub total: f64,
    pub placed_at: String,
}

/// Placed orders, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OrderHistory {
    entries: Vec<HistoryEntry>,
}

impl OrderHistory {
    pub fn add(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
    }

    pub fn find(&self, order_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.order_id == order_id)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteItem {
    pub branch_menu_item_id: i64,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub branch_id: Option<i64>,
    #[serde(default)]
    pub branch_name: Option<String>,
    pub added_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Favorites {
    items: Vec<FavoriteItem>,
}

impl Favorites {
    pub fn contains(&self, branch_menu_item_id: i64) -> bool {
        self.items.iter().any(|f| f.branch_menu_item_id == branch_menu_item_id)
    }

    /// Removes the item if present, otherwise adds it. Returns whether the
    /// item is a favorite afterwards.
    pub fn toggle(&mut self, item: FavoriteItem) -> bool {
        let before = self.items.len();
        self.items.retain(|f| f.branch_menu_item_id != item.branch_menu_item_id);
        if self.items.len() != before {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn items(&self) -> &[FavoriteItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            order_id: format!("ORD{}", n),
            status: "placed".to_string(),
            estimated_completion_time: "2026-01-01 12:30:00".to_string(),
            language: "en".to_string(),
            branch_id: 1,
            branch_name: "Gulshan".to_string(),
            order_type: OrderType::Takeaway,
            items: Vec::new(),
            customer: CustomerInfo::default(),
            total: 100.0,
            placed_at: "2026-01-01T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn history_keeps_fifty_newest_first() {
        let mut history = OrderHistory::default();
        for n in 0..60 {
            history.add(entry(n));
        }

        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(history.entries()[0].order_id, "ORD59");
        assert_eq!(history.entries()[49].order_id, "ORD10");
        assert!(history.find("ORD9").is_none());
        assert!(history.find("ORD42").is_some());
    }

    #[test]
    fn favorites_toggle_by_item_id() {
        let mut favorites = Favorites::default();
        let tea = FavoriteItem {
            branch_menu_item_id: 4,
            name: "Tea".to_string(),
            price: 120.0,
            image_url: None,
            description: None,
            branch_id: Some(1),
            branch_name: None,
            added_at: "2026-01-01T12:00:00Z".to_string(),
        };

        assert!(favorites.toggle(tea.clone()));
        assert!(favorites.contains(4));
        assert!(!favorites.toggle(tea));
        assert!(favorites.is_empty());
    }
}
