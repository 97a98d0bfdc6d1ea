//! Integration tests for database operations and the HTTP surface.
//! These tests run against a real SQLite file in a temporary directory.

#[cfg(test)]
mod tests {
    use crate::api::{parse_body, router, AppState};
    use crate::commands::orders::{estimated_completion_time, TIMESTAMP_FORMAT};
    use crate::commands::{branches, feedback, menu, orders, promo, service};
    use crate::db::Database;
    use crate::error::ApiError;
    use crate::models::{
        CreateOrder, CreateOrderItem, CreateServiceRequest, PlacedOrder, PromoType, Ratings,
        SelectionType, SubmitFeedback,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use rusqlite::Connection;
    use std::collections::HashSet;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Create a test database with schema. The directory must outlive the handle.
    fn setup_test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::new(dir.path().join("lunadine-test.db"));
        db.initialize().expect("Failed to create schema");
        (dir, db)
    }

    /// Seed test data
    fn seed_test_data(conn: &Connection) {
        conn.execute_batch(
            "
            INSERT INTO languages (id, code, name, is_active) VALUES
                (1, 'en', 'English', 1),
                (2, 'bn', 'Bangla', 1),
                (3, 'fr', 'French', 0);

            INSERT INTO branches (id, name, address, phone, status, default_language_id, settings) VALUES
                (1, 'Test Branch', 'Road 1', '0100', 'open', 1,
                 '{\"vat_percentage\": 15, \"currency_symbol\": \"৳\", \"theme\": \"dark\"}'),
                (2, 'Second Branch', NULL, NULL, 'closed', 2, '{}');

            INSERT INTO menu_categories (id, branch_id, display_order) VALUES
                (1, 1, 1), (2, 1, 2), (3, 2, 1);

            INSERT INTO menu_category_translations (category_id, language_id, name) VALUES
                (1, 1, 'Mains'), (1, 2, 'প্রধান'),
                (2, 1, 'Desserts');

            INSERT INTO master_menu_items (id, image_url, tags) VALUES
                (1, 'burger.jpg', '[\"spicy\", 3]'),
                (2, NULL, 'not json'),
                (3, NULL, NULL),
                (4, NULL, NULL);

            INSERT INTO menu_item_translations (item_id, language_id, name, description) VALUES
                (1, 1, 'Burger', 'Beef patty'),
                (1, 2, 'বার্গার', NULL),
                (2, 1, 'Apple Pie', NULL),
                (3, 1, 'Zinger', NULL);

            INSERT INTO branch_menu_items (id, branch_id, master_item_id, category_id, price, is_available) VALUES
                (1, 1, 1, 1, 200, 1),
                (2, 1, 2, 1, 150, 1),
                (3, 2, 3, 3, 500, 1),
                (4, 1, 4, 1, 90, 0);

            INSERT INTO customization_groups (id, master_item_id, selection_type) VALUES
                (1, 1, 'single'),
                (2, 1, 'multiple');

            INSERT INTO customization_group_translations (group_id, language_id, name) VALUES
                (1, 1, 'Size');

            INSERT INTO customization_options (id, group_id, additional_price) VALUES
                (1, 1, 0), (2, 1, 50);

            INSERT INTO customization_option_translations (option_id, language_id, name) VALUES
                (1, 1, 'Regular');

            INSERT INTO restaurant_tables (id, branch_id, table_identifier, capacity) VALUES
                (1, 1, 'T1', 4),
                (2, 2, 'A1', 2);

            INSERT INTO promo_codes (code, type, value, min_order_amount, is_active) VALUES
                ('WELCOME10', 'percentage', 10, 300, 1),
                ('FLAT5', 'fixed', 50, 500, 1),
                ('BIG', 'fixed', 1000, 0, 1),
                ('OLD', 'percentage', 50, 0, 0);

            INSERT INTO service_request_translations (request_type, language_id, display_text) VALUES
                ('water', 1, 'Water is on the way');
            ",
        )
        .expect("Failed to seed test data");
    }

    fn seeded() -> (TempDir, Database, Connection) {
        let (dir, db) = setup_test_db();
        let conn = db.open().expect("Failed to open connection");
        seed_test_data(&conn);
        (dir, db, conn)
    }

    fn order_request(branch_id: i64, items: &[(i64, i64)], promo_code: Option<&str>) -> CreateOrder {
        CreateOrder {
            branch_id: Some(branch_id),
            order_type: Some("takeaway".to_string()),
            items: Some(
                items
                    .iter()
                    .map(|&(id, quantity)| CreateOrderItem {
                        branch_menu_item_id: Some(id),
                        quantity: Some(quantity),
                        customizations: Vec::new(),
                    })
                    .collect(),
            ),
            promo_code: promo_code.map(str::to_string),
            ..Default::default()
        }
    }

    fn place(conn: &mut Connection, items: &[(i64, i64)], promo_code: Option<&str>) -> Result<PlacedOrder, ApiError> {
        orders::place_order(conn, order_request(1, items, promo_code))
    }

    /// (subtotal, vat, discount, total, promo_code_id)
    fn order_totals(conn: &Connection, uid: &str) -> (f64, f64, f64, f64, Option<i64>) {
        conn.query_row(
            "SELECT subtotal, vat_amount, discount_amount, total_amount, promo_code_id
             FROM orders WHERE order_uid = ?1",
            [uid],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .expect("Order row missing")
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .expect("Failed to count rows")
    }

    // ===== SCHEMA TESTS =====

    #[test]
    fn test_initialize_is_idempotent() {
        let (_dir, db) = setup_test_db();
        db.initialize().expect("Second initialize failed");

        let conn = db.open().unwrap();
        assert_eq!(count(&conn, "orders"), 0);
    }

    #[test]
    fn test_migration_adds_late_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "
                CREATE TABLE orders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_uid TEXT NOT NULL UNIQUE,
                    branch_id INTEGER NOT NULL,
                    table_id INTEGER,
                    order_type TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'placed',
                    customer_name TEXT,
                    customer_phone TEXT,
                    customer_address TEXT,
                    language_id INTEGER NOT NULL DEFAULT 1,
                    subtotal REAL NOT NULL,
                    vat_amount REAL NOT NULL,
                    discount_amount REAL NOT NULL DEFAULT 0,
                    total_amount REAL NOT NULL
                );
                CREATE TABLE order_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_id INTEGER NOT NULL,
                    branch_menu_item_id INTEGER NOT NULL,
                    quantity INTEGER NOT NULL,
                    unit_price REAL NOT NULL
                );
                ",
            )
            .unwrap();
        }

        let db = Database::new(&path);
        db.initialize().expect("Migration failed");

        let conn = db.open().unwrap();
        let columns = |table: &str| -> Vec<String> {
            conn.prepare(&format!("PRAGMA table_info({})", table))
                .unwrap()
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        };

        assert!(columns("orders").contains(&"promo_code_id".to_string()));
        assert!(columns("orders").contains(&"estimated_completion_time".to_string()));
        assert!(columns("order_items").contains(&"customizations".to_string()));
    }

    #[test]
    fn test_demo_seed_runs_once() {
        let (_dir, db) = setup_test_db();
        assert!(db.seed_demo_data().unwrap());
        assert!(!db.seed_demo_data().unwrap());

        let conn = db.open().unwrap();
        let demo = menu::get_menu(&conn, 1, None).unwrap();
        assert_eq!(demo.categories.len(), 3);
        assert!(demo.categories.iter().all(|c| !c.items.is_empty()));

        let promos = promo::list_promos(&conn).unwrap();
        assert_eq!(promos.promocodes.len(), 3);
    }

    // ===== BRANCH TESTS =====

    #[test]
    fn test_list_branches_with_default_language() {
        let (_dir, _db, conn) = seeded();
        let list = branches::list_branches(&conn).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Test Branch");
        assert_eq!(list[0].default_language, "en");
        assert_eq!(list[1].default_language, "bn");
        assert_eq!(list[1].language_name, "Bangla");
        assert_eq!(list[1].status, "closed");
    }

    #[test]
    fn test_settings_merge_branch_fields() {
        let (_dir, _db, conn) = seeded();
        let settings = branches::get_settings(&conn, 1).unwrap();
        let json = serde_json::to_value(&settings).unwrap();

        assert_eq!(json["vat_percentage"], 15.0);
        assert_eq!(json["currency_symbol"], "৳");
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["branch_id"], 1);
        assert_eq!(json["default_language"], "en");
        assert_eq!(json["language_name"], "English");

        let empty = branches::get_settings(&conn, 2).unwrap();
        assert_eq!(empty.settings.vat_percentage(), 15.0);
        assert_eq!(empty.settings.currency_symbol(), "৳");
    }

    #[test]
    fn test_settings_unknown_branch() {
        let (_dir, _db, conn) = seeded();
        assert!(matches!(branches::get_settings(&conn, 99), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_languages_active_only_by_name() {
        let (_dir, _db, conn) = seeded();
        let codes: Vec<String> = branches::list_languages(&conn)
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes, vec!["bn", "en"]);
    }

    #[test]
    fn test_tables_per_branch() {
        let (_dir, _db, conn) = seeded();
        let tables = branches::list_tables(&conn, 1).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].table_identifier, "T1");
        assert!(branches::list_tables(&conn, 99).unwrap().is_empty());
    }

    // ===== MENU TESTS =====

    #[test]
    fn test_menu_keeps_empty_category() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 1, Some("en")).unwrap();

        assert_eq!(menu.language, "en");
        assert_eq!(menu.categories.len(), 2);
        assert_eq!(menu.categories[0].name, "Mains");
        assert_eq!(menu.categories[0].items.len(), 3);
        assert_eq!(menu.categories[1].name, "Desserts");
        assert!(menu.categories[1].items.is_empty());

        let json = serde_json::to_value(&menu).unwrap();
        assert_eq!(json["categories"][1]["items"], serde_json::json!([]));
    }

    #[test]
    fn test_menu_items_sorted_by_name_with_generic_fallback() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 1, Some("en")).unwrap();
        let names: Vec<&str> = menu.categories[0].items.iter().map(|i| i.name.as_str()).collect();

        assert_eq!(names, vec!["Apple Pie", "Burger", "Menu item"]);
        assert!(!menu.categories[0].items[2].is_available);
        assert_eq!(menu.categories[0].items[2].description, None);
    }

    #[test]
    fn test_menu_falls_back_to_default_language() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 1, Some("bn")).unwrap();

        assert_eq!(menu.language, "bn");
        assert_eq!(menu.categories[0].name, "প্রধান");
        assert_eq!(menu.categories[1].name, "Desserts");

        let burger = menu.categories[0]
            .items
            .iter()
            .find(|i| i.branch_menu_item_id == 1)
            .unwrap();
        assert_eq!(burger.name, "বার্গার");
        // No bn description, so the English one is used
        assert_eq!(burger.description.as_deref(), Some("Beef patty"));

        let pie = menu.categories[0]
            .items
            .iter()
            .find(|i| i.branch_menu_item_id == 2)
            .unwrap();
        assert_eq!(pie.name, "Apple Pie");
    }

    #[test]
    fn test_menu_unknown_language_uses_fallback_rows() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 1, Some("xx")).unwrap();

        assert_eq!(menu.language, "xx");
        assert_eq!(menu.categories[0].name, "Mains");
    }

    #[test]
    fn test_menu_uses_branch_default_language() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 2, None).unwrap();

        assert_eq!(menu.language, "bn");
        assert_eq!(menu.categories.len(), 1);
        assert_eq!(menu.categories[0].name, "Menu");
        assert_eq!(menu.categories[0].items[0].name, "Zinger");
    }

    #[test]
    fn test_menu_missing_branch_is_empty() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 99, None).unwrap();

        assert!(menu.categories.is_empty());
        assert_eq!(menu.language, "en");
    }

    #[test]
    fn test_menu_tags_and_customizations() {
        let (_dir, _db, conn) = seeded();
        let menu = menu::get_menu(&conn, 1, None).unwrap();
        let items = &menu.categories[0].items;

        let burger = items.iter().find(|i| i.branch_menu_item_id == 1).unwrap();
        assert_eq!(burger.tags, vec!["spicy"]);
        assert_eq!(burger.image_url.as_deref(), Some("burger.jpg"));
        assert_eq!(burger.customizations.len(), 2);

        let size = &burger.customizations[0];
        assert_eq!(size.name, "Size");
        assert_eq!(size.selection_type, SelectionType::Single);
        assert_eq!(size.options.len(), 2);
        assert_eq!(size.options[0].name, "Regular");
        assert_eq!(size.options[1].name, "Option");
        assert_eq!(size.options[1].price, 50.0);

        let extras = &burger.customizations[1];
        assert_eq!(extras.name, "Options");
        assert_eq!(extras.selection_type, SelectionType::Multiple);
        assert!(extras.options.is_empty());

        let pie = items.iter().find(|i| i.branch_menu_item_id == 2).unwrap();
        assert!(pie.tags.is_empty());
        assert!(pie.customizations.is_empty());
    }

    // ===== ORDER TESTS =====

    #[test]
    fn test_order_totals_without_promo() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 2)], None).unwrap();

        assert!(placed.order_id.starts_with("ORD"));
        assert_eq!(placed.status, "placed");
        assert_eq!(placed.language, "en");
        assert_eq!(order_totals(&conn, &placed.order_id), (400.0, 60.0, 0.0, 460.0, None));
        assert_eq!(count(&conn, "order_items"), 1);
    }

    #[test]
    fn test_order_with_percentage_promo() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 2)], Some("WELCOME10")).unwrap();

        let (subtotal, vat, discount, total, promo_id) = order_totals(&conn, &placed.order_id);
        assert_eq!((subtotal, vat, discount, total), (400.0, 60.0, 40.0, 420.0));
        assert_eq!(promo_id, Some(1));
    }

    #[test]
    fn test_order_promo_below_minimum_is_ignored() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(2, 1)], Some("FLAT5")).unwrap();

        assert_eq!(order_totals(&conn, &placed.order_id), (150.0, 22.5, 0.0, 172.5, None));
    }

    #[test]
    fn test_order_inactive_or_unknown_promo_is_ignored() {
        let (_dir, _db, mut conn) = seeded();
        let inactive = place(&mut conn, &[(1, 1)], Some("OLD")).unwrap();
        let unknown = place(&mut conn, &[(1, 1)], Some("NOPE")).unwrap();

        assert_eq!(order_totals(&conn, &inactive.order_id).2, 0.0);
        assert_eq!(order_totals(&conn, &unknown.order_id).2, 0.0);
    }

    #[test]
    fn test_order_discount_never_exceeds_subtotal() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 1)], Some("BIG")).unwrap();

        let (subtotal, vat, discount, total, _) = order_totals(&conn, &placed.order_id);
        assert_eq!(discount, subtotal);
        assert_eq!(total, vat);
    }

    #[test]
    fn test_order_with_invalid_item_writes_nothing() {
        let (_dir, _db, mut conn) = seeded();

        let err = place(&mut conn, &[(1, 1), (999, 1)], None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid menu item: 999");

        // Item 3 belongs to the second branch
        assert!(place(&mut conn, &[(3, 1)], None).is_err());

        assert_eq!(count(&conn, "orders"), 0);
        assert_eq!(count(&conn, "order_items"), 0);
    }

    #[test]
    fn test_order_unit_price_snapshot() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 3)], None).unwrap();

        conn.execute("UPDATE branch_menu_items SET price = 999 WHERE id = 1", []).unwrap();

        let unit_price: f64 = conn
            .query_row("SELECT unit_price FROM order_items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(unit_price, 200.0);
        assert_eq!(order_totals(&conn, &placed.order_id).0, 600.0);
    }

    #[test]
    fn test_order_customizations_snapshot_not_priced() {
        let (_dir, _db, mut conn) = seeded();
        let submitted = serde_json::json!([
            {"group_id": "1", "option_id": 2, "option_name": "Large", "group_name": "Size", "additional_price": 50},
            {"group_id": 2, "option_id": 4, "option_name": "Garlic Mayo", "group_name": "Extra Dips", "price": 30, "name": "Garlic Mayo"}
        ]);
        let body = serde_json::json!({
            "branch_id": 1,
            "order_type": "takeaway",
            "items": [{ "branch_menu_item_id": 1, "quantity": 1, "customizations": submitted }]
        });
        let request: CreateOrder = parse_body(body.to_string().as_bytes()).unwrap();

        let placed = orders::place_order(&mut conn, request).unwrap();
        assert_eq!(order_totals(&conn, &placed.order_id).0, 200.0);

        let raw: String = conn
            .query_row("SELECT customizations FROM order_items", [], |row| row.get(0))
            .unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, submitted);
        assert!(stored[0].get("additional_price").is_some());
        assert!(stored[1].get("additional_price").is_none());
    }

    #[test]
    fn test_order_item_failure_rolls_back_header() {
        let (_dir, _db, mut conn) = seeded();
        conn.execute_batch(
            "CREATE TEMP TRIGGER reject_seven BEFORE INSERT ON order_items
             WHEN NEW.quantity = 7
             BEGIN SELECT RAISE(ABORT, 'rejected line'); END;",
        )
        .unwrap();

        let err = place(&mut conn, &[(1, 1), (2, 7)], None).unwrap_err();
        assert!(matches!(err, ApiError::Database(_)), "unexpected error: {:?}", err);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(count(&conn, "orders"), 0);
        assert_eq!(count(&conn, "order_items"), 0);

        // The connection is still usable after the rollback
        assert!(place(&mut conn, &[(1, 1)], None).is_ok());
        assert_eq!(count(&conn, "orders"), 1);
    }

    #[test]
    fn test_order_status_after_placement() {
        let (_dir, _db, mut conn) = seeded();

        let before = estimated_completion_time();
        let placed = place(&mut conn, &[(1, 1)], None).unwrap();
        let after = estimated_completion_time();

        let status = orders::get_order_status(&conn, &placed.order_id).unwrap();
        assert_eq!(status.order_id, placed.order_id);
        assert_eq!(status.status, "placed");
        assert_eq!(status.order_type, "takeaway");
        assert_eq!(status.language, "en");

        let eta = status.estimated_completion_time.unwrap();
        assert!(before <= eta && eta <= after, "{} not within [{}, {}]", eta, before, after);

        let parsed = chrono::NaiveDateTime::parse_from_str(&eta, TIMESTAMP_FORMAT).unwrap();
        let expected = chrono::Local::now().naive_local() + chrono::Duration::minutes(30);
        assert!((expected - parsed).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_order_status_unknown_uid() {
        let (_dir, _db, conn) = seeded();
        let err = orders::get_order_status(&conn, "ORDNOPE").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.to_string(), "Order not found");
    }

    #[test]
    fn test_order_language_and_table() {
        let (_dir, _db, mut conn) = seeded();

        let mut request = order_request(1, &[(1, 1)], None);
        request.order_type = Some("dine-in".to_string());
        request.table_id = Some(1);
        request.language = Some("bn".to_string());
        let placed = orders::place_order(&mut conn, request).unwrap();
        assert_eq!(placed.language, "bn");
        assert_eq!(orders::get_order_status(&conn, &placed.order_id).unwrap().language, "bn");

        let mut request = order_request(1, &[(1, 1)], None);
        request.table_id = Some(2);
        let err = orders::place_order(&mut conn, request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid table for this branch");
    }

    #[test]
    fn test_order_unknown_branch() {
        let (_dir, _db, mut conn) = seeded();
        let err = orders::place_order(&mut conn, order_request(99, &[(1, 1)], None)).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_rapid_orders_get_distinct_uids() {
        let (_dir, _db, mut conn) = seeded();
        let uids: HashSet<String> = (0..200)
            .map(|_| place(&mut conn, &[(2, 1)], None).unwrap().order_id)
            .collect();

        assert_eq!(uids.len(), 200);
        assert_eq!(count(&conn, "orders"), 200);
    }

    // ===== PROMO TESTS =====

    #[test]
    fn test_promo_listing() {
        let (_dir, _db, conn) = seeded();
        let list = promo::list_promos(&conn).unwrap();

        assert!(list.success);
        let codes: Vec<&str> = list.promocodes.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["BIG", "FLAT5", "WELCOME10"]);

        let flat = &list.promocodes[1];
        assert_eq!(flat.title, "Flat Discount");
        assert_eq!(flat.discount, "৳50 OFF");
        assert_eq!(flat.expires_at, "2025-12-31");

        let welcome = &list.promocodes[2];
        assert_eq!(welcome.title, "Welcome Offer");
        assert_eq!(welcome.discount, "10% OFF");
        assert_eq!(list.promocodes[0].title, "Special Offer");
    }

    #[test]
    fn test_promo_validation() {
        let (_dir, _db, conn) = seeded();

        let ok = promo::validate_promo(&conn, Some("WELCOME10")).unwrap();
        assert_eq!(ok.promo_type, PromoType::Percentage);
        assert_eq!(ok.discount, 10.0);
        assert_eq!(ok.min_order_amount, 300.0);

        let err = promo::validate_promo(&conn, Some("OLD")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired promo code");
        assert!(matches!(promo::validate_promo(&conn, Some("welcome10")), Err(ApiError::NotFound(_))));

        let err = promo::validate_promo(&conn, None).unwrap_err();
        assert_eq!(err.to_string(), "Promo code is required");
    }

    // ===== FEEDBACK TESTS =====

    fn ratings(overall: Option<i64>) -> Ratings {
        Ratings {
            overall,
            food: Some(4),
            service: None,
        }
    }

    #[test]
    fn test_feedback_recorded_for_order() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 1)], None).unwrap();

        let ack = feedback::submit_feedback(
            &conn,
            SubmitFeedback {
                order_id: Some(placed.order_id),
                ratings: Some(ratings(Some(5))),
                item_feedback: None,
                comment: Some("Great".to_string()),
            },
        )
        .unwrap();
        assert!(ack.success);

        let (overall, items): (i64, String) = conn
            .query_row("SELECT overall_rating, item_feedback FROM feedback", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(overall, 5);
        assert_eq!(items, "[]");
    }

    #[test]
    fn test_feedback_validation() {
        let (_dir, _db, mut conn) = seeded();
        let placed = place(&mut conn, &[(1, 1)], None).unwrap();

        let submit = |order_id: Option<&str>, r: Option<Ratings>| {
            feedback::submit_feedback(
                &conn,
                SubmitFeedback {
                    order_id: order_id.map(str::to_string),
                    ratings: r,
                    ..Default::default()
                },
            )
        };

        let err = submit(Some(&placed.order_id), Some(ratings(Some(6)))).unwrap_err();
        assert_eq!(err.to_string(), "Overall rating is required and must be between 1 and 5");
        assert!(submit(Some(&placed.order_id), Some(ratings(None))).is_err());

        let err = submit(Some(&placed.order_id), None).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: ratings");

        let err = submit(Some("ORDNOPE"), Some(ratings(Some(3)))).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        assert_eq!(count(&conn, "feedback"), 0);
    }

    // ===== SERVICE REQUEST TESTS =====

    fn service_request(table_id: i64, request_type: &str, language: Option<&str>) -> CreateServiceRequest {
        CreateServiceRequest {
            branch_id: Some(1),
            table_id: Some(table_id),
            request_type: Some(request_type.to_string()),
            language: language.map(str::to_string),
        }
    }

    #[test]
    fn test_service_request_display_text() {
        let (_dir, _db, conn) = seeded();

        let ack = service::create_service_request(&conn, service_request(1, "water", None)).unwrap();
        assert_eq!(ack.display_text, "Water is on the way");
        assert_eq!(ack.language, "en");

        let ack = service::create_service_request(&conn, service_request(1, "bill", Some("bn"))).unwrap();
        assert_eq!(ack.display_text, "bill");
        assert_eq!(ack.language, "bn");

        let statuses: Vec<String> = conn
            .prepare("SELECT status FROM service_requests")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(statuses, vec!["pending", "pending"]);
    }

    #[test]
    fn test_service_request_validation() {
        let (_dir, _db, conn) = seeded();

        let err = service::create_service_request(&conn, service_request(1, "dance", None)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request type");

        let err = service::create_service_request(&conn, service_request(2, "water", None)).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = service::create_service_request(&conn, CreateServiceRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: branch_id");

        assert_eq!(count(&conn, "service_requests"), 0);
    }

    // ===== HTTP TESTS =====

    fn app() -> (TempDir, axum::Router) {
        let (dir, db, conn) = seeded();
        drop(conn);
        (dir, router(AppState::new(db)))
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_http_query_trigger_dispatch() {
        let (_dir, app) = app();

        let (status, json) = send(&app, "GET", "/api/index.php?menu=1&branch_id=1&language=en", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["language"], "en");
        assert_eq!(json["categories"].as_array().unwrap().len(), 2);

        let (status, json) = send(&app, "GET", "/api?branches=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 2);

        let (status, json) = send(&app, "GET", "/api/languages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["code"], "bn");
    }

    #[tokio::test]
    async fn test_http_error_shapes() {
        let (_dir, app) = app();

        let (status, json) = send(&app, "POST", "/api/index.php?menu=1&branch_id=1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"], "Method not allowed");

        let (status, json) = send(&app, "GET", "/api/index.php?orders=1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"], "Method not allowed");

        let (status, json) = send(&app, "GET", "/api/index.php?nothing=1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Endpoint not found");

        let (status, _) = send(&app, "GET", "/api/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = send(&app, "GET", "/api/index.php?menu=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing required parameter: branch_id");

        let (status, json) = send(&app, "GET", "/api/index.php?settings=1&branch_id=99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Branch not found");
    }

    #[tokio::test]
    async fn test_http_options_preflight() {
        let (_dir, app) = app();

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/index.php?orders=1")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let (status, json) = send(&app, "OPTIONS", "/api/index.php?feedback=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_http_place_and_track_order() {
        let (_dir, app) = app();

        let body = serde_json::json!({
            "branch_id": 1,
            "order_type": "takeaway",
            "items": [{ "branch_menu_item_id": 1, "quantity": 2, "customizations": [] }],
            "customer_name": "Rahim",
            "customer_phone": "01700000000",
            "promo_code": "WELCOME10"
        });
        let (status, placed) = send(&app, "POST", "/api/index.php?orders=1", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let uid = placed["order_id"].as_str().unwrap().to_string();
        assert!(uid.starts_with("ORD"));
        assert_eq!(placed["status"], "placed");

        let uri = format!("/api/index.php?order_status=1&order_uid={}", uid);
        let (status, tracked) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tracked["order_id"], uid.as_str());
        assert_eq!(tracked["order_type"], "takeaway");
    }

    #[tokio::test]
    async fn test_http_invalid_body_reports_missing_field() {
        let (_dir, app) = app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/index.php?orders=1")
            .body(Body::from("this is not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Missing required field: branch_id");

        let (status, json) = send(
            &app,
            "POST",
            "/api/index.php?promocode=1",
            Some(serde_json::json!({ "code": "NOPE" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Invalid or expired promo code");
    }
}
