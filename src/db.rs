use crate::api::AppState;
use crate::error::{ApiError, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Handle to the SQLite file. Connections are opened per request and dropped
/// when the request finishes; nothing is shared between requests.
#[derive(Debug, Clone)]
pub struct Database {
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Database {
            path: Arc::new(path.as_ref().to_path_buf()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<Connection> {
        let conn = Connection::open(self.path.as_path())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Run blocking database work for one request on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.open()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {}", e)))?
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn initialize(&self) -> Result<()> {
        let conn = self.open()?;
        create_schema(&conn)?;

        // Run migrations for databases created by older builds
        Self::migrate_conn(&conn)?;

        info!("Database schema ready");
        Ok(())
    }

    fn migrate_conn(conn: &Connection) -> Result<()> {
        let order_columns = table_columns(conn, "orders")?;

        if !order_columns.contains(&"promo_code_id".to_string()) {
            conn.execute("ALTER TABLE orders ADD COLUMN promo_code_id INTEGER REFERENCES promo_codes(id)", [])?;
        }
        if !order_columns.contains(&"estimated_completion_time".to_string()) {
            conn.execute("ALTER TABLE orders ADD COLUMN estimated_completion_time DATETIME", [])?;
        }

        let item_columns = table_columns(conn, "order_items")?;
        if !item_columns.contains(&"customizations".to_string()) {
            conn.execute("ALTER TABLE order_items ADD COLUMN customizations TEXT NOT NULL DEFAULT '[]'", [])?;
        }

        Ok(())
    }

    /// Load the demo catalog if the database has no languages yet.
    #[instrument(skip(self))]
    pub fn seed_demo_data(&self) -> Result<bool> {
        let mut conn = self.open()?;

        let existing: Option<i64> = conn
            .query_row("SELECT id FROM languages LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if existing.is_some() {
            debug!("Languages already present, skipping demo seed");
            return Ok(false);
        }

        let tx = conn.transaction()?;
        tx.execute_batch(DEMO_DATA)?;
        tx.commit()?;

        info!("Demo catalog seeded");
        Ok(true)
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let columns = conn
        .prepare(&format!("PRAGMA table_info({})", table))?
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(columns)
}

pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS languages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS branches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
            default_language_id INTEGER NOT NULL DEFAULT 1,
            settings TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (default_language_id) REFERENCES languages(id)
        );

        -- Menu categories are owned by a branch; names live in translations
        CREATE TABLE IF NOT EXISTS menu_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            branch_id INTEGER NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (branch_id) REFERENCES branches(id)
        );

        CREATE TABLE IF NOT EXISTS menu_category_translations (
            category_id INTEGER NOT NULL,
            language_id INTEGER NOT NULL,
            name TEXT,
            PRIMARY KEY (category_id, language_id),
            FOREIGN KEY (category_id) REFERENCES menu_categories(id),
            FOREIGN KEY (language_id) REFERENCES languages(id)
        );

        -- Branch-agnostic catalog entries (no price)
        CREATE TABLE IF NOT EXISTS master_menu_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_url TEXT,
            tags TEXT
        );

        CREATE TABLE IF NOT EXISTS menu_item_translations (
            item_id INTEGER NOT NULL,
            language_id INTEGER NOT NULL,
            name TEXT,
            description TEXT,
            PRIMARY KEY (item_id, language_id),
            FOREIGN KEY (item_id) REFERENCES master_menu_items(id),
            FOREIGN KEY (language_id) REFERENCES languages(id)
        );

        -- Sellable unit: branch-specific price and availability
        CREATE TABLE IF NOT EXISTS branch_menu_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            branch_id INTEGER NOT NULL,
            master_item_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            price REAL NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (branch_id) REFERENCES branches(id),
            FOREIGN KEY (master_item_id) REFERENCES master_menu_items(id),
            FOREIGN KEY (category_id) REFERENCES menu_categories(id)
        );

        CREATE TABLE IF NOT EXISTS customization_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            master_item_id INTEGER NOT NULL,
            selection_type TEXT NOT NULL DEFAULT 'single' CHECK (selection_type IN ('single', 'multiple')),
            FOREIGN KEY (master_item_id) REFERENCES master_menu_items(id)
        );

        CREATE TABLE IF NOT EXISTS customization_group_translations (
            group_id INTEGER NOT NULL,
            language_id INTEGER NOT NULL,
            name TEXT,
            PRIMARY KEY (group_id, language_id),
            FOREIGN KEY (group_id) REFERENCES customization_groups(id),
            FOREIGN KEY (language_id) REFERENCES languages(id)
        );

        CREATE TABLE IF NOT EXISTS customization_options (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER NOT NULL,
            additional_price REAL NOT NULL DEFAULT 0,
            FOREIGN KEY (group_id) REFERENCES customization_groups(id)
        );

        CREATE TABLE IF NOT EXISTS customization_option_translations (
            option_id INTEGER NOT NULL,
            language_id INTEGER NOT NULL,
            name TEXT,
            PRIMARY KEY (option_id, language_id),
            FOREIGN KEY (option_id) REFERENCES customization_options(id),
            FOREIGN KEY (language_id) REFERENCES languages(id)
        );

        CREATE TABLE IF NOT EXISTS restaurant_tables (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            branch_id INTEGER NOT NULL,
            table_identifier TEXT NOT NULL,
            capacity INTEGER NOT NULL DEFAULT 4,
            FOREIGN KEY (branch_id) REFERENCES branches(id)
        );

        CREATE TABLE IF NOT EXISTS promo_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL CHECK (type IN ('percentage', 'fixed')),
            value REAL NOT NULL,
            min_order_amount REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        -- Orders
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_uid TEXT NOT NULL UNIQUE,
            branch_id INTEGER NOT NULL,
            table_id INTEGER,
            order_type TEXT NOT NULL CHECK (order_type IN ('dine-in', 'takeaway', 'delivery')),
            status TEXT NOT NULL DEFAULT 'placed',
            customer_name TEXT,
            customer_phone TEXT,
            customer_address TEXT,
            language_id INTEGER NOT NULL DEFAULT 1,
            subtotal REAL NOT NULL,
            vat_amount REAL NOT NULL,
            discount_amount REAL NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL,
            promo_code_id INTEGER,
            estimated_completion_time DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (branch_id) REFERENCES branches(id),
            FOREIGN KEY (table_id) REFERENCES restaurant_tables(id),
            FOREIGN KEY (language_id) REFERENCES languages(id),
            FOREIGN KEY (promo_code_id) REFERENCES promo_codes(id)
        );

        -- Order items keep a price and customization snapshot
        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            branch_menu_item_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            unit_price REAL NOT NULL,
            customizations TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (order_id) REFERENCES orders(id),
            FOREIGN KEY (branch_menu_item_id) REFERENCES branch_menu_items(id)
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            overall_rating INTEGER NOT NULL CHECK (overall_rating BETWEEN 1 AND 5),
            food_rating INTEGER,
            service_rating INTEGER,
            item_feedback TEXT NOT NULL DEFAULT '[]',
            comment TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (order_id) REFERENCES orders(id)
        );

        CREATE TABLE IF NOT EXISTS service_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_id INTEGER NOT NULL,
            request_type TEXT NOT NULL CHECK (request_type IN ('assistance', 'water', 'bill')),
            status TEXT NOT NULL DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (table_id) REFERENCES restaurant_tables(id)
        );

        CREATE TABLE IF NOT EXISTS service_request_translations (
            request_type TEXT NOT NULL,
            language_id INTEGER NOT NULL,
            display_text TEXT NOT NULL,
            PRIMARY KEY (request_type, language_id),
            FOREIGN KEY (language_id) REFERENCES languages(id)
        );

        CREATE INDEX IF NOT EXISTS idx_branch_menu_items_branch ON branch_menu_items(branch_id);
        CREATE INDEX IF NOT EXISTS idx_menu_categories_branch ON menu_categories(branch_id);
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
        ",
    )?;
    Ok(())
}

const DEMO_DATA: &str = "
    INSERT INTO languages (id, code, name, is_active) VALUES
        (1, 'en', 'English', 1),
        (2, 'bn', 'বাংলা', 1);

    INSERT INTO branches (id, name, address, phone, status, default_language_id, settings) VALUES
        (1, 'Luna Dine Gulshan', 'Road 11, Gulshan 2, Dhaka', '+880 1700-000001', 'open', 1,
         '{\"vat_percentage\": 15, \"currency_symbol\": \"৳\", \"service_charge\": 0}'),
        (2, 'Luna Dine Dhanmondi', 'Road 27, Dhanmondi, Dhaka', '+880 1700-000002', 'open', 2,
         '{\"vat_percentage\": 10, \"currency_symbol\": \"৳\"}');

    INSERT INTO menu_categories (id, branch_id, display_order) VALUES
        (1, 1, 1), (2, 1, 2), (3, 1, 3),
        (4, 2, 1), (5, 2, 2);

    INSERT INTO menu_category_translations (category_id, language_id, name) VALUES
        (1, 1, 'Starters'), (1, 2, 'স্টার্টার'),
        (2, 1, 'Main Course'), (2, 2, 'প্রধান খাবার'),
        (3, 1, 'Beverages'), (3, 2, 'পানীয়'),
        (4, 1, 'Main Course'), (4, 2, 'প্রধান খাবার'),
        (5, 1, 'Desserts');

    INSERT INTO master_menu_items (id, image_url, tags) VALUES
        (1, 'images/chicken-wings.jpg', '[\"spicy\", \"popular\"]'),
        (2, 'images/beef-tehari.jpg', '[\"signature\"]'),
        (3, 'images/kacchi-biryani.jpg', '[\"popular\", \"signature\"]'),
        (4, 'images/lemon-mint.jpg', '[\"vegetarian\"]'),
        (5, 'images/firni.jpg', NULL);

    INSERT INTO menu_item_translations (item_id, language_id, name, description) VALUES
        (1, 1, 'Chicken Wings', 'Crispy wings tossed in house hot sauce'),
        (1, 2, 'চিকেন উইংস', 'ঝাল সসে মাখানো মচমচে উইংস'),
        (2, 1, 'Beef Tehari', 'Fragrant rice with tender beef'),
        (3, 1, 'Kacchi Biryani', 'Slow-cooked mutton biryani'),
        (3, 2, 'কাচ্চি বিরিয়ানি', 'ধীরে রান্না করা খাসির বিরিয়ানি'),
        (4, 1, 'Lemon Mint', 'Fresh lemon and mint cooler'),
        (5, 1, 'Firni', 'Chilled rice pudding');

    INSERT INTO branch_menu_items (id, branch_id, master_item_id, category_id, price, is_available) VALUES
        (1, 1, 1, 1, 280, 1),
        (2, 1, 2, 2, 350, 1),
        (3, 1, 3, 2, 450, 1),
        (4, 1, 4, 3, 120, 1),
        (5, 2, 3, 4, 480, 1),
        (6, 2, 5, 5, 150, 0);

    INSERT INTO customization_groups (id, master_item_id, selection_type) VALUES
        (1, 1, 'single'),
        (2, 1, 'multiple'),
        (3, 3, 'single');

    INSERT INTO customization_group_translations (group_id, language_id, name) VALUES
        (1, 1, 'Spice Level'), (1, 2, 'ঝালের মাত্রা'),
        (2, 1, 'Extra Dips'),
        (3, 1, 'Portion');

    INSERT INTO customization_options (id, group_id, additional_price) VALUES
        (1, 1, 0), (2, 1, 0), (3, 1, 0),
        (4, 2, 30), (5, 2, 40),
        (6, 3, 0), (7, 3, 200);

    INSERT INTO customization_option_translations (option_id, language_id, name) VALUES
        (1, 1, 'Mild'), (2, 1, 'Medium'), (3, 1, 'Hot'),
        (4, 1, 'Garlic Mayo'), (5, 1, 'Cheese Dip'),
        (6, 1, 'Single'), (7, 1, 'Double');

    INSERT INTO restaurant_tables (branch_id, table_identifier, capacity) VALUES
        (1, 'T1', 2), (1, 'T2', 4), (1, 'T3', 6),
        (2, 'A1', 4), (2, 'A2', 4);

    INSERT INTO promo_codes (code, type, value, min_order_amount, is_active) VALUES
        ('WELCOME10', 'percentage', 10, 300, 1),
        ('SUMMER20', 'percentage', 20, 1000, 1),
        ('FLAT5', 'fixed', 50, 500, 1),
        ('LOYALTY', 'percentage', 15, 0, 0);

    INSERT INTO service_request_translations (request_type, language_id, display_text) VALUES
        ('assistance', 1, 'A staff member is on the way'),
        ('assistance', 2, 'একজন কর্মী আসছেন'),
        ('water', 1, 'Water will be served shortly'),
        ('water', 2, 'শীঘ্রই পানি পরিবেশন করা হবে'),
        ('bill', 1, 'Your bill is being prepared'),
        ('bill', 2, 'আপনার বিল প্রস্তুত করা হচ্ছে');
";

pub trait DatabaseExt {
    fn db(&self) -> &Database;
}

impl DatabaseExt for AppState {
    fn db(&self) -> &Database {
        &self.db
    }
}
