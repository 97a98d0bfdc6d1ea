use crate::error::Result;
use crate::i18n::{resolve_language, translated, translated_or, FALLBACK_LANGUAGE_ID};
use crate::models::{CustomizationGroup, CustomizationOption, Menu, MenuCategory, MenuItem, SelectionType};
use rusqlite::Connection;
use tracing::{debug, instrument, warn};

const UNNAMED_CATEGORY: &str = "Menu";
const UNNAMED_ITEM: &str = "Menu item";
const UNNAMED_GROUP: &str = "Options";
const UNNAMED_OPTION: &str = "Option";

/// Resolve the full menu of a branch in one language.
///
/// Missing branches, categories or items produce empty lists, never errors.
#[instrument(skip(conn))]
pub fn get_menu(conn: &Connection, branch_id: i64, language: Option<&str>) -> Result<Menu> {
    let lang = resolve_language(conn, Some(branch_id), language)?;

    let categories = load_categories(conn, branch_id, lang.id)?;
    let mut items = load_items(conn, branch_id, lang.id)?;
    for item in &mut items {
        item.customizations = load_customizations(conn, item.master_item_id, lang.id)?;
    }

    debug!(
        categories = categories.len(),
        items = items.len(),
        language = %lang.code,
        "Menu resolved"
    );

    Ok(Menu {
        categories: group_by_category(categories, items),
        language: lang.code,
    })
}

fn load_categories(conn: &Connection, branch_id: i64, language_id: i64) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT mc.id, mct.name, mc_default.name
         FROM menu_categories mc
         LEFT JOIN menu_category_translations mct
             ON mc.id = mct.category_id AND mct.language_id = ?1
         LEFT JOIN menu_category_translations mc_default
             ON mc.id = mc_default.category_id AND mc_default.language_id = ?2
         WHERE mc.branch_id = ?3
         ORDER BY mc.display_order, mc.id",
    )?;

    let categories = stmt
        .query_map(rusqlite::params![language_id, FALLBACK_LANGUAGE_ID, branch_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                translated_or(row.get(1)?, row.get(2)?, UNNAMED_CATEGORY),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(categories)
}

/// All sellable items of the branch, ordered by category display order and
/// then by resolved name across the whole result.
fn load_items(conn: &Connection, branch_id: i64, language_id: i64) -> Result<Vec<MenuItem>> {
    let mut stmt = conn.prepare(
        "SELECT
             bmi.id, bmi.price, bmi.is_available,
             mmi.id, mmi.image_url, mmi.tags,
             mc.id, mc.display_order,
             mit.name, mit_default.name,
             mit.description, mit_default.description
         FROM branch_menu_items bmi
         JOIN master_menu_items mmi ON bmi.master_item_id = mmi.id
         JOIN menu_categories mc ON bmi.category_id = mc.id
         LEFT JOIN menu_item_translations mit
             ON mmi.id = mit.item_id AND mit.language_id = ?1
         LEFT JOIN menu_item_translations mit_default
             ON mmi.id = mit_default.item_id AND mit_default.language_id = ?2
         WHERE bmi.branch_id = ?3
         ORDER BY mc.display_order, bmi.id",
    )?;

    let mut rows: Vec<(i64, MenuItem)> = stmt
        .query_map(rusqlite::params![language_id, FALLBACK_LANGUAGE_ID, branch_id], |row| {
            let display_order: i64 = row.get(7)?;
            let raw_tags: Option<String> = row.get(5)?;
            Ok((
                display_order,
                MenuItem {
                    branch_menu_item_id: row.get(0)?,
                    price: row.get(1)?,
                    is_available: row.get(2)?,
                    master_item_id: row.get(3)?,
                    image_url: row.get(4)?,
                    tags: parse_tags(raw_tags.as_deref()),
                    category_id: row.get(6)?,
                    name: translated_or(row.get(8)?, row.get(9)?, UNNAMED_ITEM),
                    description: translated(row.get(10)?, row.get(11)?),
                    customizations: Vec::new(),
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    // Stable sort keeps id order for equal names
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

    Ok(rows.into_iter().map(|(_, item)| item).collect())
}

/// `tags` is a JSON array of strings; anything else yields an empty list.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Err(e) => {
            warn!("Ignoring malformed tags column {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

fn load_customizations(conn: &Connection, master_item_id: i64, language_id: i64) -> Result<Vec<CustomizationGroup>> {
    let mut stmt = conn.prepare_cached(
        "SELECT
             cg.id, cg.selection_type,
             cgt.name, cgt_default.name,
             co.id, co.additional_price,
             cot.name, cot_default.name
         FROM customization_groups cg
         LEFT JOIN customization_group_translations cgt
             ON cg.id = cgt.group_id AND cgt.language_id = ?1
         LEFT JOIN customization_group_translations cgt_default
             ON cg.id = cgt_default.group_id AND cgt_default.language_id = ?2
         LEFT JOIN customization_options co ON cg.id = co.group_id
         LEFT JOIN customization_option_translations cot
             ON co.id = cot.option_id AND cot.language_id = ?1
         LEFT JOIN customization_option_translations cot_default
             ON co.id = cot_default.option_id AND cot_default.language_id = ?2
         WHERE cg.master_item_id = ?3
         ORDER BY cg.id, co.id",
    )?;

    let mut rows = stmt.query(rusqlite::params![language_id, FALLBACK_LANGUAGE_ID, master_item_id])?;
    let mut groups: Vec<CustomizationGroup> = Vec::new();

    while let Some(row) = rows.next()? {
        let group_id: i64 = row.get(0)?;

        if groups.last().map(|g| g.id) != Some(group_id) {
            let raw_type: String = row.get(1)?;
            let selection_type = raw_type.parse().unwrap_or_else(|_| {
                warn!(group_id, raw_type = %raw_type, "Unknown selection type, treating as single");
                SelectionType::Single
            });
            groups.push(CustomizationGroup {
                id: group_id,
                name: translated_or(row.get(2)?, row.get(3)?, UNNAMED_GROUP),
                selection_type,
                options: Vec::new(),
            });
        }

        let option_id: Option<i64> = row.get(4)?;
        if let (Some(option_id), Some(group)) = (option_id, groups.last_mut()) {
            group.options.push(CustomizationOption {
                id: option_id,
                name: translated_or(row.get(6)?, row.get(7)?, UNNAMED_OPTION),
                price: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            });
        }
    }

    Ok(groups)
}

/// Partition items into their categories, keeping category order. Categories
/// without items are kept with an empty list.
pub fn group_by_category(categories: Vec<(i64, String)>, items: Vec<MenuItem>) -> Vec<MenuCategory> {
    let mut menu: Vec<MenuCategory> = categories
        .into_iter()
        .map(|(id, name)| MenuCategory {
            id,
            name,
            items: Vec::new(),
        })
        .collect();

    for item in items {
        if let Some(category) = menu.iter_mut().find(|c| c.id == item.category_id) {
            category.items.push(item);
        }
    }

    menu
}
