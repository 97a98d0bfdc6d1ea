use crate::error::{ApiError, Result};
use crate::models::{BranchSettings, BranchSettingsResponse, BranchSummary, Language, RestaurantTable};
use rusqlite::{Connection, OptionalExtension};
use tracing::instrument;

#[instrument(skip(conn))]
pub fn list_branches(conn: &Connection) -> Result<Vec<BranchSummary>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.name, b.address, b.status, b.phone, l.code, l.name
         FROM branches b
         JOIN languages l ON b.default_language_id = l.id
         ORDER BY b.id",
    )?;

    let branches = stmt
        .query_map([], |row| {
            Ok(BranchSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
                status: row.get(3)?,
                phone: row.get(4)?,
                default_language: row.get(5)?,
                language_name: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(branches)
}

/// The branch's settings blob merged with its default language.
#[instrument(skip(conn))]
pub fn get_settings(conn: &Connection, branch_id: i64) -> Result<BranchSettingsResponse> {
    let row: Option<(Option<String>, String, String)> = conn
        .query_row(
            "SELECT b.settings, l.code, l.name
             FROM branches b
             JOIN languages l ON b.default_language_id = l.id
             WHERE b.id = ?1",
            [branch_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (raw_settings, default_language, language_name) =
        row.ok_or_else(|| ApiError::NotFound("Branch not found".to_string()))?;

    let mut settings = BranchSettings::parse(raw_settings.as_deref());
    // These keys are always taken from the branch row itself
    for key in ["branch_id", "default_language", "language_name"] {
        settings.extra.remove(key);
    }

    Ok(BranchSettingsResponse {
        settings,
        branch_id,
        default_language,
        language_name,
    })
}

/// Settings for pricing. A missing branch behaves like an empty blob.
pub fn load_settings(conn: &Connection, branch_id: i64) -> Result<BranchSettings> {
    let raw: Option<Option<String>> = conn
        .query_row("SELECT settings FROM branches WHERE id = ?1", [branch_id], |row| row.get(0))
        .optional()?;
    Ok(BranchSettings::parse(raw.flatten().as_deref()))
}

pub fn branch_exists(conn: &Connection, branch_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM branches WHERE id = ?1", [branch_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

#[instrument(skip(conn))]
pub fn list_languages(conn: &Connection) -> Result<Vec<Language>> {
    let mut stmt = conn.prepare("SELECT id, code, name FROM languages WHERE is_active = 1 ORDER BY name")?;

    let languages = stmt
        .query_map([], |row| {
            Ok(Language {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(languages)
}

#[instrument(skip(conn))]
pub fn list_tables(conn: &Connection, branch_id: i64) -> Result<Vec<RestaurantTable>> {
    let mut stmt = conn.prepare(
        "SELECT id, table_identifier, capacity
         FROM restaurant_tables
         WHERE branch_id = ?1
         ORDER BY table_identifier",
    )?;

    let tables = stmt
        .query_map([branch_id], |row| {
            Ok(RestaurantTable {
                id: row.get(0)?,
                table_identifier: row.get(1)?,
                capacity: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(tables)
}

pub fn table_belongs_to_branch(conn: &Connection, table_id: i64, branch_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM restaurant_tables WHERE id = ?1 AND branch_id = ?2",
            [table_id, branch_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
