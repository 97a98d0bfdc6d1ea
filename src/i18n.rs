//! Language resolution and translation fallback.
//!
//! Every translatable row is looked up twice: once for the requested language
//! and once for [`FALLBACK_LANGUAGE_ID`]. [`translated`] picks between the two,
//! and callers that need a non-empty display string add a literal default with
//! [`translated_or`].

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

/// Language every translation falls back to.
pub const FALLBACK_LANGUAGE_ID: i64 = 1;

/// Code used when neither the request nor the branch names a language.
pub const FALLBACK_LANGUAGE_CODE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLanguage {
    pub id: i64,
    /// The code as requested (or inherited from the branch), even when it did
    /// not match a known language and `id` fell back.
    pub code: String,
}

/// Preferred translation, then the fallback-language translation. Blank
/// strings count as missing.
pub fn translated(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    preferred
        .filter(|s| !s.trim().is_empty())
        .or_else(|| fallback.filter(|s| !s.trim().is_empty()))
}

pub fn translated_or(preferred: Option<String>, fallback: Option<String>, literal: &str) -> String {
    translated(preferred, fallback).unwrap_or_else(|| literal.to_string())
}

/// Explicit code, then the branch default, then `"en"`.
pub fn language_code_for(conn: &Connection, branch_id: Option<i64>, requested: Option<&str>) -> Result<String> {
    if let Some(code) = requested.map(str::trim).filter(|c| !c.is_empty()) {
        return Ok(code.to_string());
    }

    let branch_default = match branch_id {
        Some(id) => conn
            .query_row(
                "SELECT l.code FROM branches b
                 JOIN languages l ON b.default_language_id = l.id
                 WHERE b.id = ?1",
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?,
        None => None,
    };

    Ok(branch_default.unwrap_or_else(|| {
        debug!(?branch_id, "No branch default language, using fallback code");
        FALLBACK_LANGUAGE_CODE.to_string()
    }))
}

/// Unknown codes resolve to [`FALLBACK_LANGUAGE_ID`] instead of failing.
pub fn language_id_for(conn: &Connection, code: &str) -> Result<i64> {
    let id: Option<i64> = conn
        .query_row("SELECT id FROM languages WHERE code = ?1", [code], |row| row.get(0))
        .optional()?;

    Ok(id.unwrap_or_else(|| {
        debug!(code, "Unknown language code, using fallback language");
        FALLBACK_LANGUAGE_ID
    }))
}

pub fn resolve_language(conn: &Connection, branch_id: Option<i64>, requested: Option<&str>) -> Result<ResolvedLanguage> {
    let code = language_code_for(conn, branch_id, requested)?;
    let id = language_id_for(conn, &code)?;
    Ok(ResolvedLanguage { id, code })
}
