use crate::commands::branches::table_belongs_to_branch;
use crate::error::{ApiError, Result};
use crate::i18n::resolve_language;
use crate::models::{CreateServiceRequest, ServiceRequestAck, ServiceRequestType};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, instrument};

/// Record a call-the-waiter style request from a table.
#[instrument(skip(conn, request))]
pub fn create_service_request(conn: &Connection, request: CreateServiceRequest) -> Result<ServiceRequestAck> {
    let branch_id = request.branch_id.ok_or_else(|| ApiError::missing_field("branch_id"))?;
    let table_id = request.table_id.ok_or_else(|| ApiError::missing_field("table_id"))?;
    let raw_type = request
        .request_type
        .as_deref()
        .ok_or_else(|| ApiError::missing_field("request_type"))?;

    let request_type: ServiceRequestType = raw_type
        .parse()
        .map_err(|_| ApiError::Validation("Invalid request type".to_string()))?;

    let language = resolve_language(conn, Some(branch_id), request.language.as_deref())?;

    if !table_belongs_to_branch(conn, table_id, branch_id)? {
        return Err(ApiError::NotFound("Invalid table for this branch".to_string()));
    }

    conn.execute(
        "INSERT INTO service_requests (table_id, request_type, status) VALUES (?1, ?2, 'pending')",
        rusqlite::params![table_id, request_type.as_str()],
    )?;

    let display_text: Option<String> = conn
        .query_row(
            "SELECT display_text FROM service_request_translations
             WHERE request_type = ?1 AND language_id = ?2",
            rusqlite::params![request_type.as_str(), language.id],
            |row| row.get(0),
        )
        .optional()?;

    info!(branch_id, table_id, request_type = request_type.as_str(), "Service request created");

    Ok(ServiceRequestAck {
        success: true,
        request_type: request_type.as_str().to_string(),
        display_text: display_text.unwrap_or_else(|| request_type.as_str().to_string()),
        language: language.code,
    })
}
