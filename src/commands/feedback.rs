use crate::commands::orders::order_row_id;
use crate::error::{ApiError, Result};
use crate::models::{Ack, SubmitFeedback};
use rusqlite::Connection;
use tracing::{info, instrument};

#[instrument(skip(conn, feedback))]
pub fn submit_feedback(conn: &Connection, feedback: SubmitFeedback) -> Result<Ack> {
    let order_uid = feedback.order_id.as_deref().ok_or_else(|| ApiError::missing_field("order_id"))?;
    let ratings = feedback.ratings.as_ref().ok_or_else(|| ApiError::missing_field("ratings"))?;

    let overall = match ratings.overall {
        Some(rating) if (1..=5).contains(&rating) => rating,
        _ => {
            return Err(ApiError::Validation(
                "Overall rating is required and must be between 1 and 5".to_string(),
            ))
        }
    };

    let order_id = order_row_id(conn, order_uid)?.ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let item_feedback = feedback
        .item_feedback
        .clone()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));

    conn.execute(
        "INSERT INTO feedback (order_id, overall_rating, food_rating, service_rating, item_feedback, comment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            order_id,
            overall,
            ratings.food,
            ratings.service,
            serde_json::to_string(&item_feedback)?,
            feedback.comment,
        ],
    )?;

    info!(order_uid, overall, "Feedback recorded");
    Ok(Ack { success: true })
}
