//! CRUD wrappers for the `schedules` table.
//!
//! Create and list act on the signed-in user's rows and fail with
//! [`Error::NotAuthenticated`] before touching the backend when there is no
//! session. Update and delete address a row by id only; ownership is left to
//! the table's row-level security policies.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::client::{Backend, Session, SortOrder, TableQuery};
use crate::models::{NewSchedule, Schedule, ScheduleUpdate};
use crate::{Error, Result};

pub const SCHEDULES_TABLE: &str = "schedules";

async fn require_session(client: &dyn Backend) -> Result<Session> {
    client.get_session().await?.ok_or(Error::NotAuthenticated)
}

fn validation_error(e: validator::ValidationErrors) -> Error {
    Error::Validation(e.to_string())
}

fn first_row(rows: Vec<Value>) -> Result<Schedule> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| Error::Internal("Backend returned no row".to_string()))?;
    Ok(serde_json::from_value(row)?)
}

/// Create a schedule owned by the signed-in user.
pub async fn create_schedule(client: &dyn Backend, schedule: &NewSchedule) -> Result<Schedule> {
    schedule.validate().map_err(validation_error)?;
    let session = require_session(client).await?;

    let mut row = serde_json::to_value(schedule)?;
    if let Value::Object(fields) = &mut row {
        fields.insert("user_id".to_string(), Value::String(session.user.id.to_string()));
    }

    let created = first_row(client.insert(SCHEDULES_TABLE, vec![row]).await?)?;
    info!(schedule_id = %created.id, user_id = %created.user_id, "Created schedule");
    Ok(created)
}

/// List the signed-in user's schedules, earliest first.
pub async fn get_schedules(client: &dyn Backend) -> Result<Vec<Schedule>> {
    let session = require_session(client).await?;

    let query = TableQuery::new(SCHEDULES_TABLE)
        .eq("user_id", session.user.id)
        .order("start_time", SortOrder::Ascending);

    let rows = client.select(&query).await?;
    debug!(user_id = %session.user.id, count = rows.len(), "Fetched schedules");

    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Error::from))
        .collect()
}

pub async fn update_schedule(
    client: &dyn Backend,
    id: Uuid,
    updates: &ScheduleUpdate,
) -> Result<Schedule> {
    updates.validate().map_err(validation_error)?;
    if updates.is_empty() {
        return Err(Error::Validation("No fields to update".to_string()));
    }

    let query = TableQuery::new(SCHEDULES_TABLE).eq("id", id);
    let rows = client.update(&query, serde_json::to_value(updates)?).await?;

    let updated: Schedule = rows
        .into_iter()
        .next()
        .ok_or_else(|| Error::Remote {
            status: 404,
            message: "Schedule not found".to_string(),
        })
        .and_then(|row| serde_json::from_value(row).map_err(Error::from))?;

    info!(schedule_id = %id, "Updated schedule");
    Ok(updated)
}

pub async fn delete_schedule(client: &dyn Backend, id: Uuid) -> Result<()> {
    let query = TableQuery::new(SCHEDULES_TABLE).eq("id", id);
    client.delete(&query).await?;

    info!(schedule_id = %id, "Deleted schedule");
    Ok(())
}
