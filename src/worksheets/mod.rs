/// Worksheets: daily work logs that flow through a submit/approve cycle

mod store;

pub use store::WorksheetStore;

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

/// Worksheet lifecycle states.
///
/// `draft -> submitted -> approved | rejected`, with the working variant
/// `draft -> in_progress -> completed -> submitted`. Approved and rejected
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorksheetStatus {
    Draft,
    InProgress,
    Completed,
    Submitted,
    Approved,
    Rejected,
}

impl WorksheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorksheetStatus::Draft => "draft",
            WorksheetStatus::InProgress => "in_progress",
            WorksheetStatus::Completed => "completed",
            WorksheetStatus::Submitted => "submitted",
            WorksheetStatus::Approved => "approved",
            WorksheetStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "draft" => Ok(WorksheetStatus::Draft),
            "in_progress" => Ok(WorksheetStatus::InProgress),
            "completed" => Ok(WorksheetStatus::Completed),
            "submitted" => Ok(WorksheetStatus::Submitted),
            "approved" => Ok(WorksheetStatus::Approved),
            "rejected" => Ok(WorksheetStatus::Rejected),
            _ => Err(ApiError::Validation(format!(
                "Invalid worksheet status: {}",
                s
            ))),
        }
    }

    /// Terminal states have no outgoing edges
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorksheetStatus::Approved | WorksheetStatus::Rejected)
    }

    /// Status changes allowed through a plain update. Submission and
    /// approval go through their own endpoints.
    pub fn can_update_to(&self, next: WorksheetStatus) -> bool {
        matches!(
            (self, next),
            (WorksheetStatus::Draft, WorksheetStatus::InProgress)
                | (WorksheetStatus::InProgress, WorksheetStatus::Completed)
        )
    }

    /// States a worksheet can be submitted from
    pub fn can_submit(&self) -> bool {
        matches!(self, WorksheetStatus::Draft | WorksheetStatus::Completed)
    }

    /// States a worksheet can be approved or rejected from
    pub fn awaiting_approval(&self) -> bool {
        matches!(
            self,
            WorksheetStatus::Submitted | WorksheetStatus::Completed
        )
    }
}

/// Worksheet priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(ApiError::Validation(format!("Invalid priority: {}", s))),
        }
    }
}

/// A worksheet row with joined display names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_by_name: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub assigned_to_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub priority: Priority,
    pub status: WorksheetStatus,
    pub progress: i64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worksheet {
    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let status_str: String = row.get("status");
        let priority_str: String = row.get("priority");

        Ok(Worksheet {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            created_by: row.get("created_by"),
            created_by_name: row.get("created_by_name"),
            assigned_to: row.get("assigned_to"),
            assigned_to_name: row.get("assigned_to_name"),
            department_id: row.get("department_id"),
            department_name: row.get("department_name"),
            priority: Priority::from_str(&priority_str)?,
            status: WorksheetStatus::from_str(&status_str)?,
            progress: row.get("progress"),
            start_date: row.get("start_date"),
            due_date: row.get("due_date"),
            submitted_at: row.get("submitted_at"),
            approved_by: row.get("approved_by"),
            approved_by_name: row.get("approved_by_name"),
            approved_at: row.get("approved_at"),
            approval_comment: row.get("approval_comment"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

/// Worksheet creation request; title and department are required
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorksheetRequest {
    pub title: String,
    pub description: Option<String>,
    pub department_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub priority: Option<Priority>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Partial worksheet update. Status changes here are limited to the
/// working transitions; submission and approval use their own endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorksheetRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub priority: Option<Priority>,
    pub status: Option<WorksheetStatus>,
    pub progress: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Approve or reject decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

/// Approval request body
#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub action: ApprovalAction,
    pub comment: Option<String>,
}

/// Status roll-up over the caller's visible worksheets
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorksheetStats {
    pub total: i64,
    pub draft: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub submitted: i64,
    pub approved: i64,
    pub rejected: i64,
    pub urgent: i64,
    pub overdue: i64,
}

/// Client list filters, intersected with the caller's scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksheetFilter {
    pub status: Option<WorksheetStatus>,
    pub priority: Option<Priority>,
    pub department_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_edges() {
        for terminal in [WorksheetStatus::Approved, WorksheetStatus::Rejected] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_submit());
            assert!(!terminal.awaiting_approval());
            for next in [
                WorksheetStatus::Draft,
                WorksheetStatus::InProgress,
                WorksheetStatus::Completed,
                WorksheetStatus::Submitted,
                WorksheetStatus::Approved,
                WorksheetStatus::Rejected,
            ] {
                assert!(!terminal.can_update_to(next));
            }
        }
    }

    #[test]
    fn test_working_transitions() {
        assert!(WorksheetStatus::Draft.can_update_to(WorksheetStatus::InProgress));
        assert!(WorksheetStatus::InProgress.can_update_to(WorksheetStatus::Completed));
        assert!(!WorksheetStatus::Draft.can_update_to(WorksheetStatus::Completed));
        assert!(!WorksheetStatus::Draft.can_update_to(WorksheetStatus::Approved));
        assert!(!WorksheetStatus::Submitted.can_update_to(WorksheetStatus::Draft));
    }

    #[test]
    fn test_submit_sources() {
        assert!(WorksheetStatus::Draft.can_submit());
        assert!(WorksheetStatus::Completed.can_submit());
        assert!(!WorksheetStatus::Submitted.can_submit());
        assert!(!WorksheetStatus::InProgress.can_submit());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            WorksheetStatus::Draft,
            WorksheetStatus::InProgress,
            WorksheetStatus::Completed,
            WorksheetStatus::Submitted,
            WorksheetStatus::Approved,
            WorksheetStatus::Rejected,
        ] {
            assert_eq!(WorksheetStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(WorksheetStatus::from_str("pending").is_err());
    }
}
