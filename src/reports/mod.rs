/// Work reports: periodic summaries submitted for managerial approval

mod store;

pub use store::ReportStore;

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

// Reports share the worksheet approval request shape
pub use crate::worksheets::ApprovalAction as ReportApprovalAction;
pub use crate::worksheets::ApproveRequest as ReportApproveRequest;

/// Report lifecycle: `draft -> submitted -> approved | rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "draft" => Ok(ReportStatus::Draft),
            "submitted" => Ok(ReportStatus::Submitted),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(ApiError::Validation(format!("Invalid report status: {}", s))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Approved | ReportStatus::Rejected)
    }
}

/// Reporting period kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    Custom,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
            ReportType::Quarterly => "quarterly",
            ReportType::Annual => "annual",
            ReportType::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "weekly" => Ok(ReportType::Weekly),
            "monthly" => Ok(ReportType::Monthly),
            "quarterly" => Ok(ReportType::Quarterly),
            "annual" => Ok(ReportType::Annual),
            "custom" => Ok(ReportType::Custom),
            _ => Err(ApiError::Validation(format!("Invalid report type: {}", s))),
        }
    }
}

/// A report row with joined display names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub report_type: ReportType,
    pub created_by: Option<Uuid>,
    pub created_by_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: Option<String>,
    pub status: ReportStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let status_str: String = row.get("status");
        let type_str: String = row.get("report_type");

        Ok(Report {
            id: row.get("id"),
            title: row.get("title"),
            report_type: ReportType::from_str(&type_str)?,
            created_by: row.get("created_by"),
            created_by_name: row.get("created_by_name"),
            department_id: row.get("department_id"),
            department_name: row.get("department_name"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            summary: row.get("summary"),
            status: ReportStatus::from_str(&status_str)?,
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

/// Report creation request. `submit: true` creates the report directly in
/// `submitted` instead of draft.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub title: String,
    pub report_type: ReportType,
    pub department_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: Option<String>,
    #[serde(default)]
    pub submit: bool,
}

/// Partial report update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub report_type: Option<ReportType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: Option<String>,
    pub status: Option<ReportStatus>,
}

/// Status roll-up over the caller's visible reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportStats {
    pub total: i64,
    pub draft: i64,
    pub submitted: i64,
    pub approved: i64,
    pub rejected: i64,
}

/// Client list filters, intersected with the caller's scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
    pub department_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ReportStatus::Draft,
            ReportStatus::Submitted,
            ReportStatus::Approved,
            ReportStatus::Rejected,
        ] {
            assert_eq!(ReportStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(ReportStatus::from_str("in_progress").is_err());
    }

    #[test]
    fn test_type_round_trip() {
        for report_type in [
            ReportType::Weekly,
            ReportType::Monthly,
            ReportType::Quarterly,
            ReportType::Annual,
            ReportType::Custom,
        ] {
            assert_eq!(ReportType::from_str(report_type.as_str()).unwrap(), report_type);
        }
        assert!(ReportType::from_str("daily").is_err());
    }
}
