//! Row types and request payloads of the PMO database

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

fn default_currency() -> String {
    "USD".to_string()
}

fn default_quote_status() -> String {
    "received".to_string()
}

fn default_link_status() -> String {
    "active".to_string()
}

fn default_task_status() -> String {
    "pending".to_string()
}

fn default_milestone_status() -> String {
    "on_track".to_string()
}

fn default_severity() -> String {
    "warning".to_string()
}

// ===== Rows =====

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: i64,
    pub company: String,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub supplier_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub is_primary: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct SupplierProject {
    pub id: i64,
    pub supplier_id: i64,
    pub project_code: String,
    pub role: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub id: i64,
    pub supplier_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub doc_type: Option<String>,
    pub uploaded_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub id: i64,
    pub supplier_id: i64,
    pub project_code: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    pub amount: Option<f64>,
    pub currency: String,
    pub lead_time_days: Option<i64>,
    pub valid_until: Option<String>,
    pub status: String,
    pub attachment_path: Option<String>,
    pub notes: Option<String>,
    pub received_at: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ScheduleTask {
    pub id: i64,
    pub project_code: String,
    pub task_id: String,
    pub name: String,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: String,
    /// JSON-encoded list of task ids
    pub depends_on: Option<String>,
    pub assignee: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub is_critical: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ScheduleMilestone {
    pub id: i64,
    pub project_code: String,
    pub milestone_id: String,
    pub name: String,
    pub target_date: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub project_code: Option<String>,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: Option<String>,
    pub is_read: bool,
    pub dismissed_at: Option<String>,
    pub created_at: Option<String>,
}

// ===== Views =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierSummary {
    pub id: i64,
    pub company: String,
    pub category: Option<String>,
    pub country: Option<String>,
    pub contact_count: usize,
    pub project_codes: Vec<String>,
    pub quote_count: usize,
    pub catalog_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierDetail {
    #[serde(flatten)]
    pub summary: SupplierSummary,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub contacts: Vec<Contact>,
    pub projects: Vec<SupplierProject>,
    pub quotes: Vec<Quote>,
    pub catalogs: Vec<Catalog>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleData {
    pub tasks: Vec<ScheduleTask>,
    pub milestones: Vec<ScheduleMilestone>,
}

// ===== Payloads =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierCreate {
    pub company: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Contacts created together with the supplier
    #[serde(default)]
    pub contacts: Vec<ContactCreate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierUpdate {
    pub company: Option<String>,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactCreate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteCreate {
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    pub description: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub lead_time_days: Option<i64>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default = "default_quote_status")]
    pub status: String,
    #[serde(default)]
    pub attachment_path: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub received_at: Option<String>,
}

impl Default for QuoteCreate {
    fn default() -> Self {
        Self {
            project_code: None,
            reference: None,
            description: String::new(),
            amount: None,
            currency: default_currency(),
            lead_time_days: None,
            valid_until: None,
            status: default_quote_status(),
            attachment_path: None,
            notes: None,
            received_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteUpdate {
    pub project_code: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub lead_time_days: Option<i64>,
    pub valid_until: Option<String>,
    pub status: Option<String>,
    pub attachment_path: Option<String>,
    pub notes: Option<String>,
    pub received_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierProjectCreate {
    pub project_code: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_link_status")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreate {
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_task_status")]
    pub status: String,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_critical: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub depends_on: Option<String>,
    pub assignee: Option<String>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub is_critical: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneUpsert {
    pub milestone_id: String,
    pub name: String,
    #[serde(default)]
    pub target_date: Option<String>,
    #[serde(default = "default_milestone_status")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCreate {
    #[serde(default)]
    pub project_code: Option<String>,
    pub alert_type: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Filters of `GET /api/suppliers`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub project_code: Option<String>,
}

/// Filters of `GET /api/alerts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub project_code: Option<String>,
    pub severity: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}
