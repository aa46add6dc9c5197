//! PMO database using SQLite
//!
//! This module holds the supplier registry and project schedules:
//! - Suppliers with their contacts, project links, quotes and catalogs
//! - Schedule tasks and milestones per project
//! - Alerts
//!
//! Rows are created by the REST API, by the filesystem sync and by the
//! Google Sheets import. Nothing here deletes rows implicitly.

mod models;
mod schema;
pub mod sheets;
pub mod sync;

pub use models::*;
pub use schema::*;

use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Turn a unique-constraint violation into `Conflict`
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Conflict(message())
        }
        _ => Error::Database(err),
    }
}

/// PMO database handle
#[derive(Clone)]
pub struct PmoDb {
    pool: SqlitePool,
}

impl PmoDb {
    /// Open (creating if needed) the database and apply the schema
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing PMO database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ===== Supplier Operations =====

    pub async fn get_supplier(&self, id: i64) -> Result<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    async fn require_supplier(&self, id: i64) -> Result<Supplier> {
        self.get_supplier(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Supplier {} not found", id)))
    }

    /// Case-insensitive company lookup
    pub async fn find_supplier_by_company(&self, company: &str) -> Result<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE lower(company) = lower(?) LIMIT 1",
        )
        .bind(company.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    pub async fn list_all_suppliers(&self) -> Result<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    /// Supplier summaries with related counts
    pub async fn list_suppliers(&self, filter: &SupplierFilter) -> Result<Vec<SupplierSummary>> {
        let mut sql = String::from("SELECT DISTINCT s.* FROM suppliers s");
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(code) = filter.project_code.as_deref().filter(|c| !c.is_empty()) {
            sql.push_str(" JOIN supplier_projects p ON p.supplier_id = s.id");
            clauses.push("p.project_code = ?");
            binds.push(code.to_string());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("lower(s.company) LIKE ?");
            binds.push(format!("%{}%", search.to_lowercase()));
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("s.category = ?");
            binds.push(category.to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY s.company");

        let mut query = sqlx::query_as::<_, Supplier>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let suppliers = query.fetch_all(&self.pool).await?;

        let mut summaries = Vec::with_capacity(suppliers.len());
        for supplier in suppliers {
            summaries.push(self.summarize(supplier).await?);
        }
        Ok(summaries)
    }

    async fn count(&self, table: &str, supplier_id: i64) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE supplier_id = ?", table);
        let (n,): (i64,) = sqlx::query_as(&sql)
            .bind(supplier_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn summarize(&self, supplier: Supplier) -> Result<SupplierSummary> {
        let project_codes = self
            .list_supplier_projects(supplier.id)
            .await?
            .into_iter()
            .map(|p| p.project_code)
            .collect();
        Ok(SupplierSummary {
            id: supplier.id,
            contact_count: self.count("supplier_contacts", supplier.id).await?,
            quote_count: self.count("supplier_quotes", supplier.id).await?,
            catalog_count: self.count("supplier_catalogs", supplier.id).await?,
            company: supplier.company,
            category: supplier.category,
            country: supplier.country,
            project_codes,
        })
    }

    /// Supplier with all nested rows
    pub async fn get_supplier_detail(&self, id: i64) -> Result<SupplierDetail> {
        let supplier = self.require_supplier(id).await?;
        let contacts = self.list_contacts(id).await?;
        let projects = self.list_supplier_projects(id).await?;
        let quotes = self.list_quotes(id).await?;
        let catalogs = self.list_catalogs(id).await?;

        Ok(SupplierDetail {
            summary: SupplierSummary {
                id: supplier.id,
                company: supplier.company,
                category: supplier.category,
                country: supplier.country,
                contact_count: contacts.len(),
                project_codes: projects.iter().map(|p| p.project_code.clone()).collect(),
                quote_count: quotes.len(),
                catalog_count: catalogs.len(),
            },
            domain: supplier.domain,
            website: supplier.website,
            notes: supplier.notes,
            contacts,
            projects,
            quotes,
            catalogs,
            created_at: supplier.created_at,
            updated_at: supplier.updated_at,
        })
    }

    /// Create a supplier and its nested contacts atomically
    pub async fn create_supplier(&self, input: &SupplierCreate) -> Result<Supplier> {
        let company = input.company.trim();
        if company.is_empty() {
            return Err(Error::Invalid("company must not be empty".to_string()));
        }

        let mut tx = self.begin().await?;
        let id = insert_supplier(&mut tx, input).await?;
        for contact in &input.contacts {
            insert_contact(&mut tx, id, contact).await?;
        }
        tx.commit().await?;

        info!("Created supplier {} ({})", company, id);
        self.require_supplier(id).await
    }

    pub async fn update_supplier(&self, id: i64, input: &SupplierUpdate) -> Result<Supplier> {
        let current = self.require_supplier(id).await?;
        let company = input.company.clone().unwrap_or(current.company);

        sqlx::query(
            r#"
            UPDATE suppliers
            SET company = ?, domain = ?, category = ?, country = ?, website = ?, notes = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&company)
        .bind(input.domain.clone().or(current.domain))
        .bind(input.category.clone().or(current.category))
        .bind(input.country.clone().or(current.country))
        .bind(input.website.clone().or(current.website))
        .bind(input.notes.clone().or(current.notes))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Supplier '{}' already exists", company)))?;

        self.require_supplier(id).await
    }

    /// Delete a supplier; related rows cascade
    pub async fn delete_supplier(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Supplier {} not found", id)));
        }
        Ok(())
    }

    // ===== Contact Operations =====

    pub async fn list_contacts(&self, supplier_id: i64) -> Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT * FROM supplier_contacts WHERE supplier_id = ? ORDER BY id",
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }

    pub async fn list_all_contacts(&self) -> Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>("SELECT * FROM supplier_contacts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    pub async fn get_contact(&self, supplier_id: i64, contact_id: i64) -> Result<Contact> {
        sqlx::query_as::<_, Contact>(
            "SELECT * FROM supplier_contacts WHERE id = ? AND supplier_id = ?",
        )
        .bind(contact_id)
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Contact {} not found", contact_id)))
    }

    pub async fn create_contact(&self, supplier_id: i64, input: &ContactCreate) -> Result<Contact> {
        self.require_supplier(supplier_id).await?;
        let mut tx = self.begin().await?;
        let id = insert_contact(&mut tx, supplier_id, input).await?;
        tx.commit().await?;
        self.get_contact(supplier_id, id).await
    }

    pub async fn update_contact(
        &self,
        supplier_id: i64,
        contact_id: i64,
        input: &ContactUpdate,
    ) -> Result<Contact> {
        let current = self.get_contact(supplier_id, contact_id).await?;
        sqlx::query(
            "UPDATE supplier_contacts SET name = ?, email = ?, phone = ?, role = ?, is_primary = ? WHERE id = ?",
        )
        .bind(input.name.clone().unwrap_or(current.name))
        .bind(input.email.clone().or(current.email))
        .bind(input.phone.clone().or(current.phone))
        .bind(input.role.clone().or(current.role))
        .bind(input.is_primary.unwrap_or(current.is_primary))
        .bind(contact_id)
        .execute(&self.pool)
        .await?;
        self.get_contact(supplier_id, contact_id).await
    }

    pub async fn delete_contact(&self, supplier_id: i64, contact_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM supplier_contacts WHERE id = ? AND supplier_id = ?")
            .bind(contact_id)
            .bind(supplier_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Contact {} not found", contact_id)));
        }
        Ok(())
    }

    // ===== Catalog Operations =====

    pub async fn list_catalogs(&self, supplier_id: i64) -> Result<Vec<Catalog>> {
        let catalogs = sqlx::query_as::<_, Catalog>(
            "SELECT * FROM supplier_catalogs WHERE supplier_id = ? ORDER BY id",
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(catalogs)
    }

    pub async fn list_all_catalogs(&self) -> Result<Vec<Catalog>> {
        let catalogs = sqlx::query_as::<_, Catalog>("SELECT * FROM supplier_catalogs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(catalogs)
    }

    pub async fn create_catalog(&self, supplier_id: i64, input: &CatalogCreate) -> Result<Catalog> {
        self.require_supplier(supplier_id).await?;
        let mut tx = self.begin().await?;
        let id = insert_catalog(&mut tx, supplier_id, input).await?;
        tx.commit().await?;

        let catalog = sqlx::query_as::<_, Catalog>("SELECT * FROM supplier_catalogs WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(catalog)
    }

    pub async fn delete_catalog(&self, supplier_id: i64, catalog_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM supplier_catalogs WHERE id = ? AND supplier_id = ?")
            .bind(catalog_id)
            .bind(supplier_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Catalog {} not found", catalog_id)));
        }
        Ok(())
    }

    // ===== Quote Operations =====

    pub async fn list_quotes(&self, supplier_id: i64) -> Result<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(
            "SELECT * FROM supplier_quotes WHERE supplier_id = ? ORDER BY id",
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    pub async fn list_all_quotes(&self) -> Result<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>("SELECT * FROM supplier_quotes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(quotes)
    }

    pub async fn get_quote(&self, supplier_id: i64, quote_id: i64) -> Result<Quote> {
        sqlx::query_as::<_, Quote>(
            "SELECT * FROM supplier_quotes WHERE id = ? AND supplier_id = ?",
        )
        .bind(quote_id)
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Quote {} not found", quote_id)))
    }

    pub async fn create_quote(&self, supplier_id: i64, input: &QuoteCreate) -> Result<Quote> {
        self.require_supplier(supplier_id).await?;
        if input.description.trim().is_empty() {
            return Err(Error::Invalid("description must not be empty".to_string()));
        }
        let mut tx = self.begin().await?;
        let id = insert_quote(&mut tx, supplier_id, input).await?;
        tx.commit().await?;
        self.get_quote(supplier_id, id).await
    }

    pub async fn update_quote(
        &self,
        supplier_id: i64,
        quote_id: i64,
        input: &QuoteUpdate,
    ) -> Result<Quote> {
        let current = self.get_quote(supplier_id, quote_id).await?;
        sqlx::query(
            r#"
            UPDATE supplier_quotes
            SET project_code = ?, reference = ?, description = ?, amount = ?, currency = ?,
                lead_time_days = ?, valid_until = ?, status = ?, attachment_path = ?, notes = ?,
                received_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.project_code.clone().or(current.project_code))
        .bind(input.reference.clone().or(current.reference))
        .bind(input.description.clone().unwrap_or(current.description))
        .bind(input.amount.or(current.amount))
        .bind(input.currency.clone().unwrap_or(current.currency))
        .bind(input.lead_time_days.or(current.lead_time_days))
        .bind(input.valid_until.clone().or(current.valid_until))
        .bind(input.status.clone().unwrap_or(current.status))
        .bind(input.attachment_path.clone().or(current.attachment_path))
        .bind(input.notes.clone().or(current.notes))
        .bind(input.received_at.clone().or(current.received_at))
        .bind(quote_id)
        .execute(&self.pool)
        .await?;
        self.get_quote(supplier_id, quote_id).await
    }

    pub async fn delete_quote(&self, supplier_id: i64, quote_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM supplier_quotes WHERE id = ? AND supplier_id = ?")
            .bind(quote_id)
            .bind(supplier_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Quote {} not found", quote_id)));
        }
        Ok(())
    }

    // ===== Project Link Operations =====

    pub async fn list_supplier_projects(&self, supplier_id: i64) -> Result<Vec<SupplierProject>> {
        let links = sqlx::query_as::<_, SupplierProject>(
            "SELECT * FROM supplier_projects WHERE supplier_id = ? ORDER BY project_code",
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    pub async fn link_project(
        &self,
        supplier_id: i64,
        input: &SupplierProjectCreate,
    ) -> Result<SupplierProject> {
        self.require_supplier(supplier_id).await?;
        let id = sqlx::query(
            "INSERT INTO supplier_projects (supplier_id, project_code, role, status) VALUES (?, ?, ?, ?)",
        )
        .bind(supplier_id)
        .bind(&input.project_code)
        .bind(&input.role)
        .bind(&input.status)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!(
                    "Supplier {} is already linked to project {}",
                    supplier_id, input.project_code
                )
            })
        })?
        .last_insert_rowid();

        let link = sqlx::query_as::<_, SupplierProject>("SELECT * FROM supplier_projects WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(link)
    }

    pub async fn unlink_project(&self, supplier_id: i64, project_code: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM supplier_projects WHERE supplier_id = ? AND project_code = ?")
                .bind(supplier_id)
                .bind(project_code)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "Supplier {} is not linked to project {}",
                supplier_id, project_code
            )));
        }
        Ok(())
    }

    // ===== Schedule Operations =====

    pub async fn list_tasks(&self, project_code: &str) -> Result<Vec<ScheduleTask>> {
        let tasks = sqlx::query_as::<_, ScheduleTask>(
            r#"
            SELECT * FROM schedule_tasks
            WHERE project_code = ?
            ORDER BY start_date IS NULL, start_date, id
            "#,
        )
        .bind(project_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    pub async fn list_milestones(&self, project_code: &str) -> Result<Vec<ScheduleMilestone>> {
        let milestones = sqlx::query_as::<_, ScheduleMilestone>(
            r#"
            SELECT * FROM schedule_milestones
            WHERE project_code = ?
            ORDER BY target_date IS NULL, target_date, id
            "#,
        )
        .bind(project_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(milestones)
    }

    pub async fn get_task(&self, project_code: &str, task_id: &str) -> Result<Option<ScheduleTask>> {
        let task = sqlx::query_as::<_, ScheduleTask>(
            "SELECT * FROM schedule_tasks WHERE project_code = ? AND task_id = ?",
        )
        .bind(project_code)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn create_task(&self, project_code: &str, input: &TaskCreate) -> Result<ScheduleTask> {
        sqlx::query(
            r#"
            INSERT INTO schedule_tasks
                (project_code, task_id, name, category, start_date, end_date, status,
                 depends_on, assignee, supplier, notes, is_critical)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_code)
        .bind(&input.task_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.start_date)
        .bind(&input.end_date)
        .bind(&input.status)
        .bind(&input.depends_on)
        .bind(&input.assignee)
        .bind(&input.supplier)
        .bind(&input.notes)
        .bind(input.is_critical)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("Task {} already exists in project {}", input.task_id, project_code)
            })
        })?;

        self.get_task(project_code, &input.task_id)
            .await?
            .ok_or_else(|| Error::Other("task vanished after insert".to_string()))
    }

    pub async fn update_task(
        &self,
        project_code: &str,
        task_id: &str,
        input: &TaskUpdate,
    ) -> Result<ScheduleTask> {
        let current = self.get_task(project_code, task_id).await?.ok_or_else(|| {
            Error::NotFound(format!("Task {} not found in project {}", task_id, project_code))
        })?;

        sqlx::query(
            r#"
            UPDATE schedule_tasks
            SET name = ?, category = ?, start_date = ?, end_date = ?, status = ?, depends_on = ?,
                assignee = ?, supplier = ?, notes = ?, is_critical = ?
            WHERE id = ?
            "#,
        )
        .bind(input.name.clone().unwrap_or(current.name))
        .bind(input.category.clone().or(current.category))
        .bind(input.start_date.clone().or(current.start_date))
        .bind(input.end_date.clone().or(current.end_date))
        .bind(input.status.clone().unwrap_or(current.status))
        .bind(input.depends_on.clone().or(current.depends_on))
        .bind(input.assignee.clone().or(current.assignee))
        .bind(input.supplier.clone().or(current.supplier))
        .bind(input.notes.clone().or(current.notes))
        .bind(input.is_critical.unwrap_or(current.is_critical))
        .bind(current.id)
        .execute(&self.pool)
        .await?;

        self.get_task(project_code, task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Task {} not found", task_id)))
    }

    /// Insert or overwrite a task by `(project_code, task_id)`; true when created
    pub async fn upsert_task(&self, project_code: &str, input: &TaskCreate) -> Result<bool> {
        let existed = self.get_task(project_code, &input.task_id).await?.is_some();
        sqlx::query(
            r#"
            INSERT INTO schedule_tasks
                (project_code, task_id, name, category, start_date, end_date, status,
                 depends_on, assignee, supplier, notes, is_critical)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_code, task_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                status = excluded.status,
                depends_on = excluded.depends_on,
                assignee = excluded.assignee,
                supplier = excluded.supplier,
                notes = excluded.notes,
                is_critical = excluded.is_critical
            "#,
        )
        .bind(project_code)
        .bind(&input.task_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.start_date)
        .bind(&input.end_date)
        .bind(&input.status)
        .bind(&input.depends_on)
        .bind(&input.assignee)
        .bind(&input.supplier)
        .bind(&input.notes)
        .bind(input.is_critical)
        .execute(&self.pool)
        .await?;
        Ok(!existed)
    }

    /// Insert or overwrite a milestone by `(project_code, milestone_id)`; true when created
    pub async fn upsert_milestone(&self, project_code: &str, input: &MilestoneUpsert) -> Result<bool> {
        let existed: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM schedule_milestones WHERE project_code = ? AND milestone_id = ?",
        )
        .bind(project_code)
        .bind(&input.milestone_id)
        .fetch_optional(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO schedule_milestones (project_code, milestone_id, name, target_date, status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(project_code, milestone_id) DO UPDATE SET
                name = excluded.name,
                target_date = excluded.target_date,
                status = excluded.status
            "#,
        )
        .bind(project_code)
        .bind(&input.milestone_id)
        .bind(&input.name)
        .bind(&input.target_date)
        .bind(&input.status)
        .execute(&self.pool)
        .await?;
        Ok(existed.is_none())
    }

    // ===== Alert Operations =====

    pub async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let mut sql = String::from("SELECT * FROM alerts");
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(code) = filter.project_code.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("project_code = ?");
            binds.push(code.to_string());
        }
        if let Some(severity) = filter.severity.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("severity = ?");
            binds.push(severity.to_string());
        }
        if filter.unread_only {
            clauses.push("dismissed_at IS NULL");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, Alert>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn create_alert(&self, input: &AlertCreate) -> Result<Alert> {
        let id = sqlx::query(
            "INSERT INTO alerts (project_code, alert_type, severity, title, message) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&input.project_code)
        .bind(&input.alert_type)
        .bind(&input.severity)
        .bind(&input.title)
        .bind(&input.message)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let alert = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(alert)
    }

    pub async fn dismiss_alert(&self, id: i64) -> Result<Alert> {
        let result = sqlx::query(
            "UPDATE alerts SET dismissed_at = CURRENT_TIMESTAMP, is_read = 1 WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Alert {} not found", id)));
        }

        let alert = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(alert)
    }

    // ===== Sync helpers =====

    /// Suppliers keyed by lowercased domain
    pub async fn suppliers_by_domain(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, domain FROM suppliers WHERE domain IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, d)| d.map(|d| (d.to_lowercase(), id)))
            .collect())
    }

    /// Contacts keyed by lowercased email
    pub async fn contact_emails(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, email FROM supplier_contacts WHERE email IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, e)| e.map(|e| (e.to_lowercase(), id)))
            .collect())
    }
}

// ===== Transaction-scoped inserts =====

pub(crate) async fn insert_supplier(
    tx: &mut Transaction<'static, Sqlite>,
    input: &SupplierCreate,
) -> Result<i64> {
    let company = input.company.trim().to_string();
    let result = sqlx::query(
        "INSERT INTO suppliers (company, domain, category, country, website, notes) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&company)
    .bind(&input.domain)
    .bind(&input.category)
    .bind(&input.country)
    .bind(&input.website)
    .bind(&input.notes)
    .execute(&mut **tx)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("Supplier '{}' already exists", company)))?;
    Ok(result.last_insert_rowid())
}

pub(crate) async fn insert_contact(
    tx: &mut Transaction<'static, Sqlite>,
    supplier_id: i64,
    input: &ContactCreate,
) -> Result<i64> {
    if input.name.trim().is_empty() {
        return Err(Error::Invalid("contact name must not be empty".to_string()));
    }
    let result = sqlx::query(
        "INSERT INTO supplier_contacts (supplier_id, name, email, phone, role, is_primary) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(supplier_id)
    .bind(input.name.trim())
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.role)
    .bind(input.is_primary)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

pub(crate) async fn insert_catalog(
    tx: &mut Transaction<'static, Sqlite>,
    supplier_id: i64,
    input: &CatalogCreate,
) -> Result<i64> {
    if input.title.trim().is_empty() {
        return Err(Error::Invalid("catalog title must not be empty".to_string()));
    }
    let result = sqlx::query(
        "INSERT INTO supplier_catalogs (supplier_id, title, description, file_path, file_url, doc_type) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(supplier_id)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(&input.file_path)
    .bind(&input.file_url)
    .bind(&input.doc_type)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

pub(crate) async fn insert_quote(
    tx: &mut Transaction<'static, Sqlite>,
    supplier_id: i64,
    input: &QuoteCreate,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO supplier_quotes
            (supplier_id, project_code, reference, description, amount, currency,
             lead_time_days, valid_until, status, attachment_path, notes, received_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(supplier_id)
    .bind(&input.project_code)
    .bind(&input.reference)
    .bind(&input.description)
    .bind(input.amount)
    .bind(&input.currency)
    .bind(input.lead_time_days)
    .bind(&input.valid_until)
    .bind(&input.status)
    .bind(&input.attachment_path)
    .bind(&input.notes)
    .bind(&input.received_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (PmoDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = PmoDb::connect(&tmp.path().join("pmo.db")).await.unwrap();
        (db, tmp)
    }

    fn supplier(company: &str) -> SupplierCreate {
        SupplierCreate {
            company: company.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_supplier_crud_and_cascade() {
        let (db, _tmp) = setup_test_db().await;

        let created = db
            .create_supplier(&SupplierCreate {
                company: "Acme Tools".to_string(),
                domain: Some("acme.com".to_string()),
                contacts: vec![ContactCreate {
                    name: "Jane".to_string(),
                    email: Some("jane@acme.com".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        db.create_quote(
            created.id,
            &QuoteCreate {
                description: "Fixture".to_string(),
                amount: Some(1200.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let detail = db.get_supplier_detail(created.id).await.unwrap();
        assert_eq!(detail.summary.contact_count, 1);
        assert_eq!(detail.quotes[0].currency, "USD");
        assert_eq!(detail.quotes[0].status, "received");

        let updated = db
            .update_supplier(
                created.id,
                &SupplierUpdate {
                    country: Some("BR".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.company, "Acme Tools");
        assert_eq!(updated.country.as_deref(), Some("BR"));

        db.delete_supplier(created.id).await.unwrap();
        assert!(db.list_all_contacts().await.unwrap().is_empty());
        assert!(db.list_all_quotes().await.unwrap().is_empty());
        assert!(matches!(
            db.delete_supplier(created.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_company_conflicts() {
        let (db, _tmp) = setup_test_db().await;
        db.create_supplier(&supplier("Acme")).await.unwrap();
        assert!(matches!(
            db.create_supplier(&supplier("Acme")).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_nested_create_rolls_back() {
        let (db, _tmp) = setup_test_db().await;
        let result = db
            .create_supplier(&SupplierCreate {
                company: "Broken".to_string(),
                contacts: vec![ContactCreate::default()],
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(Error::Invalid(_))));
        assert!(db.list_all_suppliers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_project_links_and_filters() {
        let (db, _tmp) = setup_test_db().await;
        let a = db.create_supplier(&supplier("Alpha Robotics")).await.unwrap();
        db.create_supplier(&supplier("Beta Sensors")).await.unwrap();

        let link = SupplierProjectCreate {
            project_code: "01001".to_string(),
            role: None,
            status: "active".to_string(),
        };
        db.link_project(a.id, &link).await.unwrap();
        assert!(matches!(
            db.link_project(a.id, &link).await,
            Err(Error::Conflict(_))
        ));

        let filtered = db
            .list_suppliers(&SupplierFilter {
                project_code: Some("01001".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].project_codes, vec!["01001"]);

        let searched = db
            .list_suppliers(&SupplierFilter {
                search: Some("sens".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched[0].company, "Beta Sensors");

        db.unlink_project(a.id, "01001").await.unwrap();
        assert!(matches!(
            db.unlink_project(a.id, "01001").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_task_create_update_and_order() {
        let (db, _tmp) = setup_test_db().await;
        let task = |id: &str, start: Option<&str>| TaskCreate {
            task_id: id.to_string(),
            name: format!("Task {}", id),
            category: None,
            start_date: start.map(String::from),
            end_date: None,
            status: "pending".to_string(),
            depends_on: None,
            assignee: None,
            supplier: None,
            notes: None,
            is_critical: false,
        };

        db.create_task("01001", &task("T3", None)).await.unwrap();
        db.create_task("01001", &task("T2", Some("2025-05-01"))).await.unwrap();
        db.create_task("01001", &task("T1", Some("2025-04-01"))).await.unwrap();
        assert!(matches!(
            db.create_task("01001", &task("T1", None)).await,
            Err(Error::Conflict(_))
        ));

        let ids: Vec<String> = db
            .list_tasks("01001")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);

        let updated = db
            .update_task(
                "01001",
                "T3",
                &TaskUpdate {
                    status: Some("done".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, "done");
        assert_eq!(updated.name, "Task T3");
        assert!(matches!(
            db.update_task("01001", "T9", &TaskUpdate::default()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_alerts_dismiss() {
        let (db, _tmp) = setup_test_db().await;
        let alert = db
            .create_alert(&AlertCreate {
                project_code: Some("01001".to_string()),
                alert_type: "deadline".to_string(),
                severity: "warning".to_string(),
                title: "Quote expiring".to_string(),
                message: None,
            })
            .await
            .unwrap();

        let unread = AlertFilter {
            unread_only: true,
            ..Default::default()
        };
        assert_eq!(db.list_alerts(&unread).await.unwrap().len(), 1);

        let dismissed = db.dismiss_alert(alert.id).await.unwrap();
        assert!(dismissed.is_read);
        assert!(dismissed.dismissed_at.is_some());
        assert!(db.list_alerts(&unread).await.unwrap().is_empty());
        assert!(matches!(db.dismiss_alert(999).await, Err(Error::NotFound(_))));
    }
}
