//! Google Sheets mirror of the supplier tables
//!
//! Export clears and rewrites four tabs; import upserts rows back into the
//! database, matching by ID first and a natural key second. Import never
//! deletes rows.

use super::{conflict_on_unique, PmoDb};
use crate::config::SheetsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{Sqlite, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const SUPPLIERS_TAB: &str = "Suppliers";
pub const CONTACTS_TAB: &str = "Contacts";
pub const QUOTES_TAB: &str = "Quotes";
pub const CATALOGS_TAB: &str = "Catalogs";

pub const SUPPLIER_HEADERS: &[&str] =
    &["ID", "Company", "Domain", "Category", "Country", "Website", "Notes"];
pub const CONTACT_HEADERS: &[&str] =
    &["ID", "Supplier ID", "Company", "Name", "Email", "Phone", "Role", "Primary"];
pub const QUOTE_HEADERS: &[&str] = &[
    "ID",
    "Supplier ID",
    "Company",
    "Project",
    "Reference",
    "Description",
    "Amount",
    "Currency",
    "Lead Time (days)",
    "Valid Until",
    "Status",
    "Received Date",
];
pub const CATALOG_HEADERS: &[&str] =
    &["ID", "Supplier ID", "Company", "Title", "Description", "Type", "File Path", "URL"];

const TABS: [(&str, &[&str]); 4] = [
    (SUPPLIERS_TAB, SUPPLIER_HEADERS),
    (CONTACTS_TAB, CONTACT_HEADERS),
    (QUOTES_TAB, QUOTE_HEADERS),
    (CATALOGS_TAB, CATALOG_HEADERS),
];

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Transport for a single spreadsheet
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Create any of `tabs` that do not exist yet
    async fn ensure_tabs(&self, tabs: &[&str]) -> Result<()>;

    async fn clear(&self, tab: &str) -> Result<()>;

    /// Write `rows` starting at A1
    async fn write(&self, tab: &str, rows: Vec<Vec<String>>) -> Result<()>;

    async fn read(&self, tab: &str) -> Result<Vec<Vec<String>>>;
}

// ===== Google Sheets API v4 =====

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

enum Auth {
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<(String, Instant)>>,
    },
    Static(String),
}

/// Sheets API client authorised with a service account
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    api_base: String,
    sheet_id: String,
    auth: Auth,
}

impl GoogleSheetsClient {
    /// Build from config; `SheetsNotConfigured` when the sheet id or credentials are missing
    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        let sheet_id = config
            .sheet_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::SheetsNotConfigured("GOOGLE_SHEET_ID is not set".to_string()))?;
        let credentials = config.credentials_path.as_deref().ok_or_else(|| {
            Error::SheetsNotConfigured("GOOGLE_CREDENTIALS_PATH is not set".to_string())
        })?;
        Self::with_service_account(&config.api_base, &sheet_id, credentials)
    }

    pub fn with_service_account(api_base: &str, sheet_id: &str, credentials: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(credentials).map_err(|e| {
            Error::SheetsNotConfigured(format!("cannot read {}: {}", credentials.display(), e))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&content)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            auth: Auth::ServiceAccount {
                key,
                cached: Mutex::new(None),
            },
        })
    }

    /// Client using a fixed bearer token
    pub fn with_token(api_base: &str, sheet_id: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            auth: Auth::Static(token.to_string()),
        }
    }

    async fn token(&self) -> Result<String> {
        let (key, cached) = match &self.auth {
            Auth::Static(token) => return Ok(token.clone()),
            Auth::ServiceAccount { key, cached } => (key, cached),
        };

        if let Ok(guard) = cached.lock() {
            if let Some((token, expires)) = guard.as_ref() {
                if Instant::now() < *expires {
                    return Ok(token.clone());
                }
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &key.client_email,
            scope: SHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(key.private_key.as_bytes())?,
        )?;

        debug!("Requesting OAuth token for {}", key.client_email);
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        // Refresh a minute early
        let ttl = Duration::from_secs(token.expires_in.saturating_sub(60));
        if let Ok(mut guard) = cached.lock() {
            *guard = Some((token.access_token.clone(), Instant::now() + ttl));
        }
        Ok(token.access_token)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.api_base, self.sheet_id, suffix)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Sheets(format!("{}: {}", status, body)))
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn ensure_tabs(&self, tabs: &[&str]) -> Result<()> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.url(""))
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(&token)
            .send()
            .await?;
        let meta: Value = check(response).await?.json().await?;

        let existing: HashSet<&str> = meta["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s["properties"]["title"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        let requests: Vec<Value> = tabs
            .iter()
            .filter(|t| !existing.contains(**t))
            .map(|t| json!({"addSheet": {"properties": {"title": t}}}))
            .collect();
        if requests.is_empty() {
            return Ok(());
        }

        info!("Creating {} sheet tab(s)", requests.len());
        let response = self
            .http
            .post(self.url(":batchUpdate"))
            .bearer_auth(&token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn clear(&self, tab: &str) -> Result<()> {
        let token = self.token().await?;
        let response = self
            .http
            .post(self.url(&format!("/values/{}:clear", tab)))
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn write(&self, tab: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let token = self.token().await?;
        let response = self
            .http
            .put(self.url(&format!("/values/{}!A1", tab)))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn read(&self, tab: &str) -> Result<Vec<Vec<String>>> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.url(&format!("/values/{}", tab)))
            .bearer_auth(&token)
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        let rows = body["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_text).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ===== In-memory sheet =====

/// Spreadsheet held in memory
#[derive(Default)]
pub struct MemorySheet {
    tabs: Mutex<BTreeMap<String, Vec<Vec<String>>>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, tab: &str) -> Vec<Vec<String>> {
        self.tabs
            .lock()
            .map(|tabs| tabs.get(tab).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn set_rows(&self, tab: &str, rows: Vec<Vec<String>>) {
        if let Ok(mut tabs) = self.tabs.lock() {
            tabs.insert(tab.to_string(), rows);
        }
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Sheets("memory sheet lock poisoned".to_string())
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn ensure_tabs(&self, tabs: &[&str]) -> Result<()> {
        let mut guard = self.tabs.lock().map_err(poisoned)?;
        for tab in tabs {
            guard.entry(tab.to_string()).or_default();
        }
        Ok(())
    }

    async fn clear(&self, tab: &str) -> Result<()> {
        self.tabs.lock().map_err(poisoned)?.insert(tab.to_string(), Vec::new());
        Ok(())
    }

    async fn write(&self, tab: &str, rows: Vec<Vec<String>>) -> Result<()> {
        self.tabs.lock().map_err(poisoned)?.insert(tab.to_string(), rows);
        Ok(())
    }

    async fn read(&self, tab: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.rows(tab))
    }
}

// ===== Export =====

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RowCounts {
    pub suppliers: usize,
    pub contacts: usize,
    pub quotes: usize,
    pub catalogs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportResult {
    pub status: String,
    pub sheet_url: String,
    pub rows_synced: RowCounts,
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn bool_cell(value: bool) -> String {
    let text = if value { "TRUE" } else { "FALSE" };
    text.to_string()
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Rewrite every tab from the database
pub async fn export_to_sheet(
    db: &PmoDb,
    client: &dyn SheetClient,
    sheet_id: &str,
) -> Result<ExportResult> {
    let suppliers = db.list_all_suppliers().await?;
    let contacts = db.list_all_contacts().await?;
    let quotes = db.list_all_quotes().await?;
    let catalogs = db.list_all_catalogs().await?;

    let company: HashMap<i64, &str> = suppliers.iter().map(|s| (s.id, s.company.as_str())).collect();
    let company_of = |id: i64| company.get(&id).map(|c| c.to_string()).unwrap_or_default();

    let mut supplier_rows = vec![header(SUPPLIER_HEADERS)];
    supplier_rows.extend(suppliers.iter().map(|s| {
        vec![
            s.id.to_string(),
            s.company.clone(),
            cell(s.domain.as_ref()),
            cell(s.category.as_ref()),
            cell(s.country.as_ref()),
            cell(s.website.as_ref()),
            cell(s.notes.as_ref()),
        ]
    }));

    let mut contact_rows = vec![header(CONTACT_HEADERS)];
    contact_rows.extend(contacts.iter().map(|c| {
        vec![
            c.id.to_string(),
            c.supplier_id.to_string(),
            company_of(c.supplier_id),
            c.name.clone(),
            cell(c.email.as_ref()),
            cell(c.phone.as_ref()),
            cell(c.role.as_ref()),
            bool_cell(c.is_primary),
        ]
    }));

    let mut quote_rows = vec![header(QUOTE_HEADERS)];
    quote_rows.extend(quotes.iter().map(|q| {
        vec![
            q.id.to_string(),
            q.supplier_id.to_string(),
            company_of(q.supplier_id),
            cell(q.project_code.as_ref()),
            cell(q.reference.as_ref()),
            q.description.clone(),
            cell(q.amount),
            q.currency.clone(),
            cell(q.lead_time_days),
            cell(q.valid_until.as_ref()),
            q.status.clone(),
            cell(q.received_at.as_ref()),
        ]
    }));

    let mut catalog_rows = vec![header(CATALOG_HEADERS)];
    catalog_rows.extend(catalogs.iter().map(|c| {
        vec![
            c.id.to_string(),
            c.supplier_id.to_string(),
            company_of(c.supplier_id),
            c.title.clone(),
            cell(c.description.as_ref()),
            cell(c.doc_type.as_ref()),
            cell(c.file_path.as_ref()),
            cell(c.file_url.as_ref()),
        ]
    }));

    let tab_names: Vec<&str> = TABS.iter().map(|(name, _)| *name).collect();
    client.ensure_tabs(&tab_names).await?;
    for (tab, rows) in [
        (SUPPLIERS_TAB, supplier_rows),
        (CONTACTS_TAB, contact_rows),
        (QUOTES_TAB, quote_rows),
        (CATALOGS_TAB, catalog_rows),
    ] {
        client.clear(tab).await?;
        client.write(tab, rows).await?;
    }

    let result = ExportResult {
        status: "ok".to_string(),
        sheet_url: format!("https://docs.google.com/spreadsheets/d/{}", sheet_id),
        rows_synced: RowCounts {
            suppliers: suppliers.len(),
            contacts: contacts.len(),
            quotes: quotes.len(),
            catalogs: catalogs.len(),
        },
    };
    info!("Synced to sheet: {:?}", result.rows_synced);
    Ok(result)
}

// ===== Import =====

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportCounts {
    pub imported: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportStats {
    pub suppliers: ImportCounts,
    pub contacts: ImportCounts,
    pub quotes: ImportCounts,
    pub catalogs: ImportCounts,
}

impl ImportStats {
    pub fn total_imported(&self) -> usize {
        self.suppliers.imported + self.contacts.imported + self.quotes.imported + self.catalogs.imported
    }
}

fn pad(mut row: Vec<String>, width: usize) -> Vec<String> {
    if row.len() < width {
        row.resize(width, String::new());
    }
    row
}

fn opt(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Positive integer id; zero and blanks mean "no id"
fn parse_id(cell: &str) -> Option<i64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .map(|f| f as i64)
        .filter(|id| *id > 0)
}

fn parse_int(cell: &str) -> Option<i64> {
    cell.trim().parse::<f64>().ok().map(|f| f as i64)
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

fn parse_bool(cell: &str) -> bool {
    matches!(cell.trim().to_uppercase().as_str(), "TRUE" | "1" | "YES")
}

async fn read_tab(client: &dyn SheetClient, tab: &str) -> Vec<Vec<String>> {
    match client.read(tab).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Failed to read sheet '{}': {}", tab, e);
            Vec::new()
        }
    }
}

async fn row_exists(tx: &mut Transaction<'static, Sqlite>, table: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let (n,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(&mut **tx).await?;
    Ok(n > 0)
}

struct SupplierLookup {
    ids: HashSet<i64>,
    by_name: HashMap<String, i64>,
}

impl SupplierLookup {
    async fn load(tx: &mut Transaction<'static, Sqlite>) -> Result<Self> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, company FROM suppliers")
            .fetch_all(&mut **tx)
            .await?;
        Ok(Self {
            ids: rows.iter().map(|(id, _)| *id).collect(),
            by_name: rows.into_iter().map(|(id, c)| (c.to_lowercase(), id)).collect(),
        })
    }

    fn resolve(&self, supplier_id: Option<i64>, company: &str) -> Option<i64> {
        if let Some(id) = supplier_id.filter(|id| self.ids.contains(id)) {
            return Some(id);
        }
        let company = company.trim();
        if company.is_empty() {
            return None;
        }
        self.by_name.get(&company.to_lowercase()).copied()
    }
}

async fn import_suppliers(
    tx: &mut Transaction<'static, Sqlite>,
    rows: Vec<Vec<String>>,
) -> Result<ImportCounts> {
    let mut counts = ImportCounts::default();
    for row in rows.into_iter().skip(1) {
        let row = pad(row, SUPPLIER_HEADERS.len());
        let Some(company) = opt(&row[1]) else {
            continue;
        };
        let (domain, category, country, website, notes) =
            (opt(&row[2]), opt(&row[3]), opt(&row[4]), opt(&row[5]), opt(&row[6]));

        let mut target = None;
        if let Some(id) = parse_id(&row[0]) {
            if row_exists(tx, "suppliers", id).await? {
                target = Some(id);
            }
        }
        if target.is_none() {
            let found: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM suppliers WHERE lower(company) = lower(?) LIMIT 1")
                    .bind(&company)
                    .fetch_optional(&mut **tx)
                    .await?;
            target = found.map(|(id,)| id);
        }

        match target {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE suppliers
                    SET company = ?, domain = COALESCE(?, domain), category = ?, country = ?,
                        website = ?, notes = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&company)
                .bind(&domain)
                .bind(&category)
                .bind(&country)
                .bind(&website)
                .bind(&notes)
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(|e| conflict_on_unique(e, || format!("Supplier '{}' already exists", company)))?;
                counts.updated += 1;
            }
            None => {
                sqlx::query(
                    "INSERT INTO suppliers (company, domain, category, country, website, notes) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&company)
                .bind(&domain)
                .bind(&category)
                .bind(&country)
                .bind(&website)
                .bind(&notes)
                .execute(&mut **tx)
                .await?;
                counts.imported += 1;
            }
        }
    }
    Ok(counts)
}

async fn import_contacts(
    tx: &mut Transaction<'static, Sqlite>,
    rows: Vec<Vec<String>>,
    lookup: &SupplierLookup,
) -> Result<ImportCounts> {
    let mut counts = ImportCounts::default();
    for row in rows.into_iter().skip(1) {
        let row = pad(row, CONTACT_HEADERS.len());
        let Some(name) = opt(&row[3]) else {
            continue;
        };
        let Some(supplier_id) = lookup.resolve(parse_id(&row[1]), &row[2]) else {
            warn!("Could not resolve supplier for contact '{}'", name);
            continue;
        };
        let (email, phone, role) = (opt(&row[4]), opt(&row[5]), opt(&row[6]));
        let is_primary = parse_bool(&row[7]);

        let mut target = None;
        if let Some(id) = parse_id(&row[0]) {
            if row_exists(tx, "supplier_contacts", id).await? {
                target = Some(id);
            }
        }
        if target.is_none() {
            if let Some(email) = &email {
                let found: Option<(i64,)> = sqlx::query_as(
                    "SELECT id FROM supplier_contacts WHERE email = ? AND supplier_id = ? LIMIT 1",
                )
                .bind(email)
                .bind(supplier_id)
                .fetch_optional(&mut **tx)
                .await?;
                target = found.map(|(id,)| id);
            }
        }

        match target {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE supplier_contacts
                    SET supplier_id = ?, name = ?, email = COALESCE(?, email),
                        phone = COALESCE(?, phone), role = COALESCE(?, role), is_primary = ?
                    WHERE id = ?
                    "#,
                )
                .bind(supplier_id)
                .bind(&name)
                .bind(&email)
                .bind(&phone)
                .bind(&role)
                .bind(is_primary)
                .bind(id)
                .execute(&mut **tx)
                .await?;
                counts.updated += 1;
            }
            None => {
                sqlx::query(
                    "INSERT INTO supplier_contacts (supplier_id, name, email, phone, role, is_primary) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(supplier_id)
                .bind(&name)
                .bind(&email)
                .bind(&phone)
                .bind(&role)
                .bind(is_primary)
                .execute(&mut **tx)
                .await?;
                counts.imported += 1;
            }
        }
    }
    Ok(counts)
}

async fn import_quotes(
    tx: &mut Transaction<'static, Sqlite>,
    rows: Vec<Vec<String>>,
    lookup: &SupplierLookup,
) -> Result<ImportCounts> {
    let mut counts = ImportCounts::default();
    for row in rows.into_iter().skip(1) {
        let row = pad(row, QUOTE_HEADERS.len());
        let Some(description) = opt(&row[5]) else {
            continue;
        };
        let Some(supplier_id) = lookup.resolve(parse_id(&row[1]), &row[2]) else {
            warn!("Could not resolve supplier for quote '{}'", description);
            continue;
        };
        let reference = opt(&row[4]);

        let mut target = None;
        if let Some(id) = parse_id(&row[0]) {
            if row_exists(tx, "supplier_quotes", id).await? {
                target = Some(id);
            }
        }
        if target.is_none() {
            if let Some(reference) = &reference {
                let found: Option<(i64,)> = sqlx::query_as(
                    "SELECT id FROM supplier_quotes WHERE reference = ? AND supplier_id = ? LIMIT 1",
                )
                .bind(reference)
                .bind(supplier_id)
                .fetch_optional(&mut **tx)
                .await?;
                target = found.map(|(id,)| id);
            }
        }

        let sql = match target {
            Some(_) => {
                r#"
                UPDATE supplier_quotes
                SET supplier_id = ?, project_code = ?, reference = ?, description = ?, amount = ?,
                    currency = ?, lead_time_days = ?, valid_until = ?, status = ?, received_at = ?
                WHERE id = ?
                "#
            }
            None => {
                r#"
                INSERT INTO supplier_quotes
                    (supplier_id, project_code, reference, description, amount, currency,
                     lead_time_days, valid_until, status, received_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            }
        };
        let mut query = sqlx::query(sql)
            .bind(supplier_id)
            .bind(opt(&row[3]))
            .bind(&reference)
            .bind(&description)
            .bind(parse_float(&row[6]))
            .bind(opt(&row[7]).unwrap_or_else(|| "USD".to_string()))
            .bind(parse_int(&row[8]))
            .bind(opt(&row[9]))
            .bind(opt(&row[10]).unwrap_or_else(|| "received".to_string()))
            .bind(opt(&row[11]));
        if let Some(id) = target {
            query = query.bind(id);
        }
        query.execute(&mut **tx).await?;

        if target.is_some() {
            counts.updated += 1;
        } else {
            counts.imported += 1;
        }
    }
    Ok(counts)
}

async fn import_catalogs(
    tx: &mut Transaction<'static, Sqlite>,
    rows: Vec<Vec<String>>,
    lookup: &SupplierLookup,
) -> Result<ImportCounts> {
    let mut counts = ImportCounts::default();
    for row in rows.into_iter().skip(1) {
        let row = pad(row, CATALOG_HEADERS.len());
        let Some(title) = opt(&row[3]) else {
            continue;
        };
        let Some(supplier_id) = lookup.resolve(parse_id(&row[1]), &row[2]) else {
            warn!("Could not resolve supplier for catalog '{}'", title);
            continue;
        };

        let mut target = None;
        if let Some(id) = parse_id(&row[0]) {
            if row_exists(tx, "supplier_catalogs", id).await? {
                target = Some(id);
            }
        }
        if target.is_none() {
            let found: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM supplier_catalogs WHERE title = ? AND supplier_id = ? LIMIT 1",
            )
            .bind(&title)
            .bind(supplier_id)
            .fetch_optional(&mut **tx)
            .await?;
            target = found.map(|(id,)| id);
        }

        let sql = match target {
            Some(_) => {
                "UPDATE supplier_catalogs SET supplier_id = ?, title = ?, description = ?, doc_type = ?, file_path = ?, file_url = ? WHERE id = ?"
            }
            None => {
                "INSERT INTO supplier_catalogs (supplier_id, title, description, doc_type, file_path, file_url) VALUES (?, ?, ?, ?, ?, ?)"
            }
        };
        let mut query = sqlx::query(sql)
            .bind(supplier_id)
            .bind(&title)
            .bind(opt(&row[4]))
            .bind(opt(&row[5]))
            .bind(opt(&row[6]))
            .bind(opt(&row[7]));
        if let Some(id) = target {
            query = query.bind(id);
        }
        query.execute(&mut **tx).await?;

        if target.is_some() {
            counts.updated += 1;
        } else {
            counts.imported += 1;
        }
    }
    Ok(counts)
}

/// Upsert sheet rows into the database in one transaction
pub async fn import_from_sheet(db: &PmoDb, client: &dyn SheetClient) -> Result<ImportStats> {
    let tab_names: Vec<&str> = TABS.iter().map(|(name, _)| *name).collect();
    client.ensure_tabs(&tab_names).await?;

    let supplier_rows = read_tab(client, SUPPLIERS_TAB).await;
    let contact_rows = read_tab(client, CONTACTS_TAB).await;
    let quote_rows = read_tab(client, QUOTES_TAB).await;
    let catalog_rows = read_tab(client, CATALOGS_TAB).await;

    let mut tx = db.begin().await?;
    let suppliers = import_suppliers(&mut tx, supplier_rows).await?;
    let lookup = SupplierLookup::load(&mut tx).await?;
    let stats = ImportStats {
        suppliers,
        contacts: import_contacts(&mut tx, contact_rows, &lookup).await?,
        quotes: import_quotes(&mut tx, quote_rows, &lookup).await?,
        catalogs: import_catalogs(&mut tx, catalog_rows, &lookup).await?,
    };
    tx.commit().await?;

    info!("Synced from sheet: {:?}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmo::{ContactCreate, QuoteCreate, SupplierCreate};
    use tempfile::TempDir;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (PmoDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = PmoDb::connect(&tmp.path().join("pmo.db")).await.unwrap();
        (db, tmp)
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_export_then_import_imports_nothing() {
        let (db, _tmp) = setup().await;
        let sheet = MemorySheet::new();

        let exported = export_to_sheet(&db, &sheet, "abc").await.unwrap();
        assert_eq!(exported.rows_synced, RowCounts::default());
        assert_eq!(exported.sheet_url, "https://docs.google.com/spreadsheets/d/abc");
        assert_eq!(sheet.rows(SUPPLIERS_TAB), vec![header(SUPPLIER_HEADERS)]);

        let stats = import_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(stats, ImportStats::default());
    }

    #[tokio::test]
    async fn test_export_writes_rows_and_booleans() {
        let (db, _tmp) = setup().await;
        let sheet = MemorySheet::new();
        let supplier = db
            .create_supplier(&SupplierCreate {
                company: "Acme".to_string(),
                contacts: vec![ContactCreate {
                    name: "Jane".to_string(),
                    is_primary: true,
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        db.create_quote(
            supplier.id,
            &QuoteCreate {
                description: "Gripper".to_string(),
                amount: Some(99.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let exported = export_to_sheet(&db, &sheet, "abc").await.unwrap();
        assert_eq!(exported.rows_synced.suppliers, 1);

        let contacts = sheet.rows(CONTACTS_TAB);
        assert_eq!(contacts[1][2], "Acme");
        assert_eq!(contacts[1][7], "TRUE");
        let quotes = sheet.rows(QUOTES_TAB);
        assert_eq!(quotes[1][6], "99.5");
        assert_eq!(quotes[1][7], "USD");

        // Re-import of our own export only updates
        let stats = import_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(stats.total_imported(), 0);
        assert_eq!(stats.suppliers.updated, 1);
        assert_eq!(stats.contacts.updated, 1);
        assert_eq!(stats.quotes.updated, 1);
    }

    #[tokio::test]
    async fn test_import_matches_by_natural_key() {
        let (db, _tmp) = setup().await;
        let sheet = MemorySheet::new();
        db.create_supplier(&SupplierCreate {
            company: "Acme".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        sheet.set_rows(
            SUPPLIERS_TAB,
            vec![
                header(SUPPLIER_HEADERS),
                row(&["", "acme", "acme.com", "Tooling"]),
                row(&["", "Beta", "", "", "DE"]),
                row(&["", "   "]),
            ],
        );
        sheet.set_rows(
            CONTACTS_TAB,
            vec![
                header(CONTACT_HEADERS),
                row(&["", "", "Beta", "Hans", "hans@beta.de", "", "", "yes"]),
                row(&["", "", "Unknown Co", "Ghost"]),
            ],
        );
        sheet.set_rows(
            QUOTES_TAB,
            vec![
                header(QUOTE_HEADERS),
                row(&["", "", "Beta", "01001", "Q-1", "Sensors", "10"]),
                row(&["", "", "Beta", "01001", "Q-1", "Sensors v2", "12"]),
            ],
        );

        let stats = import_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(stats.suppliers, ImportCounts { imported: 1, updated: 1 });
        assert_eq!(stats.contacts, ImportCounts { imported: 1, updated: 0 });
        assert_eq!(stats.quotes, ImportCounts { imported: 1, updated: 1 });

        let acme = db.find_supplier_by_company("ACME").await.unwrap().unwrap();
        assert_eq!(acme.company, "acme");
        assert_eq!(acme.category.as_deref(), Some("Tooling"));

        let contacts = db.list_all_contacts().await.unwrap();
        assert!(contacts[0].is_primary);

        let quotes = db.list_all_quotes().await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].description, "Sensors v2");
        assert_eq!(quotes[0].status, "received");
    }

    #[tokio::test]
    async fn test_google_client_reads_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet-1/values/Suppliers"))
            .and(header_eq("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Suppliers!A1:G2",
                "values": [["ID", "Company"], [1, "Acme"]]
            })))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_token(&server.uri(), "sheet-1", "tok");
        let rows = client.read("Suppliers").await.unwrap();
        assert_eq!(rows, vec![row(&["ID", "Company"]), row(&["1", "Acme"])]);
    }

    #[tokio::test]
    async fn test_google_client_creates_missing_tabs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [{"properties": {"title": "Suppliers"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sheet-1:batchUpdate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_token(&server.uri(), "sheet-1", "tok");
        client.ensure_tabs(&[SUPPLIERS_TAB, CONTACTS_TAB]).await.unwrap();
    }

    #[tokio::test]
    async fn test_google_client_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sheet-1/values/Quotes:clear"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let client = GoogleSheetsClient::with_token(&server.uri(), "sheet-1", "tok");
        let err = client.clear(QUOTES_TAB).await.unwrap_err();
        assert!(matches!(err, Error::Sheets(msg) if msg.contains("denied")));
    }

    #[test]
    fn test_missing_config_is_not_configured() {
        let config = SheetsConfig {
            sheet_id: None,
            credentials_path: None,
            api_base: "http://localhost".to_string(),
        };
        assert!(matches!(
            GoogleSheetsClient::from_config(&config),
            Err(Error::SheetsNotConfigured(_))
        ));
    }
}
