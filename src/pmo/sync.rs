//! Filesystem to database sync
//!
//! Suppliers and contacts are discovered from the sender addresses of each
//! project's `emails/index.json`; schedules are read from `schedule.json`.
//! Rows absent from the filesystem are left untouched.

use super::{ContactCreate, MilestoneUpsert, PmoDb, SupplierCreate, SupplierProjectCreate, TaskCreate};
use crate::error::{Error, Result};
use crate::registry::ProjectRegistry;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Free webmail providers
pub const FREE_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "outlook.es",
    "outlook.it",
    "hotmail.com",
    "hotmail.es",
    "hotmail.it",
    "yahoo.com",
    "yahoo.es",
    "yahoo.it",
    "yahoo.co.uk",
    "live.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "proton.me",
    "zoho.com",
    "yandex.com",
    "mail.com",
    "gmx.com",
    "gmx.net",
];

/// Our own organisation
pub const INTERNAL_DOMAINS: &[&str] = &["strokmatic.com", "lumesolutions.com", "lume-solutions.com"];

/// Customers, not suppliers
pub const CLIENT_DOMAINS: &[&str] = &[
    "nissan-usa.com",
    "nissan.com",
    "nissan.co.jp",
    "hyundai.com",
    "hyundai-brasil.com",
    "hyundai-motor.com",
    "gm.com",
    "gmc.com",
    "chevrolet.com",
    "stellantis.com",
    "fiat.com",
    "vw.com",
    "volkswagen.com",
    "usiminas.com",
    "arcelormittal.com",
    "arcelormittal.com.br",
    "fundep.com.br",
    "fundep.ufmg.br",
];

/// Automated senders
pub const SERVICE_DOMAINS: &[&str] = &[
    "google.com",
    "docs.google.com",
    "calendar.google.com",
    "linkedin.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "slack.com",
    "teams.microsoft.com",
    "microsoft.com",
    "zoom.us",
    "clickup.com",
    "tasks.clickup.com",
    "thereceptionist.com",
    "processunity.com",
    "mcafee.com",
    "noreply.github.com",
    "github.com",
    "atlassian.com",
    "jira.com",
    "confluence.com",
    "trello.com",
    "notion.so",
    "mailchimp.com",
    "sendgrid.net",
    "amazonses.com",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SupplierSyncStats {
    pub projects_scanned: usize,
    pub suppliers_created: usize,
    pub suppliers_existing: usize,
    pub contacts_created: usize,
    pub contacts_existing: usize,
    pub links_created: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSyncStats {
    pub tasks_created: usize,
    pub tasks_updated: usize,
    pub milestones_created: usize,
    pub milestones_updated: usize,
}

impl ScheduleSyncStats {
    pub fn changed(&self) -> bool {
        self.tasks_created + self.tasks_updated + self.milestones_created + self.milestones_updated
            > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncStats {
    pub suppliers: SupplierSyncStats,
    /// Only projects whose schedule produced changes
    pub schedules: BTreeMap<String, ScheduleSyncStats>,
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Company name guessed from an email domain (`acme-tools.co.uk` -> "Acme Tools")
pub fn prettify_domain(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    let keep = if parts.len() >= 3
        && matches!(parts[parts.len() - 2], "co" | "com" | "org" | "net" | "gov" | "ac")
    {
        parts.len() - 2
    } else {
        parts.len().saturating_sub(1)
    };
    let name = parts[..keep].join(".").replace(['-', '_'], " ");
    title_case(&name)
}

/// Lowercased domain of an address
pub fn extract_domain(email: &str) -> Option<String> {
    let (_, domain) = email.split_once('@')?;
    let domain = domain.trim().to_lowercase();
    (!domain.is_empty()).then_some(domain)
}

/// Free, internal, client and service domains never become suppliers
pub fn is_excluded_domain(domain: &str) -> bool {
    FREE_EMAIL_DOMAINS.contains(&domain)
        || INTERNAL_DOMAINS.contains(&domain)
        || CLIENT_DOMAINS.contains(&domain)
        || SERVICE_DOMAINS
            .iter()
            .any(|s| domain == *s || domain.ends_with(&format!(".{}", s)))
}

fn name_addr_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\s*<(.+?)>$").ok()).as_ref()
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Sender `(email, name)` of an index entry
fn sender_of(entry: &Value) -> Option<(String, String)> {
    let mut email = str_field(entry, "sender_email")
        .or_else(|| str_field(entry, "from_email"))
        .or_else(|| str_field(entry, "from"))?
        .to_lowercase();
    let mut name = str_field(entry, "sender_name")
        .or_else(|| str_field(entry, "from_name"))
        .unwrap_or_default();

    if let Some(caps) = name_addr_re().and_then(|re| re.captures(&email)) {
        if name.is_empty() {
            name = caps[1].trim().to_string();
        }
        email = caps[2].trim().to_lowercase();
    }
    Some((email, name))
}

fn contact_name(email: &str, name: &str) -> String {
    if !name.is_empty() {
        return name.to_string();
    }
    let local = email.split('@').next().unwrap_or_default();
    title_case(&local.replace('.', " "))
}

/// Normalise a schedule date to `YYYY-MM-DD`
pub fn parse_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date().format("%Y-%m-%d").to_string());
        }
    }
    None
}

fn read_json(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to parse {:?}: {}", path, e);
            None
        }
    }
}

fn load_codes(config_root: &Path) -> Vec<String> {
    let path = config_root.join("project-codes.json");
    if !path.exists() {
        warn!("project-codes.json not found at {:?}", path);
        return Vec::new();
    }
    match ProjectRegistry::load(&path) {
        Ok(registry) => registry.codes(),
        Err(e) => {
            warn!("Failed to read project-codes.json: {}", e);
            Vec::new()
        }
    }
}

/// Discover suppliers and contacts from every project's email index
pub async fn sync_suppliers(
    db: &PmoDb,
    pmo_root: &Path,
    codes: &[String],
) -> Result<SupplierSyncStats> {
    let mut stats = SupplierSyncStats::default();
    let mut by_domain = db.suppliers_by_domain().await?;
    let mut known_emails: HashSet<String> = db.contact_emails().await?.into_keys().collect();

    for code in codes {
        let index_path = pmo_root.join(code).join("emails").join("index.json");
        if !index_path.exists() {
            continue;
        }
        stats.projects_scanned += 1;

        let Some(Value::Array(entries)) = read_json(&index_path) else {
            continue;
        };

        // Preserve first-seen domain order
        let mut domains: Vec<String> = Vec::new();
        let mut senders: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for entry in entries.iter().filter(|e| e.is_object()) {
            let Some((email, name)) = sender_of(entry) else {
                continue;
            };
            let Some(domain) = extract_domain(&email) else {
                continue;
            };
            if is_excluded_domain(&domain) {
                continue;
            }
            if !senders.contains_key(&domain) {
                domains.push(domain.clone());
            }
            senders.entry(domain).or_default().push((email, name));
        }

        for domain in domains {
            let supplier_id = match by_domain.get(&domain) {
                Some(id) => {
                    stats.suppliers_existing += 1;
                    *id
                }
                None => {
                    let company = prettify_domain(&domain);
                    let input = SupplierCreate {
                        company: company.clone(),
                        domain: Some(domain.clone()),
                        ..Default::default()
                    };
                    let id = match db.create_supplier(&input).await {
                        Ok(s) => {
                            stats.suppliers_created += 1;
                            info!("Created supplier: {} (domain: {})", company, domain);
                            s.id
                        }
                        // Another domain already produced this company name
                        Err(Error::Conflict(_)) => {
                            stats.suppliers_existing += 1;
                            db.find_supplier_by_company(&company)
                                .await?
                                .map(|s| s.id)
                                .ok_or_else(|| Error::NotFound(company.clone()))?
                        }
                        Err(e) => return Err(e),
                    };
                    by_domain.insert(domain.clone(), id);
                    id
                }
            };

            let mut seen_here = HashSet::new();
            for (email, name) in senders.remove(&domain).unwrap_or_default() {
                if !seen_here.insert(email.clone()) {
                    continue;
                }
                if known_emails.contains(&email) {
                    stats.contacts_existing += 1;
                    continue;
                }
                db.create_contact(
                    supplier_id,
                    &ContactCreate {
                        name: contact_name(&email, &name),
                        email: Some(email.clone()),
                        ..Default::default()
                    },
                )
                .await?;
                known_emails.insert(email);
                stats.contacts_created += 1;
            }

            let link = SupplierProjectCreate {
                project_code: code.clone(),
                role: None,
                status: "active".to_string(),
            };
            match db.link_project(supplier_id, &link).await {
                Ok(_) => stats.links_created += 1,
                Err(Error::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }

    info!("Supplier sync complete: {:?}", stats);
    Ok(stats)
}

fn task_from_json(entry: &Value) -> Option<TaskCreate> {
    let task_id = str_field(entry, "task_id").or_else(|| str_field(entry, "id"))?;
    let depends_on = match entry.get("depends_on") {
        Some(Value::Null) | None => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v.to_string()),
    };
    Some(TaskCreate {
        task_id,
        name: str_field(entry, "name").unwrap_or_default(),
        category: str_field(entry, "category"),
        start_date: entry.get("start_date").and_then(parse_date),
        end_date: entry.get("end_date").and_then(parse_date),
        status: str_field(entry, "status").unwrap_or_else(|| "pending".to_string()),
        depends_on,
        assignee: str_field(entry, "assignee"),
        supplier: str_field(entry, "supplier"),
        notes: str_field(entry, "notes"),
        is_critical: entry.get("is_critical").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn milestone_from_json(entry: &Value) -> Option<MilestoneUpsert> {
    let milestone_id = str_field(entry, "milestone_id").or_else(|| str_field(entry, "id"))?;
    Some(MilestoneUpsert {
        milestone_id,
        name: str_field(entry, "name").unwrap_or_default(),
        target_date: entry.get("target_date").and_then(parse_date),
        status: str_field(entry, "status").unwrap_or_else(|| "on_track".to_string()),
    })
}

/// Upsert tasks and milestones from `<pmo_root>/<code>/schedule.json`
pub async fn sync_schedule(db: &PmoDb, pmo_root: &Path, code: &str) -> Result<ScheduleSyncStats> {
    let mut stats = ScheduleSyncStats::default();
    let path = pmo_root.join(code).join("schedule.json");
    if !path.exists() {
        return Ok(stats);
    }
    let Some(data) = read_json(&path) else {
        return Ok(stats);
    };
    if !data.is_object() {
        warn!("schedule.json for {} is not an object", code);
        return Ok(stats);
    }

    let tasks = data.get("tasks").and_then(Value::as_array).cloned().unwrap_or_default();
    for task in tasks.iter().filter_map(task_from_json) {
        if db.upsert_task(code, &task).await? {
            stats.tasks_created += 1;
        } else {
            stats.tasks_updated += 1;
        }
    }

    let milestones = data
        .get("milestones")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for milestone in milestones.iter().filter_map(milestone_from_json) {
        if db.upsert_milestone(code, &milestone).await? {
            stats.milestones_created += 1;
        } else {
            stats.milestones_updated += 1;
        }
    }

    info!("Schedule sync for {} complete: {:?}", code, stats);
    Ok(stats)
}

/// Full sync: suppliers from email indexes, then every project's schedule
pub async fn run_initial_sync(db: &PmoDb, pmo_root: &Path, config_root: &Path) -> Result<SyncStats> {
    info!("Starting initial sync");
    let codes = load_codes(config_root);

    let suppliers = sync_suppliers(db, pmo_root, &codes).await?;
    let mut schedules = BTreeMap::new();
    for code in &codes {
        let stats = sync_schedule(db, pmo_root, code).await?;
        if stats.changed() {
            schedules.insert(code.clone(), stats);
        }
    }

    let combined = SyncStats { suppliers, schedules };
    info!("Initial sync complete: {:?}", combined);
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup() -> (PmoDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = PmoDb::connect(&tmp.path().join("pmo.db")).await.unwrap();
        (db, tmp)
    }

    fn write_index(root: &Path, code: &str, entries: Value) {
        let dir = root.join(code).join("emails");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.json"), entries.to_string()).unwrap();
    }

    #[test]
    fn test_prettify_domain() {
        assert_eq!(prettify_domain("acme-tools.co.uk"), "Acme Tools");
        assert_eq!(prettify_domain("comau.com"), "Comau");
        assert_eq!(prettify_domain("siemens-ag.de"), "Siemens Ag");
        assert_eq!(prettify_domain("abb.com.br"), "Abb");
    }

    #[test]
    fn test_excluded_domains() {
        assert!(is_excluded_domain("gmail.com"));
        assert!(is_excluded_domain("strokmatic.com"));
        assert!(is_excluded_domain("nissan.co.jp"));
        assert!(is_excluded_domain("mail.github.com"));
        assert!(!is_excluded_domain("acme.com"));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date(&json!("2025-03-04")).as_deref(), Some("2025-03-04"));
        assert_eq!(parse_date(&json!("2025/03/04")).as_deref(), Some("2025-03-04"));
        assert_eq!(parse_date(&json!("04/03/2025")).as_deref(), Some("2025-03-04"));
        assert_eq!(parse_date(&json!("04-03-2025")).as_deref(), Some("2025-03-04"));
        assert_eq!(
            parse_date(&json!("2025-03-04T10:00:00Z")).as_deref(),
            Some("2025-03-04")
        );
        assert_eq!(parse_date(&json!("soon")), None);
        assert_eq!(parse_date(&json!(null)), None);
    }

    #[test]
    fn test_sender_parsing() {
        let entry = json!({"from": "Jane Doe <Jane@Acme.com>"});
        assert_eq!(
            sender_of(&entry),
            Some(("jane@acme.com".to_string(), "Jane Doe".to_string()))
        );
        assert_eq!(contact_name("john.smith@acme.com", ""), "John Smith");
    }

    #[tokio::test]
    async fn test_supplier_sync_skips_free_domains() {
        let (db, tmp) = setup().await;
        let root = tmp.path().join("pmo");
        write_index(
            &root,
            "01001",
            json!([
                {"sender_email": "someone@gmail.com", "sender_name": "Someone"},
                {"sender_email": "bob@strokmatic.com"}
            ]),
        );

        let stats = sync_suppliers(&db, &root, &["01001".to_string()]).await.unwrap();
        assert_eq!(stats.projects_scanned, 1);
        assert_eq!(stats.suppliers_created, 0);
        assert!(db.list_all_suppliers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_free_mail_domain_becomes_a_supplier() {
        let (db, tmp) = setup().await;
        let root = tmp.path().join("pmo");
        let mut entries: Vec<Value> = FREE_EMAIL_DOMAINS
            .iter()
            .map(|domain| json!({"sender_email": format!("person@{}", domain), "sender_name": "Person"}))
            .collect();
        entries.push(json!({"from": "GitHub <noreply@mail.github.com>"}));
        entries.push(json!({"sender_email": "Someone@GMAIL.COM"}));
        assert!(is_excluded_domain("mail.github.com"));
        write_index(&root, "01001", Value::Array(entries));

        let stats = sync_suppliers(&db, &root, &["01001".to_string()]).await.unwrap();
        assert_eq!(stats.projects_scanned, 1);
        assert_eq!(stats.suppliers_created, 0);
        assert_eq!(stats.contacts_created, 0);
        assert!(db.list_all_suppliers().await.unwrap().is_empty());
        assert!(db.list_all_contacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_supplier_sync_is_idempotent() {
        let (db, tmp) = setup().await;
        let root = tmp.path().join("pmo");
        write_index(
            &root,
            "01001",
            json!([
                {"sender_email": "jane@acme-tools.co.uk", "sender_name": "Jane"},
                {"sender_email": "jane@acme-tools.co.uk"},
                {"from": "john.smith@acme-tools.co.uk"}
            ]),
        );
        let codes = vec!["01001".to_string()];

        let first = sync_suppliers(&db, &root, &codes).await.unwrap();
        assert_eq!(first.suppliers_created, 1);
        assert_eq!(first.contacts_created, 2);
        assert_eq!(first.links_created, 1);

        let suppliers = db.list_all_suppliers().await.unwrap();
        assert_eq!(suppliers[0].company, "Acme Tools");
        let names: Vec<String> = db
            .list_all_contacts()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Jane", "John Smith"]);

        let second = sync_suppliers(&db, &root, &codes).await.unwrap();
        assert_eq!(second.suppliers_created, 0);
        assert_eq!(second.suppliers_existing, 1);
        assert_eq!(second.contacts_existing, 2);
        assert_eq!(second.links_created, 0);
    }

    #[tokio::test]
    async fn test_initial_sync_reports_changed_schedules() {
        let (db, tmp) = setup().await;
        let root = tmp.path().join("pmo");
        let config_root = tmp.path().join("config");
        std::fs::create_dir_all(&config_root).unwrap();
        std::fs::write(
            config_root.join("project-codes.json"),
            json!({"01001": {"name": "A"}, "02002": {"name": "B"}}).to_string(),
        )
        .unwrap();

        std::fs::create_dir_all(root.join("01001")).unwrap();
        std::fs::write(
            root.join("01001").join("schedule.json"),
            json!({
                "tasks": [
                    {"id": "T1", "name": "Design", "start_date": "01/02/2025", "depends_on": ["T0"]},
                    {"name": "no id"}
                ],
                "milestones": [{"milestone_id": "M1", "name": "FAT", "target_date": "2025-06-30"}]
            })
            .to_string(),
        )
        .unwrap();

        let stats = run_initial_sync(&db, &root, &config_root).await.unwrap();
        assert_eq!(stats.schedules.len(), 1);
        let s = &stats.schedules["01001"];
        assert_eq!(s.tasks_created, 1);
        assert_eq!(s.milestones_created, 1);

        let tasks = db.list_tasks("01001").await.unwrap();
        assert_eq!(tasks[0].start_date.as_deref(), Some("2025-02-01"));
        assert_eq!(tasks[0].depends_on.as_deref(), Some(r#"["T0"]"#));

        let again = run_initial_sync(&db, &root, &config_root).await.unwrap();
        assert_eq!(again.schedules["01001"].tasks_updated, 1);
        assert_eq!(db.list_tasks("01001").await.unwrap().len(), 1);
    }
}
