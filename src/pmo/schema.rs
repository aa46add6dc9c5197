//! SQLite schema definition

/// SQL schema for the PMO database
pub const SCHEMA_SQL: &str = r#"
-- Suppliers: companies discovered from email or entered by hand
CREATE TABLE IF NOT EXISTS suppliers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company TEXT NOT NULL UNIQUE,
    domain TEXT,
    category TEXT,
    country TEXT,
    website TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS supplier_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    role TEXT,
    is_primary INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS supplier_projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
    project_code TEXT NOT NULL,
    role TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    UNIQUE(supplier_id, project_code)
);

CREATE TABLE IF NOT EXISTS supplier_catalogs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    file_path TEXT,
    file_url TEXT,
    doc_type TEXT,
    uploaded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS supplier_quotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
    project_code TEXT,
    reference TEXT,
    description TEXT NOT NULL,
    amount REAL,
    currency TEXT NOT NULL DEFAULT 'USD',
    lead_time_days INTEGER,
    valid_until TEXT,
    status TEXT NOT NULL DEFAULT 'received',
    attachment_path TEXT,
    notes TEXT,
    received_at TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS schedule_tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_code TEXT NOT NULL,
    task_id TEXT NOT NULL,
    name TEXT NOT NULL,
    category TEXT,
    start_date TEXT,
    end_date TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    depends_on TEXT,
    assignee TEXT,
    supplier TEXT,
    notes TEXT,
    is_critical INTEGER NOT NULL DEFAULT 0,
    UNIQUE(project_code, task_id)
);

CREATE TABLE IF NOT EXISTS schedule_milestones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_code TEXT NOT NULL,
    milestone_id TEXT NOT NULL,
    name TEXT NOT NULL,
    target_date TEXT,
    status TEXT NOT NULL DEFAULT 'on_track',
    UNIQUE(project_code, milestone_id)
);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_code TEXT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'warning',
    title TEXT NOT NULL,
    message TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    dismissed_at TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_contacts_supplier ON supplier_contacts(supplier_id);
CREATE INDEX IF NOT EXISTS idx_contacts_email ON supplier_contacts(email);
CREATE INDEX IF NOT EXISTS idx_quotes_supplier ON supplier_quotes(supplier_id);
CREATE INDEX IF NOT EXISTS idx_catalogs_supplier ON supplier_catalogs(supplier_id);
CREATE INDEX IF NOT EXISTS idx_links_project ON supplier_projects(project_code);
CREATE INDEX IF NOT EXISTS idx_alerts_project ON alerts(project_code);
"#;
