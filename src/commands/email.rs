//! Email organizer commands: fetch, classify, parse, ingest, list, reprocess

use crate::config::{Config, MailPaths};
use crate::error::{Error, Result};
use crate::mail::imap::connect_from_config;
use crate::mail::{
    classify, extract_heuristics, fetch_new, list_eml_files, parse_eml, EmailRecord, FetchStats,
    IndexEntry, ProjectMailbox,
};
use crate::progress::{advance_progress, finish_progress, start_progress};
use crate::registry::ProjectRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Number of index entries shown per project by `list`
const LIST_RECENT: usize = 20;

/// Registry plus resolved paths, shared by every email command
struct MailContext {
    home: PathBuf,
    paths: MailPaths,
    registry: ProjectRegistry,
}

impl MailContext {
    fn new(config: &Config) -> Result<Self> {
        let paths = config.mail_paths();
        let registry = ProjectRegistry::load(&paths.project_codes_file)?;
        Ok(Self {
            home: config.jarvis_home.clone(),
            paths,
            registry,
        })
    }

    fn mailbox(&self, code: &str) -> ProjectMailbox {
        ProjectMailbox::new(self.registry.pmo_dir(code, &self.home, &self.paths.pmo_base))
    }
}

/// Counts from classifying a directory of `.eml` files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifyStats {
    pub classified: BTreeMap<String, usize>,
    pub unclassified: usize,
    pub errors: Vec<String>,
}

impl ClassifyStats {
    pub fn total_classified(&self) -> usize {
        self.classified.values().sum()
    }
}

/// Result of `email fetch`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub fetch: FetchStats,
    pub classify: Option<ClassifyStats>,
}

/// Result of parsing one project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    pub project: String,
    pub parsed: usize,
    pub skipped: usize,
    pub total_in_index: usize,
    pub errors: Vec<String>,
}

/// Result of the full pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub fetch: FetchReport,
    pub parsed: Vec<ParseStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectListing {
    pub code: String,
    pub name: String,
    pub total: usize,
    pub recent: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReport {
    pub projects: Vec<ProjectListing>,
    pub unclassified: usize,
    pub unclassified_dir: PathBuf,
}

/// Move a file, copying across filesystems when rename is not possible
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

fn classify_dir(ctx: &MailContext, source: &Path) -> Result<ClassifyStats> {
    let files = list_eml_files(source);
    info!("Classifying {} emails from {:?}", files.len(), source);

    let mut stats = ClassifyStats::default();
    let pb = start_progress(files.len(), "Classifying");

    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
            continue;
        };
        let parsed = match std::fs::read(&path).map_err(Error::from).and_then(|raw| parse_eml(&raw)) {
            Ok(parsed) => parsed,
            Err(e) => {
                let msg = format!("{}: {}", path.display(), e);
                warn!("Cannot parse {}", msg);
                stats.errors.push(msg);
                advance_progress(&pb);
                continue;
            }
        };

        match classify(&parsed, &ctx.registry) {
            Some(code) => {
                let mailbox = ctx.mailbox(&code);
                mailbox.ensure_dirs()?;
                move_file(&path, &mailbox.raw_dir().join(&file_name))?;
                *stats.classified.entry(code).or_default() += 1;
            }
            None => {
                move_file(&path, &ctx.paths.unclassified_dir.join(&file_name))?;
                stats.unclassified += 1;
            }
        }
        advance_progress(&pb);
    }

    finish_progress(pb, "Classified");
    Ok(stats)
}

/// Classify `.eml` files from `source` (default: staging) into project folders
pub fn cmd_classify(config: &Config, source: Option<&Path>) -> Result<ClassifyStats> {
    let ctx = MailContext::new(config)?;
    let source = source
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.paths.staging_dir.clone());

    if !source.is_dir() {
        return Err(Error::NotFound(format!(
            "Source directory not found: {}",
            source.display()
        )));
    }

    classify_dir(&ctx, &source)
}

/// Download new messages from IMAP, optionally classifying staging afterwards
pub async fn cmd_fetch(config: &Config, classify_after: bool) -> Result<FetchReport> {
    let paths = config.mail_paths();
    let mail_config = config.mail.clone();
    let state_file = paths.state_file.clone();
    let staging = paths.staging_dir.clone();

    let fetch = tokio::task::spawn_blocking(move || -> Result<FetchStats> {
        let mut source = connect_from_config(&mail_config)?;
        fetch_new(&mut source, &state_file, &staging)
    })
    .await
    .map_err(|e| Error::Other(format!("IMAP task failed: {}", e)))??;

    let classify = if classify_after {
        let ctx = MailContext::new(config)?;
        Some(classify_dir(&ctx, &paths.staging_dir)?)
    } else {
        None
    };

    Ok(FetchReport { fetch, classify })
}

fn parse_project(ctx: &MailContext, code: &str, force: bool) -> Result<ParseStats> {
    let mailbox = ctx.mailbox(code);
    let raw_dir = mailbox.raw_dir();
    if !raw_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "No raw emails found for project {}",
            code
        )));
    }
    mailbox.ensure_dirs()?;

    let mut index = mailbox.load_index();
    let mut known: HashSet<String> = index.iter().map(|e| e.hash.clone()).collect();
    let mut stats = ParseStats {
        project: code.to_string(),
        ..Default::default()
    };

    let files = mailbox.raw_files();
    let pb = start_progress(files.len(), &format!("Parsing {}", code));

    for path in files {
        let result = parse_one(&mailbox, code, &path, &known, force);
        match result {
            Ok(Some(record)) => {
                if !known.insert(record.hash.clone()) {
                    index.retain(|e| e.hash != record.hash);
                }
                index.push(IndexEntry::from(&record));
                stats.parsed += 1;
            }
            Ok(None) => stats.skipped += 1,
            Err(e) => {
                let msg = format!("{}: {}", path.display(), e);
                warn!("Cannot parse {}", msg);
                stats.errors.push(msg);
            }
        }
        advance_progress(&pb);
    }
    finish_progress(pb, &format!("{} parsed", code));

    index.sort_by(|a, b| {
        a.date
            .as_deref()
            .unwrap_or("")
            .cmp(b.date.as_deref().unwrap_or(""))
    });
    mailbox.save_index(&index)?;
    stats.total_in_index = index.len();

    Ok(stats)
}

/// Parse one raw file; `None` when it is already indexed and not forced
fn parse_one(
    mailbox: &ProjectMailbox,
    code: &str,
    path: &Path,
    known: &HashSet<String>,
    force: bool,
) -> Result<Option<EmailRecord>> {
    let raw = std::fs::read(path)?;
    let parsed = parse_eml(&raw)?;

    if known.contains(&parsed.hash) && !force {
        debug!("Skipping already indexed {:?}", path);
        return Ok(None);
    }

    let heuristics = extract_heuristics(&parsed);
    let attachments = parsed
        .attachments
        .iter()
        .map(|att| mailbox.save_attachment(&parsed.hash, att))
        .collect::<Result<Vec<_>>>()?;

    let record = EmailRecord {
        hash: parsed.hash.clone(),
        source_file: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        subject: parsed.subject,
        sender_name: parsed.sender_name,
        sender_email: parsed.sender_email,
        recipients: parsed.recipients,
        date: parsed.date,
        project_code: code.to_string(),
        body_text: parsed.body_text,
        attachments,
        heuristics,
        message_id: parsed.message_id,
        in_reply_to: parsed.in_reply_to,
        references: parsed.references,
        category: None,
    };
    mailbox.write_record(&record)?;

    Ok(Some(record))
}

/// Parse the raw `.eml` files of a project into records and the index
pub fn cmd_parse(config: &Config, project: &str, force: bool) -> Result<ParseStats> {
    let ctx = MailContext::new(config)?;
    parse_project(&ctx, project, force)
}

/// Re-parse every raw file of a project
pub fn cmd_reprocess(config: &Config, project: &str) -> Result<ParseStats> {
    cmd_parse(config, project, true)
}

/// Fetch with classification, then parse each project holding raw files
pub async fn cmd_ingest(config: &Config) -> Result<IngestReport> {
    let fetch = cmd_fetch(config, true).await?;
    let ctx = MailContext::new(config)?;

    let mut parsed = Vec::new();
    for code in ctx.registry.codes() {
        if ctx.mailbox(&code).raw_files().is_empty() {
            continue;
        }
        info!("Parsing project {}", code);
        parsed.push(parse_project(&ctx, &code, false)?);
    }

    Ok(IngestReport { fetch, parsed })
}

/// Recent index entries per project plus the unclassified backlog
pub fn cmd_list(config: &Config, project: Option<&str>) -> Result<ListReport> {
    let ctx = MailContext::new(config)?;

    let codes = match project {
        Some(code) => vec![code.to_string()],
        None => {
            let mut codes = ctx.registry.codes();
            codes.sort();
            codes
        }
    };

    let projects = codes
        .into_iter()
        .map(|code| {
            let index = ctx.mailbox(&code).load_index();
            let name = ctx
                .registry
                .get(&code)
                .and_then(|i| i.name.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let start = index.len().saturating_sub(LIST_RECENT);
            ProjectListing {
                total: index.len(),
                recent: index[start..].to_vec(),
                code,
                name,
            }
        })
        .collect();

    Ok(ListReport {
        projects,
        unclassified: list_eml_files(&ctx.paths.unclassified_dir).len(),
        unclassified_dir: ctx.paths.unclassified_dir.clone(),
    })
}

pub fn print_classify_stats(stats: &ClassifyStats) {
    println!(
        "✓ Classified: {}, Unclassified: {}",
        stats.total_classified(),
        stats.unclassified
    );
    for (code, count) in &stats.classified {
        println!("  {}: {}", code, count);
    }
    for error in &stats.errors {
        println!("  ! {}", error);
    }
}

pub fn print_fetch_report(report: &FetchReport) {
    println!(
        "✓ Fetched {} new emails to staging ({} project folders)",
        report.fetch.fetched, report.fetch.folders_scanned
    );
    for error in &report.fetch.errors {
        println!("  ! {}", error);
    }
    if let Some(stats) = &report.classify {
        print_classify_stats(stats);
    }
}

pub fn print_parse_stats(stats: &ParseStats) {
    println!(
        "✓ Parsed: {}, Skipped: {}, Total in index: {}",
        stats.parsed, stats.skipped, stats.total_in_index
    );
    for error in &stats.errors {
        println!("  ! {}", error);
    }
}

pub fn print_ingest_report(report: &IngestReport) {
    print_fetch_report(&report.fetch);
    for stats in &report.parsed {
        println!();
        println!("--- Project {} ---", stats.project);
        print_parse_stats(stats);
    }
}

pub fn print_list_report(report: &ListReport) {
    let rule = "=".repeat(60);
    for project in &report.projects {
        println!();
        println!("{}", rule);
        println!(
            "Project {}: {} ({} emails)",
            project.code, project.name, project.total
        );
        println!("{}", rule);

        if project.recent.is_empty() {
            println!("  (no emails)");
            continue;
        }

        for entry in &project.recent {
            let date: String = entry.date.as_deref().unwrap_or("?").chars().take(10).collect();
            let subject: String = if entry.subject.is_empty() {
                "(no subject)".to_string()
            } else {
                entry.subject.chars().take(60).collect()
            };
            let attachments = if entry.attachments.is_empty() {
                String::new()
            } else {
                format!(" [{} att]", entry.attachments.len())
            };
            println!(
                "  {}  {:<30}  {}{}  ({})",
                date,
                entry.sender_email,
                subject,
                attachments,
                entry.category.as_deref().unwrap_or("-")
            );
        }
    }

    if report.unclassified > 0 {
        println!();
        println!(
            "  Unclassified: {} emails in {}",
            report.unclassified,
            report.unclassified_dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WIDGET_MAIL: &str = "From: Jane <jane@acme.com>\r\n\
To: ops@strokmatic.com\r\n\
Subject: Re: widget order\r\n\
Date: Tue, 04 Mar 2025 09:15:00 +0000\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
\r\n\
- confirm quantities by 03/10/2025\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"spec.txt\"\r\n\
\r\n\
widget spec v2\r\n\
--B--\r\n";

    fn setup(tmp: &TempDir) -> Config {
        let home = tmp.path().to_path_buf();
        std::fs::create_dir_all(home.join("config")).unwrap();
        std::fs::write(
            home.join("config").join("project-codes.json"),
            r#"{"01001": {"name": "Widgets", "keywords": ["widget"], "senders": ["acme.com"]},
                "02001": {"name": "Welds", "keywords": ["weld"]}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.jarvis_home = home;
        config.mail = Default::default();
        config
    }

    #[test]
    fn test_classify_moves_files() {
        let tmp = TempDir::new().unwrap();
        let config = setup(&tmp);
        let paths = config.mail_paths();
        std::fs::create_dir_all(&paths.staging_dir).unwrap();
        std::fs::write(paths.staging_dir.join("a.eml"), WIDGET_MAIL).unwrap();
        std::fs::write(
            paths.staging_dir.join("b.eml"),
            "From: someone@gmail.com\r\nSubject: hello\r\n\r\nnothing\r\n",
        )
        .unwrap();

        let stats = cmd_classify(&config, None).unwrap();
        assert_eq!(stats.classified.get("01001"), Some(&1));
        assert_eq!(stats.unclassified, 1);
        assert!(paths.pmo_base.join("01001/emails/raw/a.eml").exists());
        assert!(paths.unclassified_dir.join("b.eml").exists());
        assert!(list_eml_files(&paths.staging_dir).is_empty());
    }

    #[test]
    fn test_classify_missing_source_is_error() {
        let tmp = TempDir::new().unwrap();
        let config = setup(&tmp);
        let result = cmd_classify(&config, Some(&tmp.path().join("nope")));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_parse_is_idempotent_and_force_reparses() {
        let tmp = TempDir::new().unwrap();
        let config = setup(&tmp);
        let raw_dir = config.mail_paths().pmo_base.join("01001/emails/raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join("email_01001_1.eml"), WIDGET_MAIL).unwrap();

        let first = cmd_parse(&config, "01001", false).unwrap();
        assert_eq!((first.parsed, first.skipped, first.total_in_index), (1, 0, 1));

        let second = cmd_parse(&config, "01001", false).unwrap();
        assert_eq!((second.parsed, second.skipped, second.total_in_index), (0, 1, 1));

        let forced = cmd_reprocess(&config, "01001").unwrap();
        assert_eq!((forced.parsed, forced.total_in_index), (1, 1));

        let mailbox = ProjectMailbox::new(config.mail_paths().pmo_base.join("01001"));
        let index = mailbox.load_index();
        assert_eq!(index[0].project_code, "01001");
        assert_eq!(index[0].date.as_deref(), Some("2025-03-04T09:15:00"));
        assert_eq!(index[0].attachments.len(), 1);
        assert_eq!(index[0].attachments[0].text_preview.trim(), "widget spec v2");
        assert_eq!(
            index[0].heuristics.action_items,
            vec!["- confirm quantities by 03/10/2025"]
        );

        let record = mailbox.read_record(&index[0].hash).unwrap();
        assert!(record.body_text.contains("confirm quantities"));
        assert!(record.category.is_none());

        // forced re-parse writes a second copy of the attachment
        let att_dir = mailbox.attachments_dir().join(&index[0].hash[..12]);
        assert_eq!(std::fs::read_dir(att_dir).unwrap().count(), 2);
    }

    #[test]
    fn test_parse_without_raw_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let config = setup(&tmp);
        assert!(matches!(
            cmd_parse(&config, "02001", false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_reports_unclassified() {
        let tmp = TempDir::new().unwrap();
        let config = setup(&tmp);
        let paths = config.mail_paths();
        std::fs::create_dir_all(&paths.unclassified_dir).unwrap();
        std::fs::write(paths.unclassified_dir.join("x.eml"), "From: a@b\r\n\r\n").unwrap();

        let report = cmd_list(&config, None).unwrap();
        assert_eq!(report.projects.len(), 2);
        assert_eq!(report.projects[0].code, "01001");
        assert_eq!(report.projects[0].total, 0);
        assert_eq!(report.unclassified, 1);
    }
}
