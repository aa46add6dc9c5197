//! On-disk layout of a project's mailbox and the IMAP cursor file
//!
//! ```text
//! <pmo>/emails/raw/*.eml
//! <pmo>/emails/parsed/<hash16>.json
//! <pmo>/emails/index.json
//! <pmo>/attachments/<hash12>/<filename>
//! ```

use super::heuristics::Heuristics;
use super::mime::RawAttachment;
use crate::error::Result;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Attachment extensions whose content is previewed as text
pub const TEXT_EXTRACTABLE: [&str; 8] = ["txt", "md", "csv", "json", "xml", "html", "htm", "log"];

/// Attachments larger than this are not previewed
pub const MAX_EXTRACT_BYTES: usize = 512 * 1024;

const TEXT_PREVIEW_CHARS: usize = 500;
const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SavedAttachment {
    pub filename: String,
    /// Relative to the project's PMO directory
    pub path: String,
    pub text_preview: String,
}

/// Full parsed record stored under `emails/parsed/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailRecord {
    pub hash: String,
    pub source_file: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients: Vec<String>,
    pub date: Option<String>,
    pub project_code: String,
    pub body_text: String,
    pub attachments: Vec<SavedAttachment>,
    pub heuristics: Heuristics,
    pub message_id: String,
    pub in_reply_to: String,
    pub references: String,
    pub category: Option<String>,
}

/// Index entry: the record without its body, plus a short preview
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexEntry {
    pub hash: String,
    pub source_file: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients: Vec<String>,
    pub date: Option<String>,
    pub project_code: String,
    pub attachments: Vec<SavedAttachment>,
    pub heuristics: Heuristics,
    pub message_id: String,
    pub in_reply_to: String,
    pub references: String,
    pub category: Option<String>,
    pub body_preview: String,
}

impl From<&EmailRecord> for IndexEntry {
    fn from(r: &EmailRecord) -> Self {
        Self {
            hash: r.hash.clone(),
            source_file: r.source_file.clone(),
            subject: r.subject.clone(),
            sender_name: r.sender_name.clone(),
            sender_email: r.sender_email.clone(),
            recipients: r.recipients.clone(),
            date: r.date.clone(),
            project_code: r.project_code.clone(),
            attachments: r.attachments.clone(),
            heuristics: r.heuristics.clone(),
            message_id: r.message_id.clone(),
            in_reply_to: r.in_reply_to.clone(),
            references: r.references.clone(),
            category: r.category.clone(),
            body_preview: r.body_text.chars().take(BODY_PREVIEW_CHARS).collect(),
        }
    }
}

/// Mail directories of one project
#[derive(Debug, Clone)]
pub struct ProjectMailbox {
    base: PathBuf,
}

impl ProjectMailbox {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.base.join("emails").join("raw")
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.base.join("emails").join("parsed")
    }

    pub fn index_path(&self) -> PathBuf {
        self.base.join("emails").join("index.json")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.base.join("attachments")
    }

    /// Create the raw, parsed and attachment directories
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.raw_dir())?;
        std::fs::create_dir_all(self.parsed_dir())?;
        std::fs::create_dir_all(self.attachments_dir())?;
        Ok(())
    }

    /// Sorted `.eml` files under `emails/raw/`
    pub fn raw_files(&self) -> Vec<PathBuf> {
        list_eml_files(&self.raw_dir())
    }

    /// Load the index; a missing or corrupt file is an empty index
    pub fn load_index(&self) -> Vec<IndexEntry> {
        let path = self.index_path();
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable index {:?}: {}", path, e);
            Vec::new()
        })
    }

    pub fn save_index(&self, index: &[IndexEntry]) -> Result<()> {
        let path = self.index_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(index)?)?;
        Ok(())
    }

    pub fn record_path(&self, hash: &str) -> PathBuf {
        self.parsed_dir()
            .join(format!("{}.json", &hash[..hash.len().min(16)]))
    }

    pub fn write_record(&self, record: &EmailRecord) -> Result<()> {
        std::fs::create_dir_all(self.parsed_dir())?;
        std::fs::write(
            self.record_path(&record.hash),
            serde_json::to_string_pretty(record)?,
        )?;
        Ok(())
    }

    pub fn read_record(&self, hash: &str) -> Option<EmailRecord> {
        let content = std::fs::read_to_string(self.record_path(hash)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Write an attachment under `attachments/<hash12>/`, suffixing `_N` on
    /// name collisions
    pub fn save_attachment(&self, hash: &str, att: &RawAttachment) -> Result<SavedAttachment> {
        let dir = self.attachments_dir().join(&hash[..hash.len().min(12)]);
        std::fs::create_dir_all(&dir)?;

        let target = unique_path(&dir, &att.filename);
        std::fs::write(&target, &att.data)?;
        debug!("Saved attachment {:?}", target);

        let rel = target
            .strip_prefix(&self.base)
            .unwrap_or(&target)
            .to_string_lossy()
            .replace('\\', "/");

        Ok(SavedAttachment {
            filename: att.filename.clone(),
            path: rel,
            text_preview: text_preview(&att.filename, &att.data),
        })
    }
}

/// Sorted `.eml` files directly inside `dir`
pub fn list_eml_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    files.sort();
    files
}

fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(filename);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// First characters of a text-like attachment, empty otherwise
pub fn text_preview(filename: &str, data: &[u8]) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if data.is_empty() || !TEXT_EXTRACTABLE.contains(&ext.as_str()) {
        return String::new();
    }

    let slice = &data[..data.len().min(MAX_EXTRACT_BYTES)];
    let text = String::from_utf8_lossy(slice);
    let text = if ext == "html" || ext == "htm" {
        let doc = Html::parse_document(&text);
        doc.root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        text.into_owned()
    };

    text.chars().take(TEXT_PREVIEW_CHARS).collect()
}

/// Per-folder UIDs already downloaded
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ImapState {
    folders: BTreeMap<String, Vec<String>>,
}

impl ImapState {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn seen(&self, folder: &str) -> BTreeSet<String> {
        self.folders
            .get(folder)
            .map(|uids| uids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace a folder's UID list, kept in numeric order
    pub fn set_seen(&mut self, folder: &str, uids: BTreeSet<String>) {
        let mut list: Vec<String> = uids.into_iter().collect();
        list.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        self.folders.insert(folder.to_string(), list);
    }

    pub fn folders(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.folders.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn attachment(name: &str, data: &[u8]) -> RawAttachment {
        RawAttachment {
            filename: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_attachment_name_collisions_get_suffix() {
        let tmp = TempDir::new().unwrap();
        let mailbox = ProjectMailbox::new(tmp.path());
        let hash = "abcdef0123456789abcdef";

        let first = mailbox.save_attachment(hash, &attachment("notes.txt", b"one")).unwrap();
        let second = mailbox.save_attachment(hash, &attachment("notes.txt", b"two")).unwrap();
        let third = mailbox.save_attachment(hash, &attachment("notes.txt", b"three")).unwrap();

        assert_eq!(first.path, "attachments/abcdef012345/notes.txt");
        assert_eq!(second.path, "attachments/abcdef012345/notes_1.txt");
        assert_eq!(third.path, "attachments/abcdef012345/notes_2.txt");
        assert_eq!(second.text_preview, "two");
    }

    #[test]
    fn test_text_preview_rules() {
        assert_eq!(text_preview("drawing.pdf", b"%PDF-1.4"), "");
        assert_eq!(text_preview("empty.txt", b""), "");
        assert_eq!(text_preview("long.log", &[b'a'; 900]).len(), 500);
        assert_eq!(
            text_preview("page.html", b"<html><body><h1>Title</h1><p>Body</p></body></html>"),
            "Title Body"
        );
    }

    #[test]
    fn test_index_round_trip_and_body_preview() {
        let tmp = TempDir::new().unwrap();
        let mailbox = ProjectMailbox::new(tmp.path());
        let record = EmailRecord {
            hash: "f".repeat(64),
            subject: "Status".to_string(),
            body_text: "x".repeat(400),
            ..Default::default()
        };
        mailbox.write_record(&record).unwrap();
        mailbox.save_index(&[IndexEntry::from(&record)]).unwrap();

        let index = mailbox.load_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].body_preview.len(), 300);
        assert!(mailbox.record_path(&record.hash).ends_with("ffffffffffffffff.json"));
        assert_eq!(mailbox.read_record(&record.hash).unwrap().subject, "Status");
    }

    #[test]
    fn test_corrupt_index_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mailbox = ProjectMailbox::new(tmp.path());
        std::fs::create_dir_all(tmp.path().join("emails")).unwrap();
        std::fs::write(mailbox.index_path(), "{not json").unwrap();
        assert!(mailbox.load_index().is_empty());
    }

    #[test]
    fn test_imap_state_sorted_numerically() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("imap_state.json");
        let mut state = ImapState::default();
        state.set_seen(
            "Projects/01001",
            ["10", "9", "100", "2"].iter().map(|s| s.to_string()).collect(),
        );
        state.save(&path).unwrap();

        let loaded = ImapState::load(&path);
        assert_eq!(loaded, state);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Projects/01001"], serde_json::json!(["2", "9", "10", "100"]));
    }
}
