//! IMAP polling into the staging directory
//!
//! Folders whose last path component is a five-digit project code are
//! downloaded UID by UID. The cursor file records which UIDs were already
//! stored, so a crash between writing a message and saving the cursor only
//! leads to a duplicate download.

use super::mime::PROJECT_CODE_HEADER;
use super::store::ImapState;
use crate::error::{Error, Result};
use crate::progress::{advance_progress, finish_progress, start_progress};
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// A mailbox name as reported by LIST
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub name: String,
    pub delimiter: Option<String>,
}

impl Folder {
    pub fn new(name: impl Into<String>, delimiter: Option<&str>) -> Self {
        Self {
            name: name.into(),
            delimiter: delimiter.map(String::from),
        }
    }

    /// Last path component when it is a five-digit project code
    pub fn project_code(&self) -> Option<String> {
        let last = match self.delimiter.as_deref() {
            Some(d) if !d.is_empty() => self.name.rsplit(d).next().unwrap_or(&self.name),
            _ => self.name.as_str(),
        };
        label_re()
            .filter(|re| re.is_match(last))
            .map(|_| last.to_string())
    }
}

fn label_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}$").ok()).as_ref()
}

/// Blocking mailbox transport
pub trait MailSource: Send {
    fn list_folders(&mut self) -> Result<Vec<Folder>>;

    /// Select a folder and return all of its UIDs
    fn select_uids(&mut self, folder: &str) -> Result<Vec<String>>;

    /// Full RFC 822 bytes of a message in the selected folder
    fn fetch_rfc822(&mut self, uid: &str) -> Result<Option<Vec<u8>>>;

    fn logout(&mut self) -> Result<()>;
}

type TlsSession = imap::Session<native_tls::TlsStream<TcpStream>>;

/// IMAP over implicit TLS
pub struct ImapSource {
    session: TlsSession,
}

impl ImapSource {
    pub fn connect(host: &str, port: u16, username: &str, password: &str) -> Result<Self> {
        info!("Connecting to {}:{} as {}", host, port, username);
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect((host, port), host, &tls)?;
        let session = client.login(username, password).map_err(|(e, _)| e)?;
        Ok(Self { session })
    }
}

impl MailSource for ImapSource {
    fn list_folders(&mut self) -> Result<Vec<Folder>> {
        let names = self.session.list(Some(""), Some("*"))?;
        Ok(names
            .iter()
            .map(|n| Folder::new(n.name(), n.delimiter()))
            .collect())
    }

    fn select_uids(&mut self, folder: &str) -> Result<Vec<String>> {
        self.session.select(folder)?;
        let mut uids: Vec<u32> = self.session.uid_search("ALL")?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids.into_iter().map(|u| u.to_string()).collect())
    }

    fn fetch_rfc822(&mut self, uid: &str) -> Result<Option<Vec<u8>>> {
        let messages = self.session.uid_fetch(uid, "RFC822")?;
        Ok(messages.iter().find_map(|m| m.body().map(<[u8]>::to_vec)))
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout()?;
        Ok(())
    }
}

/// Outcome of one fetch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchStats {
    pub folders_scanned: usize,
    pub fetched: usize,
    pub files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Insert the project-code header after the first header line
pub fn inject_project_code(raw: &[u8], code: &str) -> Vec<u8> {
    let Some(first_nl) = raw.iter().position(|&b| b == b'\n') else {
        return raw.to_vec();
    };
    let header = format!("{}: {}\r\n", PROJECT_CODE_HEADER, code);
    let mut out = Vec::with_capacity(raw.len() + header.len());
    out.extend_from_slice(&raw[..=first_nl]);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&raw[first_nl + 1..]);
    out
}

/// Staging file name `email_<code>_<YYYYmmdd_HHMMSS_ffffff>.eml` not yet taken
fn staging_path(staging: &Path, code: &str) -> PathBuf {
    loop {
        let ts = Local::now().format("%Y%m%d_%H%M%S_%6f");
        let path = staging.join(format!("email_{}_{}.eml", code, ts));
        if !path.exists() {
            return path;
        }
    }
}

/// Download unseen messages of every project folder into `staging`
///
/// The cursor is saved after each folder.
pub fn fetch_new(
    source: &mut dyn MailSource,
    state_file: &Path,
    staging: &Path,
) -> Result<FetchStats> {
    std::fs::create_dir_all(staging)?;
    let mut state = ImapState::load(state_file);
    let mut stats = FetchStats::default();

    let folders = source.list_folders()?;
    for folder in folders {
        let Some(code) = folder.project_code() else {
            continue;
        };
        stats.folders_scanned += 1;

        let uids = match source.select_uids(&folder.name) {
            Ok(uids) => uids,
            Err(e) => {
                let msg = format!("{}: {}", folder.name, e);
                warn!("Skipping folder {}", msg);
                stats.errors.push(msg);
                continue;
            }
        };

        let mut seen = state.seen(&folder.name);
        let new_uids: Vec<String> = uids.into_iter().filter(|u| !seen.contains(u)).collect();
        debug!("{}: {} new messages", folder.name, new_uids.len());

        let pb = start_progress(new_uids.len(), &format!("Fetching {}", folder.name));
        for uid in new_uids {
            match source.fetch_rfc822(&uid) {
                Ok(Some(raw)) => {
                    let path = staging_path(staging, &code);
                    std::fs::write(&path, inject_project_code(&raw, &code))?;
                    seen.insert(uid);
                    stats.fetched += 1;
                    stats.files.push(path);
                }
                Ok(None) => debug!("UID {} returned no body", uid),
                Err(e) => {
                    let msg = format!("{} UID {}: {}", folder.name, uid, e);
                    warn!("Fetch failed for {}", msg);
                    stats.errors.push(msg);
                }
            }
            advance_progress(&pb);
        }
        finish_progress(pb, &format!("{} done", folder.name));

        state.set_seen(&folder.name, seen);
        state.save(state_file)?;
    }

    if let Err(e) = source.logout() {
        debug!("Logout failed: {}", e);
    }

    info!("Fetched {} new emails to staging", stats.fetched);
    Ok(stats)
}

/// Connect with configured credentials, failing early when they are missing
pub fn connect_from_config(config: &crate::config::MailConfig) -> Result<ImapSource> {
    let username = config
        .imap_username
        .as_deref()
        .ok_or_else(|| Error::Config("IMAP_USERNAME and IMAP_PASSWORD are required".to_string()))?;
    let password = config
        .imap_password
        .as_deref()
        .ok_or_else(|| Error::Config("IMAP_USERNAME and IMAP_PASSWORD are required".to_string()))?;
    ImapSource::connect(&config.imap_host, config.imap_port, username, password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemorySource {
        folders: Vec<Folder>,
        messages: BTreeMap<String, Vec<(String, Vec<u8>)>>,
        selected: Option<String>,
        fetch_calls: usize,
    }

    impl MailSource for MemorySource {
        fn list_folders(&mut self) -> Result<Vec<Folder>> {
            Ok(self.folders.clone())
        }

        fn select_uids(&mut self, folder: &str) -> Result<Vec<String>> {
            self.selected = Some(folder.to_string());
            Ok(self
                .messages
                .get(folder)
                .map(|m| m.iter().map(|(uid, _)| uid.clone()).collect())
                .unwrap_or_default())
        }

        fn fetch_rfc822(&mut self, uid: &str) -> Result<Option<Vec<u8>>> {
            self.fetch_calls += 1;
            let folder = self.selected.clone().unwrap_or_default();
            Ok(self
                .messages
                .get(&folder)
                .and_then(|m| m.iter().find(|(u, _)| u == uid))
                .map(|(_, raw)| raw.clone()))
        }

        fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn source() -> MemorySource {
        let mut messages = BTreeMap::new();
        messages.insert(
            "Projects/01001".to_string(),
            vec![
                ("1".to_string(), b"From: a@acme.com\r\nSubject: one\r\n\r\nbody\r\n".to_vec()),
                ("2".to_string(), b"From: a@acme.com\r\nSubject: two\r\n\r\nbody\r\n".to_vec()),
            ],
        );
        messages.insert(
            "INBOX".to_string(),
            vec![("7".to_string(), b"From: x@y.com\r\n\r\n".to_vec())],
        );
        MemorySource {
            folders: vec![
                Folder::new("INBOX", Some("/")),
                Folder::new("Projects/01001", Some("/")),
                Folder::new("Projects/1001a", Some("/")),
            ],
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn test_folder_project_code() {
        assert_eq!(
            Folder::new("[Gmail]/Labels/02001", Some("/")).project_code().as_deref(),
            Some("02001")
        );
        assert_eq!(Folder::new("Work.03002", Some(".")).project_code().as_deref(), Some("03002"));
        assert_eq!(Folder::new("020011", Some("/")).project_code(), None);
        assert_eq!(Folder::new("01001", None).project_code().as_deref(), Some("01001"));
    }

    #[test]
    fn test_inject_after_first_line() {
        let out = inject_project_code(b"Received: x\r\nFrom: a\r\n\r\nbody", "01001");
        assert_eq!(
            out,
            b"Received: x\r\nX-Email-KB-Project-Code: 01001\r\nFrom: a\r\n\r\nbody".to_vec()
        );
        assert_eq!(inject_project_code(b"no newline", "01001"), b"no newline".to_vec());
    }

    #[test]
    fn test_fetch_only_new_uids_and_persist_cursor() {
        let tmp = TempDir::new().unwrap();
        let state_file = tmp.path().join("imap_state.json");
        let staging = tmp.path().join("staging");

        let mut src = source();
        let stats = fetch_new(&mut src, &state_file, &staging).unwrap();
        assert_eq!(stats.folders_scanned, 1);
        assert_eq!(stats.fetched, 2);
        assert_eq!(src.fetch_calls, 2);

        let name = stats.files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("email_01001_") && name.ends_with(".eml"));
        let content = std::fs::read_to_string(&stats.files[0]).unwrap();
        assert!(content.contains("X-Email-KB-Project-Code: 01001\r\n"));

        let state = ImapState::load(&state_file);
        assert_eq!(state.seen("Projects/01001").len(), 2);

        let mut again = source();
        let stats = fetch_new(&mut again, &state_file, &staging).unwrap();
        assert_eq!(stats.fetched, 0);
        assert_eq!(again.fetch_calls, 0);
    }
}
