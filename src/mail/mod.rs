//! Email organizer: IMAP fetch, MIME parsing, classification and storage

pub mod classify;
pub mod heuristics;
pub mod imap;
pub mod mime;
pub mod store;

pub use classify::classify;
pub use heuristics::{extract_heuristics, Heuristics};
pub use imap::{fetch_new, FetchStats, Folder, ImapSource, MailSource};
pub use mime::{parse_eml, parse_eml_file, sha256_hex, ParsedEmail, RawAttachment};
pub use store::{
    list_eml_files, EmailRecord, ImapState, IndexEntry, ProjectMailbox, SavedAttachment,
};
