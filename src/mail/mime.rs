//! MIME parsing of raw `.eml` messages

use crate::error::Result;
use chrono::DateTime;
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Header injected by the IMAP fetcher
pub const PROJECT_CODE_HEADER: &str = "X-Email-KB-Project-Code";

/// Attachment metadata plus its decoded bytes
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A decoded message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub hash: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipients: Vec<String>,
    pub date: Option<String>,
    pub body_text: String,
    pub body_html: String,
    pub project_code: Option<String>,
    pub message_id: String,
    pub in_reply_to: String,
    pub references: String,
    #[serde(skip)]
    pub attachments: Vec<RawAttachment>,
}

/// Lowercase hex SHA-256
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn subject_code_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})\b").ok()).as_ref()
}

fn angle_addr_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(.*?)\s*<([^>]*)>\s*$").ok())
        .as_ref()
}

/// Parse a `.eml` file from disk
pub fn parse_eml_file(path: &Path) -> Result<ParsedEmail> {
    let raw = std::fs::read(path)?;
    parse_eml(&raw)
}

/// Parse raw message bytes
pub fn parse_eml(raw: &[u8]) -> Result<ParsedEmail> {
    let mail = mailparse::parse_mail(raw)?;
    let headers = mail.get_headers();

    let subject = headers.get_first_value("Subject").unwrap_or_default();
    let (sender_name, sender_email) = headers
        .get_first_value("From")
        .map(|from| split_address(&from))
        .unwrap_or_default();

    let mut recipients = Vec::new();
    for name in ["To", "Cc"] {
        for value in headers.get_all_values(name) {
            recipients.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from),
            );
        }
    }

    let date = headers.get_first_value("Date").map(|d| normalize_date(&d));

    let project_code = headers
        .get_first_value(PROJECT_CODE_HEADER)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| {
            subject_code_re()
                .and_then(|re| re.captures(&subject))
                .map(|c| c[1].to_string())
        });

    let mut parsed = ParsedEmail {
        hash: sha256_hex(raw),
        subject,
        sender_name,
        sender_email,
        recipients,
        date,
        project_code,
        message_id: header_or_empty(&mail, "Message-ID"),
        in_reply_to: header_or_empty(&mail, "In-Reply-To"),
        references: header_or_empty(&mail, "References"),
        ..Default::default()
    };

    collect_parts(&mail, &mut parsed);

    if parsed.body_text.is_empty() && !parsed.body_html.is_empty() {
        parsed.body_text = html2text::from_read(parsed.body_html.as_bytes(), 80)
            .unwrap_or_else(|_| parsed.body_html.clone());
    }

    Ok(parsed)
}

fn header_or_empty(mail: &ParsedMail, name: &str) -> String {
    mail.get_headers()
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn collect_parts(part: &ParsedMail, parsed: &mut ParsedEmail) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, parsed);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    if disposition.disposition == DispositionType::Attachment {
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();
        match filename {
            Some(filename) => parsed.attachments.push(RawAttachment {
                filename: sanitize_filename(&filename),
                content_type: part.ctype.mimetype.clone(),
                data: part.get_body_raw().unwrap_or_default(),
            }),
            None => debug!("Skipping attachment part without a filename"),
        }
        return;
    }

    match part.ctype.mimetype.as_str() {
        "text/plain" => parsed.body_text.push_str(&decode_text(part)),
        "text/html" => parsed.body_html.push_str(&decode_text(part)),
        _ => {}
    }
}

/// Decode a text part with its charset, falling back to lossy bytes
fn decode_text(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(text) => text,
        Err(e) => {
            debug!("Charset decode failed ({}), using raw body", e);
            let bytes = part.get_body_raw().unwrap_or_default();
            match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
            }
        }
    }
}

/// Keep only the final path component of an attachment name
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        "attachment".to_string()
    } else {
        base.to_string()
    }
}

/// Split `Name <addr>` into its display name and address
pub fn split_address(value: &str) -> (String, String) {
    if let Ok(list) = mailparse::addrparse(value) {
        if let Some(MailAddr::Single(info)) = list.iter().next() {
            return (
                info.display_name.clone().unwrap_or_default(),
                info.addr.clone(),
            );
        }
    }

    match angle_addr_re().and_then(|re| re.captures(value)) {
        Some(caps) => (
            caps[1].trim_matches('"').to_string(),
            caps[2].trim().to_string(),
        ),
        None => (String::new(), value.trim().to_string()),
    }
}

/// RFC 2822 date to naive `YYYY-MM-DDTHH:MM:SS`; unparsable values are kept
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    let without_comment = match trimmed.rfind('(') {
        Some(idx) if trimmed.ends_with(')') => trimmed[..idx].trim_end(),
        _ => trimmed,
    };

    if let Ok(dt) = DateTime::parse_from_rfc2822(without_comment) {
        return dt.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string();
    }

    if let Ok(ts) = mailparse::dateparse(trimmed) {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: \"Jane Roe\" <jane@acme.com>\r\n\
To: bob@strokmatic.com, Carol <carol@acme.com>\r\n\
Cc: dave@example.org\r\n\
Subject: =?UTF-8?B?UmU6IHdpZGdldCBvcmRlciDinJM=?=\r\n\
Date: Tue, 04 Mar 2025 09:15:00 -0300\r\n\
Message-ID: <abc@acme.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello team,\r\n\
- ship the widget\r\n";

    #[test]
    fn test_parse_plain_message() {
        let parsed = parse_eml(PLAIN).unwrap();
        assert_eq!(parsed.subject, "Re: widget order \u{2713}");
        assert_eq!(parsed.sender_name, "Jane Roe");
        assert_eq!(parsed.sender_email, "jane@acme.com");
        assert_eq!(parsed.recipients.len(), 3);
        assert_eq!(parsed.date.as_deref(), Some("2025-03-04T09:15:00"));
        assert_eq!(parsed.message_id, "<abc@acme.com>");
        assert!(parsed.body_text.contains("ship the widget"));
        assert_eq!(parsed.hash, sha256_hex(PLAIN));
        assert_eq!(parsed.hash.len(), 64);
        assert!(parsed.project_code.is_none());
    }

    #[test]
    fn test_project_code_header_wins_over_subject() {
        let raw = b"From: a@b.com\r\nX-Email-KB-Project-Code: 02001\r\nSubject: about 01001\r\n\r\nbody\r\n";
        assert_eq!(parse_eml(raw).unwrap().project_code.as_deref(), Some("02001"));

        let raw = b"From: a@b.com\r\nSubject: Quote 01001 rev 2\r\n\r\nbody\r\n";
        assert_eq!(parse_eml(raw).unwrap().project_code.as_deref(), Some("01001"));
    }

    #[test]
    fn test_multipart_with_attachment() {
        let raw = b"From: a@b.com\r\n\
Subject: files\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hello <b>world</b></p>\r\n\
--XX\r\n\
Content-Type: text/csv\r\n\
Content-Disposition: attachment; filename=\"../data.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
YSxiCjEsMgo=\r\n\
--XX--\r\n";

        let parsed = parse_eml(raw).unwrap();
        assert!(parsed.body_html.contains("<b>world</b>"));
        assert!(parsed.body_text.contains("Hello"));
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "data.csv");
        assert_eq!(parsed.attachments[0].data, b"a,b\n1,2\n");
    }

    #[test]
    fn test_latin1_body() {
        let raw = b"From: a@b.com\r\nSubject: x\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\nOl\xe1\r\n";
        let parsed = parse_eml(raw).unwrap();
        assert!(parsed.body_text.starts_with("Ol\u{e1}"));
    }

    #[test]
    fn test_normalize_date_fallbacks() {
        assert_eq!(
            normalize_date("Mon, 3 Feb 2025 10:00:00 +0000 (UTC)"),
            "2025-02-03T10:00:00"
        );
        assert_eq!(normalize_date("sometime soon"), "sometime soon");
    }

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("Jane <jane@acme.com>"),
            ("Jane".to_string(), "jane@acme.com".to_string())
        );
        assert_eq!(
            split_address("bob@acme.com"),
            (String::new(), "bob@acme.com".to_string())
        );
    }
}
