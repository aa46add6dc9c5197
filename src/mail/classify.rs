//! Rule-based project classification

use super::mime::ParsedEmail;
use crate::registry::ProjectRegistry;
use tracing::debug;

/// Only the head of the body is scanned for keywords
const BODY_SCAN_CHARS: usize = 2000;

const KEYWORD_BODY_SCORE: u32 = 2;
const KEYWORD_SUBJECT_SCORE: u32 = 3;
const SENDER_SCORE: u32 = 5;
const MIN_SCORE: u32 = 2;

/// Score one project against the lowercased message fields
fn score(subject: &str, body: &str, sender: &str, keywords: &[String], senders: &[String]) -> u32 {
    let mut total = 0;
    for kw in keywords {
        let kw = kw.to_lowercase();
        if kw.is_empty() {
            continue;
        }
        if body.contains(&kw) {
            total += KEYWORD_BODY_SCORE;
        }
        if subject.contains(&kw) {
            total += KEYWORD_SUBJECT_SCORE;
        }
    }
    for s in senders {
        let s = s.to_lowercase();
        if !s.is_empty() && sender.contains(&s) {
            total += SENDER_SCORE;
        }
    }
    total
}

/// Classify a message into a project code, `None` when unclassified
///
/// A project code already carried by the message wins when it is registered.
/// Otherwise the best score of at least 2 wins; ties keep the earlier project.
pub fn classify(email: &ParsedEmail, registry: &ProjectRegistry) -> Option<String> {
    if let Some(code) = email.project_code.as_deref() {
        if registry.contains(code) {
            return Some(code.to_string());
        }
    }

    let subject = email.subject.to_lowercase();
    let body: String = email
        .body_text
        .chars()
        .take(BODY_SCAN_CHARS)
        .collect::<String>()
        .to_lowercase();
    let sender = email.sender_email.to_lowercase();

    let mut best: Option<(&str, u32)> = None;
    for (code, info) in registry.iter() {
        let s = score(&subject, &body, &sender, &info.keywords, &info.senders);
        if s > best.map_or(0, |(_, b)| b) {
            best = Some((code, s));
        }
    }

    match best {
        Some((code, s)) if s >= MIN_SCORE => {
            debug!("Classified {} as {} (score {})", email.hash, code, s);
            Some(code.to_string())
        }
        _ => None,
    }
}

/// Score of one project, exposed for diagnostics
pub fn score_for(email: &ParsedEmail, registry: &ProjectRegistry, code: &str) -> u32 {
    let Some(info) = registry.get(code) else {
        return 0;
    };
    let body: String = email
        .body_text
        .chars()
        .take(BODY_SCAN_CHARS)
        .collect::<String>()
        .to_lowercase();
    score(
        &email.subject.to_lowercase(),
        &body,
        &email.sender_email.to_lowercase(),
        &info.keywords,
        &info.senders,
    )
}
