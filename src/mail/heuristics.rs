//! Lightweight extraction from message bodies

use super::mime::{split_address, ParsedEmail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

const MAX_ITEMS: usize = 20;

const ACTION_PREFIXES: [&str; 5] = ["- ", "* ", "TODO", "Action:", "ACTION:"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Heuristics {
    pub action_items: Vec<String>,
    pub dates_mentioned: Vec<String>,
    pub participants: Vec<String>,
}

fn date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\w+ \d{1,2},? \d{4})\b").ok()
    })
    .as_ref()
}

pub fn extract_heuristics(email: &ParsedEmail) -> Heuristics {
    let mut action_items = Vec::new();
    let mut dates_mentioned = Vec::new();

    for line in email.body_text.lines() {
        let stripped = line.trim();
        if ACTION_PREFIXES.iter().any(|p| stripped.starts_with(p)) {
            action_items.push(stripped.to_string());
        }
        if let Some(re) = date_re() {
            dates_mentioned.extend(re.find_iter(stripped).map(|m| m.as_str().to_string()));
        }
    }
    action_items.truncate(MAX_ITEMS);
    dates_mentioned.truncate(MAX_ITEMS);

    let mut participants = BTreeSet::new();
    if !email.sender_email.is_empty() {
        participants.insert(email.sender_email.clone());
    }
    for recipient in &email.recipients {
        let (_, addr) = split_address(recipient);
        if addr.contains('@') {
            participants.insert(addr);
        }
    }

    Heuristics {
        action_items,
        dates_mentioned,
        participants: participants.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_actions_dates_and_participants() {
        let email = ParsedEmail {
            sender_email: "jane@acme.com".to_string(),
            recipients: vec![
                "Bob <bob@strokmatic.com>".to_string(),
                "jane@acme.com".to_string(),
                "undisclosed-recipients:;".to_string(),
            ],
            body_text: "Hi,\n  - send drawings\nTODO: confirm\nDelivery on 12/03/2025 or March 15, 2025.\nAction: call\n"
                .to_string(),
            ..Default::default()
        };

        let h = extract_heuristics(&email);
        assert_eq!(
            h.action_items,
            vec!["- send drawings", "TODO: confirm", "Action: call"]
        );
        assert_eq!(h.dates_mentioned, vec!["12/03/2025", "March 15, 2025"]);
        assert_eq!(h.participants, vec!["bob@strokmatic.com", "jane@acme.com"]);
    }

    #[test]
    fn test_caps_at_twenty() {
        let body: String = (0..30).map(|i| format!("- item {}\n", i)).collect();
        let email = ParsedEmail {
            body_text: body,
            ..Default::default()
        };
        assert_eq!(extract_heuristics(&email).action_items.len(), 20);
    }
}
