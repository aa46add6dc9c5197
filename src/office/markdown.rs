//! Markdown input and output shared by the DOCX and PPTX tools

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::OnceLock;

/// A run of inline text with emphasis flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl InlineRun {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// Line-level markdown blocks understood by the `create` commands
#[derive(Debug, Clone, PartialEq)]
pub enum MdBlock {
    Heading { level: usize, text: String },
    Table(Vec<Vec<String>>),
    Bullet { level: usize, text: String },
    Numbered { level: usize, text: String },
    Quote(String),
    Paragraph(String),
}

fn heading_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,9})\s+(.*)$").ok()).as_ref()
}

fn bullet_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)[-*]\s+(.*)$").ok()).as_ref()
}

fn numbered_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)\d+\.\s+(.*)$").ok()).as_ref()
}

fn separator_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-:]+$").ok()).as_ref()
}

fn indent_level(indent: &str) -> usize {
    indent.chars().map(|c| if c == '\t' { 2 } else { 1 }).sum::<usize>() / 2
}

/// Split a `| a | b |` line into trimmed cells
pub fn table_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_start_matches('|')
        .trim_end_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    separator_re().is_some_and(|re| cells.iter().all(|c| re.is_match(c)))
}

/// Rows of a GFM table, separator rows dropped
pub fn parse_table(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| table_cells(line))
        .filter(|cells| !is_separator_row(cells))
        .collect()
}

/// Classify markdown lines; blank lines are dropped
pub fn parse_blocks(text: &str) -> Vec<MdBlock> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.trim().starts_with('|') {
            let start = i;
            while i < lines.len() && lines[i].trim().starts_with('|') {
                i += 1;
            }
            let rows = parse_table(&lines[start..i]);
            if !rows.is_empty() {
                blocks.push(MdBlock::Table(rows));
            }
            continue;
        }
        i += 1;

        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = heading_re().and_then(|re| re.captures(line)) {
            blocks.push(MdBlock::Heading {
                level: caps[1].len(),
                text: caps[2].trim().to_string(),
            });
        } else if let Some(caps) = bullet_re().and_then(|re| re.captures(line)) {
            blocks.push(MdBlock::Bullet {
                level: indent_level(&caps[1]),
                text: caps[2].trim().to_string(),
            });
        } else if let Some(caps) = numbered_re().and_then(|re| re.captures(line)) {
            blocks.push(MdBlock::Numbered {
                level: indent_level(&caps[1]),
                text: caps[2].trim().to_string(),
            });
        } else if let Some(rest) = line.trim_start().strip_prefix('>') {
            blocks.push(MdBlock::Quote(rest.trim().to_string()));
        } else {
            blocks.push(MdBlock::Paragraph(line.trim().to_string()));
        }
    }
    blocks
}

/// Inline emphasis of one line as runs
pub fn inline_runs(text: &str) -> Vec<InlineRun> {
    let mut runs: Vec<InlineRun> = Vec::new();
    let mut strong = 0usize;
    let mut emphasis = 0usize;

    let push = |runs: &mut Vec<InlineRun>, text: &str, bold: bool, italic: bool| {
        if text.is_empty() {
            return;
        }
        match runs.last_mut() {
            Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(text),
            _ => runs.push(InlineRun {
                text: text.to_string(),
                bold,
                italic,
            }),
        }
    };

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Strong) => strong += 1,
            Event::End(TagEnd::Strong) => strong = strong.saturating_sub(1),
            Event::Start(Tag::Emphasis) => emphasis += 1,
            Event::End(TagEnd::Emphasis) => emphasis = emphasis.saturating_sub(1),
            Event::Text(t) | Event::Code(t) => push(&mut runs, &t, strong > 0, emphasis > 0),
            Event::SoftBreak | Event::HardBreak => push(&mut runs, " ", strong > 0, emphasis > 0),
            _ => {}
        }
    }

    if runs.is_empty() && !text.is_empty() {
        runs.push(InlineRun::plain(text));
    }
    runs
}

/// Render runs back to markdown emphasis
pub fn runs_to_markdown<'a>(runs: impl IntoIterator<Item = (&'a str, bool, bool)>) -> String {
    runs.into_iter()
        .filter(|(text, _, _)| !text.is_empty())
        .map(|(text, bold, italic)| match (bold, italic) {
            (true, true) => format!("***{}***", text),
            (true, false) => format!("**{}**", text),
            (false, true) => format!("*{}*", text),
            (false, false) => text.to_string(),
        })
        .collect()
}

/// GitHub-flavoured table; short rows are padded to the header width
pub fn gfm_table(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let clean = |c: &String| c.replace('\n', " ");
    let mut lines = vec![
        format!("| {} |", header.iter().map(clean).collect::<Vec<_>>().join(" | ")),
        format!("| {} |", vec!["---"; header.len()].join(" | ")),
    ];
    for row in &rows[1..] {
        let mut cells: Vec<String> = row.iter().map(clean).collect();
        if cells.len() < header.len() {
            cells.resize(header.len(), String::new());
        }
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}
