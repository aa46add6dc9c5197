//! DOCX, PPTX and XLSX commands

use crate::error::Result;
use crate::office::docx::{self, DocxDocument, DocxInfo};
use crate::office::package::CoreProperties;
use crate::office::pptx::{self, PptxDocument, PptxInfo};
use crate::office::xlsx::{self, XlsxInfo};
use crate::office::{read_input, InputKind};
use clap::ValueEnum;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReadFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InfoFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    #[default]
    Json,
    Table,
}

/// `--input` for create commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CreateInput {
    Md,
    Json,
}

impl CreateInput {
    /// An explicit flag wins over the input file extension
    pub fn kind(flag: Option<CreateInput>, input: Option<&Path>) -> InputKind {
        match flag {
            Some(CreateInput::Md) => InputKind::Markdown,
            Some(CreateInput::Json) => InputKind::Json,
            None => InputKind::from_path(input),
        }
    }
}

fn pretty(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn metadata_lines(props: &CoreProperties) -> Vec<String> {
    CoreProperties::KEYS
        .iter()
        .filter_map(|key| props.get(key).map(|v| format!("  {}: {}", key, v)))
        .collect()
}

// ===== DOCX =====

pub fn cmd_docx_read(
    path: &Path,
    format: ReadFormat,
    with_styles: bool,
    range: Option<&str>,
) -> Result<String> {
    let doc = DocxDocument::open(path)?;
    let blocks = doc.select(range)?;
    match format {
        ReadFormat::Markdown => Ok(docx::render_markdown(blocks)),
        ReadFormat::Text => Ok(blocks
            .iter()
            .map(|b| b.to_text())
            .collect::<Vec<_>>()
            .join("\n")),
        ReadFormat::Json => pretty(&json!({
            "metadata": doc.metadata,
            "blocks": blocks.iter().map(|b| b.to_json(with_styles)).collect::<Vec<Value>>(),
        })),
    }
}

pub fn cmd_docx_create(
    path: &Path,
    input: Option<&Path>,
    kind: Option<CreateInput>,
    template: Option<&Path>,
) -> Result<()> {
    let content = read_input(input)?;
    docx::create(path, &content, CreateInput::kind(kind, input), template)?;
    info!("Created {:?}", path);
    Ok(())
}

pub fn print_docx_info(info: &DocxInfo) {
    println!("File: {}", info.file);
    let meta = metadata_lines(&info.metadata);
    if !meta.is_empty() {
        println!("Metadata:");
        meta.iter().for_each(|line| println!("{}", line));
    }
    println!("Paragraphs: {}", info.paragraphs);
    println!("Tables:     {}", info.tables);
    println!("Images:     {}", info.images);
    println!("Sections:   {}", info.sections);
    println!("Words:      {}", info.word_count);
    println!("Styles:     {}", info.styles_used.join(", "));
}

// ===== PPTX =====

pub fn cmd_pptx_read(
    path: &Path,
    format: ReadFormat,
    with_styles: bool,
    range: Option<&str>,
) -> Result<String> {
    let doc = PptxDocument::open(path, range)?;
    match format {
        ReadFormat::Markdown => Ok(doc.to_markdown()),
        ReadFormat::Text => Ok(doc.to_text()),
        ReadFormat::Json => pretty(&doc.to_json(with_styles)),
    }
}

pub fn cmd_pptx_create(
    path: &Path,
    input: Option<&Path>,
    kind: Option<CreateInput>,
    template: Option<&Path>,
) -> Result<usize> {
    let content = read_input(input)?;
    let slides = pptx::create(path, &content, CreateInput::kind(kind, input), template)?;
    info!("Created {:?} with {} slide(s)", path, slides);
    Ok(slides)
}

pub fn print_pptx_info(info: &PptxInfo) {
    println!("File: {}", info.file);
    let meta = metadata_lines(&info.metadata);
    if !meta.is_empty() {
        println!("Metadata:");
        meta.iter().for_each(|line| println!("{}", line));
    }
    println!("Slides:     {}", info.slide_count);
    println!("Size:       {}", info.dimensions());
    println!("Shapes:     {}", info.total_shapes);
    println!("Tables:     {}", info.tables);
    println!("Images:     {}", info.images);
    println!("Words:      {}", info.word_count);
    println!("Layouts:    {}", info.layouts_used.join(", "));
}

// ===== XLSX =====

pub fn cmd_xlsx_read(
    path: &Path,
    sheet: Option<&str>,
    range: Option<&str>,
    format: TableFormat,
    with_styles: bool,
) -> Result<String> {
    let data = xlsx::read(path, sheet, range, with_styles)?;
    match format {
        TableFormat::Table => Ok(data.to_table()),
        TableFormat::Json => pretty(&data),
    }
}

pub fn cmd_xlsx_create(path: &Path, input: Option<&Path>, sheet: Option<&str>) -> Result<usize> {
    let data: Value = serde_json::from_str(&read_input(input)?)?;
    let rows = xlsx::create(path, &data, sheet)?;
    info!("Created {:?} with {} row(s)", path, rows);
    Ok(rows)
}

pub fn print_xlsx_info(info: &XlsxInfo) {
    println!("File: {}", info.file);
    for sheet in &info.sheets {
        println!("  {} ({})", sheet.name, sheet.dimensions);
        if let Some(headers) = &sheet.headers {
            println!("    Headers: {}", headers.join(", "));
        }
    }
}

/// One `✓` line per applied edit
pub fn print_edits(path: &Path, messages: &[String]) {
    for message in messages {
        println!("✓ {}", message);
    }
    println!("✓ Saved {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::xlsx::XlsxEdit;
    use tempfile::TempDir;

    #[test]
    fn test_create_input_flag_wins() {
        let json_file = Path::new("deck.json");
        assert_eq!(CreateInput::kind(None, Some(json_file)), InputKind::Json);
        assert_eq!(
            CreateInput::kind(Some(CreateInput::Md), Some(json_file)),
            InputKind::Markdown
        );
        assert_eq!(CreateInput::kind(None, None), InputKind::Auto);
    }

    #[test]
    fn test_docx_create_then_read_markdown() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.md");
        std::fs::write(&input, "# Heading\n\nParagraph text").unwrap();
        let doc = tmp.path().join("out.docx");

        cmd_docx_create(&doc, Some(&input), None, None).unwrap();
        let md = cmd_docx_read(&doc, ReadFormat::Markdown, false, None).unwrap();
        assert!(md.contains("# Heading"));
        assert!(md.contains("Paragraph text"));

        let text = cmd_docx_read(&doc, ReadFormat::Text, false, Some("1:")).unwrap();
        assert_eq!(text.trim(), "Paragraph text");

        let json: Value =
            serde_json::from_str(&cmd_docx_read(&doc, ReadFormat::Json, false, None).unwrap())
                .unwrap();
        assert_eq!(json["blocks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_xlsx_set_then_read() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("rows.json");
        std::fs::write(&input, r#"[["a", "b"], [1, 2]]"#).unwrap();
        let book = tmp.path().join("book.xlsx");
        assert_eq!(cmd_xlsx_create(&book, Some(&input), None).unwrap(), 2);

        let edits = XlsxEdit {
            set: vec!["A1=Hello".to_string()],
            ..Default::default()
        };
        xlsx::edit(&book, None, &edits).unwrap();

        let out = cmd_xlsx_read(&book, None, Some("A1:A1"), TableFormat::Json, false).unwrap();
        let data: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(data["rows"][0][0], "Hello");
        let table = cmd_xlsx_read(&book, None, Some("A1:B2"), TableFormat::Table, false).unwrap();
        assert_eq!(table.lines().next(), Some("Hello\tb"));
    }
}
