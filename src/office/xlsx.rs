//! XLSX reading, creation and editing
//!
//! Values are read with `calamine`. Cell styles and merged ranges are not
//! exposed by calamine, so they come straight from the package XML. Writes go
//! through `rust_xlsxwriter`; an edit re-writes every sheet of the workbook.

use super::package::Package;
use super::xml::Element;
use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

// ===== Cell references =====

/// 0-based row and column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Parse `B12` (case-insensitive, `$` anchors ignored)
    pub fn parse(reference: &str) -> Result<Self> {
        let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();
        let invalid = || Error::Invalid(format!("invalid cell reference '{}'", reference));
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }
        let col = letters
            .chars()
            .try_fold(0u32, |acc, c| {
                let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
                acc.checked_mul(26)?.checked_add(digit)
            })
            .ok_or_else(invalid)?;
        Ok(Self {
            row: row - 1,
            col: col - 1,
        })
    }

    pub fn column_name(col: u32) -> String {
        let mut n = col + 1;
        let mut name = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            name.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        name.reverse();
        String::from_utf8_lossy(&name).into_owned()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_name(self.col), self.row + 1)
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    /// `A1:D10`, or a single cell
    pub fn parse(range: &str) -> Result<Self> {
        let (a, b) = range.split_once(':').unwrap_or((range, range));
        let (a, b) = (CellRef::parse(a)?, CellRef::parse(b)?);
        Ok(Self {
            start: CellRef {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
            },
            end: CellRef {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
            },
        })
    }

    fn of<T>(range: &Range<T>) -> Option<Self>
    where
        T: calamine::CellType,
    {
        let (start, end) = (range.start()?, range.end()?);
        Some(Self {
            start: CellRef {
                row: start.0,
                col: start.1,
            },
            end: CellRef {
                row: end.0,
                col: end.1,
            },
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

// ===== Values =====

/// Excel serial date to ISO 8601; the 1900 leap-year bug is absorbed by the 1899-12-30 epoch
fn excel_serial_to_iso(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    Some(if serial.fract() == 0.0 {
        dt.format("%Y-%m-%dT00:00:00").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    })
}

fn number_json(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        json!(f as i64)
    } else {
        json!(f)
    }
}

pub fn data_to_json(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => number_json(*f),
        Data::Int(i) => json!(i),
        Data::Bool(b) => json!(b),
        Data::Error(e) => Value::String(e.to_string()),
        Data::DateTime(dt) => excel_serial_to_iso(dt.as_f64())
            .map(Value::String)
            .unwrap_or_else(|| json!(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

/// A cell held in memory while re-writing a workbook
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Number(f64),
    Bool(bool),
    /// Including the leading `=`
    Formula(String),
}

impl CellValue {
    /// `=...` is a formula; otherwise int, then float, then string
    pub fn coerce(raw: &str) -> Self {
        if raw.starts_with('=') && raw.len() > 1 {
            return CellValue::Formula(raw.to_string());
        }
        if let Ok(i) = raw.trim().parse::<i64>() {
            return CellValue::Number(i as f64);
        }
        match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => CellValue::Number(f),
            _ => CellValue::String(raw.to_string()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => return None,
            Value::String(s) if s.starts_with('=') && s.len() > 1 => CellValue::Formula(s.clone()),
            Value::String(s) => CellValue::String(s.clone()),
            Value::Number(n) => CellValue::Number(n.as_f64()?),
            Value::Bool(b) => CellValue::Bool(*b),
            other => CellValue::String(other.to_string()),
        })
    }

    fn from_data(data: &Data) -> Option<Self> {
        Some(match data {
            Data::Empty => return None,
            Data::String(s) => CellValue::String(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Error(e) => CellValue::String(e.to_string()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        })
    }

    fn write(&self, sheet: &mut Worksheet, cell: CellRef) -> Result<()> {
        let col = u16::try_from(cell.col)
            .map_err(|_| Error::Invalid(format!("column out of range at {}", cell)))?;
        match self {
            CellValue::String(s) => sheet.write_string(cell.row, col, s)?,
            CellValue::Number(n) => sheet.write_number(cell.row, col, *n)?,
            CellValue::Bool(b) => sheet.write_boolean(cell.row, col, *b)?,
            CellValue::Formula(f) => sheet.write_formula(cell.row, col, f.as_str())?,
        };
        Ok(())
    }
}

// ===== Styles =====

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub borders: BTreeMap<String, String>,
}

impl CellStyle {
    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// `#RRGGBB`, `theme:N` or `indexed:N`
fn color_of(el: &Element) -> Option<String> {
    if let Some(rgb) = el.attr("rgb") {
        if rgb == "00000000" {
            return None;
        }
        return match rgb.len() {
            8 => Some(format!("#{}", &rgb[2..])),
            6 => Some(format!("#{}", rgb)),
            _ => None,
        };
    }
    if let Some(theme) = el.attr("theme") {
        return Some(format!("theme:{}", theme));
    }
    el.attr("indexed").map(|i| format!("indexed:{}", i))
}

fn flag(el: &Element, name: &str) -> bool {
    el.child(name)
        .is_some_and(|f| !matches!(f.attr("val"), Some("0" | "false")))
}

struct Font {
    bold: bool,
    italic: bool,
    color: Option<String>,
}

/// Resolved `cellXfs` of `xl/styles.xml`
#[derive(Debug, Default)]
struct StyleTable {
    xfs: Vec<CellStyle>,
}

impl StyleTable {
    fn parse(root: &Element) -> Self {
        let fonts: Vec<Font> = root
            .child("fonts")
            .map(|f| {
                f.children_named("font")
                    .map(|font| Font {
                        bold: flag(font, "b"),
                        italic: flag(font, "i"),
                        color: font.child("color").and_then(color_of),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let fills: Vec<Option<String>> = root
            .child("fills")
            .map(|f| {
                f.children_named("fill")
                    .map(|fill| fill.path(&["patternFill", "fgColor"]).and_then(color_of))
                    .collect()
            })
            .unwrap_or_default();
        let borders: Vec<BTreeMap<String, String>> = root
            .child("borders")
            .map(|b| {
                b.children_named("border")
                    .map(|border| {
                        ["left", "right", "top", "bottom"]
                            .iter()
                            .filter_map(|side| {
                                let style = border.child(side)?.attr("style")?;
                                Some((side.to_string(), style.to_string()))
                            })
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let index = |el: &Element, key: &str| -> Option<usize> { el.attr(key)?.parse().ok() };
        let xfs = root
            .child("cellXfs")
            .map(|x| {
                x.children_named("xf")
                    .map(|xf| {
                        let font = index(xf, "fontId").and_then(|i| fonts.get(i));
                        CellStyle {
                            fill: index(xf, "fillId")
                                .and_then(|i| fills.get(i))
                                .cloned()
                                .flatten(),
                            font_color: font.and_then(|f| f.color.clone()),
                            bold: font.is_some_and(|f| f.bold),
                            italic: font.is_some_and(|f| f.italic),
                            borders: index(xf, "borderId")
                                .and_then(|i| borders.get(i))
                                .cloned()
                                .unwrap_or_default(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { xfs }
    }
}

/// Style indices and merged ranges of one sheet, read from the package
#[derive(Debug, Default)]
struct SheetFormatting {
    styles: HashMap<CellRef, CellStyle>,
    merged: Vec<String>,
}

fn sheet_part(package: &Package, sheet: &str) -> Option<String> {
    let workbook = package.xml("xl/workbook.xml").ok()?;
    let rid = workbook
        .child("sheets")?
        .children_named("sheet")
        .find(|s| s.attr("name") == Some(sheet))?
        .attr("r:id")?
        .to_string();
    package.relationship_target("xl/workbook.xml", &rid)
}

fn read_formatting(path: &Path, sheet: &str) -> Result<SheetFormatting> {
    let package = Package::open(path)?;
    let Some(part) = sheet_part(&package, sheet) else {
        return Ok(SheetFormatting::default());
    };
    let table = package
        .xml("xl/styles.xml")
        .map(|root| StyleTable::parse(&root))
        .unwrap_or_default();
    let root = package.xml(&part)?;

    let mut formatting = SheetFormatting::default();
    if let Some(data) = root.child("sheetData") {
        for cell in data.children_named("row").flat_map(|r| r.children_named("c")) {
            let (Some(reference), Some(style)) = (cell.attr("r"), cell.attr("s")) else {
                continue;
            };
            let Ok(cell_ref) = CellRef::parse(reference) else {
                continue;
            };
            if let Some(style) = style.parse::<usize>().ok().and_then(|i| table.xfs.get(i)) {
                if !style.is_empty() {
                    formatting.styles.insert(cell_ref, style.clone());
                }
            }
        }
    }
    if let Some(merges) = root.child("mergeCells") {
        formatting.merged = merges
            .children_named("mergeCell")
            .filter_map(|m| m.attr("ref").map(String::from))
            .collect();
    }
    Ok(formatting)
}

// ===== Read =====

#[derive(Debug, Clone, Serialize)]
pub struct SheetData {
    pub sheet: String,
    pub rows: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merged: Vec<String>,
}

impl SheetData {
    /// Tab-separated values, one line per row
    pub fn to_table(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| display_json(v.get("value").unwrap_or(v)))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn open(path: &Path) -> Result<calamine::Sheets<std::io::BufReader<std::fs::File>>> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    Ok(open_workbook_auto(path)?)
}

fn select_sheet(names: &[String], sheet: Option<&str>) -> Result<String> {
    match sheet {
        Some(name) => names
            .iter()
            .find(|n| n.as_str() == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("sheet '{}'", name))),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| Error::Parse("workbook has no sheets".to_string())),
    }
}

/// Read a rectangle of values; without `range`, the sheet's used area
pub fn read(path: &Path, sheet: Option<&str>, range: Option<&str>, with_styles: bool) -> Result<SheetData> {
    let mut workbook = open(path)?;
    let name = select_sheet(&workbook.sheet_names(), sheet)?;
    let values = workbook.worksheet_range(&name)?;

    let area = match range {
        Some(range) => Some(CellRange::parse(range)?),
        None => CellRange::of(&values),
    };
    let formatting = if with_styles {
        read_formatting(path, &name)?
    } else {
        SheetFormatting::default()
    };

    let mut rows = Vec::new();
    if let Some(area) = area {
        for row in area.start.row..=area.end.row {
            let cells = (area.start.col..=area.end.col)
                .map(|col| {
                    let value = values
                        .get_value((row, col))
                        .map(data_to_json)
                        .unwrap_or(Value::Null);
                    if !with_styles {
                        return value;
                    }
                    let mut entry = Map::new();
                    entry.insert("value".to_string(), value);
                    if let Some(style) = formatting.styles.get(&CellRef { row, col }) {
                        entry.insert("style".to_string(), json!(style));
                    }
                    Value::Object(entry)
                })
                .collect();
            rows.push(cells);
        }
    }

    Ok(SheetData {
        sheet: name,
        rows,
        merged: formatting.merged,
    })
}

// ===== Create =====

/// A list of objects becomes a header row plus records; a list of lists is written as rows
pub fn rows_from_json(data: &Value) -> Result<Vec<Vec<Option<CellValue>>>> {
    let items = data
        .as_array()
        .ok_or_else(|| Error::Invalid("expected a JSON list of objects or rows".to_string()))?;
    let Some(first) = items.first() else {
        return Ok(Vec::new());
    };

    if let Some(first) = first.as_object() {
        let headers: Vec<&String> = first.keys().collect();
        let mut rows = vec![headers
            .iter()
            .map(|h| Some(CellValue::String(h.to_string())))
            .collect()];
        for record in items {
            rows.push(
                headers
                    .iter()
                    .map(|h| record.get(h.as_str()).and_then(CellValue::from_json))
                    .collect(),
            );
        }
        return Ok(rows);
    }

    if first.is_array() {
        return Ok(items
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(CellValue::from_json).collect())
                    .unwrap_or_default()
            })
            .collect());
    }

    Err(Error::Invalid("expected a JSON list of objects or rows".to_string()))
}

fn write_cells(sheet: &mut Worksheet, cells: &BTreeMap<CellRef, CellValue>) -> Result<()> {
    for (cell, value) in cells {
        value.write(sheet, *cell)?;
    }
    Ok(())
}

fn grid_to_cells(rows: Vec<Vec<Option<CellValue>>>) -> BTreeMap<CellRef, CellValue> {
    let mut cells = BTreeMap::new();
    for (r, row) in rows.into_iter().enumerate() {
        for (c, value) in row.into_iter().enumerate() {
            if let Some(value) = value {
                cells.insert(
                    CellRef {
                        row: r as u32,
                        col: c as u32,
                    },
                    value,
                );
            }
        }
    }
    cells
}

/// Write a single-sheet workbook; returns the number of rows written
pub fn create(path: &Path, data: &Value, sheet: Option<&str>) -> Result<usize> {
    let rows = rows_from_json(data)?;
    let count = rows.len();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet.unwrap_or("Sheet"))?;
    write_cells(worksheet, &grid_to_cells(rows))?;
    workbook.save(path)?;
    Ok(count)
}

// ===== Edit =====

#[derive(Debug, Clone, Default)]
pub struct XlsxEdit {
    /// `A1=VALUE` assignments
    pub set: Vec<String>,
    /// 1-based; the new empty row takes this number
    pub insert_row: Option<u32>,
    /// 1-based
    pub delete_row: Option<u32>,
    pub rename: Option<String>,
}

/// In-memory copy of one sheet's values and formulas
#[derive(Debug, Clone)]
struct SheetModel {
    name: String,
    cells: BTreeMap<CellRef, CellValue>,
}

impl SheetModel {
    fn load(values: &Range<Data>, formulas: Option<&Range<String>>, name: &str) -> Self {
        let mut cells = BTreeMap::new();
        if let Some((row0, col0)) = values.start() {
            for (r, c, data) in values.used_cells() {
                if let Some(value) = CellValue::from_data(data) {
                    let cell = CellRef {
                        row: row0 + r as u32,
                        col: col0 + c as u32,
                    };
                    cells.insert(cell, value);
                }
            }
        }
        if let Some((formulas, (row0, col0))) = formulas.and_then(|f| Some((f, f.start()?))) {
            for (r, c, formula) in formulas.used_cells() {
                if formula.is_empty() {
                    continue;
                }
                let cell = CellRef {
                    row: row0 + r as u32,
                    col: col0 + c as u32,
                };
                let formula = if formula.starts_with('=') {
                    formula.clone()
                } else {
                    format!("={}", formula)
                };
                cells.insert(cell, CellValue::Formula(formula));
            }
        }
        Self {
            name: name.to_string(),
            cells,
        }
    }

    /// Rows at or below `row` move down one
    fn insert_row(&mut self, row: u32) {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|(cell, value)| {
                let row = if cell.row >= row { cell.row + 1 } else { cell.row };
                (CellRef { row, ..cell }, value)
            })
            .collect();
    }

    /// Drop `row`; rows below move up one
    fn delete_row(&mut self, row: u32) {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter(|(cell, _)| cell.row != row)
            .map(|(cell, value)| {
                let row = if cell.row > row { cell.row - 1 } else { cell.row };
                (CellRef { row, ..cell }, value)
            })
            .collect();
    }
}

fn one_based(n: u32, flag: &str) -> Result<u32> {
    n.checked_sub(1)
        .ok_or_else(|| Error::Invalid(format!("{} expects a row number starting at 1", flag)))
}

/// Apply edits to one sheet and re-write the whole workbook; returns a message per change
pub fn edit(path: &Path, sheet: Option<&str>, edits: &XlsxEdit) -> Result<Vec<String>> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names();
    let target = select_sheet(&names, sheet)?;

    let mut sheets = Vec::with_capacity(names.len());
    for name in &names {
        let values = workbook.worksheet_range(name)?;
        let formulas = workbook.worksheet_formula(name).ok();
        sheets.push(SheetModel::load(&values, formulas.as_ref(), name));
    }
    drop(workbook);

    let mut messages = Vec::new();
    let model = sheets
        .iter_mut()
        .find(|s| s.name == target)
        .ok_or_else(|| Error::NotFound(format!("sheet '{}'", target)))?;

    for assignment in &edits.set {
        let (reference, raw) = assignment
            .split_once('=')
            .ok_or_else(|| Error::Invalid(format!("expected CELL=VALUE, got '{}'", assignment)))?;
        let cell = CellRef::parse(reference)?;
        model.cells.insert(cell, CellValue::coerce(raw));
        messages.push(format!("Set {} = {}", cell, raw));
    }
    if let Some(row) = edits.insert_row {
        model.insert_row(one_based(row, "--insert-row")?);
        messages.push(format!("Inserted row {}", row));
    }
    if let Some(row) = edits.delete_row {
        model.delete_row(one_based(row, "--delete-row")?);
        messages.push(format!("Deleted row {}", row));
    }
    if let Some(name) = &edits.rename {
        messages.push(format!("Renamed sheet '{}' to '{}'", model.name, name));
        model.name = name.clone();
    }

    let mut out = Workbook::new();
    for model in &sheets {
        let worksheet = out.add_worksheet();
        worksheet.set_name(&model.name)?;
        write_cells(worksheet, &model.cells)?;
    }
    out.save(path)?;
    Ok(messages)
}

// ===== Info =====

#[derive(Debug, Clone, Serialize)]
pub struct SheetInfo {
    pub name: String,
    pub dimensions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct XlsxInfo {
    pub file: String,
    pub sheets: Vec<SheetInfo>,
}

pub fn info(path: &Path) -> Result<XlsxInfo> {
    let mut workbook = open(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let values = workbook.worksheet_range(&name)?;
        let area = CellRange::of(&values);
        let headers = area.map(|area| {
            (area.start.col..=area.end.col)
                .map(|col| {
                    values
                        .get_value((0, col))
                        .map(|d| display_json(&data_to_json(d)))
                        .unwrap_or_default()
                })
                .collect::<Vec<String>>()
        });
        sheets.push(SheetInfo {
            dimensions: area
                .map(|a| a.to_string())
                .unwrap_or_else(|| "A1:A1".to_string()),
            headers: headers.filter(|h| h.iter().any(|v| !v.is_empty())),
            name,
        });
    }
    Ok(XlsxInfo {
        file: path.display().to_string(),
        sheets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Color, Format, FormatBorder};
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("parts.xlsx");
        let data = json!([
            {"part": "Bolt", "qty": 4, "price": 0.25},
            {"part": "Nut", "qty": 8, "price": null}
        ]);
        assert_eq!(create(&path, &data, Some("Parts")).unwrap(), 3);
        path
    }

    #[test]
    fn test_cell_refs() {
        assert_eq!(CellRef::parse("A1").unwrap(), CellRef { row: 0, col: 0 });
        assert_eq!(CellRef::parse("$ab$12").unwrap(), CellRef { row: 11, col: 27 });
        assert_eq!(CellRef { row: 9, col: 701 }.to_string(), "ZZ10");
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("12").is_err());
        assert_eq!(CellRange::parse("D10:A1").unwrap().to_string(), "A1:D10");
        assert_eq!(CellRange::parse("C3").unwrap().to_string(), "C3:C3");
    }

    #[test]
    fn test_coerce() {
        assert_eq!(CellValue::coerce("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::coerce("2.5"), CellValue::Number(2.5));
        assert_eq!(CellValue::coerce("Hello"), CellValue::String("Hello".into()));
        assert_eq!(CellValue::coerce("=SUM(A1:A2)"), CellValue::Formula("=SUM(A1:A2)".into()));
        assert_eq!(CellValue::coerce("nan"), CellValue::String("nan".into()));
    }

    #[test]
    fn test_excel_dates() {
        assert_eq!(excel_serial_to_iso(45292.0).unwrap(), "2024-01-01T00:00:00");
        assert_eq!(excel_serial_to_iso(45292.5).unwrap(), "2024-01-01T12:00:00");
    }

    #[test]
    fn test_create_and_read() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);

        let data = read(&path, None, None, false).unwrap();
        assert_eq!(data.sheet, "Parts");
        assert_eq!(data.rows[0], vec![json!("part"), json!("qty"), json!("price")]);
        assert_eq!(data.rows[1], vec![json!("Bolt"), json!(4), json!(0.25)]);
        assert_eq!(data.rows[2][2], Value::Null);
        assert_eq!(data.to_table().lines().nth(1), Some("Bolt\t4\t0.25"));

        let lists = dir.path().join("grid.xlsx");
        create(&lists, &json!([[1, "a"], [true]]), None).unwrap();
        let grid = read(&lists, Some("Sheet"), Some("A1:B2"), false).unwrap();
        assert_eq!(grid.rows, vec![vec![json!(1), json!("a")], vec![json!(true), Value::Null]]);

        assert!(matches!(read(&path, Some("Missing"), None, false), Err(Error::NotFound(_))));
        assert!(create(&lists, &json!({"a": 1}), None).is_err());
    }

    #[test]
    fn test_set_then_read_cell() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        edit(&path, None, &XlsxEdit { set: vec!["A1=Hello".into()], ..Default::default() }).unwrap();
        let data = read(&path, None, Some("A1:A1"), false).unwrap();
        assert_eq!(data.rows, vec![vec![json!("Hello")]]);
    }

    #[test]
    fn test_edit_rows_formulas_and_rename() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let messages = edit(
            &path,
            Some("Parts"),
            &XlsxEdit {
                set: vec!["D2==B2*C2".into(), "E2=3.5".into()],
                insert_row: Some(2),
                delete_row: Some(4),
                rename: Some("Stock".into()),
            },
        )
        .unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[3], "Deleted row 4");

        let data = read(&path, Some("Stock"), None, false).unwrap();
        assert_eq!(data.rows.len(), 3);
        assert!(data.rows[1].iter().all(Value::is_null));
        assert_eq!(data.rows[2][0], json!("Bolt"));
        assert_eq!(data.rows[2][4], json!(3.5));

        let mut workbook = open_workbook_auto(&path).unwrap();
        let formulas = workbook.worksheet_formula("Stock").unwrap();
        let formula = formulas.get_value((2, 3)).cloned().unwrap_or_default();
        assert_eq!(formula.trim_start_matches('='), "B2*C2");

        // Formulas survive a second rewrite
        edit(&path, None, &XlsxEdit { set: vec!["A1=Item".into()], ..Default::default() }).unwrap();
        let mut workbook = open_workbook_auto(&path).unwrap();
        let formulas = workbook.worksheet_formula("Stock").unwrap();
        assert_eq!(formulas.get_value((2, 3)).map(|f| f.trim_start_matches('=')), Some("B2*C2"));
    }

    #[test]
    fn test_invalid_edits() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let bad_set = XlsxEdit { set: vec!["A1".into()], ..Default::default() };
        assert!(matches!(edit(&path, None, &bad_set), Err(Error::Invalid(_))));
        let bad_row = XlsxEdit { delete_row: Some(0), ..Default::default() };
        assert!(matches!(edit(&path, None, &bad_row), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_styles_and_merges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("styled.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = Format::new()
            .set_bold()
            .set_font_color(Color::RGB(0xFF0000))
            .set_background_color(Color::RGB(0xFFFF00))
            .set_border_bottom(FormatBorder::Thin);
        sheet.write_string_with_format(0, 0, "Total", &header).unwrap();
        sheet.write_number(1, 0, 12.0).unwrap();
        sheet.merge_range(2, 0, 2, 1, "Merged", &Format::new()).unwrap();
        workbook.save(&path).unwrap();

        let data = read(&path, None, Some("A1:A2"), true).unwrap();
        let style = &data.rows[0][0]["style"];
        assert_eq!(data.rows[0][0]["value"], "Total");
        assert_eq!(style["bold"], true);
        assert_eq!(style["font_color"], "#FF0000");
        assert_eq!(style["fill"], "#FFFF00");
        assert_eq!(style["borders"]["bottom"], "thin");
        assert!(data.rows[1][0].get("style").is_none());
        assert_eq!(data.merged, vec!["A3:B3"]);
    }

    #[test]
    fn test_info() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let info = info(&path).unwrap();
        assert_eq!(info.sheets.len(), 1);
        assert_eq!(info.sheets[0].name, "Parts");
        assert_eq!(info.sheets[0].dimensions, "A1:C3");
        assert_eq!(
            info.sheets[0].headers.as_deref(),
            Some(&["part".to_string(), "qty".to_string(), "price".to_string()][..])
        );
    }
}
