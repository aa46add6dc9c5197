//! IGES fixed-column parsing: sections, global parameters and entity types

use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Column 73 holds the section letter
const SECTION_COLUMN: usize = 72;

fn entity_type_name(code: u32) -> Option<&'static str> {
    Some(match code {
        100 => "Circular Arc",
        102 => "Composite Curve",
        104 => "Conic Arc",
        106 => "Copious Data",
        108 => "Plane",
        110 => "Line",
        112 => "Parametric Spline",
        114 => "Parametric Spline Surface",
        116 => "Point",
        118 => "Ruled Surface",
        120 => "Surface of Revolution",
        122 => "Tabulated Cylinder",
        124 => "Transformation Matrix",
        126 => "Rational B-Spline Curve",
        128 => "Rational B-Spline Surface",
        130 => "Offset Curve",
        142 => "Curve on Parametric Surface",
        144 => "Trimmed Surface",
        186 => "Manifold Solid B-Rep",
        308 => "Subfigure Definition",
        314 => "Color Definition",
        402 => "Associativity Instance",
        406 => "Property",
        408 => "Singular Subfigure Instance",
        502 => "Vertex",
        504 => "Edge",
        508 => "Loop",
        510 => "Face",
        514 => "Shell",
        _ => return None,
    })
}

/// Line counts per section letter
#[derive(Debug, Clone, Default, Serialize)]
pub struct Sections {
    #[serde(rename = "S")]
    pub start: usize,
    #[serde(rename = "G")]
    pub global: usize,
    #[serde(rename = "D")]
    pub directory: usize,
    #[serde(rename = "P")]
    pub parameter: usize,
    #[serde(rename = "T")]
    pub terminate: usize,
}

#[derive(Debug, Default)]
pub struct IgesFile {
    pub sections: Sections,
    start: Vec<String>,
    global: String,
    /// Entity type number of each directory entry
    entity_types: Vec<u32>,
}

/// Split the global section into parameters, decoding `nH` Hollerith strings
fn global_params(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut delimiter = ',';
    let mut record_end = ';';
    let mut params = Vec::new();
    let mut i = 0;

    // A leading "1Hx" overrides the delimiters
    while i < chars.len() {
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let value = if i > start && i < chars.len() && chars[i] == 'H' {
            let n: usize = chars[start..i].iter().collect::<String>().parse().unwrap_or(0);
            let end = (i + 1 + n).min(chars.len());
            let s: String = chars[i + 1..end].iter().collect();
            i = end;
            while i < chars.len() && chars[i] != delimiter && chars[i] != record_end {
                i += 1;
            }
            s
        } else {
            while i < chars.len() && chars[i] != delimiter && chars[i] != record_end {
                i += 1;
            }
            chars[start..i].iter().collect::<String>().trim().to_string()
        };

        match params.len() {
            0 if value.chars().count() == 1 => delimiter = value.chars().next().unwrap_or(','),
            1 if value.chars().count() == 1 => record_end = value.chars().next().unwrap_or(';'),
            _ => {}
        }
        params.push(value);
        if i < chars.len() && chars[i] == record_end {
            break;
        }
        i += 1;
    }
    params
}

impl IgesFile {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::parse(&String::from_utf8_lossy(&data)))
    }

    pub fn parse(text: &str) -> Self {
        let mut file = IgesFile::default();
        for line in text.lines() {
            let Some(section) = line.chars().nth(SECTION_COLUMN) else {
                continue;
            };
            let body: String = line.chars().take(SECTION_COLUMN).collect();
            match section {
                'S' => {
                    file.sections.start += 1;
                    file.start.push(body.trim().to_string());
                }
                'G' => {
                    file.sections.global += 1;
                    file.global.push_str(&body);
                }
                'D' => {
                    // Entries span two lines; the type is in columns 1-8 of the first
                    if file.sections.directory % 2 == 0 {
                        if let Ok(code) = body.chars().take(8).collect::<String>().trim().parse() {
                            file.entity_types.push(code);
                        }
                    }
                    file.sections.directory += 1;
                }
                'P' => file.sections.parameter += 1,
                'T' => file.sections.terminate += 1,
                _ => {}
            }
        }
        file
    }

    /// Global parameter by its 1-based position
    fn global_param(&self, params: &[String], position: usize) -> Option<String> {
        params
            .get(position - 1)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
    }

    pub fn info(&self, file_size: u64) -> IgesInfo {
        let params = global_params(&self.global);
        IgesInfo {
            format: "IGES",
            file_size,
            start_section: self.start.join(" ").trim().to_string(),
            directory_entries: self.sections.directory / 2,
            parameter_entries: self.sections.parameter,
            product_id: self.global_param(&params, 3),
            file_name: self.global_param(&params, 4),
            units_flag: self.global_param(&params, 14),
            units_name: self.global_param(&params, 15),
            date: self.global_param(&params, 18),
            author: self.global_param(&params, 21),
            organization: self.global_param(&params, 22),
        }
    }

    /// Entity type names with counts, most common first
    pub fn entity_types(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for &code in &self.entity_types {
            let name = entity_type_name(code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Type_{}", code));
            *counts.entry(name).or_insert(0) += 1;
        }
        super::ranked(counts)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.sections.start == 0 {
            issues.push("Missing Start section".to_string());
        }
        if self.sections.global == 0 {
            issues.push("Missing Global section".to_string());
        }
        if self.sections.directory == 0 {
            issues.push("Missing Directory Entry section".to_string());
        }
        if self.sections.terminate == 0 {
            issues.push("Missing Terminate section".to_string());
        }
        issues
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IgesInfo {
    pub format: &'static str,
    pub file_size: u64,
    pub start_section: String,
    pub directory_entries: usize,
    pub parameter_entries: usize,
    pub product_id: Option<String>,
    pub file_name: Option<String>,
    pub units_flag: Option<String>,
    pub units_name: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub organization: Option<String>,
}
