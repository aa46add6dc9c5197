//! DXF group-code reader

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// One `0` group and the pairs that follow it
#[derive(Debug, Clone)]
struct Record {
    kind: String,
    pairs: Vec<(i32, String)>,
}

impl Record {
    fn get(&self, code: i32) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, v)| v.as_str())
    }

    fn get_f64(&self, code: i32) -> Option<f64> {
        self.get(code)?.trim().parse().ok()
    }

    fn get_i64(&self, code: i32) -> Option<i64> {
        self.get(code)?.trim().parse().ok()
    }

    fn point(&self, x: i32) -> Option<[f64; 3]> {
        Some([
            self.get_f64(x)?,
            self.get_f64(x + 10)?,
            self.get_f64(x + 20).unwrap_or(0.0),
        ])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    pub name: String,
    pub color: Option<i64>,
    pub linetype: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub entity_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DxfEntity {
    pub kind: String,
    pub layer: String,
    pub text: Option<String>,
    pub insert: Option<[f64; 3]>,
    pub dimtype: Option<i64>,
}

#[derive(Debug, Default)]
pub struct DxfFile {
    /// Header variables, each with its own group pairs
    header: HashMap<String, Record>,
    pub layers: Vec<Layer>,
    pub blocks: Vec<Block>,
    pub entities: Vec<DxfEntity>,
    pub sections: Vec<String>,
    section_opens: usize,
    section_closes: usize,
    has_eof: bool,
}

fn pairs(text: &str) -> Result<Vec<(i32, String)>> {
    let mut lines = text.lines();
    let mut out = Vec::new();
    let mut line_no = 0;
    while let Some(code) = lines.next() {
        line_no += 1;
        if code.trim().is_empty() && out.is_empty() {
            continue;
        }
        let code: i32 = code
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("line {}: invalid group code '{}'", line_no, code.trim())))?;
        let value = lines
            .next()
            .ok_or_else(|| Error::Parse(format!("line {}: group code without value", line_no)))?;
        line_no += 1;
        out.push((code, value.trim_end_matches('\r').to_string()));
    }
    Ok(out)
}

fn records(pairs: Vec<(i32, String)>) -> Vec<Record> {
    let mut out: Vec<Record> = Vec::new();
    for (code, value) in pairs {
        if code == 0 {
            out.push(Record {
                kind: value.trim().to_string(),
                pairs: Vec::new(),
            });
        } else if let Some(last) = out.last_mut() {
            last.pairs.push((code, value));
        }
    }
    out
}

/// `$INSUNITS` code to a name
pub fn units_name(code: i64) -> &'static str {
    match code {
        0 => "Unitless",
        1 => "Inches",
        2 => "Feet",
        3 => "Miles",
        4 => "Millimeters",
        5 => "Centimeters",
        6 => "Meters",
        7 => "Kilometers",
        8 => "Microinches",
        9 => "Mils",
        10 => "Yards",
        _ => "Unknown",
    }
}

impl DxfFile {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&String::from_utf8_lossy(&data))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut file = DxfFile::default();
        let mut section: Option<String> = None;
        let mut block: Option<Block> = None;

        for record in records(pairs(text)?) {
            match record.kind.as_str() {
                "SECTION" => {
                    file.section_opens += 1;
                    let name = record.get(2).unwrap_or_default().to_string();
                    if name == "HEADER" {
                        file.read_header(&record);
                    }
                    file.sections.push(name.clone());
                    section = Some(name);
                    continue;
                }
                "ENDSEC" => {
                    file.section_closes += 1;
                    section = None;
                    continue;
                }
                "EOF" => {
                    file.has_eof = true;
                    continue;
                }
                _ => {}
            }

            match section.as_deref() {
                Some("TABLES") if record.kind == "LAYER" => file.layers.push(Layer {
                    name: record.get(2).unwrap_or_default().to_string(),
                    color: record.get_i64(62),
                    linetype: record.get(6).map(str::to_string),
                }),
                Some("BLOCKS") => match record.kind.as_str() {
                    "BLOCK" => {
                        block = Some(Block {
                            name: record.get(2).unwrap_or_default().to_string(),
                            entity_types: Vec::new(),
                        });
                    }
                    "ENDBLK" => file.blocks.extend(block.take()),
                    kind => {
                        if let Some(b) = block.as_mut() {
                            b.entity_types.push(kind.to_string());
                        }
                    }
                },
                Some("ENTITIES") => file.entities.push(Self::entity(&record)),
                _ => {}
            }
        }
        Ok(file)
    }

    /// The HEADER section is one record; split it at each `9` group
    fn read_header(&mut self, record: &Record) {
        let mut current: Option<Record> = None;
        for (code, value) in &record.pairs {
            if *code == 9 {
                if let Some(var) = current.take() {
                    self.header.insert(var.kind.clone(), var);
                }
                current = Some(Record {
                    kind: value.trim().to_string(),
                    pairs: Vec::new(),
                });
            } else if let Some(var) = current.as_mut() {
                var.pairs.push((*code, value.clone()));
            }
        }
        if let Some(var) = current {
            self.header.insert(var.kind.clone(), var);
        }
    }

    fn entity(record: &Record) -> DxfEntity {
        let text = match record.kind.as_str() {
            "TEXT" => record.get(1).map(str::to_string),
            "MTEXT" => {
                // Long MTEXT is split into 3 groups ending with a 1 group
                let mut s: String = record
                    .pairs
                    .iter()
                    .filter(|(c, _)| *c == 3)
                    .map(|(_, v)| v.as_str())
                    .collect();
                s.push_str(record.get(1).unwrap_or_default());
                Some(s)
            }
            _ => None,
        };
        DxfEntity {
            kind: record.kind.clone(),
            layer: record.get(8).unwrap_or("0").to_string(),
            insert: text.as_ref().and_then(|_| record.point(10)),
            text,
            dimtype: (record.kind == "DIMENSION")
                .then(|| record.get_i64(70))
                .flatten(),
        }
    }

    fn header_var(&self, name: &str) -> Option<&Record> {
        self.header.get(name)
    }

    pub fn version(&self) -> Option<&str> {
        self.header_var("$ACADVER")?.get(1)
    }

    pub fn units(&self) -> Option<i64> {
        self.header_var("$INSUNITS")?.get_i64(70)
    }

    pub fn entity_counts(&self) -> Vec<(String, usize)> {
        let mut counts = HashMap::new();
        for e in &self.entities {
            *counts.entry(e.kind.clone()).or_insert(0) += 1;
        }
        super::ranked(counts)
    }

    pub fn info(&self, file_size: u64) -> Value {
        let counts = self.entity_counts();
        let layers: Vec<&str> = self.layers.iter().map(|l| l.name.as_str()).collect();
        let mut info = json!({
            "format": "DXF",
            "version": self.version(),
            "encoding": self.header_var("$DWGCODEPAGE").and_then(|r| r.get(3)),
            "layers": layers,
            "layer_count": layers.len(),
            "entity_count": self.entities.len(),
            "entity_types": super::ranked_json(&counts),
            "file_size": file_size,
        });
        if let Some(units) = self.units() {
            info["units"] = json!(units);
            info["units_name"] = json!(units_name(units));
        }
        if let Some(min) = self.header_var("$EXTMIN").and_then(|r| r.point(10)) {
            info["extmin"] = json!(min);
        }
        if let Some(max) = self.header_var("$EXTMAX").and_then(|r| r.point(10)) {
            info["extmax"] = json!(max);
        }
        info
    }

    pub fn read(&self) -> Value {
        let layers: Map<String, Value> = self
            .layers
            .iter()
            .map(|l| {
                (
                    l.name.clone(),
                    json!({"color": l.color, "linetype": l.linetype}),
                )
            })
            .collect();
        let blocks: Vec<Value> = self
            .blocks
            .iter()
            .filter(|b| !b.name.starts_with('*'))
            .map(|b| {
                let mut counts = HashMap::new();
                for kind in &b.entity_types {
                    *counts.entry(kind.clone()).or_insert(0) += 1;
                }
                json!({"name": b.name, "entities": super::ranked_json(&super::ranked(counts))})
            })
            .collect();
        let texts: Vec<Value> = self
            .entities
            .iter()
            .filter_map(|e| {
                let text = e.text.as_ref()?;
                Some(json!({"type": e.kind, "text": text, "layer": e.layer, "insert": e.insert}))
            })
            .collect();
        let dimensions: Vec<Value> = self
            .entities
            .iter()
            .filter(|e| e.kind == "DIMENSION")
            .map(|e| json!({"layer": e.layer, "type": e.dimtype}))
            .collect();
        json!({
            "format": "DXF",
            "layers": layers,
            "blocks": blocks,
            "texts": texts,
            "dimensions": dimensions,
            "entity_summary": super::ranked_json(&self.entity_counts()),
        })
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.section_opens != self.section_closes {
            issues.push(format!(
                "Unbalanced sections: {} SECTION, {} ENDSEC",
                self.section_opens, self.section_closes
            ));
        }
        if !self.has_eof {
            issues.push("Missing EOF marker".to_string());
        }
        if !self.sections.iter().any(|s| s == "ENTITIES") {
            issues.push("Missing ENTITIES section".to_string());
        }
        issues
    }
}

/// Parse failures become a single issue
pub fn validate_text(text: &str) -> Vec<String> {
    match DxfFile::parse(text) {
        Ok(file) => file.validate(),
        Err(e) => vec![e.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxf(groups: &[(i32, &str)]) -> String {
        groups
            .iter()
            .map(|(c, v)| format!("{:>3}\n{}\n", c, v))
            .collect()
    }

    fn sample() -> String {
        dxf(&[
            (0, "SECTION"), (2, "HEADER"),
            (9, "$ACADVER"), (1, "AC1032"),
            (9, "$DWGCODEPAGE"), (3, "ANSI_1252"),
            (9, "$INSUNITS"), (70, "4"),
            (9, "$EXTMIN"), (10, "0.0"), (20, "0.0"), (30, "0.0"),
            (9, "$EXTMAX"), (10, "100.0"), (20, "50.0"), (30, "0.0"),
            (0, "ENDSEC"),
            (0, "SECTION"), (2, "TABLES"),
            (0, "TABLE"), (2, "LAYER"), (70, "2"),
            (0, "LAYER"), (2, "0"), (70, "0"), (62, "7"), (6, "CONTINUOUS"),
            (0, "LAYER"), (2, "DIMS"), (70, "0"), (62, "1"), (6, "DASHED"),
            (0, "ENDTAB"),
            (0, "ENDSEC"),
            (0, "SECTION"), (2, "BLOCKS"),
            (0, "BLOCK"), (2, "*Model_Space"), (0, "ENDBLK"),
            (0, "BLOCK"), (2, "BOLT"), (0, "CIRCLE"), (8, "0"), (0, "LINE"), (0, "LINE"), (0, "ENDBLK"),
            (0, "ENDSEC"),
            (0, "SECTION"), (2, "ENTITIES"),
            (0, "LINE"), (8, "0"), (10, "0"), (20, "0"), (11, "10"), (21, "0"),
            (0, "LINE"), (8, "0"), (10, "0"), (20, "0"), (11, "0"), (21, "10"),
            (0, "TEXT"), (8, "0"), (10, "5"), (20, "6"), (1, "PLATE 10mm"),
            (0, "MTEXT"), (8, "DIMS"), (10, "1"), (20, "2"), (3, "first half "), (1, "second half"),
            (0, "DIMENSION"), (8, "DIMS"), (70, "32"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ])
    }

    #[test]
    fn test_info() {
        let file = DxfFile::parse(&sample()).unwrap();
        let info = file.info(99);
        assert_eq!(info["version"], "AC1032");
        assert_eq!(info["encoding"], "ANSI_1252");
        assert_eq!(info["units"], 4);
        assert_eq!(info["units_name"], "Millimeters");
        assert_eq!(info["layer_count"], 2);
        assert_eq!(info["entity_count"], 5);
        assert_eq!(info["entity_types"]["LINE"], 2);
        assert_eq!(info["extmax"], json!([100.0, 50.0, 0.0]));
    }

    #[test]
    fn test_read() {
        let file = DxfFile::parse(&sample()).unwrap();
        let read = file.read();
        assert_eq!(read["layers"]["DIMS"]["color"], 1);
        assert_eq!(read["layers"]["0"]["linetype"], "CONTINUOUS");
        assert_eq!(read["blocks"].as_array().unwrap().len(), 1);
        assert_eq!(read["blocks"][0]["entities"]["LINE"], 2);
        assert_eq!(read["texts"][0]["text"], "PLATE 10mm");
        assert_eq!(read["texts"][0]["insert"], json!([5.0, 6.0, 0.0]));
        assert_eq!(read["texts"][1]["text"], "first half second half");
        assert_eq!(read["dimensions"][0]["type"], 32);
        assert!(file.validate().is_empty());
    }

    #[test]
    fn test_validate() {
        let truncated = dxf(&[(0, "SECTION"), (2, "HEADER"), (9, "$ACADVER"), (1, "AC1009")]);
        let issues = validate_text(&truncated);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].starts_with("Unbalanced sections"));

        let issues = validate_text("0\nSECTION\nnot-a-code\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("invalid group code"));
    }
}
