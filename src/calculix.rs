//! CalculiX input decks from GMSH: surface cleanup and node-set extraction
//!
//! GMSH writes physical surfaces as 2D element sets next to the C3D volume
//! elements. `clean_mesh` strips them so ccx only sees the volume, and
//! `extract_nsets` turns them into `*NSET` blocks for boundary conditions.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Node IDs per line in `*NSET` output
const NSET_IDS_PER_LINE: usize = 10;

fn type_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bTYPE\s*=\s*([^,\s]+)").ok())
        .as_ref()
}

fn elset_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bELSET\s*=\s*([^,\s]+)").ok())
        .as_ref()
}

fn capture(re: Option<&'static Regex>, line: &str) -> Option<String> {
    re?.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Keyword lines start with one `*`; `**` is a comment
fn is_keyword(line: &str) -> bool {
    line.starts_with('*') && !line.starts_with("**")
}

fn is_volume_type(element_type: Option<&str>) -> bool {
    element_type.is_some_and(|t| t.starts_with("C3D"))
}

fn keyword_is(line: &str, keyword: &str) -> bool {
    let upper = line.to_uppercase();
    upper
        .strip_prefix(keyword)
        .map(str::trim_start)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(','))
}

fn parse_ids(line: &str, line_no: usize) -> Result<Vec<u64>> {
    line.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse()
                .map_err(|_| Error::Parse(format!("line {}: invalid id '{}'", line_no, t)))
        })
        .collect()
}

// ===== clean-mesh =====

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanStats {
    pub volume_elements: usize,
    pub volume_elsets: BTreeSet<String>,
    pub surface_elsets: BTreeSet<String>,
    pub lines_written: usize,
    pub output: PathBuf,
}

/// Keep C3D elements and everything else, dropping 2D elements and their element sets
pub fn clean_mesh_text(text: &str) -> (String, CleanStats) {
    let mut stats = CleanStats::default();

    // Pass 1: classify element sections
    let mut in_volume = false;
    for line in text.lines().map(str::trim) {
        if keyword_is(line, "*ELEMENT") {
            let element_type = capture(type_re(), line);
            let elset = capture(elset_re(), line);
            in_volume = is_volume_type(element_type.as_deref());
            if let Some(elset) = elset {
                if in_volume {
                    stats.volume_elsets.insert(elset);
                } else if element_type.is_some() {
                    stats.surface_elsets.insert(elset);
                }
            }
            continue;
        }
        if is_keyword(line) {
            in_volume = false;
            continue;
        }
        if in_volume
            && line
                .split(',')
                .next()
                .is_some_and(|id| !id.trim().is_empty() && id.trim().bytes().all(|b| b.is_ascii_digit()))
        {
            stats.volume_elements += 1;
        }
    }
    debug!(
        "{} volume elements, surface elsets {:?}",
        stats.volume_elements, stats.surface_elsets
    );

    // Pass 2: copy, skipping surface sections
    let mut out = String::with_capacity(text.len());
    let mut skip = false;
    for raw in text.split_inclusive('\n') {
        let line = raw.trim();
        if is_keyword(line) {
            if keyword_is(line, "*ELEMENT") {
                skip = !is_volume_type(capture(type_re(), line).as_deref());
            } else if keyword_is(line, "*ELSET") {
                skip = capture(elset_re(), line).is_some_and(|name| stats.surface_elsets.contains(&name));
            } else {
                skip = false;
            }
        }
        if !skip {
            out.push_str(raw);
            stats.lines_written += 1;
        }
    }
    (out, stats)
}

pub fn clean_mesh(input: &Path, output: &Path) -> Result<CleanStats> {
    let text = std::fs::read_to_string(input)?;
    let (cleaned, mut stats) = clean_mesh_text(&text);
    std::fs::write(output, cleaned)?;
    stats.output = output.to_path_buf();
    info!("Clean mesh written to {:?}", output);
    Ok(stats)
}

pub fn print_clean_stats(stats: &CleanStats) {
    let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
    println!("Volume elements: {}", stats.volume_elements);
    println!("Volume elsets: {}", join(&stats.volume_elsets));
    println!("Surface elsets (removed): {}", join(&stats.surface_elsets));
    println!("✓ Clean mesh written to: {}", stats.output.display());
}

// ===== extract-nsets =====

#[derive(Debug, Default)]
pub struct MeshSurfaces {
    pub nodes: usize,
    pub volume_elements: usize,
    /// Surface element set to the nodes of its elements
    pub surface_nodes: BTreeMap<String, BTreeSet<u64>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Section {
    Node,
    Element { volume: bool, elset: Option<String> },
    Other,
}

pub fn parse_surfaces(text: &str) -> Result<MeshSurfaces> {
    let mut mesh = MeshSurfaces::default();
    let mut section = Section::Other;
    // Element records continue onto the next line after a trailing comma
    let mut pending: Vec<u64> = Vec::new();

    let finish = |pending: &mut Vec<u64>, section: &Section, mesh: &mut MeshSurfaces| {
        if pending.is_empty() {
            return;
        }
        if let Section::Element { volume, elset } = section {
            if *volume {
                mesh.volume_elements += 1;
            } else if let Some(elset) = elset {
                mesh.surface_nodes
                    .entry(elset.clone())
                    .or_default()
                    .extend(pending.iter().skip(1));
            }
        }
        pending.clear();
    };

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("**") {
            continue;
        }
        if is_keyword(line) {
            finish(&mut pending, &section, &mut mesh);
            section = if keyword_is(line, "*NODE") {
                Section::Node
            } else if keyword_is(line, "*ELEMENT") {
                Section::Element {
                    volume: is_volume_type(capture(type_re(), line).as_deref()),
                    elset: capture(elset_re(), line),
                }
            } else {
                // *ELSET lists element IDs; the surface elements already carry their nodes
                Section::Other
            };
            continue;
        }
        match &section {
            Section::Node => mesh.nodes += 1,
            Section::Element { .. } => {
                pending.extend(parse_ids(line, i + 1)?);
                if !line.ends_with(',') {
                    finish(&mut pending, &section, &mut mesh);
                }
            }
            Section::Other => {}
        }
    }
    finish(&mut pending, &section, &mut mesh);
    Ok(mesh)
}

/// `*NSET` blocks, sorted by set name
pub fn format_nsets(sets: &BTreeMap<String, BTreeSet<u64>>) -> String {
    let mut out = String::from("** Node sets extracted from GMSH surface elements\n**\n");
    for (name, ids) in sets {
        let _ = writeln!(out, "*NSET, NSET=N{}", name);
        let ids: Vec<u64> = ids.iter().copied().collect();
        let chunks: Vec<&[u64]> = ids.chunks(NSET_IDS_PER_LINE).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let line = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if i + 1 < chunks.len() {
                let _ = writeln!(out, "{},", line);
            } else {
                let _ = writeln!(out, "{}", line);
            }
        }
        out.push_str("**\n");
    }
    out
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NsetStats {
    pub nodes: usize,
    pub volume_elements: usize,
    pub sets: BTreeMap<String, usize>,
    pub output: PathBuf,
}

pub fn extract_nsets(input: &Path, output: &Path) -> Result<NsetStats> {
    info!("Parsing {:?}", input);
    let mesh = parse_surfaces(&std::fs::read_to_string(input)?)?;
    std::fs::write(output, format_nsets(&mesh.surface_nodes))?;
    Ok(NsetStats {
        nodes: mesh.nodes,
        volume_elements: mesh.volume_elements,
        sets: mesh
            .surface_nodes
            .iter()
            .map(|(name, ids)| (format!("N{}", name), ids.len()))
            .collect(),
        output: output.to_path_buf(),
    })
}

pub fn print_nset_stats(stats: &NsetStats) {
    println!("  Nodes: {}", stats.nodes);
    println!("  Volume elements: {}", stats.volume_elements);
    println!(
        "✓ Written {} node sets to {}",
        stats.sets.len(),
        stats.output.display()
    );
    for (name, count) in &stats.sets {
        println!("  {}: {} nodes", name, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DECK: &str = "** GMSH export
*NODE
1, 0.0, 0.0, 0.0
2, 1.0, 0.0, 0.0
3, 0.0, 1.0, 0.0
4, 0.0, 0.0, 1.0
5, 1.0, 1.0, 0.0
*ELEMENT, type=CPS3, ELSET=Fixed
10, 1, 2, 3
11, 2, 5, 3
*ELEMENT, type=CPS3, ELSET=Load
12, 1, 2,
4
*ELEMENT, type=C3D4, ELSET=Volume1
20, 1, 2, 3, 4
21, 2, 5, 3, 4
*ELSET, ELSET=Fixed
10, 11
*ELSET, ELSET=Solid
20, 21
*MATERIAL, NAME=Steel
*ELASTIC
210000, 0.3
";

    #[test]
    fn test_clean_mesh_drops_surface_sections() {
        let (out, stats) = clean_mesh_text(DECK);
        assert_eq!(stats.volume_elements, 2);
        assert!(stats.volume_elsets.contains("VOLUME1"));
        assert_eq!(
            stats.surface_elsets.iter().collect::<Vec<_>>(),
            vec!["FIXED", "LOAD"]
        );
        assert!(!out.contains("CPS3"));
        assert!(!out.contains("10, 11"));
        assert!(!out.contains("12, 1, 2,"));
        assert!(out.contains("*ELEMENT, type=C3D4, ELSET=Volume1\n20, 1, 2, 3, 4\n"));
        assert!(out.contains("*ELSET, ELSET=Solid\n20, 21\n"));
        assert!(out.contains("*MATERIAL, NAME=Steel\n*ELASTIC\n210000, 0.3\n"));
        assert!(out.starts_with("** GMSH export\n*NODE\n1, 0.0"));
    }

    #[test]
    fn test_extract_nsets_groups_surface_nodes() {
        let mesh = parse_surfaces(DECK).unwrap();
        assert_eq!(mesh.nodes, 5);
        assert_eq!(mesh.volume_elements, 2);
        let fixed: Vec<u64> = mesh.surface_nodes["FIXED"].iter().copied().collect();
        assert_eq!(fixed, vec![1, 2, 3, 5]);
        let load: Vec<u64> = mesh.surface_nodes["LOAD"].iter().copied().collect();
        assert_eq!(load, vec![1, 2, 4]);
    }

    #[test]
    fn test_format_nsets() {
        let mut sets = BTreeMap::new();
        sets.insert("TOP".to_string(), (1..=12).collect::<BTreeSet<u64>>());
        sets.insert("BASE".to_string(), [7u64, 3].into_iter().collect());
        let text = format_nsets(&sets);
        assert_eq!(
            text,
            "** Node sets extracted from GMSH surface elements\n**\n\
             *NSET, NSET=NBASE\n3, 7\n**\n\
             *NSET, NSET=NTOP\n1, 2, 3, 4, 5, 6, 7, 8, 9, 10,\n11, 12\n**\n"
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("mesh.inp");
        std::fs::write(&input, DECK).unwrap();

        let stats = extract_nsets(&input, &dir.path().join("nsets.inp")).unwrap();
        assert_eq!(stats.sets["NFIXED"], 4);

        let stats = clean_mesh(&input, &dir.path().join("clean.inp")).unwrap();
        assert!(stats.lines_written > 0);
        let cleaned = std::fs::read_to_string(&stats.output).unwrap();
        assert!(parse_surfaces(&cleaned).unwrap().surface_nodes.is_empty());
    }

    #[test]
    fn test_bad_ids_are_parse_errors() {
        let deck = "*ELEMENT, type=CPS3, ELSET=S\n1, 2, x\n";
        assert!(matches!(parse_surfaces(deck), Err(Error::Parse(_))));
    }
}
