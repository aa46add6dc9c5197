//! ISO 10303-21 (STEP): header, entity counts, product structure and tessellated solids

use super::brep;
use super::mesh::Body;
use super::viewer::{NodeKind, TreeNode};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};
use truck_stepio::r#in::ruststep::ast::{DataSection, EntityInstance, Name, Parameter, Record};
use truck_stepio::r#in::ruststep::parser;
use truck_stepio::r#in::Table;

/// Entities that own shells; the first parameter is the name
const SOLID_KINDS: [&str; 4] = [
    "MANIFOLD_SOLID_BREP",
    "BREP_WITH_VOIDS",
    "FACETED_BREP",
    "SHELL_BASED_SURFACE_MODEL",
];

const SHELL_KINDS: [&str; 2] = ["CLOSED_SHELL", "OPEN_SHELL"];

fn as_str(param: &Parameter) -> Option<&str> {
    match param {
        Parameter::String(s) => Some(s),
        _ => None,
    }
}

fn as_instance(param: &Parameter) -> Option<u64> {
    match param {
        Parameter::Ref(Name::Entity(id)) => Some(*id),
        _ => None,
    }
}

/// Every entity reference in a parameter, lists included
fn instances(param: &Parameter, out: &mut Vec<u64>) {
    match param {
        Parameter::Ref(Name::Entity(id)) => out.push(*id),
        Parameter::List(items) => items.iter().for_each(|p| instances(p, out)),
        _ => {}
    }
}

/// Exchange-file rendering of a parameter
fn param_text(param: &Parameter) -> String {
    match param {
        Parameter::String(s) => format!("'{}'", s),
        Parameter::Integer(i) => i.to_string(),
        Parameter::Real(r) => format!("{:?}", r),
        Parameter::Enumeration(e) => format!(".{}.", e),
        Parameter::Ref(Name::Entity(id)) => format!("#{}", id),
        Parameter::Ref(Name::Value(id)) => format!("@{}", id),
        Parameter::Ref(Name::ConstantEntity(c)) => format!("#{}", c),
        Parameter::Ref(Name::ConstantValue(c)) => format!("@{}", c),
        Parameter::List(items) => format!("({})", params_text(items)),
        Parameter::Typed { keyword, parameter } => format!("{}({})", keyword, param_text(parameter)),
        Parameter::NotProvided => "$".to_string(),
        Parameter::Omitted => "*".to_string(),
    }
}

fn params_text(params: &[Parameter]) -> String {
    params.iter().map(param_text).collect::<Vec<_>>().join(",")
}

fn record_params(record: &Record) -> Vec<Parameter> {
    match &record.parameter {
        Parameter::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// One simple record; a complex instance contributes one per part
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u64,
    pub kind: String,
    pub params: Vec<Parameter>,
}

impl Entity {
    fn from_record(id: u64, record: &Record) -> Self {
        Self {
            id,
            kind: record.name.to_ascii_uppercase(),
            params: record_params(record),
        }
    }

    fn param(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    fn str_param(&self, index: usize) -> Option<&str> {
        self.param(index).and_then(as_str)
    }

    fn instance_param(&self, index: usize) -> Option<u64> {
        self.param(index).and_then(as_instance)
    }

    fn instance_list(&self, index: usize) -> Vec<u64> {
        let mut out = Vec::new();
        if let Some(param) = self.param(index) {
            instances(param, &mut out);
        }
        out
    }
}

pub struct StepFile {
    pub header: BTreeMap<String, String>,
    pub entities: Vec<Entity>,
    /// Instance count; complex instances count once
    pub instance_count: usize,
    data: Vec<DataSection>,
}

impl StepFile {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&String::from_utf8_lossy(&data))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let exchange = parser::parse(text).map_err(|e| Error::Parse(format!("STEP: {}", e)))?;
        let header = exchange
            .header
            .iter()
            .map(|record| {
                (
                    record.name.to_ascii_uppercase(),
                    params_text(&record_params(record)),
                )
            })
            .collect();

        let mut entities = Vec::new();
        let mut instance_count = 0;
        for section in &exchange.data {
            for instance in &section.entities {
                instance_count += 1;
                match instance {
                    EntityInstance::Simple { id, record } => {
                        entities.push(Entity::from_record(*id, record));
                    }
                    EntityInstance::Complex { id, subsuper } => {
                        entities.extend(subsuper.0.iter().map(|r| Entity::from_record(*id, r)));
                    }
                }
            }
        }
        debug!("STEP: {} instances, {} records", instance_count, entities.len());
        Ok(Self {
            header,
            entities,
            instance_count,
            data: exchange.data,
        })
    }

    pub fn entity_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for entity in &self.entities {
            *counts.entry(entity.kind.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn of_kind<'a>(&'a self, kinds: &'a [&str]) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .filter(move |e| kinds.contains(&e.kind.as_str()))
    }

    fn product_name(entity: &Entity) -> String {
        entity
            .str_param(1)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entity.str_param(0))
            .unwrap_or_default()
            .to_string()
    }

    /// Product names in file order
    pub fn products(&self) -> Vec<String> {
        self.of_kind(&["PRODUCT"]).map(Self::product_name).collect()
    }

    /// Product definitions in file order, named after their product
    fn definitions(&self) -> Vec<(u64, String)> {
        let products: HashMap<u64, String> = self
            .of_kind(&["PRODUCT"])
            .map(|e| (e.id, Self::product_name(e)))
            .collect();
        let formations: HashMap<u64, u64> = self
            .of_kind(&[
                "PRODUCT_DEFINITION_FORMATION",
                "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE",
            ])
            .filter_map(|e| Some((e.id, e.instance_param(2)?)))
            .collect();
        self.of_kind(&["PRODUCT_DEFINITION"])
            .map(|e| {
                let name = e
                    .instance_param(2)
                    .and_then(|f| formations.get(&f))
                    .and_then(|p| products.get(p))
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", e.id));
                (e.id, name)
            })
            .collect()
    }

    /// Assembly tree from product definitions and assembly usage occurrences
    pub fn product_tree(&self, root_name: &str) -> TreeNode {
        let definitions = self.definitions();
        let names: HashMap<u64, String> = definitions.iter().cloned().collect();

        let mut children: HashMap<u64, Vec<(u64, String)>> = HashMap::new();
        let mut related: HashSet<u64> = HashSet::new();
        for usage in self.of_kind(&["NEXT_ASSEMBLY_USAGE_OCCURRENCE"]) {
            let (Some(parent), Some(child)) = (usage.instance_param(3), usage.instance_param(4))
            else {
                continue;
            };
            let instance = usage.str_param(1).unwrap_or_default();
            children
                .entry(parent)
                .or_default()
                .push((child, instance.to_string()));
            related.insert(child);
        }

        let build = |root: u64| {
            let mut path = HashSet::new();
            Self::tree_node(root, None, &names, &children, &mut path)
        };
        let mut roots: Vec<TreeNode> = definitions
            .iter()
            .filter(|(id, _)| !related.contains(id))
            .map(|(id, _)| build(*id))
            .collect();

        match roots.len() {
            0 => TreeNode::new(root_name, NodeKind::Part, Vec::new()),
            1 => roots.remove(0),
            _ => TreeNode::new(root_name, NodeKind::Assembly, roots),
        }
    }

    /// Part names keyed by shape representation
    ///
    /// A representation is named through `SHAPE_DEFINITION_REPRESENTATION`
    /// and `PRODUCT_DEFINITION_SHAPE`; relationships between representations
    /// pass the name on to the geometric one.
    fn representation_names(&self) -> HashMap<u64, String> {
        let definitions: HashMap<u64, String> = self.definitions().into_iter().collect();
        let shapes: HashMap<u64, u64> = self
            .of_kind(&["PRODUCT_DEFINITION_SHAPE"])
            .filter_map(|e| Some((e.id, e.instance_param(2)?)))
            .collect();
        let mut names: HashMap<u64, String> = self
            .of_kind(&["SHAPE_DEFINITION_REPRESENTATION"])
            .filter_map(|e| {
                let definition = shapes.get(&e.instance_param(0)?)?;
                Some((e.instance_param(1)?, definitions.get(definition)?.clone()))
            })
            .collect();

        let links: Vec<(u64, u64)> = self
            .entities
            .iter()
            .filter(|e| e.kind.starts_with("SHAPE_REPRESENTATION_RELATIONSHIP"))
            .filter_map(|e| Some((e.instance_param(2)?, e.instance_param(3)?)))
            .collect();
        loop {
            let mut changed = false;
            for (a, b) in &links {
                match (names.get(a).cloned(), names.get(b).cloned()) {
                    (Some(name), None) => {
                        names.insert(*b, name);
                        changed = true;
                    }
                    (None, Some(name)) => {
                        names.insert(*a, name);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                break names;
            }
        }
    }

    /// Solids in file order as `(name, shell ids)`
    ///
    /// A solid is named after the part whose representation holds it, then
    /// its own name, then `fallback`. Parts with several solids number them
    /// `name [1]`, `name [2]` and so on. Shells no solid claims stand alone.
    pub fn solids(&self, fallback: &str) -> Vec<(String, Vec<u64>)> {
        let parts = self.representation_names();
        let mut owner: HashMap<u64, u64> = HashMap::new();
        for rep in self
            .entities
            .iter()
            .filter(|e| e.kind.ends_with("SHAPE_REPRESENTATION"))
        {
            for item in rep.instance_list(1) {
                owner.entry(item).or_insert(rep.id);
            }
        }
        let part_of = |id: u64| owner.get(&id).and_then(|rep| parts.get(rep)).cloned();

        let mut claimed: HashSet<u64> = HashSet::new();
        let mut solids: Vec<(String, Vec<u64>)> = Vec::new();
        for solid in self.of_kind(&SOLID_KINDS) {
            let mut shells = solid.instance_list(1);
            shells.extend(solid.instance_list(2));
            if shells.is_empty() {
                continue;
            }
            claimed.extend(shells.iter().copied());
            let name = part_of(solid.id)
                .or_else(|| solid.str_param(0).filter(|n| !n.trim().is_empty()).map(str::to_string))
                .unwrap_or_else(|| fallback.to_string());
            solids.push((name, shells));
        }
        for shell in self.of_kind(&SHELL_KINDS) {
            if !claimed.contains(&shell.id) {
                let name = part_of(shell.id).unwrap_or_else(|| fallback.to_string());
                solids.push((name, vec![shell.id]));
            }
        }

        let mut totals: HashMap<String, usize> = HashMap::new();
        for (name, _) in &solids {
            *totals.entry(name.clone()).or_insert(0) += 1;
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (name, _) in solids.iter_mut() {
            if totals[name.as_str()] > 1 {
                let n = seen.entry(name.clone()).or_insert(0);
                *n += 1;
                *name = format!("{} [{}]", name, n);
            }
        }
        solids
    }

    /// Tessellate every solid into its own body
    pub fn bodies(&self, fallback: &str) -> Result<Vec<Body>> {
        let data = self
            .data
            .first()
            .ok_or_else(|| Error::Parse("STEP file contains no data sections".to_string()))?;
        let table = Table::from_data_section(data);

        let mut bodies = Vec::new();
        for (name, shells) in self.solids(fallback) {
            let mut body = Body::new(&name);
            for id in shells {
                let Some(mesh) = brep::triangulate_shell(&table, id) else {
                    warn!("STEP shell #{} of {} could not be tessellated", id, name);
                    continue;
                };
                append_shell(&mut body, &mesh)?;
            }
            if body.is_empty() {
                continue;
            }
            debug!("STEP {}: {} triangles", name, body.faces.len());
            bodies.push(body);
        }
        Ok(bodies)
    }

    fn tree_node(
        id: u64,
        instance: Option<&str>,
        names: &HashMap<u64, String>,
        children: &HashMap<u64, Vec<(u64, String)>>,
        path: &mut HashSet<u64>,
    ) -> TreeNode {
        let name = names
            .get(&id)
            .filter(|n| !n.is_empty())
            .map(String::as_str)
            .or(instance)
            .unwrap_or("unnamed")
            .to_string();
        if !path.insert(id) {
            return TreeNode::new(&name, NodeKind::Part, Vec::new());
        }
        let kids: Vec<TreeNode> = children
            .get(&id)
            .map(|list| {
                list.iter()
                    .map(|(child, inst)| Self::tree_node(*child, Some(inst), names, children, path))
                    .collect()
            })
            .unwrap_or_default();
        path.remove(&id);
        let kind = if kids.is_empty() {
            NodeKind::Part
        } else {
            NodeKind::Assembly
        };
        TreeNode::new(&name, kind, kids)
    }
}

fn append_shell(body: &mut Body, mesh: &brep::ShellMesh) -> Result<()> {
    let index = |i: usize| {
        u32::try_from(body.vertices.len() + i)
            .map_err(|_| Error::Parse("STEP tessellation exceeds u32 vertex indices".to_string()))
    };
    let mut faces = Vec::with_capacity(mesh.triangles.len());
    for tri in &mesh.triangles {
        faces.push([index(tri[0])?, index(tri[1])?, index(tri[2])?]);
    }
    body.vertices.extend_from_slice(&mesh.positions);
    body.faces.extend(faces);
    Ok(())
}

/// Structural checks on the raw text
pub fn validate(text: &str) -> Vec<String> {
    let mut issues = Vec::new();
    if !text.contains("HEADER;") {
        issues.push("Missing HEADER section".to_string());
    }
    if !text.contains("DATA;") {
        issues.push("Missing DATA section".to_string());
    }
    if !text.contains("END-ISO-10303-21;") {
        issues.push("Missing END-ISO-10303-21 terminator".to_string());
    }
    if !text.contains("FILE_SCHEMA") {
        issues.push("Missing FILE_SCHEMA in header".to_string());
    }
    issues
}
