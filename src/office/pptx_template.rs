//! Built-in 16:9 presentation template

use super::package::{Package, CONTENT_TYPES_PART};
use crate::error::Result;

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

pub const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const CT_BASE: &str = "application/vnd.openxmlformats-officedocument";

pub const SLIDE_WIDTH: i64 = 12_192_000;
pub const SLIDE_HEIGHT: i64 = 6_858_000;

pub fn rel_type(kind: &str) -> String {
    format!("{}/{}", REL_BASE, kind)
}

pub fn pml_content_type(kind: &str) -> String {
    format!("{}.presentationml.{}+xml", CT_BASE, kind)
}

/// Namespace declarations shared by every presentation part
pub fn namespaces() -> String {
    format!(r#"xmlns:a="{}" xmlns:r="{}" xmlns:p="{}""#, NS_A, NS_R, NS_P)
}

pub const GROUP_HEADER: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Rect {
    pub const fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    pub fn xfrm(&self) -> String {
        format!(
            r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            self.x, self.y, self.cx, self.cy
        )
    }
}

/// Placeholder declaration: `type` attribute (if any), `idx` attribute (if any), frame
type PlaceholderSpec = (Option<&'static str>, Option<&'static str>, Rect);

struct LayoutSpec {
    name: &'static str,
    kind: &'static str,
    title: Option<PlaceholderSpec>,
    body: Option<PlaceholderSpec>,
}

const TITLE_RECT: Rect = Rect::new(838_200, 365_125, 10_515_600, 1_325_563);

const LAYOUTS: [LayoutSpec; 5] = [
    LayoutSpec {
        name: "Title Slide",
        kind: "title",
        title: Some((Some("ctrTitle"), None, Rect::new(1_524_000, 1_122_363, 9_144_000, 2_387_600))),
        body: Some((Some("subTitle"), Some("1"), Rect::new(1_524_000, 3_602_038, 9_144_000, 1_655_762))),
    },
    LayoutSpec {
        name: "Title and Content",
        kind: "obj",
        title: Some((Some("title"), None, TITLE_RECT)),
        body: Some((None, Some("1"), Rect::new(838_200, 1_825_625, 10_515_600, 4_351_338))),
    },
    LayoutSpec {
        name: "Section Header",
        kind: "secHead",
        title: Some((Some("title"), None, Rect::new(831_850, 1_709_738, 10_515_600, 2_852_737))),
        body: Some((Some("body"), Some("1"), Rect::new(831_850, 4_589_463, 10_515_600, 1_500_187))),
    },
    LayoutSpec {
        name: "Title Only",
        kind: "titleOnly",
        title: Some((Some("title"), None, TITLE_RECT)),
        body: None,
    },
    LayoutSpec {
        name: "Blank",
        kind: "blank",
        title: None,
        body: None,
    },
];

pub const LAYOUT_NAMES: [&str; 5] = [
    "Title Slide",
    "Title and Content",
    "Section Header",
    "Title Only",
    "Blank",
];

fn placeholder_xml(id: u32, name: &str, spec: &PlaceholderSpec) -> String {
    let (kind, idx, rect) = spec;
    let mut ph = String::from("<p:ph");
    if let Some(kind) = kind {
        ph.push_str(&format!(r#" type="{}""#, kind));
    }
    if let Some(idx) = idx {
        ph.push_str(&format!(r#" idx="{}""#, idx));
    }
    ph.push_str("/>");
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#,
            r#"<p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr>{xfrm}</p:spPr>"#,
            r#"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#
        ),
        id = id,
        name = name,
        ph = ph,
        xfrm = rect.xfrm()
    )
}

fn layout_xml(spec: &LayoutSpec) -> String {
    let mut shapes = String::new();
    if let Some(title) = &spec.title {
        shapes.push_str(&placeholder_xml(2, "Title 1", title));
    }
    if let Some(body) = &spec.body {
        shapes.push_str(&placeholder_xml(3, "Content Placeholder 2", body));
    }
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sldLayout {ns} type="{kind}" preserve="1"><p:cSld name="{name}"><p:spTree>{group}{shapes}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
        ),
        ns = namespaces(),
        kind = spec.kind,
        name = spec.name,
        group = GROUP_HEADER,
        shapes = shapes
    )
}

const CLR_MAP: &str = r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#;

fn level_style(level: usize, size: u32) -> String {
    let indent = 228_600 * (level as i64 + 1);
    format!(
        r#"<a:lvl{n}pPr marL="{indent}" indent="-228600"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/><a:defRPr sz="{size}"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/></a:defRPr></a:lvl{n}pPr>"#,
        n = level + 1,
        indent = indent,
        size = size
    )
}

fn master_xml() -> String {
    let title = placeholder_xml(2, "Title Placeholder 1", &(Some("title"), None, TITLE_RECT));
    let body = placeholder_xml(
        3,
        "Text Placeholder 2",
        &(Some("body"), Some("1"), Rect::new(838_200, 1_825_625, 10_515_600, 4_351_338)),
    );
    let layout_ids: String = (0..LAYOUTS.len())
        .map(|i| format!(r#"<p:sldLayoutId id="{}" r:id="rId{}"/>"#, 2_147_483_649u64 + i as u64, i + 1))
        .collect();
    let body_levels: String = [2800, 2400, 2000, 1800, 1800]
        .iter()
        .enumerate()
        .map(|(level, size)| level_style(level, *size))
        .collect();
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sldMaster {ns}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#,
            r#"<p:spTree>{group}{title}{body}</p:spTree></p:cSld>{clr}"#,
            r#"<p:sldLayoutIdLst>{layouts}</p:sldLayoutIdLst>"#,
            r#"<p:txStyles><p:titleStyle><a:lvl1pPr algn="l"><a:defRPr sz="4400"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mj-lt"/></a:defRPr></a:lvl1pPr></p:titleStyle>"#,
            r#"<p:bodyStyle>{levels}</p:bodyStyle><p:otherStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr></p:otherStyle></p:txStyles>"#,
            r#"</p:sldMaster>"#
        ),
        ns = namespaces(),
        group = GROUP_HEADER,
        title = title,
        body = body,
        clr = CLR_MAP,
        layouts = layout_ids,
        levels = body_levels
    )
}

fn notes_master_xml() -> String {
    let image = placeholder_xml(2, "Slide Image Placeholder 1", &(Some("sldImg"), Some("2"), Rect::new(685_800, 1_143_000, 5_486_400, 3_086_100)));
    let body = placeholder_xml(3, "Notes Placeholder 2", &(Some("body"), Some("3"), Rect::new(685_800, 4_400_550, 5_486_400, 3_600_450)));
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:notesMaster {ns}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#,
            r#"<p:spTree>{group}{image}{body}</p:spTree></p:cSld>{clr}</p:notesMaster>"#
        ),
        ns = namespaces(),
        group = GROUP_HEADER,
        image = image,
        body = body,
        clr = CLR_MAP
    )
}

fn theme_xml(name: &str) -> String {
    let colors = [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#.to_string()),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#.to_string()),
        ("dk2", srgb("44546A")),
        ("lt2", srgb("E7E6E6")),
        ("accent1", srgb("4472C4")),
        ("accent2", srgb("ED7D31")),
        ("accent3", srgb("A5A5A5")),
        ("accent4", srgb("FFC000")),
        ("accent5", srgb("5B9BD5")),
        ("accent6", srgb("70AD47")),
        ("hlink", srgb("0563C1")),
        ("folHlink", srgb("954F72")),
    ];
    let scheme: String = colors
        .iter()
        .map(|(slot, color)| format!("<a:{slot}>{color}</a:{slot}>", slot = slot, color = color))
        .collect();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = r#"<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<a:theme xmlns:a="{ns_a}" name="{name}"><a:themeElements>"#,
            r#"<a:clrScheme name="Office">{scheme}</a:clrScheme>"#,
            r#"<a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
            r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>"#,
            r#"<a:fmtScheme name="Office"><a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst>"#,
            r#"<a:lnStyleLst>{line}{line}{line}</a:lnStyleLst>"#,
            r#"<a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst>"#,
            r#"<a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst></a:fmtScheme>"#,
            r#"</a:themeElements></a:theme>"#
        ),
        ns_a = NS_A,
        name = name,
        scheme = scheme,
        fill = fill,
        line = line,
        effect = effect
    )
}

fn srgb(hex: &str) -> String {
    format!(r#"<a:srgbClr val="{}"/>"#, hex)
}

fn relationships(rels: &[(&str, String)]) -> String {
    let body: String = rels
        .iter()
        .enumerate()
        .map(|(i, (kind, target))| {
            format!(r#"<Relationship Id="rId{}" Type="{}" Target="{}"/>"#, i + 1, rel_type(kind), target)
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        body
    )
}

/// Notes master and its theme; added on demand to templates that lack one
pub fn add_notes_master(package: &mut Package) -> Result<String> {
    let part = "ppt/notesMasters/notesMaster1.xml";
    let theme = "ppt/theme/themeNotes.xml";
    package.set_part(part, notes_master_xml());
    package.set_part(theme, theme_xml("Notes Theme"));
    package.set_part(
        "ppt/notesMasters/_rels/notesMaster1.xml.rels",
        relationships(&[("theme", "../theme/themeNotes.xml".to_string())]),
    );
    package.add_override(part, &pml_content_type("notesMaster"))?;
    package.add_override(theme, &format!("{}.theme+xml", CT_BASE))?;
    Ok(part.to_string())
}

/// A fresh presentation with no slides
pub fn blank_presentation() -> Result<Package> {
    let mut package = Package::new();

    let mut overrides = vec![
        ("ppt/presentation.xml".to_string(), pml_content_type("presentation.main")),
        ("ppt/slideMasters/slideMaster1.xml".to_string(), pml_content_type("slideMaster")),
        ("ppt/theme/theme1.xml".to_string(), format!("{}.theme+xml", CT_BASE)),
        ("ppt/presProps.xml".to_string(), pml_content_type("presProps")),
        ("ppt/tableStyles.xml".to_string(), pml_content_type("tableStyles")),
        ("docProps/app.xml".to_string(), format!("{}.extended-properties+xml", CT_BASE)),
    ];
    for i in 1..=LAYOUTS.len() {
        overrides.push((format!("ppt/slideLayouts/slideLayout{}.xml", i), pml_content_type("slideLayout")));
    }
    let override_xml: String = overrides
        .iter()
        .map(|(part, ct)| format!(r#"<Override PartName="/{}" ContentType="{}"/>"#, part, ct))
        .collect();
    package.set_part(
        CONTENT_TYPES_PART,
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Default Extension="png" ContentType="image/png"/>"#,
                r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#,
                r#"{}</Types>"#
            ),
            override_xml
        ),
    );

    package.set_part(
        "_rels/.rels",
        relationships(&[
            ("officeDocument", "ppt/presentation.xml".to_string()),
            ("extended-properties", "docProps/app.xml".to_string()),
        ]),
    );
    package.set_part(
        "docProps/app.xml",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>jarvis</Application></Properties>"#,
    );

    package.set_part(
        "ppt/presentation.xml",
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<p:presentation {ns} saveSubsetFonts="1">"#,
                r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
                r#"<p:sldIdLst/><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/>"#,
                r#"</p:presentation>"#
            ),
            ns = namespaces(),
            cx = SLIDE_WIDTH,
            cy = SLIDE_HEIGHT
        ),
    );
    package.set_part(
        "ppt/_rels/presentation.xml.rels",
        relationships(&[
            ("slideMaster", "slideMasters/slideMaster1.xml".to_string()),
            ("theme", "theme/theme1.xml".to_string()),
            ("presProps", "presProps.xml".to_string()),
            ("tableStyles", "tableStyles.xml".to_string()),
        ]),
    );
    package.set_part(
        "ppt/presProps.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentationPr {}/>"#,
            namespaces()
        ),
    );
    package.set_part(
        "ppt/tableStyles.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:tblStyleLst xmlns:a="{}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
            NS_A
        ),
    );
    package.set_part("ppt/theme/theme1.xml", theme_xml("Office Theme"));

    package.set_part("ppt/slideMasters/slideMaster1.xml", master_xml());
    let mut master_rels: Vec<(&str, String)> = (1..=LAYOUTS.len())
        .map(|i| ("slideLayout", format!("../slideLayouts/slideLayout{}.xml", i)))
        .collect();
    master_rels.push(("theme", "../theme/theme1.xml".to_string()));
    package.set_part("ppt/slideMasters/_rels/slideMaster1.xml.rels", relationships(&master_rels));

    for (i, spec) in LAYOUTS.iter().enumerate() {
        let n = i + 1;
        package.set_part(&format!("ppt/slideLayouts/slideLayout{}.xml", n), layout_xml(spec));
        package.set_part(
            &format!("ppt/slideLayouts/_rels/slideLayout{}.xml.rels", n),
            relationships(&[("slideMaster", "../slideMasters/slideMaster1.xml".to_string())]),
        );
    }

    let notes_master = add_notes_master(&mut package)?;
    let rid = package.add_relationship(
        "ppt/presentation.xml",
        &rel_type("notesMaster"),
        notes_master.trim_start_matches("ppt/"),
    )?;
    let mut presentation = package.xml("ppt/presentation.xml")?;
    insert_notes_master_id(&mut presentation, &rid);
    package.set_xml("ppt/presentation.xml", &presentation);

    Ok(package)
}

/// `p:notesMasterIdLst` goes right after `p:sldMasterIdLst`
pub fn insert_notes_master_id(presentation: &mut super::xml::Element, rid: &str) {
    use super::xml::{Element, Node};
    if presentation.child("p:notesMasterIdLst").is_some() {
        return;
    }
    let list = Element::new("p:notesMasterIdLst")
        .with_child(Element::new("p:notesMasterId").with_attr("r:id", rid));
    let at = presentation
        .positions_of("p:sldMasterIdLst")
        .first()
        .map(|i| i + 1)
        .unwrap_or(0);
    presentation.children.insert(at, Node::Element(list));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::xml;

    #[test]
    fn test_blank_presentation_parts_parse() {
        let package = blank_presentation().unwrap();
        for name in package.names().map(String::from).collect::<Vec<_>>() {
            if name.ends_with(".xml") || name.ends_with(".rels") {
                xml::parse(&package.part_str(&name).unwrap())
                    .unwrap_or_else(|e| panic!("{} does not parse: {}", name, e));
            }
        }

        let presentation = package.xml("ppt/presentation.xml").unwrap();
        let order: Vec<&str> = presentation.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            order,
            vec!["p:sldMasterIdLst", "p:notesMasterIdLst", "p:sldIdLst", "p:sldSz", "p:notesSz"]
        );

        let layout = package.xml("ppt/slideLayouts/slideLayout2.xml").unwrap();
        assert_eq!(layout.child("p:cSld").unwrap().attr("name"), Some(LAYOUT_NAMES[1]));
        assert_eq!(package.relationships("ppt/slideMasters/slideMaster1.xml").len(), 6);
    }
}
