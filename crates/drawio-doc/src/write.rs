//! Document → XML text.
//!
//! Output is compact (no indentation) and deterministic: parsing it and
//! writing again yields the same bytes. Attributes are always escaped with
//! [`escape_attribute`], the exact inverse of what the parser decodes.

use crate::escape::escape_attribute;
use crate::geometry::{Geometry, Point, PointRole};
use crate::model::{Cell, CellKind, Document, Entry, Wrapper, WrapperKind};
use crate::payload;
use indexmap::IndexMap;
use std::io;

pub fn to_xml(doc: &Document) -> String {
    let mut out = String::with_capacity(doc.len() * 160 + 64);
    write_model(doc, &mut out);
    out
}

/// Wrap the model in a single-page `<mxfile>`. With `compressed` the page
/// body is written as an encoded payload instead of nested XML.
pub fn to_mxfile_xml(doc: &Document, name: &str, compressed: bool) -> io::Result<String> {
    let model = to_xml(doc);
    let mut out = String::with_capacity(model.len() + 96);
    out.push_str("<mxfile host=\"drawio-doc\"><diagram");
    push_attr(&mut out, "name", name);
    out.push('>');
    if compressed {
        out.push_str(&payload::encode_diagram(&model)?);
    } else {
        out.push_str(&model);
    }
    out.push_str("</diagram></mxfile>");
    Ok(out)
}

fn write_model(doc: &Document, out: &mut String) {
    out.push_str("<mxGraphModel");
    push_extra(out, &doc.attributes);
    out.push('>');
    if doc.is_empty() {
        out.push_str("<root/>");
    } else {
        out.push_str("<root>");
        for entry in doc.iter() {
            write_entry(entry, out);
        }
        out.push_str("</root>");
    }
    out.push_str("</mxGraphModel>");
}

fn write_entry(entry: &Entry, out: &mut String) {
    match entry {
        Entry::Cell(cell) => write_cell(cell, None, out),
        Entry::UserObject(wrapper) => write_wrapper(WrapperKind::UserObject, wrapper, out),
        Entry::Object(wrapper) => write_wrapper(WrapperKind::Object, wrapper, out),
    }
}

fn write_wrapper(kind: WrapperKind, wrapper: &Wrapper, out: &mut String) {
    let name = kind.element_name();
    out.push('<');
    out.push_str(name);
    let label_attr = if wrapper.label_in_value { "value" } else { "label" };
    push_opt(out, label_attr, wrapper.label.as_deref());
    push_opt(out, "link", wrapper.link());
    if wrapper.tag_count() > 0 {
        push_attr(out, "tags", &wrapper.tags_as_text());
    }
    push_opt(out, "tooltip", wrapper.tooltip.as_deref());
    push_opt(out, "placeholder", wrapper.placeholder.as_deref());
    push_extra(out, &wrapper.extra);
    push_attr(out, "id", &wrapper.id);
    out.push('>');
    write_cell(wrapper.cell(), Some(&wrapper.id), out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// `owner` is the id of the enclosing wrapper; a matching inner id is
/// suppressed.
fn write_cell(cell: &Cell, owner: Option<&str>, out: &mut String) {
    out.push_str("<mxCell");
    let id = cell.id.as_deref().filter(|id| owner.is_none_or(|owner| owner != *id));
    push_opt(out, "id", id);
    push_opt(out, "value", cell.value.as_deref());
    if let Some(style) = &cell.style {
        push_attr(out, "style", &style.to_string());
    }
    match &cell.kind {
        CellKind::Container => {}
        CellKind::Vertex => push_attr(out, "vertex", "1"),
        CellKind::Edge { .. } => push_attr(out, "edge", "1"),
    }
    push_flag(out, "connectable", cell.connectable);
    push_flag(out, "collapsed", cell.collapsed);
    push_opt(out, "parent", cell.parent.as_deref());
    push_opt(out, "source", cell.source());
    push_opt(out, "target", cell.target());
    push_extra(out, &cell.extra);

    match &cell.geometry {
        Some(geometry) => {
            out.push('>');
            write_geometry(geometry, out);
            out.push_str("</mxCell>");
        }
        None => out.push_str("/>"),
    }
}

fn write_geometry(geometry: &Geometry, out: &mut String) {
    out.push_str("<mxGeometry");
    push_opt(out, "x", geometry.x.as_deref());
    push_opt(out, "y", geometry.y.as_deref());
    push_opt(out, "width", geometry.width.as_deref());
    push_opt(out, "height", geometry.height.as_deref());
    push_flag(out, "relative", geometry.relative);
    push_extra(out, &geometry.extra);
    push_opt(out, "as", geometry.as_attr.as_deref());

    if !geometry.has_children() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(point) = &geometry.source_point {
        write_point(point, PointRole::Source, out);
    }
    if let Some(point) = &geometry.target_point {
        write_point(point, PointRole::Target, out);
    }
    if !geometry.points.is_empty() {
        out.push_str("<Array as=\"points\">");
        for point in &geometry.points {
            write_point(point, PointRole::Waypoint, out);
        }
        out.push_str("</Array>");
    }
    if let Some(point) = &geometry.offset {
        write_point(point, PointRole::Offset, out);
    }
    out.push_str("</mxGeometry>");
}

fn write_point(point: &Point, role: PointRole, out: &mut String) {
    out.push_str("<mxPoint");
    push_opt(out, "x", point.x.as_deref());
    push_opt(out, "y", point.y.as_deref());
    push_extra(out, &point.extra);
    push_opt(out, "as", role.as_attr());
    out.push_str("/>");
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape_attribute(value));
    out.push('"');
}

fn push_opt(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        push_attr(out, key, value);
    }
}

fn push_flag(out: &mut String, key: &str, value: Option<bool>) {
    if let Some(value) = value {
        push_attr(out, key, if value { "1" } else { "0" });
    }
}

fn push_extra(out: &mut String, extra: &IndexMap<String, String>) {
    for (key, value) in extra {
        push_attr(out, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use crate::style::Style;

    #[test]
    fn minimal_document_is_written_compactly() {
        let xml = Document::blank().to_xml();
        assert_eq!(
            xml,
            r#"<mxGraphModel><root><mxCell id="0"/><mxCell id="1" parent="0"/></root></mxGraphModel>"#
        );
    }

    #[test]
    fn empty_value_differs_from_missing_value() {
        let mut doc = Document::blank();
        doc.push(Entry::Cell(Cell::vertex().with_id("a").with_value("").with_parent("1")));
        doc.push(Entry::Cell(Cell::vertex().with_id("b").with_parent("1")));
        let xml = doc.to_xml();
        assert!(xml.contains(r#"<mxCell id="a" value="" vertex="1" parent="1"/>"#));
        assert!(xml.contains(r#"<mxCell id="b" vertex="1" parent="1"/>"#));

        let reparsed = parse_document(&xml).expect("parse").document;
        assert_eq!(reparsed.get("a").and_then(Entry::label), Some(""));
        assert_eq!(reparsed.get("b").and_then(Entry::label), None);
    }

    #[test]
    fn wrapped_cell_never_repeats_the_id() {
        let mut cell = Cell::vertex().with_parent("1");
        cell.id = Some("w".into());
        let mut wrapper = Wrapper::new("w", cell).with_label("L");
        wrapper.cell_mut().id = Some("w".into());
        let mut doc = Document::blank();
        doc.push(Entry::UserObject(wrapper));
        let xml = doc.to_xml();
        assert!(xml.contains(r#"<UserObject label="L" id="w"><mxCell vertex="1" parent="1"/></UserObject>"#));
    }

    #[test]
    fn attributes_are_escaped() {
        let mut doc = Document::blank();
        doc.push(Entry::Cell(
            Cell::vertex()
                .with_id("q")
                .with_value("a \"b\" <c>\n&")
                .with_style(Style::parse("html=1")),
        ));
        let xml = doc.to_xml();
        assert!(xml.contains(r#"value="a &quot;b&quot; &lt;c&gt;&#xa;&amp;""#));
        let reparsed = parse_document(&xml).expect("parse").document;
        assert_eq!(reparsed.get("q").and_then(Entry::label), Some("a \"b\" <c>\n&"));
    }

    #[test]
    fn compressed_mxfile_round_trips() {
        let doc = Document::blank();
        let xml = to_mxfile_xml(&doc, "Page-1", true).expect("encode");
        assert!(xml.starts_with(r#"<mxfile host="drawio-doc"><diagram name="Page-1">"#));
        let reparsed = parse_document(&xml).expect("parse").document;
        assert_eq!(reparsed, doc);
    }
}
