// quick-xml 0.38 streaming parser for draw.io diagram XML.
//
// Accepts either a bare <mxGraphModel> or an <mxfile> whose first <diagram>
// holds the model, nested or as a compressed payload.
//
// Trimming policy:
// - DO NOT enable Config::trim_text; whitespace inside a compressed payload is
//   stripped by the payload decoder, everything else is ignored explicitly.
// - Unknown elements are skipped with their whole subtree and reported in
//   `Parsed::skipped`; unknown attributes are kept in `extra` maps.

use crate::geometry::{Geometry, Point, PointRole};
use crate::model::{Cell, CellKind, Document, Entry, Wrapper, WrapperKind};
use crate::payload;
use crate::style::Style;
use indexmap::IndexMap;
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::str;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("deflate decode error: {0}")]
    Deflate(#[from] std::io::Error),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("<{wrapper}> has no inner mxCell")]
    MalformedCell { wrapper: String },

    #[error("cell {id:?} is both a vertex and an edge")]
    InvalidCell { id: String },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// An element that was not understood and left out of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub element: String,
    pub parent: String,
}

#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub skipped: Vec<Skipped>,
}

/// Parse a whole document. On error no partial model is returned.
pub fn parse_document(xml: &str) -> ParseResult<Parsed> {
    let mut skipped = Vec::new();
    let document = parse_into(xml, &mut skipped)?;
    Ok(Parsed { document, skipped })
}

fn parse_into(xml: &str, skipped: &mut Vec<Skipped>) -> ParseResult<Document> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    // Open <mxfile>/<diagram> elements outside the graph model.
    let mut outer: Vec<String> = Vec::new();
    let mut graph: Option<GraphState> = None;
    let mut document: Option<Document> = None;
    let mut payload_text: Option<String> = None;
    let mut diagrams = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = element_name(&e)?;
                let was_outer = graph.is_none();
                let step = match graph.as_mut() {
                    Some(state) => state.start(&e, &name, false)?,
                    None => outer_start(
                        &e,
                        &name,
                        &outer,
                        &mut graph,
                        &mut payload_text,
                        &mut diagrams,
                        document.is_some(),
                    )?,
                };
                match step {
                    Step::Enter => {
                        if was_outer && graph.is_none() {
                            outer.push(name.clone());
                        }
                    }
                    Step::Consume => {
                        let end = e.to_end().into_owned();
                        reader.read_to_end_into(end.name(), &mut skip_buf)?;
                    }
                    Step::Skip => {
                        record_skip(skipped, &name, parent_of(&graph, &outer));
                        let end = e.to_end().into_owned();
                        reader.read_to_end_into(end.name(), &mut skip_buf)?;
                    }
                }
                skip_buf.clear();
            }

            Event::Empty(e) => {
                let name = element_name(&e)?;
                let step = match graph.as_mut() {
                    Some(state) => state.start(&e, &name, true)?,
                    None => {
                        outer_empty(&e, &name, &outer, &mut document, &mut diagrams)?
                    }
                };
                if let Step::Skip = step {
                    record_skip(skipped, &name, parent_of(&graph, &outer));
                }
            }

            Event::Text(t) => {
                if graph.is_none()
                    && let Some(text) = payload_text.as_mut()
                {
                    text.push_str(&t.decode()?);
                }
            }

            Event::CData(c) => {
                if graph.is_none()
                    && let Some(text) = payload_text.as_mut()
                {
                    text.push_str(&c.decode()?);
                }
            }

            Event::End(e) => {
                let name = str::from_utf8(e.name().as_ref())?.to_string();
                if let Some(state) = graph.as_mut() {
                    if let Some(done) = state.end(&name)? {
                        graph = None;
                        document.get_or_insert(done);
                    }
                } else {
                    if name == "diagram"
                        && let Some(text) = payload_text.take()
                        && document.is_none()
                    {
                        document = Some(decode_payload(&text, skipped)?);
                    }
                    outer.pop();
                }
            }

            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if graph.is_some() {
        return Err(ParseError::Malformed("unterminated <mxGraphModel>".into()));
    }
    document.ok_or_else(|| ParseError::Malformed("no <mxGraphModel> element found".into()))
}

/// Result of looking at an opening tag.
enum Step {
    /// The element was taken up; its end tag will follow.
    Enter,
    /// Handled; any children are discarded.
    Consume,
    /// Not understood; the subtree is discarded and reported.
    Skip,
}

fn outer_start(
    e: &BytesStart<'_>,
    name: &str,
    outer: &[String],
    graph: &mut Option<GraphState>,
    payload_text: &mut Option<String>,
    diagrams: &mut usize,
    have_document: bool,
) -> ParseResult<Step> {
    let parent = outer.last().map(String::as_str);
    match (parent, name) {
        (None, "mxfile") => Ok(Step::Enter),
        (Some("mxfile"), "diagram") => {
            *diagrams += 1;
            if *diagrams > 1 || have_document {
                return Ok(Step::Skip);
            }
            *payload_text = Some(String::new());
            Ok(Step::Enter)
        }
        (None, "mxGraphModel") | (Some("diagram"), "mxGraphModel") if !have_document => {
            // A nested model wins over any payload text around it.
            *payload_text = None;
            *graph = Some(GraphState::new(attributes(e)?));
            Ok(Step::Enter)
        }
        _ => Ok(Step::Skip),
    }
}

fn outer_empty(
    e: &BytesStart<'_>,
    name: &str,
    outer: &[String],
    document: &mut Option<Document>,
    diagrams: &mut usize,
) -> ParseResult<Step> {
    let parent = outer.last().map(String::as_str);
    match (parent, name) {
        (Some("mxfile"), "diagram") => {
            *diagrams += 1;
            if *diagrams > 1 || document.is_some() {
                return Ok(Step::Skip);
            }
            *document = Some(Document::new());
            Ok(Step::Consume)
        }
        (None, "mxGraphModel") | (Some("diagram"), "mxGraphModel") if document.is_none() => {
            *document = Some(Document::from_parts(attributes(e)?, Vec::new()));
            Ok(Step::Consume)
        }
        _ => Ok(Step::Skip),
    }
}

fn decode_payload(text: &str, skipped: &mut Vec<Skipped>) -> ParseResult<Document> {
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    let xml = payload::decode_diagram(text)?;
    debug!(bytes = xml.len(); "Decoded compressed diagram payload");
    parse_into(&xml, skipped)
}

fn parent_of<'a>(graph: &'a Option<GraphState>, outer: &'a [String]) -> &'a str {
    match graph {
        Some(state) => state.context(),
        None => outer.last().map(String::as_str).unwrap_or("document"),
    }
}

fn record_skip(skipped: &mut Vec<Skipped>, element: &str, parent: &str) {
    warn!(element = element, parent = parent; "Skipping unknown element");
    skipped.push(Skipped {
        element: element.to_string(),
        parent: parent.to_string(),
    });
}

/// A wrapper whose inner cell has not been seen yet.
struct OpenWrapper {
    kind: WrapperKind,
    wrapper: Wrapper,
    cell: Option<Cell>,
}

/// State while inside one <mxGraphModel>.
struct GraphState {
    attributes: IndexMap<String, String>,
    entries: Vec<Entry>,
    depth: usize,
    in_root: bool,
    wrapper: Option<OpenWrapper>,
    cell: Option<Cell>,
    geometry: Option<Geometry>,
    in_points: bool,
}

impl GraphState {
    fn new(attributes: IndexMap<String, String>) -> Self {
        GraphState {
            attributes,
            entries: Vec::new(),
            depth: 0,
            in_root: false,
            wrapper: None,
            cell: None,
            geometry: None,
            in_points: false,
        }
    }

    /// Name of the innermost element currently open.
    fn context(&self) -> &str {
        if self.in_points {
            "Array"
        } else if self.geometry.is_some() {
            "mxGeometry"
        } else if self.cell.is_some() {
            "mxCell"
        } else if let Some(open) = &self.wrapper {
            open.kind.element_name()
        } else if self.in_root {
            "root"
        } else {
            "mxGraphModel"
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, name: &str, empty: bool) -> ParseResult<Step> {
        let step = self.dispatch(e, name, empty)?;
        if let Step::Enter = step
            && !empty
        {
            self.depth += 1;
        }
        Ok(step)
    }

    fn dispatch(&mut self, e: &BytesStart<'_>, name: &str, empty: bool) -> ParseResult<Step> {
        if self.in_points {
            return match name {
                "mxPoint" => {
                    let (role, point) = point_from_attrs(attributes(e)?);
                    if let Some(geometry) = self.geometry.as_mut() {
                        geometry.assign_point(role, point);
                    }
                    Ok(if empty { Step::Enter } else { Step::Consume })
                }
                _ => Ok(Step::Skip),
            };
        }

        if let Some(geometry) = self.geometry.as_mut() {
            return match name {
                "Array" => {
                    if !empty {
                        self.in_points = true;
                    }
                    Ok(Step::Enter)
                }
                "mxPoint" => {
                    let (role, point) = point_from_attrs(attributes(e)?);
                    if role == PointRole::Waypoint {
                        return Ok(Step::Skip);
                    }
                    geometry.assign_point(role, point);
                    Ok(if empty { Step::Enter } else { Step::Consume })
                }
                _ => Ok(Step::Skip),
            };
        }

        if let Some(cell) = self.cell.as_mut() {
            return match name {
                "mxGeometry" => {
                    let geometry = geometry_from_attrs(attributes(e)?);
                    if empty {
                        cell.geometry = Some(geometry);
                    } else {
                        self.geometry = Some(geometry);
                    }
                    Ok(Step::Enter)
                }
                _ => Ok(Step::Skip),
            };
        }

        if let Some(open) = self.wrapper.as_ref() {
            return match name {
                "mxCell" if open.cell.is_none() => {
                    let cell = cell_from_attrs(attributes(e)?)?;
                    if empty {
                        self.finish_cell(cell);
                    } else {
                        self.cell = Some(cell);
                    }
                    Ok(Step::Enter)
                }
                _ => Ok(Step::Skip),
            };
        }

        if self.in_root {
            if name == "mxCell" {
                let cell = cell_from_attrs(attributes(e)?)?;
                if empty {
                    self.finish_cell(cell);
                } else {
                    self.cell = Some(cell);
                }
                return Ok(Step::Enter);
            }
            if let Some(kind) = WrapperKind::from_element_name(name) {
                let wrapper = wrapper_from_attrs(kind, attributes(e)?)?;
                if empty {
                    return Err(ParseError::MalformedCell {
                        wrapper: wrapper.id,
                    });
                }
                self.wrapper = Some(OpenWrapper {
                    kind,
                    wrapper,
                    cell: None,
                });
                return Ok(Step::Enter);
            }
            return Ok(Step::Skip);
        }

        match name {
            "root" => {
                if !empty {
                    self.in_root = true;
                }
                Ok(Step::Enter)
            }
            _ => Ok(Step::Skip),
        }
    }

    /// Close an element; returns the finished document when the model closes.
    fn end(&mut self, name: &str) -> ParseResult<Option<Document>> {
        if self.depth == 0 {
            if name != "mxGraphModel" {
                return Err(ParseError::Malformed(format!(
                    "unexpected </{name}> in <mxGraphModel>"
                )));
            }
            let attributes = std::mem::take(&mut self.attributes);
            let entries = std::mem::take(&mut self.entries);
            debug!(entries = entries.len(); "Parsed graph model");
            return Ok(Some(Document::from_parts(attributes, entries)));
        }
        self.depth -= 1;

        match name {
            "Array" => self.in_points = false,
            "mxGeometry" => {
                if let (Some(geometry), Some(cell)) = (self.geometry.take(), self.cell.as_mut()) {
                    cell.geometry = Some(geometry);
                }
            }
            "mxCell" => {
                if let Some(cell) = self.cell.take() {
                    self.finish_cell(cell);
                }
            }
            "root" => self.in_root = false,
            _ => {
                if let Some(open) = self.wrapper.take() {
                    let OpenWrapper {
                        kind,
                        mut wrapper,
                        cell,
                    } = open;
                    let Some(cell) = cell else {
                        return Err(ParseError::MalformedCell { wrapper: wrapper.id });
                    };
                    *wrapper.cell_mut() = cell;
                    wrapper.cell_mut().id = None;
                    self.entries.push(Entry::wrapped(kind, wrapper));
                }
            }
        }
        Ok(None)
    }

    fn finish_cell(&mut self, cell: Cell) {
        match self.wrapper.as_mut() {
            Some(open) => open.cell = Some(cell),
            None => self.entries.push(Entry::Cell(cell)),
        }
    }
}

fn cell_from_attrs(mut attrs: IndexMap<String, String>) -> ParseResult<Cell> {
    let id = attrs.shift_remove("id");
    let vertex = take_flag(&mut attrs, "vertex").unwrap_or(false);
    let edge = take_flag(&mut attrs, "edge").unwrap_or(false);
    let mut kind = CellKind::from_flags(vertex, edge).map_err(|_| ParseError::InvalidCell {
        id: id.clone().unwrap_or_default(),
    })?;
    if let CellKind::Edge { source, target } = &mut kind {
        *source = attrs.shift_remove("source");
        *target = attrs.shift_remove("target");
    }

    let mut cell = Cell::new(kind);
    cell.id = id;
    cell.value = attrs.shift_remove("value");
    cell.style = attrs.shift_remove("style").map(|s| Style::parse(&s));
    cell.parent = attrs.shift_remove("parent");
    cell.connectable = take_flag(&mut attrs, "connectable");
    cell.collapsed = take_flag(&mut attrs, "collapsed");
    cell.extra = attrs;
    Ok(cell)
}

fn wrapper_from_attrs(kind: WrapperKind, mut attrs: IndexMap<String, String>) -> ParseResult<Wrapper> {
    let id = attrs.shift_remove("id").ok_or_else(|| {
        ParseError::Malformed(format!("<{}> without an id", kind.element_name()))
    })?;
    let mut label = attrs.shift_remove("label");
    let label_in_value = label.is_none() && kind == WrapperKind::Object;
    if label_in_value {
        label = attrs.shift_remove("value");
    }

    // The real cell is attached when it is parsed.
    let mut wrapper = Wrapper::new(id, Cell::container());
    wrapper.label_in_value = label_in_value && label.is_some();
    wrapper.label = label;
    if let Some(link) = attrs.shift_remove("link") {
        wrapper.set_link(link);
    }
    if let Some(tags) = attrs.shift_remove("tags") {
        wrapper.set_tags_from_text(&tags);
    }
    wrapper.tooltip = attrs.shift_remove("tooltip");
    wrapper.placeholder = attrs.shift_remove("placeholder");
    wrapper.extra = attrs;
    Ok(wrapper)
}

fn geometry_from_attrs(mut attrs: IndexMap<String, String>) -> Geometry {
    let relative = take_flag(&mut attrs, "relative");
    Geometry {
        x: attrs.shift_remove("x"),
        y: attrs.shift_remove("y"),
        width: attrs.shift_remove("width"),
        height: attrs.shift_remove("height"),
        relative,
        as_attr: attrs.shift_remove("as"),
        extra: attrs,
        ..Geometry::default()
    }
}

fn point_from_attrs(mut attrs: IndexMap<String, String>) -> (PointRole, Point) {
    let role = PointRole::from_as_attr(attrs.shift_remove("as").as_deref());
    let point = Point {
        x: attrs.shift_remove("x"),
        y: attrs.shift_remove("y"),
        extra: attrs,
    };
    (role, point)
}

/// Remove a `0`/`1` flag. Values that are not flags stay in `attrs`.
fn take_flag(attrs: &mut IndexMap<String, String>, key: &str) -> Option<bool> {
    let value = match attrs.get(key)?.as_str() {
        "1" | "true" => true,
        "0" | "false" => false,
        _ => return None,
    };
    attrs.shift_remove(key);
    Some(value)
}

fn attributes(e: &BytesStart<'_>) -> ParseResult<IndexMap<String, String>> {
    let mut out = IndexMap::new();
    for a in e.attributes() {
        let a = a?;
        let key = str::from_utf8(a.key.as_ref())?.to_string();
        let value = a.unescape_value()?.to_string();
        out.insert(key, value);
    }
    Ok(out)
}

fn element_name(e: &BytesStart<'_>) -> ParseResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}
