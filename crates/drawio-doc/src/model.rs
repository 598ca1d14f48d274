use crate::action::{self, DecodedLink};
use crate::geometry::Geometry;
use crate::parse::{self, ParseResult};
use crate::style::Style;
use crate::write;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};

/// Id draw.io gives the root cell of every page.
pub const DEFAULT_ROOT_ID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("a cell cannot be both a vertex and an edge")]
    InvalidCell,
}

/// What a cell is. A cell that is neither vertex nor edge is a container:
/// the root cell, or a layer when parented at the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CellKind {
    Container,
    Vertex,
    Edge {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
}

impl CellKind {
    pub fn from_flags(vertex: bool, edge: bool) -> Result<Self, ModelError> {
        match (vertex, edge) {
            (true, true) => Err(ModelError::InvalidCell),
            (true, false) => Ok(CellKind::Vertex),
            (false, true) => Ok(CellKind::Edge {
                source: None,
                target: None,
            }),
            (false, false) => Ok(CellKind::Container),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `Some("")` and `None` differ: the first is written as `value=""`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(flatten)]
    pub kind: CellKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

impl Cell {
    pub fn new(kind: CellKind) -> Self {
        Cell {
            id: None,
            value: None,
            style: None,
            parent: None,
            kind,
            connectable: None,
            collapsed: None,
            geometry: None,
            extra: IndexMap::new(),
        }
    }

    pub fn with_flags(vertex: bool, edge: bool) -> Result<Self, ModelError> {
        CellKind::from_flags(vertex, edge).map(Cell::new)
    }

    pub fn container() -> Self {
        Cell::new(CellKind::Container)
    }

    pub fn vertex() -> Self {
        Cell::new(CellKind::Vertex)
    }

    pub fn edge(source: impl Into<String>, target: impl Into<String>) -> Self {
        Cell::new(CellKind::Edge {
            source: Some(source.into()),
            target: Some(target.into()),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, CellKind::Vertex)
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, CellKind::Edge { .. })
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, CellKind::Container)
    }

    /// The page root: a container without a parent.
    pub fn is_root(&self) -> bool {
        self.is_container() && self.parent.is_none()
    }

    pub fn is_layer(&self, root_id: &str) -> bool {
        self.is_container() && self.parent.as_deref() == Some(root_id)
    }

    pub fn is_group(&self) -> bool {
        self.is_vertex()
            && self.connectable == Some(false)
            && self.style.as_ref().is_some_and(Style::declares_group)
    }

    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Edge { source, .. } => source.as_deref(),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Edge { target, .. } => target.as_deref(),
            _ => None,
        }
    }

    /// Endpoint slots of an edge, `None` for other kinds.
    pub fn endpoints_mut(&mut self) -> Option<(&mut Option<String>, &mut Option<String>)> {
        match &mut self.kind {
            CellKind::Edge { source, target } => Some((source, target)),
            _ => None,
        }
    }

    pub fn style_mut(&mut self) -> &mut Style {
        self.style.get_or_insert_with(Style::new)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapperKind {
    #[default]
    UserObject,
    Object,
}

impl WrapperKind {
    pub fn element_name(self) -> &'static str {
        match self {
            WrapperKind::UserObject => "UserObject",
            WrapperKind::Object => "object",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("userObject") {
            Some(WrapperKind::UserObject)
        } else if name == "object" {
            Some(WrapperKind::Object)
        } else {
            None
        }
    }
}

/// Metadata envelope around exactly one cell. The wrapper's id is the
/// entry's identity; the inner cell carries no id of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wrapper {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
    /// An `<object>` read with `value` instead of `label` is written back
    /// the same way.
    #[serde(skip)]
    pub(crate) label_in_value: bool,
    cell: Cell,
}

impl Wrapper {
    pub fn new(id: impl Into<String>, mut cell: Cell) -> Self {
        let id = id.into();
        if let Some(inner) = cell.id.take()
            && inner != id
        {
            log::debug!(wrapper:? = id, cell:? = inner; "Dropping inner cell id in favour of wrapper id");
        }
        Wrapper {
            id,
            label: None,
            link: None,
            tags: BTreeSet::new(),
            tooltip: None,
            placeholder: None,
            extra: IndexMap::new(),
            label_in_value: false,
            cell,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut Cell {
        &mut self.cell
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Replace the link. An empty string clears it. Encoded action links are
    /// stored in the form an XML reader sees, see [`action::unescape_link`].
    pub fn set_link(&mut self, link: impl Into<String>) {
        let link = link.into();
        if link.is_empty() {
            self.link = None;
            return;
        }
        let plain = match action::unescape_link(&link) {
            Cow::Owned(plain) => Some(plain),
            Cow::Borrowed(_) => None,
        };
        self.link = Some(plain.unwrap_or(link));
    }

    pub fn clear_link(&mut self) {
        self.link = None;
    }

    /// Interpret the link as an action link; `None` for ordinary URLs.
    pub fn actions(&self) -> Option<DecodedLink> {
        action::decode(self.link.as_deref()?)
    }

    /// Add a tag; surrounding whitespace is trimmed, blank tags are ignored.
    /// Returns whether the tag was new.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.tags.insert(tag.to_string())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag.trim())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Space separated tags. Callers must not rely on the order.
    pub fn tags_as_text(&self) -> String {
        self.tags().collect::<Vec<_>>().join(" ")
    }

    pub fn set_tags_from_text(&mut self, text: &str) {
        self.tags = text.split_whitespace().map(str::to_string).collect();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entry", rename_all = "camelCase")]
pub enum Entry {
    Cell(Cell),
    UserObject(Wrapper),
    Object(Wrapper),
}

impl Entry {
    pub fn wrapped(kind: WrapperKind, wrapper: Wrapper) -> Self {
        match kind {
            WrapperKind::UserObject => Entry::UserObject(wrapper),
            WrapperKind::Object => Entry::Object(wrapper),
        }
    }

    /// The one externally visible id of this entry.
    pub fn id(&self) -> Option<&str> {
        match self {
            Entry::Cell(cell) => cell.id.as_deref(),
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => Some(&wrapper.id),
        }
    }

    pub fn cell(&self) -> &Cell {
        match self {
            Entry::Cell(cell) => cell,
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => wrapper.cell(),
        }
    }

    pub fn cell_mut(&mut self) -> &mut Cell {
        match self {
            Entry::Cell(cell) => cell,
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => wrapper.cell_mut(),
        }
    }

    pub fn wrapper(&self) -> Option<&Wrapper> {
        match self {
            Entry::Cell(_) => None,
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => Some(wrapper),
        }
    }

    pub fn wrapper_mut(&mut self) -> Option<&mut Wrapper> {
        match self {
            Entry::Cell(_) => None,
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => Some(wrapper),
        }
    }

    pub fn wrapper_kind(&self) -> Option<WrapperKind> {
        match self {
            Entry::Cell(_) => None,
            Entry::UserObject(_) => Some(WrapperKind::UserObject),
            Entry::Object(_) => Some(WrapperKind::Object),
        }
    }

    /// Display text: the wrapper label, else the cell value.
    pub fn label(&self) -> Option<&str> {
        match self {
            Entry::Cell(cell) => cell.value.as_deref(),
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => wrapper.label.as_deref(),
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        match self {
            Entry::Cell(cell) => cell.value = Some(label.into()),
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => {
                wrapper.label = Some(label.into())
            }
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.cell().parent.as_deref()
    }

    pub fn is_layer(&self, root_id: &str) -> bool {
        self.cell().is_layer(root_id)
    }

    pub fn is_group(&self) -> bool {
        self.cell().is_group()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.wrapper().is_some_and(|w| w.has_tag(tag))
    }

    /// Move a bare cell into a wrapper of `kind`, its value becoming the
    /// wrapper label. Cells without an id and wrapped entries are returned
    /// unchanged.
    pub fn into_wrapped(self, kind: WrapperKind) -> Entry {
        match self {
            Entry::Cell(mut cell) => match cell.id.clone() {
                Some(id) => {
                    let label = cell.value.take();
                    let mut wrapper = Wrapper::new(id, cell);
                    wrapper.label = label;
                    Entry::wrapped(kind, wrapper)
                }
                None => Entry::Cell(cell),
            },
            wrapped => wrapped,
        }
    }
}

/// The ordered entries of one diagram page plus the `mxGraphModel`
/// attributes. Entry order is significant and preserved end to end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
    entries: Vec<Entry>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// What draw.io starts a page with: root `0` and layer `1`.
    pub fn blank() -> Self {
        Document::from_parts(
            IndexMap::new(),
            vec![
                Entry::Cell(Cell::container().with_id(DEFAULT_ROOT_ID)),
                Entry::Cell(Cell::container().with_id("1").with_parent(DEFAULT_ROOT_ID)),
            ],
        )
    }

    pub fn from_parts(attributes: IndexMap<String, String>, entries: Vec<Entry>) -> Self {
        let mut doc = Document {
            attributes,
            entries,
            index: FxHashMap::default(),
        };
        doc.reindex();
        doc
    }

    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        parse::parse_document(xml).map(|parsed| parsed.document)
    }

    pub fn to_xml(&self) -> String {
        write::to_xml(self)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(Entry::id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of the first entry with this id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.index_of(id).map(|i| &self.entries[i])
    }

    /// Entries can change their id through this, so it stays inside the
    /// crate where every id change is followed by [`Document::reindex`].
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Entry> {
        let i = self.index_of(id)?;
        self.entries.get_mut(i)
    }

    /// Id of the page root cell, if the document has one.
    pub fn root_cell_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.cell().is_root())
            .and_then(Entry::id)
    }

    /// Sentinel that layers are parented at.
    pub fn root_id(&self) -> &str {
        self.root_cell_id().unwrap_or(DEFAULT_ROOT_ID)
    }

    pub fn list_layers(&self) -> Vec<&Entry> {
        let root = self.root_id();
        self.entries.iter().filter(|e| e.is_layer(root)).collect()
    }

    /// Vertices and edges, optionally only those directly inside `layer`.
    pub fn list_nodes(&self, layer: Option<&str>) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.cell().is_vertex() || e.cell().is_edge())
            .filter(|e| layer.is_none_or(|layer| e.parent() == Some(layer)))
            .collect()
    }

    pub fn list_groups(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.is_group()).collect()
    }

    /// Every tag used by any wrapper, deduplicated.
    pub fn list_tags(&self) -> Vec<String> {
        let tags: BTreeSet<&str> = self
            .entries
            .iter()
            .filter_map(Entry::wrapper)
            .flat_map(Wrapper::tags)
            .collect();
        tags.into_iter().map(str::to_string).collect()
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.has_tag(tag)).collect()
    }

    pub fn find_by_value(&self, value: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.label() == Some(value))
    }

    pub fn children_of(&self, id: &str) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.parent() == Some(id))
            .collect()
    }

    /// Ids of every entry below `id` in the parent hierarchy, breadth first.
    pub fn descendants_of(&self, id: &str) -> Vec<String> {
        let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for entry in &self.entries {
            if let (Some(child), Some(parent)) = (entry.id(), entry.parent()) {
                children.entry(parent).or_default().push(child);
            }
        }

        let mut out = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for &child in children.get(current).into_iter().flatten() {
                if seen.insert(child) {
                    out.push(child.to_string());
                    queue.push_back(child);
                }
            }
        }
        out
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        if let Some(id) = entry.id() {
            self.index.entry(id.to_string()).or_insert(self.entries.len());
        }
        self.entries.push(entry);
    }

    pub(crate) fn insert(&mut self, position: usize, entry: Entry) {
        self.entries.insert(position.min(self.entries.len()), entry);
        self.reindex();
    }

    pub(crate) fn remove_at(&mut self, position: usize) -> Entry {
        let entry = self.entries.remove(position);
        self.reindex();
        entry
    }

    /// Insert right after the entry `anchor`, or at the end when it is absent.
    pub(crate) fn insert_after(&mut self, entry: Entry, anchor: &str) {
        match self.index_of(anchor) {
            Some(i) => {
                self.entries.insert(i + 1, entry);
                self.reindex();
            }
            None => self.push(entry),
        }
    }

    pub(crate) fn remove_where(&mut self, mut remove: impl FnMut(&Entry) -> bool) -> Vec<Entry> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if remove(&entry) {
                removed.push(entry);
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
        self.reindex();
        removed
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub(crate) fn replace_entry(&mut self, position: usize, entry: Entry) -> Entry {
        let old = std::mem::replace(&mut self.entries[position], entry);
        self.reindex();
        old
    }

    pub(crate) fn reindex(&mut self) {
        self.index.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(id) = entry.id() {
                self.index.entry(id.to_string()).or_insert(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_and_edge_together_is_rejected() {
        assert_eq!(Cell::with_flags(true, true), Err(ModelError::InvalidCell));
        assert!(Cell::with_flags(true, false).is_ok());
    }

    #[test]
    fn vertex_is_group_only_with_group_shape_and_not_connectable() {
        let plain = Cell::with_flags(true, false).expect("vertex");
        assert!(!plain.is_group());

        let mut group = Cell::vertex().with_style(Style::parse("shape=group"));
        assert!(!group.is_group());
        group.connectable = Some(false);
        assert!(group.is_group());
    }

    #[test]
    fn wrapper_takes_over_cell_identity() {
        let wrapper = Wrapper::new("n1", Cell::vertex().with_id("n1"));
        assert_eq!(wrapper.cell().id, None);
        let entry = Entry::UserObject(wrapper);
        assert_eq!(entry.id(), Some("n1"));
    }

    #[test]
    fn tags_are_a_set() {
        let mut wrapper = Wrapper::new("w", Cell::vertex());
        assert!(wrapper.add_tag("a"));
        assert!(!wrapper.add_tag(" a "));
        assert!(!wrapper.add_tag("  "));
        wrapper.add_tag("b");
        assert_eq!(wrapper.tag_count(), 2);
        let text = wrapper.tags_as_text();
        let mut parts: Vec<&str> = text.split(' ').collect();
        parts.sort_unstable();
        assert_eq!(parts, ["a", "b"]);
        assert!(wrapper.remove_tag("a"));
        assert!(!wrapper.has_tag("a"));
    }

    #[test]
    fn blank_document_has_one_layer() {
        let doc = Document::blank();
        let layers: Vec<_> = doc.list_layers().iter().filter_map(|e| e.id()).collect();
        assert_eq!(layers, ["1"]);
        assert_eq!(doc.root_id(), "0");
    }

    #[test]
    fn index_points_at_first_duplicate() {
        let doc = Document::from_parts(
            IndexMap::new(),
            vec![
                Entry::Cell(Cell::container().with_id("0")),
                Entry::Cell(Cell::vertex().with_id("a").with_value("first")),
                Entry::Cell(Cell::vertex().with_id("a").with_value("second")),
            ],
        );
        assert_eq!(doc.get("a").and_then(Entry::label), Some("first"));
    }

    #[test]
    fn descendants_are_transitive() {
        let doc = Document::from_parts(
            IndexMap::new(),
            vec![
                Entry::Cell(Cell::container().with_id("0")),
                Entry::Cell(Cell::container().with_id("1").with_parent("0")),
                Entry::Cell(Cell::vertex().with_id("g").with_parent("1")),
                Entry::Cell(Cell::vertex().with_id("c").with_parent("g")),
            ],
        );
        assert_eq!(doc.descendants_of("1"), ["g", "c"]);
        assert!(doc.descendants_of("c").is_empty());

        let children: Vec<_> = doc.children_of("1").into_iter().filter_map(Entry::id).collect();
        assert_eq!(children, ["g"]);
        assert!(doc.children_of("c").is_empty());
    }
}
