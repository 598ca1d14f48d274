//! Structural mutations over a [`Document`].
//!
//! Every operation checks its inputs before touching the document, so an
//! `Err` always leaves the document exactly as it was.

use crate::action::{self, Action, ActionLink, DecodedLink};
use crate::config::EditorConfig;
use crate::geometry::Geometry;
use crate::model::{Cell, Document, Entry, ModelError, Wrapper, WrapperKind};
use crate::style::{Style, StyleKey};
use crate::validate::{self, ValidationError};
use log::{debug, warn};
use rand::Rng;
use rustc_hash::FxHashSet;
use std::borrow::Cow;

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    #[error("no entry with id {0:?}")]
    NotFound(String),

    #[error("{id:?} cannot be a parent here")]
    InvalidParent { id: String },

    #[error("edge endpoint {0:?} does not exist")]
    MissingEndpoint(String),

    #[error(transparent)]
    InvalidCell(#[from] ModelError),

    #[error("id {0:?} is already in use")]
    DuplicateId(String),

    #[error("{id:?} links to {link:?}, which is not an action link")]
    ForeignLink { id: String, link: String },

    #[error("geometry {0} is not a finite number")]
    InvalidGeometry(&'static str),
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// A positioned vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSpec {
    pub value: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub style: Option<Style>,
    /// Layer or group to place the node in; the first layer when `None`.
    pub parent: Option<String>,
    /// Wrap the cell. Tags or a link imply the configured default wrapper.
    pub wrapper: Option<WrapperKind>,
    pub tags: Vec<String>,
    pub link: Option<String>,
}

impl NodeSpec {
    pub fn new(value: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        NodeSpec {
            value: value.into(),
            x,
            y,
            width,
            height,
            ..NodeSpec::default()
        }
    }

    pub fn in_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn wrapped(mut self, kind: WrapperKind) -> Self {
        self.wrapper = Some(kind);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    pub value: Option<String>,
    pub style: Option<Style>,
    pub parent: Option<String>,
}

impl EdgeSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        EdgeSpec {
            source: source.into(),
            target: target.into(),
            ..EdgeSpec::default()
        }
    }

    pub fn in_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub parent: Option<String>,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        GroupSpec {
            name: name.into(),
            x,
            y,
            width,
            height,
            parent: None,
        }
    }
}

pub struct Builder<'a> {
    doc: &'a mut Document,
    config: Cow<'a, EditorConfig>,
}

impl<'a> Builder<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Builder {
            doc,
            config: Cow::Owned(EditorConfig::default()),
        }
    }

    pub fn with_config(doc: &'a mut Document, config: &'a EditorConfig) -> Self {
        Builder {
            doc,
            config: Cow::Borrowed(config),
        }
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        self.doc
    }

    /// A fresh id not used by any entry currently in the document. Ids of
    /// removed entries may be handed out again.
    pub fn generate_id(&self, prefix: Option<&str>) -> String {
        let prefix = prefix.unwrap_or(self.config.id_prefix.as_str());
        let length = self.config.id_length.max(4);
        let mut rng = rand::rng();
        loop {
            let mut id = String::with_capacity(prefix.len() + length);
            id.push_str(prefix);
            for _ in 0..length {
                id.push(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char);
            }
            if !self.doc.contains(&id) {
                return id;
            }
            debug!(id = id.as_str(); "Generated id already in use, drawing again");
        }
    }

    /// Root id of the document, creating the root cell when it is missing.
    fn ensure_root(&mut self) -> String {
        if let Some(root) = self.doc.root_cell_id() {
            return root.to_string();
        }
        let id = if self.doc.contains(&self.config.root_id) {
            self.generate_id(None)
        } else {
            self.config.root_id.clone()
        };
        debug!(id = id.as_str(); "Creating root cell");
        self.doc
            .insert(0, Entry::Cell(Cell::container().with_id(id.clone())));
        id
    }

    fn push_layer(&mut self, name: Option<&str>, locked: bool) -> String {
        let root = self.ensure_root();
        let id = self.generate_id(Some(self.config.layer_id_prefix.as_str()));
        let mut layer = Cell::container().with_id(id.clone()).with_parent(root);
        layer.value = name.map(str::to_string);
        if locked {
            layer.style_mut().set_known(StyleKey::Locked, "1");
        }
        self.doc.push(Entry::Cell(layer));
        debug!(id = id.as_str(), locked = locked; "Added layer");
        id
    }

    /// Append a layer at the top of the stack. Names need not be unique.
    pub fn add_layer(&mut self, name: &str) -> BuilderResult<String> {
        Ok(self.push_layer(Some(name), self.config.lock_new_layers))
    }

    fn check_rect(x: f64, y: f64, width: f64, height: f64) -> BuilderResult<()> {
        for (field, value) in [("x", x), ("y", y), ("width", width), ("height", height)] {
            if !value.is_finite() {
                return Err(BuilderError::InvalidGeometry(field));
            }
        }
        Ok(())
    }

    /// Fails unless `id` exists and is a layer or a group.
    fn check_container(&self, id: &str) -> BuilderResult<()> {
        let entry = self
            .doc
            .get(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        if entry.is_layer(self.doc.root_id()) || entry.is_group() {
            Ok(())
        } else {
            Err(BuilderError::InvalidParent { id: id.to_string() })
        }
    }

    /// Validate an explicit parent, or fall back to the first layer (which
    /// is created when the document has none).
    fn resolve_parent(&mut self, parent: Option<&str>) -> BuilderResult<String> {
        match parent {
            Some(parent) => {
                self.check_container(parent)?;
                Ok(parent.to_string())
            }
            None => {
                let root = self.doc.root_id();
                let first = self
                    .doc
                    .iter()
                    .find(|e| e.is_layer(root))
                    .and_then(Entry::id)
                    .map(str::to_string);
                Ok(match first {
                    Some(layer) => layer,
                    None => self.push_layer(None, false),
                })
            }
        }
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> BuilderResult<String> {
        Self::check_rect(spec.x, spec.y, spec.width, spec.height)?;
        let parent = self.resolve_parent(spec.parent.as_deref())?;
        let id = self.generate_id(None);

        let mut cell = Cell::with_flags(true, false)?
            .with_parent(parent.as_str())
            .with_geometry(Geometry::rect(spec.x, spec.y, spec.width, spec.height));
        cell.style = spec.style;

        let wrapper_kind = spec.wrapper.or_else(|| {
            (!spec.tags.is_empty() || spec.link.is_some()).then_some(self.config.default_wrapper)
        });
        let entry = match wrapper_kind {
            Some(kind) => {
                let mut wrapper = Wrapper::new(id.clone(), cell).with_label(spec.value);
                for tag in &spec.tags {
                    wrapper.add_tag(tag);
                }
                if let Some(link) = spec.link {
                    wrapper.set_link(link);
                }
                Entry::wrapped(kind, wrapper)
            }
            None => Entry::Cell(cell.with_id(id.clone()).with_value(spec.value)),
        };

        self.doc.push(entry);
        debug!(id = id.as_str(), parent = parent.as_str(); "Added node");
        Ok(id)
    }

    /// Connect two existing entries. Fails with `MissingEndpoint` before
    /// anything is added when either end is unknown.
    pub fn add_edge(&mut self, spec: EdgeSpec) -> BuilderResult<String> {
        for end in [&spec.source, &spec.target] {
            if !self.doc.contains(end) {
                return Err(BuilderError::MissingEndpoint(end.clone()));
            }
        }
        let parent = self.resolve_parent(spec.parent.as_deref())?;
        let id = self.generate_id(None);

        let mut cell = Cell::edge(spec.source.as_str(), spec.target.as_str())
            .with_id(id.clone())
            .with_parent(parent.as_str())
            .with_geometry(Geometry::relative_edge());
        cell.value = spec.value;
        cell.style = spec.style;
        self.doc.push(Entry::Cell(cell));
        debug!(id = id.as_str(), source = spec.source.as_str(), target = spec.target.as_str(); "Added edge");
        Ok(id)
    }

    /// A vertex that other cells can be placed into.
    pub fn add_group(&mut self, spec: GroupSpec) -> BuilderResult<String> {
        Self::check_rect(spec.x, spec.y, spec.width, spec.height)?;
        let parent = self.resolve_parent(spec.parent.as_deref())?;
        let id = self.generate_id(None);

        let mut cell = Cell::vertex()
            .with_id(id.clone())
            .with_value(spec.name)
            .with_parent(parent.as_str())
            .with_geometry(Geometry::rect(spec.x, spec.y, spec.width, spec.height));
        cell.style_mut().set_known(StyleKey::Shape, "group");
        cell.connectable = Some(false);
        self.doc.push(Entry::Cell(cell));
        debug!(id = id.as_str(), parent = parent.as_str(); "Added group");
        Ok(id)
    }

    pub fn move_node(&mut self, id: &str, new_parent: &str) -> BuilderResult<()> {
        if !self.doc.contains(id) {
            return Err(BuilderError::NotFound(id.to_string()));
        }
        self.check_container(new_parent)?;
        if new_parent == id || self.doc.descendants_of(id).iter().any(|d| d == new_parent) {
            return Err(BuilderError::InvalidParent {
                id: new_parent.to_string(),
            });
        }

        if let Some(entry) = self.doc.get_mut(id) {
            entry.cell_mut().parent = Some(new_parent.to_string());
        }
        debug!(id = id, parent = new_parent; "Moved node");
        Ok(())
    }

    /// Remove only the entry itself. Cells parented at it are left in place
    /// and will show up as dangling parents in [`Builder::validate`].
    pub fn remove_node(&mut self, id: &str) -> BuilderResult<Entry> {
        let position = self
            .doc
            .index_of(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        let removed = self.doc.remove_at(position);
        debug!(id = id; "Removed node");
        Ok(removed)
    }

    /// Remove the entry and, transitively, everything parented below it.
    /// Entries come back in document order.
    pub fn remove_subtree(&mut self, id: &str) -> BuilderResult<Vec<Entry>> {
        if !self.doc.contains(id) {
            return Err(BuilderError::NotFound(id.to_string()));
        }
        let mut doomed: FxHashSet<String> = self.doc.descendants_of(id).into_iter().collect();
        doomed.insert(id.to_string());

        let removed = self.doc.remove_where(|entry| {
            entry.id().is_some_and(|i| doomed.contains(i))
                || entry.parent().is_some_and(|p| doomed.contains(p))
        });
        debug!(id = id, removed = removed.len(); "Removed subtree");
        Ok(removed)
    }

    /// Deep copy of `id` under a fresh id, placed in `new_parent`.
    pub fn clone_node(&mut self, id: &str, new_parent: &str) -> BuilderResult<String> {
        let original = self
            .doc
            .get(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        self.check_container(new_parent)?;

        let mut copy = original.clone();
        let new_id = self.generate_id(None);
        match &mut copy {
            Entry::Cell(cell) => cell.id = Some(new_id.clone()),
            Entry::UserObject(wrapper) | Entry::Object(wrapper) => wrapper.id = new_id.clone(),
        }
        copy.cell_mut().parent = Some(new_parent.to_string());
        self.doc.push(copy);
        debug!(id = id, copy = new_id.as_str(), parent = new_parent; "Cloned node");
        Ok(new_id)
    }

    /// Merge `patch` into the style. Known keys land in their known slot,
    /// everything else in the custom bag; untouched entries are kept.
    pub fn update_node_style<I, K, V>(&mut self, id: &str, patch: I) -> BuilderResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entry = self
            .doc
            .get_mut(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        entry.cell_mut().style_mut().merge(patch);
        debug!(id = id; "Updated style");
        Ok(())
    }

    /// Set the label of a wrapped entry or the value of a bare cell.
    pub fn update_node_value(&mut self, id: &str, value: &str) -> BuilderResult<()> {
        let entry = self
            .doc
            .get_mut(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        entry.set_label(value);
        debug!(id = id; "Updated value");
        Ok(())
    }

    /// Change an id and every `parent`, `source` and `target` pointing at it.
    pub fn rename_node(&mut self, id: &str, new_id: &str) -> BuilderResult<()> {
        let position = self
            .doc
            .index_of(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        if id == new_id {
            return Ok(());
        }
        if self.doc.contains(new_id) {
            return Err(BuilderError::DuplicateId(new_id.to_string()));
        }

        for (i, entry) in self.doc.entries_mut().iter_mut().enumerate() {
            if i == position {
                match entry {
                    Entry::Cell(cell) => cell.id = Some(new_id.to_string()),
                    Entry::UserObject(wrapper) | Entry::Object(wrapper) => {
                        wrapper.id = new_id.to_string()
                    }
                }
            }
            let cell = entry.cell_mut();
            if cell.parent.as_deref() == Some(id) {
                cell.parent = Some(new_id.to_string());
            }
            if let Some((source, target)) = cell.endpoints_mut() {
                for end in [source, target] {
                    if end.as_deref() == Some(id) {
                        *end = Some(new_id.to_string());
                    }
                }
            }
        }
        self.doc.reindex();
        debug!(id = id, new_id = new_id; "Renamed node");
        Ok(())
    }

    /// Make sure `id` is wrapped, moving a bare cell into the configured
    /// default wrapper.
    pub fn ensure_wrapper(&mut self, id: &str) -> BuilderResult<()> {
        let position = self
            .doc
            .index_of(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        let entry = &self.doc.entries()[position];
        if entry.wrapper().is_some() {
            return Ok(());
        }
        let wrapped = entry.clone().into_wrapped(self.config.default_wrapper);
        self.doc.replace_entry(position, wrapped);
        debug!(id = id; "Wrapped cell");
        Ok(())
    }

    fn wrapper_mut(&mut self, id: &str) -> BuilderResult<&mut Wrapper> {
        self.ensure_wrapper(id)?;
        self.doc
            .get_mut(id)
            .and_then(Entry::wrapper_mut)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))
    }

    /// Returns whether the tag was new. A blank tag leaves the entry as it is.
    pub fn add_tag(&mut self, id: &str, tag: &str) -> BuilderResult<bool> {
        if tag.trim().is_empty() {
            if !self.doc.contains(id) {
                return Err(BuilderError::NotFound(id.to_string()));
            }
            return Ok(false);
        }
        Ok(self.wrapper_mut(id)?.add_tag(tag))
    }

    pub fn remove_tag(&mut self, id: &str, tag: &str) -> BuilderResult<bool> {
        let entry = self
            .doc
            .get_mut(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        Ok(entry.wrapper_mut().is_some_and(|w| w.remove_tag(tag)))
    }

    /// An empty link is the same as [`Builder::clear_link`].
    pub fn set_link(&mut self, id: &str, link: &str) -> BuilderResult<()> {
        if link.is_empty() {
            return self.clear_link(id);
        }
        self.wrapper_mut(id)?.set_link(link);
        Ok(())
    }

    pub fn clear_link(&mut self, id: &str) -> BuilderResult<()> {
        let entry = self
            .doc
            .get_mut(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        if let Some(wrapper) = entry.wrapper_mut() {
            wrapper.clear_link();
        }
        Ok(())
    }

    /// Append an action to the entry's action link, creating the link (and
    /// the wrapper) when needed. An ordinary URL is never overwritten.
    pub fn add_action(&mut self, id: &str, action: Action) -> BuilderResult<()> {
        let entry = self
            .doc
            .get(id)
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        let existing = entry.wrapper().and_then(Wrapper::link);
        let mut link = match existing {
            None => ActionLink::default(),
            Some(link) if !action::is_action_link(link) => {
                return Err(BuilderError::ForeignLink {
                    id: id.to_string(),
                    link: link.to_string(),
                });
            }
            Some(link) => match action::decode(link) {
                Some(DecodedLink {
                    link,
                    error: Some(err),
                }) => {
                    warn!(id = id, err:err = err; "Extending unreadable action link");
                    link
                }
                Some(decoded) => decoded.link,
                None => ActionLink::default(),
            },
        };
        link.push(action);
        self.wrapper_mut(id)?.set_link(link.to_link());
        debug!(id = id, actions = link.actions.len(); "Added action");
        Ok(())
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        validate::validate(self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn add_layer_parents_at_root_and_locks() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let id = builder.add_layer("Menu").expect("layer");
        assert!(id.starts_with("layer-"));
        let layer = doc.get(&id).expect("layer");
        assert_eq!(layer.parent(), Some("0"));
        assert_eq!(layer.label(), Some("Menu"));
        assert_eq!(
            layer.cell().style.as_ref().and_then(|s| s.get("locked")),
            Some("1")
        );
    }

    #[test]
    fn add_layer_creates_missing_root() {
        let mut doc = Document::new();
        let id = Builder::new(&mut doc).add_layer("L").expect("layer");
        assert_eq!(doc.entries()[0].id(), Some("0"));
        assert!(doc.get(&id).expect("layer").is_layer("0"));
    }

    #[test]
    fn node_without_parent_goes_to_first_layer() {
        let mut doc = Document::blank();
        let id = Builder::new(&mut doc)
            .add_node(NodeSpec::new("N", 0.0, 0.0, 10.0, 10.0))
            .expect("node");
        assert_eq!(doc.get(&id).and_then(Entry::parent), Some("1"));
        assert_eq!(doc.get(&id).and_then(Entry::label), Some("N"));
    }

    #[test]
    fn node_into_plain_vertex_is_rejected() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let a = builder
            .add_node(NodeSpec::new("A", 0.0, 0.0, 1.0, 1.0))
            .expect("node");
        let before = builder.document().clone();
        let err = builder
            .add_node(NodeSpec::new("B", 0.0, 0.0, 1.0, 1.0).in_parent(a.as_str()))
            .expect_err("vertex is not a container");
        assert_eq!(err, BuilderError::InvalidParent { id: a });
        assert_eq!(builder.document(), &before);
    }

    #[test]
    fn tags_imply_the_default_wrapper() {
        let mut doc = Document::blank();
        let id = Builder::new(&mut doc)
            .add_node(NodeSpec::new("T", 0.0, 0.0, 1.0, 1.0).with_tags(["x"]))
            .expect("node");
        let entry = doc.get(&id).expect("node");
        assert_eq!(entry.wrapper_kind(), Some(WrapperKind::UserObject));
        assert!(entry.has_tag("x"));
        assert_eq!(entry.cell().id, None);
    }

    #[test]
    fn non_finite_geometry_is_rejected_before_anything_is_added() {
        let mut doc = Document::new();
        let mut builder = Builder::new(&mut doc);
        assert_eq!(
            builder.add_node(NodeSpec::new("n", f64::NAN, 0.0, 1.0, 1.0)),
            Err(BuilderError::InvalidGeometry("x"))
        );
        assert_eq!(
            builder.add_group(GroupSpec::new("g", 0.0, 0.0, f64::INFINITY, 1.0)),
            Err(BuilderError::InvalidGeometry("width"))
        );
        assert!(doc.is_empty());
    }

    #[test]
    fn no_op_tag_and_link_leave_bare_cells_unwrapped() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let id = builder
            .add_node(NodeSpec::new("n", 0.0, 0.0, 1.0, 1.0))
            .expect("node");
        let before = builder.document().clone();

        assert_eq!(builder.add_tag(&id, "  "), Ok(false));
        builder.set_link(&id, "").expect("empty link");
        assert_eq!(builder.document(), &before);
        assert_eq!(builder.document().get(&id).and_then(Entry::wrapper_kind), None);
        assert_eq!(
            builder.add_tag("ghost", " "),
            Err(BuilderError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn edge_with_missing_endpoint_changes_nothing() {
        let mut doc = Document::new();
        let mut builder = Builder::new(&mut doc);
        let err = builder
            .add_edge(EdgeSpec::new("a", "b"))
            .expect_err("no endpoints");
        assert_eq!(err, BuilderError::MissingEndpoint("a".into()));
        assert!(doc.is_empty());
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let outer = builder
            .add_group(GroupSpec::new("outer", 0.0, 0.0, 100.0, 100.0))
            .expect("group");
        let inner = builder
            .add_group(GroupSpec {
                parent: Some(outer.clone()),
                ..GroupSpec::new("inner", 0.0, 0.0, 50.0, 50.0)
            })
            .expect("group");
        assert_eq!(
            builder.move_node(&outer, &inner),
            Err(BuilderError::InvalidParent { id: inner.clone() })
        );
        assert_eq!(
            builder.move_node(&outer, &outer),
            Err(BuilderError::InvalidParent { id: outer.clone() })
        );
        assert!(builder.move_node(&inner, "1").is_ok());
    }

    #[test]
    fn remove_node_is_strict_and_remove_subtree_cascades() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let group = builder
            .add_group(GroupSpec::new("g", 0.0, 0.0, 10.0, 10.0))
            .expect("group");
        let child = builder
            .add_node(NodeSpec::new("c", 0.0, 0.0, 1.0, 1.0).in_parent(group.as_str()))
            .expect("child");

        let mut strict = builder.document().clone();
        let removed = Builder::new(&mut strict).remove_node(&group).expect("remove");
        assert_eq!(removed.id(), Some(group.as_str()));
        assert!(strict.contains(&child));

        let removed = builder.remove_subtree(&group).expect("remove");
        assert_eq!(removed.len(), 2);
        assert!(!builder.document().contains(&child));
        assert_eq!(
            builder.remove_subtree(&group),
            Err(BuilderError::NotFound(group))
        );
    }

    #[test]
    fn clone_is_deep_and_fresh() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let id = builder
            .add_node(NodeSpec::new("n", 1.0, 2.0, 3.0, 4.0).with_tags(["t"]))
            .expect("node");
        let copy = builder.clone_node(&id, "1").expect("clone");
        assert_ne!(copy, id);
        builder
            .update_node_style(&copy, [("fillColor", "#000")])
            .expect("style");

        let doc = builder.document();
        assert!(doc.get(&id).expect("original").cell().style.is_none());
        assert!(doc.get(&copy).expect("copy").has_tag("t"));
        assert_eq!(
            doc.get(&copy).expect("copy").cell().geometry,
            doc.get(&id).expect("original").cell().geometry
        );
    }

    #[test]
    fn update_style_routes_known_and_custom_keys() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let id = builder
            .add_node(
                NodeSpec::new("n", 0.0, 0.0, 1.0, 1.0)
                    .with_style(Style::parse("rounded=1;spacing=2")),
            )
            .expect("node");
        builder
            .update_node_style(&id, [("fillColor", "red"), ("spacing", "4")])
            .expect("style");
        let style = doc.get(&id).and_then(|e| e.cell().style.clone()).expect("style");
        assert_eq!(style.to_string(), "rounded=1;fillColor=red;spacing=4");
    }

    #[test]
    fn rename_rewrites_references() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let a = builder
            .add_node(NodeSpec::new("a", 0.0, 0.0, 1.0, 1.0))
            .expect("a");
        let b = builder
            .add_node(NodeSpec::new("b", 0.0, 0.0, 1.0, 1.0))
            .expect("b");
        let edge = builder.add_edge(EdgeSpec::new(&a, &b)).expect("edge");

        assert_eq!(
            builder.rename_node(&a, &b),
            Err(BuilderError::DuplicateId(b.clone()))
        );
        builder.rename_node(&a, "start").expect("rename");
        builder.rename_node("1", "layer").expect("rename layer");

        let doc = builder.document();
        let edge = doc.get(&edge).expect("edge").cell();
        assert_eq!(edge.source(), Some("start"));
        assert_eq!(edge.parent.as_deref(), Some("layer"));
        assert!(doc.get(&a).is_none());
        assert!(!doc.contains(&a));
        assert_eq!(doc.get("start").and_then(Entry::id), Some("start"));
        assert_eq!(doc.index_of("layer"), Some(1));
        assert!(builder.validate().is_empty());
    }

    #[test]
    fn add_action_refuses_to_replace_urls() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let id = builder
            .add_node(NodeSpec::new("n", 0.0, 0.0, 1.0, 1.0))
            .expect("node");
        builder.set_link(&id, "https://example.com").expect("link");
        let before = builder.document().clone();
        let err = builder
            .add_action(&id, Action::show(action::Target::cells(["x"])))
            .expect_err("foreign link");
        assert!(matches!(err, BuilderError::ForeignLink { .. }));
        assert_eq!(builder.document(), &before);

        builder.clear_link(&id).expect("clear");
        builder
            .add_action(&id, Action::show(action::Target::cells(["x"])))
            .expect("action");
        builder
            .add_action(&id, Action::hide(action::Target::tags(["y"])))
            .expect("action");
        let decoded = builder
            .document()
            .get(&id)
            .and_then(Entry::wrapper)
            .and_then(Wrapper::actions)
            .expect("action link");
        assert_eq!(decoded.link.actions.len(), 2);
        assert_eq!(decoded.link.title.as_deref(), Some(action::DEFAULT_TITLE));
    }

    #[test]
    fn generated_ids_avoid_present_ids() {
        let mut doc = Document::blank();
        let config = EditorConfig {
            id_length: 4,
            ..EditorConfig::default()
        };
        let mut builder = Builder::with_config(&mut doc, &config);
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let id = builder
                .add_node(NodeSpec::new("", 0.0, 0.0, 1.0, 1.0))
                .expect("node");
            assert!(seen.insert(id));
        }
        assert!(builder.validate().is_empty());
    }
}
