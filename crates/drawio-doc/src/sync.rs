//! Snapshot exchange with the hosting editor.
//!
//! The host and this side each keep a full copy of the diagram and trade
//! whole XML snapshots. A snapshot is only sent when its content hash differs
//! from the last one exchanged in either direction, and local edits are
//! debounced: every edit pushes the send deadline back, so a burst of edits
//! produces a single snapshot of the latest state.
//!
//! Time is supplied by the caller, which keeps the session free of timers.

use crate::builder::{Builder, BuilderResult};
use crate::config::EditorConfig;
use crate::model::Document;
use crate::parse::ParseError;
use log::{debug, error, info};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Instant;

/// Messages sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Inbound {
    /// The host's diagram changed; carries the full XML.
    DrawioXmlUpdate(String),
    DrawioSelectionChanged(Vec<String>),
}

impl Inbound {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Messages sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outbound {
    ReactXmlUpdate(String),
    ReactSelectCells(Vec<String>),
}

impl Outbound {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    /// The document was swapped for the host's snapshot.
    Replaced,
    /// The snapshot matched the last exchanged content.
    Unchanged,
    /// The snapshot could not be parsed; the previous document is kept.
    Rejected(ParseError),
    SelectionChanged(Vec<String>),
}

fn content_hash(xml: &str) -> u64 {
    let mut hasher = FxHasher::default();
    xml.hash(&mut hasher);
    hasher.finish()
}

pub struct SyncSession {
    document: Document,
    config: EditorConfig,
    last_hash: Option<u64>,
    pending_until: Option<Instant>,
    selection: Vec<String>,
}

impl SyncSession {
    /// Start from a document the host is assumed to already hold.
    pub fn new(document: Document, config: EditorConfig) -> Self {
        let last_hash = Some(content_hash(&document.to_xml()));
        SyncSession {
            document,
            config,
            last_hash,
            pending_until: None,
            selection: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Ids the host last reported as selected.
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn has_pending(&self) -> bool {
        self.pending_until.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending_until
    }

    pub fn receive(&mut self, message: Inbound) -> SessionEvent {
        match message {
            Inbound::DrawioXmlUpdate(xml) => self.replace(&xml),
            Inbound::DrawioSelectionChanged(ids) => {
                debug!(count = ids.len(); "Host selection changed");
                self.selection = ids.clone();
                SessionEvent::SelectionChanged(ids)
            }
        }
    }

    fn replace(&mut self, xml: &str) -> SessionEvent {
        let document = match Document::from_xml(xml) {
            Ok(document) => document,
            Err(err) => {
                error!(err:err = err; "Ignoring unreadable snapshot from host");
                return SessionEvent::Rejected(err);
            }
        };

        let hash = content_hash(&document.to_xml());
        if self.last_hash == Some(hash) {
            debug!(hash = hash; "Host snapshot unchanged");
            return SessionEvent::Unchanged;
        }

        if self.pending_until.take().is_some() {
            info!("Host snapshot supersedes pending local edits");
        }
        self.document = document;
        self.last_hash = Some(hash);
        debug!(hash = hash, entries = self.document.len(); "Replaced document from host");
        SessionEvent::Replaced
    }

    /// Run `edit` against the document. On success the outbound snapshot is
    /// (re)scheduled for `now` plus the debounce window; on error the document
    /// is restored, even if `edit` applied several operations before failing.
    pub fn edit<T>(
        &mut self,
        now: Instant,
        edit: impl FnOnce(&mut Builder<'_>) -> BuilderResult<T>,
    ) -> BuilderResult<T> {
        let before = self.document.clone();
        let result = edit(&mut Builder::with_config(&mut self.document, &self.config));
        match result {
            Ok(value) => {
                self.pending_until = Some(now + self.config.debounce());
                Ok(value)
            }
            Err(err) => {
                debug!(err:err = err; "Edit failed, document restored");
                self.document = before;
                Err(err)
            }
        }
    }

    /// The outbound snapshot, once the debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Outbound> {
        match self.pending_until {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Send now, ignoring the deadline. `None` when the content matches the
    /// last exchanged snapshot.
    pub fn flush(&mut self) -> Option<Outbound> {
        self.pending_until = None;
        let xml = self.document.to_xml();
        let hash = content_hash(&xml);
        if self.last_hash == Some(hash) {
            debug!(hash = hash; "Suppressing unchanged snapshot");
            return None;
        }
        self.last_hash = Some(hash);
        info!(hash = hash, bytes = xml.len(); "Sending snapshot to host");
        Some(Outbound::ReactXmlUpdate(xml))
    }

    /// Ask the host to select `ids`. Unknown ids are passed through.
    pub fn select(&self, ids: Vec<String>) -> Outbound {
        let unknown = ids.iter().filter(|id| !self.document.contains(id)).count();
        if unknown > 0 {
            debug!(unknown = unknown; "Selecting ids not in the document");
        }
        Outbound::ReactSelectCells(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeSpec;
    use std::time::Duration;

    #[test]
    fn messages_use_host_names() {
        let inbound = Inbound::from_json(r#"{"type":"DRAWIO_SELECTION_CHANGED","payload":["a"]}"#)
            .expect("parse");
        assert_eq!(inbound, Inbound::DrawioSelectionChanged(vec!["a".into()]));

        let outbound = Outbound::ReactXmlUpdate("<x/>".into()).to_json().expect("json");
        assert_eq!(outbound, r#"{"type":"REACT_XML_UPDATE","payload":"<x/>"}"#);
    }

    #[test]
    fn edits_are_debounced_into_one_snapshot() {
        let start = Instant::now();
        let mut session = SyncSession::new(Document::blank(), EditorConfig::default());
        let window = session.config().debounce();

        for i in 0..3u64 {
            session
                .edit(start + Duration::from_millis(i * 100), |b| {
                    b.add_node(NodeSpec::new("n", 0.0, 0.0, 1.0, 1.0))
                })
                .expect("edit");
        }
        let last_edit = start + Duration::from_millis(200);
        assert_eq!(session.deadline(), Some(last_edit + window));
        assert!(session.poll(last_edit + window / 2).is_none());

        let sent = session.poll(last_edit + window).expect("snapshot");
        let Outbound::ReactXmlUpdate(xml) = sent else {
            panic!("expected xml update");
        };
        assert_eq!(Document::from_xml(&xml).expect("parse").list_nodes(None).len(), 3);
        assert!(!session.has_pending());
        assert!(session.flush().is_none());
    }

    #[test]
    fn echoed_snapshot_is_unchanged() {
        let mut session = SyncSession::new(Document::blank(), EditorConfig::default());
        let xml = Document::blank().to_xml();
        assert!(matches!(
            session.receive(Inbound::DrawioXmlUpdate(xml)),
            SessionEvent::Unchanged
        ));
    }

    #[test]
    fn bad_snapshot_keeps_document() {
        let mut session = SyncSession::new(Document::blank(), EditorConfig::default());
        let event = session.receive(Inbound::DrawioXmlUpdate("<mxGraphModel><root>".into()));
        assert!(matches!(event, SessionEvent::Rejected(_)));
        assert_eq!(session.document(), &Document::blank());
    }

    #[test]
    fn failed_edit_restores_and_schedules_nothing() {
        let mut session = SyncSession::new(Document::blank(), EditorConfig::default());
        let result = session.edit(Instant::now(), |b| {
            b.add_node(NodeSpec::new("kept?", 0.0, 0.0, 1.0, 1.0))?;
            b.move_node("1", "missing")
        });
        assert!(result.is_err());
        assert_eq!(session.document(), &Document::blank());
        assert!(!session.has_pending());
    }
}
