//! Structural checks over a whole document. Nothing here mutates or fails:
//! every violated rule becomes one [`ValidationError`] in the returned list.
//!
//! A cell that is both vertex and edge cannot be represented by
//! [`CellKind`](crate::model::CellKind), so that rule is enforced when the
//! cell is built or parsed rather than here.

use crate::model::{Document, Entry};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Source,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Endpoint::Source => "source",
            Endpoint::Target => "target",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum ValidationError {
    #[error("entry #{position} has no id")]
    MissingId { position: usize },

    #[error("id {id:?} is used by {count} entries")]
    DuplicateId { id: String, count: usize },

    #[error("edge {id:?} has no {end}")]
    EdgeMissingEndpoint { id: String, end: Endpoint },

    #[error("edge {id:?} has {end} {missing:?}, which does not exist")]
    DanglingEndpoint {
        id: String,
        end: Endpoint,
        missing: String,
    },

    #[error("{id:?} has parent {missing:?}, which does not exist")]
    DanglingParent { id: String, missing: String },

    #[error("wrapper {id:?} holds a cell with its own id {cell_id:?}")]
    ConflictingWrapperId { id: String, cell_id: String },
}

pub fn validate(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut counts: IndexMap<&str, usize> = IndexMap::new();

    for (position, entry) in doc.iter().enumerate() {
        let Some(id) = entry.id() else {
            errors.push(ValidationError::MissingId { position });
            continue;
        };
        *counts.entry(id).or_default() += 1;

        if let Entry::UserObject(wrapper) | Entry::Object(wrapper) = entry
            && let Some(cell_id) = wrapper.cell().id.as_deref()
            && cell_id != wrapper.id
        {
            errors.push(ValidationError::ConflictingWrapperId {
                id: id.to_string(),
                cell_id: cell_id.to_string(),
            });
        }

        let cell = entry.cell();
        if let Some(parent) = cell.parent.as_deref()
            && !doc.contains(parent)
        {
            errors.push(ValidationError::DanglingParent {
                id: id.to_string(),
                missing: parent.to_string(),
            });
        }

        if cell.is_edge() {
            for (end, reference) in [
                (Endpoint::Source, cell.source()),
                (Endpoint::Target, cell.target()),
            ] {
                match reference {
                    None => errors.push(ValidationError::EdgeMissingEndpoint {
                        id: id.to_string(),
                        end,
                    }),
                    Some(other) if !doc.contains(other) => {
                        errors.push(ValidationError::DanglingEndpoint {
                            id: id.to_string(),
                            end,
                            missing: other.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
    }

    errors.extend(
        counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(id, count)| ValidationError::DuplicateId {
                id: id.to_string(),
                count,
            }),
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, CellKind, Wrapper};

    fn doc(entries: Vec<Entry>) -> Document {
        Document::from_parts(IndexMap::new(), entries)
    }

    #[test]
    fn blank_document_is_valid() {
        assert!(validate(&Document::blank()).is_empty());
    }

    #[test]
    fn reports_every_rule() {
        let mut wrapped = Wrapper::new("w", Cell::vertex().with_parent("1"));
        wrapped.cell_mut().id = Some("other".into());
        let edge = Cell::new(CellKind::Edge {
            source: Some("ghost".into()),
            target: None,
        })
        .with_id("e")
        .with_parent("1");

        let errors = validate(&doc(vec![
            Entry::Cell(Cell::container().with_id("0")),
            Entry::Cell(Cell::container().with_id("1").with_parent("0")),
            Entry::Cell(Cell::vertex().with_id("1").with_parent("nowhere")),
            Entry::Cell(Cell::vertex()),
            Entry::UserObject(wrapped),
            Entry::Cell(edge),
        ]));

        assert_eq!(
            errors,
            [
                ValidationError::DanglingParent {
                    id: "1".into(),
                    missing: "nowhere".into()
                },
                ValidationError::MissingId { position: 3 },
                ValidationError::ConflictingWrapperId {
                    id: "w".into(),
                    cell_id: "other".into()
                },
                ValidationError::DanglingEndpoint {
                    id: "e".into(),
                    end: Endpoint::Source,
                    missing: "ghost".into()
                },
                ValidationError::EdgeMissingEndpoint {
                    id: "e".into(),
                    end: Endpoint::Target
                },
                ValidationError::DuplicateId {
                    id: "1".into(),
                    count: 2
                },
            ]
        );
    }
}
