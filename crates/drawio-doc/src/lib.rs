pub mod action;
pub mod builder;
pub mod config;
pub mod escape;
pub mod geometry;
pub mod menu;
pub mod model;
pub mod parse;
pub mod payload;
pub mod style;
pub mod sync;
pub mod validate;
pub mod write;
pub use action::{Action, ActionDecodeError, ActionKind, ActionLink, DecodedLink, Target};
pub use builder::{Builder, BuilderError, BuilderResult, EdgeSpec, GroupSpec, NodeSpec};
pub use config::{ConfigError, EditorConfig};
pub use geometry::{Geometry, Point};
pub use model::{Cell, CellKind, Document, Entry, ModelError, Wrapper, WrapperKind};
pub use parse::{ParseError, ParseResult, Parsed, parse_document};
pub use style::{Style, StyleKey};
pub use sync::{Inbound, Outbound, SessionEvent, SyncSession};
pub use validate::{ValidationError, validate};
pub use write::{to_mxfile_xml, to_xml};
