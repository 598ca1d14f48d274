//! Action links: `data:action/json,<escaped json>` strings stored in a
//! wrapper's `link` attribute.
//!
//! The JSON is `{"title": "...", "actions": [...]}` where each action is a
//! single-key object naming its kind, e.g.
//! `{"style": {"cells": ["a"], "key": "fillColor", "value": "#fff"}}`.
//! Every action targets either `cells` or `tags`, never both.

use crate::escape::{from_attribute_safe, to_json_in_attribute};
use log::debug;
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::borrow::Cow;

pub const ACTION_PREFIX: &str = "data:action/json,";

pub const DEFAULT_TITLE: &str = "Untitled Action";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionDecodeError {
    #[error("action payload is not valid JSON: {0}")]
    Json(String),

    #[error("percent-encoded action payload is not valid UTF-8")]
    Utf8,

    #[error("unexpected action payload shape: {0}")]
    Shape(String),

    #[error("unknown action kind {0:?}")]
    UnknownKind(String),

    #[error("action {kind:?} does not take {parameter:?}")]
    UnexpectedParameter { kind: String, parameter: String },

    #[error("action {kind:?} names both cells and tags")]
    ConflictingTarget { kind: String },

    #[error("action {kind:?} names neither cells nor tags")]
    MissingTarget { kind: String },

    #[error("action {kind:?} is missing {parameter:?}")]
    MissingParameter { kind: String, parameter: String },

    #[error("action {kind:?} has an invalid {parameter:?}")]
    InvalidParameter { kind: String, parameter: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Cells(Vec<String>),
    Tags(Vec<String>),
}

impl Target {
    pub fn cells<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::Cells(ids.into_iter().map(Into::into).collect())
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::Tags(tags.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn key(&self) -> &'static str {
        match self {
            Target::Cells(_) => "cells",
            Target::Tags(_) => "tags",
        }
    }

    fn values(&self) -> &[String] {
        match self {
            Target::Cells(values) | Target::Tags(values) => values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Show,
    Hide,
    Style {
        key: String,
        value: String,
    },
    ToggleStyle {
        key: String,
        default_value: Option<String>,
    },
    Select,
    Highlight {
        color: Option<String>,
        duration: Option<u64>,
        opacity: Option<u32>,
    },
    Scroll,
    Viewbox {
        fit_window: Option<bool>,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Show => "show",
            ActionKind::Hide => "hide",
            ActionKind::Style { .. } => "style",
            ActionKind::ToggleStyle { .. } => "toggleStyle",
            ActionKind::Select => "select",
            ActionKind::Highlight { .. } => "highlight",
            ActionKind::Scroll => "scroll",
            ActionKind::Viewbox { .. } => "viewbox",
        }
    }
}

/// Parameters each kind accepts besides its target.
fn parameters_of(kind: &str) -> Option<&'static [&'static str]> {
    Some(match kind {
        "show" | "hide" | "select" | "scroll" => &[],
        "style" => &["key", "value"],
        "toggleStyle" => &["key", "defaultValue"],
        "highlight" => &["color", "duration", "opacity"],
        "viewbox" => &["fitWindow"],
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub target: Target,
}

impl Action {
    pub fn new(kind: ActionKind, target: Target) -> Self {
        Action { kind, target }
    }

    pub fn show(target: Target) -> Self {
        Action::new(ActionKind::Show, target)
    }

    pub fn hide(target: Target) -> Self {
        Action::new(ActionKind::Hide, target)
    }

    pub fn style(target: Target, key: impl Into<String>, value: impl Into<String>) -> Self {
        Action::new(
            ActionKind::Style {
                key: key.into(),
                value: value.into(),
            },
            target,
        )
    }

    pub fn to_value(&self) -> Value {
        let mut params = Map::new();
        params.insert(
            self.target.key().to_string(),
            Value::from(self.target.values().to_vec()),
        );
        match &self.kind {
            ActionKind::Show | ActionKind::Hide | ActionKind::Select | ActionKind::Scroll => {}
            ActionKind::Style { key, value } => {
                params.insert("key".into(), Value::from(key.as_str()));
                params.insert("value".into(), Value::from(value.as_str()));
            }
            ActionKind::ToggleStyle { key, default_value } => {
                params.insert("key".into(), Value::from(key.as_str()));
                if let Some(default_value) = default_value {
                    params.insert("defaultValue".into(), Value::from(default_value.as_str()));
                }
            }
            ActionKind::Highlight {
                color,
                duration,
                opacity,
            } => {
                if let Some(color) = color {
                    params.insert("color".into(), Value::from(color.as_str()));
                }
                if let Some(duration) = duration {
                    params.insert("duration".into(), Value::from(*duration));
                }
                if let Some(opacity) = opacity {
                    params.insert("opacity".into(), Value::from(*opacity));
                }
            }
            ActionKind::Viewbox { fit_window } => {
                if let Some(fit_window) = fit_window {
                    params.insert("fitWindow".into(), Value::from(*fit_window));
                }
            }
        }
        let mut outer = Map::new();
        outer.insert(self.kind.name().to_string(), Value::Object(params));
        Value::Object(outer)
    }

    /// Read one action object, rejecting unknown kinds and parameters that
    /// the kind does not declare.
    pub fn from_value(value: &Value) -> Result<Self, ActionDecodeError> {
        let object = value
            .as_object()
            .ok_or_else(|| ActionDecodeError::Shape("action is not an object".into()))?;
        let mut entries = object.iter();
        let (Some((name, params)), None) = (entries.next(), entries.next()) else {
            return Err(ActionDecodeError::Shape(
                "action must have exactly one kind".into(),
            ));
        };
        let allowed =
            parameters_of(name).ok_or_else(|| ActionDecodeError::UnknownKind(name.clone()))?;
        let params = params.as_object().ok_or_else(|| {
            ActionDecodeError::Shape(format!("parameters of {name:?} are not an object"))
        })?;

        for key in params.keys() {
            if key != "cells" && key != "tags" && !allowed.contains(&key.as_str()) {
                return Err(ActionDecodeError::UnexpectedParameter {
                    kind: name.clone(),
                    parameter: key.clone(),
                });
            }
        }

        let reader = Params { kind: name, params };
        let target = reader.target()?;
        let kind = match name.as_str() {
            "show" => ActionKind::Show,
            "hide" => ActionKind::Hide,
            "select" => ActionKind::Select,
            "scroll" => ActionKind::Scroll,
            "style" => ActionKind::Style {
                key: reader.required_str("key")?,
                value: reader.required_str("value")?,
            },
            "toggleStyle" => ActionKind::ToggleStyle {
                key: reader.required_str("key")?,
                default_value: reader.optional_str("defaultValue")?,
            },
            "highlight" => ActionKind::Highlight {
                color: reader.optional_str("color")?,
                duration: reader.optional_u64("duration")?,
                opacity: reader
                    .optional_u64("opacity")?
                    .map(|o| u32::try_from(o).map_err(|_| reader.invalid("opacity")))
                    .transpose()?,
            },
            "viewbox" => ActionKind::Viewbox {
                fit_window: reader.optional_bool("fitWindow")?,
            },
            other => return Err(ActionDecodeError::UnknownKind(other.to_string())),
        };
        Ok(Action { kind, target })
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

struct Params<'a> {
    kind: &'a str,
    params: &'a Map<String, Value>,
}

impl Params<'_> {
    fn invalid(&self, parameter: &str) -> ActionDecodeError {
        ActionDecodeError::InvalidParameter {
            kind: self.kind.to_string(),
            parameter: parameter.to_string(),
        }
    }

    fn target(&self) -> Result<Target, ActionDecodeError> {
        match (self.params.get("cells"), self.params.get("tags")) {
            (Some(_), Some(_)) => Err(ActionDecodeError::ConflictingTarget {
                kind: self.kind.to_string(),
            }),
            (Some(cells), None) => Ok(Target::Cells(self.string_list("cells", cells)?)),
            (None, Some(tags)) => Ok(Target::Tags(self.string_list("tags", tags)?)),
            (None, None) => Err(ActionDecodeError::MissingTarget {
                kind: self.kind.to_string(),
            }),
        }
    }

    fn string_list(&self, parameter: &str, value: &Value) -> Result<Vec<String>, ActionDecodeError> {
        let items = value.as_array().ok_or_else(|| self.invalid(parameter))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(parameter))
            })
            .collect()
    }

    fn required_str(&self, parameter: &str) -> Result<String, ActionDecodeError> {
        self.optional_str(parameter)?
            .ok_or_else(|| ActionDecodeError::MissingParameter {
                kind: self.kind.to_string(),
                parameter: parameter.to_string(),
            })
    }

    fn optional_str(&self, parameter: &str) -> Result<Option<String>, ActionDecodeError> {
        match self.params.get(parameter) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(parameter)),
        }
    }

    fn optional_u64(&self, parameter: &str) -> Result<Option<u64>, ActionDecodeError> {
        match self.params.get(parameter) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| self.invalid(parameter)),
        }
    }

    fn optional_bool(&self, parameter: &str) -> Result<Option<bool>, ActionDecodeError> {
        match self.params.get(parameter) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(parameter)),
        }
    }
}

/// A titled, ordered list of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub actions: Vec<Action>,
}

impl Default for ActionLink {
    fn default() -> Self {
        ActionLink {
            title: Some(DEFAULT_TITLE.to_string()),
            actions: Vec::new(),
        }
    }
}

impl ActionLink {
    pub fn new(title: impl Into<String>) -> Self {
        ActionLink {
            title: Some(title.into()),
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.actions.clear();
        self
    }

    /// Drop every action of the named kind (`"style"`, `"hide"`, ...).
    pub fn remove_kind(&mut self, kind: &str) -> &mut Self {
        self.actions.retain(|action| action.kind.name() != kind);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        if let Some(title) = &self.title {
            object.insert("title".into(), Value::from(title.as_str()));
        }
        let actions = self.actions.iter().map(Action::to_value).collect();
        object.insert("actions".into(), Value::Array(actions));
        Value::Object(object)
    }

    pub fn to_link(&self) -> String {
        let json = self.to_value().to_string();
        format!("{ACTION_PREFIX}{}", to_json_in_attribute(&json))
    }
}

/// Result of decoding a link that carries the action prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLink {
    pub link: ActionLink,
    /// Set when the payload could not be read; `link.actions` is then empty.
    pub error: Option<ActionDecodeError>,
}

pub fn is_action_link(link: &str) -> bool {
    link.starts_with(ACTION_PREFIX)
}

/// The text an XML reader hands over for `link` once it has been written:
/// an entity-escaped payload (as produced by [`encode`]) comes back as plain
/// JSON, so the writer escapes it exactly once. Doubly escaped payloads read
/// from older files collapse the same way. Any other link is returned as is.
pub fn unescape_link(link: &str) -> Cow<'_, str> {
    match link.strip_prefix(ACTION_PREFIX) {
        Some(payload) if payload.starts_with('{') && is_entity_escaped(payload) => {
            Cow::Owned(format!("{ACTION_PREFIX}{}", from_attribute_safe(payload)))
        }
        _ => Cow::Borrowed(link),
    }
}

/// JSON in entity form has no raw `"` left; plain JSON always has one.
fn is_entity_escaped(payload: &str) -> bool {
    payload.contains('&') && !payload.contains('"')
}

pub fn encode(title: &str, actions: &[Action]) -> String {
    ActionLink {
        title: Some(title.to_string()),
        actions: actions.to_vec(),
    }
    .to_link()
}

/// `None` for links without the action prefix; ordinary URLs are not errors.
pub fn decode(link: &str) -> Option<DecodedLink> {
    let payload = link.strip_prefix(ACTION_PREFIX)?;
    Some(match decode_payload(payload) {
        Ok(link) => DecodedLink { link, error: None },
        Err((title, error)) => {
            debug!(err:err = error; "Action link could not be decoded");
            DecodedLink {
                link: ActionLink {
                    title,
                    actions: Vec::new(),
                },
                error: Some(error),
            }
        }
    })
}

type PayloadError = (Option<String>, ActionDecodeError);

fn decode_payload(payload: &str) -> Result<ActionLink, PayloadError> {
    let payload = if payload.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("%7B")) {
        percent_decode_str(payload)
            .decode_utf8()
            .map_err(|_| (None, ActionDecodeError::Utf8))?
            .into_owned()
    } else {
        payload.to_string()
    };

    let json = if is_entity_escaped(&payload) {
        from_attribute_safe(&payload)
    } else {
        payload
    };
    let value: Value =
        serde_json::from_str(&json).map_err(|e| (None, ActionDecodeError::Json(e.to_string())))?;
    let object = value.as_object().ok_or_else(|| {
        (
            None,
            ActionDecodeError::Shape("payload is not an object".into()),
        )
    })?;

    let title = match object.get("title") {
        None | Some(Value::Null) => None,
        Some(Value::String(title)) => Some(title.clone()),
        Some(_) => {
            return Err((
                None,
                ActionDecodeError::Shape("title is not a string".into()),
            ));
        }
    };

    let actions = match object.get("actions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(Action::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (title.clone(), e))?,
        Some(_) => {
            return Err((
                title,
                ActionDecodeError::Shape("actions is not an array".into()),
            ));
        }
    };
    Ok(ActionLink { title, actions })
}
