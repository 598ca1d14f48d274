//! The `key=value;key=value` style mini-language.
//!
//! A [`Style`] splits entries into *known* keys, always rendered first in
//! [`StyleKey`] order, and a *custom* bag rendered afterwards in insertion
//! order. An empty value is rendered as a bare token (`group`, not `group=`),
//! so bare tokens round-trip unchanged.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleKey {
    Shape,
    Rounded,
    WhiteSpace,
    Html,
    FillColor,
    StrokeColor,
    StrokeWidth,
    Dashed,
    Opacity,
    FontColor,
    FontSize,
    FontStyle,
    Align,
    VerticalAlign,
    EdgeStyle,
    StartArrow,
    EndArrow,
    Locked,
    Container,
    Collapsible,
}

impl StyleKey {
    pub const ALL: [StyleKey; 20] = [
        StyleKey::Shape,
        StyleKey::Rounded,
        StyleKey::WhiteSpace,
        StyleKey::Html,
        StyleKey::FillColor,
        StyleKey::StrokeColor,
        StyleKey::StrokeWidth,
        StyleKey::Dashed,
        StyleKey::Opacity,
        StyleKey::FontColor,
        StyleKey::FontSize,
        StyleKey::FontStyle,
        StyleKey::Align,
        StyleKey::VerticalAlign,
        StyleKey::EdgeStyle,
        StyleKey::StartArrow,
        StyleKey::EndArrow,
        StyleKey::Locked,
        StyleKey::Container,
        StyleKey::Collapsible,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StyleKey::Shape => "shape",
            StyleKey::Rounded => "rounded",
            StyleKey::WhiteSpace => "whiteSpace",
            StyleKey::Html => "html",
            StyleKey::FillColor => "fillColor",
            StyleKey::StrokeColor => "strokeColor",
            StyleKey::StrokeWidth => "strokeWidth",
            StyleKey::Dashed => "dashed",
            StyleKey::Opacity => "opacity",
            StyleKey::FontColor => "fontColor",
            StyleKey::FontSize => "fontSize",
            StyleKey::FontStyle => "fontStyle",
            StyleKey::Align => "align",
            StyleKey::VerticalAlign => "verticalAlign",
            StyleKey::EdgeStyle => "edgeStyle",
            StyleKey::StartArrow => "startArrow",
            StyleKey::EndArrow => "endArrow",
            StyleKey::Locked => "locked",
            StyleKey::Container => "container",
            StyleKey::Collapsible => "collapsible",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    known: BTreeMap<StyleKey, String>,
    custom: IndexMap<String, String>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a style string. Never fails: empty segments are dropped, a
    /// segment without `=` is a bare token.
    pub fn parse(style: &str) -> Self {
        let mut out = Style::new();
        for segment in style.split(';') {
            let (key, value) = match segment.split_once('=') {
                Some((key, value)) => (key.trim(), value),
                None => (segment.trim(), ""),
            };
            if key.is_empty() {
                continue;
            }
            out.set(key, value);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.custom.is_empty()
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.custom.len()
    }

    /// Value for `key`; a bare token yields `Some("")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        match StyleKey::from_name(key) {
            Some(known) => self.known.get(&known).map(String::as_str),
            None => self.custom.get(key).map(String::as_str),
        }
    }

    pub fn known(&self, key: StyleKey) -> Option<&str> {
        self.known.get(&key).map(String::as_str)
    }

    /// Insert or replace. Known keys go to their typed slot, anything else to
    /// the custom bag (keeping its original position when replaced).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match StyleKey::from_name(&key) {
            Some(known) => {
                self.known.insert(known, value);
            }
            None => {
                self.custom.insert(key, value);
            }
        }
    }

    pub fn set_known(&mut self, key: StyleKey, value: impl Into<String>) {
        self.known.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        match StyleKey::from_name(key) {
            Some(known) => self.known.remove(&known),
            None => self.custom.shift_remove(key),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True for a bare token named `name`.
    pub fn has_flag(&self, name: &str) -> bool {
        self.get(name) == Some("")
    }

    /// `shape=group` or a bare `group` token.
    pub fn declares_group(&self) -> bool {
        self.known(StyleKey::Shape) == Some("group") || self.has_flag("group")
    }

    /// Apply every entry of `patch` on top of this style.
    pub fn merge<I, K, V>(&mut self, patch: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in patch {
            self.set(key, value);
        }
    }

    pub fn custom(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All entries in render order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known
            .iter()
            .map(|(k, v)| (k.name(), v.as_str()))
            .chain(self.custom())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            f.write_str(key)?;
            if !value.is_empty() {
                write!(f, "={value}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Style {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Style::parse(s))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Style {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut style = Style::new();
        style.merge(iter);
        style
    }
}

impl Serialize for Style {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_keys_render_before_custom_ones() {
        let style = Style::parse("spacingLeft=10;fillColor=#fff;shape=text;portConstraint=eastwest");
        assert_eq!(
            style.to_string(),
            "shape=text;fillColor=#fff;spacingLeft=10;portConstraint=eastwest"
        );
    }

    #[test]
    fn bare_tokens_stay_bare() {
        let style = Style::parse("group;html=1;");
        assert!(style.has_flag("group"));
        assert_eq!(style.to_string(), "html=1;group");
        assert!(style.declares_group());
    }

    #[test]
    fn empty_value_renders_as_bare_key() {
        let style = Style::parse("ellipse=;rounded=0");
        assert_eq!(style.to_string(), "rounded=0;ellipse");
        assert_eq!(Style::parse(&style.to_string()), style);
    }

    #[test]
    fn splits_on_first_equals_only() {
        let style = Style::parse("image=data:image/png,a=b;fillColor=none");
        assert_eq!(style.get("image"), Some("data:image/png,a=b"));
    }

    #[test]
    fn merge_keeps_unrelated_entries() {
        let mut style = Style::parse("rounded=1;custom=a;other=b");
        style.merge([("custom", "z"), ("fillColor", "#000")]);
        assert_eq!(style.to_string(), "rounded=1;fillColor=#000;custom=z;other=b");
    }

    #[test]
    fn shape_group_declares_group() {
        assert!(Style::parse("shape=group").declares_group());
        assert!(!Style::parse("shape=rect").declares_group());
        assert!(!Style::parse("group=1").declares_group());
    }

    fn style_string() -> impl Strategy<Value = String> {
        let key = prop_oneof![
            Just("shape".to_string()),
            Just("fillColor".to_string()),
            Just("group".to_string()),
            Just("locked".to_string()),
            "[a-zA-Z]{1,8}",
        ];
        let value = prop_oneof![Just(String::new()), "[a-z0-9#=,.:/ ]{0,10}"];
        let segment = prop_oneof![
            (key.clone(), value).prop_map(|(k, v)| format!("{k}={v}")),
            key,
            Just(String::new()),
        ];
        prop::collection::vec(segment, 0..8).prop_map(|parts| parts.join(";"))
    }

    proptest! {
        #[test]
        fn stringify_then_parse_is_structurally_equal(s in style_string()) {
            let parsed = Style::parse(&s);
            prop_assert_eq!(Style::parse(&parsed.to_string()), parsed);
        }
    }
}
