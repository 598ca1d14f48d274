//! Navigation menus drawn into the diagram itself.
//!
//! A menu is a dedicated layer holding one stacked background shape with a
//! text item per entry. Clicking an item runs its action link, which shows
//! only the chosen layer (or tag) and highlights the item.

use crate::action::{Action, ActionLink, Target};
use crate::builder::{Builder, BuilderResult};
use crate::geometry::{Geometry, format_number};
use crate::model::{Cell, Entry, Wrapper, WrapperKind};
use crate::style::Style;
use log::debug;

pub const LAYERS_MENU: &str = "layers-menu-custom";
pub const TAGS_MENU: &str = "tags-menu-custom";
pub const LAYER_ITEM_TAG: &str = "menu-items-layer";
pub const TAG_ITEM_TAG: &str = "menu-items-tags";

const ITEM_HEIGHT: f64 = 45.0;
const MENU_X: f64 = 360.0;
const MENU_Y: f64 = 250.0;
const MENU_WIDTH: f64 = 100.0;
const IDLE_FILL: &str = "#ffffff";
const ACTIVE_FILL: &str = "#d3d3d3";

/// Ids created for one menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub layer: String,
    pub background: String,
    pub items: Vec<String>,
}

struct Item {
    label: String,
    title: String,
    actions: Vec<Action>,
}

fn background_style() -> Style {
    [
        ("shape", "rect"),
        ("strokeColor", "#eeeeee"),
        ("fillColor", IDLE_FILL),
        ("fontColor", "#000000"),
        ("fontStyle", "0"),
        ("childLayout", "stackLayout"),
        ("horizontal", "1"),
        ("startSize", "0"),
        ("horizontalStack", "0"),
        ("resizeParent", "1"),
        ("resizeParentMax", "0"),
        ("resizeLast", "0"),
        ("collapsible", "0"),
        ("marginBottom", "0"),
        ("whiteSpace", "wrap"),
        ("html", "1"),
        ("shadow", "1"),
    ]
    .into_iter()
    .collect()
}

fn item_style() -> Style {
    [
        ("shape", "text"),
        ("strokeColor", "none"),
        ("align", "left"),
        ("verticalAlign", "middle"),
        ("spacingLeft", "10"),
        ("spacingRight", "10"),
        ("overflow", "hidden"),
        ("portConstraint", "eastwest"),
        ("rotatable", "0"),
        ("whiteSpace", "wrap"),
        ("html", "1"),
        ("rSize", "5"),
        ("fillColor", "none"),
        ("fontColor", "inherit"),
        ("fontSize", "14"),
    ]
    .into_iter()
    .collect()
}

/// One item per layer present before the call (the menu's own layer is
/// never listed). A layer without a name is shown as "Background", the
/// name draw.io gives it.
pub fn add_layers_menu(builder: &mut Builder<'_>) -> BuilderResult<Menu> {
    let layers: Vec<(String, Option<String>)> = builder
        .document()
        .list_layers()
        .into_iter()
        .filter_map(|e| Some((e.id()?.to_string(), e.label().map(str::to_string))))
        .collect();

    let count = layers.len();
    build_menu(builder, LAYERS_MENU, LAYER_ITEM_TAG, count, |index, item_id| {
        let (layer, name) = &layers[index];
        let others: Vec<&str> = layers
            .iter()
            .map(|(id, _)| id.as_str())
            .filter(|id| *id != layer.as_str())
            .collect();
        let label = name.clone().filter(|n| !n.is_empty());
        Item {
            title: format!("Show Only {}", label.as_deref().unwrap_or(layer.as_str())),
            label: label.unwrap_or_else(|| "Background".to_string()),
            actions: vec![
                Action::hide(Target::cells(others.iter().copied())),
                Action::style(Target::cells(others.iter().copied()), "locked", "1"),
                Action::show(Target::cells([layer.as_str()])),
                Action::style(Target::cells([layer.as_str()]), "locked", "0"),
                Action::style(Target::tags([LAYER_ITEM_TAG]), "fillColor", IDLE_FILL),
                Action::style(Target::cells([item_id]), "fillColor", ACTIVE_FILL),
            ],
        }
    })
}

/// One item per tag in use.
pub fn add_tags_menu(builder: &mut Builder<'_>) -> BuilderResult<Menu> {
    let tags = builder.document().list_tags();

    let count = tags.len();
    build_menu(builder, TAGS_MENU, TAG_ITEM_TAG, count, |index, item_id| {
        let tag = &tags[index];
        let others: Vec<&str> = tags
            .iter()
            .map(String::as_str)
            .filter(|t| *t != tag.as_str())
            .collect();
        Item {
            label: tag.clone(),
            title: format!("Show Only {tag}"),
            actions: vec![
                Action::hide(Target::tags(others)),
                Action::show(Target::tags([tag.as_str()])),
                Action::style(Target::tags([TAG_ITEM_TAG]), "fillColor", IDLE_FILL),
                Action::style(Target::cells([item_id]), "fillColor", ACTIVE_FILL),
            ],
        }
    })
}

fn build_menu(
    builder: &mut Builder<'_>,
    name: &str,
    item_tag: &str,
    count: usize,
    mut item: impl FnMut(usize, &str) -> Item,
) -> BuilderResult<Menu> {
    let layer = builder.add_layer(name)?;
    let background = builder.generate_id(Some("menu-background-"));

    let height = ITEM_HEIGHT * count.max(1) as f64;
    let backdrop = Cell::vertex()
        .with_id(background.clone())
        .with_style(background_style())
        .with_parent(layer.as_str())
        .with_geometry(Geometry::rect(MENU_X, MENU_Y, MENU_WIDTH, height));
    builder
        .document_mut()
        .insert_after(Entry::Cell(backdrop), &layer);

    let mut items = Vec::with_capacity(count);
    for index in 0..count {
        let item_id = builder.generate_id(Some(format!("{item_tag}-{index}-").as_str()));
        let Item {
            label,
            title,
            mut actions,
        } = item(index, &item_id);

        let dropped = actions.len();
        actions.retain(|action| !action.target.is_empty());
        if actions.len() != dropped {
            debug!(item = item_id.as_str(), dropped = dropped - actions.len(); "Skipping actions without targets");
        }
        let link = ActionLink {
            title: Some(title),
            actions,
        };

        let geometry = Geometry {
            y: Some(format_number(index as f64 * ITEM_HEIGHT)),
            width: Some(format_number(MENU_WIDTH)),
            height: Some(format_number(ITEM_HEIGHT)),
            as_attr: Some(Geometry::AS_GEOMETRY.to_string()),
            ..Geometry::default()
        };
        let cell = Cell::vertex()
            .with_style(item_style())
            .with_parent(background.as_str())
            .with_geometry(geometry);

        let mut wrapper = Wrapper::new(item_id.clone(), cell).with_label(label);
        wrapper.add_tag(item_tag);
        wrapper.set_link(link.to_link());
        builder
            .document_mut()
            .push(Entry::wrapped(WrapperKind::UserObject, wrapper));
        items.push(item_id);
    }

    debug!(menu = name, layer = layer.as_str(), items = items.len(); "Added menu");
    Ok(Menu {
        layer,
        background,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NodeSpec;
    use crate::model::Document;

    fn item_actions(doc: &Document, id: &str) -> ActionLink {
        doc.get(id)
            .and_then(Entry::wrapper)
            .and_then(Wrapper::actions)
            .expect("action link")
            .link
    }

    #[test]
    fn layers_menu_lists_existing_layers() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let second = builder.add_layer("Second").expect("layer");
        let menu = add_layers_menu(&mut builder).expect("menu");
        assert_eq!(menu.items.len(), 2);

        let doc = builder.document();
        let layer_pos = doc.index_of(&menu.layer).expect("menu layer");
        assert_eq!(doc.index_of(&menu.background), Some(layer_pos + 1));

        let background = doc.get(&menu.background).expect("background").cell();
        let geometry = background.geometry.as_ref().expect("geometry");
        assert_eq!(geometry.height.as_deref(), Some("90"));
        assert_eq!(geometry.x.as_deref(), Some("360"));

        let first = doc.get(&menu.items[0]).expect("item");
        assert_eq!(first.label(), Some("Background"));
        assert!(first.has_tag(LAYER_ITEM_TAG));
        assert_eq!(first.parent(), Some(menu.background.as_str()));

        let link = item_actions(doc, &menu.items[0]);
        assert_eq!(link.title.as_deref(), Some("Show Only 1"));
        assert_eq!(link.actions.len(), 6);
        assert_eq!(link.actions[0], Action::hide(Target::cells([second.as_str()])));
        assert_eq!(
            link.actions[5],
            Action::style(Target::cells([menu.items[0].as_str()]), "fillColor", ACTIVE_FILL)
        );

        let second_item = doc.get(&menu.items[1]).expect("item");
        assert_eq!(second_item.label(), Some("Second"));
        let geometry = second_item.cell().geometry.as_ref().expect("geometry");
        assert_eq!(geometry.y.as_deref(), Some("45"));
        assert_eq!(geometry.x, None);
    }

    #[test]
    fn single_layer_menu_skips_empty_targets() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let menu = add_layers_menu(&mut builder).expect("menu");
        let link = item_actions(builder.document(), &menu.items[0]);
        assert_eq!(link.actions.len(), 4);
        assert_eq!(link.actions[0], Action::show(Target::cells(["1"])));
    }

    #[test]
    fn tags_menu_has_one_item_per_tag() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        builder
            .add_node(NodeSpec::new("a", 0.0, 0.0, 1.0, 1.0).with_tags(["red", "blue"]))
            .expect("node");
        let menu = add_tags_menu(&mut builder).expect("menu");
        assert_eq!(menu.items.len(), 2);

        let doc = builder.document();
        assert_eq!(doc.get(&menu.items[0]).and_then(Entry::label), Some("blue"));
        let link = item_actions(doc, &menu.items[0]);
        assert_eq!(link.actions[0], Action::hide(Target::tags(["red"])));
        assert_eq!(link.actions[1], Action::show(Target::tags(["blue"])));
        assert!(builder.validate().is_empty());
    }

    #[test]
    fn empty_tags_menu_still_has_a_background() {
        let mut doc = Document::blank();
        let mut builder = Builder::new(&mut doc);
        let menu = add_tags_menu(&mut builder).expect("menu");
        assert!(menu.items.is_empty());
        let background = builder.document().get(&menu.background).expect("background");
        assert_eq!(
            background.cell().geometry.as_ref().and_then(|g| g.height.as_deref()),
            Some("45")
        );
    }
}
