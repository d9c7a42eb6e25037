//! Slots
//!
//! Children passed to a component are delivered as named slots. Named
//! slots are passed explicitly with [`Children::Slots`]; a plain list or
//! text is normalized into the `default` slot.

use std::rc::Rc;

use super::vnode::{keyed_fragment, text, Children, Slot, Slots, VNode, DEFAULT_SLOT};
use crate::value::Value;

/// Turn the children of a component vnode into slots.
pub(crate) fn normalize_slots(children: &Children) -> Slots {
    let mut slots = Slots::new();
    match children {
        Children::None => {}
        Children::Slots(named) => slots = named.clone(),
        Children::List(list) => {
            let list = list.clone();
            slots.insert(DEFAULT_SLOT.into(), Rc::new(move |_: &Value| list.clone()) as Slot);
        }
        Children::Text(content) => {
            let node = text(content.clone());
            slots.insert(DEFAULT_SLOT.into(), Rc::new(move |_: &Value| vec![node.clone()]) as Slot);
        }
    }
    slots
}

/// Render slot `name` with `props` into a fragment keyed by the slot name.
/// Returns `None` if no such slot was passed.
pub fn render_slot(slots: &Slots, name: &str, props: &Value) -> Option<VNode> {
    let slot = slots.get(name)?;
    Some(keyed_fragment(format!("_{name}"), slot(props)))
}
