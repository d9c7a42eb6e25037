//! Children Reconciliation
//!
//! Diffing two child lists is where most host operations are saved. Every
//! list-to-list patch runs the keyed algorithm:
//!
//! 1. Patch matching nodes from the front until the first mismatch.
//! 2. Patch matching nodes from the back until the first mismatch.
//! 3. If only new nodes remain, mount them; if only old nodes remain,
//!    unmount them.
//! 4. Otherwise match the middle by key (unkeyed old nodes fall back to a
//!    linear same-type scan), unmount the unmatched old nodes, patch the
//!    matched pairs and record each new position's old index.
//! 5. If the matched old indices are not already increasing, keep the
//!    longest increasing subsequence in place and move everything else,
//!    walking back to front so the already placed next sibling is the
//!    anchor. Unmatched new nodes are mounted in the same walk.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::component::ComponentInstance;
use super::host::{HostOps, NodeId};
use super::renderer::RendererInner;
use super::vnode::{is_same_vnode_type, Children, Key, VNode};
use crate::error::RenderResult;

impl<H: HostOps + 'static> RendererInner<H> {
    pub(crate) fn mount_children(
        self: &Rc<Self>,
        children: &[VNode],
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        for child in children {
            self.patch(None, child, container, anchor, parent)?;
        }
        Ok(())
    }

    pub(crate) fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount(child, true);
        }
    }

    /// Diff the children of two elements sharing the host node `container`.
    pub(crate) fn patch_children(
        self: &Rc<Self>,
        n1: &VNode,
        n2: &VNode,
        container: NodeId,
        anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        match (n1.children(), n2.children()) {
            (old, Children::Text(new_text)) => {
                if let Children::List(old_list) = old {
                    self.unmount_children(old_list);
                }
                let unchanged = matches!(old, Children::Text(old_text) if old_text == new_text);
                if !unchanged {
                    self.host.set_text_content(container, new_text);
                }
                Ok(())
            }
            (Children::List(old_list), Children::List(new_list)) => {
                self.patch_keyed_children(old_list, new_list, container, anchor, parent)
            }
            (old, Children::List(new_list)) => {
                if let Children::Text(_) = old {
                    self.host.set_text_content(container, "");
                }
                self.mount_children(new_list, container, anchor, parent)
            }
            (old, Children::None | Children::Slots(_)) => {
                match old {
                    Children::List(old_list) => self.unmount_children(old_list),
                    Children::Text(_) => self.host.set_text_content(container, ""),
                    Children::None | Children::Slots(_) => {}
                }
                Ok(())
            }
        }
    }

    pub(crate) fn patch_keyed_children(
        self: &Rc<Self>,
        c1: &[VNode],
        c2: &[VNode],
        container: NodeId,
        parent_anchor: Option<NodeId>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> RenderResult {
        let mut i = 0;
        // Exclusive ends of the untrimmed ranges.
        let mut end1 = c1.len();
        let mut end2 = c2.len();

        // 1. common prefix
        while i < end1 && i < end2 && is_same_vnode_type(&c1[i], &c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None, parent)?;
            i += 1;
        }

        // 2. common suffix
        while i < end1 && i < end2 && is_same_vnode_type(&c1[end1 - 1], &c2[end2 - 1]) {
            self.patch(Some(&c1[end1 - 1]), &c2[end2 - 1], container, None, parent)?;
            end1 -= 1;
            end2 -= 1;
        }

        // 3. pure insertion or pure removal
        if i >= end1 {
            let anchor = c2.get(end2).map_or(parent_anchor, VNode::el);
            for node in &c2[i..end2] {
                self.patch(None, node, container, anchor, parent)?;
            }
            return Ok(());
        }
        if i >= end2 {
            for node in &c1[i..end1] {
                self.unmount(node, true);
            }
            return Ok(());
        }

        // 4. unknown middle
        let (s1, s2) = (i, i);
        let key_to_new_index: HashMap<&Key, usize> = c2[s2..end2]
            .iter()
            .enumerate()
            .filter_map(|(offset, node)| node.key().map(|key| (key, s2 + offset)))
            .collect();

        let to_be_patched = end2 - s2;
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index_so_far = 0;
        // Old index + 1 for each new position; 0 means "mount".
        let mut new_index_to_old_index = vec![0usize; to_be_patched];

        for (old_index, prev) in c1.iter().enumerate().take(end1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount(prev, true);
                continue;
            }

            let new_index = match prev.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (s2..end2).find(|&j| {
                    new_index_to_old_index[j - s2] == 0 && is_same_vnode_type(prev, &c2[j])
                }),
            };

            match new_index {
                None => self.unmount(prev, true),
                Some(new_index) => {
                    new_index_to_old_index[new_index - s2] = old_index + 1;
                    if new_index >= max_new_index_so_far {
                        max_new_index_so_far = new_index;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(prev), &c2[new_index], container, None, parent)?;
                    patched += 1;
                }
            }
        }

        // 5. move and mount
        let stable = if moved {
            longest_increasing_subsequence(&new_index_to_old_index)
        } else {
            Vec::new()
        };
        trace!(to_be_patched, stable = stable.len(), moved, "keyed diff");

        let mut j = stable.len();
        for k in (0..to_be_patched).rev() {
            let next_index = s2 + k;
            let next = &c2[next_index];
            let anchor = c2.get(next_index + 1).map_or(parent_anchor, VNode::el);

            if new_index_to_old_index[k] == 0 {
                self.patch(None, next, container, anchor, parent)?;
            } else if moved {
                if j > 0 && stable[j - 1] == k {
                    j -= 1;
                } else {
                    self.move_vnode(next, container, anchor);
                }
            }
        }
        Ok(())
    }
}

/// Indices of a longest strictly increasing subsequence of `arr`, ignoring
/// zero entries.
pub(crate) fn longest_increasing_subsequence(arr: &[usize]) -> Vec<usize> {
    let mut predecessors: Vec<Option<usize>> = vec![None; arr.len()];
    // tails[l] is the index of the smallest tail of an increasing run of
    // length l + 1.
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in arr.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let pos = tails.partition_point(|&t| arr[t] < value);
        if pos > 0 {
            predecessors[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = predecessors[i];
    }
    result.reverse();
    result
}
