//! Tag tree, attribute slots, and balance recovery.
//!
//! Nodes live in a flat arena and link to each other through indices
//! (parent, first/last child, siblings); the whole tree is dropped in one
//! piece with the document. A closing token either collapses a matching
//! ancestor or marks the document unbalanced; either way the scanner keeps
//! its single pass going.

use log::debug;

use crate::content::{DocumentFlags, HtmlContent};
use crate::tags::{TagFlags, TagId};
use urls::UrlId;

/// Hard ceiling on tree nodes per document. Tokens past the ceiling still
/// drive the state machines but are not added to the tree.
pub const MAX_TAGS: u32 = 8192;

/// Arena handle for a node in a [`TagTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Canonical attribute kinds the analyzer keeps; everything else is parsed
/// and dropped. `href`, `src` and `action` all collapse to [`Href`].
///
/// [`Href`]: ComponentKind::Href
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Name,
    Href,
    Color,
    Bgcolor,
    Style,
    Class,
    Width,
    Height,
    Size,
    Rel,
    Alt,
}

impl ComponentKind {
    pub const COUNT: usize = 11;

    /// Resolve a decoded, lowercased attribute name.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"name" => Self::Name,
            b"href" | b"src" | b"action" => Self::Href,
            b"color" => Self::Color,
            b"bgcolor" => Self::Bgcolor,
            b"style" => Self::Style,
            b"class" => Self::Class,
            b"width" => Self::Width,
            b"height" => Self::Height,
            b"size" => Self::Size,
            b"rel" => Self::Rel,
            b"alt" => Self::Alt,
            _ => return None,
        })
    }
}

/// Dense per-kind attribute slots. First occurrence wins; repeats of the
/// same component are dropped at insert time.
#[derive(Clone, Debug, Default)]
pub struct Params {
    slots: [Option<Vec<u8>>; ComponentKind::COUNT],
}

impl Params {
    pub fn get(&self, kind: ComponentKind) -> Option<&[u8]> {
        self.slots[kind as usize].as_deref()
    }

    /// Store `value` unless the slot is already taken. Returns whether the
    /// value was kept.
    pub fn insert_first_wins(&mut self, kind: ComponentKind, value: Vec<u8>) -> bool {
        let slot = &mut self.slots[kind as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentKind, &[u8])> {
        const KINDS: [ComponentKind; ComponentKind::COUNT] = [
            ComponentKind::Name,
            ComponentKind::Href,
            ComponentKind::Color,
            ComponentKind::Bgcolor,
            ComponentKind::Style,
            ComponentKind::Class,
            ComponentKind::Width,
            ComponentKind::Height,
            ComponentKind::Size,
            ComponentKind::Rel,
            ComponentKind::Alt,
        ];
        KINDS
            .into_iter()
            .filter_map(|k| self.get(k).map(|v| (k, v)))
    }
}

/// Specialization payload attached to a tag node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Extra {
    #[default]
    None,
    /// Index into the active URL set.
    Url(UrlId),
    /// Index into `HtmlContent::images`.
    Image(usize),
    /// Index into `HtmlContent::blocks`.
    Block(usize),
}

/// One start/empty/close token as recorded in the tree.
#[derive(Clone, Debug, Default)]
pub struct TagNode {
    /// Dictionary id, `-1` when the name is unknown.
    pub id: TagId,
    pub flags: TagFlags,
    /// Decoded, lowercased tag name.
    pub name: Vec<u8>,
    pub params: Params,
    /// Byte range of this tag's own rendered-text contribution; after
    /// propagation, the subtree total.
    pub content_offset: usize,
    pub content_length: usize,
    pub extra: Extra,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    prev_sibling: Option<NodeId>,
}

/// Rooted tag tree. The root is an anonymous sentinel that never matches a
/// dictionary id.
#[derive(Debug)]
pub struct TagTree {
    nodes: Vec<TagNode>,
    admitted: usize,
}

impl Default for TagTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTree {
    pub fn new() -> Self {
        let root = TagNode {
            id: -1,
            ..TagNode::default()
        };
        Self {
            nodes: vec![root],
            admitted: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id.0 == 0
    }

    /// Total nodes allocated, the sentinel included. Tokens the builder
    /// rejected (unknown names, budget overflow) still occupy a slot.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes currently linked into the tree; bounded by [`MAX_TAGS`].
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// True when nothing besides the sentinel root was ever admitted.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn node(&self, id: NodeId) -> &TagNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TagNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a detached node; it joins the tree only when the builder
    /// admits it.
    pub(crate) fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TagNode::default());
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = self.node(id).first_child;
        std::iter::from_fn(move || {
            let cur = next?;
            next = self.node(cur).next_sibling;
            Some(cur)
        })
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.node(child).parent.is_none(), "child must be detached");
        let prev_last = self.node(parent).last_child;
        {
            let c = self.node_mut(child);
            c.parent = Some(parent);
            c.prev_sibling = prev_last;
            c.next_sibling = None;
        }
        match prev_last {
            Some(last) => self.node_mut(last).next_sibling = Some(child),
            None => self.node_mut(parent).first_child = Some(child),
        }
        self.node_mut(parent).last_child = Some(child);
        self.admitted += 1;
    }

    /// Remove a node from its parent's child list. The arena slot stays;
    /// only the structural links are cut.
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let n = self.node(id);
            (n.parent, n.prev_sibling, n.next_sibling)
        };
        if let Some(p) = prev {
            self.node_mut(p).next_sibling = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev_sibling = prev;
        }
        if let Some(par) = parent {
            if self.node(par).first_child == Some(id) {
                self.node_mut(par).first_child = next;
            }
            if self.node(par).last_child == Some(id) {
                self.node_mut(par).last_child = prev;
            }
        }
        let n = self.node_mut(id);
        n.parent = None;
        n.prev_sibling = None;
        n.next_sibling = None;
        self.admitted -= 1;
    }

    /// Nodes of the tree in post-order (children before parents), root
    /// excluded from the result but its subtree fully covered.
    fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        // Pre-order with reversed-children trick, then reverse: yields a
        // valid post-order for accumulation purposes.
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if !self.is_root(id) {
                out.push(id);
            }
            stack.extend(self.children(id));
        }
        out.reverse();
        out
    }

    /// Fold every node's rendered-text length into its ancestors, so each
    /// tag reports its whole subtree's contribution.
    pub(crate) fn propagate_content_lengths(&mut self) {
        for id in self.post_order() {
            let len = self.node(id).content_length;
            if len == 0 {
                continue;
            }
            if let Some(parent) = self.node(id).parent
                && !self.is_root(parent)
            {
                self.node_mut(parent).content_length += len;
            }
        }
    }
}

/// What the tree builder decided about one committed token.
pub(crate) struct CommitOutcome {
    /// Whether rendered text after this tag is emitted (vs. ignored).
    pub emit_content: bool,
    /// False when this token exposed bad nesting.
    pub balanced: bool,
    /// The open ancestor a closing token collapsed, when one matched.
    pub matched_close: Option<NodeId>,
}

impl CommitOutcome {
    fn emit() -> Self {
        Self {
            emit_content: true,
            balanced: true,
            matched_close: None,
        }
    }
}

/// Walk ancestors for an open tag with the same id, mark it closed, drop
/// the closing token from the tree and step the current level up.
fn check_balance(tree: &mut TagTree, node: NodeId, cur_level: &mut NodeId) -> Option<NodeId> {
    let id = tree.node(node).id;
    debug_assert!(tree.node(node).flags.contains(TagFlags::CLOSING));

    let mut cur = tree.parent(node);
    while let Some(candidate) = cur {
        if tree.is_root(candidate) {
            break;
        }
        let cand = tree.node(candidate);
        if cand.id == id && !cand.flags.contains(TagFlags::CLOSED) {
            tree.node_mut(candidate).flags |= TagFlags::CLOSED;
            tree.unlink(node);
            *cur_level = tree.parent(candidate).unwrap_or(tree.root());
            return Some(candidate);
        }
        cur = tree.parent(candidate);
    }

    // No pairable open tag: the token stays as a leaf and the level is
    // left alone; the caller raises the document flag.
    debug!(target: "html.tree", "closing token with no pairable open tag");
    None
}

/// Commit one parsed token to the tree, with all the recovery rules.
pub(crate) fn commit_tag(
    hc: &mut HtmlContent,
    node: NodeId,
    cur_level: &mut NodeId,
) -> CommitOutcome {
    if hc.total_tags > MAX_TAGS {
        hc.flags |= DocumentFlags::TOO_MANY_TAGS;
    }

    if hc.tree.node(node).id == -1 {
        // Unknown tags are counted but never inserted; the text below them
        // still renders.
        hc.total_tags += 1;
        return CommitOutcome::emit();
    }

    let flags = hc.tree.node(node).flags;
    let budget_ok = hc.total_tags < MAX_TAGS;

    if !flags.intersects(TagFlags::INLINE | TagFlags::EMPTY) {
        commit_nesting_tag(hc, node, cur_level, budget_ok)
    } else {
        commit_leaf_tag(hc, node, cur_level, budget_ok)
    }
}

fn commit_nesting_tag(
    hc: &mut HtmlContent,
    node: NodeId,
    cur_level: &mut NodeId,
    budget_ok: bool,
) -> CommitOutcome {
    let flags = hc.tree.node(node).flags;

    if flags.intersects(TagFlags::CLOSING | TagFlags::CLOSED) {
        let mut outcome = CommitOutcome::emit();
        if budget_ok {
            hc.tree.append_child(*cur_level, node);
            if flags.contains(TagFlags::CLOSING) {
                match check_balance(&mut hc.tree, node, cur_level) {
                    Some(matched) => outcome.matched_close = Some(matched),
                    None => {
                        hc.flags |= DocumentFlags::UNBALANCED;
                        outcome.balanced = false;
                    }
                }
            }
            hc.total_tags += 1;
        }
        return outcome;
    }

    // Open tag. Inspect the node we would nest under.
    if !hc.tree.is_root(*cur_level) {
        let parent = hc.tree.node(*cur_level);
        let parent_id = parent.id;
        let parent_flags = parent.flags;

        if parent_flags.contains(TagFlags::IGNORE) {
            hc.tree.node_mut(node).flags |= TagFlags::IGNORE;
        }

        if !flags.contains(TagFlags::CLOSED)
            && !parent_flags.contains(TagFlags::BLOCK)
            && parent_id == hc.tree.node(node).id
        {
            // Something like <a>bla<a>foo…: reparent to the grandparent
            // instead of stacking a phantom level.
            debug!(target: "html.tree", "tag reopened in place, marking unbalanced");
            hc.flags |= DocumentFlags::UNBALANCED;
            let grandparent = hc
                .tree
                .parent(*cur_level)
                .unwrap_or(hc.tree.root());
            if budget_ok {
                hc.tree.append_child(grandparent, node);
                *cur_level = node;
                hc.total_tags += 1;
            }
            return CommitOutcome {
                emit_content: true,
                balanced: false,
                matched_close: None,
            };
        }
    }

    if budget_ok {
        hc.tree.append_child(*cur_level, node);
        if !hc.tree.node(node).flags.contains(TagFlags::CLOSED) {
            *cur_level = node;
        }
        hc.total_tags += 1;
    }

    let flags = hc.tree.node(node).flags;
    if flags.intersects(TagFlags::HEAD | TagFlags::UNKNOWN | TagFlags::IGNORE) {
        hc.tree.node_mut(node).flags |= TagFlags::IGNORE;
        return CommitOutcome {
            emit_content: false,
            balanced: true,
            matched_close: None,
        };
    }

    CommitOutcome::emit()
}

fn commit_leaf_tag(
    hc: &mut HtmlContent,
    node: NodeId,
    cur_level: &mut NodeId,
    budget_ok: bool,
) -> CommitOutcome {
    // Leaves at the top level (no enclosing tag) are not recorded in the
    // tree; the dictionary bitset still notes them.
    if hc.tree.is_root(*cur_level) {
        return CommitOutcome::emit();
    }

    let parent_flags = hc.tree.node(*cur_level).flags;
    if budget_ok {
        hc.tree.append_child(*cur_level, node);
        hc.total_tags += 1;
    }
    if parent_flags.intersects(TagFlags::HEAD | TagFlags::UNKNOWN | TagFlags::IGNORE) {
        hc.tree.node_mut(node).flags |= TagFlags::IGNORE;
        return CommitOutcome {
            emit_content: false,
            balanced: true,
            matched_close: None,
        };
    }

    CommitOutcome::emit()
}
