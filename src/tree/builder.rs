use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::keyspace::record::KeyName;

/// A namespace node: one delimiter-separated segment of key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub segment: String,
    /// Segments from the root joined with the delimiter. The root itself is
    /// never addressed by path, so `""` names a top-level empty segment.
    pub full_path: String,
    pub depth: usize,
    pub children: BTreeMap<String, TreeNode>,
    /// Keys whose final segment lives directly under this node.
    pub leaf_keys: BTreeSet<KeyName>,
    pub is_open: bool,
    /// Keys in this subtree, leaves of every descendant included.
    pub key_count: usize,
}

impl TreeNode {
    fn root() -> Self {
        Self::branch(String::new(), String::new(), 0)
    }

    fn branch(segment: String, full_path: String, depth: usize) -> Self {
        Self {
            segment,
            full_path,
            depth,
            children: BTreeMap::new(),
            leaf_keys: BTreeSet::new(),
            is_open: false,
            key_count: 0,
        }
    }

    fn child_path(&self, segment: &str, delimiter: &str) -> String {
        if self.depth == 0 {
            segment.to_string()
        } else {
            format!("{}{}{}", self.full_path, delimiter, segment)
        }
    }

    /// Insert `name` below this node. `rest` holds the remaining segments,
    /// the last of which names the leaf itself. Counts are bumped bottom-up
    /// along the path only when the key is new.
    fn insert(&mut self, rest: &[&str], delimiter: &str, name: &KeyName) -> bool {
        let inserted = match rest {
            [head, tail @ ..] if !tail.is_empty() => {
                let path = self.child_path(head, delimiter);
                let depth = self.depth + 1;
                self.children
                    .entry(head.to_string())
                    .or_insert_with(|| TreeNode::branch(head.to_string(), path, depth))
                    .insert(tail, delimiter, name)
            }
            _ => self.leaf_keys.insert(name.clone()),
        };
        if inserted {
            self.key_count += 1;
        }
        inserted
    }

    fn find(&self, segments: &[&str]) -> Option<&TreeNode> {
        match segments {
            [] => Some(self),
            [head, tail @ ..] => self.children.get(*head)?.find(tail),
        }
    }

    fn find_mut(&mut self, segments: &[&str]) -> Option<&mut TreeNode> {
        match segments {
            [] => Some(self),
            [head, tail @ ..] => self.children.get_mut(*head)?.find_mut(tail),
        }
    }

    fn collect_open(&self, out: &mut HashSet<String>) {
        for child in self.children.values() {
            if child.is_open {
                out.insert(child.full_path.clone());
            }
            child.collect_open(out);
        }
    }

    fn restore_open(&mut self, open: &HashSet<String>) {
        for child in self.children.values_mut() {
            child.is_open = open.contains(&child.full_path);
            child.restore_open(open);
        }
    }

    /// Sum of leaf buckets in the subtree, computed from scratch.
    pub fn recount(&self) -> usize {
        self.leaf_keys.len() + self.children.values().map(TreeNode::recount).sum::<usize>()
    }
}

/// What a flattened row represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Branch { path: String, key_count: usize },
    Leaf { name: KeyName },
    /// Virtual trailing row offered while the sweep is incomplete.
    LoadMore,
}

/// A tree row ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub kind: RowKind,
    pub label: String,
    pub depth: usize,
    pub is_open: bool,
    pub is_last_sibling: bool,
}

impl TreeRow {
    pub fn load_more() -> Self {
        Self {
            kind: RowKind::LoadMore,
            label: "Load more keys…".to_string(),
            depth: 0,
            is_open: false,
            is_last_sibling: true,
        }
    }
}

/// Root of a namespace tree built with one delimiter.
///
/// Keys without the delimiter sit in the root's own leaf bucket (the
/// ungrouped bucket) and are listed after the namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRoot {
    pub root: TreeNode,
    pub delimiter: String,
    pub selected_leaf: Option<KeyName>,
}

impl TreeRoot {
    pub fn empty(delimiter: &str) -> Self {
        Self {
            root: TreeNode::root(),
            delimiter: delimiter.to_string(),
            selected_leaf: None,
        }
    }

    pub fn key_count(&self) -> usize {
        self.root.key_count
    }

    pub fn ungrouped(&self) -> &BTreeSet<KeyName> {
        &self.root.leaf_keys
    }

    /// Segments of a namespace path. Never empty: every path names a node
    /// below the root.
    fn segments<'a>(&self, path: &'a str) -> Vec<&'a str> {
        if self.delimiter.is_empty() {
            vec![path]
        } else {
            path.split(self.delimiter.as_str()).collect()
        }
    }

    /// Look a namespace node up by its full path.
    pub fn node(&self, path: &str) -> Option<&TreeNode> {
        self.root.find(&self.segments(path))
    }

    /// Insert one key; returns whether it was new.
    pub fn insert(&mut self, name: &KeyName) -> bool {
        let text = name.to_str_lossy();
        let segments: Vec<&str> = if self.delimiter.is_empty() {
            vec![&*text]
        } else {
            text.split(self.delimiter.as_str()).collect()
        };
        let delimiter = self.delimiter.clone();
        self.root.insert(&segments, &delimiter, name)
    }

    pub fn contains_leaf(&self, name: &KeyName) -> bool {
        let text = name.to_str_lossy();
        let mut segments: Vec<&str> = if self.delimiter.is_empty() {
            vec![&*text]
        } else {
            text.split(self.delimiter.as_str()).collect()
        };
        segments.pop();
        self.root
            .find(&segments)
            .is_some_and(|node| node.leaf_keys.contains(name))
    }

    /// Paths of every open namespace node.
    pub fn open_paths(&self) -> HashSet<String> {
        let mut open = HashSet::new();
        self.root.collect_open(&mut open);
        open
    }

    /// Open exactly the nodes whose path is in `open`.
    pub fn restore_open(&mut self, open: &HashSet<String>) {
        self.root.restore_open(open);
    }

    /// Carry open nodes and the selected leaf over from `previous`, matched
    /// by path. Nothing carries across a delimiter change.
    pub fn adopt_view_state(&mut self, previous: &TreeRoot) {
        if previous.delimiter != self.delimiter {
            return;
        }
        self.restore_open(&previous.open_paths());
        self.selected_leaf = previous
            .selected_leaf
            .as_ref()
            .filter(|name| self.contains_leaf(name))
            .cloned();
    }

    /// Flip a namespace node; returns the new state, `None` for unknown paths.
    pub fn toggle(&mut self, path: &str) -> Option<bool> {
        let node = self.root.find_mut(&self.segments(path))?;
        node.is_open = !node.is_open;
        Some(node.is_open)
    }

    pub fn set_open(&mut self, path: &str, open: bool) -> bool {
        match self.root.find_mut(&self.segments(path)) {
            Some(node) => {
                node.is_open = open;
                true
            }
            None => false,
        }
    }

    /// Select a leaf; unknown names clear the selection.
    pub fn select_leaf(&mut self, name: &KeyName) -> bool {
        if self.contains_leaf(name) {
            self.selected_leaf = Some(name.clone());
            true
        } else {
            self.selected_leaf = None;
            false
        }
    }

    /// Depth-first rows of every visible node: namespaces first, then the
    /// leaves of a node, then ungrouped keys at the top level.
    pub fn flatten(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        Self::flatten_node(&self.root, &self.delimiter, &mut rows);
        rows
    }

    fn flatten_node(node: &TreeNode, delimiter: &str, rows: &mut Vec<TreeRow>) {
        let depth = node.depth;
        let total = node.children.len() + node.leaf_keys.len();
        let mut index = 0;

        for child in node.children.values() {
            index += 1;
            rows.push(TreeRow {
                kind: RowKind::Branch {
                    path: child.full_path.clone(),
                    key_count: child.key_count,
                },
                label: child.segment.clone(),
                depth,
                is_open: child.is_open,
                is_last_sibling: index == total,
            });
            if child.is_open {
                Self::flatten_node(child, delimiter, rows);
            }
        }

        for name in &node.leaf_keys {
            index += 1;
            let text = name.to_str_lossy();
            let label = if delimiter.is_empty() {
                text.to_string()
            } else {
                text.rsplit(delimiter).next().unwrap_or_default().to_string()
            };
            rows.push(TreeRow {
                kind: RowKind::Leaf { name: name.clone() },
                label,
                depth,
                is_open: false,
                is_last_sibling: index == total,
            });
        }
    }
}

/// Builds namespace trees from key names.
pub struct TreeBuilder;

impl TreeBuilder {
    /// Full rebuild. The result depends only on the set of names and the
    /// delimiter, not on their order.
    pub fn build(keys: &[KeyName], delimiter: &str) -> TreeRoot {
        let mut tree = TreeRoot::empty(delimiter);
        for name in keys {
            tree.insert(name);
        }
        tree
    }

    /// Full rebuild that keeps the open nodes and selection of `previous`
    /// when it used the same delimiter.
    pub fn rebuild(keys: &[KeyName], delimiter: &str, previous: Option<&TreeRoot>) -> TreeRoot {
        let mut tree = Self::build(keys, delimiter);
        if let Some(previous) = previous {
            tree.adopt_view_state(previous);
        }
        tree
    }

    /// Incremental merge touching only the paths of `new_keys`. Keys already
    /// present are ignored.
    pub fn merge(mut tree: TreeRoot, new_keys: &[KeyName]) -> TreeRoot {
        for name in new_keys {
            tree.insert(name);
        }
        tree
    }
}
