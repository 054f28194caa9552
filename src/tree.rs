//! Dual-view tree of file and directory metadata
//!
//! Comparing remote and local state is the engine's main job, so both
//! sides' metadata live in the same tree: every node carries its last-known
//! local and remote [`Update`]. The tree only ever holds metadata; content
//! payloads are dispatched and cleared by the reconciler.
//!
//! The tree is not thread safe. It is owned by the reconcile task and fed
//! updates from a dedicated queue; nothing else touches it.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::TreeError;
use crate::rules::PathRules;
use crate::types::{Side, Update};

pub const GITIGNORE: &str = ".gitignore";

/// Build-output directories, editor droppings and dotfiles that are never
/// mirrored unless re-included.
pub const DEFAULT_EXTRA_EXCLUDES: &[&str] = &[
	"tmp",
	"temp",
	"target",
	"build",
	"bin",
	"*___jb_bak___", // IntelliJ safe-write files
	"*___jb_old___",
	".*",
];

/// Paths mirrored even when an exclude or a tree-local `.gitignore`
/// matches them. Note `.gitignore` itself: ignore files are not
/// self-ignoring.
pub const DEFAULT_EXTRA_INCLUDES: &[&str] = &[
	"src/mainGeneratedRest",
	"src/mainGeneratedDataTemplate",
	"testGeneratedRest",
	"testGeneratedDataTemplate",
	"build/*/classes/mainGeneratedInternalUrns/",
	"build/*/resources/mainGeneratedInternalUrns/",
	"src_managed",
	"*-SNAPSHOT.jar",
	"*.iml",
	"*.ipr",
	"*.iws",
	".classpath",
	".project",
	".gitignore",
];

/// One path's worth of state, seen from both sides of the mirror.
///
/// Ownership flows strictly parent to child; walks carry ancestor context
/// top-down instead of nodes holding back-pointers.
pub struct Node {
	name: String,
	path: String,
	children: Vec<Node>,
	local: Option<Update>,
	remote: Option<Update>,
	/// Rules compiled from this directory's own `.gitignore` child.
	ignore_rules: Option<Arc<PathRules>>,
	is_dirty: bool,
	has_dirty_descendant: bool,
	/// Memoized effective ignore decision; `None` means not yet computed.
	ignore_cache: Cell<Option<bool>>,
}

impl Node {
	fn new(name: &str, path: String) -> Node {
		Node {
			name: name.to_string(),
			path,
			children: Vec::new(),
			local: None,
			remote: None,
			ignore_rules: None,
			is_dirty: false,
			has_dirty_descendant: false,
			ignore_cache: Cell::new(None),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn local(&self) -> Option<&Update> {
		self.local.as_ref()
	}

	pub fn remote(&self) -> Option<&Update> {
		self.remote.as_ref()
	}

	pub fn children(&self) -> &[Node] {
		&self.children
	}

	pub fn is_dirty(&self) -> bool {
		self.is_dirty
	}

	pub fn has_dirty_descendant(&self) -> bool {
		self.has_dirty_descendant
	}

	/// The local view decides, falling back to the remote one.
	pub fn is_directory(&self) -> bool {
		match (&self.local, &self.remote) {
			(Some(local), _) => local.directory,
			(None, Some(remote)) => remote.directory,
			(None, None) => false,
		}
	}

	pub fn is_same_type(&self) -> bool {
		self.local.as_ref().map(Update::node_type)
			== self.remote.as_ref().map(Update::node_type)
	}

	pub fn is_remote_newer(&self) -> bool {
		match (&self.local, &self.remote) {
			(_, None) => false,
			(None, Some(_)) => true,
			(Some(local), Some(remote)) => local.mod_time < remote.mod_time,
		}
	}

	pub fn is_local_newer(&self) -> bool {
		match (&self.local, &self.remote) {
			(None, _) => false,
			(Some(_), None) => true,
			(Some(local), Some(remote)) => local.mod_time > remote.mod_time,
		}
	}

	/// Assign one side's update. The caller is responsible for flagging
	/// ancestors and for pushing `.gitignore` rules into the parent.
	fn set(&mut self, mut update: Update, side: Side) -> Result<(), TreeError> {
		if update.path != self.path {
			return Err(TreeError::PathMismatch {
				node: self.path.clone(),
				update: update.path,
			});
		}
		if side == Side::Local && update.delete && update.mod_time == 0 {
			// The best guess for a deletion's mod time is the old, known
			// one ticked by 1, so the tombstone orders after the state it
			// replaces. Re-deleting keeps the synthesized time stable.
			if let Some(prev) = &self.local {
				let tick = if prev.delete { 0 } else { 1 };
				update.mod_time = prev.mod_time + tick;
			}
		}
		// No longer a directory, or deleted: the subtree is gone. It
		// re-enters the tree only if a later update restores the directory.
		if !update.directory || update.delete {
			self.children.clear();
		}
		match side {
			Side::Local => self.local = Some(update),
			Side::Remote => self.remote = Some(update),
		}
		self.is_dirty = true;
		self.ignore_cache.set(None);
		Ok(())
	}

	/// The `.gitignore` text of whichever side is newer, if any.
	fn newer_ignore_string(&self) -> Option<String> {
		if self.is_local_newer() {
			self.local.as_ref().map(|u| u.ignore_string.clone())
		} else if self.is_remote_newer() {
			self.remote.as_ref().map(|u| u.ignore_string.clone())
		} else {
			None
		}
	}

	/// Replace this directory's rules and drop every memoized ignore
	/// decision underneath it, before anything can query a stale answer.
	fn set_ignore_rules(&mut self, text: &str) {
		self.ignore_rules = Some(Arc::new(PathRules::new(text)));
		self.invalidate_ignore_cache();
	}

	fn invalidate_ignore_cache(&mut self) {
		self.ignore_cache.set(None);
		for child in &mut self.children {
			child.invalidate_ignore_cache();
		}
	}

	/// Child node for `name`, created on demand.
	fn child_entry(&mut self, name: &str) -> &mut Node {
		if let Some(i) = self.children.iter().position(|c| c.name == name) {
			return &mut self.children[i];
		}
		let path = if self.path.is_empty() {
			name.to_string()
		} else {
			format!("{}/{}", self.path, name)
		};
		self.children.push(Node::new(name, path));
		self.children.last_mut().expect("just pushed")
	}

	// Slot manipulation for the reconciler's decisions. These do not mark
	// the node dirty: a snapshot means both sides now agree, and marking
	// would just re-dirty ancestors for nothing.

	pub(crate) fn set_local_snapshot(&mut self, update: Update) {
		self.local = Some(update);
	}

	pub(crate) fn set_remote_snapshot(&mut self, update: Update) {
		self.remote = Some(update);
	}

	pub(crate) fn take_remote_data(&mut self) -> Option<Vec<u8>> {
		self.remote.as_mut().and_then(|u| u.data.take())
	}

	pub(crate) fn clear_local(&mut self) {
		self.local = None;
	}
}

impl std::fmt::Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Node")
			.field("path", &self.path)
			.field("local", &self.local.as_ref().map(|u| u.mod_time))
			.field("remote", &self.remote.as_ref().map(|u| u.mod_time))
			.field("dirty", &self.is_dirty)
			.finish()
	}
}

/// An ancestor directory's rules plus the offset that makes a descendant's
/// path relative to that directory.
struct RuleFrame {
	prefix: usize,
	rules: Arc<PathRules>,
}

/// The dual-view tree. Owns the root node plus the two process-wide rule
/// sets layered on top of tree-local `.gitignore`s.
pub struct UpdateTree {
	root: Node,
	extra_excludes: PathRules,
	extra_includes: PathRules,
}

impl UpdateTree {
	/// A tree with the default exclude/include rules.
	pub fn new() -> UpdateTree {
		UpdateTree::with_rules(
			PathRules::from_lines(DEFAULT_EXTRA_EXCLUDES),
			PathRules::from_lines(DEFAULT_EXTRA_INCLUDES),
		)
	}

	pub fn with_rules(extra_excludes: PathRules, extra_includes: PathRules) -> UpdateTree {
		let mut root = Node::new("", String::new());
		root.set(Update::directory("", 0), Side::Local).expect("root update");
		root.set(Update::directory("", 0), Side::Remote).expect("root update");
		UpdateTree { root, extra_excludes, extra_includes }
	}

	pub fn add_local(&mut self, update: Update) -> Result<(), TreeError> {
		self.add(Side::Local, update)
	}

	pub fn add_remote(&mut self, update: Update) -> Result<(), TreeError> {
		self.add(Side::Remote, update)
	}

	/// Apply `update` to the node at its path, creating missing
	/// intermediate nodes on demand. Producers promise parents arrive
	/// first, but synthesized placeholders keep startup reorderings from
	/// failing.
	pub fn add(&mut self, side: Side, update: Update) -> Result<(), TreeError> {
		Self::validate_path(&update.path)?;
		if update.path.is_empty() {
			return self.root.set(update, side);
		}
		let path = update.path.clone();
		let segments: Vec<&str> = path.split('/').collect();
		let mut current = &mut self.root;
		for segment in &segments[..segments.len() - 1] {
			current.has_dirty_descendant = true;
			current = current.child_entry(segment);
		}
		current.has_dirty_descendant = true;
		let leaf = segments[segments.len() - 1];
		let new_rules = {
			let child = current.child_entry(leaf);
			child.set(update, side)?;
			if child.name == GITIGNORE {
				child.newer_ignore_string()
			} else {
				None
			}
		};
		// An updated .gitignore reshapes what its directory ignores
		if let Some(text) = new_rules {
			current.set_ignore_rules(&text);
		}
		Ok(())
	}

	fn validate_path(path: &str) -> Result<(), TreeError> {
		if path.is_empty() {
			return Ok(());
		}
		let invalid = path.starts_with('/')
			|| path.ends_with('/')
			|| path.split('/').any(|segment| segment.is_empty() || segment == "..");
		if invalid {
			return Err(TreeError::InvalidPath { path: path.to_string() });
		}
		Ok(())
	}

	/// Resolve `path` to its node, creating empty placeholders on the way.
	pub fn find(&mut self, path: &str) -> &mut Node {
		if path.is_empty() {
			return &mut self.root;
		}
		let mut current = &mut self.root;
		for segment in path.split('/') {
			current = current.child_entry(segment);
		}
		current
	}

	/// Resolve `path` without creating anything.
	pub fn get(&self, path: &str) -> Option<&Node> {
		if path.is_empty() {
			return Some(&self.root);
		}
		let mut current = &self.root;
		for segment in path.split('/') {
			current = current.children.iter().find(|c| c.name == segment)?;
		}
		Some(current)
	}

	pub(crate) fn clear_local_slot(&mut self, path: &str) {
		self.find(path).clear_local();
	}

	/// Invoke `visitor` at every node, breadth-first, root first.
	pub fn visit(&self, mut visitor: impl FnMut(&Node)) {
		let mut queue: VecDeque<&Node> = VecDeque::new();
		queue.push_back(&self.root);
		while let Some(node) = queue.pop_front() {
			visitor(node);
			for child in &node.children {
				queue.push_back(child);
			}
		}
	}

	/// Invoke `visitor` at every dirty node, parents before children,
	/// skipping clean subtrees via `has_dirty_descendant`. The second
	/// argument is the node's effective ignore status. After this method
	/// completes all nodes are reset to clean.
	pub fn visit_dirty(&mut self, mut visitor: impl FnMut(&mut Node, bool)) {
		let mut stack: Vec<RuleFrame> = Vec::new();
		Self::walk_dirty(
			&mut self.root,
			&mut stack,
			&self.extra_excludes,
			&self.extra_includes,
			&mut visitor,
		);
	}

	fn walk_dirty(
		node: &mut Node,
		stack: &mut Vec<RuleFrame>,
		extra_excludes: &PathRules,
		extra_includes: &PathRules,
		visitor: &mut impl FnMut(&mut Node, bool),
	) {
		if node.is_dirty {
			let ignored = Self::effective_ignore(node, stack, extra_excludes, extra_includes);
			visitor(node, ignored);
			node.is_dirty = false;
		}
		if !node.has_dirty_descendant {
			return;
		}
		node.has_dirty_descendant = false;
		let pushed = Self::push_frame(node, stack);
		for child in &mut node.children {
			Self::walk_dirty(child, stack, extra_excludes, extra_includes, visitor);
		}
		if pushed {
			stack.pop();
		}
	}

	/// Invoke `visitor` at every node regardless of dirtiness, clearing
	/// the dirty flags as it goes. Used for the one union-diff pass after
	/// both initial scans have arrived.
	pub fn reconcile_all(&mut self, mut visitor: impl FnMut(&mut Node, bool)) {
		let mut stack: Vec<RuleFrame> = Vec::new();
		Self::walk_all(
			&mut self.root,
			&mut stack,
			&self.extra_excludes,
			&self.extra_includes,
			&mut visitor,
		);
	}

	fn walk_all(
		node: &mut Node,
		stack: &mut Vec<RuleFrame>,
		extra_excludes: &PathRules,
		extra_includes: &PathRules,
		visitor: &mut impl FnMut(&mut Node, bool),
	) {
		let ignored = Self::effective_ignore(node, stack, extra_excludes, extra_includes);
		visitor(node, ignored);
		node.is_dirty = false;
		node.has_dirty_descendant = false;
		let pushed = Self::push_frame(node, stack);
		for child in &mut node.children {
			Self::walk_all(child, stack, extra_excludes, extra_includes, visitor);
		}
		if pushed {
			stack.pop();
		}
	}

	fn push_frame(node: &Node, stack: &mut Vec<RuleFrame>) -> bool {
		match &node.ignore_rules {
			Some(rules) => {
				let prefix =
					if node.path.is_empty() { 0 } else { node.path.len() + 1 };
				stack.push(RuleFrame { prefix, rules: Arc::clone(rules) });
				true
			}
			None => false,
		}
	}

	/// Effective ignore status of one node given its ancestor rule stack.
	///
	/// For every ancestor level, the node's path relative to that ancestor
	/// is tested against the ancestor's own `.gitignore` rules and against
	/// the global extra rules; the extra includes act as a whitelist over
	/// everything else.
	fn effective_ignore(
		node: &Node,
		stack: &[RuleFrame],
		extra_excludes: &PathRules,
		extra_includes: &PathRules,
	) -> bool {
		if let Some(cached) = node.ignore_cache.get() {
			return cached;
		}
		if node.path.is_empty() {
			node.ignore_cache.set(Some(false));
			return false;
		}
		let is_dir = node.is_directory();
		let mut git_ignored = false;
		for frame in stack {
			git_ignored |= frame.rules.should_ignore(&node.path[frame.prefix..], is_dir);
		}
		let mut extra_excluded = false;
		let mut extra_included = false;
		for relative in Self::level_relatives(&node.path) {
			extra_excluded |= extra_excludes.should_ignore(relative, is_dir);
			extra_included |= extra_includes.should_ignore(relative, is_dir);
		}
		let ignored = (git_ignored || extra_excluded) && !extra_included;
		node.ignore_cache.set(Some(ignored));
		ignored
	}

	/// The path as seen from each ancestor: the full path (relative to the
	/// root), then the remainder after each directory prefix.
	fn level_relatives(path: &str) -> impl Iterator<Item = &str> {
		std::iter::once(path)
			.chain(path.match_indices('/').map(move |(i, _)| &path[i + 1..]))
	}

	/// Effective ignore status of `path`, materializing placeholder nodes
	/// as needed.
	pub fn should_ignore(&mut self, path: &str) -> bool {
		if path.is_empty() {
			return false;
		}
		self.find(path);
		let segments: Vec<&str> = path.split('/').collect();
		let mut stack: Vec<RuleFrame> = Vec::new();
		let mut current = &self.root;
		Self::push_frame(current, &mut stack);
		for segment in &segments[..segments.len() - 1] {
			current = current
				.children
				.iter()
				.find(|c| c.name == *segment)
				.expect("just materialized");
			Self::push_frame(current, &mut stack);
		}
		let node = current
			.children
			.iter()
			.find(|c| c.name == segments[segments.len() - 1])
			.expect("just materialized");
		Self::effective_ignore(node, &stack, &self.extra_excludes, &self.extra_includes)
	}

	/// Debug dump of the whole tree, one node per line.
	pub fn render(&self) -> String {
		let mut out = String::new();
		self.visit(|node| {
			out.push_str(&format!(
				"{:?} local={:?} remote={:?}{}\n",
				node.path,
				node.local.as_ref().map(|u| u.mod_time),
				node.remote.as_ref().map(|u| u.mod_time),
				if node.is_dirty { " dirty" } else { "" },
			));
		});
		out
	}
}

impl Default for UpdateTree {
	fn default() -> Self {
		UpdateTree::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bare_tree() -> UpdateTree {
		UpdateTree::with_rules(PathRules::empty(), PathRules::empty())
	}

	#[test]
	fn test_find_builds_paths() {
		let mut tree = bare_tree();
		let node = tree.find("a/b/c.txt");
		assert_eq!(node.path(), "a/b/c.txt");
		assert_eq!(node.name(), "c.txt");
		let parent = tree.get("a/b").unwrap();
		assert_eq!(parent.path(), "a/b");
		assert_eq!(parent.children().len(), 1);
	}

	#[test]
	fn test_children_unique_by_name() {
		let mut tree = bare_tree();
		tree.find("a/x");
		tree.find("a/x");
		tree.find("a/y");
		assert_eq!(tree.get("a").unwrap().children().len(), 2);
	}

	#[test]
	fn test_path_invariant_holds() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("a", 1)).unwrap();
		tree.add_local(Update::directory("a/b", 1)).unwrap();
		tree.add_local(Update::file("a/b/c.txt", 1)).unwrap();
		tree.visit(|node| {
			if !node.path().is_empty() {
				let expected_name = node.path().rsplit('/').next().unwrap();
				assert_eq!(node.name(), expected_name);
			}
			for child in node.children() {
				let expected = if node.path().is_empty() {
					child.name().to_string()
				} else {
					format!("{}/{}", node.path(), child.name())
				};
				assert_eq!(child.path(), expected);
			}
		});
	}

	#[test]
	fn test_invalid_paths_rejected() {
		let mut tree = bare_tree();
		assert!(tree.add_local(Update::file("/abs", 1)).is_err());
		assert!(tree.add_local(Update::file("trail/", 1)).is_err());
		assert!(tree.add_local(Update::file("a//b", 1)).is_err());
		assert!(tree.add_local(Update::file("../escape", 1)).is_err());
		assert!(tree.add_local(Update::file("a/../b", 1)).is_err());
	}

	#[test]
	fn test_path_mismatch_rejected() {
		let mut node = Node::new("a.txt", "a.txt".to_string());
		let err = node.set(Update::file("b.txt", 1), Side::Local).unwrap_err();
		match err {
			TreeError::PathMismatch { node, update } => {
				assert_eq!(node, "a.txt");
				assert_eq!(update, "b.txt");
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn test_tombstone_mod_time_synthesized() {
		let mut tree = bare_tree();
		tree.add_local(Update::file("f", 100)).unwrap();
		tree.add_local(Update::tombstone("f", 0)).unwrap();
		let node = tree.get("f").unwrap();
		assert!(node.local().unwrap().delete);
		assert_eq!(node.local().unwrap().mod_time, 101);

		// Re-deleting must not tick again
		tree.add_local(Update::tombstone("f", 0)).unwrap();
		assert_eq!(tree.get("f").unwrap().local().unwrap().mod_time, 101);
	}

	#[test]
	fn test_tombstone_with_real_mod_time_kept() {
		let mut tree = bare_tree();
		tree.add_local(Update::file("f", 100)).unwrap();
		tree.add_local(Update::tombstone("f", 500)).unwrap();
		assert_eq!(tree.get("f").unwrap().local().unwrap().mod_time, 500);
	}

	#[test]
	fn test_children_dropped_on_file_transition() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("x", 1)).unwrap();
		tree.add_local(Update::file("x/y.txt", 1)).unwrap();
		assert_eq!(tree.get("x").unwrap().children().len(), 1);

		tree.add_local(Update::file("x", 2)).unwrap();
		assert!(tree.get("x").unwrap().children().is_empty());
	}

	#[test]
	fn test_children_dropped_on_remote_delete() {
		let mut tree = bare_tree();
		tree.add_remote(Update::directory("x", 1)).unwrap();
		tree.add_remote(Update::file("x/y.txt", 1)).unwrap();
		tree.add_remote(Update::tombstone("x", 5)).unwrap();
		assert!(tree.get("x").unwrap().children().is_empty());
	}

	#[test]
	fn test_dirty_flags_propagate_and_clear() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("a", 1)).unwrap();
		tree.add_local(Update::file("a/b.txt", 1)).unwrap();

		assert!(tree.get("a/b.txt").unwrap().is_dirty());
		assert!(tree.get("a").unwrap().has_dirty_descendant());
		assert!(tree.get("").unwrap().has_dirty_descendant());

		let mut visited = Vec::new();
		tree.visit_dirty(|node, _ignored| visited.push(node.path().to_string()));
		assert!(visited.contains(&"a".to_string()));
		assert!(visited.contains(&"a/b.txt".to_string()));

		tree.visit(|node| {
			assert!(!node.is_dirty(), "{} still dirty", node.path());
			assert!(!node.has_dirty_descendant(), "{} still flagged", node.path());
		});
	}

	#[test]
	fn test_visit_dirty_parents_before_children() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("a", 1)).unwrap();
		tree.add_local(Update::directory("a/b", 1)).unwrap();
		tree.add_local(Update::file("a/b/c.txt", 1)).unwrap();
		let mut visited = Vec::new();
		tree.visit_dirty(|node, _| visited.push(node.path().to_string()));
		let pos =
			|p: &str| visited.iter().position(|v| v == p).unwrap_or(usize::MAX);
		assert!(pos("a") < pos("a/b"));
		assert!(pos("a/b") < pos("a/b/c.txt"));
	}

	#[test]
	fn test_newer_predicates() {
		let mut tree = bare_tree();
		tree.add_local(Update::file("f", 100)).unwrap();
		assert!(tree.get("f").unwrap().is_local_newer());
		assert!(!tree.get("f").unwrap().is_remote_newer());

		tree.add_remote(Update::file("f", 200)).unwrap();
		assert!(tree.get("f").unwrap().is_remote_newer());
		assert!(!tree.get("f").unwrap().is_local_newer());

		// Equal mod times yield neither
		tree.add_local(Update::file("f", 200)).unwrap();
		assert!(!tree.get("f").unwrap().is_local_newer());
		assert!(!tree.get("f").unwrap().is_remote_newer());
	}

	#[test]
	fn test_gitignore_rules_gate_sibling() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("d", 1)).unwrap();
		tree.add_local(
			Update::file("d/.gitignore", 1).with_ignore_string("secret.txt\n"),
		)
		.unwrap();
		tree.add_local(Update::file("d/secret.txt", 100)).unwrap();

		assert!(tree.should_ignore("d/secret.txt"));
		assert!(!tree.should_ignore("d/other.txt"));
		// The ignore file itself is synchronized
		assert!(!tree.should_ignore("d/.gitignore"));
	}

	#[test]
	fn test_gitignore_update_invalidates_cache() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("d", 1)).unwrap();
		tree.add_local(Update::file("d/a.txt", 1)).unwrap();
		assert!(!tree.should_ignore("d/a.txt"));

		tree.add_local(Update::file("d/.gitignore", 2).with_ignore_string("a.txt\n"))
			.unwrap();
		assert!(tree.should_ignore("d/a.txt"));

		// Newer remote .gitignore overrides the local one
		tree.add_remote(Update::file("d/.gitignore", 9).with_ignore_string("b.txt\n"))
			.unwrap();
		assert!(!tree.should_ignore("d/a.txt"));
		assert!(tree.should_ignore("d/b.txt"));
	}

	#[test]
	fn test_default_rules_exclude_and_reinclude() {
		let mut tree = UpdateTree::new();
		assert!(tree.should_ignore("target"));
		assert!(tree.should_ignore("sub/build"));
		assert!(tree.should_ignore(".envrc"));
		assert!(tree.should_ignore("notes___jb_bak___"));
		// Re-included project metadata
		assert!(!tree.should_ignore(".gitignore"));
		assert!(!tree.should_ignore("proj.iml"));
	}

	#[test]
	fn test_extra_include_overrides_gitignore() {
		let mut tree = UpdateTree::new();
		tree.add_local(Update::file(".gitignore", 1).with_ignore_string("*.iml\n"))
			.unwrap();
		tree.add_local(Update::file("foo.iml", 50)).unwrap();
		assert!(!tree.should_ignore("foo.iml"));
	}

	#[test]
	fn test_anchored_rule_applies_per_level() {
		let mut tree = bare_tree();
		tree.add_local(Update::directory("sub", 1)).unwrap();
		tree.add_local(
			Update::file("sub/.gitignore", 1).with_ignore_string("/top.txt\n"),
		)
		.unwrap();
		// Anchored to the rule's own directory, not the tree root
		assert!(tree.should_ignore("sub/top.txt"));
		assert!(!tree.should_ignore("sub/deeper/top.txt"));
	}
}

// vim: ts=4
