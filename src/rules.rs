//! Compiled `.gitignore`-style rule sets
//!
//! Uses the `ignore` crate (same matcher as ripgrep) so the full pattern
//! syntax is supported: `!` re-includes, leading-`/` anchoring, trailing-`/`
//! directory restriction, `*` within a component, `**` across components.
//! Later patterns override earlier ones, as in git.

use crate::logging::*;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// A compiled, replaceable set of ignore patterns.
///
/// Rules are always matched against paths relative to the directory the
/// rule set was sourced from; callers are responsible for stripping that
/// prefix before querying.
pub struct PathRules {
	lines: Vec<String>,
	matcher: Gitignore,
}

impl PathRules {
	/// An empty rule set that ignores nothing.
	pub fn empty() -> Self {
		PathRules { lines: Vec::new(), matcher: Gitignore::empty() }
	}

	/// Compile a rule set from newline-delimited `.gitignore` text.
	pub fn new(text: &str) -> Self {
		let mut rules = Self::empty();
		rules.set_rules(text);
		rules
	}

	/// Compile a rule set from individual pattern lines.
	pub fn from_lines<S: AsRef<str>>(patterns: &[S]) -> Self {
		let mut rules = Self::empty();
		rules.set_rule_list(patterns);
		rules
	}

	/// Replace the pattern set from newline-delimited text.
	///
	/// Safe to call repeatedly; each call discards the previous patterns.
	pub fn set_rules(&mut self, text: &str) {
		let lines: Vec<&str> = text.lines().collect();
		self.set_rule_list(&lines);
	}

	/// Replace the pattern set from a list of patterns.
	pub fn set_rule_list<S: AsRef<str>>(&mut self, patterns: &[S]) {
		self.lines.clear();
		let mut builder = GitignoreBuilder::new("");
		for pattern in patterns {
			let line = pattern.as_ref().trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			// A bad pattern is dropped, the rest stay in effect
			match builder.add_line(None, line) {
				Ok(_) => self.lines.push(line.to_string()),
				Err(e) => warn!("Dropping unparsable ignore pattern {:?}: {}", line, e),
			}
		}
		self.matcher = match builder.build() {
			Ok(matcher) => matcher,
			Err(e) => {
				warn!("Failed to compile ignore rules: {}", e);
				Gitignore::empty()
			}
		};
	}

	/// Whether `rel_path` is excluded by this rule set.
	///
	/// `rel_path` must be relative to the rule set's source directory. A
	/// path is also excluded when any of its parent directories matches,
	/// mirroring git's treatment of ignored directories.
	pub fn should_ignore(&self, rel_path: &str, is_dir: bool) -> bool {
		if rel_path.is_empty() {
			return false;
		}
		self.matcher.matched_path_or_any_parents(rel_path, is_dir).is_ignore()
	}

	/// Number of active (successfully compiled) patterns.
	pub fn len(&self) -> usize {
		self.lines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}
}

impl std::fmt::Debug for PathRules {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PathRules").field("lines", &self.lines).finish()
	}
}


// vim: ts=4
