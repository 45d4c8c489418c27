// src/depset/mod.rs

//! Conditional dependency expressions
//!
//! A [`DepSet`] is a tree of leaves (usually [`Atom`]s) combined by
//! all-of groups, any-of groups (`|| ( ... )`) and use-flag conditionals
//! (`flag? ( ... )`, `!flag? ( ... )`). The same structure carries license
//! and restriction strings, so the leaf type is generic.
//!
//! Tree walks use explicit stacks rather than recursion; generated metadata
//! can contain thousands of sibling conditionals.

mod parser;

pub use parser::ParseOptions;

use crate::atom::{Atom, Matchable};
use crate::error::Result;
use crate::package::Package;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::OnceLock;

/// One node of a dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepNode<T> {
    Leaf(T),
    /// Every child is required
    All(Vec<DepNode<T>>),
    /// At least one child is required
    AnyOf(Vec<DepNode<T>>),
    /// Payload applies only when the flag state matches
    Conditional {
        flag: String,
        negate: bool,
        payload: Vec<DepNode<T>>,
    },
}

impl<T> DepNode<T> {
    fn children(&self) -> &[DepNode<T>] {
        match self {
            DepNode::Leaf(_) => &[],
            DepNode::All(children) | DepNode::AnyOf(children) => children,
            DepNode::Conditional { payload, .. } => payload,
        }
    }
}

/// A parsed dependency expression; top-level nodes are ANDed
#[derive(Debug, Clone)]
pub struct DepSet<T> {
    nodes: Vec<DepNode<T>>,
    known: OnceLock<BTreeSet<String>>,
}

impl<T> Default for DepSet<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            known: OnceLock::new(),
        }
    }
}

impl<T: PartialEq> PartialEq for DepSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<T: Eq> Eq for DepSet<T> {}

/// What to do when an evaluated group closes
#[derive(Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    All,
    AnyOf,
}

enum Task<'a, T> {
    Visit(&'a DepNode<T>),
    Close(GroupKind),
}

impl<T> DepSet<T> {
    /// Parse with a caller-supplied leaf factory
    pub fn parse_with<F>(text: &str, element: F, options: &ParseOptions) -> Result<Self>
    where
        F: FnMut(&str) -> Result<T>,
    {
        Ok(Self::from_nodes(parser::parse_nodes(text, element, options)?))
    }

    pub fn from_nodes(nodes: Vec<DepNode<T>>) -> Self {
        Self {
            nodes,
            known: OnceLock::new(),
        }
    }

    pub fn nodes(&self) -> &[DepNode<T>] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first iteration over every leaf, guards ignored
    pub fn iter_leaves(&self) -> impl Iterator<Item = &T> {
        let mut stack: Vec<&DepNode<T>> = self.nodes.iter().rev().collect();
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                if let DepNode::Leaf(leaf) = node {
                    return Some(leaf);
                }
                stack.extend(node.children().iter().rev());
            }
            None
        })
    }

    /// Every flag used as a guard anywhere in the tree; computed once
    pub fn known_conditionals(&self) -> &BTreeSet<String> {
        self.known.get_or_init(|| {
            let mut flags = BTreeSet::new();
            let mut stack: Vec<&DepNode<T>> = self.nodes.iter().collect();
            while let Some(node) = stack.pop() {
                if let DepNode::Conditional { flag, .. } = node {
                    flags.insert(flag.clone());
                }
                stack.extend(node.children());
            }
            flags
        })
    }

    pub fn has_conditionals(&self) -> bool {
        !self.known_conditionals().is_empty()
    }
}

impl<T: Clone> DepSet<T> {
    /// Drop every conditional whose guard fails and splice in the rest
    pub fn evaluate(&self, flags: &HashSet<String>) -> DepSet<T> {
        self.evaluate_tristate(flags, None)
    }

    /// Evaluate with an optional tristate filter
    ///
    /// For guards on flags inside `tristate`, the payload is skipped when
    /// `(flag ∈ flags) == negate` and forced in otherwise. Guards on other
    /// flags are tested against `flags` directly. Both rules decide a
    /// single-flag guard the same way, so the result always equals
    /// [`evaluate`](Self::evaluate) with the same `flags`; the filter never
    /// widens or narrows what survives.
    pub fn evaluate_tristate(
        &self,
        flags: &HashSet<String>,
        tristate: Option<&HashSet<String>>,
    ) -> DepSet<T> {
        if !self.has_conditionals() {
            return self.clone();
        }

        // (kind, collected children) per open group; the bottom entry is the root
        let mut out: Vec<(GroupKind, Vec<DepNode<T>>)> = vec![(GroupKind::All, Vec::new())];
        let mut work: Vec<Task<'_, T>> = self.nodes.iter().rev().map(Task::Visit).collect();

        while let Some(task) = work.pop() {
            match task {
                Task::Visit(DepNode::Leaf(leaf)) => {
                    if let Some((_, children)) = out.last_mut() {
                        children.push(DepNode::Leaf(leaf.clone()));
                    }
                }
                Task::Visit(DepNode::All(children)) => {
                    open_group(&mut out, &mut work, GroupKind::All, children);
                }
                Task::Visit(DepNode::AnyOf(children)) => {
                    open_group(&mut out, &mut work, GroupKind::AnyOf, children);
                }
                Task::Visit(DepNode::Conditional {
                    flag,
                    negate,
                    payload,
                }) => {
                    let enabled = flags.contains(flag);
                    let include = match tristate {
                        Some(filter) if filter.contains(flag) => enabled != *negate,
                        _ => {
                            if *negate {
                                !enabled
                            } else {
                                enabled
                            }
                        }
                    };
                    if include {
                        open_group(&mut out, &mut work, GroupKind::All, payload);
                    }
                }
                Task::Close(kind) => {
                    let Some((_, children)) = out.pop() else {
                        continue;
                    };
                    let Some((parent_kind, parent)) = out.last_mut() else {
                        continue;
                    };
                    collapse_into(*parent_kind, parent, kind, children);
                }
            }
        }

        let nodes = out.pop().map(|(_, children)| children).unwrap_or_default();
        Self::from_nodes(nodes)
    }

    /// Expand into alternative leaf combinations
    ///
    /// Each inner vector is one way to satisfy the whole expression. Guards
    /// still present are treated as satisfied; evaluate first to apply a
    /// flag configuration.
    pub fn dnf_solutions(&self) -> Vec<Vec<T>> {
        let mut solutions: Vec<Vec<T>> = vec![Vec::new()];
        for node in &self.nodes {
            solutions = product(&solutions, &node_solutions(node));
        }
        solutions
    }
}

fn open_group<'a, T>(
    out: &mut Vec<(GroupKind, Vec<DepNode<T>>)>,
    work: &mut Vec<Task<'a, T>>,
    kind: GroupKind,
    children: &'a [DepNode<T>],
) {
    out.push((kind, Vec::new()));
    work.push(Task::Close(kind));
    work.extend(children.iter().rev().map(Task::Visit));
}

/// Attach an evaluated group to its parent, dropping or flattening it
fn collapse_into<T>(
    parent_kind: GroupKind,
    parent: &mut Vec<DepNode<T>>,
    kind: GroupKind,
    mut children: Vec<DepNode<T>>,
) {
    match (children.len(), kind) {
        (0, _) => {}
        (1, _) => {
            // a one-child group of either kind means exactly its child
            if let Some(child) = children.pop() {
                match (parent_kind, child) {
                    (GroupKind::All, DepNode::All(inner)) => parent.extend(inner),
                    (_, child) => parent.push(child),
                }
            }
        }
        (_, GroupKind::All) if parent_kind == GroupKind::All => parent.extend(children),
        (_, GroupKind::All) => parent.push(DepNode::All(children)),
        (_, GroupKind::AnyOf) => parent.push(DepNode::AnyOf(children)),
    }
}

fn node_solutions<T: Clone>(node: &DepNode<T>) -> Vec<Vec<T>> {
    match node {
        DepNode::Leaf(leaf) => vec![vec![leaf.clone()]],
        DepNode::All(children) | DepNode::Conditional { payload: children, .. } => children
            .iter()
            .fold(vec![Vec::new()], |acc, child| product(&acc, &node_solutions(child))),
        DepNode::AnyOf(children) => children.iter().flat_map(node_solutions).collect(),
    }
}

fn product<T: Clone>(left: &[Vec<T>], right: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut combined = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            let mut solution = l.clone();
            solution.extend(r.iter().cloned());
            combined.push(solution);
        }
    }
    combined
}

impl DepSet<Atom> {
    /// Parse a dependency string of atoms with the default options
    pub fn parse_atoms(text: &str) -> Result<Self> {
        Self::parse_with(text, Atom::parse, &ParseOptions::default())
    }

    /// Whether any leaf atom matches the package
    pub fn any_match(&self, pkg: &Package) -> bool {
        self.iter_leaves().any(|atom| atom.matches(pkg))
    }

    /// Whether every leaf atom matches the package
    pub fn all_match(&self, pkg: &Package) -> bool {
        self.iter_leaves().all(|atom| atom.matches(pkg))
    }
}

impl DepSet<String> {
    /// Parse plain string leaves (licenses, restrict tokens)
    pub fn parse_strings(text: &str) -> Result<Self> {
        Self::parse_with(text, |s| Ok(s.to_string()), &ParseOptions::default())
    }
}

impl<T: fmt::Display> fmt::Display for DepNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, children) = match self {
            DepNode::Leaf(leaf) => return write!(f, "{}", leaf),
            DepNode::All(children) => (String::new(), children),
            DepNode::AnyOf(children) => ("|| ".to_string(), children),
            DepNode::Conditional {
                flag,
                negate,
                payload,
            } => (
                format!("{}{}? ", if *negate { "!" } else { "" }, flag),
                payload,
            ),
        };
        write!(f, "{}(", prefix)?;
        for child in children {
            write!(f, " {}", child)?;
        }
        write!(f, " )")
    }
}

impl<T: fmt::Display> fmt::Display for DepSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(text: &str) -> DepSet<String> {
        DepSet::parse_strings(text).unwrap()
    }

    fn flags(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flat() {
        let d = strings("a b c");
        assert_eq!(d.nodes().len(), 3);
        assert!(!d.has_conditionals());
        assert_eq!(d.to_string(), "a b c");
    }

    #[test]
    fn test_parse_nested_groups() {
        let d = strings("a ( b c ) || ( d ( e f ) ) x? ( !y? ( g ) )");
        assert_eq!(d.to_string(), "a b c || ( d ( e f ) ) x? ( !y? ( g ) )");
        let known: Vec<&String> = d.known_conditionals().iter().collect();
        assert_eq!(known, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_single_child_group_collapses() {
        let d = strings("|| ( ( a ) b )");
        assert_eq!(d.to_string(), "|| ( a b )");
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "( )",
            "a ( b",
            "a )",
            "|| a",
            "x? a",
            "x?",
            "||",
            "?( a )",
            "a(b)",
            "x? ( )",
        ] {
            assert!(DepSet::parse_strings(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_parse_conditionals_disabled() {
        let opts = ParseOptions {
            allow_conditionals: false,
            ..ParseOptions::default()
        };
        assert!(DepSet::parse_with("x? ( a )", |s| Ok(s.to_string()), &opts).is_err());
    }

    #[test]
    fn test_parse_custom_operator() {
        let opts = ParseOptions {
            or_operators: vec!["||".to_string(), "^^".to_string()],
            ..ParseOptions::default()
        };
        let d = DepSet::parse_with("^^ ( a b )", |s| Ok(s.to_string()), &opts).unwrap();
        assert!(matches!(d.nodes()[0], DepNode::AnyOf(_)));
    }

    #[test]
    fn test_parse_atom_leaf_error_carries_token() {
        let err = DepSet::parse_atoms("app/foo >=broken").unwrap_err();
        assert!(err.to_string().contains(">=broken"));
    }

    #[test]
    fn test_evaluate_drops_failed_guards() {
        let d = strings("a x? ( b ) !x? ( c ) y? ( d || ( e f ) )");
        assert_eq!(d.evaluate(&flags(&["x"])).to_string(), "a b");
        assert_eq!(d.evaluate(&flags(&[])).to_string(), "a c");
        assert_eq!(
            d.evaluate(&flags(&["y"])).to_string(),
            "a c d || ( e f )"
        );
    }

    #[test]
    fn test_evaluate_collapses_or_groups() {
        let d = strings("|| ( x? ( a ) y? ( b ) )");
        assert_eq!(d.evaluate(&flags(&["x"])).to_string(), "a");
        assert!(d.evaluate(&flags(&[])).is_empty());
        assert_eq!(
            d.evaluate(&flags(&["x", "y"])).to_string(),
            "|| ( a b )"
        );

        // an any-of alternative that is itself a group stays grouped
        let nested = strings("|| ( x? ( a b ) c )");
        assert_eq!(
            nested.evaluate(&flags(&["x"])).to_string(),
            "|| ( ( a b ) c )"
        );
    }

    #[test]
    fn test_evaluate_idempotent() {
        let d = strings("a x? ( b || ( c y? ( d ) ) ) !z? ( e )");
        let f = flags(&["x", "y"]);
        let once = d.evaluate(&f);
        assert_eq!(once, d.evaluate(&f));
        assert_eq!(once.evaluate(&f), once);
        assert!(!once.has_conditionals());
    }

    #[test]
    fn test_evaluate_without_conditionals_is_clone() {
        let d = strings("a || ( b c )");
        assert_eq!(d.evaluate(&flags(&["x"])), d);
    }

    #[test]
    fn test_evaluate_tristate() {
        let d = strings("x? ( a ) !x? ( b ) y? ( c ) !y? ( d || ( e f ) )");
        let tristate = flags(&["x"]);
        let result = d.evaluate_tristate(&flags(&["x", "y"]), Some(&tristate));
        assert_eq!(result.to_string(), "a c");
        let result = d.evaluate_tristate(&flags(&[]), Some(&tristate));
        assert_eq!(result.to_string(), "b d || ( e f )");
    }

    #[test]
    fn test_evaluate_tristate_matches_plain_evaluation() {
        let d = strings("x? ( a ) !x? ( b ) y? ( c !x? ( d ) ) || ( x? ( e ) f )");
        let universe = ["x", "y"];
        let subsets: Vec<HashSet<String>> = (0..4u8)
            .map(|bits| {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| bits & (1 << i) != 0)
                    .map(|(_, f)| f.to_string())
                    .collect()
            })
            .collect();

        for enabled in &subsets {
            let plain = d.evaluate(enabled);
            assert_eq!(d.evaluate_tristate(enabled, None), plain);
            for filter in &subsets {
                assert_eq!(
                    d.evaluate_tristate(enabled, Some(filter)),
                    plain,
                    "enabled {:?} filter {:?}",
                    enabled,
                    filter
                );
            }
        }
    }

    #[test]
    fn test_evaluate_deep_nesting() {
        let mut text = String::new();
        for i in 0..2000 {
            text.push_str(&format!("f{}? ( ", i));
        }
        text.push_str("leaf");
        for _ in 0..2000 {
            text.push_str(" )");
        }
        let d = strings(&text);
        assert_eq!(d.known_conditionals().len(), 2000);
        let all: HashSet<String> = (0..2000).map(|i| format!("f{}", i)).collect();
        assert_eq!(d.evaluate(&all).to_string(), "leaf");
        assert!(d.evaluate(&flags(&[])).is_empty());
    }

    #[test]
    fn test_dnf_solutions() {
        let d = strings("a || ( b c ) || ( d ( e f ) )");
        let solutions = d.dnf_solutions();
        assert_eq!(solutions.len(), 4);
        assert!(solutions.contains(&vec!["a".into(), "b".into(), "d".into()]));
        assert!(solutions.contains(&vec![
            "a".to_string(),
            "c".to_string(),
            "e".to_string(),
            "f".to_string()
        ]));
        assert_eq!(DepSet::<String>::default().dnf_solutions(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_iter_leaves_order() {
        let d = strings("a x? ( b ) || ( c d )");
        let leaves: Vec<&String> = d.iter_leaves().collect();
        assert_eq!(leaves, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_atom_depset_matching() {
        let d = DepSet::parse_atoms("app-misc/foo || ( >=app-misc/foo-2 app-misc/bar )").unwrap();
        let pkg = Package::new("app-misc/foo-1.0").unwrap();
        assert!(d.any_match(&pkg));
        assert!(!d.all_match(&pkg));
    }
}
