//! Read-only access to board and scenario documents.
//!
//! The generator only ever needs to look things up by path in a hierarchical
//! document. That capability is the [`TreeNode`] trait: implementors expose
//! name, text, attributes and children, and get the path queries for free.
//!
//! ## Path syntax
//!
//! ```text
//! name/child        child steps, relative to the node
//! .//name, //name   first step searches all descendants
//! a//b              `b` anywhere below `a`
//! *                 any element
//! ```
//!
//! [`Element`] is the owned implementation built from XML text.

mod element;

pub use element::Element;

/// Path-query capability over a hierarchical document.
pub trait TreeNode: Sized {
    /// Element name.
    fn name(&self) -> &str;

    /// Trimmed text content, `None` when empty.
    fn text(&self) -> Option<&str>;

    fn attribute(&self, name: &str) -> Option<&str>;

    fn children(&self) -> impl Iterator<Item = &Self>;

    /// All elements below this one, in document order.
    fn descendants(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Every element matching `path`, in document order.
    fn find_all(&self, path: &str) -> Vec<&Self> {
        select(self, path)
    }

    /// First element matching `path`.
    fn find(&self, path: &str) -> Option<&Self> {
        select(self, path).into_iter().next()
    }

    /// Text of the first match carrying non-empty text.
    fn find_text(&self, path: &str) -> Option<&str> {
        select(self, path).into_iter().find_map(|node| node.text())
    }

    /// Non-empty texts of all matches.
    fn find_texts(&self, path: &str) -> Vec<&str> {
        select(self, path)
            .into_iter()
            .filter_map(|node| node.text())
            .collect()
    }

    fn text_or<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.find_text(path).unwrap_or(default)
    }

    /// True when some match of `path` has exactly `value` as text.
    fn has_text(&self, path: &str, value: &str) -> bool {
        select(self, path)
            .into_iter()
            .any(|node| node.text() == Some(value))
    }

    /// Text of the first direct child named `name`.
    fn child_text(&self, name: &str) -> Option<&str> {
        self.children()
            .filter(|child| child.name() == name)
            .find_map(|child| child.text())
    }
}

fn collect_descendants<'a, N: TreeNode>(node: &'a N, out: &mut Vec<&'a N>) {
    for child in node.children() {
        out.push(child);
        collect_descendants(child, out);
    }
}

fn step_matches<N: TreeNode>(node: &N, step: &str) -> bool {
    step == "*" || node.name() == step
}

fn select<'a, N: TreeNode>(context: &'a N, path: &str) -> Vec<&'a N> {
    let path = match path.strip_prefix('.') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };

    let mut current: Vec<&'a N> = vec![context];
    let mut descend = false;

    for (index, step) in path.split('/').enumerate() {
        if step.is_empty() {
            // A leading separator anchors at the context; any other empty
            // step turns the next step into a descendant search.
            if index > 0 {
                descend = true;
            }
            continue;
        }

        let mut next: Vec<&'a N> = Vec::new();
        for &node in &current {
            let candidates: Vec<&'a N> = if descend {
                node.descendants()
            } else {
                node.children().collect()
            };
            for candidate in candidates {
                let seen = next.iter().any(|n| std::ptr::eq(*n, candidate));
                if !seen && step_matches(candidate, step) {
                    next.push(candidate);
                }
            }
        }

        current = next;
        descend = false;
        if current.is_empty() {
            break;
        }
    }

    current
}
