//! The diff tree produced by a comparison.

use std::fmt;

/// One node of a comparison result tree.
///
/// Every node carries a verdict. A group is satisfied iff every
/// non-excluded child is satisfied; excluded nodes render for diagnostics
/// but never affect the verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffNode {
    /// The two values matched under the active rule.
    Equal { path: String, rendered: String },
    /// The two values did not match. A missing side (`None`) marks a
    /// value that exists in one input only.
    Different {
        path: String,
        a: Option<String>,
        b: Option<String>,
        reason: String,
    },
    /// Excluded from the verdict, rendered for diagnostics.
    Excluded {
        path: String,
        a: String,
        b: String,
    },
    /// A composite: a whole grain, a list, or a nested struct.
    Group {
        path: String,
        reason: Option<String>,
        children: Vec<DiffNode>,
    },
}

impl DiffNode {
    pub fn path(&self) -> &str {
        match self {
            DiffNode::Equal { path, .. }
            | DiffNode::Different { path, .. }
            | DiffNode::Excluded { path, .. }
            | DiffNode::Group { path, .. } => path,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, DiffNode::Excluded { .. })
    }

    /// The node's verdict. Excluded nodes are vacuously satisfied.
    pub fn verdict(&self) -> bool {
        match self {
            DiffNode::Equal { .. } | DiffNode::Excluded { .. } => true,
            DiffNode::Different { .. } => false,
            DiffNode::Group { children, .. } => children
                .iter()
                .all(|c| c.is_excluded() || c.verdict()),
        }
    }

    pub fn children(&self) -> &[DiffNode] {
        match self {
            DiffNode::Group { children, .. } => children,
            _ => &[],
        }
    }

    /// Paths of all failing, non-excluded leaf nodes.
    pub fn failing_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_failing(&mut out);
        out
    }

    fn collect_failing(&self, out: &mut Vec<String>) {
        match self {
            DiffNode::Different { path, .. } => out.push(path.clone()),
            DiffNode::Group { children, .. } => {
                for child in children {
                    if !child.is_excluded() {
                        child.collect_failing(out);
                    }
                }
            }
            _ => {}
        }
    }

    /// Searches direct children for an attribute path.
    pub fn child(&self, path: &str) -> Option<&DiffNode> {
        self.children().iter().find(|c| c.path() == path)
    }

    fn line(&self) -> String {
        match self {
            DiffNode::Equal { path, rendered } => format!("{} == {}", path, rendered),
            DiffNode::Different {
                path,
                a: Some(a),
                b: Some(b),
                reason,
            } => format!("{}: a == {}, b == {} ({})", path, a, b, reason),
            DiffNode::Different {
                path,
                a: Some(a),
                b: None,
                reason,
            } => format!("{}: a == {} but b does not exist ({})", path, a, reason),
            DiffNode::Different {
                path,
                a: None,
                b: Some(b),
                reason,
            } => format!("{}: a does not exist, but b == {} ({})", path, b, reason),
            DiffNode::Different {
                path,
                a: None,
                b: None,
                reason,
            } => format!("{}: {}", path, reason),
            DiffNode::Excluded { path, a, b } => {
                format!("{} ignored (a == {}, b == {})", path, a, b)
            }
            DiffNode::Group { path, reason, .. } => match reason {
                Some(reason) => format!("{}: {}", path, reason),
                None => path.clone(),
            },
        }
    }

    fn glyph(&self) -> &'static str {
        if self.is_excluded() {
            "\u{25EF}"
        } else if self.verdict() {
            "\u{2705}"
        } else {
            "\u{274C}"
        }
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(self.glyph());
        out.push_str("   ");
        out.push_str(&self.line());
        out.push('\n');
        for child in self.children() {
            child.render_into(out, depth + 1);
        }
    }

    /// The whole tree, one line per node, indented by depth, with a
    /// verdict glyph per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }
}

impl fmt::Display for DiffNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render().trim_end())
    }
}
