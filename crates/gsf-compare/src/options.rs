//! Comparison options: include/exclude, expected differences, PSNR.

use std::collections::HashSet;
use std::fmt;

/// Comparison operators for expected-difference and PSNR options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn eval<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            Op::Eq => lhs == rhs,
            Op::Ne => lhs != rhs,
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An `a - b OP value` requirement on a numeric or timestamp path.
#[derive(Debug, Clone)]
pub struct ExpectedDifference {
    pub path: String,
    pub op: Op,
    /// Difference value; nanoseconds for timestamp paths.
    pub value: i128,
}

/// A per-component PSNR requirement on a data path.
#[derive(Debug, Clone)]
pub struct PsnrRequirement {
    pub path: String,
    pub op: Op,
    /// Decibel thresholds, one per component or channel. Components
    /// beyond the end of the list are unconstrained.
    pub thresholds: Vec<f64>,
}

/// The option set refining a comparison walk.
///
/// Paths name attributes by their dot-separated trail, e.g.
/// `"origin_timestamp"`, `"data"`, `"components[1].stride"`.
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    included: HashSet<String>,
    excluded: HashSet<String>,
    expected: Vec<ExpectedDifference>,
    psnr: Vec<PsnrRequirement>,
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes a path that would otherwise be excluded by default.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.included.insert(path.into());
        self
    }

    /// Excludes a path from the verdict. Beats `include` on the same path.
    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.excluded.insert(path.into());
        self
    }

    /// Requires `a.path - b.path OP value` instead of equality.
    pub fn expected_difference(mut self, path: impl Into<String>, op: Op, value: i128) -> Self {
        self.expected.push(ExpectedDifference {
            path: path.into(),
            op,
            value,
        });
        self
    }

    /// Replaces byte comparison of a data region with a PSNR measurement.
    pub fn psnr(mut self, path: impl Into<String>, op: Op, thresholds: Vec<f64>) -> Self {
        self.psnr.push(PsnrRequirement {
            path: path.into(),
            op,
            thresholds,
        });
        self
    }

    /// Shorthand for excluding the data region.
    pub fn compare_only_metadata(self) -> Self {
        self.exclude("data")
    }

    /// Whether a path is excluded from the verdict. The creation
    /// timestamp is excluded unless explicitly included; an explicit
    /// exclude always wins.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.excluded.contains(path) {
            return true;
        }
        path == "creation_timestamp" && !self.included.contains(path)
    }

    /// Expected-difference requirements registered for a path.
    pub fn expected_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ExpectedDifference> {
        self.expected.iter().filter(move |e| e.path == path)
    }

    /// The PSNR requirement registered for a path, if any.
    pub fn psnr_for(&self, path: &str) -> Option<&PsnrRequirement> {
        self.psnr.iter().find(|p| p.path == path)
    }
}
