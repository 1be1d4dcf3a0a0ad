use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A dotted address such as `debug.a.b`: the table segments to walk, then the
/// leaf name written or read inside the innermost table.
///
/// Splitting is on every literal `.`; there is no escaping, and adjacent dots
/// yield empty segments which are kept as-is. A path without any dot names a
/// bare global.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpression {
    segments: Vec<String>,
    leaf: String,
}

impl PathExpression {
    pub fn parse(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((head, leaf)) => Self {
                segments: head.split('.').map(ToString::to_string).collect(),
                leaf: leaf.to_string(),
            },
            None => Self {
                segments: Vec::new(),
                leaf: path.to_string(),
            },
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// True when the leaf lives directly in the global namespace.
    pub fn is_global(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PathExpression {
    type Err = Infallible;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(path))
    }
}

impl From<&str> for PathExpression {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{}.", segment)?;
        }
        f.write_str(&self.leaf)
    }
}
