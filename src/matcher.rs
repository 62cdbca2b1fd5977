//! Route table: endpoints in registration order, first match wins.

use crate::config::{split_segments, Endpoint, PathSegment};
use crate::error::RouteError;
use std::collections::HashSet;
use std::fmt;

/// Registration index of an endpoint in the route table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchCode(pub usize);

impl fmt::Display for MatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An incoming resource locator split into its path segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    segments: Vec<String>,
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: split_segments(raw).into_iter().map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment(&self, idx: usize) -> Option<&str> {
        self.segments.get(idx).map(String::as_str)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    paths: HashSet<String>,
    patterns: Vec<Vec<PathSegment>>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint. The path is checked against every path registered so far
    /// before a code is handed out.
    pub fn register(&mut self, endpoint: &Endpoint) -> Result<MatchCode, RouteError> {
        let path = Endpoint::canonical_path(&endpoint.path);
        if path.is_empty() {
            return Err(RouteError::EmptyPath(endpoint.name.clone()));
        }
        if self.paths.contains(&path) {
            return Err(RouteError::DuplicatePath(path));
        }
        let code = MatchCode(self.patterns.len());
        self.patterns.push(endpoint.segments.clone());
        self.paths.insert(path);
        Ok(code)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            patterns: self.patterns,
        }
    }
}

/// Immutable route table.
#[derive(Clone, Debug)]
pub struct RouteTable {
    patterns: Vec<Vec<PathSegment>>,
}

impl RouteTable {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn match_locator(&self, locator: &Locator) -> Result<MatchCode, RouteError> {
        let segs = locator.segments();
        self.patterns
            .iter()
            .position(|p| {
                p.len() == segs.len() && p.iter().zip(segs).all(|(pat, seg)| pat.accepts(seg))
            })
            .map(MatchCode)
            .ok_or_else(|| RouteError::Unknown(locator.as_str().to_string()))
    }
}
