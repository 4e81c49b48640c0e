//! Pattern parsing, ranking and segment matching.
//!
//! Syntax, one token per `/`-separated segment:
//!
//! | Segment  | Kind               | Matches                    |
//! |----------|--------------------|----------------------------|
//! | `todos`  | static             | exactly `todos`            |
//! | `:id`    | required           | one segment                |
//! | `:id?`   | optional           | zero or one segment        |
//! | `*rest`  | catch-all          | one or more trailing segs  |
//! | `*rest?` | optional catch-all | zero or more trailing segs |

use std::cmp::Ordering;

use crate::params::{ParamValue, Params};
use crate::path;
use crate::RouterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Required(String),
    Optional(String),
    CatchAll(String),
    OptionalCatchAll(String),
}

impl Segment {
    /// Rank used for specificity ordering; lower is more specific.
    fn rank(&self) -> u8 {
        match self {
            Segment::Static(_) => 0,
            Segment::Required(_) => 1,
            Segment::Optional(_) => 2,
            Segment::CatchAll(_) => 3,
            Segment::OptionalCatchAll(_) => 4,
        }
    }

    fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Required(name)
            | Segment::Optional(name)
            | Segment::CatchAll(name)
            | Segment::OptionalCatchAll(name) => Some(name),
        }
    }

    fn is_catch_all(&self) -> bool {
        matches!(self, Segment::CatchAll(_) | Segment::OptionalCatchAll(_))
    }
}

/// Classifies a single pattern segment.
pub fn classify_segment(segment: &str) -> Segment {
    if let Some(name) = segment.strip_prefix('*') {
        return match name.strip_suffix('?') {
            Some(name) => Segment::OptionalCatchAll(name.to_string()),
            None => Segment::CatchAll(name.to_string()),
        };
    }
    match segment.strip_prefix(':') {
        Some(name) => match name.strip_suffix('?') {
            Some(name) => Segment::Optional(name.to_string()),
            None => Segment::Required(name.to_string()),
        },
        None => Segment::Static(segment.to_string()),
    }
}

/// A parsed, validated path pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    rank: Vec<u8>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, RouterError> {
        if !source.starts_with('/') {
            return Err(RouterError::invalid(source, "pattern must start with `/`"));
        }

        let segments: Vec<Segment> = path::segments(source)
            .into_iter()
            .map(classify_segment)
            .collect();

        let mut seen: Vec<&str> = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            let Some(name) = segment.param_name() else {
                continue;
            };
            if name.is_empty() {
                return Err(RouterError::invalid(source, "parameter name is empty"));
            }
            if seen.contains(&name) {
                return Err(RouterError::invalid(
                    source,
                    format!("parameter `{name}` appears twice"),
                ));
            }
            if segment.is_catch_all() && idx + 1 != segments.len() {
                return Err(RouterError::invalid(
                    source,
                    "catch-all must be the last segment",
                ));
            }
            seen.push(name);
        }

        let rank = segments.iter().map(Segment::rank).collect();
        Ok(Self {
            source: source.to_string(),
            segments,
            rank,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Orders patterns from most to least specific.
    ///
    /// Segment ranks are compared left to right; a pattern whose ranks are
    /// a prefix of another's sorts first.
    pub fn specificity(&self, other: &Pattern) -> Ordering {
        self.rank.cmp(&other.rank)
    }

    /// The pattern with parameter names erased. Two patterns with the same
    /// shape match exactly the same paths.
    pub fn shape(&self, case_insensitive: bool) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Static(lit) if case_insensitive => shape.push_str(&lit.to_lowercase()),
                Segment::Static(lit) => shape.push_str(lit),
                Segment::Required(_) => shape.push(':'),
                Segment::Optional(_) => shape.push_str(":?"),
                Segment::CatchAll(_) => shape.push('*'),
                Segment::OptionalCatchAll(_) => shape.push_str("*?"),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Matches a canonical path, returning the captured parameters.
    pub fn matches(&self, path: &str, case_insensitive: bool) -> Option<Params> {
        let parts = path::segments(path);
        match_segments(&self.segments, &parts, Params::new(), case_insensitive)
    }
}

fn match_segments(
    pattern: &[Segment],
    parts: &[&str],
    params: Params,
    case_insensitive: bool,
) -> Option<Params> {
    let Some((segment, rest)) = pattern.split_first() else {
        return parts.is_empty().then_some(params);
    };

    match segment {
        Segment::Static(lit) => {
            let (head, tail) = parts.split_first()?;
            let same = if case_insensitive {
                lit.eq_ignore_ascii_case(head)
            } else {
                lit == head
            };
            if !same {
                return None;
            }
            match_segments(rest, tail, params, case_insensitive)
        }
        Segment::Required(name) => {
            let (head, tail) = parts.split_first()?;
            let params = params.with(name, ParamValue::One(decode(head)));
            match_segments(rest, tail, params, case_insensitive)
        }
        Segment::Optional(name) => {
            if let Some((head, tail)) = parts.split_first() {
                let taken = params.clone().with(name, ParamValue::One(decode(head)));
                if let Some(found) = match_segments(rest, tail, taken, case_insensitive) {
                    return Some(found);
                }
            }
            match_segments(rest, parts, params, case_insensitive)
        }
        Segment::CatchAll(name) => {
            if parts.is_empty() {
                return None;
            }
            Some(params.with(name, ParamValue::Many(parts.iter().map(|p| decode(p)).collect())))
        }
        Segment::OptionalCatchAll(name) => {
            Some(params.with(name, ParamValue::Many(parts.iter().map(|p| decode(p)).collect())))
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
