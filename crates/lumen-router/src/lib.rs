//! # lumen-router
//!
//! An immutable path router generic over the entries it indexes.
//!
//! The same router type backs page routes, error catchers and server
//! actions. Entries expose their pattern through [`Routable`]; the router
//! parses every pattern once, rejects duplicates, and orders entries by
//! specificity so that lookup returns the most specific match regardless of
//! registration order.
//!
//! ```
//! use lumen_router::{Routable, Router};
//!
//! struct Page(&'static str);
//!
//! impl Routable for Page {
//!     fn pattern(&self) -> &str {
//!         self.0
//!     }
//! }
//!
//! let router = Router::new(vec![Page("/todos/:id"), Page("/todos/new")]).unwrap();
//!
//! let hit = router.match_path("/todos/new").unwrap();
//! assert_eq!(hit.entry.0, "/todos/new");
//!
//! let hit = router.match_path("/todos/42").unwrap();
//! assert_eq!(hit.params.get_str("id"), Some("42"));
//! ```

mod error;
mod params;
mod pattern;
pub mod path;

pub use error::RouterError;
pub use params::{ParamValue, Params};
pub use pattern::{classify_segment, Pattern, Segment};

use path::{normalize_path, PathHierarchy};

/// Something that can be registered in a [`Router`].
pub trait Routable {
    fn pattern(&self) -> &str;
}

/// A successful lookup.
#[derive(Debug)]
pub struct Match<'a, T> {
    pub entry: &'a T,
    pub params: Params,
}

#[derive(Debug)]
struct Slot<T> {
    pattern: Pattern,
    entry: T,
}

/// Immutable index over `T` entries keyed by path pattern.
#[derive(Debug)]
pub struct Router<T> {
    slots: Vec<Slot<T>>,
    case_insensitive: bool,
}

impl<T: Routable> Router<T> {
    /// Builds a case-sensitive router.
    pub fn new(entries: impl IntoIterator<Item = T>) -> Result<Self, RouterError> {
        Self::build(entries, false)
    }

    /// Builds a router, optionally comparing static segments without regard
    /// to ASCII case.
    ///
    /// Fails on the first malformed pattern or on two entries whose patterns
    /// match exactly the same set of paths.
    pub fn build(
        entries: impl IntoIterator<Item = T>,
        case_insensitive: bool,
    ) -> Result<Self, RouterError> {
        let mut slots: Vec<Slot<T>> = Vec::new();
        let mut shapes: Vec<(String, String)> = Vec::new();

        for entry in entries {
            let pattern = Pattern::parse(entry.pattern())?;
            let shape = pattern.shape(case_insensitive);
            if let Some((_, existing)) = shapes.iter().find(|(s, _)| *s == shape) {
                return Err(RouterError::DuplicatePattern {
                    pattern: pattern.as_str().to_string(),
                    existing: existing.clone(),
                });
            }
            shapes.push((shape, pattern.as_str().to_string()));
            slots.push(Slot { pattern, entry });
        }

        slots.sort_by(|a, b| a.pattern.specificity(&b.pattern));

        Ok(Self {
            slots,
            case_insensitive,
        })
    }
}

impl<T> Router<T> {
    /// Finds the most specific entry matching `pathname`.
    ///
    /// The path is normalized first, so `/todos/` and `/todos` are the same
    /// lookup.
    pub fn match_path(&self, pathname: &str) -> Option<Match<'_, T>> {
        let pathname = normalize_path(pathname);
        self.slots.iter().find_map(|slot| {
            slot.pattern
                .matches(&pathname, self.case_insensitive)
                .map(|params| Match {
                    entry: &slot.entry,
                    params,
                })
        })
    }

    /// Like [`match_path`](Self::match_path), but retries with each parent
    /// path until something matches.
    pub fn match_nearest(&self, pathname: &str) -> Option<Match<'_, T>> {
        let pathname = normalize_path(pathname);
        PathHierarchy::new(&pathname).find_map(|candidate| self.match_path(candidate))
    }

    /// Entries in lookup order, most specific first.
    pub fn entries(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(|slot| &slot.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Routable for String {
    fn pattern(&self) -> &str {
        self
    }
}

impl Routable for &str {
    fn pattern(&self) -> &str {
        self
    }
}
