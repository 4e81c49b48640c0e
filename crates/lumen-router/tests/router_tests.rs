//! Lookup behaviour of `Router<T>` across pattern kinds.

use lumen_router::{ParamValue, Routable, Router, RouterError};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[derive(Debug)]
struct Entry {
    id: &'static str,
    pattern: &'static str,
}

impl Routable for Entry {
    fn pattern(&self) -> &str {
        self.pattern
    }
}

fn router(patterns: &[(&'static str, &'static str)]) -> Router<Entry> {
    Router::new(patterns.iter().map(|&(id, pattern)| Entry { id, pattern })).unwrap()
}

fn matched_id(router: &Router<Entry>, path: &str) -> Option<&'static str> {
    router.match_path(path).map(|m| m.entry.id)
}

#[rstest]
#[case("/about", "/about", true)]
#[case("/about", "/about/team", false)]
#[case("/about", "/", false)]
#[case("/todos/:id", "/todos/1", true)]
#[case("/todos/:id", "/todos", false)]
#[case("/todos/:id", "/todos/1/edit", false)]
#[case("/a/:b/c", "/a/x/c", true)]
#[case("/a/:b/c", "/a/x", false)]
fn segment_count_must_agree_without_catch_all(
    #[case] pattern: &'static str,
    #[case] path: &str,
    #[case] expected: bool,
) {
    let router = router(&[("only", pattern)]);
    assert_eq!(router.match_path(path).is_some(), expected);
}

#[test]
fn static_beats_dynamic_regardless_of_registration_order() {
    let router = router(&[("dynamic", "/todos/:id"), ("static", "/todos/new")]);
    assert_eq!(matched_id(&router, "/todos/new"), Some("static"));
    assert_eq!(matched_id(&router, "/todos/7"), Some("dynamic"));
}

#[test]
fn dynamic_beats_catch_all() {
    let router = router(&[
        ("rest", "/docs/*path"),
        ("one", "/docs/:page"),
        ("index", "/docs"),
    ]);
    assert_eq!(matched_id(&router, "/docs/intro"), Some("one"));
    assert_eq!(matched_id(&router, "/docs/guide/setup"), Some("rest"));
    assert_eq!(matched_id(&router, "/docs"), Some("index"));
}

#[test]
fn required_beats_optional_for_the_same_path() {
    let router = router(&[("maybe", "/u/:id?"), ("must", "/u/:id")]);
    assert_eq!(matched_id(&router, "/u/3"), Some("must"));
    assert_eq!(matched_id(&router, "/u"), Some("maybe"));
}

#[test]
fn catch_all_captures_a_list() {
    let router = router(&[("docs", "/docs/*path")]);
    let hit = router.match_path("/docs/guide/setup").unwrap();
    assert_eq!(
        hit.params.get("path"),
        Some(&ParamValue::Many(vec!["guide".into(), "setup".into()]))
    );
    assert!(router.match_path("/docs").is_none());
}

#[test]
fn optional_catch_all_matches_zero_segments() {
    let router = router(&[("all", "/*rest?")]);
    let hit = router.match_path("/").unwrap();
    assert_eq!(hit.params.get_all("rest"), Some(&[][..]));
    let hit = router.match_path("/x/y").unwrap();
    assert_eq!(hit.params.get_all("rest").map(<[String]>::len), Some(2));
}

#[test]
fn trailing_slashes_are_ignored() {
    let router = router(&[("todos", "/todos")]);
    assert_eq!(matched_id(&router, "/todos/"), Some("todos"));
}

#[test]
fn identical_shapes_are_rejected() {
    let err = Router::new(vec![
        Entry { id: "a", pattern: "/users/:id" },
        Entry { id: "b", pattern: "/users/:name" },
    ])
    .unwrap_err();
    assert_eq!(
        err,
        RouterError::DuplicatePattern {
            pattern: "/users/:name".into(),
            existing: "/users/:id".into(),
        }
    );
}

#[test]
fn case_insensitive_router_folds_static_segments() {
    let entries = vec![Entry { id: "about", pattern: "/About" }];
    let router = Router::build(entries, true).unwrap();
    assert_eq!(matched_id(&router, "/about"), Some("about"));

    let strict = Router::new(vec![Entry { id: "about", pattern: "/About" }]).unwrap();
    assert_eq!(matched_id(&strict, "/about"), None);
}

#[test]
fn case_insensitive_duplicates_collide() {
    let entries = vec![
        Entry { id: "a", pattern: "/About" },
        Entry { id: "b", pattern: "/about" },
    ];
    assert!(Router::build(entries, true).is_err());
}

#[test]
fn nearest_match_walks_parent_paths() {
    let router = router(&[("todos", "/todos"), ("root", "/")]);
    let hit = router.match_nearest("/todos/42/edit").unwrap();
    assert_eq!(hit.entry.id, "todos");
    let hit = router.match_nearest("/elsewhere").unwrap();
    assert_eq!(hit.entry.id, "root");
}

#[test]
fn entries_are_listed_most_specific_first() {
    let router = router(&[("all", "/*rest?"), ("one", "/:id"), ("root", "/")]);
    let ids: Vec<_> = router.entries().map(|e| e.id).collect();
    assert_eq!(ids, vec!["root", "one", "all"]);
}
