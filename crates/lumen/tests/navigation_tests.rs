//! Client navigation against the in-process fixture app.

mod common;

use lumen::client::{HistoryEntry, NavigationError, NavigationState};
use lumen::{NavigateOptions, StatusCode, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use common::{fixture, navigator, ORIGIN};

fn absolute(path: &str) -> String {
    format!("{}{}", ORIGIN.trim_end_matches('/'), path)
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(9)]
#[tokio::test]
async fn redirect_chains_under_the_limit_land(#[case] length: usize) {
    let nav = navigator(fixture().router);
    nav.navigate(&format!("/hop/{length}"), NavigateOptions::default())
        .await
        .unwrap();

    assert_eq!(nav.state(), NavigationState::Loaded);
    assert_eq!(nav.url().path(), "/hop/0");
    let context = nav.context().unwrap();
    assert_eq!(context.data("hop"), Some(&Value::from(json!("landed"))));
    assert_eq!(nav.history().entries(), vec![HistoryEntry::Push(absolute("/hop/0"))]);
}

#[rstest]
#[case(10)]
#[case(12)]
#[tokio::test]
async fn redirect_chains_at_the_limit_fail(#[case] length: usize) {
    let nav = navigator(fixture().router);
    let err = nav
        .navigate(&format!("/hop/{length}"), NavigateOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, NavigationError::TooManyRedirects { limit: 10 });
    assert_eq!(nav.state(), NavigationState::Error);
    assert!(nav.history().entries().is_empty());
}

#[tokio::test]
async fn cross_origin_redirects_leave_the_app() {
    let nav = navigator(fixture().router);
    nav.navigate("/away", NavigateOptions::default()).await.unwrap();
    assert_eq!(
        nav.history().last(),
        Some(HistoryEntry::Assign("http://elsewhere.test/x".into()))
    );
}

#[tokio::test]
async fn route_errors_are_raised_on_the_next_render() {
    let nav = navigator(fixture().router);
    let mut updates = nav.subscribe();

    let err = nav
        .navigate("/todos/404", NavigateOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NavigationError::Route {
            status: StatusCode::NOT_FOUND,
            message: "Not Found".into(),
        }
    );
    assert_eq!(nav.context().unwrap_err(), err);
    assert_eq!(updates.borrow_and_update().state, NavigationState::Error);

    nav.navigate("/", NavigateOptions::default()).await.unwrap();
    assert_eq!(nav.context().unwrap().data("home"), Some(&Value::from(json!("welcome"))));
}

#[tokio::test]
async fn replace_overwrites_the_current_entry() {
    let nav = navigator(fixture().router);
    nav.navigate("/", NavigateOptions::default()).await.unwrap();
    nav.navigate("/todos/1", NavigateOptions::replace()).await.unwrap();
    assert_eq!(
        nav.history().entries(),
        vec![
            HistoryEntry::Push(absolute("/")),
            HistoryEntry::Replace(absolute("/todos/1")),
        ]
    );
}

#[tokio::test]
async fn actions_refresh_the_current_page() {
    let app = fixture();
    let nav = navigator(app.router.clone());
    nav.navigate("/counter", NavigateOptions::default()).await.unwrap();
    assert_eq!(nav.context().unwrap().data("counter"), Some(&Value::from(json!(0))));

    let result = nav.call_action("counter#bump", &[json!(5)]).await.unwrap();
    assert_eq!(result, Value::from(5));
    assert_eq!(nav.context().unwrap().data("counter"), Some(&Value::from(json!(5))));
    assert_eq!(nav.history().entries().len(), 1);
}

#[tokio::test]
async fn failed_actions_do_not_refresh() {
    let nav = navigator(fixture().router);
    nav.navigate("/", NavigateOptions::default()).await.unwrap();
    let err = nav.call_action("actions#fail", &[]).await.unwrap_err();
    assert_eq!(err, NavigationError::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(nav.state(), NavigationState::Loaded);
}
