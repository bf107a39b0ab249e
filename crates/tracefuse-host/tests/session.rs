//! Integration tests: drive a real draw session through its background
//! compute host.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use tracefuse_core::{EndpointRole, FragmentId, Scale, SessionConfig};
use tracefuse_host::{
    DrawSessionController, HostError, InitPathResponse, NearestResponse, PathSpec,
};

const SQUARE: &str = "M 0 0 L 10 0 L 10 10 Z";

fn session() -> DrawSessionController {
    DrawSessionController::new(SessionConfig::default()).unwrap()
}

/// Poll until `done` holds, failing after a generous deadline.
fn pump(session: &mut DrawSessionController, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for the host");
        session.poll().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
}

fn load(session: &mut DrawSessionController, path: &str) -> InitPathResponse {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    session
        .init_path(PathSpec::new(path), move |r| *sink.borrow_mut() = Some(r))
        .unwrap();
    pump(session, || slot.borrow().is_some());
    slot.take().unwrap()
}

fn nearest(session: &mut DrawSessionController, x: f64, y: f64) -> NearestResponse {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    session
        .find_nearest_point(x, y, move |r| *sink.borrow_mut() = Some(r))
        .unwrap();
    pump(session, || slot.borrow().is_some());
    slot.take().unwrap()
}

fn markers(session: &mut DrawSessionController) -> String {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    session
        .render_endpoints(move |r| *sink.borrow_mut() = Some(r))
        .unwrap();
    pump(session, || slot.borrow().is_some());
    slot.take().unwrap()
}

#[test]
fn host_spawns_on_first_use() {
    let mut session = session();
    assert!(!session.is_running());
    assert_eq!(session.poll().unwrap(), 0);
    load(&mut session, SQUARE);
    assert!(session.is_running());
    assert_eq!(session.pending(), 0);
}

#[test]
fn square_fixture_round_trip() {
    let mut session = session();
    let loaded = load(&mut session, SQUARE);
    assert_eq!(loaded.fragments.len(), 3);
    assert_eq!(loaded.endpoint_marker_markup.matches("<circle").count(), 3);

    let response = nearest(&mut session, 0.5, 0.5);
    let point = response.nearest_point.expect("a bucket near the origin");
    assert_eq!(point.coordinate, [0.0, 0.0]);
    assert_eq!(
        point.owners,
        vec![
            (FragmentId(0), EndpointRole::Start),
            (FragmentId(2), EndpointRole::End),
        ],
    );
    assert!((response.distance - 0.5f64.hypot(0.5)).abs() < 1e-12);
}

#[test]
fn nothing_in_reach_reports_the_attach_radius() {
    let mut session = session();
    load(&mut session, SQUARE);
    let response = nearest(&mut session, 50.0, 50.0);
    assert!(response.nearest_point.is_none());
    assert!((response.distance - SessionConfig::DEFAULT_ATTACH_DISTANCE).abs() < f64::EPSILON);
}

#[test]
fn dragging_an_endpoint_onto_another_merges_them() {
    let mut session = session();
    load(&mut session, "M 0 0 L 10 0 M 20 0 L 30 0");
    let origin = nearest(&mut session, 10.0, 0.0).nearest_point.unwrap();

    session.update_end_point(origin, 20.0, 0.0).unwrap();
    let markup = markers(&mut session);

    // The dragged endpoint is gone from its old spot and now sits beside
    // fragment 1's start, drawn as a second marker on the same point.
    assert!(!markup.contains(r#"cx="10""#));
    assert_eq!(markup.matches("<circle").count(), 4);
    assert!(markup.contains(r#"data-owner-0="0:end""#));
    assert!(markup.contains(r#"data-owner-0="1:start""#));
}

#[test]
fn zoom_shrinks_markers() {
    let mut session = session();
    load(&mut session, SQUARE);
    session.update_scale(Scale::new(4.0).unwrap()).unwrap();
    assert!(markers(&mut session).contains(r#"r="1""#));
}

#[test]
fn overlapping_queries_both_complete_and_the_last_wins() {
    let mut session = session();
    load(&mut session, SQUARE);

    let calls = Rc::new(Cell::new(0));
    let latest: Rc<RefCell<Option<NearestResponse>>> = Rc::default();
    for (x, y) in [(0.5, 0.5), (9.5, 9.5)] {
        let calls = Rc::clone(&calls);
        let latest = Rc::clone(&latest);
        session
            .find_nearest_point(x, y, move |r| {
                calls.set(calls.get() + 1);
                *latest.borrow_mut() = Some(r);
            })
            .unwrap();
    }
    pump(&mut session, || calls.get() == 2);

    // The first reply may be empty if the second voided it; either way
    // the observed answer is the second query's.
    let latest = latest.take().unwrap();
    assert_eq!(latest.nearest_point.unwrap().coordinate, [10.0, 10.0]);
    assert_eq!(session.pending(), 0);
}

#[test]
fn unsubscribed_replies_are_discarded() {
    let mut session = session();
    load(&mut session, SQUARE);

    let dropped = Rc::new(Cell::new(false));
    let flag = Rc::clone(&dropped);
    let id = session
        .render_endpoints(move |_| flag.set(true))
        .unwrap();
    assert!(session.unsubscribe(id));
    assert!(!session.unsubscribe(id));

    // A later request is answered after the discarded one.
    markers(&mut session);
    assert!(!dropped.get());
    assert_eq!(session.pending(), 0);
}

#[test]
fn terminate_disposes_the_host() {
    let mut session = session();
    load(&mut session, SQUARE);
    session.find_nearest_point(0.0, 0.0, |_| {}).unwrap();

    session.terminate();

    assert_eq!(session.pending(), 0);
    assert!(!session.is_running());
    assert_eq!(session.poll(), Err(HostError::Terminated));
    assert_eq!(
        session.find_nearest_point(0.0, 0.0, |_| {}),
        Err(HostError::Terminated)
    );
    // Idempotent.
    session.terminate();
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = SessionConfig {
        attach_distance: 0.0,
        ..SessionConfig::default()
    };
    assert!(matches!(
        DrawSessionController::new(config),
        Err(HostError::Trace(_))
    ));
}
