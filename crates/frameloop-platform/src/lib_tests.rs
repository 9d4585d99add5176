// SPDX-License-Identifier: CEPL-1.0
use super::*;

fn state() -> WindowState {
    WindowState::new(WindowOptions {
        size: RenderSize::new(800, 600),
        ..WindowOptions::default()
    })
}

#[test]
fn resize_is_reported_once() {
    let mut s = state();
    assert!(s.record_resize(RenderSize::new(1024, 768)));
    assert_eq!(
        s.take_poll(),
        WindowPoll {
            close_requested: false,
            resized: true
        }
    );
    assert!(!s.take_poll().resized);
    assert_eq!(s.size, RenderSize::new(1024, 768));
}

#[test]
fn same_size_is_not_a_resize() {
    let mut s = state();
    assert!(!s.record_resize(RenderSize::new(800, 600)));
    assert!(!s.take_poll().resized);
}

#[test]
fn several_resizes_collapse_into_one() {
    let mut s = state();
    s.record_resize(RenderSize::new(10, 10));
    s.record_resize(RenderSize::new(0, 0));
    s.record_resize(RenderSize::new(300, 200));
    assert!(s.take_poll().resized);
    assert!(!s.take_poll().resized);
    assert_eq!(s.size, RenderSize::new(300, 200));
}

#[test]
fn minimize_is_a_resize_to_zero_area() {
    let mut s = state();
    s.record_resize(RenderSize::new(0, 0));
    assert!(s.size.is_zero_area());
    assert!(s.take_poll().resized);
}

#[test]
fn close_request_sticks() {
    let mut s = state();
    s.close_requested = true;
    assert!(s.take_poll().close_requested);
    assert!(s.take_poll().close_requested);
}

#[test]
fn default_options() {
    let o = WindowOptions::default();
    assert_eq!(o.title, "frameloop");
    assert_eq!(o.size, RenderSize::new(1280, 720));
    assert!(!o.fullscreen);
}
