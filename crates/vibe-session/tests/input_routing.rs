mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{CoreCall, HostCall, RecordingCore, RecordingHost, keyboard_profile, session_config};
use tempfile::tempdir;
use vibe_session::controller::{
    AccessoryKind, AutoHold, ButtonRegion, ControllerState, PlayerIndex, PlayerMap, Rect,
    StickRegion, TouchLayout, buttons,
};
use vibe_session::input::{
    Demultiplexer, DeviceSource, InputEvent, InputSink, PointerPhase, SourceFilter, keycodes,
};
use vibe_session::lifecycle::LifecycleEvent as E;
use vibe_session::{CoreProxy, RunState, Session, SessionConfig, TouchSurface};

struct TaggedSink {
    tag: &'static str,
    consume: bool,
    seen: Rc<RefCell<Vec<&'static str>>>,
}

impl InputSink for TaggedSink {
    fn on_event(&mut self, _event: &InputEvent, _core: &mut dyn CoreProxy) -> bool {
        self.seen.borrow_mut().push(self.tag);
        self.consume
    }
}

fn tagged(
    tag: &'static str,
    consume: bool,
    seen: &Rc<RefCell<Vec<&'static str>>>,
) -> Box<TaggedSink> {
    Box::new(TaggedSink {
        tag,
        consume,
        seen: Rc::clone(seen),
    })
}

fn key(device_id: u32, code: u16, pressed: bool) -> InputEvent {
    InputEvent::key(DeviceSource::Keyboard, device_id, code, pressed)
}

#[test]
fn demux_delivers_only_to_matching_filters() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut demux = Demultiplexer::new();
    demux.register(SourceFilter::TOUCH_SCREEN, tagged("a", true, &seen));
    demux.register(SourceFilter::TOUCH_PAD, tagged("b", true, &seen));
    let mut core = RecordingCore::default();

    let touch = InputEvent::pointer(DeviceSource::TouchScreen, 0, 1.0, 1.0, PointerPhase::Down);
    assert!(demux.dispatch(&touch, &mut core));
    assert_eq!(*seen.borrow(), vec!["a"]);

    seen.borrow_mut().clear();
    assert!(!demux.dispatch(&key(1, 29, true), &mut core));
    assert!(seen.borrow().is_empty());
}

#[test]
fn demux_visits_every_match_in_registration_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut demux = Demultiplexer::new();
    demux.register(SourceFilter::PERIPHERAL, tagged("first", true, &seen));
    demux.register(SourceFilter::TOUCH_SCREEN, tagged("touch", true, &seen));
    demux.register(SourceFilter::ANY, tagged("second", false, &seen));
    let mut core = RecordingCore::default();

    assert!(demux.dispatch(&key(1, 29, true), &mut core));
    assert_eq!(*seen.borrow(), vec!["first", "second"]);
}

#[test]
fn demux_reports_unhandled_when_no_sink_consumes() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut demux = Demultiplexer::new();
    demux.register(SourceFilter::ANY, tagged("idle", false, &seen));
    let mut core = RecordingCore::default();
    assert!(!demux.dispatch(&key(1, 29, true), &mut core));
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn keyboard_drives_player_one() {
    let dir = tempdir().unwrap();
    let config = SessionConfig {
        profiles: vec![keyboard_profile(PlayerIndex::ONE)],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();

    assert!(s.on_input(&key(1, 29, true)));
    assert!(s.on_input(&InputEvent::axis(DeviceSource::Joystick, 1, 0, -1.0)));
    assert!(!s.on_input(&key(1, 99, true)), "unmapped key");
    assert!(s.on_input(&key(1, 29, false)));

    let a = ControllerState {
        buttons: buttons::A,
        ..ControllerState::default()
    };
    assert_eq!(
        s.core().inputs(),
        vec![
            (PlayerIndex::ONE, a),
            (
                PlayerIndex::ONE,
                ControllerState {
                    stick_x: -80,
                    ..a
                }
            ),
            (
                PlayerIndex::ONE,
                ControllerState {
                    stick_x: -80,
                    ..ControllerState::default()
                }
            ),
        ]
    );
    assert!(
        s.core()
            .calls
            .contains(&CoreCall::SetAccessory(PlayerIndex::ONE, AccessoryKind::Rumble))
    );
}

#[test]
fn overlay_keeps_input_from_controllers() {
    let dir = tempdir().unwrap();
    let config = SessionConfig {
        profiles: vec![keyboard_profile(PlayerIndex::ONE)],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();
    s.handle(E::HostResumed(true));
    s.handle(E::SurfaceReady(true));

    s.handle(E::OverlayOpened);
    assert!(!s.on_input(&key(1, 29, true)));
    assert!(s.core().inputs().is_empty());

    s.handle(E::OverlayClosed);
    assert!(s.on_input(&key(1, 29, true)));
    assert_eq!(s.core().inputs().len(), 1);
}

#[test]
fn reserved_keys_drive_the_session() {
    let dir = tempdir().unwrap();
    let mut s = session_with_profiles(dir.path(), Vec::new());
    s.handle(E::HostResumed(true));
    s.handle(E::SurfaceReady(true));
    s.handle(E::RenderContextReady);

    assert!(s.on_input(&key(1, keycodes::MENU, true)));
    assert!(s.on_input(&key(1, keycodes::MENU, false)));
    assert_eq!(s.host().calls, vec![HostCall::OpenOverlay]);

    s.handle(E::OverlayOpened);
    assert!(s.on_input(&key(1, keycodes::BACK, true)));
    assert_eq!(s.host().calls.last(), Some(&HostCall::DismissOverlay));

    s.handle(E::OverlayClosed);
    assert!(s.on_input(&key(1, keycodes::BACK, true)));
    assert_eq!(s.host().calls.last(), Some(&HostCall::ConfirmExit));
    assert_eq!(s.core().state, RunState::Paused);
}

fn session_with_profiles(
    root: &std::path::Path,
    profiles: Vec<vibe_session::controller::PlayerProfile>,
) -> Session<RecordingCore, RecordingHost> {
    let config = SessionConfig {
        profiles,
        ..session_config(root)
    };
    Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap()
}

#[test]
fn player_map_routes_devices_to_their_player() {
    let dir = tempdir().unwrap();
    let mut map = PlayerMap::new(true);
    map.assign(7, PlayerIndex::ONE);
    map.assign(8, PlayerIndex::TWO);
    let config = SessionConfig {
        declared_players: 2,
        player_map: map,
        profiles: vec![
            keyboard_profile(PlayerIndex::ONE),
            keyboard_profile(PlayerIndex::TWO),
        ],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();
    assert_eq!(s.active_players(), &[PlayerIndex::ONE, PlayerIndex::TWO]);

    assert!(s.on_input(&key(8, 30, true)));
    assert!(!s.on_input(&key(9, 30, true)), "unmapped device");
    let inputs = s.core().inputs();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].0, PlayerIndex::TWO);
    assert!(inputs[0].1.is_pressed(buttons::B));
}

#[test]
fn unmapped_players_are_prompted_and_left_inactive() {
    let dir = tempdir().unwrap();
    let mut map = PlayerMap::new(true);
    map.assign(7, PlayerIndex::ONE);
    let config = SessionConfig {
        declared_players: 2,
        player_map: map,
        profiles: vec![
            keyboard_profile(PlayerIndex::ONE),
            keyboard_profile(PlayerIndex::TWO),
        ],
        ..session_config(dir.path())
    };
    let s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();

    assert_eq!(s.active_players(), &[PlayerIndex::ONE]);
    assert_eq!(s.host().calls, vec![HostCall::Unmapped(vec![PlayerIndex::TWO])]);
    let accessories: Vec<_> = s
        .core()
        .calls
        .iter()
        .filter(|c| matches!(c, CoreCall::SetAccessory(..)))
        .cloned()
        .collect();
    assert_eq!(
        accessories,
        vec![CoreCall::SetAccessory(PlayerIndex::ONE, AccessoryKind::Rumble)]
    );
}

#[test]
fn disconnected_device_does_not_count_as_mapped() {
    let dir = tempdir().unwrap();
    let mut map = PlayerMap::new(true);
    map.assign(7, PlayerIndex::ONE);
    map.assign(8, PlayerIndex::TWO);
    let config = SessionConfig {
        declared_players: 2,
        player_map: map,
        connected_devices: Some(vec![7]),
        profiles: vec![
            keyboard_profile(PlayerIndex::ONE),
            keyboard_profile(PlayerIndex::TWO),
        ],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();

    assert_eq!(s.active_players(), &[PlayerIndex::ONE]);
    assert_eq!(s.host().calls, vec![HostCall::Unmapped(vec![PlayerIndex::TWO])]);
    assert!(s.on_input(&key(7, 29, true)));
    assert!(!s.on_input(&key(8, 29, true)), "mapping of device 8 was dropped");
}

#[test]
fn duplicate_profiles_drive_a_player_once() {
    let dir = tempdir().unwrap();
    let mut s = session_with_profiles(
        dir.path(),
        vec![
            keyboard_profile(PlayerIndex::ONE),
            keyboard_profile(PlayerIndex::ONE),
        ],
    );
    assert_eq!(s.active_players(), &[PlayerIndex::ONE]);
    let accessories = s
        .core()
        .calls
        .iter()
        .filter(|c| matches!(c, CoreCall::SetAccessory(..)))
        .count();
    assert_eq!(accessories, 1);

    assert!(s.on_input(&key(1, 29, true)));
    assert_eq!(s.core().inputs().len(), 1);
}

fn touch_layout() -> TouchLayout {
    TouchLayout {
        buttons: vec![
            ButtonRegion {
                mask: buttons::A,
                rect: Rect::new(200.0, 0.0, 50.0, 50.0),
            },
            ButtonRegion {
                mask: buttons::Z,
                rect: Rect::new(200.0, 100.0, 50.0, 50.0),
            },
        ],
        stick: Some(StickRegion {
            cx: 50.0,
            cy: 50.0,
            radius: 40.0,
        }),
    }
}

#[test]
fn touch_screen_buttons_and_stick() {
    let dir = tempdir().unwrap();
    let config = SessionConfig {
        touch_surfaces: vec![TouchSurface {
            source: DeviceSource::TouchScreen,
            layout: touch_layout(),
            auto_hold: AutoHold::Disabled,
        }],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();
    let touch = |id, x, y, phase| InputEvent::pointer(DeviceSource::TouchScreen, id, x, y, phase);

    assert!(s.on_input(&touch(0, 210.0, 10.0, PointerPhase::Down)));
    assert!(s.on_input(&touch(1, 90.0, 50.0, PointerPhase::Down)));
    assert!(!s.on_input(&touch(2, 500.0, 500.0, PointerPhase::Down)), "empty area");

    let held = *s.core().inputs().last().unwrap();
    assert_eq!(held.0, PlayerIndex::ONE);
    assert_eq!(held.1.buttons, buttons::A);
    assert_eq!(held.1.stick_x, 80);
    assert_eq!(held.1.stick_y, 0);

    s.on_input(&touch(0, 210.0, 10.0, PointerPhase::Up));
    s.on_input(&touch(1, 90.0, 50.0, PointerPhase::Up));
    assert_eq!(s.core().inputs().last().unwrap().1, ControllerState::default());
}

#[test]
fn auto_hold_latches_until_touched_again() {
    let dir = tempdir().unwrap();
    let config = SessionConfig {
        touch_surfaces: vec![TouchSurface {
            source: DeviceSource::TouchPad,
            layout: touch_layout(),
            auto_hold: AutoHold::Toggle {
                holdable: buttons::Z,
            },
        }],
        ..session_config(dir.path())
    };
    let mut s = Session::new(config, RecordingCore::eager(), RecordingHost::default()).unwrap();
    let pad = |phase| InputEvent::pointer(DeviceSource::TouchPad, 3, 210.0, 110.0, phase);

    s.on_input(&pad(PointerPhase::Down));
    s.on_input(&pad(PointerPhase::Up));
    assert!(s.core().inputs().last().unwrap().1.is_pressed(buttons::Z));

    s.on_input(&pad(PointerPhase::Down));
    assert!(!s.core().inputs().last().unwrap().1.is_pressed(buttons::Z));

    // Touch screen events never reach the pad controller.
    let screen = InputEvent::pointer(DeviceSource::TouchScreen, 4, 210.0, 110.0, PointerPhase::Down);
    assert!(!s.on_input(&screen));
}
