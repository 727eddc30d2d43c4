use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as cb;
use gilrs::{Axis, Button, EventType, Gilrs};
use log::{debug, info, warn};
use vibe_session::input::{DeviceSource, InputEvent};

use crate::gamepad_codes as codes;

const POLL_INTERVAL: Duration = Duration::from_millis(4);

fn key_code(button: Button) -> Option<u16> {
    let code = match button {
        Button::South => codes::BUTTON_A,
        Button::East => codes::BUTTON_B,
        Button::West => codes::BUTTON_X,
        Button::North => codes::BUTTON_Y,
        Button::LeftTrigger => codes::BUTTON_L1,
        Button::RightTrigger => codes::BUTTON_R1,
        Button::LeftTrigger2 => codes::BUTTON_L2,
        Button::RightTrigger2 => codes::BUTTON_R2,
        Button::Start => codes::BUTTON_START,
        Button::Select => codes::BACK,
        Button::Mode => codes::MENU,
        Button::DPadUp => codes::DPAD_UP,
        Button::DPadDown => codes::DPAD_DOWN,
        Button::DPadLeft => codes::DPAD_LEFT,
        Button::DPadRight => codes::DPAD_RIGHT,
        _ => return None,
    };
    Some(code)
}

fn axis_index(axis: Axis) -> Option<u8> {
    match axis {
        Axis::LeftStickX => Some(codes::AXIS_LEFT_X),
        Axis::LeftStickY => Some(codes::AXIS_LEFT_Y),
        Axis::RightStickX => Some(codes::AXIS_RIGHT_X),
        Axis::RightStickY => Some(codes::AXIS_RIGHT_Y),
        _ => None,
    }
}

/// Ids of the gamepads attached right now, in the numbering the input thread
/// reports. `None` if no gamepad backend is available.
pub fn connected_devices() -> Option<Vec<u32>> {
    match Gilrs::new() {
        Ok(gilrs) => Some(gilrs.gamepads().map(|(id, _)| usize::from(id) as u32).collect()),
        Err(e) => {
            debug!("Gamepad enumeration unavailable: {e}");
            None
        }
    }
}

/// Reads connected controllers on a background thread and forwards their
/// buttons and sticks as raw input events. Returns `None` if no gamepad
/// backend is available.
pub fn spawn_gamepad_thread(
    event_tx: cb::Sender<InputEvent>,
    stop: Arc<AtomicBool>,
) -> Option<JoinHandle<()>> {
    let (ready_tx, ready_rx) = cb::bounded(1);
    let handle = thread::spawn(move || {
        // Gilrs is not Send; it has to live on the thread that polls it.
        let mut gilrs = match Gilrs::new() {
            Ok(g) => {
                let _ = ready_tx.send(true);
                g
            }
            Err(e) => {
                warn!("Gamepad init failed: {e}");
                let _ = ready_tx.send(false);
                return;
            }
        };
        for (id, gamepad) in gilrs.gamepads() {
            info!("Gamepad {id:?} available: {}", gamepad.name());
        }

        while !stop.load(Ordering::Relaxed) {
            while let Some(ev) = gilrs.next_event() {
                let device_id = usize::from(ev.id) as u32;
                let event = match ev.event {
                    EventType::Connected => {
                        info!("Gamepad connected: {}", gilrs.gamepad(ev.id).name());
                        None
                    }
                    EventType::Disconnected => {
                        info!("Gamepad disconnected: {}", gilrs.gamepad(ev.id).name());
                        None
                    }
                    EventType::ButtonPressed(button, _) => key_code(button).map(|code| {
                        InputEvent::key(DeviceSource::Gamepad, device_id, code, true)
                    }),
                    EventType::ButtonReleased(button, _) => key_code(button).map(|code| {
                        InputEvent::key(DeviceSource::Gamepad, device_id, code, false)
                    }),
                    EventType::AxisChanged(axis, value, _) => axis_index(axis).map(|axis| {
                        InputEvent::axis(DeviceSource::Gamepad, device_id, axis, value)
                    }),
                    _ => None,
                };
                if let Some(event) = event
                    && event_tx.send(event).is_err()
                {
                    debug!("input receiver gone; stopping gamepad thread");
                    return;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    });

    match ready_rx.recv() {
        Ok(true) => Some(handle),
        _ => {
            let _ = handle.join();
            None
        }
    }
}
