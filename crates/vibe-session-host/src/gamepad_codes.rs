//! Key and axis numbers the host uses for gamepad input.
//!
//! Key codes follow the common mobile key code table so that the session's
//! reserved back and menu keys line up with the controller's select and guide
//! buttons.

pub use vibe_session::input::keycodes::{BACK, MENU};

pub const DPAD_UP: u16 = 19;
pub const DPAD_DOWN: u16 = 20;
pub const DPAD_LEFT: u16 = 21;
pub const DPAD_RIGHT: u16 = 22;
pub const BUTTON_A: u16 = 96;
pub const BUTTON_B: u16 = 97;
pub const BUTTON_X: u16 = 99;
pub const BUTTON_Y: u16 = 100;
pub const BUTTON_L1: u16 = 102;
pub const BUTTON_R1: u16 = 103;
pub const BUTTON_L2: u16 = 104;
pub const BUTTON_R2: u16 = 105;
pub const BUTTON_START: u16 = 108;

pub const AXIS_LEFT_X: u8 = 0;
pub const AXIS_LEFT_Y: u8 = 1;
pub const AXIS_RIGHT_X: u8 = 2;
pub const AXIS_RIGHT_Y: u8 = 3;
