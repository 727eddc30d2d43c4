use std::collections::HashMap;

use log::trace;

use super::{ControllerState, PlayerIndex, stick_from_unit};
use crate::core_proxy::CoreProxy;
use crate::input::{InputEvent, InputKind, InputSink, PointerPhase};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonRegion {
    pub mask: u16,
    pub rect: Rect,
}

/// Circular analog stick area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickRegion {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

impl StickRegion {
    fn contains(&self, x: f32, y: f32) -> bool {
        let (dx, dy) = (x - self.cx, y - self.cy);
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Unit vector of the contact relative to the center, y pointing up.
    fn deflection(&self, x: f32, y: f32) -> (f32, f32) {
        if self.radius <= 0.0 {
            return (0.0, 0.0);
        }
        let dx = (x - self.cx) / self.radius;
        let dy = (self.cy - y) / self.radius;
        let len = (dx * dx + dy * dy).sqrt();
        if len > 1.0 {
            (dx / len, dy / len)
        } else {
            (dx, dy)
        }
    }
}

/// Fixed visual layout of an on-screen controller, in surface pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchLayout {
    pub buttons: Vec<ButtonRegion>,
    pub stick: Option<StickRegion>,
}

impl TouchLayout {
    fn buttons_at(&self, x: f32, y: f32) -> u16 {
        self.buttons
            .iter()
            .filter(|b| b.rect.contains(x, y))
            .fold(0, |mask, b| mask | b.mask)
    }
}

/// How touches on auto-holdable buttons behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoHold {
    #[default]
    Disabled,
    /// A touch on a button in `holdable` toggles a latched press that stays
    /// down after the finger lifts, until the button is touched again.
    Toggle { holdable: u16 },
}

impl AutoHold {
    fn holdable(self) -> u16 {
        match self {
            Self::Disabled => 0,
            Self::Toggle { holdable } => holdable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Contact {
    Buttons(u16),
    Stick,
}

/// Controller driven by pointer contacts on a touch surface.
pub struct TouchController {
    player: PlayerIndex,
    layout: TouchLayout,
    auto_hold: AutoHold,
    contacts: HashMap<u32, Contact>,
    latched: u16,
    stick: (f32, f32),
    last_sent: Option<ControllerState>,
}

impl TouchController {
    pub fn new(player: PlayerIndex, layout: TouchLayout, auto_hold: AutoHold) -> Self {
        Self {
            player,
            layout,
            auto_hold,
            contacts: HashMap::new(),
            latched: 0,
            stick: (0.0, 0.0),
            last_sent: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        let holdable = self.auto_hold.holdable();
        let momentary = self
            .contacts
            .values()
            .filter_map(|c| match c {
                Contact::Buttons(mask) => Some(*mask),
                Contact::Stick => None,
            })
            .fold(0, |acc, m| acc | m);
        ControllerState {
            buttons: (momentary & !holdable) | self.latched,
            stick_x: stick_from_unit(self.stick.0),
            stick_y: stick_from_unit(self.stick.1),
        }
    }

    fn touch_down(&mut self, id: u32, x: f32, y: f32) -> bool {
        if let Some(stick) = self.layout.stick
            && stick.contains(x, y)
        {
            self.stick = stick.deflection(x, y);
            self.contacts.insert(id, Contact::Stick);
            return true;
        }

        let mask = self.layout.buttons_at(x, y);
        if mask == 0 {
            return false;
        }
        self.latched ^= mask & self.auto_hold.holdable();
        self.contacts.insert(id, Contact::Buttons(mask));
        true
    }

    fn touch_move(&mut self, id: u32, x: f32, y: f32) -> bool {
        match self.contacts.get(&id).copied() {
            Some(Contact::Stick) => {
                if let Some(stick) = self.layout.stick {
                    self.stick = stick.deflection(x, y);
                }
                true
            }
            Some(Contact::Buttons(_)) => {
                // Sliding onto another button presses it; latches only change
                // on a fresh touch.
                self.contacts
                    .insert(id, Contact::Buttons(self.layout.buttons_at(x, y)));
                true
            }
            None => self.touch_down(id, x, y),
        }
    }

    fn touch_up(&mut self, id: u32) -> bool {
        match self.contacts.remove(&id) {
            Some(Contact::Stick) => {
                self.stick = (0.0, 0.0);
                true
            }
            Some(Contact::Buttons(_)) => true,
            None => false,
        }
    }
}

impl InputSink for TouchController {
    fn on_event(&mut self, event: &InputEvent, core: &mut dyn CoreProxy) -> bool {
        let InputKind::Pointer { id, x, y, phase } = event.kind else {
            return false;
        };

        let consumed = match phase {
            PointerPhase::Down => self.touch_down(id, x, y),
            PointerPhase::Move => self.touch_move(id, x, y),
            PointerPhase::Up => self.touch_up(id),
        };

        let state = self.state();
        if consumed && self.last_sent != Some(state) {
            trace!("{} touch -> {state:?}", self.player);
            core.submit_input(self.player, state);
            self.last_sent = Some(state);
        }
        consumed
    }
}
