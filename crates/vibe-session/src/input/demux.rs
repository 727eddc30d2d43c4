use log::trace;

use super::{InputEvent, SourceFilter};
use crate::core_proxy::CoreProxy;

/// Consumer of routed input events.
pub trait InputSink {
    /// Handles one event. Returns `true` if the event was consumed.
    fn on_event(&mut self, event: &InputEvent, core: &mut dyn CoreProxy) -> bool;
}

struct Registered {
    filter: SourceFilter,
    sink: Box<dyn InputSink>,
}

/// Fans a single physical event stream out to every sink whose filter accepts
/// the event's source.
///
/// Sinks are visited in registration order and every matching sink sees the
/// event, even after an earlier one consumed it. Overlapping hit regions are
/// not considered; only the filter decides ownership.
#[derive(Default)]
pub struct Demultiplexer {
    sinks: Vec<Registered>,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, filter: SourceFilter, sink: Box<dyn InputSink>) {
        trace!("input sink #{} registered for {filter:?}", self.sinks.len());
        self.sinks.push(Registered { filter, sink });
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Delivers `event` to all matching sinks. Returns whether any sink
    /// consumed it; an event no filter accepts is dropped and reported as
    /// unhandled.
    pub fn dispatch(&mut self, event: &InputEvent, core: &mut dyn CoreProxy) -> bool {
        let mut handled = false;
        let mut delivered = 0usize;
        for entry in self
            .sinks
            .iter_mut()
            .filter(|entry| entry.filter.matches(event.source))
        {
            handled |= entry.sink.on_event(event, core);
            delivered += 1;
        }
        if delivered == 0 {
            trace!("dropping {:?} event: no sink accepts it", event.source);
        }
        handled
    }
}
