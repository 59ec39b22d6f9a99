//! Event Handling
//!
// Austin Shafer - 2025

use utils::region::Vector;

/// Global compositor events
///
/// These describe window level changes like resizing, redraw
/// completion and app shutdown. The host drains them once per loop
/// iteration with `pump_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WindowResized { size: Vector },
    WindowRedrawComplete,
    WindowClosed,
    AppClosed { id: String },
}

/// The global event queue
///
/// Events are FIFO: they are delivered in the order the compositor
/// observed them.
#[derive(Default)]
pub struct EventSystem {
    e_queue: Vec<Event>,
}

impl EventSystem {
    pub fn new() -> Self {
        Self { e_queue: Vec::new() }
    }

    pub fn add_event_window_resized(&mut self, size: Vector) {
        self.e_queue.push(Event::WindowResized { size: size });
    }

    /// Queued after every presented frame
    ///
    /// This isn't a performance limiting event, the app doesn't need
    /// it to control drawing. It exists so clients can run their
    /// once-per-frame bookkeeping.
    pub fn add_event_window_redraw_complete(&mut self) {
        self.e_queue.push(Event::WindowRedrawComplete);
    }

    pub fn add_event_window_closed(&mut self) {
        self.e_queue.push(Event::WindowClosed);
    }

    pub fn add_event_app_closed(&mut self, id: String) {
        self.e_queue.push(Event::AppClosed { id: id });
    }

    /// Take every pending event, oldest first
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.e_queue)
    }

    pub fn is_empty(&self) -> bool {
        self.e_queue.is_empty()
    }
}
