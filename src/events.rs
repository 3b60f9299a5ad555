/*!
 * Fire-and-forget notifications the embedder may observe.
 *
 * Delivered synchronously through a small callback registry rather than a
 * channel: the whole core is single-threaded, so there is no cross-thread
 * handoff to buffer for.
 */

use crate::stats::FrameStats;

/// Named events an `EventSink` subscriber may receive.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Emitted whenever the viewport or a layer's membership changes in a
    /// way that would invalidate a cached frame (e.g. an embedder-side
    /// thumbnail).
    GraphicsChanged,
    /// Emitted once per completed frame, carrying that frame's stats.
    RenderCompleted(FrameStats),
    /// Emitted when a frame aborts on a fatal error.
    RenderError { kind: String, message: String },
}

/// Ordered registry of subscriber callbacks. `emit` calls each in
/// registration order; a panicking subscriber is the caller's bug, not
/// swallowed here.
#[derive(Default)]
pub struct EventSink {
    subscribers: Vec<Box<dyn FnMut(&EngineEvent)>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: Box<dyn FnMut(&EngineEvent)>) {
        self.subscribers.push(callback);
    }

    pub fn emit(&mut self, event: EngineEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn emit_reaches_every_subscriber_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sink = EventSink::new();
        for tag in ["a", "b"] {
            let log = log.clone();
            let tag = tag.to_string();
            sink.subscribe(Box::new(move |_event| log.borrow_mut().push(tag.clone())));
        }
        sink.emit(EngineEvent::GraphicsChanged);
        assert_eq!(*log.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn render_completed_carries_frame_stats() {
        let received = Rc::new(RefCell::new(None));
        let mut sink = EventSink::new();
        let received_clone = received.clone();
        sink.subscribe(Box::new(move |event| {
            if let EngineEvent::RenderCompleted(stats) = event {
                *received_clone.borrow_mut() = Some(*stats);
            }
        }));
        let stats = FrameStats { draw_calls: 3, ..Default::default() };
        sink.emit(EngineEvent::RenderCompleted(stats));
        assert_eq!(received.borrow().unwrap().draw_calls, 3);
    }
}
