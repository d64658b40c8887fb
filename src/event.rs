//! Timed event engine.
//!
//! An [`Event`] is a tree of primitives (`Transition`, `Trigger`, `Sleep`)
//! joined by `Sequence` (one child at a time) and `Stack` (all children at
//! once). The tree is built up front and then driven by `advance(dt)`; its
//! only mutable state is elapsed time and done flags. Values go out through
//! an [`Emitter`], which records them in the [`ControlCache`] so later fades
//! can start from whatever was last sent.

use crate::control_cache::ControlCache;
use crate::sink::MessageSink;
use log::{debug, trace};
use std::fmt;

/// Writes control values to the cache and the outbound sink.
pub struct Emitter<'a> {
    cache: &'a mut ControlCache,
    sink: &'a mut dyn MessageSink,
}

impl<'a> Emitter<'a> {
    pub fn new(cache: &'a mut ControlCache, sink: &'a mut dyn MessageSink) -> Self {
        Self { cache, sink }
    }

    /// Send a value and remember it.
    pub fn set(&mut self, address: &str, value: f64) {
        self.cache.set(address, value);
        self.sink.send(address, value);
    }

    /// Fire a cue trigger. Triggers are not state, so they skip the cache.
    pub fn trigger(&mut self, address: &str) {
        self.sink.send(address, 1.0);
    }

    pub fn cache(&self) -> &ControlCache {
        self.cache
    }
}

fn sanitize(dt: f64) -> f64 {
    if dt.is_finite() {
        dt.max(0.0)
    } else {
        0.0
    }
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

// ─── Primitives ─────────────────────────────────────────────────────────────

/// Linear fade of one control from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub address: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    elapsed: f64,
    done: bool,
}

impl Transition {
    pub fn new(address: impl Into<String>, start: f64, end: f64, duration: f64) -> Self {
        Self {
            address: address.into(),
            start,
            end,
            duration: sanitize(duration),
            elapsed: 0.0,
            done: false,
        }
    }

    /// Current value along the fade, clamped at `end`.
    pub fn value(&self) -> f64 {
        if self.duration > 0.0 {
            lerp(self.start, self.end, (self.elapsed / self.duration).min(1.0))
        } else {
            self.end
        }
    }

    fn advance(&mut self, dt: f64, out: &mut Emitter<'_>) {
        self.elapsed += dt;
        let value = self.value();
        out.set(&self.address, value);
        self.done = self.elapsed > self.duration || self.duration <= 0.0;
    }
}

/// Sends 1.0 to an address once.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub address: String,
    done: bool,
}

impl Trigger {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            done: false,
        }
    }

    fn advance(&mut self, out: &mut Emitter<'_>) {
        out.trigger(&self.address);
        self.done = true;
    }
}

/// Waits without emitting anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Sleep {
    pub duration: f64,
    elapsed: f64,
    done: bool,
}

impl Sleep {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: sanitize(duration),
            elapsed: 0.0,
            done: false,
        }
    }

    fn advance(&mut self, dt: f64) {
        self.elapsed += dt;
        self.done = self.elapsed > self.duration || self.duration <= 0.0;
    }
}

// ─── Composites ─────────────────────────────────────────────────────────────

/// Runs children one after another; one child advances per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub children: Vec<Event>,
    done: bool,
}

impl Sequence {
    pub fn new(children: Vec<Event>) -> Self {
        let done = children.iter().all(Event::is_done);
        Self { children, done }
    }

    fn advance(&mut self, dt: f64, out: &mut Emitter<'_>) {
        if let Some(child) = self.children.iter_mut().find(|c| !c.is_done()) {
            child.advance(dt, out);
        }
        self.done = self.children.iter().all(Event::is_done);
    }
}

/// Runs all children concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub children: Vec<Event>,
    done: bool,
}

impl Stack {
    pub fn new(children: Vec<Event>) -> Self {
        let done = children.iter().all(Event::is_done);
        Self { children, done }
    }

    fn advance(&mut self, dt: f64, out: &mut Emitter<'_>) {
        for child in self.children.iter_mut().filter(|c| !c.is_done()) {
            child.advance(dt, out);
        }
        self.done = self.children.iter().all(Event::is_done);
    }
}

// ─── Event ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Transition(Transition),
    Trigger(Trigger),
    Sleep(Sleep),
    Sequence(Sequence),
    Stack(Stack),
}

impl Event {
    pub fn transition(address: impl Into<String>, start: f64, end: f64, duration: f64) -> Self {
        Event::Transition(Transition::new(address, start, end, duration))
    }

    pub fn trigger(address: impl Into<String>) -> Self {
        Event::Trigger(Trigger::new(address))
    }

    pub fn sleep(duration: f64) -> Self {
        Event::Sleep(Sleep::new(duration))
    }

    pub fn sequence(children: Vec<Event>) -> Self {
        Event::Sequence(Sequence::new(children))
    }

    pub fn stack(children: Vec<Event>) -> Self {
        Event::Stack(Stack::new(children))
    }

    pub fn is_done(&self) -> bool {
        match self {
            Event::Transition(e) => e.done,
            Event::Trigger(e) => e.done,
            Event::Sleep(e) => e.done,
            Event::Sequence(e) => e.done,
            Event::Stack(e) => e.done,
        }
    }

    /// Step the event by `dt` seconds. Once done, further calls do nothing.
    pub fn advance(&mut self, dt: f64, out: &mut Emitter<'_>) {
        if self.is_done() {
            return;
        }
        let dt = sanitize(dt);
        match self {
            Event::Transition(e) => e.advance(dt, out),
            Event::Trigger(e) => e.advance(out),
            Event::Sleep(e) => e.advance(dt),
            Event::Sequence(e) => e.advance(dt, out),
            Event::Stack(e) => e.advance(dt, out),
        }
    }

    /// Nominal running time in seconds.
    pub fn duration(&self) -> f64 {
        match self {
            Event::Transition(e) => e.duration,
            Event::Trigger(_) => 0.0,
            Event::Sleep(e) => e.duration,
            Event::Sequence(e) => e.children.iter().map(Event::duration).sum(),
            Event::Stack(e) => e.children.iter().map(Event::duration).fold(0.0, f64::max),
        }
    }

    /// Leaf primitives in depth-first order.
    pub fn leaves(&self) -> Vec<&Event> {
        match self {
            Event::Sequence(Sequence { children, .. }) | Event::Stack(Stack { children, .. }) => {
                children.iter().flat_map(Event::leaves).collect()
            }
            leaf => vec![leaf],
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Transition(t) => write!(
                f,
                "fade {} {:.2}→{:.2} over {:.1}s",
                t.address, t.start, t.end, t.duration
            ),
            Event::Trigger(t) => write!(f, "trigger {}", t.address),
            Event::Sleep(s) => write!(f, "sleep {:.1}s", s.duration),
            Event::Sequence(s) => write!(f, "sequence of {}", s.children.len()),
            Event::Stack(s) => write!(f, "stack of {}", s.children.len()),
        }
    }
}

impl From<Transition> for Event {
    fn from(t: Transition) -> Self {
        Event::Transition(t)
    }
}

impl From<Sequence> for Event {
    fn from(s: Sequence) -> Self {
        Event::Sequence(s)
    }
}

impl From<Stack> for Event {
    fn from(s: Stack) -> Self {
        Event::Stack(s)
    }
}

// ─── Event manager ──────────────────────────────────────────────────────────

/// Handle for checking whether an added event is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// Active top-level events. They run concurrently, like an implicit stack;
/// callers must not schedule two fades on the same address.
pub struct EventManager {
    events: Vec<(EventId, Event)>,
    next_id: u64,
    cache: ControlCache,
    sink: Box<dyn MessageSink>,
}

impl EventManager {
    pub fn new(sink: Box<dyn MessageSink>) -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
            cache: ControlCache::new(),
            sink,
        }
    }

    pub fn add(&mut self, event: Event) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        debug!("Event {} added: {} ({:.1}s)", id.0, event, event.duration());
        self.events.push((id, event));
        id
    }

    /// Advance every active event, then drop the finished ones.
    pub fn advance(&mut self, dt: f64) {
        let mut out = Emitter::new(&mut self.cache, self.sink.as_mut());
        for (_, event) in self.events.iter_mut() {
            event.advance(dt, &mut out);
        }
        let before = self.events.len();
        self.events.retain(|(_, e)| !e.is_done());
        if self.events.len() < before {
            trace!("{} events finished", before - self.events.len());
        }
    }

    pub fn is_running(&self, id: EventId) -> bool {
        self.events.iter().any(|(i, _)| *i == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cache(&self) -> &ControlCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_helpers::RecordingSink;

    fn run(event: &mut Event, dt: f64, cache: &mut ControlCache, sink: &mut RecordingSink) {
        let mut out = Emitter::new(cache, sink);
        event.advance(dt, &mut out);
    }

    #[test]
    fn test_transition_midpoint_then_clamped_end() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut fade = Event::transition("X", 0.0, 10.0, 5.0);

        run(&mut fade, 2.5, &mut cache, &mut sink);
        assert!((cache.get("X") - 5.0).abs() < 1e-9);
        assert!(!fade.is_done());

        run(&mut fade, 3.0, &mut cache, &mut sink);
        assert!(fade.is_done());
        assert_eq!(cache.get("X"), 10.0);
        assert_eq!(sink.values("X").last(), Some(&10.0));
    }

    #[test]
    fn test_zero_duration_transition_is_instant_set() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut set = Event::transition("/speed", 0.2, 0.8, 0.0);
        run(&mut set, 0.0, &mut cache, &mut sink);
        assert!(set.is_done());
        assert_eq!(cache.get("/speed"), 0.8);
    }

    #[test]
    fn test_negative_duration_clamped() {
        let t = Transition::new("/a", 0.0, 1.0, -3.0);
        assert_eq!(t.duration, 0.0);
        assert_eq!(Sleep::new(-1.0).duration, 0.0);
    }

    #[test]
    fn test_trigger_sends_once_without_caching() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut trig = Event::trigger("/cues/bg1/rain/0");
        run(&mut trig, 0.1, &mut cache, &mut sink);
        run(&mut trig, 0.1, &mut cache, &mut sink);
        assert_eq!(sink.values("/cues/bg1/rain/0"), vec![1.0]);
        assert!(!cache.contains("/cues/bg1/rain/0"));
    }

    #[test]
    fn test_done_is_monotonic_and_readvance_is_inert() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut events = vec![
            Event::transition("X", 0.0, 1.0, 0.5),
            Event::sleep(0.5),
            Event::sequence(vec![Event::trigger("T"), Event::transition("X", 1.0, 0.0, 0.2)]),
            Event::stack(vec![Event::sleep(0.1), Event::transition("Y", 0.0, 1.0, 0.3)]),
        ];
        for event in events.iter_mut() {
            for _ in 0..20 {
                run(event, 0.1, &mut cache, &mut sink);
            }
            assert!(event.is_done(), "{} never finished", event);
        }

        cache.set("X", 0.42);
        cache.set("Y", 0.42);
        sink.clear();
        for event in events.iter_mut() {
            run(event, 0.0, &mut cache, &mut sink);
            run(event, 1.0, &mut cache, &mut sink);
            assert!(event.is_done());
        }
        assert_eq!(cache.get("X"), 0.42);
        assert_eq!(cache.get("Y"), 0.42);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_sequence_advances_one_child_at_a_time() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut seq = Event::sequence(vec![
            Event::transition("A", 0.0, 1.0, 0.25),
            Event::transition("B", 0.0, 1.0, 0.25),
        ]);

        run(&mut seq, 0.1, &mut cache, &mut sink);
        run(&mut seq, 0.1, &mut cache, &mut sink);
        assert_eq!(sink.values("A").len(), 2);
        assert!(sink.values("B").is_empty());

        // A finishes on this call; B has still not been touched
        run(&mut seq, 0.1, &mut cache, &mut sink);
        assert!(sink.values("B").is_empty());

        run(&mut seq, 0.1, &mut cache, &mut sink);
        assert_eq!(sink.values("A").len(), 3);
        assert_eq!(sink.values("B").len(), 1);
    }

    #[test]
    fn test_stack_advances_children_together() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut stack = Event::stack(vec![
            Event::transition("A", 0.0, 1.0, 1.0),
            Event::transition("B", 1.0, 0.0, 1.0),
        ]);
        for i in 1..=5 {
            run(&mut stack, 0.1, &mut cache, &mut sink);
            assert_eq!(sink.values("A").len(), i);
            assert_eq!(sink.values("B").len(), i);
        }
        assert!((cache.get("A") - 0.5).abs() < 1e-9);
        assert!((cache.get("B") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_done_after_last_child() {
        let mut cache = ControlCache::new();
        let mut sink = RecordingSink::new();
        let mut seq = Event::sequence(vec![Event::trigger("T"), Event::trigger("U")]);
        run(&mut seq, 0.0, &mut cache, &mut sink);
        assert!(!seq.is_done());
        run(&mut seq, 0.0, &mut cache, &mut sink);
        assert!(seq.is_done());
        assert!(Event::sequence(Vec::new()).is_done());
    }

    #[test]
    fn test_duration_of_tree() {
        let tree = Event::sequence(vec![
            Event::trigger("T"),
            Event::sleep(6.0),
            Event::stack(vec![
                Event::transition("A", 0.0, 1.0, 3.0),
                Event::transition("B", 0.0, 1.0, 6.0),
            ]),
        ]);
        assert_eq!(tree.duration(), 12.0);
        assert_eq!(tree.leaves().len(), 4);
    }

    #[test]
    fn test_manager_prunes_finished_events() {
        let sink = RecordingSink::new();
        let mut manager = EventManager::new(Box::new(sink.clone()));
        let quick = manager.add(Event::trigger("/go"));
        let slow = manager.add(Event::transition("/fade", 0.0, 1.0, 1.0));
        assert_eq!(manager.len(), 2);

        manager.advance(0.5);
        assert!(!manager.is_running(quick));
        assert!(manager.is_running(slow));
        assert!((manager.cache().get("/fade") - 0.5).abs() < 1e-9);

        manager.advance(0.6);
        assert!(manager.is_empty());
        assert_eq!(manager.cache().get("/fade"), 1.0);
        assert_eq!(sink.values("/go"), vec![1.0]);
    }
}
