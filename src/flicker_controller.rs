//! Light flicker feedback when a visitor turns a knob.

use crate::catalogue::LightControls;
use crate::config::FlickerConfig;
use crate::event::{Event, EventId, EventManager};
use crate::simulation::{ParamName, Simulation};
use crate::transitions::flicker;
use log::debug;

/// Flick period of tubes and fast lantern flicks (seconds).
const PERIOD: f64 = 1.0;
/// Flick period of the slow lantern pattern (seconds).
const SLOW_PERIOD: f64 = 2.0;

pub struct LightFlickerController {
    config: FlickerConfig,
    high: f64,
    running: Option<EventId>,
    since_last: f64,
}

impl LightFlickerController {
    pub fn new(config: &FlickerConfig, max_brightness: f64) -> Self {
        Self {
            config: config.clone(),
            high: max_brightness,
            running: None,
            // allow a flicker straight away
            since_last: f64::INFINITY,
        }
    }

    pub fn update(
        &mut self,
        dt: f64,
        simulation: &Simulation,
        controls: &LightControls,
        events: &mut EventManager,
    ) {
        self.since_last += dt;
        if self.running.map_or(false, |id| events.is_running(id)) {
            return;
        }
        if self.since_last < self.config.cooldown {
            return;
        }

        let changed = ParamName::ALL
            .into_iter()
            .find(|p| simulation.param_changed(*p));
        if let Some(param) = changed {
            debug!("{} changed, flickering", param);
            let pattern = self.pattern(param, controls);
            self.running = Some(events.add(pattern));
            self.since_last = 0.0;
        }
    }

    fn flick(&self, address: &str, n: usize, period: f64) -> Event {
        flicker(address, n, period, self.high, self.config.low)
    }

    fn delayed(delay: f64, event: Event) -> Event {
        Event::sequence(vec![Event::sleep(delay), event])
    }

    /// One, two or three flicks by parameter, across the side tubes, centre
    /// tube and lanterns.
    fn pattern(&self, param: ParamName, c: &LightControls) -> Event {
        let [tube1, tube2, tube3] = &c.tubes;
        let [lantern1, lantern2] = &c.lanterns;
        let side = |n| vec![self.flick(tube1, n, PERIOD), self.flick(tube3, n, PERIOD)];

        let mut parts = match param {
            ParamName::ClimateChange => side(1),
            ParamName::HumanActivity => side(2),
            ParamName::Fate => side(3),
        };
        match param {
            ParamName::ClimateChange => {
                parts.push(Self::delayed(
                    0.5,
                    Event::stack(vec![
                        self.flick(tube2, 1, PERIOD),
                        self.flick(lantern1, 1, PERIOD),
                        self.flick(lantern2, 1, PERIOD),
                    ]),
                ));
            }
            ParamName::HumanActivity => {
                parts.push(Self::delayed(0.5, self.flick(tube2, 2, PERIOD)));
                parts.push(self.flick(lantern1, 2, SLOW_PERIOD));
                parts.push(Self::delayed(1.0, self.flick(lantern2, 2, SLOW_PERIOD)));
            }
            ParamName::Fate => {
                parts.push(Self::delayed(0.5, self.flick(tube2, 3, PERIOD)));
                parts.push(self.flick(lantern1, 3, PERIOD));
                parts.push(Self::delayed(0.5, self.flick(lantern2, 3, PERIOD)));
            }
        }
        Event::stack(parts)
    }
}
