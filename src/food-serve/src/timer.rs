use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Wall-clock stopwatch that logs when it starts and stops.
pub struct Timer {
    name: String,
    tstamp: Option<DateTime<Utc>>,
    duration: Option<Duration>,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        Timer {
            name: name.to_owned(),
            tstamp: None,
            duration: None,
        }
    }

    /// Create a timer that is already running
    pub fn new_start(name: &str) -> Self {
        let mut t = Timer::new(name);
        t.start();
        t
    }

    pub fn start(&mut self) {
        info!("{}: starting", self.name);

        self.tstamp = Some(Utc::now());
        self.duration = None;
    }

    /// Stop the timer and return the measured milliseconds.
    ///
    /// Stopping a timer that is not running keeps the previous measurement.
    pub fn stop(&mut self) -> i64 {
        match self.tstamp.take() {
            None => debug!("{}: not running!", self.name),
            Some(tstamp) => {
                let d = Utc::now() - tstamp;

                self.duration = Some(d);
                info!("{} duration: {} msec", self.name, d.num_milliseconds());
            }
        }

        self.duration()
    }

    pub fn duration(&self) -> i64 {
        self.duration.map_or(0, |d| d.num_milliseconds())
    }
}
