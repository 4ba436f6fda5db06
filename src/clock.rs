// Time source for every "now" decision in the core (past check-in, cancellation window, timestamps)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and seeding.
#[derive(Debug)]
pub struct FixedClock {
    time: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(time),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write() = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut time = self.time.write();
        *time += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read()
    }
}

/// Midnight UTC of a date; check-in instants are measured from here.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let start = start_of_day(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), clock.now());

        clock.advance(Duration::hours(25));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        assert_eq!(clock.now() - start, Duration::hours(25));
    }
}
