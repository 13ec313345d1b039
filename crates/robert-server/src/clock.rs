//! Epoch and NTP arithmetic relative to a configured service start.
//!
//! The [`Clock`] is the only place that reads wall-clock time. Everything
//! else works from epoch indices.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use robert_crypto::TIME_LENGTH;

use crate::config::ServerConfig;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
pub const NTP_UNIX_OFFSET_SECS: i64 = 2_208_988_800;

const NTP_ERA: i64 = 1 << 32;

/// Source of time plus the epoch grid it is measured against.
///
/// Implementors provide `now` and the grid; all conversions are provided.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Instant of epoch 0.
    fn service_start(&self) -> DateTime<Utc>;

    fn epoch_duration(&self) -> Duration;

    /// Start instant of `epoch`.
    fn at_epoch(&self, epoch: u32) -> DateTime<Utc> {
        let offset = Duration::seconds(self.epoch_duration().num_seconds() * i64::from(epoch));
        self.service_start()
            .checked_add_signed(offset)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Epoch containing `instant`. Instants before the service start map to 0.
    fn as_epoch_id(&self, instant: DateTime<Utc>) -> u32 {
        let elapsed = (instant - self.service_start()).num_seconds();
        let duration = self.epoch_duration().num_seconds();
        if elapsed <= 0 || duration <= 0 {
            return 0;
        }
        u32::try_from(elapsed / duration).unwrap_or(u32::MAX)
    }

    fn current_epoch(&self) -> u32 {
        self.as_epoch_id(self.now())
    }

    fn epochs_per_day(&self) -> u32 {
        let duration = self.epoch_duration().num_seconds().max(1);
        u32::try_from(86_400 / duration).unwrap_or(1).max(1)
    }

    /// UTC calendar date on which `epoch` starts.
    fn date_of(&self, epoch: u32) -> NaiveDate {
        self.at_epoch(epoch).date_naive()
    }

    /// Seconds since 1900-01-01. Instants before 1900 clamp to 0.
    fn as_ntp_timestamp(&self, instant: DateTime<Utc>) -> u64 {
        u64::try_from(instant.timestamp() + NTP_UNIX_OFFSET_SECS).unwrap_or(0)
    }

    fn at_ntp_timestamp(&self, ntp: u64) -> DateTime<Utc> {
        let unix = i64::try_from(ntp).unwrap_or(i64::MAX) - NTP_UNIX_OFFSET_SECS;
        DateTime::<Utc>::from_timestamp(unix, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Rebuild an instant from the low 32 bits of an NTP timestamp
    /// (big-endian), choosing the NTP era that lands nearest to now.
    fn at_time32(&self, time: &[u8; TIME_LENGTH]) -> DateTime<Utc> {
        let low = i64::from(u32::from_be_bytes(*time));
        let now = i64::try_from(self.as_ntp_timestamp(self.now())).unwrap_or(i64::MAX);
        let era_base = now & !(NTP_ERA - 1);

        let nearest = [era_base - NTP_ERA, era_base, era_base + NTP_ERA]
            .into_iter()
            .map(|base| base + low)
            .filter(|candidate| *candidate >= 0)
            .min_by_key(|candidate| (candidate - now).abs())
            .unwrap_or(low);
        self.at_ntp_timestamp(nearest as u64)
    }
}

/// Wall-clock time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    service_start: DateTime<Utc>,
    epoch_duration: Duration,
}

impl SystemClock {
    pub fn new(service_start: DateTime<Utc>, epoch_duration: Duration) -> Self {
        Self {
            service_start,
            epoch_duration,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.service_start(), config.epoch_duration())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn service_start(&self) -> DateTime<Utc> {
        self.service_start
    }

    fn epoch_duration(&self) -> Duration {
        self.epoch_duration
    }
}

/// Clock whose current instant is set by hand. Used for tests and replay.
#[derive(Debug)]
pub struct FixedClock {
    service_start: DateTime<Utc>,
    epoch_duration: Duration,
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(service_start: DateTime<Utc>, epoch_duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            service_start,
            epoch_duration,
            now: Mutex::new(now),
        }
    }

    pub fn from_config(config: &ServerConfig, now: DateTime<Utc>) -> Self {
        Self::new(config.service_start(), config.epoch_duration(), now)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn service_start(&self) -> DateTime<Utc> {
        self.service_start
    }

    fn epoch_duration(&self) -> Duration {
        self.epoch_duration
    }
}
