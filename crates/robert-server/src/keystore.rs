//! Per-date server keys.
//!
//! Keys live in an immutable [`KeySnapshot`]. [`KeyRotation`] periodically
//! pulls a fresh window of keys from a [`DateKeySource`] and swaps the
//! snapshot in one step, so readers never see a partially updated map.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use robert_crypto::{hkdf_derive, CryptoError, EbidCipher, SERVER_KEY_LENGTH};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::error::KeySourceError;

const DERIVED_KEY_SALT: &[u8] = b"robert:server-key-salt:v1";

/// Read side of the key store.
pub trait KeyStore: Send + Sync {
    /// EBID cipher for `date`, or `None` when no key is retained.
    fn key_for_date(&self, date: NaiveDate) -> Option<Arc<EbidCipher>>;
}

/// Raw server key for one UTC date, as handed over by a key source.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DateKey {
    #[zeroize(skip)]
    pub date: NaiveDate,
    pub key: [u8; SERVER_KEY_LENGTH],
}

impl DateKey {
    pub fn new(date: NaiveDate, key: [u8; SERVER_KEY_LENGTH]) -> Self {
        Self { date, key }
    }
}

/// Immutable date → cipher map.
#[derive(Default)]
pub struct KeySnapshot {
    ciphers: BTreeMap<NaiveDate, Arc<EbidCipher>>,
}

impl KeySnapshot {
    pub fn from_keys(keys: &[DateKey]) -> Result<Self, CryptoError> {
        let mut ciphers = BTreeMap::new();
        for date_key in keys {
            ciphers.insert(date_key.date, Arc::new(EbidCipher::new(&date_key.key)?));
        }
        Ok(Self { ciphers })
    }

    pub fn get(&self, date: NaiveDate) -> Option<Arc<EbidCipher>> {
        self.ciphers.get(&date).cloned()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.ciphers.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.ciphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers.is_empty()
    }

    /// Earliest and latest retained dates.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.ciphers.keys().next()?;
        let last = self.ciphers.keys().next_back()?;
        Some((*first, *last))
    }
}

/// Key store backed by a swappable snapshot. Reads never take a lock.
#[derive(Default)]
pub struct SnapshotKeyStore {
    current: ArcSwap<KeySnapshot>,
}

impl SnapshotKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: KeySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Replace the whole snapshot.
    pub fn install(&self, snapshot: KeySnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<KeySnapshot> {
        self.current.load_full()
    }
}

impl KeyStore for SnapshotKeyStore {
    fn key_for_date(&self, date: NaiveDate) -> Option<Arc<EbidCipher>> {
        self.current.load().get(date)
    }
}

/// Where server keys come from (HSM, KMS, key file...).
#[async_trait]
pub trait DateKeySource: Send + Sync {
    /// Keys for every date in `first..=last` the source knows about.
    /// Missing dates are simply absent from the result.
    async fn keys_for_range(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<DateKey>, KeySourceError>;
}

/// Derives each date key from a master seed with HKDF-SHA256.
///
/// info = "robert:server-key:v1:{yyyymmdd}"
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeySource {
    seed: Vec<u8>,
}

impl DerivedKeySource {
    /// Seed must be at least 32 bytes.
    pub fn new(seed: &[u8]) -> Result<Self, KeySourceError> {
        if seed.len() < 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                got: seed.len(),
            }
            .into());
        }
        Ok(Self {
            seed: seed.to_vec(),
        })
    }

    pub fn derive(&self, date: NaiveDate) -> Result<DateKey, KeySourceError> {
        let info = format!("robert:server-key:v1:{}", date.format("%Y%m%d"));
        let key = hkdf_derive::<SERVER_KEY_LENGTH>(&self.seed, DERIVED_KEY_SALT, info.as_bytes())?;
        Ok(DateKey::new(date, key))
    }
}

#[async_trait]
impl DateKeySource for DerivedKeySource {
    async fn keys_for_range(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<DateKey>, KeySourceError> {
        first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| self.derive(date))
            .collect()
    }
}

/// Keeps a [`SnapshotKeyStore`] covering
/// `[today - retention_days, today + lookahead_days]`.
pub struct KeyRotation {
    clock: Arc<dyn Clock>,
    source: Arc<dyn DateKeySource>,
    store: Arc<SnapshotKeyStore>,
    retention_days: u32,
    lookahead_days: u32,
    interval: StdDuration,
}

impl KeyRotation {
    pub fn new(
        config: &ServerConfig,
        clock: Arc<dyn Clock>,
        source: Arc<dyn DateKeySource>,
        store: Arc<SnapshotKeyStore>,
    ) -> Self {
        Self {
            clock,
            source,
            store,
            retention_days: config.key_retention_days,
            lookahead_days: config.key_lookahead_days,
            interval: config.key_rotation_interval(),
        }
    }

    /// Dates the next refresh will ask for.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        let today = self.clock.now().date_naive();
        let first = today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MIN);
        let last = today
            .checked_add_days(Days::new(u64::from(self.lookahead_days)))
            .unwrap_or(NaiveDate::MAX);
        (first, last)
    }

    /// Fetch the current window and install it. Returns the number of dates
    /// now retained. On error the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, KeySourceError> {
        let (first, last) = self.window();
        let today = self.clock.now().date_naive();

        let mut keys = self.source.keys_for_range(first, last).await?;
        keys.retain(|k| k.date >= first && k.date <= last);
        let snapshot = KeySnapshot::from_keys(&keys)?;

        if !snapshot.contains(today) {
            warn!(%today, "no server key for today; EBIDs of today's epochs will be rejected");
        }
        let count = snapshot.len();
        self.store.install(snapshot);
        info!(dates = count, %first, %last, "installed server key snapshot");
        Ok(count)
    }

    pub fn interval(&self) -> StdDuration {
        self.interval
    }

    /// Refresh immediately, then every configured interval, until the task
    /// is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            // tokio panics on a zero period; hand-built configs skip validate().
            let period = self.interval.max(StdDuration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(count) => debug!(dates = count, "server key refresh complete"),
                    Err(e) => warn!(error = %e, "server key refresh failed; keeping previous snapshot"),
                }
            }
        })
    }
}
