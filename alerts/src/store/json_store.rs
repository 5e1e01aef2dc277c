//! JsonFileStore
//! -------------
//! File-backed implementation of [`AlertStore`]. The whole alert set lives in a
//! single JSON object keyed by lower-cased token address:
//!
//! ```json
//! {
//!   "0xabc...": {
//!     "vwap_level": 0.0012,
//!     "ticker": "PEPE",
//!     "current_price": 0.00118,
//!     "user": "alice",
//!     "profile_pic": "https://cdn.example/alice.png",
//!     "last_alert_time": "2024-11-05T12:34:56.123456Z"
//!   }
//! }
//! ```
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the snapshot,
//! so a crash mid-save leaves the previous snapshot intact.
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AlertStore;
use crate::model::{AlertRecord, Owner, normalize_token_id, stored_precision};

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "alerts.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// On-disk shape of one alert. Field names are kept compatible with
/// snapshots written by earlier releases.
#[derive(Debug, Serialize, Deserialize)]
struct StoredAlert {
    vwap_level: f64,
    ticker: String,
    current_price: f64,
    user: String,
    profile_pic: String,
    #[serde(default, with = "timestamp")]
    last_alert_time: Option<DateTime<Utc>>,
}

impl StoredAlert {
    fn into_record(self, token_id: &str) -> AlertRecord {
        AlertRecord {
            token_id: normalize_token_id(token_id),
            target_price: self.vwap_level,
            ticker: self.ticker,
            owner: Owner::new(self.user, self.profile_pic),
            last_known_price: self.current_price,
            last_alert_at: self.last_alert_time.map(stored_precision),
        }
    }
}

impl From<&AlertRecord> for StoredAlert {
    fn from(r: &AlertRecord) -> Self {
        Self {
            vwap_level: r.target_price,
            ticker: r.ticker.clone(),
            current_price: r.last_known_price,
            user: r.owner.display_name.clone(),
            profile_pic: r.owner.avatar_ref.clone(),
            last_alert_time: r.last_alert_at,
        }
    }
}

#[async_trait]
impl AlertStore for JsonFileStore {
    async fn load(&self) -> anyhow::Result<Vec<AlertRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let snapshot: BTreeMap<String, StoredAlert> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        let mut records: Vec<AlertRecord> = Vec::with_capacity(snapshot.len());
        for (key, stored) in snapshot {
            let record = stored.into_record(&key);
            if records.iter().any(|r| r.token_id == record.token_id) {
                anyhow::bail!(
                    "{} lists token {} under more than one key",
                    self.path.display(),
                    record.token_id
                );
            }
            records.push(record);
        }

        Ok(records)
    }

    async fn save(&self, alerts: &[AlertRecord]) -> anyhow::Result<()> {
        let snapshot: BTreeMap<&str, StoredAlert> = alerts
            .iter()
            .map(|r| (r.token_id.as_str(), StoredAlert::from(r)))
            .collect();

        let json = serde_json::to_vec_pretty(&snapshot).context("encoding alert snapshot")?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}

/// `Option<DateTime<Utc>>` as an RFC 3339 UTC string (`...Z`) or `null`.
///
/// Also reads the space-separated `YYYY-MM-DD HH:MM:SS[.ffffff]+00:00` form
/// found in older snapshots.
pub(crate) mod timestamp {
    use chrono::{DateTime, FixedOffset, ParseResult, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(raw: &str) -> ParseResult<DateTime<Utc>> {
        let raw = raw.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, LEGACY_FORMAT))
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(v: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(ts) => s.serialize_some(&format(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| {
                parse(&raw).map_err(|e| {
                    serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}"))
                })
            })
            .transpose()
    }
}
