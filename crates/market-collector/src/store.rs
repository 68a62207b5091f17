use std::path::{Path, PathBuf};

use market_core::artifact::{file_timestamp, read_json_opt, write_json_versioned};
use market_core::{Market, MarketSnapshot, StoreError};

/// Per-market snapshot archive: `<root>/<market>/<market>_data_<ts>.json` plus
/// `latest_<market>_data.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    market: Market,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>, market: Market) -> Self {
        Self {
            root: root.into(),
            market,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(self.market.key())
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir().join(latest_file_name(self.market))
    }

    /// Archive `snapshot` and repoint "latest" at it. Returns the archived path.
    pub async fn save(&self, snapshot: &MarketSnapshot) -> Result<PathBuf, StoreError> {
        let key = self.market.key();
        let versioned = format!("{}_data_{}.json", key, file_timestamp(snapshot.collected_at));
        write_json_versioned(&self.dir(), &versioned, &latest_file_name(self.market), snapshot).await
    }

    pub async fn latest(&self) -> Result<Option<MarketSnapshot>, StoreError> {
        read_json_opt(&self.latest_path()).await
    }
}

fn latest_file_name(market: Market) -> String {
    format!("latest_{}_data.json", market.key())
}

/// Latest snapshot for `market` under `data_dir`, without building a collector.
pub async fn load_latest(data_dir: &Path, market: Market) -> Result<Option<MarketSnapshot>, StoreError> {
    SnapshotStore::new(data_dir, market).latest().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use market_core::{CollectionMetadata, CollectionStatus, SentimentSnapshot};

    fn snapshot(market: Market) -> MarketSnapshot {
        MarketSnapshot {
            market,
            collected_at: Utc.with_ymd_and_hms(2024, 1, 3, 8, 30, 0).unwrap(),
            sub_markets: Vec::new(),
            sentiment: SentimentSnapshot::default(),
            news: Vec::new(),
            metadata: CollectionMetadata {
                status: CollectionStatus::Success,
                sources_ok: vec!["Yahoo Finance".to_string()],
                sources_failed: Vec::new(),
                fallback_symbols: Vec::new(),
                note: None,
            },
        }
    }

    #[tokio::test]
    async fn test_save_writes_archive_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), Market::Commodity);

        assert!(store.latest().await.unwrap().is_none());

        let path = store.save(&snapshot(Market::Commodity)).await.unwrap();
        assert_eq!(path, dir.path().join("gold").join("gold_data_20240103_083000.json"));
        assert!(dir.path().join("gold").join("latest_gold_data.json").exists());

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest, snapshot(Market::Commodity));
    }

    #[tokio::test]
    async fn test_markets_are_namespaced() {
        let dir = tempfile::tempdir().unwrap();
        SnapshotStore::new(dir.path(), Market::DomesticEquity)
            .save(&snapshot(Market::DomesticEquity))
            .await
            .unwrap();

        assert!(load_latest(dir.path(), Market::ForeignEquity).await.unwrap().is_none());
        assert!(load_latest(dir.path(), Market::DomesticEquity).await.unwrap().is_some());
    }
}
