//! Application state: configuration, model client, and the injected document stores.
//!
//! This module owns:
//!   - the practice bank (loaded once, rewritten after each import)
//!   - per-device progress (device id -> bank item id -> record)
//!   - the optional Gemini client
//!
//! Every mutation flushes its document through the store and reports the outcome.

use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::{now_epoch_secs, BankItem, ProgressRecord};
use crate::gemini::Gemini;
use crate::store::{DocumentStore, JsonFileStore, StoreError};

pub const DEFAULT_DEVICE: &str = "default";

pub type ProgressBook = BTreeMap<String, BTreeMap<String, ProgressRecord>>;

pub type BankStore = Arc<dyn DocumentStore<Vec<BankItem>>>;
pub type ProgressStore = Arc<dyn DocumentStore<ProgressBook>>;

pub struct AppState {
    pub config: AppConfig,
    pub gemini: Option<Gemini>,
    bank: RwLock<Vec<BankItem>>,
    progress: RwLock<ProgressBook>,
    bank_store: BankStore,
    progress_store: ProgressStore,
}

/// `None` or blank device ids share the "default" bucket.
pub fn device_key(device_id: Option<&str>) -> String {
    device_id
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DEVICE)
        .to_string()
}

/// Write a snapshot on the blocking pool. Callers keep their write guard across the
/// await so saves land in mutation order.
async fn persist<T>(store: &Arc<dyn DocumentStore<T>>, doc: &T) -> Result<(), StoreError>
where
    T: Clone + Send + 'static,
{
    let store = Arc::clone(store);
    let doc = doc.clone();
    tokio::task::spawn_blocking(move || store.save(&doc)).await?
}

impl AppState {
    /// Build state backed by JSON files under `config.data_dir`.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let bank_file = JsonFileStore::<Vec<BankItem>>::new(config.bank_path());
        let progress_file = JsonFileStore::<ProgressBook>::new(config.progress_path());
        info!(
            target: "transcorrect",
            bank = %bank_file.path().display(),
            progress = %progress_file.path().display(),
            "Document stores"
        );
        let bank_store: BankStore = Arc::new(bank_file);
        let progress_store: ProgressStore = Arc::new(progress_file);

        let gemini = Gemini::from_config(&config);
        if let Some(g) = &gemini {
            info!(target: "transcorrect", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
        } else {
            info!(target: "transcorrect", "Gemini disabled (no GEMINI_API_KEY). Only the offline analyzer is available.");
        }

        Self::with_stores(config, gemini, bank_store, progress_store)
    }

    /// Load both documents from the given stores.
    pub fn with_stores(
        config: AppConfig,
        gemini: Option<Gemini>,
        bank_store: BankStore,
        progress_store: ProgressStore,
    ) -> Result<Self, StoreError> {
        let bank = bank_store.load()?.unwrap_or_default();
        let progress = match progress_store.load() {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                // Progress is advisory; start fresh rather than refusing to boot.
                error!(target: "progress", error = %e, "Failed to load progress; starting empty");
                ProgressBook::new()
            }
        };

        let devices = progress.len();
        info!(target: "bank", items = bank.len(), devices, "Startup inventory");

        Ok(Self {
            config,
            gemini,
            bank: RwLock::new(bank),
            progress: RwLock::new(progress),
            bank_store,
            progress_store,
        })
    }

    /// Consistent copy of the bank for read-side filtering.
    pub async fn bank_snapshot(&self) -> Vec<BankItem> {
        self.bank.read().await.clone()
    }

    /// Append (or replace with) freshly parsed items and persist the bank.
    /// The in-memory bank is updated even when the save fails.
    #[instrument(level = "info", skip(self, items), fields(count = items.len()))]
    pub async fn import_items(&self, items: Vec<BankItem>, replace: bool) -> Result<(), StoreError> {
        let mut bank = self.bank.write().await;
        if replace {
            bank.clear();
        }
        bank.extend(items);
        persist(&self.bank_store, &*bank).await
    }

    /// All progress records for one device.
    pub async fn progress_for(&self, device: &str) -> BTreeMap<String, ProgressRecord> {
        self.progress.read().await.get(device).cloned().unwrap_or_default()
    }

    /// Record a graded attempt against a bank item.
    #[instrument(level = "debug", skip(self))]
    pub async fn record_attempt(
        &self,
        device: &str,
        item_id: &str,
        score: i64,
        min_score: i64,
    ) -> Result<ProgressRecord, StoreError> {
        self.update_progress(device, item_id, |rec| {
            rec.last_score = Some(score);
            if score >= min_score {
                rec.completed = true;
            }
        })
        .await
    }

    /// Explicitly mark an item (un)completed.
    #[instrument(level = "debug", skip(self))]
    pub async fn mark_progress(
        &self,
        device: &str,
        item_id: &str,
        score: Option<i64>,
        completed: bool,
    ) -> Result<ProgressRecord, StoreError> {
        self.update_progress(device, item_id, |rec| {
            rec.completed = completed;
            if score.is_some() {
                rec.last_score = score;
            }
        })
        .await
    }

    async fn update_progress<F>(&self, device: &str, item_id: &str, apply: F) -> Result<ProgressRecord, StoreError>
    where
        F: FnOnce(&mut ProgressRecord),
    {
        let mut book = self.progress.write().await;
        let rec = book
            .entry(device.to_string())
            .or_default()
            .entry(item_id.to_string())
            .or_default();
        rec.attempts += 1;
        apply(rec);
        rec.updated_at = now_epoch_secs();
        let out = rec.clone();

        if let Err(e) = persist(&self.progress_store, &*book).await {
            warn!(target: "progress", %device, %item_id, error = %e, "Progress not persisted");
            return Err(e);
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::store::MemoryStore;

    struct FailingSaves;

    impl<T> DocumentStore<T> for FailingSaves {
        fn load(&self) -> Result<Option<T>, StoreError> {
            Ok(None)
        }
        fn save(&self, _: &T) -> Result<(), StoreError> {
            Err(StoreError::Write {
                path: "progress.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[test]
    fn blank_device_ids_share_default() {
        assert_eq!(device_key(None), "default");
        assert_eq!(device_key(Some("  ")), "default");
        assert_eq!(device_key(Some("ipad")), "ipad");
    }

    #[tokio::test]
    async fn attempts_accumulate_and_threshold_applies() {
        let state = memory_state(test_config(), vec![]);
        let rec = state.record_attempt("d", "item", 55, 60).await.unwrap();
        assert_eq!(rec.attempts, 1);
        assert!(!rec.completed);
        let rec = state.record_attempt("d", "item", 80, 60).await.unwrap();
        assert_eq!(rec.attempts, 2);
        assert!(rec.completed);
        assert_eq!(rec.last_score, Some(80));
        assert!(state.progress_for("other").await.is_empty());
    }

    #[tokio::test]
    async fn mark_keeps_previous_score_when_none_given() {
        let state = memory_state(test_config(), vec![]);
        state.mark_progress("d", "i", Some(70), true).await.unwrap();
        let rec = state.mark_progress("d", "i", None, false).await.unwrap();
        assert_eq!(rec.last_score, Some(70));
        assert!(!rec.completed);
        assert_eq!(rec.attempts, 2);
    }

    #[tokio::test]
    async fn import_replace_and_persist() {
        let bank_store = Arc::new(MemoryStore::<Vec<BankItem>>::new());
        let state = AppState::with_stores(
            test_config(),
            None,
            bank_store.clone(),
            Arc::new(MemoryStore::<ProgressBook>::new()),
        )
        .unwrap();
        let a = BankItem::new("a".into(), vec![], vec![], 1).unwrap();
        let b = BankItem::new("b".into(), vec![], vec![], 2).unwrap();
        state.import_items(vec![a], false).await.unwrap();
        state.import_items(vec![b.clone()], true).await.unwrap();
        assert_eq!(state.bank_snapshot().await, vec![b.clone()]);
        assert_eq!(bank_store.load().unwrap(), Some(vec![b]));
    }

    #[tokio::test]
    async fn file_backed_state_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.data_dir = dir.path().to_path_buf();

        let state = AppState::from_config(config.clone()).unwrap();
        let item = BankItem::new("持久化".into(), vec![], vec!["disk".into()], 3).unwrap();
        state.import_items(vec![item.clone()], false).await.unwrap();
        state.mark_progress("ipad", &item.id, Some(88), true).await.unwrap();

        let reloaded = AppState::from_config(config).unwrap();
        assert_eq!(reloaded.bank_snapshot().await, vec![item.clone()]);
        let progress = reloaded.progress_for("ipad").await;
        assert_eq!(progress[&item.id].last_score, Some(88));
        assert!(!dir.path().join("progress.json.tmp").exists());
    }

    #[tokio::test]
    async fn save_failures_are_reported_not_swallowed() {
        let state = AppState::with_stores(
            test_config(),
            None,
            Arc::new(MemoryStore::<Vec<BankItem>>::new()),
            Arc::new(FailingSaves),
        )
        .unwrap();
        assert!(state.mark_progress("d", "i", None, true).await.is_err());
        // The in-memory view still reflects the update.
        assert!(state.progress_for("d").await["i"].completed);
    }
}
