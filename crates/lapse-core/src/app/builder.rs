//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）：設定の不備は最初の sweep ではなく `build()` で検出する
//! - store / clock はテストから差し替え可能

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};

use super::executor::TransitionExecutor;
use super::sweeper::{SweepOptions, Sweeper};
use super::trigger::{DailyTrigger, TriggerHandle};
use crate::domain::{DeadlinePolicy, StoreError, SweepError, SweepReport};
use crate::impls::{HttpQuoteStore, HttpStoreOptions, InMemoryQuoteStore};
use crate::ports::{Clock, QuoteStore, SystemClock, UlidGenerator};
use crate::settings::{ConfigError, Settings, StoreKind};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot set up quote store: {0}")]
    Store(#[from] StoreError),
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(Settings::load(None)?).build()?;
/// let report = app.run_once().await?;
/// ```
///
/// # Fail-fast 設計
/// - `Settings::validate()` を build() の最初に実行
/// - store を明示しなければ settings から HTTP / InMemory を組み立てる
pub struct AppBuilder {
    settings: Settings,
    store: Option<Arc<dyn QuoteStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            store: None,
            clock: None,
        }
    }

    /// Use this store instead of the one described by `store.*` settings.
    pub fn with_store(mut self, store: Arc<dyn QuoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let settings = self.settings;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let store = match self.store {
            Some(store) => {
                // an injected store makes the store.* section irrelevant
                let mut checked = settings.clone();
                checked.store.kind = StoreKind::Memory;
                checked.store.seed_file = None;
                checked.validate()?;
                store
            }
            None => {
                settings.validate()?;
                store_from_settings(&settings, clock.clone())?
            }
        };
        let run_at = settings.schedule.run_at_time()?;

        let sweep = &settings.sweep;
        let executor = TransitionExecutor::with_identity(
            store.clone(),
            sweep.system_actor.clone(),
            sweep.note_text.clone(),
        );
        let sweeper = Sweeper::new(
            store,
            Arc::new(DeadlinePolicy::new(sweep.date_format.clone())),
            executor,
            clock.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
            SweepOptions {
                concurrency: sweep.concurrency,
                reconcile_missing_notes: sweep.reconcile_missing_notes,
            },
        );

        Ok(App {
            sweeper: Arc::new(sweeper),
            clock,
            run_at,
            run_on_start: settings.schedule.run_on_start,
            settings,
        })
    }
}

fn store_from_settings(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn QuoteStore>, BuildError> {
    let store: Arc<dyn QuoteStore> = match settings.store.kind {
        StoreKind::Http => {
            let options = HttpStoreOptions {
                connect_timeout: Duration::from_secs(settings.store.connect_timeout_secs),
                request_timeout: Duration::from_secs(settings.store.request_timeout_secs),
                auth_token: settings.store.auth_token.clone(),
            };
            Arc::new(HttpQuoteStore::new(
                settings.store_base_url()?,
                options,
                clock,
            )?)
        }
        StoreKind::Memory => match &settings.store.seed_file {
            Some(path) => Arc::new(InMemoryQuoteStore::from_json_file(path, clock)?),
            None => Arc::new(InMemoryQuoteStore::new(clock)),
        },
    };
    Ok(store)
}

/// A wired sweeper plus its schedule.
pub struct App {
    sweeper: Arc<Sweeper>,
    clock: Arc<dyn Clock>,
    run_at: NaiveTime,
    run_on_start: bool,
    settings: Settings,
}

impl App {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sweeper(&self) -> Arc<Sweeper> {
        self.sweeper.clone()
    }

    pub fn run_at(&self) -> NaiveTime {
        self.run_at
    }

    /// One sweep for the clock's current date.
    pub async fn run_once(&self) -> Result<SweepReport, SweepError> {
        self.sweeper.run().await
    }

    /// One sweep as if today were `today`.
    pub async fn run_for(&self, today: NaiveDate) -> Result<SweepReport, SweepError> {
        self.sweeper.run_for(today).await
    }

    pub fn trigger(&self) -> DailyTrigger {
        DailyTrigger::new(self.sweeper.clone(), self.clock.clone(), self.run_at)
            .run_on_start(self.run_on_start)
    }

    /// Start the daily trigger on the current runtime.
    pub fn serve(&self) -> TriggerHandle {
        self.trigger().spawn()
    }
}
