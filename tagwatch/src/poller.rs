//! Feed loop and update cursor
//!
//! Consumes the bot's at-least-once update feed exactly once per unit from
//! this consumer's point of view: the cursor is persisted *before* a unit's
//! side effect runs. A crash between persist and side effect loses that
//! unit's action instead of repeating it; the feed-consumption contract is
//! idempotent by construction.
//!
//! One invocation processes one fetched batch and returns. Repeated
//! invocation is the external scheduler's job.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tagwatch_client::bot::{BotClient, FeedUnit};
use tagwatch_core::callback::CallbackAction;
use tracing::{debug, error, info, warn};

use crate::compose::{self, ComposeError};
use crate::config::Config;
use crate::cursor::OffsetStore;
use crate::deploy;

/// Side effects of the approval flow, separated from feed bookkeeping so
/// the loop can be exercised without a live bot or manifest.
#[async_trait]
pub trait ApprovalSink {
    /// Acknowledges a callback press. Failures are the implementation's to
    /// report; they must not affect the cursor.
    async fn acknowledge(&self, query_id: &str, text: &str);

    /// Applies an approved (repository, version) pair.
    ///
    /// Returns an error only when the run as a whole must stop; per-unit
    /// failures are reported and swallowed, the cursor having already
    /// advanced past the unit.
    async fn apply(&self, repository: &str, version: &str) -> Result<()>;
}

/// Polls the feed and drives units through the cursor protocol.
pub struct FeedPoller<S> {
    bot: BotClient,
    store: OffsetStore,
    sink: S,
}

impl<S: ApprovalSink> FeedPoller<S> {
    pub fn new(bot: BotClient, store: OffsetStore, sink: S) -> Self {
        Self { bot, store, sink }
    }

    /// Runs one poll: a single fetched batch, processed in feed order.
    /// Returns the number of units processed.
    pub async fn run_once(&self) -> Result<usize> {
        let cursor = self.store.load().context("Failed to read feed cursor")?;
        debug!("Polling feed (cursor: {:?})", cursor);

        let units = match self.bot.get_updates(cursor).await {
            Ok(units) => units,
            Err(e) => {
                // An unreachable feed is a no-data poll, not a failed run.
                warn!("Feed fetch failed: {}", e);
                return Ok(0);
            }
        };

        self.process_batch(cursor, units).await
    }

    async fn process_batch(&self, mut cursor: Option<i64>, units: Vec<FeedUnit>) -> Result<usize> {
        let mut processed = 0;

        for unit in units {
            // At-least-once feed: units below the cursor were fully handled
            // by a previous run and must not be acted on again.
            if cursor.is_some_and(|c| unit.update_id < c) {
                debug!("Skipping redelivered unit {}", unit.update_id);
                continue;
            }

            // Persist before acting. From here on, a crash loses this
            // unit's side effect rather than repeating it.
            let next = unit.update_id + 1;
            self.store
                .advance(next)
                .context("Failed to persist feed cursor")?;
            cursor = Some(next);

            self.handle_unit(&unit).await?;
            processed += 1;
        }

        Ok(processed)
    }

    async fn handle_unit(&self, unit: &FeedUnit) -> Result<()> {
        let Some(query) = unit.callback_query.as_ref() else {
            debug!("Unit {} carries no callback, skipping", unit.update_id);
            return Ok(());
        };
        let Some(payload) = query.data.as_deref() else {
            debug!("Callback {} carries no payload, skipping", query.id);
            return Ok(());
        };

        if let Some(user) = query.from.as_ref().and_then(|u| u.username.as_deref()) {
            info!("Button pressed by @{}: {}", user, payload);
        }

        match CallbackAction::decode(payload) {
            CallbackAction::Approve {
                repository,
                version,
            } => {
                self.sink
                    .acknowledge(&query.id, &format!("✅ Approved {repository}:{version}"))
                    .await;
                self.sink.apply(&repository, &version).await?;
            }
            CallbackAction::Reject => {
                info!("Update rejected");
                self.sink.acknowledge(&query.id, "❌ Update rejected").await;
            }
            CallbackAction::Unknown => {
                warn!(
                    "Unrecognized callback payload on unit {}, skipping",
                    unit.update_id
                );
            }
        }

        Ok(())
    }
}

/// Production sink: acknowledge via the bot, mutate the manifest, launch
/// the redeploy.
pub struct ComposeDeploySink {
    bot: BotClient,
    config: Config,
    service_map: HashMap<String, String>,
}

impl ComposeDeploySink {
    pub fn new(bot: BotClient, config: Config, service_map: HashMap<String, String>) -> Self {
        Self {
            bot,
            config,
            service_map,
        }
    }

    fn compose_dir(&self) -> PathBuf {
        self.config
            .compose_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[async_trait]
impl ApprovalSink for ComposeDeploySink {
    async fn acknowledge(&self, query_id: &str, text: &str) {
        if let Err(e) = self.bot.answer_callback(query_id, text).await {
            warn!("Failed to answer callback {}: {}", query_id, e);
        }
    }

    async fn apply(&self, repository: &str, version: &str) -> Result<()> {
        let service = match compose::apply(
            &self.config.compose_path,
            &self.service_map,
            repository,
            version,
        ) {
            Ok(service) => service,
            Err(e @ ComposeError::Parse(_)) => {
                // A manifest that no longer parses is not something later
                // units can fix; stop the run before anything else touches
                // it.
                return Err(e).context("Manifest mutation aborted");
            }
            Err(e) => {
                error!("Skipping update for {}: {}", repository, e);
                return Ok(());
            }
        };

        match deploy::trigger(&self.compose_dir()) {
            Ok(mut handle) => {
                info!(
                    "Redeploying {}:{} (service {}, pid {}, logs: {} / {})",
                    repository,
                    version,
                    service,
                    handle.pid(),
                    handle.stdout_log.display(),
                    handle.stderr_log.display()
                );
                if !handle.is_running() {
                    warn!(
                        "Deployment process {} exited immediately, check its logs",
                        handle.pid()
                    );
                }
            }
            Err(e) => error!("Deployment launch failed for {}: {:#}", service, e),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tagwatch_client::bot::CallbackQuery;

    /// Records every sink call; optionally observes the cursor file at
    /// apply time to prove persist-before-act ordering.
    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<(String, String)>>,
        acknowledged: Mutex<Vec<String>>,
        cursor_at_apply: Mutex<Vec<Option<i64>>>,
        observe: Option<OffsetStore>,
    }

    #[async_trait]
    impl ApprovalSink for RecordingSink {
        async fn acknowledge(&self, query_id: &str, _text: &str) {
            self.acknowledged.lock().unwrap().push(query_id.to_string());
        }

        async fn apply(&self, repository: &str, version: &str) -> Result<()> {
            if let Some(store) = &self.observe {
                self.cursor_at_apply
                    .lock()
                    .unwrap()
                    .push(store.load().unwrap());
            }
            self.applied
                .lock()
                .unwrap()
                .push((repository.to_string(), version.to_string()));
            Ok(())
        }
    }

    fn unit(id: i64, data: Option<&str>) -> FeedUnit {
        FeedUnit {
            update_id: id,
            callback_query: data.map(|d| CallbackQuery {
                id: format!("q{id}"),
                from: None,
                data: Some(d.to_string()),
            }),
        }
    }

    fn approve(repository: &str, version: &str) -> String {
        format!(r#"{{"a":"approve","i":"{repository}","v":"{version}"}}"#)
    }

    fn poller(store: OffsetStore, sink: RecordingSink) -> FeedPoller<RecordingSink> {
        FeedPoller::new(BotClient::new("http://unreachable.invalid/botX"), store, sink)
    }

    #[tokio::test]
    async fn cursor_lands_past_the_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("offset.txt"));
        let p = poller(store.clone(), RecordingSink::default());

        let batch = vec![
            unit(5, Some(&approve("acme/app", "2.0"))),
            unit(6, None),
            unit(7, Some("reject")),
        ];

        let processed = p.process_batch(None, batch).await.unwrap();
        assert_eq!(processed, 3);
        assert_eq!(store.load().unwrap(), Some(8));
        assert_eq!(
            *p.sink.applied.lock().unwrap(),
            vec![("acme/app".to_string(), "2.0".to_string())]
        );
        assert_eq!(*p.sink.acknowledged.lock().unwrap(), vec!["q5", "q7"]);
    }

    #[tokio::test]
    async fn redelivered_units_are_never_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("offset.txt"));
        store.advance(8).unwrap();
        let p = poller(store.clone(), RecordingSink::default());

        // The whole batch comes back (persist succeeded, side effects are
        // a previous run's concern): nothing runs, the cursor holds.
        let batch = vec![
            unit(5, Some(&approve("acme/app", "2.0"))),
            unit(6, None),
            unit(7, Some("reject")),
        ];

        let processed = p.process_batch(Some(8), batch).await.unwrap();
        assert_eq!(processed, 0);
        assert_eq!(store.load().unwrap(), Some(8));
        assert!(p.sink.applied.lock().unwrap().is_empty());
        assert!(p.sink.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cursor_persists_before_the_side_effect_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("offset.txt"));
        let sink = RecordingSink {
            observe: Some(store.clone()),
            ..RecordingSink::default()
        };
        let p = poller(store.clone(), sink);

        let batch = vec![
            unit(5, Some(&approve("acme/app", "2.0"))),
            unit(6, Some(&approve("acme/db", "16.2"))),
        ];

        p.process_batch(None, batch).await.unwrap();

        // At each apply, the persisted cursor already points past the unit.
        assert_eq!(
            *p.sink.cursor_at_apply.lock().unwrap(),
            vec![Some(6), Some(7)]
        );
    }

    #[tokio::test]
    async fn unknown_payloads_advance_the_cursor_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("offset.txt"));
        let p = poller(store.clone(), RecordingSink::default());

        let batch = vec![
            unit(10, Some(r#"{"a":"snooze","i":"acme/app","v":"2.0"}"#)),
            unit(11, Some("not json")),
        ];

        let processed = p.process_batch(None, batch).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.load().unwrap(), Some(12));
        assert!(p.sink.applied.lock().unwrap().is_empty());
        assert!(p.sink.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_acknowledges_without_applying() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("offset.txt"));
        let p = poller(store.clone(), RecordingSink::default());

        let processed = p
            .process_batch(None, vec![unit(3, Some("reject"))])
            .await
            .unwrap();

        assert_eq!(processed, 1);
        assert_eq!(store.load().unwrap(), Some(4));
        assert!(p.sink.applied.lock().unwrap().is_empty());
        assert_eq!(*p.sink.acknowledged.lock().unwrap(), vec!["q3"]);
    }
}
