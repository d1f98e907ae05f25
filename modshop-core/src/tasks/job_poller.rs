// modshop-core/src/tasks/job_poller.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use modshop_common::error::Error;
use modshop_common::models::JobStatus;
use modshop_common::traits::messaging_traits::MessageSender;

use crate::services::admin_directory::AdminDirectory;
use crate::services::ledger_service::LedgerService;

/// Pending jobs older than this mean the worker is probably down.
pub const STALE_AFTER_MINUTES: i64 = 20;
/// Minimum spacing between two "worker offline" alerts.
pub const OFFLINE_ALERT_COOLDOWN_MINUTES: i64 = 30;

/// Delivers results of the external account-creation worker and watches
/// for it going quiet.
pub struct JobPoller {
    ledger: Arc<LedgerService>,
    sender: Arc<dyn MessageSender + Send + Sync>,
    admins: Arc<AdminDirectory>,
    last_offline_alert: Option<DateTime<Utc>>,
    /// Jobs already announced whose status update did not stick.
    unmarked: HashMap<i32, JobStatus>,
}

impl JobPoller {
    pub fn new(
        ledger: Arc<LedgerService>,
        sender: Arc<dyn MessageSender + Send + Sync>,
        admins: Arc<AdminDirectory>,
    ) -> Self {
        Self {
            ledger,
            sender,
            admins,
            last_offline_alert: None,
            unmarked: HashMap::new(),
        }
    }

    /// One polling pass. A failure on one job does not stop the others.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        for job in self.ledger.actionable_jobs().await? {
            if let Some(&next) = self.unmarked.get(&job.job_id) {
                if self.ledger.mark_job(job.job_id, next).await.is_ok() {
                    self.unmarked.remove(&job.job_id);
                }
                continue;
            }
            let next = match job.status {
                JobStatus::Completed => {
                    info!("Delivering completed job {} to {}", job.job_id, job.user_id);
                    let mut msg = String::from("Your account is ready!");
                    if let Some(result) = &job.result_message {
                        msg.push_str("\n\n");
                        msg.push_str(result);
                    }
                    self.sender.send_text(&job.user_id, &msg).await;
                    JobStatus::Delivered
                }
                JobStatus::Failed => {
                    warn!("Creation job {} for {} failed", job.job_id, job.user_id);
                    self.sender
                        .send_text(
                            &job.user_id,
                            "Sorry, we couldn't create your account automatically. An admin has been notified and will assist you.",
                        )
                        .await;
                    self.admins
                        .alert(&format!(
                            "Automation failed for job #{}.\nUser: {}\nMod: {}\nEmail: {}\nDetails: {}",
                            job.job_id,
                            job.user_id,
                            job.mod_id,
                            job.email,
                            job.result_message.as_deref().unwrap_or("-")
                        ))
                        .await;
                    JobStatus::FailedNotified
                }
                _ => continue,
            };
            if let Err(e) = self.ledger.mark_job(job.job_id, next).await {
                error!("Could not mark job {} as {}: {}", job.job_id, next, e);
                self.unmarked.insert(job.job_id, next);
            }
        }

        let cooled_down = self
            .last_offline_alert
            .map(|t| now - t > chrono::Duration::minutes(OFFLINE_ALERT_COOLDOWN_MINUTES))
            .unwrap_or(true);
        if cooled_down {
            let stale = self
                .ledger
                .stale_pending_jobs(now - chrono::Duration::minutes(STALE_AFTER_MINUTES))
                .await?;
            if !stale.is_empty() {
                warn!("{} creation job(s) stale; worker may be offline", stale.len());
                self.admins
                    .alert(&format!(
                        "Worker alert: the account-creation worker may be offline. {} job(s) have been pending for over {} minutes.",
                        stale.len(),
                        STALE_AFTER_MINUTES
                    ))
                    .await;
                self.last_offline_alert = Some(now);
            }
        }
        Ok(())
    }
}

/// Runs `poll_once` every `interval` until `shutdown` turns true.
pub fn spawn_job_poller(
    mut poller: JobPoller,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Job poller started; checking every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = poller.poll_once(Utc::now()).await {
                        error!("Job poll failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Job poller stopping");
                        break;
                    }
                }
            }
        }
    })
}
