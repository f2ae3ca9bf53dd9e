//! Background certificate renewal timer
//!
//! Wakes once per period and asks the certificate manager for the certificate
//! of the primary domain. The manager reissues when needed; failures are logged
//! and retried at the next period.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::WileedotError,
    tls::{CertInfo, CertificateManager},
};

/// Stand-in start time for periods too long to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Periodic certificate refresh for a single domain
pub struct RenewalTimer<M: CertificateManager> {
    manager: Arc<M>,
    domain: String,
    period: Duration,
}

impl<M: CertificateManager> RenewalTimer<M> {
    pub fn new(manager: Arc<M>, domain: impl Into<String>, period: Duration) -> Self {
        Self {
            manager,
            domain: domain.into(),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the timer onto the runtime, it runs until `token` is cancelled
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    /// Run the timer loop.
    ///
    /// The first refresh happens one period after the call, then every period.
    pub async fn run(self, token: CancellationToken) {
        info!(
            "Starting certificate renewal timer for {} (every {}s)",
            self.domain,
            self.period.as_secs()
        );

        let now = Instant::now();
        let start = now
            .checked_add(self.period)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut ticker = interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Certificate renewal timer for {} stopped", self.domain);
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        error!("Failed to refresh certificate for {}: {e}", self.domain);
                    }
                }
            }
        }
    }

    /// Ask the manager for the current certificate once
    pub async fn refresh(&self) -> Result<CertInfo, WileedotError> {
        debug!("Checking certificate for {}", self.domain);

        let key = self.manager.certificate(&self.domain).await?;
        let info = CertInfo::from_certified_key(&key)?;

        let now = Utc::now();
        if info.needs_renewal(now) {
            warn!(
                "Certificate for {} is due for renewal, expires at {} ({} days left)",
                self.domain,
                info.not_after,
                info.expires_in(now).num_days()
            );
        } else {
            info!(
                "Certificate for {} is valid from {} until {}",
                self.domain, info.not_before, info.not_after
            );
        }

        Ok(info)
    }
}
