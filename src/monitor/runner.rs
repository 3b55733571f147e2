//! Monitor loop
//!
//! Polls every pending registration number once per tick, in batches of
//! concurrent checks, and notifies Discord once per published result:
//! - Pending -> Done after the result notification is delivered
//! - Errors are reported to Discord, throttled
//! - Stops when everything is published, the run budget or tick limit is
//!   reached, or a shutdown signal arrives

use crate::config::MonitorSettings;
use crate::monitor::fetcher::{CheckOutcome, LandingStatus, ResultSource};
use crate::monitor::notifier::{colors, DiscordEmbed, Notifier};
use crate::monitor::registration::RegistrationNumber;
use crate::utils::AppError;
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Discord caps embed field values at 1024 characters
const MAX_FIELD_CHARS: usize = 1024;

/// Discord caps embeds at 25 fields
const MAX_ERROR_FIELDS: usize = 10;

/// A failed check within a tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickError {
    pub reg_no: RegistrationNumber,
    pub reason: String,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub checked: usize,
    pub not_published: usize,
    /// Numbers whose result notification was delivered this tick
    pub published: Vec<RegistrationNumber>,
    pub errors: Vec<TickError>,
}

/// Why the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    AllPublished,
    BudgetExhausted,
    MaxTicks,
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::AllPublished => "all results published",
            StopReason::BudgetExhausted => "run budget exhausted",
            StopReason::MaxTicks => "tick limit reached",
            StopReason::Shutdown => "shutdown signal",
        };
        f.write_str(text)
    }
}

/// Final state of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub ticks: u64,
    /// Published numbers in discovery order
    pub found: Vec<RegistrationNumber>,
    pub pending: Vec<RegistrationNumber>,
    pub elapsed: Duration,
}

/// Result monitor loop
pub struct Monitor<S: ResultSource, N: Notifier> {
    source: S,
    notifier: N,
    settings: MonitorSettings,
    registrations: Vec<RegistrationNumber>,
    done: HashSet<RegistrationNumber>,
    found: Vec<RegistrationNumber>,
    ticks: u64,
    portal_live: bool,
    last_error_notification: Option<Instant>,
}

impl<S: ResultSource, N: Notifier> Monitor<S, N> {
    pub fn new(
        source: S,
        notifier: N,
        settings: MonitorSettings,
        registrations: Vec<RegistrationNumber>,
    ) -> Self {
        // 중복 등록번호는 첫 번째만 유지 (번호당 알림 1회)
        let mut seen = HashSet::new();
        let registrations: Vec<RegistrationNumber> = registrations
            .into_iter()
            .filter(|reg_no| seen.insert(reg_no.clone()))
            .collect();

        Self {
            source,
            notifier,
            settings,
            registrations,
            done: HashSet::new(),
            found: Vec::new(),
            ticks: 0,
            portal_live: false,
            last_error_notification: None,
        }
    }

    /// Pending numbers in input order
    pub fn pending(&self) -> impl Iterator<Item = &RegistrationNumber> {
        self.registrations.iter().filter(|r| !self.done.contains(*r))
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn is_done(&self, reg_no: &RegistrationNumber) -> bool {
        self.done.contains(reg_no)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Check every pending number once
    ///
    /// Batches run one after another; numbers within a batch are checked
    /// concurrently. A failing check never prevents the others in the tick.
    #[instrument(skip(self), fields(tick = self.ticks + 1))]
    pub async fn run_tick(&mut self) -> TickReport {
        self.ticks += 1;
        let pending: Vec<RegistrationNumber> = self.pending().cloned().collect();
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        for batch in pending.chunks(self.settings.batch_size.max(1)) {
            debug!(size = batch.len(), "Checking batch");
            let outcomes = join_all(batch.iter().map(|reg_no| self.source.check(reg_no))).await;

            for (reg_no, outcome) in batch.iter().zip(outcomes) {
                report.checked += 1;
                match outcome {
                    CheckOutcome::NotYetPublished => report.not_published += 1,
                    CheckOutcome::Published { body, metadata } => {
                        match self.notifier.send_result(&body, &metadata).await {
                            Ok(()) => {
                                self.done.insert(reg_no.clone());
                                self.found.push(reg_no.clone());
                                report.published.push(reg_no.clone());
                            }
                            Err(e) => {
                                warn!(reg_no = %reg_no, error = %e, "Result notification failed, will retry next tick");
                                report.errors.push(TickError {
                                    reg_no: reg_no.clone(),
                                    reason: format!("notification failed: {}", e),
                                });
                            }
                        }
                    }
                    CheckOutcome::Error(reason) => report.errors.push(TickError {
                        reg_no: reg_no.clone(),
                        reason,
                    }),
                }
            }
        }

        info!(
            checked = report.checked,
            published = report.published.len(),
            not_published = report.not_published,
            errors = report.errors.len(),
            pending = self.pending_count(),
            "Tick complete"
        );
        report
    }

    /// Run until everything is published, the budget or tick limit is
    /// reached, or `shutdown` resolves
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run<F>(&mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let started_at = Instant::now();
        let deadline = self.settings.run_budget.map(|budget| started_at + budget);
        let mut last_health_check = started_at;
        let mut iterations: u64 = 0;

        info!(
            total = self.registrations.len(),
            batch_size = self.settings.batch_size,
            "Starting result monitor"
        );
        // shutdown은 시작 알림부터 함께 poll해 시그널 핸들러를 바로 설치
        let interrupted = tokio::select! {
            biased;
            _ = self.announce_start() => false,
            _ = &mut shutdown => true,
        };

        let reason = loop {
            if interrupted {
                info!("Shutdown requested, stopping monitor");
                break StopReason::Shutdown;
            }
            if self.pending_count() == 0 {
                break StopReason::AllPublished;
            }
            if self.settings.max_ticks.is_some_and(|max| iterations >= max) {
                break StopReason::MaxTicks;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::BudgetExhausted;
            }
            iterations += 1;

            let pass = async {
                if self.portal_open().await {
                    Some(self.run_tick().await)
                } else {
                    None
                }
            };
            let pass = tokio::select! {
                biased;
                report = pass => report,
                _ = &mut shutdown => {
                    info!("Shutdown requested during tick, stopping monitor");
                    break StopReason::Shutdown;
                }
            };
            if let Some(report) = pass {
                self.report_errors(&report).await;
                if self.pending_count() == 0 {
                    break StopReason::AllPublished;
                }
            }

            if let Some(interval) = self.settings.health_check_interval {
                if last_health_check.elapsed() >= interval {
                    self.send_health_check(started_at).await;
                    last_health_check = Instant::now();
                }
            }

            if self.settings.max_ticks.is_some_and(|max| iterations >= max) {
                break StopReason::MaxTicks;
            }

            let mut pause = self.settings.check_interval;
            if let Some(d) = deadline {
                pause = pause.min(d.saturating_duration_since(Instant::now()));
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping monitor");
                    break StopReason::Shutdown;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        };

        let summary = RunSummary {
            reason,
            ticks: self.ticks,
            found: self.found.clone(),
            pending: self.pending().cloned().collect(),
            elapsed: started_at.elapsed(),
        };
        info!(
            reason = %summary.reason,
            ticks = summary.ticks,
            found = summary.found.len(),
            pending = summary.pending.len(),
            "Result monitor finished"
        );
        self.announce_finish(&summary).await;
        summary
    }

    /// Landing-page gate; announces once when the portal goes live
    async fn portal_open(&mut self) -> bool {
        if self.portal_live {
            return true;
        }

        match self.source.landing_status().await {
            Ok(LandingStatus::Ungated) => {
                self.portal_live = true;
                true
            }
            Ok(LandingStatus::Live) => {
                self.portal_live = true;
                info!("Results portal is live");
                let embed = DiscordEmbed::new(
                    "🌐 RESULTS LIVE!",
                    "**The exam results are now published!** Starting automatic processing...",
                    colors::SUCCESS,
                )
                .field("Status", "✅ Results Available", true)
                .field("Pending", self.pending_count().to_string(), true);
                best_effort("results live", self.notifier.send_embed(embed).await);
                true
            }
            Ok(LandingStatus::NotLive) => {
                info!("Results portal checked; results not yet live");
                false
            }
            Err(e) => {
                warn!(error = %e, "Results portal unreachable");
                let embed = DiscordEmbed::new(
                    "❌ Website DOWN",
                    format!("{}: {}", e.error_code(), e),
                    colors::ERROR,
                )
                .field("Target", self.source.target(), false);
                self.notify_error(embed).await;
                false
            }
        }
    }

    /// Report failed checks, at most once per error notification interval
    async fn report_errors(&mut self, report: &TickReport) {
        if report.errors.is_empty() {
            return;
        }

        let mut embed = DiscordEmbed::new(
            "⚠️ Result checks failed",
            format!(
                "{} registration number(s) failed in tick {} after retries",
                report.errors.len(),
                report.tick
            ),
            colors::WARNING,
        );
        for error in report.errors.iter().take(MAX_ERROR_FIELDS) {
            embed = embed.field(error.reg_no.as_str(), truncate_field(&error.reason), false);
        }
        if report.errors.len() > MAX_ERROR_FIELDS {
            embed = embed.field(
                "…",
                format!("and {} more", report.errors.len() - MAX_ERROR_FIELDS),
                false,
            );
        }
        self.notify_error(embed).await;
    }

    async fn notify_error(&mut self, embed: DiscordEmbed) {
        let now = Instant::now();
        if let Some(last) = self.last_error_notification {
            if now.duration_since(last) < self.settings.error_notification_interval {
                debug!("Error notification throttled");
                return;
            }
        }
        self.last_error_notification = Some(now);
        best_effort("error notification", self.notifier.send_embed(embed).await);
    }

    async fn announce_start(&self) {
        let embed = DiscordEmbed::new(
            "🔍 Monitoring Started",
            format!(
                "Checking **{}** registration numbers in batches of **{}**",
                self.registrations.len(),
                self.settings.batch_size
            ),
            colors::INFO,
        )
        .field("Total Numbers", self.registrations.len().to_string(), true)
        .field("Batch Size", self.settings.batch_size.to_string(), true)
        .field(
            "Check Interval",
            format!("{} second(s)", self.settings.check_interval.as_secs()),
            true,
        )
        .field("Target URL", self.source.target(), false);
        best_effort("start announcement", self.notifier.send_embed(embed).await);
    }

    async fn send_health_check(&self, started_at: Instant) {
        let uptime = started_at.elapsed().as_secs();
        let message = format!(
            "❤️ Health Check - Uptime: {}h {}m\nPending: {}/{} | Ticks: {}",
            uptime / 3600,
            (uptime % 3600) / 60,
            self.pending_count(),
            self.registrations.len(),
            self.ticks
        );
        best_effort("health check", self.notifier.send_text(&message).await);
    }

    async fn announce_finish(&self, summary: &RunSummary) {
        let total = self.registrations.len();
        let color = if summary.pending.is_empty() {
            colors::SUCCESS
        } else if !summary.found.is_empty() {
            colors::WARNING
        } else {
            colors::INFO
        };

        let embed = DiscordEmbed::new(
            "📊 Monitoring Finished",
            format!("Stopped: {}", summary.reason),
            color,
        )
        .field("✅ Found", summary.found.len().to_string(), true)
        .field("⏳ Still Pending", summary.pending.len().to_string(), true)
        .field("📋 Total", total.to_string(), true)
        .field("🔁 Ticks", summary.ticks.to_string(), true)
        .field(
            "⏱️ Elapsed",
            format!("{}s", summary.elapsed.as_secs()),
            true,
        );
        best_effort("finish summary", self.notifier.send_embed(embed).await);
        best_effort(
            "stop message",
            self.notifier
                .send_text("🛑 **Result monitoring stopped**")
                .await,
        );
    }
}

fn best_effort(what: &str, result: Result<(), AppError>) {
    if let Err(e) = result {
        warn!(notification = what, error = %e, "Discord notification failed");
    }
}

fn truncate_field(value: &str) -> String {
    if value.chars().count() <= MAX_FIELD_CHARS {
        value.to_string()
    } else {
        value.chars().take(MAX_FIELD_CHARS).collect()
    }
}
