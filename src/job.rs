//! Daily agenda job
//!
//! Each cycle walks every active organization in turn: check whether its
//! local send hour has come, fetch the day's appointments, lay them out,
//! rasterize, upload, and announce the image through the webhook. A failure
//! for one organization is recorded in its outcome and never stops the
//! others. Nothing is retried.

use crate::agenda::{self, Organization};
use crate::browser::SharedBrowser;
use crate::config::JobConfig;
use crate::source::{group_by_member, AppointmentSource, ScheduleConfig};
use crate::storage::ObjectStore;
use crate::trigger::{local_date, resolve_offset, should_trigger};
use crate::webhook::{OrganizationRef, WebhookClient, WebhookPayload};
use crate::{RenderOptions, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What happened to one organization during a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrgOutcome {
    Skipped {
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    Generated {
        image_url: String,
        total_appointments: usize,
        webhook_delivered: bool,
    },
    Failed {
        error: String,
    },
}

/// Per-organization result record of a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgResult {
    pub organization_id: String,
    pub organization_name: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub outcome: OrgOutcome,
}

pub struct DailyAgendaJob {
    source: Arc<dyn AppointmentSource>,
    store: Arc<dyn ObjectStore>,
    browser: SharedBrowser,
    webhook: WebhookClient,
    config: JobConfig,
    key_prefix: String,
    /// Local date each organization was last delivered for
    delivered: Mutex<HashMap<String, NaiveDate>>,
}

impl DailyAgendaJob {
    pub fn new(
        source: Arc<dyn AppointmentSource>,
        store: Arc<dyn ObjectStore>,
        browser: SharedBrowser,
        config: JobConfig,
        key_prefix: &str,
    ) -> Result<Self> {
        let webhook = WebhookClient::new(config.webhook_timeout)?;
        Ok(Self {
            source,
            store,
            browser,
            webhook,
            config,
            key_prefix: key_prefix.trim_matches('/').to_string(),
            delivered: Mutex::new(HashMap::new()),
        })
    }

    /// Storage key of an organization's agenda image
    pub fn image_key(&self, organization_id: &str, date: NaiveDate) -> String {
        let key = format!("{}/{}.png", organization_id, date.format("%Y-%m-%d"));
        if self.key_prefix.is_empty() {
            key
        } else {
            format!("{}/{}", self.key_prefix, key)
        }
    }

    /// Runs one pass over all active organizations.
    ///
    /// With `force`, the send-hour check and the once-per-day guard are bypassed.
    /// Only a failure to list the organizations fails the whole cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>, force: bool) -> Result<Vec<OrgResult>> {
        let configs = self.source.active_configs().await?;
        let mut results = Vec::with_capacity(configs.len());

        for cfg in &configs {
            let offset = resolve_offset(cfg.timezone.as_deref(), now, self.config.fallback_offset);
            let date = local_date(now, offset, self.config.day_offset);

            let outcome = if !force
                && !should_trigger(now, cfg.timezone.as_deref(), cfg.send_hour, self.config.fallback_offset)
            {
                OrgOutcome::Skipped {
                    reason: format!("send hour is {:02}:00 local time", cfg.send_hour),
                }
            } else if !force && self.already_delivered(&cfg.organization_id, date) {
                OrgOutcome::Skipped {
                    reason: format!("already delivered for {}", date),
                }
            } else {
                match self.process_organization(cfg, date).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("agenda for {} ({}) failed: {}", cfg.organization_id, date, e);
                        OrgOutcome::Failed { error: e.to_string() }
                    }
                }
            };

            results.push(OrgResult {
                organization_id: cfg.organization_id.clone(),
                organization_name: cfg.organization_name.clone(),
                date,
                outcome,
            });
        }

        let generated = results.iter().filter(|r| matches!(r.outcome, OrgOutcome::Generated { .. })).count();
        let failed = results.iter().filter(|r| matches!(r.outcome, OrgOutcome::Failed { .. })).count();
        info!(
            "agenda cycle: {} organizations, {} generated, {} failed, {} skipped",
            results.len(),
            generated,
            failed,
            results.len() - generated - failed
        );
        Ok(results)
    }

    async fn process_organization(&self, cfg: &ScheduleConfig, date: NaiveDate) -> Result<OrgOutcome> {
        let records = self.source.appointments_for(&cfg.organization_id, date).await?;
        let lanes = group_by_member(&records);
        let organization = Organization {
            id: cfg.organization_id.clone(),
            name: cfg.organization_name.clone(),
        };

        let html = agenda::render(&organization, &lanes, date);
        let png = self.browser.render(&html, RenderOptions::agenda()).await?;
        let image_url = self
            .store
            .upload(&self.image_key(&cfg.organization_id, date), png, "image/png")
            .await?;
        info!("agenda for {} ({}) stored at {}", cfg.organization_id, date, image_url);
        self.mark_delivered(&cfg.organization_id, date);

        let payload = WebhookPayload::new(
            OrganizationRef {
                id: organization.id,
                name: organization.name,
            },
            date,
            image_url.clone(),
            cfg.recipient.clone(),
            &lanes,
        );

        let webhook_delivered = match cfg.webhook_url.as_deref().or(self.config.default_webhook_url.as_deref()) {
            Some(url) => self.webhook.notify(url, &payload).await,
            None => {
                warn!("no webhook configured for {}; image not announced", cfg.organization_id);
                false
            }
        };

        Ok(OrgOutcome::Generated {
            image_url,
            total_appointments: payload.total_appointments,
            webhook_delivered,
        })
    }

    fn already_delivered(&self, organization_id: &str, date: NaiveDate) -> bool {
        self.delivered
            .lock()
            .map(|map| map.get(organization_id) == Some(&date))
            .unwrap_or(false)
    }

    fn mark_delivered(&self, organization_id: &str, date: NaiveDate) {
        if let Ok(mut map) = self.delivered.lock() {
            map.insert(organization_id.to_string(), date);
        }
    }

    /// Runs a cycle every `interval_secs` until the task is dropped.
    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("agenda job checking every {}s", self.config.interval_secs);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle(Utc::now(), false).await {
                error!("agenda cycle failed: {}", e);
            }
        }
    }
}
