//! Appointment data source
//!
//! The job only needs two queries: which organizations want a daily agenda,
//! and the appointments of one organization for one day. [`RestSource`]
//! answers them from a PostgREST-style HTTP API; [`MemorySource`] from fixed
//! data.

use crate::agenda::{Appointment, AppointmentStatus, Member, MemberAppointments};
use crate::time::TimeOfDay;
use crate::{Error, Result};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::warn;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Per-organization settings for the daily agenda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub organization_id: String,
    pub organization_name: String,
    /// UTC offset such as `-03:00`; unknown values use the job's fallback
    #[serde(default)]
    pub timezone: Option<String>,
    /// Local hour (0-23) at which the agenda is sent
    pub send_hour: u32,
    /// Who the agenda is for (phone number, e-mail, chat id…)
    pub recipient: String,
    /// Overrides the job's default webhook
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One appointment row as returned by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub member_first_name: Option<String>,
    #[serde(default)]
    pub member_last_name: Option<String>,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub service_duration_minutes: Option<i64>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl AppointmentRecord {
    fn member(&self) -> Member {
        Member {
            id: self.member_id.clone(),
            first_name: self.member_first_name.clone().unwrap_or_default(),
            last_name: self.member_last_name.clone().unwrap_or_default(),
        }
    }

    /// Converts the row into engine input, validating its times.
    pub fn to_appointment(&self) -> Result<Appointment> {
        let start_time: TimeOfDay = self.start_time.parse()?;
        let end_time = match self.end_time.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<TimeOfDay>()?),
            _ => None,
        };
        Ok(Appointment {
            start_time,
            end_time,
            service_duration_minutes: self.service_duration_minutes,
            client_name: self.client_name.clone().unwrap_or_default(),
            service_name: self.service_name.clone().unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(AppointmentStatus::parse_lenient)
                .unwrap_or_default(),
        })
    }
}

/// Groups rows by member, in first-seen member order.
///
/// Rows without a member share one "unassigned" lane. Each lane is sorted by
/// start time, ties in input order. Rows with malformed times are skipped
/// with a warning rather than failing the whole day.
pub fn group_by_member(records: &[AppointmentRecord]) -> Vec<MemberAppointments> {
    let mut lanes: Vec<MemberAppointments> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for record in records {
        let appointment = match record.to_appointment() {
            Ok(a) => a,
            Err(e) => {
                warn!("skipping appointment {:?}: {}", record.id, e);
                continue;
            }
        };
        let slot = *index.entry(record.member_id.clone()).or_insert_with(|| {
            let member = if record.member_id.is_some() { record.member() } else { Member::unassigned() };
            lanes.push(MemberAppointments { member, appointments: Vec::new() });
            lanes.len() - 1
        });
        lanes[slot].appointments.push(appointment);
    }

    for lane in &mut lanes {
        lane.appointments.sort_by_key(|a| a.start_time);
    }
    lanes
}

/// Query interface over organizations and their appointments
pub trait AppointmentSource: Send + Sync {
    /// Enabled per-organization agenda configurations
    fn active_configs(&self) -> BoxFuture<'_, Result<Vec<ScheduleConfig>>>;

    /// All appointments of `organization_id` on `date`
    fn appointments_for<'a>(&'a self, organization_id: &'a str, date: NaiveDate)
        -> BoxFuture<'a, Result<Vec<AppointmentRecord>>>;
}

/// PostgREST-style HTTP source
///
/// Reads `{base}/agenda_configs?enabled=eq.true` and
/// `{base}/appointments_view?organization_id=eq.{id}&date=eq.{date}&order=start_time.asc`.
pub struct RestSource {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestSource {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::ConfigError(format!("invalid source url {:?}: {}", base_url, e)))?;
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<T> {
        let mut url = self
            .base_url
            .join(table)
            .map_err(|e| Error::ConfigError(format!("invalid table {:?}: {}", table, e)))?;
        url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::SourceError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SourceError(format!("{} query failed: {} - {}", table, status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::SourceError(format!("{} returned unexpected data: {}", table, e)))
    }
}

impl AppointmentSource for RestSource {
    fn active_configs(&self) -> BoxFuture<'_, Result<Vec<ScheduleConfig>>> {
        async move {
            self.get("agenda_configs", &[("enabled", "eq.true".to_string()), ("select", "*".to_string())])
                .await
        }
        .boxed()
    }

    fn appointments_for<'a>(
        &'a self,
        organization_id: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, Result<Vec<AppointmentRecord>>> {
        async move {
            let query = [
                ("organization_id", format!("eq.{}", organization_id)),
                ("date", format!("eq.{}", date.format("%Y-%m-%d"))),
                ("order", "start_time.asc".to_string()),
                ("select", "*".to_string()),
            ];
            self.get("appointments_view", &query).await
        }
        .boxed()
    }
}

/// Fixed in-memory data
#[derive(Default)]
pub struct MemorySource {
    configs: Vec<ScheduleConfig>,
    appointments: HashMap<(String, NaiveDate), Vec<AppointmentRecord>>,
    failing: Vec<String>,
}

impl MemorySource {
    pub fn new(configs: Vec<ScheduleConfig>) -> Self {
        Self {
            configs,
            ..Default::default()
        }
    }

    pub fn with_appointments(mut self, organization_id: &str, date: NaiveDate, records: Vec<AppointmentRecord>) -> Self {
        self.appointments.insert((organization_id.to_string(), date), records);
        self
    }

    /// Makes appointment queries for `organization_id` fail
    pub fn failing_for(mut self, organization_id: &str) -> Self {
        self.failing.push(organization_id.to_string());
        self
    }
}

impl AppointmentSource for MemorySource {
    fn active_configs(&self) -> BoxFuture<'_, Result<Vec<ScheduleConfig>>> {
        let configs = self.configs.iter().filter(|c| c.enabled).cloned().collect();
        futures::future::ready(Ok(configs)).boxed()
    }

    fn appointments_for<'a>(
        &'a self,
        organization_id: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, Result<Vec<AppointmentRecord>>> {
        let result = if self.failing.iter().any(|id| id == organization_id) {
            Err(Error::SourceError(format!("appointments for {} unavailable", organization_id)))
        } else {
            Ok(self
                .appointments
                .get(&(organization_id.to_string(), date))
                .cloned()
                .unwrap_or_default())
        };
        futures::future::ready(result).boxed()
    }
}
