//! Webhook notification for a generated agenda image

use crate::agenda::MemberAppointments;
use crate::{Error, Result};
use log::{info, warn};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCount {
    pub member_id: Option<String>,
    pub member_name: String,
    pub appointment_count: usize,
}

/// Body POSTed to the webhook once an agenda image is available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub organization: OrganizationRef,
    /// `YYYY-MM-DD`
    pub date: String,
    pub image_url: String,
    pub recipient: String,
    pub members: Vec<MemberCount>,
    pub total_appointments: usize,
}

impl WebhookPayload {
    pub fn new(
        organization: OrganizationRef,
        date: chrono::NaiveDate,
        image_url: String,
        recipient: String,
        lanes: &[MemberAppointments],
    ) -> Self {
        let members: Vec<MemberCount> = lanes
            .iter()
            .map(|lane| MemberCount {
                member_id: lane.member.id.clone(),
                member_name: lane.member.display_name(),
                appointment_count: lane.appointments.len(),
            })
            .collect();
        let total_appointments = members.iter().map(|m| m.appointment_count).sum();
        Self {
            organization,
            date: date.format("%Y-%m-%d").to_string(),
            image_url,
            recipient,
            members,
            total_appointments,
        }
    }
}

/// Fire-and-log webhook sender: one attempt, no retries
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `payload` to `url`.
    pub async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::WebhookError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::WebhookError(format!("{} - {}", status, body)));
        }
        Ok(())
    }

    /// Like [`send`](Self::send), but failures are only logged. Returns whether delivery succeeded.
    pub async fn notify(&self, url: &str, payload: &WebhookPayload) -> bool {
        match self.send(url, payload).await {
            Ok(()) => {
                info!("webhook delivered for {} ({})", payload.organization.id, payload.date);
                true
            }
            Err(e) => {
                warn!("webhook for {} ({}) failed: {}", payload.organization.id, payload.date, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::{Appointment, Member};

    #[test]
    fn payload_counts_members_and_total() {
        let appt: Appointment = serde_json::from_str(r#"{"startTime":"09:00"}"#).unwrap();
        let lanes = vec![
            MemberAppointments {
                member: Member { id: Some("m1".into()), first_name: "Ana".into(), last_name: "Lima".into() },
                appointments: vec![appt.clone(), appt.clone()],
            },
            MemberAppointments { member: Member::unassigned(), appointments: vec![appt] },
        ];
        let payload = WebhookPayload::new(
            OrganizationRef { id: "o1".into(), name: "Studio".into() },
            chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            "https://img/x.png".into(),
            "+5511".into(),
            &lanes,
        );
        assert_eq!(payload.total_appointments, 3);
        assert_eq!(payload.members[0].appointment_count, 2);
        assert_eq!(payload.members[1].member_name, "Unassigned");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["imageUrl"], "https://img/x.png");
        assert_eq!(json["totalAppointments"], 3);
        assert_eq!(json["date"], "2025-03-03");
        assert_eq!(json["members"][0]["appointmentCount"], 2);
    }
}
