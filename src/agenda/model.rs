//! Input model for the schedule layout engine

use crate::time::{derive_end_minutes, TimeOfDay};
use serde::{Deserialize, Deserializer, Serialize};

/// The organization a schedule is rendered for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// A staff member appointments are grouped under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// `None` marks the lane of appointments not assigned to anyone
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Member {
    pub fn unassigned() -> Self {
        Self {
            id: None,
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            "Unassigned".to_string()
        } else {
            name.to_string()
        }
    }
}

/// A single appointment as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub start_time: TimeOfDay,
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
    #[serde(default)]
    pub service_duration_minutes: Option<i64>,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn start_minutes(&self) -> u32 {
        self.start_time.minutes()
    }

    /// End of the appointment after applying the end-time derivation policy
    pub fn end_minutes(&self) -> u32 {
        derive_end_minutes(
            self.start_time.minutes(),
            self.end_time.map(TimeOfDay::minutes),
            self.service_duration_minutes,
        )
    }
}

/// A member and the appointments assigned to them for the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAppointments {
    pub member: Member,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

/// Appointment lifecycle state; drives the block colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

/// Display colors and label for a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub label: &'static str,
    pub background: &'static str,
    pub border: &'static str,
    pub text: &'static str,
}

const STATUS_STYLES: [StatusStyle; 6] = [
    StatusStyle { label: "Scheduled", background: "#e3f2fd", border: "#1e88e5", text: "#0d47a1" },
    StatusStyle { label: "Confirmed", background: "#e8f5e9", border: "#43a047", text: "#1b5e20" },
    StatusStyle { label: "In progress", background: "#fff8e1", border: "#ffb300", text: "#8d6e00" },
    StatusStyle { label: "Completed", background: "#ede7f6", border: "#5e35b1", text: "#311b92" },
    StatusStyle { label: "Cancelled", background: "#ffebee", border: "#e53935", text: "#b71c1c" },
    StatusStyle { label: "No-show", background: "#eceff1", border: "#78909c", text: "#37474f" },
];

impl AppointmentStatus {
    /// Legend order
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Parses a status string; anything unrecognized is `Scheduled`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "confirmed" => AppointmentStatus::Confirmed,
            "in_progress" => AppointmentStatus::InProgress,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "no_show" => AppointmentStatus::NoShow,
            _ => AppointmentStatus::Scheduled,
        }
    }

    pub fn style(self) -> &'static StatusStyle {
        &STATUS_STYLES[self as usize]
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(AppointmentStatus::parse_lenient).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_falls_back_to_scheduled() {
        assert_eq!(AppointmentStatus::parse_lenient("foo"), AppointmentStatus::Scheduled);
        assert_eq!(AppointmentStatus::parse_lenient(""), AppointmentStatus::Scheduled);
        assert_eq!(AppointmentStatus::parse_lenient("NO_SHOW"), AppointmentStatus::NoShow);

        let st: AppointmentStatus = serde_json::from_str("\"foo\"").unwrap();
        assert_eq!(st, AppointmentStatus::Scheduled);
        let st: AppointmentStatus = serde_json::from_str("null").unwrap();
        assert_eq!(st, AppointmentStatus::Scheduled);
    }

    #[test]
    fn every_status_has_a_distinct_style() {
        let labels: std::collections::HashSet<_> = AppointmentStatus::ALL.iter().map(|s| s.style().label).collect();
        assert_eq!(labels.len(), 6);
        assert_eq!(AppointmentStatus::InProgress.style().label, "In progress");
    }

    #[test]
    fn appointment_deserializes_from_engine_contract() {
        let json = r#"{"startTime":"10:00","serviceDurationMinutes":45,"clientName":"Ana","serviceName":"Cut","status":"confirmed"}"#;
        let appt: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(appt.start_minutes(), 600);
        assert_eq!(appt.end_minutes(), 645);
        assert_eq!(appt.status, AppointmentStatus::Confirmed);

        let bare: Appointment = serde_json::from_str(r#"{"startTime":"10:00"}"#).unwrap();
        assert_eq!(bare.end_minutes(), 630);
        assert_eq!(bare.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn member_display_name() {
        let m = Member { id: Some("m1".into()), first_name: "Ana".into(), last_name: "Souza".into() };
        assert_eq!(m.display_name(), "Ana Souza");
        assert_eq!(Member::unassigned().display_name(), "Unassigned");
    }
}
