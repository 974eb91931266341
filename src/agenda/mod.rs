//! Schedule layout engine
//!
//! Pure transformation from an organization, its appointments grouped by
//! member, and a date into a positioned render model and a self-contained
//! HTML document. No I/O and no shared state: safe to call concurrently.
//!
//! # Example
//!
//! ```
//! use agendashot::agenda::{self, Appointment, Member, MemberAppointments, Organization};
//! use chrono::NaiveDate;
//!
//! let org = Organization { id: "org-1".into(), name: "Studio".into() };
//! let members = vec![MemberAppointments {
//!     member: Member { id: Some("m1".into()), first_name: "Ana".into(), last_name: "Lima".into() },
//!     appointments: vec![serde_json::from_str::<Appointment>(
//!         r#"{"startTime":"09:00","clientName":"Bea","serviceName":"Cut"}"#,
//!     ).unwrap()],
//! }];
//! let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
//! let html = agenda::render(&org, &members, date);
//! assert!(html.contains("Studio"));
//! ```

pub mod columns;
pub mod geometry;
pub mod markup;
pub mod model;
pub mod window;

pub use columns::{assign_columns, max_concurrency, overlaps, ColumnAssignment};
pub use geometry::{
    build_layout, AgendaLayout, BlockLayout, ColumnMode, GridLine, LaneLayout, LayoutConfig,
};
pub use markup::render_markup;
pub use model::{
    Appointment, AppointmentStatus, Member, MemberAppointments, Organization, StatusStyle,
};
pub use window::ViewWindow;

use chrono::NaiveDate;

/// Renders the day's schedule with the default layout configuration.
pub fn render(organization: &Organization, members: &[MemberAppointments], date: NaiveDate) -> String {
    render_with(organization, members, date, &LayoutConfig::default())
}

/// Renders the day's schedule with an explicit layout configuration.
pub fn render_with(
    organization: &Organization,
    members: &[MemberAppointments],
    date: NaiveDate,
    config: &LayoutConfig,
) -> String {
    let layout = build_layout(organization, members, date, config);
    log::debug!(
        "agenda layout for {}: {} lanes, {} appointments, window {:02}:00-{:02}:00",
        organization.id,
        layout.lanes.len(),
        layout.total_appointments,
        layout.window.start_hour,
        layout.window.end_hour,
    );
    render_markup(&layout)
}

/// Input document accepted by the `render` CLI command
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaRequest {
    pub organization: Organization,
    pub date: NaiveDate,
    #[serde(default)]
    pub members_with_appointments: Vec<MemberAppointments>,
}

impl AgendaRequest {
    pub fn render(&self) -> String {
        render(&self.organization, &self.members_with_appointments, self.date)
    }
}
