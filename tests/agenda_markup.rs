//! Structure checks on the generated agenda document

use agendashot::agenda::{self, Appointment, Member, MemberAppointments, Organization};
use chrono::NaiveDate;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

fn sample_day() -> (Organization, Vec<MemberAppointments>, NaiveDate) {
    let org = Organization {
        id: "org-1".into(),
        name: "Barber & Co".into(),
    };
    let appts = |json: &str| -> Vec<Appointment> { serde_json::from_str(json).unwrap() };
    let members = vec![
        MemberAppointments {
            member: Member {
                id: Some("m1".into()),
                first_name: "Ana".into(),
                last_name: "Lima".into(),
            },
            appointments: appts(
                r#"[
                    {"startTime":"09:00","endTime":"10:00","clientName":"<Bea>","serviceName":"Cut","status":"confirmed"},
                    {"startTime":"09:30","serviceDurationMinutes":60,"clientName":"Caio","serviceName":"Beard","status":"foo"},
                    {"startTime":"11:00","clientName":"Duda","serviceName":"Wash","status":"cancelled"}
                ]"#,
            ),
        },
        MemberAppointments {
            member: Member::unassigned(),
            appointments: appts(r#"[{"startTime":"14:00","endTime":"15:00","clientName":"Eva","serviceName":"Color"}]"#),
        },
    ];
    (org, members, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
}

fn select<'a>(doc: &'a Html, css: &str) -> Vec<scraper::ElementRef<'a>> {
    let selector = Selector::parse(css).unwrap();
    doc.select(&selector).collect()
}

#[test]
fn document_has_header_lanes_and_blocks() {
    let (org, members, date) = sample_day();
    let doc = Html::parse_document(&agenda::render(&org, &members, date));

    let title: String = select(&doc, "title")[0].text().collect();
    assert_eq!(title, "Barber & Co - 2025-03-03");
    let heading: String = select(&doc, "h1")[0].text().collect();
    assert_eq!(heading, "Barber & Co");
    let date_label: String = select(&doc, ".date")[0].text().collect();
    assert_eq!(date_label, "Monday, March 3, 2025");

    let headers: Vec<String> = select(&doc, ".lane-header").iter().map(|h| h.text().collect()).collect();
    assert_eq!(headers, vec!["Ana Lima(3)", "Unassigned(1)"]);

    let tracks = select(&doc, ".track");
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].value().attr("data-columns"), Some("2"));
    assert_eq!(tracks[1].value().attr("data-member"), Some("Unassigned"));

    assert_eq!(select(&doc, ".appt").len(), 4);
    assert!(select(&doc, "p.empty").is_empty());
}

#[test]
fn blocks_carry_columns_status_and_escaped_text() {
    let (org, members, date) = sample_day();
    let doc = Html::parse_document(&agenda::render(&org, &members, date));
    let blocks = select(&doc, ".track[data-member=\"Ana Lima\"] .appt");
    assert_eq!(blocks.len(), 3);

    let columns: Vec<_> = blocks.iter().map(|b| b.value().attr("data-column").unwrap()).collect();
    assert_eq!(columns, vec!["0", "1", "0"]);

    let titles: Vec<_> = blocks.iter().map(|b| b.value().attr("title").unwrap()).collect();
    assert_eq!(titles, vec!["Confirmed", "Scheduled", "Cancelled"]);

    let client: String = blocks[0].select(&Selector::parse(".client").unwrap()).next().unwrap().text().collect();
    assert_eq!(client, "<Bea>");
    let time: String = blocks[1].select(&Selector::parse(".time").unwrap()).next().unwrap().text().collect();
    assert_eq!(time, "09:30 - 10:30");

    let style = blocks[1].value().attr("style").unwrap();
    assert!(style.contains("left:50%;width:50%"), "{}", style);
}

#[test]
fn legend_lists_every_status() {
    let (org, members, date) = sample_day();
    let doc = Html::parse_document(&agenda::render(&org, &members, date));
    let labels: Vec<String> = select(&doc, ".legend li").iter().map(|li| li.text().collect()).collect();
    assert_eq!(
        labels,
        vec!["Scheduled", "Confirmed", "In progress", "Completed", "Cancelled", "No-show"]
    );
}

#[test]
fn hour_labels_follow_the_window() {
    let (org, members, date) = sample_day();
    let doc = Html::parse_document(&agenda::render(&org, &members, date));
    // 09:00..15:00 padded to 08:00..16:00
    let hours: Vec<String> = select(&doc, ".axis .hour").iter().map(|h| h.text().collect()).collect();
    assert_eq!(hours.first().map(String::as_str), Some("08:00"));
    assert_eq!(hours.last().map(String::as_str), Some("16:00"));
    assert_eq!(hours.len(), 9);
}

#[test]
fn empty_day_shows_placeholder() {
    let org = Organization {
        id: "org-2".into(),
        name: "Quiet".into(),
    };
    let html = agenda::render(&org, &[], NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    let doc = Html::parse_document(&html);
    assert_eq!(select(&doc, "p.empty").len(), 1);
    assert!(select(&doc, ".appt").is_empty());
    let hours: Vec<String> = select(&doc, ".axis .hour").iter().map(|h| h.text().collect()).collect();
    assert_eq!(hours.first().map(String::as_str), Some("08:00"));
    assert_eq!(hours.last().map(String::as_str), Some("18:00"));
}

#[test]
fn rendering_is_byte_identical_across_calls() {
    let (org, members, date) = sample_day();
    let digest = |html: String| hex::encode(Sha256::digest(html.as_bytes()));

    let first = digest(agenda::render(&org, &members, date));
    let second = digest(agenda::render(&org, &members, date));
    assert_eq!(first, second);

    // the digest does react to content changes
    let mut changed = members.clone();
    changed[0].appointments[0].client_name = "Bia".into();
    assert_ne!(first, digest(agenda::render(&org, &changed, date)));
}
