//! Daily agenda job: triggering, per-organization isolation and webhook delivery

use agendashot::config::JobConfig;
use agendashot::job::{DailyAgendaJob, OrgOutcome, OrgResult};
use agendashot::source::{AppointmentRecord, MemorySource, ScheduleConfig};
use agendashot::storage::MemoryStore;
use agendashot::webhook::WebhookPayload;
use agendashot::{Error, RenderOptions, Renderer, RendererConfig, RendererFactory, Result, SharedBrowser};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::io::Read;
use std::sync::{Arc, Mutex, Once};
use tiny_http::{Response, Server};

static INIT: Once = Once::new();
static RECEIVED: Mutex<Vec<(String, WebhookPayload)>> = Mutex::new(Vec::new());

/// Webhook receiver: `/hook/ok` accepts, anything else answers 500
fn start_webhook_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let path = request.url().to_string();
                if let Ok(payload) = serde_json::from_str::<WebhookPayload>(&body) {
                    RECEIVED.lock().unwrap().push((path.clone(), payload));
                }
                let response = if path == "/hook/ok" {
                    Response::from_string("ok")
                } else {
                    Response::from_string("boom").with_status_code(500)
                };
                let _ = request.respond(response);
            }
        });
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn received_for(organization_id: &str) -> Vec<(String, WebhookPayload)> {
    RECEIVED
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, p)| p.organization.id == organization_id)
        .cloned()
        .collect()
}

/// Emits the HTML as the "PNG"; documents mentioning "Broken" fail
struct FakeRenderer;

impl Renderer for FakeRenderer {
    fn render_png(&mut self, html: &str, options: &RenderOptions) -> Result<Vec<u8>> {
        assert_eq!(*options, RenderOptions::agenda());
        if html.contains("Broken") {
            return Err(Error::RenderError("page crashed".into()));
        }
        Ok(html.as_bytes().to_vec())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn fake_browser() -> SharedBrowser {
    let factory: RendererFactory = Box::new(|_cfg: &RendererConfig| Ok(Box::new(FakeRenderer) as Box<dyn Renderer>));
    SharedBrowser::spawn(RendererConfig::default(), factory)
}

fn org_config(id: &str, name: &str, timezone: &str, send_hour: u32, webhook: Option<String>) -> ScheduleConfig {
    ScheduleConfig {
        organization_id: id.into(),
        organization_name: name.into(),
        timezone: Some(timezone.into()),
        send_hour,
        recipient: format!("{}@example.com", id),
        webhook_url: webhook,
        enabled: true,
    }
}

fn record(member: &str, start: &str) -> AppointmentRecord {
    AppointmentRecord {
        id: None,
        member_id: Some(member.into()),
        member_first_name: Some(member.into()),
        member_last_name: Some("Rocha".into()),
        start_time: start.into(),
        end_time: None,
        service_duration_minutes: Some(45),
        client_name: Some("Client".into()),
        service_name: Some("Service".into()),
        status: Some("confirmed".into()),
    }
}

/// 10:15 UTC, i.e. 07:15 at -03:00
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 15, 0).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn build_job(source: MemorySource, store: Arc<MemoryStore>) -> DailyAgendaJob {
    DailyAgendaJob::new(Arc::new(source), store, fake_browser(), JobConfig::default(), "agendas").unwrap()
}

fn outcome_of<'a>(results: &'a [OrgResult], id: &str) -> &'a OrgOutcome {
    &results.iter().find(|r| r.organization_id == id).unwrap().outcome
}

#[tokio::test]
async fn generates_only_at_the_local_send_hour() {
    let hook = format!("{}/hook/ok", start_webhook_server());
    let source = MemorySource::new(vec![
        org_config("org-due", "Due Studio", "-03:00", 7, Some(hook.clone())),
        org_config("org-later", "Later Studio", "-03:00", 9, Some(hook.clone())),
    ])
    .with_appointments("org-due", day(), vec![record("ana", "09:00"), record("ana", "09:30"), record("bia", "10:00")]);
    let store = Arc::new(MemoryStore::default());
    let job = build_job(source, store.clone());

    let results = job.run_cycle(now(), false).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].date, day());

    match outcome_of(&results, "org-due") {
        OrgOutcome::Generated { image_url, total_appointments, webhook_delivered } => {
            assert_eq!(image_url, "memory://images/agendas/org-due/2025-03-03.png");
            assert_eq!(*total_appointments, 3);
            assert!(*webhook_delivered);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(matches!(outcome_of(&results, "org-later"), OrgOutcome::Skipped { .. }));
    assert_eq!(store.keys(), vec!["agendas/org-due/2025-03-03.png".to_string()]);

    let (html_type, html) = store.get("agendas/org-due/2025-03-03.png").unwrap();
    assert_eq!(html_type, "image/png");
    assert!(String::from_utf8(html).unwrap().contains("Due Studio"));

    let delivered = received_for("org-due");
    assert_eq!(delivered.len(), 1);
    let (path, payload) = &delivered[0];
    assert_eq!(path, "/hook/ok");
    assert_eq!(payload.date, "2025-03-03");
    assert_eq!(payload.recipient, "org-due@example.com");
    assert_eq!(payload.total_appointments, 3);
    assert_eq!(payload.members.len(), 2);
    assert!(received_for("org-later").is_empty());
}

#[tokio::test]
async fn delivers_once_per_day_unless_forced() {
    let hook = format!("{}/hook/ok", start_webhook_server());
    let source = MemorySource::new(vec![org_config("org-once", "Once Studio", "-03:00", 7, Some(hook))]);
    let job = build_job(source, Arc::new(MemoryStore::default()));

    let first = job.run_cycle(now(), false).await.unwrap();
    assert!(matches!(first[0].outcome, OrgOutcome::Generated { .. }));

    // a later check within the same hour
    let again = job.run_cycle(now() + chrono::Duration::minutes(15), false).await.unwrap();
    assert!(matches!(&again[0].outcome, OrgOutcome::Skipped { reason } if reason.contains("already delivered")));

    let forced = job.run_cycle(now(), true).await.unwrap();
    assert!(matches!(forced[0].outcome, OrgOutcome::Generated { .. }));
    assert_eq!(received_for("org-once").len(), 2);
}

#[tokio::test]
async fn one_failing_organization_does_not_stop_the_others() {
    let hook = format!("{}/hook/ok", start_webhook_server());
    let source = MemorySource::new(vec![
        org_config("org-down", "Down Studio", "-03:00", 7, Some(hook.clone())),
        org_config("org-broken", "Broken Studio", "-03:00", 7, Some(hook.clone())),
        org_config("org-fine", "Fine Studio", "-03:00", 7, Some(hook.clone())),
    ])
    .failing_for("org-down");
    let store = Arc::new(MemoryStore::default());
    let job = build_job(source, store.clone());

    let results = job.run_cycle(now(), false).await.unwrap();
    assert!(matches!(outcome_of(&results, "org-down"), OrgOutcome::Failed { error } if error.contains("unavailable")));
    assert!(matches!(outcome_of(&results, "org-broken"), OrgOutcome::Failed { error } if error.contains("page crashed")));
    assert!(matches!(outcome_of(&results, "org-fine"), OrgOutcome::Generated { .. }));

    assert_eq!(store.keys(), vec!["agendas/org-fine/2025-03-03.png".to_string()]);
    assert!(received_for("org-down").is_empty());
    assert!(received_for("org-broken").is_empty());

    // failed organizations are retried on the next check of the hour
    let retry = job.run_cycle(now(), false).await.unwrap();
    assert!(matches!(outcome_of(&retry, "org-broken"), OrgOutcome::Failed { .. }));
    assert!(matches!(outcome_of(&retry, "org-fine"), OrgOutcome::Skipped { .. }));
}

#[tokio::test]
async fn webhook_failure_keeps_the_generated_image() {
    let hook = format!("{}/hook/fail", start_webhook_server());
    let source = MemorySource::new(vec![org_config("org-hookfail", "Hook Studio", "UTC", 10, Some(hook))]);
    let store = Arc::new(MemoryStore::default());
    let job = build_job(source, store.clone());

    let results = job.run_cycle(now(), false).await.unwrap();
    match &results[0].outcome {
        OrgOutcome::Generated { webhook_delivered, .. } => assert!(!webhook_delivered),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(store.keys().len(), 1);
    assert_eq!(received_for("org-hookfail").len(), 1);
}

#[tokio::test]
async fn default_webhook_and_fallback_timezone() {
    let base = start_webhook_server();
    let source = MemorySource::new(vec![org_config("org-default", "Default Studio", "Mars/Olympus", 7, None)]);
    let config = JobConfig {
        default_webhook_url: Some(format!("{}/hook/ok", base)),
        ..JobConfig::default()
    };
    let job = DailyAgendaJob::new(
        Arc::new(source),
        Arc::new(MemoryStore::default()),
        fake_browser(),
        config,
        "agendas",
    )
    .unwrap();

    // unknown region name, so the -03:00 fallback decides the hour
    let results = job.run_cycle(now(), false).await.unwrap();
    assert!(matches!(results[0].outcome, OrgOutcome::Generated { webhook_delivered: true, .. }));
    assert_eq!(received_for("org-default").len(), 1);
}

#[tokio::test]
async fn region_timezone_decides_send_hour() {
    let base = start_webhook_server();
    // 10:15 UTC is 10:15 in Lisbon and 07:15 in Sao Paulo
    let source = MemorySource::new(vec![
        org_config("org-lisbon", "Lisbon Studio", "Europe/Lisbon", 10, None),
        org_config("org-saopaulo", "Sao Paulo Studio", "America/Sao_Paulo", 10, None),
    ]);
    let config = JobConfig {
        default_webhook_url: Some(format!("{}/hook/ok", base)),
        ..JobConfig::default()
    };
    let job = DailyAgendaJob::new(
        Arc::new(source),
        Arc::new(MemoryStore::default()),
        fake_browser(),
        config,
        "agendas",
    )
    .unwrap();

    let results = job.run_cycle(now(), false).await.unwrap();
    assert!(matches!(results[0].outcome, OrgOutcome::Generated { .. }));
    assert!(matches!(results[1].outcome, OrgOutcome::Skipped { .. }));
}

#[tokio::test]
async fn day_offset_targets_tomorrow() {
    let source = MemorySource::new(vec![org_config("org-tomorrow", "Tomorrow Studio", "-03:00", 7, None)])
        .with_appointments("org-tomorrow", day().succ_opt().unwrap(), vec![record("ana", "08:00")]);
    let store = Arc::new(MemoryStore::default());
    let config = JobConfig {
        day_offset: 1,
        ..JobConfig::default()
    };
    let job = DailyAgendaJob::new(Arc::new(source), store.clone(), fake_browser(), config, "agendas").unwrap();

    let results = job.run_cycle(now(), false).await.unwrap();
    assert_eq!(results[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    assert!(matches!(
        results[0].outcome,
        OrgOutcome::Generated { total_appointments: 1, webhook_delivered: false, .. }
    ));
    assert_eq!(store.keys(), vec!["agendas/org-tomorrow/2025-03-04.png".to_string()]);
}
