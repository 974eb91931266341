//! Rasterization through a real headless Chrome

#![cfg(feature = "cdp")]

use agendashot::agenda::{self, Appointment, Member, MemberAppointments, Organization};
use agendashot::{RenderOptions, RendererConfig, SharedBrowser, Viewport};
use chrono::NaiveDate;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Width and height from the IHDR chunk
fn png_size(bytes: &[u8]) -> (u32, u32) {
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (width, height)
}

fn config() -> RendererConfig {
    RendererConfig {
        sandbox: std::env::var("CHROME_SANDBOX").map(|v| v != "0").unwrap_or(false),
        ..RendererConfig::default()
    }
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_viewport_screenshot_is_hidpi() {
    let mut renderer = agendashot::new_renderer(&config()).expect("Failed to launch Chrome");
    let png = renderer
        .render_png("<html><body><h1>Hello</h1></body></html>", &RenderOptions::default())
        .expect("Failed to render");

    assert_eq!(&png[..8], &PNG_SIGNATURE);
    assert_eq!(png_size(&png), (2400, 1600));
    assert!(renderer.is_connected());
    renderer.close().unwrap();
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_agenda_full_page_capture() {
    let org = Organization {
        id: "org-1".into(),
        name: "Studio".into(),
    };
    let appointments: Vec<Appointment> = (0..12)
        .map(|i| {
            serde_json::from_value(serde_json::json!({
                "startTime": format!("{:02}:00", 6 + i),
                "serviceDurationMinutes": 50,
                "clientName": format!("Client {}", i),
                "serviceName": "Cut",
            }))
            .unwrap()
        })
        .collect();
    let members = vec![MemberAppointments {
        member: Member {
            id: Some("m1".into()),
            first_name: "Ana".into(),
            last_name: "Lima".into(),
        },
        appointments,
    }];
    let html = agenda::render(&org, &members, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

    let browser = SharedBrowser::with_default_backend(config());
    let png = browser.render(&html, RenderOptions::agenda()).await.expect("Failed to render");
    browser.close().await.unwrap();

    assert_eq!(&png[..8], &PNG_SIGNATURE);
    let (width, height) = png_size(&png);
    assert!(width >= Viewport::portrait().width, "width {}", width);
    // 05:00-19:00 needs a taller capture than the viewport
    assert!(height > Viewport::portrait().height, "height {}", height);
}
