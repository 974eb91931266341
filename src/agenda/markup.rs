//! HTML emission for a resolved [`AgendaLayout`]
//!
//! The document is self-contained (inline CSS, system fonts) so it can be
//! rasterized without network access. Output is a pure function of the
//! layout: identical layouts produce byte-identical markup.

use super::geometry::{AgendaLayout, BlockLayout, LaneLayout};
use super::model::AppointmentStatus;
use std::fmt::Write;

/// Blocks shorter than this collapse their text into one line
const COMPACT_BLOCK_PX: f64 = 40.0;

const STYLESHEET: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif; background: #ffffff; color: #212121; padding: 16px; }
.header { margin-bottom: 12px; }
.header h1 { font-size: 22px; font-weight: 600; }
.header .date { font-size: 15px; color: #546e7a; margin-top: 2px; }
.header .summary { font-size: 13px; color: #78909c; margin-top: 2px; }
.legend { display: flex; flex-wrap: wrap; gap: 10px; list-style: none; margin-bottom: 12px; font-size: 12px; }
.legend li { display: flex; align-items: center; gap: 4px; }
.legend .swatch { display: inline-block; width: 12px; height: 12px; border-radius: 3px; border-left: 3px solid; }
.empty { font-size: 14px; color: #78909c; margin-bottom: 12px; }
.row { display: flex; }
.axis { flex: none; position: relative; }
.axis .hour { position: absolute; right: 8px; font-size: 11px; color: #90a4ae; transform: translateY(-50%); }
.lane-header { flex: none; height: 44px; padding: 6px 8px; border-bottom: 2px solid #cfd8dc; font-size: 13px; font-weight: 600; overflow: hidden; white-space: nowrap; text-overflow: ellipsis; }
.lane-header .count { font-weight: 400; color: #78909c; margin-left: 4px; }
.track { flex: none; position: relative; border-left: 1px solid #eceff1; }
.track .line { position: absolute; left: 0; right: 0; border-top: 1px solid #eceff1; }
.track .line.half { border-top-style: dashed; }
.appt { position: absolute; overflow: hidden; padding: 3px 6px; border-left: 4px solid; border-radius: 4px; font-size: 11px; line-height: 1.3; }
.appt .time { font-weight: 600; }
.appt .client { font-weight: 600; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
.appt .service { white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
.appt.compact { padding: 1px 6px; white-space: nowrap; text-overflow: ellipsis; }
"#;

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats a pixel or percentage value with at most two decimals.
fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Renders the layout as a complete HTML document.
pub fn render_markup(layout: &AgendaLayout) -> String {
    let mut html = String::with_capacity(16 * 1024);
    let org = escape_html(&layout.organization.name);
    let date_label = layout.date.format("%A, %B %-d, %Y").to_string();
    let track = num(layout.track_height_px);
    let axis_w = layout.config.time_axis_width_px;
    let lane_w = layout.lane_width_px;

    // write! into a String cannot fail
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{org} - {date}</title>\n<style>{css}</style>\n</head>\n\
         <body style=\"width:{page}px\">\n",
        org = org,
        date = layout.date.format("%Y-%m-%d"),
        css = STYLESHEET,
        page = layout.config.page_width_px,
    );

    let _ = write!(
        html,
        "<header class=\"header\">\n<h1>{org}</h1>\n<p class=\"date\">{date}</p>\n\
         <p class=\"summary\">{total} {appt_word} &middot; {lanes} {lane_word}</p>\n</header>\n",
        org = org,
        date = escape_html(&date_label),
        total = layout.total_appointments,
        appt_word = if layout.total_appointments == 1 { "appointment" } else { "appointments" },
        lanes = layout.lanes.len(),
        lane_word = if layout.lanes.len() == 1 { "member" } else { "members" },
    );

    html.push_str("<ul class=\"legend\">\n");
    for status in AppointmentStatus::ALL {
        let style = status.style();
        let _ = writeln!(
            html,
            "<li><span class=\"swatch\" style=\"background:{};border-color:{}\"></span>{}</li>",
            style.background,
            style.border,
            escape_html(style.label),
        );
    }
    html.push_str("</ul>\n");

    if layout.is_empty() {
        html.push_str("<p class=\"empty\">No appointments scheduled for this day.</p>\n");
    }

    // member names
    let _ = write!(
        html,
        "<div class=\"row lane-headers\">\n<div class=\"axis\" style=\"width:{axis_w}px\"></div>\n"
    );
    for lane in &layout.lanes {
        let _ = writeln!(
            html,
            "<div class=\"lane-header\" style=\"width:{lane_w}px\">{name}<span class=\"count\">({count})</span></div>",
            name = escape_html(&lane.member_name),
            count = lane.blocks.len(),
        );
    }
    html.push_str("</div>\n");

    // time axis and tracks
    let _ = write!(
        html,
        "<div class=\"row grid\" style=\"height:{track}px\">\n\
         <div class=\"axis\" style=\"width:{axis_w}px;height:{track}px\">\n"
    );
    for line in &layout.grid_lines {
        if let Some(label) = &line.label {
            let _ = writeln!(html, "<span class=\"hour\" style=\"top:{}px\">{}</span>", num(line.top_px), label);
        }
    }
    html.push_str("</div>\n");

    for lane in &layout.lanes {
        write_lane(&mut html, layout, lane, &track);
    }
    html.push_str("</div>\n</body>\n</html>\n");

    html
}

fn write_lane(html: &mut String, layout: &AgendaLayout, lane: &LaneLayout, track: &str) {
    let _ = writeln!(
        html,
        "<div class=\"track\" data-member=\"{name}\" data-columns=\"{cols}\" style=\"width:{w}px;height:{track}px\">",
        name = escape_html(&lane.member_name),
        cols = lane.max_columns,
        w = layout.lane_width_px,
    );
    for line in &layout.grid_lines {
        let class = if line.label.is_some() { "line" } else { "line half" };
        let _ = writeln!(html, "<div class=\"{}\" style=\"top:{}px\"></div>", class, num(line.top_px));
    }
    for block in &lane.blocks {
        write_block(html, block);
    }
    html.push_str("</div>\n");
}

fn write_block(html: &mut String, block: &BlockLayout) {
    let compact = block.height_px < COMPACT_BLOCK_PX;
    let _ = write!(
        html,
        "<div class=\"appt{compact}\" data-column=\"{col}\" title=\"{label}\" \
         style=\"top:{top}px;height:{height}px;left:{left}%;width:{width}%;\
         background:{bg};border-color:{border};color:{text}\">",
        compact = if compact { " compact" } else { "" },
        col = block.column,
        label = escape_html(block.style.label),
        top = num(block.top_px),
        height = num(block.height_px),
        left = num(block.left_pct),
        width = num(block.width_pct),
        bg = block.style.background,
        border = block.style.border,
        text = block.style.text,
    );
    let client = escape_html(&block.client_name);
    let service = escape_html(&block.service_name);
    if compact {
        let _ = write!(
            html,
            "<span class=\"time\">{}</span> <span class=\"client\">{}</span>",
            block.time_label, client
        );
    } else {
        let _ = write!(
            html,
            "<div class=\"time\">{}</div><div class=\"client\">{}</div><div class=\"service\">{}</div>",
            block.time_label, client, service
        );
    }
    html.push_str("</div>\n");
}
