//! XMLTV guide and M3U playlist rendering.

use camtuner_types::Channel;
use chrono::{DateTime, Duration, Timelike, Utc};
use std::borrow::Cow;
use std::fmt::Write;

const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S +0000";

pub const DEFAULT_GUIDE_HOURS: u32 = 24;
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Look-ahead window of the guide, split into fixed programme slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideWindow {
    pub hours: u32,
    pub slot_minutes: u32,
}

impl Default for GuideWindow {
    fn default() -> Self {
        Self {
            hours: DEFAULT_GUIDE_HOURS,
            slot_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

impl GuideWindow {
    /// Parse query values. Unparsable values fall back to the defaults, then
    /// hours are clamped to 1..=168 and slots to 5..=240 minutes.
    pub fn from_query(hours: Option<&str>, slot: Option<&str>) -> Self {
        let parse = |value: Option<&str>, default: u32| {
            value
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(default as i64)
        };
        Self {
            hours: parse(hours, DEFAULT_GUIDE_HOURS).clamp(1, 168) as u32,
            slot_minutes: parse(slot, DEFAULT_SLOT_MINUTES).clamp(5, 240) as u32,
        }
    }
}

/// Escape text for XML content and attribute values.
pub fn xml_escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Stream URL of a channel as handed to clients.
pub fn tune_url(base: &str, channel_id: &str) -> String {
    format!("{}/auto/v{}", base.trim_end_matches('/'), channel_id)
}

/// Render an XMLTV document with one synthetic programme per slot per
/// channel, starting at the top of the current UTC hour.
pub fn render_xmltv(channels: &[Channel], now: DateTime<Utc>, window: GuideWindow) -> String {
    let start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let end = start + Duration::hours(window.hours as i64);
    let slot = Duration::minutes(window.slot_minutes as i64);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<tv generator-info-name=\"camtuner\">\n");

    for channel in channels {
        let guide_id = channel.guide_id();
        let _ = writeln!(out, "  <channel id=\"{}\">", xml_escape(&guide_id));
        let _ = writeln!(
            out,
            "    <display-name>{}</display-name>",
            xml_escape(&channel.name)
        );
        if !channel.tvg_logo.is_empty() {
            let _ = writeln!(out, "    <icon src=\"{}\"/>", xml_escape(&channel.tvg_logo));
        }
        out.push_str("  </channel>\n");
    }

    for channel in channels {
        let guide_id = channel.guide_id();
        let title = xml_escape(channel.guide_title());
        let desc = xml_escape(channel.guide_description());
        let mut t = start;
        while t < end {
            let stop = t + slot;
            let _ = writeln!(
                out,
                "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">",
                t.format(XMLTV_TIME_FORMAT),
                stop.format(XMLTV_TIME_FORMAT),
                xml_escape(&guide_id)
            );
            let _ = writeln!(out, "    <title lang=\"en\">{}</title>", title);
            let _ = writeln!(out, "    <desc lang=\"en\">{}</desc>", desc);
            out.push_str("  </programme>\n");
            t = stop;
        }
    }

    out.push_str("</tv>\n");
    out
}

/// Render an extended M3U playlist pointing at the guide and tune URLs.
pub fn render_m3u(channels: &[Channel], base: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut out = format!("#EXTM3U x-tvg-url=\"{}/xmltv\"\n", base);
    for channel in channels {
        let _ = writeln!(
            out,
            "#EXTINF:-1 tvg-id=\"{}\" tvg-logo=\"{}\",{}",
            channel.guide_id(),
            channel.tvg_logo,
            channel.name
        );
        let _ = writeln!(out, "{}", tune_url(base, &channel.id));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lineup() -> Vec<Channel> {
        let mut door = Channel::new("101", "Front & Back", "rtsp://door/live");
        door.tvg_logo = "http://logos/door.png".to_string();
        let yard = Channel::new("102", "Yard", "http://yard/live.m3u8");
        vec![door, yard]
    }

    #[test]
    fn test_window_defaults_and_clamps() {
        assert_eq!(GuideWindow::from_query(None, None), GuideWindow::default());
        assert_eq!(
            GuideWindow::from_query(Some("abc"), Some("")),
            GuideWindow::default()
        );
        assert_eq!(
            GuideWindow::from_query(Some("0"), Some("1")),
            GuideWindow { hours: 1, slot_minutes: 5 }
        );
        assert_eq!(
            GuideWindow::from_query(Some("1000"), Some("999")),
            GuideWindow { hours: 168, slot_minutes: 240 }
        );
        assert_eq!(
            GuideWindow::from_query(Some("-4"), Some("45")),
            GuideWindow { hours: 1, slot_minutes: 45 }
        );
    }

    #[test]
    fn test_xmltv_slots_start_at_the_hour() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 13, 47, 12).unwrap();
        let xml = render_xmltv(
            &lineup(),
            now,
            GuideWindow { hours: 1, slot_minutes: 30 },
        );

        assert!(xml.contains("<channel id=\"cam.101\">"));
        assert!(xml.contains("<display-name>Front &amp; Back</display-name>"));
        assert!(xml.contains("<icon src=\"http://logos/door.png\"/>"));
        assert!(xml.contains(
            "<programme start=\"20240601130000 +0000\" stop=\"20240601133000 +0000\" channel=\"cam.101\">"
        ));
        assert!(xml.contains(
            "<programme start=\"20240601133000 +0000\" stop=\"20240601140000 +0000\" channel=\"cam.102\">"
        ));
        assert_eq!(xml.matches("<programme ").count(), 4);
        assert!(xml.contains("<desc lang=\"en\">Live feed</desc>"));
        assert!(xml.ends_with("</tv>\n"));
    }

    #[test]
    fn test_xmltv_partial_last_slot() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let xml = render_xmltv(
            &lineup()[..1],
            now,
            GuideWindow { hours: 1, slot_minutes: 45 },
        );
        assert_eq!(xml.matches("<programme ").count(), 2);
        assert!(xml.contains("stop=\"20240601013000 +0000\""));
    }

    #[test]
    fn test_mosaic_guide_description() {
        let mut grid = Channel::mosaic("200", "Grid", vec!["1".into(), "2".into()], true);
        grid.epg_desc.clear();
        grid.epg_title = Some("All cameras".to_string());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let xml = render_xmltv(&[grid], now, GuideWindow { hours: 1, slot_minutes: 60 });
        assert!(xml.contains("<title lang=\"en\">All cameras</title>"));
        assert!(xml.contains("<desc lang=\"en\">Mosaic feed</desc>"));
    }

    #[test]
    fn test_m3u() {
        let m3u = render_m3u(&lineup(), "http://10.0.0.2:8000/");
        let lines: Vec<&str> = m3u.lines().collect();

        assert_eq!(lines[0], "#EXTM3U x-tvg-url=\"http://10.0.0.2:8000/xmltv\"");
        assert_eq!(
            lines[1],
            "#EXTINF:-1 tvg-id=\"cam.101\" tvg-logo=\"http://logos/door.png\",Front & Back"
        );
        assert_eq!(lines[2], "http://10.0.0.2:8000/auto/v101");
        assert_eq!(lines[4], "http://10.0.0.2:8000/auto/v102");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_xml_escape_borrows_clean_text() {
        assert!(matches!(xml_escape("Yard"), Cow::Borrowed("Yard")));
        assert_eq!(xml_escape("<a href='x'>"), "&lt;a href=&apos;x&apos;&gt;");
    }
}
