//! Report composition: merge current conditions, air quality and the
//! segmented forecast into one rendered message plus its structured record.
//!
//! Pure functions, no I/O. Rendering uses Telegram HTML markup, which is
//! what the delivery channel is configured with.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::model::{AirQuality, ConditionsReport, CurrentConditions, ForecastSegment, SegmentLabel};

/// Map the provider's 1-5 ordinal AQI to its label. Total: anything
/// outside 1-5 (including missing) is "Unknown".
pub fn aqi_label(index: Option<i64>) -> &'static str {
    match index {
        Some(1) => "Good",
        Some(2) => "Fair",
        Some(3) => "Moderate",
        Some(4) => "Poor",
        Some(5) => "Very Poor",
        _ => "Unknown",
    }
}

/// Build the rendered report and its structured record.
///
/// The record carries every field the advice generator needs; downstream
/// consumers never re-parse the rendered text.
pub fn compose(
    display_name: &str,
    current: &CurrentConditions,
    air: &AirQuality,
    segments: BTreeMap<SegmentLabel, ForecastSegment>,
    now: DateTime<Utc>,
) -> (String, ConditionsReport) {
    let local_time = (now + Duration::seconds(i64::from(current.utc_offset_seconds)))
        .format("%Y-%m-%d %H:%M")
        .to_string();
    let label = aqi_label(air.index);

    let mut lines = vec![
        format!("<b>🏙 City:</b> <i>{display_name}</i>"),
        format!("<b>🕒 Local time:</b> <i>{local_time}</i>"),
        format!(
            "<b>🌡 Current temperature:</b> <i>{}°C — {}</i>",
            current.temperature, current.description
        ),
        format!("<b>🌫 AQI:</b> <i>{} ({})</i>", label, fmt_opt(air.index)),
        format!("<b>PM2.5:</b> <i>{} µg/m³</i>", fmt_opt(air.pm2_5)),
        format!("<b>PM10:</b> <i>{} µg/m³</i>", fmt_opt(air.pm10)),
        String::new(),
        "<b>📈 Forecast (next day):</b>".to_string(),
    ];

    for seg_label in SegmentLabel::ALL {
        match segments.get(&seg_label) {
            Some(seg) => lines.push(format!(
                "<i>{} ({}): {}°C, {}</i>",
                seg_label.as_str(),
                seg.local_time,
                seg.temperature,
                seg.description
            )),
            None => lines.push(format!("<i>{}: no data</i>", seg_label.as_str())),
        }
    }

    let rendered = lines.join("\n");
    let record = ConditionsReport {
        display_name: display_name.to_string(),
        local_time,
        temperature: current.temperature,
        description: current.description.clone(),
        aqi_index: air.index,
        aqi_label: label,
        pm2_5: air.pm2_5,
        pm10: air.pm10,
        segments,
    };

    (rendered, record)
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn current() -> CurrentConditions {
        CurrentConditions {
            temperature: 23.5,
            description: "scattered clouds".into(),
            utc_offset_seconds: 5 * 3600,
        }
    }

    fn air() -> AirQuality {
        AirQuality { index: Some(2), pm2_5: Some(8.4), pm10: Some(12.1) }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 7, 30, 0).single().expect("valid timestamp")
    }

    #[test]
    fn aqi_mapping_is_total() {
        assert_eq!(aqi_label(Some(1)), "Good");
        assert_eq!(aqi_label(Some(2)), "Fair");
        assert_eq!(aqi_label(Some(3)), "Moderate");
        assert_eq!(aqi_label(Some(4)), "Poor");
        assert_eq!(aqi_label(Some(5)), "Very Poor");
        assert_eq!(aqi_label(Some(0)), "Unknown");
        assert_eq!(aqi_label(Some(6)), "Unknown");
        assert_eq!(aqi_label(Some(-3)), "Unknown");
        assert_eq!(aqi_label(None), "Unknown");
    }

    #[test]
    fn rendering_has_fixed_line_order() {
        let (text, _) = compose("Tashkent, UZ", &current(), &air(), BTreeMap::new(), now());
        let lines: Vec<_> = text.lines().collect();

        assert!(lines[0].contains("Tashkent, UZ"));
        assert!(lines[1].contains("2025-06-10 12:30")); // UTC+5 local time
        assert!(lines[2].contains("23.5°C"));
        assert!(lines[2].contains("scattered clouds"));
        assert!(lines[3].contains("Fair (2)"));
        assert!(lines[4].contains("8.4"));
        assert!(lines[5].contains("12.1"));
        assert_eq!(lines[6], "");
        assert!(lines[7].contains("Forecast"));
    }

    #[test]
    fn absent_segments_render_no_data_in_order() {
        let mut segments = BTreeMap::new();
        segments.insert(
            SegmentLabel::Afternoon,
            ForecastSegment {
                local_time: "2025-06-11 15:00".into(),
                temperature: 31.0,
                description: "clear sky".into(),
            },
        );
        let (text, _) = compose("X", &current(), &air(), segments, now());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[8], "<i>Morning: no data</i>");
        assert_eq!(lines[9], "<i>Afternoon (2025-06-11 15:00): 31°C, clear sky</i>");
        assert_eq!(lines[10], "<i>Evening: no data</i>");
    }

    #[test]
    fn missing_air_quality_renders_unknown() {
        let (text, record) =
            compose("X", &current(), &AirQuality::default(), BTreeMap::new(), now());
        assert!(text.contains("Unknown (n/a)"));
        assert!(text.contains("<b>PM2.5:</b> <i>n/a µg/m³</i>"));
        assert_eq!(record.aqi_label, "Unknown");
        assert_eq!(record.aqi_index, None);
    }

    #[test]
    fn record_carries_all_fields() {
        let mut segments = BTreeMap::new();
        segments.insert(
            SegmentLabel::Morning,
            ForecastSegment {
                local_time: "2025-06-11 09:00".into(),
                temperature: 18.0,
                description: "light rain".into(),
            },
        );
        let (_, record) = compose("Tashkent, UZ", &current(), &air(), segments, now());

        assert_eq!(record.display_name, "Tashkent, UZ");
        assert_eq!(record.local_time, "2025-06-10 12:30");
        assert_eq!(record.temperature, 23.5);
        assert_eq!(record.aqi_index, Some(2));
        assert_eq!(record.aqi_label, "Fair");
        assert_eq!(record.pm2_5, Some(8.4));
        assert_eq!(record.pm10, Some(12.1));
        assert_eq!(record.segments.len(), 1);
    }
}
