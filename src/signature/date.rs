//! PDF date strings (`D:YYYYMMDDHHmmSSOHH'mm'`).

use chrono::{FixedOffset, NaiveDate};

use crate::model::PdfTimestamp;

/// Parse a PDF date string.
///
/// Only the year is mandatory; missing month and day default to 1 and a
/// missing time of day to midnight. The `D:` prefix is optional. Returns
/// `None` for anything malformed, including out-of-range components.
pub fn parse_pdf_date(raw: &str) -> Option<PdfTimestamp> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 || digits.len() > 14 || digits.len() % 2 != 0 {
        return None;
    }

    let component = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(d) => d.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = component(4, 1)?;
    let day = component(6, 1)?;
    let hour = component(8, 0)?;
    let minute = component(10, 0)?;
    let second = component(12, 0)?;

    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_zone(zone)?;
    Some(PdfTimestamp::new(local, offset))
}

/// `Z`, `+HH'mm'`, `-HH'mm`, `+HH` or nothing.
///
/// The outer `None` means malformed; `Some(None)` means no zone was given.
fn parse_zone(zone: &str) -> Option<Option<FixedOffset>> {
    let Some(sign) = zone.chars().next() else {
        return Some(None);
    };

    let rest = &zone[sign.len_utf8()..];
    let sign = match sign {
        'Z' => {
            // Some writers emit Z00'00'
            return rest
                .chars()
                .all(|c| c == '0' || c == '\'')
                .then(|| FixedOffset::east_opt(0));
        }
        '+' => 1,
        '-' => -1,
        _ => return None,
    };

    let mut parts = rest.trim_end_matches('\'').split('\'');
    let hours = two_digits(parts.next()?)?;
    let minutes = match parts.next() {
        Some(m) => two_digits(m)?,
        None => 0,
    };
    if parts.next().is_some() || hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60) as i32).map(Some)
}

fn two_digits(s: &str) -> Option<u32> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
