//! Decoder for the `data-additionalinfo` text of a schedule entry.
//!
//! The text is consumed line by line from the front:
//!
//! ```text
//! Ændret!                          optional status marker
//! Matematik prøve                  optional title
//! 01/03-2024 08:00 til 08:45       time range, mandatory
//! Hold: 1.a Ma                     optional
//! Lærer: Anders And (aa)           optional, also "Lærere:"
//! Lokale: 0.015                    optional, also "Lokaler:"
//!                                  separator
//! Lektier: ...                     everything else is extra info
//! ```
//!
//! The labelled fields are found by searching the whole text, while lines are
//! consumed positionally. That only lines up when the fields appear in the
//! order above, so each consumed line is checked against the label it is
//! attributed to and a mismatch is reported as a malformed entry.

use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

use super::types::{EntryStatus, ScheduleRecord};
use crate::error::LectioError;

const DATE_TIME_FORMAT: &str = "%d/%m-%Y %H:%M";
const TIME_FORMAT: &str = "%H:%M";
const RANGE_SEPARATOR: &str = " til ";

static TIME_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,2}/[0-9]{1,2}-[0-9]{4} [0-9]{2}:[0-9]{2}").unwrap());
static SUBJECT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Hold: (.*)").unwrap());
static TEACHER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lærere?: (.*)").unwrap());
static ROOM_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Lokaler?: (.*)").unwrap());

/// Decodes one entry's description text into a record.
///
/// The returned record has no `url`; that comes from the surrounding markup.
///
/// # Returns
/// * `Err(MalformedScheduleEntry)` - if the time range line is missing or
///   unparseable, or a labelled field is not on the line it should be
pub fn decode_entry(info: &str) -> Result<ScheduleRecord, LectioError> {
    let mut lines: VecDeque<&str> = info
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    let status = match lines.front().and_then(|line| EntryStatus::from_marker(line)) {
        Some(status) => {
            lines.pop_front();
            status
        }
        None => EntryStatus::Normal,
    };

    // Anything that is not a time range at this position is the title
    let has_title = lines
        .front()
        .is_some_and(|line| !TIME_LINE_REGEX.is_match(line));
    let title = if has_title {
        lines.pop_front().map(str::to_string)
    } else {
        None
    };

    let time_line = lines
        .pop_front()
        .ok_or_else(|| LectioError::malformed("missing time range line", info))?;
    let (start_time, end_time) =
        parse_time_range(time_line).map_err(|reason| LectioError::malformed(reason, info))?;

    let subject = take_labelled(&mut lines, &SUBJECT_REGEX, "Hold", info)?;
    let teacher = take_labelled(&mut lines, &TEACHER_REGEX, "Lærer", info)?;
    let room = take_labelled(&mut lines, &ROOM_REGEX, "Lokale", info)?;

    // First remaining line is the blank separator
    let extra_info = match lines.pop_front() {
        Some(_) => {
            let rest = lines.into_iter().collect::<Vec<_>>().join("\n");
            (!rest.is_empty()).then_some(rest)
        }
        None => None,
    };

    Ok(ScheduleRecord {
        status,
        title,
        start_time,
        end_time,
        subject,
        teacher,
        room,
        extra_info,
        url: None,
    })
}

/// Parses `D/M-YYYY HH:MM til HH:MM` or `D/M-YYYY HH:MM til D/M-YYYY HH:MM`.
fn parse_time_range(line: &str) -> Result<(NaiveDateTime, NaiveDateTime), String> {
    let (left, right) = line
        .split_once(RANGE_SEPARATOR)
        .ok_or_else(|| format!("time range {:?} has no \"til\" separator", line))?;

    let start = NaiveDateTime::parse_from_str(left, DATE_TIME_FORMAT)
        .map_err(|e| format!("invalid start time {:?}: {}", left, e))?;

    let end = if right.chars().count() == 5 {
        // Same-day entry, only the clock time is given
        let time = NaiveTime::parse_from_str(right, TIME_FORMAT)
            .map_err(|e| format!("invalid end time {:?}: {}", right, e))?;
        start.date().and_time(time)
    } else {
        NaiveDateTime::parse_from_str(right, DATE_TIME_FORMAT)
            .map_err(|e| format!("invalid end time {:?}: {}", right, e))?
    };

    if end < start {
        return Err(format!("entry ends before it starts: {:?}", line));
    }

    Ok((start, end))
}

/// Looks up a labelled field anywhere in the text and consumes one line for it.
fn take_labelled(
    lines: &mut VecDeque<&str>,
    regex: &Regex,
    label: &str,
    info: &str,
) -> Result<Option<String>, LectioError> {
    let Some(caps) = regex.captures(info) else {
        return Ok(None);
    };
    let matched = caps[0].trim_end_matches('\r');
    let value = caps[1].trim_end_matches('\r').to_string();

    let line = lines.pop_front().ok_or_else(|| {
        LectioError::malformed(format!("{} found but no line left for it", label), info)
    })?;

    if !line.ends_with(matched) {
        return Err(LectioError::malformed(
            format!(
                "{} field out of order: expected {:?}, found {:?}",
                label, matched, line
            ),
            info,
        ));
    }

    Ok(Some(value))
}
