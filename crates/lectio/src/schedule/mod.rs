/// Schedule fetching: query composition and page scraping
mod decoder;
mod types;

pub use decoder::decode_entry;
pub use types::*;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::LectioError;
use crate::session::{SessionManager, Transport};

/// Advanced schedule page; unlike the weekly view it accepts arbitrary ranges.
const SCHEDULE_PAGE: &str = "SkemaAvanceret.aspx";

/// Query timestamp format (ISO-8601, seconds precision, no offset).
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Text of the placeholder row Lectio shows when nothing matches.
pub const NO_RECORDS_MARKER: &str = "Ingen aktiviteter";

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.list.texttop.lf-grid").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static ENTRY_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[data-additionalinfo]").unwrap());

/// Whose schedule to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleTarget {
    Student(u64),
    Teacher(u64),
    Room(u64),
}

impl ScheduleTarget {
    /// Query parameter selecting this target.
    fn selector(&self) -> (&'static str, u64) {
        match *self {
            ScheduleTarget::Student(id) => ("studentsel", id),
            ScheduleTarget::Teacher(id) => ("teachersel", id),
            ScheduleTarget::Room(id) => ("lokalesel", id),
        }
    }
}

/// What to do with an entry whose text can't be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedEntryPolicy {
    /// Fail the whole fetch
    #[default]
    Abort,
    /// Log and leave the entry out
    Skip,
}

/// A date-bounded schedule request for one target.
#[derive(Debug, Clone)]
pub struct ScheduleQuery {
    pub target: ScheduleTarget,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Widen the range to cover both boundary days completely
    pub whole_days: bool,
    pub on_malformed: MalformedEntryPolicy,
}

impl ScheduleQuery {
    /// Creates a whole-day query that aborts on malformed entries.
    pub fn new(target: ScheduleTarget, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            target,
            start,
            end,
            whole_days: true,
            on_malformed: MalformedEntryPolicy::Abort,
        }
    }

    /// Query covering the given days, both inclusive.
    pub fn for_days(target: ScheduleTarget, first: NaiveDate, last: NaiveDate) -> Self {
        Self::new(
            target,
            first.and_time(NaiveTime::MIN),
            last.and_time(NaiveTime::MIN),
        )
    }

    pub fn whole_days(mut self, whole_days: bool) -> Self {
        self.whole_days = whole_days;
        self
    }

    pub fn on_malformed(mut self, policy: MalformedEntryPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// The range actually sent to Lectio.
    ///
    /// In whole-day mode both bounds move to midnight and the end moves one
    /// day ahead, so every entry on both boundary days is included.
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        if !self.whole_days {
            return (self.start, self.end);
        }

        let start = self.start.date().and_time(NaiveTime::MIN);
        let end = self
            .end
            .date()
            .succ_opt()
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN);
        (start, end)
    }

    /// Page path with query string, relative to the institution.
    pub fn path(&self) -> String {
        let (start, end) = self.bounds();
        let (selector, id) = self.target.selector();

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("type", "ShowListAll")
            .append_pair("starttime", &start.format(QUERY_TIME_FORMAT).to_string())
            .append_pair("endtime", &end.format(QUERY_TIME_FORMAT).to_string())
            .append_pair("dagsbemaerk", "0")
            .append_pair(selector, &id.to_string())
            .finish();

        format!("{}?{}", SCHEDULE_PAGE, query)
    }
}

/// Fetches and decodes all schedule entries matching the query.
///
/// One request covers the whole range. An empty result is not an error.
pub async fn fetch_schedule<T: Transport>(
    session: &mut SessionManager<T>,
    query: &ScheduleQuery,
) -> Result<Vec<ScheduleRecord>, LectioError> {
    let (start, end) = query.bounds();
    info!(
        schedule_target = ?query.target,
        start = %start,
        end = %end,
        "Fetching schedule"
    );

    let response = session.get(&query.path()).await?;
    if !response.is_success() {
        return Err(LectioError::UnexpectedResponse {
            message: format!("schedule page returned status {}", response.status),
        });
    }

    let records = parse_schedule_page(&response.body, session.config(), query.on_malformed)?;
    info!("Parsed {} schedule entries", records.len());

    Ok(records)
}

/// Extracts and decodes every entry row of a schedule page
///
/// # Arguments
/// * `html` - The `SkemaAvanceret.aspx` page
/// * `config` - Used to make the entries' detail links absolute
/// * `policy` - Whether a malformed entry aborts the parse or is skipped
pub fn parse_schedule_page(
    html: &str,
    config: &ClientConfig,
    policy: MalformedEntryPolicy,
) -> Result<Vec<ScheduleRecord>, LectioError> {
    let document = Html::parse_document(html);

    let Some(table) = document.select(&TABLE_SELECTOR).next() else {
        if text_of(&document.root_element()).contains(NO_RECORDS_MARKER) {
            return Ok(Vec::new());
        }
        return Err(LectioError::UnexpectedResponse {
            message: "schedule page has no entry table".to_string(),
        });
    };

    let mut records = Vec::new();

    // Header and decoration rows carry a class, entry rows don't
    for row in table
        .select(&ROW_SELECTOR)
        .filter(|row| row.value().attr("class").is_none())
    {
        let Some(link) = row.select(&ENTRY_LINK_SELECTOR).next() else {
            if text_of(&row).contains(NO_RECORDS_MARKER) {
                continue;
            }
            return Err(LectioError::UnexpectedResponse {
                message: format!("schedule row without entry link: {:?}", text_of(&row).trim()),
            });
        };

        let info = link.value().attr("data-additionalinfo").unwrap_or_default();
        let record = match decode_entry(info) {
            Ok(record) => record,
            Err(e @ LectioError::MalformedScheduleEntry { .. })
                if policy == MalformedEntryPolicy::Skip =>
            {
                warn!(error = %e, "Skipping malformed schedule entry");
                continue;
            }
            Err(e) => return Err(e),
        };

        let record = match link.value().attr("href") {
            Some(href) => record.with_url(config.absolute_link(href)?.to_string()),
            None => record,
        };
        records.push(record);
    }

    Ok(records)
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn schedule_html(rows: &[(&str, &str)]) -> String {
        let mut html = String::from(
            r#"<html><body><table class="list texttop lf-grid">
            <tr class="noBorder"><th>Tid</th><th>Aktivitet</th></tr>"#,
        );
        for (info, href) in rows {
            html.push_str(&format!(
                r#"<tr><td><a href="{}" data-additionalinfo="{}">x</a></td></tr>"#,
                href, info
            ));
        }
        html.push_str("</table></body></html>");
        html
    }

    #[test]
    fn test_whole_day_bounds() {
        let query = ScheduleQuery::new(
            ScheduleTarget::Student(7),
            at(2024, 3, 1, 13, 37),
            at(2024, 3, 4, 9, 15),
        );

        assert_eq!(query.bounds(), (at(2024, 3, 1, 0, 0), at(2024, 3, 5, 0, 0)));
    }

    #[test]
    fn test_exact_bounds() {
        let query = ScheduleQuery::new(
            ScheduleTarget::Room(3),
            at(2024, 3, 1, 13, 37),
            at(2024, 3, 1, 13, 38),
        )
        .whole_days(false);

        assert_eq!(query.bounds(), (at(2024, 3, 1, 13, 37), at(2024, 3, 1, 13, 38)));
    }

    #[test]
    fn test_query_path() {
        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();

        let path = ScheduleQuery::for_days(ScheduleTarget::Teacher(42), first, last).path();

        assert!(path.starts_with("SkemaAvanceret.aspx?type=ShowListAll&"));
        assert!(path.contains("starttime=2024-03-01T00%3A00%3A00"));
        assert!(path.contains("endtime=2024-04-01T00%3A00%3A00"));
        assert!(path.contains("dagsbemaerk=0"));
        assert!(path.ends_with("teachersel=42"));

        let room_path = ScheduleQuery::for_days(ScheduleTarget::Room(9), first, last).path();
        assert!(room_path.ends_with("lokalesel=9"));
        let student_path = ScheduleQuery::for_days(ScheduleTarget::Student(5), first, last).path();
        assert!(student_path.ends_with("studentsel=5"));
    }

    #[test]
    fn test_parse_page_attaches_links() {
        let html = schedule_html(&[
            (
                "Aflyst!&#10;01/03-2024 08:00 til 08:45&#10;Hold: 1.a Da&#10;Lærer: aa",
                "/lectio/123/aktivitet/aktivitetforside2.aspx?absid=1",
            ),
            (
                "02/03-2024 10:00 til 11:30&#10;Hold: 1.a Ma",
                "/lectio/123/aktivitet/aktivitetforside2.aspx?absid=2",
            ),
        ]);

        let records =
            parse_schedule_page(&html, &ClientConfig::new(INST), MalformedEntryPolicy::Abort)
                .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, EntryStatus::Cancelled);
        assert_eq!(records[0].teacher.as_deref(), Some("aa"));
        assert_eq!(
            records[0].url.as_deref(),
            Some("https://www.lectio.dk/lectio/123/aktivitet/aktivitetforside2.aspx?absid=1")
        );
        assert_eq!(records[1].start_time, at(2024, 3, 2, 10, 0));
        assert_eq!(records[1].subject.as_deref(), Some("1.a Ma"));
    }

    #[test]
    fn test_no_records_marker_is_empty() {
        let html = r#"<html><body><table class="list texttop lf-grid">
            <tr class="noBorder"><th>Tid</th></tr>
            <tr><td colspan="3">Ingen aktiviteter</td></tr>
            </table></body></html>"#;

        let records =
            parse_schedule_page(html, &ClientConfig::new(INST), MalformedEntryPolicy::Abort)
                .unwrap();

        assert!(records.is_empty());

        let no_table = "<html><body><div>Ingen aktiviteter</div></body></html>";
        let records =
            parse_schedule_page(no_table, &ClientConfig::new(INST), MalformedEntryPolicy::Abort)
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_page_without_table_is_unexpected() {
        let err = parse_schedule_page(
            "<html><body>Vedligeholdelse</body></html>",
            &ClientConfig::new(INST),
            MalformedEntryPolicy::Abort,
        )
        .unwrap_err();

        assert!(matches!(err, LectioError::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_malformed_entry_policy() {
        let html = schedule_html(&[
            ("Fysik&#10;Hold: 1.a Fy", "/lectio/123/a?id=1"),
            ("01/03-2024 08:00 til 08:45", "/lectio/123/a?id=2"),
        ]);
        let config = ClientConfig::new(INST);

        let err = parse_schedule_page(&html, &config, MalformedEntryPolicy::Abort).unwrap_err();
        assert!(matches!(err, LectioError::MalformedScheduleEntry { .. }));

        let records = parse_schedule_page(&html, &config, MalformedEntryPolicy::Skip).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_time, at(2024, 3, 1, 8, 0));
    }

    #[tokio::test]
    async fn test_fetch_schedule_through_session() {
        let html = schedule_html(&[("01/03-2024 08:00 til 08:45", "/lectio/123/a?id=1")]);
        let transport = ScriptedTransport::new(vec![
            login_page(),
            login_accepted(),
            page("SkemaAvanceret.aspx", &html),
        ]);
        let mut session = SessionManager::with_transport(ClientConfig::new(INST), transport);
        session.authenticate("alice", "pw", true).await.unwrap();

        let query = ScheduleQuery::new(
            ScheduleTarget::Student(77),
            at(2024, 3, 1, 12, 0),
            at(2024, 3, 1, 12, 0),
        );
        let records = fetch_schedule(&mut session, &query).await.unwrap();

        assert_eq!(records.len(), 1);
        let sent = session.transport().sent();
        let request = sent.last().unwrap();
        assert_eq!(request.url.path(), "/lectio/123/SkemaAvanceret.aspx");
        let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("studentsel".to_string(), "77".to_string())));
        assert!(pairs.contains(&("starttime".to_string(), "2024-03-01T00:00:00".to_string())));
        assert!(pairs.contains(&("endtime".to_string(), "2024-03-02T00:00:00".to_string())));
    }
}
