/// Lectio users (students and teachers)
use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::LectioError;
use crate::schedule::{fetch_schedule, ScheduleQuery, ScheduleRecord, ScheduleTarget};
use crate::session::{SessionManager, Transport};

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#s_m_HeaderContent_MainTitle").unwrap());
static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#s_m_HeaderContent_picctrlthumbimage").unwrap());
static START_URL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='msapplication-starturl']").unwrap());
static USER_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(elev|laerer)?id=([0-9]+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UserKind {
    Student,
    Teacher,
}

impl UserKind {
    /// Name Lectio uses in query strings (`type=elev&elevid=...`).
    fn portal_name(&self) -> &'static str {
        match self {
            UserKind::Student => "elev",
            UserKind::Teacher => "laerer",
        }
    }
}

/// Everything the user's own schedule page tells about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    pub name: String,
    /// Teachers only
    pub initials: Option<String>,
    /// Students only
    pub class_name: Option<String>,
    pub image_url: Option<String>,
}

/// How much is known about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Population {
    /// Only what a listing showed
    Summary { name: Option<String> },
    /// Filled from the user's detail page
    Detailed(UserDetails),
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub kind: UserKind,
    state: Population,
}

impl User {
    /// A user known only by id (and maybe a display name).
    pub fn summary(id: u64, kind: UserKind, name: Option<String>) -> Self {
        Self {
            id,
            kind,
            state: Population::Summary { name },
        }
    }

    /// Looks up the logged-in user from the front page.
    pub async fn me<T: Transport>(session: &mut SessionManager<T>) -> Result<Self, LectioError> {
        let response = session.get("forside.aspx").await?;
        let (id, kind) = parse_own_user(&response.body)?;
        Ok(Self::summary(id, kind, None))
    }

    pub fn state(&self) -> &Population {
        &self.state
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, Population::Detailed(_))
    }

    pub fn details(&self) -> Option<&UserDetails> {
        match &self.state {
            Population::Detailed(details) => Some(details),
            Population::Summary { .. } => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.state {
            Population::Detailed(details) => Some(details.name.as_str()),
            Population::Summary { name } => name.as_deref(),
        }
    }

    /// Fills in the details from the user's schedule page. No-op once detailed.
    pub async fn populate<T: Transport>(
        &mut self,
        session: &mut SessionManager<T>,
    ) -> Result<(), LectioError> {
        if self.is_populated() {
            return Ok(());
        }

        let kind = self.kind.portal_name();
        let path = format!("SkemaNy.aspx?type={}&{}id={}", kind, kind, self.id);
        debug!(user_id = self.id, kind = ?self.kind, "Populating user");

        let response = session.get(&path).await?;
        let details = parse_user_page(&response.body, self.kind, session.config())?;
        self.state = Population::Detailed(details);
        Ok(())
    }

    pub fn schedule_target(&self) -> ScheduleTarget {
        match self.kind {
            UserKind::Student => ScheduleTarget::Student(self.id),
            UserKind::Teacher => ScheduleTarget::Teacher(self.id),
        }
    }

    /// Fetches the user's schedule between two instants.
    pub async fn schedule<T: Transport>(
        &self,
        session: &mut SessionManager<T>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        whole_days: bool,
    ) -> Result<Vec<ScheduleRecord>, LectioError> {
        let query = ScheduleQuery::new(self.schedule_target(), start, end).whole_days(whole_days);
        fetch_schedule(session, &query).await
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

/// Parses the header of a user's `SkemaNy.aspx` page.
///
/// Students: `"Eleven <name>, <class> - Skema"`.
/// Teachers: `"Læreren <initials> - <name> - Skema"`.
pub fn parse_user_page(
    html: &str,
    kind: UserKind,
    config: &ClientConfig,
) -> Result<UserDetails, LectioError> {
    let document = Html::parse_document(html);

    let raw_title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| LectioError::ParseError {
            message: "user page has no header title".to_string(),
        })?;

    // Drop the leading "Eleven"/"Læreren"
    let title = raw_title.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");

    let unexpected = || LectioError::ParseError {
        message: format!("unexpected user header {:?}", title),
    };

    let (name, initials, class_name) = match kind {
        UserKind::Student => {
            let (name, rest) = title.split_once(", ").ok_or_else(unexpected)?;
            let class_name = rest.split(" - ").next().unwrap_or(rest);
            (name.to_string(), None, Some(class_name.to_string()))
        }
        UserKind::Teacher => {
            let mut parts = title.split(" - ");
            let initials = parts.next().ok_or_else(unexpected)?;
            let name = parts.next().ok_or_else(unexpected)?;
            (name.to_string(), Some(initials.to_string()), None)
        }
    };

    let image_url = match document
        .select(&IMAGE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("src"))
    {
        Some(src) => Some(format!("{}&fullsize=1", config.absolute_link(src)?)),
        None => None,
    };

    Ok(UserDetails {
        name,
        initials,
        class_name,
        image_url,
    })
}

/// Reads the logged-in user's id and kind from the front page.
pub fn parse_own_user(html: &str) -> Result<(u64, UserKind), LectioError> {
    let document = Html::parse_document(html);

    let start_url = document
        .select(&START_URL_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .ok_or_else(|| LectioError::ParseError {
            message: "front page has no start url".to_string(),
        })?;

    let caps = USER_ID_REGEX
        .captures(start_url)
        .ok_or_else(|| LectioError::ParseError {
            message: format!("no user id in start url {:?}", start_url),
        })?;

    let kind = match caps.get(1).map(|m| m.as_str()) {
        Some("laerer") => UserKind::Teacher,
        _ => UserKind::Student,
    };
    let id = caps[2].parse::<u64>().map_err(|e| LectioError::ParseError {
        message: format!("invalid user id in {:?}: {}", start_url, e),
    })?;

    Ok((id, kind))
}
