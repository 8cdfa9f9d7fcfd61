use std::fmt::Display;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

/// The date format used in search qualifiers.
pub const QUALIFIER_DATE_FORMAT: &str = "%Y-%m-%d";

/// A search issued against a remote search endpoint.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub struct SearchQuery {
    /// The free text query.
    pub(crate) text: String,

    /// The sort key, if any.
    pub(crate) sort: Option<String>,

    /// The date window the search is narrowed to, if any.
    pub(crate) window: Option<DateWindow>,
}

impl SearchQuery {
    /// Creates a new `SearchQuery` with the given text and sort key.
    pub fn new(text: &str, sort: Option<String>) -> Self {
        Self {
            text: text.to_string(),
            sort,
            window: None,
        }
    }

    /// Returns a copy of the query narrowed to the given date window.
    pub fn with_window(&self, window: DateWindow) -> Self {
        Self {
            window: Some(window),
            ..self.clone()
        }
    }

    /// Retrieves the free text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Retrieves the sort key.
    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Retrieves the date window.
    pub fn window(&self) -> Option<&DateWindow> {
        self.window.as_ref()
    }

    /// Renders the text sent to the search endpoint, including the date window qualifier.
    pub fn search_text(&self) -> String {
        match &self.window {
            Some(window) => format!("{} pushed:{}", self.text, window.qualifier()),
            None => self.text.clone(),
        }
    }

    /// Creates a dummy `SearchQuery` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        Self::new("digital twin", None)
    }
}

impl Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SearchQuery: text={}, sort={:?}, window={:?}",
            self.text,
            self.sort,
            self.window.as_ref().map(|window| window.qualifier())
        )
    }
}

/// A calendar month used to partition a search whose total exceeds the endpoint ceiling.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Creates the window covering the month that contains `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day0(0).unwrap_or(date);
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.checked_sub_days(Days::new(1)))
            .unwrap_or(NaiveDate::MAX);

        Self { start, end }
    }

    /// Returns the window of the following month.
    pub fn next(&self) -> Option<Self> {
        self.start
            .checked_add_months(Months::new(1))
            .map(Self::month_of)
    }

    /// Retrieves the first day of the window.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Retrieves the last day of the window.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Renders the window as a `start..end` range qualifier.
    pub fn qualifier(&self) -> String {
        format!(
            "{}..{}",
            self.start.format(QUALIFIER_DATE_FORMAT),
            self.end.format(QUALIFIER_DATE_FORMAT)
        )
    }
}

/// The position of a page in a paginated result.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Hash)]
pub enum PageToken {
    /// The first page.
    Start,

    /// A 1-based page number.
    Offset(u32),

    /// The cursor of the last seen record.
    Cursor(String),

    /// An absolute URL of the next page.
    Link(String),
}

impl Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageToken::Start => write!(f, "start"),
            PageToken::Offset(page) => write!(f, "page={page}"),
            PageToken::Cursor(cursor) => write!(f, "cursor={cursor}"),
            PageToken::Link(url) => write!(f, "link={url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn month_window_covers_whole_month() {
        let window = DateWindow::month_of(date(2024, 2, 17));

        assert_eq!(date(2024, 2, 1), window.start());
        assert_eq!(date(2024, 2, 29), window.end());
        assert_eq!("2024-02-01..2024-02-29", window.qualifier());
    }

    #[test]
    fn next_window_crosses_year_boundary() {
        let window = DateWindow::month_of(date(2014, 12, 1)).next().unwrap();

        assert_eq!(date(2015, 1, 1), window.start());
        assert_eq!(date(2015, 1, 31), window.end());
    }

    #[test]
    fn search_text_includes_window_qualifier() {
        let query = SearchQuery::new("digital twin sort:updated-asc", None);
        let windowed = query.with_window(DateWindow::month_of(date(2014, 1, 1)));

        assert_eq!("digital twin sort:updated-asc", query.search_text());
        assert_eq!(
            "digital twin sort:updated-asc pushed:2014-01-01..2014-01-31",
            windowed.search_text()
        );
        assert!(query.window().is_none());
    }
}
