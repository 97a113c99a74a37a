//! Query construction for the external analytics store.
//!
//! The archive keeps commit timelines in a columnar database outside this
//! crate. [`AnalyticsStore`] is the seam to it: implementations run SQL and
//! return rows as JSON values. The builders here only produce SQL and
//! interpret the rows.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use woc_types::ObjectKey;

use crate::error::{SdkError, SdkResult};

/// One result row, columns in `SELECT` order.
pub type Row = Vec<Value>;

/// Executes queries against the analytics store.
pub trait AnalyticsStore {
    fn query(&self, sql: &str) -> SdkResult<Vec<Row>>;
}

/// Default table of per-commit rows.
pub const COMMITS_TABLE: &str = "commits";

/// Default table of per-project rows.
pub const PROJECTS_TABLE: &str = "projects";

/// A bound of a [`TimeRange`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    /// Unix seconds, compared against the `time` column.
    Timestamp(i64),
    /// A `YYYY-MM-DD` date, compared against the `date` column.
    Date(String),
}

impl From<i64> for TimeBound {
    fn from(ts: i64) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<&str> for TimeBound {
    fn from(date: &str) -> Self {
        Self::Date(date.to_string())
    }
}

impl From<String> for TimeBound {
    fn from(date: String) -> Self {
        Self::Date(date)
    }
}

/// A closed time range, or a single instant when there is no end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeRange {
    start: TimeBound,
    end: Option<TimeBound>,
}

impl TimeRange {
    /// Both bounds must be of the same kind.
    pub fn new(start: impl Into<TimeBound>, end: Option<TimeBound>) -> SdkResult<Self> {
        let start = start.into();
        match (&start, &end) {
            (TimeBound::Timestamp(_), Some(TimeBound::Date(_)))
            | (TimeBound::Date(_), Some(TimeBound::Timestamp(_))) => {
                return Err(SdkError::InvalidTimeRange(format!(
                    "{start:?} and {end:?} are of different kinds"
                )))
            }
            (TimeBound::Timestamp(s), Some(TimeBound::Timestamp(e))) if e < s => {
                return Err(SdkError::InvalidTimeRange(format!("end {e} precedes start {s}")))
            }
            _ => {}
        }
        Ok(Self { start, end })
    }

    pub fn at(instant: impl Into<TimeBound>) -> Self {
        Self {
            start: instant.into(),
            end: None,
        }
    }

    pub fn between(start: impl Into<TimeBound>, end: impl Into<TimeBound>) -> SdkResult<Self> {
        Self::new(start, Some(end.into()))
    }

    /// The condition selecting rows in the range.
    pub fn where_clause(&self) -> String {
        match &self.end {
            Some(end) => format!("{} AND {}", condition(&self.start, ">="), condition(end, "<=")),
            None => condition(&self.start, "="),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.where_clause())
    }
}

fn condition(bound: &TimeBound, op: &str) -> String {
    match bound {
        TimeBound::Timestamp(ts) => format!("time{op}{ts}"),
        TimeBound::Date(date) => format!("date{op}toDate({})", quote(date)),
    }
}

/// SQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Hash columns are stored binary; select them as lowercase hex.
fn hex_column(column: &str) -> String {
    format!("lower(hex({column}))")
}

fn parse_key(value: &Value) -> SdkResult<ObjectKey> {
    value
        .as_str()
        .and_then(|hex| ObjectKey::from_hex(hex).ok())
        .ok_or_else(|| SdkError::UnexpectedRow(format!("expected a hex key, got {value}")))
}

/// Integers arrive as JSON numbers or, for 64-bit columns, as strings.
fn parse_int(value: &Value) -> SdkResult<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| SdkError::UnexpectedRow(format!("expected an integer, got {value}")))
}

fn first_column(row: &Row) -> SdkResult<&Value> {
    row.first()
        .ok_or_else(|| SdkError::UnexpectedRow("empty row".into()))
}

/// Queries over the per-commit table.
pub struct CommitTimeline<'a, S: AnalyticsStore + ?Sized> {
    store: &'a S,
    table: String,
}

impl<'a, S: AnalyticsStore + ?Sized> CommitTimeline<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_table(store, COMMITS_TABLE)
    }

    pub fn with_table(store: &'a S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub fn count_query(&self, range: &TimeRange) -> String {
        format!("SELECT count(*) FROM {} WHERE {range}", self.table)
    }

    pub fn keys_query(&self, range: &TimeRange) -> String {
        format!(
            "SELECT {} FROM {} WHERE {range}",
            hex_column("sha1"),
            self.table
        )
    }

    /// Number of commits in the range.
    pub fn commit_count(&self, range: &TimeRange) -> SdkResult<u64> {
        let sql = self.count_query(range);
        debug!(%sql, "commit count");
        let rows = self.store.query(&sql)?;
        let row = rows
            .first()
            .ok_or_else(|| SdkError::UnexpectedRow("count returned no rows".into()))?;
        let count = parse_int(first_column(row)?)?;
        u64::try_from(count)
            .map_err(|_| SdkError::UnexpectedRow(format!("negative count {count}")))
    }

    /// Keys of the commits in the range.
    pub fn commit_keys(&self, range: &TimeRange) -> SdkResult<Vec<ObjectKey>> {
        let sql = self.keys_query(range);
        debug!(%sql, "commit keys");
        self.store
            .query(&sql)?
            .iter()
            .map(|row| parse_key(first_column(row)?))
            .collect()
    }
}

/// A dated commit of a project or author timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub time: i64,
    pub key: ObjectKey,
}

/// Queries over the per-project table and the commits of one project or
/// author.
pub struct ProjectTimeline<'a, S: AnalyticsStore + ?Sized> {
    store: &'a S,
    projects_table: String,
    commits_table: String,
}

impl<'a, S: AnalyticsStore + ?Sized> ProjectTimeline<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_tables(store, PROJECTS_TABLE, COMMITS_TABLE)
    }

    pub fn with_tables(
        store: &'a S,
        projects_table: impl Into<String>,
        commits_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            projects_table: projects_table.into(),
            commits_table: commits_table.into(),
        }
    }

    pub fn values_query(&self, columns: &[&str], range: &TimeRange) -> String {
        let columns = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };
        format!("SELECT {columns} FROM {} WHERE {range}", self.projects_table)
    }

    /// Raw column values of the project table in the range.
    pub fn values(&self, columns: &[&str], range: &TimeRange) -> SdkResult<Vec<Row>> {
        let sql = self.values_query(columns, range);
        debug!(%sql, "project values");
        self.store.query(&sql)
    }

    fn timeline_query(&self, column: &str, value: &str, range: &TimeRange) -> String {
        format!(
            "SELECT time, {} FROM {} WHERE {column}={} AND {range} ORDER BY time",
            hex_column("sha1"),
            self.commits_table,
            quote(value)
        )
    }

    pub fn project_query(&self, project: &str, range: &TimeRange) -> String {
        self.timeline_query("project", project, range)
    }

    pub fn author_query(&self, author: &str, range: &TimeRange) -> String {
        self.timeline_query("author", author, range)
    }

    fn timeline(&self, sql: String) -> SdkResult<Vec<TimelineEntry>> {
        debug!(%sql, "timeline");
        self.store
            .query(&sql)?
            .iter()
            .map(|row| match row.as_slice() {
                [time, key, ..] => Ok(TimelineEntry {
                    time: parse_int(time)?,
                    key: parse_key(key)?,
                }),
                _ => Err(SdkError::UnexpectedRow(format!(
                    "expected (time, key), got {} columns",
                    row.len()
                ))),
            })
            .collect()
    }

    /// Commits of a project in the range, oldest first.
    pub fn project_timeline(&self, project: &str, range: &TimeRange) -> SdkResult<Vec<TimelineEntry>> {
        self.timeline(self.project_query(project, range))
    }

    /// Commits of an author in the range, oldest first.
    pub fn author_timeline(&self, author: &str, range: &TimeRange) -> SdkResult<Vec<TimelineEntry>> {
        self.timeline(self.author_query(author, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Records queries and replays canned rows.
    struct Canned {
        rows: Vec<Row>,
        seen: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                seen: RefCell::new(Vec::new()),
            }
        }

        fn last(&self) -> String {
            self.seen.borrow().last().cloned().unwrap_or_default()
        }
    }

    impl AnalyticsStore for Canned {
        fn query(&self, sql: &str) -> SdkResult<Vec<Row>> {
            self.seen.borrow_mut().push(sql.to_string());
            Ok(self.rows.clone())
        }
    }

    const KEY: &str = "f2a7fcdc51450ab03cb364415f14e634fa69b62c";

    #[test]
    fn range_clauses() {
        assert_eq!(
            TimeRange::between(1500000000_i64, 1600000000_i64).unwrap().where_clause(),
            "time>=1500000000 AND time<=1600000000"
        );
        assert_eq!(TimeRange::at(1500000000_i64).where_clause(), "time=1500000000");
        assert_eq!(
            TimeRange::between("2020-01-01", "2020-12-31").unwrap().where_clause(),
            "date>=toDate('2020-01-01') AND date<=toDate('2020-12-31')"
        );
        assert_eq!(TimeRange::at("2020-01-01").to_string(), "date=toDate('2020-01-01')");
    }

    #[test]
    fn mixed_or_reversed_ranges_are_rejected() {
        assert!(matches!(
            TimeRange::between(1500000000_i64, "2020-01-01"),
            Err(SdkError::InvalidTimeRange(_))
        ));
        assert!(matches!(
            TimeRange::new("2020-01-01", Some(TimeBound::Timestamp(1))),
            Err(SdkError::InvalidTimeRange(_))
        ));
        assert!(matches!(
            TimeRange::between(2_i64, 1_i64),
            Err(SdkError::InvalidTimeRange(_))
        ));
    }

    #[test]
    fn bounds_deserialize_by_shape() {
        let bounds: Vec<TimeBound> = serde_json::from_str(r#"[1500000000, "2020-01-01"]"#).unwrap();
        assert_eq!(
            bounds,
            [TimeBound::Timestamp(1500000000), TimeBound::Date("2020-01-01".into())]
        );
    }

    #[test]
    fn commit_count_and_keys() {
        let range = TimeRange::between(0_i64, 10_i64).unwrap();
        let counts = Canned::new(vec![vec![json!("42")]]);
        assert_eq!(CommitTimeline::new(&counts).commit_count(&range).unwrap(), 42);
        assert_eq!(counts.last(), "SELECT count(*) FROM commits WHERE time>=0 AND time<=10");

        let keys = Canned::new(vec![vec![json!(KEY)]]);
        let timeline = CommitTimeline::with_table(&keys, "commits_v2");
        assert_eq!(timeline.commit_keys(&range).unwrap()[0].to_hex(), KEY);
        assert_eq!(
            keys.last(),
            "SELECT lower(hex(sha1)) FROM commits_v2 WHERE time>=0 AND time<=10"
        );
    }

    #[test]
    fn bad_rows_are_reported() {
        let range = TimeRange::at(5_i64);
        let empty = Canned::new(Vec::new());
        assert!(matches!(
            CommitTimeline::new(&empty).commit_count(&range),
            Err(SdkError::UnexpectedRow(_))
        ));
        let garbage = Canned::new(vec![vec![json!(17)]]);
        assert!(CommitTimeline::new(&garbage).commit_keys(&range).is_err());
    }

    #[test]
    fn project_and_author_timelines() {
        let store = Canned::new(vec![vec![json!(1500000000), json!(KEY)]]);
        let timeline = ProjectTimeline::new(&store);
        let range = TimeRange::between("2017-01-01", "2017-12-31").unwrap();

        let entries = timeline.project_timeline("user2589_minicms", &range).unwrap();
        assert_eq!(entries[0].time, 1500000000);
        assert_eq!(entries[0].key.to_hex(), KEY);
        assert_eq!(
            store.last(),
            "SELECT time, lower(hex(sha1)) FROM commits WHERE project='user2589_minicms' \
             AND date>=toDate('2017-01-01') AND date<=toDate('2017-12-31') ORDER BY time"
        );

        timeline.author_timeline("Pat O'Brien <pat@x>", &range).unwrap();
        assert!(store.last().contains("author='Pat O\\'Brien <pat@x>'"));

        let rows = timeline.values(&["project", "commits"], &TimeRange::at(7_i64)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.last(), "SELECT project, commits FROM projects WHERE time=7");
        assert_eq!(
            timeline.values_query(&[], &TimeRange::at(7_i64)),
            "SELECT * FROM projects WHERE time=7"
        );
    }
}
