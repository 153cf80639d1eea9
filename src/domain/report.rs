use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    listing::{FieldValue, Listable},
};

/// An ISO 8601 week: `year` is the ISO week-numbering year, which differs
/// from the calendar year around New Year (2024-12-30 is 2025-W01).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportWeek {
    pub year: i32,
    pub week: u32,
}

impl ReportWeek {
    pub fn new(year: i32, week: u32) -> Result<Self> {
        if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
            return Err(AppError::Validation(format!(
                "{}-W{:02} is not a valid ISO week",
                year, week
            )));
        }
        Ok(Self { year, week })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday of the week; `None` for a pair that is not a real ISO week.
    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }
}

impl Ord for ReportWeek {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.monday(), other.monday()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => (self.year, self.week).cmp(&(other.year, other.week)),
        }
    }
}

impl PartialOrd for ReportWeek {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ReportWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatheringType {
    Physical,
    Online,
    Hybrid,
}

impl GatheringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatheringType::Physical => "PHYSICAL",
            GatheringType::Online => "ONLINE",
            GatheringType::Hybrid => "HYBRID",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PHYSICAL" => Some(GatheringType::Physical),
            "ONLINE" => Some(GatheringType::Online),
            "HYBRID" => Some(GatheringType::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterWeeklyReport {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub year: i32,
    pub week_number: u32,
    pub meeting_date: Option<NaiveDate>,
    pub gathering_type: GatheringType,
    pub members_attended: Vec<Uuid>,
    pub visitors_attended: Vec<Uuid>,
    pub activities: Option<String>,
    pub prayer_requests: Option<String>,
    pub testimonies: Option<String>,
    pub highlights: Option<String>,
    pub lowlights: Option<String>,
    pub offering_cents: i64,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClusterWeeklyReport {
    pub fn week(&self) -> ReportWeek {
        ReportWeek {
            year: self.year,
            week: self.week_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub cluster_id: Uuid,
    /// Derived from `meeting_date` when absent.
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 53))]
    pub week_number: Option<u32>,
    pub meeting_date: Option<NaiveDate>,
    pub gathering_type: GatheringType,
    #[serde(default)]
    pub members_attended: Vec<Uuid>,
    #[serde(default)]
    pub visitors_attended: Vec<Uuid>,
    pub activities: Option<String>,
    pub prayer_requests: Option<String>,
    pub testimonies: Option<String>,
    pub highlights: Option<String>,
    pub lowlights: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offering_cents: i64,
}

impl CreateReportRequest {
    /// Resolve the ISO week from the explicit pair or the meeting date. When
    /// both are given they must agree.
    pub fn resolve_week(&self) -> Result<ReportWeek> {
        let from_date = self.meeting_date.map(ReportWeek::containing);
        match (self.year, self.week_number, from_date) {
            (Some(year), Some(week), date_week) => {
                let week = ReportWeek::new(year, week)?;
                if let Some(date_week) = date_week {
                    if date_week != week {
                        return Err(AppError::Validation(format!(
                            "Meeting date falls in {}, not {}",
                            date_week, week
                        )));
                    }
                }
                Ok(week)
            }
            (None, None, Some(date_week)) => Ok(date_week),
            _ => Err(AppError::Validation(
                "Either year and week_number or meeting_date is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateReportRequest {
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<Option<NaiveDate>>,
    pub gathering_type: Option<GatheringType>,
    pub members_attended: Option<Vec<Uuid>>,
    pub visitors_attended: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub activities: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub prayer_requests: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub testimonies: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable", skip_serializing_if = "Option::is_none")]
    pub lowlights: Option<Option<String>>,
    #[validate(range(min = 0))]
    pub offering_cents: Option<i64>,
}

/// Who came before, used to pre-select attendance on a new report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttendanceHistory {
    pub previously_attended_members: Vec<Uuid>,
    pub previously_attended_visitors: Vec<Uuid>,
    pub most_recent_week: Option<ReportWeek>,
    pub most_recent_members: Vec<Uuid>,
    pub most_recent_visitors: Vec<Uuid>,
}

impl AttendanceHistory {
    /// Scan a cluster's reports. With `before`, only weeks strictly earlier
    /// count. The most recent report is chosen by ISO week chronology.
    pub fn from_reports(reports: &[ClusterWeeklyReport], before: Option<ReportWeek>) -> Self {
        let relevant: Vec<&ClusterWeeklyReport> = reports
            .iter()
            .filter(|r| before.map_or(true, |limit| r.week() < limit))
            .collect();

        let members: BTreeSet<Uuid> = relevant
            .iter()
            .flat_map(|r| r.members_attended.iter().copied())
            .collect();
        let visitors: BTreeSet<Uuid> = relevant
            .iter()
            .flat_map(|r| r.visitors_attended.iter().copied())
            .collect();

        let latest = relevant.iter().max_by_key(|r| r.week());

        Self {
            previously_attended_members: members.into_iter().collect(),
            previously_attended_visitors: visitors.into_iter().collect(),
            most_recent_week: latest.map(|r| r.week()),
            most_recent_members: latest.map(|r| r.members_attended.clone()).unwrap_or_default(),
            most_recent_visitors: latest.map(|r| r.visitors_attended.clone()).unwrap_or_default(),
        }
    }
}

impl Listable for ClusterWeeklyReport {
    const FIELDS: &'static [&'static str] = &[
        "cluster_id",
        "year",
        "week_number",
        "week_start",
        "meeting_date",
        "gathering_type",
        "member_attendance",
        "visitor_attendance",
        "total_attendance",
        "offering",
        "activities",
        "highlights",
        "lowlights",
        "prayer_requests",
        "testimonies",
        "submitted_by",
        "created_at",
        "updated_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["activities", "highlights", "lowlights", "prayer_requests", "testimonies"];
    const DEFAULT_SORT: &'static str = "week_start";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "cluster_id" => FieldValue::text(self.cluster_id.to_string()),
            "year" => FieldValue::Number(f64::from(self.year)),
            "week_number" => FieldValue::Number(f64::from(self.week_number)),
            "week_start" => FieldValue::opt_date(self.week().monday()),
            "meeting_date" => FieldValue::opt_date(self.meeting_date),
            "gathering_type" => FieldValue::text(self.gathering_type.as_str()),
            "member_attendance" => FieldValue::Number(self.members_attended.len() as f64),
            "visitor_attendance" => FieldValue::Number(self.visitors_attended.len() as f64),
            "total_attendance" => FieldValue::Number(
                (self.members_attended.len() + self.visitors_attended.len()) as f64,
            ),
            "offering" => FieldValue::Number(self.offering_cents as f64 / 100.0),
            "activities" => FieldValue::opt_text(self.activities.as_deref()),
            "highlights" => FieldValue::opt_text(self.highlights.as_deref()),
            "lowlights" => FieldValue::opt_text(self.lowlights.as_deref()),
            "prayer_requests" => FieldValue::opt_text(self.prayer_requests.as_deref()),
            "testimonies" => FieldValue::opt_text(self.testimonies.as_deref()),
            "submitted_by" => FieldValue::opt_uuid(self.submitted_by),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(year: i32, week: u32, members: Vec<Uuid>, visitors: Vec<Uuid>) -> ClusterWeeklyReport {
        ClusterWeeklyReport {
            id: Uuid::new_v4(),
            cluster_id: Uuid::nil(),
            year,
            week_number: week,
            meeting_date: None,
            gathering_type: GatheringType::Physical,
            members_attended: members,
            visitors_attended: visitors,
            activities: None,
            prayer_requests: None,
            testimonies: None,
            highlights: None,
            lowlights: None,
            offering_cents: 0,
            submitted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_week_ordering_crosses_year_boundary() {
        let late = ReportWeek::new(2024, 52).unwrap();
        let early = ReportWeek::new(2025, 1).unwrap();
        assert!(early > late);

        let w53 = ReportWeek::new(2020, 53).unwrap();
        let next = ReportWeek::new(2021, 1).unwrap();
        assert!(next > w53);
    }

    #[test]
    fn test_containing_uses_iso_year() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        assert_eq!(ReportWeek::containing(date), ReportWeek { year: 2025, week: 1 });
        let date = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
        assert_eq!(ReportWeek::containing(date), ReportWeek { year: 2020, week: 53 });
    }

    #[test]
    fn test_invalid_week_rejected() {
        assert!(ReportWeek::new(2024, 53).is_err());
        assert!(ReportWeek::new(2024, 0).is_err());
        assert!(ReportWeek::new(2020, 53).is_ok());
    }

    #[test]
    fn test_most_recent_spans_new_year() {
        let (a, b, c, v) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let reports = vec![
            report(2025, 1, vec![c], vec![]),
            report(2024, 52, vec![a, b], vec![v]),
            report(2024, 10, vec![a], vec![]),
        ];

        let history = AttendanceHistory::from_reports(&reports, None);
        assert_eq!(history.most_recent_week, Some(ReportWeek { year: 2025, week: 1 }));
        assert_eq!(history.most_recent_members, vec![c]);
        assert!(history.most_recent_visitors.is_empty());
        assert_eq!(history.previously_attended_members.len(), 3);
        assert_eq!(history.previously_attended_visitors, vec![v]);

        let before = AttendanceHistory::from_reports(&reports, Some(ReportWeek { year: 2025, week: 1 }));
        assert_eq!(before.most_recent_week, Some(ReportWeek { year: 2024, week: 52 }));
        let mut recent = before.most_recent_members.clone();
        recent.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(recent, expected);
    }

    #[test]
    fn test_empty_history() {
        let history = AttendanceHistory::from_reports(&[], None);
        assert_eq!(history, AttendanceHistory::default());
    }

    #[test]
    fn test_resolve_week_checks_meeting_date() {
        let mut request = CreateReportRequest {
            cluster_id: Uuid::nil(),
            year: Some(2024),
            week_number: Some(1),
            meeting_date: NaiveDate::from_ymd_opt(2024, 12, 30),
            gathering_type: GatheringType::Online,
            members_attended: vec![],
            visitors_attended: vec![],
            activities: None,
            prayer_requests: None,
            testimonies: None,
            highlights: None,
            lowlights: None,
            offering_cents: 0,
        };
        assert!(request.resolve_week().is_err());

        request.year = None;
        request.week_number = None;
        assert_eq!(request.resolve_week().unwrap(), ReportWeek { year: 2025, week: 1 });
    }
}
