use crate::types::{AttendanceRecord, AttendanceStatus};

use chrono::{Datelike, NaiveDate};

/// The configured crawl window. Either bound may be left open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateWindow {
    pub fn validate(self) -> Result<Self, String> {
        if let Some(start) = self.start_date
            && let Some(end) = self.end_date
            && start > end
        {
            return Err(format!(
                "Start date ({start}) cannot be after end date ({end})"
            ));
        }
        Ok(self)
    }

    /// Intersects the range a page offers with this window.
    /// Returns `None` when they do not overlap.
    pub fn clamp(&self, min: NaiveDate, max: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.start_date.map_or(min, |start| min.max(start));
        let max = self.end_date.map_or(max, |end| max.min(end));
        (min <= max).then_some((min, max))
    }
}

/// Splits an inclusive range into per calendar year ranges.
pub fn yearly_ranges(min: NaiveDate, max: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    (min.year()..=max.year())
        .filter_map(|year| {
            let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
            let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
            Some((min.max(first), max.min(last)))
        })
        .filter(|(from, to)| from <= to)
        .collect()
}

#[derive(Debug, Default)]
pub struct AttendanceStats {
    pub present: usize,
    pub absent_with_warning: usize,
    pub absent_without_warning: usize,
    pub on_vacation: usize,
    pub sessions: usize,
    pub total: usize,
}

impl AttendanceStats {
    pub fn from_records(records: &[AttendanceRecord]) -> AttendanceStats {
        let count = |status: AttendanceStatus| records.iter().filter(|r| r.status == status).count();

        let mut sessions: Vec<_> = records
            .iter()
            .map(|r| (&r.legislature, &r.chamber, r.session))
            .collect();
        sessions.sort();
        sessions.dedup();

        AttendanceStats {
            present: count(AttendanceStatus::Present),
            absent_with_warning: count(AttendanceStatus::AbsentWithWarning),
            absent_without_warning: count(AttendanceStatus::AbsentWithoutWarning),
            on_vacation: count(AttendanceStatus::OnVacation),
            sessions: sessions.len(),
            total: records.len(),
        }
    }
}

impl std::fmt::Display for AttendanceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Sessions:                {}", self.sessions)?;
        writeln!(f, "  Present:                 {}", self.present)?;
        writeln!(f, "  Absent (with notice):    {}", self.absent_with_warning)?;
        writeln!(f, "  Absent (without notice): {}", self.absent_without_warning)?;
        writeln!(f, "  On leave:                {}", self.on_vacation)?;
        writeln!(f, "  Total records:           {}", self.total)
    }
}
