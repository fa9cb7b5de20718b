use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error(
    "Invalid status '{0}'. Accepted values: 'present', 'absent_w_warn', 'absent_wo_warn', 'on_vacation'"
)]
pub struct StatusParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "absent_w_warn")]
    AbsentWithWarning,
    #[serde(rename = "absent_wo_warn")]
    AbsentWithoutWarning,
    #[serde(rename = "on_vacation")]
    OnVacation,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::AbsentWithWarning,
        AttendanceStatus::AbsentWithoutWarning,
        AttendanceStatus::OnVacation,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::AbsentWithWarning => "absent_w_warn",
            AttendanceStatus::AbsentWithoutWarning => "absent_wo_warn",
            AttendanceStatus::OnVacation => "on_vacation",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttendanceStatus::ALL
            .into_iter()
            .find(|status| status.slug() == s)
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::AbsentWithWarning => write!(f, "Absent (with notice)"),
            AttendanceStatus::AbsentWithoutWarning => write!(f, "Absent (without notice)"),
            AttendanceStatus::OnVacation => write!(f, "On leave"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub legislature: String,
    pub chamber: String,
    pub session: u32,
    pub session_date: NaiveDate,
    pub session_diary: Option<String>,
    pub attendee: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Display for AttendanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] #{} {} - {}: {}",
            self.legislature,
            self.chamber,
            self.session,
            self.session_date,
            self.attendee,
            self.status
        )?;
        for note in &self.notes {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

/// A person matched by one of the status sentences of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub attendee: String,
    pub status: AttendanceStatus,
    pub notes: Vec<String>,
}

/// Identifies which legislature and chamber a result page belongs to.
/// Both values come from the hidden fields of the submitted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceQuery {
    pub legislature: String,
    pub chamber: String,
}

/// A POST request to the attendance query form, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRequest {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

impl FormRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn query(&self) -> Option<AttendanceQuery> {
        Some(AttendanceQuery {
            legislature: self.field("Legislatura")?.to_string(),
            chamber: self.field("Cuerpo")?.to_string(),
        })
    }

    pub fn encoded_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.fields)
            .finish()
    }
}

impl Display for FormRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "POST {}", self.url)?;
        if let (Some(from), Some(to)) = (self.field("fecDesde"), self.field("fecHasta")) {
            write!(f, " [{} - {}]", from, to)?;
        }
        Ok(())
    }
}

/// One session as laid out on a result page, before any text matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBlock {
    pub session: u32,
    pub session_date: NaiveDate,
    pub session_diary: Option<String>,
    pub lines: Vec<String>,
}
