//! Types for the task and worker stores.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Department a task requires or a worker belongs to.
///
/// Tasks only ever derive `cleaning` or `spill` from the detected class; the
/// worker directory carries the full staffing roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Cleaning,
    Spill,
    Water,
    Maintenance,
    Other,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Spill => "spill",
            Self::Water => "water",
            Self::Maintenance => "maintenance",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cleaning" => Some(Self::Cleaning),
            "spill" => Some(Self::Spill),
            "water" => Some(Self::Water),
            "maintenance" => Some(Self::Maintenance),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work shift of a field worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Morning,
    Evening,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "evening" => Some(Self::Evening),
            "night" => Some(Self::Night),
            _ => None,
        }
    }

    /// Shift window covering the given hour of day (0-23).
    ///
    /// Morning covers 06:00-14:00, evening 14:00-22:00, night the rest.
    pub fn of_hour(hour: u32) -> Self {
        match hour {
            6..=13 => Self::Morning,
            14..=21 => Self::Evening,
            _ => Self::Night,
        }
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity / priority level of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    High,
    Medium,
    Low,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "High" => Some(Self::High),
            "Medium" => Some(Self::Medium),
            "Low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Numeric rank used both for priority comparison and scheduling weight
    /// (High=3, Medium=2, Low=1).
    pub fn weight(&self) -> u32 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// The higher-ranked of two levels.
    pub fn max(self, other: Self) -> Self {
        if self.weight() >= other.weight() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Incomplete,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "Incomplete",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Incomplete" => Some(Self::Incomplete),
            "In Progress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! impl_sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Self::parse(text).ok_or_else(|| {
                    FromSqlError::Other(
                        format!(
                            "invalid {} value: {text:?}",
                            std::any::type_name::<$ty>()
                        )
                        .into(),
                    )
                })
            }
        }
    };
}

impl_sql_text_enum!(Department);
impl_sql_text_enum!(Shift);
impl_sql_text_enum!(Level);
impl_sql_text_enum!(TaskStatus);

/// A GPS coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Camera-relative geometry of a detection, kept for the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetails {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub coverage_percentage: f64,
}

/// A persisted waste-detection task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    /// Monotonic insert order, used as the watcher's change cursor.
    pub seq: i64,
    pub detected_class: String,
    pub department: Department,
    pub severity: Level,
    pub priority: Level,
    /// Positional descriptor, e.g. `CAM1-320-240`.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    pub description: String,
    /// Detection bounding-box area in pixels.
    pub size: f64,
    pub location_details: LocationDetails,
    pub confidence_score: f64,
    pub status: TaskStatus,
    pub assigned: bool,
    pub assigned_worker: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub detected_class: String,
    pub department: Department,
    pub severity: Level,
    pub priority: Level,
    pub location: String,
    pub position: Option<GeoPoint>,
    pub description: String,
    pub size: f64,
    pub location_details: LocationDetails,
    pub confidence_score: f64,
}

/// A field worker profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub department: Department,
    pub shift: Shift,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    pub available: bool,
    pub emergency_responder: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to register a new worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorker {
    pub name: String,
    pub department: Department,
    pub shift: Shift,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub position: Option<GeoPoint>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub emergency_responder: bool,
}

fn default_true() -> bool {
    true
}

/// A consistent point-in-time view of the assignable world: all Incomplete
/// tasks plus every available worker not already holding an active task.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub workers: Vec<Worker>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for level in [Level::High, Level::Medium, Level::Low] {
            assert_eq!(Level::parse(level.as_str()), Some(level));
        }
        assert_eq!(Level::parse("urgent"), None);
    }

    #[test]
    fn test_level_max_prefers_higher_rank() {
        assert_eq!(Level::Low.max(Level::High), Level::High);
        assert_eq!(Level::High.max(Level::Low), Level::High);
        assert_eq!(Level::Medium.max(Level::Medium), Level::Medium);
    }

    #[test]
    fn test_shift_of_hour_windows() {
        assert_eq!(Shift::of_hour(6), Shift::Morning);
        assert_eq!(Shift::of_hour(13), Shift::Morning);
        assert_eq!(Shift::of_hour(14), Shift::Evening);
        assert_eq!(Shift::of_hour(21), Shift::Evening);
        assert_eq!(Shift::of_hour(22), Shift::Night);
        assert_eq!(Shift::of_hour(3), Shift::Night);
    }

    #[test]
    fn test_task_status_wire_names() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"Incomplete\"").unwrap();
        assert_eq!(parsed, TaskStatus::Incomplete);
    }
}
