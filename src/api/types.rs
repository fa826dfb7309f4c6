//! Wire types for the package workflow endpoints.
//!
//! Field names follow the backend's JSON (camelCase, Vietnamese domain terms);
//! Rust-side names are English.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Every backend response is wrapped in `{ success, message?, data? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Acknowledgement of a mutating call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub message: Option<String>,
}

/// A reference to another backend document, either as a bare id or populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(String),
    Populated(PopulatedReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatedReference {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, alias = "hoTen", alias = "tenGoiTap", alias = "tenChiNhanh")]
    pub name: Option<String>,
}

impl Reference {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(populated) => &populated.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Reference::Id(_) => None,
            Reference::Populated(populated) => populated.name.as_deref(),
        }
    }
}

/// `trangThaiDangKy` as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegistrationStatus {
    /// CHO_XU_LY: paid, activation steps outstanding
    #[default]
    Pending,
    /// DA_TAO_LICH: schedule created, completion outstanding
    ScheduleCreated,
    /// HOAN_THANH
    Completed,
    /// DA_HUY
    Cancelled,
    Other(String),
}

impl RegistrationStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RegistrationStatus::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistrationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RegistrationStatus::Pending => "CHO_XU_LY",
            RegistrationStatus::ScheduleCreated => "DA_TAO_LICH",
            RegistrationStatus::Completed => "HOAN_THANH",
            RegistrationStatus::Cancelled => "DA_HUY",
            RegistrationStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for RegistrationStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "CHO_XU_LY" => RegistrationStatus::Pending,
            "DA_TAO_LICH" => RegistrationStatus::ScheduleCreated,
            "HOAN_THANH" => RegistrationStatus::Completed,
            "DA_HUY" => RegistrationStatus::Cancelled,
            _ => RegistrationStatus::Other(raw),
        }
    }
}

impl From<RegistrationStatus> for String {
    fn from(status: RegistrationStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A member's package purchase as returned inside the workflow status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, rename = "goiTapId")]
    pub package: Option<Reference>,
    #[serde(default, rename = "branchId")]
    pub branch: Option<Reference>,
    #[serde(default, rename = "trangThaiThanhToan")]
    pub payment_status: Option<String>,
    #[serde(default, rename = "trangThaiDangKy")]
    pub status: RegistrationStatus,
}

/// Step descriptor listed by the backend for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStepInfo {
    #[serde(default, alias = "name", alias = "key")]
    pub step: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// `data` of `GET workflow-status/{registrationId}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatusData {
    pub registration: Registration,
    pub is_owner: bool,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub workflow_steps: Vec<WorkflowStepInfo>,
}

/// Training preferences sent with trainer discovery and selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerPreferences {
    /// Preferred time windows, e.g. `"06:00-08:00"`.
    #[serde(rename = "gioTapUuTien")]
    pub preferred_hours: Vec<String>,
    #[serde(rename = "soNgayTapTrongTuan")]
    pub days_per_week: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trainer {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, rename = "hoTen")]
    pub name: String,
    #[serde(default, rename = "chuyenMon")]
    pub specialty: Option<String>,
    #[serde(default, rename = "danhGia")]
    pub rating: Option<f32>,
    #[serde(default, rename = "anhDaiDien")]
    pub avatar: Option<String>,
}

/// An open training slot offered for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSession {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "ngayTap")]
    pub date: String,
    #[serde(rename = "gioBatDau")]
    pub start: String,
    #[serde(rename = "gioKetThuc")]
    pub end: String,
    #[serde(rename = "ptPhuTrach")]
    pub trainer: Reference,
    #[serde(default, rename = "soLuongToiDa")]
    pub capacity: u32,
    #[serde(default, rename = "soLuongHienTai")]
    pub occupancy: u32,
    #[serde(default, rename = "tenBuoiTap")]
    pub title: Option<String>,
}

impl TrainingSession {
    /// Calendar date of the session. Timestamps are cut to their date part.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        let day = self.date.get(..10).unwrap_or(&self.date);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        parse_clock(&self.start)
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        parse_clock(&self.end)
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

pub(crate) fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekInfo {
    #[serde(default, rename = "startDate", alias = "ngayBatDau")]
    pub start_date: Option<String>,
    #[serde(default, rename = "endDate", alias = "ngayKetThuc")]
    pub end_date: Option<String>,
    #[serde(default, rename = "weekNumber")]
    pub week_number: Option<u32>,
}

/// `data` of `GET available-sessions/{registrationId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AvailableSessions {
    #[serde(default)]
    pub sessions: Vec<TrainingSession>,
    #[serde(default, rename = "weekInfo")]
    pub week_info: Option<WeekInfo>,
}

/// One entry of `danhSachBuoiTap`, copied verbatim from a selected session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "buoiTapId")]
    pub session_id: String,
    #[serde(rename = "ngayTap")]
    pub date: String,
    #[serde(rename = "gioBatDau")]
    pub start: String,
    #[serde(rename = "gioKetThuc")]
    pub end: String,
    #[serde(rename = "ptPhuTrach")]
    pub trainer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateScheduleRequest {
    #[serde(rename = "selectedSessions")]
    pub selected_sessions: Vec<String>,
    #[serde(rename = "danhSachBuoiTap")]
    pub entries: Vec<ScheduleEntry>,
}

impl From<Vec<ScheduleEntry>> for GenerateScheduleRequest {
    fn from(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            selected_sessions: entries.iter().map(|e| e.session_id.clone()).collect(),
            entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BranchUpdate<'a> {
    #[serde(rename = "branchId")]
    pub branch_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TrainerSelection<'a> {
    #[serde(rename = "ptId")]
    pub trainer_id: &'a str,
    #[serde(flatten)]
    pub preferences: &'a TrainerPreferences,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_data_accepts_populated_references() {
        let data: WorkflowStatusData = serde_json::from_value(json!({
            "registration": {
                "_id": "reg-1",
                "goiTapId": { "_id": "pkg-9", "tenGoiTap": "Couple 3 months" },
                "branchId": "branch-A",
                "trangThaiThanhToan": "DA_THANH_TOAN",
                "trangThaiDangKy": "CHO_XU_LY"
            },
            "isOwner": true,
            "currentStep": "selectTrainer",
            "workflowSteps": [{ "name": "selectBranch", "completed": true }]
        }))
        .unwrap();

        assert!(data.is_owner);
        assert_eq!(data.registration.status, RegistrationStatus::Pending);
        assert_eq!(data.registration.package.as_ref().unwrap().id(), "pkg-9");
        assert_eq!(data.registration.package.as_ref().unwrap().name(), Some("Couple 3 months"));
        assert_eq!(data.registration.branch.as_ref().unwrap().id(), "branch-A");
        assert_eq!(data.workflow_steps[0].step.as_deref(), Some("selectBranch"));
        assert!(data.workflow_steps[0].completed);
    }

    #[test]
    fn test_unknown_registration_status_is_preserved() {
        let status: RegistrationStatus = serde_json::from_value(json!("DANG_TAP")).unwrap();
        assert_eq!(status, RegistrationStatus::Other("DANG_TAP".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("DANG_TAP"));
        assert!(!status.is_completed());
    }

    #[test]
    fn test_session_date_and_time_parsing() {
        let session: TrainingSession = serde_json::from_value(json!({
            "_id": "s1",
            "ngayTap": "2024-06-10T00:00:00.000Z",
            "gioBatDau": "08:00",
            "gioKetThuc": "10:00:00",
            "ptPhuTrach": { "_id": "pt-7", "hoTen": "Minh" },
            "soLuongToiDa": 2,
            "soLuongHienTai": 1
        }))
        .unwrap();

        assert_eq!(session.calendar_date(), NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(session.start_time(), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(session.end_time(), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(session.trainer.id(), "pt-7");
        assert_eq!(session.remaining_capacity(), 1);
    }

    #[test]
    fn test_trainer_selection_body_shape() {
        let preferences = TrainerPreferences {
            preferred_hours: vec!["06:00-08:00".to_string()],
            days_per_week: 3,
        };
        let body = serde_json::to_value(TrainerSelection {
            trainer_id: "pt-7",
            preferences: &preferences,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({ "ptId": "pt-7", "gioTapUuTien": ["06:00-08:00"], "soNgayTapTrongTuan": 3 })
        );
    }

    #[test]
    fn test_generate_schedule_request_lists_session_ids() {
        let request = GenerateScheduleRequest::from(vec![ScheduleEntry {
            session_id: "s1".to_string(),
            date: "2024-06-10".to_string(),
            start: "08:00".to_string(),
            end: "10:00".to_string(),
            trainer_id: "pt-7".to_string(),
        }]);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["selectedSessions"], json!(["s1"]));
        assert_eq!(body["danhSachBuoiTap"][0]["buoiTapId"], json!("s1"));
        assert_eq!(body["danhSachBuoiTap"][0]["ptPhuTrach"], json!("pt-7"));
    }
}
