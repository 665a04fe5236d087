//! Wire format of the PetLog backend
//!
//! Every response is wrapped in an [`Envelope`]. Local timestamps travel as
//! `yyyy-MM-ddTHH:mm`; RFC 3339 strings are accepted too.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use petlog_util::{GroupId, LogId, UserId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

use crate::{
    ActivityKind, ActivityLogRecord, ActivitySchedule, ApiError, ApiResult, CurrentUser,
    EliminationLog, Gender, HomeData, NewGroup, Profile, ProfileUpdate,
};

/// Format the backend uses for local timestamps
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse a backend timestamp.
pub fn parse_wire_time(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    [WIRE_TIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

pub fn format_wire_time(dt: &DateTime<Local>) -> String {
    dt.format(WIRE_TIME_FORMAT).to_string()
}

/// Serde adapter for `DateTime<Local>` in the backend's format
pub mod wire_time {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_wire_time(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_wire_time(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("cannot decode date string: {}", raw))
        })
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Local>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_some(&format_wire_time(dt)),
                None => s.serialize_none(),
            }
        }
    }
}

/// Parse weights written as `"1.5kg"`, `"1.5"` or a bare number.
pub fn parse_weight(raw: &WireWeight) -> Option<f64> {
    match raw {
        WireWeight::Number(n) => Some(*n),
        WireWeight::Text(s) => s
            .to_lowercase()
            .replace("kg", "")
            .trim()
            .parse::<f64>()
            .ok(),
    }
}

pub fn format_weight(kg: f64) -> String {
    format!("{}kg", kg)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireWeight {
    Number(f64),
    Text(String),
}

/// Response wrapper used by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Backend endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    KakaoLogin,
    RefreshToken,
    CurrentUser,
    Withdraw,
    CreateGroup,
    JoinGroup,
    PetInfo(GroupId),
    UpdatePet(GroupId),
    InviteCode(GroupId),
    Note(GroupId),
    UpdateNote(GroupId),
    CreateLog(ActivityKind),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Login => "/api/auth/login".into(),
            Endpoint::Register => "/api/auth/register".into(),
            Endpoint::KakaoLogin => "/api/auth/login/kakao".into(),
            Endpoint::RefreshToken => "/api/auth/refresh".into(),
            Endpoint::CurrentUser => "/api/auth/me".into(),
            Endpoint::Withdraw => "/api/auth/withdraw".into(),
            Endpoint::CreateGroup => "/api/groups".into(),
            Endpoint::JoinGroup => "/api/groups/join".into(),
            Endpoint::PetInfo(id) | Endpoint::UpdatePet(id) => format!("/api/groups/{}/pet", id),
            Endpoint::InviteCode(id) => format!("/api/groups/{}/invite", id),
            Endpoint::Note(id) | Endpoint::UpdateNote(id) => format!("/api/groups/{}/note", id),
            Endpoint::CreateLog(kind) => format!("/api/logs/{}", kind.wire_name()),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::RefreshToken
            | Endpoint::CurrentUser
            | Endpoint::PetInfo(_)
            | Endpoint::InviteCode(_)
            | Endpoint::Note(_) => HttpMethod::Get,
            Endpoint::Login
            | Endpoint::Register
            | Endpoint::KakaoLogin
            | Endpoint::CreateGroup
            | Endpoint::JoinGroup
            | Endpoint::CreateLog(_) => HttpMethod::Post,
            Endpoint::UpdatePet(_) | Endpoint::UpdateNote(_) => HttpMethod::Patch,
            Endpoint::Withdraw => HttpMethod::Delete,
        }
    }

    /// Whether the request carries the session's bearer token
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            Endpoint::Login | Endpoint::Register | Endpoint::KakaoLogin
        )
    }
}

// Requests

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub oauth_provider: String,
    pub oauth_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub oauth_provider: String,
    pub oauth_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoLoginRequest {
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    pub join_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub image_url: String,
    pub name: String,
    pub age: String,
    pub weight: String,
    pub gender: String,
    pub feeding_cycle: u32,
    #[serde(with = "wire_time")]
    pub last_feeding_time: DateTime<Local>,
    pub watering_cycle: u32,
    #[serde(with = "wire_time")]
    pub last_watering_time: DateTime<Local>,
    pub notice: Option<String>,
}

impl From<&NewGroup> for CreateGroupRequest {
    fn from(group: &NewGroup) -> Self {
        Self {
            image_url: group.profile.image_url.clone(),
            name: group.profile.name.clone(),
            age: group.profile.age.clone(),
            weight: format_weight(group.profile.weight_kg),
            gender: group.profile.gender.wire_name().to_string(),
            feeding_cycle: group.feeding_cycle_hours,
            last_feeding_time: group.last_feeding_time,
            watering_cycle: group.watering_cycle_hours,
            last_watering_time: group.last_watering_time,
            notice: group.notice.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeding_cycle: Option<u32>,
    #[serde(
        with = "wire_time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_feeding_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watering_cycle: Option<u32>,
    #[serde(
        with = "wire_time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_watering_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl From<&ProfileUpdate> for UpdatePetRequest {
    fn from(update: &ProfileUpdate) -> Self {
        Self {
            image_url: update.image_url.clone(),
            name: update.name.clone(),
            age: update.age.clone(),
            weight: update.weight_kg.map(format_weight),
            gender: update.gender.map(|g| g.wire_name().to_string()),
            feeding_cycle: update.feeding_cycle_hours,
            last_feeding_time: update.last_feeding_time,
            watering_cycle: update.watering_cycle_hours,
            last_watering_time: update.last_watering_time,
            notice: update.notice.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityLogRequest {
    pub checker_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// `null` deletes the note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteBody {
    pub note: Option<String>,
}

// Responses

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairData {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenData {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailData {
    pub user_id: String,
    pub oauth_provider: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub group_id: Option<String>,
}

impl From<UserDetailData> for CurrentUser {
    fn from(d: UserDetailData) -> Self {
        Self {
            user_id: UserId::new(d.user_id),
            oauth_provider: d.oauth_provider,
            nickname: d.nickname,
            email: d.email,
            group_id: d.group_id.filter(|g| !g.is_empty()).map(GroupId::new),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetProfileDto {
    pub image_url: String,
    pub name: String,
    pub age: String,
    pub weight: WireWeight,
    pub gender: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedingDto {
    pub feeding_cycle: u32,
    #[serde(with = "wire_time")]
    pub last_feeding_time: DateTime<Local>,
    pub last_checker_name: String,
    pub last_memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WateringDto {
    pub watering_cycle: u32,
    #[serde(with = "wire_time")]
    pub last_watering_time: DateTime<Local>,
    pub last_checker_name: String,
    pub last_memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoopDto {
    pub today_poop_count: u32,
    pub last_checker_name: String,
    pub last_memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PetInfoDto {
    pub profile: PetProfileDto,
    pub feeding: FeedingDto,
    pub watering: WateringDto,
    pub poop: PoopDto,
}

impl PetInfoDto {
    /// Combine with the group's invite code into the home bundle.
    pub fn into_home(self, invite_code: String) -> ApiResult<HomeData> {
        if self.feeding.feeding_cycle == 0 || self.watering.watering_cycle == 0 {
            return Err(ApiError::malformed("cycle hours must be positive"));
        }

        let gender = Gender::from_wire(&self.profile.gender).unwrap_or_else(|| {
            tracing::warn!(gender = %self.profile.gender, "Unknown gender, defaulting to female");
            Gender::Female
        });
        let weight_kg = parse_weight(&self.profile.weight).unwrap_or_else(|| {
            tracing::warn!(weight = ?self.profile.weight, "Unparseable weight, defaulting to 0");
            0.0
        });

        Ok(HomeData {
            profile: Profile {
                image_url: self.profile.image_url,
                name: self.profile.name,
                age: self.profile.age,
                weight_kg,
                gender,
            },
            feeding: ActivitySchedule {
                cycle_hours: self.feeding.feeding_cycle,
                last_event_time: self.feeding.last_feeding_time,
                last_actor_name: self.feeding.last_checker_name,
                last_note: self.feeding.last_memo.unwrap_or_default(),
            },
            watering: ActivitySchedule {
                cycle_hours: self.watering.watering_cycle,
                last_event_time: self.watering.last_watering_time,
                last_actor_name: self.watering.last_checker_name,
                last_note: self.watering.last_memo.unwrap_or_default(),
            },
            elimination: EliminationLog {
                count_today: self.poop.today_poop_count,
                last_actor_name: self.poop.last_checker_name,
                last_note: self.poop.last_memo.unwrap_or_default(),
            },
            invite_code,
        })
    }
}

/// Invite code payload, `{ "joinCode": "ABC123" }`
pub type InviteCodeData = HashMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogDto {
    pub id: String,
    pub group_id: String,
    pub checker_name: String,
    pub memo: Option<String>,
    pub timestamp: String,
}

impl From<ActivityLogDto> for ActivityLogRecord {
    fn from(d: ActivityLogDto) -> Self {
        Self {
            id: LogId::new(d.id),
            group_id: GroupId::new(d.group_id),
            actor_name: d.checker_name,
            note: d.memo,
            recorded_at: parse_wire_time(&d.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const PET_INFO_JSON: &str = r#"{
        "statusCode": 200,
        "message": "반려동물 정보 조회에 성공했습니다.",
        "data": {
            "profile": { "imageUrl": "https://example.com/p.jpg", "name": "여름", "age": "2개월", "weight": "1.5kg", "gender": "FEMALE" },
            "feeding": { "feedingCycle": 6, "lastFeedingTime": "2025-10-31T03:38", "lastCheckerName": "서은", "lastMemo": "밥 조금만 줘야 함" },
            "watering": { "wateringCycle": 6, "lastWateringTime": "2025-10-06T14:30", "lastCheckerName": "예린", "lastMemo": null },
            "poop": { "todayPoopCount": 2, "lastCheckerName": "동하", "lastMemo": "굿" }
        }
    }"#;

    #[test]
    fn wire_time_accepts_backend_formats() {
        let short = parse_wire_time("2025-10-31T03:38").unwrap();
        assert_eq!((short.hour(), short.minute()), (3, 38));

        assert!(parse_wire_time("2025-10-31T03:38:12").is_some());
        assert!(parse_wire_time("2025-10-31T03:38:12.250Z").is_some());
        assert!(parse_wire_time("2025-10-31T03:38:12+09:00").is_some());
        assert!(parse_wire_time("31/10/2025").is_none());
    }

    #[test]
    fn wire_time_formats_without_seconds() {
        let dt = parse_wire_time("2025-10-31T03:38").unwrap();
        assert_eq!(format_wire_time(&dt), "2025-10-31T03:38");
    }

    #[test]
    fn weights_parse_from_text_or_number() {
        assert_eq!(parse_weight(&WireWeight::Text("1.5kg".into())), Some(1.5));
        assert_eq!(parse_weight(&WireWeight::Text(" 5.5 KG".into())), Some(5.5));
        assert_eq!(parse_weight(&WireWeight::Number(2.0)), Some(2.0));
        assert_eq!(parse_weight(&WireWeight::Text("heavy".into())), None);
        assert_eq!(format_weight(5.5), "5.5kg");
    }

    #[test]
    fn pet_info_envelope_decodes_into_home() {
        let env: Envelope<PetInfoDto> = serde_json::from_str(PET_INFO_JSON).unwrap();
        assert_eq!(env.status_code, 200);

        let home = env.data.into_home("ABC123".into()).unwrap();
        assert_eq!(home.profile.name, "여름");
        assert_eq!(home.profile.weight_kg, 1.5);
        assert_eq!(home.profile.gender, Gender::Female);
        assert_eq!(home.feeding.cycle_hours, 6);
        assert_eq!(home.feeding.last_actor_name, "서은");
        assert_eq!(home.watering.last_note, "");
        assert_eq!(home.elimination.count_today, 2);
        assert_eq!(home.invite_code, "ABC123");
    }

    #[test]
    fn zero_cycle_is_malformed() {
        let json = PET_INFO_JSON.replace("\"feedingCycle\": 6", "\"feedingCycle\": 0");
        let env: Envelope<PetInfoDto> = serde_json::from_str(&json).unwrap();
        let err = env.data.into_home(String::new()).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn endpoints_route_to_backend_paths() {
        let group = GroupId::new("g1");
        assert_eq!(Endpoint::PetInfo(group.clone()).path(), "/api/groups/g1/pet");
        assert_eq!(Endpoint::UpdatePet(group.clone()).method(), HttpMethod::Patch);
        assert_eq!(
            Endpoint::CreateLog(ActivityKind::Elimination).path(),
            "/api/logs/poop"
        );
        assert_eq!(Endpoint::Withdraw.method(), HttpMethod::Delete);
        assert!(!Endpoint::Login.requires_auth());
        assert!(Endpoint::Note(group).requires_auth());
    }

    #[test]
    fn partial_update_omits_absent_fields() {
        let update = ProfileUpdate {
            name: Some("가을".into()),
            weight_kg: Some(2.5),
            ..Default::default()
        };
        let json = serde_json::to_value(UpdatePetRequest::from(&update)).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "가을", "weight": "2.5kg" }));
    }

    #[test]
    fn log_request_omits_missing_memo() {
        let req = CreateActivityLogRequest {
            checker_name: "서은".into(),
            memo: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "checkerName": "서은" }));
    }
}
