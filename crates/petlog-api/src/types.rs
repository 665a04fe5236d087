//! Domain types shared by the client core and the backend adapters

use chrono::{DateTime, Local};
use petlog_util::{GroupId, LogId, PetLogError, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of care activity a caregiver can log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Feeding,
    Watering,
    Elimination,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [
        ActivityKind::Feeding,
        ActivityKind::Watering,
        ActivityKind::Elimination,
    ];

    /// Path segment of the backend's log endpoint
    pub fn wire_name(self) -> &'static str {
        match self {
            ActivityKind::Feeding => "feeding",
            ActivityKind::Watering => "watering",
            ActivityKind::Elimination => "poop",
        }
    }

    /// Whether the activity runs on a fixed cycle
    pub fn is_scheduled(self) -> bool {
        !matches!(self, ActivityKind::Elimination)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ActivityKind {
    type Err = PetLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feeding" | "feed" => Ok(ActivityKind::Feeding),
            "watering" | "water" => Ok(ActivityKind::Watering),
            "elimination" | "poop" => Ok(ActivityKind::Elimination),
            other => Err(PetLogError::validation(format!(
                "unknown activity '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn wire_name(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl FromStr for Gender {
    type Err = PetLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::from_wire(s)
            .ok_or_else(|| PetLogError::validation(format!("unknown gender '{}'", s)))
    }
}

/// Pet profile shown at the top of the home screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub image_url: String,
    pub name: String,
    /// Free text, e.g. "2개월"
    pub age: String,
    pub weight_kg: f64,
    pub gender: Gender,
}

/// A recurring activity (feeding, watering) and its most recent occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySchedule {
    /// Hours between required occurrences
    pub cycle_hours: u32,
    pub last_event_time: DateTime<Local>,
    pub last_actor_name: String,
    /// Possibly empty
    pub last_note: String,
}

impl ActivitySchedule {
    pub fn new(cycle_hours: u32, last_event_time: DateTime<Local>) -> Self {
        Self {
            cycle_hours,
            last_event_time,
            last_actor_name: String::new(),
            last_note: String::new(),
        }
    }

    pub fn with_actor(mut self, name: impl Into<String>, note: impl Into<String>) -> Self {
        self.last_actor_name = name.into();
        self.last_note = note.into();
        self
    }
}

/// Same-day elimination tally; there is no cycle, one more can always be logged
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EliminationLog {
    pub count_today: u32,
    pub last_actor_name: String,
    pub last_note: String,
}

/// Everything the home screen shows for the current group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeData {
    pub profile: Profile,
    pub feeding: ActivitySchedule,
    pub watering: ActivitySchedule,
    pub elimination: EliminationLog,
    pub invite_code: String,
}

impl HomeData {
    pub fn schedule(&self, kind: ActivityKind) -> Option<&ActivitySchedule> {
        match kind {
            ActivityKind::Feeding => Some(&self.feeding),
            ActivityKind::Watering => Some(&self.watering),
            ActivityKind::Elimination => None,
        }
    }
}

/// A log entry about to be submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivityLog {
    pub actor_name: String,
    pub note: Option<String>,
}

impl NewActivityLog {
    /// Blank notes are sent as absent.
    pub fn new(actor_name: impl Into<String>, note: Option<String>) -> Self {
        Self {
            actor_name: actor_name.into(),
            note: note.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// Acknowledgement of a stored log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogRecord {
    pub id: LogId,
    pub group_id: GroupId,
    pub actor_name: String,
    pub note: Option<String>,
    pub recorded_at: Option<DateTime<Local>>,
}

/// Partial profile/schedule edit; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub image_url: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub weight_kg: Option<f64>,
    pub gender: Option<Gender>,
    pub feeding_cycle_hours: Option<u32>,
    pub last_feeding_time: Option<DateTime<Local>>,
    pub watering_cycle_hours: Option<u32>,
    pub last_watering_time: Option<DateTime<Local>>,
    pub notice: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProfileUpdate::default()
    }

    pub fn validate(&self) -> petlog_util::Result<()> {
        if self.feeding_cycle_hours == Some(0) || self.watering_cycle_hours == Some(0) {
            return Err(PetLogError::validation("cycle hours must be positive"));
        }
        if let Some(w) = self.weight_kg
            && !(w.is_finite() && w >= 0.0)
        {
            return Err(PetLogError::validation(format!("invalid weight {}", w)));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PetLogError::validation("name must not be empty"));
        }
        Ok(())
    }

    /// Apply the edit to a locally held bundle (optimistic update).
    pub fn apply_to(&self, home: &mut HomeData) {
        if let Some(url) = &self.image_url {
            home.profile.image_url = url.clone();
        }
        if let Some(name) = &self.name {
            home.profile.name = name.clone();
        }
        if let Some(age) = &self.age {
            home.profile.age = age.clone();
        }
        if let Some(weight) = self.weight_kg {
            home.profile.weight_kg = weight;
        }
        if let Some(gender) = self.gender {
            home.profile.gender = gender;
        }
        if let Some(cycle) = self.feeding_cycle_hours {
            home.feeding.cycle_hours = cycle;
        }
        if let Some(at) = self.last_feeding_time {
            home.feeding.last_event_time = at;
        }
        if let Some(cycle) = self.watering_cycle_hours {
            home.watering.cycle_hours = cycle;
        }
        if let Some(at) = self.last_watering_time {
            home.watering.last_event_time = at;
        }
    }
}

/// Data needed to create a new care group
#[derive(Debug, Clone, PartialEq)]
pub struct NewGroup {
    pub profile: Profile,
    pub feeding_cycle_hours: u32,
    pub last_feeding_time: DateTime<Local>,
    pub watering_cycle_hours: u32,
    pub last_watering_time: DateTime<Local>,
    pub notice: Option<String>,
}

/// The signed-in account as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub oauth_provider: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub group_id: Option<GroupId>,
}

/// Credentials returned by a login or registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: Option<UserId>,
    pub access_token: String,
    pub refresh_token: Option<String>,
}
