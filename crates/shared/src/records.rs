use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

// ============================================================================
// Record trait
// ============================================================================

/// A record type stored in one collection of the record service.
///
/// Binds the Rust type to its collection name and to the query defaults the
/// app uses when listing and fetching it.
pub trait Record: DeserializeOwned + Send + Sync + 'static {
    /// Payload accepted by `create`.
    type Draft: Serialize + Send + Sync;
    /// Payload accepted by `update`; `None` fields are left unchanged.
    type Patch: Serialize + Send + Sync;

    const COLLECTION: &'static str;
    const DEFAULT_SORT: &'static str;
    const EXPAND: &'static [&'static str];
    const DEFAULT_PER_PAGE: u32 = 30;

    fn id(&self) -> &str;
}

/// One page of a collection listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub items: Vec<T>,
}

impl<T> ListResult<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated: Option<DateTime<Utc>>,
}

/// A string product in the catalog, not a strung instance of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TennisString {
    pub id: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub gauge: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub construction: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub tension_range: Option<String>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub durability: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub control: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub comfort: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub spin: Option<f64>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creator of the catalog entry
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Racquet {
    pub id: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// String pattern, e.g. "16x19"
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Free text, e.g. "305g"
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<RacquetExpand>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RacquetExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// One stringing event on a racquet
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StringJob {
    pub id: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub racquet: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub main_string: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub cross_string: Option<String>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub tension_lbs_main: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub tension_lbs_cross: Option<f64>,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<StringJobExpand>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StringJobExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub racquet: Option<Racquet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_string: Option<TennisString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_string: Option<TennisString>,
}

/// One play session under a given stringing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub string_job: Option<String>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_broken: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<SessionExpand>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionExpand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_job: Option<StringJob>,
}

// ============================================================================
// Create and update payloads
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewRacquet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RacquetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewString {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gauge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfort: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StringPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gauge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewStringJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub racquet: String,
    pub main_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_string: Option<String>,
    pub tension_lbs_main: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension_lbs_cross: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StringJobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension_lbs_main: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension_lbs_cross: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub string_job: String,
    pub duration_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub string_broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_broken: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// Collection bindings
// ============================================================================

impl Record for User {
    type Draft = NewUser;
    type Patch = UserPatch;

    const COLLECTION: &'static str = "users";
    const DEFAULT_SORT: &'static str = "-created";
    const EXPAND: &'static [&'static str] = &[];

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Racquet {
    type Draft = NewRacquet;
    type Patch = RacquetPatch;

    const COLLECTION: &'static str = "racquets";
    const DEFAULT_SORT: &'static str = "-created";
    const EXPAND: &'static [&'static str] = &["user"];

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for TennisString {
    type Draft = NewString;
    type Patch = StringPatch;

    const COLLECTION: &'static str = "strings";
    const DEFAULT_SORT: &'static str = "brand,model";
    const EXPAND: &'static [&'static str] = &[];
    const DEFAULT_PER_PAGE: u32 = 50;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for StringJob {
    type Draft = NewStringJob;
    type Patch = StringJobPatch;

    const COLLECTION: &'static str = "string_jobs";
    const DEFAULT_SORT: &'static str = "-created";
    const EXPAND: &'static [&'static str] = &["user", "racquet", "main_string", "cross_string"];

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Session {
    type Draft = NewSession;
    type Patch = SessionPatch;

    const COLLECTION: &'static str = "sessions";
    const DEFAULT_SORT: &'static str = "-created";
    const EXPAND: &'static [&'static str] = &["user", "string_job"];

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// The service sends "" for unset text and relation fields.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

/// The service sends 0 for unset number fields.
fn zero_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + PartialEq,
{
    let raw = Option::<T>::deserialize(deserializer)?;
    Ok(raw.filter(|v| *v != T::default()))
}

pub mod timestamp {
    //! Server timestamps: `2024-05-01 10:20:30.123Z`, RFC 3339 also accepted.

    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";
    const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.fZ";

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        NaiveDateTime::parse_from_str(value, PARSE_FORMAT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(value)
                    .map(|ts| ts.with_timezone(&Utc))
                    .ok()
            })
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&format(ts)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse(value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
