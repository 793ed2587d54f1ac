//! Client-side form validation.
//!
//! Forms carry the raw text a user typed. Converting a form into a draft or
//! patch is the validation step: it either yields a payload ready for the
//! access layer or the first failing field. Nothing here touches the network.

use thiserror::Error;

use crate::records::{NewRacquet, NewSession, NewString, NewStringJob, NewUser, RacquetPatch};

pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 10.0;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RacquetForm {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub pattern: String,
    pub weight: String,
    pub year: String,
    pub notes: String,
}

impl RacquetForm {
    pub fn to_new(&self, user: Option<String>) -> Result<NewRacquet, FieldError> {
        let name = required(&self.name, "name", "Racquet name is required")?;
        Ok(NewRacquet {
            user,
            name,
            brand: optional(&self.brand),
            model: optional(&self.model),
            pattern: optional(&self.pattern),
            weight: optional(&self.weight),
            year: self.year()?,
            notes: optional(&self.notes),
            is_active: None,
        })
    }

    /// Blank fields are omitted from the patch and so keep their stored value.
    pub fn to_patch(&self) -> Result<RacquetPatch, FieldError> {
        let name = required(&self.name, "name", "Racquet name is required")?;
        Ok(RacquetPatch {
            name: Some(name),
            brand: optional(&self.brand),
            model: optional(&self.model),
            pattern: optional(&self.pattern),
            weight: optional(&self.weight),
            year: self.year()?,
            notes: optional(&self.notes),
            is_active: None,
        })
    }

    fn year(&self) -> Result<Option<i32>, FieldError> {
        match self.year.trim() {
            "" => Ok(None),
            raw => raw
                .parse::<i32>()
                .map(Some)
                .map_err(|_| FieldError::new("year", "Year must be a number")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringForm {
    pub brand: String,
    pub model: String,
    pub material: String,
    pub gauge: String,
    pub color: String,
    pub construction: String,
    pub tension_range: String,
    pub durability: String,
    pub power: String,
    pub control: String,
    pub comfort: String,
    pub spin: String,
    pub notes: String,
}

impl StringForm {
    pub fn to_new(&self, user: Option<String>) -> Result<NewString, FieldError> {
        let model = required(&self.model, "model", "String model is required")?;
        Ok(NewString {
            user,
            brand: optional(&self.brand),
            model,
            material: optional(&self.material),
            gauge: optional(&self.gauge),
            color: optional(&self.color),
            construction: optional(&self.construction),
            tension_range: optional(&self.tension_range),
            durability: rating(&self.durability, "durability", "Durability")?,
            power: rating(&self.power, "power", "Power")?,
            control: rating(&self.control, "control", "Control")?,
            comfort: rating(&self.comfort, "comfort", "Comfort")?,
            spin: rating(&self.spin, "spin", "Spin")?,
            notes: optional(&self.notes),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringJobForm {
    pub racquet: String,
    pub main_string: String,
    pub cross_string: String,
    pub tension_main: String,
    pub tension_cross: String,
}

impl StringJobForm {
    pub fn to_new(&self, user: Option<String>) -> Result<NewStringJob, FieldError> {
        let racquet = required(&self.racquet, "racquet", "Racquet is required")?;
        let main_string = required(&self.main_string, "main_string", "Main string is required")?;
        let tension_lbs_main = number(&self.tension_main)
            .ok_or_else(|| FieldError::new("tension_lbs_main", "Valid main tension is required"))?;
        let tension_lbs_cross = match self.tension_cross.trim() {
            "" => None,
            raw => Some(number(raw).ok_or_else(|| {
                FieldError::new("tension_lbs_cross", "Cross tension must be a number")
            })?),
        };
        Ok(NewStringJob {
            user,
            racquet,
            main_string,
            cross_string: optional(&self.cross_string),
            tension_lbs_main,
            tension_lbs_cross,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionForm {
    pub string_job: String,
    pub duration_hours: String,
    pub rating: String,
    pub string_broken: bool,
    pub notes: String,
}

impl SessionForm {
    pub fn to_new(&self, user: Option<String>) -> Result<NewSession, FieldError> {
        let string_job = required(&self.string_job, "string_job", "Please select a string job")?;
        let duration_hours = number(&self.duration_hours)
            .ok_or_else(|| FieldError::new("duration_hours", "Valid duration is required"))?;
        Ok(NewSession {
            user,
            string_job,
            duration_hours,
            rating: rating(&self.rating, "rating", "Rating")?,
            string_broken: self.string_broken,
            notes: optional(&self.notes),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn to_new(&self) -> Result<NewUser, FieldError> {
        if [&self.name, &self.email, &self.password, &self.confirm_password]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(FieldError::new("form", "Please fill in all fields"));
        }
        if self.password != self.confirm_password {
            return Err(FieldError::new("confirm_password", "Passwords do not match"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FieldError::new(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
            ));
        }
        Ok(NewUser {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            password_confirm: self.confirm_password.clone(),
            name: self.name.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(FieldError::new("form", "Please enter both email and password"));
        }
        Ok(())
    }
}

fn required(raw: &str, field: &'static str, message: &str) -> Result<String, FieldError> {
    optional(raw).ok_or_else(|| FieldError::new(field, message))
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Blank is allowed; anything else must be a number in 1..=10, kept as typed.
fn rating(raw: &str, field: &'static str, label: &str) -> Result<Option<f64>, FieldError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match number(raw) {
        Some(n) if (RATING_MIN..=RATING_MAX).contains(&n) => Ok(Some(n)),
        _ => Err(FieldError::new(field, format!("{label} must be between 1-10"))),
    }
}
