//! Client models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A client of the practice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Store-assigned UUID
    pub id: String,
    /// Full name (never empty)
    pub name: String,
    pub age: Option<u32>,
    /// Date of birth (YYYY-MM-DD)
    pub dob: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal: Option<String>,
    pub occupation: Option<String>,
    /// Referring party
    pub referred_by: Option<String>,
    /// Attending physician
    pub md: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

/// Editable client fields, as captured by the client form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientFields {
    pub name: String,
    pub age: Option<u32>,
    pub dob: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal: Option<String>,
    pub occupation: Option<String>,
    pub referred_by: Option<String>,
    pub md: Option<String>,
}

impl ClientFields {
    /// Create fields with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Presence check for the only required field.
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Blank optional strings are stored as absent.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.dob,
            &mut self.email,
            &mut self.phone,
            &mut self.address,
            &mut self.city,
            &mut self.postal,
            &mut self.occupation,
            &mut self.referred_by,
            &mut self.md,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }

    /// Fill `age` from `dob` when the age was left empty.
    pub fn fill_age_from_dob(&mut self, today: NaiveDate) {
        if self.age.is_some() {
            return;
        }
        if let Some(dob) = self.dob.as_deref().and_then(parse_date) {
            self.age = age_on(dob, today);
        }
    }
}

impl Client {
    /// The editable part of this client, for pre-filling the edit form.
    pub fn fields(&self) -> ClientFields {
        ClientFields {
            name: self.name.clone(),
            age: self.age,
            dob: self.dob.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            postal: self.postal.clone(),
            occupation: self.occupation.clone(),
            referred_by: self.referred_by.clone(),
            md: self.md.clone(),
        }
    }

    /// Up to two upper-case initials, `??` when the name has none.
    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "??".to_string()
        } else {
            initials
        }
    }

    /// Street, city and postal code joined with commas, if any are present.
    pub fn address_line(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.address, &self.city, &self.postal]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Age in whole years on `today`; `None` for birth dates in the future.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}
