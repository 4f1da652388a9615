//! User-type extension rows (artist, studio, student).

use serde::{Deserialize, Serialize};

use shor_core::{ArtistId, ClassLevel, DanceForm, StudentId, StudioId, UserId};

/// Placeholder written for required text fields at registration.
pub const PLACEHOLDER_TEXT: &str = "to be updated";

/// Default per-class rental fee in paise (₹200).
pub const DEFAULT_RENTAL_FEE_PER_CLASS: i32 = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: ArtistId,
    pub user_id: UserId,
    pub bio: String,
    pub experience: i32,
    pub specialization: String,
    pub portfolio: Option<String>,
    pub rate_per_hour: Option<i32>,
    pub rate_per_class: Option<i32>,
    pub teaching_style: Option<String>,
    pub is_verified: bool,
    pub rating: f32,
    pub total_ratings: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtist {
    pub bio: String,
    pub experience: i32,
    pub specialization: String,
}

impl NewArtist {
    pub fn placeholder() -> Self {
        Self {
            bio: PLACEHOLDER_TEXT.to_string(),
            experience: 0,
            specialization: PLACEHOLDER_TEXT.to_string(),
        }
    }

    pub fn into_artist(self, id: ArtistId, user_id: UserId) -> Artist {
        Artist {
            id,
            user_id,
            bio: self.bio,
            experience: self.experience,
            specialization: self.specialization,
            portfolio: None,
            rate_per_hour: None,
            rate_per_class: None,
            teaching_style: None,
            is_verified: false,
            rating: 0.0,
            total_ratings: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistUpdate {
    pub bio: Option<String>,
    pub experience: Option<i32>,
    pub specialization: Option<String>,
    pub portfolio: Option<String>,
    pub rate_per_hour: Option<i32>,
    pub rate_per_class: Option<i32>,
    pub teaching_style: Option<String>,
}

impl ArtistUpdate {
    pub fn apply(&self, artist: &mut Artist) {
        if let Some(v) = &self.bio {
            artist.bio = v.clone();
        }
        if let Some(v) = self.experience {
            artist.experience = v;
        }
        if let Some(v) = &self.specialization {
            artist.specialization = v.clone();
        }
        if let Some(v) = &self.portfolio {
            artist.portfolio = Some(v.clone());
        }
        if let Some(v) = self.rate_per_hour {
            artist.rate_per_hour = Some(v);
        }
        if let Some(v) = self.rate_per_class {
            artist.rate_per_class = Some(v);
        }
        if let Some(v) = &self.teaching_style {
            artist.teaching_style = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Studio {
    pub id: StudioId,
    pub user_id: UserId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub area: String,
    pub pincode: Option<String>,
    pub capacity: i32,
    pub price_per_hour: i32,
    pub rental_fee_per_class: i32,
    pub description: Option<String>,
    pub contact_phone: String,
    pub contact_email: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_verified: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudio {
    pub name: String,
    pub address: String,
    pub city: String,
    pub area: String,
    pub capacity: i32,
    pub price_per_hour: i32,
    pub contact_phone: String,
    pub contact_email: String,
}

impl NewStudio {
    /// Placeholder studio for a freshly registered owner; contact details
    /// are copied from the account.
    pub fn placeholder(name: &str, phone: Option<&str>, email: &str) -> Self {
        Self {
            name: format!("{name}'s Studio"),
            address: PLACEHOLDER_TEXT.to_string(),
            city: PLACEHOLDER_TEXT.to_string(),
            area: PLACEHOLDER_TEXT.to_string(),
            capacity: 0,
            price_per_hour: 0,
            contact_phone: phone.unwrap_or(PLACEHOLDER_TEXT).to_string(),
            contact_email: email.to_string(),
        }
    }

    pub fn into_studio(self, id: StudioId, user_id: UserId) -> Studio {
        Studio {
            id,
            user_id,
            name: self.name,
            address: self.address,
            city: self.city,
            area: self.area,
            pincode: None,
            capacity: self.capacity,
            price_per_hour: self.price_per_hour,
            rental_fee_per_class: DEFAULT_RENTAL_FEE_PER_CLASS,
            description: None,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            latitude: None,
            longitude: None,
            is_verified: false,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub pincode: Option<String>,
    pub capacity: Option<i32>,
    pub price_per_hour: Option<i32>,
    pub rental_fee_per_class: Option<i32>,
    pub description: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl StudioUpdate {
    pub fn apply(&self, studio: &mut Studio) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &self.$field {
                    studio.$field = v.clone();
                }
            };
            (opt $field:ident) => {
                if let Some(v) = &self.$field {
                    studio.$field = Some(v.clone());
                }
            };
        }
        set!(name);
        set!(address);
        set!(city);
        set!(area);
        set!(opt pincode);
        set!(capacity);
        set!(price_per_hour);
        set!(rental_fee_per_class);
        set!(opt description);
        set!(contact_phone);
        set!(contact_email);
        set!(opt latitude);
        set!(opt longitude);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub dance_experience: Option<String>,
    pub preferred_dance_forms: Vec<DanceForm>,
    pub skill_level: Option<ClassLevel>,
    pub goals: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub dance_experience: Option<String>,
    pub preferred_dance_forms: Option<Vec<DanceForm>>,
    pub skill_level: Option<ClassLevel>,
    pub goals: Option<String>,
}

impl StudentUpdate {
    pub fn apply(&self, student: &mut Student) {
        if let Some(v) = &self.dance_experience {
            student.dance_experience = Some(v.clone());
        }
        if let Some(v) = &self.preferred_dance_forms {
            student.preferred_dance_forms = v.clone();
        }
        if let Some(v) = self.skill_level {
            student.skill_level = Some(v);
        }
        if let Some(v) = &self.goals {
            student.goals = Some(v.clone());
        }
    }

    pub fn into_student(&self, id: StudentId, user_id: UserId) -> Student {
        let mut student = Student {
            id,
            user_id,
            dance_experience: None,
            preferred_dance_forms: Vec::new(),
            skill_level: None,
            goals: None,
            is_active: true,
        };
        self.apply(&mut student);
        student
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn studio_placeholder_copies_contact_details() {
        let s = NewStudio::placeholder("Meera", Some("9876543210"), "meera@studio.in");
        assert_eq!(s.contact_phone, "9876543210");
        assert_eq!(s.contact_email, "meera@studio.in");
        assert_eq!(s.address, PLACEHOLDER_TEXT);
        let studio = s.into_studio(StudioId::new(1), UserId::new());
        assert_eq!(studio.rental_fee_per_class, DEFAULT_RENTAL_FEE_PER_CLASS);
    }

    #[test]
    fn studio_update_only_touches_given_fields() {
        let mut studio = NewStudio::placeholder("Meera", None, "m@s.in").into_studio(StudioId::new(1), UserId::new());
        StudioUpdate {
            city: Some("Pune".into()),
            price_per_hour: Some(150_000),
            ..Default::default()
        }
        .apply(&mut studio);
        assert_eq!(studio.city, "Pune");
        assert_eq!(studio.price_per_hour, 150_000);
        assert_eq!(studio.area, PLACEHOLDER_TEXT);
        assert_eq!(studio.contact_phone, PLACEHOLDER_TEXT);
    }
}
