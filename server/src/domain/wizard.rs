//! Wizard steps and the typed write they merge into.
//!
//! Every step is a partial patch over one or two tables. Fields use the
//! `coerce::de` adapters, so an absent key leaves the column alone while a
//! present-but-invalid value clears it. Steps validate independently and then
//! fold into a single [`ProfileWrite`], which the repository applies in one
//! transaction.
use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use super::coerce::de;
use super::model::{
    EducationCareer, FamilyDetails, Gender, HoroscopeDetails, LocationLifestyle, MaritalStatus,
    Preference, Profile, User, Visibility, age_on, is_valid_mobile,
};

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: i32 = 100;
pub const HEIGHT_RANGE_CM: std::ops::RangeInclusive<i32> = 90..=250;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct WizardError {
    pub field: &'static str,
    pub message: String,
}

impl WizardError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Tables touched by a profile write, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteTable {
    Users,
    Profiles,
    FamilyDetails,
    HoroscopeDetails,
    LocationLifestyle,
    EducationCareer,
    Preferences,
}

impl fmt::Display for WriteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteTable::Users => "users",
            WriteTable::Profiles => "profiles",
            WriteTable::FamilyDetails => "family_details",
            WriteTable::HoroscopeDetails => "horoscope_details",
            WriteTable::LocationLifestyle => "location_lifestyle",
            WriteTable::EducationCareer => "education_career",
            WriteTable::Preferences => "preferences",
        })
    }
}

fn set<T>(target: &mut T, patch: &Option<T>)
where
    T: Clone,
{
    if let Some(value) = patch {
        *target = value.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStep {
    #[serde(default, deserialize_with = "de::text")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::enumeration")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "de::text")]
    pub mobile: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::date")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub height_cm: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::enumeration")]
    pub marital_status: Option<MaritalStatus>,
}

impl BasicStep {
    fn validate(&self, today: NaiveDate) -> Result<(), WizardError> {
        if matches!(self.first_name, Some(None)) {
            return Err(WizardError::new("firstName", "cannot be empty"));
        }
        if matches!(self.last_name, Some(None)) {
            return Err(WizardError::new("lastName", "cannot be empty"));
        }
        if let Some(Some(mobile)) = &self.mobile {
            if !is_valid_mobile(mobile) {
                return Err(WizardError::new("mobile", "must be 7 to 15 digits"));
            }
        }
        if let Some(Some(dob)) = self.date_of_birth {
            match age_on(dob, today) {
                Some(age) if age >= MIN_AGE => {}
                _ => {
                    return Err(WizardError::new(
                        "dateOfBirth",
                        format!("members must be at least {MIN_AGE} years old"),
                    ));
                }
            }
        }
        if let Some(Some(height)) = self.height_cm {
            if !HEIGHT_RANGE_CM.contains(&height) {
                return Err(WizardError::new(
                    "heightCm",
                    format!(
                        "must be between {} and {}",
                        HEIGHT_RANGE_CM.start(),
                        HEIGHT_RANGE_CM.end()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn user_patch(&self) -> UserPatch {
        UserPatch {
            first_name: self.first_name.clone().flatten(),
            last_name: self.last_name.clone().flatten(),
            gender: self.gender,
            mobile: self.mobile.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReligionStep {
    #[serde(default, deserialize_with = "de::fk_id")]
    pub religion_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub caste_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub mother_tongue_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyStep {
    #[serde(default, deserialize_with = "de::text")]
    pub father_occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub mother_occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub brothers: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub sisters: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::text")]
    pub family_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub family_values: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub family_location: Option<Option<String>>,
}

impl FamilyStep {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, row: &mut FamilyDetails) {
        set(&mut row.father_occupation, &self.father_occupation);
        set(&mut row.mother_occupation, &self.mother_occupation);
        set(&mut row.brothers, &self.brothers.map(|n| n.filter(|n| *n >= 0)));
        set(&mut row.sisters, &self.sisters.map(|n| n.filter(|n| *n >= 0)));
        set(&mut row.family_type, &self.family_type);
        set(&mut row.family_values, &self.family_values);
        set(&mut row.family_location, &self.family_location);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoroscopeStep {
    #[serde(default, deserialize_with = "de::text")]
    pub birth_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub birth_place: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub rashi: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub nakshatra: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::flag")]
    pub manglik: Option<Option<bool>>,
    #[serde(default, deserialize_with = "de::text")]
    pub astro_match: Option<Option<String>>,
}

impl HoroscopeStep {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, row: &mut HoroscopeDetails) {
        set(&mut row.birth_time, &self.birth_time);
        set(&mut row.birth_place, &self.birth_place);
        set(&mut row.rashi, &self.rashi);
        set(&mut row.nakshatra, &self.nakshatra);
        set(&mut row.manglik, &self.manglik);
        set(&mut row.astro_match, &self.astro_match);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStep {
    #[serde(default, deserialize_with = "de::fk_id")]
    pub country_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub state_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub city_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::text")]
    pub diet: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub smoking: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub drinking: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub hobbies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub personality_values: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub instagram: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub facebook: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::text")]
    pub linkedin: Option<Option<String>>,
}

impl LocationStep {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self) -> Result<(), WizardError> {
        let links = [
            ("instagram", &self.instagram),
            ("facebook", &self.facebook),
            ("linkedin", &self.linkedin),
        ];
        for (field, link) in links {
            if let Some(Some(link)) = link {
                if link.starts_with("http") && url::Url::parse(link).is_err() {
                    return Err(WizardError::new(field, "is not a valid URL"));
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, row: &mut LocationLifestyle) {
        set(&mut row.country_id, &self.country_id);
        set(&mut row.state_id, &self.state_id);
        set(&mut row.city_id, &self.city_id);
        set(&mut row.diet, &self.diet);
        set(&mut row.smoking, &self.smoking);
        set(&mut row.drinking, &self.drinking);
        set(&mut row.hobbies, &self.hobbies);
        set(&mut row.personality_values, &self.personality_values);
        set(&mut row.social_links.instagram, &self.instagram);
        set(&mut row.social_links.facebook, &self.facebook);
        set(&mut row.social_links.linkedin, &self.linkedin);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerStep {
    #[serde(default, deserialize_with = "de::fk_id")]
    pub education_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub employment_type_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub occupation_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::text")]
    pub employer: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub currency_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::fk_id")]
    pub income_range_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de::integer")]
    pub exact_income: Option<Option<i64>>,
}

impl CareerStep {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, row: &mut EducationCareer) {
        set(&mut row.education_id, &self.education_id);
        set(&mut row.employment_type_id, &self.employment_type_id);
        set(&mut row.occupation_id, &self.occupation_id);
        set(&mut row.employer, &self.employer);
        set(&mut row.currency_id, &self.currency_id);
        set(&mut row.income_range_id, &self.income_range_id);
        set(
            &mut row.exact_income,
            &self.exact_income.map(|n| n.filter(|n| *n >= 0)),
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutStep {
    #[serde(default, deserialize_with = "de::text")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "de::enumeration")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesStep {
    #[serde(default, deserialize_with = "de::small_integer")]
    pub min_age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub max_age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub min_height_cm: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::small_integer")]
    pub max_height_cm: Option<Option<i32>>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub religion_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "de::enum_list")]
    pub marital_statuses: Option<Vec<MaritalStatus>>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub country_ids: Option<Vec<i64>>,
}

impl PreferencesStep {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self) -> Result<(), WizardError> {
        let min_age = MIN_AGE as i32;
        for (field, age) in [("minAge", self.min_age), ("maxAge", self.max_age)] {
            if let Some(Some(age)) = age {
                if !(min_age..=MAX_AGE).contains(&age) {
                    return Err(WizardError::new(
                        field,
                        format!("must be between {min_age} and {MAX_AGE}"),
                    ));
                }
            }
        }
        if let (Some(Some(min)), Some(Some(max))) = (self.min_age, self.max_age) {
            if min > max {
                return Err(WizardError::new("minAge", "cannot exceed maxAge"));
            }
        }
        if let (Some(Some(min)), Some(Some(max))) = (self.min_height_cm, self.max_height_cm) {
            if min > max {
                return Err(WizardError::new("minHeightCm", "cannot exceed maxHeightCm"));
            }
        }
        Ok(())
    }

    pub fn apply(&self, row: &mut Preference) {
        set(&mut row.min_age, &self.min_age);
        set(&mut row.max_age, &self.max_age);
        set(&mut row.min_height_cm, &self.min_height_cm);
        set(&mut row.max_height_cm, &self.max_height_cm);
        set(&mut row.religion_ids, &self.religion_ids);
        set(&mut row.marital_statuses, &self.marital_statuses);
        set(&mut row.country_ids, &self.country_ids);
    }
}

/// Columns of `users` a member may change through the wizard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub mobile: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, user: &mut User) {
        set(&mut user.first_name, &self.first_name);
        set(&mut user.last_name, &self.last_name);
        set(&mut user.gender, &self.gender);
        set(&mut user.mobile, &self.mobile);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileCorePatch {
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub height_cm: Option<Option<i32>>,
    pub marital_status: Option<MaritalStatus>,
    pub religion_id: Option<Option<i64>>,
    pub caste_id: Option<Option<i64>>,
    pub mother_tongue_id: Option<Option<i64>>,
    pub bio: Option<Option<String>>,
    pub visibility: Option<Visibility>,
}

impl ProfileCorePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, row: &mut Profile) {
        set(&mut row.date_of_birth, &self.date_of_birth);
        set(&mut row.height_cm, &self.height_cm);
        set(&mut row.marital_status, &self.marital_status);
        set(&mut row.religion_id, &self.religion_id);
        set(&mut row.caste_id, &self.caste_id);
        set(&mut row.mother_tongue_id, &self.mother_tongue_id);
        set(&mut row.bio, &self.bio);
        set(&mut row.visibility, &self.visibility);
    }

    fn absorb_basic(&mut self, step: &BasicStep) {
        self.date_of_birth = step.date_of_birth.or(self.date_of_birth);
        self.height_cm = step.height_cm.or(self.height_cm);
        self.marital_status = step.marital_status.or(self.marital_status);
    }

    fn absorb_religion(&mut self, step: &ReligionStep) {
        self.religion_id = step.religion_id.or(self.religion_id);
        self.caste_id = step.caste_id.or(self.caste_id);
        self.mother_tongue_id = step.mother_tongue_id.or(self.mother_tongue_id);
    }

    fn absorb_about(&mut self, step: &AboutStep) {
        if step.bio.is_some() {
            self.bio = step.bio.clone();
        }
        self.visibility = step.visibility.or(self.visibility);
    }
}

/// One atomic write across the seven profile tables. `None` skips a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileWrite {
    pub user: Option<UserPatch>,
    pub profile: Option<ProfileCorePatch>,
    pub family: Option<FamilyStep>,
    pub horoscope: Option<HoroscopeStep>,
    pub lifestyle: Option<LocationStep>,
    pub career: Option<CareerStep>,
    pub preference: Option<PreferencesStep>,
}

impl ProfileWrite {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any table keyed by the profile row is touched.
    pub fn touches_profile(&self) -> bool {
        self.profile.is_some()
            || self.family.is_some()
            || self.horoscope.is_some()
            || self.lifestyle.is_some()
            || self.career.is_some()
            || self.preference.is_some()
    }

    fn core(&mut self) -> &mut ProfileCorePatch {
        self.profile.get_or_insert_with(ProfileCorePatch::default)
    }

    fn merge_step(&mut self, step: &WizardStep) {
        match step {
            WizardStep::Basic(s) => {
                let user = s.user_patch();
                if !user.is_empty() {
                    self.user = Some(user);
                }
                self.core().absorb_basic(s);
            }
            WizardStep::Religion(s) => self.core().absorb_religion(s),
            WizardStep::About(s) => self.core().absorb_about(s),
            WizardStep::Family(s) => self.family = Some(s.clone()),
            WizardStep::Horoscope(s) => self.horoscope = Some(s.clone()),
            WizardStep::Location(s) => self.lifestyle = Some(s.clone()),
            WizardStep::Career(s) => self.career = Some(s.clone()),
            WizardStep::Preferences(s) => self.preference = Some(s.clone()),
        }
    }

    /// Drops patches that turned out to carry nothing.
    fn normalized(mut self) -> Self {
        self.user = self.user.filter(|p| !p.is_empty());
        self.profile = self.profile.filter(|p| !p.is_empty());
        self.family = self.family.filter(|p| !p.is_empty());
        self.horoscope = self.horoscope.filter(|p| !p.is_empty());
        self.lifestyle = self.lifestyle.filter(|p| !p.is_empty());
        self.career = self.career.filter(|p| !p.is_empty());
        self.preference = self.preference.filter(|p| !p.is_empty());
        self
    }
}

/// One page of the registration wizard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum WizardStep {
    Basic(BasicStep),
    Religion(ReligionStep),
    Family(FamilyStep),
    Horoscope(HoroscopeStep),
    Location(LocationStep),
    Career(CareerStep),
    About(AboutStep),
    Preferences(PreferencesStep),
}

impl WizardStep {
    /// Position of the last page; committing it finishes the wizard.
    pub const FINAL_INDEX: i32 = 7;

    pub fn index(&self) -> i32 {
        match self {
            WizardStep::Basic(_) => 0,
            WizardStep::Religion(_) => 1,
            WizardStep::Family(_) => 2,
            WizardStep::Horoscope(_) => 3,
            WizardStep::Location(_) => 4,
            WizardStep::Career(_) => 5,
            WizardStep::About(_) => 6,
            WizardStep::Preferences(_) => 7,
        }
    }

    pub fn is_final(&self) -> bool {
        self.index() == Self::FINAL_INDEX
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), WizardError> {
        match self {
            WizardStep::Basic(s) => s.validate(today),
            WizardStep::Location(s) => s.validate(),
            WizardStep::Preferences(s) => s.validate(),
            _ => Ok(()),
        }
    }

    pub fn into_write(self) -> ProfileWrite {
        let mut write = ProfileWrite::default();
        write.merge_step(&self);
        write.normalized()
    }
}

/// Flat `PATCH /api/profile` body: every step's fields side by side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatchRequest {
    #[serde(flatten)]
    pub basic: BasicStep,
    #[serde(flatten)]
    pub religion: ReligionStep,
    #[serde(flatten)]
    pub family: FamilyStep,
    #[serde(flatten)]
    pub horoscope: HoroscopeStep,
    #[serde(flatten)]
    pub location: LocationStep,
    #[serde(flatten)]
    pub career: CareerStep,
    #[serde(flatten)]
    pub about: AboutStep,
    #[serde(flatten)]
    pub preferences: PreferencesStep,
    #[serde(default)]
    pub complete_wizard: bool,
}

impl ProfilePatchRequest {
    fn steps(self) -> [WizardStep; 8] {
        [
            WizardStep::Basic(self.basic),
            WizardStep::Religion(self.religion),
            WizardStep::Family(self.family),
            WizardStep::Horoscope(self.horoscope),
            WizardStep::Location(self.location),
            WizardStep::Career(self.career),
            WizardStep::About(self.about),
            WizardStep::Preferences(self.preferences),
        ]
    }

    /// Validates each step on its own, then merges them.
    pub fn into_write(self, today: NaiveDate) -> Result<ProfileWrite, WizardError> {
        let mut write = ProfileWrite::default();
        for step in self.steps() {
            step.validate(today)?;
            write.merge_step(&step);
        }
        Ok(write.normalized())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn patch(body: serde_json::Value) -> ProfilePatchRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn malformed_ids_and_numbers_become_null() {
        let write = patch(json!({ "religionId": "", "heightCm": "abc" }))
            .into_write(today())
            .unwrap();
        let core = write.profile.unwrap();
        assert_eq!(core.religion_id, Some(None));
        assert_eq!(core.height_cm, Some(None));
        assert_eq!(core.caste_id, None);
        assert!(write.family.is_none());
        assert!(write.user.is_none());
    }

    #[test]
    fn absent_keys_leave_tables_untouched() {
        let write = patch(json!({})).into_write(today()).unwrap();
        assert!(write.is_empty());
        assert!(!write.touches_profile());
    }

    #[test]
    fn flat_patch_spreads_over_tables() {
        let write = patch(json!({
            "firstName": "Meera",
            "fatherOccupation": "Engineer",
            "rashi": "Simha",
            "cityId": "44",
            "exactIncome": "900000",
            "maxAge": 35,
            "visibility": "Public",
        }))
        .into_write(today())
        .unwrap();

        assert_eq!(write.user.unwrap().first_name.as_deref(), Some("Meera"));
        assert_eq!(write.profile.unwrap().visibility, Some(Visibility::Public));
        let mut family = FamilyDetails::default();
        write.family.unwrap().apply(&mut family);
        assert_eq!(family.father_occupation.as_deref(), Some("Engineer"));
        let mut lifestyle = LocationLifestyle::default();
        write.lifestyle.unwrap().apply(&mut lifestyle);
        assert_eq!(lifestyle.city_id, Some(44));
        let mut career = EducationCareer::default();
        write.career.unwrap().apply(&mut career);
        assert_eq!(career.exact_income, Some(900_000));
        assert!(write.horoscope.is_some());
        assert!(write.preference.is_some());
    }

    #[test]
    fn unknown_enum_labels_fall_back() {
        let write = patch(json!({ "visibility": "Everyone", "maritalStatus": 9 }))
            .into_write(today())
            .unwrap();
        let core = write.profile.unwrap();
        assert_eq!(core.visibility, Some(Visibility::MembersOnly));
        assert_eq!(core.marital_status, Some(MaritalStatus::NeverMarried));
    }

    #[test]
    fn wizard_mobile_follows_registration_rules() {
        let err = patch(json!({ "mobile": "12ab" }))
            .into_write(today())
            .unwrap_err();
        assert_eq!(err.field, "mobile");

        let write = patch(json!({ "mobile": "+919876543210" }))
            .into_write(today())
            .unwrap();
        assert_eq!(
            write.user.unwrap().mobile,
            Some(Some("+919876543210".to_string()))
        );

        // Blank clears the number.
        let write = patch(json!({ "mobile": "" })).into_write(today()).unwrap();
        assert_eq!(write.user.unwrap().mobile, Some(None));
    }

    #[test]
    fn steps_validate_independently() {
        let err = patch(json!({ "dateOfBirth": "2015-01-01" }))
            .into_write(today())
            .unwrap_err();
        assert_eq!(err.field, "dateOfBirth");

        let err = patch(json!({ "minAge": 40, "maxAge": 30 }))
            .into_write(today())
            .unwrap_err();
        assert_eq!(err.field, "minAge");

        let err = patch(json!({ "firstName": "  " }))
            .into_write(today())
            .unwrap_err();
        assert_eq!(err.field, "firstName");
    }

    #[test]
    fn tagged_step_parses_and_merges() {
        let step: WizardStep = serde_json::from_value(json!({
            "step": "religion",
            "data": { "religionId": 3, "casteId": "x" }
        }))
        .unwrap();
        assert_eq!(step.index(), 1);
        assert!(!step.is_final());

        let write = step.into_write();
        let core = write.profile.unwrap();
        assert_eq!(core.religion_id, Some(Some(3)));
        assert_eq!(core.caste_id, Some(None));
    }

    #[test]
    fn preferences_is_the_final_step() {
        let step: WizardStep = serde_json::from_value(json!({
            "step": "preferences",
            "data": { "religionIds": [1, "2", ""], "maritalStatuses": ["Divorced"] }
        }))
        .unwrap();
        assert!(step.is_final());
        let mut pref = Preference::default();
        step.into_write().preference.unwrap().apply(&mut pref);
        assert_eq!(pref.religion_ids, vec![1, 2]);
        assert_eq!(pref.marital_statuses, vec![MaritalStatus::Divorced]);
    }

    #[test]
    fn apply_only_overwrites_present_fields() {
        let mut row = HoroscopeDetails {
            rashi: Some("Kanya".into()),
            nakshatra: Some("Hasta".into()),
            ..Default::default()
        };
        let step = HoroscopeStep {
            nakshatra: Some(None),
            manglik: Some(Some(true)),
            ..Default::default()
        };
        step.apply(&mut row);
        assert_eq!(row.rashi.as_deref(), Some("Kanya"));
        assert_eq!(row.nakshatra, None);
        assert_eq!(row.manglik, Some(true));
    }
}
