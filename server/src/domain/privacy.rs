//! Privacy toggles and the projection that turns a stored profile into what
//! another member is allowed to see.
//!
//! Profiles store a sparse [`PrivacyOverrides`] patch. At read time it is laid
//! over [`PrivacySettings::DEFAULT`] and the result becomes an immutable
//! [`RedactionPolicy`]. [`project`] then builds a [`PublicProfile`] in which a
//! disabled section has no value to serialize.
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{
    Badge, EducationCareer, FamilyDetails, HoroscopeDetails, LocationLifestyle, MaritalStatus,
    Photo, ProfileAggregate, PublicUser, ReferenceLabels, SocialLinks, Visibility, age_on,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrivacySection {
    ExactIncome,
    FamilyDetails,
    BirthDetails,
    SocialLinks,
    PersonalityValues,
    Horoscope,
    AstroMatch,
}

impl PrivacySection {
    pub const ALL: [PrivacySection; 7] = [
        PrivacySection::ExactIncome,
        PrivacySection::FamilyDetails,
        PrivacySection::BirthDetails,
        PrivacySection::SocialLinks,
        PrivacySection::PersonalityValues,
        PrivacySection::Horoscope,
        PrivacySection::AstroMatch,
    ];
}

/// Stored per profile. Only the toggles the member touched are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_exact_income: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_family_details: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_birth_details: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_social_links: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_personality_values: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_horoscope: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_astro_match: Option<bool>,
}

impl PrivacyOverrides {
    fn slot(&mut self, section: PrivacySection) -> &mut Option<bool> {
        match section {
            PrivacySection::ExactIncome => &mut self.show_exact_income,
            PrivacySection::FamilyDetails => &mut self.show_family_details,
            PrivacySection::BirthDetails => &mut self.show_birth_details,
            PrivacySection::SocialLinks => &mut self.show_social_links,
            PrivacySection::PersonalityValues => &mut self.show_personality_values,
            PrivacySection::Horoscope => &mut self.show_horoscope,
            PrivacySection::AstroMatch => &mut self.show_astro_match,
        }
    }

    pub fn get(&self, section: PrivacySection) -> Option<bool> {
        match section {
            PrivacySection::ExactIncome => self.show_exact_income,
            PrivacySection::FamilyDetails => self.show_family_details,
            PrivacySection::BirthDetails => self.show_birth_details,
            PrivacySection::SocialLinks => self.show_social_links,
            PrivacySection::PersonalityValues => self.show_personality_values,
            PrivacySection::Horoscope => self.show_horoscope,
            PrivacySection::AstroMatch => self.show_astro_match,
        }
    }

    pub fn set(&mut self, section: PrivacySection, enabled: bool) {
        *self.slot(section) = Some(enabled);
    }

    /// Toggles present in `newer` replace ours; the rest are kept.
    pub fn merged_with(&self, newer: &PrivacyOverrides) -> PrivacyOverrides {
        let mut out = self.clone();
        for section in PrivacySection::ALL {
            if let Some(enabled) = newer.get(section) {
                out.set(section, enabled);
            }
        }
        out
    }
}

/// The full map after defaults are applied. Returned to the client so it can
/// decide which tabs to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub show_exact_income: bool,
    pub show_family_details: bool,
    pub show_birth_details: bool,
    pub show_social_links: bool,
    pub show_personality_values: bool,
    pub show_horoscope: bool,
    pub show_astro_match: bool,
}

impl PrivacySettings {
    /// Nothing is shared until the member opts in.
    pub const DEFAULT: PrivacySettings = PrivacySettings {
        show_exact_income: false,
        show_family_details: false,
        show_birth_details: false,
        show_social_links: false,
        show_personality_values: false,
        show_horoscope: false,
        show_astro_match: false,
    };

    pub const ALL_VISIBLE: PrivacySettings = PrivacySettings {
        show_exact_income: true,
        show_family_details: true,
        show_birth_details: true,
        show_social_links: true,
        show_personality_values: true,
        show_horoscope: true,
        show_astro_match: true,
    };

    pub fn resolve(overrides: &PrivacyOverrides) -> Self {
        let d = Self::DEFAULT;
        Self {
            show_exact_income: overrides.show_exact_income.unwrap_or(d.show_exact_income),
            show_family_details: overrides.show_family_details.unwrap_or(d.show_family_details),
            show_birth_details: overrides.show_birth_details.unwrap_or(d.show_birth_details),
            show_social_links: overrides.show_social_links.unwrap_or(d.show_social_links),
            show_personality_values: overrides
                .show_personality_values
                .unwrap_or(d.show_personality_values),
            show_horoscope: overrides.show_horoscope.unwrap_or(d.show_horoscope),
            show_astro_match: overrides.show_astro_match.unwrap_or(d.show_astro_match),
        }
    }

    pub fn is_enabled(&self, section: PrivacySection) -> bool {
        match section {
            PrivacySection::ExactIncome => self.show_exact_income,
            PrivacySection::FamilyDetails => self.show_family_details,
            PrivacySection::BirthDetails => self.show_birth_details,
            PrivacySection::SocialLinks => self.show_social_links,
            PrivacySection::PersonalityValues => self.show_personality_values,
            PrivacySection::Horoscope => self.show_horoscope,
            PrivacySection::AstroMatch => self.show_astro_match,
        }
    }
}

/// Immutable set of sections a reader may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    enabled: BTreeSet<PrivacySection>,
    settings: PrivacySettings,
}

impl RedactionPolicy {
    pub fn from_overrides(overrides: &PrivacyOverrides) -> Self {
        Self::from_settings(PrivacySettings::resolve(overrides))
    }

    pub fn from_settings(settings: PrivacySettings) -> Self {
        let enabled = PrivacySection::ALL
            .into_iter()
            .filter(|s| settings.is_enabled(*s))
            .collect();
        Self { enabled, settings }
    }

    pub fn allows(&self, section: PrivacySection) -> bool {
        self.enabled.contains(&section)
    }

    pub fn settings(&self) -> PrivacySettings {
        self.settings
    }

    fn keep<T>(&self, section: PrivacySection, value: T) -> Option<T> {
        self.allows(section).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCore {
    pub id: i64,
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub marital_status: MaritalStatus,
    pub religion_id: Option<i64>,
    pub caste_id: Option<i64>,
    pub mother_tongue_id: Option<i64>,
    pub bio: Option<String>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicHoroscope {
    pub rashi: Option<String>,
    pub nakshatra: Option<String>,
    pub manglik: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub astro_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLifestyle {
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    pub diet: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobbies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_links: Option<SocialLinks>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCareer {
    pub education_id: Option<i64>,
    pub employment_type_id: Option<i64>,
    pub occupation_id: Option<i64>,
    pub employer: Option<String>,
    pub currency_id: Option<i64>,
    pub income_range_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_income: Option<i64>,
}

/// What a non-owner receives from the profile read path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub user: PublicUser,
    pub profile: PublicCore,
    pub references: ReferenceLabels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horoscope: Option<PublicHoroscope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifestyle: Option<PublicLifestyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career: Option<PublicCareer>,
    pub badge: Badge,
    pub photos: Vec<Photo>,
    pub privacy: PrivacySettings,
}

/// Builds the non-owner view of `aggregate` under `policy`.
pub fn project(
    user: PublicUser,
    aggregate: ProfileAggregate,
    references: ReferenceLabels,
    policy: &RedactionPolicy,
    today: NaiveDate,
) -> PublicProfile {
    use PrivacySection as S;

    let ProfileAggregate {
        profile,
        family,
        horoscope,
        lifestyle,
        career,
        badge,
        photos,
        preference: _,
    } = aggregate;

    let core = PublicCore {
        id: profile.id,
        age: profile.date_of_birth.and_then(|dob| age_on(dob, today)),
        date_of_birth: profile
            .date_of_birth
            .and_then(|dob| policy.keep(S::BirthDetails, dob)),
        height_cm: profile.height_cm,
        marital_status: profile.marital_status,
        religion_id: profile.religion_id,
        caste_id: profile.caste_id,
        mother_tongue_id: profile.mother_tongue_id,
        bio: profile.bio,
        visibility: profile.visibility,
    };

    let horoscope = horoscope
        .and_then(|h| policy.keep(S::Horoscope, h))
        .map(|h: HoroscopeDetails| PublicHoroscope {
            rashi: h.rashi,
            nakshatra: h.nakshatra,
            manglik: h.manglik,
            birth_time: h.birth_time.and_then(|v| policy.keep(S::BirthDetails, v)),
            birth_place: h.birth_place.and_then(|v| policy.keep(S::BirthDetails, v)),
            astro_match: h.astro_match.and_then(|v| policy.keep(S::AstroMatch, v)),
        });

    let lifestyle = lifestyle.map(|l: LocationLifestyle| PublicLifestyle {
        country_id: l.country_id,
        state_id: l.state_id,
        city_id: l.city_id,
        diet: l.diet,
        smoking: l.smoking,
        drinking: l.drinking,
        hobbies: policy.keep(S::PersonalityValues, l.hobbies),
        personality_values: policy.keep(S::PersonalityValues, l.personality_values),
        social_links: policy.keep(S::SocialLinks, l.social_links),
    });

    let career = career.map(|c: EducationCareer| PublicCareer {
        education_id: c.education_id,
        employment_type_id: c.employment_type_id,
        occupation_id: c.occupation_id,
        employer: c.employer,
        currency_id: c.currency_id,
        income_range_id: c.income_range_id,
        exact_income: c.exact_income.and_then(|v| policy.keep(S::ExactIncome, v)),
    });

    PublicProfile {
        user,
        profile: core,
        references,
        family: family.and_then(|f| policy.keep(S::FamilyDetails, f)),
        horoscope,
        lifestyle,
        career,
        badge,
        photos,
        privacy: policy.settings(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use super::*;
    use crate::domain::model::{Gender, Profile};

    fn aggregate() -> ProfileAggregate {
        let mut profile = Profile::empty(7, 42, Utc::now());
        profile.date_of_birth = NaiveDate::from_ymd_opt(1994, 3, 1);
        ProfileAggregate {
            profile,
            family: Some(FamilyDetails {
                father_occupation: Some("Teacher".into()),
                ..Default::default()
            }),
            horoscope: Some(HoroscopeDetails {
                birth_time: Some("06:30".into()),
                birth_place: Some("Pune".into()),
                rashi: Some("Mesha".into()),
                astro_match: Some("28/36".into()),
                ..Default::default()
            }),
            lifestyle: Some(LocationLifestyle {
                hobbies: vec!["chess".into()],
                personality_values: vec!["honesty".into()],
                social_links: SocialLinks {
                    instagram: Some("@someone".into()),
                    ..Default::default()
                },
                ..Default::default()
            }),
            career: Some(EducationCareer {
                exact_income: Some(1_200_000),
                income_range_id: Some(3),
                ..Default::default()
            }),
            badge: Badge::default(),
            photos: vec![],
            preference: None,
        }
    }

    fn user() -> PublicUser {
        PublicUser {
            id: 42,
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            gender: Gender::Female,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn contains_key(value: &Value, key: &str) -> bool {
        match value {
            Value::Object(map) => map.iter().any(|(k, v)| k == key || contains_key(v, key)),
            Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
            _ => false,
        }
    }

    #[test]
    fn defaults_hide_every_section() {
        let policy = RedactionPolicy::from_overrides(&PrivacyOverrides::default());
        let view = project(user(), aggregate(), ReferenceLabels::default(), &policy, today());
        let json = serde_json::to_value(&view).unwrap();

        for key in [
            "exactIncome",
            "family",
            "horoscope",
            "dateOfBirth",
            "socialLinks",
            "personalityValues",
            "hobbies",
        ] {
            assert!(!contains_key(&json, key), "{key} leaked: {json}");
        }
        assert_eq!(json["profile"]["age"], 30);
        assert_eq!(json["career"]["incomeRangeId"], 3);
        assert_eq!(json["privacy"]["showExactIncome"], false);
    }

    #[test]
    fn enabled_sections_are_kept() {
        let mut overrides = PrivacyOverrides::default();
        for section in PrivacySection::ALL {
            overrides.set(section, true);
        }
        let policy = RedactionPolicy::from_overrides(&overrides);
        let view = project(user(), aggregate(), ReferenceLabels::default(), &policy, today());

        assert_eq!(view.career.unwrap().exact_income, Some(1_200_000));
        assert!(view.family.is_some());
        let horoscope = view.horoscope.unwrap();
        assert_eq!(horoscope.birth_place.as_deref(), Some("Pune"));
        assert_eq!(horoscope.astro_match.as_deref(), Some("28/36"));
        assert_eq!(view.profile.date_of_birth, NaiveDate::from_ymd_opt(1994, 3, 1));
        assert_eq!(view.privacy, PrivacySettings::ALL_VISIBLE);
    }

    #[test]
    fn horoscope_without_birth_details_drops_time_and_place() {
        let mut overrides = PrivacyOverrides::default();
        overrides.set(PrivacySection::Horoscope, true);
        let policy = RedactionPolicy::from_overrides(&overrides);
        let view = project(user(), aggregate(), ReferenceLabels::default(), &policy, today());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["horoscope"]["rashi"], "Mesha");
        assert!(!contains_key(&json, "birthTime"));
        assert!(!contains_key(&json, "birthPlace"));
        assert!(!contains_key(&json, "astroMatch"));
    }

    #[test]
    fn explicit_false_override_hides_section() {
        let mut overrides = PrivacyOverrides::default();
        overrides.set(PrivacySection::ExactIncome, false);
        overrides.set(PrivacySection::SocialLinks, true);
        let policy = RedactionPolicy::from_overrides(&overrides);
        assert!(!policy.allows(PrivacySection::ExactIncome));
        assert!(policy.allows(PrivacySection::SocialLinks));
    }

    #[test]
    fn merge_keeps_untouched_toggles() {
        let mut stored = PrivacyOverrides::default();
        stored.set(PrivacySection::Horoscope, true);
        let mut newer = PrivacyOverrides::default();
        newer.set(PrivacySection::ExactIncome, true);

        let merged = stored.merged_with(&newer);
        assert_eq!(merged.get(PrivacySection::Horoscope), Some(true));
        assert_eq!(merged.get(PrivacySection::ExactIncome), Some(true));
        assert_eq!(merged.get(PrivacySection::AstroMatch), None);
    }

    #[test]
    fn sparse_overrides_serialize_only_set_keys() {
        let mut overrides = PrivacyOverrides::default();
        overrides.set(PrivacySection::FamilyDetails, true);
        let json = serde_json::to_string(&overrides).unwrap();
        assert_eq!(json, r#"{"showFamilyDetails":true}"#);
    }
}
