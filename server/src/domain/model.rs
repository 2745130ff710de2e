use std::{fmt, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::privacy::PrivacyOverrides;

pub type UserId = i64;

static MOBILE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").ok());

/// Seven to fifteen digits with an optional leading `+`.
pub fn is_valid_mobile(mobile: &str) -> bool {
    MOBILE.as_ref().is_some_and(|re| re.is_match(mobile))
}

/// Enums persisted as text columns and accepted leniently from wizard payloads.
pub trait TextEnum: Sized + Copy + Default + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Case-insensitive lookup; unknown text yields `None`.
    fn parse_text(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(text))
    }

    fn parse_or_default(text: &str) -> Self {
        Self::parse_text(text).unwrap_or_default()
    }
}

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl TextEnum for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role { User => "user", Admin => "admin" } default User);

text_enum!(Gender { Male => "Male", Female => "Female", Other => "Other" } default Other);

text_enum!(
    /// Who may open a profile at all; checked before any redaction.
    Visibility {
        Public => "Public",
        MembersOnly => "Members Only",
        Hidden => "Hidden",
    } default MembersOnly
);

text_enum!(MaritalStatus {
    NeverMarried => "Never Married",
    Divorced => "Divorced",
    Widowed => "Widowed",
    AwaitingDivorce => "Awaiting Divorce",
} default NeverMarried);

text_enum!(InterestStatus {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
} default Pending);

text_enum!(ReportStatus { Open => "open", Resolved => "resolved" } default Open);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub mobile: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender,
        }
    }
}

/// The user columns other members are allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub mobile: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub user_id: UserId,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub marital_status: MaritalStatus,
    pub religion_id: Option<i64>,
    pub caste_id: Option<i64>,
    pub mother_tongue_id: Option<i64>,
    pub bio: Option<String>,
    pub visibility: Visibility,
    pub privacy: PrivacyOverrides,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh row for the lazy first save of the wizard.
    pub fn empty(id: i64, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            date_of_birth: None,
            height_cm: None,
            marital_status: MaritalStatus::default(),
            religion_id: None,
            caste_id: None,
            mother_tongue_id: None,
            bio: None,
            visibility: Visibility::default(),
            privacy: PrivacyOverrides::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetails {
    pub father_occupation: Option<String>,
    pub mother_occupation: Option<String>,
    pub brothers: Option<i32>,
    pub sisters: Option<i32>,
    pub family_type: Option<String>,
    pub family_values: Option<String>,
    pub family_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoroscopeDetails {
    pub birth_time: Option<String>,
    pub birth_place: Option<String>,
    pub rashi: Option<String>,
    pub nakshatra: Option<String>,
    pub manglik: Option<bool>,
    pub astro_match: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLifestyle {
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    pub diet: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    pub hobbies: Vec<String>,
    pub personality_values: Vec<String>,
    pub social_links: SocialLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationCareer {
    pub education_id: Option<i64>,
    pub employment_type_id: Option<i64>,
    pub occupation_id: Option<i64>,
    pub employer: Option<String>,
    pub currency_id: Option<i64>,
    pub income_range_id: Option<i64>,
    pub exact_income: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub email_verified: bool,
    pub mobile_verified: bool,
    pub id_verified: bool,
    pub photo_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub url: String,
    pub is_main: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_height_cm: Option<i32>,
    pub max_height_cm: Option<i32>,
    pub religion_ids: Vec<i64>,
    pub marital_statuses: Vec<MaritalStatus>,
    pub country_ids: Vec<i64>,
}

/// Core profile row plus its one-to-one satellites.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileAggregate {
    pub profile: Profile,
    pub family: Option<FamilyDetails>,
    pub horoscope: Option<HoroscopeDetails>,
    pub lifestyle: Option<LocationLifestyle>,
    pub career: Option<EducationCareer>,
    pub badge: Badge,
    pub photos: Vec<Photo>,
    pub preference: Option<Preference>,
}

impl ProfileAggregate {
    /// Every reference id the aggregate points at, for label resolution.
    pub fn reference_keys(&self) -> Vec<(MasterKind, i64)> {
        let p = &self.profile;
        let mut keys = vec![
            (MasterKind::Religions, p.religion_id),
            (MasterKind::Castes, p.caste_id),
            (MasterKind::MotherTongues, p.mother_tongue_id),
        ];
        if let Some(l) = &self.lifestyle {
            keys.push((MasterKind::Countries, l.country_id));
            keys.push((MasterKind::States, l.state_id));
            keys.push((MasterKind::Cities, l.city_id));
        }
        if let Some(c) = &self.career {
            keys.push((MasterKind::Educations, c.education_id));
            keys.push((MasterKind::EmploymentTypes, c.employment_type_id));
            keys.push((MasterKind::Occupations, c.occupation_id));
            keys.push((MasterKind::Currencies, c.currency_id));
            keys.push((MasterKind::IncomeRanges, c.income_range_id));
        }
        keys.into_iter()
            .filter_map(|(kind, id)| id.map(|id| (kind, id)))
            .collect()
    }

    pub fn main_photo(&self) -> Option<&Photo> {
        self.photos.iter().find(|p| p.is_main)
    }
}

/// Human-readable names for the reference ids on a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLabels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caste: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother_tongue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_range: Option<String>,
}

impl ReferenceLabels {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (MasterKind, String)>) -> Self {
        let mut labels = Self::default();
        for (kind, name) in pairs {
            let slot = match kind {
                MasterKind::Religions => &mut labels.religion,
                MasterKind::Castes => &mut labels.caste,
                MasterKind::MotherTongues => &mut labels.mother_tongue,
                MasterKind::Countries => &mut labels.country,
                MasterKind::States => &mut labels.state,
                MasterKind::Cities => &mut labels.city,
                MasterKind::Educations => &mut labels.education,
                MasterKind::EmploymentTypes => &mut labels.employment_type,
                MasterKind::Occupations => &mut labels.occupation,
                MasterKind::Currencies => &mut labels.currency,
                MasterKind::IncomeRanges => &mut labels.income_range,
                MasterKind::Heights => continue,
            };
            *slot = Some(name);
        }
        labels
    }
}

/// Wizard checkpoint, overwritten wholesale on every save.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub step_data: Value,
    pub last_step: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            step_data: Value::Object(Default::default()),
            last_step: 0,
            updated_at: None,
        }
    }
}

/// Reference tables. Each maps to one table; some are filtered by a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MasterKind {
    Countries,
    States,
    Cities,
    Religions,
    Castes,
    MotherTongues,
    Educations,
    EmploymentTypes,
    Occupations,
    Currencies,
    IncomeRanges,
    Heights,
}

impl MasterKind {
    pub const ALL: [MasterKind; 12] = [
        MasterKind::Countries,
        MasterKind::States,
        MasterKind::Cities,
        MasterKind::Religions,
        MasterKind::Castes,
        MasterKind::MotherTongues,
        MasterKind::Educations,
        MasterKind::EmploymentTypes,
        MasterKind::Occupations,
        MasterKind::Currencies,
        MasterKind::IncomeRanges,
        MasterKind::Heights,
    ];

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    /// Path segment under `/api/master`.
    pub fn slug(self) -> &'static str {
        match self {
            MasterKind::Countries => "countries",
            MasterKind::States => "states",
            MasterKind::Cities => "cities",
            MasterKind::Religions => "religions",
            MasterKind::Castes => "castes",
            MasterKind::MotherTongues => "mother-tongues",
            MasterKind::Educations => "educations",
            MasterKind::EmploymentTypes => "employment-types",
            MasterKind::Occupations => "occupations",
            MasterKind::Currencies => "currencies",
            MasterKind::IncomeRanges => "income-ranges",
            MasterKind::Heights => "heights",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            MasterKind::Countries => "countries",
            MasterKind::States => "states",
            MasterKind::Cities => "cities",
            MasterKind::Religions => "religions",
            MasterKind::Castes => "castes",
            MasterKind::MotherTongues => "mother_tongues",
            MasterKind::Educations => "educations",
            MasterKind::EmploymentTypes => "employment_types",
            MasterKind::Occupations => "occupations",
            MasterKind::Currencies => "currencies",
            MasterKind::IncomeRanges => "income_ranges",
            MasterKind::Heights => "heights",
        }
    }

    /// Query-string key naming the parent id, for the cascading kinds.
    pub fn parent_key(self) -> Option<&'static str> {
        match self {
            MasterKind::States => Some("countryId"),
            MasterKind::Cities => Some("stateId"),
            MasterKind::Castes => Some("religionId"),
            MasterKind::Occupations => Some("employmentTypeId"),
            MasterKind::IncomeRanges => Some("currencyId"),
            _ => None,
        }
    }

    /// Used in "error fetching X" messages.
    pub fn label(self) -> &'static str {
        match self {
            MasterKind::MotherTongues => "mother tongues",
            MasterKind::EmploymentTypes => "employment types",
            MasterKind::IncomeRanges => "income ranges",
            other => other.table(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterEntry {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user_id: UserId,
    pub first_name: String,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub visibility: Visibility,
    pub religion_id: Option<i64>,
    pub city_id: Option<i64>,
    pub main_photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub viewer: UserId,
    pub viewer_gender: Gender,
    pub exclude: Vec<UserId>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: InterestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: UserId,
    pub reported_id: UserId,
    pub reason: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub reporter_id: UserId,
    pub reported_id: UserId,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStory {
    pub user_id: UserId,
    pub partner_name: String,
    pub story: String,
    pub wedding_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessStory {
    pub id: i64,
    pub user_id: UserId,
    pub partner_name: String,
    pub story: String,
    pub wedding_date: Option<NaiveDate>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Whole years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(dob)
}
