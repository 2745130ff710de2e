//! sqlx-backed implementation of the storage ports.
//!
//! The profile write runs in one transaction. Each table is read with
//! `FOR UPDATE`, patched in Rust, and written back with
//! `INSERT .. ON CONFLICT DO UPDATE`, so absent rows are created and present
//! rows updated by the same statement. Any error drops the transaction,
//! which rolls it back.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool, types::Json};

use super::repo::{
    DraftRepository, InteractionRepository, MasterRepository, ProfileRepository, RepoError,
    RepoResult, UserRepository,
};
use crate::domain::{
    model::{
        Badge, Candidate, CandidateQuery, Draft, EducationCareer, FamilyDetails, HoroscopeDetails,
        Interest, InterestDirection, InterestStatus, LocationLifestyle, MaritalStatus, MasterEntry,
        MasterKind, Message, NewReport, NewStory, NewUser, Photo, Preference, Profile,
        ProfileAggregate, PublicUser, Report, ReportStatus, SocialLinks, SuccessStory, TextEnum,
        User, UserId,
    },
    privacy::PrivacyOverrides,
    wizard::{ProfileWrite, WriteTable},
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn failed(table: WriteTable) -> impl Fn(sqlx::Error) -> RepoError {
    move |e| RepoError::WriteFailed {
        table,
        message: e.to_string(),
    }
}

fn parent_column(kind: MasterKind) -> Option<&'static str> {
    match kind {
        MasterKind::States => Some("country_id"),
        MasterKind::Cities => Some("state_id"),
        MasterKind::Castes => Some("religion_id"),
        MasterKind::Occupations => Some("employment_type_id"),
        MasterKind::IncomeRanges => Some("currency_id"),
        _ => None,
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    gender: String,
    mobile: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            gender: TextEnum::parse_or_default(&r.gender),
            mobile: r.mobile,
            role: TextEnum::parse_or_default(&r.role),
            created_at: r.created_at,
            deleted_at: r.deleted_at,
        }
    }
}

#[derive(FromRow)]
struct PublicUserRow {
    id: i64,
    first_name: String,
    last_name: String,
    gender: String,
}

#[derive(FromRow)]
struct ProfileRow {
    id: i64,
    user_id: i64,
    date_of_birth: Option<NaiveDate>,
    height_cm: Option<i32>,
    marital_status: String,
    religion_id: Option<i64>,
    caste_id: Option<i64>,
    mother_tongue_id: Option<i64>,
    bio: Option<String>,
    visibility: String,
    privacy: Json<PrivacyOverrides>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            date_of_birth: r.date_of_birth,
            height_cm: r.height_cm,
            marital_status: TextEnum::parse_or_default(&r.marital_status),
            religion_id: r.religion_id,
            caste_id: r.caste_id,
            mother_tongue_id: r.mother_tongue_id,
            bio: r.bio,
            visibility: TextEnum::parse_or_default(&r.visibility),
            privacy: r.privacy.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct FamilyRow {
    father_occupation: Option<String>,
    mother_occupation: Option<String>,
    brothers: Option<i32>,
    sisters: Option<i32>,
    family_type: Option<String>,
    family_values: Option<String>,
    family_location: Option<String>,
}

impl From<FamilyRow> for FamilyDetails {
    fn from(r: FamilyRow) -> Self {
        Self {
            father_occupation: r.father_occupation,
            mother_occupation: r.mother_occupation,
            brothers: r.brothers,
            sisters: r.sisters,
            family_type: r.family_type,
            family_values: r.family_values,
            family_location: r.family_location,
        }
    }
}

#[derive(FromRow)]
struct HoroscopeRow {
    birth_time: Option<String>,
    birth_place: Option<String>,
    rashi: Option<String>,
    nakshatra: Option<String>,
    manglik: Option<bool>,
    astro_match: Option<String>,
}

impl From<HoroscopeRow> for HoroscopeDetails {
    fn from(r: HoroscopeRow) -> Self {
        Self {
            birth_time: r.birth_time,
            birth_place: r.birth_place,
            rashi: r.rashi,
            nakshatra: r.nakshatra,
            manglik: r.manglik,
            astro_match: r.astro_match,
        }
    }
}

#[derive(FromRow)]
struct LifestyleRow {
    country_id: Option<i64>,
    state_id: Option<i64>,
    city_id: Option<i64>,
    diet: Option<String>,
    smoking: Option<String>,
    drinking: Option<String>,
    hobbies: Json<Vec<String>>,
    personality_values: Json<Vec<String>>,
    social_links: Json<SocialLinks>,
}

impl From<LifestyleRow> for LocationLifestyle {
    fn from(r: LifestyleRow) -> Self {
        Self {
            country_id: r.country_id,
            state_id: r.state_id,
            city_id: r.city_id,
            diet: r.diet,
            smoking: r.smoking,
            drinking: r.drinking,
            hobbies: r.hobbies.0,
            personality_values: r.personality_values.0,
            social_links: r.social_links.0,
        }
    }
}

#[derive(FromRow)]
struct CareerRow {
    education_id: Option<i64>,
    employment_type_id: Option<i64>,
    occupation_id: Option<i64>,
    employer: Option<String>,
    currency_id: Option<i64>,
    income_range_id: Option<i64>,
    exact_income: Option<i64>,
}

impl From<CareerRow> for EducationCareer {
    fn from(r: CareerRow) -> Self {
        Self {
            education_id: r.education_id,
            employment_type_id: r.employment_type_id,
            occupation_id: r.occupation_id,
            employer: r.employer,
            currency_id: r.currency_id,
            income_range_id: r.income_range_id,
            exact_income: r.exact_income,
        }
    }
}

#[derive(FromRow)]
struct BadgeRow {
    email_verified: bool,
    mobile_verified: bool,
    id_verified: bool,
    photo_verified: bool,
}

#[derive(FromRow)]
struct PhotoRow {
    id: i64,
    url: String,
    is_main: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl From<PhotoRow> for Photo {
    fn from(r: PhotoRow) -> Self {
        Self {
            id: r.id,
            url: r.url,
            is_main: r.is_main,
            sort_order: r.sort_order,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct PreferenceRow {
    min_age: Option<i32>,
    max_age: Option<i32>,
    min_height_cm: Option<i32>,
    max_height_cm: Option<i32>,
    religion_ids: Json<Vec<i64>>,
    marital_statuses: Json<Vec<String>>,
    country_ids: Json<Vec<i64>>,
}

impl From<PreferenceRow> for Preference {
    fn from(r: PreferenceRow) -> Self {
        Self {
            min_age: r.min_age,
            max_age: r.max_age,
            min_height_cm: r.min_height_cm,
            max_height_cm: r.max_height_cm,
            religion_ids: r.religion_ids.0,
            marital_statuses: r
                .marital_statuses
                .0
                .iter()
                .filter_map(|s| MaritalStatus::parse_text(s))
                .collect(),
            country_ids: r.country_ids.0,
        }
    }
}

#[derive(FromRow)]
struct DraftRow {
    step_data: Json<Value>,
    last_step: i32,
    updated_at: DateTime<Utc>,
}

impl From<DraftRow> for Draft {
    fn from(r: DraftRow) -> Self {
        Self {
            step_data: r.step_data.0,
            last_step: r.last_step,
            updated_at: Some(r.updated_at),
        }
    }
}

#[derive(FromRow)]
struct MasterRow {
    id: i64,
    name: String,
    parent_id: Option<i64>,
    value: Option<String>,
    sort_order: i32,
    is_active: bool,
}

#[derive(FromRow)]
struct CandidateRow {
    user_id: i64,
    first_name: String,
    gender: String,
    date_of_birth: Option<NaiveDate>,
    visibility: String,
    religion_id: Option<i64>,
    city_id: Option<i64>,
    main_photo: Option<String>,
}

#[derive(FromRow)]
struct InterestRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InterestRow> for Interest {
    fn from(r: InterestRow) -> Self {
        Self {
            id: r.id,
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            status: TextEnum::parse_or_default(&r.status),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    body: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ReportRow {
    id: i64,
    reporter_id: i64,
    reported_id: i64,
    reason: String,
    details: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(r: ReportRow) -> Self {
        Self {
            id: r.id,
            reporter_id: r.reporter_id,
            reported_id: r.reported_id,
            reason: r.reason,
            details: r.details,
            status: TextEnum::parse_or_default(&r.status),
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct StoryRow {
    id: i64,
    user_id: i64,
    partner_name: String,
    story: String,
    wedding_date: Option<NaiveDate>,
    approved: bool,
    created_at: DateTime<Utc>,
}

impl From<StoryRow> for SuccessStory {
    fn from(r: StoryRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            partner_name: r.partner_name,
            story: r.story,
            wedding_date: r.wedding_date,
            approved: r.approved,
            created_at: r.created_at,
        }
    }
}

/// Inserts the profile row if missing and returns it locked.
async fn lock_profile(conn: &mut PgConnection, user_id: UserId) -> Result<Profile, sqlx::Error> {
    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let row: ProfileRow = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.into())
}

async fn write_user(
    conn: &mut PgConnection,
    user_id: UserId,
    write: &ProfileWrite,
) -> RepoResult<()> {
    let Some(patch) = &write.user else {
        return Ok(());
    };
    let at = failed(WriteTable::Users);
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(&at)?;
    let mut user: User = row.ok_or(RepoError::NotFound("user"))?.into();
    patch.apply(&mut user);
    sqlx::query(
        "UPDATE users SET first_name = $2, last_name = $3, gender = $4, mobile = $5 WHERE id = $1",
    )
    .bind(user_id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.gender.as_str())
    .bind(&user.mobile)
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

async fn write_profile(
    conn: &mut PgConnection,
    user_id: UserId,
    write: &ProfileWrite,
) -> RepoResult<i64> {
    let at = failed(WriteTable::Profiles);
    let mut profile = lock_profile(conn, user_id).await.map_err(&at)?;
    if let Some(patch) = &write.profile {
        patch.apply(&mut profile);
    }
    sqlx::query(
        r#"UPDATE profiles SET
            date_of_birth = $2, height_cm = $3, marital_status = $4, religion_id = $5,
            caste_id = $6, mother_tongue_id = $7, bio = $8, visibility = $9, updated_at = NOW()
        WHERE id = $1"#,
    )
    .bind(profile.id)
    .bind(profile.date_of_birth)
    .bind(profile.height_cm)
    .bind(profile.marital_status.as_str())
    .bind(profile.religion_id)
    .bind(profile.caste_id)
    .bind(profile.mother_tongue_id)
    .bind(&profile.bio)
    .bind(profile.visibility.as_str())
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(profile.id)
}

async fn write_family(conn: &mut PgConnection, pid: i64, write: &ProfileWrite) -> RepoResult<()> {
    let Some(patch) = &write.family else {
        return Ok(());
    };
    let at = failed(WriteTable::FamilyDetails);
    let current: Option<FamilyRow> =
        sqlx::query_as("SELECT * FROM family_details WHERE profile_id = $1 FOR UPDATE")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(&at)?;
    let mut row: FamilyDetails = current.map(Into::into).unwrap_or_default();
    patch.apply(&mut row);
    sqlx::query(
        r#"INSERT INTO family_details (profile_id, father_occupation, mother_occupation, brothers,
            sisters, family_type, family_values, family_location)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (profile_id) DO UPDATE SET
            father_occupation = EXCLUDED.father_occupation,
            mother_occupation = EXCLUDED.mother_occupation,
            brothers = EXCLUDED.brothers,
            sisters = EXCLUDED.sisters,
            family_type = EXCLUDED.family_type,
            family_values = EXCLUDED.family_values,
            family_location = EXCLUDED.family_location"#,
    )
    .bind(pid)
    .bind(&row.father_occupation)
    .bind(&row.mother_occupation)
    .bind(row.brothers)
    .bind(row.sisters)
    .bind(&row.family_type)
    .bind(&row.family_values)
    .bind(&row.family_location)
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

async fn write_horoscope(
    conn: &mut PgConnection,
    pid: i64,
    write: &ProfileWrite,
) -> RepoResult<()> {
    let Some(patch) = &write.horoscope else {
        return Ok(());
    };
    let at = failed(WriteTable::HoroscopeDetails);
    let current: Option<HoroscopeRow> =
        sqlx::query_as("SELECT * FROM horoscope_details WHERE profile_id = $1 FOR UPDATE")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(&at)?;
    let mut row: HoroscopeDetails = current.map(Into::into).unwrap_or_default();
    patch.apply(&mut row);
    sqlx::query(
        r#"INSERT INTO horoscope_details (profile_id, birth_time, birth_place, rashi, nakshatra,
            manglik, astro_match)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (profile_id) DO UPDATE SET
            birth_time = EXCLUDED.birth_time,
            birth_place = EXCLUDED.birth_place,
            rashi = EXCLUDED.rashi,
            nakshatra = EXCLUDED.nakshatra,
            manglik = EXCLUDED.manglik,
            astro_match = EXCLUDED.astro_match"#,
    )
    .bind(pid)
    .bind(&row.birth_time)
    .bind(&row.birth_place)
    .bind(&row.rashi)
    .bind(&row.nakshatra)
    .bind(row.manglik)
    .bind(&row.astro_match)
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

async fn write_lifestyle(
    conn: &mut PgConnection,
    pid: i64,
    write: &ProfileWrite,
) -> RepoResult<()> {
    let Some(patch) = &write.lifestyle else {
        return Ok(());
    };
    let at = failed(WriteTable::LocationLifestyle);
    let current: Option<LifestyleRow> =
        sqlx::query_as("SELECT * FROM location_lifestyle WHERE profile_id = $1 FOR UPDATE")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(&at)?;
    let mut row: LocationLifestyle = current.map(Into::into).unwrap_or_default();
    patch.apply(&mut row);
    sqlx::query(
        r#"INSERT INTO location_lifestyle (profile_id, country_id, state_id, city_id, diet,
            smoking, drinking, hobbies, personality_values, social_links)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (profile_id) DO UPDATE SET
            country_id = EXCLUDED.country_id,
            state_id = EXCLUDED.state_id,
            city_id = EXCLUDED.city_id,
            diet = EXCLUDED.diet,
            smoking = EXCLUDED.smoking,
            drinking = EXCLUDED.drinking,
            hobbies = EXCLUDED.hobbies,
            personality_values = EXCLUDED.personality_values,
            social_links = EXCLUDED.social_links"#,
    )
    .bind(pid)
    .bind(row.country_id)
    .bind(row.state_id)
    .bind(row.city_id)
    .bind(&row.diet)
    .bind(&row.smoking)
    .bind(&row.drinking)
    .bind(Json(&row.hobbies))
    .bind(Json(&row.personality_values))
    .bind(Json(&row.social_links))
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

async fn write_career(conn: &mut PgConnection, pid: i64, write: &ProfileWrite) -> RepoResult<()> {
    let Some(patch) = &write.career else {
        return Ok(());
    };
    let at = failed(WriteTable::EducationCareer);
    let current: Option<CareerRow> =
        sqlx::query_as("SELECT * FROM education_career WHERE profile_id = $1 FOR UPDATE")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(&at)?;
    let mut row: EducationCareer = current.map(Into::into).unwrap_or_default();
    patch.apply(&mut row);
    sqlx::query(
        r#"INSERT INTO education_career (profile_id, education_id, employment_type_id,
            occupation_id, employer, currency_id, income_range_id, exact_income)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (profile_id) DO UPDATE SET
            education_id = EXCLUDED.education_id,
            employment_type_id = EXCLUDED.employment_type_id,
            occupation_id = EXCLUDED.occupation_id,
            employer = EXCLUDED.employer,
            currency_id = EXCLUDED.currency_id,
            income_range_id = EXCLUDED.income_range_id,
            exact_income = EXCLUDED.exact_income"#,
    )
    .bind(pid)
    .bind(row.education_id)
    .bind(row.employment_type_id)
    .bind(row.occupation_id)
    .bind(&row.employer)
    .bind(row.currency_id)
    .bind(row.income_range_id)
    .bind(row.exact_income)
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

async fn write_preference(
    conn: &mut PgConnection,
    pid: i64,
    write: &ProfileWrite,
) -> RepoResult<()> {
    let Some(patch) = &write.preference else {
        return Ok(());
    };
    let at = failed(WriteTable::Preferences);
    let current: Option<PreferenceRow> =
        sqlx::query_as("SELECT * FROM preferences WHERE profile_id = $1 FOR UPDATE")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await
            .map_err(&at)?;
    let mut row: Preference = current.map(Into::into).unwrap_or_default();
    patch.apply(&mut row);
    let statuses: Vec<&str> = row.marital_statuses.iter().map(|s| s.as_str()).collect();
    sqlx::query(
        r#"INSERT INTO preferences (profile_id, min_age, max_age, min_height_cm, max_height_cm,
            religion_ids, marital_statuses, country_ids)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (profile_id) DO UPDATE SET
            min_age = EXCLUDED.min_age,
            max_age = EXCLUDED.max_age,
            min_height_cm = EXCLUDED.min_height_cm,
            max_height_cm = EXCLUDED.max_height_cm,
            religion_ids = EXCLUDED.religion_ids,
            marital_statuses = EXCLUDED.marital_statuses,
            country_ids = EXCLUDED.country_ids"#,
    )
    .bind(pid)
    .bind(row.min_age)
    .bind(row.max_age)
    .bind(row.min_height_cm)
    .bind(row.max_height_cm)
    .bind(Json(&row.religion_ids))
    .bind(Json(&statuses))
    .bind(Json(&row.country_ids))
    .execute(&mut *conn)
    .await
    .map_err(&at)?;
    Ok(())
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, new_user: NewUser) -> RepoResult<User> {
        let result = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (email, password_hash, first_name, last_name, gender, mobile, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.gender.as_str())
        .bind(&new_user.mobile)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(RepoError::Conflict(
                format!("email '{}' is already registered", new_user.email),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn find_public(&self, id: UserId) -> RepoResult<Option<PublicUser>> {
        let row: Option<PublicUserRow> = sqlx::query_as(
            "SELECT id, first_name, last_name, gender FROM users \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| PublicUser {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            gender: TextEnum::parse_or_default(&r.gender),
        }))
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("user"));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: UserId) -> RepoResult<bool> {
        let result =
            sqlx::query("UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn load(&self, user_id: UserId) -> RepoResult<Option<ProfileAggregate>> {
        let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let profile: Profile = row.into();
        let pid = profile.id;

        let family: Option<FamilyRow> =
            sqlx::query_as("SELECT * FROM family_details WHERE profile_id = $1")
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;
        let horoscope: Option<HoroscopeRow> =
            sqlx::query_as("SELECT * FROM horoscope_details WHERE profile_id = $1")
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;
        let lifestyle: Option<LifestyleRow> =
            sqlx::query_as("SELECT * FROM location_lifestyle WHERE profile_id = $1")
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;
        let career: Option<CareerRow> =
            sqlx::query_as("SELECT * FROM education_career WHERE profile_id = $1")
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;
        let badge: Option<BadgeRow> = sqlx::query_as("SELECT * FROM badges WHERE profile_id = $1")
            .bind(pid)
            .fetch_optional(&self.pool)
            .await?;
        let photos: Vec<PhotoRow> = sqlx::query_as(
            "SELECT id, url, is_main, sort_order, created_at FROM photos \
             WHERE profile_id = $1 ORDER BY sort_order, id",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await?;
        let preference: Option<PreferenceRow> =
            sqlx::query_as("SELECT * FROM preferences WHERE profile_id = $1")
                .bind(pid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(Some(ProfileAggregate {
            profile,
            family: family.map(Into::into),
            horoscope: horoscope.map(Into::into),
            lifestyle: lifestyle.map(Into::into),
            career: career.map(Into::into),
            badge: badge
                .map(|b| Badge {
                    email_verified: b.email_verified,
                    mobile_verified: b.mobile_verified,
                    id_verified: b.id_verified,
                    photo_verified: b.photo_verified,
                })
                .unwrap_or_default(),
            photos: photos.into_iter().map(Into::into).collect(),
            preference: preference.map(Into::into),
        }))
    }

    async fn apply_write(&self, user_id: UserId, write: &ProfileWrite) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        write_user(&mut tx, user_id, write).await?;
        if write.touches_profile() {
            let pid = write_profile(&mut tx, user_id, write).await?;
            write_family(&mut tx, pid, write).await?;
            write_horoscope(&mut tx, pid, write).await?;
            write_lifestyle(&mut tx, pid, write).await?;
            write_career(&mut tx, pid, write).await?;
            write_preference(&mut tx, pid, write).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_privacy(&self, user_id: UserId, overrides: &PrivacyOverrides) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO profiles (user_id, privacy) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET privacy = EXCLUDED.privacy, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(Json(overrides))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_photo(&self, user_id: UserId, url: &str) -> RepoResult<Photo> {
        let mut tx = self.pool.begin().await?;
        let profile = lock_profile(&mut tx, user_id).await?;
        let (count, max_order): (i64, Option<i32>) =
            sqlx::query_as("SELECT COUNT(*), MAX(sort_order) FROM photos WHERE profile_id = $1")
                .bind(profile.id)
                .fetch_one(&mut *tx)
                .await?;
        let row: PhotoRow = sqlx::query_as(
            r#"INSERT INTO photos (profile_id, url, is_main, sort_order) VALUES ($1, $2, $3, $4)
            RETURNING id, url, is_main, sort_order, created_at"#,
        )
        .bind(profile.id)
        .bind(url)
        .bind(count == 0)
        .bind(max_order.map_or(0, |o| o + 1))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn remove_photo(&self, user_id: UserId, photo_id: i64) -> RepoResult<Option<Photo>> {
        let mut tx = self.pool.begin().await?;
        let removed: Option<PhotoRow> = sqlx::query_as(
            r#"DELETE FROM photos
            WHERE id = $1 AND profile_id = (SELECT id FROM profiles WHERE user_id = $2)
            RETURNING id, url, is_main, sort_order, created_at"#,
        )
        .bind(photo_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(removed) = removed else {
            return Ok(None);
        };
        if removed.is_main {
            sqlx::query(
                r#"UPDATE photos SET is_main = true WHERE id = (
                    SELECT id FROM photos
                    WHERE profile_id = (SELECT id FROM profiles WHERE user_id = $1)
                    ORDER BY sort_order, id LIMIT 1
                )"#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Some(removed.into()))
    }

    async fn delete_horoscope(&self, user_id: UserId) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM horoscope_details \
             WHERE profile_id = (SELECT id FROM profiles WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn candidates(&self, query: &CandidateQuery) -> RepoResult<Vec<Candidate>> {
        let rows: Vec<CandidateRow> = sqlx::query_as(
            r#"SELECT u.id AS user_id, u.first_name, u.gender, p.date_of_birth, p.visibility,
                p.religion_id, l.city_id,
                (SELECT ph.url FROM photos ph WHERE ph.profile_id = p.id AND ph.is_main LIMIT 1)
                    AS main_photo
            FROM profiles p
            JOIN users u ON u.id = p.user_id
            LEFT JOIN location_lifestyle l ON l.profile_id = p.id
            WHERE u.id <> $1
              AND u.deleted_at IS NULL
              AND p.visibility <> 'Hidden'
              AND u.gender <> $2
              AND NOT (u.id = ANY($3))
            ORDER BY p.updated_at DESC
            LIMIT $4"#,
        )
        .bind(query.viewer)
        .bind(query.viewer_gender.as_str())
        .bind(&query.exclude)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Candidate {
                user_id: r.user_id,
                first_name: r.first_name,
                gender: TextEnum::parse_or_default(&r.gender),
                date_of_birth: r.date_of_birth,
                visibility: TextEnum::parse_or_default(&r.visibility),
                religion_id: r.religion_id,
                city_id: r.city_id,
                main_photo: r.main_photo,
            })
            .collect())
    }
}

#[async_trait]
impl DraftRepository for PgStore {
    async fn get(&self, user_id: UserId) -> RepoResult<Option<Draft>> {
        let row: Option<DraftRow> =
            sqlx::query_as("SELECT step_data, last_step, updated_at FROM drafts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn save(&self, user_id: UserId, step_data: &Value, last_step: i32) -> RepoResult<Draft> {
        let row: DraftRow = sqlx::query_as(
            r#"INSERT INTO drafts (user_id, step_data, last_step, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                step_data = EXCLUDED.step_data,
                last_step = EXCLUDED.last_step,
                updated_at = NOW()
            RETURNING step_data, last_step, updated_at"#,
        )
        .bind(user_id)
        .bind(Json(step_data))
        .bind(last_step)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn clear(&self, user_id: UserId) -> RepoResult<()> {
        sqlx::query("DELETE FROM drafts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MasterRepository for PgStore {
    async fn list(&self, kind: MasterKind, parent_id: Option<i64>) -> RepoResult<Vec<MasterEntry>> {
        let table = kind.table();
        let rows: Vec<MasterRow> = match (parent_column(kind), parent_id) {
            (Some(column), Some(parent)) => {
                sqlx::query_as(&format!(
                    "SELECT id, name, {column} AS parent_id, value, sort_order, is_active \
                     FROM {table} WHERE is_active AND {column} = $1 ORDER BY sort_order, name"
                ))
                .bind(parent)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(column), None) => {
                sqlx::query_as(&format!(
                    "SELECT id, name, {column} AS parent_id, value, sort_order, is_active \
                     FROM {table} WHERE is_active ORDER BY sort_order, name"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            (None, _) => {
                sqlx::query_as(&format!(
                    "SELECT id, name, NULL::BIGINT AS parent_id, value, sort_order, is_active \
                     FROM {table} WHERE is_active ORDER BY sort_order, name"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(|r| MasterEntry {
                id: r.id,
                name: r.name,
                parent_id: r.parent_id,
                value: r.value,
                sort_order: r.sort_order,
                is_active: r.is_active,
            })
            .collect())
    }

    async fn labels(
        &self,
        keys: &[(MasterKind, i64)],
    ) -> RepoResult<HashMap<(MasterKind, i64), String>> {
        let mut by_kind: BTreeMap<MasterKind, Vec<i64>> = BTreeMap::new();
        for &(kind, id) in keys {
            by_kind.entry(kind).or_default().push(id);
        }

        let mut labels = HashMap::with_capacity(keys.len());
        for (kind, ids) in by_kind {
            let rows: Vec<(i64, String)> = sqlx::query_as(&format!(
                "SELECT id, name FROM {} WHERE id = ANY($1)",
                kind.table()
            ))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
            labels.extend(rows.into_iter().map(|(id, name)| ((kind, id), name)));
        }
        Ok(labels)
    }
}

#[async_trait]
impl InteractionRepository for PgStore {
    async fn create_interest(&self, sender: UserId, receiver: UserId) -> RepoResult<Interest> {
        let result = sqlx::query_as::<_, InterestRow>(
            "INSERT INTO interests (sender_id, receiver_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(sender)
        .bind(receiver)
        .fetch_one(&self.pool)
        .await;
        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepoError::Conflict("interest already sent".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_interest(&self, id: i64) -> RepoResult<Option<Interest>> {
        let row: Option<InterestRow> = sqlx::query_as("SELECT * FROM interests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn interests(
        &self,
        user_id: UserId,
        direction: InterestDirection,
    ) -> RepoResult<Vec<Interest>> {
        let sql = match direction {
            InterestDirection::Sent => {
                "SELECT * FROM interests WHERE sender_id = $1 ORDER BY created_at DESC, id DESC"
            }
            InterestDirection::Received => {
                "SELECT * FROM interests WHERE receiver_id = $1 ORDER BY created_at DESC, id DESC"
            }
        };
        let rows: Vec<InterestRow> = sqlx::query_as(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn answer_interest(
        &self,
        id: i64,
        status: InterestStatus,
    ) -> RepoResult<Option<Interest>> {
        let row: Option<InterestRow> = sqlx::query_as(
            "UPDATE interests SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(InterestStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn save_message(
        &self,
        sender: UserId,
        receiver: UserId,
        body: &str,
    ) -> RepoResult<Message> {
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO messages (sender_id, receiver_id, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(sender)
        .bind(receiver)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            body: row.body,
            created_at: row.created_at,
        })
    }

    async fn conversation(&self, a: UserId, b: UserId, limit: i64) -> RepoResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM (
                SELECT * FROM messages
                WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)
                ORDER BY created_at DESC, id DESC
                LIMIT $3
            ) recent ORDER BY created_at, id"#,
        )
        .bind(a)
        .bind(b)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Message {
                id: r.id,
                sender_id: r.sender_id,
                receiver_id: r.receiver_id,
                body: r.body,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn block(&self, blocker: UserId, blocked: UserId) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(blocker)
        .bind(blocked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unblock(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker)
            .bind(blocked)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_blocked_between(&self, a: UserId, b: UserId) -> RepoResult<bool> {
        let (blocked,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (
                SELECT 1 FROM blocks
                WHERE (blocker_id = $1 AND blocked_id = $2) OR (blocker_id = $2 AND blocked_id = $1)
            )"#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;
        Ok(blocked)
    }

    async fn blocked_ids(&self, user_id: UserId) -> RepoResult<Vec<UserId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"SELECT blocked_id FROM blocks WHERE blocker_id = $1
            UNION
            SELECT blocker_id FROM blocks WHERE blocked_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_report(&self, report: NewReport) -> RepoResult<Report> {
        let row: ReportRow = sqlx::query_as(
            r#"INSERT INTO reports (reporter_id, reported_id, reason, details)
            VALUES ($1, $2, $3, $4) RETURNING *"#,
        )
        .bind(report.reporter_id)
        .bind(report.reported_id)
        .bind(&report.reason)
        .bind(&report.details)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            "SELECT * FROM reports WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn resolve_report(&self, id: i64) -> RepoResult<Option<Report>> {
        let row: Option<ReportRow> =
            sqlx::query_as("UPDATE reports SET status = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(ReportStatus::Resolved.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn create_story(&self, story: NewStory) -> RepoResult<SuccessStory> {
        let row: StoryRow = sqlx::query_as(
            r#"INSERT INTO success_stories (user_id, partner_name, story, wedding_date)
            VALUES ($1, $2, $3, $4) RETURNING *"#,
        )
        .bind(story.user_id)
        .bind(&story.partner_name)
        .bind(&story.story)
        .bind(story.wedding_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn stories(&self, approved_only: bool) -> RepoResult<Vec<SuccessStory>> {
        let rows: Vec<StoryRow> = sqlx::query_as(
            "SELECT * FROM success_stories WHERE (NOT $1 OR approved) ORDER BY created_at DESC",
        )
        .bind(approved_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn approve_story(&self, id: i64) -> RepoResult<Option<SuccessStory>> {
        let row: Option<StoryRow> = sqlx::query_as(
            "UPDATE success_stories SET approved = true WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
