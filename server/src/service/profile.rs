//! Profile read and write paths, photos, horoscope and privacy settings.
use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::{
    db::repo::{DraftRepository, MasterRepository, ProfileRepository, UserRepository},
    domain::{
        model::{
            Badge, EducationCareer, FamilyDetails, HoroscopeDetails, LocationLifestyle, Photo,
            Preference, Profile, ProfileAggregate, ReferenceLabels, User, UserId, Visibility,
        },
        privacy::{PrivacyOverrides, PrivacySettings, PublicProfile, RedactionPolicy, project},
        wizard::{HoroscopeStep, ProfilePatchRequest, ProfileWrite, WizardStep},
    },
    error::{AppError, AppResult},
};

const ACCEPTED_IMAGES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

/// The owner's unredacted view of their own profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnProfile {
    pub user: User,
    pub profile: Profile,
    pub references: ReferenceLabels,
    pub family: Option<FamilyDetails>,
    pub horoscope: Option<HoroscopeDetails>,
    pub lifestyle: Option<LocationLifestyle>,
    pub career: Option<EducationCareer>,
    pub badge: Badge,
    pub photos: Vec<Photo>,
    pub preference: Option<Preference>,
    pub privacy: PrivacySettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProfileView {
    Own(Box<OwnProfile>),
    Public(Box<PublicProfile>),
}

/// `POST /api/profile/steps` body: one wizard page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCommit {
    #[serde(flatten)]
    pub step: WizardStep,
    #[serde(default)]
    pub complete_wizard: bool,
}

/// An uploaded file as received from the multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    drafts: Arc<dyn DraftRepository>,
    master: Arc<dyn MasterRepository>,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
}

/// Target ids arrive as raw path text and must be positive integers.
pub fn parse_target_id(raw: &str) -> AppResult<UserId> {
    raw.trim()
        .parse::<UserId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::InvalidId)
}

impl ProfileService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        drafts: Arc<dyn DraftRepository>,
        master: Arc<dyn MasterRepository>,
        upload_dir: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            users,
            profiles,
            drafts,
            master,
            upload_dir,
            max_upload_bytes,
        }
    }

    async fn labels(&self, aggregate: &ProfileAggregate) -> AppResult<ReferenceLabels> {
        let keys = aggregate.reference_keys();
        if keys.is_empty() {
            return Ok(ReferenceLabels::default());
        }
        let names = self.master.labels(&keys).await?;
        Ok(ReferenceLabels::from_pairs(
            names.into_iter().map(|((kind, _), name)| (kind, name)),
        ))
    }

    /// Another member's (or an anonymous visitor's) view of `target_raw`.
    #[instrument(
        name = "vivaha.profile.get_public",
        skip(self, caller),
        fields(caller = ?caller.map(|u| u.id))
    )]
    pub async fn get_public(
        &self,
        target_raw: &str,
        caller: Option<&User>,
    ) -> AppResult<ProfileView> {
        let target = parse_target_id(target_raw)?;
        if let Some(owner) = caller.filter(|u| u.id == target) {
            return Ok(ProfileView::Own(Box::new(self.get_own(owner).await?)));
        }

        let user = self
            .users
            .find_public(target)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))?;
        let aggregate = self
            .profiles
            .load(target)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".into()))?;

        match (aggregate.profile.visibility, caller) {
            (Visibility::Hidden, _) => {
                return Err(AppError::Forbidden("this profile is hidden".into()));
            }
            (Visibility::MembersOnly, None) => {
                return Err(AppError::Unauthorized(
                    "sign in to view this profile".into(),
                ));
            }
            _ => {}
        }

        let policy = RedactionPolicy::from_overrides(&aggregate.profile.privacy);
        let references = self.labels(&aggregate).await?;
        debug!(settings = ?policy.settings(), "projecting profile");
        let view = project(user, aggregate, references, &policy, Utc::now().date_naive());
        Ok(ProfileView::Public(Box::new(view)))
    }

    #[instrument(name = "vivaha.profile.get_own", skip_all, fields(user_id = user.id))]
    pub async fn get_own(&self, user: &User) -> AppResult<OwnProfile> {
        let aggregate = self
            .profiles
            .load(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".into()))?;
        let references = self.labels(&aggregate).await?;
        // Names may have changed in the same write; reread the account row.
        let user = self
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))?;
        let privacy = PrivacySettings::resolve(&aggregate.profile.privacy);
        let ProfileAggregate {
            profile,
            family,
            horoscope,
            lifestyle,
            career,
            badge,
            photos,
            preference,
        } = aggregate;
        Ok(OwnProfile {
            user,
            profile,
            references,
            family,
            horoscope,
            lifestyle,
            career,
            badge,
            photos,
            preference,
            privacy,
        })
    }

    async fn commit(
        &self,
        user: &User,
        write: ProfileWrite,
        finished: bool,
    ) -> AppResult<OwnProfile> {
        if !write.is_empty() {
            self.profiles.apply_write(user.id, &write).await?;
            info!(finished, "profile write committed");
        }
        if finished {
            self.drafts.clear(user.id).await?;
        }
        self.get_own(user).await
    }

    /// Flat patch across all wizard fields, committed atomically.
    #[instrument(name = "vivaha.profile.update", skip_all, fields(user_id = user.id))]
    pub async fn update(&self, user: &User, patch: ProfilePatchRequest) -> AppResult<OwnProfile> {
        let finished = patch.complete_wizard;
        let write = patch.into_write(Utc::now().date_naive())?;
        self.commit(user, write, finished).await
    }

    /// Commits one wizard page. The last page, or an explicit flag, finishes the wizard.
    #[instrument(
        name = "vivaha.profile.commit_step",
        skip_all,
        fields(user_id = user.id, step = commit.step.index())
    )]
    pub async fn commit_step(&self, user: &User, commit: StepCommit) -> AppResult<OwnProfile> {
        commit.step.validate(Utc::now().date_naive())?;
        let finished = commit.complete_wizard || commit.step.is_final();
        self.commit(user, commit.step.into_write(), finished).await
    }

    #[instrument(name = "vivaha.profile.upsert_horoscope", skip_all, fields(user_id = user.id))]
    pub async fn upsert_horoscope(
        &self,
        user: &User,
        step: HoroscopeStep,
    ) -> AppResult<Option<HoroscopeDetails>> {
        let write = ProfileWrite {
            horoscope: Some(step),
            ..ProfileWrite::default()
        };
        Ok(self.commit(user, write, false).await?.horoscope)
    }

    #[instrument(name = "vivaha.profile.delete_horoscope", skip_all, fields(user_id = user.id))]
    pub async fn delete_horoscope(&self, user: &User) -> AppResult<()> {
        if !self.profiles.delete_horoscope(user.id).await? {
            return Err(AppError::NotFound("horoscope".into()));
        }
        Ok(())
    }

    /// Lays the toggles in `patch` over the stored ones and returns the result.
    #[instrument(name = "vivaha.profile.update_privacy", skip_all, fields(user_id = user.id))]
    pub async fn update_privacy(
        &self,
        user: &User,
        patch: PrivacyOverrides,
    ) -> AppResult<PrivacySettings> {
        let stored = self
            .profiles
            .load(user.id)
            .await?
            .map(|a| a.profile.privacy)
            .unwrap_or_default();
        let merged = stored.merged_with(&patch);
        self.profiles.set_privacy(user.id, &merged).await?;
        Ok(PrivacySettings::resolve(&merged))
    }

    fn extension_for(&self, upload: &Upload) -> AppResult<&'static str> {
        let declared = upload
            .content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);
        let guessed = || {
            upload
                .file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
        };
        let mime = declared
            .or_else(guessed)
            .ok_or_else(|| AppError::UnsupportedMediaType("unknown".into()))?;
        let essence = mime.essence_str();
        ACCEPTED_IMAGES
            .iter()
            .find(|(accepted, _)| *accepted == essence)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| AppError::UnsupportedMediaType(essence.to_string()))
    }

    #[instrument(
        name = "vivaha.profile.add_photo",
        skip_all,
        fields(user_id = user.id, size = upload.bytes.len())
    )]
    pub async fn add_photo(&self, user: &User, upload: Upload) -> AppResult<Photo> {
        if upload.bytes.is_empty() {
            return Err(AppError::Validation("photo: file is empty".into()));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "photo exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }
        let ext = self.extension_for(&upload)?;

        let mut hasher = Sha256::new();
        hasher.update(user.id.to_be_bytes());
        hasher.update(&upload.bytes);
        let file_name = format!("{}.{ext}", hex::encode(hasher.finalize()));

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| AppError::internal("could not store photo", e))?;
        let path = self.upload_dir.join(&file_name);
        // Identical bytes from the same member map to one file.
        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::internal("could not store photo", e))?;

        let photo = match self
            .profiles
            .add_photo(user.id, &format!("/uploads/{file_name}"))
            .await
        {
            Ok(photo) => photo,
            Err(e) => {
                if !existed {
                    if let Err(io) = tokio::fs::remove_file(&path).await {
                        warn!(error = %io, file = %file_name, "could not remove orphaned photo");
                    }
                }
                return Err(e.into());
            }
        };
        info!(photo_id = photo.id, is_main = photo.is_main, "photo added");
        Ok(photo)
    }

    #[instrument(
        name = "vivaha.profile.delete_photo",
        skip_all,
        fields(user_id = user.id, photo_id = photo_id)
    )]
    pub async fn delete_photo(&self, user: &User, photo_id: i64) -> AppResult<()> {
        let removed = self
            .profiles
            .remove_photo(user.id, photo_id)
            .await?
            .ok_or_else(|| AppError::NotFound("photo".into()))?;

        let still_used = self
            .profiles
            .load(user.id)
            .await?
            .is_some_and(|a| a.photos.iter().any(|p| p.url == removed.url));
        let file = removed
            .url
            .strip_prefix("/uploads/")
            .map(|name| self.upload_dir.join(name));
        if let (false, Some(path)) = (still_used, file) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(error = %e, path = %path.display(), "could not remove photo file");
            }
        }
        info!("photo removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_must_be_positive_integers() {
        assert_eq!(parse_target_id("42").unwrap(), 42);
        assert_eq!(parse_target_id(" 7 ").unwrap(), 7);
        for raw in ["0", "-3", "abc", "", "4.5"] {
            assert!(matches!(parse_target_id(raw), Err(AppError::InvalidId)), "{raw}");
        }
    }

    #[test]
    fn step_commits_flatten_the_tagged_step() {
        let commit: StepCommit = serde_json::from_value(serde_json::json!({
            "step": "preferences",
            "data": { "minAge": 25, "maxAge": 32 },
            "completeWizard": false,
        }))
        .unwrap();
        assert!(commit.step.is_final());
        assert!(!commit.complete_wizard);
    }
}
