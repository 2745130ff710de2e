//! Process-local backend used when no database URL is configured, and by the
//! test suite.
//!
//! The profile write runs against a cloned snapshot of the tables which is
//! swapped in only after every step succeeded, giving the same all-or-nothing
//! behaviour as the Postgres transaction. [`MemoryStore::fail_on`] makes a
//! chosen table fail so rollback can be exercised.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::repo::{
    DraftRepository, InteractionRepository, MasterRepository, ProfileRepository, RepoError,
    RepoResult, UserRepository,
};
use crate::domain::{
    model::{
        Badge, Candidate, CandidateQuery, Draft, EducationCareer, FamilyDetails,
        HoroscopeDetails, Interest, InterestDirection, InterestStatus, LocationLifestyle,
        MasterEntry, MasterKind, Message, NewReport, NewStory, NewUser, Photo, Preference,
        Profile, ProfileAggregate, PublicUser, Report, ReportStatus, SuccessStory, User, UserId,
        Visibility,
    },
    privacy::PrivacyOverrides,
    wizard::{ProfileWrite, WriteTable},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    /// Keyed by user id; one profile per user.
    profiles: BTreeMap<UserId, Profile>,
    /// Satellites keyed by profile id.
    family: HashMap<i64, FamilyDetails>,
    horoscope: HashMap<i64, HoroscopeDetails>,
    lifestyle: HashMap<i64, LocationLifestyle>,
    career: HashMap<i64, EducationCareer>,
    preferences: HashMap<i64, Preference>,
    badges: HashMap<i64, Badge>,
    /// photo id -> (profile id, photo)
    photos: BTreeMap<i64, (i64, Photo)>,
    drafts: HashMap<UserId, Draft>,
    master: BTreeMap<MasterKind, Vec<MasterEntry>>,
    interests: BTreeMap<i64, Interest>,
    messages: Vec<Message>,
    blocks: BTreeSet<(UserId, UserId)>,
    reports: BTreeMap<i64, Report>,
    stories: BTreeMap<i64, SuccessStory>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_profile(&mut self, user_id: UserId) -> RepoResult<&mut Profile> {
        if !self.users.contains_key(&user_id) {
            return Err(RepoError::NotFound("user"));
        }
        if !self.profiles.contains_key(&user_id) {
            let id = self.next_id();
            self.profiles
                .insert(user_id, Profile::empty(id, user_id, Utc::now()));
        }
        self.profiles
            .get_mut(&user_id)
            .ok_or(RepoError::NotFound("profile"))
    }

    fn photos_of(&self, profile_id: i64) -> Vec<Photo> {
        let mut photos: Vec<Photo> = self
            .photos
            .values()
            .filter(|(owner, _)| *owner == profile_id)
            .map(|(_, photo)| photo.clone())
            .collect();
        photos.sort_by_key(|p| (p.sort_order, p.id));
        photos
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_on: Mutex<Option<WriteTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following profile write fail when it reaches `table`.
    pub fn fail_on(&self, table: Option<WriteTable>) {
        *self.fail_on.lock() = table;
    }

    pub fn insert_master(
        &self,
        kind: MasterKind,
        name: &str,
        parent_id: Option<i64>,
        sort_order: i32,
        is_active: bool,
    ) -> i64 {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        tables.master.entry(kind).or_default().push(MasterEntry {
            id,
            name: name.to_string(),
            parent_id,
            value: None,
            sort_order,
            is_active,
        });
        id
    }

    fn check(&self, table: WriteTable) -> RepoResult<()> {
        match *self.fail_on.lock() {
            Some(failing) if failing == table => Err(RepoError::WriteFailed {
                table,
                message: "injected failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new_user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write();
        let taken = tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email));
        if taken {
            return Err(RepoError::Conflict(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }
        let id = tables.next_id();
        let user = User {
            id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            gender: new_user.gender,
            mobile: new_user.mobile,
            role: new_user.role,
            created_at: Utc::now(),
            deleted_at: None,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_public(&self, id: UserId) -> RepoResult<Option<PublicUser>> {
        Ok(self
            .tables
            .read()
            .users
            .get(&id)
            .filter(|u| u.is_active())
            .map(User::public))
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let mut tables = self.tables.write();
        let user = tables.users.get_mut(&id).ok_or(RepoError::NotFound("user"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn soft_delete(&self, id: UserId) -> RepoResult<bool> {
        let mut tables = self.tables.write();
        match tables.users.get_mut(&id) {
            Some(user) if user.deleted_at.is_none() => {
                user.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn load(&self, user_id: UserId) -> RepoResult<Option<ProfileAggregate>> {
        let tables = self.tables.read();
        let Some(profile) = tables.profiles.get(&user_id) else {
            return Ok(None);
        };
        let pid = profile.id;
        Ok(Some(ProfileAggregate {
            profile: profile.clone(),
            family: tables.family.get(&pid).cloned(),
            horoscope: tables.horoscope.get(&pid).cloned(),
            lifestyle: tables.lifestyle.get(&pid).cloned(),
            career: tables.career.get(&pid).cloned(),
            badge: tables.badges.get(&pid).copied().unwrap_or_default(),
            photos: tables.photos_of(pid),
            preference: tables.preferences.get(&pid).cloned(),
        }))
    }

    async fn apply_write(&self, user_id: UserId, write: &ProfileWrite) -> RepoResult<()> {
        let mut guard = self.tables.write();
        let mut tx = guard.clone();
        let now = Utc::now();

        if let Some(patch) = &write.user {
            self.check(WriteTable::Users)?;
            let user = tx.users.get_mut(&user_id).ok_or(RepoError::NotFound("user"))?;
            patch.apply(user);
        }

        if write.touches_profile() {
            self.check(WriteTable::Profiles)?;
            let profile = tx.ensure_profile(user_id)?;
            if let Some(patch) = &write.profile {
                patch.apply(profile);
            }
            profile.updated_at = now;
            let pid = profile.id;

            if let Some(patch) = &write.family {
                self.check(WriteTable::FamilyDetails)?;
                patch.apply(tx.family.entry(pid).or_default());
            }
            if let Some(patch) = &write.horoscope {
                self.check(WriteTable::HoroscopeDetails)?;
                patch.apply(tx.horoscope.entry(pid).or_default());
            }
            if let Some(patch) = &write.lifestyle {
                self.check(WriteTable::LocationLifestyle)?;
                patch.apply(tx.lifestyle.entry(pid).or_default());
            }
            if let Some(patch) = &write.career {
                self.check(WriteTable::EducationCareer)?;
                patch.apply(tx.career.entry(pid).or_default());
            }
            if let Some(patch) = &write.preference {
                self.check(WriteTable::Preferences)?;
                patch.apply(tx.preferences.entry(pid).or_default());
            }
        }

        *guard = tx;
        Ok(())
    }

    async fn set_privacy(&self, user_id: UserId, overrides: &PrivacyOverrides) -> RepoResult<()> {
        let mut tables = self.tables.write();
        let profile = tables.ensure_profile(user_id)?;
        profile.privacy = overrides.clone();
        profile.updated_at = Utc::now();
        Ok(())
    }

    async fn add_photo(&self, user_id: UserId, url: &str) -> RepoResult<Photo> {
        let mut tables = self.tables.write();
        let pid = tables.ensure_profile(user_id)?.id;
        let existing = tables.photos_of(pid);
        let id = tables.next_id();
        let photo = Photo {
            id,
            url: url.to_string(),
            is_main: existing.is_empty(),
            sort_order: existing.last().map_or(0, |p| p.sort_order + 1),
            created_at: Utc::now(),
        };
        tables.photos.insert(id, (pid, photo.clone()));
        Ok(photo)
    }

    async fn remove_photo(&self, user_id: UserId, photo_id: i64) -> RepoResult<Option<Photo>> {
        let mut tables = self.tables.write();
        let Some(pid) = tables.profiles.get(&user_id).map(|p| p.id) else {
            return Ok(None);
        };
        match tables.photos.get(&photo_id) {
            Some((owner, _)) if *owner == pid => {}
            _ => return Ok(None),
        }
        let Some((_, removed)) = tables.photos.remove(&photo_id) else {
            return Ok(None);
        };
        if removed.is_main {
            let next = tables.photos_of(pid).first().map(|p| p.id);
            if let Some((_, photo)) = next.and_then(|id| tables.photos.get_mut(&id)) {
                photo.is_main = true;
            }
        }
        Ok(Some(removed))
    }

    async fn delete_horoscope(&self, user_id: UserId) -> RepoResult<bool> {
        let mut tables = self.tables.write();
        let Some(pid) = tables.profiles.get(&user_id).map(|p| p.id) else {
            return Ok(false);
        };
        Ok(tables.horoscope.remove(&pid).is_some())
    }

    async fn candidates(&self, query: &CandidateQuery) -> RepoResult<Vec<Candidate>> {
        let tables = self.tables.read();
        let candidates = tables
            .profiles
            .values()
            .filter(|p| p.user_id != query.viewer && p.visibility != Visibility::Hidden)
            .filter(|p| !query.exclude.contains(&p.user_id))
            .filter_map(|p| {
                let user = tables.users.get(&p.user_id)?;
                (user.is_active() && user.gender != query.viewer_gender).then(|| Candidate {
                    user_id: user.id,
                    first_name: user.first_name.clone(),
                    gender: user.gender,
                    date_of_birth: p.date_of_birth,
                    visibility: p.visibility,
                    religion_id: p.religion_id,
                    city_id: tables.lifestyle.get(&p.id).and_then(|l| l.city_id),
                    main_photo: tables
                        .photos_of(p.id)
                        .into_iter()
                        .find(|ph| ph.is_main)
                        .map(|ph| ph.url),
                })
            })
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(candidates)
    }
}

#[async_trait]
impl DraftRepository for MemoryStore {
    async fn get(&self, user_id: UserId) -> RepoResult<Option<Draft>> {
        Ok(self.tables.read().drafts.get(&user_id).cloned())
    }

    async fn save(&self, user_id: UserId, step_data: &Value, last_step: i32) -> RepoResult<Draft> {
        let draft = Draft {
            step_data: step_data.clone(),
            last_step,
            updated_at: Some(Utc::now()),
        };
        self.tables.write().drafts.insert(user_id, draft.clone());
        Ok(draft)
    }

    async fn clear(&self, user_id: UserId) -> RepoResult<()> {
        self.tables.write().drafts.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl MasterRepository for MemoryStore {
    async fn list(&self, kind: MasterKind, parent_id: Option<i64>) -> RepoResult<Vec<MasterEntry>> {
        let tables = self.tables.read();
        let mut rows: Vec<MasterEntry> = tables
            .master
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|e| e.is_active)
            .filter(|e| parent_id.is_none() || e.parent_id == parent_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn labels(
        &self,
        keys: &[(MasterKind, i64)],
    ) -> RepoResult<HashMap<(MasterKind, i64), String>> {
        let tables = self.tables.read();
        Ok(keys
            .iter()
            .filter_map(|&(kind, id)| {
                tables
                    .master
                    .get(&kind)?
                    .iter()
                    .find(|e| e.id == id)
                    .map(|e| ((kind, id), e.name.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl InteractionRepository for MemoryStore {
    async fn create_interest(&self, sender: UserId, receiver: UserId) -> RepoResult<Interest> {
        let mut tables = self.tables.write();
        let duplicate = tables
            .interests
            .values()
            .any(|i| i.sender_id == sender && i.receiver_id == receiver);
        if duplicate {
            return Err(RepoError::Conflict("interest already sent".to_string()));
        }
        let now = Utc::now();
        let id = tables.next_id();
        let interest = Interest {
            id,
            sender_id: sender,
            receiver_id: receiver,
            status: InterestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.interests.insert(id, interest.clone());
        Ok(interest)
    }

    async fn find_interest(&self, id: i64) -> RepoResult<Option<Interest>> {
        Ok(self.tables.read().interests.get(&id).cloned())
    }

    async fn interests(
        &self,
        user_id: UserId,
        direction: InterestDirection,
    ) -> RepoResult<Vec<Interest>> {
        let tables = self.tables.read();
        let mut rows: Vec<Interest> = tables
            .interests
            .values()
            .filter(|i| match direction {
                InterestDirection::Sent => i.sender_id == user_id,
                InterestDirection::Received => i.receiver_id == user_id,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn answer_interest(
        &self,
        id: i64,
        status: InterestStatus,
    ) -> RepoResult<Option<Interest>> {
        let mut tables = self.tables.write();
        let Some(interest) = tables
            .interests
            .get_mut(&id)
            .filter(|i| i.status == InterestStatus::Pending)
        else {
            return Ok(None);
        };
        interest.status = status;
        interest.updated_at = Utc::now();
        Ok(Some(interest.clone()))
    }

    async fn save_message(
        &self,
        sender: UserId,
        receiver: UserId,
        body: &str,
    ) -> RepoResult<Message> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let message = Message {
            id,
            sender_id: sender,
            receiver_id: receiver,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn conversation(&self, a: UserId, b: UserId, limit: i64) -> RepoResult<Vec<Message>> {
        let tables = self.tables.read();
        let thread: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect();
        let skip = thread.len().saturating_sub(limit.max(0) as usize);
        Ok(thread.into_iter().skip(skip).collect())
    }

    async fn block(&self, blocker: UserId, blocked: UserId) -> RepoResult<()> {
        self.tables.write().blocks.insert((blocker, blocked));
        Ok(())
    }

    async fn unblock(&self, blocker: UserId, blocked: UserId) -> RepoResult<bool> {
        Ok(self.tables.write().blocks.remove(&(blocker, blocked)))
    }

    async fn is_blocked_between(&self, a: UserId, b: UserId) -> RepoResult<bool> {
        let tables = self.tables.read();
        Ok(tables.blocks.contains(&(a, b)) || tables.blocks.contains(&(b, a)))
    }

    async fn blocked_ids(&self, user_id: UserId) -> RepoResult<Vec<UserId>> {
        let tables = self.tables.read();
        let ids: BTreeSet<UserId> = tables
            .blocks
            .iter()
            .filter_map(|&(blocker, blocked)| {
                if blocker == user_id {
                    Some(blocked)
                } else if blocked == user_id {
                    Some(blocker)
                } else {
                    None
                }
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn create_report(&self, report: NewReport) -> RepoResult<Report> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let report = Report {
            id,
            reporter_id: report.reporter_id,
            reported_id: report.reported_id,
            reason: report.reason,
            details: report.details,
            status: ReportStatus::Open,
            created_at: Utc::now(),
        };
        tables.reports.insert(id, report.clone());
        Ok(report)
    }

    async fn reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>> {
        Ok(self
            .tables
            .read()
            .reports
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn resolve_report(&self, id: i64) -> RepoResult<Option<Report>> {
        let mut tables = self.tables.write();
        Ok(tables.reports.get_mut(&id).map(|r| {
            r.status = ReportStatus::Resolved;
            r.clone()
        }))
    }

    async fn create_story(&self, story: NewStory) -> RepoResult<SuccessStory> {
        let mut tables = self.tables.write();
        let id = tables.next_id();
        let story = SuccessStory {
            id,
            user_id: story.user_id,
            partner_name: story.partner_name,
            story: story.story,
            wedding_date: story.wedding_date,
            approved: false,
            created_at: Utc::now(),
        };
        tables.stories.insert(id, story.clone());
        Ok(story)
    }

    async fn stories(&self, approved_only: bool) -> RepoResult<Vec<SuccessStory>> {
        Ok(self
            .tables
            .read()
            .stories
            .values()
            .filter(|s| !approved_only || s.approved)
            .cloned()
            .collect())
    }

    async fn approve_story(&self, id: i64) -> RepoResult<Option<SuccessStory>> {
        let mut tables = self.tables.write();
        Ok(tables.stories.get_mut(&id).map(|s| {
            s.approved = true;
            s.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{
        model::{Gender, Role},
        wizard::{FamilyStep, HoroscopeStep, ProfileCorePatch},
    };

    fn store_with_user() -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        let user = tokio_test::block_on(store.create(NewUser {
            email: "a@example.com".into(),
            password_hash: "x".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            gender: Gender::Female,
            mobile: None,
            role: Role::User,
        }))
        .unwrap();
        (store, user.id)
    }

    #[test]
    fn failed_write_leaves_tables_untouched() {
        let (store, uid) = store_with_user();
        let write = ProfileWrite {
            profile: Some(ProfileCorePatch {
                height_cm: Some(Some(160)),
                ..Default::default()
            }),
            family: Some(FamilyStep {
                family_type: Some(Some("Nuclear".into())),
                ..Default::default()
            }),
            horoscope: Some(HoroscopeStep {
                rashi: Some(Some("Tula".into())),
                ..Default::default()
            }),
            ..Default::default()
        };

        store.fail_on(Some(WriteTable::HoroscopeDetails));
        let err = tokio_test::block_on(store.apply_write(uid, &write)).unwrap_err();
        assert!(matches!(err, RepoError::WriteFailed { table: WriteTable::HoroscopeDetails, .. }));
        assert!(tokio_test::block_on(store.load(uid)).unwrap().is_none());

        store.fail_on(None);
        tokio_test::block_on(store.apply_write(uid, &write)).unwrap();
        let agg = tokio_test::block_on(store.load(uid)).unwrap().unwrap();
        assert_eq!(agg.profile.height_cm, Some(160));
        assert_eq!(agg.horoscope.unwrap().rashi.as_deref(), Some("Tula"));
    }

    #[test]
    fn clearing_a_draft_removes_it() {
        let (store, uid) = store_with_user();
        tokio_test::block_on(store.save(uid, &json!({"a": 1}), 4)).unwrap();
        tokio_test::block_on(store.clear(uid)).unwrap();
        let draft = tokio_test::block_on(DraftRepository::get(&store, uid)).unwrap();
        assert!(draft.is_none());
    }

    #[test]
    fn interests_are_answered_once() {
        let (store, uid) = store_with_user();
        let interest = tokio_test::block_on(store.create_interest(uid + 100, uid)).unwrap();

        let accepted =
            tokio_test::block_on(store.answer_interest(interest.id, InterestStatus::Accepted))
                .unwrap()
                .unwrap();
        assert_eq!(accepted.status, InterestStatus::Accepted);

        let again =
            tokio_test::block_on(store.answer_interest(interest.id, InterestStatus::Declined))
                .unwrap();
        assert!(again.is_none());
        let stored = tokio_test::block_on(store.find_interest(interest.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InterestStatus::Accepted);

        let missing =
            tokio_test::block_on(store.answer_interest(9999, InterestStatus::Accepted)).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn removing_main_photo_promotes_next() {
        let (store, uid) = store_with_user();
        let first = tokio_test::block_on(store.add_photo(uid, "/uploads/1.jpg")).unwrap();
        let second = tokio_test::block_on(store.add_photo(uid, "/uploads/2.jpg")).unwrap();
        assert!(first.is_main);
        assert!(!second.is_main);

        tokio_test::block_on(store.remove_photo(uid, first.id)).unwrap().unwrap();
        let agg = tokio_test::block_on(store.load(uid)).unwrap().unwrap();
        assert_eq!(agg.photos.len(), 1);
        assert!(agg.photos[0].is_main);
    }
}
