pub mod auth;
pub mod draft;
pub mod master;
pub mod matches;
pub mod messages;
pub mod moderation;
pub mod profile;

pub use auth::AuthService;
pub use draft::DraftService;
pub use master::MasterService;
pub use matches::MatchService;
pub use messages::MessageService;
pub use moderation::ModerationService;
pub use profile::ProfileService;
