//! Operation key space
//!
//! Documented operation keys, grouped by category. Keys follow the
//! `category:action` convention. The registry accepts any string, so these
//! constants are a shared vocabulary rather than a closed set.
//!
//! ```
//! use scroll_common::loading::keys::{self, KeyCategory};
//!
//! assert_eq!(keys::courses::ENROLL, "course:enroll");
//! assert_eq!(KeyCategory::of(keys::auth::LOGIN), KeyCategory::Auth);
//! assert!(keys::is_documented_key("file:upload"));
//! ```

use serde::{Deserialize, Serialize};

/// Authentication
pub mod auth {
    pub const LOGIN: &str = "auth:login";
    pub const LOGOUT: &str = "auth:logout";
    pub const SIGNUP: &str = "auth:signup";
    pub const RESET_PASSWORD: &str = "auth:reset_password";
    pub const REFRESH_SESSION: &str = "auth:refresh_session";
}

/// Courses, lessons and degree programs
pub mod courses {
    pub const LOAD: &str = "course:load";
    pub const ENROLL: &str = "course:enroll";
    pub const UNENROLL: &str = "course:unenroll";
    pub const COMPLETE_LESSON: &str = "course:complete_lesson";
    pub const UPDATE_PROGRESS: &str = "course:update_progress";
    pub const LOAD_DEGREE: &str = "course:load_degree";
}

/// Assignments and grading
pub mod assignments {
    pub const LOAD: &str = "assignment:load";
    pub const SUBMIT: &str = "assignment:submit";
    pub const GRADE: &str = "assignment:grade";
}

/// Wallet, points and payments
pub mod payments {
    pub const PROCESS: &str = "payment:process";
    pub const LOAD_WALLET: &str = "payment:load_wallet";
    pub const TRANSFER: &str = "payment:transfer";
    pub const REDEEM: &str = "payment:redeem";
}

/// Community posts and study groups
pub mod community {
    pub const LOAD_POSTS: &str = "community:load_posts";
    pub const CREATE_POST: &str = "community:create_post";
    pub const COMMENT: &str = "community:comment";
    pub const LIKE: &str = "community:like";
    pub const JOIN_GROUP: &str = "community:join_group";
}

/// Profile and settings
pub mod profile {
    pub const LOAD: &str = "profile:load";
    pub const UPDATE: &str = "profile:update";
    pub const UPLOAD_AVATAR: &str = "profile:upload_avatar";
    pub const UPDATE_SETTINGS: &str = "profile:update_settings";
}

/// AI-assisted features
pub mod ai {
    pub const TUTOR_CHAT: &str = "ai:tutor_chat";
    pub const GENERATE_LECTURE: &str = "ai:generate_lecture";
    pub const TRANSCRIBE: &str = "ai:transcribe";
    pub const TEXT_TO_SPEECH: &str = "ai:text_to_speech";
}

/// Operations that do not belong to a feature area
pub mod generic {
    pub const FILE_UPLOAD: &str = "file:upload";
    pub const DATA_LOAD: &str = "data:load";
    pub const DATA_SAVE: &str = "data:save";
    pub const DATA_DELETE: &str = "data:delete";
}

/// Every documented key, in category order
pub const ALL_KEYS: &[&str] = &[
    auth::LOGIN,
    auth::LOGOUT,
    auth::SIGNUP,
    auth::RESET_PASSWORD,
    auth::REFRESH_SESSION,
    courses::LOAD,
    courses::ENROLL,
    courses::UNENROLL,
    courses::COMPLETE_LESSON,
    courses::UPDATE_PROGRESS,
    courses::LOAD_DEGREE,
    assignments::LOAD,
    assignments::SUBMIT,
    assignments::GRADE,
    payments::PROCESS,
    payments::LOAD_WALLET,
    payments::TRANSFER,
    payments::REDEEM,
    community::LOAD_POSTS,
    community::CREATE_POST,
    community::COMMENT,
    community::LIKE,
    community::JOIN_GROUP,
    profile::LOAD,
    profile::UPDATE,
    profile::UPLOAD_AVATAR,
    profile::UPDATE_SETTINGS,
    ai::TUTOR_CHAT,
    ai::GENERATE_LECTURE,
    ai::TRANSCRIBE,
    ai::TEXT_TO_SPEECH,
    generic::FILE_UPLOAD,
    generic::DATA_LOAD,
    generic::DATA_SAVE,
    generic::DATA_DELETE,
];

/// Feature area an operation key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCategory {
    Auth,
    Courses,
    Assignments,
    Payments,
    Community,
    Profile,
    Ai,
    Generic,
    /// Prefix outside the documented key space
    Unknown,
}

impl KeyCategory {
    /// Classify a key by its prefix (the part before the first `:`)
    pub fn of(key: &str) -> Self {
        let prefix = key.split_once(':').map_or(key, |(prefix, _)| prefix);
        match prefix {
            "auth" => KeyCategory::Auth,
            "course" => KeyCategory::Courses,
            "assignment" => KeyCategory::Assignments,
            "payment" => KeyCategory::Payments,
            "community" => KeyCategory::Community,
            "profile" => KeyCategory::Profile,
            "ai" => KeyCategory::Ai,
            "file" | "data" => KeyCategory::Generic,
            _ => KeyCategory::Unknown,
        }
    }

    /// Documented keys in this category
    pub fn keys(self) -> impl Iterator<Item = &'static str> {
        ALL_KEYS
            .iter()
            .copied()
            .filter(move |key| KeyCategory::of(key) == self)
    }
}

/// True if `key` appears in the documented key space
pub fn is_documented_key(key: &str) -> bool {
    ALL_KEYS.contains(&key)
}
