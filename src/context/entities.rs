//! User, canary and webhook frames set once the dispatcher resolves them.
use crate::models::{Canary, WebHook};
use crate::services::auth::UserInfo;

use super::{Context, ContextValue, FrameKind};

pub const USER_KEY: &str = "auth.user";
pub const USER_NAME_KEY: &str = "auth.user.name";
pub const CANARY_KEY: &str = "canary";
pub const CANARY_ID_KEY: &str = "canary.id";
pub const HOOK_KEY: &str = "webhook";
pub const HOOK_ID_KEY: &str = "webhook.id";

pub(super) fn user_value(user: &UserInfo, key: &str) -> Option<ContextValue> {
    match key {
        USER_KEY => Some(ContextValue::User(user.clone())),
        USER_NAME_KEY => Some(ContextValue::Str(user.name.clone())),
        _ => None,
    }
}

impl Context {
    pub fn with_user(&self, user: UserInfo) -> Self {
        self.push(FrameKind::User(user))
    }

    pub fn user(&self) -> Option<UserInfo> {
        match self.value(USER_KEY) {
            Some(ContextValue::User(u)) => Some(u),
            _ => None,
        }
    }

    pub fn with_canary(&self, canary: Canary) -> Self {
        self.push(FrameKind::Canary(canary))
    }

    pub fn canary(&self) -> Option<Canary> {
        match self.value(CANARY_KEY) {
            Some(ContextValue::Canary(c)) => Some(c),
            _ => None,
        }
    }

    pub fn with_hook(&self, hook: WebHook) -> Self {
        self.push(FrameKind::Hook(hook))
    }

    pub fn hook(&self) -> Option<WebHook> {
        match self.value(HOOK_KEY) {
            Some(ContextValue::Hook(h)) => Some(h),
            _ => None,
        }
    }
}
