//! Authentication context backed by configuration.

use std::sync::RwLock;

use super::AuthContext;
use crate::domain::UserId;

/// Holds the signed-in user, if any.
///
/// The user can change at runtime (sign-in, sign-out); readers always see
/// the latest value.
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: RwLock<Option<UserId>>,
}

impl StaticAuth {
    pub fn new(user: Option<UserId>) -> Self {
        Self {
            user: RwLock::new(user.filter(|u| !u.trim().is_empty())),
        }
    }

    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self::new(Some(user.into()))
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn sign_in(&self, user: impl Into<UserId>) {
        self.set(Some(user.into()));
    }

    pub fn sign_out(&self) {
        self.set(None);
    }

    fn set(&self, user: Option<UserId>) {
        match self.user.write() {
            Ok(mut slot) => *slot = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}

impl AuthContext for StaticAuth {
    fn current_user(&self) -> Option<UserId> {
        match self.user.read() {
            Ok(user) => user.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_user_is_signed_out() {
        assert_eq!(StaticAuth::new(Some("  ".to_string())).current_user(), None);
    }

    #[test]
    fn test_sign_in_and_out() {
        let auth = StaticAuth::signed_out();
        assert_eq!(auth.current_user(), None);

        auth.sign_in("user-1");
        assert_eq!(auth.current_user().as_deref(), Some("user-1"));

        auth.sign_out();
        assert_eq!(auth.current_user(), None);
    }
}
