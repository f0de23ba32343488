//! User identity lookup used by auto-populated user properties

use std::sync::RwLock;

use crate::value::User;

/// Source of the identity of the user making the current request
pub trait UserService: Send + Sync {
    fn current_user(&self) -> Option<User>;
}

/// Nobody is ever signed in
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousUsers;

impl UserService for AnonymousUsers {
    fn current_user(&self) -> Option<User> {
        None
    }
}

/// A user set explicitly, for tests and single-user tools
#[derive(Debug, Default)]
pub struct StaticUsers {
    current: RwLock<Option<User>>,
}

impl StaticUsers {
    pub fn new(user: Option<User>) -> Self {
        Self {
            current: RwLock::new(user),
        }
    }

    pub fn sign_in(&self, user: User) {
        if let Ok(mut current) = self.current.write() {
            *current = Some(user);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
    }
}

impl UserService for StaticUsers {
    fn current_user(&self) -> Option<User> {
        self.current.read().ok().and_then(|current| current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_users() {
        let users = StaticUsers::new(None);
        assert!(users.current_user().is_none());

        users.sign_in(User::new("ann@example.com", "example.com").unwrap());
        assert_eq!(users.current_user().unwrap().email(), "ann@example.com");

        users.sign_out();
        assert!(users.current_user().is_none());
        assert!(AnonymousUsers.current_user().is_none());
    }
}
