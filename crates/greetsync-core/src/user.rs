// ── Current user ──
//
// The hydrated profile of the signed-in user. Only meaningful while the
// session holds credentials: once the tokens are gone (logout, failed
// refresh) the cached profile is treated as absent.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use greetsync_api::Session;

use crate::model::User;

pub struct CurrentUser {
    user: ArcSwapOption<User>,
    session: Arc<Session>,
}

impl CurrentUser {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            user: ArcSwapOption::empty(),
            session,
        }
    }

    /// The hydrated user, if the session is still authenticated.
    pub fn get(&self) -> Option<Arc<User>> {
        if !self.session.is_authenticated() {
            return None;
        }
        self.user.load_full()
    }

    pub fn is_hydrated(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.user.store(Some(Arc::clone(&user)));
        user
    }

    pub fn clear(&self) {
        self.user.store(None);
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("user", &self.get().map(|u| u.id.clone()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use greetsync_api::MemoryTokenStorage;

    use super::*;

    #[test]
    fn user_disappears_with_the_session() {
        let session = Arc::new(Session::new(MemoryTokenStorage::with_tokens("a", "r")));
        let current = CurrentUser::new(Arc::clone(&session));
        assert!(!current.is_hydrated());

        current.set(User {
            id: "1".into(),
            ..User::default()
        });
        assert!(current.is_hydrated());

        session.clear_credentials();
        assert!(current.get().is_none());
    }
}
