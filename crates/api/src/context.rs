use tally_core::UserId;

/// Authenticated user context for a request.
///
/// Inserted by the auth middleware; present on every protected route. The
/// core trusts this identity as given (the session token was resolved
/// upstream).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
