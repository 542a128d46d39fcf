use std::collections::HashMap;

use serde::Serialize;

use crate::config::UserAccount;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Resolves a bearer token to the user it belongs to.
pub trait SessionProvider: Send + Sync + 'static {
    fn current(&self, token: &str) -> Option<Identity>;
}

/// Fixed token table from `[[auth.users]]`.
#[derive(Debug, Default)]
pub struct StaticTokenSessions {
    by_token: HashMap<String, Identity>,
}

impl StaticTokenSessions {
    pub fn new(users: &[UserAccount]) -> Self {
        let by_token = users
            .iter()
            .filter(|u| !u.token.trim().is_empty())
            .map(|u| {
                (
                    u.token.clone(),
                    Identity {
                        user_id: u.user_id.clone(),
                        email: u.email.clone(),
                        name: u.name.clone(),
                    },
                )
            })
            .collect();
        Self { by_token }
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl SessionProvider for StaticTokenSessions {
    fn current(&self, token: &str) -> Option<Identity> {
        self.by_token.get(token).cloned()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
