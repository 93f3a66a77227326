use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use system::{decode_claims, Claims};

/// Who the stored token says we are. Display only: nothing here is
/// verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

impl From<Claims> for UserInfo {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        }
    }
}

#[derive(Debug, Default)]
pub struct AuthState {
    token: Option<String>,
}

pub type SharedAuth = Arc<RwLock<AuthState>>;

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedAuth {
        Arc::new(RwLock::new(self))
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn clear(&mut self) {
        if self.token.take().is_some() {
            log::info!("Stored credential cleared");
        }
    }

    pub fn claims(&self) -> Option<Claims> {
        let token = self.token.as_ref()?;
        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                log::debug!("Stored token is unreadable: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(now_secs())
    }

    pub fn is_authenticated_at(&self, now_secs: u64) -> bool {
        self.claims()
            .map(|claims| claims.is_valid_at(now_secs))
            .unwrap_or(false)
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.claims().map(UserInfo::from)
    }
}
