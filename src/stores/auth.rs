use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::ids::IdGenerator;
use crate::model::{ProfileChanges, PublicUser, Registration, StoredUser};
use crate::storage::{
    PendingWrite, Storage, USERS_COLLECTION_KEY, USER_DATA_KEY, USER_TOKEN_KEY,
};
use crate::stores::Mutation;

const HASH_SCHEME: &str = "sha256";

/// Local accounts and the current session.
///
/// Accounts live in `usersCollection`; the session is `userToken` plus
/// `userData` (the public view of the signed-in user).
pub struct AuthStore {
    user: Option<PublicUser>,
    token: Option<String>,
    last_error: Option<String>,
    hydrated: bool,
    storage: Storage,
    ids: IdGenerator,
}

impl AuthStore {
    pub fn new(storage: Storage, ids: IdGenerator) -> Self {
        Self {
            user: None,
            token: None,
            last_error: None,
            hydrated: false,
            storage,
            ids,
        }
    }

    pub fn user(&self) -> Option<&PublicUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    /// Restores the session. Both the token and the user must be present.
    pub async fn load_auth_data(&mut self) -> bool {
        let token: Option<String> = self.storage.load(USER_TOKEN_KEY).await;
        let user: Option<PublicUser> = self.storage.load(USER_DATA_KEY).await;
        let restored = match (token, user) {
            (Some(token), Some(user)) => {
                self.token = Some(token);
                self.user = Some(user);
                true
            }
            _ => false,
        };
        self.hydrated = true;
        restored
    }

    pub async fn register(
        &mut self,
        registration: Registration,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let result = self.try_register(registration).await;
        self.record(result)
    }

    async fn try_register(
        &mut self,
        registration: Registration,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let email = registration.email.trim().to_string();
        if email.is_empty() {
            return Err(AppError::InvalidInput("email is required".to_string()));
        }
        if registration.password.is_empty() {
            return Err(AppError::InvalidInput("password is required".to_string()));
        }

        let mut users = self.users().await;
        if users.iter().any(|user| user.email == email) {
            return Err(AppError::Conflict(format!(
                "a user with email {email} already exists"
            )));
        }
        for user in &users {
            self.ids.observe(user.id);
        }

        let user = StoredUser {
            id: self.ids.next(),
            name: registration.name,
            email,
            created_at: chrono::Utc::now(),
            bio: registration.bio,
            password_hash: hash_password(&registration.password),
        };
        users.push(user.clone());
        let saved = self.storage.save(USERS_COLLECTION_KEY, &users);
        let session = self.start_session(&user);
        info!(user_id = user.id, "user registered");
        Ok(Mutation::new(session.value, saved.and(session.persisted)))
    }

    pub async fn login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let result = self.try_login(email, password).await;
        self.record(result)
    }

    async fn try_login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let email = email.trim();
        let mut users = self.users().await;
        let Some(user) = users.iter_mut().find(|user| user.email == email) else {
            return Err(AppError::not_found("user", email));
        };

        let persisted = match verify_password(&user.password_hash, password) {
            Verdict::Mismatch => {
                return Err(AppError::InvalidInput("wrong password".to_string()));
            }
            Verdict::Match => PendingWrite::done(),
            Verdict::LegacyMatch => {
                user.password_hash = hash_password(password);
                info!(user_id = user.id, "upgraded plaintext password");
                self.storage.save(USERS_COLLECTION_KEY, &users)
            }
        };

        let user = users
            .iter()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| AppError::not_found("user", email))?;
        let session = self.start_session(&user);
        info!(user_id = user.id, "user logged in");
        Ok(Mutation::new(session.value, persisted.and(session.persisted)))
    }

    pub fn logout(&mut self) -> PendingWrite {
        self.user = None;
        self.token = None;
        self.last_error = None;
        self.storage
            .remove(USER_TOKEN_KEY)
            .and(self.storage.remove(USER_DATA_KEY))
    }

    pub async fn update_profile(
        &mut self,
        changes: ProfileChanges,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let result = self.try_update_profile(changes).await;
        self.record(result)
    }

    async fn try_update_profile(
        &mut self,
        changes: ProfileChanges,
    ) -> Result<Mutation<PublicUser>, AppError> {
        let current_id = self
            .user
            .as_ref()
            .map(|user| user.id)
            .ok_or(AppError::Unauthenticated)?;
        let mut users = self.users().await;

        if let Some(email) = changes.email.as_deref().map(str::trim) {
            if email.is_empty() {
                return Err(AppError::InvalidInput("email cannot be empty".to_string()));
            }
            if users
                .iter()
                .any(|user| user.email == email && user.id != current_id)
            {
                return Err(AppError::Conflict(format!(
                    "a user with email {email} already exists"
                )));
            }
        }

        let user = users
            .iter_mut()
            .find(|user| user.id == current_id)
            .ok_or_else(|| AppError::not_found("user", current_id))?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email.trim().to_string();
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        let public = PublicUser::from(&*user);

        let persisted = self
            .storage
            .save(USERS_COLLECTION_KEY, &users)
            .and(self.storage.save(USER_DATA_KEY, &public));
        self.user = Some(public.clone());
        Ok(Mutation::new(public, persisted))
    }

    pub async fn list_users(&self) -> Vec<PublicUser> {
        self.users().await.iter().map(PublicUser::from).collect()
    }

    /// Drops every account and the session.
    pub fn reset(&mut self) -> PendingWrite {
        self.user = None;
        self.token = None;
        self.last_error = None;
        self.storage
            .remove(USERS_COLLECTION_KEY)
            .and(self.storage.remove(USER_TOKEN_KEY))
            .and(self.storage.remove(USER_DATA_KEY))
    }

    async fn users(&self) -> Vec<StoredUser> {
        self.storage
            .load(USERS_COLLECTION_KEY)
            .await
            .unwrap_or_default()
    }

    fn start_session(&mut self, user: &StoredUser) -> Mutation<PublicUser> {
        let token = Uuid::new_v4().simple().to_string();
        let public = PublicUser::from(user);
        let persisted = self
            .storage
            .save(USER_TOKEN_KEY, &token)
            .and(self.storage.save(USER_DATA_KEY, &public));
        self.token = Some(token);
        self.user = Some(public.clone());
        self.last_error = None;
        Mutation::new(public, persisted)
    }

    fn record<T>(&mut self, result: Result<T, AppError>) -> Result<T, AppError> {
        self.last_error = match &result {
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "auth operation failed");
                Some(err.to_string())
            }
        };
        result
    }
}

enum Verdict {
    Match,
    /// The stored value is a plaintext password from before hashing.
    LegacyMatch,
    Mismatch,
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// One salted SHA-256 round, compared with plain `==`. This keeps stored
/// passwords out of plain sight on a local device; it is not a password KDF
/// and offers no protection against offline guessing.
fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{HASH_SCHEME}${salt}${}", digest(&salt, password))
}

fn verify_password(stored: &str, password: &str) -> Verdict {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => {
            if digest(salt, password) == expected {
                Verdict::Match
            } else {
                Verdict::Mismatch
            }
        }
        _ if stored == password => Verdict::LegacyMatch,
        _ => Verdict::Mismatch,
    }
}
