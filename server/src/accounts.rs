use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::errors::{AccountError, LOGIN_FAILED, WRONG_CURRENT_PASSWORD};
use crate::models::{Account, Avatar, CharacterBuild, ProfileComment, ProfileRating};
use crate::password;
use crate::state::AuthConfig;
use crate::store::AccountStore;

/// All registration, authentication, and profile-mutation rules.
///
/// Every mutation reads the current account snapshot, validates, edits an
/// in-memory copy, and writes it back as one whole-document replace. There
/// is no optimistic concurrency: two concurrent edits to the same account
/// race and the later replace wins. The manager holds no mutable state of
/// its own; everything lives in the store.
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    auth: AuthConfig,
}

impl AccountManager {
    pub fn new(store: Arc<dyn AccountStore>, auth: AuthConfig) -> Self {
        Self { store, auth }
    }

    /// Create a new account. Username and email must be free among *active*
    /// accounts; a deactivated account's username or email may be reused.
    /// The response carries a message only — no id and no token, the caller
    /// logs in separately.
    pub async fn register(
        &self,
        username: &str,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AccountError> {
        if let Some(existing) = self.store.get_by_username(username).await? {
            if existing.is_active {
                return Err(AccountError::Conflict(
                    "that username is already taken by an active account".into(),
                ));
            }
        }
        if let Some(existing) = self.store.get_by_email(email).await? {
            if existing.is_active {
                return Err(AccountError::Conflict(
                    "that email is already registered to an active account".into(),
                ));
            }
        }

        let hash = password::hash(password)?;
        let account = Account::new(username, display_name, email, hash);
        info!(account_id = %account.id, username, "registering account");
        self.store.insert(account).await?;

        Ok("account registered successfully".to_string())
    }

    /// Authenticate and issue a signed token. Unknown username, inactive
    /// account, and wrong password all produce the identical error.
    pub async fn login(&self, username: &str, pass: &str) -> Result<String, AccountError> {
        let account = match self.store.get_by_username(username).await? {
            Some(account) if account.is_active => account,
            _ => return Err(AccountError::InvalidCredentials(LOGIN_FAILED)),
        };

        if !password::verify(&account.password_hash, pass) {
            return Err(AccountError::InvalidCredentials(LOGIN_FAILED));
        }

        let token = auth::issue_token(&self.auth, &account)?;
        info!(account_id = %account.id, "login succeeded");
        Ok(token)
    }

    /// Point lookup. Inactive accounts are still visible here; callers
    /// decide whether they are externally visible.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, AccountError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.store.get_by_username(username).await?)
    }

    async fn load(&self, id: Uuid) -> Result<Account, AccountError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn update_display_name(
        &self,
        id: Uuid,
        new_name: &str,
    ) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;
        account.display_name = new_name.to_string();
        self.store.replace(account).await?;
        Ok("display name updated".to_string())
    }

    pub async fn update_bio(&self, id: Uuid, bio: &str) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;
        account.bio = bio.to_string();
        self.store.replace(account).await?;
        Ok("bio updated".to_string())
    }

    /// Change email, failing if another active account already holds it.
    pub async fn update_email(&self, id: Uuid, new_email: &str) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;

        if let Some(holder) = self.store.get_by_email(new_email).await? {
            if holder.is_active && holder.id != id {
                return Err(AccountError::Conflict(
                    "that email is already in use by another account".into(),
                ));
            }
        }

        account.email = new_email.to_string();
        self.store.replace(account).await?;
        Ok("email updated".to_string())
    }

    /// Change password after verifying the current one against the stored
    /// hash.
    pub async fn update_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;

        if !password::verify(&account.password_hash, current_password) {
            return Err(AccountError::InvalidCredentials(WRONG_CURRENT_PASSWORD));
        }

        account.password_hash = password::hash(new_password)?;
        self.store.replace(account).await?;
        info!(account_id = %id, "password changed");
        Ok("password updated".to_string())
    }

    /// Replace the avatar representation. Content and size limits are the
    /// request layer's concern, not enforced here.
    pub async fn update_avatar(&self, id: Uuid, avatar: Avatar) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;
        account.avatar = avatar;
        self.store.replace(account).await?;
        Ok("profile picture updated".to_string())
    }

    /// Soft-delete. Idempotent: deactivating an already-inactive account
    /// succeeds with a distinct message. There is no reactivation.
    pub async fn deactivate(&self, id: Uuid) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;
        if !account.is_active {
            return Ok("account was already inactive".to_string());
        }

        account.is_active = false;
        self.store.replace(account).await?;
        info!(account_id = %id, "account deactivated");
        Ok("account deactivated".to_string())
    }

    /// Wholesale replace of both favorite-build lists. Character and perk
    /// names are trusted as given.
    pub async fn update_favorites(
        &self,
        id: Uuid,
        killers: Vec<CharacterBuild>,
        survivors: Vec<CharacterBuild>,
    ) -> Result<String, AccountError> {
        let mut account = self.load(id).await?;
        account.favorite_killers = killers;
        account.favorite_survivors = survivors;
        self.store.replace(account).await?;
        Ok("favorites updated".to_string())
    }

    /// Add or replace the rater's rating of the target profile. At most one
    /// rating per rater survives; self-rating is rejected here so the
    /// invariant holds regardless of caller.
    pub async fn rate_profile(
        &self,
        target_id: Uuid,
        rater_id: Uuid,
        score: u8,
    ) -> Result<String, AccountError> {
        if target_id == rater_id {
            return Err(AccountError::SelfRatingNotAllowed);
        }

        let mut account = self.load(target_id).await?;
        account.ratings.retain(|r| r.rater_id != rater_id);
        account.ratings.push(ProfileRating { rater_id, score });
        self.store.replace(account).await?;
        Ok("rating saved".to_string())
    }

    /// Append a comment to the target profile. Comments are never edited or
    /// deleted here.
    pub async fn add_comment(
        &self,
        target_id: Uuid,
        comment: ProfileComment,
    ) -> Result<String, AccountError> {
        let mut account = self.load(target_id).await?;
        account.comments.push(comment);
        self.store.replace(account).await?;
        Ok("comment added".to_string())
    }
}
