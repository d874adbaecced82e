//! Account lifecycle: registration, confirmation, login and password changes.

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{ChangePasswordRequest, PasswordResetForm, RegisterRequest},
    error::{AuthError, AuthResult},
    tokens::{Intent, TokenSigner},
};
use crate::{
    config::AppConfig,
    mail::{compose, Mailer, Template},
    state::AppState,
    storage::Store,
    users::{
        permissions::ADMINISTRATOR_ROLE,
        repo_types::{Role, User},
        services::ensure_unique,
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    (1..=64).contains(&email.len()) && EMAIL_RE.is_match(email)
}

/// Letters, digits, dots and underscores, starting with a letter.
pub(crate) fn is_valid_username(username: &str, min_len: usize) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").unwrap();
    }
    (min_len..=32).contains(&username.len()) && USERNAME_RE.is_match(username)
}

fn check_new_password(password: &str, password2: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::validation("Password is required."));
    }
    if password != password2 {
        return Err(AuthError::validation("Passwords must match."));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
}

pub struct AccountService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    config: &'a AppConfig,
    signer: TokenSigner,
}

impl<'a> AccountService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: state.store.as_ref(),
            mailer: state.mailer.as_ref(),
            config: state.config.as_ref(),
            signer: TokenSigner::from_ref(state),
        }
    }

    /// Creates an unconfirmed account and mails a confirmation link.
    pub async fn register(&self, req: &RegisterRequest) -> AuthResult<User> {
        let email = req.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::validation("Invalid email"));
        }
        if !is_valid_username(&req.username, 8) {
            return Err(AuthError::validation(
                "Username must be 8 to 32 characters: letters, numbers, dots or underscores.",
            ));
        }
        check_new_password(&req.password, &req.password2)?;
        ensure_unique(self.store, &email, &req.username, None).await?;

        let mut user = User::new(&email, &req.username, &req.password)?;
        user.role_id = self.initial_role(&email).await?.map(|r| r.id);
        self.store.save_user(&user).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");

        self.send_confirmation(&user)?;
        Ok(user)
    }

    async fn initial_role(&self, email: &str) -> AuthResult<Option<Role>> {
        let role = if self.config.is_admin_email(email) {
            self.store.role_by_name(ADMINISTRATOR_ROLE).await?
        } else {
            self.store.default_role().await?
        };
        if role.is_none() {
            warn!(email = %email, "no role available; run bootstrap-roles");
        }
        Ok(role)
    }

    pub fn send_confirmation(&self, user: &User) -> AuthResult<()> {
        let token = self.signer.issue_default(user.id, Intent::Confirm)?;
        let link = format!("{}/api/v1/auth/confirm/{}", self.config.tokens.public_url, token);
        self.mailer.send(compose(
            &self.config.mail,
            &user.email,
            Template::Confirm {
                username: &user.username,
                link,
            },
        ));
        Ok(())
    }

    /// A token minted for another account is refused even though its
    /// signature is valid.
    pub async fn confirm(&self, user: &mut User, token: &str) -> AuthResult<ConfirmOutcome> {
        if user.confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        let subject = self.signer.verify(token, Intent::Confirm)?;
        if subject != user.id {
            warn!(user_id = %user.id, token_subject = %subject, "confirmation token for another account");
            return Err(AuthError::SubjectMismatch);
        }
        user.confirmed = true;
        self.store.save_user(user).await?;
        info!(user_id = %user.id, "account confirmed");
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.user_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !user.verify_password(password) {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn change_password(&self, user: &mut User, req: &ChangePasswordRequest) -> AuthResult<()> {
        if !user.verify_password(&req.old_password) {
            return Err(AuthError::InvalidCredentials);
        }
        check_new_password(&req.password, &req.password2)?;
        user.set_password(&req.password)?;
        self.store.save_user(user).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Mails a reset link when the address is known. The outcome is the same
    /// either way so the endpoint cannot be used to probe for accounts.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::validation("Invalid email"));
        }
        let Some(user) = self.store.user_by_email(&email).await? else {
            info!(email = %email, "password reset requested for unknown email");
            return Ok(());
        };
        let token = self.signer.issue_default(user.id, Intent::Reset)?;
        let link = format!("{}/api/v1/auth/reset/{}", self.config.tokens.public_url, token);
        self.mailer.send(compose(
            &self.config.mail,
            &user.email,
            Template::ResetPassword {
                username: &user.username,
                link,
            },
        ));
        info!(user_id = %user.id, "password reset mailed");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, form: &PasswordResetForm) -> AuthResult<()> {
        check_new_password(&form.password, &form.password2)?;
        let subject = self.signer.verify(token, Intent::Reset)?;
        let mut user = self
            .store
            .user_by_id(subject)
            .await?
            .ok_or(AuthError::UnknownSubject)?;
        user.set_password(&form.password)?;
        self.store.save_user(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }
}
