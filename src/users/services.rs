use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AdminEditRequest, EditProfileRequest},
    repo_types::User,
};
use crate::{
    auth::{
        error::{AuthError, AuthResult, UniqueField},
        services::{is_valid_email, is_valid_username},
    },
    storage::Store,
};

/// Email is checked before username. `except` is the account being edited,
/// which may keep its own values.
pub async fn ensure_unique(
    store: &dyn Store,
    email: &str,
    username: &str,
    except: Option<Uuid>,
) -> AuthResult<()> {
    let taken_by_other = |u: Option<User>| u.is_some_and(|u| Some(u.id) != except);

    if taken_by_other(store.user_by_email(email).await?) {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateUnique {
            field: UniqueField::Email,
            editing: except.is_some(),
        });
    }
    if taken_by_other(store.user_by_username(username).await?) {
        warn!(username = %username, "username already in use");
        return Err(AuthError::DuplicateUnique {
            field: UniqueField::Username,
            editing: except.is_some(),
        });
    }
    Ok(())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn check_profile_lengths(name: Option<&str>, location: Option<&str>) -> AuthResult<()> {
    if let Some(name) = name {
        if !(1..=32).contains(&name.trim().chars().count()) {
            return Err(AuthError::validation("Name must be 1 to 32 characters."));
        }
    }
    if let Some(location) = location {
        if location.trim().chars().count() > 64 {
            return Err(AuthError::validation("Location must be at most 64 characters."));
        }
    }
    Ok(())
}

pub async fn edit_profile(store: &dyn Store, user: &mut User, req: &EditProfileRequest) -> AuthResult<()> {
    check_profile_lengths(Some(req.name.as_str()), Some(req.location.as_str()))?;
    user.name = non_empty(&req.name);
    user.location = non_empty(&req.location);
    user.about_me = non_empty(&req.about_me);
    store.save_user(user).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(())
}

/// Administrator edit of any account. Changing the email refreshes the
/// avatar hash along with it.
pub async fn admin_edit(store: &dyn Store, target: Uuid, req: &AdminEditRequest) -> AuthResult<User> {
    let mut user = store
        .user_by_id(target)
        .await?
        .ok_or(AuthError::NotFound("user"))?;

    let email = match &req.email {
        Some(e) => {
            let e = e.trim().to_lowercase();
            if !is_valid_email(&e) {
                return Err(AuthError::validation("Invalid email"));
            }
            e
        }
        None => user.email.clone(),
    };
    let username = match &req.username {
        Some(u) if !is_valid_username(u, 1) => {
            return Err(AuthError::validation(
                "Username must be 1 to 32 characters: letters, numbers, dots or underscores.",
            ));
        }
        Some(u) => u.clone(),
        None => user.username.clone(),
    };
    check_profile_lengths(req.name.as_deref(), req.location.as_deref())?;
    ensure_unique(store, &email, &username, Some(user.id)).await?;

    if let Some(role_id) = req.role_id {
        if store.role_by_id(role_id).await?.is_none() {
            return Err(AuthError::validation("Unknown role"));
        }
        user.role_id = Some(role_id);
    }
    if email != user.email {
        user.set_email(&email);
    }
    user.username = username;
    if let Some(confirmed) = req.confirmed {
        user.confirmed = confirmed;
    }
    if let Some(name) = &req.name {
        user.name = non_empty(name);
    }
    if let Some(location) = &req.location {
        user.location = non_empty(location);
    }
    if let Some(about_me) = &req.about_me {
        user.about_me = non_empty(about_me);
    }

    store
        .save_user(&user)
        .await
        .map_err(|e| AuthError::from(e).while_editing())?;
    info!(user_id = %user.id, "user edited by administrator");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{memory::MemoryStore, RoleStore, UserStore},
        users::repo_types::Role,
    };

    async fn store_with(users: &[(&str, &str)]) -> (MemoryStore, Vec<User>) {
        let store = MemoryStore::new();
        let mut saved = Vec::new();
        for (email, username) in users {
            let user = User::new(email, username, "pw").unwrap();
            store.save_user(&user).await.unwrap();
            saved.push(user);
        }
        (store, saved)
    }

    #[tokio::test]
    async fn ensure_unique_checks_email_first() {
        let (store, _) = store_with(&[("cat@example.com", "catcatcat")]).await;
        let err = ensure_unique(&store, "cat@example.com", "catcatcat", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUnique { field: UniqueField::Email, editing: false }));
    }

    #[tokio::test]
    async fn ensure_unique_ignores_the_edited_user() {
        let (store, users) = store_with(&[("cat@example.com", "catcatcat")]).await;
        ensure_unique(&store, "cat@example.com", "catcatcat", Some(users[0].id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn racing_save_reports_duplicate_not_internal() {
        let (store, _) = store_with(&[("cat@example.com", "catcatcat")]).await;
        let late = User::new("cat@example.com", "latecomer", "pw").unwrap();

        let err = AuthError::from(store.save_user(&late).await.unwrap_err());
        assert!(matches!(err, AuthError::DuplicateUnique { field: UniqueField::Email, editing: false }));
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn edit_profile_validates_lengths() {
        let (store, mut users) = store_with(&[("cat@example.com", "catcatcat")]).await;
        let user = &mut users[0];

        let too_long = EditProfileRequest {
            name: "x".repeat(33),
            location: String::new(),
            about_me: String::new(),
        };
        assert!(matches!(
            edit_profile(&store, user, &too_long).await,
            Err(AuthError::Validation(_))
        ));

        let ok = EditProfileRequest {
            name: "Cat".into(),
            location: "Mars".into(),
            about_me: "".into(),
        };
        edit_profile(&store, user, &ok).await.unwrap();
        let stored = store.user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Cat"));
        assert_eq!(stored.location.as_deref(), Some("Mars"));
        assert_eq!(stored.about_me, None);
    }

    #[tokio::test]
    async fn admin_edit_changes_email_and_avatar() {
        let (store, users) = store_with(&[("cat@example.com", "catcatcat")]).await;
        let before = users[0].avatar_hash.clone();
        let req = AdminEditRequest {
            email: Some("Tiger@Example.com".into()),
            confirmed: Some(true),
            ..Default::default()
        };
        let user = admin_edit(&store, users[0].id, &req).await.unwrap();
        assert_eq!(user.email, "tiger@example.com");
        assert!(user.confirmed);
        assert_ne!(user.avatar_hash, before);
    }

    #[tokio::test]
    async fn admin_edit_rejects_taken_username_and_unknown_role() {
        let (store, users) =
            store_with(&[("cat@example.com", "catcatcat"), ("dog@example.com", "dogdogdog")]).await;

        let req = AdminEditRequest {
            username: Some("dogdogdog".into()),
            ..Default::default()
        };
        let err = admin_edit(&store, users[0].id, &req).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUnique { field: UniqueField::Username, editing: true }));
        assert_eq!(err.public_message(), "Username already registered.");

        let req = AdminEditRequest {
            role_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(
            admin_edit(&store, users[0].id, &req).await,
            Err(AuthError::Validation(_))
        ));

        let role = Role::new("Moderator", 0x0f, false);
        store.save_role(&role).await.unwrap();
        let req = AdminEditRequest {
            role_id: Some(role.id),
            ..Default::default()
        };
        assert_eq!(admin_edit(&store, users[0].id, &req).await.unwrap().role_id, Some(role.id));
    }

    #[tokio::test]
    async fn admin_edit_unknown_user() {
        let store = MemoryStore::new();
        let err = admin_edit(&store, Uuid::new_v4(), &AdminEditRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound("user")));
    }
}
