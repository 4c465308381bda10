use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::error::RegistryError;
use super::models::UserRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Store a user record and update the email index. Email is the login
    /// key and must be unique across users.
    pub fn put_user(&self, user: &UserRecord) -> Result<(), RegistryError> {
        debug_assert!(!user.id.is_empty(), "user id must not be empty");
        debug_assert!(!user.email.is_empty(), "user email must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut email_table = write_txn.open_table(USER_EMAILS)?;
            if let Some(existing) = email_table.get(user.email.as_str())? {
                if existing.value() != user.id.as_str() {
                    return Err(RegistryError::Validation(format!(
                        "email '{}' is already registered",
                        user.email
                    )));
                }
            }
            email_table.insert(user.email.as_str(), user.id.as_str())?;

            let mut table = write_txn.open_table(USERS)?;
            let data = rmp_serde::to_vec_named(user)?;
            table.insert(user.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a user by UUID
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => {
                let user: UserRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get a user by email (resolves email -> uuid -> user)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let email_table = read_txn.open_table(USER_EMAILS)?;

        let id = match email_table.get(email)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let users_table = read_txn.open_table(USERS)?;
        match users_table.get(id.as_str())? {
            Some(data) => {
                let user: UserRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Fetch the user for an email, creating the record on first sight.
    /// This is the registration path for both classic signup and the first
    /// login through an OAuth provider.
    pub fn get_or_create_user_by_email(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<UserRecord, RegistryError> {
        if let Some(user) = self.get_user_by_email(email)? {
            return Ok(user);
        }

        let now = Utc::now();
        let user = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.map(|u| u.to_string()),
            password_hash: None,
            bio: None,
            preferred_language: Some("en".to_string()),
            created_at: now,
            updated_at: now,
        };
        self.put_user(&user)?;
        Ok(user)
    }
}
