use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{conflict_on_unique, expect_affected};
use crate::database::manager::DatabaseError;
use crate::database::models::user::{ProfileUpdate, UserDocument, UserSettings};
use crate::database::repository::UserRepository;
use crate::perms::Perm;

pub struct PgUsers {
    pool: PgPool,
}

impl PgUsers {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: Option<String>,
    unverified_email: Option<String>,
    email_verification_token: Option<String>,
    name: String,
    password_hash: String,
    created: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    birthdate: Option<NaiveDate>,
    description: String,
    icon: Option<String>,
    site: Option<String>,
    perms: i32,
    perm_level: Option<i32>,
    unread_message_count: i32,
    settings: Json<UserSettings>,
}

impl From<UserRow> for UserDocument {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            unverified_email: row.unverified_email,
            email_verification_token: row.email_verification_token,
            name: row.name,
            password_hash: row.password_hash,
            created: row.created,
            last_seen: row.last_seen,
            birthdate: row.birthdate,
            description: row.description,
            icon: row.icon,
            site: row.site,
            perms: Perm::from_bits_truncate(u32::try_from(row.perms).unwrap_or(0)),
            // A stored level of 0 means no level, same as NULL.
            perm_level: row
                .perm_level
                .and_then(|level| u32::try_from(level).ok())
                .filter(|level| *level > 0),
            unread_message_count: u32::try_from(row.unread_message_count).unwrap_or(0),
            settings: row.settings.0,
        }
    }
}

fn perms_column(perms: Perm) -> i32 {
    i32::try_from(perms.bits()).unwrap_or(0)
}

fn level_column(level: Option<u32>) -> Result<Option<i32>, DatabaseError> {
    level
        .map(|level| {
            i32::try_from(level)
                .map_err(|_| DatabaseError::QueryError(format!("permission level {} is out of range", level)))
        })
        .transpose()
}

#[async_trait]
impl UserRepository for PgUsers {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserDocument::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserDocument::from))
    }

    async fn email_taken(&self, email: &str) -> Result<bool, DatabaseError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR unverified_email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn insert(&self, user: &UserDocument) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO users (
                id, email, unverified_email, email_verification_token, name, password_hash,
                created, last_seen, birthdate, description, icon, site,
                perms, perm_level, unread_message_count, settings
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.unverified_email)
        .bind(&user.email_verification_token)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created)
        .bind(user.last_seen)
        .bind(user.birthdate)
        .bind(&user.description)
        .bind(&user.icon)
        .bind(&user.site)
        .bind(perms_column(user.perms))
        .bind(level_column(user.perm_level)?)
        .bind(i32::try_from(user.unread_message_count).unwrap_or(i32::MAX))
        .bind(Json(&user.settings))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "A user with this email"))?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<UserDocument, DatabaseError> {
        if update.is_empty() {
            return self
                .find_by_id(id)
                .await?
                .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()));
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = query.separated(", ");
        if let Some(name) = &update.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(description) = &update.description {
            set.push("description = ").push_bind_unseparated(description);
        }
        if let Some(icon) = &update.icon {
            set.push("icon = ").push_bind_unseparated(icon);
        }
        if let Some(site) = &update.site {
            set.push("site = ").push_bind_unseparated(site);
        }
        if let Some(birthdate) = update.birthdate {
            set.push("birthdate = ").push_bind_unseparated(birthdate);
        }
        if let Some(settings) = &update.settings {
            set.push("settings = ").push_bind_unseparated(Json(settings));
        }
        if let Some(email) = &update.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(unverified_email) = &update.unverified_email {
            set.push("unverified_email = ").push_bind_unseparated(unverified_email);
        }
        if let Some(token) = &update.email_verification_token {
            set.push("email_verification_token = ").push_bind_unseparated(token);
        }
        query.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let row = query
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "A user with this email"))?;
        row.map(UserDocument::from)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))
    }

    async fn set_perms(&self, id: Uuid, perms: Perm, perm_level: Option<u32>) -> Result<UserDocument, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET perms = $2, perm_level = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(perms_column(perms))
        .bind(level_column(perm_level)?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserDocument::from)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))
    }

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_unread_message_count(&self, id: Uuid, count: u32) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET unread_message_count = $2 WHERE id = $1")
            .bind(id)
            .bind(i32::try_from(count).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_affected(result.rows_affected(), "User")
    }
}
