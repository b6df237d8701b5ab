use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::MessageDocument;
use crate::database::repository::MessageRepository;

pub struct PgMessages {
    pool: PgPool,
}

impl PgMessages {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    reply_to: Option<Uuid>,
    sent: DateTime<Utc>,
    edited: Option<DateTime<Utc>>,
    from_user: Uuid,
    to_users: Vec<Uuid>,
    not_deleted_by: Vec<Uuid>,
    not_read_by: Vec<Uuid>,
    subject: String,
    content: String,
}

impl From<MessageRow> for MessageDocument {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            reply_to: row.reply_to,
            sent: row.sent,
            edited: row.edited,
            from: row.from_user,
            to: row.to_users,
            not_deleted_by: row.not_deleted_by,
            not_read_by: row.not_read_by,
            subject: row.subject,
            content: row.content,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessages {
    async fn insert(&self, message: &MessageDocument) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO messages (
                id, reply_to, sent, edited, from_user, to_users,
                not_deleted_by, not_read_by, subject, content
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(message.id)
        .bind(message.reply_to)
        .bind(message.sent)
        .bind(message.edited)
        .bind(message.from)
        .bind(&message.to)
        .bind(&message.not_deleted_by)
        .bind(&message.not_read_by)
        .bind(&message.subject)
        .bind(&message.content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MessageDocument::from))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MessageDocument>, DatabaseError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE not_deleted_by @> ARRAY[$1]::uuid[] ORDER BY sent DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageDocument::from).collect())
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<u32, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages
             WHERE not_read_by @> ARRAY[$1]::uuid[] AND not_deleted_by @> ARRAY[$1]::uuid[]",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn edit_content(
        &self,
        id: Uuid,
        content: &str,
        edited: DateTime<Utc>,
    ) -> Result<Option<MessageDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "UPDATE messages SET content = $2, edited = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(content)
        .bind(edited)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MessageDocument::from))
    }

    async fn set_read(&self, id: Uuid, user_id: Uuid, read: bool) -> Result<Option<MessageDocument>, DatabaseError> {
        let sql = if read {
            "UPDATE messages SET not_read_by = array_remove(not_read_by, $2)
             WHERE id = $1 AND $2 = ANY(not_deleted_by)
             RETURNING *"
        } else {
            "UPDATE messages SET not_read_by = CASE
                 WHEN $2 = ANY(not_read_by) THEN not_read_by
                 ELSE array_append(not_read_by, $2)
             END
             WHERE id = $1 AND $2 = ANY(not_deleted_by)
             RETURNING *"
        };

        let row = sqlx::query_as::<_, MessageRow>(sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MessageDocument::from))
    }

    async fn remove_keeper(&self, id: Uuid, user_id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MessageRow>(
            "UPDATE messages SET
                not_deleted_by = array_remove(not_deleted_by, $2),
                not_read_by = array_remove(not_read_by, $2)
             WHERE id = $1 AND $2 = ANY(not_deleted_by)
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_some() {
            sqlx::query("DELETE FROM messages WHERE id = $1 AND cardinality(not_deleted_by) = 0")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(row.map(MessageDocument::from))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, MessageRow>("DELETE FROM messages WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MessageDocument::from))
    }
}
