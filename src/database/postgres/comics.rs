use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::expect_affected;
use crate::database::manager::DatabaseError;
use crate::database::models::comic::{
    ComicAuthor, ComicComment, ComicDocument, ComicId, ComicPage, ComicPageDraft, ComicScript, ComicStatus,
    EditorSettings,
};
use crate::database::repository::{ComicLock, ComicRepository};

pub struct PgComics {
    pool: PgPool,
}

impl PgComics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ComicRow {
    id: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    title: String,
    status: i16,
    owner: Uuid,
    editors: Vec<Uuid>,
    author: Option<Json<ComicAuthor>>,
    pages: Json<Vec<ComicPage>>,
    drafts: Json<Vec<ComicPageDraft>>,
    description: String,
    icon: Option<String>,
    banner: Option<String>,
    style: String,
    disable_user_theme: bool,
    script: Json<ComicScript>,
    tags: Vec<String>,
    comments_enabled: bool,
    comments: Json<Vec<ComicComment>>,
    editor_settings: Json<EditorSettings>,
}

impl TryFrom<ComicRow> for ComicDocument {
    type Error = DatabaseError;

    fn try_from(row: ComicRow) -> Result<Self, Self::Error> {
        let status = u8::try_from(row.status)
            .map_err(|e| e.to_string())
            .and_then(ComicStatus::try_from)
            .map_err(|e| DatabaseError::QueryError(format!("comic {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            created: row.created,
            updated: row.updated,
            title: row.title,
            status,
            owner: row.owner,
            editors: row.editors,
            author: row.author.map(|author| author.0),
            pages: row.pages.0,
            drafts: row.drafts.0,
            description: row.description,
            icon: row.icon,
            banner: row.banner,
            style: row.style,
            disable_user_theme: row.disable_user_theme,
            script: row.script.0,
            tags: row.tags,
            comments_enabled: row.comments_enabled,
            comments: row.comments.0,
            editor_settings: row.editor_settings.0,
        })
    }
}

#[async_trait]
impl ComicRepository for PgComics {
    async fn insert(&self, mut comic: ComicDocument) -> Result<ComicDocument, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO comics (
                created, updated, title, status, owner, editors, author, pages, drafts,
                description, icon, banner, style, disable_user_theme, script, tags,
                comments_enabled, comments, editor_settings
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
             RETURNING id",
        )
        .bind(comic.created)
        .bind(comic.updated)
        .bind(&comic.title)
        .bind(i16::from(u8::from(comic.status)))
        .bind(comic.owner)
        .bind(&comic.editors)
        .bind(comic.author.as_ref().map(Json))
        .bind(Json(&comic.pages))
        .bind(Json(&comic.drafts))
        .bind(&comic.description)
        .bind(&comic.icon)
        .bind(&comic.banner)
        .bind(&comic.style)
        .bind(comic.disable_user_theme)
        .bind(Json(&comic.script))
        .bind(&comic.tags)
        .bind(comic.comments_enabled)
        .bind(Json(&comic.comments))
        .bind(Json(&comic.editor_settings))
        .fetch_one(&self.pool)
        .await?;

        comic.id = id;
        Ok(comic)
    }

    async fn find_by_id(&self, id: ComicId) -> Result<Option<ComicDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, ComicRow>("SELECT * FROM comics WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ComicDocument::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ComicDocument>, DatabaseError> {
        let rows = sqlx::query_as::<_, ComicRow>(
            "SELECT * FROM comics WHERE owner = $1 OR editors @> ARRAY[$1]::uuid[] ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ComicDocument::try_from).collect()
    }

    async fn lock(&self, id: ComicId) -> Result<Option<Box<dyn ComicLock>>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ComicRow>("SELECT * FROM comics WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        match row {
            Some(row) => {
                let comic = ComicDocument::try_from(row)?;
                Ok(Some(Box::new(PgComicLock { tx, comic })))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: ComicId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM comics WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_affected(result.rows_affected(), "Comic")
    }
}

/// A comic row held `FOR UPDATE` until the transaction commits or drops.
struct PgComicLock {
    tx: Transaction<'static, Postgres>,
    comic: ComicDocument,
}

#[async_trait]
impl ComicLock for PgComicLock {
    fn comic(&self) -> &ComicDocument {
        &self.comic
    }

    fn comic_mut(&mut self) -> &mut ComicDocument {
        &mut self.comic
    }

    async fn commit(self: Box<Self>) -> Result<ComicDocument, DatabaseError> {
        let PgComicLock { mut tx, comic } = *self;

        sqlx::query(
            "UPDATE comics SET
                updated = $2, title = $3, status = $4, owner = $5, editors = $6, author = $7,
                pages = $8, drafts = $9, description = $10, icon = $11, banner = $12,
                style = $13, disable_user_theme = $14, script = $15, tags = $16,
                comments_enabled = $17, comments = $18, editor_settings = $19
             WHERE id = $1",
        )
        .bind(comic.id)
        .bind(comic.updated)
        .bind(&comic.title)
        .bind(i16::from(u8::from(comic.status)))
        .bind(comic.owner)
        .bind(&comic.editors)
        .bind(comic.author.as_ref().map(Json))
        .bind(Json(&comic.pages))
        .bind(Json(&comic.drafts))
        .bind(&comic.description)
        .bind(&comic.icon)
        .bind(&comic.banner)
        .bind(&comic.style)
        .bind(comic.disable_user_theme)
        .bind(Json(&comic.script))
        .bind(&comic.tags)
        .bind(comic.comments_enabled)
        .bind(Json(&comic.comments))
        .bind(Json(&comic.editor_settings))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(comic)
    }
}
