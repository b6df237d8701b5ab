//! In-memory repositories and fixtures for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_router;
use crate::auth::{generate_jwt, hash_password, Claims};
use crate::database::manager::DatabaseError;
use crate::database::models::comic::{ComicDocument, ComicId, ComicPage};
use crate::database::models::{MessageDocument, ProfileUpdate, UserDocument};
use crate::database::repository::{ComicLock, ComicRepository, HealthCheck, MessageRepository, UserRepository};
use crate::perms::Perm;
use crate::services::messages::uniq;
use crate::state::AppState;

#[derive(Default)]
pub struct MemoryUsers {
    users: RwLock<HashMap<Uuid, UserDocument>>,
}

impl MemoryUsers {
    fn email_in_use(users: &HashMap<Uuid, UserDocument>, except: Uuid, email: &Option<String>) -> bool {
        email.is_some() && users.values().any(|other| other.id != except && other.email == *email)
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserDocument>, DatabaseError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, DatabaseError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned())
    }

    async fn email_taken(&self, email: &str) -> Result<bool, DatabaseError> {
        Ok(self.users.read().await.values().any(|user| {
            user.email.as_deref() == Some(email) || user.unverified_email.as_deref() == Some(email)
        }))
    }

    async fn insert(&self, user: &UserDocument) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        if Self::email_in_use(&users, user.id, &user.email) {
            return Err(DatabaseError::Conflict("A user with this email already exists".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<UserDocument, DatabaseError> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if Self::email_in_use(&users, id, email) {
                return Err(DatabaseError::Conflict("A user with this email already exists".to_string()));
            }
        }
        let stored = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        update.apply(stored);
        Ok(stored.clone())
    }

    async fn set_perms(&self, id: Uuid, perms: Perm, perm_level: Option<u32>) -> Result<UserDocument, DatabaseError> {
        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        stored.perms = perms;
        stored.perm_level = perm_level;
        Ok(stored.clone())
    }

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_seen = at;
        }
        Ok(())
    }

    async fn set_unread_message_count(&self, id: Uuid, count: u32) -> Result<(), DatabaseError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.unread_message_count = count;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        match self.users.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DatabaseError::NotFound("User not found".to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemoryMessages {
    messages: RwLock<HashMap<Uuid, MessageDocument>>,
}

#[async_trait]
impl MessageRepository for MemoryMessages {
    async fn insert(&self, message: &MessageDocument) -> Result<(), DatabaseError> {
        self.messages.write().await.insert(message.id, message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MessageDocument>, DatabaseError> {
        let mut found: Vec<MessageDocument> = self
            .messages
            .read()
            .await
            .values()
            .filter(|message| message.not_deleted_by.contains(&user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.sent.cmp(&a.sent));
        Ok(found)
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<u32, DatabaseError> {
        let count = self
            .messages
            .read()
            .await
            .values()
            .filter(|message| message.not_read_by.contains(&user_id) && message.not_deleted_by.contains(&user_id))
            .count();
        Ok(count as u32)
    }

    async fn edit_content(
        &self,
        id: Uuid,
        content: &str,
        edited: DateTime<Utc>,
    ) -> Result<Option<MessageDocument>, DatabaseError> {
        let mut messages = self.messages.write().await;
        Ok(messages.get_mut(&id).map(|message| {
            message.content = content.to_string();
            message.edited = Some(edited);
            message.clone()
        }))
    }

    async fn set_read(&self, id: Uuid, user_id: Uuid, read: bool) -> Result<Option<MessageDocument>, DatabaseError> {
        let mut messages = self.messages.write().await;
        let message = match messages.get_mut(&id) {
            Some(message) if message.not_deleted_by.contains(&user_id) => message,
            _ => return Ok(None),
        };
        if read {
            message.not_read_by.retain(|id| *id != user_id);
        } else if !message.not_read_by.contains(&user_id) {
            message.not_read_by.push(user_id);
        }
        Ok(Some(message.clone()))
    }

    async fn remove_keeper(&self, id: Uuid, user_id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        let mut messages = self.messages.write().await;
        let message = match messages.get_mut(&id) {
            Some(message) if message.not_deleted_by.contains(&user_id) => message,
            _ => return Ok(None),
        };
        message.not_deleted_by.retain(|id| *id != user_id);
        message.not_read_by.retain(|id| *id != user_id);
        let removed = message.clone();
        if removed.not_deleted_by.is_empty() {
            messages.remove(&id);
        }
        Ok(Some(removed))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError> {
        Ok(self.messages.write().await.remove(&id))
    }
}

/// Comics behind a single edit gate; readers never wait on it.
pub struct MemoryComics {
    comics: Arc<RwLock<BTreeMap<ComicId, ComicDocument>>>,
    editing: Arc<Mutex<()>>,
    next_id: AtomicI64,
}

impl Default for MemoryComics {
    fn default() -> Self {
        Self {
            comics: Arc::new(RwLock::new(BTreeMap::new())),
            editing: Arc::new(Mutex::new(())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryComics {
    /// Overwrite a stored comic wholesale, for test setup.
    pub async fn replace(&self, comic: &ComicDocument) {
        self.comics.write().await.insert(comic.id, comic.clone());
    }
}

struct MemoryComicLock {
    _gate: OwnedMutexGuard<()>,
    comics: Arc<RwLock<BTreeMap<ComicId, ComicDocument>>>,
    comic: ComicDocument,
}

#[async_trait]
impl ComicLock for MemoryComicLock {
    fn comic(&self) -> &ComicDocument {
        &self.comic
    }

    fn comic_mut(&mut self) -> &mut ComicDocument {
        &mut self.comic
    }

    async fn commit(self: Box<Self>) -> Result<ComicDocument, DatabaseError> {
        let mut comics = self.comics.write().await;
        match comics.get_mut(&self.comic.id) {
            Some(stored) => {
                *stored = self.comic.clone();
                Ok(self.comic)
            }
            None => Err(DatabaseError::NotFound("Comic not found".to_string())),
        }
    }
}

#[async_trait]
impl ComicRepository for MemoryComics {
    async fn insert(&self, mut comic: ComicDocument) -> Result<ComicDocument, DatabaseError> {
        comic.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.comics.write().await.insert(comic.id, comic.clone());
        Ok(comic)
    }

    async fn find_by_id(&self, id: ComicId) -> Result<Option<ComicDocument>, DatabaseError> {
        Ok(self.comics.read().await.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ComicDocument>, DatabaseError> {
        Ok(self
            .comics
            .read()
            .await
            .values()
            .filter(|comic| comic.is_editor(user_id))
            .cloned()
            .collect())
    }

    async fn lock(&self, id: ComicId) -> Result<Option<Box<dyn ComicLock>>, DatabaseError> {
        let gate = self.editing.clone().lock_owned().await;
        let comic = match self.comics.read().await.get(&id) {
            Some(comic) => comic.clone(),
            None => return Ok(None),
        };
        Ok(Some(Box::new(MemoryComicLock {
            _gate: gate,
            comics: self.comics.clone(),
            comic,
        })))
    }

    async fn delete(&self, id: ComicId) -> Result<(), DatabaseError> {
        match self.comics.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DatabaseError::NotFound("Comic not found".to_string())),
        }
    }
}

/// Health check whose answer tests can flip.
pub struct MemoryHealth {
    pub healthy: AtomicBool,
}

impl Default for MemoryHealth {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl HealthCheck for MemoryHealth {
    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
        }
    }
}

/// A user with an unusable password hash; see [`fixture_user_with_password`].
pub fn fixture_user(name: &str) -> UserDocument {
    UserDocument::new(
        name.to_string(),
        format!("{}@example.com", name),
        "$argon2id$unusable".to_string(),
        Utc::now(),
    )
}

pub fn fixture_user_with_password(name: &str, password: &str) -> UserDocument {
    let mut user = fixture_user(name);
    user.password_hash = hash_password(password).unwrap();
    user
}

/// An unread message from `from` to `to`, kept by everyone.
pub fn fixture_message(from: Uuid, to: Vec<Uuid>) -> MessageDocument {
    MessageDocument {
        id: Uuid::new_v4(),
        reply_to: None,
        sent: Utc::now(),
        edited: None,
        from,
        not_deleted_by: uniq(std::iter::once(from).chain(to.iter().copied())),
        not_read_by: to.clone(),
        to,
        subject: "Hello".to_string(),
        content: "Hi there!".to_string(),
    }
}

pub fn fixture_comic(owner: Uuid) -> ComicDocument {
    ComicDocument::new(owner, "Test Comic".to_string(), Utc::now())
}

pub fn fixture_page(title: &str, hidden: bool) -> ComicPage {
    ComicPage {
        published: Utc::now(),
        title: title.to_string(),
        content: format!("{} content", title),
        next_pages: Vec::new(),
        tags: Vec::new(),
        hidden,
        commentary: None,
    }
}

/// In-memory state plus the concrete repositories behind it.
pub struct TestApp {
    pub users: Arc<MemoryUsers>,
    pub messages: Arc<MemoryMessages>,
    pub comics: Arc<MemoryComics>,
    pub health: Arc<MemoryHealth>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUsers::default());
        let messages = Arc::new(MemoryMessages::default());
        let comics = Arc::new(MemoryComics::default());
        let health = Arc::new(MemoryHealth::default());

        let state = AppState {
            users: users.clone(),
            messages: messages.clone(),
            comics: comics.clone(),
            health: health.clone(),
        };

        Self {
            users,
            messages,
            comics,
            health,
            router: build_router(state),
        }
    }

    /// The state the router was built over, for calling handlers directly.
    pub fn state(&self) -> AppState {
        AppState {
            users: self.users.clone(),
            messages: self.messages.clone(),
            comics: self.comics.clone(),
            health: self.health.clone(),
        }
    }

    /// Store a fixture user and return it.
    pub async fn user(&self, name: &str) -> UserDocument {
        let user = fixture_user(name);
        self.users.insert(&user).await.unwrap();
        user
    }

    pub async fn staff(&self, name: &str, perms: Perm, level: u32) -> UserDocument {
        let mut user = fixture_user(name);
        user.perms = perms;
        user.perm_level = Some(level);
        self.users.insert(&user).await.unwrap();
        user
    }

    pub async fn comic(&self, owner: &UserDocument) -> ComicDocument {
        self.comics.insert(fixture_comic(owner.id)).await.unwrap()
    }

    /// Send a request, returning the status and parsed JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        as_user: Option<&UserDocument>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = as_user {
            builder = builder.header(header::AUTHORIZATION, bearer(user));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

pub fn bearer(user: &UserDocument) -> String {
    format!("Bearer {}", generate_jwt(&Claims::new(user.id)).unwrap())
}
