//! Trick listing, creation and card preparation

use super::validation::{Form, Rule, Validator};
use super::CsrfToken;
use crate::api::{
    error_message, ApiClient, Envelope, NewTrick, Params, Trick, TricksByUser, Upload,
    UploadProgress, User,
};
use crate::errors::{FieldError, Result, ShelfError};
use crate::storage::TtlStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage key for one user's trick listing.
pub fn tricks_cache_key(username: &str) -> String {
    format!("tricks-by-{}", username)
}

/// Multipart field carrying an imported bookmark file.
pub const BOOKMARK_FIELD: &str = "files[]";

/// Browser bookmark exports are HTML documents.
pub const BOOKMARK_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone)]
pub struct TrickController {
    client: ApiClient,
    store: Arc<TtlStore>,
    csrf: CsrfToken,
    cache_ttl: Duration,
    user: Option<User>,
}

impl TrickController {
    pub fn new(
        client: ApiClient,
        store: Arc<TtlStore>,
        csrf: CsrfToken,
        cache_ttl: Duration,
        user: Option<User>,
    ) -> Self {
        Self {
            client,
            store,
            csrf,
            cache_ttl,
            user,
        }
    }

    fn create_rules() -> Validator {
        Validator::new()
            .rule("title", Rule::Required)
            .rule("origin_url", Rule::Required)
            .rule("tags", Rule::Required)
    }

    /// Submit a new trick. Returns the path of the author's trick list.
    pub async fn create(&self, trick: &NewTrick) -> Result<String> {
        let tags: Vec<String> = trick
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let values = Form::new()
            .with("title", trick.title.as_str())
            .with("origin_url", trick.origin_url.as_str())
            .with("tags", tags.join(","));
        Self::create_rules().validate(&values)?;

        let username = match &self.user {
            Some(user) => user.username.clone(),
            None => {
                return Err(ShelfError::Generic(
                    "creating a trick requires a signed-in user".to_string(),
                ))
            }
        };

        let mut params: Params = vec![
            ("title".to_string(), trick.title.trim().to_string()),
            ("origin_url".to_string(), trick.origin_url.trim().to_string()),
            ("description".to_string(), trick.description.clone()),
        ];
        params.extend(tags.into_iter().map(|tag| ("tags[]".to_string(), tag)));
        self.csrf.append_to(&mut params);

        self.client
            .post_form::<Value>(&self.client.api_url("/trick/create"), &params)
            .await?;

        // the author's cached listing no longer matches the server
        if let Err(e) = self.store.delete(&tricks_cache_key(&username)) {
            warn!(%username, error = %e, "stale trick listing left in storage");
        }
        info!(%username, title = %trick.title, "trick created");
        Ok(format!("/{}/tricks", username))
    }

    /// Tricks of one user, served from storage while fresh.
    ///
    /// Only non-empty listings are cached.
    pub async fn tricks_by_user(&self, user_id: &str, username: &str) -> Result<TricksByUser> {
        let key = tricks_cache_key(username);
        match self.store.get::<TricksByUser>(&key) {
            Ok(Some(cached)) => {
                debug!(%key, "tricks from storage");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => debug!(%key, error = %e, "cached tricks unreadable, refetching"),
        }

        let query: Params = vec![("user_id".to_string(), user_id.to_string())];
        let listing: TricksByUser = self
            .client
            .get(&self.client.api_url("/trick/tricks-user"), &query)
            .await?;

        if !listing.tricks.is_empty() {
            if let Err(e) = self.store.set(&key, &listing, Some(self.cache_ttl)) {
                warn!(%key, error = %e, "trick listing not cached");
            }
        }
        Ok(listing)
    }

    /// Upload a browser bookmark export to be turned into tricks.
    ///
    /// `on_progress` receives the bytes sent so far after every chunk. The
    /// server acknowledges with a JSON body whose `status` must be 200;
    /// returns its `message`, if any.
    pub async fn import_bookmark<F>(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        on_progress: F,
    ) -> Result<Option<String>>
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        if bytes.is_empty() {
            return Err(ShelfError::ValidationError(vec![FieldError::new(
                "file",
                "Please choose a bookmark file",
            )]));
        }

        let mut fields: Params = Vec::new();
        self.csrf.append_to(&mut fields);
        let upload = Upload {
            field: BOOKMARK_FIELD.to_string(),
            file_name: file_name.to_string(),
            content_type: BOOKMARK_CONTENT_TYPE.to_string(),
            bytes,
        };

        let body: Value = self
            .client
            .post_multipart(
                &self.client.api_url("/trick/import"),
                &fields,
                &upload,
                Arc::new(on_progress),
            )
            .await?;

        if let Some(status) = body.get("status").and_then(Value::as_u64) {
            if status != 200 {
                let status = u16::try_from(status).unwrap_or(u16::MAX);
                let message = error_message(status, &body);
                warn!(status, %message, "bookmark import rejected");
                return Err(ShelfError::ApiError { status, message });
            }
        }

        if let Some(user) = &self.user {
            if let Err(e) = self.store.delete(&tricks_cache_key(&user.username)) {
                warn!(username = %user.username, error = %e, "stale trick listing left in storage");
            }
        }
        info!(file = %upload.file_name, bytes = upload.bytes.len(), "bookmarks imported");
        Ok(body.get("message").and_then(Value::as_str).map(str::to_string))
    }

    /// Every trick on the site
    pub async fn all_tricks(&self) -> Result<Vec<Trick>> {
        let envelope: Envelope<Vec<Trick>> = self
            .client
            .get(&self.client.api_url("/trick"), &Vec::new())
            .await?;
        Ok(envelope.data)
    }
}

/// Author block ready for display; carries no e-mail address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerCard {
    pub username: String,
    pub photo_profile: String,
}

/// Trick ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickCard {
    pub title: String,
    pub origin_url: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub user: OwnerCard,
}

/// Gravatar "retro" avatar for `email`.
pub fn gravatar_url(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!(
        "https://gravatar.com/avatar/{}?s=200&d=retro",
        hex::encode(hasher.finalize())
    )
}

/// Fill in missing avatars, split joined tags and drop owner e-mails.
pub fn prepare_for_render(tricks: Vec<Trick>) -> Vec<TrickCard> {
    tricks
        .into_iter()
        .map(|trick| {
            let photo_profile = match trick.user.photo_profile {
                Some(photo) => photo,
                None => gravatar_url(trick.user.email.as_deref().unwrap_or("")),
            };
            TrickCard {
                title: trick.title,
                origin_url: trick.origin_url,
                description: trick.description,
                tags: trick.tags.into_list(),
                user: OwnerCard {
                    username: trick.user.username,
                    photo_profile,
                },
            }
        })
        .collect()
}
