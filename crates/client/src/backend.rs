//! Typed access to the record service's collections

use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stringr_shared::{
    Filter, ListOptions, ListResult, NewUser, Racquet, Record, Session, StringJob, TennisString,
    User,
};
use tokio::sync::RwLock;

use crate::error::ClientError;

/// First page size used by the per-parent lookups and server-side search
const LOOKUP_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: User,
}

#[derive(Debug, Serialize)]
struct PasswordAuthRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

/// Connection to one deployment of the record service.
///
/// Cheap to clone; clones share the HTTP pool and the auth token.
#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: Url,
    token: Arc<RwLock<Option<String>>>,
}

impl Backend {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub fn collection<R: Record>(&self) -> Collection<'_, R> {
        Collection {
            backend: self,
            _record: PhantomData,
        }
    }

    pub fn racquets(&self) -> Collection<'_, Racquet> {
        self.collection()
    }

    pub fn strings(&self) -> Collection<'_, TennisString> {
        self.collection()
    }

    pub fn string_jobs(&self) -> Collection<'_, StringJob> {
        self.collection()
    }

    pub fn sessions(&self) -> Collection<'_, Session> {
        self.collection()
    }

    pub fn users(&self) -> Collection<'_, User> {
        self.collection()
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn records_url(&self, collection: &str, id: Option<&str>) -> Result<Url, ClientError> {
        match id {
            // Dot segments are normalized away and would address the collection itself
            Some(id @ ("" | "." | "..")) => Err(ClientError::NotFound(format!(
                "no record with id {id:?} in {collection}"
            ))),
            Some(id) => self.url(&["api", "collections", collection, "records", id]),
            None => self.url(&["api", "collections", collection, "records"]),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match self.token().await {
            Some(token) => request.header(AUTHORIZATION, token),
            None => request,
        };
        let response = request.send().await.map_err(ClientError::Network)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_response(response).await)
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Handle on one collection, typed by its record
pub struct Collection<'a, R> {
    backend: &'a Backend,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Collection<'_, R> {
    /// One page with the record's default sort and expansions
    pub async fn list(&self, page: u32, per_page: u32) -> Result<ListResult<R>, ClientError> {
        self.list_with(&ListOptions::for_record::<R>().page(page, per_page))
            .await
    }

    /// First page at the record's default page size
    pub async fn list_first(&self) -> Result<ListResult<R>, ClientError> {
        self.list_with(&ListOptions::for_record::<R>()).await
    }

    pub async fn list_with(&self, options: &ListOptions) -> Result<ListResult<R>, ClientError> {
        let url = self.backend.records_url(R::COLLECTION, None)?;
        tracing::debug!(
            collection = R::COLLECTION,
            page = options.page,
            per_page = options.per_page,
            "Listing records"
        );
        let request = self.backend.http.get(url).query(&options.to_query());
        decode(self.backend.send(request).await?).await
    }

    pub async fn get(&self, id: &str) -> Result<R, ClientError> {
        let url = self.backend.records_url(R::COLLECTION, Some(id))?;
        let mut request = self.backend.http.get(url);
        if !R::EXPAND.is_empty() {
            request = request.query(&[("expand", R::EXPAND.join(","))]);
        }
        decode(self.backend.send(request).await?).await
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<R, ClientError> {
        let url = self.backend.records_url(R::COLLECTION, None)?;
        let request = self.backend.http.post(url).json(draft);
        let record: R = decode(self.backend.send(request).await?).await?;
        tracing::info!(collection = R::COLLECTION, id = record.id(), "Created record");
        Ok(record)
    }

    /// Partial update: fields absent from `patch` keep their stored values
    pub async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, ClientError> {
        let url = self.backend.records_url(R::COLLECTION, Some(id))?;
        let request = self.backend.http.patch(url).json(patch);
        let record: R = decode(self.backend.send(request).await?).await?;
        tracing::info!(collection = R::COLLECTION, id, "Updated record");
        Ok(record)
    }

    /// Deleting an id that no longer exists fails with `NotFound`
    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let url = self.backend.records_url(R::COLLECTION, Some(id))?;
        self.backend.send(self.backend.http.delete(url)).await?;
        tracing::info!(collection = R::COLLECTION, id, "Deleted record");
        Ok(())
    }
}

impl Collection<'_, StringJob> {
    /// Newest first, with full expansion
    pub async fn by_racquet(&self, racquet_id: &str) -> Result<ListResult<StringJob>, ClientError> {
        let options = ListOptions::for_record::<StringJob>()
            .page(1, LOOKUP_PAGE_SIZE)
            .filter(Filter::eq("racquet", racquet_id)?);
        self.list_with(&options).await
    }
}

impl Collection<'_, Session> {
    pub async fn by_string_job(&self, string_job_id: &str) -> Result<ListResult<Session>, ClientError> {
        let options = ListOptions::for_record::<Session>()
            .page(1, LOOKUP_PAGE_SIZE)
            .filter(Filter::eq("string_job", string_job_id)?);
        self.list_with(&options).await
    }
}

impl Collection<'_, TennisString> {
    /// Server-side search on brand or model
    pub async fn search(&self, query: &str) -> Result<ListResult<TennisString>, ClientError> {
        let query = query.trim();
        let mut options = ListOptions::for_record::<TennisString>().page(1, LOOKUP_PAGE_SIZE);
        if !query.is_empty() {
            options = options.filter(Filter::like("brand", query)?.or(Filter::like("model", query)?));
        }
        self.list_with(&options).await
    }
}

impl Collection<'_, User> {
    /// Exchange credentials for a token. Does not touch the stored session.
    pub async fn auth_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let url = self
            .backend
            .url(&["api", "collections", User::COLLECTION, "auth-with-password"])?;
        let request = self.backend.http.post(url).json(&PasswordAuthRequest {
            identity: email,
            password,
        });
        decode(self.backend.send(request).await?).await
    }

    pub async fn register(&self, user: &NewUser) -> Result<User, ClientError> {
        self.create(user).await
    }
}
