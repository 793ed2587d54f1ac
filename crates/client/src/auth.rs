//! Process-wide authentication state.
//!
//! One [`AuthSession`] is created at startup and shared by reference. It
//! restores the stored identity in the background; until that finishes the
//! state is [`AuthState::Unknown`], which callers must not read as signed out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use stringr_shared::validation::{LoginForm, RegisterForm};
use stringr_shared::User;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::store::{AuthStore, AuthStoreError, StoredAuth};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Stored identity not loaded yet
    Unknown,
    Anonymous,
    Authenticated { token: String, user: User },
}

/// Expiry check on the service's JWTs.
///
/// Only the `exp` claim is read. The signature is the service's to verify.
pub struct TokenValidity;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

impl TokenValidity {
    pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
    }

    pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> bool {
        Self::expires_at(token).is_some_and(|exp| exp > now)
    }

    pub fn is_valid(token: &str) -> bool {
        Self::is_valid_at(token, Utc::now())
    }
}

enum PersistOp {
    Save(StoredAuth),
    Clear,
    Flush(oneshot::Sender<()>),
}

pub struct AuthSession {
    backend: Backend,
    state: watch::Sender<AuthState>,
    /// Held while a state change and the backend token it installs are applied
    transition: Mutex<()>,
    /// Flips to true once the startup restore has finished, applied or not
    restored: watch::Sender<bool>,
    persist: mpsc::UnboundedSender<PersistOp>,
}

impl AuthSession {
    /// Create the session and start restoring the stored identity.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(backend: Backend, store: Arc<dyn AuthStore>) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::Unknown);
        let (restored, _) = watch::channel(false);
        let (persist, persist_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            backend,
            state,
            transition: Mutex::new(()),
            restored,
            persist,
        });

        tokio::spawn(persist_worker(store.clone(), persist_rx));

        let restoring = session.clone();
        tokio::spawn(async move { restoring.restore(store).await });

        session
    }

    async fn restore(&self, store: Arc<dyn AuthStore>) {
        let loaded = match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(e)) => {
                tracing::warn!("Failed to load auth from storage: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Auth restore task failed: {}", e);
                None
            }
        };

        {
            let _transition = self.transition.lock().await;
            // A login that finished first wins over the stored identity
            let unknown = matches!(*self.state.borrow(), AuthState::Unknown);
            if unknown {
                let next = match loaded {
                    Some(auth) => {
                        self.backend.set_token(Some(auth.token.clone())).await;
                        tracing::debug!(user = %auth.model.id, "Restored stored auth");
                        AuthState::Authenticated {
                            token: auth.token,
                            user: auth.model,
                        }
                    }
                    None => AuthState::Anonymous,
                };
                self.state.send_replace(next);
            } else {
                tracing::debug!("Stored auth ignored; signed in during restore");
            }
        }
        self.restored.send_replace(true);
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// True until the stored identity has been restored
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Unknown)
    }

    /// Wait for the startup restore to finish
    pub async fn ready(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|state| !matches!(state, AuthState::Unknown))
            .await
            .map(|state| state.clone());
        result.unwrap_or(AuthState::Anonymous)
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.state.borrow() {
            AuthState::Authenticated { user, .. } => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        match &*self.state.borrow() {
            AuthState::Authenticated { token, .. } => TokenValidity::is_valid(token),
            _ => false,
        }
    }

    /// Exchange credentials for a token and remember the identity.
    ///
    /// On failure nothing changes, in memory or in storage.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let form = LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        };
        form.validate()?;

        let auth = self
            .backend
            .users()
            .auth_with_password(email.trim(), password)
            .await?;

        {
            let _transition = self.transition.lock().await;
            self.backend.set_token(Some(auth.token.clone())).await;
            self.state.send_replace(AuthState::Authenticated {
                token: auth.token.clone(),
                user: auth.record.clone(),
            });
            self.enqueue(PersistOp::Save(StoredAuth {
                token: auth.token,
                model: auth.record.clone(),
            }));
        }

        tracing::info!(user = %auth.record.id, "Logged in");
        Ok(auth.record)
    }

    pub async fn logout(&self) {
        {
            let _transition = self.transition.lock().await;
            self.backend.set_token(None).await;
            self.state.send_replace(AuthState::Anonymous);
            self.enqueue(PersistOp::Clear);
        }
        tracing::info!("Logged out");
    }

    /// Create an account. The new user still has to log in.
    pub async fn register(&self, form: &RegisterForm) -> Result<User, ClientError> {
        let draft = form.to_new()?;
        let user = self.backend.users().register(&draft).await?;
        tracing::info!(user = %user.id, "Registered account");
        Ok(user)
    }

    /// Wait for the startup load and every queued storage write
    pub async fn flush(&self) {
        let mut restored = self.restored.subscribe();
        let _ = restored.wait_for(|done| *done).await;

        let (done, wait) = oneshot::channel();
        if self.persist.send(PersistOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn enqueue(&self, op: PersistOp) {
        if self.persist.send(op).is_err() {
            tracing::warn!("Auth storage worker stopped; change kept in memory only");
        }
    }
}

/// Applies storage writes in order; failures are logged and dropped.
async fn persist_worker(store: Arc<dyn AuthStore>, mut rx: mpsc::UnboundedReceiver<PersistOp>) {
    while let Some(op) = rx.recv().await {
        let store = store.clone();
        let (action, result) = match op {
            PersistOp::Save(auth) => (
                "save",
                tokio::task::spawn_blocking(move || store.save(&auth)).await,
            ),
            PersistOp::Clear => ("clear", tokio::task::spawn_blocking(move || store.clear()).await),
            PersistOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        log_store_result(action, result);
    }
}

fn log_store_result(
    action: &str,
    result: Result<Result<(), AuthStoreError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => tracing::debug!("Auth storage {} done", action),
        Ok(Err(e)) => tracing::warn!("Failed to {} auth in storage: {}", action, e),
        Err(e) => tracing::warn!("Auth storage {} task failed: {}", action, e),
    }
}
