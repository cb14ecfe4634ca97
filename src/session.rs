//! Session context
//!
//! Everything a page needs once the user is signed in: configuration, the
//! authenticated client, the shared cache and the realtime bridge. Built
//! once at start-up and passed explicitly; signing out tears it down.

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthError, AuthProvider, Authenticator, Session};
use crate::cache::{CacheConfig, Poller, QueryCache, Resource};
use crate::config::Config;
use crate::handoff::HandoffController;
use crate::queries::Queries;
use crate::realtime::{RealtimeBridge, SocketConfig, SocketTransport, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug)]
pub struct SessionContext {
    config: Config,
    auth: Authenticator,
    session: Option<Session>,
    client: ApiClient,
    cache: QueryCache,
    realtime: RealtimeBridge,
}

impl SessionContext {
    /// Sign in with the configured provider and connect realtime when a
    /// backend for it is configured
    pub async fn start(config: Config) -> Result<Self, SessionError> {
        let auth = Authenticator::from_config(&config)?;
        let session = auth.sign_in().await?;
        let client = ApiClient::new(&config.api_url, config.request_timeout)?
            .authenticated(&session.access_token);

        let realtime = match (&config.supabase_url, &config.supabase_anon_key) {
            (Some(url), Some(key)) => {
                tracing::info!("Realtime notifications enabled");
                SocketTransport::bridge(
                    SocketConfig::new(url, key).with_access_token(&session.access_token),
                )
            }
            _ => {
                tracing::info!("Realtime not configured, falling back to polling");
                RealtimeBridge::disabled()
            }
        };

        Ok(Self::with_parts(config, auth, session, client, realtime))
    }

    /// Assemble a context from already-built parts
    pub fn with_parts(
        config: Config,
        auth: Authenticator,
        session: Session,
        client: ApiClient,
        realtime: RealtimeBridge,
    ) -> Self {
        Self {
            config,
            auth,
            session: Some(session),
            client,
            cache: QueryCache::new(CacheConfig::default()),
            realtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Result<&str, AuthError> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
            .ok_or(AuthError::SignedOut)
    }

    pub fn client(&self) -> Result<&ApiClient, AuthError> {
        self.token()?;
        Ok(&self.client)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn realtime(&self) -> &RealtimeBridge {
        &self.realtime
    }

    pub fn queries(&self) -> Result<Queries, AuthError> {
        Ok(Queries::new(self.client()?.clone(), self.cache.clone()))
    }

    pub fn handoff(&self) -> Result<HandoffController, AuthError> {
        Ok(HandoffController::new(self.queries()?))
    }

    /// Realtime watchers the dashboard keeps open: calls, leads and all
    /// messages
    pub fn watch_all(&self) -> Vec<Subscription> {
        vec![
            self.realtime.watch_calls(&self.cache),
            self.realtime.watch_leads(&self.cache),
            self.realtime.watch_messages(None, &self.cache),
        ]
    }

    /// Pollers for pages without realtime coverage, at the configured
    /// intervals
    pub fn start_polling(&self) -> Vec<Poller> {
        let poll = self.config.poll;
        vec![
            self.cache.poll(vec![Resource::Dashboard], poll.dashboard),
            self.cache.poll(vec![Resource::Calls], poll.calls),
            self.cache.poll(
                vec![Resource::Conversations, Resource::Conversation],
                poll.conversations,
            ),
        ]
    }

    /// End the session. Local state is cleared even when the remote
    /// sign-out fails, and the realtime connection is closed so it stops
    /// joining with the old token.
    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        let session = self.session.take().ok_or(AuthError::SignedOut)?;
        self.realtime.shutdown();
        self.realtime = RealtimeBridge::disabled();
        self.cache.clear();
        self.client = self.client.anonymous();
        tracing::info!("Signed out");
        self.auth.sign_out(&session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{ChannelSpec, RealtimeTransport};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct StoppableTransport {
        stopped: AtomicBool,
    }

    impl RealtimeTransport for StoppableTransport {
        fn join(&self, _channel: &ChannelSpec) {}

        fn leave(&self, _channel: &ChannelSpec) {}

        fn shutdown(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn local_config() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    #[tokio::test]
    async fn test_local_session_start() {
        let context = SessionContext::start(local_config()).await.unwrap();
        assert_eq!(context.token().unwrap(), "dev-token");
        assert!(context.client().unwrap().has_token());
        assert!(!context.realtime().is_enabled());
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let mut context = SessionContext::start(local_config()).await.unwrap();
        let queries = context.queries().unwrap();
        queries
            .cache()
            .fetch(crate::queries::keys::settings(), || async { Ok::<_, String>(1u8) })
            .await
            .unwrap();

        context.sign_out().await.unwrap();

        assert!(matches!(context.token(), Err(AuthError::SignedOut)));
        assert!(context.queries().is_err());
        assert!(context
            .cache()
            .peek::<u8>(&crate::queries::keys::settings())
            .is_none());
        assert!(matches!(context.sign_out().await, Err(AuthError::SignedOut)));
    }

    #[tokio::test]
    async fn test_sign_out_closes_realtime() {
        let config = local_config();
        let auth = Authenticator::from_config(&config).unwrap();
        let session = auth.sign_in().await.unwrap();
        let client = ApiClient::new(&config.api_url, config.request_timeout)
            .unwrap()
            .authenticated(&session.access_token);
        let transport = Arc::new(StoppableTransport::default());
        let mut context = SessionContext::with_parts(
            config,
            auth,
            session,
            client,
            RealtimeBridge::new(transport.clone()),
        );

        let watchers = context.watch_all();
        assert!(context.realtime().is_enabled());

        context.sign_out().await.unwrap();
        assert!(transport.stopped.load(Ordering::SeqCst));
        assert!(!context.realtime().is_enabled());
        assert!(context.realtime().active_channels().is_empty());
        drop(watchers);
    }

    #[tokio::test]
    async fn test_watchers_join_realtime_channels() {
        let context = SessionContext::start(local_config()).await.unwrap();
        let watchers = context.watch_all();
        assert_eq!(context.realtime().active_channels().len(), 3);
        drop(watchers);
        assert!(context.realtime().active_channels().is_empty());
    }
}
