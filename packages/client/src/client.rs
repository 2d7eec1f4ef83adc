//! The addressed storage client.
//!
//! A [`Client`] owns its resolver cache and its session table. Nothing is
//! shared between two clients unless the caller shares it explicitly (for
//! example one [`StaticRegistry`](crate::StaticRegistry) handed to both).

use std::sync::Arc;

use bytes::Bytes;
use keyhost_api::BEARER;
use keyhost_core::{Keypair, PublicIdentity, ResourceAddress};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, NetworkProfile};
use crate::error::{Error, Result};
use crate::resolver::{Resolver, StaticRegistry};
use crate::session::{Session, SessionManager};

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    /// Writes never fall back to anonymous.
    fn requires_session(self) -> bool {
        matches!(self, Self::Put | Self::Delete)
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Whether a request carries the session credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Attach the session for the address identity if there is one.
    #[default]
    Include,
    /// Always send anonymously.
    Omit,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub address: ResourceAddress,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub credentials: Credentials,
}

impl Request {
    pub fn new(method: Method, address: &str) -> Result<Self> {
        Ok(Self {
            method,
            address: ResourceAddress::parse(address)?,
            body: None,
            content_type: None,
            credentials: Credentials::default(),
        })
    }

    pub fn get(address: &str) -> Result<Self> {
        Self::new(Method::Get, address)
    }

    pub fn put(address: &str, body: impl Into<Bytes>) -> Result<Self> {
        let mut req = Self::new(Method::Put, address)?;
        req.body = Some(body.into());
        Ok(req)
    }

    pub fn delete(address: &str) -> Result<Self> {
        Self::new(Method::Delete, address)
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A host's answer. Error statuses are reported here, not as [`Error`]s.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `true` for statuses in `200..400`.
    pub ok: bool,
}

impl Response {
    async fn read(resp: reqwest::Response) -> Result<Self> {
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
            ok: (200..400).contains(&status),
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client {
    http: reqwest::Client,
    resolver: Arc<Resolver>,
    sessions: SessionManager,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder { config }.build()
    }

    /// A client on the network described by `KEYHOST_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// A client resolving through a shared in-memory registry.
    pub fn testnet(registry: StaticRegistry) -> Result<Self> {
        Self::new(ClientConfig::new(NetworkProfile::testnet(registry)))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    // --- Sessions -----------------------------------------------------------

    pub async fn signup(&self, keypair: &Keypair, host: &PublicIdentity) -> Result<Session> {
        self.sessions.signup(keypair, host).await
    }

    pub async fn login(&self, keypair: &Keypair, host: &PublicIdentity) -> Result<Session> {
        self.sessions.login(keypair, host).await
    }

    pub async fn signin(&self, keypair: &Keypair) -> Result<Session> {
        self.sessions.signin(keypair).await
    }

    pub fn current_session(&self, identity: &PublicIdentity) -> Option<Session> {
        self.sessions.current_session(identity)
    }

    pub async fn verify(&self, identity: &PublicIdentity) -> bool {
        self.sessions.verify(identity).await
    }

    pub async fn logout(&self, identity: &PublicIdentity) {
        self.sessions.logout(identity).await
    }

    pub fn export_sessions(&self) -> Vec<Session> {
        self.sessions.export_sessions()
    }

    pub fn import_sessions(&self, sessions: impl IntoIterator<Item = Session>) {
        self.sessions.import_sessions(sessions)
    }

    // --- Data ---------------------------------------------------------------

    pub async fn get(&self, address: &str) -> Result<Response> {
        self.fetch(Request::get(address)?).await
    }

    pub async fn put(&self, address: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.fetch(Request::put(address, body)?).await
    }

    pub async fn delete(&self, address: &str) -> Result<Response> {
        self.fetch(Request::delete(address)?).await
    }

    /// Dispatch `request` to the host serving its address.
    ///
    /// With a session attached, that is the session's host; otherwise it is
    /// whatever the address identity's record names.
    pub async fn fetch(&self, request: Request) -> Result<Response> {
        let identity = request.address.identity;

        let session = match request.credentials {
            Credentials::Omit => None,
            Credentials::Include => match self.sessions.current_session(&identity) {
                Some(session) => Some(session),
                None if request.method.requires_session() => {
                    return Err(Error::NotAuthenticated(identity))
                }
                None => None,
            },
        };

        // A credential only ever goes to the host that issued it. Anonymous
        // requests follow the identity's published record.
        let base = match &session {
            Some(session) => self.resolver.resolve_url(&session.host).await?,
            None => self.resolver.resolve_url(&identity).await?,
        };
        let credential = session.map(|s| s.credential);
        let url = request.address.endpoint_url(&base);
        debug!(
            method = ?request.method,
            %url,
            authenticated = credential.is_some(),
            "dispatching request"
        );

        let mut builder = self.http.request(request.method.into(), &url);
        if let Some(credential) = credential {
            builder = builder.header(AUTHORIZATION, format!("{BEARER} {credential}"));
        }
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        Response::read(builder.send().await?).await
    }

    /// Child addresses of a directory. A missing trailing `/` is implied.
    pub async fn list(&self, address: &str) -> Result<Vec<ResourceAddress>> {
        let mut request = Request::get(address)?;
        request.address = request.address.into_directory();

        let response = self.fetch(request).await?;
        if !response.ok {
            return Err(Error::HostError {
                status: response.status,
            });
        }

        response
            .text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| ResourceAddress::parse(l).map_err(Error::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profile(mut self, profile: NetworkProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn cache_ttl(mut self, min: std::time::Duration, max: std::time::Duration) -> Self {
        self.config.min_cache_ttl = min;
        self.config.max_cache_ttl = max;
        self
    }

    pub fn build(self) -> Result<Client> {
        let http = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()?;
        let backend = self.config.profile.backend(http.clone());
        let resolver = Arc::new(Resolver::new(
            backend,
            self.config.min_cache_ttl,
            self.config.max_cache_ttl,
        ));
        Ok(Client {
            sessions: SessionManager::new(http.clone(), resolver.clone()),
            http,
            resolver,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
