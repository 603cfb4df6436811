//! Connection handlers for the Postgres wire front end.
//!
//! A connection authenticates with a cleartext password checked against
//! `proxy.users`. Authentication creates the connection's [`Session`], which
//! the query handler then drives with every simple query the client sends.

use crate::error::ProxyError;
use async_trait::async_trait;
use futures::Sink;
use futures::sink::SinkExt;
use futures::stream;
use pgwire::api::auth::{
    DefaultServerParameterProvider, StartupHandler, finish_authentication, protocol_negotiation,
    save_startup_parameters_to_metadata,
};
use pgwire::api::query::SimpleQueryHandler;
use pgwire::api::results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response, Tag};
use pgwire::api::{ClientInfo, ClientPortalStore, PgWireConnectionState, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::startup::Authentication;
use pgwire::messages::{PgWireBackendMessage, PgWireFrontendMessage};
use sqlward_core::ProxyConfig;
use sqlward_session::{Reply, ResultTable, Session, SessionServices};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The session of one client connection, created once authentication
/// succeeds.
pub type SharedSession = Arc<Mutex<Option<Session>>>;

const SQLSTATE_INTERNAL: &str = "XX000";

// ============================================================================
// Startup
// ============================================================================

/// Cleartext password authentication against `proxy.users`.
pub struct GatewayStartupHandler {
    config: Arc<ProxyConfig>,
    services: Arc<SessionServices>,
    session: SharedSession,
    parameter_provider: DefaultServerParameterProvider,
}

impl GatewayStartupHandler {
    pub fn new(
        config: Arc<ProxyConfig>,
        services: Arc<SessionServices>,
        session: SharedSession,
    ) -> Self {
        Self {
            config,
            services,
            session,
            parameter_provider: DefaultServerParameterProvider::default(),
        }
    }
}

#[async_trait]
impl StartupHandler for GatewayStartupHandler {
    async fn on_startup<C>(
        &self,
        client: &mut C,
        message: PgWireFrontendMessage,
    ) -> PgWireResult<()>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match message {
            PgWireFrontendMessage::Startup(ref startup) => {
                protocol_negotiation(client, startup).await?;
                save_startup_parameters_to_metadata(client, startup);
                client.set_state(PgWireConnectionState::AuthenticationInProgress);
                client
                    .send(PgWireBackendMessage::Authentication(
                        Authentication::CleartextPassword,
                    ))
                    .await?;
            }
            PgWireFrontendMessage::PasswordMessageFamily(pwd) => {
                let password = pwd.into_password()?;
                let user = client
                    .metadata()
                    .get("user")
                    .cloned()
                    .unwrap_or_default();

                if !self.config.accepts(&user, &password.password) {
                    let error = ProxyError::AuthenticationFailed(user.clone());
                    tracing::warn!(error = %error, "Client rejected");
                    return Err(PgWireError::InvalidPassword(user));
                }

                let host = client.socket_addr().ip().to_string();
                let session = Session::new(self.services.clone(), user.clone(), host.clone());
                tracing::info!(
                    session_id = session.id(),
                    user = %user,
                    client = %host,
                    "Client authenticated"
                );
                *self.session.lock().await = Some(session);

                finish_authentication(client, &self.parameter_provider).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Feeds simple-query text into the connection's session.
pub struct GatewayQueryHandler {
    session: SharedSession,
}

impl GatewayQueryHandler {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    async fn process_query(&self, query: &str) -> Result<Vec<Reply>, ProxyError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ProxyError::NoSession)?;
        Ok(session.handle(query).await)
    }
}

fn error_info(message: String) -> Box<ErrorInfo> {
    Box::new(ErrorInfo::new(
        "ERROR".to_owned(),
        SQLSTATE_INTERNAL.to_owned(),
        message,
    ))
}

/// Render a result table with every column as text.
fn table_response(table: ResultTable) -> PgWireResult<Response> {
    let fields: Vec<FieldInfo> = table
        .columns
        .iter()
        .map(|name| FieldInfo::new(name.clone().into(), None, None, Type::TEXT, FieldFormat::Text))
        .collect();
    let schema = Arc::new(fields);

    let rows: Vec<PgWireResult<pgwire::messages::data::DataRow>> = table
        .rows
        .into_iter()
        .map(|row| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            for value in row {
                encoder.encode_field(&value)?;
            }
            Ok(encoder.take_row())
        })
        .collect();

    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

/// Translate one session reply into a wire response.
pub fn reply_to_response(reply: Reply) -> PgWireResult<Response> {
    match reply {
        Reply::Ok => Ok(Response::Execution(Tag::new("OK"))),
        Reply::Table(table) => table_response(table),
        Reply::Error(message) => Ok(Response::Error(error_info(message))),
    }
}

#[async_trait]
impl SimpleQueryHandler for GatewayQueryHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        let replies = self
            .process_query(query)
            .await
            .map_err(|e| PgWireError::UserError(error_info(e.to_string())))?;

        if replies.is_empty() {
            return Ok(vec![Response::EmptyQuery]);
        }
        replies.into_iter().map(reply_to_response).collect()
    }
}

// ============================================================================
// Server handlers
// ============================================================================

/// Per-connection handler set handed to pgwire.
pub struct GatewayServerHandlers {
    query_handler: Arc<GatewayQueryHandler>,
    startup_handler: Arc<GatewayStartupHandler>,
}

impl GatewayServerHandlers {
    /// Handlers sharing one fresh, unauthenticated session slot.
    pub fn new(config: Arc<ProxyConfig>, services: Arc<SessionServices>) -> Self {
        let session: SharedSession = Arc::new(Mutex::new(None));
        Self {
            query_handler: Arc::new(GatewayQueryHandler::new(session.clone())),
            startup_handler: Arc::new(GatewayStartupHandler::new(config, services, session)),
        }
    }
}

impl PgWireServerHandlers for GatewayServerHandlers {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.query_handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.startup_handler.clone()
    }
}
