use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pbxlink_frame::{AmiCodec, HeaderBlock};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::channel::{ActionChannel, Dispatch, RESPONSE_KEY};
use crate::config::AmiConfig;
use crate::error::{AmiError, Result};
use crate::event::{AmiEvent, EventSubscription};

/// `Response` value of a successful login.
pub const LOGIN_SUCCESS: &str = "Success";

const REQUEST_QUEUE: usize = 64;
const EVENT_CAPACITY: usize = 1024;

type Responder = oneshot::Sender<Result<HeaderBlock>>;

enum Request {
    Send { action: Action, reply: Responder },
    Close,
}

/// Logged-in manager connection.
///
/// A background task owns the socket. Any number of actions may be in
/// flight at once; each [`send`](Self::send) resolves with the response
/// carrying its own `ActionID`. Events fan out to every subscription.
pub struct AmiClient {
    requests: mpsc::Sender<Request>,
    events: broadcast::Receiver<Arc<AmiEvent>>,
    driver: JoinHandle<Result<()>>,
    login: HeaderBlock,
}

impl AmiClient {
    /// Validate `config`, connect and log in.
    pub async fn connect(config: &AmiConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.address();
        debug!(%addr, "connecting to manager");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| AmiError::Connect { addr, source })?;
        Self::handshake(stream, config).await
    }

    /// Log in over an already-open stream and start the driver task.
    ///
    /// Resolves once the login response arrives: ready on `Response: Success`,
    /// [`AmiError::AuthenticationFailed`] otherwise.
    pub async fn handshake<T>(io: T, config: &AmiConfig) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        config.validate_credentials()?;

        let mut framed = Framed::new(io, AmiCodec::new());
        let mut channel: ActionChannel<Responder> = ActionChannel::new();

        let login = Action::new("Login")
            .field("Username", config.username.as_str())
            .field("Secret", config.secret.as_str())
            .field("Events", if config.events { "on" } else { "off" });
        let (login_tx, _login_rx) = oneshot::channel();
        let outbound = channel.send(&login, login_tx)?;
        framed.send(outbound.text).await?;

        let response = loop {
            let message = match framed.next().await {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(err.into()),
                None => return Err(AmiError::ConnectionClosed),
            };
            match channel.dispatch(message) {
                Dispatch::Response { message, pending }
                    if pending.action_id == outbound.action_id =>
                {
                    break message;
                }
                Dispatch::Event(event) => {
                    debug!(event = event.name(), "dropping event before login completed");
                }
                other => debug!(?other, "dropping message before login completed"),
            }
        };

        if response.get(RESPONSE_KEY) != Some(LOGIN_SUCCESS) {
            let message = response.get("Message").map(str::to_string);
            warn!(username = %config.username, ?message, "manager login rejected");
            let _ = framed.get_mut().shutdown().await;
            return Err(AmiError::AuthenticationFailed { message });
        }
        info!(username = %config.username, "manager login accepted");

        let (requests, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (event_tx, events) = broadcast::channel(EVENT_CAPACITY);
        let driver = tokio::spawn(drive(framed, channel, request_rx, event_tx));

        Ok(Self {
            requests,
            events,
            driver,
            login: response,
        })
    }

    /// The response to the login action.
    pub fn login_response(&self) -> &HeaderBlock {
        &self.login
    }

    /// Send `action` and wait for its correlated response.
    ///
    /// There is no timeout; an action the manager never answers stays
    /// pending until the connection closes.
    pub async fn send(&self, action: Action) -> Result<HeaderBlock> {
        action.validate()?;
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Send { action, reply })
            .await
            .map_err(|_| AmiError::ConnectionClosed)?;
        response.await.map_err(|_| AmiError::ConnectionClosed)?
    }

    /// Every event, published on `eventAny`.
    pub fn events(&self) -> EventSubscription {
        EventSubscription::new(self.events.resubscribe(), None)
    }

    /// Events named `name` only, published on `event<name>`.
    pub fn subscribe(&self, name: impl Into<String>) -> EventSubscription {
        EventSubscription::new(self.events.resubscribe(), Some(name.into()))
    }

    /// Send `Logoff`, then close the connection.
    pub async fn logoff(self) -> Result<HeaderBlock> {
        let response = self.send(Action::new("Logoff")).await;
        let _ = self.requests.send(Request::Close).await;
        match self.driver.await {
            Ok(Ok(())) | Ok(Err(AmiError::ConnectionClosed)) => {}
            Ok(Err(err)) => debug!(error = %err, "manager connection ended with error"),
            Err(err) => warn!(error = %err, "manager driver task failed"),
        }
        response
    }

    /// Close without logging off.
    pub async fn close(self) -> Result<()> {
        let _ = self.requests.send(Request::Close).await;
        join_driver(self.driver).await
    }

    /// Wait until the manager closes the connection.
    ///
    /// Returns the error that ended it: [`AmiError::ConnectionClosed`] for a
    /// clean remote close.
    pub async fn closed(self) -> Result<()> {
        let Self {
            requests, driver, ..
        } = self;
        let result = join_driver(driver).await;
        drop(requests);
        result
    }
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("login", &self.login)
            .field("finished", &self.driver.is_finished())
            .finish_non_exhaustive()
    }
}

async fn join_driver(driver: JoinHandle<Result<()>>) -> Result<()> {
    match driver.await {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "manager driver task failed");
            Err(AmiError::ConnectionClosed)
        }
    }
}

async fn drive<T>(
    mut framed: Framed<T, AmiCodec>,
    mut channel: ActionChannel<Responder>,
    mut requests: mpsc::Receiver<Request>,
    events: broadcast::Sender<Arc<AmiEvent>>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let result = loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Send { action, reply }) => {
                    let outbound = match channel.send(&action, reply) {
                        Ok(outbound) => outbound,
                        Err(err) => {
                            warn!(action = action.name(), error = %err, "rejected action");
                            continue;
                        }
                    };
                    debug!(
                        action = action.name(),
                        action_id = %outbound.action_id,
                        "sending action"
                    );
                    if let Err(err) = framed.send(outbound.text).await {
                        break Err(err.into());
                    }
                }
                Some(Request::Close) | None => {
                    if let Err(err) = framed.get_mut().shutdown().await {
                        debug!(error = %err, "error shutting down manager stream");
                    }
                    break Ok(());
                }
            },
            message = framed.next() => match message {
                Some(Ok(message)) => match channel.dispatch(message) {
                    Dispatch::Response { message, pending } => {
                        debug!(action_id = %pending.action_id, "response");
                        let _ = pending.responder.send(Ok(message));
                    }
                    Dispatch::Event(event) => {
                        debug!(event = event.name(), "event");
                        let _ = events.send(Arc::new(event));
                    }
                    Dispatch::Unmatched(message) => {
                        debug!(
                            action_id = message.get("ActionID").unwrap_or(""),
                            "dropping unmatched response"
                        );
                    }
                    Dispatch::Ignored(message) => {
                        debug!(fields = message.len(), "dropping unclassified message");
                    }
                },
                Some(Err(err)) => break Err(err.into()),
                None => break Err(AmiError::ConnectionClosed),
            },
        }
    };

    let abandoned = channel.drain();
    if !abandoned.is_empty() {
        debug!(count = abandoned.len(), "abandoning pending actions");
    }
    for pending in abandoned {
        let _ = pending.responder.send(Err(AmiError::ConnectionClosed));
    }

    match &result {
        Ok(()) => info!("manager connection closed"),
        Err(err) => info!(code = err.code(), error = %err, "manager connection ended"),
    }
    result
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

    use super::*;

    fn config() -> AmiConfig {
        AmiConfig::new("pbx.local", 5038, "admin", "s3cret")
    }

    async fn read_message(reader: &mut BufReader<DuplexStream>) -> HeaderBlock {
        let mut text = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 || line == "\r\n" {
                break;
            }
            text.push_str(&line);
        }
        pbxlink_frame::parse_header_block(&text)
    }

    async fn login(reply: &str) -> (Result<AmiClient>, BufReader<DuplexStream>) {
        let (client_io, server_io) = duplex(8192);
        let config = config();
        let manager = async move {
            let mut server = BufReader::new(server_io);
            let login = read_message(&mut server).await;
            assert_eq!(login.get("Action"), Some("Login"));
            assert_eq!(login.get("Username"), Some("admin"));
            assert_eq!(login.get("Secret"), Some("s3cret"));
            assert_eq!(login.get("Events"), Some("on"));
            let response = format!(
                "Asterisk Call Manager/5.0.1\r\nResponse: {reply}\r\nActionID: {}\r\nMessage: Authentication {reply}\r\n\r\n",
                login.get("ActionID").unwrap()
            );
            server.get_mut().write_all(response.as_bytes()).await.unwrap();
            server
        };

        tokio::join!(AmiClient::handshake(client_io, &config), manager)
    }

    #[tokio::test]
    async fn login_success_makes_client_ready() {
        let (client, _server) = login("Success").await;
        let client = client.unwrap();
        assert_eq!(
            client.login_response().get("Message"),
            Some("Authentication Success")
        );
    }

    #[tokio::test]
    async fn login_failure_is_authentication_error() {
        let (client, _server) = login("Error").await;
        let err = client.unwrap_err();
        assert_eq!(err.code(), "E_AMI_AUTH_FAILED");
        assert!(matches!(
            err,
            AmiError::AuthenticationFailed { message: Some(ref m) } if m == "Authentication Error"
        ));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_io() {
        let (client_io, _server_io) = duplex(64);
        let mut config = config();
        config.secret.clear();
        let err = AmiClient::handshake(client_io, &config).await.unwrap_err();
        assert!(matches!(err, AmiError::MissingSecret));
    }

    #[tokio::test]
    async fn connect_validates_host_first() {
        let err = AmiClient::connect(&AmiConfig::default()).await.unwrap_err();
        assert!(matches!(err, AmiError::MissingHostname));
    }

    #[tokio::test]
    async fn concurrent_actions_resolve_out_of_order() {
        let (client, mut server) = login("Success").await;
        let client = Arc::new(client.unwrap());

        let ping = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.send(Action::new("Ping")).await }
        });
        let first = read_message(&mut server).await;

        let settings = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.send(Action::new("CoreSettings")).await }
        });
        let second = read_message(&mut server).await;
        assert_ne!(first.get("ActionID"), second.get("ActionID"));

        // Answer in reverse order.
        let (ping_msg, settings_msg) = if first.get("Action") == Some("Ping") {
            (first, second)
        } else {
            (second, first)
        };
        let replies = format!(
            "Response: Success\r\nActionID: {}\r\nAMIversion: 5.0.1\r\n\r\nResponse: Success\r\nActionID: {}\r\nPing: Pong\r\n\r\n",
            settings_msg.get("ActionID").unwrap(),
            ping_msg.get("ActionID").unwrap(),
        );
        server.get_mut().write_all(replies.as_bytes()).await.unwrap();

        let ping = ping.await.unwrap().unwrap();
        let settings = settings.await.unwrap().unwrap();
        assert_eq!(ping.get("Ping"), Some("Pong"));
        assert_eq!(settings.get("AMIversion"), Some("5.0.1"));
    }

    #[tokio::test]
    async fn event_reaches_any_and_named_subscribers_once() {
        let (client, mut server) = login("Success").await;
        let client = client.unwrap();
        let mut any = client.events();
        let mut shutdown = client.subscribe("Shutdown");

        server
            .get_mut()
            .write_all(b"Event: Shutdown\r\n\r\nEvent: FullyBooted\r\n\r\n")
            .await
            .unwrap();

        let from_any = any.recv().await.unwrap();
        let from_named = shutdown.recv().await.unwrap();
        assert_eq!(from_any.name(), "Shutdown");
        assert!(Arc::ptr_eq(&from_any, &from_named));
        assert_eq!(any.recv().await.unwrap().name(), "FullyBooted");

        drop(server);
        assert!(matches!(
            shutdown.recv().await,
            Err(AmiError::ConnectionClosed)
        ));
        assert!(matches!(client.closed().await, Err(AmiError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn pending_action_fails_when_connection_drops() {
        let (client, mut server) = login("Success").await;
        let client = Arc::new(client.unwrap());
        let pending = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.send(Action::new("Ping")).await }
        });
        read_message(&mut server).await;
        drop(server);
        assert!(matches!(
            pending.await.unwrap(),
            Err(AmiError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn logoff_sends_action_and_closes() {
        let (client, mut server) = login("Success").await;
        let client = client.unwrap();

        let peer = tokio::spawn(async move {
            let logoff = read_message(&mut server).await;
            assert_eq!(logoff.get("Action"), Some("Logoff"));
            let reply = format!(
                "Response: Goodbye\r\nActionID: {}\r\nMessage: Thanks for all the fish.\r\n\r\n",
                logoff.get("ActionID").unwrap()
            );
            server.get_mut().write_all(reply.as_bytes()).await.unwrap();
            server
        });

        let response = client.logoff().await.unwrap();
        assert_eq!(response.get("Response"), Some("Goodbye"));
        let _server = peer.await.unwrap();
    }
}
