//! RTMP publish handshake.

use std::future::Future;

use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::sessions::{
    ClientSession, ClientSessionConfig, ClientSessionEvent, ClientSessionResult,
    PublishRequestType, StreamMetadata,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use livecast_ipc::StreamQuality;

use crate::auth::{self, Challenge, Rejection, SourceCredentials};
use crate::connection::HandshakeTimeouts;
use crate::error::TransportError;
use crate::publisher::{Established, PublishRequest, PublishSession, Publisher};
use crate::TransportResult;

const READ_BUFFER_SIZE: usize = 4096;

/// Publishes to an RTMP server.
#[derive(Debug, Clone, Default)]
pub struct RtmpPublisher {
    timeouts: HandshakeTimeouts,
}

impl RtmpPublisher {
    /// Create a publisher with the given handshake bounds.
    pub fn new(timeouts: HandshakeTimeouts) -> Self {
        Self { timeouts }
    }

    /// Handshake bounds in use.
    pub fn timeouts(&self) -> HandshakeTimeouts {
        self.timeouts
    }
}

impl Publisher for RtmpPublisher {
    type Session = RtmpSession;

    fn connect(
        &self,
        request: PublishRequest,
    ) -> impl Future<Output = TransportResult<Established<RtmpSession>>> + Send + 'static {
        let timeouts = self.timeouts;
        async move {
            let connection = connect_rtmp(&request, timeouts).await?;

            let (lost_tx, lost_rx) = oneshot::channel();
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let task = tokio::spawn(hold_link(connection, shutdown_rx, lost_tx));

            Ok(Established {
                session: RtmpSession {
                    shutdown: Some(shutdown_tx),
                    task: Some(task),
                    close_timeout: timeouts.close,
                },
                link: lost_rx,
            })
        }
    }
}

/// An accepted RTMP publish link.
///
/// Dropping it also ends the link; `close` additionally waits for the
/// unpublish to go out.
pub struct RtmpSession {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    close_timeout: std::time::Duration,
}

impl PublishSession for RtmpSession {
    fn close(mut self) -> impl Future<Output = ()> + Send + 'static {
        let shutdown = self.shutdown.take();
        let task = self.task.take();
        let close_timeout = self.close_timeout;
        async move {
            if let Some(tx) = shutdown {
                let _ = tx.send(());
            }
            if let Some(task) = task {
                if timeout(close_timeout, task).await.is_err() {
                    warn!("RTMP link did not wind down in time");
                }
            }
            info!("RTMP session closed");
        }
    }
}

impl Drop for RtmpSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// RTMP connection with session state.
struct RtmpConnection {
    /// TCP stream to the RTMP server.
    stream: TcpStream,
    /// RTMP client session for protocol handling.
    session: ClientSession,
}

impl RtmpConnection {
    async fn send(&mut self, result: ClientSessionResult) -> TransportResult<()> {
        if let ClientSessionResult::OutboundResponse(packet) = result {
            self.stream.write_all(&packet.bytes).await?;
        }
        Ok(())
    }

    /// Feed server bytes in, flush responses, and hand back raised events.
    async fn process(&mut self, bytes: &[u8]) -> TransportResult<Vec<ClientSessionEvent>> {
        let results = self
            .session
            .handle_input(bytes)
            .map_err(|e| TransportError::Protocol(format!("Session input error: {:?}", e)))?;

        let mut events = Vec::new();
        for result in results {
            match result {
                ClientSessionResult::OutboundResponse(packet) => {
                    self.stream.write_all(&packet.bytes).await?;
                }
                ClientSessionResult::RaisedEvent(event) => events.push(event),
                _ => {}
            }
        }
        Ok(events)
    }

    /// Read until `accept` recognises an event or the step runs out of time.
    async fn await_event<F>(
        &mut self,
        step: &'static str,
        limit: std::time::Duration,
        mut accept: F,
    ) -> TransportResult<()>
    where
        F: FnMut(ClientSessionEvent) -> Option<TransportResult<()>>,
    {
        let deadline = Instant::now() + limit;
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = tokio::time::timeout_at(deadline, self.stream.read(&mut read_buf))
                .await
                .map_err(|_| TransportError::Timeout(step))??;
            if n == 0 {
                return Err(TransportError::ConnectionFailed(format!(
                    "Connection closed while waiting for {step}"
                )));
            }

            for event in self.process(&read_buf[..n]).await? {
                if let Some(outcome) = accept(event) {
                    return outcome;
                }
            }
        }
    }
}

/// `application?signature=…[&authmod=adobe&user=…]`, the form the server
/// authorises against.
fn authorized_app_name(
    request: &PublishRequest,
    auth_pairs: &[(&'static str, String)],
) -> TransportResult<String> {
    let mut url = request
        .connection
        .rtmp_url()
        .map_err(|e| TransportError::InvalidParameters(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("signature", request.signature.as_str());
        for (key, value) in auth_pairs {
            query.append_pair(key, value);
        }
    }

    let app = url.path().trim_start_matches('/');
    if app != request.connection.application {
        return Err(TransportError::InvalidParameters(format!(
            "application {:?} does not survive URL encoding",
            request.connection.application
        )));
    }
    match url.query() {
        Some(query) => Ok(format!("{app}?{query}")),
        None => Ok(app.to_string()),
    }
}

fn connect_outcome(event: ClientSessionEvent) -> Option<TransportResult<()>> {
    match event {
        ClientSessionEvent::ConnectionRequestAccepted => Some(Ok(())),
        ClientSessionEvent::ConnectionRequestRejected { description } => {
            Some(Err(TransportError::ConnectionRejected(description)))
        }
        other => {
            trace!("Received event: {:?}", other);
            None
        }
    }
}

fn publish_outcome(event: ClientSessionEvent) -> Option<TransportResult<()>> {
    match event {
        ClientSessionEvent::PublishRequestAccepted => Some(Ok(())),
        // BadName, Denied, Failed and friends
        ClientSessionEvent::UnhandleableOnStatusCode { code }
            if code.starts_with("NetStream.Publish.") && code != "NetStream.Publish.Start" =>
        {
            Some(Err(TransportError::PublishRejected(code)))
        }
        other => {
            trace!("Received event: {:?}", other);
            None
        }
    }
}

fn stream_metadata(quality: StreamQuality) -> StreamMetadata {
    let (width, height) = quality.frame_size();
    let mut metadata = StreamMetadata::new();
    metadata.video_width = Some(width);
    metadata.video_height = Some(height);
    metadata.video_frame_rate = Some(StreamQuality::FRAME_RATE as f32);
    metadata.video_bitrate_kbps = Some(quality.video_bitrate_kbps());
    metadata.audio_bitrate_kbps = Some(StreamQuality::AUDIO_BITRATE_KBPS);
    metadata.audio_sample_rate = Some(StreamQuality::AUDIO_SAMPLE_RATE);
    metadata
}

#[instrument(
    name = "rtmp_connect",
    skip_all,
    fields(target = %request.connection.target(), generation = request.generation)
)]
async fn connect_rtmp(
    request: &PublishRequest,
    timeouts: HandshakeTimeouts,
) -> TransportResult<RtmpConnection> {
    let url = request
        .connection
        .rtmp_url()
        .map_err(|e| TransportError::InvalidParameters(e.to_string()))?;
    let credentials = request
        .connection
        .username
        .as_deref()
        .map(|user| SourceCredentials {
            user,
            password: request.connection.password.as_deref().unwrap_or_default(),
        });

    // At most two connects: the first names the user, the second answers.
    let mut answer: Option<(Challenge, String)> = None;
    let mut connection = loop {
        let auth_pairs = match credentials {
            Some(credentials) => auth::query_pairs(
                credentials,
                answer.as_ref().map(|(challenge, cc)| (challenge, cc.as_str())),
            ),
            None => Vec::new(),
        };
        let app_name = authorized_app_name(request, &auth_pairs)?;
        let mut connection = open_session(&url, app_name, timeouts).await?;

        let description = match connection
            .await_event("connection acceptance", timeouts.connection_accept, connect_outcome)
            .await
        {
            Ok(()) => break connection,
            Err(TransportError::ConnectionRejected(description)) => description,
            Err(e) => return Err(e),
        };

        match (credentials.is_some(), answer.is_none(), auth::classify(&description)) {
            (true, true, Rejection::NeedAuth(challenge)) => {
                debug!("Server asked for source authentication, answering challenge");
                answer = Some((challenge, auth::client_challenge()));
            }
            (true, _, Rejection::AuthFailed) => {
                warn!("Source authentication failed");
                return Err(TransportError::ConnectionRejected(
                    "source authentication failed".to_string(),
                ));
            }
            _ => return Err(TransportError::ConnectionRejected(description)),
        }
    };
    debug!("Connection accepted by server");

    let publish_request = connection
        .session
        .request_publishing(request.connection.stream_name.clone(), PublishRequestType::Live)
        .map_err(|e| TransportError::Protocol(format!("Publish request failed: {:?}", e)))?;
    connection.send(publish_request).await?;

    connection
        .await_event("publish acceptance", timeouts.publish_accept, publish_outcome)
        .await?;

    let metadata = connection
        .session
        .publish_metadata(&stream_metadata(request.quality))
        .map_err(|e| TransportError::Protocol(format!("Metadata publish failed: {:?}", e)))?;
    connection.send(metadata).await?;

    info!(quality = ?request.quality, "RTMP publish accepted");
    Ok(connection)
}

/// Handshake on a fresh TCP connection and send the application connect.
async fn open_session(
    url: &Url,
    app_name: String,
    timeouts: HandshakeTimeouts,
) -> TransportResult<RtmpConnection> {
    let (stream, leftover_bytes) = timeout(timeouts.connect, handshake(url))
        .await
        .map_err(|_| TransportError::Timeout("TCP connect and handshake"))??;

    debug!("Handshake complete, creating RTMP session");

    let mut config = ClientSessionConfig::new();
    config.tc_url = Some(format!("{}?{}", url.as_str(), app_query(&app_name)));
    let (session, initial_results) = ClientSession::new(config)
        .map_err(|e| TransportError::Protocol(format!("Session creation failed: {:?}", e)))?;

    let mut connection = RtmpConnection { stream, session };
    for result in initial_results {
        connection.send(result).await?;
    }
    if !leftover_bytes.is_empty() {
        connection.process(&leftover_bytes).await?;
    }

    debug!(app = %url.path(), "Requesting RTMP connection");
    let connect_request = connection
        .session
        .request_connection(app_name)
        .map_err(|e| TransportError::Protocol(format!("Connection request failed: {:?}", e)))?;
    connection.send(connect_request).await?;
    Ok(connection)
}

fn app_query(app_name: &str) -> &str {
    app_name.split_once('?').map(|(_, q)| q).unwrap_or_default()
}

/// TCP connect plus the C0/C1 → S0/S1/S2 → C2 exchange.
async fn handshake(url: &Url) -> TransportResult<(TcpStream, Vec<u8>)> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::InvalidParameters("Missing host".to_string()))?;
    // IPv6 literals come back bracketed.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port().unwrap_or(livecast_ipc::DEFAULT_RTMP_PORT);

    info!(host = %host, port = port, "Connecting to RTMP server");
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("TCP connect failed: {}", e)))?;

    let mut handshake = Handshake::new(PeerType::Client);
    let p0_p1 = handshake
        .generate_outbound_p0_and_p1()
        .map_err(|e| TransportError::Protocol(format!("Handshake generation failed: {:?}", e)))?;
    stream.write_all(&p0_p1).await?;

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(TransportError::ConnectionFailed(
                "Connection closed during handshake".to_string(),
            ));
        }

        match handshake.process_bytes(&buf[..n]) {
            Ok(HandshakeProcessResult::InProgress { response_bytes }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
            }
            Ok(HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
                return Ok((stream, remaining_bytes));
            }
            Err(e) => {
                return Err(TransportError::Protocol(format!("Handshake failed: {:?}", e)));
            }
        }
    }
}

/// Keep answering the server until shutdown or until the link drops.
async fn hold_link(
    mut connection: RtmpConnection,
    mut shutdown: oneshot::Receiver<()>,
    lost: oneshot::Sender<TransportError>,
) {
    let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Unpublishing");
                if let Ok(results) = connection.session.stop_publishing() {
                    for result in results {
                        if connection.send(result).await.is_err() {
                            break;
                        }
                    }
                }
                let _ = connection.stream.shutdown().await;
                return;
            }
            read = connection.stream.read(&mut read_buf) => {
                let error = match read {
                    Ok(0) => TransportError::ConnectionLost("Server closed the connection".to_string()),
                    Ok(n) => match connection.process(&read_buf[..n]).await {
                        Ok(events) => {
                            for event in events {
                                trace!("Received event: {:?}", event);
                            }
                            continue;
                        }
                        Err(e) => TransportError::ConnectionLost(e.to_string()),
                    },
                    Err(e) => TransportError::ConnectionLost(e.to_string()),
                };
                warn!("RTMP link lost: {}", error);
                let _ = lost.send(error);
                return;
            }
        }
    }
}
