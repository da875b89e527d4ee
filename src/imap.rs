//! IMAP transport and session operations
//!
//! Provides timeout-bounded wrappers around `async-imap` operations. All
//! network calls are enforced to use TLS, and timeouts are derived from the
//! pipeline config. Only the read-side operations the digest needs are
//! exposed: connect/login, mailbox selection, UID search, and raw fetch.

use std::sync::Arc;
use std::time::Duration;

use async_imap::types::Fetch;
use async_imap::{Client, Session};
use futures::TryStreamExt;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Type alias for authenticated IMAP session over TLS
///
/// Wraps the TLS stream type to simplify signatures throughout the codebase.
pub type ImapSession = Session<tokio_rustls::client::TlsStream<TcpStream>>;

/// Get socket timeout duration from pipeline config
fn socket_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.socket_timeout_ms)
}

/// Connect to the IMAP server and authenticate
///
/// Performs the full connection sequence with timeouts:
/// 1. TCP connect
/// 2. TLS handshake with system root certificates
/// 3. Read IMAP greeting
/// 4. LOGIN authentication
///
/// # Security
///
/// Rejects insecure connections (`secure: false`) to prevent password
/// exposure.
///
/// # Timeouts
///
/// - TCP connect: `connect_timeout_ms`
/// - TLS handshake: `greeting_timeout_ms`
/// - Greeting read: `greeting_timeout_ms`
/// - LOGIN: `greeting_timeout_ms`
///
/// # Errors
///
/// - `InvalidInput` if `secure` is false or hostname is invalid for TLS SNI
/// - `Timeout` if any connection phase times out
/// - `AuthFailed` if authentication fails
/// - `Transport` for TCP, TLS, or greeting failures
pub async fn connect_authenticated(config: &Config) -> AppResult<ImapSession> {
    let account = &config.imap;
    if !account.secure {
        return Err(AppError::InvalidInput(
            "insecure IMAP is not supported; set MAIL_DIGEST_IMAP_SECURE=true".to_owned(),
        ));
    }

    let connect_duration = Duration::from_millis(config.connect_timeout_ms);
    let greeting_duration = Duration::from_millis(config.greeting_timeout_ms);

    let tcp = timeout(
        connect_duration,
        TcpStream::connect((account.host.as_str(), account.port)),
    )
    .await
    .map_err(|_| AppError::Timeout("tcp connect timeout".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Transport(format!("tcp connect failed: {e}"))))?;

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));

    let server_name = ServerName::try_from(account.host.clone())
        .map_err(|_| AppError::InvalidInput("invalid IMAP host for TLS SNI".to_owned()))?;
    let tls_stream = timeout(greeting_duration, connector.connect(server_name, tcp))
        .await
        .map_err(|_| AppError::Timeout("TLS handshake timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Transport(format!("TLS handshake failed: {e}"))))?;

    let mut client = Client::new(tls_stream);
    let greeting = timeout(greeting_duration, client.read_response())
        .await
        .map_err(|_| AppError::Timeout("IMAP greeting timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Transport(format!("IMAP greeting failed: {e}"))))?;

    if greeting.is_none() {
        return Err(AppError::Transport(
            "IMAP server closed connection before greeting".to_owned(),
        ));
    }

    let pass = account.pass.expose_secret();
    let session = timeout(greeting_duration, client.login(account.user.as_str(), pass))
        .await
        .map_err(|_| AppError::Timeout("IMAP login timeout".to_owned()))
        .and_then(|r| {
            r.map_err(|(e, _)| {
                let msg = e.to_string();
                if msg.to_ascii_lowercase().contains("auth") || msg.contains("LOGIN") {
                    AppError::AuthFailed(msg)
                } else {
                    AppError::Transport(msg)
                }
            })
        })?;

    Ok(session)
}

/// Select a mailbox in read-only mode
///
/// Uses `EXAMINE` so retrieving messages for the digest never marks them
/// as read.
pub async fn select_mailbox_readonly(
    config: &Config,
    session: &mut ImapSession,
    mailbox: &str,
) -> AppResult<()> {
    timeout(socket_timeout(config), session.examine(mailbox))
        .await
        .map_err(|_| AppError::Timeout(format!("EXAMINE timed out for mailbox '{mailbox}'")))
        .and_then(|r| {
            r.map_err(|e| AppError::Transport(format!("cannot examine mailbox '{mailbox}': {e}")))
        })?;
    Ok(())
}

/// Search for messages matching query
///
/// Runs `UID SEARCH` and returns matching UIDs in ascending order (oldest
/// first), preserving mailbox arrival order for the digest.
pub async fn uid_search(
    config: &Config,
    session: &mut ImapSession,
    query: &str,
) -> AppResult<Vec<u32>> {
    let set = timeout(socket_timeout(config), session.uid_search(query))
        .await
        .map_err(|_| AppError::Timeout("UID SEARCH timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Transport(format!("uid search failed: {e}"))))?;
    let mut uids: Vec<u32> = set.into_iter().collect();
    uids.sort_unstable();
    Ok(uids)
}

/// Fetch a single message with custom query
///
/// Runs a `UID FETCH` for a specific UID and returns the first result.
///
/// # Errors
///
/// - `Transport` if the UID does not exist or a protocol error occurs
/// - `Timeout` for slow network operations
async fn fetch_one(
    config: &Config,
    session: &mut ImapSession,
    uid: u32,
    query: &str,
) -> AppResult<Fetch> {
    let stream = timeout(
        socket_timeout(config),
        session.uid_fetch(uid.to_string(), query),
    )
    .await
    .map_err(|_| AppError::Timeout("UID FETCH timed out".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Transport(format!("uid fetch failed: {e}"))))?;
    let fetches: Vec<Fetch> = timeout(socket_timeout(config), stream.try_collect())
        .await
        .map_err(|_| AppError::Timeout("UID FETCH stream timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Transport(format!("uid fetch stream failed: {e}"))))?;

    fetches
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Transport(format!("message uid {uid} not found")))
}

/// Fetch full RFC822 message source
///
/// Returns raw bytes of the entire message. Uses `BODY.PEEK` so the fetch
/// does not set `\Seen`.
pub async fn fetch_raw_message(
    config: &Config,
    session: &mut ImapSession,
    uid: u32,
) -> AppResult<Vec<u8>> {
    let fetch = fetch_one(config, session, uid, "UID BODY.PEEK[]").await?;
    let body = fetch
        .body()
        .ok_or_else(|| AppError::Transport("message has no RFC822 body".to_owned()))?;
    Ok(body.to_vec())
}

/// Log out and close the session
///
/// Best-effort: the session is dropped either way, so failures only warrant
/// a transport error for the caller to log.
pub async fn logout(config: &Config, session: &mut ImapSession) -> AppResult<()> {
    timeout(socket_timeout(config), session.logout())
        .await
        .map_err(|_| AppError::Timeout("LOGOUT timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Transport(format!("LOGOUT failed: {e}"))))
}
