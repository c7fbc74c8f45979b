//! TCP (optionally TLS) front end for the relay.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use strata_store::Storage;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

use crate::protocol::{ServerMessage, encode_line};
use crate::relay::Relay;
use crate::session::{ConnId, MAX_SESSIONS};
use crate::tls::{TlsFiles, load_acceptor};
use crate::NetError;

/// Longest accepted client frame in bytes, newline included. Longer frames
/// are skipped up to their newline.
pub const MAX_FRAME: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_sessions: usize,
    /// How often session worlds are pumped.
    pub tick: Duration,
    pub tls: Option<TlsFiles>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            max_sessions: MAX_SESSIONS,
            tick: Duration::from_millis(50),
            tls: None,
        }
    }
}

enum Event {
    Connected {
        id: ConnId,
        outbox: UnboundedSender<ServerMessage>,
    },
    Line {
        id: ConnId,
        line: String,
    },
    Closed {
        id: ConnId,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

pub struct Server {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    relay: Relay,
    tick: Duration,
}

impl Server {
    /// Binds the listener. Unreadable TLS material is logged and the server
    /// falls back to plain TCP.
    pub async fn bind(config: &ServerConfig, storage: Storage) -> Result<Self, NetError> {
        let acceptor = config.tls.as_ref().and_then(|files| match load_acceptor(files) {
            Ok(acceptor) => Some(acceptor),
            Err(e) => {
                log::warn!("TLS disabled, serving plain TCP: {e}");
                None
            }
        });
        let listener = TcpListener::bind(config.addr).await?;
        log::info!(
            "listening on {} ({})",
            listener.local_addr()?,
            if acceptor.is_some() { "tls" } else { "tcp" }
        );
        Ok(Self {
            listener,
            acceptor,
            relay: Relay::new(config.max_sessions, storage),
            tick: config.tick,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    #[inline]
    pub fn is_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Accepts connections forever.
    pub async fn run(self) -> Result<(), NetError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then flushes every
    /// session world before returning.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), NetError> {
        let Server {
            listener,
            acceptor,
            relay,
            tick,
        } = self;
        let (events_tx, events_rx) = unbounded();
        thread::Builder::new()
            .name("strata-hub".into())
            .spawn(move || hub(relay, events_rx, tick))?;

        tokio::pin!(shutdown);
        let mut next_id: ConnId = 1;
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => Some(accepted),
                _ = &mut shutdown => None,
            };
            let Some(accepted) = accepted else {
                break;
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::error!("accept failed: {e}");
                    continue;
                }
            };
            let id = next_id;
            next_id += 1;
            log::info!("connection {id} from {peer}");
            let events = events_tx.clone();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls) => serve_connection(id, tls, events).await,
                        Err(e) => log::warn!("TLS handshake with {peer} failed: {e}"),
                    },
                    None => serve_connection(id, stream, events).await,
                }
                log::info!("connection {id} closed");
            });
        }

        log::info!("shutting down");
        let (done, finished) = oneshot::channel();
        if events_tx.send(Event::Shutdown { done }).is_ok() {
            let _ = finished.await;
        }
        Ok(())
    }
}

/// Owns the relay on its own thread, since session worlds wait on the
/// storage worker. Applies connection events in arrival order and pumps
/// session worlds every `tick`.
fn hub(mut relay: Relay, events: Receiver<Event>, tick: Duration) {
    let mut next_tick = Instant::now() + tick;
    loop {
        let now = Instant::now();
        if now >= next_tick {
            relay.tick(now);
            next_tick = now + tick;
        }
        match events.recv_timeout(next_tick.saturating_duration_since(now)) {
            Ok(Event::Connected { id, outbox }) => relay.connect(id, outbox),
            Ok(Event::Line { id, line }) => relay.handle_line(id, &line),
            Ok(Event::Closed { id }) => relay.disconnect(id),
            Ok(Event::Shutdown { done }) => {
                relay.shutdown();
                let _ = done.send(());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                relay.shutdown();
                break;
            }
        }
    }
    log::debug!("hub stopped");
}

enum Frame {
    Line,
    Oversize,
    Eof,
}

/// Reads one newline-terminated frame into `buf`, never buffering more than
/// [`MAX_FRAME`] bytes.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = (&mut *reader)
        .take(MAX_FRAME as u64)
        .read_until(b'\n', buf)
        .await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if n < MAX_FRAME || buf.last() == Some(&b'\n') {
        return Ok(Frame::Line);
    }
    loop {
        buf.clear();
        let n = (&mut *reader)
            .take(MAX_FRAME as u64)
            .read_until(b'\n', buf)
            .await?;
        if n == 0 {
            return Ok(Frame::Eof);
        }
        if buf.last() == Some(&b'\n') {
            buf.clear();
            return Ok(Frame::Oversize);
        }
    }
}

async fn serve_connection<S>(id: ConnId, stream: S, events: Sender<Event>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();
    if events.send(Event::Connected { id, outbox }).is_err() {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let line = match encode_line(&msg) {
                Ok(line) => line,
                Err(e) => {
                    log::error!("connection {id}: encode failed: {e}");
                    continue;
                }
            };
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                log::debug!("connection {id}: write failed: {e}");
                break;
            }
            if let Err(e) = write_half.flush().await {
                log::debug!("connection {id}: flush failed: {e}");
                break;
            }
        }
    });

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    loop {
        match read_frame(&mut reader, &mut buf).await {
            Ok(Frame::Eof) => break,
            Ok(Frame::Oversize) => {
                log::debug!("connection {id}: dropped a frame over {MAX_FRAME} bytes");
            }
            Ok(Frame::Line) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let event = Event::Line {
                    id,
                    line: trimmed.to_string(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::debug!("connection {id}: read failed: {e}");
                break;
            }
        }
    }

    // the relay drops the outbox on Closed, which ends the writer
    let _ = events.send(Event::Closed { id });
    let _ = writer.await;
}
