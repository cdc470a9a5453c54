use broker_core::{BufferPool, FrameParser, PublishFrame, StreamManager};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slog::Logger;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

const DATA_LISTENER: Token = Token(0);
const CONTROL_LISTENER: Token = Token(1);
const TOKEN_BASE: usize = 2;

const RECV_CHUNK: usize = 8192;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Tag {
    Data,
    Control,
}

impl Tag {
    fn as_str(self) -> &'static str {
        match self {
            Tag::Data => "data",
            Tag::Control => "control",
        }
    }
}

struct Connection {
    stream: TcpStream,
    tag: Tag,
    parser: FrameParser,
    pending_write: VecDeque<u8>,
}

/// Event-driven TCP server for the ingest path. Runs a single accept/readiness loop; replies on a
/// connection are emitted in the order their publish frames were received.
pub struct Engine {
    poll: Poll,
    events: Events,
    data_listener: TcpListener,
    control_listener: TcpListener,
    connections: Vec<Option<Connection>>,
    free: Vec<usize>,
    request_pool: Arc<BufferPool>,
    manager: Arc<StreamManager>,
    log: Logger,
}

impl Engine {
    pub fn new(
        data_addr: SocketAddr,
        control_addr: SocketAddr,
        request_pool: Arc<BufferPool>,
        manager: Arc<StreamManager>,
        log: Logger,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;

        let mut data_listener = TcpListener::bind(data_addr)?;
        let mut control_listener = TcpListener::bind(control_addr)?;

        poll.registry()
            .register(&mut data_listener, DATA_LISTENER, Interest::READABLE)?;
        poll.registry()
            .register(&mut control_listener, CONTROL_LISTENER, Interest::READABLE)?;

        Ok(Engine {
            poll,
            events: Events::with_capacity(1024),
            data_listener,
            control_listener,
            connections: Vec::new(),
            free: Vec::new(),
            request_pool,
            manager,
            log,
        })
    }

    /// The data listener's bound local address, e.g. to discover the ephemeral port chosen when
    /// constructed with port `0`.
    pub fn local_data_addr(&self) -> io::Result<SocketAddr> {
        self.data_listener.local_addr()
    }

    /// Runs the accept/readiness loop until the process is terminated.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.poll.poll(&mut self.events, None)?;
            self.dispatch_ready_events()?;
        }
    }

    fn dispatch_ready_events(&mut self) -> io::Result<()> {
        let ready: Vec<(Token, bool, bool)> = self
            .events
            .iter()
            .map(|event| (event.token(), event.is_readable(), event.is_writable()))
            .collect();

        for (token, readable, writable) in ready {
            match token {
                DATA_LISTENER => self.accept_loop(Tag::Data)?,
                CONTROL_LISTENER => self.accept_loop(Tag::Control)?,
                token => {
                    let index = token.0 - TOKEN_BASE;
                    if index >= self.connections.len() || self.connections[index].is_none() {
                        continue;
                    }
                    if readable {
                        self.handle_readable(index);
                    }
                    if writable && self.connections[index].is_some() {
                        self.handle_writable(index);
                    }
                }
            }
        }

        Ok(())
    }

    fn accept_loop(&mut self, tag: Tag) -> io::Result<()> {
        loop {
            let accepted = match tag {
                Tag::Data => self.data_listener.accept(),
                Tag::Control => self.control_listener.accept(),
            };

            let mut stream = match accepted {
                Ok((stream, _addr)) => stream,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(err),
            };

            let index = self.free.pop().unwrap_or_else(|| {
                self.connections.push(None);
                self.connections.len() - 1
            });

            let token = Token(TOKEN_BASE + index);
            self.poll
                .registry()
                .register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;

            slog::debug!(self.log, "connection opened"; "tag" => tag.as_str());

            self.connections[index] = Some(Connection {
                stream,
                tag,
                parser: FrameParser::new(self.request_pool.get()),
                pending_write: VecDeque::new(),
            });
        }
    }

    fn handle_readable(&mut self, index: usize) {
        let pool = self.request_pool.clone();
        let manager = self.manager.clone();
        let log = self.log.clone();

        let mut recv_buf = [0u8; RECV_CHUNK];
        let mut close = false;
        let mut to_ack: Vec<[u8; 16]> = Vec::new();

        {
            let conn = match &mut self.connections[index] {
                Some(conn) => conn,
                None => return,
            };

            'read: loop {
                match conn.stream.read(&mut recv_buf) {
                    Ok(0) => {
                        close = true;
                        break;
                    }
                    Ok(n) => {
                        if conn.tag == Tag::Control {
                            close = true;
                            break;
                        }

                        conn.parser.feed(&recv_buf[..n]);
                        let frames = match conn.parser.drain_frames(&pool) {
                            Ok(frames) => frames,
                            Err((frames, err)) => {
                                slog::warn!(log, "closing connection on parse error"; "error" => %err);
                                close = true;
                                frames
                            }
                        };

                        for frame in frames {
                            match record_id_for(&manager, &frame) {
                                Ok(bytes) => to_ack.push(bytes),
                                Err(err) => {
                                    slog::warn!(log, "publish failed"; "error" => %err);
                                }
                            }
                            frame.release(&pool);
                        }

                        if close {
                            break 'read;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        close = true;
                        break;
                    }
                }
            }

            for bytes in to_ack {
                conn.pending_write.extend(bytes.iter().copied());
            }
        }

        if close {
            self.close_connection(index);
        } else {
            self.handle_writable(index);
        }
    }

    fn handle_writable(&mut self, index: usize) {
        let mut close = false;

        if let Some(conn) = &mut self.connections[index] {
            loop {
                let chunk: Vec<u8> = {
                    let (first, _) = conn.pending_write.as_slices();
                    if first.is_empty() {
                        break;
                    }
                    first.to_vec()
                };

                match conn.stream.write(&chunk) {
                    Ok(0) => {
                        close = true;
                        break;
                    }
                    Ok(n) => {
                        conn.pending_write.drain(..n);
                    }
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        close = true;
                        break;
                    }
                }
            }
        }

        if close {
            self.close_connection(index);
        }
    }

    fn close_connection(&mut self, index: usize) {
        if let Some(mut conn) = self.connections[index].take() {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            self.request_pool.release(conn.parser.into_backing());
            slog::debug!(self.log, "connection closed");
        }
        self.free.push(index);
    }
}

fn record_id_for(
    manager: &StreamManager,
    frame: &PublishFrame,
) -> Result<[u8; 16], crate::error::EngineError> {
    let record_id = manager.write(frame.stream_name(), frame.payload())?;
    Ok(record_id.to_bytes())
}
