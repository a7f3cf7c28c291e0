//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! WebSocket server. Text frames carry source strings evaluated via
//! `eval_str`; binary frames carry serialized ASTs evaluated via `eval_obj`.
//! Replies are serialized values as binary frames; per-frame errors become
//! JSON text frames and the session continues.
//!
//! Concurrency contract: the whole server is a cooperative loop on the
//! runtime owner thread. Handlers are `spawn_local` tasks, so every runtime
//! call happens on that thread; suspension points exist only at frame
//! read/write. Drive `run`/`run_until` inside a `tokio::task::LocalSet` on a
//! current-thread runtime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::rc::Rc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{info, warn};

use crate::rt;

type ConnMap = Rc<RefCell<HashMap<SocketAddr, tokio::task::JoinHandle<()>>>>;

pub struct WsServer {
    addr: String,
}

impl WsServer {
    pub fn new(addr: &str) -> WsServer {
        WsServer {
            addr: addr.to_string(),
        }
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run(&self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until the shutdown future resolves (or SIGINT/SIGTERM). On
    /// shutdown the listener stops accepting, then every tracked session is
    /// cancelled at its next suspension point — an in-flight evaluation
    /// always completes first.
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!(addr = %self.addr, "websocket server listening");
        let conns: ConnMap = Rc::new(RefCell::new(HashMap::new()));
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                signal = tokio::signal::ctrl_c() => {
                    let _ = signal;
                    info!("interrupt, shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let conns_for_task = conns.clone();
                            let handle = tokio::task::spawn_local(async move {
                                if let Err(e) = handle_socket(stream, peer).await {
                                    warn!(%peer, error = %e, "session ended with error");
                                }
                                conns_for_task.borrow_mut().remove(&peer);
                            });
                            conns.borrow_mut().insert(peer, handle);
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
        for (peer, handle) in conns.borrow_mut().drain() {
            info!(%peer, "closing session");
            handle.abort();
        }
        Ok(())
    }
}

async fn handle_socket(stream: TcpStream, peer: SocketAddr) -> Result<(), WsError> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    info!(%peer, "session opened");
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(src) => match eval_text(&src) {
                Ok(reply) => ws.send(Message::Binary(reply)).await?,
                Err(msg) => ws.send(Message::Text(error_frame(&msg))).await?,
            },
            Message::Binary(bytes) => match eval_binary(&bytes) {
                Ok(reply) => ws.send(Message::Binary(reply)).await?,
                Err(msg) => ws.send(Message::Text(error_frame(&msg))).await?,
            },
            Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!(%peer, "session closed");
    Ok(())
}

/// Evaluate a source string and serialize the result.
fn eval_text(src: &str) -> Result<Vec<u8>, String> {
    let result = rt::eval_str(src).map_err(|e| e.to_string())?;
    rt::ser_obj(&result).map_err(|e| e.to_string())
}

/// Wrap the frame as a U8 vector, deserialize, evaluate, serialize back.
fn eval_binary(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let wrapped = rt::u8_vector(bytes).map_err(|e| e.to_string())?;
    let raw = rt::read_u8_vector(&wrapped).map_err(|e| e.to_string())?;
    let ast = rt::de_obj(&raw).map_err(|e| e.to_string())?;
    let result = rt::eval_obj(&ast).map_err(|e| e.to_string())?;
    rt::ser_obj(&result).map_err(|e| e.to_string())
}

fn error_frame(msg: &str) -> String {
    serde_json::json!({ "error": msg }).to_string()
}
