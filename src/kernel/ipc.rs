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

//! Native IPC framing: length-prefixed codec payloads over TCP. The runtime
//! owns both ends — `hopen`/`write` on the client side, `ipc_listen`/`run`
//! as the server's own accept-and-dispatch loop.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use super::{err, eval, ser, state, Handle, KResult};

fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> KResult<()> {
    let len = (payload.len() as u32).to_le_bytes();
    stream.write_all(&len).map_err(|e| format!("io: {e}"))?;
    stream.write_all(payload).map_err(|e| format!("io: {e}"))?;
    Ok(())
}

fn read_frame(stream: &mut TcpStream) -> KResult<Option<Vec<u8>>> {
    let mut len = [0u8; 4];
    match stream.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(format!("io: {e}")),
    }
    let n = u32::from_le_bytes(len) as usize;
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).map_err(|e| format!("io: {e}"))?;
    Ok(Some(buf))
}

// ===== Client side =====

pub(crate) fn hopen(url: &str) -> KResult<i64> {
    let stream = TcpStream::connect(url).map_err(|e| format!("io: connect {url}: {e}"))?;
    stream
        .set_nodelay(true)
        .map_err(|e| format!("io: {e}"))?;
    state::with(|s| {
        let fd = s.next_conn;
        s.next_conn += 1;
        s.conns.insert(fd, stream);
        Ok(fd)
    })
}

pub(crate) fn hclose(fd: i64) -> KResult<()> {
    state::with(|s| {
        s.conns
            .remove(&fd)
            .map(|_| ())
            .ok_or_else(|| format!("domain: no connection {fd}"))
    })
}

/// Send a value and block for the reply.
pub(crate) fn write(fd: i64, h: &Handle) -> KResult<Handle> {
    let payload = ser::ser_obj(h)?;
    let mut stream = state::with(|s| {
        s.conns
            .get(&fd)
            .and_then(|c| c.try_clone().ok())
            .ok_or_else(|| format!("domain: no connection {fd}"))
    })?;
    write_frame(&mut stream, &payload)?;
    let reply = read_frame(&mut stream)?.ok_or_else(|| "io: connection closed".to_string())?;
    ser::de_obj(&reply)
}

// ===== Server side =====

pub(crate) fn listen(port: u16) -> KResult<i64> {
    let listener =
        TcpListener::bind(("0.0.0.0", port)).map_err(|e| format!("io: bind {port}: {e}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| format!("io: {e}"))?;
    state::with(|s| {
        let id = s.next_listener;
        s.next_listener += 1;
        s.listeners.insert(id, listener);
        Ok(id)
    })
}

pub(crate) fn close_listener(id: i64) -> KResult<()> {
    state::with(|s| {
        s.listeners
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| format!("domain: no listener {id}"))
    })
}

/// The runtime's own event loop: accept connections on every open listener
/// and serve them to completion, one at a time. Returns once the last
/// listener has been closed.
pub(crate) fn run() -> KResult<()> {
    enum Step {
        Done,
        Conn(TcpStream),
        Idle,
    }
    loop {
        let step = state::with(|s| {
            if s.listeners.is_empty() {
                return Ok(Step::Done);
            }
            for listener in s.listeners.values() {
                match listener.accept() {
                    Ok((stream, _)) => return Ok(Step::Conn(stream)),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => return Err(format!("io: accept: {e}")),
                }
            }
            Ok(Step::Idle)
        })?;
        match step {
            Step::Done => return Ok(()),
            Step::Conn(mut stream) => {
                stream
                    .set_nonblocking(false)
                    .map_err(|e| format!("io: {e}"))?;
                serve(&mut stream)?;
            }
            Step::Idle => std::thread::sleep(Duration::from_millis(5)),
        }
    }
}

fn serve(stream: &mut TcpStream) -> KResult<()> {
    while let Some(request) = read_frame(stream)? {
        let reply = match ser::de_obj(&request).and_then(|h| eval::eval_obj(&h)) {
            Ok(h) => h,
            Err(msg) => err(msg),
        };
        let bytes = ser::ser_obj(&reply)?;
        write_frame(stream, &bytes)?;
    }
    Ok(())
}
