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

//! Synchronous IPC tests: framing against a byte-echo peer, pool lifecycle,
//! and port validation. The echo thread never touches the runtime, so all
//! runtime calls stay on the owner thread.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;

use raydb::{rt, value_of, Client, Error, Runtime, Server, Value};

static ENGINE_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// A frame-echo peer: reads length-prefixed frames and writes them back.
fn spawn_echo() -> (u16, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        loop {
            let mut len = [0u8; 4];
            if stream.read_exact(&mut len).is_err() {
                break;
            }
            let n = u32::from_le_bytes(len) as usize;
            let mut buf = vec![0u8; n];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&len).unwrap();
            stream.write_all(&buf).unwrap();
        }
    });
    (port, handle)
}

#[test]
fn client_round_trip_over_the_wire() {
    let _guard = lock();
    let (port, echo) = spawn_echo();
    let _rt = Runtime::init().unwrap();

    let client = Client::new(&format!("127.0.0.1:{port}")).unwrap();
    let conn = client.acquire().unwrap();
    assert_eq!(client.active_connections(), 1);
    assert!(conn.is_open());

    // Strings lower to character vectors; the echo peer returns the frame
    // verbatim, so the reply decodes to the same value.
    let reply = conn.execute("1+2").unwrap();
    assert_eq!(value_of(&reply).unwrap(), Value::Chars("1+2".into()));

    // A compiled expression survives the frame round trip structurally.
    let expr = raydb::col("age").ge_(35i64);
    let sent = expr.compile().unwrap();
    let reply = conn.execute(&sent).unwrap();
    assert_eq!(
        rt::ser_obj(&reply).unwrap(),
        rt::ser_obj(&sent).unwrap()
    );

    client.close(&conn).unwrap();
    assert_eq!(client.active_connections(), 0);
    assert_eq!(conn.execute("x").unwrap_err(), Error::ConnectionClosed);
    assert_eq!(conn.close().unwrap_err(), Error::ConnectionClosed);

    drop(client);
    echo.join().unwrap();
}

#[test]
fn dispose_closes_every_pooled_connection() {
    let _guard = lock();
    let (port, echo) = spawn_echo();
    let _rt = Runtime::init().unwrap();

    let client = Client::new(&format!("127.0.0.1:{port}")).unwrap();
    let conn = client.acquire().unwrap();
    client.dispose().unwrap();
    assert_eq!(client.active_connections(), 0);
    assert!(!conn.is_open());
    drop(client);
    echo.join().unwrap();
}

#[test]
fn ports_are_validated_up_front() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    assert_eq!(
        Client::new("127.0.0.1:0").unwrap_err(),
        Error::InvalidPort(0)
    );
    assert_eq!(
        Client::new("127.0.0.1:70000").unwrap_err(),
        Error::InvalidPort(70_000)
    );
    assert!(matches!(
        Client::new("nohost"),
        Err(Error::Conversion(_))
    ));

    assert_eq!(Server::new(0).unwrap_err(), Error::InvalidPort(0));
    assert_eq!(Server::new(65_536).unwrap_err(), Error::InvalidPort(65_536));
}

#[test]
fn server_listener_lifecycle() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let mut server = Server::new(port as i64).unwrap();
    server.bind().unwrap();
    assert!(server.listener_id().is_some());
    // Binding twice on one server is rejected.
    assert!(server.bind().is_err());
    server.close().unwrap();
    assert!(server.listener_id().is_none());
    // Closing an unbound server is a no-op.
    server.close().unwrap();

    // With no listener left, the runtime loop returns immediately.
    rt::runtime_run().unwrap();
}

#[test]
fn hopen_to_a_dead_port_surfaces_the_runtime_error() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    // Bind-and-drop to find a port nothing listens on.
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let client = Client::new(&format!("127.0.0.1:{port}")).unwrap();
    assert!(matches!(client.acquire(), Err(Error::Runtime(_))));
}
