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

//! WebSocket server tests. The server owns the runtime on its own thread;
//! the client side never touches the runtime, so expected reply bytes are
//! spelled out against the wire codec directly.

#![cfg(feature = "server")]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use raydb::Runtime;
use tokio_tungstenite::tungstenite::Message;

/// An i64 atom on the wire: type code -5, then the payload little-endian.
fn i64_frame(v: i64) -> Vec<u8> {
    let mut out = vec![(-5i8) as u8];
    out.extend_from_slice(&v.to_le_bytes());
    out
}

#[test]
fn text_and_binary_frames_evaluate() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // The server thread owns the runtime and the cooperative event loop.
    let server = std::thread::spawn(move || {
        let _rt = Runtime::init().unwrap();
        let tokio_rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        let ws = raydb::server::WsServer::new(&format!("127.0.0.1:{port}"));
        local.block_on(&tokio_rt, async move {
            ws.run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
        });
    });

    let client_rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    client_rt.block_on(async move {
        // The listener binds inside the server loop; retry until it is up.
        let url = format!("ws://127.0.0.1:{port}");
        let mut ws = loop {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((ws, _)) => break ws,
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        };

        // Text frames evaluate as source and come back as serialized values.
        ws.send(Message::Text("1+2*3".into())).await.unwrap();
        match ws.next().await.unwrap().unwrap() {
            Message::Binary(bytes) => assert_eq!(bytes, i64_frame(7)),
            other => panic!("expected a binary reply, got {other:?}"),
        }

        // Binary frames carry serialized ASTs; an atom evaluates to itself.
        ws.send(Message::Binary(i64_frame(41))).await.unwrap();
        match ws.next().await.unwrap().unwrap() {
            Message::Binary(bytes) => assert_eq!(bytes, i64_frame(41)),
            other => panic!("expected a binary reply, got {other:?}"),
        }

        // Errors become JSON text frames and the session continues.
        ws.send(Message::Text("(1+".into())).await.unwrap();
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => assert!(text.contains("\"error\""), "got {text}"),
            other => panic!("expected an error text frame, got {other:?}"),
        }

        ws.send(Message::Text("2+2".into())).await.unwrap();
        match ws.next().await.unwrap().unwrap() {
            Message::Binary(bytes) => assert_eq!(bytes, i64_frame(4)),
            other => panic!("expected a binary reply, got {other:?}"),
        }

        ws.close(None).await.unwrap();
    });

    shutdown_tx.send(()).unwrap();
    server.join().unwrap();
}
