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

//! raydb WebSocket server binary.
//!
//! The runtime is single-threaded: the server runs a current-thread tokio
//! runtime with a LocalSet on the same OS thread that initialized the
//! runtime, so every evaluation happens on the owner thread.

use clap::Parser;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "raydb-server",
    version,
    about = "WebSocket server for the Ray columnar runtime"
)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(long, default_value_t = 8765)]
    port: u16,

    /// Evaluate a source file at startup (e.g. to register tables)
    #[arg(long)]
    init: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let _runtime = match raydb::Runtime::init() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: failed to initialize the runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Some(ref path) = args.init {
        let src = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: cannot read init script {path}: {e}");
                std::process::exit(1);
            }
        };
        for line in src.lines().filter(|l| !l.trim().is_empty()) {
            if let Err(e) = raydb::rt::eval_str(line) {
                eprintln!("Error in init script: {line}: {e}");
                std::process::exit(1);
            }
        }
    }

    let tokio_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let local = LocalSet::new();
    let server = raydb::server::WsServer::new(&format!("{}:{}", args.host, args.port));
    if let Err(e) = local.block_on(&tokio_rt, server.run()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
