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

//! Synchronous IPC: a client with a connection pool, and the server façade
//! over the runtime's own listener and dispatch loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use crate::convert::Value;
use crate::expr::Expression;
use crate::query::SelectQueryBuilder;
use crate::rt::{self, Error, Handle, Result};

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// Anything a connection can submit: lowered to a runtime value first.
pub trait ToWire {
    fn to_wire(&self) -> Result<Handle>;
}

impl ToWire for str {
    /// Strings travel as character vectors (source text for the remote).
    fn to_wire(&self) -> Result<Handle> {
        crate::convert::to_runtime(&Value::Chars(self.to_string()))
    }
}

impl ToWire for Expression {
    fn to_wire(&self) -> Result<Handle> {
        self.compile()
    }
}

impl ToWire for SelectQueryBuilder {
    /// A select builder travels as its evaluable `(select, dict)` form.
    fn to_wire(&self) -> Result<Handle> {
        let ast = rt::list_new()?;
        rt::push(&ast, &crate::expr::Operation::Select.primitive()?)?;
        rt::push(&ast, &self.build_dict()?)?;
        Ok(ast)
    }
}

impl ToWire for Handle {
    fn to_wire(&self) -> Result<Handle> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ConnState {
    fd: i64,
    open: bool,
    opened_at: Instant,
}

/// An open connection to a remote runtime. Cloneable; all clones share the
/// same underlying handle and open/closed state.
#[derive(Clone, Debug)]
pub struct Connection {
    state: Rc<RefCell<ConnState>>,
}

impl Connection {
    fn open(fd: i64) -> Connection {
        Connection {
            state: Rc::new(RefCell::new(ConnState {
                fd,
                open: true,
                opened_at: Instant::now(),
            })),
        }
    }

    /// Connection identity within its client's pool.
    pub fn id(&self) -> i64 {
        self.state.borrow().fd
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Time since the connection was opened.
    pub fn age(&self) -> std::time::Duration {
        self.state.borrow().opened_at.elapsed()
    }

    /// Lower `data` to its runtime form, submit it, and return the reply.
    pub fn execute<T: ToWire + ?Sized>(&self, data: &T) -> Result<Handle> {
        let fd = {
            let state = self.state.borrow();
            if !state.open {
                return Err(Error::ConnectionClosed);
            }
            state.fd
        };
        rt::ipc_write(fd, &data.to_wire()?)
    }

    pub fn close(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(Error::ConnectionClosed);
        }
        state.open = false;
        rt::hclose(state.fd)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A client bound to a `host:port` URL, owning a pool of connections keyed
/// by connection identity.
#[derive(Debug)]
pub struct Client {
    url: String,
    pool: RefCell<HashMap<i64, Connection>>,
}

impl Client {
    /// Validate the URL's port up front.
    pub fn new(url: &str) -> Result<Client> {
        rt::port_of(url)?;
        Ok(Client {
            url: url.to_string(),
            pool: RefCell::new(HashMap::new()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a new connection and register it in the pool.
    pub fn acquire(&self) -> Result<Connection> {
        let fd = rt::hopen(&self.url)?;
        let conn = Connection::open(fd);
        self.pool.borrow_mut().insert(fd, conn.clone());
        Ok(conn)
    }

    /// Close a connection and drop it from the pool.
    pub fn close(&self, conn: &Connection) -> Result<()> {
        conn.close()?;
        self.pool.borrow_mut().remove(&conn.id());
        Ok(())
    }

    pub fn active_connections(&self) -> usize {
        self.pool.borrow().len()
    }

    /// Close every pooled connection.
    pub fn dispose(&self) -> Result<()> {
        let conns: Vec<Connection> = self.pool.borrow_mut().drain().map(|(_, c)| c).collect();
        for conn in conns {
            if conn.is_open() {
                conn.close()?;
            }
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The synchronous server: binds a runtime listener and hands control to the
/// runtime's own dispatch loop. The host side neither parses the wire nor
/// dispatches requests.
#[derive(Debug)]
pub struct Server {
    port: i64,
    listener: Option<i64>,
}

impl Server {
    pub fn new(port: i64) -> Result<Server> {
        if !(1..=65_535).contains(&port) {
            return Err(Error::InvalidPort(port));
        }
        Ok(Server {
            port,
            listener: None,
        })
    }

    /// Bind `0.0.0.0:port` and record the listener id.
    pub fn bind(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Err(Error::Runtime("runtime error: server already bound".into()));
        }
        self.listener = Some(rt::ipc_listen(self.port)?);
        Ok(())
    }

    pub fn listener_id(&self) -> Option<i64> {
        self.listener
    }

    /// Block inside the runtime's event loop until the listener is closed.
    pub fn listen(&self) -> Result<()> {
        if self.listener.is_none() {
            return Err(Error::Runtime("runtime error: server is not bound".into()));
        }
        rt::runtime_run()
    }

    /// Close the listener; a blocked `listen()` returns once the runtime
    /// loop observes it.
    pub fn close(&mut self) -> Result<()> {
        match self.listener.take() {
            Some(id) => rt::ipc_close_listener(id),
            None => Ok(()),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
