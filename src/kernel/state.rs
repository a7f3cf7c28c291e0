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

//! Runtime-owned mutable state: the symbol intern table, the global
//! environment, and open IPC endpoints. Lives in a thread-local slot on the
//! runtime owner thread; the boundary layer guarantees single-threaded access.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};

use super::{Handle, KResult};

pub(crate) struct State {
    /// Interned symbol names; id is the index. Id 0 is the empty symbol.
    pub syms: Vec<String>,
    pub sym_ids: HashMap<String, i64>,
    /// Global environment: symbol id -> value.
    pub env: HashMap<i64, Handle>,
    /// Open client connections keyed by handle id.
    pub conns: HashMap<i64, TcpStream>,
    pub next_conn: i64,
    /// Open listeners keyed by listener id.
    pub listeners: HashMap<i64, TcpListener>,
    pub next_listener: i64,
}

impl State {
    fn new() -> State {
        let mut s = State {
            syms: Vec::new(),
            sym_ids: HashMap::new(),
            env: HashMap::new(),
            conns: HashMap::new(),
            next_conn: 1,
            listeners: HashMap::new(),
            next_listener: 1,
        };
        // The empty symbol is the symbol null and must always intern to 0.
        s.syms.push(String::new());
        s.sym_ids.insert(String::new(), 0);
        s
    }
}

thread_local! {
    static STATE: RefCell<Option<State>> = const { RefCell::new(None) };
}

pub(crate) fn init() {
    STATE.with(|s| *s.borrow_mut() = Some(State::new()));
}

pub(crate) fn teardown() {
    STATE.with(|s| *s.borrow_mut() = None);
}

/// Run `f` with exclusive access to the state. Callers must not re-enter
/// `with` from inside `f`; the evaluator keeps its state accesses short and
/// never holds the borrow across a nested evaluation.
pub(crate) fn with<R>(f: impl FnOnce(&mut State) -> KResult<R>) -> KResult<R> {
    STATE.with(|s| {
        let mut slot = s.borrow_mut();
        let state = slot.as_mut().ok_or_else(|| "runtime not initialized".to_string())?;
        f(state)
    })
}

pub(crate) fn intern(name: &str) -> KResult<i64> {
    with(|s| {
        if let Some(&id) = s.sym_ids.get(name) {
            return Ok(id);
        }
        let id = s.syms.len() as i64;
        s.syms.push(name.to_string());
        s.sym_ids.insert(name.to_string(), id);
        Ok(id)
    })
}

pub(crate) fn sym_name(id: i64) -> KResult<String> {
    with(|s| {
        s.syms
            .get(id as usize)
            .cloned()
            .ok_or_else(|| format!("domain: unknown symbol id {id}"))
    })
}

pub(crate) fn env_set(id: i64, value: Handle) -> KResult<()> {
    with(|s| {
        s.env.insert(id, value);
        Ok(())
    })
}

pub(crate) fn env_get(id: i64) -> KResult<Option<Handle>> {
    with(|s| Ok(s.env.get(&id).cloned()))
}
