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

//! The runtime boundary: the single choke point through which the rest of the
//! crate reaches the Ray runtime. Every entry enforces thread affinity,
//! converts runtime error values into `Error::Runtime`, and nothing above
//! this module touches kernel internals.

use std::marker::PhantomData;
use std::sync::Mutex;
use std::thread::ThreadId;

use crate::kernel::{self, eval, ipc, query, ser, state, Body, ColData, KResult};

pub use crate::kernel::Handle;

// Type code constants, re-exported at the boundary.
pub mod types {
    pub use crate::kernel::{
        B8, BINARY, C8, DATE, DICT, ERR, F64, GUID, I16, I32, I64, LIST, SYM, TABLE, TIME,
        TIMESTAMP, U8, UNARY, VARY,
    };
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced at the runtime boundary and by the layers above it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Call from a thread other than the runtime owner.
    ThreadAffinity,
    /// Call before `Runtime::init` or after teardown.
    NotInitialized,
    /// A second `Runtime::init` while one is live.
    AlreadyInitialized,
    /// The runtime returned an error value; message preserved verbatim.
    Runtime(String),
    /// Operation on a closed connection.
    ConnectionClosed,
    /// Port outside `1..=65535`.
    InvalidPort(i64),
    /// A handle's type code does not match the wrapper's declared code.
    TypeMismatch { expected: i8, actual: i8 },
    /// Registry lookup miss.
    UnknownTypeCode(i8),
    /// Query data accepted positionally or by keyword, not both or neither.
    Arity,
    /// Upsert with a non-positive key-column count.
    UpsertArity,
    /// A host value that cannot be coerced to a runtime value.
    Conversion(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ThreadAffinity => f.write_str("call from a non-owner thread"),
            Error::NotInitialized => f.write_str("runtime not initialized"),
            Error::AlreadyInitialized => f.write_str("runtime already initialized"),
            Error::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Error::ConnectionClosed => f.write_str("connection is closed"),
            Error::InvalidPort(p) => write!(f, "invalid port {p}"),
            Error::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected code {expected}, got {actual}")
            }
            Error::UnknownTypeCode(code) => write!(f, "unknown type code {code}"),
            Error::Arity => f.write_str("query data must be positional or keyword, not both"),
            Error::UpsertArity => f.write_str("upsert requires at least one key column"),
            Error::Conversion(msg) => write!(f, "conversion failure: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

fn kres<T>(r: KResult<T>) -> Result<T> {
    r.map_err(Error::Runtime)
}

/// Error values are surfaced at the first call boundary.
fn check_handle(h: Handle) -> Result<Handle> {
    let msg = match &*h.body() {
        Body::Err(msg) => Some(msg.clone()),
        _ => None,
    };
    match msg {
        Some(msg) => Err(Error::Runtime(msg)),
        None => Ok(h),
    }
}

// ---------------------------------------------------------------------------
// Initialization & thread affinity
// ---------------------------------------------------------------------------

static OWNER: Mutex<Option<ThreadId>> = Mutex::new(None);

fn guard() -> Result<()> {
    let owner = OWNER.lock().unwrap_or_else(|e| e.into_inner());
    match *owner {
        None => Err(Error::NotInitialized),
        Some(t) if t == std::thread::current().id() => Ok(()),
        Some(_) => Err(Error::ThreadAffinity),
    }
}

/// True when the current thread owns a live runtime.
pub fn is_initialized() -> bool {
    guard().is_ok()
}

/// RAII guard over the runtime. Exactly one may be live in the process; the
/// constructing thread becomes the runtime owner and every boundary call must
/// come from it. Dropping tears the runtime down and frees the owner slot.
#[derive(Debug)]
pub struct Runtime {
    // *mut () keeps the guard on the owner thread.
    _not_send_sync: PhantomData<*mut ()>,
}

impl Runtime {
    pub fn init() -> Result<Runtime> {
        {
            let mut owner = OWNER.lock().unwrap_or_else(|e| e.into_inner());
            if owner.is_some() {
                return Err(Error::AlreadyInitialized);
            }
            *owner = Some(std::thread::current().id());
        }
        state::init();
        crate::types::register_default_types();
        Ok(Runtime {
            _not_send_sync: PhantomData,
        })
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        state::teardown();
        let mut owner = OWNER.lock().unwrap_or_else(|e| e.into_inner());
        *owner = None;
    }
}

// ---------------------------------------------------------------------------
// Scalar constructors & readers
// ---------------------------------------------------------------------------

macro_rules! scalar_ctor {
    ($(#[$doc:meta])* $name:ident, $host:ty, $variant:ident) => {
        $(#[$doc])*
        pub fn $name(v: $host) -> Result<Handle> {
            guard()?;
            Ok(Handle::new(Body::$variant(v)))
        }
    };
}

scalar_ctor!(b8, bool, B8);
scalar_ctor!(u8, u8, U8);
scalar_ctor!(i16, i16, I16);
scalar_ctor!(i32, i32, I32);
scalar_ctor!(i64, i64, I64);
scalar_ctor!(f64, f64, F64);
scalar_ctor!(guid, [u8; 16], Guid);
scalar_ctor!(
    /// Days since 2001-01-01.
    date, i32, Date
);
scalar_ctor!(
    /// Nanoseconds since 2001-01-01.
    timestamp, i64, Timestamp
);

/// Single ASCII character cell; code points outside `0..=127` do not convert.
pub fn c8(v: char) -> Result<Handle> {
    guard()?;
    let code = v as u32;
    if code > 127 {
        return Err(Error::Conversion(format!("character {v:?} is not ASCII")));
    }
    Ok(Handle::new(Body::C8(code as u8)))
}

/// Milliseconds since midnight, `0..=86_399_999`.
pub fn time(ms: i32) -> Result<Handle> {
    guard()?;
    if !(0..kernel::MS_PER_DAY).contains(&ms) {
        return Err(Error::Conversion(format!("{ms} ms is not a time of day")));
    }
    Ok(Handle::new(Body::Time(ms)))
}

pub fn sym(s: &str) -> Result<Handle> {
    guard()?;
    let id = kres(state::intern(s))?;
    Ok(Handle::new(Body::Sym(id)))
}

macro_rules! scalar_reader {
    ($name:ident, $host:ty, $variant:ident, $what:expr) => {
        pub fn $name(h: &Handle) -> Result<$host> {
            guard()?;
            match &*h.body() {
                Body::$variant(v) => Ok(*v),
                other => Err(Error::TypeMismatch {
                    expected: $what,
                    actual: other.type_code(),
                }),
            }
        }
    };
}

scalar_reader!(read_b8, bool, B8, -types::B8);
scalar_reader!(read_u8, u8, U8, -types::U8);
scalar_reader!(read_i16, i16, I16, -types::I16);
scalar_reader!(read_i32, i32, I32, -types::I32);
scalar_reader!(read_i64, i64, I64, -types::I64);
scalar_reader!(read_f64, f64, F64, -types::F64);
scalar_reader!(read_date, i32, Date, -types::DATE);
scalar_reader!(read_time, i32, Time, -types::TIME);
scalar_reader!(read_timestamp, i64, Timestamp, -types::TIMESTAMP);
scalar_reader!(read_guid, [u8; 16], Guid, -types::GUID);

pub fn read_c8(h: &Handle) -> Result<char> {
    guard()?;
    match &*h.body() {
        Body::C8(v) => Ok(*v as char),
        other => Err(Error::TypeMismatch {
            expected: -types::C8,
            actual: other.type_code(),
        }),
    }
}

pub fn read_sym(h: &Handle) -> Result<String> {
    guard()?;
    match &*h.body() {
        Body::Sym(id) => kres(state::sym_name(*id)),
        other => Err(Error::TypeMismatch {
            expected: -types::SYM,
            actual: other.type_code(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

pub fn vector_new(elem: i8) -> Result<Handle> {
    guard()?;
    Ok(kernel::vector(kres(ColData::with_elem(elem))?))
}

pub fn list_new() -> Result<Handle> {
    guard()?;
    Ok(kernel::list(Vec::new()))
}

pub fn dict_new(keys: &Handle, vals: &Handle) -> Result<Handle> {
    guard()?;
    Ok(kernel::dict(keys.clone(), vals.clone()))
}

pub fn dict_get(d: &Handle, key: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(crate::kernel::ops::at(d, key))?)
}

pub fn dict_keys(d: &Handle) -> Result<Handle> {
    guard()?;
    match &*d.body() {
        Body::Dict { keys, .. } => Ok(keys.clone()),
        other => Err(Error::TypeMismatch {
            expected: types::DICT,
            actual: other.type_code(),
        }),
    }
}

pub fn dict_values(d: &Handle) -> Result<Handle> {
    guard()?;
    match &*d.body() {
        Body::Dict { vals, .. } => Ok(vals.clone()),
        other => Err(Error::TypeMismatch {
            expected: types::DICT,
            actual: other.type_code(),
        }),
    }
}

pub fn table_new(names: &Handle, cols: &Handle) -> Result<Handle> {
    guard()?;
    kres(kernel::table(names.clone(), cols.clone()))
}

pub fn table_keys(t: &Handle) -> Result<Handle> {
    guard()?;
    match &*t.body() {
        Body::Table { names, .. } => Ok(names.clone()),
        other => Err(Error::TypeMismatch {
            expected: types::TABLE,
            actual: other.type_code(),
        }),
    }
}

pub fn table_values(t: &Handle) -> Result<Handle> {
    guard()?;
    match &*t.body() {
        Body::Table { cols, .. } => Ok(cols.clone()),
        other => Err(Error::TypeMismatch {
            expected: types::TABLE,
            actual: other.type_code(),
        }),
    }
}

/// Element count of a vector, list, dict or table.
pub fn len(h: &Handle) -> Result<usize> {
    guard()?;
    kres(kernel::value_len(h))
}

/// Element read with a single negative-index wrap.
pub fn at_idx(h: &Handle, idx: i64) -> Result<Handle> {
    guard()?;
    let i = Handle::new(Body::I64(idx));
    check_handle(kres(crate::kernel::ops::at(h, &i))?)
}

/// Append an element to a vector (coercing the atom) or a list (any value).
pub fn push(h: &Handle, elem: &Handle) -> Result<()> {
    guard()?;
    let mut body = h.body_mut();
    match &mut *body {
        Body::Vec(c) => kres(c.push_atom(&elem.body())),
        Body::List(items) => {
            items.push(elem.clone());
            Ok(())
        }
        other => Err(Error::TypeMismatch {
            expected: types::LIST,
            actual: other.type_code(),
        }),
    }
}

/// Bounds-checked element write.
pub fn set_at(h: &Handle, idx: usize, elem: &Handle) -> Result<()> {
    guard()?;
    let mut body = h.body_mut();
    match &mut *body {
        Body::Vec(c) => kres(c.set_atom(idx, &elem.body())),
        Body::List(items) => {
            if idx >= items.len() {
                return Err(Error::Runtime(format!("range: index {idx} out of bounds")));
            }
            items[idx] = elem.clone();
            Ok(())
        }
        other => Err(Error::TypeMismatch {
            expected: types::LIST,
            actual: other.type_code(),
        }),
    }
}

pub fn insert_at(h: &Handle, idx: usize, elem: &Handle) -> Result<()> {
    guard()?;
    let mut body = h.body_mut();
    match &mut *body {
        Body::Vec(c) => kres(c.insert_atom(idx, &elem.body())),
        Body::List(items) => {
            if idx > items.len() {
                return Err(Error::Runtime(format!("range: index {idx} out of bounds")));
            }
            items.insert(idx, elem.clone());
            Ok(())
        }
        other => Err(Error::TypeMismatch {
            expected: types::LIST,
            actual: other.type_code(),
        }),
    }
}

pub fn type_code(h: &Handle) -> Result<i8> {
    guard()?;
    Ok(h.type_code())
}

// ---------------------------------------------------------------------------
// Query execution
// ---------------------------------------------------------------------------

pub fn select(query_dict: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(query::select(query_dict))?)
}

pub fn update(query_dict: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(query::update(query_dict))?)
}

pub fn insert(target: &Handle, data: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(query::insert(target, data))?)
}

pub fn upsert(target: &Handle, match_by_first: i64, data: &Handle) -> Result<Handle> {
    guard()?;
    if match_by_first < 1 {
        return Err(Error::UpsertArity);
    }
    check_handle(kres(query::upsert(target, match_by_first, data))?)
}

// ---------------------------------------------------------------------------
// Evaluation & environment
// ---------------------------------------------------------------------------

pub fn eval_str(src: &str) -> Result<Handle> {
    guard()?;
    check_handle(kres(eval::eval_str(src))?)
}

pub fn eval_obj(ast: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(eval::eval_obj(ast))?)
}

/// Dereference a name in the runtime environment.
pub fn eval_name(name: &str) -> Result<Handle> {
    eval_str(name)
}

/// Wrap a value so evaluation yields it verbatim (a literal).
pub fn quote(h: &Handle) -> Result<Handle> {
    guard()?;
    let q = env_get_internal_function_by_name("quote")?;
    Ok(kernel::list(vec![q, h.clone()]))
}

/// Bind a value to a name in the runtime's global environment.
pub fn binary_set(name: &str, value: &Handle) -> Result<()> {
    guard()?;
    let id = kres(state::intern(name))?;
    kres(state::env_set(id, value.clone()))
}

/// Resolve a primitive by its runtime name; the result's type code reflects
/// the primitive's arity.
pub fn env_get_internal_function_by_name(name: &str) -> Result<Handle> {
    guard()?;
    match eval::Primitive::from_name(name) {
        Some(p) => Ok(Handle::new(Body::Fun(p))),
        None => Err(Error::Runtime(format!("undefined primitive: {name}"))),
    }
}

pub fn env_get_internal_name_by_function(h: &Handle) -> Result<String> {
    guard()?;
    match &*h.body() {
        Body::Fun(p) => Ok(p.name().to_string()),
        other => Err(Error::TypeMismatch {
            expected: types::UNARY,
            actual: other.type_code(),
        }),
    }
}

// ---------------------------------------------------------------------------
// IPC
// ---------------------------------------------------------------------------

pub(crate) fn port_of(url: &str) -> Result<u16> {
    let raw = url
        .rsplit_once(':')
        .map(|(_, p)| p)
        .ok_or_else(|| Error::Conversion(format!("url without a port: {url}")))?;
    let port: i64 = raw
        .parse()
        .map_err(|_| Error::Conversion(format!("bad port in url: {url}")))?;
    if !(1..=65_535).contains(&port) {
        return Err(Error::InvalidPort(port));
    }
    Ok(port as u16)
}

pub fn hopen(url: &str) -> Result<i64> {
    guard()?;
    port_of(url)?;
    kres(ipc::hopen(url))
}

pub fn hclose(fd: i64) -> Result<()> {
    guard()?;
    kres(ipc::hclose(fd))
}

/// Send a value over an open connection and wait for the reply.
pub fn ipc_write(fd: i64, h: &Handle) -> Result<Handle> {
    guard()?;
    check_handle(kres(ipc::write(fd, h))?)
}

pub fn ipc_listen(port: i64) -> Result<i64> {
    guard()?;
    if !(1..=65_535).contains(&port) {
        return Err(Error::InvalidPort(port));
    }
    kres(ipc::listen(port as u16))
}

pub fn ipc_close_listener(id: i64) -> Result<()> {
    guard()?;
    kres(ipc::close_listener(id))
}

/// Block inside the runtime's own accept-and-dispatch loop until every
/// listener has been closed.
pub fn runtime_run() -> Result<()> {
    guard()?;
    kres(ipc::run())
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

pub fn ser_obj(h: &Handle) -> Result<Vec<u8>> {
    guard()?;
    kres(ser::ser_obj(h))
}

pub fn de_obj(bytes: &[u8]) -> Result<Handle> {
    guard()?;
    kres(ser::de_obj(bytes))
}

pub fn u8_vector(bytes: &[u8]) -> Result<Handle> {
    guard()?;
    Ok(kernel::vector(ColData::U8(bytes.to_vec())))
}

pub fn read_u8_vector(h: &Handle) -> Result<Vec<u8>> {
    guard()?;
    match &*h.body() {
        Body::Vec(ColData::U8(v)) => Ok(v.clone()),
        other => Err(Error::TypeMismatch {
            expected: types::U8,
            actual: other.type_code(),
        }),
    }
}
