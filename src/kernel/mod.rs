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

//! The bundled Ray runtime kernel: value blocks, symbol table, environment,
//! evaluator, query kernels, serialization codec, CSV reader and IPC framing.
//!
//! Nothing outside `crate::rt` may call into this module — the boundary layer
//! owns initialization, thread affinity and error conversion.

pub(crate) mod csv;
pub(crate) mod eval;
pub(crate) mod ipc;
pub(crate) mod ops;
pub(crate) mod query;
pub(crate) mod ser;
pub(crate) mod state;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

// ===== Type codes =====
//
// Negative of a scalar code denotes the atom; positive denotes a vector of
// that element type. LIST/TABLE/DICT are distinguished positive codes,
// callables sit above them, ERR is the sole distinguished negative.

pub const B8: i8 = 1;
pub const U8: i8 = 2;
pub const I16: i8 = 3;
pub const I32: i8 = 4;
pub const I64: i8 = 5;
pub const SYM: i8 = 6;
pub const DATE: i8 = 7;
pub const TIME: i8 = 8;
pub const TIMESTAMP: i8 = 9;
pub const F64: i8 = 10;
pub const GUID: i8 = 11;
pub const C8: i8 = 12;

pub const LIST: i8 = 97;
pub const TABLE: i8 = 98;
pub const DICT: i8 = 99;

pub const UNARY: i8 = 101;
pub const BINARY: i8 = 102;
pub const VARY: i8 = 103;

pub const ERR: i8 = -128;

/// Typed null payloads (k convention).
pub const NULL_I64: i64 = i64::MIN;
pub const NULL_I32: i32 = i32::MIN;

/// Days from 1970-01-01 to 2001-01-01 — the Date/Timestamp epoch shift.
pub const EPOCH_2001_DAYS_FROM_1970: i64 = 11_323;

/// Milliseconds in a day; Time atoms live in `0..MS_PER_DAY`.
pub const MS_PER_DAY: i32 = 86_400_000;

pub(crate) type KResult<T> = Result<T, String>;

// ===== Handle =====

/// An opaque reference to a runtime value block. Cloning bumps the runtime's
/// reference count; dropping the last clone frees the block.
#[derive(Clone)]
pub struct Handle(Rc<Obj>);

pub struct Obj {
    body: RefCell<Body>,
}

impl Handle {
    pub(crate) fn new(body: Body) -> Handle {
        Handle(Rc::new(Obj {
            body: RefCell::new(body),
        }))
    }

    pub(crate) fn body(&self) -> Ref<'_, Body> {
        self.0.body.borrow()
    }

    pub(crate) fn body_mut(&self) -> RefMut<'_, Body> {
        self.0.body.borrow_mut()
    }

    /// Runtime type code of the referenced value.
    pub fn type_code(&self) -> i8 {
        self.body().type_code()
    }

    /// Current runtime reference count.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Identity comparison — true when both handles reference the same block.
    pub fn same_block(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle(type={})", self.type_code())
    }
}

// ===== Value body =====

#[derive(Clone, Debug)]
pub(crate) enum Body {
    B8(bool),
    U8(u8),
    C8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    /// Interned symbol id.
    Sym(i64),
    /// Days since 2001-01-01.
    Date(i32),
    /// Milliseconds since midnight.
    Time(i32),
    /// Nanoseconds since 2001-01-01.
    Timestamp(i64),
    Guid([u8; 16]),
    Vec(ColData),
    List(Vec<Handle>),
    Dict { keys: Handle, vals: Handle },
    Table { names: Handle, cols: Handle },
    Fun(eval::Primitive),
    Err(String),
}

impl Body {
    pub fn type_code(&self) -> i8 {
        match self {
            Body::B8(_) => -B8,
            Body::U8(_) => -U8,
            Body::C8(_) => -C8,
            Body::I16(_) => -I16,
            Body::I32(_) => -I32,
            Body::I64(_) => -I64,
            Body::F64(_) => -F64,
            Body::Sym(_) => -SYM,
            Body::Date(_) => -DATE,
            Body::Time(_) => -TIME,
            Body::Timestamp(_) => -TIMESTAMP,
            Body::Guid(_) => -GUID,
            Body::Vec(col) => col.elem_code(),
            Body::List(_) => LIST,
            Body::Dict { .. } => DICT,
            Body::Table { .. } => TABLE,
            Body::Fun(p) => p.arity_code(),
            Body::Err(_) => ERR,
        }
    }

    pub fn is_atom(&self) -> bool {
        self.type_code() < 0 && self.type_code() != ERR
    }

    /// Read an atom as i64 when its payload is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Body::B8(v) => Some(*v as i64),
            Body::U8(v) => Some(*v as i64),
            Body::C8(v) => Some(*v as i64),
            Body::I16(v) => Some(*v as i64),
            Body::I32(v) => Some(*v as i64),
            Body::I64(v) => Some(*v),
            Body::Date(v) => Some(*v as i64),
            Body::Time(v) => Some(*v as i64),
            Body::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Body::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

// ===== Columnar vector payloads =====

#[derive(Clone, Debug)]
pub(crate) enum ColData {
    B8(Vec<bool>),
    U8(Vec<u8>),
    C8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Sym(Vec<i64>),
    Date(Vec<i32>),
    Time(Vec<i32>),
    Timestamp(Vec<i64>),
    Guid(Vec<[u8; 16]>),
}

impl ColData {
    pub fn with_elem(elem: i8) -> KResult<ColData> {
        Ok(match elem {
            B8 => ColData::B8(Vec::new()),
            U8 => ColData::U8(Vec::new()),
            C8 => ColData::C8(Vec::new()),
            I16 => ColData::I16(Vec::new()),
            I32 => ColData::I32(Vec::new()),
            I64 => ColData::I64(Vec::new()),
            F64 => ColData::F64(Vec::new()),
            SYM => ColData::Sym(Vec::new()),
            DATE => ColData::Date(Vec::new()),
            TIME => ColData::Time(Vec::new()),
            TIMESTAMP => ColData::Timestamp(Vec::new()),
            GUID => ColData::Guid(Vec::new()),
            other => return Err(format!("type: no vector element type {other}")),
        })
    }

    pub fn elem_code(&self) -> i8 {
        match self {
            ColData::B8(_) => B8,
            ColData::U8(_) => U8,
            ColData::C8(_) => C8,
            ColData::I16(_) => I16,
            ColData::I32(_) => I32,
            ColData::I64(_) => I64,
            ColData::F64(_) => F64,
            ColData::Sym(_) => SYM,
            ColData::Date(_) => DATE,
            ColData::Time(_) => TIME,
            ColData::Timestamp(_) => TIMESTAMP,
            ColData::Guid(_) => GUID,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColData::B8(v) => v.len(),
            ColData::U8(v) => v.len(),
            ColData::C8(v) => v.len(),
            ColData::I16(v) => v.len(),
            ColData::I32(v) => v.len(),
            ColData::I64(v) => v.len(),
            ColData::F64(v) => v.len(),
            ColData::Sym(v) => v.len(),
            ColData::Date(v) => v.len(),
            ColData::Time(v) => v.len(),
            ColData::Timestamp(v) => v.len(),
            ColData::Guid(v) => v.len(),
        }
    }

    /// Element at `idx` as an atom body. Caller checks bounds.
    pub fn atom(&self, idx: usize) -> Body {
        match self {
            ColData::B8(v) => Body::B8(v[idx]),
            ColData::U8(v) => Body::U8(v[idx]),
            ColData::C8(v) => Body::C8(v[idx]),
            ColData::I16(v) => Body::I16(v[idx]),
            ColData::I32(v) => Body::I32(v[idx]),
            ColData::I64(v) => Body::I64(v[idx]),
            ColData::F64(v) => Body::F64(v[idx]),
            ColData::Sym(v) => Body::Sym(v[idx]),
            ColData::Date(v) => Body::Date(v[idx]),
            ColData::Time(v) => Body::Time(v[idx]),
            ColData::Timestamp(v) => Body::Timestamp(v[idx]),
            ColData::Guid(v) => Body::Guid(v[idx]),
        }
    }

    /// Typed null for this element type (k convention).
    pub fn push_null(&mut self) {
        match self {
            ColData::B8(v) => v.push(false),
            ColData::U8(v) => v.push(0),
            ColData::C8(v) => v.push(b' '),
            ColData::I16(v) => v.push(i16::MIN),
            ColData::I32(v) => v.push(NULL_I32),
            ColData::I64(v) => v.push(NULL_I64),
            ColData::F64(v) => v.push(f64::NAN),
            ColData::Sym(v) => v.push(0),
            ColData::Date(v) => v.push(NULL_I32),
            ColData::Time(v) => v.push(NULL_I32),
            ColData::Timestamp(v) => v.push(NULL_I64),
            ColData::Guid(v) => v.push([0; 16]),
        }
    }

    pub fn push_atom(&mut self, b: &Body) -> KResult<()> {
        match (self, b) {
            (ColData::B8(v), Body::B8(x)) => v.push(*x),
            (ColData::U8(v), Body::U8(x)) => v.push(*x),
            (ColData::C8(v), Body::C8(x)) => v.push(*x),
            (ColData::I16(v), Body::I16(x)) => v.push(*x),
            (ColData::I32(v), Body::I32(x)) => v.push(*x),
            (ColData::I64(v), Body::I64(x)) => v.push(*x),
            (ColData::I64(v), Body::I32(x)) => v.push(*x as i64),
            (ColData::I64(v), Body::I16(x)) => v.push(*x as i64),
            (ColData::F64(v), Body::F64(x)) => v.push(*x),
            (ColData::F64(v), Body::I64(x)) => v.push(*x as f64),
            (ColData::Sym(v), Body::Sym(x)) => v.push(*x),
            (ColData::Date(v), Body::Date(x)) => v.push(*x),
            (ColData::Time(v), Body::Time(x)) => v.push(*x),
            (ColData::Timestamp(v), Body::Timestamp(x)) => v.push(*x),
            (ColData::Guid(v), Body::Guid(x)) => v.push(*x),
            (me, other) => {
                return Err(format!(
                    "type: cannot append atom of type {} to vector of type {}",
                    other.type_code(),
                    me.elem_code()
                ))
            }
        }
        Ok(())
    }

    pub fn set_atom(&mut self, idx: usize, b: &Body) -> KResult<()> {
        if idx >= self.len() {
            return Err(format!("range: index {idx} out of bounds"));
        }
        match (self, b) {
            (ColData::B8(v), Body::B8(x)) => v[idx] = *x,
            (ColData::U8(v), Body::U8(x)) => v[idx] = *x,
            (ColData::C8(v), Body::C8(x)) => v[idx] = *x,
            (ColData::I16(v), Body::I16(x)) => v[idx] = *x,
            (ColData::I32(v), Body::I32(x)) => v[idx] = *x,
            (ColData::I64(v), Body::I64(x)) => v[idx] = *x,
            (ColData::F64(v), Body::F64(x)) => v[idx] = *x,
            (ColData::F64(v), Body::I64(x)) => v[idx] = *x as f64,
            (ColData::Sym(v), Body::Sym(x)) => v[idx] = *x,
            (ColData::Date(v), Body::Date(x)) => v[idx] = *x,
            (ColData::Time(v), Body::Time(x)) => v[idx] = *x,
            (ColData::Timestamp(v), Body::Timestamp(x)) => v[idx] = *x,
            (ColData::Guid(v), Body::Guid(x)) => v[idx] = *x,
            (me, other) => {
                return Err(format!(
                    "type: cannot store atom of type {} into vector of type {}",
                    other.type_code(),
                    me.elem_code()
                ))
            }
        }
        Ok(())
    }

    pub fn insert_atom(&mut self, idx: usize, b: &Body) -> KResult<()> {
        if idx > self.len() {
            return Err(format!("range: index {idx} out of bounds"));
        }
        match (self, b) {
            (ColData::B8(v), Body::B8(x)) => v.insert(idx, *x),
            (ColData::U8(v), Body::U8(x)) => v.insert(idx, *x),
            (ColData::C8(v), Body::C8(x)) => v.insert(idx, *x),
            (ColData::I16(v), Body::I16(x)) => v.insert(idx, *x),
            (ColData::I32(v), Body::I32(x)) => v.insert(idx, *x),
            (ColData::I64(v), Body::I64(x)) => v.insert(idx, *x),
            (ColData::F64(v), Body::F64(x)) => v.insert(idx, *x),
            (ColData::Sym(v), Body::Sym(x)) => v.insert(idx, *x),
            (ColData::Date(v), Body::Date(x)) => v.insert(idx, *x),
            (ColData::Time(v), Body::Time(x)) => v.insert(idx, *x),
            (ColData::Timestamp(v), Body::Timestamp(x)) => v.insert(idx, *x),
            (ColData::Guid(v), Body::Guid(x)) => v.insert(idx, *x),
            (me, other) => {
                return Err(format!(
                    "type: cannot insert atom of type {} into vector of type {}",
                    other.type_code(),
                    me.elem_code()
                ))
            }
        }
        Ok(())
    }

    /// Gather rows by index into a new payload of the same element type.
    pub fn gather(&self, rows: &[usize]) -> ColData {
        fn pick<T: Copy>(v: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&i| v[i]).collect()
        }
        match self {
            ColData::B8(v) => ColData::B8(pick(v, rows)),
            ColData::U8(v) => ColData::U8(pick(v, rows)),
            ColData::C8(v) => ColData::C8(pick(v, rows)),
            ColData::I16(v) => ColData::I16(pick(v, rows)),
            ColData::I32(v) => ColData::I32(pick(v, rows)),
            ColData::I64(v) => ColData::I64(pick(v, rows)),
            ColData::F64(v) => ColData::F64(pick(v, rows)),
            ColData::Sym(v) => ColData::Sym(pick(v, rows)),
            ColData::Date(v) => ColData::Date(pick(v, rows)),
            ColData::Time(v) => ColData::Time(pick(v, rows)),
            ColData::Timestamp(v) => ColData::Timestamp(pick(v, rows)),
            ColData::Guid(v) => ColData::Guid(pick(v, rows)),
        }
    }

    pub fn extend_from(&mut self, other: &ColData) -> KResult<()> {
        for i in 0..other.len() {
            self.push_atom(&other.atom(i))?;
        }
        Ok(())
    }
}

// ===== Shared constructors =====

pub(crate) fn atom(body: Body) -> Handle {
    Handle::new(body)
}

pub(crate) fn vector(data: ColData) -> Handle {
    Handle::new(Body::Vec(data))
}

pub(crate) fn list(items: Vec<Handle>) -> Handle {
    Handle::new(Body::List(items))
}

pub(crate) fn err(msg: impl Into<String>) -> Handle {
    Handle::new(Body::Err(msg.into()))
}

/// Length of a countable value: vector, list, dict, table or C8 string.
pub(crate) fn value_len(h: &Handle) -> KResult<usize> {
    match &*h.body() {
        Body::Vec(c) => Ok(c.len()),
        Body::List(items) => Ok(items.len()),
        Body::Dict { keys, .. } => value_len(keys),
        Body::Table { cols, .. } => {
            let cols = cols.body();
            match &*cols {
                Body::List(items) => match items.first() {
                    Some(first) => value_len(first),
                    None => Ok(0),
                },
                _ => Err("corrupt: table columns are not a list".into()),
            }
        }
        other => Err(format!("rank: value of type {} has no length", other.type_code())),
    }
}

/// Dict constructor with the table-shape invariant left to the caller.
pub(crate) fn dict(keys: Handle, vals: Handle) -> Handle {
    Handle::new(Body::Dict { keys, vals })
}

/// Table constructor; validates symbol keys and equal column lengths.
pub(crate) fn table(names: Handle, cols: Handle) -> KResult<Handle> {
    if names.type_code() != SYM {
        return Err("type: table column names must be a symbol vector".into());
    }
    let ncols = value_len(&names)?;
    let n = match &*cols.body() {
        Body::List(items) => {
            if items.len() != ncols {
                return Err("length: table names/columns mismatch".into());
            }
            items.first().map(value_len).transpose()?.unwrap_or(0)
        }
        _ => return Err("type: table columns must be a list".into()),
    };
    if let Body::List(items) = &*cols.body() {
        for c in items {
            if value_len(c)? != n {
                return Err("length: table columns are ragged".into());
            }
        }
    }
    Ok(Handle::new(Body::Table { names, cols }))
}

// ===== Calendar math (days-from-civil, Hinnant) =====

/// Days since 1970-01-01 for a civil date.
pub(crate) fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = (m as u64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i64 - 719_468
}

/// Civil date from days since 1970-01-01.
pub(crate) fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}
