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

//! Host-value model and coercion between host values and runtime handles.
//! `Value::Str` converts to a symbol; `Value::Chars` is a character vector,
//! preserving the symbol vs. string distinction on the wire.

use crate::rt::{self, types, Error, Handle, Result};
use crate::types::{from_handle, Ray};

/// A host value convertible to a runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Placeholder; converts to an empty list.
    Null,
    Bool(bool),
    Byte(u8),
    Int(i64),
    Float(f64),
    Char(char),
    /// Converts to a symbol.
    Str(String),
    /// Converts to a character vector.
    Chars(String),
    /// Days since 2001-01-01.
    Date(i32),
    /// Milliseconds since midnight.
    Time(i32),
    /// Nanoseconds since 2001-01-01.
    Timestamp(i64),
    Guid([u8; 16]),
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Value {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Value {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Coerce a host value to a runtime handle.
pub fn to_runtime(v: &Value) -> Result<Handle> {
    match v {
        Value::Null => rt::list_new(),
        Value::Bool(x) => rt::b8(*x),
        Value::Byte(x) => rt::u8(*x),
        Value::Int(x) => rt::i64(*x),
        Value::Float(x) => rt::f64(*x),
        Value::Char(x) => rt::c8(*x),
        Value::Str(s) => rt::sym(s),
        Value::Chars(s) => {
            let h = rt::vector_new(types::C8)?;
            for c in s.chars() {
                rt::push(&h, &rt::c8(c)?)?;
            }
            Ok(h)
        }
        Value::Date(d) => rt::date(*d),
        Value::Time(ms) => rt::time(*ms),
        Value::Timestamp(ns) => rt::timestamp(*ns),
        Value::Guid(g) => rt::guid(*g),
        Value::List(items) => {
            let h = rt::list_new()?;
            for it in items {
                rt::push(&h, &to_runtime(it)?)?;
            }
            Ok(h)
        }
        Value::Dict(pairs) => {
            let keys = rt::vector_new(types::SYM)?;
            let vals = rt::list_new()?;
            for (k, v) in pairs {
                rt::push(&keys, &rt::sym(k)?)?;
                rt::push(&vals, &to_runtime(v)?)?;
            }
            rt::dict_new(&keys, &vals)
        }
    }
}

/// Reconstruct a typed wrapper from a handle via the type registry.
pub fn from_runtime(h: Handle) -> Result<Ray> {
    from_handle(h)
}

/// Read an atom handle (or character vector) back into a host value.
pub fn value_of(h: &Handle) -> Result<Value> {
    let code = rt::type_code(h)?;
    Ok(match code {
        c if c == -types::B8 => Value::Bool(rt::read_b8(h)?),
        c if c == -types::U8 => Value::Byte(rt::read_u8(h)?),
        c if c == -types::I16 => Value::Int(rt::read_i16(h)? as i64),
        c if c == -types::I32 => Value::Int(rt::read_i32(h)? as i64),
        c if c == -types::I64 => Value::Int(rt::read_i64(h)?),
        c if c == -types::F64 => Value::Float(rt::read_f64(h)?),
        c if c == -types::C8 => Value::Char(rt::read_c8(h)?),
        c if c == -types::SYM => Value::Str(rt::read_sym(h)?),
        c if c == -types::DATE => Value::Date(rt::read_date(h)?),
        c if c == -types::TIME => Value::Time(rt::read_time(h)?),
        c if c == -types::TIMESTAMP => Value::Timestamp(rt::read_timestamp(h)?),
        c if c == -types::GUID => Value::Guid(rt::read_guid(h)?),
        c if c == types::C8 => {
            let n = rt::len(h)?;
            let mut s = String::with_capacity(n);
            for i in 0..n {
                s.push(rt::read_c8(&rt::at_idx(h, i as i64)?)?);
            }
            Value::Chars(s)
        }
        other => {
            return Err(Error::Conversion(format!(
                "no host value for runtime type {other}"
            )))
        }
    })
}

/// Infer a homogeneous vector element code from the first value of a column,
/// as table construction does. `None` means a heterogeneous list.
pub(crate) fn sniff_elem(v: &Value) -> Option<i8> {
    match v {
        Value::Str(_) => Some(types::SYM),
        Value::Int(_) => Some(types::I64),
        Value::Float(_) => Some(types::F64),
        Value::Bool(_) => Some(types::B8),
        Value::Byte(_) => Some(types::U8),
        Value::Char(_) => Some(types::C8),
        Value::Date(_) => Some(types::DATE),
        Value::Time(_) => Some(types::TIME),
        Value::Timestamp(_) => Some(types::TIMESTAMP),
        Value::Guid(_) => Some(types::GUID),
        _ => None,
    }
}
