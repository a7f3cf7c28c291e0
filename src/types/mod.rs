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

//! Typed wrappers over runtime handles and the type registry that
//! reconstructs them from opaque handles.

mod atoms;
mod dict;
mod list;
mod table;
mod vector;

pub use atoms::{Date, Guid, Sym, Time, Timestamp, B8, C8, F64, I16, I32, I64, U8};
pub use dict::Dict;
pub use list::List;
pub use table::{Table, TableRef};
pub use vector::{RayStr, Vector};

use std::cell::RefCell;
use std::collections::HashMap;

use crate::rt::{self, types as codes, Error, Handle, Result};

/// The sum of every typed wrapper a handle can reconstruct into.
pub enum Ray {
    B8(B8),
    U8(U8),
    C8(C8),
    I16(I16),
    I32(I32),
    I64(I64),
    F64(F64),
    Sym(Sym),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
    Guid(Guid),
    Vector(Vector),
    List(List),
    Dict(Dict),
    Table(Table),
}

impl Ray {
    pub fn handle(&self) -> Result<Handle> {
        match self {
            Ray::B8(x) => Ok(x.handle().clone()),
            Ray::U8(x) => Ok(x.handle().clone()),
            Ray::C8(x) => Ok(x.handle().clone()),
            Ray::I16(x) => Ok(x.handle().clone()),
            Ray::I32(x) => Ok(x.handle().clone()),
            Ray::I64(x) => Ok(x.handle().clone()),
            Ray::F64(x) => Ok(x.handle().clone()),
            Ray::Sym(x) => Ok(x.handle().clone()),
            Ray::Date(x) => Ok(x.handle().clone()),
            Ray::Time(x) => Ok(x.handle().clone()),
            Ray::Timestamp(x) => Ok(x.handle().clone()),
            Ray::Guid(x) => Ok(x.handle().clone()),
            Ray::Vector(x) => Ok(x.handle().clone()),
            Ray::List(x) => Ok(x.handle().clone()),
            Ray::Dict(x) => Ok(x.handle().clone()),
            Ray::Table(x) => x.handle(),
        }
    }
}

/// A wrapper constructor registered for a type code.
pub type Ctor = fn(Handle) -> Result<Ray>;

thread_local! {
    static REGISTRY: RefCell<HashMap<i8, Ctor>> = RefCell::new(HashMap::new());
}

/// Register a constructor for a type code. Re-registering the same code with
/// the same constructor is a no-op; a different constructor is rejected.
pub fn register(code: i8, ctor: Ctor) -> Result<()> {
    REGISTRY.with(|r| {
        let mut map = r.borrow_mut();
        if let Some(existing) = map.get(&code) {
            if *existing != ctor {
                return Err(Error::Runtime(format!(
                    "type code {code} is already registered with a different constructor"
                )));
            }
            return Ok(());
        }
        map.insert(code, ctor);
        Ok(())
    })
}

/// Install the default wrapper constructors. Called during `Runtime::init`;
/// the registry is treated as frozen afterwards.
pub fn register_default_types() {
    let defaults: &[(i8, Ctor)] = &[
        (-codes::B8, |h| Ok(Ray::B8(B8::from_handle(h)?))),
        (-codes::U8, |h| Ok(Ray::U8(U8::from_handle(h)?))),
        (-codes::C8, |h| Ok(Ray::C8(C8::from_handle(h)?))),
        (-codes::I16, |h| Ok(Ray::I16(I16::from_handle(h)?))),
        (-codes::I32, |h| Ok(Ray::I32(I32::from_handle(h)?))),
        (-codes::I64, |h| Ok(Ray::I64(I64::from_handle(h)?))),
        (-codes::F64, |h| Ok(Ray::F64(F64::from_handle(h)?))),
        (-codes::SYM, |h| Ok(Ray::Sym(Sym::from_handle(h)?))),
        (-codes::DATE, |h| Ok(Ray::Date(Date::from_handle(h)?))),
        (-codes::TIME, |h| Ok(Ray::Time(Time::from_handle(h)?))),
        (-codes::TIMESTAMP, |h| {
            Ok(Ray::Timestamp(Timestamp::from_handle(h)?))
        }),
        (-codes::GUID, |h| Ok(Ray::Guid(Guid::from_handle(h)?))),
        (codes::LIST, |h| Ok(Ray::List(List::from_handle(h)?))),
        (codes::DICT, |h| Ok(Ray::Dict(Dict::from_handle(h)?))),
        (codes::TABLE, |h| Ok(Ray::Table(Table::from_handle(h)?))),
    ];
    for (code, ctor) in defaults {
        // The defaults never conflict with themselves on re-init.
        let _ = register(*code, *ctor);
    }
}

/// Reconstruct the right typed wrapper for a handle. Positive codes that are
/// not LIST/DICT/TABLE are generic vectors of that element type.
pub fn from_handle(h: Handle) -> Result<Ray> {
    let code = rt::type_code(&h)?;
    if code > 0 && code != codes::LIST && code != codes::DICT && code != codes::TABLE {
        if code <= codes::C8 {
            return Ok(Ray::Vector(Vector::from_handle(h)?));
        }
        return Err(Error::UnknownTypeCode(code));
    }
    let ctor = REGISTRY.with(|r| r.borrow().get(&code).copied());
    match ctor {
        Some(ctor) => ctor(h),
        None => Err(Error::UnknownTypeCode(code)),
    }
}
