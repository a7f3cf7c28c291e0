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

//! Homogeneous vectors and the character-vector string type.

use crate::convert::{to_runtime, value_of, Value};
use crate::rt::{self, types as codes, Error, Handle, Result};

/// A homogeneous vector; the element type is fixed at construction.
#[derive(Clone, Debug)]
pub struct Vector {
    elem: i8,
    h: Handle,
}

impl Vector {
    pub fn new(elem: i8) -> Result<Self> {
        Ok(Vector {
            elem,
            h: rt::vector_new(elem)?,
        })
    }

    /// Wrap an existing handle; any positive non-distinguished code is a
    /// vector of that element type.
    pub fn from_handle(h: Handle) -> Result<Self> {
        let code = rt::type_code(&h)?;
        if code <= 0 || code == codes::LIST || code == codes::DICT || code == codes::TABLE {
            return Err(Error::TypeMismatch {
                expected: codes::I64,
                actual: code,
            });
        }
        Ok(Vector { elem: code, h })
    }

    /// Build from host values, coercing each to the element type.
    pub fn from_values(elem: i8, values: &[Value]) -> Result<Self> {
        let v = Vector::new(elem)?;
        for item in values {
            v.push(item)?;
        }
        Ok(v)
    }

    pub fn elem_code(&self) -> i8 {
        self.elem
    }

    pub fn len(&self) -> Result<usize> {
        rt::len(&self.h)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Indexed read; negative indices wrap once from the end.
    pub fn get(&self, idx: i64) -> Result<Value> {
        value_of(&rt::at_idx(&self.h, idx)?)
    }

    /// Bounds-checked write.
    pub fn set(&self, idx: usize, v: &Value) -> Result<()> {
        rt::set_at(&self.h, idx, &to_runtime(v)?)
    }

    pub fn push(&self, v: &Value) -> Result<()> {
        rt::push(&self.h, &to_runtime(v)?)
    }

    /// All elements as host values.
    pub fn values(&self) -> Result<Vec<Value>> {
        let n = self.len()?;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(self.get(i as i64)?);
        }
        Ok(out)
    }

    pub fn handle(&self) -> &Handle {
        &self.h
    }

    pub fn into_handle(self) -> Handle {
        self.h
    }
}

/// A string: exactly a vector of C8 cells.
#[derive(Clone, Debug)]
pub struct RayStr {
    h: Handle,
}

impl RayStr {
    pub const TYPE_CODE: i8 = codes::C8;
    pub const RAY_NAME: &'static str = "C8";

    pub fn new(s: &str) -> Result<Self> {
        Ok(RayStr {
            h: to_runtime(&Value::Chars(s.to_string()))?,
        })
    }

    pub fn from_handle(h: Handle) -> Result<Self> {
        let actual = rt::type_code(&h)?;
        if actual != Self::TYPE_CODE {
            return Err(Error::TypeMismatch {
                expected: Self::TYPE_CODE,
                actual,
            });
        }
        Ok(RayStr { h })
    }

    pub fn value(&self) -> Result<String> {
        match value_of(&self.h)? {
            Value::Chars(s) => Ok(s),
            _ => Err(Error::Conversion("not a character vector".into())),
        }
    }

    pub fn len(&self) -> Result<usize> {
        rt::len(&self.h)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn handle(&self) -> &Handle {
        &self.h
    }

    pub fn into_handle(self) -> Handle {
        self.h
    }
}

impl PartialEq for RayStr {
    fn eq(&self, other: &Self) -> bool {
        match (self.value(), other.value()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
