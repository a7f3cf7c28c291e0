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

//! Associative maps: a key vector paired with a value list.

use crate::convert::{to_runtime, Value};
use crate::rt::{self, types as codes, Error, Handle, Result};

#[derive(Clone, Debug)]
pub struct Dict {
    h: Handle,
}

impl Dict {
    pub const TYPE_CODE: i8 = codes::DICT;

    /// Build from `(key, value)` pairs with symbol keys.
    pub fn from_pairs(pairs: &[(&str, Value)]) -> Result<Self> {
        let keys = rt::vector_new(codes::SYM)?;
        let vals = rt::list_new()?;
        for (k, v) in pairs {
            rt::push(&keys, &rt::sym(k)?)?;
            rt::push(&vals, &to_runtime(v)?)?;
        }
        Ok(Dict {
            h: rt::dict_new(&keys, &vals)?,
        })
    }

    pub fn from_parts(keys: &Handle, vals: &Handle) -> Result<Self> {
        Ok(Dict {
            h: rt::dict_new(keys, vals)?,
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
        Ok(Dict { h })
    }

    pub fn len(&self) -> Result<usize> {
        rt::len(&self.h)
    }

    /// Value at a matching key.
    pub fn get(&self, key: &Value) -> Result<Handle> {
        rt::dict_get(&self.h, &to_runtime(key)?)
    }

    /// The key vector, as a separate runtime value.
    pub fn keys(&self) -> Result<Handle> {
        rt::dict_keys(&self.h)
    }

    /// The value list, as a separate runtime value.
    pub fn values(&self) -> Result<Handle> {
        rt::dict_values(&self.h)
    }

    pub fn handle(&self) -> &Handle {
        &self.h
    }

    pub fn into_handle(self) -> Handle {
        self.h
    }
}
