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

//! Heterogeneous lists of runtime values.

use crate::convert::{to_runtime, Value};
use crate::rt::{self, types as codes, Error, Handle, Result};

#[derive(Clone, Debug)]
pub struct List {
    h: Handle,
}

impl List {
    pub const TYPE_CODE: i8 = codes::LIST;

    pub fn new() -> Result<Self> {
        Ok(List { h: rt::list_new()? })
    }

    pub fn from_handle(h: Handle) -> Result<Self> {
        let actual = rt::type_code(&h)?;
        if actual != Self::TYPE_CODE {
            return Err(Error::TypeMismatch {
                expected: Self::TYPE_CODE,
                actual,
            });
        }
        Ok(List { h })
    }

    pub fn len(&self) -> Result<usize> {
        rt::len(&self.h)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append a host value, coerced to a runtime value.
    pub fn push(&self, v: &Value) -> Result<()> {
        rt::push(&self.h, &to_runtime(v)?)
    }

    /// Append any runtime value as-is.
    pub fn push_handle(&self, h: &Handle) -> Result<()> {
        rt::push(&self.h, h)
    }

    /// Indexed read; negative indices wrap once from the end.
    pub fn get(&self, idx: i64) -> Result<Handle> {
        rt::at_idx(&self.h, idx)
    }

    pub fn handle(&self) -> &Handle {
        &self.h
    }

    pub fn into_handle(self) -> Handle {
        self.h
    }
}
