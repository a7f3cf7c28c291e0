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

//! Columnar tables. A table is either owned (held by handle) or named (held
//! by a symbol registered in the runtime environment); mutations through a
//! name are destructive, mutations of an owned table produce a new value.

use crate::convert::{sniff_elem, to_runtime, value_of, Value};
use crate::expr::{col, Column, Operation};
use crate::rt::{self, types as codes, Error, Handle, Result};

/// How a table is held: by value or by environment name.
#[derive(Clone, Debug)]
pub enum TableRef {
    Owned(Handle),
    Named(String),
}

#[derive(Clone, Debug)]
pub struct Table {
    inner: TableRef,
}

impl Table {
    pub const TYPE_CODE: i8 = codes::TABLE;

    /// Build an owned table from `(name, column values)` pairs. Each column
    /// becomes a homogeneous vector sniffed from its first element, falling
    /// back to a heterogeneous list.
    pub fn from_columns(columns: &[(&str, Vec<Value>)]) -> Result<Table> {
        let names = rt::vector_new(codes::SYM)?;
        let cols = rt::list_new()?;
        for (name, values) in columns {
            rt::push(&names, &rt::sym(name)?)?;
            let elem = values.first().and_then(sniff_elem);
            let column = match elem {
                Some(elem) => {
                    let v = rt::vector_new(elem)?;
                    for item in values {
                        rt::push(&v, &to_runtime(item)?)?;
                    }
                    v
                }
                None => {
                    let l = rt::list_new()?;
                    for item in values {
                        rt::push(&l, &to_runtime(item)?)?;
                    }
                    l
                }
            };
            rt::push(&cols, &column)?;
        }
        Ok(Table {
            inner: TableRef::Owned(rt::table_new(&names, &cols)?),
        })
    }

    pub fn from_handle(h: Handle) -> Result<Table> {
        let actual = rt::type_code(&h)?;
        if actual != codes::TABLE {
            return Err(Error::TypeMismatch {
                expected: codes::TABLE,
                actual,
            });
        }
        Ok(Table {
            inner: TableRef::Owned(h),
        })
    }

    /// Reference a table registered in the runtime environment.
    pub fn from_name(name: &str) -> Result<Table> {
        let h = rt::eval_name(name)?;
        let actual = rt::type_code(&h)?;
        if actual != codes::TABLE {
            return Err(Error::TypeMismatch {
                expected: codes::TABLE,
                actual,
            });
        }
        Ok(Table {
            inner: TableRef::Named(name.to_string()),
        })
    }

    /// Load a CSV file with the given `ray_name` column types.
    pub fn from_csv(column_types: &[&str], path: &str) -> Result<Table> {
        let types_vec = rt::vector_new(codes::SYM)?;
        for t in column_types {
            rt::push(&types_vec, &rt::sym(t)?)?;
        }
        let path_str = to_runtime(&Value::Chars(path.to_string()))?;
        let read = rt::env_get_internal_function_by_name(Operation::ReadCsv.name())?;
        let ast = rt::list_new()?;
        rt::push(&ast, &read)?;
        rt::push(&ast, &types_vec)?;
        rt::push(&ast, &path_str)?;
        Table::from_handle(rt::eval_obj(&ast)?)
    }

    /// Wrap a query result: a symbol result stays a named reference, a table
    /// result is owned.
    pub(crate) fn from_result(h: Handle) -> Result<Table> {
        if rt::type_code(&h)? == -codes::SYM {
            Ok(Table {
                inner: TableRef::Named(rt::read_sym(&h)?),
            })
        } else {
            Table::from_handle(h)
        }
    }

    pub fn as_ref(&self) -> &TableRef {
        &self.inner
    }

    /// The environment name, for a named table.
    pub fn name(&self) -> Option<&str> {
        match &self.inner {
            TableRef::Named(n) => Some(n),
            TableRef::Owned(_) => None,
        }
    }

    /// Resolve to the current table value.
    pub fn handle(&self) -> Result<Handle> {
        match &self.inner {
            TableRef::Owned(h) => Ok(h.clone()),
            TableRef::Named(n) => rt::eval_name(n),
        }
    }

    /// The `from`-position value for a query AST: the table itself when
    /// owned, the quoted name when named (frozen into the AST).
    pub(crate) fn reference(&self) -> Result<Handle> {
        match &self.inner {
            TableRef::Owned(h) => Ok(h.clone()),
            TableRef::Named(n) => rt::quote(&rt::sym(n)?),
        }
    }

    /// The direct target value for insert/upsert: the bare symbol for a
    /// named table, the handle for an owned one.
    pub(crate) fn target(&self) -> Result<Handle> {
        match &self.inner {
            TableRef::Owned(h) => Ok(h.clone()),
            TableRef::Named(n) => rt::sym(n),
        }
    }

    /// Register this table in the runtime environment; the returned table
    /// addresses it by reference.
    pub fn save(&self, name: &str) -> Result<Table> {
        rt::binary_set(name, &self.handle()?)?;
        Ok(Table {
            inner: TableRef::Named(name.to_string()),
        })
    }

    /// A column reference bound to this table.
    pub fn col(&self, name: &str) -> Column {
        col(name)
    }

    // ---- Metadata & row access --------------------------------------------

    pub fn columns(&self) -> Result<Handle> {
        rt::table_keys(&self.handle()?)
    }

    pub fn values(&self) -> Result<Handle> {
        rt::table_values(&self.handle()?)
    }

    pub fn ncols(&self) -> Result<usize> {
        rt::len(&self.columns()?)
    }

    pub fn nrows(&self) -> Result<usize> {
        rt::len(&self.handle()?)
    }

    pub fn col_names(&self) -> Result<Vec<String>> {
        let names = self.columns()?;
        let n = rt::len(&names)?;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(rt::read_sym(&rt::at_idx(&names, i as i64)?)?);
        }
        Ok(out)
    }

    fn cell(&self, col: usize, row: usize) -> Option<Value> {
        let cols = self.values().ok()?;
        let column = rt::at_idx(&cols, col as i64).ok()?;
        let atom = rt::at_idx(&column, row as i64).ok()?;
        value_of(&atom).ok()
    }

    /// Read an i64 cell (integral column families).
    pub fn get_i64(&self, col: usize, row: usize) -> Option<i64> {
        match self.cell(col, row)? {
            Value::Int(v) => Some(v),
            Value::Bool(v) => Some(v as i64),
            Value::Byte(v) => Some(v as i64),
            Value::Date(v) | Value::Time(v) => Some(v as i64),
            Value::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_f64(&self, col: usize, row: usize) -> Option<f64> {
        match self.cell(col, row)? {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, col: usize, row: usize) -> Option<String> {
        match self.cell(col, row)? {
            Value::Str(s) | Value::Chars(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_bool(&self, col: usize, row: usize) -> Option<bool> {
        match self.cell(col, row)? {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Cell by column name.
    pub fn get(&self, col: &str, row: usize) -> Option<Value> {
        let idx = self.col_names().ok()?.iter().position(|n| n == col)?;
        self.cell(idx, row)
    }
}
