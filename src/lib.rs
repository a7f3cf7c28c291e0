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

//! raydb: a fluent, typed query builder over the Ray k-style columnar array
//! runtime.
//!
//! Host code builds typed columns and query builders; builders compile into
//! the runtime's AST (a list headed by a primitive-function value) and the
//! runtime hands back opaque handles that the type registry reconstructs
//! into typed wrappers.
//!
//! ```no_run
//! use raydb::{col, Runtime, Table, Value};
//!
//! let _rt = Runtime::init().unwrap();
//! let t = Table::from_columns(&[
//!     ("sym", vec!["a".into(), "b".into()]),
//!     ("price", vec![Value::Int(10), Value::Int(20)]),
//! ])
//! .unwrap();
//! let out = t
//!     .select(["sym", "price"])
//!     .where_(col("price").gt_(15))
//!     .execute()
//!     .unwrap();
//! assert_eq!(out.nrows().unwrap(), 1);
//! ```

mod convert;
mod expr;
mod kernel;
mod query;

pub mod ipc;
pub mod rt;
pub mod sql;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

pub use convert::{from_runtime, to_runtime, value_of, Value};
pub use expr::{col, Column, Expression, FilteredColumn, Operand, Operation};
pub use ipc::{Client, Connection, Server};
pub use query::{InsertQuery, SelectQueryBuilder, TableColumnInterval, UpdateQuery, UpsertQuery};
pub use rt::{Error, Handle, Result, Runtime};
pub use sql::SqlError;
pub use types::{
    register_default_types, Date, Dict, Guid, List, Ray, RayStr, Sym, Table, TableRef, Time,
    Timestamp, Vector, B8, C8, F64, I16, I32, I64, U8,
};
