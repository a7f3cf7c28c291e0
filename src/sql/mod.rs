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

//! SQL compiler: a restricted SELECT dialect lowered onto the fluent query
//! builder. Parsing is delegated to sqlparser; everything outside the
//! supported grammar is rejected during lowering.

mod lower;

pub(crate) use lower::lower_select;

use crate::rt;
use crate::types::Table;

/// Errors produced by the SQL layer.
#[derive(Debug)]
pub enum SqlError {
    /// SQL syntax error from the parser.
    Parse(String),
    /// A construct outside the supported grammar, tagged with its kind.
    Unsupported(String),
    /// Lowering error (unknown function, malformed query).
    Plan(String),
    /// Runtime execution error.
    Engine(rt::Error),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(msg) => write!(f, "SQL parse error: {msg}"),
            SqlError::Unsupported(kind) => write!(f, "Unsupported SQL construct: {kind}"),
            SqlError::Plan(msg) => write!(f, "SQL planning error: {msg}"),
            SqlError::Engine(err) => write!(f, "Engine error: {err}"),
        }
    }
}

impl std::error::Error for SqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SqlError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rt::Error> for SqlError {
    fn from(err: rt::Error) -> Self {
        SqlError::Engine(err)
    }
}

impl Table {
    /// Compile and run a restricted SELECT against this table. The FROM
    /// clause names the query target nominally (`self` by convention); the
    /// receiver is always the table queried.
    pub fn sql(&self, query: &str) -> Result<Table, SqlError> {
        let builder = lower_select(self, query)?;
        builder.execute().map_err(SqlError::Engine)
    }
}
