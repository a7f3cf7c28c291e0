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

//! Query builders. Builders are immutable between fluent calls: every method
//! consumes the builder and returns an augmented copy; `execute` assembles
//! the query dictionary, submits it through the boundary and reconstructs a
//! table from the result.

use crate::convert::{sniff_elem, to_runtime, Value};
use crate::expr::{Expression, Operation};
use crate::rt::{self, types as codes, Error, Handle, Result};
use crate::types::Table;

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// A projected entry: a bare column name or a named computed expression.
#[derive(Clone, Debug)]
enum Proj {
    Name(String),
    Expr(Expression),
}

impl Proj {
    fn compile(&self) -> Result<Handle> {
        match self {
            Proj::Name(n) => rt::sym(n),
            Proj::Expr(e) => e.compile(),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectQueryBuilder
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum QuerySource {
    Table(Table),
    Subquery(Box<SelectQueryBuilder>),
}

/// Fluent, immutable SELECT builder.
#[derive(Clone, Debug)]
pub struct SelectQueryBuilder {
    source: QuerySource,
    projections: Vec<(String, Proj)>,
    wheres: Vec<Expression>,
    by: Vec<(String, Proj)>,
    order_by: Vec<String>,
    order_desc: bool,
}

impl SelectQueryBuilder {
    fn over(source: QuerySource) -> SelectQueryBuilder {
        SelectQueryBuilder {
            source,
            projections: Vec::new(),
            wheres: Vec::new(),
            by: Vec::new(),
            order_by: Vec::new(),
            order_desc: false,
        }
    }

    /// Compose over another select: the inner query becomes the `from`.
    pub fn from_query(inner: SelectQueryBuilder) -> SelectQueryBuilder {
        SelectQueryBuilder::over(QuerySource::Subquery(Box::new(inner)))
    }

    /// Project columns by name. `"*"` selects every source column.
    pub fn select<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for c in cols {
            let name: String = c.into();
            if name == "*" {
                continue;
            }
            self.projections.push((name.clone(), Proj::Name(name)));
        }
        self
    }

    /// Project a named computed expression.
    pub fn select_expr(mut self, name: &str, expr: impl Into<Expression>) -> Self {
        self.projections.push((name.to_string(), Proj::Expr(expr.into())));
        self
    }

    /// Add a filter; multiple calls are combined conjunctively.
    pub fn where_(mut self, predicate: impl Into<Expression>) -> Self {
        self.wheres.push(predicate.into());
        self
    }

    /// Filter built from a closure over the bound table, supporting
    /// `|t| t.col("age").ge_(35)` style predicates.
    pub fn where_fn(self, f: impl FnOnce(&Table) -> Expression) -> Result<Self> {
        let table = match &self.source {
            QuerySource::Table(t) => t.clone(),
            QuerySource::Subquery(_) => {
                return Err(Error::Runtime(
                    "runtime error: a where closure needs a bound table".into(),
                ))
            }
        };
        let predicate = f(&table);
        Ok(self.where_(predicate))
    }

    /// Group by columns.
    pub fn by<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for c in cols {
            let name: String = c.into();
            self.by.push((name.clone(), Proj::Name(name)));
        }
        self
    }

    /// Group by a named computed key.
    pub fn by_expr(mut self, name: &str, expr: impl Into<Expression>) -> Self {
        self.by.push((name.to_string(), Proj::Expr(expr.into())));
        self
    }

    /// Sort the result by the given columns after execution.
    pub fn order_by<I, S>(mut self, cols: I, desc: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(cols.into_iter().map(Into::into));
        self.order_desc = desc;
        self
    }

    /// The conjunction of all accumulated where clauses.
    fn combined_where(&self) -> Option<Expression> {
        let mut it = self.wheres.iter().cloned();
        let first = it.next()?;
        Some(it.fold(first, |acc, e| acc & e))
    }

    /// Assemble the query dictionary: projections, `by`, `from`, `where`.
    pub(crate) fn build_dict(&self) -> Result<Handle> {
        let keys = rt::vector_new(codes::SYM)?;
        let vals = rt::list_new()?;

        for (name, proj) in &self.projections {
            rt::push(&keys, &rt::sym(name)?)?;
            rt::push(&vals, &proj.compile()?)?;
        }

        if !self.by.is_empty() {
            let by_keys = rt::vector_new(codes::SYM)?;
            let by_vals = rt::list_new()?;
            for (name, proj) in &self.by {
                rt::push(&by_keys, &rt::sym(name)?)?;
                rt::push(&by_vals, &proj.compile()?)?;
            }
            rt::push(&keys, &rt::sym("by")?)?;
            rt::push(&vals, &rt::dict_new(&by_keys, &by_vals)?)?;
        }

        rt::push(&keys, &rt::sym("from")?)?;
        rt::push(&vals, &self.from_value()?)?;

        if let Some(predicate) = self.combined_where() {
            rt::push(&keys, &rt::sym("where")?)?;
            rt::push(&vals, &predicate.compile()?)?;
        }

        rt::dict_new(&keys, &vals)
    }

    fn from_value(&self) -> Result<Handle> {
        match &self.source {
            QuerySource::Table(t) => t.reference(),
            QuerySource::Subquery(q) => {
                let nested = rt::list_new()?;
                rt::push(&nested, &Operation::Select.primitive()?)?;
                rt::push(&nested, &q.build_dict()?)?;
                Ok(nested)
            }
        }
    }

    /// Submit the query and reconstruct the resulting table.
    pub fn execute(&self) -> Result<Table> {
        let result = rt::select(&self.build_dict()?)?;
        let table = Table::from_handle(result)?;
        if self.order_by.is_empty() {
            return Ok(table);
        }
        let cols: Vec<&str> = self.order_by.iter().map(String::as_str).collect();
        if self.order_desc {
            table.xdesc(&cols)
        } else {
            table.xasc(&cols)
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateQuery
// ---------------------------------------------------------------------------

/// Fluent UPDATE builder. On a named table the runtime mutates the named
/// value and `execute` returns the same reference; on an owned table a new
/// value is produced.
#[derive(Clone, Debug)]
pub struct UpdateQuery {
    target: Table,
    sets: Vec<(String, Expression)>,
    wheres: Vec<Expression>,
}

impl UpdateQuery {
    pub fn set(mut self, name: &str, expr: impl Into<Expression>) -> Self {
        self.sets.push((name.to_string(), expr.into()));
        self
    }

    pub fn where_(mut self, predicate: impl Into<Expression>) -> Self {
        self.wheres.push(predicate.into());
        self
    }

    pub fn execute(&self) -> Result<Table> {
        if self.sets.is_empty() {
            return Err(Error::Arity);
        }
        let keys = rt::vector_new(codes::SYM)?;
        let vals = rt::list_new()?;
        for (name, expr) in &self.sets {
            rt::push(&keys, &rt::sym(name)?)?;
            rt::push(&vals, &expr.compile()?)?;
        }
        rt::push(&keys, &rt::sym("from")?)?;
        rt::push(&vals, &self.target.reference()?)?;
        if !self.wheres.is_empty() {
            let mut it = self.wheres.iter().cloned();
            let first = it.next().unwrap();
            let predicate = it.fold(first, |acc, e| acc & e);
            rt::push(&keys, &rt::sym("where")?)?;
            rt::push(&vals, &predicate.compile()?)?;
        }
        let dict = rt::dict_new(&keys, &vals)?;
        Table::from_result(rt::update(&dict)?)
    }
}

// ---------------------------------------------------------------------------
// InsertQuery / UpsertQuery
// ---------------------------------------------------------------------------

/// Row data accepted either positionally (rows of scalars) or by keyword
/// (column name to values) — never both.
#[derive(Clone, Debug, Default)]
struct RowData {
    rows: Vec<Vec<Value>>,
    columns: Vec<(String, Vec<Value>)>,
}

impl RowData {
    /// Build the runtime data value: a list of column vectors for positional
    /// rows, a dict of column name to vector for keyword data. Scalars are
    /// always carried as vectors so the column type is preserved.
    fn build(&self, table: &Table) -> Result<Handle> {
        match (self.rows.is_empty(), self.columns.is_empty()) {
            (false, false) | (true, true) => Err(Error::Arity),
            (false, true) => {
                let names = table.col_names()?;
                let ncols = names.len();
                for row in &self.rows {
                    if row.len() != ncols {
                        return Err(Error::Conversion(format!(
                            "row of {} values for {} columns",
                            row.len(),
                            ncols
                        )));
                    }
                }
                let data = rt::list_new()?;
                for c in 0..ncols {
                    let column: Vec<Value> =
                        self.rows.iter().map(|row| row[c].clone()).collect();
                    rt::push(&data, &column_vector(&column)?)?;
                }
                Ok(data)
            }
            (true, false) => {
                let keys = rt::vector_new(codes::SYM)?;
                let vals = rt::list_new()?;
                for (name, values) in &self.columns {
                    rt::push(&keys, &rt::sym(name)?)?;
                    rt::push(&vals, &column_vector(values)?)?;
                }
                rt::dict_new(&keys, &vals)
            }
        }
    }
}

/// Materialize one column of values as a homogeneous vector inferred from
/// the first value, else a list.
fn column_vector(values: &[Value]) -> Result<Handle> {
    match values.first().and_then(sniff_elem) {
        Some(elem) => {
            let v = rt::vector_new(elem)?;
            for item in values {
                rt::push(&v, &to_runtime(item)?)?;
            }
            Ok(v)
        }
        None => {
            let l = rt::list_new()?;
            for item in values {
                rt::push(&l, &to_runtime(item)?)?;
            }
            Ok(l)
        }
    }
}

#[derive(Clone, Debug)]
pub struct InsertQuery {
    target: Table,
    data: RowData,
}

impl InsertQuery {
    /// Append one positional row of scalars.
    pub fn row<V: Into<Value>>(mut self, values: Vec<V>) -> Self {
        self.data.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Provide one keyword column of values.
    pub fn column<V: Into<Value>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.data
            .columns
            .push((name.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn execute(&self) -> Result<Table> {
        let data = self.data.build(&self.target)?;
        Table::from_result(rt::insert(&self.target.target()?, &data)?)
    }
}

#[derive(Clone, Debug)]
pub struct UpsertQuery {
    target: Table,
    match_by_first: i64,
    data: RowData,
}

impl UpsertQuery {
    pub fn row<V: Into<Value>>(mut self, values: Vec<V>) -> Self {
        self.data.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn column<V: Into<Value>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.data
            .columns
            .push((name.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn execute(&self) -> Result<Table> {
        if self.match_by_first < 1 {
            return Err(Error::UpsertArity);
        }
        let data = self.data.build(&self.target)?;
        Table::from_result(rt::upsert(
            &self.target.target()?,
            self.match_by_first,
            &data,
        )?)
    }
}

// ---------------------------------------------------------------------------
// Window join interval
// ---------------------------------------------------------------------------

/// A pair of per-row windows anchored on a table column: compiles to
/// `(map-left, +, [lower, upper], (at, table, 'column))`.
#[derive(Clone, Debug)]
pub struct TableColumnInterval {
    lower: i64,
    upper: i64,
    table: Table,
    column: String,
}

impl TableColumnInterval {
    pub fn new(lower: i64, upper: i64, table: &Table, column: &str) -> TableColumnInterval {
        TableColumnInterval {
            lower,
            upper,
            table: table.clone(),
            column: column.to_string(),
        }
    }

    pub(crate) fn compile(&self) -> Result<Handle> {
        let bounds = rt::vector_new(codes::I64)?;
        rt::push(&bounds, &rt::i64(self.lower)?)?;
        rt::push(&bounds, &rt::i64(self.upper)?)?;

        let anchor = rt::list_new()?;
        rt::push(&anchor, &Operation::At.primitive()?)?;
        rt::push(&anchor, &self.table.reference()?)?;
        rt::push(&anchor, &rt::quote(&rt::sym(&self.column)?)?)?;

        let ast = rt::list_new()?;
        rt::push(&ast, &Operation::MapLeft.primitive()?)?;
        rt::push(&ast, &Operation::Add.primitive()?)?;
        rt::push(&ast, &bounds)?;
        rt::push(&ast, &anchor)?;
        Ok(ast)
    }
}

// ---------------------------------------------------------------------------
// Table query surface
// ---------------------------------------------------------------------------

fn on_vector(on: &[&str]) -> Result<Handle> {
    let v = rt::vector_new(codes::SYM)?;
    for name in on {
        rt::push(&v, &rt::sym(name)?)?;
    }
    Ok(v)
}

fn join_ast(op: Operation, parts: &[Handle]) -> Result<Handle> {
    let ast = rt::list_new()?;
    rt::push(&ast, &op.primitive()?)?;
    for p in parts {
        rt::push(&ast, p)?;
    }
    Ok(ast)
}

impl Table {
    /// Start a SELECT over this table.
    pub fn query(&self) -> SelectQueryBuilder {
        SelectQueryBuilder::over(QuerySource::Table(self.clone()))
    }

    /// Start a SELECT and project columns by name in one call.
    pub fn select<I, S>(&self, cols: I) -> SelectQueryBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().select(cols)
    }

    /// Start an UPDATE over this table.
    pub fn update(&self) -> UpdateQuery {
        UpdateQuery {
            target: self.clone(),
            sets: Vec::new(),
            wheres: Vec::new(),
        }
    }

    /// Start an INSERT into this table.
    pub fn insert(&self) -> InsertQuery {
        InsertQuery {
            target: self.clone(),
            data: RowData::default(),
        }
    }

    /// Start an UPSERT into this table; the first `match_by_first` columns
    /// are the match keys.
    pub fn upsert(&self, match_by_first: i64) -> UpsertQuery {
        UpsertQuery {
            target: self.clone(),
            match_by_first,
            data: RowData::default(),
        }
    }

    pub fn inner_join(&self, other: &Table, on: &[&str]) -> Result<Table> {
        let ast = join_ast(
            Operation::InnerJoin,
            &[on_vector(on)?, self.reference()?, other.reference()?],
        )?;
        Table::from_handle(rt::eval_obj(&ast)?)
    }

    pub fn left_join(&self, other: &Table, on: &[&str]) -> Result<Table> {
        let ast = join_ast(
            Operation::LeftJoin,
            &[on_vector(on)?, self.reference()?, other.reference()?],
        )?;
        Table::from_handle(rt::eval_obj(&ast)?)
    }

    fn window_join_impl(
        &self,
        op: Operation,
        on: &[&str],
        interval: &TableColumnInterval,
        rights: &[&Table],
        aggs: &[(&str, Expression)],
    ) -> Result<Table> {
        let mut parts = vec![on_vector(on)?, interval.compile()?, self.reference()?];
        for r in rights {
            parts.push(r.reference()?);
        }
        let agg_keys = rt::vector_new(codes::SYM)?;
        let agg_vals = rt::list_new()?;
        for (name, expr) in aggs {
            rt::push(&agg_keys, &rt::sym(name)?)?;
            rt::push(&agg_vals, &expr.compile()?)?;
        }
        parts.push(rt::dict_new(&agg_keys, &agg_vals)?);
        let ast = join_ast(op, &parts)?;
        Table::from_handle(rt::eval_obj(&ast)?)
    }

    /// Window join: aggregate right-table rows inside a per-row interval,
    /// admitting the prevailing row before each window.
    pub fn window_join(
        &self,
        on: &[&str],
        interval: &TableColumnInterval,
        rights: &[&Table],
        aggs: &[(&str, Expression)],
    ) -> Result<Table> {
        self.window_join_impl(Operation::WindowJoin, on, interval, rights, aggs)
    }

    /// Window join over the in-window rows only.
    pub fn window_join1(
        &self,
        on: &[&str],
        interval: &TableColumnInterval,
        rights: &[&Table],
        aggs: &[(&str, Expression)],
    ) -> Result<Table> {
        self.window_join_impl(Operation::WindowJoin1, on, interval, rights, aggs)
    }

    /// Sort ascending by the given columns.
    pub fn xasc(&self, cols: &[&str]) -> Result<Table> {
        let ast = join_ast(Operation::Xasc, &[on_vector(cols)?, self.reference()?])?;
        Table::from_result(rt::eval_obj(&ast)?)
    }

    /// Sort descending by the given columns.
    pub fn xdesc(&self, cols: &[&str]) -> Result<Table> {
        let ast = join_ast(Operation::Xdesc, &[on_vector(cols)?, self.reference()?])?;
        Table::from_result(rt::eval_obj(&ast)?)
    }

    /// Row-concatenate other tables onto this one, folding a single
    /// `concat` over the sequence.
    pub fn concat(&self, others: &[&Table]) -> Result<Table> {
        let mut parts = vec![self.reference()?];
        for o in others {
            parts.push(o.reference()?);
        }
        let ast = join_ast(Operation::Concat, &parts)?;
        Table::from_handle(rt::eval_obj(&ast)?)
    }
}
