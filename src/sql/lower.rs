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

// Lowering: sqlparser AST -> ParsedSelect -> fluent builder pipeline.

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor, UnaryOperator,
    Value as SqlValue,
};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use super::SqlError;
use crate::convert::Value;
use crate::expr::{col, Expression, Operand, Operation};
use crate::query::SelectQueryBuilder;
use crate::types::Table;

// ---------------------------------------------------------------------------
// ParsedSelect
// ---------------------------------------------------------------------------

/// The restricted SELECT, extracted from the parser AST before lowering.
pub(crate) struct ParsedSelect {
    /// Projected items: optional alias plus the source expression; `None`
    /// expression marks `*`.
    columns: Vec<(Option<String>, Option<Expr>)>,
    where_: Option<Expr>,
    group_by: Vec<String>,
    order_by: Vec<(String, bool)>,
}

/// Parse one SELECT statement and lower it onto a builder over `table`.
pub(crate) fn lower_select(table: &Table, sql: &str) -> Result<SelectQueryBuilder, SqlError> {
    let parsed = parse(sql)?;
    build(table, parsed)
}

fn parse(sql: &str) -> Result<ParsedSelect, SqlError> {
    let dialect = DuckDbDialect {};
    let statements = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let stmt = statements
        .into_iter()
        .next()
        .ok_or_else(|| SqlError::Plan("Empty query".into()))?;
    let query = match stmt {
        Statement::Query(q) => q,
        other => {
            return Err(SqlError::Unsupported(format!(
                "statement {}",
                statement_kind(&other)
            )))
        }
    };
    let select = select_body(&query)?;

    check_from(&select.from)?;
    if select.having.is_some() {
        return Err(SqlError::Unsupported("HAVING".into()));
    }
    if select.distinct.is_some() {
        return Err(SqlError::Unsupported("SELECT DISTINCT".into()));
    }

    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => columns.push((None, None)),
            SelectItem::UnnamedExpr(e) => columns.push((None, Some(e.clone()))),
            SelectItem::ExprWithAlias { expr, alias } => {
                columns.push((Some(alias.value.to_string()), Some(expr.clone())))
            }
            other => {
                return Err(SqlError::Unsupported(format!("projection {other}")));
            }
        }
    }

    let group_by = match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => {
            let mut cols = Vec::new();
            for e in exprs {
                match e {
                    Expr::Identifier(ident) => cols.push(ident.value.to_string()),
                    other => {
                        return Err(SqlError::Unsupported(format!("GROUP BY expression {other}")))
                    }
                }
            }
            cols
        }
        _ => {
            return Err(SqlError::Unsupported("GROUP BY ALL".into()));
        }
    };

    let order_by = extract_order_by(&query)?;

    Ok(ParsedSelect {
        columns,
        where_: select.selection.clone(),
        group_by,
        order_by,
    })
}

fn select_body(query: &Query) -> Result<&Select, SqlError> {
    if query.with.is_some() {
        return Err(SqlError::Unsupported("WITH".into()));
    }
    match &*query.body {
        SetExpr::Select(s) => Ok(s),
        other => Err(SqlError::Unsupported(format!("query body {other}"))),
    }
}

/// FROM must be a single bare table name (`self` by convention); joins,
/// derived tables and table functions are outside the grammar.
fn check_from(from: &[sqlparser::ast::TableWithJoins]) -> Result<(), SqlError> {
    let item = match from {
        [single] => single,
        [] => return Err(SqlError::Plan("FROM clause is required".into())),
        _ => return Err(SqlError::Unsupported("multiple FROM tables".into())),
    };
    if !item.joins.is_empty() {
        return Err(SqlError::Unsupported("JOIN".into()));
    }
    match &item.relation {
        TableFactor::Table { name, args: None, .. } => {
            let _ = object_name_to_string(name);
            Ok(())
        }
        TableFactor::Derived { .. } => Err(SqlError::Unsupported("subquery in FROM".into())),
        other => Err(SqlError::Unsupported(format!("table factor {other}"))),
    }
}

fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

fn extract_order_by(query: &Query) -> Result<Vec<(String, bool)>, SqlError> {
    match &query.order_by {
        None => Ok(Vec::new()),
        Some(order_by) => {
            let mut result = Vec::new();
            for ob in &order_by.exprs {
                let name = match &ob.expr {
                    Expr::Identifier(ident) => ident.value.to_string(),
                    other => {
                        return Err(SqlError::Unsupported(format!("ORDER BY expression {other}")))
                    }
                };
                let desc = ob.asc.map(|asc| !asc).unwrap_or(false);
                result.push((name, desc));
            }
            Ok(result)
        }
    }
}

fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::CreateTable(_) => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        _ => "non-SELECT",
    }
}

// ---------------------------------------------------------------------------
// Lowering to the builder
// ---------------------------------------------------------------------------

fn build(table: &Table, parsed: ParsedSelect) -> Result<SelectQueryBuilder, SqlError> {
    let mut builder = table.query();

    for (alias, expr) in &parsed.columns {
        match expr {
            // Star injects the whole-table projection.
            None => builder = builder.select(["*"]),
            Some(Expr::Identifier(ident)) if alias.is_none() => {
                builder = builder.select([ident.value.as_str()]);
            }
            Some(e) => {
                let name = match alias {
                    Some(a) => a.clone(),
                    None => default_name(e),
                };
                let lowered = lower_expr(e)?;
                builder = builder.select_expr(&name, lowered.into_expression());
            }
        }
    }

    if let Some(predicate) = &parsed.where_ {
        builder = builder.where_(lower_expr(predicate)?.into_expression());
    }

    if !parsed.group_by.is_empty() {
        builder = builder.by(parsed.group_by.iter().map(String::as_str));
    }

    if !parsed.order_by.is_empty() {
        let desc = parsed.order_by.iter().any(|(_, d)| *d);
        builder = builder.order_by(parsed.order_by.iter().map(|(n, _)| n.as_str()), desc);
    }

    Ok(builder)
}

/// A lowered node: a column, a finished expression, or a literal carried
/// through as a host value.
enum Lowered {
    Col(crate::expr::Column),
    Expr(Expression),
    Lit(Value),
}

impl Lowered {
    fn into_operand(self) -> Operand {
        match self {
            Lowered::Col(c) => Operand::Col(c),
            Lowered::Expr(e) => Operand::Expr(e),
            Lowered::Lit(v) => Operand::Value(v),
        }
    }

    fn into_expression(self) -> Expression {
        match self {
            Lowered::Expr(e) => e,
            Lowered::Col(c) => c.into(),
            Lowered::Lit(v) => {
                Expression::new(Operation::Eval, vec![Operand::Value(v)])
            }
        }
    }
}

fn lower_expr(expr: &Expr) -> Result<Lowered, SqlError> {
    match expr {
        Expr::Identifier(ident) => Ok(Lowered::Col(col(&ident.value))),

        Expr::Value(val) => Ok(Lowered::Lit(lower_literal(val)?)),

        Expr::Nested(inner) => lower_expr(inner),

        Expr::BinaryOp { left, op, right } => {
            let l = lower_expr(left)?.into_operand();
            let r = lower_expr(right)?.into_operand();
            let op = match op {
                BinaryOperator::Plus => Operation::Add,
                BinaryOperator::Minus => Operation::Sub,
                BinaryOperator::Multiply => Operation::Mul,
                BinaryOperator::Divide => Operation::Div,
                BinaryOperator::Modulo => Operation::Mod,
                BinaryOperator::Eq => Operation::Eq,
                BinaryOperator::NotEq => Operation::Ne,
                BinaryOperator::Gt => Operation::Gt,
                BinaryOperator::GtEq => Operation::Ge,
                BinaryOperator::Lt => Operation::Lt,
                BinaryOperator::LtEq => Operation::Le,
                BinaryOperator::And => Operation::And,
                BinaryOperator::Or => Operation::Or,
                other => {
                    return Err(SqlError::Unsupported(format!("operator {other}")));
                }
            };
            Ok(Lowered::Expr(Expression::new(op, vec![l, r])))
        }

        // NOT x lowers to the boolean assertion form.
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: inner,
        } => {
            let e = lower_expr(inner)?.into_expression();
            Ok(Lowered::Expr(e.is_(false)))
        }

        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => {
            let e = lower_expr(inner)?;
            match e {
                Lowered::Lit(Value::Int(v)) => Ok(Lowered::Lit(Value::Int(-v))),
                Lowered::Lit(Value::Float(v)) => Ok(Lowered::Lit(Value::Float(-v))),
                other => Ok(Lowered::Expr(Expression::new(
                    Operation::Neg,
                    vec![other.into_operand()],
                ))),
            }
        }

        Expr::UnaryOp { op, .. } => Err(SqlError::Unsupported(format!("unary operator {op}"))),

        Expr::InList {
            expr: inner,
            list,
            negated,
        } => {
            let column = match lower_expr(inner)? {
                Lowered::Col(c) => c,
                _ => {
                    return Err(SqlError::Unsupported(
                        "IN over a non-column expression".into(),
                    ))
                }
            };
            let mut values = Vec::with_capacity(list.len());
            for item in list {
                match lower_expr(item)? {
                    Lowered::Lit(v) => values.push(v),
                    _ => {
                        return Err(SqlError::Unsupported(
                            "non-literal IN list element".into(),
                        ))
                    }
                }
            }
            let membership = column.isin(values);
            if *negated {
                Ok(Lowered::Expr(membership.is_(false)))
            } else {
                Ok(Lowered::Expr(membership))
            }
        }

        Expr::Function(f) => lower_function(f).map(Lowered::Expr),

        other => Err(SqlError::Unsupported(format!("expression {other}"))),
    }
}

fn lower_literal(val: &SqlValue) -> Result<Value, SqlError> {
    match val {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Int(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| SqlError::Plan(format!("Invalid number literal: {n}")))
            }
        }
        SqlValue::SingleQuotedString(s) => Ok(Value::Str(s.clone())),
        SqlValue::Boolean(b) => Ok(Value::Bool(*b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(SqlError::Unsupported(format!("literal {other}"))),
    }
}

/// The fixed table of SQL functions and their algebra counterparts.
fn agg_operation(name: &str) -> Option<Operation> {
    Some(match name {
        "count" => Operation::Count,
        "sum" => Operation::Sum,
        "avg" => Operation::Avg,
        "min" => Operation::Min,
        "max" => Operation::Max,
        "first" => Operation::First,
        "last" => Operation::Last,
        "median" => Operation::Med,
        "distinct" => Operation::Distinct,
        _ => return None,
    })
}

fn lower_function(f: &Function) -> Result<Expression, SqlError> {
    if f.over.is_some() {
        return Err(SqlError::Unsupported("window function".into()));
    }
    let name = object_name_to_string(&f.name).to_lowercase();
    let op = agg_operation(&name)
        .ok_or_else(|| SqlError::Unsupported(format!("function {name}")))?;
    let args = function_args(f)?;
    let arg = match args.as_slice() {
        [single] => lower_expr(single)?.into_operand(),
        [] => return Err(SqlError::Plan(format!("{name} requires an argument"))),
        _ => {
            return Err(SqlError::Unsupported(format!(
                "{name} with multiple arguments"
            )))
        }
    };
    Ok(Expression::new(op, vec![arg]))
}

fn function_args(f: &Function) -> Result<Vec<Expr>, SqlError> {
    match &f.args {
        FunctionArguments::List(arg_list) => {
            let mut exprs = Vec::new();
            for arg in &arg_list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => exprs.push(e.clone()),
                    FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => {
                        return Err(SqlError::Unsupported("function over *".into()))
                    }
                    other => {
                        return Err(SqlError::Unsupported(format!("function argument {other}")))
                    }
                }
            }
            Ok(exprs)
        }
        FunctionArguments::None => Ok(Vec::new()),
        FunctionArguments::Subquery(_) => Err(SqlError::Unsupported("subquery argument".into())),
    }
}

/// Default projection name for an unaliased computed expression.
fn default_name(e: &Expr) -> String {
    match e {
        Expr::Function(f) => {
            let fname = object_name_to_string(&f.name).to_lowercase();
            match function_args(f).ok().as_deref() {
                Some([Expr::Identifier(ident)]) => format!("{fname}_{}", ident.value),
                _ => fname,
            }
        }
        Expr::Identifier(ident) => ident.value.to_string(),
        _ => "expr".to_string(),
    }
}
