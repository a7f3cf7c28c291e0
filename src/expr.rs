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

//! The expression algebra: columns, expressions, filtered columns, operator
//! overloads and compilation into the runtime's AST. A compiled expression is
//! a list whose head is the primitive-function handle and whose tail is the
//! operands; column references are bare symbols, string literals are quoted
//! symbols.

use crate::convert::{to_runtime, Value};
use crate::rt::{self, types as codes, Handle, Result};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The closed set of runtime primitives reachable from the algebra.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    // logical
    And,
    Or,
    Not,
    // aggregation
    Sum,
    Avg,
    Count,
    Min,
    Max,
    First,
    Last,
    Med,
    Dev,
    // statistical
    Xbar,
    // math
    Ceil,
    Floor,
    Round,
    // collection
    In,
    Distinct,
    // query
    Select,
    Where,
    // join
    InnerJoin,
    LeftJoin,
    WindowJoin,
    WindowJoin1,
    // sort
    Asc,
    Desc,
    Xasc,
    Xdesc,
    Iasc,
    Idesc,
    // accessor
    At,
    // functional
    Map,
    MapLeft,
    // composition
    Til,
    // type
    List,
    // other
    Quote,
    Concat,
    ReadCsv,
    Eval,
}

impl Operation {
    /// The runtime primitive's symbolic name.
    pub fn name(self) -> &'static str {
        use Operation::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Neg => "neg",
            Eq => "==",
            Ne => "!=",
            Gt => ">",
            Ge => ">=",
            Lt => "<",
            Le => "<=",
            And => "and",
            Or => "or",
            Not => "not",
            Sum => "sum",
            Avg => "avg",
            Count => "count",
            Min => "min",
            Max => "max",
            First => "first",
            Last => "last",
            Med => "med",
            Dev => "dev",
            Xbar => "xbar",
            Ceil => "ceil",
            Floor => "floor",
            Round => "round",
            In => "in",
            Distinct => "distinct",
            Select => "select",
            Where => "where",
            InnerJoin => "ij",
            LeftJoin => "lj",
            WindowJoin => "wj",
            WindowJoin1 => "wj1",
            Asc => "asc",
            Desc => "desc",
            Xasc => "xasc",
            Xdesc => "xdesc",
            Iasc => "iasc",
            Idesc => "idesc",
            At => "at",
            Map => "map",
            MapLeft => "map-left",
            Til => "til",
            List => "list",
            Quote => "quote",
            Concat => "concat",
            ReadCsv => "read-csv",
            Eval => "eval",
        }
    }

    /// The primitive-function handle, resolved from the runtime environment.
    pub fn primitive(self) -> Result<Handle> {
        rt::env_get_internal_function_by_name(self.name())
    }

    /// Arity class, recovered from the primitive handle's type code
    /// (UNARY / BINARY / VARY).
    pub fn arity(self) -> Result<i8> {
        rt::type_code(&self.primitive()?)
    }
}

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// An expression operand before compilation.
#[derive(Clone, Debug)]
pub enum Operand {
    /// A literal host value.
    Value(Value),
    /// A column reference; lowers to a bare symbol.
    Col(Column),
    /// A nested expression.
    Expr(Expression),
    /// A filtered column; lowers to the column indexed by a where-mask.
    Filtered(FilteredColumn),
    /// A symbol literal, never a variable reference.
    Quoted(String),
    /// A pre-built runtime value.
    Handle(Handle),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Operand {
        Operand::Value(v)
    }
}

impl From<Column> for Operand {
    fn from(c: Column) -> Operand {
        Operand::Col(c)
    }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Operand {
        Operand::Expr(e)
    }
}

impl From<FilteredColumn> for Operand {
    fn from(f: FilteredColumn) -> Operand {
        Operand::Filtered(f)
    }
}

impl From<Handle> for Operand {
    fn from(h: Handle) -> Operand {
        Operand::Handle(h)
    }
}

macro_rules! operand_from_host {
    ($($host:ty),*) => {
        $(impl From<$host> for Operand {
            fn from(v: $host) -> Operand {
                Operand::Value(v.into())
            }
        })*
    };
}

operand_from_host!(bool, i32, i64, f64, char, &str, String);

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// A named column reference participating in operator overloading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    name: String,
}

/// Shorthand constructor for a column reference.
pub fn col(name: &str) -> Column {
    Column {
        name: name.to_string(),
    }
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pair this column with a predicate; aggregations over the result scan
    /// only the rows the predicate admits.
    pub fn filter(&self, predicate: impl Into<Expression>) -> FilteredColumn {
        FilteredColumn {
            col: self.clone(),
            predicate: predicate.into(),
        }
    }

    /// Set membership. String values materialize a symbol vector, anything
    /// else a list.
    pub fn isin<V: Into<Value>>(&self, values: Vec<V>) -> Expression {
        Expression::new(
            Operation::In,
            vec![
                Operand::Col(self.clone()),
                Operand::Value(Value::List(values.into_iter().map(Into::into).collect())),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// An operation applied to operands.
#[derive(Clone, Debug)]
pub struct Expression {
    op: Operation,
    operands: Vec<Operand>,
}

impl Expression {
    pub fn new(op: Operation, operands: Vec<Operand>) -> Expression {
        Expression { op, operands }
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    /// Compile into the runtime AST: a list headed by the primitive handle.
    pub fn compile(&self) -> Result<Handle> {
        let ast = rt::list_new()?;
        rt::push(&ast, &self.op.primitive()?)?;
        for (i, operand) in self.operands.iter().enumerate() {
            rt::push(&ast, &compile_operand(self.op, i, operand)?)?;
        }
        Ok(ast)
    }
}

impl From<Column> for Expression {
    /// A bare column used where an expression is expected: the identity
    /// `eval` of the column reference.
    fn from(c: Column) -> Expression {
        Expression::new(Operation::Eval, vec![Operand::Col(c)])
    }
}

fn compile_operand(op: Operation, position: usize, operand: &Operand) -> Result<Handle> {
    match operand {
        Operand::Expr(e) => e.compile(),
        Operand::Filtered(f) => f.compile(),
        Operand::Col(c) => rt::sym(&c.name),
        Operand::Quoted(s) => rt::quote(&rt::sym(s)?),
        Operand::Handle(h) => Ok(h.clone()),
        Operand::Value(Value::Str(s)) => {
            // A string is a literal symbol unless it is the subject of `at`.
            if op == Operation::At && position == 0 {
                rt::sym(s)
            } else {
                rt::quote(&rt::sym(s)?)
            }
        }
        Operand::Value(Value::List(items)) if op == Operation::In && position == 1 => {
            let all_strings = !items.is_empty()
                && items.iter().all(|v| matches!(v, Value::Str(_)));
            if all_strings {
                let vec = rt::vector_new(codes::SYM)?;
                for v in items {
                    if let Value::Str(s) = v {
                        rt::push(&vec, &rt::sym(s)?)?;
                    }
                }
                Ok(vec)
            } else {
                to_runtime(&Value::List(items.clone()))
            }
        }
        Operand::Value(v) => to_runtime(v),
    }
}

// ---------------------------------------------------------------------------
// FilteredColumn
// ---------------------------------------------------------------------------

/// A column paired with a predicate. Compiles to the column indexed by the
/// predicate's where-mask, so an enclosing aggregation scans only the
/// admitted rows.
#[derive(Clone, Debug)]
pub struct FilteredColumn {
    col: Column,
    predicate: Expression,
}

impl FilteredColumn {
    pub fn compile(&self) -> Result<Handle> {
        let where_expr = Expression::new(
            Operation::Where,
            vec![Operand::Expr(self.predicate.clone())],
        );
        let ast = rt::list_new()?;
        rt::push(&ast, &Operation::Map.primitive()?)?;
        rt::push(&ast, &Operation::At.primitive()?)?;
        rt::push(&ast, &rt::sym(&self.col.name)?)?;
        rt::push(&ast, &where_expr.compile()?)?;
        Ok(ast)
    }
}

// ---------------------------------------------------------------------------
// Comparison / aggregation surfaces
// ---------------------------------------------------------------------------

macro_rules! comparison_methods {
    ($ty:ty) => {
        impl $ty {
            pub fn eq_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Eq, vec![self.into(), rhs.into()])
            }

            pub fn ne_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Ne, vec![self.into(), rhs.into()])
            }

            pub fn gt_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Gt, vec![self.into(), rhs.into()])
            }

            pub fn ge_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Ge, vec![self.into(), rhs.into()])
            }

            pub fn lt_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Lt, vec![self.into(), rhs.into()])
            }

            pub fn le_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Le, vec![self.into(), rhs.into()])
            }

            /// Explicit conjunction, equivalent to `&`.
            pub fn and_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::And, vec![self.into(), rhs.into()])
            }

            /// Explicit disjunction, equivalent to `|`.
            pub fn or_(self, rhs: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Or, vec![self.into(), rhs.into()])
            }
        }
    };
}

comparison_methods!(Column);
comparison_methods!(Expression);

macro_rules! aggregation_methods {
    ($ty:ty) => {
        impl $ty {
            pub fn sum(self) -> Expression {
                Expression::new(Operation::Sum, vec![self.into()])
            }

            pub fn avg(self) -> Expression {
                Expression::new(Operation::Avg, vec![self.into()])
            }

            /// Alias for `avg`.
            pub fn mean(self) -> Expression {
                self.avg()
            }

            pub fn count(self) -> Expression {
                Expression::new(Operation::Count, vec![self.into()])
            }

            pub fn min_(self) -> Expression {
                Expression::new(Operation::Min, vec![self.into()])
            }

            pub fn max_(self) -> Expression {
                Expression::new(Operation::Max, vec![self.into()])
            }

            pub fn first(self) -> Expression {
                Expression::new(Operation::First, vec![self.into()])
            }

            pub fn last(self) -> Expression {
                Expression::new(Operation::Last, vec![self.into()])
            }

            pub fn median(self) -> Expression {
                Expression::new(Operation::Med, vec![self.into()])
            }

            pub fn dev(self) -> Expression {
                Expression::new(Operation::Dev, vec![self.into()])
            }

            pub fn distinct(self) -> Expression {
                Expression::new(Operation::Distinct, vec![self.into()])
            }

            /// Round down to a multiple of `n`.
            pub fn xbar(self, n: impl Into<Operand>) -> Expression {
                Expression::new(Operation::Xbar, vec![n.into(), self.into()])
            }

            pub fn ceil(self) -> Expression {
                Expression::new(Operation::Ceil, vec![self.into()])
            }

            pub fn floor(self) -> Expression {
                Expression::new(Operation::Floor, vec![self.into()])
            }

            pub fn round(self) -> Expression {
                Expression::new(Operation::Round, vec![self.into()])
            }

            /// Boolean assertion. `is_(true)` forces evaluation of the
            /// expression as-is; `is_(false)` forces its negation.
            pub fn is_(self, truth: bool) -> Expression {
                if truth {
                    Expression::new(Operation::Eval, vec![self.into()])
                } else {
                    let negated = Expression::new(Operation::Not, vec![self.into()]);
                    Expression::new(Operation::Eval, vec![Operand::Expr(negated)])
                }
            }
        }
    };
}

aggregation_methods!(Column);
aggregation_methods!(Expression);
aggregation_methods!(FilteredColumn);

// ---------------------------------------------------------------------------
// Operator overloads
// ---------------------------------------------------------------------------

macro_rules! binary_ops {
    ($ty:ty) => {
        impl<R: Into<Operand>> std::ops::Add<R> for $ty {
            type Output = Expression;
            fn add(self, rhs: R) -> Expression {
                Expression::new(Operation::Add, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::Sub<R> for $ty {
            type Output = Expression;
            fn sub(self, rhs: R) -> Expression {
                Expression::new(Operation::Sub, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::Mul<R> for $ty {
            type Output = Expression;
            fn mul(self, rhs: R) -> Expression {
                Expression::new(Operation::Mul, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::Div<R> for $ty {
            type Output = Expression;
            fn div(self, rhs: R) -> Expression {
                Expression::new(Operation::Div, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::Rem<R> for $ty {
            type Output = Expression;
            fn rem(self, rhs: R) -> Expression {
                Expression::new(Operation::Mod, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::BitAnd<R> for $ty {
            type Output = Expression;
            fn bitand(self, rhs: R) -> Expression {
                Expression::new(Operation::And, vec![self.into(), rhs.into()])
            }
        }

        impl<R: Into<Operand>> std::ops::BitOr<R> for $ty {
            type Output = Expression;
            fn bitor(self, rhs: R) -> Expression {
                Expression::new(Operation::Or, vec![self.into(), rhs.into()])
            }
        }

        impl std::ops::Not for $ty {
            type Output = Expression;
            fn not(self) -> Expression {
                Expression::new(Operation::Not, vec![self.into()])
            }
        }

        impl std::ops::Neg for $ty {
            type Output = Expression;
            fn neg(self) -> Expression {
                Expression::new(Operation::Neg, vec![self.into()])
            }
        }
    };
}

binary_ops!(Column);
binary_ops!(Expression);

macro_rules! reflected_ops {
    ($host:ty, $ty:ty) => {
        impl std::ops::Add<$ty> for $host {
            type Output = Expression;
            fn add(self, rhs: $ty) -> Expression {
                Expression::new(Operation::Add, vec![self.into(), rhs.into()])
            }
        }

        impl std::ops::Sub<$ty> for $host {
            type Output = Expression;
            fn sub(self, rhs: $ty) -> Expression {
                Expression::new(Operation::Sub, vec![self.into(), rhs.into()])
            }
        }

        impl std::ops::Mul<$ty> for $host {
            type Output = Expression;
            fn mul(self, rhs: $ty) -> Expression {
                Expression::new(Operation::Mul, vec![self.into(), rhs.into()])
            }
        }

        impl std::ops::Div<$ty> for $host {
            type Output = Expression;
            fn div(self, rhs: $ty) -> Expression {
                Expression::new(Operation::Div, vec![self.into(), rhs.into()])
            }
        }

        impl std::ops::Rem<$ty> for $host {
            type Output = Expression;
            fn rem(self, rhs: $ty) -> Expression {
                Expression::new(Operation::Mod, vec![self.into(), rhs.into()])
            }
        }
    };
}

reflected_ops!(i64, Column);
reflected_ops!(i64, Expression);
reflected_ops!(f64, Column);
reflected_ops!(f64, Expression);
