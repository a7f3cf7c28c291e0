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

//! Primitive registry and AST evaluation. An expression is a list whose head
//! is a primitive-function value and whose tail is operands; bare symbols are
//! variable references, `quote` suppresses evaluation of its operand.

use super::ops::{self, ArithOp, CmpOp};
use super::{atom, csv, list, query, state, Body, ColData, Handle, KResult};
use super::{BINARY, UNARY, VARY};

// ===== Primitive registry =====

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Primitive {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Not,
    Sum,
    Avg,
    Count,
    Min,
    Max,
    First,
    Last,
    Med,
    Dev,
    Xbar,
    Ceil,
    Floor,
    Round,
    In,
    Distinct,
    Select,
    Where,
    Ij,
    Lj,
    Wj,
    Wj1,
    Asc,
    Desc,
    Xasc,
    Xdesc,
    Iasc,
    Idesc,
    At,
    Map,
    MapLeft,
    Til,
    List,
    Quote,
    Concat,
    ReadCsv,
    Eval,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        use Primitive::*;
        Some(match name {
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "%" => Mod,
            "neg" => Neg,
            "==" => Eq,
            "!=" => Ne,
            ">" => Gt,
            ">=" => Ge,
            "<" => Lt,
            "<=" => Le,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "sum" => Sum,
            "avg" => Avg,
            "count" => Count,
            "min" => Min,
            "max" => Max,
            "first" => First,
            "last" => Last,
            "med" => Med,
            "dev" => Dev,
            "xbar" => Xbar,
            "ceil" => Ceil,
            "floor" => Floor,
            "round" => Round,
            "in" => In,
            "distinct" => Distinct,
            "select" => Select,
            "where" => Where,
            "ij" => Ij,
            "lj" => Lj,
            "wj" => Wj,
            "wj1" => Wj1,
            "asc" => Asc,
            "desc" => Desc,
            "xasc" => Xasc,
            "xdesc" => Xdesc,
            "iasc" => Iasc,
            "idesc" => Idesc,
            "at" => At,
            "map" => Map,
            "map-left" => MapLeft,
            "til" => Til,
            "list" => List,
            "quote" => Quote,
            "concat" => Concat,
            "read-csv" => ReadCsv,
            "eval" => Eval,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Primitive::*;
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
            Ij => "ij",
            Lj => "lj",
            Wj => "wj",
            Wj1 => "wj1",
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

    /// Type code of the callable: unary / binary / variadic.
    pub fn arity_code(self) -> i8 {
        use Primitive::*;
        match self {
            Neg | Not | Sum | Avg | Count | Min | Max | First | Last | Med | Dev | Ceil
            | Floor | Round | Distinct | Select | Where | Asc | Desc | Iasc | Idesc | Til
            | Quote | Eval => UNARY,
            Add | Sub | Mul | Div | Mod | Eq | Ne | Gt | Ge | Lt | Le | And | Or | In | Xbar
            | At | Xasc | Xdesc | ReadCsv => BINARY,
            Ij | Lj | Wj | Wj1 | Map | MapLeft | List | Concat => VARY,
        }
    }
}

// ===== Column scope =====

/// Column bindings active while evaluating inside a query.
pub(crate) struct Scope {
    pub names: Vec<i64>,
    pub cols: Vec<Handle>,
}

impl Scope {
    pub fn lookup(&self, id: i64) -> Option<Handle> {
        self.names
            .iter()
            .position(|&n| n == id)
            .map(|i| self.cols[i].clone())
    }
}

// ===== Evaluation =====

pub(crate) fn eval_obj(h: &Handle) -> KResult<Handle> {
    eval_with(h, None)
}

pub(crate) fn eval_with(h: &Handle, scope: Option<&Scope>) -> KResult<Handle> {
    let body = h.body().clone();
    match body {
        Body::Sym(id) => {
            if let Some(s) = scope {
                if let Some(col) = s.lookup(id) {
                    return Ok(col);
                }
            }
            match state::env_get(id)? {
                Some(v) => Ok(v),
                None => Err(format!("undefined: {}", state::sym_name(id)?)),
            }
        }
        Body::List(items) => {
            let head_prim = items.first().and_then(|h| match &*h.body() {
                Body::Fun(p) => Some(*p),
                _ => None,
            });
            match head_prim {
                Some(Primitive::Quote) => {
                    if items.len() != 2 {
                        return Err("rank: quote takes one operand".into());
                    }
                    Ok(items[1].clone())
                }
                Some(p) => {
                    let mut args = Vec::with_capacity(items.len() - 1);
                    for it in &items[1..] {
                        args.push(eval_with(it, scope)?);
                    }
                    apply(p, &args, scope)
                }
                None => {
                    let mut out = Vec::with_capacity(items.len());
                    for it in &items {
                        out.push(eval_with(it, scope)?);
                    }
                    Ok(list(out))
                }
            }
        }
        Body::Err(msg) => Err(msg),
        _ => Ok(h.clone()),
    }
}

fn expect_args(p: Primitive, args: &[Handle], n: usize) -> KResult<()> {
    if args.len() != n {
        return Err(format!("rank: {} takes {n} operand(s), got {}", p.name(), args.len()));
    }
    Ok(())
}

pub(crate) fn apply(p: Primitive, args: &[Handle], scope: Option<&Scope>) -> KResult<Handle> {
    use Primitive::*;
    match p {
        Add | Sub | Mul | Div | Mod => {
            expect_args(p, args, 2)?;
            let op = match p {
                Add => ArithOp::Add,
                Sub => ArithOp::Sub,
                Mul => ArithOp::Mul,
                Div => ArithOp::Div,
                _ => ArithOp::Mod,
            };
            ops::arith(op, &args[0], &args[1])
        }
        Neg => {
            expect_args(p, args, 1)?;
            ops::neg(&args[0])
        }
        Eq | Ne | Gt | Ge | Lt | Le => {
            expect_args(p, args, 2)?;
            let op = match p {
                Eq => CmpOp::Eq,
                Ne => CmpOp::Ne,
                Gt => CmpOp::Gt,
                Ge => CmpOp::Ge,
                Lt => CmpOp::Lt,
                _ => CmpOp::Le,
            };
            ops::compare(op, &args[0], &args[1])
        }
        And => {
            expect_args(p, args, 2)?;
            ops::and(&args[0], &args[1])
        }
        Or => {
            expect_args(p, args, 2)?;
            ops::or(&args[0], &args[1])
        }
        Not => {
            expect_args(p, args, 1)?;
            ops::not(&args[0])
        }
        Sum => {
            expect_args(p, args, 1)?;
            ops::sum(&args[0])
        }
        Avg => {
            expect_args(p, args, 1)?;
            ops::avg(&args[0])
        }
        Count => {
            expect_args(p, args, 1)?;
            ops::count(&args[0])
        }
        Min => {
            expect_args(p, args, 1)?;
            ops::min(&args[0])
        }
        Max => {
            expect_args(p, args, 1)?;
            ops::max(&args[0])
        }
        First => {
            expect_args(p, args, 1)?;
            ops::first(&args[0])
        }
        Last => {
            expect_args(p, args, 1)?;
            ops::last(&args[0])
        }
        Med => {
            expect_args(p, args, 1)?;
            ops::med(&args[0])
        }
        Dev => {
            expect_args(p, args, 1)?;
            ops::dev(&args[0])
        }
        Xbar => {
            expect_args(p, args, 2)?;
            ops::xbar(&args[0], &args[1])
        }
        Ceil => {
            expect_args(p, args, 1)?;
            ops::ceil(&args[0])
        }
        Floor => {
            expect_args(p, args, 1)?;
            ops::floor(&args[0])
        }
        Round => {
            expect_args(p, args, 1)?;
            ops::round(&args[0])
        }
        In => {
            expect_args(p, args, 2)?;
            ops::isin(&args[0], &args[1])
        }
        Distinct => {
            expect_args(p, args, 1)?;
            ops::distinct(&args[0])
        }
        Where => {
            expect_args(p, args, 1)?;
            ops::where_indices(&args[0])
        }
        Til => {
            expect_args(p, args, 1)?;
            ops::til(&args[0])
        }
        Asc => {
            expect_args(p, args, 1)?;
            ops::sort(&args[0], false)
        }
        Desc => {
            expect_args(p, args, 1)?;
            ops::sort(&args[0], true)
        }
        Iasc => {
            expect_args(p, args, 1)?;
            ops::grade(&args[0], false)
        }
        Idesc => {
            expect_args(p, args, 1)?;
            ops::grade(&args[0], true)
        }
        At => {
            expect_args(p, args, 2)?;
            ops::at(&args[0], &args[1])
        }
        Select => {
            expect_args(p, args, 1)?;
            query::select(&args[0])
        }
        Ij => query::join(args, false),
        Lj => query::join(args, true),
        Wj => query::window_join(args, true),
        Wj1 => query::window_join(args, false),
        Xasc => {
            expect_args(p, args, 2)?;
            query::sort_table(&args[0], &args[1], false)
        }
        Xdesc => {
            expect_args(p, args, 2)?;
            query::sort_table(&args[0], &args[1], true)
        }
        Map => apply_map(args, scope),
        MapLeft => apply_map_left(args, scope),
        List => Ok(list(args.to_vec())),
        Quote => {
            // Normally intercepted before operand evaluation.
            expect_args(p, args, 1)?;
            Ok(args[0].clone())
        }
        Concat => query::concat(args),
        ReadCsv => {
            expect_args(p, args, 2)?;
            csv::read_csv(&args[0], &args[1])
        }
        Eval => {
            expect_args(p, args, 1)?;
            eval_with(&args[0], scope)
        }
    }
}

/// `map f x ...` — apply the function value to the remaining operands.
fn apply_map(args: &[Handle], scope: Option<&Scope>) -> KResult<Handle> {
    let f = args
        .first()
        .ok_or_else(|| "rank: map of nothing".to_string())?;
    let p = match &*f.body() {
        Body::Fun(p) => *p,
        other => return Err(format!("type: map head is not a function ({})", other.type_code())),
    };
    apply(p, &args[1..], scope)
}

/// `map-left f xs y` — apply f with each element of xs against the whole of y.
fn apply_map_left(args: &[Handle], scope: Option<&Scope>) -> KResult<Handle> {
    if args.len() != 3 {
        return Err("rank: map-left takes a function and two operands".into());
    }
    let p = match &*args[0].body() {
        Body::Fun(p) => *p,
        other => {
            return Err(format!(
                "type: map-left head is not a function ({})",
                other.type_code()
            ))
        }
    };
    let xs = &args[1];
    let n = match &*xs.body() {
        Body::Vec(c) => c.len(),
        Body::List(items) => items.len(),
        _ => return Err("rank: map-left left operand must be a vector".into()),
    };
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let xi = match &*xs.body() {
            Body::Vec(c) => atom(c.atom(i)),
            Body::List(items) => items[i].clone(),
            _ => unreachable!(),
        };
        out.push(apply(p, &[xi, args[2].clone()], scope)?);
    }
    Ok(list(out))
}

// ===== Source evaluation =====
//
// A deliberately small expression dialect: literals, names, parenthesized
// infix arithmetic/comparison. Names dereference the global environment.

pub(crate) fn eval_str(src: &str) -> KResult<Handle> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let ast = p.parse_expr(0)?;
    if p.pos != p.tokens.len() {
        return Err(format!("parse: trailing input at token {}", p.pos));
    }
    eval_obj(&ast)
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(String),
    Name(String),
    Str(String),
    Sym(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn lex(src: &str) -> KResult<Vec<Tok>> {
    let mut out = Vec::new();
    let bytes: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                out.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                out.push(Tok::RParen);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                while i < bytes.len() && bytes[i] != '"' {
                    s.push(bytes[i]);
                    i += 1;
                }
                if i == bytes.len() {
                    return Err("parse: unterminated string".into());
                }
                i += 1;
                out.push(Tok::Str(s));
            }
            '`' => {
                let mut s = String::new();
                i += 1;
                while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_') {
                    s.push(bytes[i]);
                    i += 1;
                }
                out.push(Tok::Sym(s));
            }
            '0'..='9' => {
                let mut s = String::new();
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    s.push(bytes[i]);
                    i += 1;
                }
                out.push(Tok::Num(s));
            }
            '+' => {
                out.push(Tok::Op("+"));
                i += 1;
            }
            '-' => {
                out.push(Tok::Op("-"));
                i += 1;
            }
            '*' => {
                out.push(Tok::Op("*"));
                i += 1;
            }
            '/' => {
                out.push(Tok::Op("/"));
                i += 1;
            }
            '%' => {
                out.push(Tok::Op("%"));
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&'=') {
                    i += 2;
                } else {
                    i += 1;
                }
                out.push(Tok::Op("=="));
            }
            '!' => {
                if bytes.get(i + 1) == Some(&'=') {
                    out.push(Tok::Op("!="));
                    i += 2;
                } else {
                    return Err("parse: stray '!'".into());
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&'=') {
                    out.push(Tok::Op("<="));
                    i += 2;
                } else if bytes.get(i + 1) == Some(&'>') {
                    out.push(Tok::Op("!="));
                    i += 2;
                } else {
                    out.push(Tok::Op("<"));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&'=') {
                    out.push(Tok::Op(">="));
                    i += 2;
                } else {
                    out.push(Tok::Op(">"));
                    i += 1;
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_') {
                    s.push(bytes[i]);
                    i += 1;
                }
                out.push(Tok::Name(s));
            }
            other => return Err(format!("parse: unexpected character '{other}'")),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

fn binding_power(op: &str) -> u8 {
    match op {
        "==" | "!=" | "<" | "<=" | ">" | ">=" => 1,
        "+" | "-" => 2,
        "*" | "/" | "%" => 3,
        _ => 0,
    }
}

impl Parser {
    fn parse_expr(&mut self, min_bp: u8) -> KResult<Handle> {
        let mut lhs = self.parse_primary()?;
        loop {
            let op = match self.tokens.get(self.pos) {
                Some(Tok::Op(op)) => *op,
                _ => break,
            };
            let bp = binding_power(op);
            if bp <= min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expr(bp)?;
            let prim = Primitive::from_name(op)
                .ok_or_else(|| format!("parse: unknown operator {op}"))?;
            lhs = list(vec![atom(Body::Fun(prim)), lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> KResult<Handle> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "parse: unexpected end of input".to_string())?;
        self.pos += 1;
        match tok {
            Tok::Num(s) => {
                if s.contains('.') {
                    let v: f64 = s.parse().map_err(|_| format!("parse: bad number {s}"))?;
                    Ok(atom(Body::F64(v)))
                } else {
                    let v: i64 = s.parse().map_err(|_| format!("parse: bad number {s}"))?;
                    Ok(atom(Body::I64(v)))
                }
            }
            Tok::Str(s) => Ok(super::vector(ColData::C8(s.into_bytes()))),
            Tok::Sym(s) => {
                let id = state::intern(&s)?;
                // A quoted symbol is a constant, not a variable reference.
                Ok(list(vec![atom(Body::Fun(Primitive::Quote)), atom(Body::Sym(id))]))
            }
            Tok::Name(s) => {
                let id = state::intern(&s)?;
                Ok(atom(Body::Sym(id)))
            }
            Tok::Op("-") => {
                let inner = self.parse_primary()?;
                Ok(list(vec![atom(Body::Fun(Primitive::Neg)), inner]))
            }
            Tok::LParen => {
                let e = self.parse_expr(0)?;
                match self.tokens.get(self.pos) {
                    Some(Tok::RParen) => {
                        self.pos += 1;
                        Ok(e)
                    }
                    _ => Err("parse: expected ')'".into()),
                }
            }
            other => Err(format!("parse: unexpected token {other:?}")),
        }
    }
}
