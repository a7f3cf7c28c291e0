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

//! Element-wise, aggregation and vector primitives. All kernels take fully
//! evaluated operands; broadcasting follows the atom-extends-to-vector rule.

use std::cmp::Ordering;

use super::{atom, list, state, vector, Body, ColData, Handle, KResult};

// ===== Broadcasting machinery =====

/// Number of elements an operand contributes: None for an atom.
fn span(h: &Handle) -> Option<usize> {
    match &*h.body() {
        Body::Vec(c) => Some(c.len()),
        Body::List(items) => Some(items.len()),
        _ => None,
    }
}

fn elem_body(h: &Handle, i: usize) -> KResult<Body> {
    match &*h.body() {
        Body::Vec(c) => {
            if i >= c.len() {
                return Err("range: element index out of bounds".into());
            }
            Ok(c.atom(i))
        }
        Body::List(items) => items
            .get(i)
            .map(|h| h.body().clone())
            .ok_or_else(|| "range: element index out of bounds".into()),
        other => Ok(other.clone()),
    }
}

/// Collect atom results into a typed vector, falling back to a list when the
/// results are not homogeneous atoms.
pub(crate) fn collect_bodies(bodies: Vec<Body>) -> Handle {
    let homogeneous = bodies
        .first()
        .map(|b| b.is_atom() && bodies.iter().all(|x| x.type_code() == b.type_code()))
        .unwrap_or(false);
    if homogeneous {
        let elem = -bodies[0].type_code();
        if let Ok(mut col) = ColData::with_elem(elem) {
            let mut ok = true;
            for b in &bodies {
                if col.push_atom(b).is_err() {
                    ok = false;
                    break;
                }
            }
            if ok {
                return vector(col);
            }
        }
    }
    list(bodies.into_iter().map(Handle::new).collect())
}

/// Apply a scalar function over two operands with broadcasting.
pub(crate) fn zip2(
    x: &Handle,
    y: &Handle,
    f: impl Fn(&Body, &Body) -> KResult<Body>,
) -> KResult<Handle> {
    match (span(x), span(y)) {
        (None, None) => Ok(atom(f(&x.body(), &y.body())?)),
        (Some(n), None) => {
            let yb = y.body().clone();
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(f(&elem_body(x, i)?, &yb)?);
            }
            Ok(collect_bodies(out))
        }
        (None, Some(n)) => {
            let xb = x.body().clone();
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(f(&xb, &elem_body(y, i)?)?);
            }
            Ok(collect_bodies(out))
        }
        (Some(n), Some(m)) => {
            if n != m {
                return Err(format!("length: {n} vs {m}"));
            }
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(f(&elem_body(x, i)?, &elem_body(y, i)?)?);
            }
            Ok(collect_bodies(out))
        }
    }
}

pub(crate) fn map1(x: &Handle, f: impl Fn(&Body) -> KResult<Body>) -> KResult<Handle> {
    match span(x) {
        None => Ok(atom(f(&x.body())?)),
        Some(n) => {
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(f(&elem_body(x, i)?)?);
            }
            Ok(collect_bodies(out))
        }
    }
}

// ===== Scalar arithmetic =====

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Rebuild a temporal result in the temporal type of the operand pair, if any.
fn retype_temporal(a: &Body, b: &Body, v: i64) -> Body {
    match (a, b) {
        (Body::Date(_), _) | (_, Body::Date(_)) => Body::Date(v as i32),
        (Body::Time(_), _) | (_, Body::Time(_)) => Body::Time(v as i32),
        (Body::Timestamp(_), _) | (_, Body::Timestamp(_)) => Body::Timestamp(v),
        _ => Body::I64(v),
    }
}

pub(crate) fn arith_scalar(op: ArithOp, a: &Body, b: &Body) -> KResult<Body> {
    let float = matches!(a, Body::F64(_)) || matches!(b, Body::F64(_)) || op == ArithOp::Div;
    if float {
        let (x, y) = match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(numeric_type_err(a, b)),
        };
        let v = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
        };
        return Ok(Body::F64(v));
    }
    let (x, y) = match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(numeric_type_err(a, b)),
    };
    let v = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Div => unreachable!(),
        ArithOp::Mod => {
            if y == 0 {
                return Err("domain: modulo by zero".into());
            }
            x.rem_euclid(y)
        }
    };
    Ok(retype_temporal(a, b, v))
}

fn numeric_type_err(a: &Body, b: &Body) -> String {
    format!(
        "type: cannot apply numeric op to types {} and {}",
        a.type_code(),
        b.type_code()
    )
}

pub(crate) fn arith(op: ArithOp, x: &Handle, y: &Handle) -> KResult<Handle> {
    zip2(x, y, move |a, b| arith_scalar(op, a, b))
}

pub(crate) fn neg(x: &Handle) -> KResult<Handle> {
    map1(x, |b| match b {
        Body::F64(v) => Ok(Body::F64(-v)),
        other => match other.as_i64() {
            Some(v) => Ok(Body::I64(-v)),
            None => Err(format!("type: cannot negate type {}", other.type_code())),
        },
    })
}

// ===== Comparison =====

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Atom equality with numeric promotion; symbols compare by interned id.
pub(crate) fn body_eq(a: &Body, b: &Body) -> bool {
    match (a, b) {
        (Body::Sym(x), Body::Sym(y)) => x == y,
        (Body::B8(x), Body::B8(y)) => x == y,
        (Body::C8(x), Body::C8(y)) => x == y,
        (Body::Guid(x), Body::Guid(y)) => x == y,
        (Body::F64(_), _) | (_, Body::F64(_)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn cmp_scalar(op: CmpOp, a: &Body, b: &Body) -> KResult<Body> {
    let v = match op {
        CmpOp::Eq => body_eq(a, b),
        CmpOp::Ne => !body_eq(a, b),
        _ => {
            let ord = numeric_order(a, b)?;
            match op {
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                _ => unreachable!(),
            }
        }
    };
    Ok(Body::B8(v))
}

pub(crate) fn numeric_order(a: &Body, b: &Body) -> KResult<Ordering> {
    if matches!(a, Body::F64(_)) || matches!(b, Body::F64(_)) {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
            _ => Err(numeric_type_err(a, b)),
        }
    } else {
        match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => Err(numeric_type_err(a, b)),
        }
    }
}

pub(crate) fn compare(op: CmpOp, x: &Handle, y: &Handle) -> KResult<Handle> {
    zip2(x, y, move |a, b| cmp_scalar(op, a, b))
}

// ===== Logical =====

fn as_bool(b: &Body) -> KResult<bool> {
    match b {
        Body::B8(v) => Ok(*v),
        other => match other.as_i64() {
            Some(v) => Ok(v != 0),
            None => Err(format!("type: expected boolean, got type {}", other.type_code())),
        },
    }
}

pub(crate) fn and(x: &Handle, y: &Handle) -> KResult<Handle> {
    zip2(x, y, |a, b| Ok(Body::B8(as_bool(a)? && as_bool(b)?)))
}

pub(crate) fn or(x: &Handle, y: &Handle) -> KResult<Handle> {
    zip2(x, y, |a, b| Ok(Body::B8(as_bool(a)? || as_bool(b)?)))
}

pub(crate) fn not(x: &Handle) -> KResult<Handle> {
    map1(x, |b| Ok(Body::B8(!as_bool(b)?)))
}

// ===== Math =====

pub(crate) fn ceil(x: &Handle) -> KResult<Handle> {
    map1(x, |b| match b {
        Body::F64(v) => Ok(Body::I64(v.ceil() as i64)),
        other => match other.as_i64() {
            Some(v) => Ok(Body::I64(v)),
            None => Err(format!("type: ceil of type {}", other.type_code())),
        },
    })
}

pub(crate) fn floor(x: &Handle) -> KResult<Handle> {
    map1(x, |b| match b {
        Body::F64(v) => Ok(Body::I64(v.floor() as i64)),
        other => match other.as_i64() {
            Some(v) => Ok(Body::I64(v)),
            None => Err(format!("type: floor of type {}", other.type_code())),
        },
    })
}

pub(crate) fn round(x: &Handle) -> KResult<Handle> {
    map1(x, |b| match b {
        Body::F64(v) => Ok(Body::I64(v.round() as i64)),
        other => match other.as_i64() {
            Some(v) => Ok(Body::I64(v)),
            None => Err(format!("type: round of type {}", other.type_code())),
        },
    })
}

/// `xbar n x` — round x down to the nearest multiple of n.
pub(crate) fn xbar(n: &Handle, x: &Handle) -> KResult<Handle> {
    zip2(n, x, |nb, xb| {
        if matches!(xb, Body::F64(_)) || matches!(nb, Body::F64(_)) {
            let (n, x) = match (nb.as_f64(), xb.as_f64()) {
                (Some(n), Some(x)) => (n, x),
                _ => return Err(numeric_type_err(nb, xb)),
            };
            if n == 0.0 {
                return Err("domain: xbar by zero".into());
            }
            Ok(Body::F64((x / n).floor() * n))
        } else {
            let (n, x) = match (nb.as_i64(), xb.as_i64()) {
                (Some(n), Some(x)) => (n, x),
                _ => return Err(numeric_type_err(nb, xb)),
            };
            if n == 0 {
                return Err("domain: xbar by zero".into());
            }
            Ok(retype_temporal(xb, xb, x.div_euclid(n) * n))
        }
    })
}

// ===== Aggregations =====

fn numeric_elems(x: &Handle) -> KResult<Vec<Body>> {
    let n = span(x).unwrap_or(1);
    let mut out = Vec::with_capacity(n);
    match span(x) {
        None => out.push(x.body().clone()),
        Some(n) => {
            for i in 0..n {
                out.push(elem_body(x, i)?);
            }
        }
    }
    Ok(out)
}

pub(crate) fn sum(x: &Handle) -> KResult<Handle> {
    let elems = numeric_elems(x)?;
    if elems.iter().any(|b| matches!(b, Body::F64(_))) {
        let mut acc = 0.0;
        for b in &elems {
            acc += b.as_f64().ok_or_else(|| agg_type_err("sum", b))?;
        }
        Ok(atom(Body::F64(acc)))
    } else {
        let mut acc: i64 = 0;
        for b in &elems {
            acc = acc.wrapping_add(b.as_i64().ok_or_else(|| agg_type_err("sum", b))?);
        }
        Ok(atom(Body::I64(acc)))
    }
}

fn agg_type_err(op: &str, b: &Body) -> String {
    format!("type: {op} over element of type {}", b.type_code())
}

pub(crate) fn avg(x: &Handle) -> KResult<Handle> {
    let elems = numeric_elems(x)?;
    if elems.is_empty() {
        return Ok(atom(Body::F64(f64::NAN)));
    }
    let mut acc = 0.0;
    for b in &elems {
        acc += b.as_f64().ok_or_else(|| agg_type_err("avg", b))?;
    }
    Ok(atom(Body::F64(acc / elems.len() as f64)))
}

pub(crate) fn count(x: &Handle) -> KResult<Handle> {
    let n = span(x).unwrap_or(1);
    Ok(atom(Body::I64(n as i64)))
}

pub(crate) fn min(x: &Handle) -> KResult<Handle> {
    extremum(x, Ordering::Less, "min")
}

pub(crate) fn max(x: &Handle) -> KResult<Handle> {
    extremum(x, Ordering::Greater, "max")
}

fn extremum(x: &Handle, keep: Ordering, op: &str) -> KResult<Handle> {
    let elems = numeric_elems(x)?;
    let mut best: Option<Body> = None;
    for b in elems {
        best = Some(match best {
            None => b,
            Some(cur) => {
                if numeric_order(&b, &cur).map_err(|_| agg_type_err(op, &b))? == keep {
                    b
                } else {
                    cur
                }
            }
        });
    }
    best.map(atom).ok_or_else(|| format!("length: {op} of empty vector"))
}

pub(crate) fn first(x: &Handle) -> KResult<Handle> {
    match span(x) {
        None => Ok(x.clone()),
        Some(0) => Err("length: first of empty vector".into()),
        Some(_) => Ok(atom(elem_body(x, 0)?)),
    }
}

pub(crate) fn last(x: &Handle) -> KResult<Handle> {
    match span(x) {
        None => Ok(x.clone()),
        Some(0) => Err("length: last of empty vector".into()),
        Some(n) => Ok(atom(elem_body(x, n - 1)?)),
    }
}

pub(crate) fn med(x: &Handle) -> KResult<Handle> {
    let elems = numeric_elems(x)?;
    let mut vals = Vec::with_capacity(elems.len());
    for b in &elems {
        vals.push(b.as_f64().ok_or_else(|| agg_type_err("med", b))?);
    }
    if vals.is_empty() {
        return Err("length: med of empty vector".into());
    }
    vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = vals.len();
    let m = if n % 2 == 1 {
        vals[n / 2]
    } else {
        (vals[n / 2 - 1] + vals[n / 2]) / 2.0
    };
    Ok(atom(Body::F64(m)))
}

/// Population standard deviation.
pub(crate) fn dev(x: &Handle) -> KResult<Handle> {
    let elems = numeric_elems(x)?;
    let mut vals = Vec::with_capacity(elems.len());
    for b in &elems {
        vals.push(b.as_f64().ok_or_else(|| agg_type_err("dev", b))?);
    }
    if vals.is_empty() {
        return Err("length: dev of empty vector".into());
    }
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / vals.len() as f64;
    Ok(atom(Body::F64(var.sqrt())))
}

// ===== Collection =====

pub(crate) fn distinct(x: &Handle) -> KResult<Handle> {
    let n = span(x).ok_or_else(|| "rank: distinct of an atom".to_string())?;
    let mut seen: Vec<Body> = Vec::new();
    for i in 0..n {
        let b = elem_body(x, i)?;
        if !seen.iter().any(|s| body_eq(s, &b)) {
            seen.push(b);
        }
    }
    Ok(collect_bodies(seen))
}

pub(crate) fn isin(x: &Handle, set: &Handle) -> KResult<Handle> {
    let m = span(set).ok_or_else(|| "rank: in requires a vector right operand".to_string())?;
    let mut members = Vec::with_capacity(m);
    for i in 0..m {
        members.push(elem_body(set, i)?);
    }
    map1(x, |b| Ok(Body::B8(members.iter().any(|s| body_eq(s, b)))))
}

/// `where mask` — indices of true entries.
pub(crate) fn where_indices(mask: &Handle) -> KResult<Handle> {
    let n = span(mask).ok_or_else(|| "rank: where of an atom".to_string())?;
    let mut out = Vec::new();
    for i in 0..n {
        if as_bool(&elem_body(mask, i)?)? {
            out.push(i as i64);
        }
    }
    Ok(vector(ColData::I64(out)))
}

pub(crate) fn til(n: &Handle) -> KResult<Handle> {
    let n = n
        .body()
        .as_i64()
        .ok_or_else(|| "type: til expects an integer".to_string())?;
    if n < 0 {
        return Err("domain: til of a negative count".into());
    }
    Ok(vector(ColData::I64((0..n).collect())))
}

// ===== Sort & grade =====

/// Resolve symbol ids to names once, for lexicographic ordering.
fn sym_names_for(col: &ColData) -> KResult<Option<Vec<String>>> {
    if let ColData::Sym(ids) = col {
        let mut names = Vec::with_capacity(ids.len());
        for &id in ids {
            names.push(state::sym_name(id)?);
        }
        Ok(Some(names))
    } else {
        Ok(None)
    }
}

/// Stable grade of a vector: indices that would sort it ascending.
pub(crate) fn grade_col(col: &ColData, descending: bool) -> KResult<Vec<usize>> {
    let names = sym_names_for(col)?;
    let mut idx: Vec<usize> = (0..col.len()).collect();
    idx.sort_by(|&a, &b| {
        let ord = match &names {
            Some(ns) => ns[a].cmp(&ns[b]),
            None => {
                let (x, y) = (col.atom(a), col.atom(b));
                numeric_order(&x, &y).unwrap_or(Ordering::Equal)
            }
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    Ok(idx)
}

fn vector_payload(x: &Handle) -> KResult<ColData> {
    match &*x.body() {
        Body::Vec(c) => Ok(c.clone()),
        other => Err(format!("type: expected a vector, got type {}", other.type_code())),
    }
}

pub(crate) fn sort(x: &Handle, descending: bool) -> KResult<Handle> {
    let col = vector_payload(x)?;
    let idx = grade_col(&col, descending)?;
    Ok(vector(col.gather(&idx)))
}

pub(crate) fn grade(x: &Handle, descending: bool) -> KResult<Handle> {
    let col = vector_payload(x)?;
    let idx = grade_col(&col, descending)?;
    Ok(vector(ColData::I64(idx.into_iter().map(|i| i as i64).collect())))
}

// ===== Indexing =====

fn wrap_index(i: i64, len: usize) -> KResult<usize> {
    let len = len as i64;
    let j = if i < 0 { i + len } else { i };
    if j < 0 || j >= len {
        return Err(format!("range: index {i} out of bounds for length {len}"));
    }
    Ok(j as usize)
}

/// `at x i` — index a vector/list by atom or index vector; index a table by
/// column symbol; index a dict by key.
pub(crate) fn at(x: &Handle, i: &Handle) -> KResult<Handle> {
    let xb = x.body().clone();
    match xb {
        Body::Table { names, cols } => {
            let key = i.body().clone();
            if let Body::Sym(id) = key {
                return table_column(&names, &cols, id)
                    .ok_or_else(|| "schema: no such column".to_string());
            }
            Err("type: table index must be a column symbol".into())
        }
        Body::Dict { keys, vals } => {
            let n = super::value_len(&keys)?;
            let kb = i.body().clone();
            for j in 0..n {
                if body_eq(&elem_body(&keys, j)?, &kb) {
                    return Ok(atom_or_item(&vals, j)?);
                }
            }
            Err("domain: key not found".into())
        }
        Body::Vec(c) => match &*i.body() {
            Body::Vec(ColData::I64(ix)) => {
                let mut rows = Vec::with_capacity(ix.len());
                for &j in ix {
                    rows.push(wrap_index(j, c.len())?);
                }
                Ok(vector(c.gather(&rows)))
            }
            other => match other.as_i64() {
                Some(j) => Ok(atom(c.atom(wrap_index(j, c.len())?))),
                None => Err("type: vector index must be integral".into()),
            },
        },
        Body::List(items) => match &*i.body() {
            Body::Vec(ColData::I64(ix)) => {
                let mut out = Vec::with_capacity(ix.len());
                for &j in ix {
                    out.push(items[wrap_index(j, items.len())?].clone());
                }
                Ok(list(out))
            }
            other => match other.as_i64() {
                Some(j) => Ok(items[wrap_index(j, items.len())?].clone()),
                None => Err("type: list index must be integral".into()),
            },
        },
        other => Err(format!("rank: cannot index type {}", other.type_code())),
    }
}

fn atom_or_item(vals: &Handle, j: usize) -> KResult<Handle> {
    match &*vals.body() {
        Body::Vec(c) => Ok(atom(c.atom(j))),
        Body::List(items) => Ok(items[j].clone()),
        _ => Err("corrupt: dict values are not countable".into()),
    }
}

pub(crate) fn table_column(names: &Handle, cols: &Handle, id: i64) -> Option<Handle> {
    let names = names.body();
    let ids = match &*names {
        Body::Vec(ColData::Sym(ids)) => ids.clone(),
        _ => return None,
    };
    let pos = ids.iter().position(|&n| n == id)?;
    match &*cols.body() {
        Body::List(items) => items.get(pos).cloned(),
        _ => None,
    }
}

// ===== Vector concat =====

pub(crate) fn concat_vectors(args: &[Handle]) -> KResult<Handle> {
    let first = args.first().ok_or_else(|| "rank: concat of nothing".to_string())?;
    match &*first.body() {
        Body::Vec(c) => {
            let mut out = c.clone();
            for other in &args[1..] {
                match &*other.body() {
                    Body::Vec(c2) => out.extend_from(c2)?,
                    other => out.push_atom(other)?,
                }
            }
            Ok(vector(out))
        }
        Body::List(items) => {
            let mut out = items.clone();
            for other in &args[1..] {
                match &*other.body() {
                    Body::List(items2) => out.extend(items2.iter().cloned()),
                    _ => out.push(other.clone()),
                }
            }
            Ok(list(out))
        }
        other => Err(format!("type: cannot concat type {}", other.type_code())),
    }
}
