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

//! Query kernels: select, update, insert, upsert, joins, window joins,
//! table sort and row concatenation. Queries arrive as dictionaries in the
//! §-style wire shape: projection entries plus `by` / `from` / `where`.

use std::collections::HashMap;

use super::eval::{eval_obj, eval_with, Scope};
use super::ops;
use super::{atom, list, state, table, value_len, vector, Body, ColData, Handle, KResult};

// ===== Shared helpers =====

pub(crate) fn dict_entries(d: &Handle) -> KResult<Vec<(i64, Handle)>> {
    let (keys, vals) = match &*d.body() {
        Body::Dict { keys, vals } => (keys.clone(), vals.clone()),
        other => return Err(format!("type: expected a dict, got type {}", other.type_code())),
    };
    let ids = match &*keys.body() {
        Body::Vec(ColData::Sym(ids)) => ids.clone(),
        _ => return Err("type: dict keys must be a symbol vector".into()),
    };
    let items = match &*vals.body() {
        Body::List(items) => items.clone(),
        Body::Vec(c) => (0..c.len()).map(|i| atom(c.atom(i))).collect(),
        _ => return Err("type: dict values must be a list".into()),
    };
    if ids.len() != items.len() {
        return Err("length: dict keys/values mismatch".into());
    }
    Ok(ids.into_iter().zip(items).collect())
}

pub(crate) fn table_parts(t: &Handle) -> KResult<(Vec<i64>, Vec<Handle>)> {
    match &*t.body() {
        Body::Table { names, cols } => {
            let ids = match &*names.body() {
                Body::Vec(ColData::Sym(ids)) => ids.clone(),
                _ => return Err("corrupt: table names are not symbols".into()),
            };
            let items = match &*cols.body() {
                Body::List(items) => items.clone(),
                _ => return Err("corrupt: table columns are not a list".into()),
            };
            Ok((ids, items))
        }
        other => Err(format!("type: expected a table, got type {}", other.type_code())),
    }
}

pub(crate) fn make_table(names: Vec<i64>, cols: Vec<Handle>) -> KResult<Handle> {
    table(vector(ColData::Sym(names)), list(cols))
}

/// Resolve a query target: a table handle is used directly; a symbol names a
/// table in the global environment (a by-reference target).
pub(crate) fn resolve_table(h: &Handle) -> KResult<(Option<i64>, Handle)> {
    let body = h.body().clone();
    match body {
        Body::Table { .. } => Ok((None, h.clone())),
        Body::Sym(id) => match state::env_get(id)? {
            Some(t) if matches!(&*t.body(), Body::Table { .. }) => Ok((Some(id), t)),
            Some(_) => Err(format!("type: {} is not a table", state::sym_name(id)?)),
            None => Err(format!("undefined: {}", state::sym_name(id)?)),
        },
        _ => Err("type: query target must be a table or a table name".into()),
    }
}

fn scope_of(names: &[i64], cols: &[Handle]) -> Scope {
    Scope {
        names: names.to_vec(),
        cols: cols.to_vec(),
    }
}

/// Deep-clone a column so mutation does not alias the source table.
fn clone_col(h: &Handle) -> Handle {
    match &*h.body() {
        Body::Vec(c) => vector(c.clone()),
        Body::List(items) => list(items.clone()),
        other => Handle::new(other.clone()),
    }
}

fn gather_col(h: &Handle, rows: &[usize]) -> KResult<Handle> {
    match &*h.body() {
        Body::Vec(c) => Ok(vector(c.gather(rows))),
        Body::List(items) => Ok(list(rows.iter().map(|&i| items[i].clone()).collect())),
        other => Err(format!("type: cannot gather from type {}", other.type_code())),
    }
}

fn col_elem(h: &Handle, i: usize) -> KResult<Body> {
    match &*h.body() {
        Body::Vec(c) => Ok(c.atom(i)),
        Body::List(items) => Ok(items[i].body().clone()),
        other => Err(format!("type: cannot index type {}", other.type_code())),
    }
}

/// Hashable row-key cell: (type class, bit payload).
type KeyCell = (u8, i64);

fn key_cell(b: &Body) -> KResult<KeyCell> {
    Ok(match b {
        Body::B8(v) => (0, *v as i64),
        Body::Sym(v) => (1, *v),
        Body::F64(v) => (2, v.to_bits() as i64),
        Body::C8(v) => (3, *v as i64),
        other => match other.as_i64() {
            Some(v) => (4, v),
            None => return Err(format!("type: ungroupable value of type {}", other.type_code())),
        },
    })
}

fn row_key(cols: &[Handle], row: usize) -> KResult<Vec<KeyCell>> {
    cols.iter().map(|c| col_elem(c, row).and_then(|b| key_cell(&b))).collect()
}

/// Turn per-row result bodies or per-group atoms into a column handle.
fn column_from_results(results: Vec<Handle>) -> Handle {
    let bodies: Option<Vec<Body>> = results
        .iter()
        .map(|h| {
            let b = h.body().clone();
            if b.is_atom() {
                Some(b)
            } else {
                None
            }
        })
        .collect();
    match bodies {
        Some(bodies) => ops::collect_bodies(bodies),
        None => list(results),
    }
}

/// Interpret a where-clause result: a boolean mask or an index vector.
fn rows_from_mask(mask: &Handle, nrows: usize) -> KResult<Vec<usize>> {
    match &*mask.body() {
        Body::Vec(ColData::B8(bits)) => {
            if bits.len() != nrows {
                return Err("length: where mask does not match row count".into());
            }
            Ok(bits
                .iter()
                .enumerate()
                .filter_map(|(i, &b)| if b { Some(i) } else { None })
                .collect())
        }
        Body::Vec(ColData::I64(ix)) => {
            let mut rows = Vec::with_capacity(ix.len());
            for &i in ix {
                if i < 0 || i as usize >= nrows {
                    return Err(format!("range: where index {i} out of bounds"));
                }
                rows.push(i as usize);
            }
            Ok(rows)
        }
        Body::B8(b) => Ok(if *b { (0..nrows).collect() } else { Vec::new() }),
        other => Err(format!("type: where produced type {}", other.type_code())),
    }
}

// ===== select =====

struct QueryParts {
    from: Handle,
    where_: Option<Handle>,
    by: Option<Handle>,
    projections: Vec<(i64, Handle)>,
}

fn split_query(d: &Handle) -> KResult<QueryParts> {
    let entries = dict_entries(d)?;
    let by_id = state::intern("by")?;
    let from_id = state::intern("from")?;
    let where_id = state::intern("where")?;
    let mut from = None;
    let mut where_ = None;
    let mut by = None;
    let mut projections = Vec::new();
    for (k, v) in entries {
        if k == from_id {
            from = Some(v);
        } else if k == where_id {
            where_ = Some(v);
        } else if k == by_id {
            by = Some(v);
        } else {
            projections.push((k, v));
        }
    }
    let from = from.ok_or_else(|| "schema: query has no from entry".to_string())?;
    Ok(QueryParts {
        from,
        where_,
        by,
        projections,
    })
}

pub(crate) fn select(d: &Handle) -> KResult<Handle> {
    let parts = split_query(d)?;
    let src = eval_obj(&parts.from)?;
    let (_, tbl) = resolve_table(&src)?;
    let (names, cols) = table_parts(&tbl)?;
    let nrows = value_len(&tbl)?;

    // Filter rows through the where clause, if any.
    let rows: Vec<usize> = match &parts.where_ {
        Some(w) => {
            let scope = scope_of(&names, &cols);
            let mask = eval_with(w, Some(&scope))?;
            rows_from_mask(&mask, nrows)?
        }
        None => (0..nrows).collect(),
    };
    let fcols: Vec<Handle> = cols
        .iter()
        .map(|c| gather_col(c, &rows))
        .collect::<KResult<_>>()?;
    let fscope = scope_of(&names, &fcols);

    match &parts.by {
        None => select_flat(&parts, &names, &fcols, &fscope, rows.len()),
        Some(bydict) => select_grouped(&parts, bydict, &names, &fcols, rows.len()),
    }
}

fn select_flat(
    parts: &QueryParts,
    names: &[i64],
    fcols: &[Handle],
    fscope: &Scope,
    nrows: usize,
) -> KResult<Handle> {
    if parts.projections.is_empty() {
        // Bare select: all source columns, filtered.
        return make_table(names.to_vec(), fcols.to_vec());
    }
    let mut out_names = Vec::with_capacity(parts.projections.len());
    let mut results = Vec::with_capacity(parts.projections.len());
    for (name, expr) in &parts.projections {
        out_names.push(*name);
        results.push(eval_with(expr, Some(fscope))?);
    }
    // Length reconciliation: atoms broadcast to the vector length; an
    // all-atom projection list produces a single row.
    let mut target = None;
    for r in &results {
        if let Ok(n) = value_len(r) {
            match target {
                None => target = Some(n),
                Some(t) if t == n => {}
                Some(t) => return Err(format!("length: projections of length {t} vs {n}")),
            }
        }
    }
    let target = target.unwrap_or(if nrows == 0 { 0 } else { 1 });
    let mut out_cols = Vec::with_capacity(results.len());
    for r in results {
        if value_len(&r).is_ok() {
            out_cols.push(r);
        } else {
            let b = r.body().clone();
            out_cols.push(ops::collect_bodies(vec![b; target]));
        }
    }
    make_table(out_names, out_cols)
}

fn select_grouped(
    parts: &QueryParts,
    bydict: &Handle,
    names: &[i64],
    fcols: &[Handle],
    nrows: usize,
) -> KResult<Handle> {
    let fscope = scope_of(names, fcols);
    let by_entries = dict_entries(bydict)?;
    let mut key_names = Vec::with_capacity(by_entries.len());
    let mut key_cols = Vec::with_capacity(by_entries.len());
    for (name, expr) in &by_entries {
        key_names.push(*name);
        let col = eval_with(expr, Some(&fscope))?;
        if value_len(&col)? != nrows {
            return Err("length: group key does not match row count".into());
        }
        key_cols.push(col);
    }

    // Group rows by key tuple, in order of first appearance.
    let mut index: HashMap<Vec<KeyCell>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..nrows {
        let key = row_key(&key_cols, row)?;
        match index.get(&key) {
            Some(&g) => groups[g].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    let mut out_names = Vec::new();
    let mut out_cols = Vec::new();
    for (i, name) in key_names.iter().enumerate() {
        let firsts: Vec<usize> = groups.iter().map(|g| g[0]).collect();
        out_names.push(*name);
        out_cols.push(gather_col(&key_cols[i], &firsts)?);
    }

    // Per-group scopes are shared across all projections.
    let mut group_scopes = Vec::with_capacity(groups.len());
    for g in &groups {
        let gcols: Vec<Handle> = fcols
            .iter()
            .map(|c| gather_col(c, g))
            .collect::<KResult<_>>()?;
        group_scopes.push(scope_of(names, &gcols));
    }

    for (name, expr) in &parts.projections {
        // A projection that repeats a group key is already carried by the
        // key column.
        if key_names.contains(name) {
            continue;
        }
        let mut results = Vec::with_capacity(groups.len());
        for scope in &group_scopes {
            results.push(eval_with(expr, Some(scope))?);
        }
        out_names.push(*name);
        out_cols.push(column_from_results(results));
    }
    make_table(out_names, out_cols)
}

// ===== update =====

pub(crate) fn update(d: &Handle) -> KResult<Handle> {
    let parts = split_query(d)?;
    if parts.by.is_some() {
        return Err("nyi: update with by".into());
    }
    let src = eval_obj(&parts.from)?;
    let (named, tbl) = resolve_table(&src)?;
    let (names, cols) = table_parts(&tbl)?;
    let nrows = value_len(&tbl)?;

    let rows: Vec<usize> = match &parts.where_ {
        Some(w) => {
            let scope = scope_of(&names, &cols);
            let mask = eval_with(w, Some(&scope))?;
            rows_from_mask(&mask, nrows)?
        }
        None => (0..nrows).collect(),
    };
    let fcols: Vec<Handle> = cols
        .iter()
        .map(|c| gather_col(c, &rows))
        .collect::<KResult<_>>()?;
    let fscope = scope_of(&names, &fcols);

    let mut new_names = names.clone();
    let mut new_cols: Vec<Handle> = cols.iter().map(clone_col).collect();

    for (name, expr) in &parts.projections {
        let val = eval_with(expr, Some(&fscope))?;
        let values: Vec<Body> = match value_len(&val) {
            Ok(n) => {
                if n != rows.len() {
                    return Err("length: update values do not match selected rows".into());
                }
                (0..n).map(|i| col_elem(&val, i)).collect::<KResult<_>>()?
            }
            Err(_) => vec![val.body().clone(); rows.len()],
        };
        match new_names.iter().position(|&n| n == *name) {
            Some(pos) => {
                let col = &new_cols[pos];
                let mut body = col.body_mut();
                match &mut *body {
                    Body::Vec(c) => {
                        for (&row, b) in rows.iter().zip(values.iter()) {
                            c.set_atom(row, b)?;
                        }
                    }
                    Body::List(items) => {
                        for (&row, b) in rows.iter().zip(values.iter()) {
                            items[row] = Handle::new(b.clone());
                        }
                    }
                    _ => return Err("corrupt: table column is not countable".into()),
                }
            }
            None => {
                if rows.len() != nrows {
                    return Err("schema: cannot add a column under a where clause".into());
                }
                new_names.push(*name);
                new_cols.push(ops::collect_bodies(values));
            }
        }
    }

    let result = make_table(new_names, new_cols)?;
    finish_mutation(named, result)
}

/// By-reference targets are written back to the environment and the name is
/// returned; owned targets return the new table value.
fn finish_mutation(named: Option<i64>, result: Handle) -> KResult<Handle> {
    match named {
        Some(id) => {
            state::env_set(id, result)?;
            Ok(atom(Body::Sym(id)))
        }
        None => Ok(result),
    }
}

// ===== insert / upsert =====

/// Normalize insert data into per-column handles aligned with the table.
/// Accepts a list of column vectors (positional) or a dict keyed by column.
fn incoming_columns(
    names: &[i64],
    data: &Handle,
) -> KResult<Vec<Handle>> {
    let body = data.body().clone();
    match body {
        Body::List(items) => {
            if items.len() != names.len() {
                return Err("length: insert data does not match column count".into());
            }
            Ok(items)
        }
        Body::Dict { .. } => {
            let entries = dict_entries(data)?;
            let mut out = Vec::with_capacity(names.len());
            for &name in names {
                let found = entries.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone());
                match found {
                    Some(v) => out.push(v),
                    None => {
                        return Err(format!(
                            "schema: insert data missing column {}",
                            state::sym_name(name)?
                        ))
                    }
                }
            }
            Ok(out)
        }
        other => Err(format!("type: insert data of type {}", other.type_code())),
    }
}

fn incoming_len(cols: &[Handle]) -> KResult<usize> {
    let mut n = None;
    for c in cols {
        let len = value_len(c)?;
        match n {
            None => n = Some(len),
            Some(m) if m == len => {}
            Some(m) => return Err(format!("length: ragged insert data ({m} vs {len})")),
        }
    }
    Ok(n.unwrap_or(0))
}

pub(crate) fn insert(target: &Handle, data: &Handle) -> KResult<Handle> {
    let (named, tbl) = resolve_table(target)?;
    let (names, cols) = table_parts(&tbl)?;
    let incoming = incoming_columns(&names, data)?;
    let n = incoming_len(&incoming)?;

    let new_cols: Vec<Handle> = cols.iter().map(clone_col).collect();
    for (col, inc) in new_cols.iter().zip(incoming.iter()) {
        append_rows(col, inc, n)?;
    }
    let result = make_table(names, new_cols)?;
    finish_mutation(named, result)
}

fn append_rows(col: &Handle, inc: &Handle, n: usize) -> KResult<()> {
    let mut body = col.body_mut();
    match &mut *body {
        Body::Vec(c) => {
            for i in 0..n {
                c.push_atom(&col_elem(inc, i)?)?;
            }
        }
        Body::List(items) => {
            for i in 0..n {
                items.push(Handle::new(col_elem(inc, i)?));
            }
        }
        _ => return Err("corrupt: table column is not countable".into()),
    }
    Ok(())
}

pub(crate) fn upsert(target: &Handle, match_by_first: i64, data: &Handle) -> KResult<Handle> {
    if match_by_first < 1 {
        return Err("domain: upsert requires at least one key column".into());
    }
    let (named, tbl) = resolve_table(target)?;
    let (names, cols) = table_parts(&tbl)?;
    let nkeys = match_by_first as usize;
    if nkeys > names.len() {
        return Err("length: more key columns than table columns".into());
    }
    let incoming = incoming_columns(&names, data)?;
    let n = incoming_len(&incoming)?;

    let new_cols: Vec<Handle> = cols.iter().map(clone_col).collect();
    for row in 0..n {
        let key: Vec<KeyCell> = incoming[..nkeys]
            .iter()
            .map(|c| col_elem(c, row).and_then(|b| key_cell(&b)))
            .collect::<KResult<_>>()?;
        let existing = find_key_row(&new_cols[..nkeys], &key)?;
        match existing {
            Some(at) => {
                for (col, inc) in new_cols.iter().zip(incoming.iter()).skip(nkeys) {
                    let b = col_elem(inc, row)?;
                    set_row(col, at, &b)?;
                }
            }
            None => {
                for (col, inc) in new_cols.iter().zip(incoming.iter()) {
                    let b = col_elem(inc, row)?;
                    push_row(col, &b)?;
                }
            }
        }
    }
    let result = make_table(names, new_cols)?;
    finish_mutation(named, result)
}

fn find_key_row(key_cols: &[Handle], key: &[KeyCell]) -> KResult<Option<usize>> {
    let n = value_len(&key_cols[0])?;
    'rows: for row in 0..n {
        for (c, k) in key_cols.iter().zip(key.iter()) {
            if key_cell(&col_elem(c, row)?)? != *k {
                continue 'rows;
            }
        }
        return Ok(Some(row));
    }
    Ok(None)
}

fn set_row(col: &Handle, row: usize, b: &Body) -> KResult<()> {
    let mut body = col.body_mut();
    match &mut *body {
        Body::Vec(c) => c.set_atom(row, b),
        Body::List(items) => {
            items[row] = Handle::new(b.clone());
            Ok(())
        }
        _ => Err("corrupt: table column is not countable".into()),
    }
}

fn push_row(col: &Handle, b: &Body) -> KResult<()> {
    let mut body = col.body_mut();
    match &mut *body {
        Body::Vec(c) => c.push_atom(b),
        Body::List(items) => {
            items.push(Handle::new(b.clone()));
            Ok(())
        }
        _ => Err("corrupt: table column is not countable".into()),
    }
}

// ===== joins =====

fn on_symbols(h: &Handle) -> KResult<Vec<i64>> {
    match &*h.body() {
        Body::Vec(ColData::Sym(ids)) => Ok(ids.clone()),
        Body::Sym(id) => Ok(vec![*id]),
        other => Err(format!("type: join keys must be symbols, got type {}", other.type_code())),
    }
}

/// `ij` / `lj` — equi-join on named key columns. The right side contributes
/// its first matching row; on a name collision the right column wins.
pub(crate) fn join(args: &[Handle], keep_unmatched: bool) -> KResult<Handle> {
    if args.len() != 3 {
        return Err("rank: join takes keys, left and right".into());
    }
    let on = on_symbols(&args[0])?;
    let (_, lhs) = resolve_table(&args[1])?;
    let (_, rhs) = resolve_table(&args[2])?;
    let (lnames, lcols) = table_parts(&lhs)?;
    let (rnames, rcols) = table_parts(&rhs)?;

    let lkeys = key_columns(&on, &lnames, &lcols)?;
    let rkeys = key_columns(&on, &rnames, &rcols)?;

    let rrows = value_len(&rhs)?;
    let mut rindex: HashMap<Vec<KeyCell>, usize> = HashMap::new();
    for row in 0..rrows {
        let key = row_key(&rkeys, row)?;
        rindex.entry(key).or_insert(row);
    }

    let lrows = value_len(&lhs)?;
    let mut keep: Vec<usize> = Vec::new();
    let mut matches: Vec<Option<usize>> = Vec::new();
    for row in 0..lrows {
        let key = row_key(&lkeys, row)?;
        match rindex.get(&key) {
            Some(&r) => {
                keep.push(row);
                matches.push(Some(r));
            }
            None if keep_unmatched => {
                keep.push(row);
                matches.push(None);
            }
            None => {}
        }
    }

    let mut out_names = lnames.clone();
    let mut out_cols: Vec<Handle> = lcols
        .iter()
        .map(|c| gather_col(c, &keep))
        .collect::<KResult<_>>()?;

    for (name, col) in rnames.iter().zip(rcols.iter()) {
        if on.contains(name) {
            continue;
        }
        let joined = gather_matches(col, &matches)?;
        match out_names.iter().position(|n| n == name) {
            Some(pos) => out_cols[pos] = joined,
            None => {
                out_names.push(*name);
                out_cols.push(joined);
            }
        }
    }
    make_table(out_names, out_cols)
}

fn key_columns(on: &[i64], names: &[i64], cols: &[Handle]) -> KResult<Vec<Handle>> {
    on.iter()
        .map(|k| {
            names
                .iter()
                .position(|n| n == k)
                .map(|i| cols[i].clone())
                .ok_or_else(|| "schema: join key column not found".to_string())
        })
        .collect()
}

fn gather_matches(col: &Handle, matches: &[Option<usize>]) -> KResult<Handle> {
    match &*col.body() {
        Body::Vec(c) => {
            let mut out = ColData::with_elem(c.elem_code())?;
            for m in matches {
                match m {
                    Some(row) => out.push_atom(&c.atom(*row))?,
                    None => out.push_null(),
                }
            }
            Ok(vector(out))
        }
        Body::List(items) => Ok(list(
            matches
                .iter()
                .map(|m| match m {
                    Some(row) => items[*row].clone(),
                    None => list(Vec::new()),
                })
                .collect(),
        )),
        other => Err(format!("type: cannot join column of type {}", other.type_code())),
    }
}

// ===== window joins =====

/// `wj` / `wj1` — as-of window join. `args` is
/// `(on, interval, left, right..., aggs)` where `on` names the match columns
/// with the time column last, and `interval` is a pair of per-row bound
/// vectors. `wj` also admits the prevailing right row before each window.
pub(crate) fn window_join(args: &[Handle], prevailing: bool) -> KResult<Handle> {
    if args.len() < 5 {
        return Err("rank: window join takes keys, interval, left, right and aggs".into());
    }
    let on = on_symbols(&args[0])?;
    if on.len() < 2 {
        return Err("schema: window join needs at least one symbol key and a time key".into());
    }
    let (sym_keys, time_key) = on.split_at(on.len() - 1);
    let time_key = time_key[0];

    let bounds = match &*args[1].body() {
        Body::List(items) if items.len() == 2 => (items[0].clone(), items[1].clone()),
        _ => return Err("type: window interval must be a pair of bound vectors".into()),
    };

    let (_, lhs) = resolve_table(&args[2])?;
    let (lnames, lcols) = table_parts(&lhs)?;
    let lrows = value_len(&lhs)?;
    if value_len(&bounds.0)? != lrows || value_len(&bounds.1)? != lrows {
        return Err("length: window bounds do not match left row count".into());
    }
    let lsyms = key_columns(sym_keys, &lnames, &lcols)?;

    let aggs = args
        .last()
        .ok_or_else(|| "rank: window join has no aggregations".to_string())?;
    let agg_entries = dict_entries(aggs)?;
    let rights = &args[3..args.len() - 1];
    if rights.is_empty() {
        return Err("rank: window join has no right table".into());
    }

    struct Right {
        names: Vec<i64>,
        cols: Vec<Handle>,
        keys: Vec<Handle>,
        times: Vec<i64>,
    }
    let mut sides = Vec::with_capacity(rights.len());
    for r in rights {
        let (_, rt) = resolve_table(r)?;
        let (rnames, rcols) = table_parts(&rt)?;
        let keys = key_columns(sym_keys, &rnames, &rcols)?;
        let tcol = key_columns(&[time_key], &rnames, &rcols)?.remove(0);
        let n = value_len(&rt)?;
        let mut times = Vec::with_capacity(n);
        for i in 0..n {
            times.push(
                col_elem(&tcol, i)?
                    .as_i64()
                    .ok_or_else(|| "type: window time column is not temporal".to_string())?,
            );
        }
        sides.push(Right {
            names: rnames,
            cols: rcols,
            keys,
            times,
        });
    }

    let mut agg_results: Vec<Vec<Handle>> =
        agg_entries.iter().map(|_| Vec::with_capacity(lrows)).collect();

    for row in 0..lrows {
        let key = row_key(&lsyms, row)?;
        let lo = col_elem(&bounds.0, row)?
            .as_i64()
            .ok_or_else(|| "type: window bound is not temporal".to_string())?;
        let hi = col_elem(&bounds.1, row)?
            .as_i64()
            .ok_or_else(|| "type: window bound is not temporal".to_string())?;

        // Build the per-row scope from every right side's window slice.
        let mut scope_names = Vec::new();
        let mut scope_cols = Vec::new();
        for side in &sides {
            let mut rows_in = Vec::new();
            let mut prev: Option<usize> = None;
            for (i, &t) in side.times.iter().enumerate() {
                if row_key(&side.keys, i)? != key {
                    continue;
                }
                if t >= lo && t <= hi {
                    rows_in.push(i);
                } else if prevailing && t < lo {
                    let better = match prev {
                        Some(p) => side.times[p] < t,
                        None => true,
                    };
                    if better {
                        prev = Some(i);
                    }
                }
            }
            if let Some(p) = prev {
                rows_in.insert(0, p);
            }
            for (name, col) in side.names.iter().zip(side.cols.iter()) {
                scope_names.push(*name);
                scope_cols.push(gather_col(col, &rows_in)?);
            }
        }
        let scope = Scope {
            names: scope_names,
            cols: scope_cols,
        };
        for (slot, (_, expr)) in agg_results.iter_mut().zip(agg_entries.iter()) {
            slot.push(eval_with(expr, Some(&scope))?);
        }
    }

    let mut out_names = lnames.clone();
    let mut out_cols = lcols.clone();
    for ((name, _), results) in agg_entries.iter().zip(agg_results) {
        out_names.push(*name);
        out_cols.push(column_from_results(results));
    }
    make_table(out_names, out_cols)
}

// ===== sort =====

enum SortKey {
    Names(Vec<String>),
    Cells(Vec<Body>),
}

pub(crate) fn sort_table(cols_arg: &Handle, table_arg: &Handle, descending: bool) -> KResult<Handle> {
    let on = on_symbols(cols_arg)?;
    let (named, tbl) = resolve_table(table_arg)?;
    let (names, cols) = table_parts(&tbl)?;
    let nrows = value_len(&tbl)?;

    let mut keys = Vec::with_capacity(on.len());
    for k in &on {
        let col = key_columns(&[*k], &names, &cols)?.remove(0);
        let key = match &*col.body() {
            Body::Vec(ColData::Sym(ids)) => {
                let mut out = Vec::with_capacity(ids.len());
                for &id in ids {
                    out.push(state::sym_name(id)?);
                }
                SortKey::Names(out)
            }
            _ => {
                let mut out = Vec::with_capacity(nrows);
                for i in 0..nrows {
                    out.push(col_elem(&col, i)?);
                }
                SortKey::Cells(out)
            }
        };
        keys.push(key);
    }

    let mut idx: Vec<usize> = (0..nrows).collect();
    idx.sort_by(|&a, &b| {
        for key in &keys {
            let ord = match key {
                SortKey::Names(ns) => ns[a].cmp(&ns[b]),
                SortKey::Cells(cs) => {
                    ops::numeric_order(&cs[a], &cs[b]).unwrap_or(std::cmp::Ordering::Equal)
                }
            };
            let ord = if descending { ord.reverse() } else { ord };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });

    let out_cols: Vec<Handle> = cols
        .iter()
        .map(|c| gather_col(c, &idx))
        .collect::<KResult<_>>()?;
    let result = make_table(names, out_cols)?;
    finish_mutation(named, result)
}

// ===== concat =====

/// Row-concatenate tables (columns matched by name); falls through to the
/// vector concat for non-table operands.
pub(crate) fn concat(args: &[Handle]) -> KResult<Handle> {
    let first = args.first().ok_or_else(|| "rank: concat of nothing".to_string())?;
    let is_table = {
        let resolved = eval_resolve_maybe_table(first)?;
        resolved.is_some()
    };
    if !is_table {
        return ops::concat_vectors(args);
    }
    let (_, base) = resolve_table(&eval_resolve_maybe_table(first)?.unwrap())?;
    let (names, cols) = table_parts(&base)?;
    let new_cols: Vec<Handle> = cols.iter().map(clone_col).collect();
    for other in &args[1..] {
        let resolved = eval_resolve_maybe_table(other)?
            .ok_or_else(|| "type: cannot concat a table with a non-table".to_string())?;
        let (_, t) = resolve_table(&resolved)?;
        let (onames, ocols) = table_parts(&t)?;
        let n = value_len(&t)?;
        for (name, col) in names.iter().zip(new_cols.iter()) {
            let pos = onames
                .iter()
                .position(|o| o == name)
                .ok_or_else(|| "schema: concat column missing".to_string())?;
            append_rows(col, &ocols[pos], n)?;
        }
    }
    make_table(names, new_cols)
}

fn eval_resolve_maybe_table(h: &Handle) -> KResult<Option<Handle>> {
    let body = h.body().clone();
    match body {
        Body::Table { .. } => Ok(Some(h.clone())),
        Body::Sym(id) => match state::env_get(id)? {
            Some(t) if matches!(&*t.body(), Body::Table { .. }) => Ok(Some(h.clone())),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}
