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

//! `read-csv` — load a headered CSV file into a table with caller-declared
//! column types. Type names are the wrappers' `ray_name` symbols.

use super::query::make_table;
use super::{days_from_civil, state, vector, Body, ColData, Handle, KResult};
use super::EPOCH_2001_DAYS_FROM_1970;

fn elem_code_of(name: &str) -> KResult<i8> {
    Ok(match name {
        "B8" => super::B8,
        "U8" => super::U8,
        "I16" => super::I16,
        "I32" => super::I32,
        "I64" => super::I64,
        "Symbol" => super::SYM,
        "Date" => super::DATE,
        "Time" => super::TIME,
        "Timestamp" => super::TIMESTAMP,
        "F64" => super::F64,
        "C8" => super::C8,
        other => return Err(format!("schema: unknown csv column type {other}")),
    })
}

fn path_of(h: &Handle) -> KResult<String> {
    match &*h.body() {
        Body::Vec(ColData::C8(bytes)) => {
            String::from_utf8(bytes.clone()).map_err(|_| "type: invalid path string".to_string())
        }
        Body::Sym(id) => state::sym_name(*id),
        other => Err(format!("type: csv path of type {}", other.type_code())),
    }
}

pub(crate) fn read_csv(types: &Handle, path: &Handle) -> KResult<Handle> {
    let type_ids = match &*types.body() {
        Body::Vec(ColData::Sym(ids)) => ids.clone(),
        _ => return Err("type: csv column types must be a symbol vector".into()),
    };
    let mut elems = Vec::with_capacity(type_ids.len());
    for id in type_ids {
        elems.push(elem_code_of(&state::sym_name(id)?)?);
    }

    let path = path_of(path)?;
    let text = std::fs::read_to_string(&path).map_err(|e| format!("io: {path}: {e}"))?;
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| "schema: empty csv file".to_string())?;
    let names: Vec<&str> = header.split(',').map(str::trim).collect();
    if names.len() != elems.len() {
        return Err(format!(
            "length: csv has {} columns, {} types given",
            names.len(),
            elems.len()
        ));
    }

    let mut cols: Vec<ColData> = elems
        .iter()
        .map(|&e| ColData::with_elem(e))
        .collect::<KResult<_>>()?;
    for (lineno, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != cols.len() {
            return Err(format!("length: csv row {} is ragged", lineno + 2));
        }
        for (col, cell) in cols.iter_mut().zip(cells.iter()) {
            let b = parse_cell(col.elem_code(), cell)?;
            col.push_atom(&b)?;
        }
    }

    let mut name_ids = Vec::with_capacity(names.len());
    for n in names {
        name_ids.push(state::intern(n)?);
    }
    make_table(name_ids, cols.into_iter().map(vector).collect())
}

fn parse_cell(elem: i8, cell: &str) -> KResult<Body> {
    let bad = |what: &str| format!("schema: cannot parse '{cell}' as {what}");
    Ok(match elem {
        super::B8 => Body::B8(matches!(cell, "1" | "true" | "TRUE" | "True")),
        super::U8 => Body::U8(cell.parse().map_err(|_| bad("U8"))?),
        super::I16 => Body::I16(cell.parse().map_err(|_| bad("I16"))?),
        super::I32 => Body::I32(cell.parse().map_err(|_| bad("I32"))?),
        super::I64 => Body::I64(cell.parse().map_err(|_| bad("I64"))?),
        super::F64 => Body::F64(cell.parse().map_err(|_| bad("F64"))?),
        super::SYM => Body::Sym(state::intern(cell)?),
        super::C8 => Body::C8(*cell.as_bytes().first().ok_or_else(|| bad("C8"))?),
        super::DATE => Body::Date(parse_date(cell).ok_or_else(|| bad("Date"))?),
        super::TIME => Body::Time(parse_time(cell).ok_or_else(|| bad("Time"))?),
        super::TIMESTAMP => Body::Timestamp(cell.parse().map_err(|_| bad("Timestamp"))?),
        other => return Err(format!("schema: unknown csv column type {other}")),
    })
}

/// "YYYY-MM-DD" to days since 2001-01-01.
fn parse_date(cell: &str) -> Option<i32> {
    let mut parts = cell.split('-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next()?.parse().ok()?;
    let d: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((days_from_civil(y, m, d) - EPOCH_2001_DAYS_FROM_1970) as i32)
}

/// "HH:MM:SS[.mmm]" to milliseconds since midnight.
fn parse_time(cell: &str) -> Option<i32> {
    let mut parts = cell.split(':');
    let h: i32 = parts.next()?.parse().ok()?;
    let m: i32 = parts.next()?.parse().ok()?;
    let rest = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (s, ms) = match rest.split_once('.') {
        Some((s, frac)) => {
            let s: i32 = s.parse().ok()?;
            let mut frac = frac.to_string();
            while frac.len() < 3 {
                frac.push('0');
            }
            (s, frac[..3].parse().ok()?)
        }
        None => (rest.parse().ok()?, 0),
    };
    if !(0..24).contains(&h) || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return None;
    }
    Some(((h * 60 + m) * 60 + s) * 1000 + ms)
}
