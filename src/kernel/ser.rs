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

//! Wire codec for runtime values. Symbols travel as their names so the two
//! ends of a connection never share an intern table; functions travel as
//! their primitive names.

use super::eval::Primitive;
use super::{dict, list, state, table, vector, Body, ColData, Handle, KResult};
use super::{ERR, LIST, TABLE, DICT};

pub(crate) fn ser_obj(h: &Handle) -> KResult<Vec<u8>> {
    let mut out = Vec::new();
    write_obj(&mut out, h)?;
    Ok(out)
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn write_sym(out: &mut Vec<u8>, id: i64) -> KResult<()> {
    write_str(out, &state::sym_name(id)?);
    Ok(())
}

fn write_obj(out: &mut Vec<u8>, h: &Handle) -> KResult<()> {
    let body = h.body().clone();
    out.push(body.type_code() as u8);
    match body {
        Body::B8(v) => out.push(v as u8),
        Body::U8(v) => out.push(v),
        Body::C8(v) => out.push(v),
        Body::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Body::I32(v) | Body::Date(v) | Body::Time(v) => out.extend_from_slice(&v.to_le_bytes()),
        Body::I64(v) | Body::Timestamp(v) => out.extend_from_slice(&v.to_le_bytes()),
        Body::F64(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        Body::Sym(id) => write_sym(out, id)?,
        Body::Guid(bytes) => out.extend_from_slice(&bytes),
        Body::Vec(c) => write_vec(out, &c)?,
        Body::List(items) => {
            out.extend_from_slice(&(items.len() as u64).to_le_bytes());
            for it in &items {
                write_obj(out, it)?;
            }
        }
        Body::Dict { keys, vals } => {
            write_obj(out, &keys)?;
            write_obj(out, &vals)?;
        }
        Body::Table { names, cols } => {
            write_obj(out, &names)?;
            write_obj(out, &cols)?;
        }
        Body::Fun(p) => write_str(out, p.name()),
        Body::Err(msg) => write_str(out, &msg),
    }
    Ok(())
}

fn write_vec(out: &mut Vec<u8>, c: &ColData) -> KResult<()> {
    out.extend_from_slice(&(c.len() as u64).to_le_bytes());
    match c {
        ColData::B8(v) => out.extend(v.iter().map(|&b| b as u8)),
        ColData::U8(v) | ColData::C8(v) => out.extend_from_slice(v),
        ColData::I16(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        ColData::I32(v) | ColData::Date(v) | ColData::Time(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        ColData::I64(v) | ColData::Timestamp(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        ColData::F64(v) => {
            for x in v {
                out.extend_from_slice(&x.to_bits().to_le_bytes());
            }
        }
        ColData::Sym(v) => {
            for &id in v {
                write_sym(out, id)?;
            }
        }
        ColData::Guid(v) => {
            for g in v {
                out.extend_from_slice(g);
            }
        }
    }
    Ok(())
}

// ===== Deserialization =====

pub(crate) fn de_obj(bytes: &[u8]) -> KResult<Handle> {
    let mut cur = Cursor { bytes, pos: 0 };
    let h = read_obj(&mut cur)?;
    if cur.pos != bytes.len() {
        return Err("corrupt: trailing bytes after value".into());
    }
    Ok(h)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> KResult<&[u8]> {
        if self.pos + n > self.bytes.len() {
            return Err("corrupt: truncated value".into());
        }
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> KResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn i16(&mut self) -> KResult<i16> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> KResult<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> KResult<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> KResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn str(&mut self) -> KResult<String> {
        let n = u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as usize;
        let s = self.take(n)?;
        String::from_utf8(s.to_vec()).map_err(|_| "corrupt: invalid utf-8".to_string())
    }

    fn sym(&mut self) -> KResult<i64> {
        let name = self.str()?;
        state::intern(&name)
    }
}

fn read_obj(cur: &mut Cursor<'_>) -> KResult<Handle> {
    let code = cur.u8()? as i8;
    if code < 0 {
        if code == ERR {
            return Ok(Handle::new(Body::Err(cur.str()?)));
        }
        let body = match -code {
            super::B8 => Body::B8(cur.u8()? != 0),
            super::U8 => Body::U8(cur.u8()?),
            super::C8 => Body::C8(cur.u8()?),
            super::I16 => Body::I16(cur.i16()?),
            super::I32 => Body::I32(cur.i32()?),
            super::I64 => Body::I64(cur.i64()?),
            super::F64 => Body::F64(f64::from_bits(cur.u64()?)),
            super::SYM => Body::Sym(cur.sym()?),
            super::DATE => Body::Date(cur.i32()?),
            super::TIME => Body::Time(cur.i32()?),
            super::TIMESTAMP => Body::Timestamp(cur.i64()?),
            super::GUID => {
                let mut g = [0u8; 16];
                g.copy_from_slice(cur.take(16)?);
                Body::Guid(g)
            }
            other => return Err(format!("corrupt: unknown atom code -{other}")),
        };
        return Ok(Handle::new(body));
    }
    match code {
        LIST => {
            let n = cur.u64()? as usize;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_obj(cur)?);
            }
            Ok(list(items))
        }
        DICT => {
            let keys = read_obj(cur)?;
            let vals = read_obj(cur)?;
            Ok(dict(keys, vals))
        }
        TABLE => {
            let names = read_obj(cur)?;
            let cols = read_obj(cur)?;
            table(names, cols)
        }
        super::UNARY | super::BINARY | super::VARY => {
            let name = cur.str()?;
            let p = Primitive::from_name(&name)
                .ok_or_else(|| format!("corrupt: unknown primitive {name}"))?;
            Ok(Handle::new(Body::Fun(p)))
        }
        elem => {
            let n = cur.u64()? as usize;
            let col = match elem {
                super::B8 => {
                    ColData::B8(cur.take(n)?.iter().map(|&b| b != 0).collect())
                }
                super::U8 => ColData::U8(cur.take(n)?.to_vec()),
                super::C8 => ColData::C8(cur.take(n)?.to_vec()),
                super::I16 => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i16()?);
                    }
                    ColData::I16(v)
                }
                super::I32 => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i32()?);
                    }
                    ColData::I32(v)
                }
                super::I64 => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i64()?);
                    }
                    ColData::I64(v)
                }
                super::F64 => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(f64::from_bits(cur.u64()?));
                    }
                    ColData::F64(v)
                }
                super::SYM => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.sym()?);
                    }
                    ColData::Sym(v)
                }
                super::DATE => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i32()?);
                    }
                    ColData::Date(v)
                }
                super::TIME => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i32()?);
                    }
                    ColData::Time(v)
                }
                super::TIMESTAMP => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        v.push(cur.i64()?);
                    }
                    ColData::Timestamp(v)
                }
                super::GUID => {
                    let mut v = Vec::with_capacity(n);
                    for _ in 0..n {
                        let mut g = [0u8; 16];
                        g.copy_from_slice(cur.take(16)?);
                        v.push(g);
                    }
                    ColData::Guid(v)
                }
                other => return Err(format!("corrupt: unknown vector code {other}")),
            };
            Ok(vector(col))
        }
    }
}
