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

//! Scalar wrappers. Each records its runtime type code, its `ray_name`, a
//! constructor from the host-native value and a reader back.

use crate::kernel::{civil_from_days, days_from_civil, EPOCH_2001_DAYS_FROM_1970};
use crate::rt::{self, types as codes, Error, Handle, Result};

macro_rules! atom_type {
    ($(#[$doc:meta])* $name:ident, $code:expr, $ray_name:expr, $host:ty, $ctor:path, $reader:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            h: Handle,
        }

        impl $name {
            pub const TYPE_CODE: i8 = -$code;
            pub const RAY_NAME: &'static str = $ray_name;

            pub fn new(v: $host) -> Result<Self> {
                Ok($name { h: $ctor(v)? })
            }

            /// Wrap an existing handle, validating its type code.
            pub fn from_handle(h: Handle) -> Result<Self> {
                let actual = rt::type_code(&h)?;
                if actual != Self::TYPE_CODE {
                    return Err(Error::TypeMismatch {
                        expected: Self::TYPE_CODE,
                        actual,
                    });
                }
                Ok($name { h })
            }

            pub fn value(&self) -> Result<$host> {
                $reader(&self.h)
            }

            pub fn handle(&self) -> &Handle {
                &self.h
            }

            pub fn into_handle(self) -> Handle {
                self.h
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                match (self.value(), other.value()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
        }
    };
}

atom_type!(B8, codes::B8, "B8", bool, rt::b8, rt::read_b8);
atom_type!(U8, codes::U8, "U8", u8, rt::u8, rt::read_u8);
atom_type!(I16, codes::I16, "I16", i16, rt::i16, rt::read_i16);
atom_type!(I32, codes::I32, "I32", i32, rt::i32, rt::read_i32);
atom_type!(I64, codes::I64, "I64", i64, rt::i64, rt::read_i64);
atom_type!(F64, codes::F64, "F64", f64, rt::f64, rt::read_f64);
atom_type!(
    /// A single ASCII character cell.
    C8, codes::C8, "C8", char, rt::c8, rt::read_c8
);
atom_type!(
    /// Days since 2001-01-01.
    Date, codes::DATE, "Date", i32, rt::date, rt::read_date
);
atom_type!(
    /// Milliseconds since midnight.
    Time, codes::TIME, "Time", i32, rt::time, rt::read_time
);
atom_type!(
    /// Nanoseconds since 2001-01-01.
    Timestamp, codes::TIMESTAMP, "Timestamp", i64, rt::timestamp, rt::read_timestamp
);
atom_type!(
    /// A 16-byte identifier, round-tripped bit-exactly.
    Guid, codes::GUID, "GUID", [u8; 16], rt::guid, rt::read_guid
);

impl Date {
    /// Construct from a civil date.
    pub fn from_ymd(y: i32, m: u32, d: u32) -> Result<Self> {
        let days = days_from_civil(y as i64, m, d) - EPOCH_2001_DAYS_FROM_1970;
        Date::new(days as i32)
    }

    /// The civil `(year, month, day)` this date denotes.
    pub fn ymd(&self) -> Result<(i32, u32, u32)> {
        let days = self.value()? as i64 + EPOCH_2001_DAYS_FROM_1970;
        let (y, m, d) = civil_from_days(days);
        Ok((y as i32, m, d))
    }
}

impl Time {
    /// Construct from wall-clock components plus milliseconds.
    pub fn from_hms_ms(h: u32, m: u32, s: u32, ms: u32) -> Result<Self> {
        if h >= 24 || m >= 60 || s >= 60 || ms >= 1000 {
            return Err(Error::Conversion(format!(
                "{h:02}:{m:02}:{s:02}.{ms:03} is not a time of day"
            )));
        }
        Time::new((((h * 60 + m) * 60 + s) * 1000 + ms) as i32)
    }
}

impl Timestamp {
    /// Construct from a civil date plus nanoseconds into the day.
    pub fn from_ymd_ns(y: i32, m: u32, d: u32, ns_of_day: i64) -> Result<Self> {
        let days = days_from_civil(y as i64, m, d) - EPOCH_2001_DAYS_FROM_1970;
        Timestamp::new(days * 86_400_000_000_000 + ns_of_day)
    }
}

/// An interned symbol.
#[derive(Clone, Debug)]
pub struct Sym {
    h: Handle,
}

impl Sym {
    pub const TYPE_CODE: i8 = -codes::SYM;
    pub const RAY_NAME: &'static str = "Symbol";

    pub fn new(name: &str) -> Result<Self> {
        Ok(Sym { h: rt::sym(name)? })
    }

    pub fn from_handle(h: Handle) -> Result<Self> {
        let actual = rt::type_code(&h)?;
        if actual != Self::TYPE_CODE {
            return Err(Error::TypeMismatch {
                expected: Self::TYPE_CODE,
                actual,
            });
        }
        Ok(Sym { h })
    }

    pub fn value(&self) -> Result<String> {
        rt::read_sym(&self.h)
    }

    pub fn handle(&self) -> &Handle {
        &self.h
    }

    pub fn into_handle(self) -> Handle {
        self.h
    }
}

impl PartialEq for Sym {
    fn eq(&self, other: &Self) -> bool {
        match (self.value(), other.value()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
