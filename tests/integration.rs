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

//! Integration tests for the typed value model, expression algebra and
//! query builders.

use std::io::Write;
use std::sync::Mutex;

use raydb::{col, rt, Date, Error, Ray, Runtime, Table, Time, Value, Vector};

// The runtime is single-threaded process-wide — serialize all tests.
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Test data helpers
// ---------------------------------------------------------------------------

fn people() -> Table {
    Table::from_columns(&[
        (
            "id",
            vec!["001".into(), "002".into(), "003".into(), "004".into()],
        ),
        (
            "name",
            vec![
                "alice".into(),
                "bob".into(),
                "charlie".into(),
                "dana".into(),
            ],
        ),
        (
            "age",
            vec![29i64.into(), 34i64.into(), 41i64.into(), 38i64.into()],
        ),
    ])
    .unwrap()
}

fn sales() -> Table {
    Table::from_columns(&[
        (
            "category",
            vec!["A".into(), "A".into(), "B".into(), "B".into(), "A".into()],
        ),
        (
            "amount",
            vec![
                100i64.into(),
                200i64.into(),
                150i64.into(),
                250i64.into(),
                300i64.into(),
            ],
        ),
        (
            "status",
            vec![
                "active".into(),
                "inactive".into(),
                "active".into(),
                "active".into(),
                "inactive".into(),
            ],
        ),
    ])
    .unwrap()
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

#[test]
fn scalar_round_trips() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    assert_eq!(raydb::I64::new(42).unwrap().value().unwrap(), 42);
    assert_eq!(raydb::F64::new(1.5).unwrap().value().unwrap(), 1.5);
    assert!(raydb::B8::new(true).unwrap().value().unwrap());
    assert_eq!(raydb::Sym::new("tick").unwrap().value().unwrap(), "tick");
    assert_eq!(raydb::C8::new('z').unwrap().value().unwrap(), 'z');
    assert_eq!(raydb::U8::new(255).unwrap().value().unwrap(), 255);
    assert_eq!(raydb::I16::new(-7).unwrap().value().unwrap(), -7);

    let g = raydb::Guid::new([7u8; 16]).unwrap();
    assert_eq!(g.value().unwrap(), [7u8; 16]);

    // Non-ASCII character cells do not convert.
    assert!(raydb::C8::new('é').is_err());
}

#[test]
fn scalar_equality_follows_values() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    assert_eq!(raydb::I64::new(5).unwrap(), raydb::I64::new(5).unwrap());
    assert_ne!(raydb::I64::new(5).unwrap(), raydb::I64::new(6).unwrap());
    assert_eq!(
        raydb::Sym::new("a").unwrap(),
        raydb::Sym::new("a").unwrap()
    );
}

#[test]
fn temporal_epochs() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    // Date counts days since 2001-01-01.
    assert_eq!(Date::from_ymd(2001, 1, 1).unwrap().value().unwrap(), 0);
    assert_eq!(Date::from_ymd(2001, 1, 31).unwrap().value().unwrap(), 30);
    assert_eq!(Date::from_ymd(2001, 2, 1).unwrap().ymd().unwrap(), (2001, 2, 1));

    // Time is milliseconds since midnight.
    let t = Time::from_hms_ms(9, 0, 0, 100).unwrap();
    assert_eq!(t.value().unwrap(), 32_400_100);
    assert!(Time::new(86_400_000).is_err());

    // Timestamp counts nanoseconds since 2001-01-01.
    let ts = raydb::Timestamp::from_ymd_ns(2001, 1, 2, 5).unwrap();
    assert_eq!(ts.value().unwrap(), 86_400_000_000_000 + 5);
}

// ---------------------------------------------------------------------------
// Vectors, lists, dicts
// ---------------------------------------------------------------------------

#[test]
fn vector_indexing_wraps_once() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let v = Vector::from_values(
        raydb::rt::types::I64,
        &[1i64.into(), 2i64.into(), 3i64.into()],
    )
    .unwrap();
    assert_eq!(v.len().unwrap(), 3);
    assert_eq!(v.get(0).unwrap(), Value::Int(1));
    assert_eq!(v.get(-1).unwrap(), Value::Int(3));
    assert_eq!(v.get(-3).unwrap(), Value::Int(1));
    assert!(v.get(3).is_err());
    assert!(v.get(-4).is_err());

    v.push(&Value::Int(4)).unwrap();
    assert_eq!(v.get(-1).unwrap(), Value::Int(4));

    v.set(0, &Value::Int(9)).unwrap();
    assert_eq!(v.get(0).unwrap(), Value::Int(9));
    assert!(v.set(99, &Value::Int(0)).is_err());
}

#[test]
fn list_accepts_mixed_values() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let l = raydb::List::new().unwrap();
    l.push(&Value::Int(1)).unwrap();
    l.push(&Value::Str("x".into())).unwrap();
    l.push(&Value::Float(2.5)).unwrap();
    assert_eq!(l.len().unwrap(), 3);
    assert_eq!(raydb::value_of(&l.get(1).unwrap()).unwrap(), Value::Str("x".into()));
}

#[test]
fn dict_lookup() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let d = raydb::Dict::from_pairs(&[("a", Value::Int(1)), ("b", Value::Int(2))]).unwrap();
    assert_eq!(d.len().unwrap(), 2);
    let b = d.get(&Value::Str("b".into())).unwrap();
    assert_eq!(raydb::value_of(&b).unwrap(), Value::Int(2));
    assert!(d.get(&Value::Str("missing".into())).is_err());
}

#[test]
fn string_is_a_c8_vector() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let s = raydb::RayStr::new("hello").unwrap();
    assert_eq!(s.len().unwrap(), 5);
    assert_eq!(rt::type_code(s.handle()).unwrap(), rt::types::C8);
    assert_eq!(s.value().unwrap(), "hello");
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[test]
fn table_shape_invariants() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    assert_eq!(t.ncols().unwrap(), 3);
    assert_eq!(t.nrows().unwrap(), 4);
    assert_eq!(t.col_names().unwrap(), vec!["id", "name", "age"]);
    assert_eq!(rt::len(&t.columns().unwrap()).unwrap(), rt::len(&t.values().unwrap()).unwrap());

    assert_eq!(t.get_str(0, 0).unwrap(), "001");
    assert_eq!(t.get_str(1, 2).unwrap(), "charlie");
    assert_eq!(t.get_i64(2, 3).unwrap(), 38);
    assert_eq!(t.get("age", 1).unwrap(), Value::Int(34));
}

#[test]
fn host_values_round_trip() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let values = [
        Value::Bool(true),
        Value::Int(-3),
        Value::Float(2.25),
        Value::Char('k'),
        Value::Str("tick".into()),
        Value::Chars("raw text".into()),
        Value::Date(123),
        Value::Time(45_000),
        Value::Timestamp(9_000_000_000),
        Value::Guid([3u8; 16]),
    ];
    for v in &values {
        let h = raydb::to_runtime(v).unwrap();
        assert_eq!(&raydb::value_of(&h).unwrap(), v);
    }
}

#[test]
fn registry_rejects_conflicting_registration() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    fn bogus(_: raydb::Handle) -> raydb::Result<Ray> {
        Err(Error::UnknownTypeCode(0))
    }
    // The I64 code is taken by the default constructor.
    assert!(raydb::types::register(-5, bogus).is_err());
    // Re-registering an unclaimed code and repeating it is fine.
    assert!(raydb::types::register(110, bogus).is_ok());
    assert!(raydb::types::register(110, bogus).is_ok());
}

#[test]
fn type_registry_reconstructs_wrappers() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    match raydb::from_runtime(rt::i64(42).unwrap()).unwrap() {
        Ray::I64(x) => assert_eq!(x.value().unwrap(), 42),
        _ => panic!("expected an I64 wrapper"),
    }

    let v = Vector::from_values(rt::types::F64, &[1.0f64.into()]).unwrap();
    match raydb::from_runtime(v.handle().clone()).unwrap() {
        Ray::Vector(w) => assert_eq!(w.elem_code(), rt::types::F64),
        _ => panic!("expected a Vector wrapper"),
    }

    match raydb::from_runtime(people().handle().unwrap()).unwrap() {
        Ray::Table(t) => assert_eq!(t.nrows().unwrap(), 4),
        _ => panic!("expected a Table wrapper"),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn compile_is_deterministic() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let e = (col("a") + 1i64).gt_(2i64) & col("b").eq_("x");
    let first = rt::ser_obj(&e.compile().unwrap()).unwrap();
    let second = rt::ser_obj(&e.compile().unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn operation_arity_comes_from_the_primitive() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    use raydb::Operation;
    assert_eq!(Operation::Not.arity().unwrap(), rt::types::UNARY);
    assert_eq!(Operation::Add.arity().unwrap(), rt::types::BINARY);
    assert_eq!(Operation::Concat.arity().unwrap(), rt::types::VARY);
    assert_eq!(
        rt::env_get_internal_name_by_function(&Operation::Add.primitive().unwrap()).unwrap(),
        "+"
    );
}

#[test]
fn eval_str_arithmetic() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    assert_eq!(rt::read_i64(&rt::eval_str("1+2*3").unwrap()).unwrap(), 7);
    assert_eq!(rt::read_i64(&rt::eval_str("(1+2)*3").unwrap()).unwrap(), 9);
    assert!(rt::eval_str("nosuchname").is_err());
}

// ---------------------------------------------------------------------------
// Scenario 1: filter on age
// ---------------------------------------------------------------------------

#[test]
fn select_filters_on_age() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let out = people()
        .select(["id", "name", "age"])
        .where_(col("age").ge_(35i64))
        .execute()
        .unwrap();

    assert_eq!(out.nrows().unwrap(), 2);
    assert_eq!(out.get_str(0, 0).unwrap(), "003");
    assert_eq!(out.get_str(1, 0).unwrap(), "charlie");
    assert_eq!(out.get_i64(2, 0).unwrap(), 41);
    assert_eq!(out.get_str(0, 1).unwrap(), "004");
    assert_eq!(out.get_str(1, 1).unwrap(), "dana");
    assert_eq!(out.get_i64(2, 1).unwrap(), 38);
}

#[test]
fn chained_wheres_conjoin() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let chained = t
        .select(["id"])
        .where_(col("age").ge_(30i64))
        .where_(col("age").le_(40i64))
        .execute()
        .unwrap();
    let combined = t
        .select(["id"])
        .where_(col("age").ge_(30i64) & col("age").le_(40i64))
        .execute()
        .unwrap();

    assert_eq!(chained.nrows().unwrap(), combined.nrows().unwrap());
    for row in 0..chained.nrows().unwrap() {
        assert_eq!(chained.get_str(0, row), combined.get_str(0, row));
    }
    assert_eq!(chained.get_str(0, 0).unwrap(), "002");
    assert_eq!(chained.get_str(0, 1).unwrap(), "004");
}

#[test]
fn where_accepts_a_closure_over_the_table() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let out = people()
        .select(["name"])
        .where_fn(|t| t.col("age").eq_(34i64))
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(out.nrows().unwrap(), 1);
    assert_eq!(out.get_str(0, 0).unwrap(), "bob");
}

#[test]
fn isin_and_star_projection() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let out = people()
        .select(["*"])
        .where_(col("id").isin(vec!["001", "004"]))
        .execute()
        .unwrap();
    assert_eq!(out.ncols().unwrap(), 3);
    assert_eq!(out.nrows().unwrap(), 2);
    assert_eq!(out.get_str(1, 0).unwrap(), "alice");
    assert_eq!(out.get_str(1, 1).unwrap(), "dana");
}

// ---------------------------------------------------------------------------
// Scenario 2: group-by with filtered aggregation
// ---------------------------------------------------------------------------

#[test]
fn group_by_with_filtered_aggregation() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let out = sales()
        .query()
        .select_expr("total", col("amount").sum())
        .select_expr(
            "active_total",
            col("amount").filter(col("status").eq_("active")).sum(),
        )
        .select_expr("count", col("amount").count())
        .by(["category"])
        .execute()
        .unwrap();

    assert_eq!(out.col_names().unwrap(), vec!["category", "total", "active_total", "count"]);
    assert_eq!(out.nrows().unwrap(), 2);

    // Groups appear in order of first appearance: A, then B.
    assert_eq!(out.get_str(0, 0).unwrap(), "A");
    assert_eq!(out.get_i64(1, 0).unwrap(), 600);
    assert_eq!(out.get_i64(2, 0).unwrap(), 100);
    assert_eq!(out.get_i64(3, 0).unwrap(), 3);

    assert_eq!(out.get_str(0, 1).unwrap(), "B");
    assert_eq!(out.get_i64(1, 1).unwrap(), 400);
    assert_eq!(out.get_i64(2, 1).unwrap(), 400);
    assert_eq!(out.get_i64(3, 1).unwrap(), 2);
}

// ---------------------------------------------------------------------------
// Scenario 3: inner join
// ---------------------------------------------------------------------------

#[test]
fn inner_join_carries_right_columns() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let trades = Table::from_columns(&[
        (
            "Sym",
            vec!["AAPL".into(), "AAPL".into(), "GOOGL".into(), "GOOGL".into()],
        ),
        (
            "Price",
            vec![100i64.into(), 200i64.into(), 300i64.into(), 400i64.into()],
        ),
    ])
    .unwrap();
    let quotes = Table::from_columns(&[
        ("Sym", vec!["AAPL".into(), "GOOGL".into()]),
        ("Bid", vec![50i64.into(), 100i64.into()]),
        ("Ask", vec![75i64.into(), 150i64.into()]),
    ])
    .unwrap();

    let joined = trades.inner_join(&quotes, &["Sym"]).unwrap();
    assert_eq!(joined.nrows().unwrap(), 4);
    assert_eq!(joined.col_names().unwrap(), vec!["Sym", "Price", "Bid", "Ask"]);
    for row in 0..4 {
        match joined.get_str(0, row).unwrap().as_str() {
            "AAPL" => {
                assert_eq!(joined.get_i64(2, row).unwrap(), 50);
                assert_eq!(joined.get_i64(3, row).unwrap(), 75);
            }
            "GOOGL" => {
                assert_eq!(joined.get_i64(2, row).unwrap(), 100);
                assert_eq!(joined.get_i64(3, row).unwrap(), 150);
            }
            other => panic!("unexpected symbol {other}"),
        }
    }
}

#[test]
fn left_join_fills_misses_with_nulls() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let lhs = Table::from_columns(&[
        ("k", vec!["a".into(), "x".into()]),
        ("v", vec![1i64.into(), 2i64.into()]),
    ])
    .unwrap();
    let rhs = Table::from_columns(&[
        ("k", vec!["a".into()]),
        ("w", vec![10i64.into()]),
    ])
    .unwrap();

    let joined = lhs.left_join(&rhs, &["k"]).unwrap();
    assert_eq!(joined.nrows().unwrap(), 2);
    assert_eq!(joined.get_i64(2, 0).unwrap(), 10);
    assert_eq!(joined.get_i64(2, 1).unwrap(), i64::MIN);
}

// ---------------------------------------------------------------------------
// Scenario 4: window join
// ---------------------------------------------------------------------------

#[test]
fn window_join_aggregates_within_interval() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let ms = |off: i32| Value::Time(32_400_000 + off);
    let trades = Table::from_columns(&[
        ("sym", vec!["AAPL".into()]),
        ("time", vec![ms(100)]),
    ])
    .unwrap();
    let quotes = Table::from_columns(&[
        (
            "sym",
            vec!["AAPL".into(), "AAPL".into(), "AAPL".into(), "AAPL".into()],
        ),
        ("time", vec![ms(90), ms(95), ms(105), ms(110)]),
        (
            "bid",
            vec![99i64.into(), 100i64.into(), 101i64.into(), 102i64.into()],
        ),
        (
            "ask",
            vec![109i64.into(), 110i64.into(), 111i64.into(), 112i64.into()],
        ),
    ])
    .unwrap();

    let interval = raydb::TableColumnInterval::new(-10, 10, &trades, "time");
    let out = trades
        .window_join(
            &["sym", "time"],
            &interval,
            &[&quotes],
            &[
                ("min_bid", col("bid").min_()),
                ("max_ask", col("ask").max_()),
            ],
        )
        .unwrap();

    assert_eq!(out.nrows().unwrap(), 1);
    assert_eq!(out.col_names().unwrap(), vec!["sym", "time", "min_bid", "max_ask"]);
    assert_eq!(out.get_i64(2, 0).unwrap(), 99);
    assert_eq!(out.get_i64(3, 0).unwrap(), 112);
}

#[test]
fn window_join1_excludes_the_prevailing_row() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let ms = |off: i32| Value::Time(32_400_000 + off);
    let trades = Table::from_columns(&[
        ("sym", vec!["AAPL".into()]),
        ("time", vec![ms(100)]),
    ])
    .unwrap();
    // One quote before the window, one inside.
    let quotes = Table::from_columns(&[
        ("sym", vec!["AAPL".into(), "AAPL".into()]),
        ("time", vec![ms(50), ms(95)]),
        ("bid", vec![90i64.into(), 100i64.into()]),
    ])
    .unwrap();

    let interval = raydb::TableColumnInterval::new(-10, 10, &trades, "time");
    let strict = trades
        .window_join1(
            &["sym", "time"],
            &interval,
            &[&quotes],
            &[("min_bid", col("bid").min_())],
        )
        .unwrap();
    assert_eq!(strict.get_i64(2, 0).unwrap(), 100);

    let prevailing = trades
        .window_join(
            &["sym", "time"],
            &interval,
            &[&quotes],
            &[("min_bid", col("bid").min_())],
        )
        .unwrap();
    assert_eq!(prevailing.get_i64(2, 0).unwrap(), 90);
}

// ---------------------------------------------------------------------------
// Scenario 5: upsert by first key through a named reference
// ---------------------------------------------------------------------------

#[test]
fn upsert_by_first_key_mutates_the_named_table() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = Table::from_columns(&[
        ("id", vec!["001".into(), "002".into()]),
        ("age", vec![29i64.into(), 34i64.into()]),
    ])
    .unwrap();
    t.save("t").unwrap();

    let result = Table::from_name("t")
        .unwrap()
        .upsert(1)
        .column("id", vec!["001"])
        .column("age", vec![30i64])
        .execute()
        .unwrap();

    // The result is the symbol `t` — a reference to the mutated table.
    assert_eq!(result.name(), Some("t"));

    let reloaded = Table::from_name("t").unwrap();
    assert_eq!(reloaded.nrows().unwrap(), 2);
    assert_eq!(reloaded.get_str(0, 0).unwrap(), "001");
    assert_eq!(reloaded.get_i64(1, 0).unwrap(), 30);
    assert_eq!(reloaded.get_i64(1, 1).unwrap(), 34);
}

#[test]
fn upsert_appends_unmatched_keys() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = Table::from_columns(&[
        ("id", vec!["001".into()]),
        ("age", vec![29i64.into()]),
    ])
    .unwrap();
    let out = t
        .upsert(1)
        .column("id", vec!["009"])
        .column("age", vec![50i64])
        .execute()
        .unwrap();
    assert_eq!(out.nrows().unwrap(), 2);
    assert_eq!(out.get_str(0, 1).unwrap(), "009");
    assert_eq!(out.get_i64(1, 1).unwrap(), 50);
    // The owned source is untouched.
    assert_eq!(t.nrows().unwrap(), 1);
}

#[test]
fn upsert_requires_a_positive_key_count() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = Table::from_columns(&[("id", vec!["001".into()])]).unwrap();
    let err = t.upsert(0).column("id", vec!["x"]).execute().unwrap_err();
    assert_eq!(err, Error::UpsertArity);
}

// ---------------------------------------------------------------------------
// Insert / update
// ---------------------------------------------------------------------------

#[test]
fn insert_positional_and_keyword() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let grown = t
        .insert()
        .row(vec![
            Value::Str("005".into()),
            Value::Str("eve".into()),
            Value::Int(23),
        ])
        .execute()
        .unwrap();
    assert_eq!(grown.nrows().unwrap(), 5);
    assert_eq!(grown.get_str(1, 4).unwrap(), "eve");
    // Owned tables keep value semantics.
    assert_eq!(t.nrows().unwrap(), 4);

    let keyword = t
        .insert()
        .column("id", vec!["006"])
        .column("name", vec!["frank"])
        .column("age", vec![55i64])
        .execute()
        .unwrap();
    assert_eq!(keyword.nrows().unwrap(), 5);
    assert_eq!(keyword.get_i64(2, 4).unwrap(), 55);
}

#[test]
fn insert_rejects_mixed_or_missing_data() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let both = t
        .insert()
        .row(vec![Value::Str("007".into()), Value::Str("gus".into()), Value::Int(1)])
        .column("id", vec!["007"])
        .execute()
        .unwrap_err();
    assert_eq!(both, Error::Arity);

    let neither = t.insert().execute().unwrap_err();
    assert_eq!(neither, Error::Arity);
}

#[test]
fn update_owned_vs_named() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let bumped = t
        .update()
        .set("age", col("age") + 1i64)
        .where_(col("id").eq_("001"))
        .execute()
        .unwrap();
    assert_eq!(bumped.get_i64(2, 0).unwrap(), 30);
    assert_eq!(t.get_i64(2, 0).unwrap(), 29);

    let named = t.save("folks").unwrap();
    let result = named
        .update()
        .set("age", col("age") + 10i64)
        .execute()
        .unwrap();
    assert_eq!(result.name(), Some("folks"));
    let reloaded = Table::from_name("folks").unwrap();
    assert_eq!(reloaded.get_i64(2, 0).unwrap(), 39);
}

// ---------------------------------------------------------------------------
// Save / from_name, sort, concat
// ---------------------------------------------------------------------------

#[test]
fn saved_tables_are_observationally_equal() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    t.save("orig").unwrap();
    let named = Table::from_name("orig").unwrap();
    assert_eq!(named.nrows().unwrap(), t.nrows().unwrap());
    assert_eq!(named.col_names().unwrap(), t.col_names().unwrap());
    for row in 0..t.nrows().unwrap() {
        assert_eq!(named.get_str(0, row), t.get_str(0, row));
        assert_eq!(named.get_i64(2, row), t.get_i64(2, row));
    }
}

#[test]
fn sort_ascending_and_descending() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let asc = t.xasc(&["age"]).unwrap();
    assert_eq!(asc.get_i64(2, 0).unwrap(), 29);
    assert_eq!(asc.get_i64(2, 3).unwrap(), 41);

    let desc = t.xdesc(&["age"]).unwrap();
    assert_eq!(desc.get_i64(2, 0).unwrap(), 41);
    assert_eq!(desc.get_str(1, 0).unwrap(), "charlie");
}

#[test]
fn concat_folds_over_the_sequence() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let a = Table::from_columns(&[
        ("id", vec!["005".into()]),
        ("name", vec!["eve".into()]),
        ("age", vec![23i64.into()]),
    ])
    .unwrap();
    let b = Table::from_columns(&[
        ("id", vec!["006".into()]),
        ("name", vec!["frank".into()]),
        ("age", vec![55i64.into()]),
    ])
    .unwrap();

    let chained = t.concat(&[&a]).unwrap().concat(&[&b]).unwrap();
    let folded = t.concat(&[&a, &b]).unwrap();
    assert_eq!(chained.nrows().unwrap(), 6);
    assert_eq!(folded.nrows().unwrap(), 6);
    for row in 0..6 {
        assert_eq!(chained.get_str(0, row), folded.get_str(0, row));
        assert_eq!(chained.get_i64(2, row), folded.get_i64(2, row));
    }
}

#[test]
fn nested_select_composes() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let inner = people().select(["id", "age"]).where_(col("age").ge_(34i64));
    let out = raydb::SelectQueryBuilder::from_query(inner)
        .select(["id"])
        .where_(col("age").ge_(40i64))
        .execute()
        .unwrap();
    assert_eq!(out.nrows().unwrap(), 1);
    assert_eq!(out.get_str(0, 0).unwrap(), "003");
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

#[test]
fn csv_ingestion_with_declared_types() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(f, "sym,qty,px").unwrap();
    writeln!(f, "AAPL,10,1.5").unwrap();
    writeln!(f, "GOOGL,20,2.5").unwrap();
    f.flush().unwrap();
    let path = f.path().to_str().unwrap().to_string();

    let t = Table::from_csv(&["Symbol", "I64", "F64"], &path).unwrap();
    assert_eq!(t.nrows().unwrap(), 2);
    assert_eq!(t.col_names().unwrap(), vec!["sym", "qty", "px"]);
    assert_eq!(t.get_str(0, 0).unwrap(), "AAPL");
    assert_eq!(t.get_i64(1, 1).unwrap(), 20);
    assert_eq!(t.get_f64(2, 0).unwrap(), 1.5);

    // Wrong arity of declared types is a schema error.
    assert!(Table::from_csv(&["Symbol"], &path).is_err());
}

// ---------------------------------------------------------------------------
// Serialization & threading
// ---------------------------------------------------------------------------

#[test]
fn serialization_round_trips() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = people();
    let bytes = rt::ser_obj(&t.handle().unwrap()).unwrap();
    let back = rt::de_obj(&bytes).unwrap();
    assert_eq!(rt::ser_obj(&back).unwrap(), bytes);

    let table = Table::from_handle(back).unwrap();
    assert_eq!(table.get_str(1, 3).unwrap(), "dana");
}

#[test]
fn foreign_threads_are_rejected() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let err = std::thread::spawn(|| rt::i64(1).unwrap_err())
        .join()
        .unwrap();
    assert_eq!(err, Error::ThreadAffinity);

    // The runtime on the owner thread is unaffected.
    assert_eq!(rt::read_i64(&rt::i64(1).unwrap()).unwrap(), 1);
}

#[test]
fn calls_require_initialization() {
    let _guard = lock();
    {
        let _rt = Runtime::init().unwrap();
        assert!(rt::is_initialized());
        assert_eq!(Runtime::init().unwrap_err(), Error::AlreadyInitialized);
    }
    assert!(!rt::is_initialized());
    assert_eq!(rt::i64(1).unwrap_err(), Error::NotInitialized);
}
