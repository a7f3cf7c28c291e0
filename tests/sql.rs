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

//! SQL lowering tests: the restricted SELECT dialect against the fluent
//! builder pipeline.

use std::sync::Mutex;

use raydb::{col, Runtime, SqlError, Table};

static ENGINE_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> std::sync::MutexGuard<'static, ()> {
    ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn employees() -> Table {
    Table::from_columns(&[
        (
            "dept",
            vec!["eng".into(), "eng".into(), "hr".into(), "hr".into()],
        ),
        (
            "salary",
            vec![100.0.into(), 200.0.into(), 50.0.into(), 80.0.into()],
        ),
        (
            "age",
            vec![30i64.into(), 40i64.into(), 28i64.into(), 22i64.into()],
        ),
    ])
    .unwrap()
}

#[test]
fn sql_matches_the_fluent_pipeline() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = employees();
    let via_sql = t
        .sql(
            "SELECT dept, AVG(salary) AS avg_sal FROM self \
             WHERE age > 25 GROUP BY dept ORDER BY avg_sal DESC",
        )
        .unwrap();
    let via_builder = t
        .query()
        .select(["dept"])
        .select_expr("avg_sal", col("salary").avg())
        .where_(col("age").gt_(25i64))
        .by(["dept"])
        .order_by(["avg_sal"], true)
        .execute()
        .unwrap();

    assert_eq!(via_sql.col_names().unwrap(), via_builder.col_names().unwrap());
    assert_eq!(via_sql.nrows().unwrap(), via_builder.nrows().unwrap());
    for row in 0..via_sql.nrows().unwrap() {
        assert_eq!(via_sql.get_str(0, row), via_builder.get_str(0, row));
        assert_eq!(via_sql.get_f64(1, row), via_builder.get_f64(1, row));
    }

    // eng (avg 150) sorts before hr (avg 50).
    assert_eq!(via_sql.get_str(0, 0).unwrap(), "eng");
    assert_eq!(via_sql.get_f64(1, 0).unwrap(), 150.0);
    assert_eq!(via_sql.get_str(0, 1).unwrap(), "hr");
    assert_eq!(via_sql.get_f64(1, 1).unwrap(), 50.0);
}

#[test]
fn sql_star_and_comparisons() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = employees();
    let out = t.sql("SELECT * FROM self WHERE salary >= 80.0").unwrap();
    assert_eq!(out.ncols().unwrap(), 3);
    assert_eq!(out.nrows().unwrap(), 3);

    let arith = t
        .sql("SELECT dept, salary * 2 AS double_sal FROM self WHERE age = 40")
        .unwrap();
    assert_eq!(arith.nrows().unwrap(), 1);
    assert_eq!(arith.get_f64(1, 0).unwrap(), 400.0);
}

#[test]
fn sql_in_and_not() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = employees();
    let within = t
        .sql("SELECT age FROM self WHERE dept IN ('eng')")
        .unwrap();
    assert_eq!(within.nrows().unwrap(), 2);

    let negated = t
        .sql("SELECT age FROM self WHERE NOT (age > 25)")
        .unwrap();
    assert_eq!(negated.nrows().unwrap(), 1);
    assert_eq!(negated.get_i64(0, 0).unwrap(), 22);
}

#[test]
fn sql_aggregations_without_grouping() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = employees();
    let out = t
        .sql("SELECT SUM(salary) AS total, COUNT(age) AS n FROM self")
        .unwrap();
    assert_eq!(out.nrows().unwrap(), 1);
    assert_eq!(out.get_f64(0, 0).unwrap(), 430.0);
    assert_eq!(out.get_i64(1, 0).unwrap(), 4);
}

#[test]
fn unsupported_constructs_are_rejected() {
    let _guard = lock();
    let _rt = Runtime::init().unwrap();

    let t = employees();

    let join = t
        .sql("SELECT a FROM self JOIN other ON self.x = other.x")
        .unwrap_err();
    assert!(matches!(join, SqlError::Unsupported(_)), "got {join}");

    let subquery = t
        .sql("SELECT a FROM (SELECT * FROM self)")
        .unwrap_err();
    assert!(matches!(subquery, SqlError::Unsupported(_)), "got {subquery}");

    let window = t
        .sql("SELECT SUM(salary) OVER (ORDER BY age) FROM self")
        .unwrap_err();
    assert!(matches!(window, SqlError::Unsupported(_)), "got {window}");

    let ddl = t.sql("DROP TABLE self").unwrap_err();
    assert!(matches!(ddl, SqlError::Unsupported(_)), "got {ddl}");

    let unknown_fn = t.sql("SELECT UPPER(dept) FROM self").unwrap_err();
    assert!(matches!(unknown_fn, SqlError::Unsupported(_)), "got {unknown_fn}");

    let garbage = t.sql("SELEC dept FROM self").unwrap_err();
    assert!(matches!(garbage, SqlError::Parse(_)), "got {garbage}");
}
