//! End-to-end loading scenarios against an in-memory SQLite backend.

use std::sync::Arc;

use tally::prelude::*;
use tally::sql::expr::{lit_int, table_col, ExprExt};

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new()
            .add_entity(
                Entity::new("author")
                    .with_column("name", ColumnType::Text)
                    .with_column("age", ColumnType::Integer)
                    .with_column("site_id", ColumnType::Integer)
                    .with_has_many("posts", "post", "author_id")
                    .with_belongs_to("site", "site", "site_id")
                    .with_has_many_through("tags", "tag", "tagging", "author_id", "tag_id"),
            )
            .add_entity(
                Entity::new("post")
                    .with_column("author_id", ColumnType::Integer)
                    .with_column("title", ColumnType::Text)
                    .with_column("views", ColumnType::Integer)
                    .with_column("published", ColumnType::Boolean),
            )
            .add_entity(Entity::new("site").with_column("host", ColumnType::Text))
            .add_entity(
                Entity::new("tagging")
                    .with_column("author_id", ColumnType::Integer)
                    .with_column("tag_id", ColumnType::Integer),
            )
            .add_entity(Entity::new("tag").with_column("label", ColumnType::Text)),
    )
}

fn seeded() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT, age INTEGER, site_id INTEGER);
         CREATE TABLE posts (id INTEGER PRIMARY KEY, author_id INTEGER, title TEXT,
                             views INTEGER, published INTEGER);
         CREATE TABLE sites (id INTEGER PRIMARY KEY, host TEXT);
         CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT);
         CREATE TABLE taggings (id INTEGER PRIMARY KEY, author_id INTEGER, tag_id INTEGER);

         INSERT INTO sites VALUES (1, 'example.org');
         INSERT INTO authors VALUES
             (1, 'alice', 30, 1),
             (2, 'bob', 30, 1),
             (3, 'carol', 40, NULL);
         INSERT INTO posts VALUES
             (1, 1, 'a1', 10, 1),
             (2, 1, 'a2', 20, 1),
             (3, 1, 'a3', 30, 0),
             (4, 3, 'c1', 5, 1);
         INSERT INTO tags VALUES (1, 'rust'), (2, 'sql');
         INSERT INTO taggings VALUES (1, 1, 1), (2, 1, 1), (3, 1, 2);",
    )
    .unwrap();
    conn
}

#[test]
fn per_scope_load_yields_one_row_per_author() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .sum("total_views", "posts", "views")
        .build()
        .unwrap();
    let conn = seeded();
    let results = runner
        .from(&conn, &Scope::new().eq("age", 30), &Params::new())
        .unwrap();

    assert_eq!(results.len(), 2);
    let alice = results.get(&Key::Int(1)).unwrap();
    assert_eq!(alice.get_i64("post_count").unwrap(), 3);
    assert_eq!(alice.get_i64("total_views").unwrap(), 60);

    // bob has no posts: zeros, not NULLs
    let bob = results.get(&Key::Int(2)).unwrap();
    assert_eq!(bob.get_i64("post_count").unwrap(), 0);
    assert_eq!(bob.get_i64("total_views").unwrap(), 0);

    // carol is outside the scope
    assert!(results.get(&Key::Int(3)).is_none());
}

#[test]
fn single_record_load() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .string_agg("titles", "posts", "title", Some(", "))
        .build()
        .unwrap();
    let conn = seeded();
    let carol = runner.only(&conn, &Key::Int(3), &Params::new()).unwrap();
    assert_eq!(carol.get_i64("post_count").unwrap(), 1);
    assert_eq!(carol.get_str("titles").unwrap(), "c1");
}

#[test]
fn single_record_missing_is_a_cardinality_error() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .build()
        .unwrap();
    let conn = seeded();
    let err = runner.only(&conn, &Key::Int(99), &Params::new()).unwrap_err();
    assert!(matches!(
        err,
        AggregateError::CardinalityViolation { actual: 0 }
    ));
}

#[test]
fn combined_load_collapses_the_scope() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .sum("total_views", "posts", "views")
        .build()
        .unwrap();
    let conn = seeded();

    let row = runner
        .combined(&conn, &Scope::new().eq("age", 30), &Params::new())
        .unwrap();
    assert_eq!(row.get_i64("post_count").unwrap(), 3);
    assert_eq!(row.get_i64("total_views").unwrap(), 60);

    let all = runner.combined(&conn, &Scope::all(), &Params::new()).unwrap();
    assert_eq!(all.get_i64("post_count").unwrap(), 4);
    assert_eq!(all.get_i64("total_views").unwrap(), 65);
}

#[test]
fn combined_load_of_empty_scope_still_yields_one_row() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .build()
        .unwrap();
    let conn = seeded();
    let row = runner
        .combined(&conn, &Scope::new().eq("age", 99), &Params::new())
        .unwrap();
    assert_eq!(row.get_i64("post_count").unwrap(), 0);
}

#[test]
fn refinements_receive_call_time_params() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count(
            "popular_published",
            rel_where("posts", |ts, params: &Params| {
                let min = params
                    .get("min_views")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                ts.filter_eq("published", 1)
                    .filter(table_col("posts", "views").gt(lit_int(min)))
            }),
        )
        .build()
        .unwrap();
    let conn = seeded();

    let mut params = Params::new();
    params.insert("min_views".into(), Value::Int(15));
    let alice = runner.only(&conn, &Key::Int(1), &params).unwrap();
    // a2 (20 views, published); a1 fails the views bar, a3 is unpublished
    assert_eq!(alice.get_i64("popular_published").unwrap(), 1);

    params.insert("min_views".into(), Value::Int(0));
    let alice = runner.only(&conn, &Key::Int(1), &params).unwrap();
    assert_eq!(alice.get_i64("popular_published").unwrap(), 2);
}

#[test]
fn computed_fields_read_materialized_values_and_params() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .sum("total_views", "posts", "views")
        .computed("views_per_post", |row, _| {
            let posts = row.get_i64("post_count")?;
            if posts == 0 {
                return Ok(Value::Int(0));
            }
            Ok(Value::Int(row.get_i64("total_views")? / posts))
        })
        .computed("greeting", |row, params| {
            let name = params
                .get("salutation")
                .and_then(Value::as_str)
                .unwrap_or("hello")
                .to_string();
            Ok(Value::Text(format!("{name}: {}", row.get_i64("post_count")?)))
        })
        .build()
        .unwrap();
    let conn = seeded();

    let mut params = Params::new();
    params.insert("salutation".into(), Value::Text("hi".into()));
    let alice = runner.only(&conn, &Key::Int(1), &params).unwrap();
    assert_eq!(alice.get_i64("views_per_post").unwrap(), 20);
    assert_eq!(alice.get_str("greeting").unwrap(), "hi: 3");

    let bob = runner.only(&conn, &Key::Int(2), &params).unwrap();
    assert_eq!(bob.get_i64("views_per_post").unwrap(), 0);
}

#[test]
fn attribute_custom_and_column_from_projections() {
    let runner = SpecBuilder::new(catalog(), "author")
        .column("author_name", "name")
        .custom("answer", "40 + 2")
        .column_from(
            "first_title",
            rel_where("posts", |ts, _| ts.select_column("title").limit(1)),
        )
        .build()
        .unwrap();
    let conn = seeded();
    let alice = runner.only(&conn, &Key::Int(1), &Params::new()).unwrap();
    assert_eq!(alice.get_str("author_name").unwrap(), "alice");
    assert_eq!(alice.get_i64("answer").unwrap(), 42);
    assert_eq!(alice.get_str("first_title").unwrap(), "a1");

    // bob has no posts: the scalar subquery yields NULL
    let bob = runner.only(&conn, &Key::Int(2), &Params::new()).unwrap();
    assert_eq!(bob.get("first_title").unwrap(), Value::Null);
}

#[test]
fn through_counts_deduplicate_join_rows() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("tag_count", "tags")
        .build()
        .unwrap();
    let conn = seeded();
    // alice has three taggings but only two distinct tags
    let alice = runner.only(&conn, &Key::Int(1), &Params::new()).unwrap();
    assert_eq!(alice.get_i64("tag_count").unwrap(), 2);
}

#[test]
fn belongs_to_aggregates() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("site_count", "site")
        .string_agg("site_host", "site", "host", None)
        .build()
        .unwrap();
    let conn = seeded();
    let alice = runner.only(&conn, &Key::Int(1), &Params::new()).unwrap();
    assert_eq!(alice.get_i64("site_count").unwrap(), 1);
    assert_eq!(alice.get_str("site_host").unwrap(), "example.org");

    // carol has no site
    let carol = runner.only(&conn, &Key::Int(3), &Params::new()).unwrap();
    assert_eq!(carol.get_i64("site_count").unwrap(), 0);
}

#[test]
fn avg_materializes_as_float() {
    let runner = SpecBuilder::new(catalog(), "author")
        .avg("avg_views", "posts", "views")
        .build()
        .unwrap();
    let conn = seeded();
    let alice = runner.only(&conn, &Key::Int(1), &Params::new()).unwrap();
    assert!((alice.get_f64("avg_views").unwrap() - 20.0).abs() < f64::EPSILON);
}
