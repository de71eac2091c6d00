//! SQL-shape tests for combined (whole-scope, one-row) planning.

use std::sync::Arc;

use tally::planner::{plan, Mode};
use tally::prelude::*;

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new()
            .add_entity(
                Entity::new("author")
                    .with_column("name", ColumnType::Text)
                    .with_column("age", ColumnType::Integer)
                    .with_has_many("posts", "post", "author_id"),
            )
            .add_entity(
                Entity::new("post")
                    .with_column("author_id", ColumnType::Integer)
                    .with_column("views", ColumnType::Integer),
            ),
    )
}

fn runner() -> Runner {
    SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .sum("total_views", "posts", "views")
        .build()
        .unwrap()
}

fn plan_sql(runner: &Runner, scope: &Scope, dialect: Dialect) -> String {
    plan(
        runner.catalog(),
        runner.entity(),
        runner.definitions(),
        Mode::Combined(scope),
        &Params::new(),
        dialect,
    )
    .unwrap()
    .to_sql(dialect)
}

#[test]
fn cte_dialects_route_membership_through_the_cte() {
    let runner = runner();
    let scope = Scope::new().eq("age", 30);
    assert_eq!(
        plan_sql(&runner, &scope, Dialect::Postgres),
        "WITH \"tally_scope\" AS \
         (SELECT * FROM \"authors\" WHERE \"authors\".\"age\" = 30) \
         SELECT (SELECT COUNT(*) FROM \"posts\" \
         WHERE \"posts\".\"author_id\" IN \
         (SELECT \"tally_scope\".\"id\" FROM \"tally_scope\")) AS \"post_count\", \
         (SELECT COALESCE(SUM(\"posts\".\"views\"), 0) FROM \"posts\" \
         WHERE \"posts\".\"author_id\" IN \
         (SELECT \"tally_scope\".\"id\" FROM \"tally_scope\")) AS \"total_views\""
    );
}

#[test]
fn sqlite_also_uses_the_cte() {
    let runner = runner();
    let sql = plan_sql(&runner, &Scope::new().eq("age", 30), Dialect::Sqlite);
    assert!(sql.starts_with("WITH \"tally_scope\" AS"));
}

#[test]
fn non_cte_dialects_fall_back_to_in_subqueries() {
    let runner = runner();
    let sql = plan_sql(&runner, &Scope::new().eq("age", 30), Dialect::MySql);
    assert!(!sql.contains("WITH"));
    assert!(sql.contains(
        "`posts`.`author_id` IN (SELECT `authors`.`id` FROM `authors` \
         WHERE `authors`.`age` = 30)"
    ));
}

#[test]
fn empty_scope_has_no_where_in_either_strategy() {
    let runner = runner();

    let pg = plan_sql(&runner, &Scope::all(), Dialect::Postgres);
    assert!(pg.contains("WITH \"tally_scope\" AS (SELECT * FROM \"authors\")"));

    let my = plan_sql(&runner, &Scope::all(), Dialect::MySql);
    assert!(my.contains("`posts`.`author_id` IN (SELECT `authors`.`id` FROM `authors`)"));
}

#[test]
fn combined_query_has_no_from_clause() {
    let runner = runner();
    let query = plan(
        runner.catalog(),
        runner.entity(),
        runner.definitions(),
        Mode::Combined(&Scope::all()),
        &Params::new(),
        Dialect::Postgres,
    )
    .unwrap();
    assert!(query.from.is_none());
}

#[test]
fn attribute_projections_are_rejected() {
    let runner = SpecBuilder::new(catalog(), "author")
        .column("author_name", "name")
        .build()
        .unwrap();
    let err = plan(
        runner.catalog(),
        runner.entity(),
        runner.definitions(),
        Mode::Combined(&Scope::all()),
        &Params::new(),
        Dialect::Postgres,
    )
    .unwrap_err();
    assert!(matches!(err, AggregateError::Definition { .. }));
    assert!(err.to_string().contains("combined load"));
}

#[test]
fn custom_projections_are_allowed() {
    let runner = SpecBuilder::new(catalog(), "author")
        .custom("answer", "40 + 2")
        .build()
        .unwrap();
    let sql = plan_sql(&runner, &Scope::all(), Dialect::Postgres);
    assert!(sql.contains("40 + 2 AS \"answer\""));
}
