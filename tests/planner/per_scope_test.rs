//! SQL-shape tests for per-scope and single-record planning.

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
                    .with_column("site_id", ColumnType::Integer)
                    .with_has_many("posts", "post", "author_id")
                    .with_belongs_to("site", "site", "site_id")
                    .with_has_many_through("tags", "tag", "tagging", "author_id", "tag_id"),
            )
            .add_entity(
                Entity::new("post")
                    .with_column("author_id", ColumnType::Integer)
                    .with_column("title", ColumnType::Text)
                    .with_column("views", ColumnType::Integer),
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

fn sql_for(runner: &Runner, mode: Mode<'_>, dialect: Dialect) -> String {
    plan(
        runner.catalog(),
        runner.entity(),
        runner.definitions(),
        mode,
        &Params::new(),
        dialect,
    )
    .unwrap()
    .to_sql(dialect)
}

#[test]
fn per_scope_projects_key_then_aggregates_in_order() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .sum("total_views", "posts", "views")
        .build()
        .unwrap();
    let scope = Scope::new().eq("age", 30);
    assert_eq!(
        sql_for(&runner, Mode::PerScope(&scope), Dialect::Ansi),
        "SELECT \"tally_outer\".\"id\" AS \"tally_pk\", \
         (SELECT COUNT(*) FROM \"posts\" \
         WHERE \"posts\".\"author_id\" = \"tally_outer\".\"id\") AS \"post_count\", \
         (SELECT COALESCE(SUM(\"posts\".\"views\"), 0) FROM \"posts\" \
         WHERE \"posts\".\"author_id\" = \"tally_outer\".\"id\") AS \"total_views\" \
         FROM \"authors\" AS \"tally_outer\" \
         WHERE \"tally_outer\".\"age\" = 30"
    );
}

#[test]
fn single_record_is_per_scope_with_key_predicate() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .build()
        .unwrap();
    let key = Key::Int(7);
    let sql = sql_for(&runner, Mode::Single(&key), Dialect::Ansi);
    assert!(sql.starts_with("SELECT \"tally_outer\".\"id\" AS \"tally_pk\""));
    assert!(sql.ends_with("WHERE \"tally_outer\".\"id\" = 7"));
}

#[test]
fn in_scope_renders_value_list() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .build()
        .unwrap();
    let scope = Scope::new().is_in("id", vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let sql = sql_for(&runner, Mode::PerScope(&scope), Dialect::Ansi);
    assert!(sql.ends_with("WHERE \"tally_outer\".\"id\" IN (1, 2, 3)"));
}

#[test]
fn mysql_uses_backticks_throughout() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("post_count", "posts")
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::MySql);
    assert_eq!(
        sql,
        "SELECT `tally_outer`.`id` AS `tally_pk`, \
         (SELECT COUNT(*) FROM `posts` \
         WHERE `posts`.`author_id` = `tally_outer`.`id`) AS `post_count` \
         FROM `authors` AS `tally_outer`"
    );
}

#[test]
fn belongs_to_correlates_on_foreign_key() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("site_count", "site")
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(sql.contains(
        "(SELECT COUNT(*) FROM \"sites\" \
         WHERE \"sites\".\"id\" = \"tally_outer\".\"site_id\") AS \"site_count\""
    ));
}

#[test]
fn through_relationship_uses_exists() {
    let runner = SpecBuilder::new(catalog(), "author")
        .count("tag_count", "tags")
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(sql.contains(
        "(SELECT COUNT(*) FROM \"tags\" WHERE EXISTS \
         (SELECT 1 FROM \"taggings\" \
         WHERE \"taggings\".\"tag_id\" = \"tags\".\"id\" \
         AND \"taggings\".\"author_id\" = \"tally_outer\".\"id\")) AS \"tag_count\""
    ));
}

#[test]
fn string_agg_shapes_follow_dialect() {
    let runner = SpecBuilder::new(catalog(), "author")
        .string_agg("titles", "posts", "title", Some(", "))
        .build()
        .unwrap();

    let pg = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Postgres);
    assert!(pg.contains("STRING_AGG(\"posts\".\"title\", ', ')"));

    let my = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::MySql);
    assert!(my.contains("GROUP_CONCAT(`posts`.`title` SEPARATOR ', ')"));

    let lite = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Sqlite);
    assert!(lite.contains("GROUP_CONCAT(\"posts\".\"title\", ', ')"));

    let ansi = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(ansi.contains("LISTAGG(\"posts\".\"title\", ', ')"));
}

#[test]
fn expression_aggregates_pass_sql_through() {
    let runner = SpecBuilder::new(catalog(), "author")
        .sum_expr("weighted", "posts", "views * 2")
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(sql.contains("COALESCE(SUM(views * 2), 0)"));
}

#[test]
fn custom_and_attribute_projections() {
    let runner = SpecBuilder::new(catalog(), "author")
        .column("author_name", "name")
        .custom("answer", "40 + 2")
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(sql.contains("\"tally_outer\".\"name\" AS \"author_name\""));
    assert!(sql.contains("40 + 2 AS \"answer\""));
}

#[test]
fn column_from_renders_scalar_subquery() {
    let runner = SpecBuilder::new(catalog(), "author")
        .column_from(
            "first_title",
            rel_where("posts", |ts, _| ts.select_column("title").limit(1)),
        )
        .build()
        .unwrap();
    let sql = sql_for(&runner, Mode::PerScope(&Scope::all()), Dialect::Ansi);
    assert!(sql.contains(
        "(SELECT \"posts\".\"title\" FROM \"posts\" \
         WHERE \"posts\".\"author_id\" = \"tally_outer\".\"id\" LIMIT 1) AS \"first_title\""
    ));
}
