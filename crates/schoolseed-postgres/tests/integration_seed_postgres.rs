use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use schoolseed_core::{CourseLayout, Division, Phase, PhasePlan};
use schoolseed_generate::{DirectBootstrap, GenerateOptions, GenerationEngine, GenerationError};
use schoolseed_postgres::{ConnectOptions, PgStore, apply_ddl, drop_tables};
use sqlx::PgPool;
use std::{env, fs};

const SCHEMA_FIXTURE: &str = "fixtures/sql/postgres/001_schema.sql";

/// Seeding tests need a disposable database; they are skipped without one.
fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

async fn reset_schema(pool: &PgPool) -> Result<()> {
    let script = fs::read_to_string(SCHEMA_FIXTURE)
        .with_context(|| format!("reading fixture {SCHEMA_FIXTURE}"))?;
    let report = apply_ddl(pool, &script).await;
    if let Some(failure) = report.failed.first() {
        bail!("fixture statement failed: {} ({})", failure.statement, failure.error);
    }
    Ok(())
}

async fn count(pool: &PgPool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar(&sql)
        .fetch_one(pool)
        .await
        .with_context(|| format!("counting {table}"))
}

fn small_options() -> GenerateOptions {
    GenerateOptions {
        seed: 21,
        layout: CourseLayout {
            years: 3,
            divisions: 2,
            primary_limit: 2,
        },
        teachers: 3,
        preceptors: 2,
        students_min: 2,
        students_max: 4,
        broadcast_messages: 4,
        reference_date: NaiveDate::from_ymd_opt(2026, 3, 15),
        ..GenerateOptions::default()
    }
}

// Both scenarios share one database, so they run in a single test.
#[tokio::test]
async fn seeds_postgres_in_committed_phases() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping postgres seeding test");
        return Ok(());
    };
    let pool = ConnectOptions::default()
        .connect(&url)
        .await
        .context("connecting to Postgres")?;

    reset_schema(&pool).await?;
    let engine = GenerationEngine::new(small_options())?;
    let plan = PhasePlan::synthetic()?;
    let mut store = PgStore::new(pool.clone());
    let result = engine.run(&plan, &mut store, &DirectBootstrap).await?;

    assert_eq!(count(&pool, "courses").await?, 6);
    let summary = &result.summary;
    let expected_users =
        1 + summary.teachers + summary.preceptors + summary.students + summary.parents;
    assert_eq!(count(&pool, "users").await?, expected_users as i64);
    assert_eq!(count(&pool, "grades").await?, result.summary.grades as i64);
    let overlaps: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM timetables a
        JOIN timetables b
          ON a.course_id = b.course_id AND a.day = b.day AND a.id < b.id
         AND a.start_time < b.end_time AND b.start_time < a.end_time
        "#,
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(overlaps, 0);

    // A second run without teardown stops on the admin email, whatever the seed.
    let users_before = count(&pool, "users").await?;
    let mut reseeded = engine.options().clone();
    reseeded.seed += 1;
    let err = GenerationEngine::new(reseeded)?
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .err()
        .ok_or_else(|| anyhow!("rerun should fail"))?;
    assert!(err.is_constraint_violation(), "{err}");
    match &err {
        GenerationError::PhaseFailed { phase, .. } => assert_eq!(*phase, Phase::Admin),
        other => bail!("unexpected error {other}"),
    }
    assert_eq!(count(&pool, "users").await?, users_before);
    assert_eq!(store.open_phase(), None);

    reset_schema(&pool).await?;
    let fixtures = PhasePlan::new(
        &[
            Phase::FixtureCourses,
            Phase::FixtureUsers,
            Phase::FixturePreceptors,
            Phase::FixtureTimetables,
        ],
        &[],
    )?;
    let mut store = PgStore::new(pool.clone());
    GenerationEngine::new(GenerateOptions::default())?
        .run(&fixtures, &mut store, &DirectBootstrap)
        .await?;

    assert_eq!(count(&pool, "courses").await?, 36);
    assert_eq!(count(&pool, "timetables").await?, 6);
    let placed: Option<String> = sqlx::query_scalar(
        r#"
        SELECT c.division
        FROM users u JOIN courses c ON c.id = u.course_id
        WHERE u.email = 'student'
        "#,
    )
    .fetch_optional(&pool)
    .await?;
    assert_eq!(placed.as_deref(), Some(Division::A.as_str()));

    let dropped = drop_tables(&pool).await?;
    assert!(dropped.iter().any(|table| table == "grades"));
    assert_eq!(
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pg_catalog.pg_tables WHERE schemaname = current_schema()"
        )
        .fetch_one(&pool)
        .await?,
        0
    );
    Ok(())
}
