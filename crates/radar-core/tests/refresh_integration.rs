//! Integration tests for the downstream refresher.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use radar_core::maintenance::{ensure_indexes, normalize_dates, recreate_view};
use radar_core::{
    CoveragePolicy, DownstreamRefresher, Error, FailurePolicy, MatrixBuilder, MatrixConfig,
    Reason, RefreshConfig, RefreshReport, RuleRegistry, SchemaInspector, Store, StoreConfig,
    Verdict,
};

struct TestContext {
    store: Store,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new(schema: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radar_premios.db");
        let store = Store::open(StoreConfig::new(&path).create_if_missing()).unwrap();
        store.execute_batch(schema).unwrap();
        Self { store, _dir: dir }
    }

    fn refresh(&mut self, config: RefreshConfig) -> RefreshReport {
        DownstreamRefresher::new(self.store.conn_mut(), config)
            .run()
            .unwrap()
    }

    fn rows(&self, sql: &str) -> Vec<(String, i64)> {
        let mut stmt = self.store.conn().prepare(sql).unwrap();
        let mut rows: Vec<(String, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        rows.sort();
        rows
    }

    fn strings(&self, sql: &str) -> Vec<String> {
        let mut stmt = self.store.conn().prepare(sql).unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// Schema text plus full contents of every table, for no-op checks.
    fn snapshot(&self) -> Vec<String> {
        let mut snapshot = self.strings(
            "SELECT type || ':' || name || ':' || COALESCE(sql, '') FROM sqlite_master ORDER BY name",
        );
        let inspector = SchemaInspector::new(self.store.conn());
        for object in inspector.list_objects().unwrap() {
            if object.is_view() {
                continue;
            }
            let columns: Vec<String> = inspector
                .columns(&object.name)
                .unwrap()
                .iter()
                .map(|c| format!("\"{}\"", c.name))
                .collect();
            let dump = self.strings(&format!(
                "SELECT json_array({}) FROM \"{}\" ORDER BY 1",
                columns.join(", "),
                object.name
            ));
            snapshot.push(format!("{}={}", object.name, dump.join("|")));
        }
        snapshot
    }
}

const BASE_SCHEMA: &str = r#"
    CREATE TABLE matriz_astro_luna (fecha TEXT NOT NULL, numero INTEGER NOT NULL);
    INSERT INTO matriz_astro_luna VALUES
        ('2024-05-01', 407),
        ('2024-05-02', 1234),
        ('2024-05-03', 407);
    CREATE TABLE etiquetas (fecha TEXT, numero INTEGER, etiqueta TEXT NOT NULL DEFAULT '');
    CREATE TABLE copia (fecha TEXT, numero INTEGER);
    INSERT INTO copia VALUES ('1999-01-01', 1);
    CREATE TABLE con_signo (fecha TEXT, numero INTEGER, signo TEXT NOT NULL);
    CREATE TABLE con_nota (fecha TEXT, numero INTEGER, nota TEXT);
    CREATE TABLE ajena (premio TEXT);
    CREATE TABLE tolima (fecha TEXT, numero INTEGER);
    CREATE VIEW todo AS SELECT * FROM matriz_astro_luna;
"#;

fn summary(report: &RefreshReport) -> Vec<(String, Verdict, String, Option<u64>)> {
    report
        .actions
        .iter()
        .map(|a| (a.table.clone(), a.verdict, a.reason.to_string(), a.rows_after))
        .collect()
}

#[test]
fn test_default_column_blocks_full_coverage_but_not_partial() {
    let mut ctx = TestContext::new(BASE_SCHEMA);

    let report = ctx.refresh(RefreshConfig::default());
    let action = report.action("etiquetas").unwrap();
    assert_eq!(action.verdict, Verdict::Skipped);
    assert!(action.reason.to_string().contains("etiqueta"));

    let report = ctx.refresh(RefreshConfig::default().allow_partial(true));
    let action = report.action("etiquetas").unwrap();
    assert_eq!(action.verdict, Verdict::Refreshed);
    assert_eq!(action.rows_after, Some(3));
    assert_eq!(
        ctx.rows("SELECT etiqueta, COUNT(*) FROM etiquetas GROUP BY etiqueta"),
        vec![(String::new(), 3)]
    );
}

#[test]
fn test_excluded_and_matrix_are_never_refreshed() {
    let mut ctx = TestContext::new(
        r#"
        CREATE TABLE matriz_interna (fecha TEXT, numero INTEGER);
        INSERT INTO matriz_interna VALUES ('2024-05-01', 407);
        CREATE TABLE tolima (fecha TEXT, numero INTEGER);
        "#,
    );

    for coverage in [CoveragePolicy::FullCoverage, CoveragePolicy::Partial] {
        let config = RefreshConfig::default()
            .with_matrix("matriz_interna")
            .with_coverage(coverage)
            .with_targets(["tolima", "matriz_interna"]);
        let report = ctx.refresh(config);

        let tolima = report.action("tolima").unwrap();
        assert_eq!(tolima.verdict, Verdict::Skipped);
        assert_eq!(tolima.reason, Reason::Excluded);

        let matrix = report.action("matriz_interna").unwrap();
        assert_eq!(matrix.verdict, Verdict::Skipped);
        assert!(matrix.reason.to_string().contains("is the source"));
        assert_eq!(report.refreshed(), 0);
    }

    assert_eq!(SchemaInspector::new(ctx.store.conn()).row_count("tolima").unwrap(), 0);
}

#[test]
fn test_refresh_is_idempotent() {
    let mut ctx = TestContext::new(BASE_SCHEMA);
    let config = RefreshConfig::default().allow_partial(true);

    let first = ctx.refresh(config.clone());
    let second = ctx.refresh(config);

    assert_eq!(summary(&first), summary(&second));
    assert_eq!(first.refreshed(), 3);
}

#[test]
fn test_refreshed_rows_match_matrix() {
    let mut ctx = TestContext::new(BASE_SCHEMA);
    ctx.refresh(RefreshConfig::default());

    assert_eq!(
        ctx.rows("SELECT fecha, numero FROM copia"),
        ctx.rows("SELECT fecha, numero FROM matriz_astro_luna")
    );
}

#[test]
fn test_required_column_gate() {
    let mut ctx = TestContext::new(BASE_SCHEMA);

    let strict = ctx.refresh(RefreshConfig::default());
    let action = strict.action("con_signo").unwrap();
    assert_eq!(action.verdict, Verdict::Skipped);
    assert!(action.reason.to_string().contains("signo"));

    let partial = ctx.refresh(RefreshConfig::default().allow_partial(true));
    let action = partial.action("con_signo").unwrap();
    assert_eq!(action.verdict, Verdict::Skipped);
    assert_eq!(action.reason, Reason::MissingRequired(vec!["signo".to_string()]));

    // A nullable destination-only column does not block partial mode.
    assert_eq!(partial.action("con_nota").unwrap().verdict, Verdict::Refreshed);
    assert_eq!(strict.action("con_nota").unwrap().verdict, Verdict::Skipped);

    assert_eq!(partial.action("ajena").unwrap().reason, Reason::NoOverlap);
}

#[test]
fn test_full_coverage_refreshes_subset_of_partial() {
    let mut ctx = TestContext::new(BASE_SCHEMA);
    let strict = ctx.refresh(RefreshConfig::default().dry_run(true));
    let partial = ctx.refresh(RefreshConfig::default().allow_partial(true).dry_run(true));

    for action in strict.actions.iter().filter(|a| a.verdict == Verdict::Refreshed) {
        assert_eq!(
            partial.action(&action.table).unwrap().verdict,
            Verdict::Refreshed,
            "{}",
            action.table
        );
    }
}

#[test]
fn test_fill_defaults_only_touch_absent_columns() {
    let mut ctx = TestContext::new(BASE_SCHEMA);
    let defaults: BTreeMap<String, String> = [
        ("nota".to_string(), "manual".to_string()),
        ("numero".to_string(), "0".to_string()),
    ]
    .into_iter()
    .collect();

    let report = ctx.refresh(
        RefreshConfig::default()
            .allow_partial(true)
            .with_fill_defaults(defaults),
    );

    let action = report.action("con_nota").unwrap();
    assert!(action.reason.to_string().contains("filled [nota]"));
    assert_eq!(
        ctx.rows("SELECT nota, COUNT(*) FROM con_nota GROUP BY nota"),
        vec![("manual".to_string(), 3)]
    );
    assert_eq!(
        ctx.rows("SELECT fecha, numero FROM con_nota"),
        ctx.rows("SELECT fecha, numero FROM matriz_astro_luna")
    );
}

#[test]
fn test_dry_run_is_a_no_op() {
    let mut ctx = TestContext::new(&format!(
        "{}
         CREATE TABLE astro_luna (fecha TEXT, numero INTEGER, signo TEXT);
         INSERT INTO astro_luna VALUES ('01/05/2024', 407, 'leo');",
        BASE_SCHEMA
    ));
    let before = ctx.snapshot();

    let report = ctx.refresh(RefreshConfig::default().allow_partial(true).dry_run(true));
    assert!(report.dry_run);
    assert!(report.refreshed() > 0);
    assert!(report.actions.iter().all(|a| a.rows_after.is_none()));

    MatrixBuilder::new(ctx.store.conn_mut(), MatrixConfig::default().dry_run(true))
        .rebuild()
        .unwrap();
    MatrixBuilder::new(ctx.store.conn_mut(), MatrixConfig::default().dry_run(true))
        .rebuild_extended()
        .unwrap();
    ensure_indexes(
        ctx.store.conn_mut(),
        "matriz_astro_luna",
        &Default::default(),
        true,
    )
    .unwrap();
    recreate_view(ctx.store.conn_mut(), "todo", "matriz_astro_luna", true).unwrap();
    normalize_dates(ctx.store.conn_mut(), true).unwrap();

    assert_eq!(before, ctx.snapshot());
}

#[test]
fn test_failure_policy() {
    let schema = format!(
        "{}
         CREATE TABLE estricta (fecha TEXT, numero INTEGER CHECK (numero < 1000));
         INSERT INTO estricta VALUES ('1999-01-01', 5);",
        BASE_SCHEMA
    );

    let mut ctx = TestContext::new(&schema);
    let report = ctx.refresh(RefreshConfig::default());

    let failed = report.action("estricta").unwrap();
    assert_eq!(failed.verdict, Verdict::Failed);
    assert!(failed.reason.to_string().starts_with("failed: constraint violation"));
    assert_eq!(failed.rows_before, Some(1));
    assert_eq!(report.action("copia").unwrap().verdict, Verdict::Refreshed);
    assert!(matches!(
        report.partial_run_error(),
        Some(Error::PartialRun { failed: 1, .. })
    ));
    assert_eq!(
        ctx.rows("SELECT fecha, numero FROM estricta"),
        vec![("1999-01-01".to_string(), 5)]
    );

    let mut ctx = TestContext::new(&schema);
    let result = DownstreamRefresher::new(
        ctx.store.conn_mut(),
        RefreshConfig::default().with_failure_policy(FailurePolicy::Abort),
    )
    .run();
    assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
}

#[test]
fn test_missing_targets_reported_last() {
    let mut ctx = TestContext::new(BASE_SCHEMA);
    let report = ctx.refresh(RefreshConfig::default().with_targets(["no_existe", "copia"]));

    let tables: Vec<_> = report.actions.iter().map(|a| a.table.as_str()).collect();
    assert_eq!(
        tables,
        vec!["todo", "copia", "matriz_astro_luna", "tolima", "no_existe"]
    );
    assert_eq!(report.action("no_existe").unwrap().reason, Reason::NotFound);
}

const RULE_SCHEMA: &str = r#"
    CREATE TABLE astro_luna (fecha TEXT, numero INTEGER, signo TEXT);
    INSERT INTO astro_luna VALUES
        ('2024-05-01', 407, 'leo'),
        ('2024-05-02', 1234, 'aries'),
        ('2024-05-03', 1777, 'tauro'),
        ('2024-05-04', 9999, 'libra');
    CREATE TABLE cuando_7_es_c_y_u (fecha TEXT, numero INTEGER);
    CREATE TABLE cuando_0_es_um (fecha TEXT, numero INTEGER);
    CREATE TABLE todo_cuando_4_es (fecha TEXT, numero INTEGER);
    CREATE TABLE todos_cuando_son (fecha TEXT, numero INTEGER, posicion TEXT, digito INTEGER);
    CREATE TABLE tercer_resumen_matriz_aslu (fecha TEXT, numero INTEGER, um INTEGER, c INTEGER, d INTEGER, u INTEGER, combinacion TEXT);
    CREATE TABLE cuando_x_es_c (fecha TEXT, numero INTEGER);
"#;

#[test]
fn test_rules_over_extended_matrix() {
    let mut ctx = TestContext::new(RULE_SCHEMA);
    MatrixBuilder::new(ctx.store.conn_mut(), MatrixConfig::default())
        .rebuild_extended()
        .unwrap();

    let report = ctx.refresh(RefreshConfig::default());

    assert_eq!(report.action("cuando_7_es_c_y_u").unwrap().rows_after, Some(1));
    assert_eq!(report.action("cuando_0_es_um").unwrap().rows_after, Some(1));
    assert_eq!(report.action("todo_cuando_4_es").unwrap().rows_after, Some(2));
    assert_eq!(report.action("todos_cuando_son").unwrap().rows_after, Some(16));
    assert_eq!(
        report.action("tercer_resumen_matriz_aslu").unwrap().rows_after,
        Some(4)
    );
    assert_eq!(
        report.action("cuando_x_es_c").unwrap().reason,
        Reason::UnrecognizedName
    );

    assert_eq!(
        ctx.rows("SELECT posicion, COUNT(*) FROM todos_cuando_son WHERE digito = 9 GROUP BY posicion"),
        vec![
            ("c".to_string(), 1),
            ("d".to_string(), 1),
            ("u".to_string(), 1),
            ("um".to_string(), 1),
        ]
    );
}

#[test]
fn test_digit_columns_derived_from_plain_matrix() {
    let mut ctx = TestContext::new(&format!(
        "{}
         CREATE TABLE matriz_astro_luna (fecha TEXT NOT NULL, numero INTEGER NOT NULL);",
        RULE_SCHEMA
    ));
    MatrixBuilder::new(ctx.store.conn_mut(), MatrixConfig::default())
        .rebuild()
        .unwrap();

    let report = ctx.refresh(RefreshConfig::default());
    assert_eq!(
        report.action("tercer_resumen_matriz_aslu").unwrap().verdict,
        Verdict::Refreshed
    );
    assert_eq!(
        ctx.rows("SELECT combinacion, u FROM tercer_resumen_matriz_aslu WHERE numero = 407"),
        vec![("0-4-0-7".to_string(), 7)]
    );

    // Without rules the same table needs real digit columns in the matrix.
    let report = ctx.refresh(RefreshConfig::default().with_rules(RuleRegistry::projection_only()));
    let action = report.action("tercer_resumen_matriz_aslu").unwrap();
    assert_eq!(
        action.reason,
        Reason::MissingFromMatrix(
            ["um", "c", "d", "u", "combinacion"]
                .iter()
                .map(|c| c.to_string())
                .collect()
        )
    );
}
