use chrono::NaiveDate;

use idso_report::aggregate::{aggregate, FactCache};
use idso_report::compliance::evaluate_compliance;
use idso_report::goals::{evaluate_goals, goal_year, GoalScope, GoalTable};
use idso_report::loader::load_source;
use idso_report::output::{write_csv, write_json};
use idso_report::reports;
use idso_report::selection::{Choice, Session};

const SOURCE: &str = "\
AEROPORTO,ANO,MÊS,OrdemMes,Indicador,Nº DE EVENTOS,MOVIMENTAÇÃO (P + D)
SBJU,2024,Dezembro,12,F.O.D,1,800
SBJU,2025,Janeiro,1,F.O.D,2,900
SBJU,2025,Janeiro,1,RELPREV,9,900
SBJU,2025,Fevereiro,2,F.O.D,3,950
SBJU,2025,Fevereiro,2,RELPREV,8,950
sbcg,2024,Novembro,11,F.O.D,4,500
SBCG,2024,Novembro,11,RELPREV,abc,500
SBCG,2024,Mes13,,F.O.D,1,500
";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn load_evaluate_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idso.csv");
    std::fs::write(&path, SOURCE).unwrap();

    let source = load_source(&path).unwrap();
    assert_eq!(source.report.total_rows, 8);
    assert_eq!(source.report.normalize.unresolved_month, 1);

    let mut cache = FactCache::new();
    let records = source.records.clone();
    let facts = cache.get_or_aggregate(&source.hash, move || records).clone();
    assert_eq!(facts, aggregate(&source.records));

    let options = facts.options();
    let mut session = Session::default();
    assert!(session.on_source_loaded(&source.hash, &options));
    assert_eq!(options.entities, vec!["SBCG", "SBJU"]);

    // Compliance ignores filters.
    session.selection.set_entities(&[Choice::Value("SBJU".into())], &options);
    let today = date(2025, 3, 15);
    let compliance = evaluate_compliance(&facts, today);
    assert_eq!(compliance.statuses.len(), 2);
    let sbcg = compliance.statuses.iter().find(|s| s.entity == "SBCG").unwrap();
    assert!(!sbcg.is_ok);
    assert_eq!(sbcg.missing_periods, 3);
    assert!(sbcg.is_overdue);
    let sbju = compliance.statuses.iter().find(|s| s.entity == "SBJU").unwrap();
    assert!(sbju.is_ok);
    // ...but the pending view honours the entity filter.
    assert!(compliance.pending(&session.selection.entities).is_empty());

    session.selection.set_years(&[Choice::Value(2025)], &options);
    let year = goal_year(&session.selection.years).unwrap();
    let mut table = GoalTable::default();
    table.insert("SBJU", "F.O.D", 7);
    table.insert("SBJU", "RELPREV", 15);
    let eval = evaluate_goals(
        &facts,
        year,
        &session.selection.entities,
        &session.selection.indicators,
        &table,
    );
    assert!(eval.aggregate.is_empty());
    let fod = eval
        .per_entity
        .iter()
        .find(|s| s.scope == GoalScope::Entity("SBJU".into()) && s.indicator == "F.O.D")
        .unwrap();
    assert_eq!(fod.actual, 5);
    assert!(fod.achieved);
    let relprev = eval.per_entity.iter().find(|s| s.indicator == "RELPREV").unwrap();
    assert_eq!(relprev.actual, 17);
    assert!(relprev.achieved);
    assert_eq!(eval.achieved, vec!["SBJU"]);

    let filtered = facts.filter(&session.selection);
    assert_eq!(filtered.total_events(), 22);
    assert_eq!(filtered.total_movements(), 900 + 950);

    let out = dir.path();
    write_csv(&out.join("compliance.csv"), &reports::compliance_rows(&compliance)).unwrap();
    write_csv(&out.join("goals.csv"), &reports::goal_rows(&eval.per_entity)).unwrap();
    let meta = reports::export_metadata(
        &source.name,
        &source.hash,
        today,
        &session.selection,
        &options,
        &compliance,
        &filtered,
    );
    write_json(&out.join("metadata.json"), &meta).unwrap();

    let compliance_csv = std::fs::read_to_string(out.join("compliance.csv")).unwrap();
    assert!(compliance_csv.contains("SBCG,Fev/2025,Nov/2024,10/03/2025,5,3,OVERDUE"));
    let meta_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("metadata.json")).unwrap()).unwrap();
    assert_eq!(meta_json["rule"]["required_period"], 202502);
    assert_eq!(meta_json["filters"]["entity"][0], "SBJU");
    assert_eq!(meta_json["hash_sha256"], source.hash.as_str());
}

#[test]
fn changed_source_resets_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idso.csv");
    std::fs::write(&path, SOURCE).unwrap();
    let first = load_source(&path).unwrap();
    let opts = aggregate(&first.records).options();

    let mut session = Session::default();
    session.on_source_loaded(&first.hash, &opts);
    session.selection.set_years(&[Choice::Value(2024)], &opts);

    std::fs::write(&path, format!("{SOURCE}SBSP,2025,Março,3,F.O.D,1,10\n")).unwrap();
    let second = load_source(&path).unwrap();
    assert_ne!(first.hash, second.hash);
    let opts = aggregate(&second.records).options();
    assert!(session.on_source_loaded(&second.hash, &opts));
    assert!(session.selection.years.is_unrestricted());
}
