// Entry point and high-level CLI flow.
//
// - Option [1] loads the event source and derives the period facts.
// - Option [2] evaluates compliance and goals, prints previews and writes
//   the CSV/JSON exports, including the two-entity comparison.
// - Option [3] edits the four filters.
// With `--batch` the tool loads, reports and exits without prompting.
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::warn;

use idso_report::aggregate::{FactCache, PeriodFacts};
use idso_report::compliance::evaluate_compliance;
use idso_report::config::{parse_reference_date, Settings};
use idso_report::goals::{evaluate_goals, goal_year, Severity};
use idso_report::loader;
use idso_report::output;
use idso_report::overview::{compare_entities, indicator_share, kpis, ranking, RankMode};
use idso_report::reports;
use idso_report::selection::{Choice, Selection, SelectionOptions, Session};
use idso_report::util::{self, month_from_token};

/// Monthly submission compliance and annual goal tracking for IDSO safety
/// indicators.
#[derive(Parser, Debug)]
#[command(name = "idso_report", version, about)]
struct Cli {
    /// Event source (CSV). Overrides `source` in the settings file.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Settings file; defaults to ./idso.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    today: Option<String>,

    /// Directory for exported reports.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Initial entity filter (repeatable).
    #[arg(long = "entity")]
    entities: Vec<String>,

    /// Initial year filter (repeatable).
    #[arg(long = "year")]
    years: Vec<String>,

    /// Initial month filter: number, abbreviation or name (repeatable).
    #[arg(long = "month")]
    months: Vec<String>,

    /// Initial indicator filter (repeatable).
    #[arg(long = "indicator")]
    indicators: Vec<String>,

    /// Entities to compare side by side; defaults to the first two loaded.
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    compare: Vec<String>,

    /// Load, report and exit without the interactive menu.
    #[arg(long)]
    batch: bool,
}

struct Loaded {
    name: String,
    hash: String,
    facts: PeriodFacts,
    options: SelectionOptions,
}

// Everything the menu handlers share, passed explicitly.
struct AppState {
    settings: Settings,
    source_path: PathBuf,
    output_dir: PathBuf,
    today: NaiveDate,
    cache: FactCache,
    session: Session,
    loaded: Option<Loaded>,
    initial_filters: RawFilters,
    compare: Option<(String, String)>,
}

#[derive(Default)]
struct RawFilters {
    entities: Vec<String>,
    years: Vec<String>,
    months: Vec<String>,
    indicators: Vec<String>,
}

/// Turn user tokens into raw choices. `ALL`, `TODOS` and `*` stand for the
/// unrestricted choice; an unparsable token is reported back as `Err`.
fn parse_choices<T, F>(tokens: &[String], parse: F) -> Result<Vec<Choice<T>>, String>
where
    F: Fn(&str) -> Option<T>,
{
    let mut out = Vec::new();
    for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        match token.to_uppercase().as_str() {
            "ALL" | "TODOS" | "*" => out.push(Choice::All),
            _ => out.push(Choice::Value(parse(token).ok_or_else(|| token.to_string())?)),
        }
    }
    Ok(out)
}

fn apply_filters(selection: &mut Selection, raw: &RawFilters, opts: &SelectionOptions) {
    // An unparsable token cannot be a valid option, so the set falls back to
    // unrestricted through the same repair path as any stale value.
    let report = |dim: &str, bad: &str| {
        println!("Unknown {} {:?}; {} filter reset to ALL.", dim, bad, dim);
    };

    match parse_choices(&raw.entities, |t| Some(t.to_uppercase())) {
        Ok(c) => selection.set_entities(&c, opts),
        Err(bad) => {
            report("entity", &bad);
            selection.set_entities(&[], opts);
        }
    }
    match parse_choices(&raw.years, |t| t.parse::<i32>().ok()) {
        Ok(c) => selection.set_years(&c, opts),
        Err(bad) => {
            report("year", &bad);
            selection.set_years(&[], opts);
        }
    }
    match parse_choices(&raw.months, month_from_token) {
        Ok(c) => selection.set_months(&c, opts),
        Err(bad) => {
            report("month", &bad);
            selection.set_months(&[], opts);
        }
    }
    match parse_choices(&raw.indicators, |t| Some(t.to_string())) {
        Ok(c) => selection.set_indicators(&c, opts),
        Err(bad) => {
            report("indicator", &bad);
            selection.set_indicators(&[], opts);
        }
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask whether to go back to the menu after generating reports.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load the source and derive facts.
fn handle_load(state: &mut AppState) -> anyhow::Result<()> {
    let source = loader::load_source(&state.source_path)?;
    let report = &source.report;
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        util::format_int(report.total_rows),
        util::format_int(source.records.len())
    );
    let dropped = report.parse_errors
        + report.normalize.unresolved_month
        + report.normalize.unresolved_year;
    if dropped > 0 {
        println!(
            "Note: {} rows skipped ({} unreadable, {} without a valid month, {} without a year).",
            util::format_int(dropped),
            util::format_int(report.parse_errors),
            util::format_int(report.normalize.unresolved_month),
            util::format_int(report.normalize.unresolved_year)
        );
    }
    println!("Source: {} • Hash: {}\n", source.name, &source.hash[..12]);

    let records = source.records;
    let facts = state
        .cache
        .get_or_aggregate(&source.hash, move || records)
        .clone();
    let options = facts.options();

    if state.session.on_source_loaded(&source.hash, &options) {
        let raw = std::mem::take(&mut state.initial_filters);
        apply_filters(&mut state.session.selection, &raw, &options);
    }

    state.loaded = Some(Loaded {
        name: source.name,
        hash: source.hash,
        facts,
        options,
    });
    Ok(())
}

/// Handle option [3]: edit the filters one dimension at a time.
fn handle_filters(state: &mut AppState) {
    let Some(loaded) = &state.loaded else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return;
    };
    let split = |s: String| -> Vec<String> { s.split(';').map(str::to_string).collect() };
    println!("Separate values with ';'. Leave blank or type ALL for no restriction.");
    let raw = RawFilters {
        entities: split(read_line("Entities: ")),
        years: split(read_line("Years: ")),
        months: split(read_line("Months: ")),
        indicators: split(read_line("Indicators: ")),
    };
    apply_filters(&mut state.session.selection, &raw, &loaded.options);
    print_filters(&state.session.selection, &loaded.options);
}

fn print_filters(selection: &Selection, opts: &SelectionOptions) {
    let label = |all: bool, values: String| if all { "ALL".to_string() } else { values };
    println!(
        "Filters: entity={} year={} month={} indicator={}\n",
        label(
            selection.entities.is_unrestricted(),
            selection.entities.resolve(&opts.entities).join(",")
        ),
        label(
            selection.years.is_unrestricted(),
            selection
                .years
                .resolve(&opts.years)
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(",")
        ),
        label(
            selection.months.is_unrestricted(),
            selection
                .months
                .resolve(&opts.months)
                .into_iter()
                .map(util::month_abbrev)
                .collect::<Vec<_>>()
                .join(",")
        ),
        label(
            selection.indicators.is_unrestricted(),
            selection.indicators.resolve(&opts.indicators).join(" | ")
        ),
    );
}

fn export<T: serde::Serialize>(dir: &Path, file: &str, rows: &[T]) {
    if let Err(e) = output::write_csv(&dir.join(file), rows) {
        eprintln!("Write error: {}", e);
    }
}

/// Entities for the side-by-side comparison: the `--compare` pair, or the
/// first two entities in the data.
fn comparison_pair(state: &AppState, options: &SelectionOptions) -> Option<(String, String)> {
    if let Some(pair) = &state.compare {
        return Some(pair.clone());
    }
    match options.entities.as_slice() {
        [a, b, ..] => Some((a.clone(), b.clone())),
        _ => None,
    }
}

/// Handle option [2]: evaluate and export.
fn handle_generate_reports(state: &AppState) {
    let Some(loaded) = &state.loaded else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return;
    };
    let selection = &state.session.selection;
    let filtered = loaded.facts.filter(selection);
    let dir = &state.output_dir;

    print_filters(selection, &loaded.options);

    let k = kpis(&filtered);
    println!(
        "Entities: {} | Indicators: {} | Events: {} | Movements: {}\n",
        util::format_int(k.entities),
        util::format_int(k.indicators),
        util::format_int(k.events),
        util::format_int(k.movements)
    );

    let trend = reports::year_trend_rows(&filtered);
    println!("Year-over-year comparison\n");
    output::preview_table_rows(&trend, 5);

    // Compliance always looks at the full history.
    let compliance = evaluate_compliance(&loaded.facts, state.today);
    let pending = compliance.pending(&selection.entities);
    println!(
        "Report 1: Pending IDSO submissions (required period {}, due {})\n",
        compliance.required_period.label(),
        compliance.due_date.format("%d/%m/%Y")
    );
    if pending.is_empty() {
        println!("No entity pending at the moment (with current filters).\n");
    } else {
        let rows: Vec<_> = pending.iter().map(|s| reports::compliance_row(s)).collect();
        output::preview_table_rows(&rows, rows.len());
        for s in pending.iter().filter(|s| s.is_stale()) {
            warn!(entity = %s.entity, "missing-period count capped; check source data");
        }
    }
    let compliance_rows = reports::compliance_rows(&compliance);
    export(dir, "compliance_status.csv", &compliance_rows);

    println!("Report 2: Annual goals\n");
    match goal_year(&selection.years) {
        None => println!("Select exactly one year to evaluate goals.\n"),
        Some(year) => {
            let eval = evaluate_goals(
                &loaded.facts,
                year,
                &selection.entities,
                &selection.indicators,
                state.settings.goal_table(),
            );
            let headline = if eval.aggregate.is_empty() {
                &eval.per_entity
            } else {
                &eval.aggregate
            };
            let rows = reports::goal_rows(headline);
            output::preview_table_rows(&rows, rows.len());
            let bad = headline
                .iter()
                .filter(|s| s.severity() == Severity::Bad)
                .count();
            if bad > 0 {
                println!("{} goal(s) off target.\n", bad);
            }
            println!("Met every goal in {}: {}", year, eval.achieved.join(", "));
            println!("Missed a goal in {}: {}\n", year, eval.not_achieved.join(", "));

            let mut all = eval.aggregate.clone();
            all.extend(eval.per_entity.iter().cloned());
            export(dir, "goal_status.csv", &reports::goal_rows(&all));
        }
    }

    println!("Report 3: Top entities per indicator (events)\n");
    let by_events = reports::ranking_rows(&ranking(&filtered, RankMode::Events), 0);
    output::preview_table_rows(&by_events, 6);
    export(dir, "ranking_events.csv", &by_events);
    let by_index = reports::ranking_rows(&ranking(&filtered, RankMode::Index), 4);
    export(dir, "ranking_index.csv", &by_index);

    let shares = reports::indicator_share_rows(&indicator_share(&filtered));
    println!("Report 4: Share of events per indicator\n");
    output::preview_table_rows(&shares, shares.len());
    export(dir, "indicator_share.csv", &shares);

    match comparison_pair(state, &loaded.options) {
        None => println!("Report 5: comparison needs at least two entities.\n"),
        Some((a, b)) => {
            println!("Report 5: {} vs {}\n", a, b);
            for (mode, file) in [
                (RankMode::Events, "compare_events.csv"),
                (RankMode::Index, "compare_index.csv"),
            ] {
                let cmp = compare_entities(&loaded.facts, selection, &a, &b, mode);
                let rows = reports::comparison_rows(&cmp);
                if mode == RankMode::Events {
                    output::preview_table_rows(&rows, rows.len());
                }
                println!(
                    "{:?}: {} vs {} ({:+.2}%)\n",
                    mode,
                    util::format_number(cmp.total_a, 3),
                    util::format_number(cmp.total_b, 3),
                    cmp.relative_difference() * 100.0
                );
                export(dir, file, &rows);
            }
        }
    }

    export(dir, "facts_filtered.csv", &reports::fact_rows(&filtered));
    export(dir, "monthly_by_entity.csv", &reports::monthly_rows(&filtered));
    export(dir, "year_trend.csv", &trend);

    let meta = reports::export_metadata(
        &loaded.name,
        &loaded.hash,
        state.today,
        selection,
        &loaded.options,
        &compliance,
        &filtered,
    );
    if let Err(e) = output::write_json(&dir.join("metadata.json"), &meta) {
        eprintln!("Write error: {}", e);
    }
    println!("(Full tables exported to {})\n", dir.display());
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = Settings::discover(cli.config.as_deref()).context("loading settings")?;
    let today = match cli.today.as_deref() {
        Some(s) => parse_reference_date(s)?,
        None => chrono::Local::now().date_naive(),
    };
    let source_path = cli
        .source
        .clone()
        .or_else(|| settings.source.clone())
        .unwrap_or_else(|| PathBuf::from("idso.csv"));
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut state = AppState {
        settings,
        source_path,
        output_dir,
        today,
        cache: FactCache::new(),
        session: Session::default(),
        loaded: None,
        initial_filters: RawFilters {
            entities: cli.entities,
            years: cli.years,
            months: cli.months,
            indicators: cli.indicators,
        },
        compare: match cli.compare.as_slice() {
            [a, b] => Some((a.trim().to_uppercase(), b.trim().to_uppercase())),
            _ => None,
        },
    };

    if cli.batch {
        handle_load(&mut state)?;
        handle_generate_reports(&state);
        return Ok(());
    }

    loop {
        println!("IDSO Report (reference date {})", state.today.format("%d/%m/%Y"));
        println!("[1] Load the file");
        println!("[2] Generate Reports");
        println!("[3] Edit Filters\n");
        match read_choice().as_str() {
            "1" => {
                if let Err(e) = handle_load(&mut state) {
                    eprintln!("Failed to load file: {:#}\n", e);
                }
            }
            "2" => {
                println!();
                handle_generate_reports(&state);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_filters(&mut state),
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
    Ok(())
}
