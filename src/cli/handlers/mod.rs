use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::engine::TaskEngine;
use crate::io::config_io;
use crate::io::kv::FileKv;
use crate::io::lock::DataLock;
use crate::io::recovery;
use crate::io::state;
use crate::io::task_store::TaskStore;
use crate::model::config::Config;
use crate::model::task::{TaskDraft, TaskPatch};
use crate::ops::import::ImportOutcome;
use crate::ops::task_ops::TaskError;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = config_io::resolve_data_dir(cli.data_dir.as_deref().map(Path::new));

    match cli.command {
        None => cmd_list(&dir, ListArgs::default(), json),
        Some(cmd) => match cmd {
            // Read commands
            Commands::List(args) => cmd_list(&dir, args, json),
            Commands::Show(args) => cmd_show(&dir, args, json),
            Commands::Stats => cmd_stats(&dir, json),
            Commands::Categories => cmd_categories(&dir, json),
            Commands::Streak => cmd_streak(&dir, json),
            Commands::Insights => cmd_insights(&dir, json),
            Commands::History(args) => cmd_history(&dir, args, json),
            Commands::Export(args) => cmd_export(&dir, args),

            // Write commands
            Commands::Add(args) => cmd_add(&dir, args, json),
            Commands::Done(args) => cmd_done(&dir, args, json),
            Commands::Edit(args) => cmd_edit(&dir, args, json),
            Commands::Rm(args) => cmd_rm(&dir, args, json),
            Commands::Undo => cmd_undo(&dir, json),
            Commands::Mv(args) => cmd_mv(&dir, args, json),
            Commands::Clear(args) => cmd_clear(&dir, args, json),
            Commands::Import(args) => cmd_import(&dir, args, json),

            // Settings and maintenance
            Commands::View(args) => cmd_view(&dir, args, json),
            Commands::Recovery(args) => cmd_recovery(&dir, args, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create the data directory if needed and take its lock. Every command
/// that opens the engine holds it: loading may finalize an expired delete.
fn lock_data_dir(dir: &Path) -> Result<DataLock, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create data directory {}: {}", dir.display(), e))?;
    Ok(DataLock::acquire_default(dir)?)
}

fn load_engine(dir: &Path, config: &Config) -> Result<TaskEngine<FileKv>, Box<dyn std::error::Error>> {
    let kv = FileKv::open(dir)?;
    let view = state::read_view_state(dir).unwrap_or_else(|| config.view.initial_settings());
    let engine = TaskEngine::new(TaskStore::new(kv, config.store.key.clone()))
        .with_undo_window(config.undo.window())
        .with_view(view);
    Ok(engine)
}

fn open(dir: &Path) -> Result<(DataLock, TaskEngine<FileKv>), Box<dyn std::error::Error>> {
    let lock = lock_data_dir(dir)?;
    let config = config_io::read_config(dir)?;
    let engine = load_engine(dir, &config)?;
    Ok((lock, engine))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn not_found(id: &str) -> Box<dyn std::error::Error> {
    Box::new(TaskError::NotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(dir: &Path, args: ListArgs, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;

    // One-off overrides; the saved view is left alone
    if let Some(ref f) = args.filter {
        engine.set_filter(parse_filter_arg(f)?);
    }
    if let Some(ref s) = args.sort {
        engine.set_sort_key(parse_sort_arg(s)?);
    }
    if let Some(q) = args.search {
        engine.set_search_query(q);
    }

    let tasks = engine.query_view();
    if json {
        return print_json(&ListJson {
            view: engine.view_settings(),
            tasks,
        });
    }

    if tasks.is_empty() {
        if engine.is_empty() {
            println!("no tasks");
        } else {
            println!("no tasks match ({})", format_view_settings(engine.view_settings()));
        }
    } else {
        print_lines(&format_task_list(&tasks, engine.today()));
    }
    if let Some(pending) = engine.pending_delete() {
        println!();
        println!(
            "deleted \"{}\"; `td undo` within {}s",
            pending.task.text,
            pending.remaining(engine.now()).num_seconds()
        );
    }
    Ok(())
}

fn cmd_show(dir: &Path, args: IdArg, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let task = engine.require(&args.id)?;
    if json {
        return print_json(task);
    }
    print_lines(&format_task_detail(task, engine.today()));
    Ok(())
}

fn cmd_stats(dir: &Path, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let stats = engine.stats();
    let due = engine.due_summary();
    let streak = engine.calculate_streak();
    if json {
        return print_json(&StatsJson { stats, due, streak });
    }
    print_lines(&format_stats(&stats, &due, streak));
    Ok(())
}

fn cmd_categories(dir: &Path, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let categories = engine.category_breakdown();
    let priorities = engine.priority_breakdown();
    if json {
        let priorities: IndexMap<&'static str, _> =
            priorities.iter().map(|(p, t)| (p.as_str(), *t)).collect();
        return print_json(&BreakdownJson {
            categories: &categories,
            priorities,
        });
    }
    print_lines(&format_breakdown(&categories, &priorities));
    Ok(())
}

fn cmd_streak(dir: &Path, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let streak = engine.calculate_streak();
    if json {
        return print_json(&StreakJson { streak });
    }
    println!("{} day{}", streak, if streak == 1 { "" } else { "s" });
    Ok(())
}

fn cmd_insights(dir: &Path, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let insights = engine.insights();
    if json {
        return print_json(&insights);
    }
    print_lines(&format_insights(&insights));
    Ok(())
}

fn cmd_history(dir: &Path, args: HistoryArgs, json: bool) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let history = engine.completion_history(args.days);
    if json {
        return print_json(&history);
    }
    print_lines(&format_history(&history));
    Ok(())
}

fn cmd_export(dir: &Path, args: ExportArgs) -> CmdResult {
    let (_lock, engine) = open(dir)?;
    let content = engine.export_json()?;
    match args.file {
        Some(file) => {
            let path = PathBuf::from(&file);
            recovery::atomic_write(&path, content.as_bytes())
                .map_err(|e| format!("cannot write {}: {}", file, e))?;
            eprintln!("exported {} tasks to {}", engine.len(), file);
        }
        None => println!("{}", content),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(dir: &Path, args: AddArgs, json: bool) -> CmdResult {
    let mut draft = TaskDraft::new(args.text);
    if let Some(ref p) = args.priority {
        draft = draft.priority(parse_priority_arg(p)?);
    }
    if let Some(ref c) = args.category {
        draft = draft.category(parse_category_arg(c)?);
    }
    if let Some(ref d) = args.due {
        draft = draft.due(parse_due_arg(d)?);
    }

    let (_lock, mut engine) = open(dir)?;
    let task = engine.add(draft)?;
    if json {
        return print_json(&task);
    }
    println!("{}", task.id);
    Ok(())
}

fn cmd_done(dir: &Path, args: IdArg, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;
    let task = engine
        .toggle_completion(&args.id)
        .ok_or_else(|| not_found(&args.id))?;
    if json {
        return print_json(&task);
    }
    println!(
        "{} {}",
        if task.completed { "completed" } else { "reopened" },
        task.id
    );
    Ok(())
}

fn cmd_edit(dir: &Path, args: EditArgs, json: bool) -> CmdResult {
    let patch = TaskPatch {
        text: args.text,
        priority: args.priority.as_deref().map(parse_priority_arg).transpose()?,
        category: args.category.as_deref().map(parse_category_arg).transpose()?,
        due_date: if args.no_due {
            Some(None)
        } else {
            args.due.as_deref().map(parse_due_arg).transpose()?.map(Some)
        },
    };
    if patch.is_empty() {
        return Err("nothing to change (use --text, --priority, --category, --due or --no-due)".into());
    }

    let (_lock, mut engine) = open(dir)?;
    let task = engine
        .update(&args.id, patch)?
        .ok_or_else(|| not_found(&args.id))?;
    if json {
        return print_json(&task);
    }
    println!("updated {}", task.id);
    Ok(())
}

fn cmd_rm(dir: &Path, args: IdArg, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;
    let task = engine.delete(&args.id).ok_or_else(|| not_found(&args.id))?;
    let undo_seconds = engine
        .pending_delete()
        .map(|p| p.remaining(engine.now()).num_seconds())
        .unwrap_or(0);
    if json {
        return print_json(&DeleteJson {
            task: &task,
            undo_seconds,
        });
    }
    println!(
        "deleted {} \"{}\"; `td undo` within {}s",
        task.id, task.text, undo_seconds
    );
    Ok(())
}

fn cmd_undo(dir: &Path, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;
    let task = engine.undo_delete().ok_or("nothing to undo")?;
    if json {
        return print_json(&task);
    }
    println!("restored {} \"{}\"", task.id, task.text);
    Ok(())
}

fn cmd_mv(dir: &Path, args: MvArgs, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;
    engine.require(&args.dragged)?;
    engine.require(&args.target)?;
    let moved = engine.reorder(&args.dragged, &args.target);
    if json {
        return print_json(&MovedJson { moved });
    }
    if moved {
        println!("moved {}", args.dragged);
    } else {
        println!("{} is already there", args.dragged);
    }
    Ok(())
}

fn cmd_clear(dir: &Path, args: ClearArgs, json: bool) -> CmdResult {
    let (_lock, mut engine) = open(dir)?;
    let removed = if args.all {
        engine.clear_all()
    } else {
        engine.clear_completed()
    };
    if json {
        return print_json(&CountJson { removed });
    }
    println!("removed {} task{}", removed, if removed == 1 { "" } else { "s" });
    Ok(())
}

fn cmd_import(dir: &Path, args: ImportArgs, json: bool) -> CmdResult {
    let payload = if args.file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(&args.file).map_err(|e| format!("cannot read {}: {}", args.file, e))?
    };

    let (_lock, mut engine) = open(dir)?;
    let outcome = engine.import_tasks(&payload);
    if json {
        print_json(&outcome)?;
    }
    match outcome {
        ImportOutcome::Success(summary) => {
            if !json {
                println!(
                    "imported {} of {} tasks ({} skipped)",
                    summary.added, summary.count, summary.skipped
                );
            }
            Ok(())
        }
        ImportOutcome::Failure { error } => Err(format!("import failed: {}", error).into()),
    }
}

// ---------------------------------------------------------------------------
// View settings
// ---------------------------------------------------------------------------

fn cmd_view(dir: &Path, args: ViewArgs, json: bool) -> CmdResult {
    let _lock = lock_data_dir(dir)?;
    let config = config_io::read_config(dir)?;
    let mut settings =
        state::read_view_state(dir).unwrap_or_else(|| config.view.initial_settings());

    let changing = args.reset
        || args.filter.is_some()
        || args.sort.is_some()
        || args.search.is_some()
        || args.clear_search;
    if args.reset {
        settings = config.view.initial_settings();
    }
    if let Some(ref f) = args.filter {
        settings.filter = parse_filter_arg(f)?;
    }
    if let Some(ref s) = args.sort {
        settings.sort_key = parse_sort_arg(s)?;
    }
    if let Some(q) = args.search {
        settings.search_query = q;
    }
    if args.clear_search {
        settings.search_query.clear();
    }
    if changing {
        state::write_view_state(dir, &settings)
            .map_err(|e| format!("cannot save view settings: {}", e))?;
    }

    if json {
        return print_json(&settings);
    }
    println!("{}", format_view_settings(&settings));
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(dir: &Path, args: RecoveryCmd, json: bool) -> CmdResult {
    match args.action {
        Some(RecoveryAction::Path) => {
            let path = recovery::recovery_log_path(dir);
            let abs = std::path::absolute(&path).unwrap_or(path);
            println!("{}", abs.display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune
                .before
                .as_deref()
                .map(|s| {
                    DateTime::parse_from_rfc3339(s)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|_| format!("invalid timestamp '{}' (expected RFC 3339)", s))
                })
                .transpose()?;
            let _lock = lock_data_dir(dir)?;
            let removed = recovery::prune_recovery(dir, before, prune.all)?;
            if json {
                return print_json(&CountJson { removed });
            }
            println!(
                "removed {} recovery entr{}",
                removed,
                if removed == 1 { "y" } else { "ies" }
            );
            Ok(())
        }
        None => {
            let entries = recovery::read_recovery_entries(dir, Some(args.limit.unwrap_or(10)));
            if json {
                let values: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&values);
            }
            if entries.is_empty() {
                println!("no recovery entries");
            }
            for entry in &entries {
                print!("{}", entry.to_markdown());
            }
            Ok(())
        }
    }
}
