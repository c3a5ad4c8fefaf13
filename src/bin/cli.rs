use chrono::NaiveDate;
use mx_tracker::{
    ComplianceRegistry, DriverKind, MaintenanceTask, SourceType, TaskDriver, UsageUnit,
    evaluator, load_registry_from_csv, load_registry_from_json, save_registry_to_csv,
    save_registry_to_json,
};
use polars::prelude::{AnyValue, DataFrame};
use std::io::{self, Write};
use std::str::FromStr;

fn render_df_as_text_table(df: &DataFrame) -> String {
    // Compute column widths
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for (ci, col) in columns.iter().enumerate() {
        for row_idx in 0..df.height() {
            if let Ok(ref av) = col.get(row_idx) {
                let s = render_any_value(av);
                if s.len() > widths[ci] {
                    widths[ci] = s.len();
                }
            }
        }
    }

    // Build horizontal separator
    let mut sep = String::new();
    sep.push('+');
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    // Build output
    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');

    // Header
    out.push('|');
    for (i, name) in col_names.iter().enumerate() {
        out.push(' ');
        out.push_str(name);
        let pad = widths[i] - name.len();
        if pad > 0 {
            out.push_str(&" ".repeat(pad));
        }
        out.push(' ');
        out.push('|');
    }
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');

    // Rows
    for row_idx in 0..df.height() {
        out.push('|');
        for (ci, col) in columns.iter().enumerate() {
            let s = col
                .get(row_idx)
                .map(|av| render_any_value(&av))
                .unwrap_or_default();
            out.push(' ');
            out.push_str(&s);
            let pad = widths[ci].saturating_sub(s.len());
            if pad > 0 {
                out.push_str(&" ".repeat(pad));
            }
            out.push(' ');
            out.push('|');
        }
        out.push('\n');
    }

    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_any_value(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::Float64(v) => format!("{v:.1}"),
        AnyValue::Boolean(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show current registry\n  add <id> <unit> <threshold|repeat> <value> <name...>\n                                     Create a task with its first driver\n  driver <id> <unit> <threshold|repeat> <value>\n                                     Add a driver to an existing task\n  delete <id>                        Delete a task\n  window  <id> <pct>                 Set the early-compliance window percent\n  usage   <id> <hours> <cycles> <YYYY-MM-DD>\n                                     Record latest usage for the task\n  inservice <id> <YYYY-MM-DD>        Set the component in-service date\n  comply  <id> <hours> <cycles> <YYYY-MM-DD>\n                                     Record compliance at the given usage\n  status  <id>                       Evaluate the task and print its margins\n  watch                              List tasks needing attention\n  sources                            List source types\n  source  <id> <type> [ref]          Set source type and reference\n  ata     <id> <chapter>             Set ATA chapter\n  notes   <id> <text...>             Set task_notes (rest of line)\n  meta show                          Show program metadata\n  meta name <text...>                Update program name\n  meta desc <text...>                Update program description\n  meta horizon <days>                Update the review horizon in days\n  save <json|csv> <path>             Persist registry to disk\n  load <json|csv> <path>             Load registry from disk\n  compute                            Re-evaluate every task\n  quit|exit                          Exit"
    );
}

fn print_source_types() {
    println!("Available source types:");
    for (key, description) in SourceType::variants() {
        println!("  {:<10} {}", key, description);
    }
}

fn print_metadata(registry: &ComplianceRegistry) {
    let metadata = registry.metadata();
    println!("Program name       : {}", metadata.program_name);
    println!("Program description: {}", metadata.program_description);
    println!("Review horizon     : {} days", metadata.review_horizon_days);
}

fn print_estimate(task: &MaintenanceTask, estimate: &evaluator::DueEstimate) {
    println!(
        "Task {} '{}': {} (controlling unit {})",
        task.id, task.name, estimate.status, estimate.controlling_unit
    );
    for margin in &estimate.margins {
        println!(
            "  {:<4} remaining {:>10.1} of {:>10.1} ({:>6.1}%)",
            margin.unit.as_str(),
            margin.remaining,
            margin.interval,
            margin.fraction_remaining() * 100.0
        );
    }
    if let Some(due) = estimate.projected_due_date {
        println!("  projected due date: {due}");
    }
}

fn parse_date_arg(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn main() {
    let mut registry = ComplianceRegistry::new();

    println!("Maintenance Tracker (CLI) - type 'help' for commands\n");
    println!("{}", render_df_as_text_table(registry.dataframe()));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        if stdin.read_line(&mut line).is_err() {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => {
                print_help();
            }
            "quit" | "exit" => break,
            "show" => {
                println!("{}", render_df_as_text_table(registry.dataframe()));
            }
            "add" => {
                let id_s = parts.next();
                let unit_s = parts.next();
                let kind_s = parts.next();
                let value_s = parts.next();
                let name_parts: Vec<&str> = parts.collect();
                match (id_s, unit_s, kind_s, value_s, !name_parts.is_empty()) {
                    (Some(id_s), Some(unit_s), Some(kind_s), Some(value_s), true) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let unit = match UsageUnit::from_str(unit_s) {
                            Ok(u) => u,
                            Err(_) => {
                                println!("Invalid unit (HRS|CYC|DAYS)");
                                continue;
                            }
                        };
                        let kind = match DriverKind::from_str(kind_s) {
                            Ok(k) => k,
                            Err(_) => {
                                println!("Invalid driver kind (threshold|repeat)");
                                continue;
                            }
                        };
                        let value: f64 = match value_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid value");
                                continue;
                            }
                        };
                        let mut task = MaintenanceTask::new(id, name_parts.join(" "))
                            .with_driver(TaskDriver::new(unit, kind, value));
                        if kind == DriverKind::Repeat {
                            task = task.repetitive();
                        }
                        match registry.upsert_task_record(task) {
                            Ok(_) => {
                                println!("Task upserted.");
                                println!("{}", render_df_as_text_table(registry.dataframe()));
                            }
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => {
                        println!("Usage: add <id> <unit> <threshold|repeat> <value> <name...>");
                    }
                }
            }
            "driver" => {
                let id_s = parts.next();
                let unit_s = parts.next();
                let kind_s = parts.next();
                let value_s = parts.next();
                match (id_s, unit_s, kind_s, value_s) {
                    (Some(id_s), Some(unit_s), Some(kind_s), Some(value_s)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let unit = match UsageUnit::from_str(unit_s) {
                            Ok(u) => u,
                            Err(_) => {
                                println!("Invalid unit (HRS|CYC|DAYS)");
                                continue;
                            }
                        };
                        let kind = match DriverKind::from_str(kind_s) {
                            Ok(k) => k,
                            Err(_) => {
                                println!("Invalid driver kind (threshold|repeat)");
                                continue;
                            }
                        };
                        let value: f64 = match value_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid value");
                                continue;
                            }
                        };
                        let task = match registry.find_task(id) {
                            Ok(Some(task)) => task,
                            Ok(None) => {
                                println!("Task {id} not found.");
                                continue;
                            }
                            Err(e) => {
                                println!("Error: {}", e);
                                continue;
                            }
                        };
                        let mut task = task.with_driver(TaskDriver::new(unit, kind, value));
                        if kind == DriverKind::Repeat {
                            task.is_repetitive = true;
                        }
                        match registry.upsert_task_record(task) {
                            Ok(_) => {
                                println!("Driver added.");
                                println!("{}", render_df_as_text_table(registry.dataframe()));
                            }
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: driver <id> <unit> <threshold|repeat> <value>"),
                }
            }
            "delete" => {
                let id_s = parts.next();
                match id_s {
                    Some(id_s) => match id_s.parse::<i32>() {
                        Ok(id) => match registry.delete_task(id) {
                            Ok(true) => {
                                println!("Deleted task {id}.");
                                println!("{}", render_df_as_text_table(registry.dataframe()));
                            }
                            Ok(false) => println!("Task {id} not found."),
                            Err(e) => println!("Error deleting task: {}", e),
                        },
                        Err(_) => println!("Invalid id"),
                    },
                    None => println!("Usage: delete <id>"),
                }
            }
            "window" => {
                let id_s = parts.next();
                let val_s = parts.next();
                match (id_s, val_s) {
                    (Some(id_s), Some(val_s)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let val: f64 = match val_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid float");
                                continue;
                            }
                        };
                        match registry.set_window_pct(id, val) {
                            Ok(_) => println!(
                                "window_pct set.\n{}",
                                render_df_as_text_table(registry.dataframe())
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: window <id> <pct>"),
                }
            }
            "usage" | "comply" => {
                let id_s = parts.next();
                let hours_s = parts.next();
                let cycles_s = parts.next();
                let date_s = parts.next();
                match (id_s, hours_s, cycles_s, date_s) {
                    (Some(id_s), Some(hours_s), Some(cycles_s), Some(date_s)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let hours: f64 = match hours_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid hours");
                                continue;
                            }
                        };
                        let cycles: i64 = match cycles_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid cycles");
                                continue;
                            }
                        };
                        let date = match parse_date_arg(date_s) {
                            Some(d) => d,
                            None => {
                                println!("Invalid date (YYYY-MM-DD)");
                                continue;
                            }
                        };
                        let res = if cmd == "usage" {
                            registry.record_usage(id, hours, cycles, date)
                        } else {
                            registry.record_compliance(
                                id,
                                mx_tracker::ComplianceRecord {
                                    hours,
                                    cycles,
                                    date,
                                },
                            )
                        };
                        match res {
                            Ok(_) => println!(
                                "{} recorded.\n{}",
                                cmd,
                                render_df_as_text_table(registry.dataframe())
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: {} <id> <hours> <cycles> <YYYY-MM-DD>", cmd),
                }
            }
            "inservice" => {
                let id_s = parts.next();
                let date_s = parts.next();
                match (id_s, date_s) {
                    (Some(id_s), Some(date_s)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let date = match parse_date_arg(date_s) {
                            Some(d) => d,
                            None => {
                                println!("Invalid date (YYYY-MM-DD)");
                                continue;
                            }
                        };
                        match registry.set_in_service_date(id, date) {
                            Ok(_) => println!(
                                "in_service_date set.\n{}",
                                render_df_as_text_table(registry.dataframe())
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: inservice <id> <YYYY-MM-DD>"),
                }
            }
            "status" => {
                let id_s = parts.next();
                match id_s {
                    Some(id_s) => match id_s.parse::<i32>() {
                        Ok(id) => match registry.find_task(id) {
                            Ok(Some(task)) => match task.usage_snapshot() {
                                Some(usage) => match evaluator::next_due(&task, &usage) {
                                    Ok(estimate) => print_estimate(&task, &estimate),
                                    Err(e) => println!("Evaluation error: {}", e),
                                },
                                None => println!("Task {id} has no usage recorded."),
                            },
                            Ok(None) => println!("Task {id} not found."),
                            Err(e) => println!("Error: {}", e),
                        },
                        Err(_) => println!("Invalid id"),
                    },
                    None => println!("Usage: status <id>"),
                }
            }
            "watch" => match registry.watch_list() {
                Ok(flagged) => {
                    if flagged.is_empty() {
                        println!("Nothing on the watch list. Run 'compute' after recording usage.");
                    } else {
                        for task in flagged {
                            println!(
                                "  {:<5} {:<30} {:<9} due {}",
                                task.id,
                                task.name,
                                task.status.map(|s| s.as_str()).unwrap_or(""),
                                task.projected_due_date
                                    .map(|d| d.to_string())
                                    .unwrap_or_else(|| "-".to_string())
                            );
                        }
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            "sources" => print_source_types(),
            "source" => {
                let id_s = parts.next();
                let type_s = parts.next();
                let ref_s = parts.next();
                match (id_s, type_s) {
                    (Some(id_s), Some(type_s)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        match SourceType::from_str(type_s) {
                            Ok(source_type) => {
                                let source_ref = ref_s.map(ToOwned::to_owned);
                                match registry.set_source(id, source_type, source_ref) {
                                    Ok(_) => println!(
                                        "source set.\n{}",
                                        render_df_as_text_table(registry.dataframe())
                                    ),
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            Err(_) => {
                                println!(
                                    "Unknown source type '{}'. Use 'sources' to list options.",
                                    type_s
                                );
                            }
                        }
                    }
                    _ => println!("Usage: source <id> <type> [ref]"),
                }
            }
            "ata" => {
                let id_s = parts.next();
                let chapter = parts.next();
                match (id_s, chapter) {
                    (Some(id_s), Some(chapter)) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        match registry.set_ata_chapter(id, chapter) {
                            Ok(_) => println!(
                                "ata_chapter set.\n{}",
                                render_df_as_text_table(registry.dataframe())
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: ata <id> <chapter>"),
                }
            }
            "notes" => {
                let id_s = parts.next();
                let rest: Vec<&str> = parts.collect();
                match (id_s, !rest.is_empty()) {
                    (Some(id_s), true) => {
                        let id: i32 = match id_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid id");
                                continue;
                            }
                        };
                        let text = rest.join(" ");
                        match registry.set_task_notes(id, &text) {
                            Ok(_) => println!(
                                "task_notes set.\n{}",
                                render_df_as_text_table(registry.dataframe())
                            ),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: notes <id> <text...>"),
                }
            }
            "compute" => match registry.refresh() {
                Ok(summary) => {
                    println!(
                        "Refreshed ({})\n{}",
                        summary.to_cli_summary(),
                        render_df_as_text_table(registry.dataframe())
                    );
                }
                Err(e) => println!("Refresh error: {}", e),
            },
            "meta" => match parts.next() {
                Some("show") | None => print_metadata(&registry),
                Some("name") => {
                    let rest: Vec<&str> = parts.collect();
                    if rest.is_empty() {
                        println!("Usage: meta name <text...>");
                        continue;
                    }
                    let name = rest.join(" ");
                    registry.set_program_name(name);
                    println!("Program name updated.");
                    print_metadata(&registry);
                }
                Some("desc") => {
                    let rest: Vec<&str> = parts.collect();
                    if rest.is_empty() {
                        println!("Usage: meta desc <text...>");
                        continue;
                    }
                    let desc = rest.join(" ");
                    registry.set_program_description(desc);
                    println!("Program description updated.");
                    print_metadata(&registry);
                }
                Some("horizon") => {
                    let days_s = parts.next();
                    match days_s {
                        Some(days_s) => match days_s.parse::<i64>() {
                            Ok(days) => match registry.set_review_horizon_days(days) {
                                Ok(_) => {
                                    println!("Review horizon updated.");
                                    print_metadata(&registry);
                                }
                                Err(e) => println!("Metadata update error: {}", e),
                            },
                            Err(_) => println!("Invalid day count"),
                        },
                        None => println!("Usage: meta horizon <days>"),
                    }
                }
                Some(other) => {
                    println!("Unknown meta command '{}'.", other);
                    println!("Usage: meta show|name|desc|horizon ...");
                }
            },
            "save" => {
                let fmt = parts.next();
                let path = parts.next();
                match (fmt, path) {
                    (Some("json"), Some(path)) => match save_registry_to_json(&registry, path) {
                        Ok(_) => println!("Registry saved to {}.", path),
                        Err(e) => println!("Error saving registry: {}", e),
                    },
                    (Some("csv"), Some(path)) => match save_registry_to_csv(&registry, path) {
                        Ok(_) => println!("Registry saved to {}.", path),
                        Err(e) => println!("Error saving registry: {}", e),
                    },
                    _ => println!("Usage: save <json|csv> <path>"),
                }
            }
            "load" => {
                let fmt = parts.next();
                let path = parts.next();
                match (fmt, path) {
                    (Some("json"), Some(path)) => match load_registry_from_json(path) {
                        Ok(loaded) => {
                            registry = loaded;
                            if let Err(e) = registry.refresh() {
                                println!("Loaded registry but refresh failed: {}", e);
                            }
                            println!("Registry loaded from {}.", path);
                            println!("{}", render_df_as_text_table(registry.dataframe()));
                        }
                        Err(e) => println!("Error loading registry: {}", e),
                    },
                    (Some("csv"), Some(path)) => match load_registry_from_csv(path) {
                        Ok(mut loaded) => {
                            if let Err(e) = loaded.refresh() {
                                println!("Loaded registry but refresh failed: {}", e);
                            }
                            registry = loaded;
                            println!("Registry loaded from {}.", path);
                            println!("{}", render_df_as_text_table(registry.dataframe()));
                        }
                        Err(e) => println!("Error loading registry: {}", e),
                    },
                    _ => println!("Usage: load <json|csv> <path>"),
                }
            }
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
