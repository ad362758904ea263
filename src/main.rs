mod config;
mod error;
mod store;
mod task;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use error::TodoError;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use store::{ListQuery, SortKey, Stats, Store};
use task::{parse_due_date, NewTask, Priority, TaskPatch};

const RULE_WIDTH: usize = 50;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Command-line todo list manager with priorities, due dates and categories")]
#[command(after_help = "Examples:
  todo add \"Buy groceries\" --priority high --due 2025-12-25 --category shopping
  todo list --category work --priority high
  todo done 1
  todo stats")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Task file (defaults to $TODO_FILE, then ./todos.json)
    #[arg(long, global = true)]
    file: Option<PathBuf>,
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        title: String,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: String,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short, long, default_value = "general")]
        category: String,
    },
    /// Change fields of a task
    Edit {
        id: u64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        clear_category: bool,
    },
    /// Delete a task
    Delete { id: u64 },
    /// Mark a task as completed
    Done { id: u64 },
    /// Mark a task as not completed
    Undo { id: u64 },
    /// List tasks (pending only unless --all or --done)
    List {
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
        /// Only completed tasks
        #[arg(long, conflicts_with = "all")]
        done: bool,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,
    },
    /// Show task statistics
    Stats,
    /// Remove all completed tasks
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Due,
    Priority,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Due => SortKey::Due,
            SortArg::Priority => SortKey::Priority,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("✗ {}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<TodoError>().map_or(1, TodoError::exit_code)
}

/// Loads the store, applies one command, persists mutations and renders the
/// result to `out`. Read-only commands return before the save.
fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let path = config::store_path(cli.file)?;
    log::debug!("using task file {}", path.display());
    let mut store = Store::load(&path)?;

    let message = match cli.command {
        Commands::List { all, done, category, priority, sort } => {
            let query = ListQuery {
                category,
                priority: priority.as_deref().map(str::parse::<Priority>).transpose()?,
                done: if done { Some(true) } else if all { None } else { Some(false) },
                sort: sort.map(SortKey::from),
            };
            let heading = if done {
                "TODO LIST (completed only)"
            } else if all {
                "TODO LIST (including completed)"
            } else {
                "TODO LIST"
            };
            return render_list(out, &store, &query, heading);
        }
        Commands::Stats => return render_stats(out, &store.stats()),
        Commands::Add { title, priority, due, category } => {
            let new = NewTask {
                title,
                priority: priority.parse()?,
                due_date: due.as_deref().map(parse_due_date).transpose()?,
                category: Some(category),
            };
            format!("✓ Added: {}", store.add(new)?)
        }
        Commands::Edit { id, title, priority, due, category, clear_due, clear_category } => {
            let patch = TaskPatch {
                title,
                priority: priority.as_deref().map(str::parse::<Priority>).transpose()?,
                due_date: if clear_due {
                    Some(None)
                } else {
                    due.as_deref().map(parse_due_date).transpose()?.map(Some)
                },
                category: if clear_category { Some(None) } else { category.map(Some) },
            };
            format!("✓ Updated: {}", store.edit(id, patch)?)
        }
        Commands::Delete { id } => format!("✓ Deleted: {}", store.delete(id)?),
        Commands::Done { id } => {
            store.mark_done(id)?;
            format!("✓ Marked todo #{} as completed", id)
        }
        Commands::Undo { id } => {
            store.mark_undone(id)?;
            format!("✓ Marked todo #{} as not completed", id)
        }
        Commands::Clear => format!("✓ Cleared {} completed todo(s)", store.clear_completed()),
    };

    // Only mutating commands reach this point.
    store.save(&path)?;
    writeln!(out, "{}", message)?;
    Ok(())
}

fn render_list<W: Write>(out: &mut W, store: &Store, query: &ListQuery, heading: &str) -> Result<()> {
    let tasks = store.list(query);
    if tasks.is_empty() {
        let mut filters = Vec::new();
        if let Some(category) = &query.category {
            filters.push(format!("category='{}'", category));
        }
        if let Some(priority) = query.priority {
            filters.push(format!("priority='{}'", priority));
        }
        if filters.is_empty() {
            writeln!(out, "No todos found.")?;
        } else {
            writeln!(out, "No todos found ({}).", filters.join(", "))?;
        }
        return Ok(());
    }

    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{}", rule)?;
    writeln!(out, "{}", heading)?;
    writeln!(out, "{}", rule)?;
    for task in &tasks {
        writeln!(out, "{}", task)?;
    }
    writeln!(out, "{}", rule)?;
    writeln!(out, "Showing {} item(s)", tasks.len())?;
    Ok(())
}

fn render_stats<W: Write>(out: &mut W, stats: &Stats) -> Result<()> {
    let rule = "=".repeat(40);
    writeln!(out, "{}", rule)?;
    writeln!(out, "TODO STATISTICS")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Total todos:    {}", stats.total)?;
    writeln!(out, "Completed:      {}", stats.done)?;
    writeln!(out, "Pending:        {}", stats.pending)?;
    writeln!(out)?;
    writeln!(out, "By Priority (pending):")?;
    for (priority, count) in &stats.by_priority {
        writeln!(out, "{} {}: {}", priority.glyph(), priority, count)?;
    }
    if !stats.by_category.is_empty() {
        writeln!(out)?;
        writeln!(out, "By Category (pending):")?;
        for (category, count) in &stats.by_category {
            writeln!(out, "• {}: {}", category, count)?;
        }
    }
    writeln!(out, "{}", rule)?;
    Ok(())
}
