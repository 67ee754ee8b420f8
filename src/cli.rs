use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use ticklist::config::TicklistConfig;
use ticklist::core::timestamp::parse_due_input;
use ticklist::core::todo::{CreateTodoInput, Todo, TodoFilter, TodoPatch, TodoPriority, TodoStatus};
use ticklist::view_model::{ListState, TodoListViewModel};

#[derive(Debug, Parser)]
#[command(name = "ticklist", version, about = "A local to-do list")]
pub struct Cli {
    /// Database file to use instead of the configured one.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file to read.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show todos, newest first.
    List {
        #[arg(long, value_parser = parse_filter, default_value = "all")]
        filter: TodoFilter,
        /// Match titles and descriptions instead of filtering by status.
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        id: i64,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TodoPriority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
    },
    /// Change some fields. An empty --description or --category clears it.
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TodoPriority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long, value_parser = parse_status)]
        status: Option<TodoStatus>,
    },
    /// Flip between pending and completed.
    Toggle {
        id: i64,
    },
    Reschedule {
        id: i64,
        #[arg(value_parser = parse_due)]
        due: DateTime<Utc>,
    },
    /// Delete a todo after asking for confirmation.
    Delete {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the suggested categories.
    Categories,
}

impl Command {
    /// List criteria to apply before the first load.
    pub fn criteria(&self) -> (TodoFilter, Option<&str>) {
        match self {
            Self::List { filter, search } => (*filter, search.as_deref()),
            _ => (TodoFilter::All, None),
        }
    }
}

fn parse_filter(s: &str) -> Result<TodoFilter, String> {
    TodoFilter::parse(s).ok_or_else(|| format!("unknown filter {s:?} (all, active, completed)"))
}

fn parse_priority(s: &str) -> Result<TodoPriority, String> {
    TodoPriority::parse(s).ok_or_else(|| format!("unknown priority {s:?} (low, medium, high)"))
}

fn parse_status(s: &str) -> Result<TodoStatus, String> {
    TodoStatus::parse(s).ok_or_else(|| format!("unknown status {s:?} (pending, completed)"))
}

fn parse_due(s: &str) -> Result<DateTime<Utc>, String> {
    parse_due_input(s).ok_or_else(|| format!("cannot read {s:?} as a date (try 2026-03-01 or 2026-03-01T09:30)"))
}

pub async fn run(
    command: Command,
    vm: &TodoListViewModel,
    config: &TicklistConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::List { .. } => print_list(&vm.snapshot()),
        Command::Show { id } => match vm.get(id).await? {
            Some(todo) => print_detail(&todo),
            None => println!("No todo with id {}", id),
        },
        Command::Add { title, description, priority, category, due } => {
            let input = create_input(title, description, priority, category, due);
            if let Some(ref c) = input.category {
                if !config.is_suggested_category(c) {
                    println!("Note: {:?} is not one of the suggested categories", c);
                }
            }
            let todo = vm.create(input).await?;
            println!("Added #{}", todo.id);
            print_list(&vm.snapshot());
        }
        Command::Edit { id, title, description, priority, category, due, clear_due, status } => {
            let patch = TodoPatch {
                title: title.map(tidy),
                description: description.map(|d| Some(tidy(d))),
                status,
                priority,
                category: category.map(|c| Some(tidy(c))),
                due_date: if clear_due { Some(None) } else { due.map(Some) },
            };
            let todo = vm.update(id, patch).await?;
            print_detail(&todo);
        }
        Command::Toggle { id } => {
            let todo = vm.toggle(id).await?;
            println!("#{} is now {}", todo.id, todo.status.as_str());
            print_list(&vm.snapshot());
        }
        Command::Reschedule { id, due } => {
            let todo = vm.reschedule(id, due).await?;
            println!("#{} is now due {}", todo.id, format_due(due));
        }
        Command::Delete { id, yes } => {
            let Some(todo) = vm.get(id).await? else {
                println!("No todo with id {}", id);
                return Ok(());
            };
            if !yes {
                let prompt = format!("Delete #{} {:?}?", todo.id, todo.title);
                if !confirm(&prompt, &mut std::io::stdin().lock(), &mut std::io::stdout())? {
                    println!("Kept #{}", id);
                    return Ok(());
                }
            }
            vm.delete(id).await?;
            println!("Deleted #{}", id);
            print_list(&vm.snapshot());
        }
        Command::Categories => {
            for category in &config.categories {
                println!("{}", category);
            }
        }
    }

    if let Some(error) = vm.snapshot().error {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

fn tidy(s: String) -> String {
    s.trim().to_string()
}

/// Build a create input with surrounding whitespace stripped from the text fields.
fn create_input(
    title: String,
    description: Option<String>,
    priority: Option<TodoPriority>,
    category: Option<String>,
    due: Option<DateTime<Utc>>,
) -> CreateTodoInput {
    CreateTodoInput {
        title: tidy(title),
        description: description.map(tidy),
        priority,
        category: category.map(tidy),
        due_date: due,
    }
}

/// Ask a yes/no question. Anything but `y` or `yes` is a no, and so is end of input.
fn confirm(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> std::io::Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn format_due(due: DateTime<Utc>) -> String {
    due.format("%Y-%m-%d %H:%M").to_string()
}

fn todo_line(todo: &Todo, now: DateTime<Utc>) -> String {
    let check = if todo.status.is_completed() { "[x]" } else { "[ ]" };
    let mut line = format!("{} #{:<4} {:<6} {}", check, todo.id, todo.priority.as_str(), todo.title);
    if let Some(ref category) = todo.category {
        line.push_str(&format!("  ({})", category));
    }
    if let Some(due) = todo.due_date {
        line.push_str(&format!("  due {}", format_due(due)));
    }
    if todo.is_overdue(now) {
        line.push_str("  OVERDUE");
    }
    line
}

fn print_list(state: &ListState) {
    println!("{} active, {} completed", state.counts.active, state.counts.completed);
    if !state.search_term.trim().is_empty() {
        println!("Search: {:?}", state.search_term);
    } else if state.filter != TodoFilter::All {
        println!("Filter: {}", state.filter.as_str());
    }

    if state.todos.is_empty() {
        println!("  (nothing here)");
        return;
    }
    let now = Utc::now();
    for todo in &state.todos {
        println!("{}", todo_line(todo, now));
    }
}

fn print_detail(todo: &Todo) {
    println!("#{} {}", todo.id, todo.title);
    println!("  status:   {}", todo.status.as_str());
    println!("  priority: {}", todo.priority.as_str());
    if let Some(ref description) = todo.description {
        println!("  notes:    {}", description);
    }
    if let Some(ref category) = todo.category {
        println!("  category: {}", category);
    }
    if let Some(due) = todo.due_date {
        let flag = if todo.is_overdue(Utc::now()) { " (overdue)" } else { "" };
        println!("  due:      {}{}", format_due(due), flag);
    }
    println!("  created:  {}", todo.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  updated:  {}", todo.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
