use std::sync::Arc;

use clap::Parser;
use log::Log;

mod cli;

use cli::{Cli, Command};
use ticklist::config::TicklistConfig;
use ticklist::store::TodoStore;
use ticklist::view_model::TodoListViewModel;

/// Journal logger that keeps ticklist at info (debug when toggled) and
/// everything else at warn.
struct FilteredJournal {
    inner: systemd_journal_logger::JournalLog,
}

impl log::Log for FilteredJournal {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if metadata.target().starts_with("ticklist") {
            let max = if ticklist::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            metadata.level() <= max
        } else {
            metadata.level() <= log::LevelFilter::Warn
        }
    }
    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }
    fn flush(&self) {
        self.inner.flush();
    }
}

fn install_logger(debug: bool) {
    ticklist::set_debug_logging(debug);

    // Read with `journalctl --user -t ticklist -f`. Without a journal the CLI
    // runs silently.
    if let Ok(journal) = systemd_journal_logger::JournalLog::new() {
        let journal = journal.with_syslog_identifier("ticklist".to_string());
        if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
            // Global max must be Debug so debug records reach the filter when toggled
            log::set_max_level(log::LevelFilter::Debug);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let config_path = args.config.clone().unwrap_or_else(TicklistConfig::default_path);
    // Logger first so a bad config file is reported; the config can still
    // raise the level afterwards.
    install_logger(args.debug);
    let config = TicklistConfig::load(&config_path);
    ticklist::set_debug_logging(args.debug || config.debug_logging);

    let command = args.command.unwrap_or(Command::List {
        filter: Default::default(),
        search: None,
    });

    let db_path = args.db.unwrap_or_else(|| config.database_path.clone());
    let store = Arc::new(TodoStore::open(&db_path));
    let vm = TodoListViewModel::new(store);

    let (filter, search) = command.criteria();
    vm.set_filter(filter).await?;
    if let Some(term) = search {
        vm.set_search_term(term).await?;
    }
    vm.activate().await?;

    cli::run(command, &vm, &config).await
}
