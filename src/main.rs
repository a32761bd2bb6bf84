//! burrow - list and select files through the navigation engine

use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use burrow::config::{self, Config};
use burrow::entity::Entity;
use burrow::errors::NavResult;
use burrow::providers::{ALL_PROVIDERS, LocalProvider, ProviderRegistry, RecentProvider, VfsProvider};
use burrow::selection::OperationMode;
use burrow::{FileController, NavigationSession, OperationRequest, cli, logging};

fn main() {
    let matches = cli::parse_flags();

    if matches.is_present("debug") {
        logging::init_tracing_verbose();
    } else {
        logging::init_tracing();
    }

    if let Err(e) = run(&matches) {
        eprintln!("burrow: {}", e);
        std::process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches<'_>) -> NavResult<()> {
    let config = match matches.value_of("config") {
        Some(path) => Config::load_from(Path::new(path)),
        None => Config::load(),
    };

    let recents = Arc::new(RecentProvider::new(config::recents_file(), config.general.recent_limit));
    let registry = ProviderRegistry::new()
        .with(Arc::new(LocalProvider::new()))
        .with(Arc::new(VfsProvider::from_config(&config.connections)))
        .with(recents.clone());
    let controller = Arc::new(FileController::new(registry));

    match matches.subcommand() {
        ("recent", _) => {
            for entry in recents.entries() {
                println!("{:<12} {:<10} {}", opened(entry.opened_at), entry.provider, entry.path);
            }
            Ok(())
        }
        ("providers", _) => {
            for tree in controller.load(ALL_PROVIDERS)? {
                println!("{} ({})", tree.name, tree.provider);
                for child in &tree.children {
                    println!("  {}", child.match_path());
                }
            }
            Ok(())
        }
        _ => list(matches, controller, config, recents),
    }
}

fn list(
    matches: &clap::ArgMatches<'_>,
    controller: Arc<FileController>,
    config: Config,
    recents: Arc<RecentProvider>,
) -> NavResult<()> {
    let command = match matches.value_of("mode") {
        Some(mode) => mode.parse::<OperationMode>()?,
        None => OperationMode::Open,
    };
    // without PATH the remembered location wins over the working directory
    let remembered = config.general.remember_path && config.general.last_path.is_some();
    let initial_path = match matches.value_of("PATH") {
        Some(path) => Some(path.to_string()),
        None if remembered => None,
        None => std::env::current_dir().ok().map(|p| p.to_string_lossy().into_owned()),
    };
    let request = OperationRequest {
        command,
        initial_path,
        provider: matches.value_of("provider").map(str::to_string),
        default_filter: matches.value_of("filter").map(str::to_string),
        ..OperationRequest::default()
    };

    let mut session = NavigationSession::new(controller, config, request).with_recents(recents);
    session.open()?;

    let listing = match matches.value_of("search") {
        Some(query) => session.search(query)?,
        None => session.current_listing()?,
    };
    for entity in listing.iter() {
        println!("{}", format_entry(entity));
    }

    let details = session.details();
    if let Some(path) = &details.path {
        eprintln!(
            "{} {} -> {}{}",
            session.selection().mode(),
            path,
            details.name.as_deref().unwrap_or("-"),
            if session.can_confirm() { "" } else { " (incomplete)" }
        );
    }

    if matches.is_present("confirm") {
        let result = session.confirm()?;
        let path = result.details.path.unwrap_or_default();
        match result.details.name {
            Some(name) if !path.ends_with(&name) => println!("{} {}", path, name),
            _ => println!("{}", path),
        }
    }
    Ok(())
}

fn format_entry(entity: &Entity) -> String {
    let marker = if entity.is_dir() { 'd' } else { '-' };
    let size = entity.size.map(|s| s.to_string()).unwrap_or_default();
    format!("{} {:>12} {}", marker, size, entity.name)
}

/// Seconds since the epoch as days ago, for a compact column
fn opened(secs: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(secs);
    match now.saturating_sub(secs) / 86_400 {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        days => format!("{} days ago", days),
    }
}
