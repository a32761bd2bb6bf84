//! Command-line flags of the `burrow` binary

pub fn parse_flags<'a>() -> clap::ArgMatches<'a> {
    clap::App::new("burrow")
        .version(clap::crate_version!())
        .about("Browse local, VFS and recent files through one navigation model")
        .arg(clap::Arg::from_usage("-d --debug 'Enable debug output'").global(true))
        .arg(clap::Arg::from_usage("-c, --config [file] 'Configuration file to use instead of the default one'").global(true))
        .arg(clap::Arg::from_usage("-p, --provider [provider] 'Provider to resolve PATH in (local, vfs, ...)'"))
        .arg(clap::Arg::from_usage("-f, --filter [filter] 'Filter id applied to the listing (TXT, CSV, ...)'"))
        .arg(clap::Arg::from_usage("-s, --search [query] 'Only show names containing the query'"))
        .arg(
            clap::Arg::from_usage("-m, --mode [mode] 'Operation mode used to report the selection'")
                .possible_values(&[
                    "open",
                    "selectFile",
                    "selectFolder",
                    "selectFileFolder",
                    "save",
                    "saveTo",
                    "saveToFileFolder",
                ]),
        )
        .arg(clap::Arg::from_usage("-y, --confirm 'Confirm the selection: remember it and print the result'"))
        .arg(clap::Arg::from_usage("[PATH] 'Path to list; a file path selects that file'"))
        .subcommand(clap::SubCommand::with_name("recent").about("Show recently opened files"))
        .subcommand(clap::SubCommand::with_name("providers").about("Show registered providers and their top level"))
        .get_matches()
}
