use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use selfmon::commands;
use selfmon::core::self_monitor::SamplingMode;

fn interval_arg() -> Arg {
    Arg::new("interval")
        .short('i')
        .long("interval")
        .value_name("MS")
        .help("Push interval in milliseconds")
        .value_parser(value_parser!(u64).range(1..))
}

fn sampling_arg() -> Arg {
    Arg::new("sampling")
        .long("sampling")
        .value_name("MODE")
        .help("CPU sampling mode: shared or per-subscriber")
        .value_parser(value_parser!(SamplingMode))
}

fn main() -> Result<()> {
    let matches = Command::new("selfmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Self-monitoring metrics server with live snapshot streaming")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve metrics over HTTP and stream snapshots to subscribers")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Address to bind (defaults to the configured host)"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Port to bind (defaults to the configured port)")
                        .value_parser(value_parser!(u16).range(1..)),
                )
                .arg(interval_arg())
                .arg(sampling_arg()),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Print a single metrics snapshot as JSON")
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .help("Pretty-print the JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Subscribe to the snapshot stream and print each push")
                .arg(interval_arg())
                .arg(sampling_arg())
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("N")
                        .help("Stop after N snapshots")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print raw JSON instead of a summary line")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration (use 'selfmon config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Show the effective configuration"))
                .subcommand(Command::new("path").about("Show the configuration file path"))
                .subcommand(
                    Command::new("init")
                        .about("Write a default configuration file")
                        .arg(
                            Arg::new("force")
                                .short('f')
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
        .get_matches();

    selfmon::init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("serve", sub_matches)) => commands::serve::execute(sub_matches)?,
        Some(("snapshot", sub_matches)) => commands::snapshot::execute(sub_matches)?,
        Some(("watch", sub_matches)) => commands::watch::execute(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::execute(sub_matches)?,
        Some(("version", _)) => commands::version()?,
        _ => {
            println!("Welcome to selfmon!");
            println!("Use 'selfmon --help' for more information.");
        }
    }

    Ok(())
}
