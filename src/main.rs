use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use thmon::commands::{attach, demo};

fn main() -> Result<()> {
    let matches = Command::new("thmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Charts the CPU and user time of the threads of a process")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(demo::command())
        .subcommand(attach::command())
        .get_matches();

    thmon::init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("demo", sub_matches)) => demo::execute(sub_matches),
        Some(("attach", sub_matches)) => attach::execute(sub_matches),
        _ => {
            println!("Use 'thmon --help' for more information.");
            Ok(())
        }
    }
}
