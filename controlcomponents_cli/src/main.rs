use clap::{App, Arg, SubCommand};
use log::LevelFilter;
use num_enum::TryFromPrimitive;
use std::convert::TryFrom;

mod command_e2e;
mod command_keygen;

#[derive(TryFromPrimitive, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl Verbosity {
    fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::Off,
            Verbosity::Error => LevelFilter::Error,
            Verbosity::Warn => LevelFilter::Warn,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

fn main() {
    let matches = App::new("ControlComponents CLI")
        .version("0.1")
        .about("Runs return-codes control components and the mix-decrypt pipeline")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Silence all logging"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate a node's signing key and GenKeysCCR key material")
                .arg(
                    Arg::with_name("phi")
                        .long("phi")
                        .takes_value(true)
                        .help("Width of the choice return codes key, defaults to CC_PHI or 120"),
                ),
        )
        .subcommand(
            SubCommand::with_name("e2e")
                .about("Run a complete four node election in memory")
                .arg(
                    Arg::with_name("voters")
                        .long("voters")
                        .takes_value(true)
                        .default_value("3")
                        .help("Number of voters"),
                ),
        )
        .get_matches();

    let verbosity = if matches.is_present("quiet") {
        Verbosity::Silent
    } else {
        let level = 2 + matches.occurrences_of("v").min(2) as u8;
        Verbosity::try_from(level).unwrap_or(Verbosity::Debug)
    };
    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .init();

    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen::command_keygen(matches);
    } else if let Some(matches) = matches.subcommand_matches("e2e") {
        command_e2e::command_e2e(matches, verbosity);
    } else {
        eprintln!("controlcomponents: a subcommand is required, see --help");
        std::process::exit(1);
    }
}
