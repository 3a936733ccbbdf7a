use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("jobscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("jobscout")
        .about("Finds careers pages for a list of companies and alerts on matching job titles")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Debug logging (overridden by RUST_LOG)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Config file (default: ~/.config/jobscout/config.toml)"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the jobscout config directory, a default config and an empty ledger")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the jobscout config directory")
                        .default_value("~/.config/jobscout/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config and ledger without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("run")
                .about(
                    "Scans the next batch of unprocessed companies from the roster and sends \
                alerts for matching job titles",
                )
                .arg(
                    arg!(-r --"roster" <PATH>)
                        .required(false)
                        .help("Company roster (.xlsx/.ods spreadsheet, CSV/TSV or one name per line; first column is the name)"),
                )
                .arg(
                    arg!(-n --"max-companies" <N>)
                        .required(false)
                        .help("Maximum companies to process this run")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-d --"delay" <SECONDS>)
                        .required(false)
                        .help("Pause between companies")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-l --"ledger" <PATH>)
                        .required(false)
                        .help("Ledger file (.json for a JSON ledger, anything else is SQLite)"),
                )
                .arg(
                    arg!(--"notifier" <KIND>)
                        .required(false)
                        .help("Where alerts go")
                        .value_parser(["telegram", "stdout", "console"]),
                )
                .arg(
                    arg!(--"no-header")
                        .required(false)
                        .help("The roster has no header row")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"recycle")
                        .required(false)
                        .help("Clear the ledger and start over once every company has been processed")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("probe")
                .about(
                    "Runs the scan for one company and prints the outcome. Does not touch the \
                ledger or send alerts.",
                )
                .arg(arg!(<COMPANY>).help("Company name, quoted if it has spaces"))
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("guess")
                .about("Prints the candidate domains for a company name (no network access)")
                .arg(arg!(<COMPANY>).help("Company name, quoted if it has spaces")),
        )
        .subcommand(
            command!("ledger")
                .about("Inspect and edit the progress ledger")
                .subcommand_required(true)
                .arg(
                    arg!(-l --"ledger" <PATH>)
                        .required(false)
                        .global(true)
                        .help("Ledger file (default from config)"),
                )
                .subcommand(
                    command!("list").about("List processed companies").arg(
                        arg!(-f --"format" <FORMAT>)
                            .required(false)
                            .help("Output format: text, json")
                            .value_parser(["text", "json"])
                            .default_value("text"),
                    ),
                )
                .subcommand(
                    command!("forget")
                        .about("Remove one company so the next run scans it again")
                        .arg(arg!(<COMPANY>).help("Company name as it appears in the roster")),
                )
                .subcommand(
                    command!("clear").about("Remove every entry").arg(
                        arg!(-f --"force")
                            .help("Do not ask for confirmation")
                            .required(false),
                    ),
                )
                .subcommand(
                    command!("retry-errors")
                        .about("Remove entries that ended in an error so the next run retries them"),
                )
                .subcommand(command!("runs").about("List recorded runs")),
        )
}
