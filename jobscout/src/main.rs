use colored::Colorize;
use jobscout::command_argument_builder;
use jobscout::handlers::*;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("run", primary_command)) => handle_run(primary_command).await,
        Some(("probe", primary_command)) => handle_probe(primary_command).await,
        Some(("guess", primary_command)) => handle_guess(primary_command),
        Some(("ledger", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_ledger_list(secondary_command),
            Some(("forget", secondary_command)) => handle_ledger_forget(secondary_command),
            Some(("clear", secondary_command)) => handle_ledger_clear(secondary_command),
            Some(("retry-errors", secondary_command)) => {
                handle_ledger_retry_errors(secondary_command)
            }
            Some(("runs", secondary_command)) => handle_ledger_runs(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
