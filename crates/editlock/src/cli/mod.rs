//! CLI command definitions using `clap`

pub mod handlers;

use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("editlock")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exclusive, time-bounded edit locks for shared records")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Extra config file applied after the project config"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("Lock database path (overrides config)"),
        )
        .subcommand(cmd_init())
        .subcommand(cmd_acquire())
        .subcommand(cmd_release())
        .subcommand(cmd_inspect())
        .subcommand(cmd_list())
        .subcommand(cmd_sweep())
        .subcommand(cmd_serve())
}

fn resource_arg() -> Arg {
    Arg::new("resource")
        .required(true)
        .value_parser(value_parser!(i64))
        .help("Resource (invoice) id")
}

fn owner_id_arg() -> Arg {
    Arg::new("owner-id")
        .long("owner-id")
        .required(true)
        .value_name("ID")
        .help("Id of the user taking or giving up the lock")
}

fn cmd_init() -> Command {
    Command::new("init").about("Create the lock table")
}

const ACQUIRE_EXIT_CODES: &str = "EXIT CODES:
  0  lock granted or extended
  3  locked by another user
  5  resource not found";

fn cmd_acquire() -> Command {
    Command::new("acquire")
        .about("Acquire or extend the edit lock on a resource")
        .arg(resource_arg())
        .arg(owner_id_arg())
        .arg(
            Arg::new("owner-name")
                .long("owner-name")
                .required(true)
                .value_name("NAME")
                .help("Display name reported to other users"),
        )
        .after_help(ACQUIRE_EXIT_CODES)
}

fn cmd_release() -> Command {
    Command::new("release")
        .about("Release an edit lock")
        .arg(resource_arg())
        .arg(owner_id_arg())
        .after_help("EXIT CODES:\n  0  released\n  3  nothing released")
}

fn cmd_inspect() -> Command {
    Command::new("inspect")
        .about("Show the live lock on a resource")
        .arg(resource_arg())
}

fn cmd_list() -> Command {
    Command::new("list").about("List all live locks")
}

fn cmd_sweep() -> Command {
    Command::new("sweep").about("Remove expired locks once")
}

fn cmd_serve() -> Command {
    Command::new("serve")
        .about("Run the expiry sweeper until interrupted")
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("Run the first sweep pass, then exit"),
        )
}
