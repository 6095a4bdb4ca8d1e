// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    let state_dir = Arg::new("state_dir")
        .long("state-dir")
        .value_name("DIR")
        .default_value("/var/lib/dpms")
        .help("State directory (database, metadata cache, staging, journal)");
    let root = Arg::new("root")
        .long("root")
        .value_name("DIR")
        .default_value("/")
        .help("Root under which package files are installed");
    let dry_run = Arg::new("dry_run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Show the plan without executing it");

    Command::new("dpms")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Package manager with dependency resolution and atomic transactions")
        .arg(state_dir)
        .arg(root)
        .subcommand(
            Command::new("init")
                .about("Initialize the state directory and database")
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .value_name("NAME=URL")
                        .action(ArgAction::Append)
                        .help("Repository to configure (repeatable)"),
                ),
        )
        .subcommand(Command::new("sync").about("Refresh repository metadata"))
        .subcommand(
            Command::new("install")
                .about("Install packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Package requirements, e.g. \"app\" or \"app >=2.0\""),
                )
                .arg(dry_run.clone()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Package names to remove"),
                )
                .arg(dry_run.clone()),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Upgrade explicitly installed packages to their newest versions")
                .arg(dry_run),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("search")
                .about("Search available packages by name or description")
                .arg(Arg::new("pattern").required(true).help("Substring pattern")),
        )
        .subcommand(
            Command::new("info")
                .about("Show details for a package")
                .arg(Arg::new("package").required(true).help("Package name")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("dpms.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
