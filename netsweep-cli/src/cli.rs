//! Application definition.

extern crate simplelog;

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Error, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use netsweep::{
    run_sweep, CancelToken, OutputMode, ParameterGenerator, ProcessInvoker, RoutingProtocol,
    SweepConfig, SweepReport, TaskStatus, CONFIG_FILE_NAME,
};

use self::simplelog::LevelFilter;
use crate::init;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");

/// Arguments shared by subcommands that work on a sweep configuration.
fn sweep_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("config")
            .value_name("config-path")
            .help("Path to the sweep config file (defaults to ./sweep.toml if present)"),
        Arg::with_name("workers")
            .long("workers")
            .short("w")
            .takes_value(true)
            .value_name("count")
            .help("Maximum number of simulations running at the same time"),
        Arg::with_name("name")
            .long("name")
            .short("n")
            .takes_value(true)
            .value_name("string")
            .help("Scenario name passed to every simulation"),
        Arg::with_name("node-counts")
            .long("node-counts")
            .takes_value(true)
            .value_name("list")
            .help("Comma separated list of node counts (e.g. 10,20,40)"),
        Arg::with_name("routing")
            .long("routing")
            .short("r")
            .takes_value(true)
            .value_name("protocol")
            .possible_values(&["aodv", "dsr", "olsr", "dsdv"])
            .help("Routing protocol used for every simulation"),
        Arg::with_name("topologies")
            .long("topologies")
            .short("t")
            .takes_value(true)
            .value_name("list")
            .help("Comma separated list of topologies (e.g. grid,disc)"),
        Arg::with_name("program")
            .long("program")
            .takes_value(true)
            .value_name("path")
            .help("Program started for every task. Drops configured prefix \
                   arguments and wrap target unless --arg or --wrap are also given"),
        Arg::with_name("arg")
            .long("arg")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .allow_hyphen_values(true)
            .value_name("arg")
            .help("Argument passed to the program before task parameters (repeatable)"),
        Arg::with_name("wrap")
            .long("wrap")
            .takes_value(true)
            .value_name("target")
            .conflicts_with("no-wrap")
            .help("Pass target and task parameters as one quoted argument"),
        Arg::with_name("no-wrap")
            .long("no-wrap")
            .help("Pass every task parameter as a separate argument"),
        Arg::with_name("working-dir")
            .long("working-dir")
            .short("C")
            .takes_value(true)
            .value_name("path")
            .help("Directory the program is started in"),
        Arg::with_name("timeout-ms")
            .long("timeout-ms")
            .takes_value(true)
            .value_name("millis")
            .help("Kill simulations running longer than this, 0 means no limit"),
        Arg::with_name("quiet")
            .long("quiet")
            .short("q")
            .help("Discard simulator output"),
    ]
}

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("netsweep")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .version(VERSION)
        .author(AUTHORS)
        .about("Run network simulation parameter sweeps on a bounded pool of workers.")
        .arg(Arg::with_name("verbosity")
            .long("verbosity")
            .short("v")
            .takes_value(true)
            .default_value("info")
            .value_name("verb")
            .global(true)
            .help("Set the verbosity of the log output"))

        // run subcommand
        .subcommand(SubCommand::with_name("run")
            .display_order(10)
            .about("Run every task of the sweep")
            .long_about("Run every task of the sweep.\n\n\
            Exits with a non-zero status if any task failed or was skipped. \n\
            Ctrl-C stops starting new tasks and kills the running ones.")
            .args(&sweep_args())
            .arg(Arg::with_name("report")
                .long("report")
                .takes_value(true)
                .value_name("path")
                .help("Write per-task outcomes to a toml file")))

        // plan subcommand
        .subcommand(SubCommand::with_name("plan")
            .display_order(11)
            .about("Print the tasks and their command lines without running them")
            .args(&sweep_args())
            .arg(Arg::with_name("config-only")
                .long("config-only")
                .help("Print the effective configuration as toml instead")))

        // new subcommand
        .subcommand(SubCommand::with_name("new")
            .display_order(20)
            .about("Create a new sweep config file with default settings")
            .arg(Arg::with_name("path")
                .value_name("path")
                .default_value(CONFIG_FILE_NAME)))
}

pub fn app_matches() -> ArgMatches<'static> {
    app().get_matches()
}

/// Runs based on specified subcommand.
pub fn start(matches: ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("run", Some(m)) => start_run(m),
        ("plan", Some(m)) => start_plan(m),
        ("new", Some(m)) => start_new(m),
        _ => Ok(()),
    }
}

fn start_run(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches);
    let config = load_config(matches)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, cancelling sweep");
        handler_token.cancel();
    })
    .context("failed setting Ctrl-C handler")?;

    let report = run_sweep(&config, cancel)?;
    print_summary(&config, &report);

    if let Some(path) = matches.value_of("report") {
        report
            .write_toml(path)
            .with_context(|| format!("failed writing report to {}", path))?;
        println!("report written to {}", path);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(Error::msg(format!(
            "{} of {} tasks failed, {} skipped",
            report.failed(),
            report.total(),
            report.skipped()
        )))
    }
}

fn start_plan(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches);
    let config = load_config(matches)?;

    if matches.is_present("config-only") {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let generator = ParameterGenerator::new(&config.sweep);
    let invoker = ProcessInvoker::new(config.launcher.clone(), CancelToken::new());
    println!(
        "sweep \"{}\": {} tasks, {} workers",
        config.sweep.name,
        generator.len(),
        config.sweep.workers
    );
    for task in generator.iter() {
        println!("{}", invoker.render_command(&task)?);
    }
    Ok(())
}

fn start_new(matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of("path").unwrap_or(CONFIG_FILE_NAME);
    init::write_template(Path::new(path))?;
    println!("created new sweep config at {}", path);
    Ok(())
}

/// Reads the config file, if any, and applies command line overrides on top.
fn load_config(matches: &ArgMatches) -> Result<SweepConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => SweepConfig::from_path(path)
            .with_context(|| format!("failed loading sweep config from {}", path))?,
        None => {
            let default_path = PathBuf::from(CONFIG_FILE_NAME);
            if default_path.is_file() {
                info!("using sweep config at {}", default_path.display());
                SweepConfig::from_path(&default_path)?
            } else {
                debug!("no sweep config found, using defaults");
                SweepConfig::default()
            }
        }
    };
    apply_overrides(&mut config, matches)?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut SweepConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(workers) = matches.value_of("workers") {
        config.sweep.workers = workers
            .parse()
            .with_context(|| format!("invalid worker count: {}", workers))?;
    }
    if let Some(name) = matches.value_of("name") {
        config.sweep.name = name.to_string();
    }
    if let Some(list) = matches.value_of("node-counts") {
        config.sweep.node_counts = parse_list(list).context("invalid node count list")?;
    }
    if let Some(routing) = matches.value_of("routing") {
        config.sweep.routing = RoutingProtocol::from_str(routing)?;
    }
    if let Some(list) = matches.value_of("topologies") {
        config.sweep.topologies = parse_list(list).context("invalid topology list")?;
    }

    let launcher = &mut config.launcher;
    let prefix_args = matches
        .values_of("arg")
        .map(|values| values.map(|s| s.to_string()).collect::<Vec<_>>());
    if let Some(program) = matches.value_of("program") {
        launcher.program = program.to_string();
        launcher.prefix_args = prefix_args.unwrap_or_default();
        launcher.wrap = None;
    } else if let Some(prefix_args) = prefix_args {
        launcher.prefix_args = prefix_args;
    }
    if let Some(target) = matches.value_of("wrap") {
        launcher.wrap = Some(target.to_string());
    }
    if matches.is_present("no-wrap") {
        launcher.wrap = None;
    }
    if let Some(dir) = matches.value_of("working-dir") {
        launcher.working_dir = Some(PathBuf::from(dir));
    }
    if let Some(millis) = matches.value_of("timeout-ms") {
        launcher.timeout_ms = Some(
            millis
                .parse()
                .with_context(|| format!("invalid timeout: {}", millis))?,
        );
    }
    if matches.is_present("quiet") {
        launcher.output = OutputMode::Null;
    }
    Ok(())
}

/// Parses a comma separated list, ignoring whitespace around the items.
fn parse_list<T>(list: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    list.split(',')
        .map(|item| {
            item.trim()
                .parse::<T>()
                .map_err(|e| Error::msg(format!("{:?}: {}", item.trim(), e)))
        })
        .collect()
}

fn print_summary(config: &SweepConfig, report: &SweepReport) {
    println!(
        "\nsweep \"{}\" finished in {:.2?} (peak {} of {} workers busy)",
        config.sweep.name, report.elapsed, report.peak_in_flight, report.workers
    );
    println!(
        "total={} succeeded={} failed={} skipped={}",
        report.total(),
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
    for outcome in &report.outcomes {
        match &outcome.status {
            TaskStatus::Succeeded => (),
            TaskStatus::Failed(e) => {
                println!("  {} {}: {}", "failed".red(), outcome.task.label(), e)
            }
            TaskStatus::Skipped => {
                println!("  {} {}", "skipped".yellow(), outcome.task.label())
            }
        }
    }
    if report.is_success() {
        println!("{}", "all tasks succeeded".green());
    }
}

fn setup_log_verbosity(matches: &ArgMatches) {
    let level_filter = match matches.value_of("verbosity") {
        Some(s) => match s {
            "0" | "none" => LevelFilter::Off,
            "1" | "err" | "error" | "min" => LevelFilter::Error,
            "2" | "warn" | "warning" | "default" => LevelFilter::Warn,
            "3" | "info" => LevelFilter::Info,
            "4" | "debug" => LevelFilter::Debug,
            "5" | "trace" | "max" | "all" => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        },
        _ => LevelFilter::Warn,
    };
    let mut config_builder = simplelog::ConfigBuilder::new();
    let logger_conf = config_builder
        .set_time_level(LevelFilter::Error)
        .set_target_level(LevelFilter::Debug)
        .set_location_level(LevelFilter::Trace)
        .set_thread_level(LevelFilter::Debug)
        .set_time_format_str("%H:%M:%S%.6f")
        .build();
    if let Err(e) = init_logger(level_filter, logger_conf) {
        eprintln!("failed setting up logger: {}", e);
    }
}

/// Installs a terminal logger, falling back to plain output when no
/// terminal is available, e.g. when output is piped.
fn init_logger(
    level_filter: LevelFilter,
    config: simplelog::Config,
) -> std::result::Result<(), log::SetLoggerError> {
    use self::simplelog::{SimpleLogger, TermLogger};
    match TermLogger::init(level_filter, config.clone(), simplelog::TerminalMode::Mixed) {
        Ok(()) => Ok(()),
        Err(_) => SimpleLogger::init(level_filter, config),
    }
}
