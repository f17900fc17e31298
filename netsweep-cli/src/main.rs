//! Command line program for running `netsweep` simulation sweeps.

#[macro_use]
extern crate log;

extern crate anyhow;
extern crate clap;
extern crate colored;

extern crate netsweep_core as netsweep;

pub mod cli;
pub mod init;

use colored::*;

fn main() {
    // Run the program based on user input
    match cli::start(cli::app_matches()) {
        Ok(_) => (),
        Err(e) => {
            eprintln!("{}{}", "error: ".red(), e);
            if e.root_cause().to_string() != e.to_string() {
                eprintln!("Caused by:\n{}", e.root_cause())
            }
            std::process::exit(1);
        }
    }
}
