//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rapidtree-bridged")]
#[command(version, about = "Rapid Spanning Tree bridge daemon", long_about = None)]
pub struct Cli {
    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge over the interfaces named in the configuration
    Run {
        /// Path to the bridge configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Parse and validate a configuration file, then exit
    CheckConfig {
        /// Path to the bridge configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Converge a demo ring topology in the simulator and print the
    /// resulting tree
    Simulate {
        /// Number of bridges in the ring
        #[arg(long, default_value_t = 3)]
        bridges: usize,

        /// Virtual seconds to simulate
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}
