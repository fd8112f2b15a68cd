//! # Voucher Node
//!
//! ## Startup Sequence
//!
//! 1. Parse flags
//! 2. Load `NodeConfig` from the environment, apply flag overrides
//! 3. Initialise logging
//! 4. Lock the data directory and open the storage backend
//! 5. Run the subcommand and print its JSON result
//!
//! Exit codes: 0 on success, 1 when the engine rejects the command (the
//! JSON error body is still printed), 2 when the node cannot start.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

use voucher_node::cli::Cli;
use voucher_node::commands;
use voucher_node::{NodeConfig, NodeContainer};

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = NodeConfig::from_env().context("loading configuration")?;
    cli.global.apply(&mut config);
    config.validate().context("validating configuration")?;

    voucher_node::telemetry::init(&config.log_level, config.json_logs)?;
    debug!(?config, "[node] configuration loaded");

    let node = NodeContainer::open(config).context("starting node")?;
    let caller = cli.global.caller();

    match commands::execute(&cli.command, &caller, node.service()) {
        Ok(value) => {
            println!("{}", commands::render(&value, cli.global.compact));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "[node] command failed");
            println!("{}", commands::render(&e.to_json(), cli.global.compact));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("voucher-node: {:#}", e);
            ExitCode::from(2)
        }
    }
}
