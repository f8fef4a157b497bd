//! dleyna - print media servers, containers and objects known to the dLeyna daemon

use std::{error::Error, process};

use clap::Parser;
use dleyna_client::{
    cli::{Cli, formatting::format_error},
    config::ClientConfig,
    services::DleynaClient,
    tracing_config,
};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_config::init(if cli.debug { "debug" } else { "error" })?;

    let mut config = ClientConfig::load()?;
    cli.apply_to(&mut config);

    let client = DleynaClient::connect(&config)?;

    match cli.execute(&client, &config) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            drop(client);
            process::exit(1);
        }
    }
}
