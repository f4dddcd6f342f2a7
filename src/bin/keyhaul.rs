use clap::{CommandFactory, Parser};
use tracing::{debug, error};

use keyhaul::config::{ConfigError, HostPort, Options};
use keyhaul::endpoint::{Endpoint, RedisEndpoint};
use keyhaul::migrate::{self, MigrateOptions};
use keyhaul::transfer::TransferOutcome;
use keyhaul::Error;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let options = Options::parse();

    if let Err(e) = options.validate() {
        if e == ConfigError::NoAction {
            let _ = Options::command().print_help();
        } else {
            eprintln!("{e}");
        }
        std::process::exit(2);
    }

    let source_addrs = match options.source_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let destination_addrs = if options.copy_data {
        match options.destination_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        }
    } else {
        Vec::new()
    };

    if let Err(e) = run(options, source_addrs, destination_addrs).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(
    options: Options,
    source_addrs: Vec<HostPort>,
    destination_addrs: Vec<HostPort>,
) -> Result<(), Error> {
    let timeouts = options.timeouts();

    let connect_source = RedisEndpoint::connect(
        &source_addrs,
        options.source_password.as_deref(),
        options.source_topology,
        timeouts,
    );

    // Both probes have to pass before any migration work starts, so when a
    // destination is needed the connections are established together.
    let (mut source, destination) = if options.copy_data {
        let connect_destination = RedisEndpoint::connect(
            &destination_addrs,
            options.destination_password.as_deref(),
            options.destination_topology,
            timeouts,
        );
        let (source, destination) = futures::try_join!(connect_source, connect_destination)?;
        (source, Some(destination))
    } else {
        (connect_source.await?, None)
    };

    if options.get_keys {
        let keys = source.keys(&options.key_filter).await?;
        if keys.is_empty() {
            println!("No keys found.");
        } else {
            for key in &keys {
                println!("{key}");
            }
        }
    }

    if let Some(mut destination) = destination {
        let filter = options.filter();
        let migrate_options = MigrateOptions {
            max_databases: options.max_databases,
            replace: options.replace,
        };

        let report = migrate::run(
            &mut source,
            &mut destination,
            &filter,
            &migrate_options,
            render_outcome,
        )
        .await?;

        println!("Migrated {} keys.", report.migrated);
        if report.skipped > 0 {
            println!("Skipped {} keys.", report.skipped);
        }
        if report.failed > 0 {
            println!("Failed to migrate {} keys.", report.failed);
        }
    }

    Ok(())
}

fn render_outcome(outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Migrated { key } => println!("Migrated key: {key}"),
        TransferOutcome::Skipped { key, reason } => println!("Skipped key {key}: {reason}"),
        TransferOutcome::Failed { key, reason } => println!("Failed to migrate key {key}: {reason}"),
    }
}
