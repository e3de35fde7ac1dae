use std::{process, time::Duration};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tagmarks::{client::Client, server::Server};

use crate::cli::{Cli, Command, ListArgs};

/// Installs the global subscriber. `serve` logs at info by default, client commands at warn.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else if matches!(cli.command, Command::Serve(_)) {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let timeout = Duration::from_secs(cli.timeout_secs);
    let server = cli.server;

    match cli.command {
        Command::Serve(args) => {
            Server::new(args.into_config())
                .serve()
                .await
                .context("server failed")?;
        }
        Command::New(args) => {
            let client = Client::new(server, timeout)?;
            match client.create(&args.name, &args.url, &args.tags).await {
                Ok(()) => println!("created"),
                Err(err) => println!("failed to create bookmark {}: {err}", args.name),
            }
        }
        Command::List(args) => list(Client::new(server, timeout)?, args).await?,
        Command::Delete(args) => {
            let client = Client::new(server, timeout)?;
            match client.delete(&args.name).await {
                Ok(true) => println!("deleted"),
                Ok(false) => println!("{}: does not exist", args.name),
                Err(err) => println!("{}: failed to delete: {err}", args.name),
            }
        }
        Command::Dump => {
            for entry in Client::new(server, timeout)?.dump().await? {
                println!("{entry}");
            }
        }
        Command::Save => {
            let msg = Client::new(server, timeout)?.save().await?;
            println!("{msg}");
        }
        Command::Tags => {
            for tag in Client::new(server, timeout)?.tags().await? {
                println!("{tag}");
            }
        }
    }
    Ok(())
}

async fn list(client: Client, args: ListArgs) -> Result<()> {
    let (param, value) = match (&args.name, &args.tag) {
        (Some(name), _) => ("name", name.as_str()),
        (None, Some(tag)) => ("tag", tag.as_str()),
        (None, None) => anyhow::bail!("one of --name or --tag is required"),
    };

    let Some(entries) = client.find(param, value).await? else {
        println!("{value}: not found");
        return Ok(());
    };

    for (i, entry) in entries.iter().enumerate() {
        println!("{}| {entry}", i + 1);
    }

    if args.open {
        for entry in &entries {
            open_url(&entry.url);
        }
    }
    Ok(())
}

fn open_url(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "linux") {
        "xdg-open"
    } else {
        println!("Unsupported OS detected");
        return;
    };

    println!("opening {url}");
    match process::Command::new(opener).arg(url).status() {
        Ok(status) if status.success() => {}
        Ok(status) => println!("failed to open url {url}: {status}"),
        Err(err) => println!("failed to open url {url}: {err}"),
    }
}
