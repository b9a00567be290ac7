//! Command-line client for MangoKV.
//!
//! With a command on the command line it sends that single request and
//! prints the reply. Without one it reads requests from stdin until EOF,
//! `quit` or `exit`.

use anyhow::Context;
use clap::Parser;
use mangokv::client::Client;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "mangokv-cli")]
#[command(version)]
#[command(about = "Command-line client for MangoKV", long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = mangokv::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = mangokv::DEFAULT_PORT)]
    port: u16,

    /// Request to send, e.g. `PUT name mango`; omit for interactive mode
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut client = Client::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;

    if !args.command.is_empty() {
        let reply = client.send(&args.command.join(" ")).await?;
        println!("{reply}");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{addr}> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = client.send(line).await?;
        println!("{reply}");
    }

    Ok(())
}
