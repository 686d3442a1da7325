use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use powchain_core::constants::DEFAULT_DB_PATH;
use powchain_core::{Blockchain, ChainStore};
use powchain_storage::open_chain;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Single-node proof-of-work block chain")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Directory holding the block store
    #[arg(long, global = true, env = "POWCHAIN_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine and append a block
    Add {
        /// Block payload
        #[arg(long)]
        block: String,
    },
    /// Print the chain from newest to oldest
    Print,
}

fn print_chain<S: ChainStore>(chain: &Blockchain<S>, out: &mut impl Write) -> Result<()> {
    for item in chain.iter() {
        let block = item.context("chain traversal halted")?;
        writeln!(out, "Previous Hash: {}", hex::encode(block.prev_hash_bytes()))?;
        writeln!(out, "Data: {}", String::from_utf8_lossy(block.data()))?;
        writeln!(out, "Hash: {}", hex::encode(block.hash()))?;
        writeln!(out, "PoW: {}", chain.pow().validate(&block))?;
        writeln!(out)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut chain = open_chain(&cli.db_path)
        .with_context(|| format!("cannot open chain at {}", cli.db_path.display()))?;

    match cli.cmd {
        Command::Add { block } => {
            let added = chain.add_block(block).context("failed to add block")?;
            info!(nonce = added.nonce(), "added {added}");
            println!("Added block {}", hex::encode(added.hash()));
        }
        Command::Print => print_chain(&chain, &mut io::stdout().lock())?,
    }
    chain.close()?;
    Ok(())
}
