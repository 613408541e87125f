//! keyscope CLI
//!
//! Browse the key namespace of a Redis-compatible server from the terminal.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use keyscope::{Browser, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// keyscope
#[derive(Parser, Debug)]
#[command(name = "keyscope")]
#[command(about = "Browse the key namespace of a Redis-compatible server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    addr: String,

    /// AUTH credential
    #[arg(long, default_value = "")]
    auth: String,

    /// Database index to browse
    #[arg(short = 'n', long, default_value = "0")]
    db: usize,

    /// Namespace delimiter
    #[arg(short, long, default_value = ":")]
    delimiter: char,

    /// COUNT hint per SCAN round
    #[arg(short, long, default_value = "10000")]
    batch: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the database and print its namespace tree
    Tree {
        /// Levels below the root to print
        #[arg(long)]
        depth: Option<usize>,

        /// Use a single KEYS * instead of SCAN
        #[arg(long)]
        legacy: bool,
    },

    /// Print the decoded value of a key
    Get {
        /// The key to read
        key: String,
    },

    /// Send one raw command
    Exec {
        /// Command name and arguments
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },

    /// Read commands from stdin, one per line
    Repl,
}

fn main() {
    // Logs go to stderr so they never interleave with printed replies
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,keyscope=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("keyscope v{}", keyscope::VERSION);

    let config = Config::builder()
        .addr(&args.addr)
        .auth(&args.auth)
        .delimiter(args.delimiter)
        .scan_batch_size(args.batch)
        .build();

    let mut browser = Browser::new(config);
    if let Err(e) = run(&mut browser, args.db, args.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(browser: &mut Browser, db: usize, command: Commands) -> keyscope::Result<()> {
    browser.connect()?;
    browser.select(db)?;

    match command {
        Commands::Tree { depth, legacy } => {
            browser.databases()?;
            if legacy {
                browser.load_all_keys_legacy()?;
            } else {
                browser.scan_all_keys()?;
            }
            if let Some(tree) = browser.tree(db) {
                print!("{}", tree.dump(tree.root(), depth));
            }
        }
        Commands::Get { key } => match browser.get_value(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Exec { args } => {
            println!("{}", browser.exec(&args.join(" "))?);
        }
        Commands::Repl => repl(browser)?,
    }
    Ok(())
}

fn repl(browser: &mut Browser) -> keyscope::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "db{}> ", browser.current_db())?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match browser.exec(line) {
            Ok(reply) => writeln!(stdout, "{}", reply)?,
            Err(e) => {
                writeln!(stdout, "{}", e)?;
                if !browser.is_connected() {
                    break;
                }
            }
        }
    }
    Ok(())
}
