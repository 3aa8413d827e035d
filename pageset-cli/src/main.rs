use std::env;
use std::fs::metadata;
use std::path::PathBuf;

use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use pageset::idl::{IdlConfig, IdlError};
use pageset::stats;
use pageset::{Direction, Id2l, Idl};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

mod file;

use file::StoreFile;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, disable_help_subcommand = true)]
struct Cli {
    /// Store location
    store: PathBuf,

    /// Create a new store (will overwrite existing file)
    #[arg(short, long, default_value_t = false)]
    create: bool,

    /// Baseline capacity of the free list (only used with --create)
    #[arg(short, long)]
    baseline: Option<usize>,

    /// Free list size at which ordered inserts collapse into a range (only used with --create)
    #[arg(short, long)]
    range_threshold: Option<usize>,

    #[command(subcommand)]
    parameter: Option<Parameter>,
}

/// A single interactive command line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct Line {
    #[command(subcommand)]
    parameter: Parameter,
}

#[derive(Debug, Subcommand)]
enum Parameter {
    /// Append page ids to the free list
    Append {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Does the free list contain this page id
    Contains { id: u64 },
    /// Display free list count and capacity
    Count,
    /// List pages touched this session
    Dirty,
    /// Interactive Help
    Help,
    /// Insert a page id into a sorted free list, keeping it sorted
    Insert { id: u64 },
    /// List free list page ids
    List,
    /// Look up a touched page
    Lookup { id: u64 },
    /// Merge page ids into a sorted free list
    Merge {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Write the free list to the store
    Save,
    /// Search a sorted free list for a page id
    Search {
        id: u64,
        /// Direction the list is ordered in (Descending or Ascending)
        direction: Option<Direction>,
    },
    /// Release excess free list capacity
    Shrink,
    /// Sort the free list, largest first
    Sort,
    /// Display operation counters
    Stats,
    /// Record a page as touched, with a note
    Touch { id: u64, note: String },
}

/// Our working state.
struct Session {
    store: StoreFile,
    free: Idl,
    // Notes are owned here, the dirty map only holds indices into them
    notes: Vec<String>,
    dirty: Id2l<usize>,
}

impl Session {
    async fn save(&mut self) -> Result<()> {
        self.store.write_list(&self.free).await?;
        self.store.flush().await
    }
}

fn get_history_file() -> Option<PathBuf> {
    dirs::preference_dir()
        .and_then(|mut base| {
            base.push("pageset");
            // Note: Not create_dir_all(), because we don't want to create preference
            // dirs if they don't exist.
            if metadata(base.clone()).ok().is_none() {
                std::fs::create_dir(base.clone()).ok()?
            }
            Some(base)
        })
        .map(|mut base| {
            base.push("history.txt");
            base
        })
}

async fn interactive(session: &mut Session) -> Result<()> {
    let isatty = unsafe { libc::isatty(0) };

    // `()` can be used when no completer is required
    let mut rl = DefaultEditor::new()?;
    if isatty == 1 {
        if let Some(file_location) = get_history_file() {
            if let Err(e) = rl.load_history(&file_location) {
                println!("error loading history: {e}");
            }
        }
    }
    println!("terminate with ctrl-c or ctrl-d");
    loop {
        let readline = rl.readline("pages: ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match Line::try_parse_from(line.split_whitespace()) {
                    Ok(parsed) => process_parameter(session, &parsed.parameter).await,
                    Err(e) => println!("{e}"),
                }
                if isatty == 1 {
                    rl.add_history_entry(line.as_str())?;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("terminating...");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("terminating...");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
    if isatty == 1 {
        if let Some(file_location) = get_history_file() {
            if let Err(e) = rl.save_history(&file_location) {
                println!("error saving history: {e}");
            }
        }
    }
    Ok(())
}

fn print_ids(idl: &Idl) {
    match idl.range() {
        Some(range) => println!("range: {}..={}", range.low, range.high),
        None => {
            let ids: Vec<String> = idl.iter().map(|id| id.to_string()).collect();
            println!("{}", ids.join(", "));
        }
    }
}

/// Merge `ids`, in any order and possibly repeated, into the free list.
///
/// The free list is sorted first, so appended page ids are merged rather than rejected.
fn merge_ids(free: &mut Idl, ids: &[u64]) -> Result<(), IdlError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();

    let mut other = Idl::with_config(free.config())?;
    other.append_list(&ids)?;
    free.sort();
    free.merge(&other)
}

async fn process_parameter(session: &mut Session, parameter: &Parameter) {
    match parameter {
        Parameter::Append { ids } => match session.free.append_list(ids) {
            Ok(_) => println!("appended: {}", ids.len()),
            Err(e) => println!("append failed: {e}"),
        },
        Parameter::Contains { id } => {
            if session.free.contains(*id) {
                println!("true");
            } else {
                println!("false");
            }
        }
        Parameter::Count => {
            println!(
                "count: {}, capacity: {}, baseline: {}, range form: {}",
                session.free.len(),
                session.free.capacity(),
                session.free.baseline(),
                session.free.is_range()
            );
        }
        Parameter::Dirty => {
            for entry in &session.dirty {
                println!("{}: {}", entry.id, session.notes[entry.payload]);
            }
        }
        Parameter::Help => {
            let help = Cli::command().render_help().to_string();

            let mut print_it = false;

            for line in help.lines() {
                if line.starts_with("Arguments:") {
                    print_it = false;
                }
                if print_it && !line.is_empty() {
                    println!("{}", line);
                }
                if line.starts_with("Commands:") {
                    print_it = true;
                }
            }
        }
        Parameter::Insert { id } => match session.free.insert(*id) {
            Ok(_) => println!("inserted: {id}"),
            Err(e) => println!("insert failed: {e}"),
        },
        Parameter::List => print_ids(&session.free),
        Parameter::Lookup { id } => match session.dirty.get(*id) {
            Some(idx) => println!("{}", session.notes[*idx]),
            None => println!("not found"),
        },
        Parameter::Merge { ids } => match merge_ids(&mut session.free, ids) {
            Ok(_) => println!("merged: {}", ids.len()),
            Err(e) => println!("merge failed: {e}"),
        },
        Parameter::Save => match session.save().await {
            Ok(_) => println!("saved"),
            Err(e) => println!("save failed: {e}"),
        },
        Parameter::Search { id, direction } => {
            let direction = direction.unwrap_or(Direction::Descending);
            match session.free.search(*id, direction) {
                Ok(pos) => {
                    if session.free.as_slice().get(pos) == Some(id) {
                        println!("found at: {pos}");
                    } else {
                        println!("insert at: {pos}");
                    }
                }
                Err(e) => println!("search failed: {e}"),
            }
        }
        Parameter::Shrink => {
            if session.free.shrink() {
                println!("shrunk to: {}", session.free.capacity());
            } else {
                println!("already at baseline");
            }
        }
        Parameter::Sort => {
            session.free.sort();
            print_ids(&session.free);
        }
        Parameter::Stats => match stats::snapshot() {
            Some(snapshot) => println!("{snapshot:#?}"),
            None => println!("counters disabled"),
        },
        Parameter::Touch { id, note } => {
            session.notes.push(note.clone());
            match session.dirty.insert(*id, session.notes.len() - 1) {
                Ok(pos) => println!("touched: {id} at: {pos}"),
                Err(e) => {
                    session.notes.pop();
                    println!("touch failed: {e}");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match env::var("TMPDIR") {
        Ok(d) => d,
        Err(_e) => ".".to_string(),
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, "pageset.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt().with_writer(non_blocking).init();

    stats::init();

    let mut store = if cli.create {
        let defaults = IdlConfig::default();
        let config = IdlConfig::new(
            cli.baseline.unwrap_or(defaults.baseline()),
            cli.range_threshold.unwrap_or(defaults.range_threshold()),
        )?;
        tracing::info!("Creating store at: {}", cli.store.display());
        StoreFile::try_new(&cli.store, config).await?
    } else {
        tracing::info!("Opening store at: {}", cli.store.display());
        StoreFile::try_open(&cli.store).await?
    };

    let free = store.read_list().await?;
    let mut session = Session {
        store,
        free,
        notes: vec![],
        dirty: Id2l::new(),
    };

    match cli.parameter {
        Some(parameter) => process_parameter(&mut session, &parameter).await,
        None => interactive(&mut session).await?,
    }

    session.save().await?;

    if let Some(snapshot) = stats::teardown() {
        tracing::info!(?snapshot, "operation counters");
    }
    Ok(())
}
