//! Prints one or '-n count' UUIDv1 strings, optionally carrying the clock sequence across runs in
//! the file given by '--state'
//!
//! Without '--state' the global generator is used, configured by `UUID1_STATE_ENABLED` and
//! `UUID1_STATE_FILE`. Running twice with the same state file reuses the node identifier and the
//! clock sequence of the previous run:
//!
//! ```sh
//! cargo run --example uuid1 -- -n 3 --state /tmp/uuid1-demo.json
//! cargo run --example uuid1 -- -n 3 --state /tmp/uuid1-demo.json
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::{env, io, io::Write, process::ExitCode};

use uuid1::generator::{random_node_identifier, with_rand08::Adapter};
use uuid1::state::{FileStateStore, StateStore};
use uuid1::{global_controller, Persistence, Settings, V1Generator};

#[derive(Debug, Default)]
struct Options {
    count: Option<usize>,
    state: Option<PathBuf>,
}

fn main() -> io::Result<ExitCode> {
    let options = {
        let mut args = env::args_os();
        let program = args.next();
        match parse_args(args) {
            Ok(options) => options,
            Err(message) => {
                eprintln!("Error: {}", message);
                eprintln!(
                    "Usage: {} [-n count] [--state file]",
                    program
                        .as_deref()
                        .map(|p| p.to_string_lossy())
                        .unwrap_or("uuid1".into())
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    };
    let count = options.count.unwrap_or(1);

    let mut buf = io::BufWriter::new(io::stdout());
    match options.state {
        None => {
            for _ in 0..count {
                writeln!(buf, "{}", uuid1::uuid1())?;
            }
            uuid1::flush_state();
        }
        Some(state_file) => {
            let settings = Settings {
                state_enabled: true,
                state_file,
            };
            let mut g = state_generator(&settings);
            eprintln!(
                "node {:012x}, clock sequence {:#06x}",
                g.node_identifier(),
                g.strategy().current()
            );
            for _ in 0..count {
                writeln!(buf, "{}", g.generate())?;
            }
            g.shutdown();
            eprintln!("stored state to {}", settings.state_file.display());
        }
    }
    buf.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Builds a generator that restores from and stores to the state file of `settings`, keeping the
/// node identifier of the previous run when one was stored.
fn state_generator(settings: &Settings) -> V1Generator<Adapter<rand::rngs::ThreadRng>> {
    let mut rng = Adapter(rand::thread_rng());
    let previous = FileStateStore::open(&settings.state_file).state();
    match previous {
        Some(state) => eprintln!(
            "restoring clock sequence {:#06x} from {}",
            state.clock_sequence,
            settings.state_file.display()
        ),
        None => eprintln!("no state in {}", settings.state_file.display()),
    }
    let node_identifier = previous
        .map(|state| state.node_identifier)
        .unwrap_or_else(|| random_node_identifier(&mut rng));
    V1Generator::new(
        node_identifier,
        rng,
        global_controller(),
        Persistence::from_settings(settings, None),
    )
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<Options, String> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        if arg == "-n" {
            if options.count.is_some() {
                return Err("option 'n' given more than once".to_owned());
            }
            let Some(n_arg) = args.next() else {
                return Err("argument to option 'n' missing".to_owned());
            };
            let Some(c) = n_arg.to_str().and_then(|n| n.parse().ok()) else {
                return Err(format!(
                    "invalid argument to option 'n': '{}'",
                    n_arg.to_string_lossy()
                ));
            };
            options.count.replace(c);
        } else if arg == "--state" {
            if options.state.is_some() {
                return Err("option 'state' given more than once".to_owned());
            }
            let Some(path) = args.next().filter(|p| !p.is_empty()) else {
                return Err("argument to option 'state' missing".to_owned());
            };
            options.state.replace(PathBuf::from(path));
        } else {
            return Err(format!("unrecognized argument '{}'", arg.to_string_lossy()));
        }
    }
    Ok(options)
}
