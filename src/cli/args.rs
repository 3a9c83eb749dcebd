//! Raw argv rewriting done before clap sees the arguments.
//!
//! Handles two things clap cannot: invocation through a symlink named after
//! the tool ("polyglot" mode), and `--cderun-*` overrides written after the
//! subcommand, which would otherwise be passed through to the tool.

use clap::CommandFactory;
use std::collections::BTreeSet;
use std::path::Path;

use super::Cli;

/// Name the binary is installed under
pub const CANONICAL_NAME: &str = "cderun";

/// Prefix shared by all internal override flags
pub const OVERRIDE_PREFIX: &str = "--cderun-";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    #[error("cderun internal override flag {0:?} must be placed after the subcommand")]
    MisplacedOverride(String),
}

/// Rewrite `args` (including argv[0]) into a form clap can parse.
///
/// Overrides found after the subcommand move to just behind the program
/// name, keeping their relative order. When invoked under another name,
/// that name becomes the subcommand.
pub fn preprocess(args: Vec<String>) -> Result<Vec<String>, ArgsError> {
    rewrite(args, &value_flags())
}

/// Spellings of every flag that takes its value as a separate token
fn value_flags() -> BTreeSet<String> {
    let mut cmd = Cli::command();
    cmd.build();

    let mut flags = BTreeSet::new();
    for arg in cmd.get_arguments() {
        if arg.is_positional() || arg.is_require_equals_set() || !arg.get_action().takes_values() {
            continue;
        }
        if let Some(long) = arg.get_long() {
            flags.insert(format!("--{}", long));
        }
        if let Some(short) = arg.get_short() {
            flags.insert(format!("-{}", short));
        }
    }
    flags
}

fn rewrite(args: Vec<String>, value_flags: &BTreeSet<String>) -> Result<Vec<String>, ArgsError> {
    if args.is_empty() {
        return Ok(args);
    }
    let program = &args[0];

    let exec_name = Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.clone());
    let polyglot = exec_name != CANONICAL_NAME;

    // Index of the first token not consumed by cderun's own flags
    let subcommand = if polyglot {
        None
    } else {
        find_subcommand(&args, value_flags)
    };

    let mut rewritten = Vec::with_capacity(args.len() + 1);
    let mut others = Vec::with_capacity(args.len());
    let hoist_from = match subcommand {
        Some(index) => {
            if let Some(flag) = args[1..index].iter().find(|a| a.starts_with(OVERRIDE_PREFIX)) {
                return Err(ArgsError::MisplacedOverride(flag.clone()));
            }
            others.extend_from_slice(&args[1..=index]);
            index + 1
        }
        None => 1,
    };

    if polyglot {
        rewritten.push(CANONICAL_NAME.to_string());
    } else {
        rewritten.push(program.clone());
    }

    let mut overrides = Vec::new();
    let mut tokens = args[hoist_from..].iter();
    while let Some(token) = tokens.next() {
        if !token.starts_with(OVERRIDE_PREFIX) {
            others.push(token.clone());
            continue;
        }
        overrides.push(token.clone());
        if value_flags.contains(token.as_str()) {
            if let Some(value) = tokens.next() {
                overrides.push(value.clone());
            }
        }
    }

    rewritten.extend(overrides);
    if polyglot {
        rewritten.push(exec_name);
    }
    rewritten.extend(others);

    tracing::trace!("Preprocessed args: {:?}", rewritten);
    Ok(rewritten)
}

fn find_subcommand(args: &[String], value_flags: &BTreeSet<String>) -> Option<usize> {
    let mut index = 1;
    while index < args.len() {
        let token = &args[index];
        if !token.starts_with('-') || token == "-" {
            return Some(index);
        }
        if value_flags.contains(token.as_str()) {
            index += 1;
        }
        index += 1;
    }
    None
}
