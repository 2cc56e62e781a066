use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use transplant::{deserialize, list, serialize, Options};

fn parse_dir(value: &str) -> Result<PathBuf, String> {
    if value.starts_with('-') {
        return Err(format!("directory must not start with '-': {value:?}"));
    }
    Ok(PathBuf::from(value))
}

/// Copy a directory tree through a flat record stream on stdin/stdout
#[derive(Debug, Parser)]
#[clap(name = "transplant", version)]
#[clap(group(ArgGroup::new("mode").required(true).args(["serialize", "deserialize", "list"])))]
pub struct App {
    /// Serialize DIR to standard output
    #[clap(short)]
    serialize: bool,

    /// Deserialize standard input into DIR
    #[clap(short)]
    deserialize: bool,

    /// List the records read from standard input
    #[clap(short)]
    list: bool,

    /// Overwrite existing files and merge into existing directories
    #[clap(short, requires = "deserialize")]
    clobber: bool,

    /// The directory to read from or write into
    #[clap(short, value_name = "DIR", default_value = ".", value_parser = parse_dir)]
    path: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    let options = Options {
        clobber: args.clobber,
        ..Default::default()
    };

    if args.serialize {
        let mut out = stdout().lock();
        serialize(&args.path, &mut out, &options)
            .with_context(|| format!("Serializing {:?}", args.path))?;
        out.flush()?;
    } else if args.deserialize {
        deserialize(&args.path, stdin().lock(), &options)
            .with_context(|| format!("Deserializing into {:?}", args.path))?;
    } else {
        let mut out = stdout().lock();
        list(stdin().lock(), &mut out).context("Listing standard input")?;
        out.flush()?;
    }

    Ok(())
}
