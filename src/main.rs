use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::Subcommand;
use confjson::{Error, ErrorKind, ParseOptions, json};
use miette::{IntoDiagnostic, NamedSource, WrapErr};

/// Translate configuration files into JSON.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Only print the one-line error summary, without the annotated source
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Evaluate a configuration file and print it as JSON
    Translate {
        /// Configuration file, or `-` for standard input
        filename: PathBuf,

        /// Write the JSON to this file instead of standard output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print JSON on a single line
        #[arg(long)]
        compact: bool,

        /// Reject a second definition of the same constant
        #[arg(long)]
        strict: bool,
    },
    /// Print the tokens of a configuration file, one per line
    Tokenize { filename: PathBuf },
    /// Print a configuration file back in canonical form
    Parse {
        filename: PathBuf,

        #[arg(long)]
        strict: bool,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Translate {
            filename,
            output,
            compact,
            strict,
        } => {
            let file_contents = read_source(&filename)?;
            let options = ParseOptions {
                allow_redefinition: !strict,
            };

            let value = match confjson::translate_with(&file_contents, options) {
                Ok(value) => value,
                Err(e) => report(&filename, &file_contents, e, args.quiet),
            };

            match output {
                Some(path) => {
                    let file = fs::File::create(&path)
                        .into_diagnostic()
                        .wrap_err_with(|| format!("creating `{}` failed", path.display()))?;
                    json::write(io::BufWriter::new(file), &value, !compact)
                        .into_diagnostic()
                        .wrap_err_with(|| format!("writing `{}` failed", path.display()))?;
                }
                None => json::write(io::stdout().lock(), &value, !compact)
                    .into_diagnostic()
                    .wrap_err("writing to standard output failed")?,
            }
        }
        Commands::Tokenize { filename } => {
            let file_contents = read_source(&filename)?;

            let tokens = match confjson::tokenize(&file_contents) {
                Ok(tokens) => tokens,
                Err(e) => report(&filename, &file_contents, e.into(), args.quiet),
            };
            for token in tokens {
                println!("{token}");
            }
        }
        Commands::Parse { filename, strict } => {
            let file_contents = read_source(&filename)?;
            let options = ParseOptions {
                allow_redefinition: !strict,
            };

            let program = confjson::tokenize(&file_contents)
                .map_err(Error::from)
                .and_then(|tokens| Ok(confjson::parse::parse_with(tokens, options)?));
            match program {
                Ok(program) => println!("{program}"),
                Err(e) => report(&filename, &file_contents, e, args.quiet),
            }
        }
    }
    Ok(())
}

fn read_source(filename: &Path) -> miette::Result<String> {
    if filename == Path::new("-") {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .into_diagnostic()
            .wrap_err("reading standard input failed")?;
        return Ok(input);
    }
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

/// Prints the error to stderr and exits: 65 for malformed input, 70 when a
/// well-formed file fails to evaluate.
fn report(filename: &Path, source: &str, error: Error, quiet: bool) -> ! {
    let kind = error.kind();
    match (error.line(), error.column()) {
        (Some(line), Some(column)) => {
            eprintln!("[line {line}, column {column}] {kind}: {error}")
        }
        (Some(line), None) => eprintln!("[line {line}] {kind}: {error}"),
        _ => eprintln!("{kind}: {error}"),
    }

    if !quiet {
        let name = filename.display().to_string();
        let report =
            miette::Report::new(error).with_source_code(NamedSource::new(name, source.to_string()));
        eprintln!("{report:?}");
    }

    std::process::exit(match kind {
        ErrorKind::LexError | ErrorKind::ParseError => 65,
        ErrorKind::NameError | ErrorKind::EvaluationError => 70,
    })
}
