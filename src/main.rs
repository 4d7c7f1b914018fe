use std::path::PathBuf;

use postboard::config::Source;
use postboard::RunOptions;

const HELP: &str = "Postboard - browse posts, filter cards and follow live comments from the terminal.

  --version, -V          Show version and exit
  --help,    -h          Show this help message
  --source <board|store> Choose the back end (default: board)
  --base-url <URL>       Override the back end's base URL
  --config <PATH>        Read configuration from PATH
  --print [TERM]         Print the (filtered) list once and exit";

enum Action {
    Exit,
    Run(RunOptions),
    Print(RunOptions, String),
}

fn main() {
    let action = match handle_cli_flags(std::env::args().skip(1)) {
        Ok(action) => action,
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    };

    let result = match action {
        Action::Exit => Ok(()),
        Action::Run(options) => postboard::run(options),
        Action::Print(options, term) => {
            postboard::print_posts(&options, &term).map(|text| print!("{text}"))
        }
    };
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags(args: impl Iterator<Item = String>) -> anyhow::Result<Action> {
    let mut options = RunOptions::default();
    let mut print: Option<String> = None;
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Postboard {}", postboard::VERSION);
                return Ok(Action::Exit);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(Action::Exit);
            }
            "--source" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--source needs a value"))?;
                options.source = Some(value.parse::<Source>()?);
            }
            "--base-url" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--base-url needs a value"))?;
                options.base_url = Some(value);
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                options.config_file = Some(PathBuf::from(value));
            }
            "--print" => {
                let term = match args.peek() {
                    Some(next) if !next.starts_with("--") => args.next().unwrap_or_default(),
                    _ => String::new(),
                };
                print = Some(term);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(match print {
        Some(term) => Action::Print(options, term),
        None => Action::Run(options),
    })
}
