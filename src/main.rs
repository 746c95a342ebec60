use argh::FromArgs;
use chainsh::{input, Flow, Interpreter, ParsingError};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

#[derive(FromArgs)]
/// A command-line shell with pipelines, redirections and && / || / ; chaining.
struct Args {
    #[argh(option, short = 'c')]
    /// run this single line, then exit with its status
    command: Option<String>,

    #[argh(option, default = "String::new()")]
    /// prompt shown before each line when reading from a terminal
    prompt: String,

    #[argh(option, default = "LevelFilter::Warn")]
    /// log verbosity on stderr: off, error, warn, info, debug or trace
    log_level: LevelFilter,
}

fn main() {
    let args: Args = argh::from_env();

    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    // Only fails when a logger is already installed.
    let _ = TermLogger::init(args.log_level, config, TerminalMode::Stderr, ColorChoice::Auto);

    let mut shell = Interpreter::default();
    let code = match args.command {
        Some(line) => run_once(&mut shell, &line),
        None => input::stdin_source(&args.prompt).and_then(|mut source| shell.repl(source.as_mut())),
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run_once(shell: &mut Interpreter, line: &str) -> anyhow::Result<i32> {
    match shell.run_line(line) {
        Ok(Flow::Exit) => Ok(0),
        Ok(Flow::Continue) => Ok(shell.last_status()),
        Err(err) if err.is::<ParsingError>() => {
            println!("Error: invalid syntax!");
            Ok(1)
        }
        Err(err) => Err(err),
    }
}
