use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use monkey::environment::Environment;
use monkey::object::Object;
use monkey::MonkeyError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Engine {
    Eval,
    Vm,
}

struct Args {
    file_path: Option<String>,
    engine: Engine,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut file_path = None;
    let mut engine = Engine::Vm;
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--engine" => {
                let value = iter.next().ok_or("--engine requires a value: eval|vm")?;
                engine = match value.as_str() {
                    "eval" => Engine::Eval,
                    "vm" => Engine::Vm,
                    other => return Err(format!("unknown engine {other:?}, expected eval or vm")),
                };
            }
            path => file_path = Some(path.to_owned()),
        }
    }
    Ok(Args { file_path, engine })
}

fn main() -> ExitCode {
    let raw_args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw_args) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match args.file_path {
        Some(path) => run_file(&path, args.engine),
        None => run_repl(args.engine),
    }
}

fn run_file(path: &str, engine: Engine) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: could not read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut print = |line: &str| println!("{line}");
    let result = match engine {
        Engine::Eval => monkey::eval(&source, &mut print),
        Engine::Vm => monkey::run(&source, &mut print),
    };

    match result {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprint!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Reads stdin line by line, evaluating each line against a persistent
/// top-level environment (eval engine) or a persistent globals store (VM
/// engine) so that bindings from one line stay visible on the next.
fn run_repl(engine: Engine) -> ExitCode {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let env = Environment::new();
    let mut globals: Vec<Object> = Vec::new();

    loop {
        print!(">> ");
        if stdout.flush().is_err() {
            return ExitCode::FAILURE;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        let mut print = |text: &str| println!("{text}");
        match engine {
            Engine::Eval => match monkey::eval_with_env(&line, &env, &mut print) {
                Ok(value) => println!("{value}"),
                Err(MonkeyError::Parse(errors)) => {
                    for e in errors {
                        println!("\t{e}");
                    }
                }
                Err(err) => println!("{err}"),
            },
            Engine::Vm => match monkey::run_with_globals(&line, std::mem::take(&mut globals), &mut print) {
                Ok((value, updated_globals)) => {
                    globals = updated_globals;
                    println!("{value}");
                }
                Err(MonkeyError::Parse(errors)) => {
                    for e in errors {
                        println!("\t{e}");
                    }
                }
                Err(err) => println!("{err}"),
            },
        }
    }
}
