mod cli_options;

use cli_options::{CliOptions, StopAfter};
use coolr_compiler::compiler::codegen::Codegen;
use coolr_compiler::compiler::parser::Parser;
use coolr_compiler::compiler::scanner::Scanner;
use coolr_compiler::compiler::semant::TypeChecker;
use coolr_compiler::CoolError;
use std::fs;
use std::process;

fn run() -> Result<(), CoolError> {
    let options = CliOptions::parse()?;

    let source = fs::read_to_string(&options.file_path).map_err(|err| {
        CoolError::Sys(format!(
            "could not read '{}': {}",
            options.file_path.display(),
            err
        ))
    })?;

    let tokens = Scanner::new(&source).scan();
    if options.stop_after == Some(StopAfter::Lex) {
        for token in &tokens {
            println!("{}", token.dump());
        }
        return Ok(());
    }

    let mut program = Parser::new(tokens).parse().map_err(CoolError::Parse)?;
    if options.stop_after == Some(StopAfter::Parse) {
        print!("{}", program.dump());
        return Ok(());
    }

    let classtable = TypeChecker::new(&program)
        .and_then(|checker| checker.check(&mut program))
        .map_err(CoolError::Semant)?;
    if options.stop_after == Some(StopAfter::Semant) {
        print!("{}", program.dump());
        return Ok(());
    }

    let asm = Codegen::new(&program, &classtable).generate();
    fs::write(&options.output_path, asm).map_err(|err| {
        CoolError::Sys(format!(
            "could not write '{}': {}",
            options.output_path.display(),
            err
        ))
    })?;

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        error.print();
        process::exit(1);
    }
}
