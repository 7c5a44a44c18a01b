pub mod compiler;

pub use compiler::common::error::{CoolError, Error, ErrorKind};

use compiler::codegen::Codegen;
use compiler::parser::Parser;
use compiler::scanner::Scanner;
use compiler::semant::TypeChecker;

/// Runs the whole pipeline over a single source text and returns the
/// generated assembly
pub fn compile(source: &str) -> Result<String, CoolError> {
    // scan input; scan errors travel as error tokens and surface during
    // parsing
    let tokens = Scanner::new(source).scan();

    // parse tokens and return the AST
    let mut program = Parser::new(tokens).parse().map_err(CoolError::Parse)?;

    // check for semantic errors and annotate the AST
    let classtable = TypeChecker::new(&program)
        .and_then(|checker| checker.check(&mut program))
        .map_err(CoolError::Semant)?;

    // lay out objects and emit assembly
    Ok(Codegen::new(&program, &classtable).generate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_program() {
        let asm = compile("class Main { main():Int { 2+3 }; };").unwrap();
        assert!(asm.starts_with("section .data"));
        assert!(asm.contains("Main.main:"));
    }

    #[test]
    fn compiles_case_over_let() {
        let source = "
            class A { };
            class Main {
              main():Object { { new A; case (let x:A in x) of y:A => y; esac; } };
            };
        ";
        compile(source).unwrap();
    }

    #[test]
    fn compiles_dispatch_on_void_attribute() {
        // fails at runtime with \"Dispatch to void\", not at compile time
        let source = "
            class Main { x:A; main():Object { x.f() }; };
            class A { f():Int { 0 }; };
        ";
        let asm = compile(source).unwrap();
        assert!(asm.contains("je _dispatch_to_void"));
    }

    #[test]
    fn reports_parse_errors() {
        let err = compile("class Main { main():Int { 1 + }; };").unwrap_err();
        assert!(matches!(err, CoolError::Parse(_)));
    }

    #[test]
    fn reports_semant_errors() {
        let err = compile("class Main { main():Int { true } ; };").unwrap_err();
        assert!(matches!(err, CoolError::Semant(_)));
    }
}
