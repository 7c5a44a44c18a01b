use coolr_compiler::CoolError;
use std::path::PathBuf;

const HELP: &str = "usage: coolr <sourcefile> [--out <path>] [--lex|--parse|--semant] [--help]
options:
    --out <file>   Specifies the output-file to write to (default: out.S)
    --lex          Stops evaluation after lexical analysis printing the token stream
    --parse        Stops evaluation after parsing printing the AST
    --semant       Stops evaluation after semantic analysis printing the annotated AST
    --help         Prints this help information

file:
    The source file to be compiled";

fn sys_info(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(0);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopAfter {
    Lex,
    Parse,
    Semant,
}

pub struct CliOptions {
    // required argument specifying the file to compile
    pub file_path: PathBuf,

    // output-file the assembly is written to
    pub output_path: PathBuf,

    // stops evaluation after the given stage, dumping its output
    pub stop_after: Option<StopAfter>,
}

impl CliOptions {
    fn default() -> CliOptions {
        CliOptions {
            file_path: PathBuf::new(),
            output_path: PathBuf::from("out.S"),
            stop_after: None,
        }
    }

    pub fn parse() -> Result<CliOptions, CoolError> {
        let mut cli_options = CliOptions::default();
        let mut args = std::env::args().collect::<Vec<String>>().into_iter().skip(1);

        while let Some(arg) = args.next() {
            if arg.starts_with('-') {
                match arg.as_str() {
                    "--out" => {
                        if let Some(file) = args.next() {
                            cli_options.output_path = PathBuf::from(file);
                        } else {
                            return Err(CoolError::Cli(format!(
                                "Expects file following '{}' option",
                                arg
                            )));
                        }
                    }
                    "--lex" => cli_options.stop_after = Some(StopAfter::Lex),
                    "--parse" => cli_options.stop_after = Some(StopAfter::Parse),
                    "--semant" => cli_options.stop_after = Some(StopAfter::Semant),
                    "--help" => sys_info(HELP),
                    _ => return Err(CoolError::Cli(format!("Illegal option '{}'", arg))),
                }
            } else {
                cli_options.file_path = PathBuf::from(arg);
            }
        }

        if cli_options.file_path.to_string_lossy().is_empty() {
            Err(CoolError::Cli("No input files given".to_string()))
        } else {
            Ok(cli_options)
        }
    }
}
