//! The errors emitted throughout all of coolr

/// The high-level error type, which is used by both lib.rs and main.rs
#[derive(Debug, PartialEq)]
pub enum CoolError {
    /// Error found while scanning or parsing
    Parse(Error),
    /// Error found during semantic analysis
    Semant(Error),
    /// Error when doing system operations (reading/writing files etc)
    Sys(String),
    /// Error in passing cli-arguments (passing invalid argument)
    Cli(String),
}
impl CoolError {
    /// Prints the diagnostic and the reference-compatible trailer line
    pub fn print(&self) {
        match self {
            CoolError::Parse(error) => {
                error.print_error();
                eprintln!("Compilation halted due to lex and parse errors");
            }
            CoolError::Semant(error) => {
                error.print_error();
                eprintln!("Compilation halted due to static semantic errors.");
            }
            CoolError::Sys(msg) => eprintln!("coolr: {}", msg),
            CoolError::Cli(msg) => eprintln!("coolr: <command-line>: {}", msg),
        }
    }
}

/// All error-types raised by the compilation passes
#[derive(Debug, PartialEq, Clone)]
pub enum ErrorKind {
    // parse errors; payload is the display form of the offending token
    Syntax(String),
    SyntaxEof,

    // class-table errors
    RedefinedBasicClass(String),
    ClassRedefined(String),
    ForbiddenInheritance(String, String),
    NoMainClass,
    NoMainMethod,
    UndefinedBaseClass(String, String),
    InheritanceCycle(String),

    // method-environment errors
    SelfFormalName,
    SelfTypeFormal(String),
    MethodMultiplyDefined(String),
    OverrideReturnMismatch(String),
    OverrideArityMismatch(String),
    OverrideFormalMismatch(String, String, String),

    // attribute-environment errors
    AttributeRedefined(String, String),
    SelfAttributeName,

    // typechecking errors
    AttributeInitMismatch(String, String),
    UndefinedReturnType(String, String),
    FormalRedefined(String),
    ReturnMismatch(String, String, String),
    UndeclaredIdentifier(String),
    AssignToSelf,
    AssignUndeclared,
    AssignMismatch(String, String, String),
    NewUndefined(String),
    NonIntArguments(String, String),
    NegNonInt(String),
    NotNonBool(String),
    BasicTypeComparison,
    NonBoolPredicate(String),
    NonBoolLoopCondition,
    DuplicateBranch(String),
    SelfLetBinding,
    LetInitMismatch(String, String, String),
    UndefinedMethod(String),
    DispatchArity(String, String, usize, usize),
    DispatchArgMismatch(String, String, String, String),
    StaticDispatchMismatch(String, String),
    StaticDispatchArgMismatch(usize, String, String, String, String),
}

impl ErrorKind {
    /// The message being emitted for an error
    pub fn message(&self) -> String {
        match self {
            ErrorKind::Syntax(token) => format!("syntax error at or near {}", token),
            ErrorKind::SyntaxEof => "syntax error at or near EOF".to_string(),

            ErrorKind::RedefinedBasicClass(name) => {
                format!("Redefinition of basic class {}.", name)
            }
            ErrorKind::ClassRedefined(name) => {
                format!("Class {} was previously defined.", name)
            }
            ErrorKind::ForbiddenInheritance(name, parent) => {
                format!("Class {} cannot inherit class {}.", name, parent)
            }
            ErrorKind::NoMainClass => "Class Main is not defined.".to_string(),
            ErrorKind::NoMainMethod => "No main() method defined in Main.".to_string(),
            ErrorKind::UndefinedBaseClass(name, parent) => {
                format!("Class {} inherits from an undefined class {}.", name, parent)
            }
            ErrorKind::InheritanceCycle(name) => {
                format!("Class {} directly or indirectly inherits from itself.", name)
            }

            ErrorKind::SelfFormalName => {
                "'self' cannot be the name of a formal parameter.".to_string()
            }
            ErrorKind::SelfTypeFormal(name) => {
                format!("Formal parameter {} cannot have type SELF_TYPE.", name)
            }
            ErrorKind::MethodMultiplyDefined(name) => {
                format!("Method {} is multiply defined.", name)
            }
            ErrorKind::OverrideReturnMismatch(name) => {
                format!(
                    "Attempted to override method {} with a different return type.",
                    name
                )
            }
            ErrorKind::OverrideArityMismatch(name) => {
                format!(
                    "Incompatible number of formal parameters in redefined method {}.",
                    name
                )
            }
            ErrorKind::OverrideFormalMismatch(method, new_type, orig_type) => {
                format!(
                    "In redefined method {}, parameter type {} is different from original type {}.",
                    method, new_type, orig_type
                )
            }

            ErrorKind::AttributeRedefined(name, class) => {
                format!(
                    "Attribute {} is already defined in class {} or an inherited class.",
                    name, class
                )
            }
            ErrorKind::SelfAttributeName => {
                "'self' cannot be the name of an attribute.".to_string()
            }

            ErrorKind::AttributeInitMismatch(inferred, declared) => {
                format!(
                    "Inferred type of initialization expression {} does not match declared type {}.",
                    inferred, declared
                )
            }
            ErrorKind::UndefinedReturnType(return_type, method) => {
                format!("Undefined return type {} in method {}.", return_type, method)
            }
            ErrorKind::FormalRedefined(name) => {
                format!("Formal parameter {} is multiply defined.", name)
            }
            ErrorKind::ReturnMismatch(inferred, method, declared) => {
                format!(
                    "Inferred return type {} of method {} does not conform to declared return type {}.",
                    inferred, method, declared
                )
            }
            ErrorKind::UndeclaredIdentifier(name) => {
                format!("Undeclared identifier {}.", name)
            }
            ErrorKind::AssignToSelf => "Cannot assign to 'self'.".to_string(),
            ErrorKind::AssignUndeclared => "Target identifier has not been declared".to_string(),
            ErrorKind::AssignMismatch(inferred, declared, name) => {
                format!(
                    "Type {} of assigned expression does not conform to declared type {} of identifier {}.",
                    inferred, declared, name
                )
            }
            ErrorKind::NewUndefined(type_name) => {
                format!("'new' keyword used with undefined type {}", type_name)
            }
            ErrorKind::NonIntArguments(left, right) => {
                format!("non-Int arguments: {} + {}", left, right)
            }
            ErrorKind::NegNonInt(type_name) => {
                format!("Invalid type {} for integer complement operation.", type_name)
            }
            ErrorKind::NotNonBool(type_name) => {
                format!("Invalid type {} for not operation.", type_name)
            }
            ErrorKind::BasicTypeComparison => {
                "Illegal comparison with a basic type.".to_string()
            }
            ErrorKind::NonBoolPredicate(type_name) => {
                format!("Conditional predicate must be Bool, not {}.", type_name)
            }
            ErrorKind::NonBoolLoopCondition => {
                "Loop condition does not have type Bool.".to_string()
            }
            ErrorKind::DuplicateBranch(type_name) => {
                format!("Duplicate branch {} in case statement.", type_name)
            }
            ErrorKind::SelfLetBinding => {
                "'self' cannot be bound in a 'let' expression.".to_string()
            }
            ErrorKind::LetInitMismatch(inferred, name, declared) => {
                format!(
                    "Inferred type {} of initialization of {} does not conform to identifier's declared type {}.",
                    inferred, name, declared
                )
            }
            ErrorKind::UndefinedMethod(name) => {
                format!("Dispatch to undefined method {}.", name)
            }
            ErrorKind::DispatchArity(method, class, expected, actual) => {
                format!(
                    "Method {} in class {} takes {} argument(s), {} argument(s) provided.",
                    method, class, expected, actual
                )
            }
            ErrorKind::DispatchArgMismatch(method, arg_type, formal, declared) => {
                format!(
                    "In call of method {}, type {} of parameter {} does not conform to declared type {}.",
                    method, arg_type, formal, declared
                )
            }
            ErrorKind::StaticDispatchMismatch(expr_type, static_type) => {
                format!(
                    "Expression type {} does not conform to declared static dispatch type {}.",
                    expr_type, static_type
                )
            }
            ErrorKind::StaticDispatchArgMismatch(index, method, class, formal_type, arg_type) => {
                format!(
                    "Parameter {} of method {} in class {} accepts expressions of type {}, type {} provided.",
                    index, method, class, formal_type, arg_type
                )
            }
        }
    }
}

/// Main located error used throughout the compilation passes.
/// A negative line means the diagnostic has no useful location
/// (e.g. a missing Main class).
#[derive(Debug, PartialEq, Clone)]
pub struct Error {
    pub line: i64,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(line: u32, kind: ErrorKind) -> Self {
        Error { line: line as i64, kind }
    }

    pub fn global(kind: ErrorKind) -> Self {
        Error { line: -1, kind }
    }

    pub fn print_error(&self) {
        if self.line >= 0 {
            eprintln!("Line {}: {}", self.line, self.kind.message());
        } else {
            eprintln!("{}", self.kind.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_override_messages() {
        assert_eq!(
            ErrorKind::OverrideReturnMismatch("m".into()).message(),
            "Attempted to override method m with a different return type."
        );
        assert_eq!(
            ErrorKind::OverrideFormalMismatch("m".into(), "Bool".into(), "Int".into()).message(),
            "In redefined method m, parameter type Bool is different from original type Int."
        );
    }

    #[test]
    fn formats_dispatch_arity() {
        assert_eq!(
            ErrorKind::DispatchArity("f".into(), "A".into(), 2, 1).message(),
            "Method f in class A takes 2 argument(s), 1 argument(s) provided."
        );
    }
}
