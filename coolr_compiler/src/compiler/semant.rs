//! Semantic analysis: annotates every expression with its inferred type and
//! enforces the typing rules.
//!
//! `SELF_TYPE` resolves to the current class while checking conformance but
//! is propagated unchanged as the checked type when the expression itself
//! was SELF_TYPE-typed. Analysis halts on the first error.

use crate::compiler::classtable::ClassTable;
use crate::compiler::common::{ast::*, error::*, names};
use std::collections::{HashMap, HashSet};

/// Flat mapping `(class, method) -> method definition`; inherited methods
/// are copied into each subclass's entry
struct MethodEnv {
    methods: HashMap<(String, String), Method>,
}

impl MethodEnv {
    fn new() -> Self {
        MethodEnv { methods: HashMap::new() }
    }
    fn find(&self, class: &str, method: &str) -> Option<&Method> {
        self.methods.get(&(class.to_string(), method.to_string()))
    }
    fn set(&mut self, class: &str, method: Method) {
        self.methods
            .insert((class.to_string(), method.name.clone()), method);
    }
}

/// Stack of scopes mapping variable name -> declared type
struct ObjectEnv {
    scopes: Vec<HashMap<String, String>>,
}

impl ObjectEnv {
    fn new() -> Self {
        ObjectEnv { scopes: Vec::new() }
    }
    fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }
    fn exit_scope(&mut self) {
        self.scopes.pop();
    }
    fn add(&mut self, name: &str, declared_type: &str) {
        self.scopes
            .last_mut()
            .expect("scope entered before adding")
            .insert(name.to_string(), declared_type.to_string());
    }
    /// Only looks in the innermost scope; shadowing deeper in the stack is
    /// legal
    fn probe(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
    }
    /// Newest-first lookup across all scopes
    fn lookup(&self, name: &str) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }
}

pub struct TypeChecker {
    classtable: ClassTable,
    methods: MethodEnv,
    objects: ObjectEnv,
    current_class: String,
}

impl TypeChecker {
    pub fn new(program: &Program) -> Result<Self, Error> {
        let classtable = ClassTable::new(program)?;
        let mut checker = TypeChecker {
            classtable,
            methods: MethodEnv::new(),
            objects: ObjectEnv::new(),
            current_class: String::new(),
        };
        checker.build_method_env()?;
        Ok(checker)
    }

    /// Annotates the whole program; returns the class table for code
    /// generation
    pub fn check(mut self, program: &mut Program) -> Result<ClassTable, Error> {
        for class in program.classes.iter_mut() {
            self.check_class(class)?;
        }
        Ok(self.classtable)
    }

    fn resolve(&self, type_name: &str) -> String {
        if type_name == names::SELF_TYPE {
            self.current_class.clone()
        } else {
            type_name.to_string()
        }
    }

    /// `a` conforms to `b` after SELF_TYPE resolution
    fn conforms(&self, a: &str, b: &str) -> bool {
        self.lub(a, b) == b
    }

    fn lub(&self, a: &str, b: &str) -> String {
        // undeclared types fall back to Object so the caller reports a
        // conformance error instead of crashing
        if !self.classtable.exists(a) || !self.classtable.exists(b) {
            return names::OBJECT.to_string();
        }
        self.classtable.lub(a, b)
    }

    // Classes inherit every method from their ancestors, so each class's
    // entry is filled by walking the ancestry from Object downward; a
    // class's own methods may override on the way.
    fn build_method_env(&mut self) -> Result<(), Error> {
        let class_names: Vec<String> = self.classtable.classes.keys().cloned().collect();

        for name in class_names {
            let ancestry = self.classtable.ancestry(&name);
            for ancestor in ancestry.iter().rev() {
                self.add_class_methods(&name, ancestor)?;
            }
        }
        Ok(())
    }

    fn add_class_methods(&mut self, entry: &str, ancestor: &str) -> Result<(), Error> {
        // set of methods added at this ancestry level, to tell overriding
        // apart from a method defined twice in one class
        let mut added: HashSet<String> = HashSet::new();

        let ancestor_class = self.classtable.get(ancestor).clone();
        for method in ancestor_class.methods() {
            for formal in &method.formals {
                if formal.name == names::SELF {
                    return Err(Error::new(formal.line, ErrorKind::SelfFormalName));
                }
                if formal.declared_type == names::SELF_TYPE {
                    return Err(Error::new(
                        formal.line,
                        ErrorKind::SelfTypeFormal(formal.name.clone()),
                    ));
                }
            }

            if let Some(original) = self.methods.find(entry, &method.name) {
                if added.contains(&method.name) {
                    return Err(Error::new(
                        method.line,
                        ErrorKind::MethodMultiplyDefined(method.name.clone()),
                    ));
                }

                // overriding: the signature must match the original exactly
                if original.return_type != method.return_type {
                    return Err(Error::new(
                        method.line,
                        ErrorKind::OverrideReturnMismatch(method.name.clone()),
                    ));
                }
                if original.formals.len() != method.formals.len() {
                    return Err(Error::new(
                        method.line,
                        ErrorKind::OverrideArityMismatch(method.name.clone()),
                    ));
                }
                for (formal, original_formal) in method.formals.iter().zip(&original.formals) {
                    if formal.declared_type != original_formal.declared_type {
                        return Err(Error::new(
                            formal.line,
                            ErrorKind::OverrideFormalMismatch(
                                method.name.clone(),
                                formal.declared_type.clone(),
                                original_formal.declared_type.clone(),
                            ),
                        ));
                    }
                }
            }

            added.insert(method.name.clone());
            self.methods.set(entry, method.clone());
        }
        Ok(())
    }

    fn check_class(&mut self, class: &mut Class) -> Result<(), Error> {
        self.current_class = class.name.clone();
        self.objects.enter_scope();

        // the outermost scope of a class holds its attributes (inherited
        // ones included) plus self
        self.build_class_object_env(&class.name)?;
        self.objects.add(names::SELF, names::SELF_TYPE);

        for feature in class.features.iter_mut() {
            match feature {
                Feature::Attribute(attr) => self.check_attribute(attr)?,
                Feature::Method(method) => self.check_method(method)?,
            }
        }

        self.objects.exit_scope();
        Ok(())
    }

    fn build_class_object_env(&mut self, class_name: &str) -> Result<(), Error> {
        let ancestry = self.classtable.ancestry(class_name);

        for ancestor in ancestry.iter().rev() {
            let ancestor_class = self.classtable.get(ancestor).clone();
            for attr in ancestor_class.attributes() {
                // redefining an attribute is illegal anywhere in the chain
                if self.objects.probe(&attr.name) {
                    return Err(Error::new(
                        attr.line,
                        ErrorKind::AttributeRedefined(
                            attr.name.clone(),
                            ancestor_class.name.clone(),
                        ),
                    ));
                }
                if attr.name == names::SELF {
                    return Err(Error::new(attr.line, ErrorKind::SelfAttributeName));
                }
                self.objects.add(&attr.name, &attr.declared_type);
            }
        }
        Ok(())
    }

    fn check_attribute(&mut self, attr: &mut Attribute) -> Result<(), Error> {
        let inferred = self.typecheck_expr(&mut attr.init)?;
        let resolved_inferred = self.resolve(&inferred);

        // an absent initializer types to _no_type and conforms to anything
        if resolved_inferred != names::NO_TYPE {
            let resolved_declared = self.resolve(&attr.declared_type);
            if !self.conforms(&resolved_inferred, &resolved_declared) {
                return Err(Error::new(
                    attr.init.line,
                    ErrorKind::AttributeInitMismatch(inferred, attr.declared_type.clone()),
                ));
            }
        }
        Ok(())
    }

    fn check_method(&mut self, method: &mut Method) -> Result<(), Error> {
        if method.return_type != names::SELF_TYPE && !self.classtable.exists(&method.return_type) {
            return Err(Error::new(
                method.line,
                ErrorKind::UndefinedReturnType(method.return_type.clone(), method.name.clone()),
            ));
        }

        self.objects.enter_scope();
        for formal in &method.formals {
            if self.objects.probe(&formal.name) {
                return Err(Error::new(
                    formal.line,
                    ErrorKind::FormalRedefined(formal.name.clone()),
                ));
            }
            self.objects.add(&formal.name, &formal.declared_type);
        }

        let inferred = self.typecheck_expr(&mut method.body)?;
        let resolved_inferred = self.resolve(&inferred);
        let resolved_return = self.resolve(&method.return_type);

        // a declared SELF_TYPE return must be inferred as SELF_TYPE, not
        // just resolve to a conforming class; otherwise subclasses would
        // observe the parent type
        if (method.return_type == names::SELF_TYPE && inferred != names::SELF_TYPE)
            || !self.conforms(&resolved_inferred, &resolved_return)
        {
            return Err(Error::new(
                method.body.line,
                ErrorKind::ReturnMismatch(
                    inferred,
                    method.name.clone(),
                    method.return_type.clone(),
                ),
            ));
        }

        self.objects.exit_scope();
        Ok(())
    }

    fn typecheck_expr(&mut self, expr: &mut Expr) -> Result<String, Error> {
        let line = expr.line;
        let checked_type = match &mut expr.kind {
            ExprKind::NoExpr { .. } => names::NO_TYPE.to_string(),
            ExprKind::Int(_) => names::INT.to_string(),
            ExprKind::Str(_) => names::STRING.to_string(),
            ExprKind::Bool(_) => names::BOOL.to_string(),

            ExprKind::Identifier(name) => {
                if name.as_str() == names::SELF {
                    names::SELF_TYPE.to_string()
                } else {
                    self.objects.lookup(name).ok_or_else(|| {
                        Error::new(line, ErrorKind::UndeclaredIdentifier(name.clone()))
                    })?
                }
            }

            ExprKind::Assign { name, expr } => {
                if name.as_str() == names::SELF {
                    return Err(Error::new(line, ErrorKind::AssignToSelf));
                }
                let name = name.clone();
                let declared = self
                    .objects
                    .lookup(&name)
                    .ok_or_else(|| Error::new(line, ErrorKind::AssignUndeclared))?;

                let inferred = self.typecheck_expr(expr)?;
                let resolved_declared = self.resolve(&declared);
                let resolved_inferred = self.resolve(&inferred);

                if !self.conforms(&resolved_inferred, &resolved_declared) {
                    return Err(Error::new(
                        line,
                        ErrorKind::AssignMismatch(inferred, declared, name),
                    ));
                }
                inferred
            }

            ExprKind::New { class } => {
                let resolved = self.resolve(class);
                if !self.classtable.exists(&resolved) {
                    return Err(Error::new(line, ErrorKind::NewUndefined(class.clone())));
                }
                class.clone()
            }

            ExprKind::Unary { op: UnOp::IsVoid, expr, .. } => {
                self.typecheck_expr(expr)?;
                names::BOOL.to_string()
            }

            ExprKind::Unary { op: UnOp::Neg, expr, .. } => {
                let inferred = self.typecheck_expr(expr)?;
                if inferred != names::INT {
                    return Err(Error::new(expr.line, ErrorKind::NegNonInt(inferred)));
                }
                names::INT.to_string()
            }

            ExprKind::Unary { op: UnOp::Not, expr, .. } => {
                let inferred = self.typecheck_expr(expr)?;
                if inferred != names::BOOL {
                    return Err(Error::new(expr.line, ErrorKind::NotNonBool(inferred)));
                }
                names::BOOL.to_string()
            }

            ExprKind::Binary { op, lhs, rhs, .. } => {
                let op = *op;
                let first = self.typecheck_expr(lhs)?;
                let second = self.typecheck_expr(rhs)?;

                match op {
                    BinOp::Plus | BinOp::Minus | BinOp::Mul | BinOp::Div => {
                        if first != names::INT || second != names::INT {
                            return Err(Error::new(
                                line,
                                ErrorKind::NonIntArguments(first, second),
                            ));
                        }
                        names::INT.to_string()
                    }
                    BinOp::Lt | BinOp::Leq => {
                        if first != names::INT || second != names::INT {
                            return Err(Error::new(
                                line,
                                ErrorKind::NonIntArguments(first, second),
                            ));
                        }
                        names::BOOL.to_string()
                    }
                    BinOp::Eq => {
                        // equality is defined for all types, but a basic
                        // type can only be compared to the same basic type
                        let mismatched_basic = [names::INT, names::STRING, names::BOOL]
                            .iter()
                            .any(|basic| (first == *basic) != (second == *basic));
                        if mismatched_basic {
                            return Err(Error::new(line, ErrorKind::BasicTypeComparison));
                        }
                        names::BOOL.to_string()
                    }
                }
            }

            ExprKind::If { predicate, then_branch, else_branch } => {
                let predicate_type = self.typecheck_expr(predicate)?;
                let then_type = self.typecheck_expr(then_branch)?;
                let else_type = self.typecheck_expr(else_branch)?;

                if predicate_type != names::BOOL {
                    return Err(Error::new(
                        predicate.line,
                        ErrorKind::NonBoolPredicate(predicate_type),
                    ));
                }

                if then_type == names::SELF_TYPE && else_type == names::SELF_TYPE {
                    names::SELF_TYPE.to_string()
                } else {
                    self.lub(&self.resolve(&then_type), &self.resolve(&else_type))
                }
            }

            ExprKind::While { predicate, body } => {
                let predicate_type = self.typecheck_expr(predicate)?;
                self.typecheck_expr(body)?;

                if predicate_type != names::BOOL {
                    return Err(Error::new(predicate.line, ErrorKind::NonBoolLoopCondition));
                }
                names::OBJECT.to_string()
            }

            ExprKind::Block { exprs } => {
                let mut block_type = names::NO_TYPE.to_string();
                for expr in exprs.iter_mut() {
                    block_type = self.typecheck_expr(expr)?;
                }
                block_type
            }

            ExprKind::Let { initializers, body } => {
                self.objects.enter_scope();

                for init in initializers.iter_mut() {
                    let init_type = self.typecheck_expr(&mut init.init)?;
                    let resolved_init = self.resolve(&init_type);
                    let resolved_declared = self.resolve(&init.declared_type);

                    if init.name == names::SELF {
                        return Err(Error::new(init.init.line, ErrorKind::SelfLetBinding));
                    }
                    if resolved_init != names::NO_TYPE
                        && !self.conforms(&resolved_init, &resolved_declared)
                    {
                        return Err(Error::new(
                            init.init.line,
                            ErrorKind::LetInitMismatch(
                                init_type,
                                init.name.clone(),
                                init.declared_type.clone(),
                            ),
                        ));
                    }

                    // earlier bindings are visible to later initializers
                    self.objects.add(&init.name, &init.declared_type);
                }

                let body_type = self.typecheck_expr(body)?;
                for init in initializers.iter_mut() {
                    init.checked_type = body_type.clone();
                }

                self.objects.exit_scope();
                body_type
            }

            ExprKind::Case { target, branches } => {
                self.typecheck_expr(target)?;

                let mut declared_types: Vec<String> = Vec::new();
                let mut branch_types: Vec<String> = Vec::new();
                let mut all_self_type = true;

                for branch in branches.iter_mut() {
                    // the bound identifier is visible in the branch body
                    self.objects.enter_scope();
                    self.objects.add(&branch.name, &branch.declared_type);

                    let branch_type = self.typecheck_expr(&mut branch.body)?;

                    if declared_types.contains(&branch.declared_type) {
                        return Err(Error::new(
                            branch.body.line,
                            ErrorKind::DuplicateBranch(branch.declared_type.clone()),
                        ));
                    }
                    declared_types.push(branch.declared_type.clone());
                    branch_types.push(self.resolve(&branch_type));
                    all_self_type &= branch_type == names::SELF_TYPE;

                    self.objects.exit_scope();
                }

                if all_self_type {
                    names::SELF_TYPE.to_string()
                } else {
                    self.classtable.lub_all(&branch_types)
                }
            }

            ExprKind::Dispatch { object, method, args } => {
                let method = method.clone();
                let object_type = self.typecheck_expr(object)?;
                let resolved_class = self.resolve(&object_type);

                let signature = self
                    .methods
                    .find(&resolved_class, &method)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(object.line, ErrorKind::UndefinedMethod(method.clone()))
                    })?;

                if args.len() != signature.formals.len() {
                    return Err(Error::new(
                        signature.line,
                        ErrorKind::DispatchArity(
                            method,
                            resolved_class,
                            signature.formals.len(),
                            args.len(),
                        ),
                    ));
                }

                for (arg, formal) in args.iter_mut().zip(&signature.formals) {
                    let arg_type = self.typecheck_expr(arg)?;
                    let resolved_arg = self.resolve(&arg_type);
                    if !self.conforms(&resolved_arg, &formal.declared_type) {
                        return Err(Error::new(
                            arg.line,
                            ErrorKind::DispatchArgMismatch(
                                method,
                                arg_type,
                                formal.name.clone(),
                                formal.declared_type.clone(),
                            ),
                        ));
                    }
                }

                // a SELF_TYPE return refers to the class of the receiver
                if signature.return_type == names::SELF_TYPE {
                    object_type
                } else {
                    signature.return_type
                }
            }

            ExprKind::StaticDispatch { object, static_type, method, args } => {
                let method = method.clone();
                let static_type = static_type.clone();
                let object_type = self.typecheck_expr(object)?;
                let resolved_static = self.resolve(&static_type);
                let resolved_object = self.resolve(&object_type);

                if !self.conforms(&resolved_object, &resolved_static) {
                    return Err(Error::new(
                        object.line,
                        ErrorKind::StaticDispatchMismatch(object_type, static_type),
                    ));
                }

                let signature = self
                    .methods
                    .find(&resolved_static, &method)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(object.line, ErrorKind::UndefinedMethod(method.clone()))
                    })?;

                if args.len() != signature.formals.len() {
                    return Err(Error::new(
                        signature.line,
                        ErrorKind::DispatchArity(
                            method,
                            resolved_static,
                            signature.formals.len(),
                            args.len(),
                        ),
                    ));
                }

                for (index, (arg, formal)) in args.iter_mut().zip(&signature.formals).enumerate() {
                    let arg_type = self.typecheck_expr(arg)?;
                    let resolved_arg = self.resolve(&arg_type);
                    if !self.conforms(&resolved_arg, &formal.declared_type) {
                        return Err(Error::new(
                            arg.line,
                            ErrorKind::StaticDispatchArgMismatch(
                                index + 1,
                                method,
                                resolved_static,
                                formal.declared_type.clone(),
                                arg_type,
                            ),
                        ));
                    }
                }

                if signature.return_type == names::SELF_TYPE {
                    object_type
                } else {
                    signature.return_type
                }
            }
        };

        expr.checked_type = checked_type.clone();
        Ok(checked_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::Parser;
    use crate::compiler::scanner::Scanner;

    fn setup(input: &str) -> Result<Program, Error> {
        let mut program = Parser::new(Scanner::new(input).scan()).parse().unwrap();
        TypeChecker::new(&program)?.check(&mut program)?;
        Ok(program)
    }

    fn setup_err(input: &str) -> Error {
        setup(input).unwrap_err()
    }

    fn main_body(program: &Program) -> &Expr {
        let main_class = program
            .classes
            .iter()
            .find(|class| class.name == "Main")
            .unwrap();
        &main_class.methods().next().unwrap().body
    }

    #[test]
    fn annotates_arithmetic() {
        let program = setup("class Main { main():Int { 2+3 }; };").unwrap();
        let body = main_body(&program);
        assert_eq!(body.checked_type, "Int");
        if let ExprKind::Binary { lhs, rhs, .. } = &body.kind {
            assert_eq!(lhs.checked_type, "Int");
            assert_eq!(rhs.checked_type, "Int");
        } else {
            panic!("expected binary expression");
        }
    }

    #[test]
    fn conditional_types_to_lub_of_branches() {
        let program = setup(
            "class A { };
             class B inherits A { };
             class C inherits A { };
             class Main { main():A { if true then (new B) else (new C) fi }; };",
        )
        .unwrap();
        assert_eq!(main_body(&program).checked_type, "A");
    }

    #[test]
    fn conditional_of_self_types_stays_self_type() {
        let program = setup(
            "class Main { main():SELF_TYPE { if true then self else self fi }; };",
        )
        .unwrap();
        assert_eq!(main_body(&program).checked_type, "SELF_TYPE");
    }

    #[test]
    fn override_with_different_return_type_is_rejected() {
        let err = setup_err(
            "class A { m():Int { 0 }; };
             class B inherits A { m():Bool { true }; };
             class Main { main():Int { 0 }; };",
        );
        assert_eq!(err.kind, ErrorKind::OverrideReturnMismatch("m".to_string()));
    }

    #[test]
    fn override_with_different_arity_is_rejected() {
        let err = setup_err(
            "class A { m(x:Int):Int { 0 }; };
             class B inherits A { m():Int { 0 }; };
             class Main { main():Int { 0 }; };",
        );
        assert_eq!(err.kind, ErrorKind::OverrideArityMismatch("m".to_string()));
    }

    #[test]
    fn override_with_different_formal_type_is_rejected() {
        let err = setup_err(
            "class A { m(x:Int):Int { 0 }; };
             class B inherits A { m(x:Bool):Int { 0 }; };
             class Main { main():Int { 0 }; };",
        );
        assert_eq!(
            err.kind,
            ErrorKind::OverrideFormalMismatch("m".to_string(), "Bool".to_string(), "Int".to_string())
        );
    }

    #[test]
    fn method_defined_twice_in_one_class() {
        let err = setup_err(
            "class Main { main():Int { 0 }; main():Int { 1 }; };",
        );
        assert_eq!(err.kind, ErrorKind::MethodMultiplyDefined("main".to_string()));
    }

    #[test]
    fn self_restrictions_on_formals() {
        let err = setup_err("class Main { main(self:Int):Int { 0 }; };");
        assert_eq!(err.kind, ErrorKind::SelfFormalName);

        let err = setup_err("class Main { main(x:SELF_TYPE):Int { 0 }; };");
        assert_eq!(err.kind, ErrorKind::SelfTypeFormal("x".to_string()));
    }

    #[test]
    fn inherited_attribute_cannot_be_redefined() {
        let err = setup_err(
            "class A { x:Int; };
             class B inherits A { x:Int; };
             class Main { main():Int { 0 }; };",
        );
        assert!(matches!(err.kind, ErrorKind::AttributeRedefined(name, _) if name == "x"));
    }

    #[test]
    fn undeclared_identifier_is_rejected() {
        let err = setup_err("class Main { main():Int { missing }; };");
        assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier("missing".to_string()));
    }

    #[test]
    fn cannot_assign_to_self() {
        let err = setup_err("class Main { main():Object { self <- new Main }; };");
        assert_eq!(err.kind, ErrorKind::AssignToSelf);
    }

    #[test]
    fn assignment_must_conform() {
        let err = setup_err(
            "class Main { x:Int; main():Int { x <- \"str\" }; };",
        );
        assert_eq!(
            err.kind,
            ErrorKind::AssignMismatch("String".to_string(), "Int".to_string(), "x".to_string())
        );
    }

    #[test]
    fn equality_on_mixed_basic_types_is_rejected() {
        let err = setup_err("class Main { main():Bool { 1 = \"a\" }; };");
        assert_eq!(err.kind, ErrorKind::BasicTypeComparison);

        // reference comparisons are fine
        setup("class A { }; class Main { main():Bool { (new A) = (new Main) }; };").unwrap();
    }

    #[test]
    fn while_types_to_object() {
        let program = setup(
            "class Main { main():Object { while false loop 1 pool }; };",
        )
        .unwrap();
        assert_eq!(main_body(&program).checked_type, "Object");
    }

    #[test]
    fn let_bindings_are_visible_to_later_initializers() {
        setup("class Main { main():Int { let x:Int <- 1, y:Int <- x in y }; };").unwrap();
    }

    #[test]
    fn let_cannot_bind_self() {
        let err = setup_err("class Main { main():Int { let self:Int in 0 }; };");
        assert_eq!(err.kind, ErrorKind::SelfLetBinding);
    }

    #[test]
    fn case_with_duplicate_branch_types() {
        let err = setup_err(
            "class Main { main():Int { case 1 of a:Int => 1; b:Int => 2; esac }; };",
        );
        assert_eq!(err.kind, ErrorKind::DuplicateBranch("Int".to_string()));
    }

    #[test]
    fn dispatch_to_undefined_method() {
        let err = setup_err("class Main { main():Int { missing() }; };");
        assert_eq!(err.kind, ErrorKind::UndefinedMethod("missing".to_string()));
    }

    #[test]
    fn dispatch_arity_is_checked() {
        let err = setup_err(
            "class A { f(x:Int):Int { x }; };
             class Main { main():Int { (new A).f() }; };",
        );
        assert_eq!(
            err.kind,
            ErrorKind::DispatchArity("f".to_string(), "A".to_string(), 1, 0)
        );
    }

    #[test]
    fn dispatch_argument_must_conform() {
        let err = setup_err(
            "class A { f(x:Int):Int { x }; };
             class Main { main():Int { (new A).f(true) }; };",
        );
        assert_eq!(
            err.kind,
            ErrorKind::DispatchArgMismatch(
                "f".to_string(),
                "Bool".to_string(),
                "x".to_string(),
                "Int".to_string()
            )
        );
    }

    #[test]
    fn self_type_return_propagates_receiver_type() {
        let program = setup(
            "class Main { main():Main { (new Main).copy() }; };",
        )
        .unwrap();
        assert_eq!(main_body(&program).checked_type, "Main");
    }

    #[test]
    fn self_type_return_must_be_inferred_self_type() {
        let err = setup_err("class Main { main():SELF_TYPE { new Main }; };");
        assert_eq!(
            err.kind,
            ErrorKind::ReturnMismatch(
                "Main".to_string(),
                "main".to_string(),
                "SELF_TYPE".to_string()
            )
        );
    }

    #[test]
    fn static_dispatch_requires_conformance() {
        let err = setup_err(
            "class A { f():Int { 0 }; };
             class Main { main():Int { (new Main)@A.f() }; };",
        );
        assert_eq!(
            err.kind,
            ErrorKind::StaticDispatchMismatch("Main".to_string(), "A".to_string())
        );
    }

    #[test]
    fn static_dispatch_uses_named_class() {
        let program = setup(
            "class A { f():Int { 0 }; };
             class B inherits A { f():Int { 1 }; };
             class Main { main():Int { (new B)@A.f() }; };",
        )
        .unwrap();
        assert_eq!(main_body(&program).checked_type, "Int");
    }

    #[test]
    fn undefined_return_type_is_rejected() {
        let err = setup_err("class Main { main():Missing { 0 }; };");
        assert_eq!(
            err.kind,
            ErrorKind::UndefinedReturnType("Missing".to_string(), "main".to_string())
        );
    }

    #[test]
    fn every_expression_is_annotated() {
        fn assert_annotated(expr: &Expr) {
            if matches!(expr.kind, ExprKind::NoExpr { .. }) {
                assert_eq!(expr.checked_type, "_no_type");
                return;
            }
            assert_ne!(expr.checked_type, "_no_type", "missing annotation: {:?}", expr.kind);

            match &expr.kind {
                ExprKind::Assign { expr, .. } | ExprKind::Unary { expr, .. } => {
                    assert_annotated(expr)
                }
                ExprKind::Binary { lhs, rhs, .. } => {
                    assert_annotated(lhs);
                    assert_annotated(rhs);
                }
                ExprKind::If { predicate, then_branch, else_branch } => {
                    assert_annotated(predicate);
                    assert_annotated(then_branch);
                    assert_annotated(else_branch);
                }
                ExprKind::While { predicate, body } => {
                    assert_annotated(predicate);
                    assert_annotated(body);
                }
                ExprKind::Block { exprs } => exprs.iter().for_each(assert_annotated),
                ExprKind::Let { initializers, body } => {
                    initializers.iter().for_each(|init| assert_annotated(&init.init));
                    assert_annotated(body);
                }
                ExprKind::Case { target, branches } => {
                    assert_annotated(target);
                    branches.iter().for_each(|branch| assert_annotated(&branch.body));
                }
                ExprKind::Dispatch { object, args, .. }
                | ExprKind::StaticDispatch { object, args, .. } => {
                    assert_annotated(object);
                    args.iter().for_each(assert_annotated);
                }
                _ => (),
            }
        }

        let program = setup(
            "class A { x:Int <- 3; f(y:Int):Int { x + y }; };
             class Main inherits IO {
               main():Object {{
                 out_string(\"hi\");
                 let a:A <- new A in case a of b:A => b.f(1); o:Object => 0; esac;
                 while false loop ~1 pool;
               }};
             };",
        )
        .unwrap();

        for class in &program.classes {
            for feature in &class.features {
                match feature {
                    Feature::Attribute(attr) => assert_annotated(&attr.init),
                    Feature::Method(method) => assert_annotated(&method.body),
                }
            }
        }
    }
}
