//! Class registry: stores user classes together with the synthesized
//! built-ins, validates the inheritance graph and computes least upper
//! bounds over it.

use crate::compiler::common::{ast::*, error::*, names};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct ClassTable {
    // sorted by name; prototype and dispatch-table emission iterate this
    // map and depend on the stable order
    pub classes: BTreeMap<String, Class>,
}

fn placeholder_body() -> Expr {
    Expr::new(
        ExprKind::NoExpr { declared_type: names::NO_TYPE.to_string() },
        0,
    )
}

fn builtin_method(name: &str, formals: Vec<(&str, &str)>, return_type: &str) -> Feature {
    Feature::Method(Method {
        name: name.to_string(),
        formals: formals
            .into_iter()
            .map(|(name, declared_type)| Formal {
                name: name.to_string(),
                declared_type: declared_type.to_string(),
                line: 0,
            })
            .collect(),
        return_type: return_type.to_string(),
        body: placeholder_body(),
        line: 0,
    })
}

fn builtin_attribute(name: &str, declared_type: &str) -> Feature {
    Feature::Attribute(Attribute {
        name: name.to_string(),
        declared_type: declared_type.to_string(),
        init: placeholder_body(),
        line: 0,
    })
}

impl ClassTable {
    pub fn new(program: &Program) -> Result<Self, Error> {
        let mut table = ClassTable { classes: BTreeMap::new() };
        table.install_basic_classes();

        for class in &program.classes {
            let name = &class.name;
            let parent = &class.base_class;

            // basic classes and SELF_TYPE must not be redefined
            if matches!(
                name.as_str(),
                names::INT | names::STRING | names::BOOL | names::IO | names::OBJECT
            ) || name == names::SELF_TYPE
            {
                return Err(Error::new(
                    class.line,
                    ErrorKind::RedefinedBasicClass(name.clone()),
                ));
            }

            if table.classes.contains_key(name) {
                return Err(Error::new(class.line, ErrorKind::ClassRedefined(name.clone())));
            }

            // it is an error to inherit from Int, String, Bool or SELF_TYPE
            if matches!(
                parent.as_str(),
                names::INT | names::STRING | names::BOOL | names::SELF_TYPE
            ) {
                return Err(Error::new(
                    class.line,
                    ErrorKind::ForbiddenInheritance(name.clone(), parent.clone()),
                ));
            }

            table.classes.insert(name.clone(), class.clone());
        }

        let main_class = table
            .classes
            .get(names::MAIN_CLASS)
            .ok_or_else(|| Error::global(ErrorKind::NoMainClass))?;

        if !main_class.methods().any(|method| method.name == names::MAIN_METHOD) {
            return Err(Error::new(main_class.line, ErrorKind::NoMainMethod));
        }

        table.check_inheritance_graph()?;
        Ok(table)
    }

    fn install_basic_classes(&mut self) {
        let mut object_class = Class::new(names::OBJECT.to_string(), 0);
        // Object is the root of the hierarchy
        object_class.base_class.clear();
        object_class.features = vec![
            builtin_method(names::ABORT, vec![], names::OBJECT),
            builtin_method(names::TYPE_NAME, vec![], names::STRING),
            builtin_method(names::COPY, vec![], names::SELF_TYPE),
        ];

        let mut io_class = Class::new(names::IO.to_string(), 0);
        io_class.features = vec![
            builtin_method(names::OUT_STRING, vec![(names::ARG, names::STRING)], names::SELF_TYPE),
            builtin_method(names::OUT_INT, vec![(names::ARG, names::INT)], names::SELF_TYPE),
            builtin_method(names::IN_STRING, vec![], names::STRING),
            builtin_method(names::IN_INT, vec![], names::INT),
        ];

        let mut int_class = Class::new(names::INT.to_string(), 0);
        int_class.features = vec![builtin_attribute(names::VAL, names::PRIM_SLOT)];

        let mut bool_class = Class::new(names::BOOL.to_string(), 0);
        bool_class.features = vec![builtin_attribute(names::VAL, names::PRIM_SLOT)];

        let mut string_class = Class::new(names::STRING.to_string(), 0);
        string_class.features = vec![
            builtin_attribute(names::VAL, names::INT),
            builtin_attribute(names::STR_FIELD, names::PRIM_SLOT),
            builtin_method(names::LENGTH, vec![], names::INT),
            builtin_method(names::CONCAT, vec![(names::ARG, names::STRING)], names::STRING),
            builtin_method(
                names::SUBSTR,
                vec![(names::ARG1, names::INT), (names::ARG2, names::INT)],
                names::STRING,
            ),
        ];

        for class in [object_class, io_class, int_class, bool_class, string_class] {
            self.classes.insert(class.name.clone(), class);
        }
    }

    fn check_inheritance_graph(&self) -> Result<(), Error> {
        // verify that all parent classes actually exist
        for (name, class) in &self.classes {
            if name == names::OBJECT {
                continue;
            }
            if !self.classes.contains_key(&class.base_class) {
                return Err(Error::new(
                    class.line,
                    ErrorKind::UndefinedBaseClass(name.clone(), class.base_class.clone()),
                ));
            }
        }

        // check for cycles; the walk is bounded so classes pointing into a
        // cycle they are not part of also terminate
        for (name, class) in &self.classes {
            let mut ancestor = name.as_str();
            let mut steps = 0;

            while ancestor != names::OBJECT {
                ancestor = &self.classes[ancestor].base_class;
                steps += 1;

                if ancestor == name || steps > self.classes.len() {
                    return Err(Error::new(
                        class.line,
                        ErrorKind::InheritanceCycle(name.clone()),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> &Class {
        &self.classes[name]
    }

    /// `name, parent, grandparent, ..., Object`
    pub fn ancestry(&self, name: &str) -> Vec<String> {
        let mut ancestry = Vec::new();
        let mut node = name;

        while node != names::OBJECT {
            ancestry.push(node.to_string());
            node = &self.classes[node].base_class;
        }
        ancestry.push(names::OBJECT.to_string());

        ancestry
    }

    /// Nearest common ancestor: the first class of `a`'s ancestry that also
    /// appears in `b`'s
    pub fn lub(&self, a: &str, b: &str) -> String {
        let ancestry_a = self.ancestry(a);
        let ancestry_b = self.ancestry(b);

        for ancestor in &ancestry_a {
            if ancestry_b.contains(ancestor) {
                return ancestor.clone();
            }
        }

        names::OBJECT.to_string()
    }

    pub fn lub_all(&self, types: &[String]) -> String {
        let mut lub = types[0].clone();
        for ty in types {
            lub = self.lub(&lub, ty);
        }
        lub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::Parser;
    use crate::compiler::scanner::Scanner;

    fn setup(input: &str) -> Result<ClassTable, Error> {
        let program = Parser::new(Scanner::new(input).scan()).parse().unwrap();
        ClassTable::new(&program)
    }

    const HIERARCHY: &str = "
        class A { f():Int { 0 }; };
        class B inherits A { };
        class C inherits A { };
        class D inherits C { };
        class Main { main():Int { 0 }; };
    ";

    #[test]
    fn builds_ancestry() {
        let table = setup(HIERARCHY).unwrap();
        assert_eq!(table.ancestry("D"), vec!["D", "C", "A", "Object"]);
        assert_eq!(table.ancestry("Object"), vec!["Object"]);
        assert_eq!(table.ancestry("String"), vec!["String", "Object"]);
    }

    #[test]
    fn lub_laws() {
        let table = setup(HIERARCHY).unwrap();

        // reflexive
        assert_eq!(table.lub("B", "B"), "B");
        // Object is the top
        assert_eq!(table.lub("B", "Object"), "Object");
        // commutative
        assert_eq!(table.lub("B", "C"), table.lub("C", "B"));
        // nearest common ancestor
        assert_eq!(table.lub("B", "D"), "A");
        assert_eq!(table.lub("C", "D"), "C");
        // unrelated classes meet at Object
        assert_eq!(table.lub("Int", "String"), "Object");
        assert_eq!(table.lub_all(&["B".to_string(), "C".to_string(), "D".to_string()]), "A");
    }

    #[test]
    fn ancestor_walk_terminates_quickly() {
        let table = setup(HIERARCHY).unwrap();
        for name in table.classes.keys() {
            assert!(table.ancestry(name).len() <= table.classes.len());
        }
    }

    #[test]
    fn rejects_redefined_basic_class() {
        let err = setup("class Int { }; class Main { main():Int { 0 }; };").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RedefinedBasicClass("Int".to_string()));
    }

    #[test]
    fn rejects_duplicate_class() {
        let err = setup("class A { }; class A { }; class Main { main():Int { 0 }; };").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ClassRedefined("A".to_string()));
    }

    #[test]
    fn rejects_inheriting_from_bool() {
        let err = setup("class A inherits Bool { }; class Main { main():Int { 0 }; };").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ForbiddenInheritance("A".to_string(), "Bool".to_string())
        );
    }

    #[test]
    fn requires_main_class_and_method() {
        assert_eq!(setup("class A { };").unwrap_err().kind, ErrorKind::NoMainClass);
        assert_eq!(
            setup("class Main { f():Int { 0 }; };").unwrap_err().kind,
            ErrorKind::NoMainMethod
        );
    }

    #[test]
    fn rejects_undefined_base_class() {
        let err = setup("class A inherits Missing { }; class Main { main():Int { 0 }; };")
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UndefinedBaseClass("A".to_string(), "Missing".to_string())
        );
    }

    #[test]
    fn rejects_inheritance_cycle() {
        let err = setup(
            "class A inherits B { }; class B inherits A { }; class Main { main():Int { 0 }; };",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InheritanceCycle(_)));
    }

    #[test]
    fn rejects_class_pointing_into_cycle() {
        // C is not itself part of the cycle but never reaches Object
        let err = setup(
            "class A inherits B { }; class B inherits A { }; class C inherits B { }; class Main { main():Int { 0 }; };",
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InheritanceCycle(_)));
    }
}
