//! Code generation: annotated AST + class table -> 32-bit x86 NASM text.
//!
//! Objects are laid out as five header words (class tag, type-name pointer,
//! size in bytes, dispatch-table pointer, parent prototype pointer) followed
//! by the attribute slots, inherited attributes first. Every expression
//! leaves its result object pointer in eax.

pub mod builtins;
pub mod scope;

use crate::compiler::classtable::ClassTable;
use crate::compiler::common::{ast::*, names};
use crate::compiler::codegen::scope::ScopeStack;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

const NUM_OBJ_HEADERS: u32 = 5;
const WORD_SIZE: u32 = 4;
const PARENT_PROTO_OFFSET: u32 = 16;
const DISPATCH_PTR_OFFSET: u32 = 12;
const OBJ_SIZE_OFFSET: u32 = 8;

/// Byte offsets of attribute slots and dispatch-table entries, recorded
/// while the prototypes and tables are laid out and queried by the
/// expression emitter. Attributes and methods live in separate maps since a
/// class may legally use the same name for both.
struct OffsetTable {
    attributes: HashMap<(String, String), u32>,
    methods: HashMap<(String, String), u32>,
}

impl OffsetTable {
    fn new() -> Self {
        OffsetTable {
            attributes: HashMap::new(),
            methods: HashMap::new(),
        }
    }
    fn set_attribute(&mut self, class: &str, attribute: &str, offset: u32) {
        self.attributes
            .insert((class.to_string(), attribute.to_string()), offset);
    }
    fn attribute(&self, class: &str, attribute: &str) -> u32 {
        self.attributes[&(class.to_string(), attribute.to_string())]
    }
    fn set_method(&mut self, class: &str, method: &str, offset: u32) {
        self.methods
            .insert((class.to_string(), method.to_string()), offset);
    }
    fn method(&self, class: &str, method: &str) -> u32 {
        self.methods[&(class.to_string(), method.to_string())]
    }
}

pub struct Codegen<'a> {
    program: &'a Program,
    classtable: &'a ClassTable,

    // generated assembly is appended here in a streaming manner
    output: String,

    // class name -> unique tag, handed out from 100 upward in class-table
    // order; the case emitter compares these at runtime
    class_tags: BTreeMap<String, u32>,
    next_class_tag: u32,

    offsets: OffsetTable,

    scopes: ScopeStack,

    // interned string label -> raw bytes, flushed into the data section
    strings: BTreeMap<String, String>,
    string_counter: u32,

    // jump labels are made unique with a running counter
    label_counter: u32,

    // resolves SELF_TYPE while emitting
    current_class: String,
}

impl<'a> Codegen<'a> {
    pub fn new(program: &'a Program, classtable: &'a ClassTable) -> Self {
        Codegen {
            program,
            classtable,
            output: String::with_capacity(64 * 1024),
            class_tags: BTreeMap::new(),
            next_class_tag: 100,
            offsets: OffsetTable::new(),
            scopes: ScopeStack::new(),
            strings: BTreeMap::new(),
            string_counter: 0,
            label_counter: 0,
            current_class: String::new(),
        }
    }

    pub fn generate(mut self) -> String {
        // first data segment: prototypes and dispatch tables
        self.raw("section .data\n");
        self.class_prototypes();
        self.dispatch_tables();

        // text segment
        self.raw("section .text\n");
        self.raw("global _start\n\n");
        self.comment("built-in methods");
        self.raw(builtins::BUILTIN_METHODS);
        self.initializers();
        self.comment("user-defined methods");
        self.user_methods();
        self.raw(builtins::INTERNAL_ROUTINES);
        self.raw(builtins::ENTRYPOINT);
        self.raw(builtins::ERROR_PROCEDURES);

        // second data segment: string constants, heap and I/O buffer
        self.raw("section .data\n");
        self.string_constants();
        self.raw(builtins::HEAP);
        self.raw(builtins::INPUT_BUFFER);

        self.output
    }

    // emission primitives

    fn raw(&mut self, text: &str) {
        self.output.push_str(text);
    }
    fn emit(&mut self, instruction: impl AsRef<str>) {
        self.output.push_str("  ");
        self.output.push_str(instruction.as_ref());
        self.output.push('\n');
    }
    fn label(&mut self, label: impl AsRef<str>) {
        self.output.push_str(label.as_ref());
        self.output.push_str(":\n");
    }
    fn comment(&mut self, text: &str) {
        self.output.push_str("; ");
        self.output.push_str(text);
        self.output.push('\n');
    }
    fn dd(&mut self, value: impl Display) {
        self.output.push_str(&format!("  dd {}\n", value));
    }
    fn blank(&mut self) {
        self.output.push('\n');
    }

    fn next_label(&mut self) -> u32 {
        self.label_counter += 1;
        self.label_counter
    }

    fn class_tag(&mut self, class: &str) -> u32 {
        if let Some(tag) = self.class_tags.get(class) {
            return *tag;
        }
        let tag = self.next_class_tag;
        self.next_class_tag += 1;
        self.class_tags.insert(class.to_string(), tag);
        tag
    }

    /// Temporarily points `selfptr` at `value`, saving the old pointer on
    /// the stack
    fn replace_selfptr(&mut self, value: &str) {
        self.emit("mov ecx, [selfptr]");
        self.emit("push ecx");
        self.emit(format!("mov DWORD [selfptr], {}", value));
    }
    fn restore_selfptr(&mut self) {
        self.emit("pop ecx");
        self.emit("mov DWORD [selfptr], ecx");
    }

    /// Boxes the value in `source` into a fresh Int object
    fn new_int_object(&mut self, source: &str) {
        let val_offset = self.offsets.attribute(names::INT, names::VAL);
        self.emit(format!("push {}", source));
        self.replace_selfptr("Int_proto");
        self.emit("call Object.copy");
        self.restore_selfptr();
        self.emit("pop ebx");
        self.emit(format!("mov DWORD [eax+{}], ebx", val_offset));
    }

    /// Boxes the value in `source` into a fresh Bool object
    fn new_bool_object(&mut self, source: &str) {
        let val_offset = self.offsets.attribute(names::BOOL, names::VAL);
        self.emit(format!("push {}", source));
        self.replace_selfptr("Bool_proto");
        self.emit("call Object.copy");
        self.restore_selfptr();
        self.emit("pop ebx");
        self.emit(format!("mov [eax+{}], ebx", val_offset));
    }

    fn object_size(&self, class: &str) -> u32 {
        let mut words = NUM_OBJ_HEADERS;
        for ancestor in self.classtable.ancestry(class) {
            words += self.classtable.get(&ancestor).attributes().count() as u32;
        }
        words * WORD_SIZE
    }

    // data segment

    fn class_prototypes(&mut self) {
        let classtable = self.classtable;

        // process-global slot holding the current self object
        self.label("selfptr");
        self.dd(0);
        self.blank();

        for (name, class) in &classtable.classes {
            self.comment(&format!("class {}", name));
            self.label(format!("{}_proto", name));

            let tag = self.class_tag(name);
            self.dd(tag);

            self.dd(format!("{}_typename", name));
            self.strings.insert(format!("{}_typename", name), name.clone());

            let size = self.object_size(name);
            self.dd(size);

            self.dd(format!("{}_dispatch_table", name));

            // Object is the root and has no parent prototype
            if name == names::OBJECT {
                self.dd(0);
            } else {
                self.dd(format!("{}_proto", class.base_class));
            }

            // attribute slots, inherited first
            let mut count = NUM_OBJ_HEADERS;
            let ancestry = classtable.ancestry(name);
            for ancestor in ancestry.iter().rev() {
                // String stores its length as a raw int and a pointer to raw
                // NUL-terminated bytes
                if ancestor == names::STRING {
                    self.offsets.set_attribute(ancestor, names::VAL, WORD_SIZE * count);
                    count += 1;
                    self.comment("attribute val");
                    self.dd(0);
                    self.offsets.set_attribute(ancestor, names::STR_FIELD, WORD_SIZE * count);
                    count += 1;
                    self.comment("attribute str_field");
                    self.dd("empty_string");
                    continue;
                }

                for attr in classtable.get(ancestor).attributes() {
                    self.offsets.set_attribute(ancestor, &attr.name, WORD_SIZE * count);
                    count += 1;
                    self.comment(&format!("attribute {}", attr.name));
                    match attr.declared_type.as_str() {
                        names::STRING => self.dd("uninitialized_string"),
                        names::INT => self.dd("uninitialized_int"),
                        names::BOOL => self.dd("uninitialized_bool"),
                        // attributes of other types default to void
                        _ => self.dd(0),
                    }
                }
            }

            self.blank();
        }

        let string_tag = self.class_tag(names::STRING);
        let int_tag = self.class_tag(names::INT);
        let bool_tag = self.class_tag(names::BOOL);
        let uninitialized = builtins::uninitialized_basic_objects(string_tag, int_tag, bool_tag);
        self.raw(&uninitialized);
    }

    fn dispatch_tables(&mut self) {
        let classtable = self.classtable;
        self.comment("dispatch tables");

        for name in classtable.classes.keys() {
            self.label(format!("{}_dispatch_table", name));

            // methods are inherited root-down; overriding replaces the
            // entry in place so the slot offset is preserved
            let mut methods: Vec<(String, String)> = Vec::new();
            let ancestry = classtable.ancestry(name);
            for ancestor in ancestry.iter().rev() {
                for method in classtable.get(ancestor).methods() {
                    match methods.iter_mut().find(|(_, entry)| *entry == method.name) {
                        Some(entry) => *entry = (ancestor.clone(), method.name.clone()),
                        None => methods.push((ancestor.clone(), method.name.clone())),
                    }
                }
            }

            // every class's _init sits at dispatch offset 0
            self.dd(format!("{}._init", name));

            for (count, (class, method)) in methods.iter().enumerate() {
                self.dd(format!("{}.{}", class, method));
                self.offsets
                    .set_method(name, method, WORD_SIZE * (count as u32 + 1));
            }

            self.blank();
        }
    }

    fn string_constants(&mut self) {
        self.comment("string constants");

        let strings = std::mem::take(&mut self.strings);
        for (label, value) in &strings {
            self.raw(&format!("  {} db `{}`, 0\n", label, nasm_escaped(value)));
        }

        self.raw(builtins::STATIC_STRINGS);
    }

    // text segment

    /// `_init` clones the class prototype and evaluates the attribute
    /// initializers in declaration order, inherited attributes first, with
    /// self bound to the new object
    fn initializers(&mut self) {
        let program = self.program;
        let classtable = self.classtable;

        self.comment("internal initializer methods");
        for class in &program.classes {
            self.label(format!("{}._init", class.name));

            // clone the prototype onto the heap
            self.emit(format!("mov eax, {}_proto", class.name));
            self.emit(format!("mov ebx, [eax+{}]", OBJ_SIZE_OFFSET));
            self.emit("push eax");
            self.emit("push ebx");
            self.emit("call _allocate_memory");
            self.emit("mov edi, eax");
            self.emit("pop esi");
            self.emit(format!("mov ecx, [esi+{}]", OBJ_SIZE_OFFSET));
            self.emit("cld");
            self.emit("rep movsb");

            let old_class = std::mem::replace(&mut self.current_class, class.name.clone());
            self.replace_selfptr("eax");
            self.emit("push eax");

            // attributes may refer to other attributes in their
            // initializers, so they all enter the scope up front
            self.scopes.enter_scope();
            let ancestry = classtable.ancestry(&class.name);
            let mut offset = NUM_OBJ_HEADERS;
            for ancestor in ancestry.iter().rev() {
                for attr in classtable.get(ancestor).attributes() {
                    self.scopes.add_attribute(&attr.name, WORD_SIZE * offset);
                    offset += 1;
                }
            }

            for ancestor in ancestry.iter().rev() {
                for attr in classtable.get(ancestor).attributes() {
                    self.comment(&format!("evaluate initializer {}", attr.name));

                    // evaluate in a clean frame so stack locals don't mix
                    // with the object pointer parked on the stack
                    self.emit("enter 0, 0");
                    self.expr(&attr.init);
                    self.emit("leave");

                    let attr_offset = self.offsets.attribute(ancestor, &attr.name);
                    self.emit("pop edi");
                    self.emit(format!("mov [edi+{}], eax", attr_offset));
                    self.emit("push edi");
                }
            }
            self.scopes.exit_scope();
            self.current_class = old_class;

            self.emit("pop eax");
            self.restore_selfptr();
            self.emit("ret");
            self.blank();
        }

        // built-in classes have no initializers to run, their _init just
        // copies the prototype
        for class in [names::OBJECT, names::INT, names::BOOL, names::STRING, names::IO] {
            let size = self.object_size(class);

            self.label(format!("{}._init", class));
            self.emit(format!("push {}", size));
            self.emit("call _allocate_memory");
            self.emit("push eax");
            self.emit("mov edi, eax");
            self.emit(format!("mov esi, {}_proto", class));
            self.emit(format!("mov ecx, {}", size));
            self.emit("cld");
            self.emit("rep movsb");
            self.emit("pop eax");
            self.emit("ret");
            self.blank();
        }
    }

    fn user_methods(&mut self) {
        let program = self.program;
        let classtable = self.classtable;

        for class in &program.classes {
            for method in class.methods() {
                self.current_class = class.name.clone();
                self.scopes.enter_scope();

                let ancestry = classtable.ancestry(&class.name);
                for ancestor in ancestry.iter().rev() {
                    for attr in classtable.get(ancestor).attributes() {
                        let offset = self.offsets.attribute(ancestor, &attr.name);
                        self.scopes.add_attribute(&attr.name, offset);
                    }
                }

                // arguments are pushed left to right by the caller, so the
                // formals register in reverse
                for formal in method.formals.iter().rev() {
                    self.scopes.add_parameter(&formal.name);
                }

                self.label(format!("{}.{}", class.name, method.name));
                self.emit("enter 0, 0");
                self.expr(&method.body);
                self.emit("leave");

                // the callee cleans up the argument words
                self.emit(format!("ret {}", method.formals.len() as u32 * WORD_SIZE));
                self.blank();

                self.scopes.exit_scope();
            }
        }
    }

    // expressions; every form leaves the result object pointer in eax

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::NoExpr { declared_type } => match declared_type.as_str() {
                // basic types default to a copy of the uninitialized
                // prototype, everything else to void
                names::STRING | names::INT | names::BOOL => {
                    self.replace_selfptr(&format!("{}_proto", declared_type));
                    self.emit("call Object.copy");
                    self.restore_selfptr();
                }
                _ => self.emit("mov eax, 0"),
            },

            ExprKind::Int(value) => self.new_int_object(value),

            ExprKind::Str(value) => {
                let label = format!("string_{}", self.string_counter);
                self.string_counter += 1;
                self.strings.insert(label.clone(), value.clone());

                let val_offset = self.offsets.attribute(names::STRING, names::VAL);
                let str_field_offset = self.offsets.attribute(names::STRING, names::STR_FIELD);

                self.replace_selfptr("String_proto");
                self.emit("call Object.copy");
                self.restore_selfptr();
                self.emit("mov ebx, eax");
                self.emit(format!("add eax, {}", str_field_offset));
                self.emit(format!("mov DWORD [eax], {}", label));
                self.emit(format!("sub eax, {}", str_field_offset - val_offset));
                self.emit("push eax");
                self.emit(format!("push {}", label));
                self.emit("call _strlen");
                self.emit("pop ebx");
                self.emit("mov [ebx], eax");
                self.emit(format!("lea eax, [ebx-{}]", val_offset));
            }

            ExprKind::Bool(value) => {
                self.new_bool_object(if *value { "1" } else { "0" });
            }

            ExprKind::Identifier(name) => {
                let location = self.scopes.location(name);
                self.raw(&location);
                self.emit("mov eax, [eax]");
            }

            ExprKind::Assign { name, expr } => {
                self.expr(expr);
                self.emit("push eax");
                self.emit("mov ebx, eax");
                let location = self.scopes.location(name);
                self.raw(&location);
                self.emit("mov [eax], ebx");
                self.emit("pop eax");
            }

            ExprKind::New { class } => {
                if class == names::SELF_TYPE {
                    // each class's _init sits at dispatch offset 0, so
                    // new SELF_TYPE indirects through self's table
                    self.emit("mov eax, [selfptr]");
                    self.emit(format!("mov eax, [eax+{}]", DISPATCH_PTR_OFFSET));
                    self.emit("mov eax, [eax]");
                    self.emit("call eax");
                } else {
                    self.emit(format!("call {}._init", class));
                }
            }

            ExprKind::Unary { op: UnOp::IsVoid, expr, .. } => {
                self.expr(expr);
                self.emit("cmp eax, 0");
                self.emit("setz al");
                self.emit("movzx eax, al");
                self.new_bool_object("eax");
            }

            ExprKind::Unary { op: UnOp::Neg, expr, .. } => {
                let val_offset = self.offsets.attribute(names::INT, names::VAL);
                self.expr(expr);
                self.emit(format!("add eax, {}", val_offset));
                self.emit("mov eax, [eax]");
                self.emit("neg eax");
                self.new_int_object("eax");
            }

            ExprKind::Unary { op: UnOp::Not, expr, .. } => {
                let val_offset = self.offsets.attribute(names::BOOL, names::VAL);
                self.expr(expr);
                self.emit(format!("add eax, {}", val_offset));
                self.emit("mov eax, [eax]");
                self.emit("xor eax, 1");
                self.new_bool_object("eax");
            }

            ExprKind::Binary { op: BinOp::Eq, lhs, rhs, .. } => self.equality(lhs, rhs),

            ExprKind::Binary { op, lhs, rhs, .. } => {
                // evaluate left, park the unboxed value, evaluate right,
                // combine into a fresh box
                let val_offset = self.offsets.attribute(names::INT, names::VAL);
                self.expr(lhs);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("push eax");
                self.expr(rhs);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("pop ebx");

                match op {
                    BinOp::Plus => {
                        self.emit("add eax, ebx");
                        self.new_int_object("eax");
                    }
                    BinOp::Minus => {
                        self.emit("sub ebx, eax");
                        self.emit("mov eax, ebx");
                        self.new_int_object("eax");
                    }
                    BinOp::Mul => {
                        self.emit("imul ebx");
                        self.new_int_object("eax");
                    }
                    BinOp::Div => {
                        self.emit("xchg eax, ebx");
                        self.emit("xor edx, edx");
                        self.emit("idiv ebx");
                        self.new_int_object("eax");
                    }
                    // eax holds the right operand here, so the condition
                    // codes are flipped
                    BinOp::Lt => {
                        self.emit("cmp eax, ebx");
                        self.emit("setg al");
                        self.emit("movzx eax, al");
                        self.new_bool_object("eax");
                    }
                    BinOp::Leq => {
                        self.emit("cmp eax, ebx");
                        self.emit("setge al");
                        self.emit("movzx eax, al");
                        self.new_bool_object("eax");
                    }
                    BinOp::Eq => unreachable!("handled above"),
                }
            }

            ExprKind::If { predicate, then_branch, else_branch } => {
                let val_offset = self.offsets.attribute(names::BOOL, names::VAL);
                let n = self.next_label();

                self.expr(predicate);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("test eax, eax");
                self.emit(format!("jne .cond_true_{}", n));
                self.label(format!(".cond_false_{}", n));
                self.expr(else_branch);
                self.emit(format!("jmp .cond_over_{}", n));
                self.label(format!(".cond_true_{}", n));
                self.expr(then_branch);
                self.label(format!(".cond_over_{}", n));
            }

            ExprKind::While { predicate, body } => {
                let val_offset = self.offsets.attribute(names::BOOL, names::VAL);
                let n = self.next_label();

                self.label(format!(".while_begin_{}", n));
                self.expr(predicate);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("test eax, eax");
                self.emit(format!("je .while_end_{}", n));
                self.expr(body);
                self.emit(format!("jmp .while_begin_{}", n));
                self.label(format!(".while_end_{}", n));
                // loops return void
                self.emit("xor eax, eax");
            }

            ExprKind::Block { exprs } => {
                for expr in exprs {
                    self.expr(expr);
                }
            }

            ExprKind::Case { target, branches } => self.case(target, branches),

            ExprKind::Let { initializers, body } => {
                self.scopes.enter_scope();

                for init in initializers {
                    self.expr(&init.init);
                    self.emit("push eax");
                    self.scopes.add_stack_variable(&init.name);
                }

                self.expr(body);

                self.scopes.exit_scope();
                self.emit(format!("add esp, {}", initializers.len() as u32 * WORD_SIZE));
            }

            ExprKind::Dispatch { object, method, args } => {
                let mut object_type = object.checked_type.clone();
                if object_type == names::SELF_TYPE {
                    object_type = self.current_class.clone();
                }

                self.dispatch_prologue(object, args);

                // dynamic binding through the receiver's dispatch table
                self.emit("mov ebx, eax");
                self.emit(format!("mov eax, [eax+{}]", DISPATCH_PTR_OFFSET));
                let offset = self.offsets.method(&object_type, method);
                self.emit(format!("mov eax, [eax+{}]", offset));

                self.dispatch_call();
            }

            ExprKind::StaticDispatch { object, static_type, method, args } => {
                self.dispatch_prologue(object, args);

                // static binding through the named class's table
                self.emit("mov ebx, eax");
                let offset = self.offsets.method(static_type, method);
                self.emit(format!("mov eax, [{}_dispatch_table+{}]", static_type, offset));

                self.dispatch_call();
            }
        }
    }

    /// Saves self, evaluates the arguments left to right and the receiver
    /// last, then applies the void check. The check runs after argument
    /// evaluation on purpose so argument side effects still happen.
    fn dispatch_prologue(&mut self, object: &Expr, args: &[Expr]) {
        self.emit("mov eax, [selfptr]");
        self.emit("push eax");

        for arg in args {
            self.expr(arg);
            self.emit("push eax");
        }

        self.expr(object);
        self.emit("cmp eax, 0");
        self.emit("je _dispatch_to_void");
    }

    fn dispatch_call(&mut self) {
        self.emit("mov [selfptr], ebx");
        self.emit("call eax");
        self.emit("pop ebx");
        self.emit("mov [selfptr], ebx");
    }

    fn equality(&mut self, lhs: &Expr, rhs: &Expr) {
        self.emit("; equals expression");

        match lhs.checked_type.as_str() {
            // string contents are compared by _strcmp, which returns the
            // boxed Bool directly
            names::STRING => {
                let str_field_offset = self.offsets.attribute(names::STRING, names::STR_FIELD);
                self.expr(lhs);
                self.emit(format!("mov eax, [eax+{}]", str_field_offset));
                self.emit("push eax");
                self.expr(rhs);
                self.emit(format!("mov eax, [eax+{}]", str_field_offset));
                self.emit("push eax");
                self.emit("call _strcmp");
            }
            // Int and Bool compare their unboxed values
            basic @ (names::INT | names::BOOL) => {
                let val_offset = self.offsets.attribute(basic, names::VAL);
                self.expr(lhs);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("push eax");
                self.expr(rhs);
                self.emit(format!("mov eax, [eax+{}]", val_offset));
                self.emit("pop ebx");
                self.emit("cmp eax, ebx");
                self.emit("setz al");
                self.emit("movzx eax, al");
                self.new_bool_object("eax");
            }
            // everything else compares by identity
            _ => {
                self.expr(lhs);
                self.emit("push eax");
                self.expr(rhs);
                self.emit("pop ebx");
                self.emit("cmp eax, ebx");
                self.emit("setz al");
                self.emit("movzx eax, al");
                self.new_bool_object("eax");
            }
        }
    }

    /// Walks the runtime prototype chain of the target, comparing class
    /// tags against each branch; the first matching branch wins
    fn case(&mut self, target: &Expr, branches: &[CaseBranch]) {
        let n = self.next_label();

        self.expr(target);
        self.emit("cmp eax, 0");
        self.emit("je _match_on_void");
        // the target stays on the stack as the branch-bound variable
        self.emit("push eax");

        self.label(format!(".case_branch_start_{}", n));
        self.emit("mov ecx, [eax]");

        for (i, branch) in branches.iter().enumerate() {
            self.emit(format!("mov ebx, [{}_proto]", branch.declared_type));
            self.emit("cmp ecx, ebx");
            self.emit(format!("je .case_branch_{}_{}", n, i));
        }

        // no branch matched this level, retry with the parent prototype;
        // only Object has 0 there
        self.emit(format!("mov eax, [eax+{}]", PARENT_PROTO_OFFSET));
        self.emit("cmp eax, 0");
        self.emit(format!("je .case_branch_error_{}", n));
        self.emit(format!("jmp .case_branch_start_{}", n));

        for (i, branch) in branches.iter().enumerate() {
            self.scopes.enter_scope();
            self.scopes.add_stack_variable(&branch.name);

            self.label(format!(".case_branch_{}_{}", n, i));
            self.expr(&branch.body);
            self.emit(format!("jmp .case_finish_{}", n));

            self.scopes.exit_scope();
        }

        self.label(format!(".case_branch_error_{}", n));
        self.emit("jmp _no_match");

        self.label(format!(".case_finish_{}", n));
        // drop the bound target slot
        self.emit(format!("add esp, {}", WORD_SIZE));
    }
}

fn nasm_escaped(value: &str) -> String {
    let mut out = String::new();
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            c if c == ' ' || c.is_ascii_graphic() => out.push(c),
            c => out.push_str(&format!("\\x{:02x}", c as u32)),
        }
    }
    out
}
