//! Reserved identifiers of the language and its runtime.

pub const SELF: &str = "self";

// types
pub const OBJECT: &str = "Object";
pub const IO: &str = "IO";
pub const INT: &str = "Int";
pub const BOOL: &str = "Bool";
pub const STRING: &str = "String";
pub const SELF_TYPE: &str = "SELF_TYPE";
pub const NO_TYPE: &str = "_no_type";
pub const PRIM_SLOT: &str = "prim_slot";
pub const MAIN_CLASS: &str = "Main";

// built-in methods
pub const ABORT: &str = "abort";
pub const TYPE_NAME: &str = "type_name";
pub const COPY: &str = "copy";
pub const OUT_STRING: &str = "out_string";
pub const OUT_INT: &str = "out_int";
pub const IN_STRING: &str = "in_string";
pub const IN_INT: &str = "in_int";
pub const LENGTH: &str = "length";
pub const CONCAT: &str = "concat";
pub const SUBSTR: &str = "substr";
pub const MAIN_METHOD: &str = "main";

// built-in attributes and formals
pub const VAL: &str = "val";
pub const STR_FIELD: &str = "str_field";
pub const ARG: &str = "arg";
pub const ARG1: &str = "arg1";
pub const ARG2: &str = "arg2";
