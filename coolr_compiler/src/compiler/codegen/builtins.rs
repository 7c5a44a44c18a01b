//! The language runtime, emitted verbatim into every output file: built-in
//! methods, internal routines, the entry point, error stubs and the static
//! data they rely on.
//!
//! Calling convention used throughout: arguments are pushed left to right,
//! the callee cleans them up with `ret n`, the result object pointer comes
//! back in eax and the current object lives in the `selfptr` global.

/// `Object`, `IO` and `String` methods.
///
/// `Object.abort` prints its message, the dynamic class name and a newline,
/// then exits with status 1. `IO.out_int` prints '-' for negative numbers
/// and recurses digit by digit. `String.substr` validates both bounds and
/// jumps to `_index_out_of_bounds` on violation.
pub const BUILTIN_METHODS: &str = "\
Object.abort:
  enter 0, 0
  mov eax, 4
  mov ebx, 1
  mov ecx, _abort_error_msg
  mov edx, 24
  int 0x80
  mov eax, [selfptr]
  push eax
  call Object.type_name
  add eax, 24
  mov eax, [eax]
  mov ecx, eax
  push ecx
  call _strlen
  mov edx, eax
  mov eax, 4
  mov ebx, 1
  int 0x80
  mov eax, 4
  mov ebx, 1
  push 10
  mov ecx, esp
  mov edx, 1
  int 0x80
  jmp _error_exit

Object.type_name:
  enter 0, 0
  mov eax, [selfptr]
  add eax, 4
  mov eax, [eax]
  push eax
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], String_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  add eax, 24
  pop ebx
  mov [eax], ebx
  sub eax, 4
  push eax
  push ebx
  call _strlen
  pop ebx
  mov [ebx], eax
  mov eax, ebx
  sub eax, 20
  leave
  ret

Object.copy:
  enter 0, 0
  mov eax, [selfptr]
  add eax, 8
  mov eax, [eax]
  push eax
  push eax
  call _allocate_memory
  pop ecx
  mov edi, eax
  mov esi, [selfptr]
  cld
  rep movsb
  leave
  ret

IO.out_string:
  enter 0, 0
  mov ecx, [ebp+8]
  add ecx, 24
  mov ecx, [ecx]
  push ecx
  push ecx
  call _strlen
  mov edx, eax
  pop ecx
  mov eax, 4
  mov ebx, 1
  int 0x80
  mov eax, [selfptr]
  leave
  ret 4

IO.out_int:
  enter 0, 0
  mov eax, [ebp+8]
  add eax, 20
  mov eax, [eax]
  test eax, eax
  jns .print_positive
  push eax
  push 45
  mov ebx, 1
  lea ecx, [esp]
  mov edx, 1
  mov eax, 4
  int 0x80
  add esp, 4
  pop eax
  neg eax
.print_positive:
  call .start
  leave
  ret 4
.start:
  push eax
  push edx
  xor edx, edx
  mov ecx, 10
  div ecx
  test eax, eax
  je .finish
  call .start
.finish:
  lea eax, [edx+48]
  mov ebx, 1
  push eax
  lea ecx, [esp]
  mov edx, 1
  mov eax, 4
  int 0x80
  add esp, 4
  pop edx
  pop eax
  ret

IO.in_string:
  enter 0, 0
  mov eax, 3
  mov ebx, 0
  mov ecx, inputbuffer
  mov edx, 1025
  int 0x80
  xor eax, eax
  mov edi, inputbuffer
.loop:
  cmp BYTE [edi], 10
  je .done
  inc edi
  inc eax
  jmp .loop
.done:
  push eax
  inc eax
  push eax
  call _allocate_memory
  mov edi, eax
  mov esi, inputbuffer
  pop ecx
  push edi
  push ecx
  cld
  rep movsb
  mov BYTE [edi], 0
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], String_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  add eax, 20
  pop ebx
  mov [eax], ebx
  add eax, 4
  pop ebx
  mov [eax], ebx
  mov eax, edx
  leave
  ret

IO.in_int:
  enter 0, 0
  call IO.in_string
  mov edi, [eax+24]
  mov ebx, [eax+20]
  add edi, ebx
  dec edi
  xor ecx, ecx
  mov edx, 1
.loop:
  test ebx, ebx
  je .done
  movzx eax, BYTE [edi]
  sub eax, 48
  push edx
  mul edx
  pop edx
  add ecx, eax
  dec edi
  dec ebx
  mov eax, edx
  mov edx, 10
  mul edx
  mov edx, eax
  jmp .loop
.done:
  push ecx
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], Int_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  add eax, 20
  pop ebx
  mov [eax], ebx
  mov eax, edx
  leave
  ret

String.length:
  enter 0, 0
  mov eax, [selfptr]
  add eax, 20
  mov eax, [eax]
  push eax
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], Int_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  add eax, 20
  pop ebx
  mov [eax], ebx
  mov eax, edx
  leave
  ret

String.concat:
  enter 0, 0
  call String.length
  add eax, 20
  mov eax, [eax]
  push eax
  mov edi, [ebp+8]
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], edi
  call String.length
  add eax, 20
  mov eax, [eax]
  pop ecx
  mov DWORD [selfptr], ecx
  push eax
  mov eax, [ebp-4]
  mov ebx, [ebp-8]
  add eax, ebx
  push eax
  inc eax
  push eax
  call _allocate_memory
  mov edi, eax
  mov esi, [selfptr]
  add esi, 24
  mov esi, [esi]
  mov ecx, [ebp-4]
  cld
  rep movsb
  mov esi, [ebp+8]
  add esi, 24
  mov esi, [esi]
  mov ecx, [ebp-8]
  inc ecx
  cld
  rep movsb
  push eax
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], String_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov ebx, eax
  add eax, 24
  pop ecx
  mov [eax], ecx
  sub eax, 4
  pop ecx
  mov [eax], ecx
  mov eax, ebx
  leave
  ret 4

String.substr:
  enter 0, 0
  mov eax, [ebp+12]
  add eax, 20
  mov eax, [eax]
  cmp eax, 0
  jl .error
  mov ebx, [ebp+8]
  add ebx, 20
  mov ebx, [ebx]
  add ebx, eax
  push ebx
  call String.length
  add eax, 20
  mov eax, [eax]
  pop ebx
  cmp ebx, eax
  jg .error
  mov eax, [ebp+8]
  add eax, 20
  mov eax, [eax]
  inc eax
  push eax
  call _allocate_memory
  mov edi, eax
  mov ecx, [ebp+8]
  add ecx, 20
  mov ecx, [ecx]
  mov esi, [selfptr]
  add esi, 24
  mov esi, [esi]
  mov eax, [ebp+12]
  add eax, 20
  mov eax, [eax]
  add esi, eax
  push edi
  push ecx
  cld
  rep movsb
  mov BYTE [edi], 0
  pop ebx
  pop eax
  jmp .done
.error:
  jmp _index_out_of_bounds
.done:
  push eax
  push ebx
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], String_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  pop ebx
  add eax, 20
  mov [eax], ebx
  pop ebx
  add eax, 4
  mov [eax], ebx
  mov eax, edx
  leave
  ret 8

";

/// `_strlen` and `_strcmp` work on raw NUL-terminated bytes; `_strcmp`
/// returns a boxed Bool. `_allocate_memory` bumps the heap pointer and
/// never frees.
pub const INTERNAL_ROUTINES: &str = "\
_strlen:
  enter 0, 0
  xor eax, eax
  mov edi, [ebp+8]
.loop:
  cmp BYTE [edi], 0
  je .done
  inc edi
  inc eax
  jmp .loop
.done:
  leave
  ret 4

_strcmp:
  enter 0, 0
  mov eax, [ebp+8]
  mov ebx, [ebp+12]
.loopstart:
  movzx ecx, BYTE [eax]
  movzx edx, BYTE [ebx]
  cmp ecx, edx
  jne .notequal
  test ecx, ecx
  je .equal
  inc eax
  inc ebx
  jmp .loopstart
.equal:
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], Bool_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  add eax, 20
  mov DWORD [eax], 1
  mov eax, edx
  jmp .done
.notequal:
  mov ecx, [selfptr]
  push ecx
  mov DWORD [selfptr], Bool_proto
  call Object.copy
  pop ecx
  mov DWORD [selfptr], ecx
  mov edx, eax
  add eax, 20
  mov DWORD [eax], 0
  mov eax, edx
.done:
  leave
  ret 8

_allocate_memory:
  enter 0, 0
  mov eax, [heapptr]
  mov ebx, heapend
  mov ecx, eax
  add ecx, [ebp+8]
  cmp ecx, ebx
  jg .failed
  mov [heapptr], ecx
  leave
  ret 4
.failed:
  jmp _out_of_memory

";

/// Initializes Main, stores the instance as self, runs main and exits 0
pub const ENTRYPOINT: &str = "\
_start:
  enter 0, 0
  call Main._init
  mov [selfptr], eax
  call Main.main
  jmp _exit

_exit:
  mov eax, 1
  mov ebx, 0
  int 0x80

";

/// Runtime error stubs: print a fixed message to fd 1 and exit with 1
pub const ERROR_PROCEDURES: &str = "\
_error_exit:
  mov eax, 1
  mov ebx, 1
  int 0x80

_dispatch_to_void:
  mov eax, 4
  mov ebx, 1
  mov ecx, _dispatch_to_void_msg
  mov edx, 17
  int 0x80
  jmp _error_exit

_out_of_memory:
  mov eax, 4
  mov ebx, 1
  mov ecx, _out_of_memory_msg
  mov edx, 14
  int 0x80
  jmp _error_exit

_index_out_of_bounds:
  mov eax, 4
  mov ebx, 1
  mov ecx, _index_out_of_bounds_msg
  mov edx, 19
  int 0x80
  jmp _error_exit

_match_on_void:
  mov eax, 4
  mov ebx, 1
  mov ecx, _match_on_void_msg
  mov edx, 32
  int 0x80
  jmp _error_exit

_no_match:
  mov eax, 4
  mov ebx, 1
  mov ecx, _no_match_msg
  mov edx, 27
  int 0x80
  jmp _error_exit

";

/// Shared default objects that basic-typed attribute slots point at in the
/// prototypes
pub fn uninitialized_basic_objects(string_tag: u32, int_tag: u32, bool_tag: u32) -> String {
    format!(
        "uninitialized_string:
  dd {string_tag}
  dd String_typename
  dd 28
  dd String_dispatch_table
  dd Object_proto
  dd 0
  dd empty_string

uninitialized_int:
  dd {int_tag}
  dd Int_typename
  dd 24
  dd Int_dispatch_table
  dd Object_proto
  dd 0

uninitialized_bool:
  dd {bool_tag}
  dd Bool_typename
  dd 24
  dd Bool_dispatch_table
  dd Object_proto
  dd 0

"
    )
}

pub const STATIC_STRINGS: &str = "\
  empty_string db ``, 0

; error messages
  _abort_error_msg db `Abort called from class '`, 0
  _dispatch_to_void_msg db `Dispatch to void\\n`, 0
  _out_of_memory_msg db `Out of memory\\n`, 0
  _index_out_of_bounds_msg db `Index out of range\\n`, 0
  _match_on_void_msg db `Match on void in case statement\\n`, 0
  _no_match_msg db `No match in case statement\\n`, 0

";

/// 10 MB bump-allocated heap
pub const HEAP: &str = "\
  heapptr dd heapstart
heapstart:
  times 10000000 db 0
heapend:

";

/// Buffer backing IO.in_string reads
pub const INPUT_BUFFER: &str = "\
inputbuffer:
  times 1026 db 0

";
