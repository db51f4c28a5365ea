//! Symbol mangler / demangler (§4.9): a bijective encoding of declaration
//! identities to ASCII symbol names, so linking, backtraces, and
//! `trill_demangle` output stay stable across builds.
//!
//! `trill_ir` builds a [`Symbol`] from a declaration's resolved signature
//! and calls [`encode`] to get the linker-visible name; [`decode`] is its
//! exact inverse, used both by [`demangle_display`] and by tests that check
//! every encoded symbol round-trips.

use std::ffi::{c_char, CStr, CString};

/// A modifier letter that appears right after the `F` kind letter in a
/// function symbol, distinguishing free functions (no modifier, straight
/// into the length-prefixed name) from the various member kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Init,
    Instance,
    Static,
    Getter,
    Setter,
    Subscript,
    Deinit,
    Operator,
}

impl Modifier {
    fn code(self) -> char {
        match self {
            Modifier::Init => 'I',
            Modifier::Instance => 'M',
            Modifier::Static => 'm',
            Modifier::Getter => 'g',
            Modifier::Setter => 's',
            Modifier::Subscript => 'S',
            Modifier::Deinit => 'D',
            Modifier::Operator => 'O',
        }
    }

    fn from_code(c: char) -> Option<Modifier> {
        match c {
            'I' => Some(Modifier::Init),
            'M' => Some(Modifier::Instance),
            'm' => Some(Modifier::Static),
            'g' => Some(Modifier::Getter),
            's' => Some(Modifier::Setter),
            'S' => Some(Modifier::Subscript),
            'D' => Some(Modifier::Deinit),
            'O' => Some(Modifier::Operator),
            _ => None,
        }
    }

    /// Every modifier but `Operator` names a member of some owning type.
    fn has_owner(self) -> bool {
        !matches!(self, Modifier::Operator)
    }

    fn display_prefix(self) -> &'static str {
        match self {
            Modifier::Init => "init ",
            Modifier::Instance => "",
            Modifier::Static => "static ",
            Modifier::Getter => "get ",
            Modifier::Setter => "set ",
            Modifier::Subscript => "subscript ",
            Modifier::Deinit => "deinit ",
            Modifier::Operator => "operator ",
        }
    }
}

/// The special-type single-letter (or letter+width) codes used after `s`
/// in the type grammar (§4.9: "`si64` = Int64, `sB` = Bool").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Int(Option<u32>),
    UInt(Option<u32>),
    Bool,
    Float,
    Double,
    Void,
}

impl Special {
    fn code(self) -> String {
        match self {
            Special::Int(None) => "I".to_string(),
            Special::Int(Some(w)) => format!("i{w}"),
            Special::UInt(None) => "U".to_string(),
            Special::UInt(Some(w)) => format!("u{w}"),
            Special::Bool => "B".to_string(),
            Special::Float => "F".to_string(),
            Special::Double => "D".to_string(),
            Special::Void => "V".to_string(),
        }
    }

    fn display(self) -> String {
        match self {
            Special::Int(None) => "Int".to_string(),
            Special::Int(Some(w)) => format!("Int{w}"),
            Special::UInt(None) => "UInt".to_string(),
            Special::UInt(Some(w)) => format!("UInt{w}"),
            Special::Bool => "Bool".to_string(),
            Special::Float => "Float".to_string(),
            Special::Double => "Double".to_string(),
            Special::Void => "Void".to_string(),
        }
    }
}

/// A type appearing inside a mangled symbol (§4.9's small type grammar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSig {
    Special(Special),
    Pointer(u32, Box<TypeSig>),
    Tuple(Vec<TypeSig>),
    Function(Vec<TypeSig>, Box<TypeSig>),
    Array(Box<TypeSig>),
    Named(String),
}

/// One parameter of a function symbol: either single-name (external label
/// equals the internal name, or there is none) or an explicit external
/// label distinct from the internal name (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub external: Option<String>,
    pub internal: String,
    pub ty: TypeSig,
}

/// A fully-structured declaration identity, ready to mangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Function { modifier: Option<Modifier>, owner: Option<String>, name: String, args: Vec<Arg>, ret: TypeSig },
    Type(String),
    Protocol(String),
    Global(String, TypeSig),
    Closure(u32, Vec<Arg>, TypeSig),
    Witness { type_name: String, protocol_name: String },
}

fn encode_name(out: &mut String, s: &str) {
    out.push_str(&s.len().to_string());
    out.push_str(s);
}

fn encode_type(out: &mut String, ty: &TypeSig) {
    match ty {
        TypeSig::Special(s) => {
            out.push('s');
            out.push_str(&s.code());
        }
        TypeSig::Pointer(depth, inner) => {
            out.push('P');
            out.push_str(&depth.to_string());
            encode_type(out, inner);
        }
        TypeSig::Tuple(elems) => {
            out.push('t');
            for e in elems {
                encode_type(out, e);
            }
            out.push('T');
        }
        TypeSig::Function(params, ret) => {
            out.push('F');
            for p in params {
                encode_type(out, p);
            }
            out.push('R');
            encode_type(out, ret);
        }
        TypeSig::Array(elem) => {
            out.push('A');
            encode_type(out, elem);
        }
        TypeSig::Named(name) => {
            out.push('N');
            encode_name(out, name);
        }
    }
}

fn encode_arg(out: &mut String, arg: &Arg) {
    match &arg.external {
        Some(ext) if ext != &arg.internal => {
            out.push('E');
            encode_name(out, ext);
            encode_name(out, &arg.internal);
        }
        _ => {
            out.push('S');
            encode_name(out, &arg.internal);
        }
    }
    encode_type(out, &arg.ty);
}

/// Encodes a [`Symbol`] to its ASCII linker name. The inverse of [`decode`].
pub fn encode(symbol: &Symbol) -> String {
    let mut out = String::from("_W");
    match symbol {
        Symbol::Function { modifier, owner, name, args, ret } => {
            out.push('F');
            if let Some(m) = modifier {
                out.push(m.code());
            }
            if let Some(owner) = owner {
                encode_name(&mut out, owner);
            }
            encode_name(&mut out, name);
            for a in args {
                encode_arg(&mut out, a);
            }
            out.push('R');
            encode_type(&mut out, ret);
        }
        Symbol::Type(name) => {
            out.push('T');
            encode_name(&mut out, name);
        }
        Symbol::Protocol(name) => {
            out.push('P');
            encode_name(&mut out, name);
        }
        Symbol::Global(name, ty) => {
            out.push('G');
            encode_name(&mut out, name);
            encode_type(&mut out, ty);
        }
        Symbol::Closure(index, args, ret) => {
            out.push('C');
            out.push_str(&index.to_string());
            for a in args {
                encode_arg(&mut out, a);
            }
            out.push('R');
            encode_type(&mut out, ret);
        }
        Symbol::Witness { type_name, protocol_name } => {
            out.push('W');
            encode_name(&mut out, type_name);
            encode_name(&mut out, protocol_name);
        }
    }
    out
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Cursor { bytes: s.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, c: u8) -> Option<()> {
        if self.advance()? == c {
            Some(())
        } else {
            None
        }
    }

    fn take_digits(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.parse().ok()
    }

    fn take_name(&mut self) -> Option<String> {
        let len = self.take_digits()?;
        let start = self.pos;
        let end = start + len;
        if end > self.bytes.len() {
            return None;
        }
        let s = std::str::from_utf8(&self.bytes[start..end]).ok()?.to_string();
        self.pos = end;
        Some(s)
    }
}

fn decode_special(code: &str) -> Option<Special> {
    match code {
        "I" => Some(Special::Int(None)),
        "U" => Some(Special::UInt(None)),
        "B" => Some(Special::Bool),
        "F" => Some(Special::Float),
        "D" => Some(Special::Double),
        "V" => Some(Special::Void),
        _ => {
            let (prefix, rest) = code.split_at(1);
            let width: u32 = rest.parse().ok()?;
            match prefix {
                "i" => Some(Special::Int(Some(width))),
                "u" => Some(Special::UInt(Some(width))),
                _ => None,
            }
        }
    }
}

fn decode_type(cursor: &mut Cursor) -> Option<TypeSig> {
    match cursor.advance()? {
        b's' => {
            let start = cursor.pos;
            // A special code is either one letter (I, U, B, F, D, V) or a
            // letter followed by decimal digits (i64, u8, ...).
            cursor.advance()?;
            while cursor.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
                cursor.pos += 1;
            }
            let code = std::str::from_utf8(&cursor.bytes[start..cursor.pos]).ok()?;
            decode_special(code).map(TypeSig::Special)
        }
        b'P' => {
            let depth = cursor.take_digits()? as u32;
            let inner = decode_type(cursor)?;
            Some(TypeSig::Pointer(depth, Box::new(inner)))
        }
        b't' => {
            let mut elems = Vec::new();
            while cursor.peek() != Some(b'T') {
                elems.push(decode_type(cursor)?);
            }
            cursor.expect(b'T')?;
            Some(TypeSig::Tuple(elems))
        }
        b'F' => {
            let mut params = Vec::new();
            while cursor.peek() != Some(b'R') {
                params.push(decode_type(cursor)?);
            }
            cursor.expect(b'R')?;
            let ret = decode_type(cursor)?;
            Some(TypeSig::Function(params, Box::new(ret)))
        }
        b'A' => {
            let elem = decode_type(cursor)?;
            Some(TypeSig::Array(Box::new(elem)))
        }
        b'N' => cursor.take_name().map(TypeSig::Named),
        _ => None,
    }
}

fn decode_arg(cursor: &mut Cursor) -> Option<Arg> {
    match cursor.advance()? {
        b'S' => {
            let internal = cursor.take_name()?;
            let ty = decode_type(cursor)?;
            Some(Arg { external: None, internal, ty })
        }
        b'E' => {
            let external = cursor.take_name()?;
            let internal = cursor.take_name()?;
            let ty = decode_type(cursor)?;
            Some(Arg { external: Some(external), internal, ty })
        }
        _ => None,
    }
}

fn decode_args(cursor: &mut Cursor) -> Option<Vec<Arg>> {
    let mut args = Vec::new();
    while matches!(cursor.peek(), Some(b'S') | Some(b'E')) {
        args.push(decode_arg(cursor)?);
    }
    Some(args)
}

/// Decodes a mangled symbol back to its [`Symbol`]. The inverse of [`encode`].
pub fn decode(s: &str) -> Option<Symbol> {
    let mut cursor = Cursor::new(s);
    cursor.expect(b'_')?;
    cursor.expect(b'W')?;
    match cursor.advance()? {
        b'F' => {
            let modifier = match cursor.peek() {
                Some(b) if !b.is_ascii_digit() => {
                    let m = Modifier::from_code(b as char)?;
                    cursor.pos += 1;
                    Some(m)
                }
                _ => None,
            };
            let owner = match modifier {
                Some(m) if m.has_owner() => Some(cursor.take_name()?),
                _ => None,
            };
            let name = cursor.take_name()?;
            let args = decode_args(&mut cursor)?;
            cursor.expect(b'R')?;
            let ret = decode_type(&mut cursor)?;
            Some(Symbol::Function { modifier, owner, name, args, ret })
        }
        b'T' => Some(Symbol::Type(cursor.take_name()?)),
        b'P' => Some(Symbol::Protocol(cursor.take_name()?)),
        b'G' => {
            let name = cursor.take_name()?;
            let ty = decode_type(&mut cursor)?;
            Some(Symbol::Global(name, ty))
        }
        b'C' => {
            let index = cursor.take_digits()? as u32;
            let args = decode_args(&mut cursor)?;
            cursor.expect(b'R')?;
            let ret = decode_type(&mut cursor)?;
            Some(Symbol::Closure(index, args, ret))
        }
        b'W' => {
            let type_name = cursor.take_name()?;
            let protocol_name = cursor.take_name()?;
            Some(Symbol::Witness { type_name, protocol_name })
        }
        _ => None,
    }
}

fn display_type(ty: &TypeSig) -> String {
    match ty {
        TypeSig::Special(s) => s.display(),
        TypeSig::Pointer(depth, inner) => format!("{}{}", "*".repeat(*depth as usize), display_type(inner)),
        TypeSig::Tuple(elems) => format!("({})", elems.iter().map(display_type).collect::<Vec<_>>().join(", ")),
        TypeSig::Function(params, ret) => {
            format!("({}) -> {}", params.iter().map(display_type).collect::<Vec<_>>().join(", "), display_type(ret))
        }
        TypeSig::Array(elem) => format!("[{}]", display_type(elem)),
        TypeSig::Named(name) => name.clone(),
    }
}

fn display_arg(arg: &Arg) -> String {
    match &arg.external {
        Some(ext) if ext != &arg.internal => format!("{ext} {}: {}", arg.internal, display_type(&arg.ty)),
        _ => format!("{}: {}", arg.internal, display_type(&arg.ty)),
    }
}

fn display_args(args: &[Arg]) -> String {
    args.iter().map(display_arg).collect::<Vec<_>>().join(", ")
}

/// Renders a decoded [`Symbol`] as the human-readable string `trill_demangle`
/// returns (§4.9, §6, §8 scenario 6).
pub fn demangle_display(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Function { modifier, owner, name, args, ret } => {
            let prefix = modifier.map(Modifier::display_prefix).unwrap_or("");
            let owner_part = owner.as_ref().map(|o| format!("{o}.")).unwrap_or_default();
            format!("{prefix}{owner_part}{name}({}) -> {}", display_args(args), display_type(ret))
        }
        Symbol::Type(name) => format!("type {name}"),
        Symbol::Protocol(name) => format!("protocol {name}"),
        Symbol::Global(name, ty) => format!("{name}: {}", display_type(ty)),
        Symbol::Closure(index, args, ret) => format!("closure#{index}({}) -> {}", display_args(args), display_type(ret)),
        Symbol::Witness { type_name, protocol_name } => format!("witness {type_name}: {protocol_name}"),
    }
}

/// Demangles a C-string symbol name, returning a heap-allocated (via the
/// global Rust allocator, which is the system allocator unless the host
/// binary overrides it) readable string, or `NULL` if `name` is not a
/// symbol this mangler produced (§6).
#[no_mangle]
pub unsafe extern "C" fn trill_demangle(name: *const c_char) -> *mut c_char {
    if name.is_null() {
        return std::ptr::null_mut();
    }
    let text = match CStr::from_ptr(name).to_str() {
        Ok(t) => t,
        Err(_) => return std::ptr::null_mut(),
    };
    match decode(text) {
        Some(symbol) => match CString::new(demangle_display(&symbol)) {
            Ok(c) => c.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        None => std::ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_ty() -> TypeSig {
        TypeSig::Special(Special::Int(None))
    }

    #[test]
    fn free_function_round_trips() {
        let symbol = Symbol::Function {
            modifier: None,
            owner: None,
            name: "add".to_string(),
            args: vec![
                Arg { external: None, internal: "a".to_string(), ty: int_ty() },
                Arg { external: Some("to".to_string()), internal: "b".to_string(), ty: int_ty() },
            ],
            ret: int_ty(),
        };
        let encoded = encode(&symbol);
        assert_eq!(decode(&encoded), Some(symbol));
    }

    #[test]
    fn static_method_demangles_with_labels_and_pointer_return() {
        let symbol = Symbol::Function {
            modifier: Some(Modifier::Static),
            owner: Some("Foo".to_string()),
            name: "bar".to_string(),
            args: vec![Arg { external: Some("x".to_string()), internal: "baz".to_string(), ty: int_ty() }],
            ret: TypeSig::Pointer(1, Box::new(int_ty())),
        };
        let encoded = encode(&symbol);
        assert!(encoded.starts_with("_WF"));
        let decoded = decode(&encoded).expect("round trip");
        let display = demangle_display(&decoded);
        for needle in ["static", "Foo", "bar", "x baz: Int", "-> *Int"] {
            assert!(display.contains(needle), "{display:?} should contain {needle:?}");
        }
    }

    #[test]
    fn distinct_declarations_mangle_to_distinct_symbols() {
        let a = Symbol::Type("Foo".to_string());
        let b = Symbol::Type("Bar".to_string());
        assert_ne!(encode(&a), encode(&b));
    }

    #[test]
    fn tuple_and_function_types_round_trip() {
        let symbol = Symbol::Global(
            "table".to_string(),
            TypeSig::Tuple(vec![
                int_ty(),
                TypeSig::Function(vec![int_ty()], Box::new(TypeSig::Special(Special::Bool))),
                TypeSig::Array(Box::new(TypeSig::Named("Point".to_string()))),
            ]),
        );
        let encoded = encode(&symbol);
        assert_eq!(decode(&encoded), Some(symbol));
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        assert_eq!(decode("not a mangled symbol"), None);
    }

    #[test]
    fn trill_demangle_round_trips_through_the_c_abi() {
        let symbol = Symbol::Type("Widget".to_string());
        let encoded = encode(&symbol);
        let c_encoded = CString::new(encoded).unwrap();
        unsafe {
            let out = trill_demangle(c_encoded.as_ptr());
            assert!(!out.is_null());
            let s = CStr::from_ptr(out).to_str().unwrap();
            assert_eq!(s, "type Widget");
            let _ = CString::from_raw(out);
        }
    }

    #[test]
    fn trill_demangle_returns_null_for_unmangled_input() {
        let c_input = CString::new("hello").unwrap();
        unsafe {
            assert!(trill_demangle(c_input.as_ptr()).is_null());
        }
    }
}
