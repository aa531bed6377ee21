//! Text schema backend.
//!
//! Compiles `.proto` text into a `FileDescriptorProto` at load time. The
//! supported subset covers what message catalogs use: `syntax`, `package`,
//! nested `message` and `enum` definitions, `optional`/`required`/`repeated`
//! labels, `map<K, V>` fields and field options (ignored). `option`,
//! `reserved` and `extensions` statements are skipped; `import`, `oneof`,
//! `service` and `extend` are rejected. Messages nest at most 64 deep, and
//! float literals are only accepted where values are skipped.
//!
//! Every top-level message is exposed under its own name and under a dot
//! alias, so `message chat_send` answers to both `chat_send` and `chat.send`.

use std::collections::{HashMap, HashSet};

use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};

use crate::codec::{normalize_route, CodecBackend, CodecError, CodecResult, SchemaFormat};

const FILE_NAME: &str = "schema.proto";

#[derive(Debug, Clone)]
pub struct ProtoTextBackend {
    pool: DescriptorPool,
    routes: HashMap<String, MessageDescriptor>,
}

impl ProtoTextBackend {
    /// Compile UTF-8 schema text.
    pub fn from_text(material: &[u8]) -> CodecResult<Self> {
        let text = std::str::from_utf8(material)
            .map_err(|e| CodecError::Parse(format!("Schema is not UTF-8: {}", e)))?;
        let file = compile(text)?;

        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file)
            .map_err(|e| CodecError::Descriptor(e.to_string()))?;

        let mut routes = HashMap::new();
        for message in pool.all_messages() {
            if message.parent_message().is_some() || message.is_map_entry() {
                continue;
            }
            let name = message.name().to_string();
            let alias = name.replace('_', ".");
            if alias != name {
                routes.entry(alias).or_insert_with(|| message.clone());
            }
            routes.insert(name, message);
        }

        Ok(Self { pool, routes })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

impl CodecBackend for ProtoTextBackend {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::TextSchema
    }

    fn lookup(&self, route: &str) -> Option<MessageDescriptor> {
        self.routes
            .get(route)
            .or_else(|| self.routes.get(&normalize_route(route)))
            .cloned()
    }

    fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.routes.keys().cloned().collect();
        routes.sort();
        routes
    }
}

/// Compile schema text into a linked-ready `FileDescriptorProto`.
///
/// Type references are resolved to fully qualified names here, so the
/// result can be fed to any descriptor pool or serialized as a descriptor
/// set.
pub fn compile(text: &str) -> CodecResult<FileDescriptorProto> {
    let tokens = tokenize(text)?;
    let file = Parser::new(tokens).parse_file()?;

    let prefix = match &file.package {
        Some(package) => format!(".{}", package),
        None => String::new(),
    };
    let mut symbols = HashMap::new();
    for message in &file.messages {
        collect_message_symbols(message, &prefix, &mut symbols);
    }
    for def in &file.enums {
        symbols.insert(format!("{}.{}", prefix, def.name), Symbol::Enum);
    }

    let lowering = Lowering {
        syntax: file.syntax,
        symbols: &symbols,
    };
    let message_type = file
        .messages
        .iter()
        .map(|m| lowering.message(m, &prefix))
        .collect::<CodecResult<Vec<_>>>()?;

    Ok(FileDescriptorProto {
        name: Some(FILE_NAME.to_string()),
        package: file.package.clone(),
        syntax: Some(file.syntax.as_str().to_string()),
        message_type,
        enum_type: file.enums.iter().map(lower_enum).collect(),
        ..Default::default()
    })
}

/// Protobuf type for a scalar type keyword, `None` for message or enum names.
pub(crate) fn scalar_type(name: &str) -> Option<Type> {
    let ty = match name {
        "double" => Type::Double,
        "float" => Type::Float,
        "int64" => Type::Int64,
        "uint64" => Type::Uint64,
        "int32" => Type::Int32,
        "fixed64" => Type::Fixed64,
        "fixed32" => Type::Fixed32,
        "bool" => Type::Bool,
        "string" => Type::String,
        "bytes" => Type::Bytes,
        "uint32" => Type::Uint32,
        "sfixed32" => Type::Sfixed32,
        "sfixed64" => Type::Sfixed64,
        "sint32" => Type::Sint32,
        "sint64" => Type::Sint64,
        _ => return None,
    };
    Some(ty)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    /// Floating point literal; only valid where values are skipped.
    Float(String),
    Str(String),
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(text: &str) -> CodecResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                match chars.next() {
                    Some('/') => {
                        while let Some(&c) = chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            chars.next();
                        }
                    }
                    Some('*') => {
                        let mut prev = '\0';
                        loop {
                            match chars.next() {
                                Some('/') if prev == '*' => break,
                                Some(c) => {
                                    if c == '\n' {
                                        line += 1;
                                    }
                                    prev = c;
                                }
                                None => {
                                    return Err(parse_error(line, "unterminated block comment"));
                                }
                            }
                        }
                    }
                    _ => return Err(parse_error(line, "unexpected '/'")),
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        Some('\n') | None => return Err(parse_error(line, "unterminated string")),
                        Some(c) => value.push(c),
                    }
                }
                tokens.push(Spanned { token: Token::Str(value), line });
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    let exponent_sign = (c == '+' || c == '-')
                        && !is_hex(&literal)
                        && literal.ends_with(['e', 'E']);
                    if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match parse_int(&literal) {
                    Some(value) => Token::Int(value),
                    None if literal.parse::<f64>().is_ok() => Token::Float(literal),
                    None => return Err(parse_error(line, &format!("invalid number {:?}", literal))),
                };
                tokens.push(Spanned { token, line });
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned { token: Token::Ident(ident), line });
            }
            '{' | '}' | '=' | ';' | '<' | '>' | ',' | '[' | ']' | '(' | ')' => {
                chars.next();
                tokens.push(Spanned { token: Token::Symbol(c), line });
            }
            other => return Err(parse_error(line, &format!("unexpected character {:?}", other))),
        }
    }

    Ok(tokens)
}

fn parse_int(literal: &str) -> Option<i64> {
    let (negative, digits) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse().ok()?
    };
    Some(if negative { -value } else { value })
}

fn is_hex(literal: &str) -> bool {
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    digits.starts_with("0x") || digits.starts_with("0X")
}

fn parse_error(line: usize, message: &str) -> CodecError {
    CodecError::Parse(format!("line {}: {}", line, message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Proto2,
    Proto3,
}

impl Syntax {
    fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

#[derive(Debug)]
struct FileDef {
    syntax: Syntax,
    package: Option<String>,
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

#[derive(Debug)]
struct MessageDef {
    name: String,
    fields: Vec<FieldDef>,
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

#[derive(Debug)]
enum FieldType {
    Named(String),
    Map { key: String, value: String },
}

#[derive(Debug)]
struct FieldDef {
    label: Option<Label>,
    ty: FieldType,
    name: String,
    number: i32,
    line: usize,
}

#[derive(Debug)]
struct EnumDef {
    name: String,
    values: Vec<(String, i32)>,
}

/// Deepest message nesting accepted.
const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_file(&mut self) -> CodecResult<FileDef> {
        let mut file = FileDef {
            syntax: Syntax::Proto2,
            package: None,
            messages: Vec::new(),
            enums: Vec::new(),
        };

        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Symbol(';') => self.advance(),
                Token::Ident(keyword) => match keyword.as_str() {
                    "syntax" => {
                        self.advance();
                        self.expect_symbol('=')?;
                        file.syntax = match self.expect_string()?.as_str() {
                            "proto2" => Syntax::Proto2,
                            "proto3" => Syntax::Proto3,
                            other => return Err(self.error(&format!("unsupported syntax {:?}", other))),
                        };
                        self.expect_symbol(';')?;
                    }
                    "package" => {
                        self.advance();
                        file.package = Some(self.expect_ident()?);
                        self.expect_symbol(';')?;
                    }
                    "option" => self.skip_statement()?,
                    "message" => {
                        let message = self.parse_message(0)?;
                        file.messages.push(message);
                    }
                    "enum" => {
                        let def = self.parse_enum()?;
                        file.enums.push(def);
                    }
                    other => return Err(self.error(&format!("unsupported statement {:?}", other))),
                },
                other => return Err(self.error(&format!("unexpected token {:?}", other))),
            }
        }

        Ok(file)
    }

    fn parse_message(&mut self, depth: usize) -> CodecResult<MessageDef> {
        if depth >= MAX_NESTING {
            return Err(self.error(&format!("messages nested deeper than {}", MAX_NESTING)));
        }
        self.expect_keyword("message")?;
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut message = MessageDef {
            name,
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        };

        loop {
            match self.peek().cloned() {
                Some(Token::Symbol('}')) => {
                    self.advance();
                    return Ok(message);
                }
                Some(Token::Symbol(';')) => self.advance(),
                Some(Token::Ident(keyword)) => match keyword.as_str() {
                    "message" => {
                        let nested = self.parse_message(depth + 1)?;
                        message.messages.push(nested);
                    }
                    "enum" => {
                        let def = self.parse_enum()?;
                        message.enums.push(def);
                    }
                    "option" | "reserved" | "extensions" => self.skip_statement()?,
                    "oneof" | "extend" | "group" => {
                        return Err(self.error(&format!("{} is not supported", keyword)));
                    }
                    _ => {
                        let field = self.parse_field()?;
                        message.fields.push(field);
                    }
                },
                Some(other) => return Err(self.error(&format!("unexpected token {:?}", other))),
                None => return Err(self.error(&format!("message {} is not closed", message.name))),
            }
        }
    }

    fn parse_field(&mut self) -> CodecResult<FieldDef> {
        let line = self.line();
        let label = match self.peek() {
            Some(Token::Ident(word)) if word == "optional" => Some(Label::Optional),
            Some(Token::Ident(word)) if word == "required" => Some(Label::Required),
            Some(Token::Ident(word)) if word == "repeated" => Some(Label::Repeated),
            _ => None,
        };
        if label.is_some() {
            self.advance();
        }

        let type_name = self.expect_ident()?;
        let ty = if type_name == "map" && self.peek() == Some(&Token::Symbol('<')) {
            if label.is_some() {
                return Err(parse_error(line, "map fields cannot have a label"));
            }
            self.advance();
            let key = self.expect_ident()?;
            self.expect_symbol(',')?;
            let value = self.expect_ident()?;
            self.expect_symbol('>')?;
            FieldType::Map { key, value }
        } else {
            FieldType::Named(type_name)
        };

        let name = self.expect_ident()?;
        self.expect_symbol('=')?;
        let number = self.expect_int()?;
        let number = i32::try_from(number)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| parse_error(line, &format!("invalid field number {} for {}", number, name)))?;

        if self.peek() == Some(&Token::Symbol('[')) {
            self.skip_until(']')?;
        }
        self.expect_symbol(';')?;

        Ok(FieldDef {
            label,
            ty,
            name,
            number,
            line,
        })
    }

    fn parse_enum(&mut self) -> CodecResult<EnumDef> {
        self.expect_keyword("enum")?;
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut values = Vec::new();
        loop {
            match self.peek().cloned() {
                Some(Token::Symbol('}')) => {
                    self.advance();
                    break;
                }
                Some(Token::Symbol(';')) => self.advance(),
                Some(Token::Ident(word)) if word == "option" || word == "reserved" => {
                    self.skip_statement()?;
                }
                Some(Token::Ident(value_name)) => {
                    self.advance();
                    self.expect_symbol('=')?;
                    let number = self.expect_int()?;
                    let number = i32::try_from(number)
                        .map_err(|_| self.error(&format!("enum value {} out of range", number)))?;
                    if self.peek() == Some(&Token::Symbol('[')) {
                        self.skip_until(']')?;
                    }
                    self.expect_symbol(';')?;
                    values.push((value_name, number));
                }
                Some(other) => return Err(self.error(&format!("unexpected token {:?}", other))),
                None => return Err(self.error(&format!("enum {} is not closed", name))),
            }
        }

        if values.is_empty() {
            return Err(self.error(&format!("enum {} has no values", name)));
        }

        Ok(EnumDef { name, values })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn error(&self, message: &str) -> CodecError {
        parse_error(self.line(), message)
    }

    fn next_token(&mut self) -> CodecResult<Spanned> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of schema"))?;
        self.advance();
        Ok(spanned)
    }

    fn expect_symbol(&mut self, symbol: char) -> CodecResult<()> {
        let spanned = self.next_token()?;
        match spanned.token {
            Token::Symbol(c) if c == symbol => Ok(()),
            other => Err(parse_error(spanned.line, &format!("expected '{}', found {:?}", symbol, other))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> CodecResult<()> {
        let spanned = self.next_token()?;
        match spanned.token {
            Token::Ident(word) if word == keyword => Ok(()),
            other => Err(parse_error(spanned.line, &format!("expected {}, found {:?}", keyword, other))),
        }
    }

    fn expect_ident(&mut self) -> CodecResult<String> {
        let spanned = self.next_token()?;
        match spanned.token {
            Token::Ident(word) => Ok(word),
            other => Err(parse_error(spanned.line, &format!("expected identifier, found {:?}", other))),
        }
    }

    fn expect_int(&mut self) -> CodecResult<i64> {
        let spanned = self.next_token()?;
        match spanned.token {
            Token::Int(value) => Ok(value),
            Token::Float(literal) => Err(parse_error(spanned.line, &format!("expected integer, found {}", literal))),
            other => Err(parse_error(spanned.line, &format!("expected number, found {:?}", other))),
        }
    }

    fn expect_string(&mut self) -> CodecResult<String> {
        let spanned = self.next_token()?;
        match spanned.token {
            Token::Str(value) => Ok(value),
            other => Err(parse_error(spanned.line, &format!("expected string, found {:?}", other))),
        }
    }

    /// Skip through the next `;`, stepping over any `{ ... }` block.
    fn skip_statement(&mut self) -> CodecResult<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token()?.token {
                Token::Symbol('{') => depth += 1,
                Token::Symbol('}') => depth = depth.saturating_sub(1),
                Token::Symbol(';') if depth == 0 => return Ok(()),
                _ => {}
            }
        }
    }

    fn skip_until(&mut self, symbol: char) -> CodecResult<()> {
        loop {
            if let Token::Symbol(c) = self.next_token()?.token {
                if c == symbol {
                    return Ok(());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Message,
    Enum,
}

fn collect_message_symbols(message: &MessageDef, scope: &str, symbols: &mut HashMap<String, Symbol>) {
    let full_name = format!("{}.{}", scope, message.name);
    for nested in &message.messages {
        collect_message_symbols(nested, &full_name, symbols);
    }
    for def in &message.enums {
        symbols.insert(format!("{}.{}", full_name, def.name), Symbol::Enum);
    }
    for field in &message.fields {
        if let FieldType::Map { .. } = field.ty {
            symbols.insert(format!("{}.{}", full_name, map_entry_name(&field.name)), Symbol::Message);
        }
    }
    symbols.insert(full_name, Symbol::Message);
}

/// `user_scores` → `UserScoresEntry`, matching protoc.
fn map_entry_name(field_name: &str) -> String {
    let mut name = String::with_capacity(field_name.len() + 5);
    let mut upper = true;
    for c in field_name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name.push_str("Entry");
    name
}

struct Lowering<'a> {
    syntax: Syntax,
    symbols: &'a HashMap<String, Symbol>,
}

impl Lowering<'_> {
    fn message(&self, def: &MessageDef, scope: &str) -> CodecResult<DescriptorProto> {
        let full_name = format!("{}.{}", scope, def.name);
        let mut message = DescriptorProto {
            name: Some(def.name.clone()),
            nested_type: def
                .messages
                .iter()
                .map(|m| self.message(m, &full_name))
                .collect::<CodecResult<Vec<_>>>()?,
            enum_type: def.enums.iter().map(lower_enum).collect(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        for field in &def.fields {
            if !seen.insert(field.number) {
                return Err(parse_error(
                    field.line,
                    &format!("field number {} reused in {}", field.number, def.name),
                ));
            }

            match &field.ty {
                FieldType::Named(type_name) => {
                    let mut lowered = self.field(field, type_name, &full_name)?;
                    if self.syntax == Syntax::Proto3 && field.label == Some(Label::Optional) {
                        lowered.proto3_optional = Some(true);
                        lowered.oneof_index = Some(message.oneof_decl.len() as i32);
                        message.oneof_decl.push(OneofDescriptorProto {
                            name: Some(format!("_{}", field.name)),
                            ..Default::default()
                        });
                    }
                    message.field.push(lowered);
                }
                FieldType::Map { key, value } => {
                    let entry_name = map_entry_name(&field.name);
                    let entry_full_name = format!("{}.{}", full_name, entry_name);
                    if scalar_type(key).is_none() || matches!(key.as_str(), "double" | "float" | "bytes") {
                        return Err(parse_error(field.line, &format!("invalid map key type {}", key)));
                    }
                    let key_field = FieldDef {
                        label: Some(Label::Optional),
                        ty: FieldType::Named(key.clone()),
                        name: "key".to_string(),
                        number: 1,
                        line: field.line,
                    };
                    let value_field = FieldDef {
                        label: Some(Label::Optional),
                        ty: FieldType::Named(value.clone()),
                        name: "value".to_string(),
                        number: 2,
                        line: field.line,
                    };
                    message.nested_type.push(DescriptorProto {
                        name: Some(entry_name),
                        field: vec![
                            self.field(&key_field, key, &full_name)?,
                            self.field(&value_field, value, &full_name)?,
                        ],
                        options: Some(MessageOptions {
                            map_entry: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    });
                    message.field.push(FieldDescriptorProto {
                        name: Some(field.name.clone()),
                        number: Some(field.number),
                        label: Some(Label::Repeated as i32),
                        r#type: Some(Type::Message as i32),
                        type_name: Some(entry_full_name),
                        ..Default::default()
                    });
                }
            }
        }

        Ok(message)
    }

    fn field(&self, def: &FieldDef, type_name: &str, scope: &str) -> CodecResult<FieldDescriptorProto> {
        let label = match (def.label, self.syntax) {
            (Some(Label::Required), Syntax::Proto3) => {
                return Err(parse_error(def.line, "required fields are not allowed in proto3"));
            }
            (Some(label), _) => label,
            (None, _) => Label::Optional,
        };

        let (ty, resolved) = match scalar_type(type_name) {
            Some(ty) => (ty, None),
            None => {
                let (full_name, symbol) = self.resolve(type_name, scope).ok_or_else(|| {
                    parse_error(def.line, &format!("unknown type {} for field {}", type_name, def.name))
                })?;
                let ty = match symbol {
                    Symbol::Message => Type::Message,
                    Symbol::Enum => Type::Enum,
                };
                (ty, Some(full_name))
            }
        };

        Ok(FieldDescriptorProto {
            name: Some(def.name.clone()),
            number: Some(def.number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            type_name: resolved,
            ..Default::default()
        })
    }

    /// Resolve a type reference from the innermost scope outwards.
    fn resolve(&self, type_name: &str, scope: &str) -> Option<(String, Symbol)> {
        if type_name.starts_with('.') {
            return self.symbols.get(type_name).map(|s| (type_name.to_string(), *s));
        }

        let mut scope = scope.to_string();
        loop {
            let candidate = format!("{}.{}", scope, type_name);
            if let Some(symbol) = self.symbols.get(&candidate) {
                return Some((candidate, *symbol));
            }
            match scope.rfind('.') {
                Some(idx) => scope.truncate(idx),
                None => return None,
            }
        }
    }
}

fn lower_enum(def: &EnumDef) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(def.name.clone()),
        value: def
            .values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.clone()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_resolves_nested_and_outer_types() {
        let file = compile(
            r#"
            syntax = "proto2";
            package area;

            enum Kind { NPC = 1; PLAYER = 2; }

            message onAdd {
                message Entity {
                    required uint32 id = 1;
                    optional Kind kind = 2;
                }
                repeated Entity entities = 1;
            }
            "#,
        )
        .unwrap();

        assert_eq!(file.package.as_deref(), Some("area"));
        let message = &file.message_type[0];
        assert_eq!(message.field[0].type_name.as_deref(), Some(".area.onAdd.Entity"));
        let entity = &message.nested_type[0];
        assert_eq!(entity.field[1].type_name.as_deref(), Some(".area.Kind"));
        assert_eq!(entity.field[1].r#type, Some(Type::Enum as i32));
    }

    #[test]
    fn test_routes_have_dot_aliases() {
        let backend = ProtoTextBackend::from_text(
            b"message connector_entryHandler_entry { optional string token = 1; }\n\
              message ping { }",
        )
        .unwrap();

        assert!(backend.lookup("connector_entryHandler_entry").is_some());
        assert!(backend.lookup("connector.entryHandler.entry").is_some());
        assert!(backend.lookup("ping").is_some());
        assert_eq!(
            backend.routes(),
            vec!["connector.entryHandler.entry", "connector_entryHandler_entry", "ping"]
        );
    }

    #[test]
    fn test_comments_options_and_reserved_are_skipped() {
        let backend = ProtoTextBackend::from_text(
            br#"
            // leading comment
            syntax = "proto3";
            option java_package = "com.example";
            /* block
               comment */
            message chat_send {
                reserved 2, 3;
                option deprecated = true;
                string text = 1 [deprecated = true]; // trailing
                repeated int32 ids = 4 [packed = true];
            }
            "#,
        )
        .unwrap();

        let desc = backend.lookup("chat.send").unwrap();
        let bytes = backend.encode(&desc, &json!({ "text": "x", "ids": [1, -2] })).unwrap();
        assert_eq!(backend.decode(&desc, &bytes).unwrap(), json!({ "text": "x", "ids": [1, -2] }));
    }

    #[test]
    fn test_proto3_optional_keeps_presence() {
        let backend = ProtoTextBackend::from_text(
            br#"
            syntax = "proto3";
            message score { optional int32 points = 1; string name = 2; }
            "#,
        )
        .unwrap();
        let desc = backend.lookup("score").unwrap();

        let bytes = backend.encode(&desc, &json!({ "points": 0, "name": "" })).unwrap();
        assert_eq!(backend.decode(&desc, &bytes).unwrap(), json!({ "points": 0 }));
    }

    #[test]
    fn test_map_entry_naming() {
        assert_eq!(map_entry_name("user_scores"), "UserScoresEntry");
        assert_eq!(map_entry_name("tags"), "TagsEntry");
    }

    #[test]
    fn test_rejections() {
        let cases: [&[u8]; 7] = [
            b"message a { optional Missing m = 1; }",
            b"message a { optional int32 x = 1; optional int32 y = 1; }",
            b"syntax = \"proto3\"; message a { required int32 x = 1; }",
            b"message a { oneof choice { int32 x = 1; } }",
            b"import \"other.proto\";",
            b"message a { optional int32 x = 0; }",
            b"\xff\xfe",
        ];
        for case in cases {
            assert!(
                ProtoTextBackend::from_text(case).is_err(),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_numeric_literals() {
        let file = compile(
            r#"
            syntax = "proto2";
            option (scale) = 1e5;
            enum Mode { OFF = 0; HEX = 0x1F; OCT = 017; NEG = -3; }
            message reading {
                option (limit) = 2.5E-3;
                optional double ratio = 1 [default = 2e3];
                optional float bias = 2 [default = -1.5];
                optional Mode mode = 3;
            }
            "#,
        )
        .unwrap();

        let numbers: Vec<i32> = file.enum_type[0].value.iter().filter_map(|v| v.number).collect();
        assert_eq!(numbers, vec![0, 31, 15, -3]);
        assert_eq!(file.message_type[0].field.len(), 3);

        assert!(compile("message a { optional int32 x = 1.5; }").is_err());
        assert!(compile("enum e { A = 2e3; }").is_err());
        assert!(compile("message a { optional int32 x = 09; }").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 20_000;
        let mut text = String::new();
        for level in 0..depth {
            text.push_str(&format!("message m{} {{ ", level));
        }
        text.push_str(&"}".repeat(depth));

        let err = compile(&text).unwrap_err();
        assert!(matches!(err, CodecError::Parse(_)), "{}", err);
        assert!(err.to_string().contains("nested deeper than 64"), "{}", err);

        let mut text = String::new();
        for level in 0..MAX_NESTING {
            text.push_str(&format!("message m{} {{ ", level));
        }
        text.push_str(&"}".repeat(MAX_NESTING));
        assert!(compile(&text).is_ok());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = compile("message a {\n  optional int32 x = ;\n}").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }
}
