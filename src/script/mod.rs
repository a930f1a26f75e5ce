//! Sandbox for the Python-flavoured challenge language
//!
//! `lexer` turns source into tokens with explicit INDENT/DEDENT, `parser`
//! builds the tree in `ast`, and `interp` walks it under a step budget.

pub mod ast;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interp::{Interpreter, Limits};
pub use lexer::{Tok, Token, tokenize};
pub use parser::parse;
pub use value::Value;
