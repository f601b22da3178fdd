//! SQL inspection: syntax gate and operation classification.
//!
//! Both checks are pure and run before anything reaches the database.

mod operation;
mod syntax;

pub use operation::{classify, OperationType};
pub use syntax::{validate_syntax, SyntaxCheck, ALLOWED_KEYWORDS};
