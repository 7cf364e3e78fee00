//! Text templates rendered against heap values.
//!
//! A template is compiled in two passes, [`scan`] then [`analyze`], into a
//! tree of [`Element`]s, and rendered by an [`Interpreter`] against an
//! [`Environment`] that supplies the heap and resolves `@url` loads.
//!
//! ```rust
//! use urlstore_core::{Heap, Url, ValueId};
//! use urlstore_template::{Datum, Environment, Functions, Interpreter, Template};
//!
//! struct Plain(Heap);
//!
//! impl Environment for Plain {
//!     fn heap(&self) -> &Heap { &self.0 }
//!     fn heap_mut(&mut self) -> &mut Heap { &mut self.0 }
//!     fn load(&mut self, _: &Url) -> urlstore_core::Result<Option<ValueId>> { Ok(None) }
//! }
//!
//! let template = Template::compile("{.foreach :.}<{:.}>{.join}, {.end}").unwrap();
//! let mut env = Plain(Heap::new());
//! let functions = Functions::with_builtins();
//! let context = Datum::from(urlstore_core::Value::from(vec!["a", "b"]));
//! let text = Interpreter::new(&mut env, &functions).render(&template, &context).unwrap();
//! assert_eq!(text, "<a>, <b>");
//! ```

mod analyzer;
mod cache;
mod element;
mod error;
mod functions;
mod interpreter;
mod scanner;

pub use analyzer::analyze;
pub use cache::TemplateCache;
pub use element::{Element, Foreach, If, Section, Tag, TagToken};
pub use error::{Result, TemplateError};
pub use functions::{Function, Functions};
pub use interpreter::{Datum, Environment, Interpreter};
pub use scanner::{scan, Token, TokenKind};

/// A compiled template.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    source: String,
    elements: Vec<Element>,
}

impl Template {
    /// Scan and analyze `source`.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = scan(source)?;
        let elements = analyze(&tokens)?;
        log::trace!(
            "compiled template: {} tokens, {} top-level elements",
            tokens.len(),
            elements.len()
        );
        Ok(Template {
            source: source.to_string(),
            elements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}
