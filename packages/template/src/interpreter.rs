//! Template interpreter: walks the element tree against a context.

use urlstore_core::{Heap, Url, Value, ValueId, ValueKind};

use crate::element::{Element, Tag, TagToken};
use crate::error::{Result, TemplateError};
use crate::functions::Functions;
use crate::Template;

/// What the interpreter needs from the store it renders against.
pub trait Environment {
    fn heap(&self) -> &Heap;

    fn heap_mut(&mut self) -> &mut Heap;

    /// Fetch the value at an absolute URL.
    fn load(&mut self, url: &Url) -> urlstore_core::Result<Option<ValueId>>;

    /// Base for loads whose context is not beneath an item.
    fn base_url(&self) -> Option<&Url> {
        None
    }

    /// Base of last resort.
    fn root_url(&self) -> Url {
        Url::memory_root()
    }
}

/// A value flowing through a template: a heap value or a computed one.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Ref(ValueId),
    Owned(Value),
}

impl Default for Datum {
    fn default() -> Self {
        Datum::Owned(Value::Null)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Owned(value)
    }
}

impl From<ValueId> for Datum {
    fn from(id: ValueId) -> Self {
        Datum::Ref(id)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Owned(Value::from(s))
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Owned(Value::String(s))
    }
}

impl Datum {
    pub fn null() -> Self {
        Datum::default()
    }

    pub fn kind(&self, heap: &Heap) -> Result<ValueKind> {
        match self {
            Datum::Ref(id) => Ok(heap.kind(*id)?),
            Datum::Owned(value) => Ok(value.kind()),
        }
    }

    pub fn is_null(&self, heap: &Heap) -> bool {
        matches!(self.kind(heap), Ok(ValueKind::Null))
    }

    /// Look up a child by key. Callers check the kind first.
    pub fn get(&self, heap: &Heap, key: &str) -> Result<Option<Datum>> {
        match self {
            Datum::Ref(id) => Ok(heap.get(*id, key)?.map(Datum::Ref)),
            Datum::Owned(value) => Ok(value.get(key).cloned().map(Datum::Owned)),
        }
    }

    /// The elements of an array, or `None` for anything else.
    pub fn elements(&self, heap: &Heap) -> Result<Option<Vec<Datum>>> {
        match self {
            Datum::Ref(id) if heap.kind(*id)? == ValueKind::Array => Ok(Some(
                heap.require_array(*id)?
                    .iter()
                    .copied()
                    .map(Datum::Ref)
                    .collect(),
            )),
            Datum::Owned(Value::Array(items)) => {
                Ok(Some(items.iter().cloned().map(Datum::Owned).collect()))
            }
            _ => Ok(None),
        }
    }

    /// An owned copy of the value.
    pub fn to_value(&self, heap: &Heap) -> Result<Value> {
        match self {
            Datum::Ref(id) => Ok(heap.export(*id)?),
            Datum::Owned(value) => Ok(value.clone()),
        }
    }

    /// Move the value into the heap, returning its id.
    pub fn into_heap(self, heap: &mut Heap) -> ValueId {
        match self {
            Datum::Ref(id) => id,
            Datum::Owned(value) => heap.import(&value),
        }
    }

    /// The text form: strings as-is, numbers in decimal, booleans as
    /// `true`/`false`, null as nothing.
    pub fn to_text(&self, heap: &Heap) -> Result<String> {
        match self {
            Datum::Ref(id) => {
                let kind = heap.kind(*id)?;
                match kind {
                    ValueKind::Null => Ok(String::new()),
                    ValueKind::String => Ok(heap.require_str(*id)?.to_string()),
                    ValueKind::Number => Ok(heap.require_number(*id)?.to_string()),
                    ValueKind::Boolean => Ok(heap.require_bool(*id)?.to_string()),
                    other => Err(TemplateError::ValueNotStringCoercible { kind: other.name() }),
                }
            }
            Datum::Owned(value) => match value {
                Value::Null => Ok(String::new()),
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Boolean(b) => Ok(b.to_string()),
                other => Err(TemplateError::ValueNotStringCoercible {
                    kind: other.kind().name(),
                }),
            },
        }
    }

    /// Truthiness: null, empty strings, zero and `false` are false.
    pub fn is_truthy(&self, heap: &Heap) -> Result<bool> {
        let truthy = match self {
            Datum::Ref(id) => match heap.kind(*id)? {
                ValueKind::Null => false,
                ValueKind::Boolean => heap.require_bool(*id)?,
                ValueKind::String => !heap.require_str(*id)?.is_empty(),
                ValueKind::Number => heap.require_number(*id)?.as_f64() != Some(0.0),
                ValueKind::Array | ValueKind::Object | ValueKind::Native => true,
            },
            Datum::Owned(value) => match value {
                Value::Null => false,
                Value::Boolean(b) => *b,
                Value::String(s) => !s.is_empty(),
                Value::Number(n) => n.as_f64() != Some(0.0),
                Value::Array(_) | Value::Object(_) | Value::Native(_) => true,
            },
        };
        Ok(truthy)
    }

    /// The source URL of the item this value belongs to, if any.
    pub fn item_source(&self, heap: &Heap) -> Result<Option<Url>> {
        let Datum::Ref(id) = self else {
            return Ok(None);
        };
        match heap.item_of(*id)? {
            Some(item) => Ok(Some(heap.item(item)?.source().clone())),
            None => Ok(None),
        }
    }
}

/// Renders compiled templates.
pub struct Interpreter<'a> {
    env: &'a mut dyn Environment,
    functions: &'a Functions,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: &'a mut dyn Environment, functions: &'a Functions) -> Self {
        Self { env, functions }
    }

    /// Render a template to text.
    pub fn render(&mut self, template: &Template, context: &Datum) -> Result<String> {
        let mut out = String::new();
        self.elements(template.elements(), context, &mut out)?;
        Ok(out)
    }

    /// Render a template to a value.
    ///
    /// A template that is exactly one tag yields the tag's pipeline value
    /// without string coercion; anything else yields the rendered text.
    pub fn render_value(&mut self, template: &Template, context: &Datum) -> Result<Datum> {
        if let [Element::Tag(tag)] = template.elements() {
            return self.pipeline(tag, context);
        }
        self.render(template, context).map(Datum::from)
    }

    fn elements(&mut self, elements: &[Element], context: &Datum, out: &mut String) -> Result<()> {
        for element in elements {
            self.element(element, context, out)?;
        }
        Ok(())
    }

    fn element(&mut self, element: &Element, context: &Datum, out: &mut String) -> Result<()> {
        match element {
            Element::Text(text) => out.push_str(text),
            Element::Tag(tag) => {
                let value = self.pipeline(tag, context)?;
                out.push_str(&value.to_text(self.env.heap())?);
            }
            Element::Section(section) => {
                let value = self.pipeline(&section.expression, context)?;
                if !value.is_null(self.env.heap()) {
                    self.elements(&section.content, &value, out)?;
                } else if let Some(or) = &section.or {
                    self.elements(or, context, out)?;
                }
            }
            Element::If(cond) => {
                let value = self.pipeline(&cond.condition, context)?;
                if value.is_truthy(self.env.heap())? {
                    self.elements(&cond.then, context, out)?;
                } else if let Some(otherwise) = &cond.otherwise {
                    self.elements(otherwise, context, out)?;
                }
            }
            Element::Foreach(each) => {
                let value = self.pipeline(&each.expression, context)?;
                let Some(items) = value.elements(self.env.heap())? else {
                    log::trace!("foreach over a non-array value; skipping");
                    return Ok(());
                };
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        if let Some(join) = &each.join {
                            self.elements(join, context, out)?;
                        }
                    }
                    self.elements(&each.body, item, out)?;
                }
            }
        }
        Ok(())
    }

    /// Run a tag's tokens left to right, starting from a null input.
    fn pipeline(&mut self, tag: &Tag, context: &Datum) -> Result<Datum> {
        let mut value = Datum::null();
        for token in &tag.tokens {
            if let TagToken::Comment(_) = token {
                break;
            }
            value = self.token(token, context, value)?;
        }
        Ok(value)
    }

    fn token(&mut self, token: &TagToken, context: &Datum, input: Datum) -> Result<Datum> {
        match token {
            TagToken::Field { name, keys } => self.field(name, keys, context),
            TagToken::Load(reference) => self.load(reference, context),
            TagToken::Literal(text) => Ok(Datum::from(text.as_str())),
            TagToken::Function { name, args } => {
                let functions = self.functions;
                let function = functions
                    .get(name)
                    .ok_or_else(|| TemplateError::UnknownFunction { name: name.clone() })?;
                function.call(self.env, context, input, args)
            }
            TagToken::Comment(_) => Ok(input),
        }
    }

    fn field(&mut self, name: &str, keys: &[String], context: &Datum) -> Result<Datum> {
        let heap = self.env.heap();
        let mut current = context.clone();
        for key in keys {
            let kind = current.kind(heap)?;
            if !kind.is_container() {
                return Err(TemplateError::ContextNotContainer {
                    field: name.to_string(),
                    found: kind.name(),
                });
            }
            match current.get(heap, key)? {
                Some(next) => current = next,
                None => return Ok(Datum::null()),
            }
        }
        Ok(current)
    }

    fn load(&mut self, reference: &str, context: &Datum) -> Result<Datum> {
        let target = Url::parse(reference)?;
        let base = match context.item_source(self.env.heap())? {
            Some(source) => source,
            None => match self.env.base_url() {
                Some(base) => base.clone(),
                None if target.is_fragment_only() => {
                    return Err(TemplateError::MissingBaseForFragmentLoad {
                        url: reference.to_string(),
                    })
                }
                None => self.env.root_url(),
            },
        };
        let url = base.resolve(&target);
        log::debug!("template load {} -> {}", reference, url);
        Ok(match self.env.load(&url)? {
            Some(id) => Datum::Ref(id),
            None => Datum::null(),
        })
    }
}
