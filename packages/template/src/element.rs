//! The compiled element tree.

/// A node of a compiled template.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Text(String),
    Tag(Tag),
    Section(Section),
    Foreach(Foreach),
    If(If),
}

/// A pipeline of tokens. The output of each token is the input of the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    pub tokens: Vec<TagToken>,
    pub offset: usize,
}

/// One step of a tag pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum TagToken {
    /// `:name`, `:a.b`, `:` or `:.`. Empty keys address the context itself.
    Field { name: String, keys: Vec<String> },
    /// `@url`, resolved at render time.
    Load(String),
    /// `&text`, percent-decoded when compiled.
    Literal(String),
    /// A registered function with its arguments.
    Function { name: String, args: Vec<String> },
    /// `#...`; nothing after it runs.
    Comment(String),
}

/// `.section <expr> ... [.or ...] .end`
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub expression: Tag,
    pub content: Vec<Element>,
    pub or: Option<Vec<Element>>,
}

/// `.foreach <expr> ... [.join ...] .end`
#[derive(Clone, Debug, PartialEq)]
pub struct Foreach {
    pub expression: Tag,
    pub body: Vec<Element>,
    pub join: Option<Vec<Element>>,
}

/// `.if <expr> ... [.else ...] .end`
#[derive(Clone, Debug, PartialEq)]
pub struct If {
    pub condition: Tag,
    pub then: Vec<Element>,
    pub otherwise: Option<Vec<Element>>,
}
