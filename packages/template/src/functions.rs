//! The function registry and built-in functions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use urlstore_json::value_to_json;

use crate::error::{Result, TemplateError};
use crate::interpreter::{Datum, Environment};

/// Unreserved characters (RFC 3986) stay as they are.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A template function.
///
/// Functions receive the tag's context, the output of the previous token
/// (`input`, null for the first token) and their arguments. Whatever they
/// return becomes the next token's input.
pub trait Function: Send + Sync {
    fn call(
        &self,
        env: &mut dyn Environment,
        context: &Datum,
        input: Datum,
        args: &[String],
    ) -> Result<Datum>;
}

impl<F> Function for F
where
    F: Fn(&mut dyn Environment, &Datum, Datum, &[String]) -> Result<Datum> + Send + Sync,
{
    fn call(
        &self,
        env: &mut dyn Environment,
        context: &Datum,
        input: Datum,
        args: &[String],
    ) -> Result<Datum> {
        self(env, context, input, args)
    }
}

/// Name to function map.
#[derive(Clone, Default)]
pub struct Functions {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("Functions").field("names", &names).finish()
    }
}

impl Functions {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut functions = Self::new();
        functions.register("html", html);
        functions.register("url", url);
        functions.register("uuid", |_: &mut dyn Environment, _: &Datum, _, _: &[String]| {
            Ok(Datum::from(uuid::Uuid::new_v4().to_string()))
        });
        functions.register("b64id", |_: &mut dyn Environment, _: &Datum, _, _: &[String]| {
            Ok(Datum::from(URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes())))
        });
        functions.register("dataurl", dataurl);
        functions.register("lb", |_: &mut dyn Environment, _: &Datum, _, _: &[String]| {
            Ok(Datum::from("{"))
        });
        functions.register("rb", |_: &mut dyn Environment, _: &Datum, _, _: &[String]| {
            Ok(Datum::from("}"))
        });
        functions.register("dump", dump);
        functions.register("json", json);
        functions
    }

    /// Register a closure or function under `name`, replacing any previous
    /// entry.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&mut dyn Environment, &Datum, Datum, &[String]) -> Result<Datum>
            + Send
            + Sync
            + 'static,
    {
        self.register_function(name, Arc::new(function));
    }

    /// Register a shared function object.
    pub fn register_function(&mut self, name: impl Into<String>, function: Arc<dyn Function>) {
        let name = name.into();
        log::trace!("registering template function '{}'", name);
        self.functions.insert(name, function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

fn html(env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]) -> Result<Datum> {
    let text = input.to_text(env.heap())?;
    Ok(Datum::from(html_escape::encode_safe(&text).into_owned()))
}

fn url(env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]) -> Result<Datum> {
    let text = input.to_text(env.heap())?;
    Ok(Datum::from(
        utf8_percent_encode(&text, COMPONENT_ENCODE_SET).to_string(),
    ))
}

/// `data:<mime>;base64,<input>`, mime defaulting to `text/plain`.
fn dataurl(env: &mut dyn Environment, _: &Datum, input: Datum, args: &[String]) -> Result<Datum> {
    let text = input.to_text(env.heap())?;
    let mime = args.first().map(String::as_str).unwrap_or("text/plain");
    Ok(Datum::from(format!(
        "data:{};base64,{}",
        mime,
        STANDARD.encode(text.as_bytes())
    )))
}

fn dump(env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]) -> Result<Datum> {
    let json = value_to_json(input.to_value(env.heap())?);
    let pretty =
        serde_json::to_string_pretty(&json).map_err(|e| TemplateError::function("dump", e.to_string()))?;
    Ok(Datum::from(format!(
        "<pre>{}</pre>",
        html_escape::encode_text(&pretty)
    )))
}

fn json(env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]) -> Result<Datum> {
    let json = value_to_json(input.to_value(env.heap())?);
    serde_json::to_string(&json)
        .map(Datum::from)
        .map_err(|e| TemplateError::function("json", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlstore_core::{Heap, Url, Value, ValueId};

    struct Bare(Heap);

    impl Environment for Bare {
        fn heap(&self) -> &Heap {
            &self.0
        }

        fn heap_mut(&mut self) -> &mut Heap {
            &mut self.0
        }

        fn load(&mut self, _url: &Url) -> urlstore_core::Result<Option<ValueId>> {
            Ok(None)
        }
    }

    fn call(name: &str, input: impl Into<Datum>, args: &[&str]) -> Result<Datum> {
        let functions = Functions::with_builtins();
        let mut env = Bare(Heap::new());
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        functions
            .get(name)
            .ok_or_else(|| TemplateError::UnknownFunction {
                name: name.to_string(),
            })?
            .call(&mut env, &Datum::null(), input.into(), &args)
    }

    fn text(datum: Datum) -> String {
        match datum {
            Datum::Owned(Value::String(s)) => s,
            other => panic!("expected a string, got {:?}", other),
        }
    }

    #[test]
    fn html_escapes() {
        assert_eq!(
            text(call("html", "<b class=\"x\">&", &[]).unwrap()),
            "&lt;b class=&quot;x&quot;&gt;&amp;"
        );
    }

    #[test]
    fn url_encodes_components() {
        assert_eq!(text(call("url", "a b/c?d", &[]).unwrap()), "a%20b%2Fc%3Fd");
        assert_eq!(text(call("url", "safe-_.~", &[]).unwrap()), "safe-_.~");
    }

    #[test]
    fn ids() {
        let id = text(call("uuid", Datum::null(), &[]).unwrap());
        assert_eq!(id.len(), 36);
        let b64 = text(call("b64id", Datum::null(), &[]).unwrap());
        assert_eq!(b64.len(), 22);
        assert!(b64
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn data_urls() {
        assert_eq!(
            text(call("dataurl", "hi", &[]).unwrap()),
            "data:text/plain;base64,aGk="
        );
        assert_eq!(
            text(call("dataurl", "{}", &["application/json"]).unwrap()),
            "data:application/json;base64,e30="
        );
    }

    #[test]
    fn brace_literals() {
        assert_eq!(text(call("lb", Datum::null(), &[]).unwrap()), "{");
        assert_eq!(text(call("rb", Datum::null(), &[]).unwrap()), "}");
    }

    #[test]
    fn dump_and_json() {
        let value: Value = [("a", Value::from("<b>"))].into_iter().collect();
        assert_eq!(
            text(call("dump", value.clone(), &[]).unwrap()),
            "<pre>{\n  \"a\": \"&lt;b&gt;\"\n}</pre>"
        );
        assert_eq!(text(call("json", value, &[]).unwrap()), r#"{"a":"<b>"}"#);
    }

    #[test]
    fn html_rejects_containers() {
        assert_eq!(
            call("html", Value::array(), &[]).unwrap_err(),
            TemplateError::ValueNotStringCoercible { kind: "array" }
        );
    }

    #[test]
    fn custom_functions() {
        let mut functions = Functions::new();
        assert!(!functions.contains("shout"));
        functions.register(
            "shout",
            |env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]| {
                Ok(Datum::from(input.to_text(env.heap())?.to_uppercase()))
            },
        );
        assert!(functions.contains("shout"));
        let mut env = Bare(Heap::new());
        let out = functions
            .get("shout")
            .unwrap()
            .call(&mut env, &Datum::null(), Datum::from("hey"), &[])
            .unwrap();
        assert_eq!(out, Datum::from("HEY"));
    }
}
