//! Document event model
//!
//! The rewriter consumes a flat stream of events produced by an upstream
//! tokenizer. Every event keeps the raw bytes it was parsed from, so anything
//! the rewriter leaves alone is written back exactly as it arrived.

use std::fmt::Write;

/// A single attribute of a start tag
///
/// The value is kept raw (still entity-escaped, as written in the source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

/// An opening tag, e.g. `<img src="a.jpg"/>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    /// Source text of the tag; `None` once the tag has been modified
    pub raw: Option<String>,
}

impl StartTag {
    /// Build a tag that was not parsed from source text
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            self_closing: false,
            raw: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Rename an attribute in place, keeping its position and value
    pub fn rename_attribute(&mut self, from: &str, to: &str) -> bool {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(from))
        {
            Some(attr) => {
                attr.name = to.to_string();
                self.raw = None;
                true
            }
            None => false,
        }
    }

    /// Append an attribute; `value` must already be attribute-safe
    pub fn push_attribute(&mut self, name: &str, value: &str) {
        self.attributes.push(Attribute::new(name, value));
        self.raw = None;
    }

    pub fn write_to(&self, out: &mut String) {
        if let Some(raw) = &self.raw {
            out.push_str(raw);
            return;
        }
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            if let Some(value) = &attr.value {
                write_value(value, out);
            }
        }
        out.push_str(if self.self_closing { "/>" } else { ">" });
    }
}

/// Quote a raw attribute value so it survives re-serialization
///
/// Values are already entity-escaped, so only the quote character matters.
fn write_value(value: &str, out: &mut String) {
    if !value.contains('"') {
        let _ = write!(out, "=\"{}\"", value);
    } else if !value.contains('\'') {
        let _ = write!(out, "='{}'", value);
    } else {
        let _ = write!(out, "=\"{}\"", value.replace('"', "&quot;"));
    }
}

/// A closing tag, e.g. `</body>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag {
    pub name: String,
    pub raw: Option<String>,
}

impl EndTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            raw: None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn write_to(&self, out: &mut String) {
        match &self.raw {
            Some(raw) => out.push_str(raw),
            None => {
                let _ = write!(out, "</{}>", self.name);
            }
        }
    }
}

/// One item of the document stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartTag(StartTag),
    EndTag(EndTag),
    /// Character data, comments, doctype and anything else passed verbatim
    Text(String),
    /// The upstream wants everything seen so far written out
    Flush,
    /// End of the document
    Finish,
}
