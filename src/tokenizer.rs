//! XHTML tokenizer adapter
//!
//! Turns well-formed-enough markup into the [`Event`] stream the filter
//! consumes, using quick-xml in a lenient configuration. End tag names are not
//! checked against open elements and text is never trimmed. The raw text of
//! every event is sliced straight from the input so untouched markup is
//! reproduced byte for byte.

use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;

use crate::error::Result;
use crate::markup::{Attribute, EndTag, Event, StartTag};

/// Tokenize one chunk of markup
///
/// The chunk must not end in the middle of a tag; a flush window handed over
/// by the upstream always ends on a token boundary.
pub fn tokenize(html: &str) -> Result<Vec<Event>> {
    let mut reader = Reader::from_str(html);
    reader
        .trim_text(false)
        .check_end_names(false)
        .expand_empty_elements(false);

    let mut events = Vec::new();
    loop {
        let start = reader.buffer_position();
        let event = reader.read_event()?;
        let end = reader.buffer_position();
        let raw = html.get(start..end).unwrap_or_default();

        match event {
            XmlEvent::Start(e) => events.push(Event::StartTag(start_tag(&e, false, raw)?)),
            XmlEvent::Empty(e) => events.push(Event::StartTag(start_tag(&e, true, raw)?)),
            XmlEvent::End(e) => events.push(Event::EndTag(EndTag {
                name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                raw: Some(raw.to_string()),
            })),
            XmlEvent::Eof => break,
            _ => events.push(Event::Text(raw.to_string())),
        }
    }
    Ok(events)
}

fn start_tag(e: &BytesStart<'_>, self_closing: bool, raw: &str) -> Result<StartTag> {
    let mut attributes = Vec::new();
    let mut attrs = e.html_attributes();
    attrs.with_checks(false);
    for attr in attrs {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attributes.push(Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: Some(String::from_utf8_lossy(&attr.value).into_owned()),
        });
    }

    Ok(StartTag {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attributes,
        self_closing,
        raw: Some(raw.to_string()),
    })
}

/// Concatenate the raw text of a tokenized stream
pub fn render(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        match event {
            Event::StartTag(tag) => tag.write_to(&mut out),
            Event::EndTag(tag) => tag.write_to(&mut out),
            Event::Text(text) => out.push_str(text),
            Event::Flush | Event::Finish => {}
        }
    }
    out
}
