use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::types::{Feed, Item};

/// The document could not be decoded as an RSS channel at all.
///
/// Item-level problems never surface here; they are skipped and logged.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed feed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document has no RSS channel")]
    MissingChannel,

    #[error("Feed XML ended before the channel was closed")]
    UnexpectedEof,
}

// ============================================================================
// Wire Format
// ============================================================================

/// Child text of one `<item>`, collected before any validation.
#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    author: Option<String>,
    creator: Option<String>,
    categories: Vec<String>,
}

// ============================================================================
// Publication Dates
// ============================================================================

/// Accepted publication date layouts, tried in order.
///
/// None of them carry a weekday: a leading `Mon, ` is stripped first and
/// never checked against the date.
#[derive(Debug, Clone, Copy)]
enum DateFormat {
    /// RFC 2822 / RFC 1123, numeric offset or named zone.
    Rfc2822,
    /// strftime layout ending in a numeric `%z` offset.
    WithOffset(&'static str),
    /// strftime layout followed by a zone abbreviation, read as UTC.
    WithZoneName(&'static str),
    Rfc3339,
}

const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::Rfc2822,
    DateFormat::WithOffset("%d %b %Y %H:%M:%S %z"),
    DateFormat::WithZoneName("%d %b %Y %H:%M:%S"),
    DateFormat::WithOffset("%d %b %y %H:%M %z"),
    DateFormat::WithZoneName("%d %b %y %H:%M"),
    DateFormat::Rfc3339,
];

impl DateFormat {
    fn parse(self, input: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc2822 => DateTime::parse_from_rfc2822(input)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::WithOffset(layout) => DateTime::parse_from_str(input, layout)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::WithZoneName(layout) => {
                let (rest, zone) = input.rsplit_once(' ')?;
                if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                NaiveDateTime::parse_from_str(rest.trim_end(), layout)
                    .ok()
                    .map(|naive| naive.and_utc())
            }
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Drop a leading day name (`Tue, ` or `Tuesday, `).
fn strip_weekday(input: &str) -> &str {
    match input.split_once(',') {
        Some((day, rest)) if day.trim().parse::<Weekday>().is_ok() => rest.trim_start(),
        _ => input,
    }
}

/// Parse a feed publication date against the accepted formats.
///
/// The day name is informational only, so a date whose weekday disagrees
/// with the calendar still parses. Returns `None` when no format matches.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = strip_weekday(raw.trim());
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|format| format.parse(trimmed))
}

// ============================================================================
// Parsing
// ============================================================================

/// A decoded channel whose items have not been validated yet.
///
/// [`ParsedChannel::items`] yields the usable items lazily and can be
/// iterated any number of times.
#[derive(Debug, Default)]
pub struct ParsedChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    raw_items: Vec<RawItem>,
}

impl ParsedChannel {
    /// Items with a parseable date and a link, in document order.
    ///
    /// Skipped items are logged at warn level every time they are visited.
    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        self.raw_items.iter().filter_map(RawItem::to_item)
    }

    /// Number of `<item>` elements in the document, usable or not.
    pub fn raw_item_count(&self) -> usize {
        self.raw_items.len()
    }

    pub fn into_feed(self) -> Feed {
        let items = self.items().collect();
        Feed {
            title: self.title,
            link: self.link,
            description: self.description,
            items,
        }
    }
}

impl RawItem {
    fn to_item(&self) -> Option<Item> {
        let title = self.title.trim();
        let link = self.link.trim();

        let Some(published_at) = parse_pub_date(&self.pub_date) else {
            tracing::warn!(
                pub_date = %self.pub_date,
                item_title = %title,
                "Could not parse item pubDate, skipping item"
            );
            return None;
        };

        if link.is_empty() {
            tracing::warn!(item_title = %title, "Item has no link, skipping item");
            return None;
        }

        let author = self
            .author
            .as_deref()
            .or(self.creator.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let category = self
            .categories
            .iter()
            .map(|c| c.trim())
            .find(|c| !c.is_empty())
            .map(str::to_string);

        Some(Item {
            title: title.to_string(),
            link: link.to_string(),
            description: self.description.trim().to_string(),
            published_at,
            author,
            category,
        })
    }
}

/// Decode the channel structure of an RSS document without validating items.
///
/// Each `<item>` is read on its own, so repeated or out-of-order elements,
/// unknown children and inline markup inside a field never fail the feed.
/// Only XML that is not well-formed, or a document without a `<channel>`,
/// is an error.
pub fn parse_channel(bytes: &[u8]) -> Result<ParsedChannel, ParseError> {
    let mut reader = Reader::from_reader(bytes);

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"channel" => {
                return read_channel(&mut reader);
            }
            Event::Empty(e) if e.name().as_ref() == b"channel" => {
                return Ok(ParsedChannel::default());
            }
            Event::Eof => return Err(ParseError::MissingChannel),
            _ => {}
        }
    }
}

fn read_channel(reader: &mut Reader<&[u8]>) -> Result<ParsedChannel, ParseError> {
    let mut channel = ParsedChannel::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"title" => channel.title = read_text(reader)?,
                b"link" => channel.link = read_text(reader)?,
                b"description" => channel.description = read_text(reader)?,
                b"item" => channel.raw_items.push(read_item(reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"item" => {
                channel.raw_items.push(RawItem::default());
            }
            Event::End(_) => return Ok(channel),
            Event::Eof => return Err(ParseError::UnexpectedEof),
            _ => {}
        }
    }
}

fn read_item(reader: &mut Reader<&[u8]>) -> Result<RawItem, ParseError> {
    let mut item = RawItem::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"title" => item.title = read_text(reader)?,
                b"link" => item.link = read_text(reader)?,
                b"description" => item.description = read_text(reader)?,
                b"pubDate" => item.pub_date = read_text(reader)?,
                b"author" => item.author = Some(read_text(reader)?),
                b"dc:creator" | b"creator" => item.creator = Some(read_text(reader)?),
                b"category" => item.categories.push(read_text(reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(_) => return Ok(item),
            Event::Eof => return Err(ParseError::UnexpectedEof),
            _ => {}
        }
    }
}

/// Text content of the element just opened, up to its matching end tag.
///
/// Nested markup is flattened: `A <b>bold</b> claim` reads as `A bold claim`.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String, ParseError> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Text(t) => push_unescaped(&mut text, &t),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(ParseError::UnexpectedEof),
            _ => {}
        }
    }

    Ok(text.trim().to_string())
}

// Entities outside the XML builtins (`&nbsp;` and friends) are kept verbatim.
fn push_unescaped(out: &mut String, text: &BytesText<'_>) {
    match text.unescape() {
        Ok(unescaped) => out.push_str(&unescaped),
        Err(_) => out.push_str(&String::from_utf8_lossy(text)),
    }
}

/// Parse an RSS document into a [`Feed`].
///
/// Fails only if the root document cannot be decoded. Items with an
/// unparseable publication date or without a link are dropped; a feed with
/// no usable items is returned as an empty `Feed`.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, ParseError> {
    let channel = parse_channel(bytes)?;
    let raw_count = channel.raw_item_count();
    let feed = channel.into_feed();

    let skipped = raw_count - feed.items.len();
    if skipped > 0 {
        tracing::debug!(
            feed = %feed.title,
            parsed = feed.items.len(),
            skipped = skipped,
            "Feed parsed with skipped items"
        );
    }

    Ok(feed)
}
