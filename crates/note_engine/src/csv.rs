//! RFC 4180 style CSV reading in two lazy stages: characters become
//! [`CharacterEvent`]s, events become records.

use std::iter::Peekable;

const FIELD_SEPARATOR: char = ',';
const QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterEvent {
    Character(char),
    FieldSeparator,
    RecordSeparator,
    /// Consumed input with no effect on the output; never yielded.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnescapeState {
    LineStart,
    FieldStart,
    Unquoted,
    Quoted,
    Escaping,
}

/// Classifies characters, resolving quoting. `\r\n` counts as one separator.
pub struct UnescapedEvents<I: Iterator<Item = char>> {
    input: Peekable<I>,
    state: UnescapeState,
}

impl<I: Iterator<Item = char>> UnescapedEvents<I> {
    pub fn new(input: I) -> Self {
        Self {
            input: input.peekable(),
            state: UnescapeState::LineStart,
        }
    }

    fn handle(&mut self, ch: char) -> CharacterEvent {
        use CharacterEvent::*;
        use UnescapeState::*;

        if self.state == Quoted {
            if ch == QUOTE {
                self.state = Escaping;
                return Skip;
            }
            return Character(ch);
        }

        if ch == '\r' || ch == '\n' {
            if ch == '\r' && self.input.peek() == Some(&'\n') {
                self.input.next();
            }
            return match self.state {
                // Blank lines between records are ignored.
                LineStart => Skip,
                _ => {
                    self.state = LineStart;
                    RecordSeparator
                }
            };
        }

        match (self.state, ch) {
            (LineStart | FieldStart, FIELD_SEPARATOR) => FieldSeparator,
            (Unquoted | Escaping, FIELD_SEPARATOR) => {
                self.state = FieldStart;
                FieldSeparator
            }
            (LineStart | FieldStart, QUOTE) => {
                self.state = Quoted;
                Skip
            }
            (Escaping, QUOTE) => {
                self.state = Quoted;
                Character(ch)
            }
            (LineStart | FieldStart | Escaping, _) => {
                self.state = Unquoted;
                Character(ch)
            }
            _ => Character(ch),
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for UnescapedEvents<I> {
    type Item = CharacterEvent;

    fn next(&mut self) -> Option<CharacterEvent> {
        loop {
            let ch = self.input.next()?;
            match self.handle(ch) {
                CharacterEvent::Skip => continue,
                event => return Some(event),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    RecordStart,
    FieldStart,
    FieldData,
    End,
}

/// Groups events into records. Empty input yields no records; a last
/// record without a trailing separator is still yielded.
pub struct RecordParser<I: Iterator<Item = CharacterEvent>> {
    events: I,
    state: RecordState,
    fields: Vec<String>,
    current: String,
}

impl<I: Iterator<Item = CharacterEvent>> RecordParser<I> {
    pub fn new(events: I) -> Self {
        Self {
            events,
            state: RecordState::RecordStart,
            fields: Vec::new(),
            current: String::new(),
        }
    }

    fn close_field(&mut self) {
        self.fields.push(std::mem::take(&mut self.current));
    }

    /// Applies one event; returns `false` once a record is complete or the
    /// input is exhausted.
    fn handle(&mut self, event: Option<CharacterEvent>) -> bool {
        use RecordState::*;

        match (self.state, event) {
            (End, _) => false,
            (_, Some(CharacterEvent::Skip)) => true,
            (RecordStart, None) => {
                self.state = End;
                false
            }
            // A separator right before end of input opens no new field.
            (FieldStart, None) => {
                self.state = End;
                false
            }
            (FieldData, None) => {
                self.close_field();
                self.state = End;
                false
            }
            (_, Some(CharacterEvent::Character(ch))) => {
                self.current.push(ch);
                self.state = FieldData;
                true
            }
            (_, Some(CharacterEvent::FieldSeparator)) => {
                self.close_field();
                self.state = FieldStart;
                true
            }
            (RecordStart, Some(CharacterEvent::RecordSeparator)) => true,
            (_, Some(CharacterEvent::RecordSeparator)) => {
                self.close_field();
                self.state = RecordStart;
                false
            }
        }
    }
}

impl<I: Iterator<Item = CharacterEvent>> Iterator for RecordParser<I> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        loop {
            let event = self.events.next();
            if !self.handle(event) {
                break;
            }
        }
        if self.fields.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.fields))
    }
}

/// Lazily parses CSV text into records.
pub fn parse_records(input: &str) -> RecordParser<UnescapedEvents<std::str::Chars<'_>>> {
    RecordParser::new(UnescapedEvents::new(input.chars()))
}

/// Quotes a field for output, doubling embedded quotes.
pub fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
