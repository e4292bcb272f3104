use serde::{Deserialize, Serialize};

/// Inline formatting carried by a run of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextAttribute {
    Emphasis,
    Strong,
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub attributes: Vec<TextAttribute>,
}

/// A styled text: ordered runs, each carrying its own attribute set.
///
/// Adjacent runs never share an identical attribute set and no run is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RichText {
    runs: Vec<TextRun>,
}

impl RichText {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_attributes(text, Vec::new())
    }

    pub fn with_attributes(text: impl Into<String>, attributes: Vec<TextAttribute>) -> Self {
        let mut rich = Self::default();
        rich.push_run(TextRun {
            text: text.into(),
            attributes,
        });
        rich
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Plain text view with all formatting dropped.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Union of all attributes present anywhere in the text, in first-seen order.
    pub fn attributes(&self) -> Vec<TextAttribute> {
        let mut all: Vec<TextAttribute> = Vec::new();
        for attr in self.runs.iter().flat_map(|run| run.attributes.iter()) {
            if !all.contains(attr) {
                all.push(attr.clone());
            }
        }
        all
    }

    /// Distinct link targets present in the text.
    pub fn links(&self) -> Vec<String> {
        self.attributes()
            .into_iter()
            .filter_map(|attr| match attr {
                TextAttribute::Link(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Adds attributes over the whole text range.
    ///
    /// A new link replaces any link already present on a run.
    pub fn add_attributes(&mut self, attributes: &[TextAttribute]) {
        let runs = std::mem::take(&mut self.runs);
        for mut run in runs {
            for attr in attributes {
                if matches!(attr, TextAttribute::Link(_)) {
                    run.attributes
                        .retain(|existing| !matches!(existing, TextAttribute::Link(_)));
                }
                if !run.attributes.contains(attr) {
                    run.attributes.push(attr.clone());
                }
            }
            self.push_run(run);
        }
    }

    pub fn append(&mut self, other: RichText) {
        for run in other.runs {
            self.push_run(run);
        }
    }

    /// Removes leading and trailing whitespace across run boundaries.
    pub fn trimmed(mut self) -> Self {
        while let Some(first) = self.runs.first_mut() {
            let trimmed = first.text.trim_start().to_string();
            if trimmed.is_empty() {
                self.runs.remove(0);
            } else {
                first.text = trimmed;
                break;
            }
        }
        while let Some(last) = self.runs.last_mut() {
            let trimmed = last.text.trim_end().to_string();
            if trimmed.is_empty() {
                self.runs.pop();
            } else {
                last.text = trimmed;
                break;
            }
        }
        self
    }

    /// Splits on `'\n'`, keeping each line's formatting.
    pub fn split_lines(&self) -> Vec<RichText> {
        let mut lines = vec![RichText::default()];
        for run in &self.runs {
            let mut pieces = run.text.split('\n');
            if let Some(first) = pieces.next() {
                if let Some(line) = lines.last_mut() {
                    line.push_run(TextRun {
                        text: first.to_string(),
                        attributes: run.attributes.clone(),
                    });
                }
            }
            for piece in pieces {
                let mut line = RichText::default();
                line.push_run(TextRun {
                    text: piece.to_string(),
                    attributes: run.attributes.clone(),
                });
                lines.push(line);
            }
        }
        lines
    }

    fn push_run(&mut self, run: TextRun) {
        if run.text.is_empty() {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if same_attributes(&last.attributes, &run.attributes) {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.runs.push(run);
    }
}

impl From<&str> for RichText {
    fn from(value: &str) -> Self {
        RichText::new(value)
    }
}

fn same_attributes(a: &[TextAttribute], b: &[TextAttribute]) -> bool {
    a.len() == b.len() && a.iter().all(|attr| b.contains(attr))
}
