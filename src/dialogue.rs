//! Dialogue cursor: which lines a level currently shows, and whether they
//! hold up the simulation.
//!
//! A level's dialogue is an ordered list of optional strings. Every entry
//! except the last is an opening line; the last is the end-of-level line
//! (`null` for none). A `null` first entry hides the opening dialogue.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// No opening dialogue.
    Hidden,
    /// Opening lines `0..=n` are on screen.
    Line(usize),
    /// Every line plus the end-of-level line.
    Ending,
}

/// Text the host should render this frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleDialogue {
    pub lines: Vec<String>,
    /// Whether a "more" indicator follows the last line.
    pub more: bool,
}

#[derive(Debug, Clone)]
pub struct Dialogue {
    lines: Vec<String>,
    end_line: Option<String>,
    cursor: Cursor,
}

impl Dialogue {
    pub fn new(entries: &[Option<String>]) -> Self {
        let end_line = entries.last().cloned().flatten();
        let (lines, cursor) = match entries.first() {
            Some(Some(_)) => {
                let opening = &entries[..entries.len() - 1];
                // interior nulls stay as blank lines so indices match the descriptor
                let lines = opening
                    .iter()
                    .map(|l| l.clone().unwrap_or_default())
                    .collect();
                (lines, Cursor::Line(0))
            }
            _ => (Vec::new(), Cursor::Hidden),
        };
        Self {
            lines,
            end_line,
            cursor,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn end_line(&self) -> Option<&str> {
        self.end_line.as_deref()
    }

    /// Opening lines remain to be shown; the simulation waits.
    pub fn is_blocking(&self) -> bool {
        matches!(self.cursor, Cursor::Line(i) if i + 1 < self.lines.len())
    }

    pub fn is_showing_ending(&self) -> bool {
        self.cursor == Cursor::Ending
    }

    /// Whether the cursor responds to advancing at all.
    pub fn is_active(&self) -> bool {
        self.cursor != Cursor::Hidden
    }

    /// Reveal the next opening line. Returns `false` if nothing changed.
    pub fn advance(&mut self) -> bool {
        match self.cursor {
            Cursor::Line(i) if i < self.lines.len() + 1 => {
                self.cursor = Cursor::Line(i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn show_ending(&mut self) {
        self.cursor = Cursor::Ending;
    }

    /// Append text to an opening line. Returns `false` if the line is missing.
    pub fn extend_line(&mut self, line: usize, text: &str) -> bool {
        match self.lines.get_mut(line) {
            Some(l) => {
                l.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Lines to draw. `transitioning` hides the "more" marker on the ending.
    pub fn visible(&self, transitioning: bool) -> Option<VisibleDialogue> {
        match self.cursor {
            Cursor::Hidden => None,
            Cursor::Line(i) => Some(VisibleDialogue {
                lines: self.lines[..(i + 1).min(self.lines.len())].to_vec(),
                more: i + 1 < self.lines.len(),
            }),
            Cursor::Ending => {
                let mut lines = self.lines.clone();
                lines.extend(self.end_line.clone());
                Some(VisibleDialogue {
                    lines,
                    more: !transitioning,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(raw: &[Option<&str>]) -> Vec<Option<String>> {
        raw.iter().map(|l| l.map(str::to_string)).collect()
    }

    #[test]
    fn null_first_entry_hides_opening() {
        let d = Dialogue::new(&entries(&[None, Some("It's been like this all my life.")]));
        assert_eq!(d.cursor(), Cursor::Hidden);
        assert!(d.lines().is_empty());
        assert_eq!(d.end_line(), Some("It's been like this all my life."));
        assert!(!d.is_blocking());
        assert!(d.visible(false).is_none());
    }

    #[test]
    fn empty_dialogue() {
        let mut d = Dialogue::new(&[]);
        assert_eq!(d.cursor(), Cursor::Hidden);
        assert!(d.end_line().is_none());
        assert!(!d.advance());
    }

    #[test]
    fn advancing_reveals_lines_in_order() {
        let mut d = Dialogue::new(&entries(&[Some("one"), Some("two"), Some("three"), None]));
        assert!(d.is_blocking());
        assert_eq!(d.visible(false).unwrap().lines, vec!["one"]);

        assert!(d.advance());
        let v = d.visible(false).unwrap();
        assert_eq!(v.lines, vec!["one", "two"]);
        assert!(v.more);
        assert!(d.is_blocking());

        assert!(d.advance());
        let v = d.visible(false).unwrap();
        assert_eq!(v.lines, vec!["one", "two", "three"]);
        assert!(!v.more);
        assert!(!d.is_blocking());
    }

    #[test]
    fn single_line_does_not_block() {
        let d = Dialogue::new(&entries(&[Some("only"), Some("end")]));
        assert!(!d.is_blocking());
        assert_eq!(d.end_line(), Some("end"));
    }

    #[test]
    fn ending_shows_everything() {
        let mut d = Dialogue::new(&entries(&[Some("a"), Some("b"), Some("fin")]));
        d.show_ending();
        let v = d.visible(false).unwrap();
        assert_eq!(v.lines, vec!["a", "b", "fin"]);
        assert!(v.more);
        assert!(!d.visible(true).unwrap().more);
        assert!(!d.advance());
    }

    #[test]
    fn extend_existing_line_only() {
        let mut d = Dialogue::new(&entries(&[Some("a"), Some("choice"), None]));
        assert!(d.extend_line(1, "..."));
        assert_eq!(d.lines()[1], "choice...");
        assert!(!d.extend_line(5, "x"));
    }

    #[test]
    fn interior_null_keeps_line_indices() {
        let mut d = Dialogue::new(&entries(&[Some("a"), None, Some("c"), None]));
        assert_eq!(d.lines(), ["a", "", "c"]);
        assert!(d.extend_line(2, "!"));
        assert_eq!(d.lines()[2], "c!");
    }
}
