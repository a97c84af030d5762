use crate::error::{Error, Result};
use crate::models::test::Test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub section: usize,
    pub question: usize,
}

impl Cursor {
    pub fn new(section: usize, question: usize) -> Self {
        Self { section, question }
    }
}

/// Maps between (section, question) cursors and the flat question index.
#[derive(Debug, Clone)]
pub struct Layout {
    section_lengths: Vec<usize>,
    question_ids: Vec<String>,
}

impl Layout {
    pub fn new(test: &Test) -> Self {
        Self {
            section_lengths: test.sections.iter().map(|s| s.questions.len()).collect(),
            question_ids: test.questions().map(|q| q.id.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.question_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.question_ids.is_empty()
    }

    pub fn section_count(&self) -> usize {
        self.section_lengths.len()
    }

    pub fn check(&self, cursor: Cursor) -> Result<Cursor> {
        match self.section_lengths.get(cursor.section) {
            Some(&len) if cursor.question < len => Ok(cursor),
            _ => Err(Error::InvalidInput(format!(
                "No question {} in section {}",
                cursor.question + 1,
                cursor.section + 1
            ))),
        }
    }

    pub fn global_index(&self, cursor: Cursor) -> usize {
        self.section_lengths[..cursor.section.min(self.section_lengths.len())]
            .iter()
            .sum::<usize>()
            + cursor.question
    }

    pub fn cursor_at(&self, index: usize) -> Option<Cursor> {
        let mut remaining = index;
        for (section, &len) in self.section_lengths.iter().enumerate() {
            if remaining < len {
                return Some(Cursor::new(section, remaining));
            }
            remaining -= len;
        }
        None
    }

    /// First cursor of the first non-empty section.
    pub fn first(&self) -> Option<Cursor> {
        self.cursor_at(0)
    }

    pub fn next(&self, cursor: Cursor) -> Option<Cursor> {
        self.cursor_at(self.global_index(cursor) + 1)
    }

    pub fn previous(&self, cursor: Cursor) -> Option<Cursor> {
        self.global_index(cursor)
            .checked_sub(1)
            .and_then(|i| self.cursor_at(i))
    }

    pub fn question_id(&self, cursor: Cursor) -> Option<&str> {
        self.question_ids
            .get(self.global_index(cursor))
            .map(String::as_str)
    }

    /// Question ids of one section, in order.
    pub fn section_ids(&self, section: usize) -> &[String] {
        let Some(&len) = self.section_lengths.get(section) else {
            return &[];
        };
        let start = self.global_index(Cursor::new(section, 0));
        &self.question_ids[start..start + len]
    }

    pub fn all_ids(&self) -> &[String] {
        &self.question_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(lengths: &[usize]) -> Layout {
        let mut n = 0;
        let question_ids = lengths
            .iter()
            .flat_map(|&len| {
                (0..len)
                    .map(|_| {
                        n += 1;
                        format!("q{}", n)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        Layout {
            section_lengths: lengths.to_vec(),
            question_ids,
        }
    }

    #[test]
    fn next_and_previous_cross_section_boundaries() {
        let layout = layout(&[2, 0, 3]);
        let last_of_first = Cursor::new(0, 1);
        assert_eq!(layout.next(last_of_first), Some(Cursor::new(2, 0)));
        assert_eq!(layout.previous(Cursor::new(2, 0)), Some(last_of_first));
        assert_eq!(layout.previous(Cursor::new(0, 0)), None);
        assert_eq!(layout.next(Cursor::new(2, 2)), None);
        assert_eq!(layout.question_id(Cursor::new(2, 1)), Some("q4"));
    }

    #[test]
    fn out_of_range_cursors_are_rejected() {
        let layout = layout(&[2, 3]);
        assert!(layout.check(Cursor::new(1, 2)).is_ok());
        assert!(matches!(
            layout.check(Cursor::new(1, 3)),
            Err(Error::InvalidInput(_))
        ));
        assert!(layout.check(Cursor::new(2, 0)).is_err());
        assert_eq!(layout.section_ids(1), ["q3", "q4", "q5"]);
        assert!(layout.section_ids(7).is_empty());
    }
}
