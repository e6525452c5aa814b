/// Character-offset view of a text, split on `\n`, `\r\n` and `\r`.
#[derive(Debug, Clone)]
pub struct LineIndex {
    chars: Vec<char>,
    line_starts: Vec<usize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\r' if chars.get(i + 1) == Some(&'\n') => {
                    i += 2;
                    line_starts.push(i);
                }
                '\r' | '\n' => {
                    i += 1;
                    line_starts.push(i);
                }
                _ => i += 1,
            }
        }
        Self { chars, line_starts }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Offset of the first character of 1-based `line`.
    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)?).copied()
    }

    /// 1-based line containing character `offset`.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Characters of 1-based `line` without its terminator.
    #[must_use]
    pub fn line_text(&self, line: usize) -> Option<&[char]> {
        let start = self.line_start(line)?;
        let mut end = self.line_starts.get(line).copied().unwrap_or(self.chars.len());
        while end > start && matches!(self.chars[end - 1], '\n' | '\r') {
            end -= 1;
        }
        self.chars.get(start..end)
    }

    #[must_use]
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(offset).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_line_terminators() {
        let lines = LineIndex::new("a\nbb\r\nc\rd");
        assert_eq!(lines.line_count(), 4);
        assert_eq!(lines.line_start(1), Some(0));
        assert_eq!(lines.line_start(2), Some(2));
        assert_eq!(lines.line_start(3), Some(6));
        assert_eq!(lines.line_start(4), Some(8));
        assert_eq!(lines.line_start(5), None);
        assert_eq!(lines.line_start(0), None);
        assert_eq!(lines.line_text(2), Some(&['b', 'b'][..]));
        assert_eq!(lines.line_text(4), Some(&['d'][..]));
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let lines = LineIndex::new("é\nx");
        assert_eq!(lines.line_start(2), Some(2));
        assert_eq!(lines.char_at(2), Some('x'));
    }
}
