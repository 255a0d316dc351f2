use crate::record::Record;

/// Queries shorter than this keep the suggestion list closed.
pub const MIN_QUERY_CHARS: usize = 2;

/// Case-insensitive substring match on name and short code, in collection
/// order, truncated to `limit`. Surrounding whitespace is ignored by the
/// minimum-length check only; the query is matched as typed.
pub fn search<'a>(records: &'a [Record], query: &str, limit: usize) -> Vec<&'a Record> {
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| {
            record.name.to_lowercase().contains(&needle)
                || record.code.to_lowercase().contains(&needle)
        })
        .take(limit)
        .collect()
}

/// Suggestion list state behind the search box.
#[derive(Debug, Clone)]
pub struct Autocomplete {
    query: String,
    suggestions: Vec<Record>,
    open: bool,
    highlighted: usize,
    limit: usize,
}

impl Autocomplete {
    pub fn new(limit: usize) -> Self {
        Self {
            query: String::new(),
            suggestions: Vec::new(),
            open: false,
            highlighted: 0,
            limit,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn suggestions(&self) -> &[Record] {
        &self.suggestions
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn set_query(&mut self, query: &str, records: &[Record]) {
        self.query = query.to_string();
        self.refresh(records);
    }

    pub fn push_char(&mut self, ch: char, records: &[Record]) {
        self.query.push(ch);
        self.refresh(records);
    }

    pub fn pop_char(&mut self, records: &[Record]) {
        self.query.pop();
        self.refresh(records);
    }

    /// Recomputes suggestions for the current query, e.g. after a sync
    /// replaced the collection.
    pub fn refresh(&mut self, records: &[Record]) {
        self.suggestions = search(records, &self.query, self.limit)
            .into_iter()
            .cloned()
            .collect();
        self.open = self.query.trim().chars().count() >= MIN_QUERY_CHARS;
        self.highlighted = 0;
    }

    pub fn move_highlight(&mut self, delta: i32) {
        if self.suggestions.is_empty() {
            return;
        }
        let last = self.suggestions.len() as i32 - 1;
        self.highlighted = (self.highlighted as i32 + delta).clamp(0, last) as usize;
    }

    /// Picks a suggestion: the query becomes its name and the list closes.
    pub fn select(&mut self, index: usize) -> Option<Record> {
        if !self.open {
            return None;
        }
        let record = self.suggestions.get(index)?.clone();
        self.query = record.name.clone();
        self.open = false;
        Some(record)
    }

    pub fn select_highlighted(&mut self) -> Option<Record> {
        self.select(self.highlighted)
    }

    /// Focus left the search box.
    pub fn dismiss(&mut self) {
        self.open = false;
    }
}
