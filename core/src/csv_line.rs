const SEPARATOR: char = ',';
const QUOTE: char = '"';

/// Splits one exported sheet row into trimmed fields.
///
/// Every `"` flips the quoted state and is dropped, so a comma inside a
/// quoted span stays in its field. Doubled quotes are not an escape: `""`
/// inside a field simply toggles twice. An unbalanced quote leaves the
/// parser in the quoted state, which folds the remaining commas into the
/// last field. No error is raised for either case.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            QUOTE => in_quotes = !in_quotes,
            SEPARATOR if !in_quotes => fields.push(finish_field(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(finish_field(&mut current));
    fields
}

fn finish_field(current: &mut String) -> String {
    let field = std::mem::take(current);
    let trimmed = field.trim();
    let trimmed = trimmed.strip_prefix(QUOTE).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(QUOTE).unwrap_or(trimmed);
    trimmed.to_string()
}
