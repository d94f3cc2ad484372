//! Naming convention helpers.

/// Splits `name` into words at underscores and case changes.
///
/// A run of capitals is one word, except that its last capital starts a new
/// word when a lowercase letter follows (`HTTPServer` is `HTTP`, `Server`).
fn words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Converts `name` to lower_snake_case.
pub fn to_lower_snake_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Converts `name` to PascalCase. Capitals inside a word are kept.
pub fn to_pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Checks whether `name` is already lower_snake_case.
pub fn is_lower_snake_case(name: &str) -> bool {
    name == to_lower_snake_case(name)
}

/// Checks whether `name` is already PascalCase.
pub fn is_pascal_case(name: &str) -> bool {
    name == to_pascal_case(name)
}
