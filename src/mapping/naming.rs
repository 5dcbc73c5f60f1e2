//! Field name to node key conversion.

/// How a field name becomes a node key when no explicit key is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamingScheme {
    /// Use the field name unchanged.
    Passthrough,
    /// `max_connections` becomes `maxConnections`.
    CamelCase,
    /// `maxConnections` becomes `max_connections`.
    SnakeCase,
    /// `max_connections` becomes `max-connections`.
    #[default]
    LowerCaseDashed,
}

impl NamingScheme {
    pub fn coerce(&self, name: &str) -> String {
        match self {
            NamingScheme::Passthrough => name.to_string(),
            NamingScheme::CamelCase => {
                let mut out = String::with_capacity(name.len());
                for (i, word) in words(name).iter().enumerate() {
                    if i == 0 {
                        out.push_str(word);
                    } else {
                        let mut chars = word.chars();
                        if let Some(first) = chars.next() {
                            out.extend(first.to_uppercase());
                            out.push_str(chars.as_str());
                        }
                    }
                }
                out
            }
            NamingScheme::SnakeCase => words(name).join("_"),
            NamingScheme::LowerCaseDashed => words(name).join("-"),
        }
    }
}

/// Split on `_`, `-` and lower-to-upper case boundaries, lowercasing each word.
fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
