use std::fmt;

use crate::types::FetchError;

/// Longest place name accepted. Real place names stay far below this.
pub const MAX_PLACE_NAME_CHARS: usize = 200;

/// A validated place name, ready to be embedded in an Overpass query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceQuery {
    place_name: String,
}

impl PlaceQuery {
    /// Trims and validates `place_name`.
    ///
    /// Quotes and backslashes are escaped when rendering, so names such as
    /// `Land's End` or `"Little" Italy` stay usable. Control characters
    /// cannot be escaped inside an Overpass string and are rejected.
    pub fn new(place_name: &str) -> Result<Self, FetchError> {
        let place_name = place_name.trim();
        if place_name.is_empty() {
            return Err(FetchError::invalid_input("place name must not be empty"));
        }
        if place_name.chars().count() > MAX_PLACE_NAME_CHARS {
            return Err(FetchError::invalid_input(format!(
                "place name must be at most {MAX_PLACE_NAME_CHARS} characters"
            )));
        }
        if place_name.chars().any(char::is_control) {
            return Err(FetchError::invalid_input(
                "place name must not contain control characters",
            ));
        }
        Ok(PlaceQuery {
            place_name: place_name.to_string(),
        })
    }

    pub fn place_name(&self) -> &str {
        &self.place_name
    }

    /// Builds the area lookup + building footprint query.
    /// `server_timeout` becomes the `[timeout:N]` setting the interpreter enforces on its side.
    pub fn to_overpass_ql(&self, server_timeout: Option<u64>) -> String {
        let mut query = String::from("[out:json]");
        if let Some(seconds) = server_timeout {
            query.push_str(&format!("[timeout:{seconds}]"));
        }
        query.push(';');
        query.push_str(&format!(
            r#"
area["name"="{}"]->.searchArea;
(
  way["building"](area.searchArea);
);
(._;>;);
out body;"#,
            escape_ql_string(&self.place_name)
        ));
        query
    }
}

impl fmt::Display for PlaceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_overpass_ql(None))
    }
}

/// Escapes a value for use inside a double quoted Overpass QL string.
pub fn escape_ql_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(name: &str) -> String {
        match PlaceQuery::new(name) {
            Err(FetchError::InvalidInput { reason }) => reason,
            other => panic!("expected InvalidInput for {name:?}, got {other:?}"),
        }
    }

    #[test]
    fn embeds_name_once_in_area_clause() {
        for name in ["Bangkok", "São Paulo", "Land's End", "Saint-Étienne", "Tokyo {23 wards}"] {
            let query = PlaceQuery::new(name).unwrap().to_string();
            assert_eq!(query.matches(name).count(), 1, "{query}");
            assert!(query.contains(&format!(r#"area["name"="{name}"]->.searchArea;"#)));
        }
    }

    #[test]
    fn renders_full_query_structure() {
        let query = PlaceQuery::new("Bangkok").unwrap().to_overpass_ql(Some(25));
        assert_eq!(
            query,
            r#"[out:json][timeout:25];
area["name"="Bangkok"]->.searchArea;
(
  way["building"](area.searchArea);
);
(._;>;);
out body;"#
        );
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let query = PlaceQuery::new("  Chiang Mai \t").unwrap();
        assert_eq!(query.place_name(), "Chiang Mai");
    }

    #[test]
    fn escapes_double_quotes_without_truncating() {
        let query = PlaceQuery::new(r#"Foo"];out;("Bar"#).unwrap().to_string();
        assert!(query.contains(r#"area["name"="Foo\"];out;(\"Bar"]->.searchArea;"#));
        // Only the template's own closing statement remains.
        assert_eq!(query.matches("out body;").count(), 1);
        assert!(query.ends_with("out body;"));
    }

    #[test]
    fn escapes_backslashes_before_quotes() {
        assert_eq!(escape_ql_string(r#"a\"b"#), r#"a\\\"b"#);
        let query = PlaceQuery::new(r"Trailing\").unwrap().to_string();
        assert!(query.contains(r#"area["name"="Trailing\\"]"#));
    }

    #[test]
    fn rejects_empty_and_blank_names() {
        assert!(rejected("").contains("empty"));
        assert!(rejected("   ").contains("empty"));
    }

    #[test]
    fn rejects_control_characters() {
        assert!(rejected("Bang\nkok").contains("control"));
        assert!(rejected("Bang\rkok").contains("control"));
        assert!(rejected("a\u{0}b").contains("control"));
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "x".repeat(MAX_PLACE_NAME_CHARS + 1);
        assert!(rejected(&name).contains("at most"));
        assert!(PlaceQuery::new(&"x".repeat(MAX_PLACE_NAME_CHARS)).is_ok());
    }
}
