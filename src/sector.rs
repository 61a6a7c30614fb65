use serde_json::Value;

/// Top-level sector a posting belongs to. Only these two reach the output;
/// everything else is filtered out upstream of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    InformationTechnology,
    Engineering,
}

impl Sector {
    /// The dashboard-facing name, as it appears in the `categories` feed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::InformationTechnology => "Information Technology",
            Sector::Engineering => "Engineering",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Information Technology" => Some(Sector::InformationTechnology),
            "Engineering" => Some(Sector::Engineering),
            _ => None,
        }
    }
}

/// The source feed emits the category list with single quotes
/// (`[{'id':21,'category':'Engineering'}]`), which is not valid JSON.
/// Quote substitution is its own step so the recovery path stays testable.
pub fn normalize_quotes(raw: &str) -> String {
    raw.replace('\'', "\"")
}

/// Parse the raw category field into the category names it carries.
///
/// Two shapes occur in the wild: a plain array of strings
/// (`['Information Technology']`) and an array of objects with a `category`
/// key. Anything unparseable yields an empty vec; a bad row must never
/// abort the batch.
pub fn parse_categories(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return Vec::new();
    }

    let normalized = normalize_quotes(trimmed);
    let parsed: Vec<Value> = match serde_json::from_str(&normalized) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    parsed
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Object(map) => map
                .get("category")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Resolve the raw category field to the sector used for dashboard filters.
/// Information Technology wins when a posting is tagged with both.
/// `None` means the record carries no recognized sector and is dropped.
pub fn primary_sector(raw: &str) -> Option<Sector> {
    let cats = parse_categories(raw);
    if cats.iter().any(|c| c == "Information Technology") {
        return Some(Sector::InformationTechnology);
    }
    if cats.iter().any(|c| c == "Engineering") {
        return Some(Sector::Engineering);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quoted_object_array() {
        let raw = "[{'id':21,'category':'Information Technology'},{'id':8,'category':'Sales'}]";
        assert_eq!(
            parse_categories(raw),
            vec!["Information Technology".to_string(), "Sales".to_string()]
        );
    }

    #[test]
    fn parses_plain_string_array() {
        assert_eq!(
            parse_categories("['Information Technology']"),
            vec!["Information Technology".to_string()]
        );
    }

    #[test]
    fn invalid_json_yields_empty_set() {
        assert!(parse_categories("invalid json").is_empty());
        assert!(parse_categories("[{'broken'").is_empty());
        assert!(parse_categories("").is_empty());
    }

    #[test]
    fn it_preferred_over_engineering() {
        let raw = "['Engineering', 'Information Technology']";
        assert_eq!(primary_sector(raw), Some(Sector::InformationTechnology));
    }

    #[test]
    fn engineering_alone_resolves() {
        let raw = "[{'id':5,'category':'Engineering'}]";
        assert_eq!(primary_sector(raw), Some(Sector::Engineering));
    }

    #[test]
    fn unrecognized_sectors_drop() {
        assert_eq!(primary_sector("['Sales', 'Marketing']"), None);
        assert_eq!(primary_sector("invalid json"), None);
    }

    #[test]
    fn sector_name_round_trip() {
        for s in [Sector::InformationTechnology, Sector::Engineering] {
            assert_eq!(Sector::from_name(s.as_str()), Some(s));
        }
        assert_eq!(Sector::from_name("Other"), None);
    }
}
