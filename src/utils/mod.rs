use std::collections::HashSet;

use crate::entity::Entity;

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn parse_entities_csv(value: &str) -> Result<Vec<Entity>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("entity list is empty".to_string());
    }
    let mut out: Vec<Entity> = Vec::new();
    let mut seen: HashSet<Entity> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let entity = Entity::parse(item).ok_or_else(|| format!("unknown entity '{item}'"))?;
        if seen.insert(entity) {
            out.push(entity);
        }
    }
    if out.is_empty() {
        return Err("entity list is empty".to_string());
    }
    Ok(out)
}

/// Parses a `field=value` form assignment. The value may be empty or contain
/// further `=` characters.
pub fn parse_field_assignment(value: &str) -> Result<(String, String), String> {
    let (field, rest) = value
        .split_once('=')
        .ok_or_else(|| "expected format FIELD=VALUE".to_string())?;
    let field = field.trim();
    if field.is_empty() {
        return Err("field name is empty".to_string());
    }
    Ok((field.to_string(), rest.to_string()))
}

pub fn parse_page_number(value: &str) -> Result<u32, String> {
    let page: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid page '{value}'"))?;
    if page == 0 {
        return Err("page numbers start at 1".to_string());
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn parse_entities_csv_parses_and_dedupes() {
        let out = parse_entities_csv("social, medication,social_history").unwrap();
        assert_eq!(out, vec![Entity::SocialHistory, Entity::MedicationHistory]);
        assert!(parse_entities_csv("social,labs").is_err());
        assert!(parse_entities_csv(" , ").is_err());
    }

    #[test]
    fn parse_field_assignment_keeps_value_verbatim() {
        assert_eq!(
            parse_field_assignment("instructions=take 1 = daily").unwrap(),
            ("instructions".to_string(), "take 1 = daily".to_string())
        );
        assert_eq!(
            parse_field_assignment("diet=").unwrap(),
            ("diet".to_string(), String::new())
        );
        assert!(parse_field_assignment("dosage").is_err());
        assert!(parse_field_assignment("=5mg").is_err());
    }

    #[test]
    fn parse_page_number_rejects_zero() {
        assert_eq!(parse_page_number(" 3 ").unwrap(), 3);
        assert!(parse_page_number("0").is_err());
        assert!(parse_page_number("two").is_err());
    }
}
