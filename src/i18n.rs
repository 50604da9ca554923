//! Translation table lookup helpers.
//!
//! The translation store is a two-level map: language code to a nested
//! message tree. Keys are dotted paths into the tree; a leaf is either a
//! plain message string or a map of plural forms (`zero`, `one`, `other`).
//! Dispatch, interpolation and fallback ordering live in the engine; this
//! module only answers lookups.

use crate::value::{Map, Value};

/// Walks a dotted key through a nested message tree.
pub(crate) fn lookup_namespace<'a>(tree: &'a Map, key: &str) -> Option<&'a Value> {
    let mut cur = tree;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        let val = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(val);
        }
        cur = val.as_object()?;
    }
    None
}

/// Tries each language in order and returns the first tree that holds the
/// key.
pub(crate) fn lookup_with_fallback<'a>(
    translations: &'a Map,
    langs: &[&str],
    key: &str,
) -> Option<&'a Value> {
    langs
        .iter()
        .filter_map(|lang| translations.get(*lang).and_then(Value::as_object))
        .find_map(|tree| lookup_namespace(tree, key))
}

/// Picks the plural form for a count: `zero` and `one` when present and the
/// count matches, then `other`, then whatever form the map declares first.
pub(crate) fn select_plural_form<'a>(forms: &'a Map, count: i64) -> Option<&'a str> {
    if count == 0 && forms.contains_key("zero") {
        return Some("zero");
    }
    if count == 1 && forms.contains_key("one") {
        return Some("one");
    }
    if forms.contains_key("other") {
        return Some("other");
    }
    forms.keys().next().map(String::as_str)
}

/// Whether an argument string looks like a language code: `en`, or `tr-TR`
/// with the separator at the third byte.
pub(crate) fn is_lang_code(s: &str) -> bool {
    let b = s.as_bytes();
    match b.len() {
        2 => b.iter().all(u8::is_ascii_alphabetic),
        5 => {
            b[2] == b'-'
                && b[..2].iter().all(u8::is_ascii_alphabetic)
                && b[3..].iter().all(u8::is_ascii_alphabetic)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Map {
        match json!({
            "greeting": "Hello",
            "cart": { "items": { "one": "1 item", "other": "{{ count }} items" } }
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn namespace_walks_dotted_keys() {
        let t = tree();
        assert_eq!(lookup_namespace(&t, "greeting"), Some(&json!("Hello")));
        assert!(lookup_namespace(&t, "cart.items").is_some());
        assert_eq!(lookup_namespace(&t, "cart.missing"), None);
        assert_eq!(lookup_namespace(&t, "greeting.deeper"), None);
    }

    #[test]
    fn fallback_tries_languages_in_order() {
        let translations = match json!({
            "en": { "hello": "Hello" },
            "tr": { "bye": "Hoşça kal" }
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(
            lookup_with_fallback(&translations, &["tr", "en"], "hello"),
            Some(&json!("Hello"))
        );
        assert_eq!(lookup_with_fallback(&translations, &["tr"], "hello"), None);
    }

    #[test]
    fn plural_form_selection() {
        let forms = match json!({"zero": "none", "one": "single", "other": "many"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(select_plural_form(&forms, 0), Some("zero"));
        assert_eq!(select_plural_form(&forms, 1), Some("one"));
        assert_eq!(select_plural_form(&forms, 7), Some("other"));

        let sparse = match json!({"few": "a few"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(select_plural_form(&sparse, 3), Some("few"));
    }

    #[test]
    fn lang_code_shapes() {
        assert!(is_lang_code("en"));
        assert!(is_lang_code("tr-TR"));
        assert!(!is_lang_code("english"));
        assert!(!is_lang_code("e1"));
        assert!(!is_lang_code("tr_TR"));
    }
}
