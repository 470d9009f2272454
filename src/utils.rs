use urlencoding::encode;
use url::Url;

use crate::payload::Payload;

pub fn print_error(verbose: bool, msg: &str, err: &dyn std::fmt::Display) {
    if verbose {
        eprintln!("{}: {}", msg, err);
    }
}

pub fn build_url_with_pairs(base_url: &Url, pairs: &[(String, String)]) -> Url {
    let mut url = base_url.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs.iter().map(|(k, v)| (k, v)));
    }
    url
}

/// Sets each payload's parameter in the query string of `target`.
///
/// An existing key keeps its position and gets the marker as its value; any
/// later duplicates of that key are dropped. Unknown keys are appended in
/// payload order. Keys not named by a payload are left alone.
pub fn inject_query(target: &str, payloads: &[Payload]) -> Result<Url, url::ParseError> {
    let base = Url::parse(target)?;
    let mut pairs: Vec<(String, String)> = base
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    for payload in payloads {
        let mut seen = false;
        pairs.retain_mut(|(key, value)| {
            if *key != payload.parameter {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            *value = payload.value.clone();
            true
        });
        if !seen {
            pairs.push((payload.parameter.clone(), payload.value.clone()));
        }
    }

    Ok(build_url_with_pairs(&base, &pairs))
}

/// `name=value` pairs, both sides percent-encoded, joined by `&`.
pub fn form_body(payloads: &[Payload]) -> String {
    payloads
        .iter()
        .map(|p| format!("{}={}", encode(&p.parameter), encode(&p.value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Variant;

    fn payload(parameter: &str, value: &str) -> Payload {
        Payload {
            parameter: parameter.to_string(),
            value: value.to_string(),
            variant: Variant::DoubleQuote,
        }
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn overwrites_existing_and_keeps_others() {
        let url = inject_query(
            "http://a.test/search?page=2&q=old&lang=en",
            &[payload("q", "abc\">12")],
        )
        .unwrap();
        assert_eq!(
            query(&url),
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "abc\">12".to_string()),
                ("lang".to_string(), "en".to_string()),
            ]
        );
    }

    #[test]
    fn duplicate_keys_collapse_to_one() {
        let url = inject_query("http://a.test/?q=1&q=2", &[payload("q", "x'>y")]).unwrap();
        assert_eq!(query(&url), vec![("q".to_string(), "x'>y".to_string())]);
    }

    #[test]
    fn new_keys_are_appended() {
        let url = inject_query(
            "http://a.test/path",
            &[payload("a", "1"), payload("b", "2")],
        )
        .unwrap();
        assert_eq!(url.path(), "/path");
        assert_eq!(
            query(&url),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn invalid_target_is_an_error() {
        assert!(inject_query("not a url", &[payload("q", "1")]).is_err());
    }

    #[test]
    fn form_body_encodes_values() {
        let body = form_body(&[payload("q", "abc\">12"), payload("id", "abc'>12")]);
        assert_eq!(body, "q=abc%22%3E12&id=abc%27%3E12");
    }
}
