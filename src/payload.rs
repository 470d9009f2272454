use md5::{Digest, Md5};

/// Which quote context a payload tries to break out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    DoubleQuote,
    SingleQuote,
}

impl Variant {
    /// Every variant, in the order jobs are emitted for a batch.
    pub const ALL: [Variant; 2] = [Variant::DoubleQuote, Variant::SingleQuote];

    pub fn delimiter(self) -> &'static str {
        match self {
            Variant::DoubleQuote => "\">",
            Variant::SingleQuote => "'>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub parameter: String,
    pub value: String,
    pub variant: Variant,
}

/// Builds the marker for `parameter` in the given quoting variant.
///
/// The marker is the first 3 and last 2 hex digits of the MD5 of the name,
/// joined by the variant's delimiter, so the same name always maps to the
/// same marker across runs.
pub fn marker(parameter: &str, variant: Variant) -> String {
    let hash = format!("{:x}", Md5::digest(parameter.as_bytes()));
    format!("{}{}{}", &hash[..3], variant.delimiter(), &hash[hash.len() - 2..])
}

/// Two payloads per name, double-quote variant first.
pub fn generate_payloads<S: AsRef<str>>(parameters: &[S]) -> Vec<Payload> {
    parameters
        .iter()
        .flat_map(|param| {
            let param = param.as_ref();
            Variant::ALL.into_iter().map(move |variant| Payload {
                parameter: param.to_string(),
                value: marker(param, variant),
                variant,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_payloads_per_parameter() {
        let payloads = generate_payloads(&["q"]);
        assert_eq!(payloads.len(), 2);
        assert!(payloads.iter().all(|p| p.parameter == "q"));
        assert_eq!(payloads[0].variant, Variant::DoubleQuote);
        assert_eq!(payloads[1].variant, Variant::SingleQuote);
        assert_ne!(payloads[0].value, payloads[1].value);
    }

    #[test]
    fn values_differ_only_in_delimiter() {
        let payloads = generate_payloads(&["search"]);
        let double = &payloads[0].value;
        let single = &payloads[1].value;
        assert_eq!(double.replace("\">", "'>"), *single);
        assert_eq!(&double[..3], &single[..3]);
        assert_eq!(&double[double.len() - 2..], &single[single.len() - 2..]);
    }

    #[test]
    fn known_md5_slices() {
        // md5("q") = 7694f4a66316e53c8cdd9d9954bd611d
        let payloads = generate_payloads(&["q"]);
        assert_eq!(payloads[0].value, "769\">1d");
        assert_eq!(payloads[1].value, "769'>1d");
    }

    #[test]
    fn deterministic() {
        let params = ["id", "name", "redirect_uri"];
        assert_eq!(generate_payloads(&params), generate_payloads(&params));
    }

    #[test]
    fn empty_input() {
        let params: [&str; 0] = [];
        assert!(generate_payloads(&params).is_empty());
    }
}
