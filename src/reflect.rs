use crate::payload::Payload;

/// Exact, case-sensitive byte search. No decoding of any kind.
pub fn is_reflected(body: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    body.windows(needle.len()).any(|window| window == needle)
}

/// Reflection flag per payload, in payload order.
pub fn check_reflections(body: &[u8], payloads: &[Payload]) -> Vec<bool> {
    payloads
        .iter()
        .map(|p| is_reflected(body, &p.value))
        .collect()
}
