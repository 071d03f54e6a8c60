/// Reduces catalog rich text to an allowlist of harmless markup.
///
/// Parses the input as HTML, so entity-encoded schemes and attributes without
/// leading whitespace are seen the way a browser would see them. Scripts and
/// styles are dropped with their bodies, event handlers and non-web URL schemes
/// are dropped from the tags that remain.
pub fn sanitize_html(input: &str) -> String {
    ammonia::clean(input)
}
