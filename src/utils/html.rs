/// Strips markup from user-supplied free text (reviews, contact messages).
///
/// Whitelist-based: harmless formatting tags survive, `<script>`/`<iframe>`
/// and event-handler attributes are removed together with script bodies.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
