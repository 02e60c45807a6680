/// Guess the content type of an object from the extension of its key.
///
/// Returns `None` if the key has no extension or if the extension is unknown,
/// in which case the store applies its own default.
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    mime_guess::from_path(key).first_raw()
}
