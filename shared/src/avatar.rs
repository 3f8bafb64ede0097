//! Avatar image URLs from the ui-avatars service.

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

/// Size in pixels when the caller has no preference.
pub const DEFAULT_AVATAR_SIZE: u32 = 200;

/// Build the URL of a generated initials avatar for `name`.
///
/// Only the URL is built; the image is fetched by whoever renders it.
pub fn avatar_url(name: &str, size: u32) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("name", name.trim())
        .append_pair("size", &size.to_string())
        .append_pair("background", "random")
        .append_pair("color", "fff")
        .append_pair("bold", "true")
        .append_pair("length", "2")
        .finish();

    format!("{}?{}", AVATAR_BASE_URL, query)
}
