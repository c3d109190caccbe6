use std::path::Path;
use teloxide::types::InputFile;

/// Media columns hold a local path, an http(s) URL or a Telegram `file_id`.
pub fn input_file(source: &str) -> InputFile {
    let source = source.trim();

    if source.starts_with("http://") || source.starts_with("https://") {
        if let Ok(url) = reqwest::Url::parse(source) {
            return InputFile::url(url);
        }
    }

    if Path::new(source).is_file() {
        return InputFile::file(source);
    }

    InputFile::file_id(source)
}
