use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone)]
pub struct ProducerName(String);

impl ProducerName {
    pub fn parse(s: String) -> Result<ProducerName, String> {
        let s = s.trim().to_string();
        let is_empty = s.is_empty();
        let is_too_long = s.graphemes(true).count() > 256;
        let forbidden_characters = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];
        let contains_forbidden_characters = s.chars().any(|g| forbidden_characters.contains(&g));
        if is_empty || is_too_long || contains_forbidden_characters {
            Err(format!("{} is not a valid producer name.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for ProducerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
