#[derive(Debug, Clone)]
pub struct Phone(String);

impl Phone {
    pub fn parse(s: String) -> Result<Phone, String> {
        let s = s.trim().to_string();
        let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '.' | '(' | ')');
        let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
        if s.chars().all(allowed) && (6..=20).contains(&digits) {
            Ok(Self(s))
        } else {
            Err(format!("{} is not a valid phone number.", s))
        }
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
