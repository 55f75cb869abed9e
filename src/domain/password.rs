use secrecy::{ExposeSecret, Secret};

const MIN_LENGTH: usize = 8;
const MAX_LENGTH: usize = 128;

/// A plaintext password that satisfies the length policy. Only ever hashed,
/// never stored.
#[derive(Debug)]
pub struct Password(Secret<String>);

impl Password {
    pub fn parse(s: Secret<String>) -> Result<Password, String> {
        let length = s.expose_secret().chars().count();
        if length < MIN_LENGTH {
            return Err(format!(
                "Passwords must be at least {} characters long.",
                MIN_LENGTH
            ));
        }
        if length > MAX_LENGTH {
            return Err(format!(
                "Passwords must be at most {} characters long.",
                MAX_LENGTH
            ));
        }
        Ok(Self(s))
    }
}

impl ExposeSecret<String> for Password {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}
