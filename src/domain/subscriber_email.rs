use validator::ValidateEmail;

#[derive(Debug, Clone, PartialEq, Eq)]
/// An email address as captured from a subscribe form, normalised (trimmed and
/// lowercased) and validated. Must be instantiated with
/// `SubscriberEmail::parse`.
///
/// The local store compares emails by exact string match, so normalisation has
/// to happen here, before anything is persisted.
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<Self, String> {
        let normalised = email.trim().to_lowercase();
        ValidateEmail::validate_email(&normalised)
            .then_some(Self(normalised))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
