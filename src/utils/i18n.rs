use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Languages user-facing messages are available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Parses a language tag such as `fr`, `fr-FR` or `en_GB`.
    pub fn parse(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::En),
            "fr" => Some(Locale::Fr),
            _ => None,
        }
    }

    /// Picks the first supported language of an `Accept-Language` header,
    /// honouring the listed order (quality values are not re-sorted).
    pub fn from_accept_language(header: Option<&str>, fallback: Locale) -> Self {
        header
            .into_iter()
            .flat_map(|h| h.split(','))
            .filter_map(|part| Self::parse(part.split(';').next().unwrap_or("")))
            .next()
            .unwrap_or(fallback)
    }
}

/// User-facing messages raised by the staging service.
#[derive(Debug, Clone)]
pub enum Message<'a> {
    SessionLost,
    TooManyFiles { max: u32 },
    FileTooLarge { name: &'a str, max: u64 },
    MimeNotAllowed { name: &'a str, mime: &'a str },
    NotAFileField,
}

pub fn localize(message: &Message<'_>, locale: Locale) -> String {
    match (message, locale) {
        (Message::SessionLost, Locale::En) => {
            "Your session has expired. Please reload the form before uploading files.".to_string()
        }
        (Message::SessionLost, Locale::Fr) => {
            "Votre session a expiré. Veuillez recharger le formulaire avant d'envoyer des fichiers."
                .to_string()
        }
        (Message::TooManyFiles { max }, Locale::En) => {
            format!("You cannot upload more than {} file(s) for this field.", max)
        }
        (Message::TooManyFiles { max }, Locale::Fr) => {
            format!("Vous ne pouvez pas envoyer plus de {} fichier(s) pour ce champ.", max)
        }
        (Message::FileTooLarge { name, max }, Locale::En) => {
            format!("The file '{}' exceeds the maximum size of {} bytes.", name, max)
        }
        (Message::FileTooLarge { name, max }, Locale::Fr) => {
            format!("Le fichier '{}' dépasse la taille maximale de {} octets.", name, max)
        }
        (Message::MimeNotAllowed { name, mime }, Locale::En) => {
            format!("The file '{}' has a type ({}) that is not accepted.", name, mime)
        }
        (Message::MimeNotAllowed { name, mime }, Locale::Fr) => {
            format!("Le type du fichier '{}' ({}) n'est pas accepté.", name, mime)
        }
        (Message::NotAFileField, Locale::En) => "This field does not accept files.".to_string(),
        (Message::NotAFileField, Locale::Fr) => "Ce champ n'accepte pas de fichiers.".to_string(),
    }
}
