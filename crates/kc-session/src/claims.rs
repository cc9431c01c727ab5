//! Identity claims and the user profile derived from them.
//!
//! Claims come from the provider's parsed ID token. A session is valid
//! only when the subject and both name claims are present and the
//! authentication context reference decodes to an accepted assurance level.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Assurance levels accepted for an authenticated session.
pub const ACCEPTED_ASSURANCE_LEVELS: [u8; 2] = [3, 4];

/// Identity claims from the provider's parsed ID token.
///
/// Every field is optional on the wire; [`IdentityClaims::validate`] decides
/// whether the payload is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Personal identifier of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,

    /// Given (first) name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// Family (last) name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Authentication context class reference, e.g. `Level4`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Claims not interpreted by the session manager.
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl IdentityClaims {
    /// Parses claims from a JSON payload.
    pub fn from_json(value: serde_json::Value) -> SessionResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| SessionError::InvalidClaims(format!("malformed claims: {e}")))
    }

    /// Returns the assurance level encoded in `acr`.
    #[must_use]
    pub fn assurance_level(&self) -> Option<u8> {
        self.acr.as_deref().and_then(assurance_level_from_acr)
    }

    /// Checks if the assurance level is one of the accepted levels.
    #[must_use]
    pub fn assurance_level_is_valid(&self) -> bool {
        self.assurance_level()
            .is_some_and(|level| ACCEPTED_ASSURANCE_LEVELS.contains(&level))
    }

    /// Validates that the claims describe a usable session.
    pub fn validate(&self) -> SessionResult<()> {
        required(self.pid.as_deref(), "pid")?;
        required(self.given_name.as_deref(), "given_name")?;
        required(self.family_name.as_deref(), "family_name")?;

        if !self.assurance_level_is_valid() {
            return Err(SessionError::InvalidClaims(
                "assurance level not accepted".to_string(),
            ));
        }
        Ok(())
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> SessionResult<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SessionError::InvalidClaims(format!("missing claim: {name}"))),
    }
}

/// User profile published to the UI after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Personal identifier.
    pub id: String,
    /// Capitalized first name(s).
    pub first_name: String,
    /// Capitalized last name(s).
    pub last_name: String,
    /// Assurance level of the login.
    pub assurance_level: u8,
    /// Email address, if the provider supplied one.
    pub email: Option<String>,
}

impl UserProfile {
    /// Builds a profile from validated claims.
    pub fn from_claims(claims: &IdentityClaims) -> SessionResult<Self> {
        claims.validate()?;

        let id = required(claims.pid.as_deref(), "pid")?;
        let given_name = required(claims.given_name.as_deref(), "given_name")?;
        let family_name = required(claims.family_name.as_deref(), "family_name")?;
        let assurance_level = claims.assurance_level().ok_or_else(|| {
            SessionError::InvalidClaims("assurance level not accepted".to_string())
        })?;

        Ok(Self {
            id: id.to_string(),
            first_name: capitalize_names(given_name),
            last_name: capitalize_names(family_name),
            assurance_level,
            email: claims.email.clone(),
        })
    }
}

/// Lower-cases `names` and upper-cases the first character of every
/// space-separated word.
#[must_use]
pub fn capitalize_names(names: &str) -> String {
    names
        .to_lowercase()
        .split(' ')
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decodes the assurance level from the last character of an ACR value.
///
/// `"Level4"` gives `Some(4)`. Only the final character is read, so
/// `"Level12"` gives `Some(2)`.
#[must_use]
pub fn assurance_level_from_acr(acr: &str) -> Option<u8> {
    acr.chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: serde_json::Value) -> IdentityClaims {
        IdentityClaims::from_json(value).unwrap()
    }

    #[test]
    fn capitalizes_each_word() {
        assert_eq!(capitalize_names("jane ann"), "Jane Ann");
        assert_eq!(capitalize_names("JANE ann"), "Jane Ann");
        assert_eq!(capitalize_names("ØYVIND ÅSE"), "Øyvind Åse");
    }

    #[test]
    fn capitalization_is_idempotent() {
        for input in ["jane ann", "JANE ann", "ola  nordmann", "anne-marie", ""] {
            let once = capitalize_names(input);
            assert_eq!(capitalize_names(&once), once);
        }
    }

    #[test]
    fn capitalization_keeps_separators() {
        assert_eq!(capitalize_names("ola  nordmann"), "Ola  Nordmann");
        assert_eq!(capitalize_names("ANNE-MARIE"), "Anne-marie");
    }

    #[test]
    fn level_from_last_character() {
        assert_eq!(assurance_level_from_acr("Level3"), Some(3));
        assert_eq!(assurance_level_from_acr("Level4"), Some(4));
        assert_eq!(assurance_level_from_acr("Level12"), Some(2));
        assert_eq!(assurance_level_from_acr("LevelX"), None);
        assert_eq!(assurance_level_from_acr(""), None);
    }

    #[test]
    fn only_levels_three_and_four_are_accepted() {
        for c in '0'..='9' {
            let acr = format!("Level{c}");
            let claims = IdentityClaims {
                acr: Some(acr),
                ..IdentityClaims::default()
            };
            assert_eq!(claims.assurance_level_is_valid(), c == '3' || c == '4');
        }
        let claims = IdentityClaims {
            acr: Some("substantial".to_string()),
            ..IdentityClaims::default()
        };
        assert!(!claims.assurance_level_is_valid());
    }

    #[test]
    fn missing_required_claims_fail_validation() {
        let full = json!({
            "pid": "01019012345",
            "given_name": "OLA",
            "family_name": "NORDMANN",
            "acr": "Level4",
        });

        for missing in ["pid", "given_name", "family_name"] {
            let mut payload = full.clone();
            payload.as_object_mut().unwrap().remove(missing);
            let err = claims(payload).validate().unwrap_err();
            assert!(
                matches!(&err, SessionError::InvalidClaims(msg) if msg.contains(missing)),
                "unexpected error for {missing}: {err}"
            );
        }

        let mut empty_name = full.clone();
        empty_name["given_name"] = json!("");
        assert!(claims(empty_name).validate().is_err());

        assert!(claims(full).validate().is_ok());
    }

    #[test]
    fn profile_from_claims() {
        let claims = claims(json!({
            "pid": "01019012345",
            "given_name": "OLA",
            "family_name": "NORDMANN",
            "acr": "Level4",
            "email": "ola@example.com",
            "sid": "f1d2",
        }));

        let profile = UserProfile::from_claims(&claims).unwrap();
        assert_eq!(
            profile,
            UserProfile {
                id: "01019012345".to_string(),
                first_name: "Ola".to_string(),
                last_name: "Nordmann".to_string(),
                assurance_level: 4,
                email: Some("ola@example.com".to_string()),
            }
        );
        assert_eq!(claims.additional.get("sid"), Some(&json!("f1d2")));
    }

    #[test]
    fn profile_rejects_low_assurance() {
        let claims = claims(json!({
            "pid": "01019012345",
            "given_name": "OLA",
            "family_name": "NORDMANN",
            "acr": "Level2",
        }));

        assert!(UserProfile::from_claims(&claims).is_err());
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = UserProfile {
            id: "1".to_string(),
            first_name: "Kari".to_string(),
            last_name: "Nordmann".to_string(),
            assurance_level: 3,
            email: None,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["firstName"], "Kari");
        assert_eq!(value["assuranceLevel"], 3);
    }
}
