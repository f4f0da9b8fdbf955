//! RTMP source authentication (`authmod=adobe`).
//!
//! The first connect names the user. The server rejects it with a salt and
//! a challenge; the second connect answers with a digest of the password,
//! which never goes on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Source credentials for a publish.
#[derive(Clone, Copy)]
pub(crate) struct SourceCredentials<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// Server challenge carried in a `reason=needauth` rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Challenge {
    pub salt: String,
    pub challenge: Option<String>,
    pub opaque: Option<String>,
}

/// How a connect rejection relates to source authentication.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// The server wants the challenge answered.
    NeedAuth(Challenge),

    /// The answer was wrong.
    AuthFailed,

    /// Not an authentication rejection.
    Other,
}

/// Query pairs for one connect attempt.
///
/// `answer` is `None` on the first attempt.
pub(crate) fn query_pairs(
    credentials: SourceCredentials<'_>,
    answer: Option<(&Challenge, &str)>,
) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("authmod", "adobe".to_string()),
        ("user", credentials.user.to_string()),
    ];
    if let Some((challenge, client_challenge)) = answer {
        pairs.push(("challenge", client_challenge.to_string()));
        pairs.push(("response", response(credentials, challenge, client_challenge)));
        if let Some(opaque) = &challenge.opaque {
            pairs.push(("opaque", opaque.clone()));
        }
    }
    pairs
}

/// Classify the description of a rejected connect.
pub(crate) fn classify(description: &str) -> Rejection {
    let Some((_, query)) = description.split_once("?reason=") else {
        return Rejection::Other;
    };
    let query = format!("reason={query}");

    let mut reason = None;
    let mut salt = None;
    let mut challenge = None;
    let mut opaque = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "reason" => reason = Some(value.into_owned()),
            "salt" => salt = Some(value.into_owned()),
            "challenge" => challenge = Some(value.into_owned()),
            "opaque" => opaque = Some(value.into_owned()),
            _ => {}
        }
    }

    match (reason.as_deref(), salt) {
        (Some("needauth"), Some(salt)) => Rejection::NeedAuth(Challenge {
            salt,
            challenge,
            opaque,
        }),
        (Some("authfailed"), _) => Rejection::AuthFailed,
        _ => Rejection::Other,
    }
}

/// `base64(md5(base64(md5(user salt password)) (opaque|challenge) client_challenge))`
fn response(credentials: SourceCredentials<'_>, challenge: &Challenge, client_challenge: &str) -> String {
    let first = md5::compute(format!(
        "{}{}{}",
        credentials.user, challenge.salt, credentials.password
    ));
    let first = STANDARD.encode(first.0);

    let server_part = challenge
        .opaque
        .as_deref()
        .or(challenge.challenge.as_deref())
        .unwrap_or_default();
    let second = md5::compute(format!("{first}{server_part}{client_challenge}"));
    STANDARD.encode(second.0)
}

/// Fresh client challenge.
pub(crate) fn client_challenge() -> String {
    format!("{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: SourceCredentials<'static> = SourceCredentials {
        user: "alice",
        password: "secret",
    };

    fn challenge(opaque: Option<&str>) -> Challenge {
        Challenge {
            salt: "c2FsdA==".to_string(),
            challenge: Some("Y2hhbA==".to_string()),
            opaque: opaque.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_needauth() {
        let description = "[ AccessManager.Reject ] : [ code=403 need auth; authmod=adobe ] : \
                           ?reason=needauth&user=alice&salt=c2FsdA==&challenge=Y2hhbA==&opaque=b3BxdQ==";
        assert_eq!(
            classify(description),
            Rejection::NeedAuth(Challenge {
                salt: "c2FsdA==".to_string(),
                challenge: Some("Y2hhbA==".to_string()),
                opaque: Some("b3BxdQ==".to_string()),
            })
        );
    }

    #[test]
    fn test_classify_other_rejections() {
        assert_eq!(
            classify("[ AccessManager.Reject ] : [ authmod=adobe ] : ?reason=authfailed&opaque=x"),
            Rejection::AuthFailed
        );
        assert_eq!(classify("Application not found"), Rejection::Other);
        assert_eq!(classify("?reason=needauth&user=alice"), Rejection::Other);
    }

    #[test]
    fn test_first_attempt_names_user_only() {
        let pairs = query_pairs(ALICE, None);
        assert_eq!(
            pairs,
            vec![("authmod", "adobe".to_string()), ("user", "alice".to_string())]
        );
    }

    #[test]
    fn test_answer_hides_password() {
        let server = challenge(Some("b3BxdQ=="));
        let pairs = query_pairs(ALICE, Some((&server, "0000abcd")));

        let keys: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["authmod", "user", "challenge", "response", "opaque"]);
        assert!(pairs.iter().all(|(_, v)| !v.contains("secret")));

        let response = &pairs[3].1;
        // base64 of a 16 byte digest
        assert_eq!(response.len(), 24);
        assert!(response.ends_with("=="));
    }

    #[test]
    fn test_response_prefers_opaque_over_challenge() {
        let with_opaque = challenge(Some("b3BxdQ=="));
        let mut other_challenge = with_opaque.clone();
        other_challenge.challenge = Some("ZGlmZg==".to_string());
        assert_eq!(
            response(ALICE, &with_opaque, "0000abcd"),
            response(ALICE, &other_challenge, "0000abcd")
        );

        let without_opaque = challenge(None);
        assert_ne!(
            response(ALICE, &without_opaque, "0000abcd"),
            response(ALICE, &other_challenge, "0000abcd")
        );
    }

    #[test]
    fn test_response_depends_on_password() {
        let server = challenge(None);
        let wrong = SourceCredentials {
            password: "guess",
            ..ALICE
        };
        assert_ne!(
            response(ALICE, &server, "0000abcd"),
            response(wrong, &server, "0000abcd")
        );
    }

    #[test]
    fn test_client_challenge_shape() {
        let value = client_challenge();
        assert_eq!(value.len(), 8);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
