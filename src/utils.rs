use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
use url::{Url, form_urlencoded};

use crate::{
    error::AuthError,
    types::{AuthorizationRequest, Mood, PendingCode},
};

const IDENTITY_PREFIX_MAX: usize = 32;
const IDENTITY_HASH_LEN: usize = 16;

/// Maps an identity to the file name of its credential record.
///
/// Keeps up to 32 allow-listed characters (`[A-Za-z0-9_-]`) for readability and
/// appends a hash of the full identity, so distinct identities never collide and
/// no identity can name a path outside the store directory.
pub fn identity_file_name(identity: &str) -> String {
    let prefix: String = identity
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(IDENTITY_PREFIX_MAX)
        .collect();
    let prefix = if prefix.is_empty() {
        "identity".to_string()
    } else {
        prefix
    };

    let hash = URL_SAFE_NO_PAD.encode(Sha256::digest(identity.as_bytes()));
    format!("{prefix}-{}.json", &hash[..IDENTITY_HASH_LEN])
}

pub fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Checks that `path` can be served as a literal route.
///
/// It must be absolute, and no segment may look like a route parameter
/// (`:name`, `*rest`, `{name}`).
pub fn check_callback_path(path: &str) -> Result<(), AuthError> {
    if !path.starts_with('/') {
        return Err(AuthError::InvalidConfiguration(format!(
            "callback path must start with '/': {path}"
        )));
    }

    let wildcard = path.split('/').any(|segment| {
        segment.starts_with(':') || segment.starts_with('*') || segment.contains(['{', '}'])
    });
    if wildcard {
        return Err(AuthError::InvalidConfiguration(format!(
            "callback path must not contain route parameters: {path}"
        )));
    }
    Ok(())
}

/// Builds the provider's authorize URL for one flow.
pub fn authorize_url(base: &str, request: &AuthorizationRequest) -> Result<String, url::ParseError> {
    let url = Url::parse_with_params(
        base,
        &[
            ("client_id", request.client.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("scope", request.scope().as_str()),
        ],
    )?;
    Ok(url.into())
}

/// Interprets the query string of a redirect to the callback path.
///
/// Parameters are split on `&`, so trailing ones such as `state` are ignored.
/// A request without `code` is a denial, carrying the provider's `error` when
/// present.
pub fn parse_callback_query(query: Option<&str>) -> PendingCode {
    let params: HashMap<String, String> = form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect();

    match params.get("code").filter(|c| !c.is_empty()) {
        Some(code) => PendingCode::Code(code.clone()),
        None => PendingCode::Denied(
            params
                .get("error")
                .cloned()
                .unwrap_or_else(|| "missing authorization code".to_string()),
        ),
    }
}

/// Classifies a track from its valence (positivity) and energy.
pub fn determine_mood(valence: f64, energy: f64) -> Mood {
    if valence > 0.6 {
        if energy > 0.7 { Mood::Happy } else { Mood::Calm }
    } else if valence < 0.4 {
        if energy > 0.7 { Mood::Angry } else { Mood::Sad }
    } else {
        Mood::Neutral
    }
}

/// Most frequent mood; ties go to the mood seen first. Empty input is neutral.
pub fn overall_mood(moods: &[Mood]) -> Mood {
    let mut counts: Vec<(Mood, usize)> = Vec::new();
    for mood in moods {
        match counts.iter_mut().find(|(m, _)| m == mood) {
            Some((_, n)) => *n += 1,
            None => counts.push((*mood, 1)),
        }
    }

    let mut best: Option<(Mood, usize)> = None;
    for (mood, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((mood, n));
        }
    }
    best.map(|(mood, _)| mood).unwrap_or(Mood::Neutral)
}

/// Renders an optional unix timestamp for humans.
pub fn format_timestamp(ts: Option<i64>) -> String {
    ts.and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
