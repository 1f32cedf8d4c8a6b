use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::{
    config,
    types::{AudioFeatures, AudioFeaturesResponse, PlayHistory, RecentlyPlayedResponse},
    warning,
};

/// Upper bound of `limit` accepted by `/me/player/recently-played`.
pub const MAX_RECENTLY_PLAYED: u32 = 50;
/// Upper bound of ids per `/audio-features` request.
pub const MAX_AUDIO_FEATURE_IDS: usize = 100;

const BAD_GATEWAY_DELAY: Duration = Duration::from_secs(10);
const MAX_RETRY_AFTER_SECS: u64 = 120;

/// Retrieves the tracks the user played most recently.
///
/// # Arguments
///
/// * `token` - Valid access token carrying the `user-read-recently-played` scope
/// * `limit` - Number of items to return, clamped to `1..=50`
///
/// # Retry Logic
///
/// 502 Bad Gateway is retried after 10 seconds. 429 Too Many Requests is retried
/// after the `Retry-After` delay as long as it stays reasonable (at most two
/// minutes); beyond that the error is returned.
///
/// # Example
///
/// ```
/// let token = session.get_valid_token("alice").await?;
/// let played = get_recently_played(&token, 10).await?;
/// ```
pub async fn get_recently_played(token: &str, limit: u32) -> Result<Vec<PlayHistory>, reqwest::Error> {
    let api_url = format!(
        "{uri}/me/player/recently-played?limit={limit}",
        uri = &config::spotify_apiurl(),
        limit = limit.clamp(1, MAX_RECENTLY_PLAYED)
    );

    let res: RecentlyPlayedResponse = get_json(&api_url, token).await?;
    Ok(res.items)
}

/// Retrieves valence and energy for a batch of tracks.
///
/// The result is aligned with `track_ids`: tracks Spotify has no analysis for
/// come back as `None`. Ids beyond the first 100 are requested in further
/// batches.
pub async fn get_audio_features(
    token: &str,
    track_ids: &[String],
) -> Result<Vec<Option<AudioFeatures>>, reqwest::Error> {
    let mut features = Vec::with_capacity(track_ids.len());

    for chunk in track_ids.chunks(MAX_AUDIO_FEATURE_IDS) {
        let api_url = format!(
            "{uri}/audio-features?ids={ids}",
            uri = &config::spotify_apiurl(),
            ids = chunk.join(",")
        );
        let res: AudioFeaturesResponse = get_json(&api_url, token).await?;
        features.extend(res.audio_features);
    }

    Ok(features)
}

async fn get_json<T: DeserializeOwned>(api_url: &str, token: &str) -> Result<T, reqwest::Error> {
    let client = Client::new();

    loop {
        let response = client.get(api_url).bearer_auth(token).send().await?;

        match response.status() {
            StatusCode::BAD_GATEWAY => {
                sleep(BAD_GATEWAY_DELAY).await;
                continue; // retry
            }
            StatusCode::TOO_MANY_REQUESTS => match retry_after(&response) {
                Some(secs) if secs <= MAX_RETRY_AFTER_SECS => {
                    sleep(Duration::from_secs(secs)).await;
                    continue;
                }
                Some(secs) => {
                    warning!(
                        "Spotify asks to retry after {} seconds. Try again later.",
                        secs
                    );
                }
                None => {}
            },
            _ => {}
        }

        return response.error_for_status()?.json::<T>().await;
    }
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}
