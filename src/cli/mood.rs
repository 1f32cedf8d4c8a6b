use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

use crate::{
    cli::{BrowserPrompt, session_provider},
    error, info,
    spotify::history,
    types::{AudioFeatures, Mood, MoodTableRow, PlayHistory},
    utils, warning,
};

/// Classifies the most recently played tracks of `identity` and prints the
/// overall mood.
///
/// Authorizes first when needed. Tracks without audio features (local files,
/// podcasts) are listed as skipped and do not count towards the overall mood.
pub async fn mood(identity: String, limit: u32) {
    let session = match session_provider(None, Arc::new(BrowserPrompt)) {
        Ok(session) => session,
        Err(e) => error!("Cannot load configuration. Err: {}", e),
    };

    let token = match session.get_valid_token(&identity).await {
        Ok(token) => token,
        Err(e) => error!(
            "No valid session for '{}'. Run spotmood auth --user {}\n Error: {}",
            identity, identity, e
        ),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_message("Fetching recently played tracks...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let played = match history::get_recently_played(&token, limit).await {
        Ok(played) => played,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch recently played tracks. Err: {}", e);
        }
    };

    pb.set_message("Fetching audio features...");
    let track_ids: Vec<String> = played
        .iter()
        .filter_map(|item| item.track.id.clone())
        .collect();
    let features = match history::get_audio_features(&token, &track_ids).await {
        Ok(features) => features,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch audio features. Err: {}", e);
        }
    };
    pb.finish_and_clear();

    if played.is_empty() {
        warning!("No recently played tracks for '{}'.", identity);
        return;
    }

    let (rows, moods) = classify(&played, &features);
    println!("{}", Table::new(rows));

    if moods.is_empty() {
        warning!("Spotify returned no audio features for these tracks.");
    }
    info!("Overall Mood: {}", utils::overall_mood(&moods));
}

fn classify(
    played: &[PlayHistory],
    features: &[Option<AudioFeatures>],
) -> (Vec<MoodTableRow>, Vec<Mood>) {
    let mut rows = Vec::with_capacity(played.len());
    let mut moods = Vec::new();

    for item in played {
        let artists = item
            .track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let found = item.track.id.as_ref().and_then(|id| {
            features
                .iter()
                .flatten()
                .find(|f| &f.id == id)
        });

        let row = match found {
            Some(f) => {
                let mood = utils::determine_mood(f.valence, f.energy);
                moods.push(mood);
                MoodTableRow {
                    track: item.track.name.clone(),
                    artists,
                    valence: format!("{:.2}", f.valence),
                    energy: format!("{:.2}", f.energy),
                    mood: mood.to_string(),
                }
            }
            None => MoodTableRow {
                track: item.track.name.clone(),
                artists,
                valence: "-".to_string(),
                energy: "-".to_string(),
                mood: "skipped".to_string(),
            },
        };
        rows.push(row);
    }

    (rows, moods)
}
