use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::domain::models::ShowIdentity;

// "Show Name (2004)", "Show Name (2004) [1080p]"
static TITLE_WITH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)[\s.]+?[.(](\d{4})[.)].*$").expect("valid title pattern")
});
static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("valid number pattern"));

/// Explicit values win; otherwise the title comes from the show folder (the
/// parent of `folder`) and the season from `folder` itself.
pub fn resolve(
    imdb: Option<String>,
    title: Option<String>,
    season_number: Option<u32>,
    folder: &Path,
) -> Option<ShowIdentity> {
    let title = title.or_else(|| title_from_folder(folder));
    let season_number = season_number.or_else(|| season_from_folder(folder));
    tracing::debug!(?title, ?season_number, "Resolved show identity");

    Some(ShowIdentity {
        imdb,
        title: title?,
        season_number: season_number?,
    })
}

fn title_from_folder(season_folder: &Path) -> Option<String> {
    let show_folder = season_folder.parent()?.file_name()?.to_string_lossy();
    let title = match TITLE_WITH_YEAR.captures(&show_folder) {
        Some(captures) => captures[1].to_string(),
        None => show_folder.into_owned(),
    };
    Some(title)
}

fn season_from_folder(season_folder: &Path) -> Option<u32> {
    let name = season_folder.file_name()?.to_string_lossy();
    if let Some(season) = FIRST_NUMBER
        .captures(&name)
        .and_then(|captures| captures[1].parse().ok())
    {
        return Some(season);
    }
    name.to_lowercase().ends_with("specials").then_some(0)
}
