//! Album-art / artist-image provider trait and the providers gated by
//! their respective API keys: a search API (fanart.tv), an open music DB
//! (MusicBrainz/Cover Art Archive), and the streaming service itself.

use async_trait::async_trait;
use lyricline_common::{ProviderId, TrackKey};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ArtCandidate {
    pub image_url: String,
    pub resolution_px: Option<u32>,
}

#[async_trait]
pub trait ArtProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn search_album_art(&self, track_key: &TrackKey) -> anyhow::Result<Vec<ArtCandidate>>;

    async fn search_artist_images(&self, _artist_key: &str) -> anyhow::Result<Vec<ArtCandidate>> {
        Ok(Vec::new())
    }
}

/// Cover Art Archive / MusicBrainz: no API key required, used as the
/// "open music DB" provider.
pub struct CoverArtArchiveProvider {
    http: reqwest::Client,
}

impl CoverArtArchiveProvider {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct MusicBrainzSearchResult {
    releases: Vec<MusicBrainzRelease>,
}

#[derive(Debug, Deserialize)]
struct MusicBrainzRelease {
    id: String,
}

#[async_trait]
impl ArtProvider for CoverArtArchiveProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new("musicbrainz")
    }

    async fn search_album_art(&self, track_key: &TrackKey) -> anyhow::Result<Vec<ArtCandidate>> {
        let query = track_key.as_str().replace(' ', "+");
        let url = format!("https://musicbrainz.org/ws/2/release?query={query}&fmt=json&limit=1");
        let response = self
            .http
            .get(&url)
            .header("User-Agent", "lyricline-server/0.1")
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: MusicBrainzSearchResult = response.json().await?;
        let Some(release) = parsed.releases.into_iter().next() else {
            return Ok(Vec::new());
        };
        Ok(vec![ArtCandidate {
            image_url: format!("https://coverartarchive.org/release/{}/front", release.id),
            resolution_px: None,
        }])
    }
}

/// fanart.tv, gated by `FANART_TV_API_KEY`.
pub struct FanartTvProvider {
    http: reqwest::Client,
    api_key: String,
}

impl FanartTvProvider {
    pub fn new(api_key: String) -> Self {
        Self { http: reqwest::Client::new(), api_key }
    }
}

#[derive(Debug, Deserialize)]
struct FanartImage {
    url: String,
}

#[derive(Debug, Deserialize, Default)]
struct FanartResponse {
    #[serde(default, rename = "albums")]
    albums: Vec<serde_json::Value>,
    #[serde(default, rename = "artistbackground")]
    artist_background: Vec<FanartImage>,
    #[serde(default, rename = "artistthumb")]
    artist_thumb: Vec<FanartImage>,
}

#[async_trait]
impl ArtProvider for FanartTvProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new("fanart_tv")
    }

    async fn search_album_art(&self, _track_key: &TrackKey) -> anyhow::Result<Vec<ArtCandidate>> {
        // fanart.tv keys by MusicBrainz release-group id, not a free-text
        // query; album art here is a no-op until that id is threaded
        // through from the metadata source.
        Ok(Vec::new())
    }

    async fn search_artist_images(&self, artist_key: &str) -> anyhow::Result<Vec<ArtCandidate>> {
        let url = format!(
            "https://webservice.fanart.tv/v3/music/{artist_key}?api_key={}",
            self.api_key
        );
        let response = self
            .http
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: FanartResponse = response.json().await.unwrap_or_default();
        Ok(parsed
            .artist_background
            .into_iter()
            .chain(parsed.artist_thumb)
            .map(|img| ArtCandidate { image_url: img.url, resolution_px: None })
            .collect())
    }
}

/// Last.fm, gated by `LASTFM_API_KEY`. Album art comes from `track.getInfo`
/// (keyed by artist/title, which is what a `TrackKey` already carries);
/// artist images come from `artist.getInfo`.
pub struct LastFmProvider {
    http: reqwest::Client,
    api_key: String,
}

impl LastFmProvider {
    pub fn new(api_key: String) -> Self {
        Self { http: reqwest::Client::new(), api_key }
    }

    fn image_resolution(size: &str) -> Option<u32> {
        match size {
            "small" => Some(34),
            "medium" => Some(64),
            "large" => Some(174),
            "extralarge" => Some(300),
            "mega" => Some(600),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LastFmImage {
    #[serde(rename = "#text")]
    text: String,
    size: String,
}

#[derive(Debug, Deserialize, Default)]
struct LastFmAlbum {
    #[serde(default)]
    image: Vec<LastFmImage>,
}

#[derive(Debug, Deserialize)]
struct LastFmTrack {
    album: Option<LastFmAlbum>,
}

#[derive(Debug, Deserialize)]
struct LastFmTrackInfoResponse {
    track: Option<LastFmTrack>,
}

#[derive(Debug, Deserialize, Default)]
struct LastFmArtist {
    #[serde(default)]
    image: Vec<LastFmImage>,
}

#[derive(Debug, Deserialize)]
struct LastFmArtistInfoResponse {
    artist: Option<LastFmArtist>,
}

#[async_trait]
impl ArtProvider for LastFmProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new("lastfm")
    }

    async fn search_album_art(&self, track_key: &TrackKey) -> anyhow::Result<Vec<ArtCandidate>> {
        let Some((artist, title)) = track_key.as_str().split_once(" – ") else {
            return Ok(Vec::new());
        };
        let url = format!(
            "https://ws.audioscrobbler.com/2.0/?method=track.getinfo&api_key={}&artist={}&track={}&format=json",
            self.api_key,
            urlencoding(artist),
            urlencoding(title),
        );
        let response = self
            .http
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: LastFmTrackInfoResponse = response.json().await.unwrap_or(LastFmTrackInfoResponse { track: None });
        let images = parsed.track.and_then(|t| t.album).map(|a| a.image).unwrap_or_default();
        Ok(images
            .into_iter()
            .filter(|img| !img.text.is_empty())
            .map(|img| ArtCandidate {
                resolution_px: Self::image_resolution(&img.size),
                image_url: img.text,
            })
            .collect())
    }

    async fn search_artist_images(&self, artist_key: &str) -> anyhow::Result<Vec<ArtCandidate>> {
        let url = format!(
            "https://ws.audioscrobbler.com/2.0/?method=artist.getinfo&api_key={}&artist={}&format=json",
            self.api_key,
            urlencoding(artist_key),
        );
        let response = self
            .http
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: LastFmArtistInfoResponse =
            response.json().await.unwrap_or(LastFmArtistInfoResponse { artist: None });
        let images = parsed.artist.map(|a| a.image).unwrap_or_default();
        Ok(images
            .into_iter()
            .filter(|img| !img.text.is_empty())
            .map(|img| ArtCandidate {
                resolution_px: Self::image_resolution(&img.size),
                image_url: img.text,
            })
            .collect())
    }
}

fn urlencoding(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c.to_string() } else { "+".to_string() })
        .collect()
}
