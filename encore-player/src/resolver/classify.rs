//! Input classification
//!
//! Decides which backend a user-supplied string belongs to. Classification is
//! purely syntactic: nothing here touches the network, so the dispatch order
//! can be tested exhaustively.

use percent_encoding::percent_decode_str;
use url::Url;

/// Audio file extensions recognised on a URL path (case-insensitive)
pub const DIRECT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a"];

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "music.youtube.com",
    "youtu.be",
    "youtube-nocookie.com",
];

const AUDIO_SHARE_HOSTS: &[&str] = &["soundcloud.com"];

const AUDIO_SHARE_SHORT_HOSTS: &[&str] = &["on.soundcloud.com", "snd.sc"];

/// Path prefixes that carry a video id as the following segment
const VIDEO_ID_PATH_PREFIXES: &[&str] = &["embed", "v", "e", "shorts", "live"];

const VIDEO_ID_LEN: usize = 11;

/// What a user query refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Streaming-video playlist (`/playlist?list=<id>`)
    VideoPlaylist { list_id: String },

    /// Plain link to an audio file
    DirectLink { url: Url },

    /// Audio-share track page
    AudioShare { url: Url },

    /// Audio-share short link that must be redirect-resolved first
    AudioShareShortLink { url: Url },

    /// Single streaming-video item
    Video { video_id: String },

    /// Link to a video host with no recognisable video id (channel pages etc.)
    UnrecognizedVideoLink { url: Url },

    /// Free text
    Search { text: String },
}

/// Classify user input in dispatch order
///
/// 1. video playlist marker
/// 2. direct audio extension
/// 3. audio-share host
/// 4. video host or configured mirror
/// 5. free-text search
pub fn classify(input: &str, mirror_hosts: &[String]) -> Query {
    let trimmed = input.trim();
    match parse_link(trimmed) {
        Some(url) => classify_url(url, trimmed, mirror_hosts),
        None => Query::Search {
            text: trimmed.to_string(),
        },
    }
}

fn classify_url(url: Url, original: &str, mirror_hosts: &[String]) -> Query {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let video_host = is_video_host(&host, mirror_hosts);

    if video_host && url.path().trim_end_matches('/') == "/playlist" {
        if let Some(list_id) = query_param(&url, "list") {
            return Query::VideoPlaylist { list_id };
        }
    }

    if has_direct_audio_extension(&url) {
        return Query::DirectLink { url };
    }

    if AUDIO_SHARE_SHORT_HOSTS.contains(&host.as_str()) {
        return Query::AudioShareShortLink { url };
    }
    if AUDIO_SHARE_HOSTS.contains(&strip_subdomain(&host)) {
        return Query::AudioShare { url };
    }

    if video_host {
        return match extract_video_id(&url, &host) {
            Some(video_id) => Query::Video { video_id },
            None => Query::UnrecognizedVideoLink { url },
        };
    }

    Query::Search {
        text: original.to_string(),
    }
}

/// Parse http(s) URLs, accepting scheme-less `host/path` input
fn parse_link(input: &str) -> Option<Url> {
    if input.is_empty() || input.contains(char::is_whitespace) {
        return None;
    }

    match Url::parse(input) {
        Ok(url) => {
            let web = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
            web.then_some(url)
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let (host, _) = input.split_once('/')?;
            if !host.contains('.') {
                return None;
            }
            Url::parse(&format!("https://{}", input)).ok()
        }
        Err(_) => None,
    }
}

/// Drop a leading `www.` or `m.` label
fn strip_subdomain(host: &str) -> &str {
    host.strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host)
}

fn is_video_host(host: &str, mirror_hosts: &[String]) -> bool {
    let bare = strip_subdomain(host);
    VIDEO_HOSTS.contains(&bare)
        || mirror_hosts
            .iter()
            .any(|m| m.eq_ignore_ascii_case(host) || m.eq_ignore_ascii_case(bare))
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn has_direct_audio_extension(url: &Url) -> bool {
    let Some(last) = url.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => DIRECT_AUDIO_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Extract the 11-character id from any supported video link shape
fn extract_video_id(url: &Url, host: &str) -> Option<String> {
    let mut segments = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if let Some(v) = query_param(url, "v") {
        Some(v)
    } else {
        match (segments.next(), segments.next()) {
            (Some(prefix), Some(id)) if VIDEO_ID_PATH_PREFIXES.contains(&prefix) => {
                Some(id.to_string())
            }
            _ => None,
        }
    };

    candidate.filter(|id| is_video_id(id))
}

/// `[A-Za-z0-9_-]{11}`
pub fn is_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Human-readable name of a link's final path segment
///
/// Percent-escapes are decoded; invalid UTF-8 is replaced.
pub fn display_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .unwrap_or_else(|| url.as_str().to_string())
}
