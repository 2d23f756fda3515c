//! Source platform detection from a URL's host.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    YouTube,
    Spotify,
    SoundCloud,
    Instagram,
    TikTok,
    Facebook,
    Twitter,
    Vimeo,
    Dailymotion,
    Twitch,
    Reddit,
    LinkedIn,
    Pinterest,
    Snapchat,
    Unknown,
}

/// Host suffixes per platform; a host matches when it equals the suffix or
/// ends with `.suffix`.
const HOSTS: &[(&str, Platform)] = &[
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("spotify.com", Platform::Spotify),
    ("soundcloud.com", Platform::SoundCloud),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::TikTok),
    ("facebook.com", Platform::Facebook),
    ("fb.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("vimeo.com", Platform::Vimeo),
    ("dailymotion.com", Platform::Dailymotion),
    ("twitch.tv", Platform::Twitch),
    ("reddit.com", Platform::Reddit),
    ("linkedin.com", Platform::LinkedIn),
    ("pinterest.com", Platform::Pinterest),
    ("snapchat.com", Platform::Snapchat),
];

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Spotify => "Spotify",
            Platform::SoundCloud => "SoundCloud",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::Twitter => "Twitter",
            Platform::Vimeo => "Vimeo",
            Platform::Dailymotion => "Dailymotion",
            Platform::Twitch => "Twitch",
            Platform::Reddit => "Reddit",
            Platform::LinkedIn => "LinkedIn",
            Platform::Pinterest => "Pinterest",
            Platform::Snapchat => "Snapchat",
            Platform::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the platform of `url`. Unparseable URLs yield `Unknown`.
pub fn detect_platform(url: &str) -> Platform {
    let Some(host) = url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return Platform::Unknown;
    };
    HOSTS
        .iter()
        .find(|(suffix, _)| {
            host == *suffix
                || host
                    .strip_suffix(suffix)
                    .is_some_and(|rest| rest.ends_with('.'))
        })
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hosts() {
        assert_eq!(detect_platform("https://www.youtube.com/watch?v=x"), Platform::YouTube);
        assert_eq!(detect_platform("https://youtu.be/x"), Platform::YouTube);
        assert_eq!(detect_platform("https://m.soundcloud.com/a/b"), Platform::SoundCloud);
        assert_eq!(detect_platform("https://x.com/user/status/1"), Platform::Twitter);
        assert_eq!(detect_platform("https://www.twitch.tv/videos/1"), Platform::Twitch);
    }

    #[test]
    fn lookalike_hosts_are_unknown() {
        assert_eq!(detect_platform("https://notyoutube.com/watch"), Platform::Unknown);
        assert_eq!(detect_platform("https://box.com/file"), Platform::Unknown);
        assert_eq!(detect_platform("not a url"), Platform::Unknown);
    }

    #[test]
    fn serializes_as_display_name() {
        assert_eq!(serde_json::to_value(Platform::TikTok).unwrap(), "TikTok");
        assert_eq!(Platform::LinkedIn.to_string(), "LinkedIn");
    }
}
