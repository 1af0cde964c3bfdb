// Apple Music web enrichment
// Looks a song up on music.apple.com to fill in duration and artwork

use crate::song::{Artwork, Song};
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("am-scrobbler/", env!("CARGO_PKG_VERSION"));
const ARTWORK_SIZE: u32 = 300;

/// Secondary source for metadata the desktop player does not expose.
///
/// Best effort: failures leave the song untouched. Never overwrites a
/// duration that came from the desktop player.
pub trait WebSource {
    fn update_metadata(&self, song: &mut Song, include_artwork: bool);
}

/// Disabled lookups
impl<T: WebSource> WebSource for Option<T> {
    fn update_metadata(&self, song: &mut Song, include_artwork: bool) {
        if let Some(source) = self {
            source.update_metadata(song, include_artwork);
        }
    }
}

/// Extracts what we need from Apple Music web pages
struct PageParser {
    track_link: Regex,
    json_script: Regex,
    iso_duration: Regex,
}

impl PageParser {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            track_link: Regex::new(r#"href="(https://music\.apple\.com/[^"]+)""#)?,
            json_script: Regex::new(r#"(?s)<script[^>]*type="application/json"[^>]*>(.*?)</script>"#)?,
            iso_duration: Regex::new(
                r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$",
            )?,
        })
    }

    /// Link of the first track result on a search page
    fn first_track_url(&self, html: &str) -> Option<String> {
        let start = html.find("track-lockup")?;
        let captures = self.track_link.captures(&html[start..])?;
        Some(captures[1].replace("&amp;", "&"))
    }

    /// The page state embedded as JSON; Apple wraps it in a one element array
    fn page_data(&self, html: &str) -> Option<Value> {
        let captures = self.json_script.captures(html)?;
        let value: Value = serde_json::from_str(captures[1].trim()).ok()?;
        match value {
            Value::Array(mut items) if !items.is_empty() => Some(items.swap_remove(0)),
            Value::Array(_) => None,
            other => Some(other),
        }
    }

    /// `PT3M25S` style durations in whole seconds
    fn parse_duration(&self, iso: &str) -> Option<u64> {
        let captures = self.iso_duration.captures(iso.trim())?;
        let part = |index: usize| -> u64 {
            captures
                .get(index)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
    }

    fn duration(&self, page: &Value) -> Option<u64> {
        let iso = page["data"]["seoData"]["schemaContent"]["audio"]["duration"].as_str()?;
        self.parse_duration(iso).filter(|seconds| *seconds > 0)
    }

    fn artwork_url(&self, page: &Value, size: u32) -> Option<String> {
        let template = page["data"]["sections"][0]["items"][0]["artwork"]["dictionary"]["url"].as_str()?;
        Some(
            template
                .replace("{w}", &size.to_string())
                .replace("{h}", &size.to_string())
                .replace("{f}", "jpg"),
        )
    }
}

/// Enrichment from the public Apple Music website
pub struct AppleMusicWeb {
    storefront: String,
    parser: PageParser,
}

impl AppleMusicWeb {
    pub fn new(storefront: &str) -> Result<Self> {
        Ok(Self {
            storefront: storefront.to_string(),
            parser: PageParser::new().context("Failed to compile Apple Music page patterns")?,
        })
    }

    fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<attohttpc::Response> {
        let mut request = attohttpc::get(url)
            .header(attohttpc::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT);
        for (key, value) in params {
            request = request.param(key, value);
        }

        let response = request.send().with_context(|| format!("GET {} failed", url))?;
        if !response.is_success() {
            anyhow::bail!("GET {} returned {}", url, response.status());
        }
        Ok(response)
    }

    fn album_page(&self, song: &Song) -> Result<Value> {
        let metadata = &song.metadata;
        let term = format!("{} {} {}", metadata.title, metadata.artist, metadata.album);
        let search_url = format!("https://music.apple.com/{}/search", self.storefront);

        let search = self.fetch(&search_url, &[("term", term.trim())])?.text()?;
        let track_url = self
            .parser
            .first_track_url(&search)
            .context("No track in search results")?;

        let album = self.fetch(&track_url, &[])?.text()?;
        self.parser
            .page_data(&album)
            .context("No page data on album page")
    }

    fn enrich(&self, song: &mut Song, include_artwork: bool) -> Result<()> {
        let page = self.album_page(song)?;

        if !song.metadata.is_app_duration {
            if let Some(duration) = self.parser.duration(&page) {
                log::debug!("Apple Music web duration for {}: {}s", song, duration);
                song.metadata.duration = duration;
            }
        }

        if include_artwork {
            if let Some(url) = self.parser.artwork_url(&page, ARTWORK_SIZE) {
                let bytes = self.fetch(&url, &[])?.bytes()?;
                song.metadata.artwork = Some(Artwork { url, bytes });
            }
        }

        Ok(())
    }
}

impl WebSource for AppleMusicWeb {
    fn update_metadata(&self, song: &mut Song, include_artwork: bool) {
        if let Err(e) = self.enrich(song, include_artwork) {
            log::debug!("Apple Music web lookup for {} failed: {:#}", song, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> PageParser {
        PageParser::new().unwrap()
    }

    #[test]
    fn test_iso_durations() {
        let parser = parser();
        assert_eq!(parser.parse_duration("PT3M25S"), Some(205));
        assert_eq!(parser.parse_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parser.parse_duration("PT45.5S"), Some(45));
        assert_eq!(parser.parse_duration("PT4M"), Some(240));
        assert_eq!(parser.parse_duration("3:25"), None);
    }

    #[test]
    fn test_first_track_url_skips_other_links() {
        let html = r#"
            <a href="https://music.apple.com/us/browse">Browse</a>
            <div class="track-lockup svelte-nvj7sn is-link">
              <a class="click-action svelte-yg0ebd" href="https://music.apple.com/us/album/ok-computer/1097861387?i=1097861700&amp;l=en">Karma Police</a>
            </div>
            <div class="track-lockup svelte-nvj7sn is-link">
              <a class="click-action svelte-yg0ebd" href="https://music.apple.com/us/album/other/1">Other</a>
            </div>"#;

        assert_eq!(
            parser().first_track_url(html).as_deref(),
            Some("https://music.apple.com/us/album/ok-computer/1097861387?i=1097861700&l=en")
        );
        assert_eq!(parser().first_track_url("<div>nothing</div>"), None);
    }

    #[test]
    fn test_page_data_reads_duration_and_artwork() {
        let state = json!([{
            "data": {
                "seoData": {"schemaContent": {"audio": {"duration": "PT4M24S"}}},
                "sections": [{"items": [{"artwork": {"dictionary": {"url": "https://is1.mzstatic.com/image/{w}x{h}bb.{f}"}}}]}]
            }
        }]);
        let html = format!(
            r#"<html><script type="application/json" id="serialized-server-data">{}</script></html>"#,
            state
        );

        let parser = parser();
        let page = parser.page_data(&html).unwrap();
        assert_eq!(parser.duration(&page), Some(264));
        assert_eq!(
            parser.artwork_url(&page, 300).as_deref(),
            Some("https://is1.mzstatic.com/image/300x300bb.jpg")
        );
    }

    #[test]
    fn test_missing_fields_yield_nothing() {
        let parser = parser();
        let page = json!({"data": {}});
        assert_eq!(parser.duration(&page), None);
        assert_eq!(parser.artwork_url(&page, 300), None);
        assert_eq!(parser.page_data("<html></html>"), None);
    }
}
