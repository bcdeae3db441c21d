//! Vendor identifier parsing.
//!
//! Sources describe an item with loosely formatted identifier strings. Three
//! families are understood:
//!
//! - current generation: `tmdb://603`, `imdb://tt0133093`, `tvdb://81189`
//! - legacy agents: `com.plexapp.agents.themoviedb://603?lang=en`,
//!   `com.plexapp.agents.imdb://tt0133093?lang=en`,
//!   `com.plexapp.agents.thetvdb://81189/1/3?lang=en`
//! - anime agent: `com.plexapp.agents.hama://tvdb-81189?lang=en`,
//!   `hama://anidb-1234`
//!
//! Anything else (`plex://movie/5d77...`, `local://12`) carries no external
//! id and is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

static AGENT_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:com\.plexapp\.agents\.)?(?P<agent>[a-z0-9]+)://(?P<rest>[^?#]+)")
        .expect("agent guid regex should compile")
});
static IMDB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(tt\d{5,})").expect("imdb id regex should compile"));
static LEADING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)").expect("leading digits regex should compile"));

/// External identifiers found on one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIdentifiers {
    pub tmdb: Option<i64>,
    pub imdb: Option<String>,
    pub tvdb: Option<i64>,
    pub anidb: Option<i64>,
}

impl ParsedIdentifiers {
    pub fn is_empty(&self) -> bool {
        self.tmdb.is_none() && self.imdb.is_none() && self.tvdb.is_none() && self.anidb.is_none()
    }
}

fn leading_number(rest: &str) -> Option<i64> {
    LEADING_DIGITS
        .captures(rest)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|id: &i64| *id > 0)
}

fn imdb(rest: &str) -> Option<String> {
    IMDB_ID
        .captures(rest)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parses every identifier; the first value seen for each family wins.
pub fn parse_identifiers<S: AsRef<str>>(identifiers: &[S]) -> ParsedIdentifiers {
    let mut parsed = ParsedIdentifiers::default();
    for raw in identifiers {
        let raw = raw.as_ref().trim();
        let Some(caps) = AGENT_GUID.captures(raw) else {
            trace!(guid = raw, "unrecognised identifier");
            continue;
        };
        let agent = caps.name("agent").map_or("", |m| m.as_str());
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        match agent {
            "tmdb" | "themoviedb" => {
                parsed.tmdb = parsed.tmdb.or_else(|| leading_number(rest));
            }
            "imdb" => {
                parsed.imdb = parsed.imdb.take().or_else(|| imdb(rest));
            }
            "tvdb" | "thetvdb" => {
                parsed.tvdb = parsed.tvdb.or_else(|| leading_number(rest));
            }
            "hama" => parse_hama(rest, &mut parsed),
            _ => trace!(guid = raw, agent, "identifier without external id"),
        }
    }
    parsed
}

// `tvdb-81189`, `tvdb3-81189`, `anidb-1234`, `tmdb-603`, `imdb-tt0133093`
fn parse_hama(rest: &str, parsed: &mut ParsedIdentifiers) {
    let Some((scheme, value)) = rest.split_once('-') else {
        return;
    };
    match scheme {
        s if s.starts_with("tvdb") => parsed.tvdb = parsed.tvdb.or_else(|| leading_number(value)),
        "anidb" => parsed.anidb = parsed.anidb.or_else(|| leading_number(value)),
        "tmdb" => parsed.tmdb = parsed.tmdb.or_else(|| leading_number(value)),
        "imdb" => parsed.imdb = parsed.imdb.take().or_else(|| imdb(value)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_generation_guids() {
        let parsed = parse_identifiers(&["imdb://tt0133093", "tmdb://603", "tvdb://169"]);
        assert_eq!(parsed.tmdb, Some(603));
        assert_eq!(parsed.imdb.as_deref(), Some("tt0133093"));
        assert_eq!(parsed.tvdb, Some(169));
    }

    #[test]
    fn legacy_agent_guids() {
        assert_eq!(
            parse_identifiers(&["com.plexapp.agents.themoviedb://603?lang=en"]).tmdb,
            Some(603)
        );
        assert_eq!(
            parse_identifiers(&["com.plexapp.agents.imdb://tt0133093?lang=en"])
                .imdb
                .as_deref(),
            Some("tt0133093")
        );
        assert_eq!(
            parse_identifiers(&["com.plexapp.agents.thetvdb://81189/1/3?lang=en"]).tvdb,
            Some(81189)
        );
    }

    #[test]
    fn anime_agent_guids() {
        let parsed = parse_identifiers(&["com.plexapp.agents.hama://tvdb-81189?lang=en"]);
        assert_eq!(parsed.tvdb, Some(81189));
        assert_eq!(parse_identifiers(&["hama://anidb-1234"]).anidb, Some(1234));
        assert_eq!(parse_identifiers(&["hama://tvdb3-5000/2"]).tvdb, Some(5000));
    }

    #[test]
    fn native_and_malformed_guids_yield_nothing() {
        let parsed = parse_identifiers(&[
            "plex://movie/5d776825880197001ec967c6",
            "local://4021",
            "tmdb://not-a-number",
            "imdb://0133093",
            "garbage",
        ]);
        assert!(parsed.is_empty());
    }

    #[test]
    fn first_value_per_family_wins() {
        let parsed = parse_identifiers(&["tmdb://603", "com.plexapp.agents.themoviedb://604"]);
        assert_eq!(parsed.tmdb, Some(603));
    }
}
