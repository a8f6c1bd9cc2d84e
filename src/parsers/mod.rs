//! Page parsers and the per-site parser registry.
//!
//! Every page kind has a generic heuristic parser; sites whose markup the
//! heuristics get wrong register an override under their site key.

pub mod hr;
pub mod inbox;
pub mod table;
pub mod torrent_list;

use std::collections::HashMap;

use crate::models::{InboxMessage, IntelSiteProfile, ParsedHrPage, ParsedTorrentRow};

pub type HrParser = fn(&IntelSiteProfile, &str) -> ParsedHrPage;
pub type InboxParser = fn(&IntelSiteProfile, &str) -> Vec<InboxMessage>;
pub type TorrentListParser = fn(&IntelSiteProfile, &str) -> Vec<ParsedTorrentRow>;

/// Parser strategies keyed by lowercase site (or parser) name.
#[derive(Clone)]
pub struct ParserRegistry {
    hr: HashMap<String, HrParser>,
    inbox: HashMap<String, InboxParser>,
    torrent_list: HashMap<String, TorrentListParser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ParserRegistry {
    /// Registry with no overrides; every site gets the generic parsers.
    pub fn empty() -> Self {
        Self {
            hr: HashMap::new(),
            inbox: HashMap::new(),
            torrent_list: HashMap::new(),
        }
    }

    /// Registry with the built-in site overrides.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_inbox("ttg", inbox::parse_ttg);
        registry.register_torrent_list("hdsky", torrent_list::parse_hdsky);
        registry
    }

    pub fn register_hr(&mut self, name: &str, parser: HrParser) {
        self.hr.insert(name.to_lowercase(), parser);
    }

    pub fn register_inbox(&mut self, name: &str, parser: InboxParser) {
        self.inbox.insert(name.to_lowercase(), parser);
    }

    pub fn register_torrent_list(&mut self, name: &str, parser: TorrentListParser) {
        self.torrent_list.insert(name.to_lowercase(), parser);
    }

    pub fn parse_hr(&self, profile: &IntelSiteProfile, html: &str) -> ParsedHrPage {
        let parser = select(&self.hr, None, &profile.site).unwrap_or(hr::parse_generic);
        parser(profile, html)
    }

    pub fn parse_inbox(&self, profile: &IntelSiteProfile, html: &str) -> Vec<InboxMessage> {
        let parser = select(&self.inbox, profile.inbox.parser.as_deref(), &profile.site)
            .unwrap_or(inbox::parse_generic);
        parser(profile, html)
    }

    pub fn parse_torrent_list(&self, profile: &IntelSiteProfile, html: &str) -> Vec<ParsedTorrentRow> {
        let parser = select(&self.torrent_list, None, &profile.site)
            .unwrap_or(torrent_list::parse_generic);
        parser(profile, html)
    }
}

/// Explicit parser name first, then the site key.
fn select<F: Copy>(parsers: &HashMap<String, F>, explicit: Option<&str>, site: &str) -> Option<F> {
    if let Some(name) = explicit {
        match parsers.get(&name.to_lowercase()) {
            Some(parser) => return Some(*parser),
            None => log::warn!("[{}] unknown parser '{}', using site default", site, name),
        }
    }
    parsers.get(&site.to_lowercase()).copied()
}
